//! Behavioural tests for the full provision, deploy, and verify run.

#[path = "common/fixtures.rs"]
mod fixtures;

use std::fs;

use apprunner::test_support::{MemoryStore, RecordingFunctionApi, ScriptedStackApi};
use apprunner::{
    DeploymentTarget, ErrorKind, OutputKeys, RunError, RunOrchestrator, RunRequest,
    StackDescriptor, StackError,
};
use camino::Utf8PathBuf;
use rstest::{fixture, rstest};
use tempfile::TempDir;

use fixtures::{BUCKET, BUCKET_ARN, FUNCTION, FUNCTION_ARN, layout, output, policy, status};

struct Harness {
    _dir: TempDir,
    stacks: ScriptedStackApi,
    store: MemoryStore,
    functions: RecordingFunctionApi,
    request: RunRequest,
}

impl Harness {
    fn orchestrator(
        &self,
    ) -> RunOrchestrator<ScriptedStackApi, MemoryStore, RecordingFunctionApi> {
        RunOrchestrator::new(
            self.stacks.clone(),
            self.store.clone(),
            self.functions.clone(),
            layout(),
            policy(5),
            policy(5),
        )
    }

    fn complete_stack(&self) {
        self.stacks.push_status(status("CREATE_COMPLETE"));
        self.stacks.push_output("DemoBucketArn", BUCKET_ARN);
        self.stacks.push_output("DemoLambdaFunctionArn", FUNCTION_ARN);
    }
}

#[fixture]
fn harness() -> Harness {
    let dir = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf())
        .unwrap_or_else(|path| panic!("non-utf8 tempdir: {}", path.display()));
    let mut code_sources = Vec::new();
    for name in ["ec2_init.sh", "ec2_run.py"] {
        let path = root.join(name);
        fs::write(&path, name).unwrap_or_else(|err| panic!("write {name}: {err}"));
        code_sources.push((name.to_owned(), path));
    }
    let descriptor = StackDescriptor::builder()
        .name("demo")
        .template_body("Resources: {}")
        .capability("CAPABILITY_NAMED_IAM")
        .build()
        .unwrap_or_else(|err| panic!("descriptor: {err}"));

    Harness {
        _dir: dir,
        stacks: ScriptedStackApi::new(),
        store: MemoryStore::new(),
        functions: RecordingFunctionApi::with_functions(&[FUNCTION]),
        request: RunRequest {
            descriptor,
            code_sources,
        },
    }
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn full_run_reports_every_stage(harness: Harness) {
    harness.complete_stack();
    harness.store.push_listing(vec![]);
    harness.store.push_listing(vec![output("test.zip", 4096)]);

    let report = harness
        .orchestrator()
        .execute(&harness.request)
        .await
        .unwrap_or_else(|err| panic!("run: {err}"));

    assert_eq!(report.target, DeploymentTarget::new(FUNCTION, BUCKET));
    assert_eq!(report.code_key, "app_runner/lambda_code.zip");
    assert_eq!(report.verification.attempts, 2);
    assert_eq!(report.outputs.get("DemoLambdaFunctionArn"), Some(FUNCTION_ARN));
    assert_eq!(harness.functions.updates().len(), 1);

    let uploaded: Vec<String> = harness
        .store
        .uploads()
        .into_iter()
        .map(|locator| locator.key)
        .collect();
    assert_eq!(
        uploaded,
        vec![
            String::from("app_runner/lambda_code.zip"),
            String::from("app_runner/input/test.zip"),
        ]
    );
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn missing_source_aborts_before_submission(mut harness: Harness) {
    harness.complete_stack();
    harness
        .request
        .code_sources
        .push((String::from("extra.py"), Utf8PathBuf::from("does/not/exist.py")));

    let err = harness
        .orchestrator()
        .execute(&harness.request)
        .await
        .expect_err("source missing");

    assert_eq!(err.kind(), ErrorKind::SourceMissing);
    assert!(harness.stacks.submissions().is_empty());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn failed_stack_aborts_before_deploy(harness: Harness) {
    harness.stacks.push_status(status("ROLLBACK_COMPLETE"));

    let err = harness
        .orchestrator()
        .execute(&harness.request)
        .await
        .expect_err("stack failed");

    assert_eq!(err.kind(), ErrorKind::ProvisioningFailed);
    assert_eq!(err.kind().exit_code(), 12);
    assert!(harness.store.uploads().is_empty());
    assert!(harness.functions.updates().is_empty());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn missing_output_aborts_before_deploy(harness: Harness) {
    harness.stacks.push_status(status("CREATE_COMPLETE"));
    harness.stacks.push_output("DemoBucketArn", BUCKET_ARN);

    let err = harness
        .orchestrator()
        .execute(&harness.request)
        .await
        .expect_err("function output missing");

    assert_eq!(
        err,
        RunError::Stack(StackError::OutputMissing {
            key: String::from("DemoLambdaFunctionArn"),
        })
    );
    assert!(harness.store.uploads().is_empty());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn custom_output_keys_locate_the_target(harness: Harness) {
    harness.stacks.push_status(status("CREATE_COMPLETE"));
    harness.stacks.push_output("PipelineBucket", BUCKET_ARN);
    harness.stacks.push_output("PipelineFunction", FUNCTION_ARN);
    harness.store.push_listing(vec![output("test.zip", 1)]);

    let report = harness
        .orchestrator()
        .with_output_keys(OutputKeys::new("PipelineBucket", "PipelineFunction"))
        .execute(&harness.request)
        .await
        .unwrap_or_else(|err| panic!("run: {err}"));

    assert_eq!(report.target, DeploymentTarget::new(FUNCTION, BUCKET));
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn rejected_update_aborts_before_verify(harness: Harness) {
    harness.stacks.push_status(status("CREATE_COMPLETE"));
    harness.stacks.push_output("DemoBucketArn", BUCKET_ARN);
    harness
        .stacks
        .push_output("DemoLambdaFunctionArn", "arn:aws:lambda:eu-west-1:1:function:other");

    let err = harness
        .orchestrator()
        .execute(&harness.request)
        .await
        .expect_err("function unknown");

    assert_eq!(err.kind(), ErrorKind::UpdateRejected);
    assert_eq!(harness.store.list_calls(), 0);
    assert!(
        harness
            .store
            .object(BUCKET, "app_runner/input/test.zip")
            .is_none()
    );
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn verification_failure_surfaces_its_kind(harness: Harness) {
    harness.complete_stack();
    harness.store.push_listing(vec![output("test_ec2.log", 512)]);

    let err = harness
        .orchestrator()
        .execute(&harness.request)
        .await
        .expect_err("pipeline only logged");

    assert_eq!(err.kind(), ErrorKind::FailedWithPartialSignal);
    assert_eq!(harness.functions.updates().len(), 1);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn standalone_stages_skip_provisioning(harness: Harness) {
    harness.store.push_listing(vec![output("test.zip", 8)]);
    let orchestrator = harness.orchestrator();

    let locator = orchestrator
        .deploy(
            &harness.request.code_sources,
            &DeploymentTarget::new(FUNCTION, BUCKET),
        )
        .await
        .unwrap_or_else(|err| panic!("deploy: {err}"));
    let report = orchestrator
        .verify(BUCKET)
        .await
        .unwrap_or_else(|err| panic!("verify: {err}"));

    assert_eq!(locator.key, "app_runner/lambda_code.zip");
    assert_eq!(report.attempts, 1);
    assert!(harness.stacks.submissions().is_empty());
}
