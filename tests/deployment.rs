//! Behavioural tests for code deployment.

#[path = "common/fixtures.rs"]
mod fixtures;

use apprunner::backend::ObjectLocator;
use apprunner::test_support::{CodeSourceUpdate, MemoryStore, RecordingFunctionApi};
use apprunner::{CodeDeployer, DeployError, DeploymentTarget, ErrorKind, PipelineLayout, pack_bytes};
use rstest::{fixture, rstest};

use fixtures::{BUCKET, FUNCTION, layout};

#[fixture]
fn bundle() -> apprunner::ArtifactBundle {
    pack_bytes(&[("ec2_init.sh", "#!/bin/sh\n"), ("ec2_run.py", "print('ok')\n")])
        .unwrap_or_else(|err| panic!("bundle: {err}"))
}

#[rstest]
#[tokio::test]
async fn deploy_uploads_then_repoints(bundle: apprunner::ArtifactBundle) {
    let store = MemoryStore::new();
    let functions = RecordingFunctionApi::with_functions(&[FUNCTION]);
    let deployer = CodeDeployer::new(store.clone(), functions.clone(), layout());

    let locator = deployer
        .deploy(&bundle, &DeploymentTarget::new(FUNCTION, BUCKET))
        .await
        .unwrap_or_else(|err| panic!("deploy: {err}"));

    assert_eq!(locator, ObjectLocator::new(BUCKET, "app_runner/lambda_code.zip"));
    assert_eq!(
        store.object(BUCKET, "app_runner/lambda_code.zip"),
        Some(bundle.as_bytes().to_vec())
    );
    assert_eq!(
        functions.updates(),
        vec![CodeSourceUpdate {
            function: String::from(FUNCTION),
            bucket: String::from(BUCKET),
            key: String::from("app_runner/lambda_code.zip"),
        }]
    );
}

#[rstest]
#[tokio::test]
async fn custom_deploy_prefix_moves_the_artifact(bundle: apprunner::ArtifactBundle) {
    let store = MemoryStore::new();
    let functions = RecordingFunctionApi::with_functions(&[FUNCTION]);
    let deployer = CodeDeployer::new(
        store.clone(),
        functions,
        PipelineLayout::new("/releases/v2/", "app_runner"),
    );

    let locator = deployer
        .deploy(&bundle, &DeploymentTarget::new(FUNCTION, BUCKET))
        .await
        .unwrap_or_else(|err| panic!("deploy: {err}"));

    assert_eq!(locator.key, "releases/v2/lambda_code.zip");
}

#[rstest]
#[tokio::test]
async fn unknown_function_rejects_the_update(bundle: apprunner::ArtifactBundle) {
    let store = MemoryStore::new();
    let functions = RecordingFunctionApi::with_functions(&[]);
    let deployer = CodeDeployer::new(store.clone(), functions.clone(), layout());

    let err = deployer
        .deploy(&bundle, &DeploymentTarget::new("missing-fn", BUCKET))
        .await
        .expect_err("function does not exist");

    assert_eq!(
        err,
        DeployError::UpdateRejected {
            function: String::from("missing-fn"),
            message: String::from("Function not found"),
        }
    );
    assert_eq!(err.kind(), ErrorKind::UpdateRejected);
    assert!(
        store.object(BUCKET, "app_runner/lambda_code.zip").is_some(),
        "artifact stays uploaded after a rejected repoint"
    );
    assert!(functions.updates().is_empty());
}

#[rstest]
#[tokio::test]
async fn failed_upload_skips_the_repoint(bundle: apprunner::ArtifactBundle) {
    let store = MemoryStore::new();
    store.fail_puts();
    let functions = RecordingFunctionApi::with_functions(&[FUNCTION]);
    let deployer = CodeDeployer::new(store, functions.clone(), layout());

    let err = deployer
        .deploy(&bundle, &DeploymentTarget::new(FUNCTION, BUCKET))
        .await
        .expect_err("upload fails");

    assert_eq!(err.kind(), ErrorKind::TransferError);
    assert!(functions.updates().is_empty());
}
