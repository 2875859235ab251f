//! Behavioural tests for stack provisioning against a scripted stack API.

#[path = "common/fixtures.rs"]
mod fixtures;

use apprunner::backend::StackApiError;
use apprunner::test_support::ScriptedStackApi;
use apprunner::{ErrorKind, Provisioner, StackDescriptor, StackError};
use rstest::{fixture, rstest};
use tokio::time::{Duration, Instant};

use fixtures::{BUCKET_ARN, DELAY, FUNCTION_ARN, policy, status};

#[fixture]
fn descriptor() -> StackDescriptor {
    StackDescriptor::builder()
        .name("demo")
        .template_body("Resources: {}")
        .capability("CAPABILITY_NAMED_IAM")
        .build()
        .unwrap_or_else(|err| panic!("descriptor: {err}"))
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn completed_stack_returns_its_outputs(descriptor: StackDescriptor) {
    let api = ScriptedStackApi::new();
    api.push_status(status("CREATE_IN_PROGRESS"));
    api.push_status(status("CREATE_COMPLETE"));
    api.push_output("DemoBucketArn", BUCKET_ARN);
    api.push_output("DemoLambdaFunctionArn", FUNCTION_ARN);

    let outputs = Provisioner::new(api.clone(), policy(20))
        .provision(&descriptor)
        .await
        .unwrap_or_else(|err| panic!("provision: {err}"));

    assert_eq!(outputs.len(), 2);
    assert_eq!(outputs.get("DemoBucketArn"), Some(BUCKET_ARN));
    assert_eq!(api.status_calls(), 2);
    assert_eq!(api.submissions(), vec![descriptor]);
}

#[rstest]
#[case("CREATE_FAILED")]
#[case("ROLLBACK_COMPLETE")]
#[case("ROLLBACK_FAILED")]
#[tokio::test(start_paused = true)]
async fn failure_on_first_check_stops_immediately(
    descriptor: StackDescriptor,
    #[case] code: &str,
) {
    let api = ScriptedStackApi::new();
    api.push_status(status(code).with_reason("The following resource(s) failed to create"));
    let started = Instant::now();

    let err = Provisioner::new(api.clone(), policy(20))
        .provision(&descriptor)
        .await
        .expect_err("stack failed");

    assert_eq!(
        err,
        StackError::ProvisioningFailed {
            stack: String::from("demo"),
            status: code.to_owned(),
            reason: Some(String::from("The following resource(s) failed to create")),
        }
    );
    assert_eq!(err.kind(), ErrorKind::ProvisioningFailed);
    assert_eq!(api.status_calls(), 1);
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn rollback_in_progress_keeps_waiting(descriptor: StackDescriptor) {
    let api = ScriptedStackApi::new();
    api.push_status(status("CREATE_IN_PROGRESS"));
    api.push_status(status("ROLLBACK_IN_PROGRESS"));
    api.push_status(status("ROLLBACK_COMPLETE"));

    let err = Provisioner::new(api.clone(), policy(10))
        .provision(&descriptor)
        .await
        .expect_err("rollback completes as a failure");

    assert!(matches!(err, StackError::ProvisioningFailed { ref status, .. } if status == "ROLLBACK_COMPLETE"));
    assert_eq!(api.status_calls(), 3);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn stuck_stack_times_out_after_the_budget(descriptor: StackDescriptor) {
    let api = ScriptedStackApi::new();
    let started = Instant::now();

    let err = Provisioner::new(api.clone(), policy(4))
        .provision(&descriptor)
        .await
        .expect_err("stack never completes");

    assert_eq!(
        err,
        StackError::ProvisioningTimedOut {
            stack: String::from("demo"),
            attempts: 4,
            last_status: Some(String::from("CREATE_IN_PROGRESS")),
        }
    );
    assert_eq!(err.kind(), ErrorKind::ProvisioningTimedOut);
    assert_eq!(api.status_calls(), 4);
    assert_eq!(started.elapsed(), DELAY * 3);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn second_submission_of_the_same_name_fails(descriptor: StackDescriptor) {
    let api = ScriptedStackApi::new();
    api.push_status(status("CREATE_COMPLETE"));
    let provisioner = Provisioner::new(api.clone(), policy(3));
    provisioner
        .provision(&descriptor)
        .await
        .unwrap_or_else(|err| panic!("first provision: {err}"));

    let err = provisioner
        .provision(&descriptor)
        .await
        .expect_err("name already taken");

    assert_eq!(
        err,
        StackError::StackAlreadyExists {
            stack: String::from("demo"),
        }
    );
    assert_eq!(api.status_calls(), 1);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn unreachable_platform_is_a_transfer_error(descriptor: StackDescriptor) {
    let api = ScriptedStackApi::new();
    api.fail_transport("dispatch failure: connection refused");

    let err = Provisioner::new(api, policy(3))
        .provision(&descriptor)
        .await
        .expect_err("transport down");

    assert_eq!(
        err,
        StackError::Submit {
            stack: String::from("demo"),
            source: StackApiError::Transport {
                message: String::from("dispatch failure: connection refused"),
            },
        }
    );
    assert_eq!(err.kind(), ErrorKind::TransferError);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn duplicate_output_keys_are_rejected(descriptor: StackDescriptor) {
    let api = ScriptedStackApi::new();
    api.push_status(status("CREATE_COMPLETE"));
    api.push_output("DemoBucketArn", "a");
    api.push_output("DemoBucketArn", "b");

    let err = Provisioner::new(api, policy(3))
        .provision(&descriptor)
        .await
        .expect_err("duplicate outputs");

    assert!(matches!(err, StackError::DuplicateOutput { ref key, .. } if key == "DemoBucketArn"));
}
