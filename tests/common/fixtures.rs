//! Shared builders for integration tests.

use std::time::Duration;

use apprunner::backend::{ObjectSummary, StackStatus};
use apprunner::{PipelineLayout, PollPolicy};

pub const BUCKET: &str = "demo-bucket";
pub const FUNCTION: &str = "demo-fn";
pub const BUCKET_ARN: &str = "arn:aws:s3:::demo-bucket";
pub const FUNCTION_ARN: &str = "arn:aws:lambda:eu-west-1:123456789012:function:demo-fn";
pub const DELAY: Duration = Duration::from_secs(15);

pub fn policy(max_attempts: u32) -> PollPolicy {
    PollPolicy::new(DELAY, max_attempts).unwrap_or_else(|err| panic!("policy: {err}"))
}

pub fn layout() -> PipelineLayout {
    PipelineLayout::default()
}

pub fn output(name: &str, size: u64) -> ObjectSummary {
    ObjectSummary::new(format!("app_runner/output/{name}"), size)
}

pub fn status(code: &str) -> StackStatus {
    StackStatus::new(code)
}
