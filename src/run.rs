//! Orchestrates a full pipeline run.
//!
//! The run packs the code sources, provisions the stack, deploys the code to
//! the function named by the stack outputs, and verifies the pipeline with a
//! synthetic input. The first failing stage ends the run; nothing is rolled
//! back and no stage is retried.

use camino::Utf8PathBuf;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::backend::{
    DeploymentTarget, FunctionApi, ObjectLocator, ObjectStore, StackApi, StackDescriptor,
};
use crate::deploy::{CodeDeployer, DeployError};
use crate::error::ErrorKind;
use crate::layout::PipelineLayout;
use crate::package::{ArtifactBundle, PackageError, pack};
use crate::poll::PollPolicy;
use crate::stack::{Provisioner, StackError, StackOutputMap};
use crate::verify::{VerifyError, VerifyReport, Verifier, synthetic_input};

/// Default stack output naming the bucket.
pub const DEFAULT_BUCKET_OUTPUT: &str = "DemoBucketArn";
/// Default stack output naming the function.
pub const DEFAULT_FUNCTION_OUTPUT: &str = "DemoLambdaFunctionArn";

/// Errors surfaced while performing a run or one of its stages.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum RunError {
    /// Packing the code sources failed.
    #[error(transparent)]
    Package(#[from] PackageError),
    /// Provisioning or output resolution failed.
    #[error(transparent)]
    Stack(#[from] StackError),
    /// Uploading or repointing the code failed.
    #[error(transparent)]
    Deploy(#[from] DeployError),
    /// The verification pass did not observe a result.
    #[error(transparent)]
    Verify(#[from] VerifyError),
}

impl RunError {
    /// Caller-visible failure category.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Package(err) => err.kind(),
            Self::Stack(err) => err.kind(),
            Self::Deploy(err) => err.kind(),
            Self::Verify(err) => err.kind(),
        }
    }
}

/// Stack output keys that locate the deployment target.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OutputKeys {
    /// Output holding the bucket ARN.
    pub bucket: String,
    /// Output holding the function ARN.
    pub function: String,
}

impl OutputKeys {
    /// Creates a key pair.
    #[must_use]
    pub fn new(bucket: impl Into<String>, function: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            function: function.into(),
        }
    }
}

impl Default for OutputKeys {
    fn default() -> Self {
        Self::new(DEFAULT_BUCKET_OUTPUT, DEFAULT_FUNCTION_OUTPUT)
    }
}

/// Resolves the bucket and function names from stack outputs.
///
/// Output values are ARNs; the resource name is the final `:`-separated
/// segment. Values without a `:` are used as-is.
///
/// # Errors
///
/// Returns [`StackError::OutputMissing`] when either output is absent.
pub fn resolve_target(
    outputs: &StackOutputMap,
    keys: &OutputKeys,
) -> Result<DeploymentTarget, StackError> {
    let bucket = arn_resource(outputs.require(&keys.bucket)?);
    let function = arn_resource(outputs.require(&keys.function)?);
    Ok(DeploymentTarget::new(function, bucket))
}

fn arn_resource(value: &str) -> &str {
    value.rsplit(':').next().unwrap_or(value)
}

/// Inputs for a full run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RunRequest {
    /// Stack to provision.
    pub descriptor: StackDescriptor,
    /// Code bundle entries as `(logical name, source path)` pairs.
    pub code_sources: Vec<(String, Utf8PathBuf)>,
}

/// Outcome of a successful run.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct RunReport {
    /// Outputs declared by the provisioned stack.
    pub outputs: StackOutputMap,
    /// Function and bucket the code was deployed to.
    pub target: DeploymentTarget,
    /// Key of the uploaded code artifact.
    pub code_key: String,
    /// Verification details.
    pub verification: VerifyReport,
}

/// Drives the provision, deploy, and verify stages.
#[derive(Debug)]
pub struct RunOrchestrator<A, S, F> {
    provisioner: Provisioner<A>,
    deployer: CodeDeployer<S, F>,
    verifier: Verifier<S>,
    output_keys: OutputKeys,
}

impl<A, S, F> RunOrchestrator<A, S, F>
where
    A: StackApi,
    S: ObjectStore + Clone,
    F: FunctionApi,
{
    /// Creates an orchestrator over the given adapters.
    #[must_use]
    pub fn new(
        stacks: A,
        store: S,
        functions: F,
        layout: PipelineLayout,
        stack_policy: PollPolicy,
        verify_policy: PollPolicy,
    ) -> Self {
        Self {
            provisioner: Provisioner::new(stacks, stack_policy),
            deployer: CodeDeployer::new(store.clone(), functions, layout.clone()),
            verifier: Verifier::new(store, layout, verify_policy),
            output_keys: OutputKeys::default(),
        }
    }

    /// Overrides the stack outputs used to locate the deployment target.
    #[must_use]
    pub fn with_output_keys(mut self, keys: OutputKeys) -> Self {
        self.output_keys = keys;
        self
    }

    /// Runs every stage in order.
    ///
    /// Code sources are packed before the stack is submitted so a missing
    /// file never leaves a half-used stack behind.
    ///
    /// # Errors
    ///
    /// Returns the [`RunError`] of the first stage that fails.
    pub async fn execute(&self, request: &RunRequest) -> Result<RunReport, RunError> {
        let bundle = pack(&request.code_sources)?;
        info!(entries = bundle.names().len(), "packed code sources");

        let outputs = self.provision(&request.descriptor).await?;
        let target = resolve_target(&outputs, &self.output_keys)?;
        info!(
            function = %target.function_name,
            bucket = %target.bucket_name,
            "resolved deployment target"
        );

        let code = self.deploy_bundle(&bundle, &target).await?;
        let verification = self.verify(&target.bucket_name).await?;

        Ok(RunReport {
            outputs,
            target,
            code_key: code.key,
            verification,
        })
    }

    /// Provisions the stack and returns its outputs.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Stack`] when provisioning fails.
    pub async fn provision(
        &self,
        descriptor: &StackDescriptor,
    ) -> Result<StackOutputMap, RunError> {
        Ok(self.provisioner.provision(descriptor).await?)
    }

    /// Packs `sources` and deploys them to `target`.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Package`] or [`RunError::Deploy`].
    pub async fn deploy(
        &self,
        sources: &[(String, Utf8PathBuf)],
        target: &DeploymentTarget,
    ) -> Result<ObjectLocator, RunError> {
        let bundle = pack(sources)?;
        self.deploy_bundle(&bundle, target).await
    }

    async fn deploy_bundle(
        &self,
        bundle: &ArtifactBundle,
        target: &DeploymentTarget,
    ) -> Result<ObjectLocator, RunError> {
        Ok(self.deployer.deploy(bundle, target).await?)
    }

    /// Runs one verification pass against `bucket` with the synthetic input.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Verify`] unless a result artifact appears.
    pub async fn verify(&self, bucket: &str) -> Result<VerifyReport, RunError> {
        let input = synthetic_input()?;
        Ok(self.verifier.verify(bucket, &input).await?)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::backend::StackOutput;

    #[rstest]
    #[case("arn:aws:s3:::demo-bucket", "demo-bucket")]
    #[case("arn:aws:lambda:eu-west-1:123456789012:function:demo-fn", "demo-fn")]
    #[case("plain-name", "plain-name")]
    fn arn_resource_takes_final_segment(#[case] arn: &str, #[case] expected: &str) {
        assert_eq!(arn_resource(arn), expected);
    }

    #[test]
    fn resolve_target_reports_missing_function_output() {
        let outputs = StackOutputMap::from_outputs(
            "demo",
            [StackOutput::new(DEFAULT_BUCKET_OUTPUT, "arn:aws:s3:::bucket")],
        )
        .unwrap_or_else(|err| panic!("outputs: {err}"));

        let err = resolve_target(&outputs, &OutputKeys::default())
            .expect_err("function output is absent");
        assert_eq!(
            err,
            StackError::OutputMissing {
                key: String::from(DEFAULT_FUNCTION_OUTPUT),
            }
        );
    }
}
