//! Well-known object keys shared with the deployed pipeline.
//!
//! The pipeline locates its inputs and writes its outputs at fixed keys, so
//! these names must match it byte for byte.

/// Default prefix for both the code artifact and runtime data.
pub const DEFAULT_PREFIX: &str = "app_runner";

/// File name of the uploaded code artifact.
pub const CODE_ARTIFACT_NAME: &str = "lambda_code.zip";
/// File name of the pipeline input and of the result artifact.
pub const RESULT_NAME: &str = "test.zip";
/// Diagnostic log written by the worker instance.
pub const INSTANCE_LOG_NAME: &str = "test_ec2.log";
/// Diagnostic log written by the processing program.
pub const APP_LOG_NAME: &str = "test_app.log";

/// Resolves every well-known key from a deploy prefix and a runtime prefix.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PipelineLayout {
    deploy_prefix: String,
    runtime_prefix: String,
}

impl Default for PipelineLayout {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX, DEFAULT_PREFIX)
    }
}

impl PipelineLayout {
    /// Creates a layout. Leading and trailing slashes on either prefix are
    /// ignored.
    #[must_use]
    pub fn new(deploy_prefix: &str, runtime_prefix: &str) -> Self {
        Self {
            deploy_prefix: deploy_prefix.trim().trim_matches('/').to_owned(),
            runtime_prefix: runtime_prefix.trim().trim_matches('/').to_owned(),
        }
    }

    /// `<deploy-prefix>/lambda_code.zip`
    #[must_use]
    pub fn code_artifact_key(&self) -> String {
        format!("{}/{CODE_ARTIFACT_NAME}", self.deploy_prefix)
    }

    /// `<runtime-prefix>/input/test.zip`
    #[must_use]
    pub fn input_key(&self) -> String {
        format!("{}/input/{RESULT_NAME}", self.runtime_prefix)
    }

    /// `<runtime-prefix>/output/`
    #[must_use]
    pub fn output_prefix(&self) -> String {
        format!("{}/output/", self.runtime_prefix)
    }

    /// `<runtime-prefix>/output/test.zip`
    #[must_use]
    pub fn result_key(&self) -> String {
        format!("{}{RESULT_NAME}", self.output_prefix())
    }

    /// Both diagnostic log keys under the output prefix.
    #[must_use]
    pub fn diagnostic_keys(&self) -> [String; 2] {
        let prefix = self.output_prefix();
        [
            format!("{prefix}{INSTANCE_LOG_NAME}"),
            format!("{prefix}{APP_LOG_NAME}"),
        ]
    }

    /// Every output key cleared before a verification pass.
    #[must_use]
    pub fn cleanup_keys(&self) -> Vec<String> {
        let [instance_log, app_log] = self.diagnostic_keys();
        vec![self.result_key(), instance_log, app_log]
    }
}
