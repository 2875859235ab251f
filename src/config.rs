//! Configuration loading via `ortho-config`.

use std::ffi::OsString;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::backend::{CAPABILITY_NAMED_IAM, DeploymentTarget, StackDescriptor};
use crate::layout::{DEFAULT_PREFIX, PipelineLayout};
use crate::package::read_ambient;
use crate::poll::PollPolicy;
use crate::run::OutputKeys;

const CONFIG_FILE: &str = "apprunner.toml";
const SECTION: &str = "apprunner";

/// Run settings merged from defaults, configuration files, and environment
/// variables prefixed with `APP_RUNNER_`.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "APP_RUNNER",
    discovery(
        app_name = "apprunner",
        env_var = "APP_RUNNER_CONFIG_PATH",
        config_file_name = "apprunner.toml",
        dotfile_name = ".apprunner.toml",
        project_file_name = "apprunner.toml"
    )
)]
pub struct RunnerConfig {
    /// Named credentials profile. Falls back to the default provider chain.
    pub profile: Option<String>,
    /// Region override. Falls back to the profile or environment region.
    pub region: Option<String>,
    /// Name of the stack to create.
    #[ortho_config(default = "demo".to_owned())]
    pub stack_name: String,
    /// Path to the infrastructure template.
    #[ortho_config(default = "deploy.yaml".to_owned())]
    pub template_path: String,
    /// Comma-separated capabilities acknowledged on stack submission.
    #[ortho_config(default = CAPABILITY_NAMED_IAM.to_owned())]
    pub capabilities: String,
    /// Seconds between stack status checks.
    #[ortho_config(default = 15)]
    pub stack_poll_delay_secs: u64,
    /// Maximum number of stack status checks.
    #[ortho_config(default = 20)]
    pub stack_max_attempts: u32,
    /// Seconds between pipeline output checks.
    #[ortho_config(default = 15)]
    pub poll_delay_secs: u64,
    /// Maximum number of pipeline output checks.
    #[ortho_config(default = 20)]
    pub max_attempts: u32,
    /// Key prefix for the uploaded code artifact.
    #[ortho_config(default = DEFAULT_PREFIX.to_owned())]
    pub deploy_prefix: String,
    /// Key prefix for pipeline inputs and outputs.
    #[ortho_config(default = DEFAULT_PREFIX.to_owned())]
    pub runtime_prefix: String,
    /// Stack output holding the bucket ARN.
    #[ortho_config(default = "DemoBucketArn".to_owned())]
    pub bucket_output_key: String,
    /// Stack output holding the function ARN.
    #[ortho_config(default = "DemoLambdaFunctionArn".to_owned())]
    pub function_output_key: String,
    /// Bucket used by `deploy` and `verify` when no stack is provisioned.
    pub bucket_name: Option<String>,
    /// Function used by `deploy` when no stack is provisioned.
    pub function_name: Option<String>,
    /// Comma-separated code sources, each `path` or `name=path`.
    #[ortho_config(default = "ec2_init.sh,ec2_run.py".to_owned())]
    pub code_sources: String,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }

    fn missing(&self) -> ConfigError {
        ConfigError::MissingField(format!(
            "missing {}: set {} or add {} to [{SECTION}] in {CONFIG_FILE}",
            self.description, self.env_var, self.toml_key
        ))
    }
}

const STACK_NAME: FieldMetadata =
    FieldMetadata::new("stack name", "APP_RUNNER_STACK_NAME", "stack_name");
const TEMPLATE_PATH: FieldMetadata = FieldMetadata::new(
    "infrastructure template path",
    "APP_RUNNER_TEMPLATE_PATH",
    "template_path",
);
const DEPLOY_PREFIX: FieldMetadata = FieldMetadata::new(
    "code artifact prefix",
    "APP_RUNNER_DEPLOY_PREFIX",
    "deploy_prefix",
);
const RUNTIME_PREFIX: FieldMetadata = FieldMetadata::new(
    "pipeline data prefix",
    "APP_RUNNER_RUNTIME_PREFIX",
    "runtime_prefix",
);
const BUCKET_OUTPUT_KEY: FieldMetadata = FieldMetadata::new(
    "bucket stack output key",
    "APP_RUNNER_BUCKET_OUTPUT_KEY",
    "bucket_output_key",
);
const FUNCTION_OUTPUT_KEY: FieldMetadata = FieldMetadata::new(
    "function stack output key",
    "APP_RUNNER_FUNCTION_OUTPUT_KEY",
    "function_output_key",
);
const CODE_SOURCES: FieldMetadata =
    FieldMetadata::new("code sources", "APP_RUNNER_CODE_SOURCES", "code_sources");
const BUCKET_NAME: FieldMetadata =
    FieldMetadata::new("bucket name", "APP_RUNNER_BUCKET_NAME", "bucket_name");
const FUNCTION_NAME: FieldMetadata =
    FieldMetadata::new("function name", "APP_RUNNER_FUNCTION_NAME", "function_name");

impl RunnerConfig {
    /// Loads configuration without attempting to parse CLI arguments. Values
    /// still merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([OsString::from("apprunner")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation. Error messages name the environment
    /// variable and configuration key that supply each value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is blank
    /// (a prefix made only of slashes counts as blank) and [`ConfigError::InvalidValue`] when an attempt budget is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require(&self.stack_name, &STACK_NAME)?;
        require(&self.template_path, &TEMPLATE_PATH)?;
        require_prefix(&self.deploy_prefix, &DEPLOY_PREFIX)?;
        require_prefix(&self.runtime_prefix, &RUNTIME_PREFIX)?;
        require(&self.bucket_output_key, &BUCKET_OUTPUT_KEY)?;
        require(&self.function_output_key, &FUNCTION_OUTPUT_KEY)?;
        require(&self.code_sources, &CODE_SOURCES)?;
        self.stack_policy()?;
        self.verify_policy()?;
        Ok(())
    }

    /// Poll policy for stack status checks.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] when the attempt budget is zero.
    pub fn stack_policy(&self) -> Result<PollPolicy, ConfigError> {
        PollPolicy::from_secs(self.stack_poll_delay_secs, self.stack_max_attempts).map_err(|_| {
            ConfigError::InvalidValue(String::from(
                "stack_max_attempts must be greater than zero (APP_RUNNER_STACK_MAX_ATTEMPTS)",
            ))
        })
    }

    /// Poll policy for pipeline output checks.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] when the attempt budget is zero.
    pub fn verify_policy(&self) -> Result<PollPolicy, ConfigError> {
        PollPolicy::from_secs(self.poll_delay_secs, self.max_attempts).map_err(|_| {
            ConfigError::InvalidValue(String::from(
                "max_attempts must be greater than zero (APP_RUNNER_MAX_ATTEMPTS)",
            ))
        })
    }

    /// Well-known key layout derived from the configured prefixes.
    #[must_use]
    pub fn layout(&self) -> PipelineLayout {
        PipelineLayout::new(&self.deploy_prefix, &self.runtime_prefix)
    }

    /// Stack outputs that locate the bucket and function.
    #[must_use]
    pub fn output_keys(&self) -> OutputKeys {
        OutputKeys::new(
            self.bucket_output_key.trim(),
            self.function_output_key.trim(),
        )
    }

    /// Non-empty capabilities in configuration order.
    #[must_use]
    pub fn capability_list(&self) -> Vec<String> {
        split_list(&self.capabilities)
            .map(str::to_owned)
            .collect()
    }

    /// Code bundle entries as `(logical name, source path)` pairs.
    ///
    /// An entry written as `name=path` uses `name` inside the bundle; a bare
    /// path uses its file name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] when an entry has no usable name
    /// and [`ConfigError::MissingField`] when no entries are configured.
    pub fn code_entries(&self) -> Result<Vec<(String, Utf8PathBuf)>, ConfigError> {
        let mut entries = Vec::new();
        for item in split_list(&self.code_sources) {
            let (name, path) = item.split_once('=').map_or_else(
                || {
                    let bare = Utf8Path::new(item);
                    (bare.file_name().unwrap_or_default(), bare)
                },
                |(logical, source)| (logical.trim(), Utf8Path::new(source.trim())),
            );
            if name.is_empty() || path.as_str().is_empty() {
                return Err(ConfigError::InvalidValue(format!(
                    "code source `{item}` needs a file name (APP_RUNNER_CODE_SOURCES)"
                )));
            }
            entries.push((name.to_owned(), path.to_owned()));
        }
        if entries.is_empty() {
            return Err(CODE_SOURCES.missing());
        }
        Ok(entries)
    }

    /// Reads the template and builds the stack descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::TemplateRead`] when the template cannot be read
    /// and [`ConfigError::InvalidValue`] when the descriptor is incomplete.
    pub fn descriptor(&self) -> Result<StackDescriptor, ConfigError> {
        let path = Utf8Path::new(self.template_path.trim());
        let bytes = read_ambient(path).map_err(|message| ConfigError::TemplateRead {
            path: path.to_owned(),
            message,
        })?;
        let body = String::from_utf8(bytes).map_err(|err| ConfigError::TemplateRead {
            path: path.to_owned(),
            message: err.to_string(),
        })?;

        self.capability_list()
            .into_iter()
            .fold(
                StackDescriptor::builder()
                    .name(&self.stack_name)
                    .template_body(body),
                |builder, capability| builder.capability(capability),
            )
            .build()
            .map_err(|err| ConfigError::InvalidValue(err.to_string()))
    }

    /// Bucket for stand-alone `deploy` and `verify` runs.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when neither the override nor
    /// configuration supplies a bucket.
    pub fn bucket(&self, override_value: Option<&str>) -> Result<String, ConfigError> {
        pick(override_value, self.bucket_name.as_deref(), &BUCKET_NAME)
    }

    /// Target for a stand-alone `deploy` run.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when the bucket or function is
    /// not supplied.
    pub fn deployment_target(
        &self,
        bucket_override: Option<&str>,
        function_override: Option<&str>,
    ) -> Result<DeploymentTarget, ConfigError> {
        let bucket = self.bucket(bucket_override)?;
        let function = pick(
            function_override,
            self.function_name.as_deref(),
            &FUNCTION_NAME,
        )?;
        Ok(DeploymentTarget::new(function, bucket))
    }
}

fn require(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(metadata.missing());
    }
    Ok(())
}

// Layout keys drop surrounding slashes, so `/` would leave an empty prefix.
fn require_prefix(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
    if value.trim().trim_matches('/').is_empty() {
        return Err(metadata.missing());
    }
    Ok(())
}

fn pick(
    override_value: Option<&str>,
    configured: Option<&str>,
    metadata: &FieldMetadata,
) -> Result<String, ConfigError> {
    override_value
        .or(configured)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| metadata.missing())
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|item| !item.is_empty())
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates a configured value is present but unusable.
    #[error("invalid configuration value: {0}")]
    InvalidValue(String),
    /// Raised when the infrastructure template cannot be read.
    #[error("failed to read template `{path}`: {message}")]
    TemplateRead {
        /// Template path as configured.
        path: Utf8PathBuf,
        /// Underlying error message.
        message: String,
    },
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
