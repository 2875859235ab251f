//! Narrow platform interfaces used by the orchestration core.
//!
//! Three capability sets cover everything a run needs: infrastructure
//! templates ([`StackApi`]), object storage ([`ObjectStore`]) and compute
//! function code updates ([`FunctionApi`]). Each platform provides one
//! adapter per trait; the core never sees vendor types.

use std::future::Future;
use std::pin::Pin;

use serde::Serialize;
use thiserror::Error;

/// Capability that allows a template to create IAM resources with custom names.
pub const CAPABILITY_NAMED_IAM: &str = "CAPABILITY_NAMED_IAM";

/// Infrastructure unit submitted for provisioning.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StackDescriptor {
    /// Stack name; must be unique on the platform.
    pub name: String,
    /// Opaque template text.
    pub template_body: String,
    /// Capabilities acknowledged on submission.
    pub capabilities: Vec<String>,
}

impl StackDescriptor {
    /// Starts a builder for a [`StackDescriptor`].
    #[must_use]
    pub fn builder() -> StackDescriptorBuilder {
        StackDescriptorBuilder::new()
    }

    /// Validates the descriptor, returning a descriptive error when a required
    /// field is missing.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Validation`] when the name or template is empty.
    pub fn validate(&self) -> Result<(), BackendError> {
        if self.name.is_empty() {
            return Err(BackendError::Validation("name".to_owned()));
        }
        if self.template_body.trim().is_empty() {
            return Err(BackendError::Validation("template_body".to_owned()));
        }
        if self.capabilities.iter().any(String::is_empty) {
            return Err(BackendError::Validation("capabilities".to_owned()));
        }
        Ok(())
    }
}

/// Builder for [`StackDescriptor`] that defers trimming and validation to
/// construction.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct StackDescriptorBuilder {
    name: String,
    template_body: String,
    capabilities: Vec<String>,
}

impl StackDescriptorBuilder {
    /// Creates an empty builder; fields must be populated before build.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the stack name.
    #[must_use]
    pub fn name(mut self, value: impl Into<String>) -> Self {
        self.name = value.into();
        self
    }

    /// Sets the template body. The body is kept verbatim.
    #[must_use]
    pub fn template_body(mut self, value: impl Into<String>) -> Self {
        self.template_body = value.into();
        self
    }

    /// Adds an acknowledged capability.
    #[must_use]
    pub fn capability(mut self, value: impl Into<String>) -> Self {
        self.capabilities.push(value.into());
        self
    }

    /// Builds and validates the [`StackDescriptor`], trimming the name and
    /// capability strings.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Validation`] when a required field is empty.
    pub fn build(self) -> Result<StackDescriptor, BackendError> {
        let descriptor = StackDescriptor {
            name: self.name.trim().to_owned(),
            template_body: self.template_body,
            capabilities: self
                .capabilities
                .iter()
                .map(|value| value.trim().to_owned())
                .collect(),
        };
        descriptor.validate()?;
        Ok(descriptor)
    }
}

/// Lifecycle phase derived from a raw stack status code.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StackPhase {
    /// The platform is still working on the stack.
    InProgress,
    /// The stack was created successfully.
    Succeeded,
    /// The stack reached a state it will not recover from on its own.
    Failed,
}

/// Status snapshot reported by the platform.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StackStatus {
    /// Raw status code, for example `CREATE_IN_PROGRESS`.
    pub code: String,
    /// Optional explanation supplied by the platform.
    pub reason: Option<String>,
}

impl StackStatus {
    /// Creates a status without a reason.
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            reason: None,
        }
    }

    /// Attaches the platform's reason text.
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Classifies the status code for a stack being created.
    ///
    /// `CREATE_COMPLETE` is the only success state. Rollbacks that have
    /// finished, deletions and any `*_FAILED` code are failures. Everything
    /// else, including unfamiliar codes, counts as in progress so the bounded
    /// poll loop decides when to give up.
    #[must_use]
    pub fn phase(&self) -> StackPhase {
        match self.code.as_str() {
            "CREATE_COMPLETE" => StackPhase::Succeeded,
            "ROLLBACK_COMPLETE" | "DELETE_COMPLETE" => StackPhase::Failed,
            code if code.ends_with("_FAILED") => StackPhase::Failed,
            _ => StackPhase::InProgress,
        }
    }
}

/// One declared stack output.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StackOutput {
    /// Output key.
    pub key: String,
    /// Output value.
    pub value: String,
}

impl StackOutput {
    /// Creates an output pair.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Identifies a remote object.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ObjectLocator {
    /// Bucket or container name.
    pub container: String,
    /// Hierarchical, path-like key.
    pub key: String,
}

impl ObjectLocator {
    /// Creates a locator.
    #[must_use]
    pub fn new(container: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            key: key.into(),
        }
    }
}

/// Listing entry returned by [`ObjectStore::list`].
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ObjectSummary {
    /// Full object key.
    pub key: String,
    /// Size in bytes; `0` marks a placeholder or an incomplete write.
    pub size: u64,
}

impl ObjectSummary {
    /// Creates a summary.
    #[must_use]
    pub fn new(key: impl Into<String>, size: u64) -> Self {
        Self {
            key: key.into(),
            size,
        }
    }

    /// Final `/`-separated segment of the key.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(self.key.as_str())
    }
}

/// Binds a compute function to the bucket its code is sourced from.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct DeploymentTarget {
    /// Name of the compute function to repoint.
    pub function_name: String,
    /// Bucket holding the code artifact.
    pub bucket_name: String,
}

impl DeploymentTarget {
    /// Creates a target.
    #[must_use]
    pub fn new(function_name: impl Into<String>, bucket_name: impl Into<String>) -> Self {
        Self {
            function_name: function_name.into(),
            bucket_name: bucket_name.into(),
        }
    }
}

/// Errors raised while building backend requests.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum BackendError {
    /// Raised when a request is missing a required field.
    #[error("missing or empty field: {0}")]
    Validation(String),
}

/// Errors raised by [`StackApi`] adapters.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum StackApiError {
    /// A stack with the same name already exists.
    #[error("stack {stack} already exists")]
    AlreadyExists {
        /// Conflicting stack name.
        stack: String,
    },
    /// The stack is unknown to the platform.
    #[error("stack {stack} does not exist")]
    NotFound {
        /// Requested stack name.
        stack: String,
    },
    /// The platform understood the request and refused it.
    #[error("request rejected: {message}")]
    Rejected {
        /// Message returned by the platform.
        message: String,
    },
    /// The request never got a platform answer (network, credentials).
    #[error("transport failure: {message}")]
    Transport {
        /// Underlying failure description.
        message: String,
    },
}

/// Errors raised by [`ObjectStore`] adapters.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum StoreError {
    /// Network, authentication, or service failure while moving data.
    #[error("{operation} on bucket {container} failed: {message}")]
    Transfer {
        /// Operation that failed (`put`, `list`, `delete`).
        operation: String,
        /// Bucket the operation targeted.
        container: String,
        /// Underlying failure description.
        message: String,
    },
}

impl StoreError {
    /// Builds a [`StoreError::Transfer`].
    #[must_use]
    pub fn transfer(operation: &str, container: &str, message: impl Into<String>) -> Self {
        Self::Transfer {
            operation: operation.to_owned(),
            container: container.to_owned(),
            message: message.into(),
        }
    }
}

/// Errors raised by [`FunctionApi`] adapters.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum FunctionApiError {
    /// The platform refused the code update (unknown function, bad key).
    #[error("function {function} rejected the code update: {message}")]
    Rejected {
        /// Function that refused the update.
        function: String,
        /// Message returned by the platform.
        message: String,
    },
    /// The request never got a platform answer (network, credentials).
    #[error("transport failure: {message}")]
    Transport {
        /// Underlying failure description.
        message: String,
    },
}

/// Future returned by backend operations.
pub type BackendFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Infrastructure template submission and status queries.
pub trait StackApi {
    /// Submits the template. Submitting a name that already exists must fail
    /// with [`StackApiError::AlreadyExists`].
    fn submit_template<'a>(
        &'a self,
        descriptor: &'a StackDescriptor,
    ) -> BackendFuture<'a, (), StackApiError>;

    /// Returns the current status of the named stack.
    fn stack_status<'a>(&'a self, name: &'a str) -> BackendFuture<'a, StackStatus, StackApiError>;

    /// Returns the outputs declared by the named stack.
    fn describe_outputs<'a>(
        &'a self,
        name: &'a str,
    ) -> BackendFuture<'a, Vec<StackOutput>, StackApiError>;
}

/// Object storage used to ship code and exchange pipeline data.
///
/// Adapters never retry; retry policy stays with the caller.
pub trait ObjectStore {
    /// Writes `body` at `locator`, replacing any existing object.
    fn put<'a>(&'a self, locator: &'a ObjectLocator, body: &'a [u8])
    -> BackendFuture<'a, (), StoreError>;

    /// Lists every object under `prefix`. Returns an empty list when nothing
    /// matches.
    fn list<'a>(
        &'a self,
        container: &'a str,
        prefix: &'a str,
    ) -> BackendFuture<'a, Vec<ObjectSummary>, StoreError>;

    /// Deletes `keys`. Keys that do not exist are not an error.
    fn delete<'a>(
        &'a self,
        container: &'a str,
        keys: &'a [String],
    ) -> BackendFuture<'a, (), StoreError>;
}

/// Compute function code management.
pub trait FunctionApi {
    /// Points `function` at the code artifact stored at `bucket`/`key`.
    fn set_code_source<'a>(
        &'a self,
        function: &'a str,
        bucket: &'a str,
        key: &'a str,
    ) -> BackendFuture<'a, (), FunctionApiError>;
}
