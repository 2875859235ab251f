//! Code deployment: upload a bundle and repoint the compute function at it.
//!
//! Both steps always run. A failure after the upload leaves the new artifact
//! in the bucket with the function still on its previous code; rerunning the
//! whole deploy re-uploads before repointing, so no partial state is resumed.

use thiserror::Error;
use tracing::info;

use crate::backend::{
    DeploymentTarget, FunctionApi, FunctionApiError, ObjectLocator, ObjectStore, StoreError,
};
use crate::error::ErrorKind;
use crate::layout::PipelineLayout;
use crate::package::ArtifactBundle;

/// Errors raised while deploying code.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum DeployError {
    /// Uploading the artifact, or reaching the compute platform, failed.
    #[error("code transfer failed: {message}")]
    Transfer {
        /// Underlying failure description.
        message: String,
    },
    /// The compute platform refused to repoint the function.
    #[error("function {function} rejected the update: {message}")]
    UpdateRejected {
        /// Function that was being updated.
        function: String,
        /// Message returned by the platform.
        message: String,
    },
}

impl DeployError {
    /// Caller-visible failure category.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Transfer { .. } => ErrorKind::TransferError,
            Self::UpdateRejected { .. } => ErrorKind::UpdateRejected,
        }
    }
}

impl From<StoreError> for DeployError {
    fn from(value: StoreError) -> Self {
        Self::Transfer {
            message: value.to_string(),
        }
    }
}

impl From<FunctionApiError> for DeployError {
    fn from(value: FunctionApiError) -> Self {
        match value {
            FunctionApiError::Rejected { function, message } => {
                Self::UpdateRejected { function, message }
            }
            FunctionApiError::Transport { message } => Self::Transfer { message },
        }
    }
}

/// Uploads code artifacts and points functions at them.
#[derive(Debug)]
pub struct CodeDeployer<S, F> {
    store: S,
    functions: F,
    layout: PipelineLayout,
}

impl<S, F> CodeDeployer<S, F>
where
    S: ObjectStore,
    F: FunctionApi,
{
    /// Creates a deployer that writes artifacts at the layout's code key.
    #[must_use]
    pub const fn new(store: S, functions: F, layout: PipelineLayout) -> Self {
        Self {
            store,
            functions,
            layout,
        }
    }

    /// Uploads `bundle` to the target bucket and repoints the target function.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::Transfer`] when the upload or the platform call
    /// cannot complete and [`DeployError::UpdateRejected`] when the platform
    /// refuses the repoint. Neither is retried.
    pub async fn deploy(
        &self,
        bundle: &ArtifactBundle,
        target: &DeploymentTarget,
    ) -> Result<ObjectLocator, DeployError> {
        let locator = ObjectLocator::new(&target.bucket_name, self.layout.code_artifact_key());
        self.store.put(&locator, bundle.as_bytes()).await?;
        info!(bucket = %locator.container, key = %locator.key, "uploaded code artifact");

        self.functions
            .set_code_source(&target.function_name, &locator.container, &locator.key)
            .await?;
        info!(function = %target.function_name, "function repointed at new code");

        Ok(locator)
    }
}
