//! Core library for the `apprunner` deployment and verification tool.
//!
//! The crate provisions a demo data pipeline from an infrastructure
//! template, deploys a code bundle to the pipeline's function, and verifies
//! the pipeline end to end by uploading a synthetic input and polling for
//! its output. Remote services sit behind the traits in [`backend`]; the
//! [`aws`] module provides the production adapters and [`test_support`]
//! in-memory doubles.

pub mod aws;
pub mod backend;
pub mod config;
pub mod deploy;
pub mod error;
pub mod layout;
pub mod package;
pub mod poll;
pub mod run;
pub mod stack;
pub mod test_support;
pub mod verify;

pub use aws::AwsSession;
pub use backend::{
    DeploymentTarget, FunctionApi, ObjectLocator, ObjectStore, ObjectSummary, StackApi,
    StackDescriptor, StackDescriptorBuilder, StackStatus,
};
pub use config::{ConfigError, RunnerConfig};
pub use deploy::{CodeDeployer, DeployError};
pub use error::ErrorKind;
pub use layout::PipelineLayout;
pub use package::{ArtifactBundle, PackageError, pack, pack_bytes};
pub use poll::{PollPolicy, Polled, Step, poll_until};
pub use run::{OutputKeys, RunError, RunOrchestrator, RunReport, RunRequest, resolve_target};
pub use stack::{Provisioner, StackError, StackOutputMap};
pub use verify::{Verifier, VerifyError, VerifyReport, synthetic_input};
