//! End-to-end verification of the deployed pipeline.
//!
//! A pass clears earlier outputs, uploads a synthetic input (the upload itself
//! triggers the pipeline), then polls the output prefix. A result artifact is
//! authoritative success even when a diagnostic log sits beside it; a log on
//! its own means the pipeline ran without producing output. Zero-byte objects
//! are in-flight writes and never count as a signal.

use serde::Serialize;
use thiserror::Error;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use crate::backend::{ObjectLocator, ObjectStore, ObjectSummary, StoreError};
use crate::error::ErrorKind;
use crate::layout::{APP_LOG_NAME, INSTANCE_LOG_NAME, PipelineLayout, RESULT_NAME};
use crate::package::{ArtifactBundle, PackageError, pack_bytes};
use crate::poll::{PollPolicy, Polled, Step, poll_until};

/// Entry name of the synthetic input table.
pub const SYNTHETIC_INPUT_NAME: &str = "test.csv";
/// Contents of the synthetic input table.
pub const SYNTHETIC_INPUT_CSV: &str = "employee_id,salary\n1,30000\n2,45000\n3,80000";

/// Errors raised by a verification pass.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum VerifyError {
    /// Clearing, uploading, or listing objects failed.
    #[error(transparent)]
    Transfer(#[from] StoreError),
    /// A diagnostic log appeared without a result artifact.
    #[error("pipeline wrote {log_key} but no result artifact after {attempts} checks")]
    FailedWithPartialSignal {
        /// Diagnostic log that was observed.
        log_key: String,
        /// Number of checks performed.
        attempts: u32,
    },
    /// Neither signal appeared within the attempt budget.
    #[error("no pipeline output after {attempts} checks")]
    TimedOut {
        /// Number of checks performed.
        attempts: u32,
    },
}

impl VerifyError {
    /// Caller-visible failure category.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Transfer(_) => ErrorKind::TransferError,
            Self::FailedWithPartialSignal { .. } => ErrorKind::FailedWithPartialSignal,
            Self::TimedOut { .. } => ErrorKind::TimedOut,
        }
    }
}

/// What a single output listing says about the pipeline.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Signal {
    /// A non-empty result artifact is present.
    Result {
        /// Key of the result artifact.
        key: String,
    },
    /// A non-empty diagnostic log is present and no result artifact is.
    DiagnosticLog {
        /// Key of the first diagnostic log seen.
        key: String,
    },
    /// Nothing conclusive yet.
    Nothing,
}

/// Classifies an output listing by each object's trailing path segment.
///
/// Zero-size objects are skipped. A result artifact takes precedence over any
/// diagnostic log in the same listing.
#[must_use]
pub fn classify(objects: &[ObjectSummary]) -> Signal {
    let mut log = None;
    for object in objects.iter().filter(|object| object.size > 0) {
        match object.file_name() {
            RESULT_NAME => {
                return Signal::Result {
                    key: object.key.clone(),
                };
            }
            INSTANCE_LOG_NAME | APP_LOG_NAME if log.is_none() => {
                log = Some(object.key.clone());
            }
            _ => {}
        }
    }
    log.map_or(Signal::Nothing, |key| Signal::DiagnosticLog { key })
}

/// Builds the fixed single-entry input archive.
///
/// # Errors
///
/// Returns [`PackageError::Archive`] if the archive cannot be written.
pub fn synthetic_input() -> Result<ArtifactBundle, PackageError> {
    pack_bytes(&[(SYNTHETIC_INPUT_NAME, SYNTHETIC_INPUT_CSV)])
}

/// Successful verification details.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct VerifyReport {
    /// Key of the result artifact that ended the pass.
    pub result_key: String,
    /// Number of output checks performed.
    pub attempts: u32,
}

/// Drives one input through the pipeline and waits for its verdict.
///
/// Holds no state between calls, so a pass can be retried freely.
#[derive(Debug)]
pub struct Verifier<S> {
    store: S,
    layout: PipelineLayout,
    policy: PollPolicy,
}

impl<S: ObjectStore> Verifier<S> {
    /// Creates a verifier polling according to `policy`.
    #[must_use]
    pub const fn new(store: S, layout: PipelineLayout, policy: PollPolicy) -> Self {
        Self {
            store,
            layout,
            policy,
        }
    }

    /// Runs a verification pass against `bucket` using `input` as the trigger.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::Transfer`] on store failures,
    /// [`VerifyError::FailedWithPartialSignal`] when only a diagnostic log
    /// appears, and [`VerifyError::TimedOut`] when the budget is exhausted.
    pub async fn verify(
        &self,
        bucket: &str,
        input: &ArtifactBundle,
    ) -> Result<VerifyReport, VerifyError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("verify", %run_id, bucket);
        self.run_pass(bucket, input).instrument(span).await
    }

    async fn run_pass(
        &self,
        bucket: &str,
        input: &ArtifactBundle,
    ) -> Result<VerifyReport, VerifyError> {
        let stale = self.layout.cleanup_keys();
        self.store.delete(bucket, &stale).await?;
        info!(keys = stale.len(), "cleared previous outputs");

        let trigger = ObjectLocator::new(bucket, self.layout.input_key());
        self.store.put(&trigger, input.as_bytes()).await?;
        info!(key = %trigger.key, "uploaded pipeline input");

        let output_prefix = self.layout.output_prefix();
        let polled = poll_until(self.policy, |attempt| {
            let prefix = output_prefix.as_str();
            async move {
                let objects = self.store.list(bucket, prefix).await?;
                let signal = classify(&objects);
                Ok::<_, VerifyError>(match signal {
                    Signal::Nothing => {
                        info!(attempt, "waiting for pipeline output");
                        Step::Pending(())
                    }
                    conclusive => Step::Done(conclusive),
                })
            }
        })
        .await?;

        match polled {
            Polled::Done {
                value: Signal::Result { key },
                attempts,
            } => {
                info!(%key, attempts, "pipeline produced its result");
                Ok(VerifyReport {
                    result_key: key,
                    attempts,
                })
            }
            Polled::Done {
                value: Signal::DiagnosticLog { key },
                attempts,
            } => {
                warn!(%key, attempts, "pipeline wrote a log but no result");
                Err(VerifyError::FailedWithPartialSignal {
                    log_key: key,
                    attempts,
                })
            }
            Polled::Done {
                value: Signal::Nothing,
                attempts,
            }
            | Polled::Exhausted { attempts, .. } => {
                warn!(attempts, "pipeline produced no output in time");
                Err(VerifyError::TimedOut { attempts })
            }
        }
    }
}
