//! Failure classification shared by every stage of a run.
//!
//! Each stage error maps onto exactly one [`ErrorKind`]. Automated callers use
//! the kind (or its exit code) to tell "infrastructure never came up" apart
//! from "the pipeline ran but produced no output" and from "nothing happened
//! within the time budget".

use std::fmt;

use serde::Serialize;

/// Caller-visible failure categories.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Configuration was missing or invalid before any remote call was made.
    Config,
    /// A local artifact source could not be read.
    SourceMissing,
    /// A network or authentication failure talking to a remote service.
    TransferError,
    /// The stack reached a failure terminal state or was refused.
    ProvisioningFailed,
    /// The stack never left its in-progress state within the attempt budget.
    ProvisioningTimedOut,
    /// A stack output required by a later stage was absent.
    OutputMissing,
    /// The compute platform refused to repoint the function.
    UpdateRejected,
    /// The pipeline wrote a diagnostic log but no result artifact.
    FailedWithPartialSignal,
    /// The pipeline produced neither signal within the attempt budget.
    TimedOut,
    /// Anything not covered above (malformed archives, duplicate names).
    Other,
}

impl ErrorKind {
    /// Process exit code reported by the CLI for this kind.
    #[must_use]
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::Other => 1,
            Self::Config => 2,
            Self::SourceMissing => 10,
            Self::TransferError => 11,
            Self::ProvisioningFailed => 12,
            Self::ProvisioningTimedOut => 13,
            Self::OutputMissing => 14,
            Self::UpdateRejected => 15,
            Self::FailedWithPartialSignal => 16,
            Self::TimedOut => 17,
        }
    }

    /// Stable snake-case tag for logs and machine-readable reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::SourceMissing => "source_missing",
            Self::TransferError => "transfer_error",
            Self::ProvisioningFailed => "provisioning_failed",
            Self::ProvisioningTimedOut => "provisioning_timed_out",
            Self::OutputMissing => "output_missing",
            Self::UpdateRejected => "update_rejected",
            Self::FailedWithPartialSignal => "failed_with_partial_signal",
            Self::TimedOut => "timed_out",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}
