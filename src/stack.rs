//! Stack provisioning: submit a template and wait for a terminal state.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::backend::{StackApi, StackApiError, StackDescriptor, StackOutput, StackPhase, StackStatus};
use crate::error::ErrorKind;
use crate::poll::{PollPolicy, Polled, Step, poll_until};

/// Errors raised while provisioning a stack or reading its outputs.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum StackError {
    /// The platform already has a stack with this name.
    #[error("stack {stack} already exists; provisioning is not idempotent")]
    StackAlreadyExists {
        /// Conflicting stack name.
        stack: String,
    },
    /// The template submission failed.
    #[error("failed to submit stack {stack}: {source}")]
    Submit {
        /// Stack being submitted.
        stack: String,
        /// Adapter failure.
        #[source]
        source: StackApiError,
    },
    /// A status or output query failed.
    #[error("failed to query stack {stack}: {source}")]
    Query {
        /// Stack being queried.
        stack: String,
        /// Adapter failure.
        #[source]
        source: StackApiError,
    },
    /// The stack reached a failure terminal state.
    #[error("stack {stack} failed with status {status}{}", format_reason(.reason.as_deref()))]
    ProvisioningFailed {
        /// Stack name.
        stack: String,
        /// Terminal status code.
        status: String,
        /// Reason reported by the platform.
        reason: Option<String>,
    },
    /// The attempt budget ran out while the stack was still in progress.
    #[error("stack {stack} not ready after {attempts} status checks (last status {})", .last_status.as_deref().unwrap_or("unknown"))]
    ProvisioningTimedOut {
        /// Stack name.
        stack: String,
        /// Number of status checks performed.
        attempts: u32,
        /// Status observed on the final check.
        last_status: Option<String>,
    },
    /// The platform declared the same output key twice.
    #[error("stack {stack} declares output {key} more than once")]
    DuplicateOutput {
        /// Stack name.
        stack: String,
        /// Repeated output key.
        key: String,
    },
    /// A consumer asked for an output the stack does not declare.
    #[error("stack output {key} is missing")]
    OutputMissing {
        /// Requested output key.
        key: String,
    },
}

fn format_reason(reason: Option<&str>) -> String {
    reason.map(|text| format!(": {text}")).unwrap_or_default()
}

impl StackError {
    /// Caller-visible failure category.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Submit {
                source: StackApiError::Transport { .. },
                ..
            }
            | Self::Query {
                source: StackApiError::Transport { .. },
                ..
            } => ErrorKind::TransferError,
            Self::StackAlreadyExists { .. }
            | Self::Submit { .. }
            | Self::Query { .. }
            | Self::ProvisioningFailed { .. }
            | Self::DuplicateOutput { .. } => ErrorKind::ProvisioningFailed,
            Self::ProvisioningTimedOut { .. } => ErrorKind::ProvisioningTimedOut,
            Self::OutputMissing { .. } => ErrorKind::OutputMissing,
        }
    }
}

/// Read-only map of stack outputs.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct StackOutputMap {
    outputs: BTreeMap<String, String>,
}

impl StackOutputMap {
    /// Builds a map, rejecting repeated keys.
    ///
    /// # Errors
    ///
    /// Returns [`StackError::DuplicateOutput`] when a key appears twice.
    pub fn from_outputs(
        stack: &str,
        outputs: impl IntoIterator<Item = StackOutput>,
    ) -> Result<Self, StackError> {
        let mut map = BTreeMap::new();
        for output in outputs {
            match map.entry(output.key) {
                Entry::Occupied(entry) => {
                    return Err(StackError::DuplicateOutput {
                        stack: stack.to_owned(),
                        key: entry.key().clone(),
                    });
                }
                Entry::Vacant(entry) => {
                    entry.insert(output.value);
                }
            }
        }
        Ok(Self { outputs: map })
    }

    /// Returns the value for `key`, if present.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.outputs.get(key).map(String::as_str)
    }

    /// Returns the value for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StackError::OutputMissing`] when the stack does not declare
    /// the key.
    pub fn require(&self, key: &str) -> Result<&str, StackError> {
        self.get(key).ok_or_else(|| StackError::OutputMissing {
            key: key.to_owned(),
        })
    }

    /// Iterates over outputs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.outputs
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Number of outputs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    /// Returns `true` when the stack declares no outputs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}

/// Submits stacks and drives them to a terminal state.
#[derive(Debug)]
pub struct Provisioner<A> {
    api: A,
    policy: PollPolicy,
}

impl<A: StackApi> Provisioner<A> {
    /// Creates a provisioner that polls according to `policy`.
    #[must_use]
    pub const fn new(api: A, policy: PollPolicy) -> Self {
        Self { api, policy }
    }

    /// Submits `descriptor`, waits for it to finish, and returns its outputs.
    ///
    /// A failure terminal state ends the wait immediately and is never
    /// retried. Submitting a name that already exists fails.
    ///
    /// # Errors
    ///
    /// Returns [`StackError::StackAlreadyExists`], [`StackError::Submit`],
    /// [`StackError::Query`], [`StackError::ProvisioningFailed`],
    /// [`StackError::ProvisioningTimedOut`] or [`StackError::DuplicateOutput`].
    pub async fn provision(&self, descriptor: &StackDescriptor) -> Result<StackOutputMap, StackError> {
        let stack = descriptor.name.as_str();
        self.api
            .submit_template(descriptor)
            .await
            .map_err(|source| match source {
                StackApiError::AlreadyExists { stack: existing } => {
                    StackError::StackAlreadyExists { stack: existing }
                }
                other => StackError::Submit {
                    stack: stack.to_owned(),
                    source: other,
                },
            })?;
        info!(stack, "stack submitted; waiting for completion");

        let status = self.wait_for_terminal(stack).await?;
        if status.phase() == StackPhase::Failed {
            warn!(stack, status = %status.code, "stack reached a failure state");
            return Err(StackError::ProvisioningFailed {
                stack: stack.to_owned(),
                status: status.code,
                reason: status.reason,
            });
        }

        let outputs = self
            .api
            .describe_outputs(stack)
            .await
            .map_err(|source| StackError::Query {
                stack: stack.to_owned(),
                source,
            })?;
        let map = StackOutputMap::from_outputs(stack, outputs)?;
        for (key, value) in map.iter() {
            info!(stack, key, value, "stack output");
        }
        Ok(map)
    }

    async fn wait_for_terminal(&self, stack: &str) -> Result<StackStatus, StackError> {
        let polled = poll_until(self.policy, |attempt| async move {
            let status = self
                .api
                .stack_status(stack)
                .await
                .map_err(|source| StackError::Query {
                    stack: stack.to_owned(),
                    source,
                })?;
            info!(stack, attempt, status = %status.code, "stack status");
            Ok::<_, StackError>(match status.phase() {
                StackPhase::InProgress => Step::Pending(status.code),
                StackPhase::Succeeded | StackPhase::Failed => Step::Done(status),
            })
        })
        .await?;

        match polled {
            Polled::Done { value, .. } => Ok(value),
            Polled::Exhausted { attempts, last } => Err(StackError::ProvisioningTimedOut {
                stack: stack.to_owned(),
                attempts,
                last_status: last,
            }),
        }
    }
}
