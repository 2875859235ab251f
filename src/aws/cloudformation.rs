//! CloudFormation implementation of [`StackApi`].

use aws_sdk_cloudformation::Client;
use aws_sdk_cloudformation::error::ProvideErrorMetadata;
use aws_sdk_cloudformation::operation::create_stack::CreateStackError;
use aws_sdk_cloudformation::types::{Capability, Stack};

use super::error::{describe, is_service_error};
use crate::backend::{
    BackendFuture, StackApi, StackApiError, StackDescriptor, StackOutput, StackStatus,
};

/// Stack adapter over a CloudFormation client.
#[derive(Clone, Debug)]
pub struct CloudFormationStacks {
    client: Client,
}

impl CloudFormationStacks {
    /// Wraps an existing client.
    #[must_use]
    pub const fn new(client: Client) -> Self {
        Self { client }
    }

    async fn fetch(&self, name: &str) -> Result<Stack, StackApiError> {
        let output = self
            .client
            .describe_stacks()
            .stack_name(name)
            .send()
            .await
            .map_err(|err| {
                let missing = err
                    .as_service_error()
                    .and_then(ProvideErrorMetadata::message)
                    .is_some_and(|message| message.contains("does not exist"));
                if missing {
                    StackApiError::NotFound {
                        stack: name.to_owned(),
                    }
                } else if is_service_error(&err) {
                    StackApiError::Rejected {
                        message: describe(&err),
                    }
                } else {
                    StackApiError::Transport {
                        message: describe(&err),
                    }
                }
            })?;
        output
            .stacks()
            .first()
            .cloned()
            .ok_or_else(|| StackApiError::NotFound {
                stack: name.to_owned(),
            })
    }
}

impl StackApi for CloudFormationStacks {
    fn submit_template<'a>(
        &'a self,
        descriptor: &'a StackDescriptor,
    ) -> BackendFuture<'a, (), StackApiError> {
        Box::pin(async move {
            let capabilities = descriptor
                .capabilities
                .iter()
                .map(|capability| Capability::from(capability.as_str()))
                .collect();
            self.client
                .create_stack()
                .stack_name(&descriptor.name)
                .template_body(&descriptor.template_body)
                .set_capabilities(Some(capabilities))
                .send()
                .await
                .map(|_| ())
                .map_err(|err| {
                    if err
                        .as_service_error()
                        .is_some_and(CreateStackError::is_already_exists_exception)
                    {
                        StackApiError::AlreadyExists {
                            stack: descriptor.name.clone(),
                        }
                    } else if is_service_error(&err) {
                        StackApiError::Rejected {
                            message: describe(&err),
                        }
                    } else {
                        StackApiError::Transport {
                            message: describe(&err),
                        }
                    }
                })
        })
    }

    fn stack_status<'a>(&'a self, name: &'a str) -> BackendFuture<'a, StackStatus, StackApiError> {
        Box::pin(async move {
            let stack = self.fetch(name).await?;
            Ok(StackStatus {
                code: stack
                    .stack_status()
                    .map_or("UNKNOWN", |status| status.as_str())
                    .to_owned(),
                reason: stack.stack_status_reason().map(str::to_owned),
            })
        })
    }

    fn describe_outputs<'a>(
        &'a self,
        name: &'a str,
    ) -> BackendFuture<'a, Vec<StackOutput>, StackApiError> {
        Box::pin(async move {
            let stack = self.fetch(name).await?;
            Ok(stack
                .outputs()
                .iter()
                .filter_map(|output| {
                    Some(StackOutput::new(output.output_key()?, output.output_value()?))
                })
                .collect())
        })
    }
}
