//! Lambda implementation of [`FunctionApi`].

use aws_sdk_lambda::Client;

use super::error::{describe, is_service_error};
use crate::backend::{BackendFuture, FunctionApi, FunctionApiError};

/// Function adapter over a Lambda client.
#[derive(Clone, Debug)]
pub struct LambdaFunctions {
    client: Client,
}

impl LambdaFunctions {
    /// Wraps an existing client.
    #[must_use]
    pub const fn new(client: Client) -> Self {
        Self { client }
    }
}

impl FunctionApi for LambdaFunctions {
    fn set_code_source<'a>(
        &'a self,
        function: &'a str,
        bucket: &'a str,
        key: &'a str,
    ) -> BackendFuture<'a, (), FunctionApiError> {
        Box::pin(async move {
            self.client
                .update_function_code()
                .function_name(function)
                .s3_bucket(bucket)
                .s3_key(key)
                .send()
                .await
                .map(|_| ())
                .map_err(|err| {
                    if is_service_error(&err) {
                        FunctionApiError::Rejected {
                            function: function.to_owned(),
                            message: describe(&err),
                        }
                    } else {
                        FunctionApiError::Transport {
                            message: describe(&err),
                        }
                    }
                })
        })
    }
}
