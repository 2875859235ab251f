//! Failure classification shared by the SDK adapters.

use std::error::Error;

use aws_sdk_s3::error::{DisplayErrorContext, SdkError};

/// Full error chain, since the top-level SDK message is rarely actionable.
pub(super) fn describe<E: Error>(err: &E) -> String {
    DisplayErrorContext(err).to_string()
}

/// `true` when the platform answered and refused the request.
pub(super) const fn is_service_error<E, R>(err: &SdkError<E, R>) -> bool {
    matches!(err, SdkError::ServiceError(_))
}
