//! AWS adapters for the backend traits.
//!
//! Every adapter is a thin client wrapper: it translates one trait call into
//! one or more SDK requests and classifies failures as platform rejections
//! or transport errors. None of them retry beyond what the SDK does itself.

mod cloudformation;
mod error;
mod lambda;
mod s3;

use aws_config::{BehaviorVersion, Region, SdkConfig};

pub use cloudformation::CloudFormationStacks;
pub use lambda::LambdaFunctions;
pub use s3::S3Store;

/// Shared SDK configuration resolved once per process.
#[derive(Clone, Debug)]
pub struct AwsSession {
    config: SdkConfig,
}

impl AwsSession {
    /// Resolves credentials and region through the default provider chain,
    /// narrowed by an optional named profile and region override.
    pub async fn load(profile: Option<&str>, region: Option<&str>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(name) = profile {
            loader = loader.profile_name(name);
        }
        if let Some(name) = region {
            loader = loader.region(Region::new(name.to_owned()));
        }
        Self {
            config: loader.load().await,
        }
    }

    /// Stack adapter backed by CloudFormation.
    #[must_use]
    pub fn stacks(&self) -> CloudFormationStacks {
        CloudFormationStacks::new(aws_sdk_cloudformation::Client::new(&self.config))
    }

    /// Object store adapter backed by S3.
    #[must_use]
    pub fn store(&self) -> S3Store {
        S3Store::new(aws_sdk_s3::Client::new(&self.config))
    }

    /// Function adapter backed by Lambda.
    #[must_use]
    pub fn functions(&self) -> LambdaFunctions {
        LambdaFunctions::new(aws_sdk_lambda::Client::new(&self.config))
    }
}
