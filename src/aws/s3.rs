//! S3 implementation of [`ObjectStore`].

use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};

use super::error::describe;
use crate::backend::{BackendFuture, ObjectLocator, ObjectStore, ObjectSummary, StoreError};

/// Keys accepted by a single `DeleteObjects` request.
const DELETE_BATCH: usize = 1000;

/// Object store adapter over an S3 client.
#[derive(Clone, Debug)]
pub struct S3Store {
    client: Client,
}

impl S3Store {
    /// Wraps an existing client.
    #[must_use]
    pub const fn new(client: Client) -> Self {
        Self { client }
    }
}

impl ObjectStore for S3Store {
    fn put<'a>(
        &'a self,
        locator: &'a ObjectLocator,
        body: &'a [u8],
    ) -> BackendFuture<'a, (), StoreError> {
        Box::pin(async move {
            self.client
                .put_object()
                .bucket(&locator.container)
                .key(&locator.key)
                .body(ByteStream::from(body.to_vec()))
                .send()
                .await
                .map(|_| ())
                .map_err(|err| StoreError::transfer("put", &locator.container, describe(&err)))
        })
    }

    fn list<'a>(
        &'a self,
        container: &'a str,
        prefix: &'a str,
    ) -> BackendFuture<'a, Vec<ObjectSummary>, StoreError> {
        Box::pin(async move {
            let mut objects = Vec::new();
            let mut token: Option<String> = None;
            loop {
                let page = self
                    .client
                    .list_objects_v2()
                    .bucket(container)
                    .prefix(prefix)
                    .set_continuation_token(token.take())
                    .send()
                    .await
                    .map_err(|err| StoreError::transfer("list", container, describe(&err)))?;

                objects.extend(page.contents().iter().filter_map(|object| {
                    let size = u64::try_from(object.size().unwrap_or_default()).unwrap_or_default();
                    object.key().map(|key| ObjectSummary::new(key, size))
                }));

                let more = page
                    .next_continuation_token()
                    .filter(|_| page.is_truncated().unwrap_or(false));
                let Some(next) = more else {
                    break;
                };
                token = Some(next.to_owned());
            }
            Ok(objects)
        })
    }

    fn delete<'a>(
        &'a self,
        container: &'a str,
        keys: &'a [String],
    ) -> BackendFuture<'a, (), StoreError> {
        Box::pin(async move {
            let fail = |message: String| StoreError::transfer("delete", container, message);
            for batch in keys.chunks(DELETE_BATCH) {
                let identifiers = batch
                    .iter()
                    .map(|key| ObjectIdentifier::builder().key(key).build())
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|err| fail(err.to_string()))?;
                let request = Delete::builder()
                    .set_objects(Some(identifiers))
                    .quiet(true)
                    .build()
                    .map_err(|err| fail(err.to_string()))?;
                let output = self
                    .client
                    .delete_objects()
                    .bucket(container)
                    .delete(request)
                    .send()
                    .await
                    .map_err(|err| fail(describe(&err)))?;
                if let Some(error) = output.errors().first() {
                    return Err(fail(format!(
                        "{}: {}",
                        error.key().unwrap_or("<unknown key>"),
                        error.message().unwrap_or("unknown error")
                    )));
                }
            }
            Ok(())
        })
    }
}
