//! Artifact upload and public URL construction.

use std::sync::Arc;

use folio_core::errors::{ErrorKind, PipelineError};
use folio_core::ports::{ObjectStore, PutObject, encode_object_key};
use folio_core::response::{PublishedArtifact, RenderResult};

/// Uploads rendered artifacts to the object store.
#[derive(Clone)]
pub struct ArtifactPublisher {
    store: Arc<dyn ObjectStore>,
}

impl ArtifactPublisher {
    /// Publish through `store`.
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Upload `result` and return where it can be fetched. Any store error
    /// is a [`ErrorKind::PublishFailure`].
    pub async fn publish(&self, result: RenderResult) -> Result<PublishedArtifact, PipelineError> {
        let destination = result.destination;
        let credentials = destination
            .credentials
            .is_complete()
            .then(|| destination.credentials.clone());
        let public_url = public_url(
            &destination.bucket_name,
            &destination.region,
            &result.destination_key,
        );

        tracing::debug!(
            bucket = %destination.bucket_name,
            key = %result.destination_key,
            content_type = result.content_type,
            "uploading artifact"
        );
        self.store
            .put_object(PutObject {
                bucket: destination.bucket_name,
                region: destination.region,
                key: result.destination_key,
                body: result.bytes,
                content_type: result.content_type.to_string(),
                credentials,
            })
            .await
            .map_err(|e| PipelineError::from_source(ErrorKind::PublishFailure, "publish", &e))?;

        Ok(PublishedArtifact { public_url })
    }
}

/// Virtual-hosted-style URL of `key` in `bucket`.
pub fn public_url(bucket: &str, region: &str, key: &str) -> String {
    format!(
        "https://{bucket}.s3.{region}.amazonaws.com/{}",
        encode_object_key(key)
    )
}
