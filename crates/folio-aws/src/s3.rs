//! S3 object upload.

use async_trait::async_trait;
use folio_core::ports::{
    ObjectStore, PutObject, StoreError, encode_object_key, has_dot_segment, is_bucket_name, is_region,
};
use reqwest::Method;

use crate::client::{AwsHttp, SignedRequest};
use crate::credentials::{AwsCredentials, CredentialsProvider};
use crate::error::AwsError;

/// [`ObjectStore`] backed by the S3 REST API.
#[derive(Clone, Debug)]
pub struct S3ObjectStore {
    http: AwsHttp,
    credentials: CredentialsProvider,
    endpoint_url: Option<String>,
    use_request_credentials: bool,
}

impl S3ObjectStore {
    /// Upload to AWS with credentials from `credentials`.
    pub fn new(credentials: CredentialsProvider) -> Self {
        Self {
            http: AwsHttp::default(),
            credentials,
            endpoint_url: None,
            use_request_credentials: false,
        }
    }

    /// Send requests to `endpoint` with path-style addressing
    /// (`{endpoint}/{bucket}/{key}`).
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: Option<String>) -> Self {
        self.endpoint_url = endpoint;
        self
    }

    /// Prefer credentials carried by the request when both halves are present.
    #[must_use]
    pub fn with_request_credentials(mut self, enabled: bool) -> Self {
        self.use_request_credentials = enabled;
        self
    }

    /// Upload URL for `key` in `bucket`.
    ///
    /// Bucket and region land in the host name, so both must follow S3
    /// naming; keys with dot segments are refused since URL normalization
    /// would rewrite them.
    pub fn object_url(&self, bucket: &str, region: &str, key: &str) -> Result<String, AwsError> {
        let reason = if !is_bucket_name(bucket) {
            Some(format!("bucket name {bucket:?} is not DNS-compatible"))
        } else if !is_region(region) {
            Some(format!("region {region:?} is not a region code"))
        } else if has_dot_segment(key) {
            Some(format!("key {key:?} has a dot segment"))
        } else {
            None
        };
        let key = encode_object_key(key);
        let url = match &self.endpoint_url {
            Some(endpoint) => format!("{}/{bucket}/{key}", endpoint.trim_end_matches('/')),
            None => format!("https://{bucket}.s3.{region}.amazonaws.com/{key}"),
        };
        match reason {
            Some(reason) => Err(AwsError::Endpoint { url, reason }),
            None => Ok(url),
        }
    }

    fn credentials_for(&self, object: &PutObject) -> Result<AwsCredentials, AwsError> {
        if self.use_request_credentials {
            if let Some(creds) = object.credentials.as_ref().and_then(AwsCredentials::from_request) {
                return Ok(creds);
            }
        }
        self.credentials.resolve().ok_or_else(|| {
            AwsError::Credentials("set AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY".into())
        })
    }

    async fn upload(&self, object: PutObject) -> Result<(), AwsError> {
        let url = self.object_url(&object.bucket, &object.region, &object.key)?;
        let credentials = self.credentials_for(&object)?;
        let size = object.body.len();

        let _ = self
            .http
            .send(
                SignedRequest {
                    method: Method::PUT,
                    url: &url,
                    region: &object.region,
                    service: "s3",
                    headers: &[("content-type", object.content_type.as_str())],
                    body: object.body,
                },
                &credentials,
            )
            .await?;

        tracing::info!(bucket = %object.bucket, key = %object.key, size, "object uploaded");
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put_object(&self, object: PutObject) -> Result<(), StoreError> {
        Ok(self.upload(object).await?)
    }
}
