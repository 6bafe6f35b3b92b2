//! SNS publishing for operator alerts.

use async_trait::async_trait;
use folio_core::ports::{NotificationChannel, NotifyError};
use reqwest::Method;

use crate::client::{AwsHttp, SignedRequest};
use crate::credentials::CredentialsProvider;
use crate::error::AwsError;
use crate::sigv4::encode_form;

const API_VERSION: &str = "2010-03-31";

/// [`NotificationChannel`] backed by the SNS `Publish` action.
#[derive(Clone, Debug)]
pub struct SnsChannel {
    http: AwsHttp,
    credentials: CredentialsProvider,
    endpoint_url: Option<String>,
}

impl SnsChannel {
    /// Publish to AWS with credentials from `credentials`.
    pub fn new(credentials: CredentialsProvider) -> Self {
        Self {
            http: AwsHttp::default(),
            credentials,
            endpoint_url: None,
        }
    }

    /// Send requests to `endpoint` instead of the regional SNS host.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: Option<String>) -> Self {
        self.endpoint_url = endpoint;
        self
    }

    fn endpoint_for(&self, region: &str) -> String {
        match &self.endpoint_url {
            Some(endpoint) => format!("{}/", endpoint.trim_end_matches('/')),
            None => format!("https://sns.{region}.amazonaws.com/"),
        }
    }

    async fn send(&self, topic: &str, message: &str, subject: &str) -> Result<(), AwsError> {
        let region = topic_region(topic).ok_or_else(|| AwsError::Endpoint {
            url: topic.to_string(),
            reason: "not an SNS topic ARN".into(),
        })?;
        let credentials = self.credentials.resolve().ok_or_else(|| {
            AwsError::Credentials("set AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY".into())
        })?;

        let body = encode_form(&[
            ("Action", "Publish"),
            ("Message", message),
            ("Subject", subject),
            ("TopicArn", topic),
            ("Version", API_VERSION),
        ]);
        let url = self.endpoint_for(region);

        let _ = self
            .http
            .send(
                SignedRequest {
                    method: Method::POST,
                    url: &url,
                    region,
                    service: "sns",
                    headers: &[(
                        "content-type",
                        "application/x-www-form-urlencoded; charset=utf-8",
                    )],
                    body: body.into_bytes(),
                },
                &credentials,
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl NotificationChannel for SnsChannel {
    async fn publish(&self, topic: &str, message: &str, subject: &str) -> Result<(), NotifyError> {
        if topic.is_empty() {
            return Err(NotifyError::NotConfigured("no alert topic".into()));
        }
        self.send(topic, message, subject).await?;
        tracing::debug!(topic, subject, "alert published");
        Ok(())
    }
}

/// Region segment of `arn:aws:sns:{region}:{account}:{name}`.
pub fn topic_region(arn: &str) -> Option<&str> {
    let mut parts = arn.splitn(6, ':');
    let (prefix, _partition, service, region, _account, name) = (
        parts.next()?,
        parts.next()?,
        parts.next()?,
        parts.next()?,
        parts.next()?,
        parts.next()?,
    );
    (prefix == "arn" && service == "sns" && !region.is_empty() && !name.is_empty()).then_some(region)
}
