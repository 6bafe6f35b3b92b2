//! Signed HTTP transport shared by the S3 and SNS adapters.

use chrono::Utc;
use reqwest::{Method, Url};

use crate::credentials::AwsCredentials;
use crate::error::AwsError;
use crate::sigv4::{self, SigningScope};

/// One signed request.
pub(crate) struct SignedRequest<'a> {
    pub method: Method,
    pub url: &'a str,
    pub region: &'a str,
    pub service: &'a str,
    pub headers: &'a [(&'a str, &'a str)],
    pub body: Vec<u8>,
}

/// `reqwest` client that signs every request with SigV4.
#[derive(Clone, Debug, Default)]
pub(crate) struct AwsHttp {
    http: reqwest::Client,
}

impl AwsHttp {
    /// Send `request`; a non-2xx status is an error carrying the body.
    /// Returns the response body on success.
    pub(crate) async fn send(
        &self,
        request: SignedRequest<'_>,
        credentials: &AwsCredentials,
    ) -> Result<String, AwsError> {
        let url = Url::parse(request.url).map_err(|e| AwsError::Endpoint {
            url: request.url.to_string(),
            reason: e.to_string(),
        })?;
        let scope = SigningScope {
            region: request.region,
            service: request.service,
            time: Utc::now(),
        };
        let auth_headers = sigv4::sign(
            request.method.as_str(),
            &url,
            request.headers,
            &request.body,
            credentials,
            &scope,
        );

        let mut builder = self.http.request(request.method, url);
        for (name, value) in request.headers {
            builder = builder.header(*name, *value);
        }
        for (name, value) in auth_headers {
            builder = builder.header(name, value);
        }

        let response = builder.body(request.body).send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(AwsError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}
