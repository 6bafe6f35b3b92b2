//! AWS credential resolution.

use folio_core::request::Credentials;

/// An access key pair, optionally with a session token.
#[derive(Clone, PartialEq, Eq)]
pub struct AwsCredentials {
    /// Access key id.
    pub access_key_id: String,
    /// Secret access key.
    pub secret_access_key: String,
    /// Session token for temporary credentials.
    pub session_token: Option<String>,
}

impl AwsCredentials {
    /// Build a long-lived key pair.
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
        }
    }

    /// Read `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`, and
    /// `AWS_SESSION_TOKEN` through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.is_empty());
        Some(Self {
            access_key_id: non_empty("AWS_ACCESS_KEY_ID")?,
            secret_access_key: non_empty("AWS_SECRET_ACCESS_KEY")?,
            session_token: non_empty("AWS_SESSION_TOKEN"),
        })
    }

    /// Credentials supplied in a render request, if both halves are present.
    pub fn from_request(credentials: &Credentials) -> Option<Self> {
        if !credentials.is_complete() {
            return None;
        }
        Some(Self::new(
            credentials.access_key_id.clone().unwrap_or_default(),
            credentials.secret_access_key.clone().unwrap_or_default(),
        ))
    }
}

impl std::fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Where default credentials come from.
#[derive(Clone, Debug, Default)]
pub enum CredentialsProvider {
    /// The process environment, read on every request so rotated
    /// credentials are picked up.
    #[default]
    Environment,
    /// A fixed key pair.
    Static(AwsCredentials),
}

impl CredentialsProvider {
    /// Resolve the current credentials.
    pub fn resolve(&self) -> Option<AwsCredentials> {
        match self {
            Self::Environment => AwsCredentials::from_lookup(|name| std::env::var(name).ok()),
            Self::Static(credentials) => Some(credentials.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| env.get(name).cloned()
    }

    #[test]
    fn lookup_reads_full_set() {
        let creds = AwsCredentials::from_lookup(lookup(&[
            ("AWS_ACCESS_KEY_ID", "AKID"),
            ("AWS_SECRET_ACCESS_KEY", "secret"),
            ("AWS_SESSION_TOKEN", "token"),
        ]))
        .unwrap();
        assert_eq!(creds.access_key_id, "AKID");
        assert_eq!(creds.session_token.as_deref(), Some("token"));
    }

    #[test]
    fn lookup_requires_both_keys() {
        assert!(AwsCredentials::from_lookup(lookup(&[("AWS_ACCESS_KEY_ID", "AKID")])).is_none());
        assert!(
            AwsCredentials::from_lookup(lookup(&[
                ("AWS_ACCESS_KEY_ID", ""),
                ("AWS_SECRET_ACCESS_KEY", "secret"),
            ]))
            .is_none()
        );
    }

    #[test]
    fn request_credentials_need_both_halves() {
        let partial = Credentials {
            access_key_id: Some("AKID".into()),
            secret_access_key: None,
        };
        assert!(AwsCredentials::from_request(&partial).is_none());

        let full = Credentials {
            access_key_id: Some("AKID".into()),
            secret_access_key: Some("secret".into()),
        };
        assert_eq!(
            AwsCredentials::from_request(&full),
            Some(AwsCredentials::new("AKID", "secret"))
        );
    }

    #[test]
    fn debug_redacts_secrets() {
        let mut creds = AwsCredentials::new("AKID", "very-secret");
        creds.session_token = Some("tok-secret".into());
        let dbg = format!("{creds:?}");
        assert!(dbg.contains("AKID"));
        assert!(!dbg.contains("very-secret"));
        assert!(!dbg.contains("tok-secret"));
    }

    #[test]
    fn static_provider_resolves() {
        let provider = CredentialsProvider::Static(AwsCredentials::new("a", "b"));
        assert_eq!(provider.resolve().unwrap().access_key_id, "a");
    }
}
