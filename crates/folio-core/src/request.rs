//! The normalized render request.
//!
//! A [`RenderRequest`] is only ever produced by [`crate::validate`]: all
//! defaults are applied and every constraint has been checked by the time a
//! value exists. Fields are private and there are no setters.

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Output format
// ─────────────────────────────────────────────────────────────────────────────

/// What the render step produces.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    /// A paginated PDF document.
    #[default]
    #[serde(rename = "PDF")]
    Pdf,
    /// The serialized DOM of the loaded page.
    #[serde(rename = "HTML")]
    Html,
}

impl OutputFormat {
    /// Every accepted wire value.
    pub const ALL: [&'static str; 2] = ["PDF", "HTML"];

    /// MIME type of the published artifact.
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Html => "text/html",
        }
    }

    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pdf => "PDF",
            Self::Html => "HTML",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Content source
// ─────────────────────────────────────────────────────────────────────────────

/// Where the page content comes from. Exactly one source per request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContentSource {
    /// Navigate to a remote URL.
    Url(String),
    /// Load inline markup.
    Html(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// Cookies and viewport
// ─────────────────────────────────────────────────────────────────────────────

/// A cookie forwarded to the browser before content is loaded.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
    /// Cookie name.
    pub name: String,
    /// Cookie value.
    pub value: String,
    /// Domain the cookie is scoped to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// URL the cookie is scoped to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Cookie path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Secure flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secure: Option<bool>,
    /// `HttpOnly` flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_only: Option<bool>,
    /// `SameSite` policy (`Strict`, `Lax`, `None`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub same_site: Option<String>,
    /// Expiry as seconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<f64>,
}

/// Browser viewport in CSS pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1440,
            height: 1080,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Document options
// ─────────────────────────────────────────────────────────────────────────────

/// A paper length: a bare number of pixels or a string with a CSS unit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Dimension {
    /// Pixels.
    Number(f64),
    /// Number with a unit suffix, e.g. `"1.5cm"`.
    Text(String),
}

/// Paper margins. Absent sides are zero.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Margin {
    /// Top margin.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top: Option<Dimension>,
    /// Right margin.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right: Option<Dimension>,
    /// Bottom margin.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bottom: Option<Dimension>,
    /// Left margin.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left: Option<Dimension>,
}

/// PDF rendering options, forwarded verbatim to the engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DocumentOptions {
    /// Display header and footer.
    pub display_header_footer: bool,
    /// HTML template for the print header.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header_template: Option<String>,
    /// HTML template for the print footer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer_template: Option<String>,
    /// Print background graphics.
    pub print_background: bool,
    /// Landscape orientation.
    pub landscape: bool,
    /// Page ranges, e.g. `"1-5, 8"`. Empty prints everything.
    pub page_ranges: String,
    /// Paper format name. Takes priority over `width`/`height` when non-empty.
    pub format: String,
    /// Paper width, used when `format` is empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<Dimension>,
    /// Paper height, used when `format` is empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<Dimension>,
    /// Paper margins.
    pub margin: Margin,
    /// Let CSS `@page` size win over `format`/`width`/`height`.
    #[serde(rename = "preferCSSPageSize")]
    pub prefer_css_page_size: bool,
    /// Rendering scale.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
}

impl Default for DocumentOptions {
    fn default() -> Self {
        Self {
            display_header_footer: false,
            header_template: None,
            footer_template: None,
            print_background: true,
            landscape: false,
            page_ranges: String::new(),
            format: "Letter".to_string(),
            width: None,
            height: None,
            margin: Margin::default(),
            prefer_css_page_size: false,
            scale: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Destination
// ─────────────────────────────────────────────────────────────────────────────

/// Credentials supplied with the request. Ignored unless the deployment
/// explicitly opts in.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Credentials {
    /// AWS access key id.
    #[serde(rename = "awsAccessKeyId", skip_serializing_if = "Option::is_none")]
    pub access_key_id: Option<String>,
    /// AWS secret access key.
    #[serde(rename = "awsSecretAccessKey", skip_serializing_if = "Option::is_none")]
    pub secret_access_key: Option<String>,
}

impl Credentials {
    /// Whether both halves of a key pair are present.
    pub fn is_complete(&self) -> bool {
        self.access_key_id.as_deref().is_some_and(|s| !s.is_empty())
            && self.secret_access_key.as_deref().is_some_and(|s| !s.is_empty())
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Object-store bucket the artifact is uploaded to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Destination {
    /// Bucket name.
    #[serde(rename = "name")]
    pub bucket_name: String,
    /// Bucket region.
    pub region: String,
    /// Optional request-scoped credentials.
    #[serde(default)]
    pub credentials: Credentials,
}

// ─────────────────────────────────────────────────────────────────────────────
// RenderRequest
// ─────────────────────────────────────────────────────────────────────────────

/// A validated, fully-defaulted render request.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderRequest {
    file_name: String,
    content_source: ContentSource,
    output_format: OutputFormat,
    cookies: Vec<Cookie>,
    viewport: Viewport,
    document_options: DocumentOptions,
    destination: Destination,
}

impl RenderRequest {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        file_name: String,
        content_source: ContentSource,
        output_format: OutputFormat,
        cookies: Vec<Cookie>,
        viewport: Viewport,
        document_options: DocumentOptions,
        destination: Destination,
    ) -> Self {
        Self {
            file_name,
            content_source,
            output_format,
            cookies,
            viewport,
            document_options,
            destination,
        }
    }

    /// Target file name; also the object key.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Where the content comes from.
    pub fn content_source(&self) -> &ContentSource {
        &self.content_source
    }

    /// PDF or HTML output.
    pub fn output_format(&self) -> OutputFormat {
        self.output_format
    }

    /// Cookies to install before loading content.
    pub fn cookies(&self) -> &[Cookie] {
        &self.cookies
    }

    /// Page viewport.
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// PDF options; unused for HTML output.
    pub fn document_options(&self) -> &DocumentOptions {
        &self.document_options
    }

    /// Upload destination.
    pub fn destination(&self) -> &Destination {
        &self.destination
    }
}
