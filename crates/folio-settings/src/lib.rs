//! # folio-settings
//!
//! Layered configuration for the folio rendering service.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults** ([`FolioSettings::default()`])
//! 2. **Settings file**: `FOLIO_SETTINGS_PATH`, else `~/.folio/settings.json`
//! 3. **Environment variables**: host-provided (`AWS_LAMBDA_*`,
//!    `ALERT_NOTIFICATIONS_SNS_ARN`, `CHROME_PATH`) and `FOLIO_*` overrides

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::{
    AwsSettings, BrowserSettings, FolioSettings, InvocationSettings, LoggingSettings,
    ServerSettings,
};
