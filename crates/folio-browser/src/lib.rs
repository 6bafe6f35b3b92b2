//! # folio-browser
//!
//! Headless Chrome behind the [`folio_core::ports::BrowserEngine`] port,
//! spoken to directly over the DevTools protocol.
//!
//! - [`chrome`]: binary discovery
//! - [`engine`]: process launch, the one-browser-at-a-time slot, close
//! - [`connection`]: WebSocket command/response routing and event fan-out
//! - [`page`]: navigation, content loading, and PDF/HTML output

#![deny(unsafe_code)]

pub mod chrome;
pub mod connection;
pub mod engine;
pub mod error;
pub mod page;

#[cfg(test)]
mod testing;

pub use chrome::find_chrome;
pub use engine::{BrowserOptions, CdpBrowser, CdpEngine};
pub use error::BrowserError;
pub use page::CdpPage;
