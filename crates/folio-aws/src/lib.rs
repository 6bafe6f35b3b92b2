//! # folio-aws
//!
//! AWS adapters for folio's output ports: [`S3ObjectStore`] uploads rendered
//! artifacts and [`SnsChannel`] publishes operator alerts. Both sign requests
//! with SigV4 over a shared `reqwest` client.

#![deny(unsafe_code)]

mod client;
pub mod credentials;
pub mod error;
pub mod s3;
pub mod sigv4;
pub mod sns;

pub use credentials::{AwsCredentials, CredentialsProvider};
pub use error::AwsError;
pub use s3::S3ObjectStore;
pub use sns::{SnsChannel, topic_region};
