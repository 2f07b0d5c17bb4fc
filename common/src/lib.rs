//! Shared primitives for the hub workspace.
//!
//! Everything here is dependency-light and used by both `models` and
//! `hub-core`:
//!
//! - [`ErrorLocation`] - call-site capture for every error enum
//! - [`RedactedSecret`] - app certificates and session tokens that must never
//!   reach a log line
//! - [`HttpStatusCode`] - classification of relay / agent HTTP failures

pub mod error;
pub mod http_status;
pub mod redacted_secret;

#[cfg(test)]
mod tests;

pub use error::error_location::ErrorLocation;
pub use error::redact_error::RedactError;
pub use http_status::HttpStatusCode;
pub use redacted_secret::RedactedSecret;
