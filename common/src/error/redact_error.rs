use crate::ErrorLocation;

use thiserror::Error as ThisError;

/// Raised when a [`RedactedSecret`](crate::RedactedSecret) would leave the
/// process implicitly.
#[derive(Debug, ThisError)]
pub enum RedactError {
    #[error("Redacted Secret Error: {field} refused implicit serialization {location}")]
    ImplicitSerialization {
        field: &'static str,
        location: ErrorLocation,
    },
}
