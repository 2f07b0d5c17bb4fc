//! Domain models for the hub.
//!
//! Pure data: the wire protocol spoken over the hub's WebSocket, the
//! persisted pairing [`Session`], the short-lived [`AuthSession`], connected
//! instances and mark tasks. Behaviour lives in `hub-core`.
//!
//! ## Architecture
//!
//! - **common**: error locations, secrets, HTTP status helpers
//! - **models** (this crate): data and wire format
//! - **hub-core**: token signing, stores, authentication, routing, voice
//! - **hub**: the process wiring everything together

pub mod client;
pub mod error;
pub mod mark_task;
pub mod protocol;
pub mod session;

#[cfg(test)]
mod tests;

pub use client::builder::ConnectedClientBuilder;
pub use client::{ClientId, ClientType, ConnectedClient};
pub use error::model_error::ModelError;
pub use error::protocol_error::ProtocolError;
pub use mark_task::{MarkTask, MarkTaskStatus};
pub use protocol::{Envelope, HubMessage};
pub use session::{AUTH_SESSION_TTL, AuthRequest, AuthSession, SESSION_TTL, Session};
