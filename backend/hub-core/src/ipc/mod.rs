//! WebSocket layer: server, per-connection authentication, and routing.
//!
//! # Security
//!
//! - Every connection starts unauthenticated and is challenged
//! - A non-auth first message closes the connection (code 1008)
//! - `server.local_only` additionally rejects non-loopback peers

mod authenticator;
mod handle;
pub mod router;
mod server;

pub use authenticator::{AuthState, AuthStep, ConnectionAuthenticator};
pub use handle::HubServerHandle;
pub use router::{HubEvent, RouterCommand, RouterHandle, RouterSnapshot};
pub use server::{HubContext, start_hub_server};
