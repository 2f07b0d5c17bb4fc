//! Handle to the running hub server.

use std::net::SocketAddr;

use tokio::task::JoinHandle;

/// Returned by [`start_hub_server`](crate::ipc::start_hub_server).
///
/// Dropping the handle does not stop the server; call [`shutdown`](Self::shutdown).
/// Shutdown stops accepting; connections already open run until their peer
/// disconnects.
pub struct HubServerHandle {
    pub(crate) local_addr: SocketAddr,
    pub(crate) accept_task: JoinHandle<()>,
}

impl HubServerHandle {
    /// Bound address; the real port when configured with port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    pub fn shutdown(self) {
        self.accept_task.abort();
    }
}
