//! Server-side session acceptance.

use std::path::Path;

use gpsbridge_transport::RpcListener;
use tracing::info;

use crate::error::Result;
use crate::session::{Session, SessionConfig};

/// Accepts client sessions, one at a time.
///
/// The link serves a single client per session; accept the next connection
/// only after the previous session reached `Closed`.
pub struct SessionListener {
    socket: RpcListener,
    config: SessionConfig,
}

impl SessionListener {
    /// Bind the well-known socket path.
    pub fn bind(path: impl AsRef<Path>) -> Result<Self> {
        let socket = RpcListener::bind(path)?;
        Ok(Self {
            socket,
            config: SessionConfig::default(),
        })
    }

    /// Override session configuration for accepted connections.
    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Accept the next connection (blocking).
    pub fn accept(&self) -> Result<Session> {
        let stream = self.socket.accept()?;
        if let Some((uid, gid, pid)) = stream.peer_credentials() {
            info!(uid, gid, pid, "accepted positioning client");
        }
        Session::new(stream, self.config.clone())
    }

    /// Bound socket path.
    pub fn path(&self) -> &Path {
        self.socket.path()
    }
}
