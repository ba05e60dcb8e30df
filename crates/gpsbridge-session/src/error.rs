use std::time::Duration;

use crate::state::SessionState;

/// Errors that can occur in session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] gpsbridge_transport::TransportError),

    /// Wire-level error.
    #[error("wire error: {0}")]
    Wire(#[from] gpsbridge_wire::WireError),

    /// The connect retry budget was exhausted.
    #[error("connect failed after {attempts} attempts: {source}")]
    ConnectExhausted {
        attempts: u32,
        source: gpsbridge_transport::TransportError,
    },

    /// The session is not in the `Connected` state.
    #[error("session is not connected (state: {0})")]
    NotConnected(SessionState),

    /// A synchronous call is already awaiting its reply.
    ///
    /// The protocol carries no correlation IDs; callers must serialize
    /// their calls.
    #[error("another call is already awaiting its reply")]
    CallInProgress,

    /// The connection closed while a call was awaiting its reply.
    #[error("connection closed while awaiting reply")]
    Disconnected,

    /// No reply arrived within the configured call timeout.
    #[error("call timed out after {0:?}")]
    CallTimeout(Duration),

    /// The dispatch loop was already started for this session.
    #[error("dispatch loop already started")]
    AlreadyStarted,
}

pub type Result<T> = std::result::Result<T, SessionError>;
