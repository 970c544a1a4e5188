//! Message transport port
//!
//! One synchronous request/reply channel per CMP server, e.g. HTTP POST
//! of DER-encoded PKIMessages with `Content-Type: application/pkixcmp`.
//! The engine blocks on `round_trip` and treats it as its only network
//! suspension point.

use std::time::Duration;

use thiserror::Error;

use crate::body::Message;

/// Transport failures
#[derive(Debug, Error)]
pub enum TransportError {
    /// No reply arrived within the per-message timeout
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The server could not be reached
    #[error("server not reachable: {0}")]
    Unreachable(String),

    /// The channel failed mid-exchange
    #[error("I/O error: {0}")]
    Io(String),

    /// The reply could not be understood as a CMP message
    #[error("bad reply: {0}")]
    BadReply(String),
}

/// Port for carrying one CMP request to the server and back
///
/// Implementations must preserve the encoded bytes of the message;
/// the engine asserts this by re-decoding on both sides.
pub trait Transport {
    /// Send `req` and block until the reply arrives or `timeout` elapses
    fn round_trip(
        &mut self,
        req: &Message,
        timeout: Duration,
    ) -> std::result::Result<Message, TransportError>;
}
