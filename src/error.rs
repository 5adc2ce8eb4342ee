//! Error types for the WebSocket endpoint.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for endpoint operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while establishing or operating a connection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The transport disconnected during an operation.
    #[error("connection lost")]
    ConnectionLost,

    /// A blocking operation exceeded the socket timeout. The transport has
    /// been force-closed.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// The connection is closed or closing; no further data may be sent.
    #[error("connection closed")]
    ConnectionClosed,

    /// Malformed HTTP received during the handshake.
    #[error("HTTP protocol violation: {0}")]
    HttpViolation(&'static str),

    /// An HTTP line exceeded the line buffer.
    #[error("HTTP line too long (max {0} bytes)")]
    LineTooLong(usize),

    /// The client handshake did not complete.
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    /// The server refused the upgrade request with an HTTP status.
    #[error("handshake rejected: {status} {reason}")]
    HandshakeRejected {
        /// HTTP status code sent to the peer.
        status: u16,
        /// Reason phrase sent to the peer.
        reason: &'static str,
    },

    /// A reserved opcode was received.
    #[error("reserved opcode: {0:#x}")]
    ReservedOpcode(u8),

    /// A control frame arrived with FIN=0.
    #[error("control frames cannot be fragmented")]
    FragmentedControlFrame,

    /// A control frame payload exceeded 125 bytes.
    #[error("control frame payload too large: {0} bytes (max 125)")]
    ControlFrameTooLarge(u64),

    /// Reserved header bits were set with no extension negotiated.
    #[error("reserved bits set without negotiated extension")]
    ReservedBitsSet,

    /// An inbound client frame was not masked.
    #[error("client frame must be masked")]
    UnmaskedClientFrame,

    /// An inbound server frame was masked.
    #[error("server frame must not be masked")]
    MaskedServerFrame,

    /// A payload length does not fit this platform's address space.
    #[error("message too big: {0} bytes")]
    MessageTooBig(u64),

    /// Any other violation of the framing rules.
    #[error("protocol violation: {0}")]
    ProtocolViolation(&'static str),
}

impl Error {
    /// The close code to send before dropping the connection, if this error
    /// is a wire-level violation.
    #[must_use]
    pub const fn close_code(&self) -> Option<u16> {
        match self {
            Error::ReservedOpcode(_)
            | Error::FragmentedControlFrame
            | Error::ControlFrameTooLarge(_)
            | Error::ReservedBitsSet
            | Error::UnmaskedClientFrame
            | Error::MaskedServerFrame
            | Error::ProtocolViolation(_) => Some(crate::protocol::close_code::PROTOCOL_ERROR),
            Error::MessageTooBig(_) => Some(crate::protocol::close_code::MESSAGE_TOO_BIG),
            _ => None,
        }
    }
}
