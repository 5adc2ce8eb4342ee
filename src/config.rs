//! Connection configuration.

use std::time::Duration;

/// Default inactivity deadline for blocking socket operations.
pub const DEFAULT_SOCKET_TIMEOUT: Duration = Duration::from_millis(1000);

/// WebSocket endpoint configuration.
///
/// The same configuration type serves both roles; `path` only matters for
/// clients and `protocol` feeds subprotocol negotiation on either side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Request target sent in the client handshake.
    ///
    /// Default: `/`
    pub path: String,

    /// Subprotocol token to negotiate.
    ///
    /// `None` means "any": a client omits the `Sec-WebSocket-Protocol`
    /// header, a server accepts whatever the client offers (or nothing).
    pub protocol: Option<String>,

    /// Inactivity deadline applied to each blocking read and each HTTP
    /// handshake line. Exceeding it drops the connection.
    ///
    /// Default: 1000 ms
    pub socket_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            protocol: None,
            socket_timeout: DEFAULT_SOCKET_TIMEOUT,
        }
    }
}

impl Config {
    /// Create a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the client request target.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Set the subprotocol token to negotiate.
    #[must_use]
    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = Some(protocol.into());
        self
    }

    /// Set the socket timeout.
    #[must_use]
    pub fn with_socket_timeout(mut self, timeout: Duration) -> Self {
        self.socket_timeout = timeout;
        self
    }
}
