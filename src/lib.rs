//! # wscore — embeddable WebSocket endpoint
//!
//! `wscore` is an RFC 6455 WebSocket implementation that layers on any
//! byte-oriented, connection-oriented stream exposing the small
//! [`Transport`] surface (`read`, `write`, `available`, `connected`,
//! `close`). It speaks both roles: a client initiates the HTTP upgrade, a
//! server accepts it, and afterwards both sides exchange data and control
//! frames over one full-duplex connection.
//!
//! ## Features
//!
//! - **Transport-agnostic**: plug in a TCP socket, an already-encrypted
//!   TLS stream, or an in-memory pipe.
//! - **Single-threaded cooperative**: no executor; blocking operations
//!   poll the transport under a socket timeout and call its yield hook.
//! - **Byte-stream API**: `available`/`read`/`peek`/`write` treat the
//!   frame sequence as a stream of bytes; fragmentation and control
//!   frames are handled underneath.
//! - **Fixed memory**: payloads flow through caller buffers; a frame of
//!   any size costs a 14-byte header buffer and a 128-byte masking
//!   scratch.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use wscore::{Config, Connection};
//!
//! // Client: the transport is already connected to the server.
//! let mut conn = Connection::client(socket, Config::new().with_path("/chat"));
//! conn.connect("example.com")?;
//! conn.write(b"hello", true, false);
//!
//! // Server: the transport is a freshly accepted socket.
//! let mut conn = Connection::server(socket, Config::default());
//! conn.accept()?;
//! let mut buf = [0u8; 256];
//! let n = conn.read(&mut buf);
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod handshake;
pub mod http;
pub mod protocol;
pub mod transport;

pub use config::{Config, DEFAULT_SOCKET_TIMEOUT};
pub use connection::{Connection, ConnectionState, DefaultHooks, Hooks, Role};
pub use error::{Error, Result};
pub use handshake::{compute_accept_key, WS_GUID};
pub use http::MAX_HTTP_LINE_LENGTH;
pub use protocol::{apply_mask, close_code, FrameHead, OpCode};
pub use transport::Transport;
