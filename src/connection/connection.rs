//! The connection: bounded I/O, codec glue, control pump, streaming API.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use tracing::{debug, warn};

use crate::config::Config;
use crate::connection::{ConnectionState, DefaultHooks, Hooks, Role};
use crate::error::{Error, Result};
use crate::handshake;
use crate::http;
use crate::protocol::{apply_mask, close_code, FrameHead, OpCode, MAX_CONTROL_PAYLOAD, MAX_HEAD_LEN};
use crate::transport::Transport;

/// Outbound masking scratch size. Masked payloads are copied and XORed in
/// chunks of this many bytes so the caller's buffer is never mutated.
const MASK_SCRATCH: usize = 128;

fn entropy_seed() -> u32 {
    let mut buf = [0u8; 4];
    if getrandom::getrandom(&mut buf).is_ok() {
        u32::from_le_bytes(buf)
    } else {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u32)
            .unwrap_or(0x5DEE_CE66)
    }
}

/// Per-connection source of masking keys and handshake nonces.
struct KeySource {
    counter: u32,
}

impl KeySource {
    fn new() -> Self {
        Self {
            counter: entropy_seed(),
        }
    }

    fn next_key(&mut self) -> [u8; 4] {
        self.counter = self.counter.wrapping_add(0x9E37_79B9);
        let mut x = self.counter;
        x = x.wrapping_mul(0x85EB_CA6B);
        x ^= x >> 13;
        x = x.wrapping_mul(0xC2B2_AE35);
        x ^= x >> 16;
        x.to_be_bytes()
    }

    fn nonce(&mut self) -> [u8; 16] {
        let mut bytes = [0u8; 16];
        if getrandom::getrandom(&mut bytes).is_err() {
            for chunk in bytes.chunks_exact_mut(4) {
                chunk.copy_from_slice(&self.next_key());
            }
        }
        bytes
    }
}

/// A WebSocket session over a byte-oriented transport.
///
/// One value per session, discriminated by [`Role`]. The connection owns
/// the transport exclusively and is single-threaded cooperative: blocking
/// operations poll the transport and call its yield hook between polls, and
/// the inbound control pump only runs at frame boundaries, never in the
/// middle of an outbound frame.
///
/// ## Example
///
/// ```rust,ignore
/// use wscore::{Config, Connection};
///
/// let mut conn = Connection::client(socket, Config::new().with_path("/chat"));
/// conn.connect("example.com")?;
/// conn.write(b"hello", true, false);
/// ```
pub struct Connection<T, H = DefaultHooks> {
    transport: T,
    hooks: H,
    role: Role,
    config: Config,
    state: ConnectionState,
    in_frame_size: u64,
    in_frame_pos: u64,
    in_mask: [u8; 4],
    out_mask: [u8; 4],
    keys: KeySource,
    write_continue: bool,
    closing: bool,
    accepted_protocol: Option<String>,
}

impl<T: Transport> Connection<T> {
    /// Create a client connection over a transport that is already
    /// connected to the server. Call [`Connection::connect`] to upgrade.
    pub fn client(transport: T, config: Config) -> Self {
        Self::with_hooks(transport, Role::Client, config, DefaultHooks)
    }

    /// Create a server connection over a freshly accepted transport. Call
    /// [`Connection::accept`] to process the client's upgrade request.
    pub fn server(transport: T, config: Config) -> Self {
        Self::with_hooks(transport, Role::Server, config, DefaultHooks)
    }

    /// Wrap a transport whose upgrade handshake already happened elsewhere.
    /// The connection starts in the open state.
    pub fn established(transport: T, role: Role, config: Config) -> Self {
        let mut conn = Self::with_hooks(transport, role, config, DefaultHooks);
        conn.state = ConnectionState::Open;
        conn
    }
}

impl<T: Transport, H: Hooks> Connection<T, H> {
    /// Create a connection with custom [`Hooks`].
    pub fn with_hooks(transport: T, role: Role, config: Config, hooks: H) -> Self {
        Self {
            transport,
            hooks,
            role,
            config,
            state: ConnectionState::Handshaking,
            in_frame_size: 0,
            in_frame_pos: 0,
            in_mask: [0; 4],
            out_mask: [0; 4],
            keys: KeySource::new(),
            write_continue: false,
            closing: false,
            accepted_protocol: None,
        }
    }

    /// Wrap an already-upgraded transport with custom [`Hooks`].
    pub fn established_with_hooks(transport: T, role: Role, config: Config, hooks: H) -> Self {
        let mut conn = Self::with_hooks(transport, role, config, hooks);
        conn.state = ConnectionState::Open;
        conn
    }

    /// This endpoint's role.
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// The configuration this connection was built with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Transport liveness.
    #[must_use]
    pub fn connected(&self) -> bool {
        self.transport.connected()
    }

    /// The subprotocol negotiated during the server handshake, if any.
    #[must_use]
    pub fn accepted_protocol(&self) -> Option<&str> {
        self.accepted_protocol.as_deref()
    }

    /// Push buffered outbound bytes toward the peer.
    pub fn flush(&mut self) {
        self.transport.flush();
    }

    /// Shared access to the underlying transport.
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Consume the connection and release the transport.
    #[must_use]
    pub fn into_transport(self) -> T {
        self.transport
    }

    // ------------------------------------------------------------------
    // Handshake entry points
    // ------------------------------------------------------------------

    /// Run the client handshake over the connected transport. `host` fills
    /// the `Host` header. On failure the transport is closed.
    ///
    /// # Errors
    ///
    /// [`Error::HandshakeFailed`] if the server's response is not a valid
    /// acceptance, plus any transport-level error.
    pub fn connect(&mut self, host: &str) -> Result<()> {
        if self.role != Role::Client {
            return Err(Error::HandshakeFailed(
                "connect() requires the client role".into(),
            ));
        }
        handshake::client_handshake(self, host)
    }

    /// Read and answer the client's upgrade request. On rejection the HTTP
    /// error response is sent and the transport closed.
    ///
    /// # Errors
    ///
    /// [`Error::HandshakeRejected`] carrying the HTTP status sent to the
    /// peer, plus any transport-level error.
    pub fn accept(&mut self) -> Result<()> {
        if self.role != Role::Server {
            return Err(Error::HandshakeFailed(
                "accept() requires the server role".into(),
            ));
        }
        handshake::server_handshake(self)
    }

    // ------------------------------------------------------------------
    // Streaming API
    // ------------------------------------------------------------------

    /// Bytes that can be read right now without blocking.
    ///
    /// Never exceeds the remainder of the current data frame: bytes past
    /// the frame boundary may be a header, so only the payload remainder is
    /// certain. Pumps the control loop when idle between frames.
    pub fn available(&mut self) -> usize {
        if !self.state.can_receive() {
            return 0;
        }
        let mut frame_remain = self.in_frame_size - self.in_frame_pos;
        if frame_remain == 0 {
            if !self.await_data_frame() {
                return 0;
            }
            frame_remain = self.in_frame_size - self.in_frame_pos;
        }
        frame_remain.min(self.transport.available() as u64) as usize
    }

    /// Read up to `buf.len()` bytes from the current data frame. Returns 0
    /// when nothing is readable right now; that is not end-of-stream.
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        if !self.state.can_receive() {
            return 0;
        }
        if self.in_frame_pos >= self.in_frame_size && !self.await_data_frame() {
            return 0;
        }
        let frame_remain = self.in_frame_size - self.in_frame_pos;
        let len = frame_remain.min(buf.len() as u64) as usize;
        self.read_payload(&mut buf[..len], false).unwrap_or(0)
    }

    /// Read a single payload byte.
    pub fn read_byte(&mut self) -> Option<u8> {
        let mut byte = [0u8; 1];
        (self.read(&mut byte) == 1).then(|| byte[0])
    }

    /// The next payload byte, unmasked, without consuming it.
    pub fn peek(&mut self) -> Option<u8> {
        if self.available() == 0 {
            return None;
        }
        let byte = self.transport.peek()?;
        Some(if self.role.expects_masked() {
            byte ^ self.in_mask[(self.in_frame_pos & 3) as usize]
        } else {
            byte
        })
    }

    /// Emit one data frame. Returns the number of payload bytes written
    /// (0 if the connection cannot send).
    ///
    /// The opcode is CONTINUATION if the previous data frame had
    /// `fin == false`, otherwise BINARY or TEXT according to `binary`.
    /// Passing `fin == false` makes the *next* write a continuation.
    pub fn write(&mut self, buf: &[u8], fin: bool, binary: bool) -> usize {
        if self.closing || !self.state.can_send() {
            return 0;
        }
        let opcode = if self.write_continue {
            OpCode::Continuation
        } else if binary {
            OpCode::Binary
        } else {
            OpCode::Text
        };
        self.write_continue = !fin;
        self.write_frame(opcode, fin, buf).unwrap_or(0)
    }

    /// Emit a single byte as a final binary frame.
    pub fn write_byte(&mut self, byte: u8) -> usize {
        self.write(&[byte], true, true)
    }

    /// Emit a PING frame.
    ///
    /// # Errors
    ///
    /// [`Error::ControlFrameTooLarge`] over 125 payload bytes,
    /// [`Error::ConnectionClosed`] once closing.
    pub fn ping(&mut self, payload: &[u8]) -> Result<()> {
        self.control(OpCode::Ping, payload)
    }

    /// Emit an unsolicited PONG frame.
    ///
    /// # Errors
    ///
    /// Same as [`Connection::ping`].
    pub fn pong(&mut self, payload: &[u8]) -> Result<()> {
        self.control(OpCode::Pong, payload)
    }

    fn control(&mut self, opcode: OpCode, payload: &[u8]) -> Result<()> {
        if payload.len() as u64 > MAX_CONTROL_PAYLOAD {
            return Err(Error::ControlFrameTooLarge(payload.len() as u64));
        }
        if self.closing || !self.state.can_send() {
            return Err(Error::ConnectionClosed);
        }
        self.write_frame(opcode, true, payload)?;
        Ok(())
    }

    /// Begin the local close handshake: emit a CLOSE frame and stop
    /// accepting outbound data. The payload is empty for `code == 0`,
    /// otherwise the two-byte big-endian code.
    ///
    /// # Errors
    ///
    /// Transport-level errors from sending the frame.
    pub fn close(&mut self, code: u16) -> Result<()> {
        debug!(code, "sending close");
        self.closing = true;
        if self.state != ConnectionState::Closed {
            self.state = ConnectionState::Closing;
        }
        let payload = code.to_be_bytes();
        let len = if code == 0 { 0 } else { 2 };
        self.write_frame(OpCode::Close, true, &payload[..len])
            .map(drop)
    }

    /// Close with code 1000 and drain inbound frames until the peer closes
    /// or the socket timeout elapses, then release the transport.
    pub fn stop(&mut self) {
        self.stop_with(close_code::NORMAL);
    }

    /// [`Connection::stop`] with an explicit close code.
    pub fn stop_with(&mut self, code: u16) {
        let _ = self.close(code);

        let timeout = self.config.socket_timeout;
        let start = self.transport.now();
        let mut sink = [0u8; MASK_SCRATCH];

        while self.transport.connected() && self.transport.now().duration_since(start) <= timeout {
            if !self.await_data_frame() {
                // The pump may have consumed the peer's CLOSE and released
                // the transport; don't keep polling a dead socket.
                if !self.transport.connected() || self.state == ConnectionState::Closed {
                    break;
                }
                self.transport.yield_now();
                continue;
            }

            // Data frame while closing: discard its payload.
            while self.in_frame_pos < self.in_frame_size {
                if !self.transport.connected()
                    || self.transport.now().duration_since(start) > timeout
                {
                    break;
                }
                let remain = self.in_frame_size - self.in_frame_pos;
                let len = remain.min(sink.len() as u64) as usize;
                match self.read_payload(&mut sink[..len], false) {
                    Ok(0) => self.transport.yield_now(),
                    Ok(_) => {}
                    Err(_) => break,
                }
            }
        }

        self.transport.close();
        self.state = ConnectionState::Closed;
    }

    // ------------------------------------------------------------------
    // Control pump
    // ------------------------------------------------------------------

    /// Pump inbound frames until a non-empty data frame starts, handling
    /// control frames inline. Returns `true` iff payload bytes are waiting
    /// in a data frame. Only runs while the transport has buffered bytes,
    /// so it never blocks between frames.
    fn await_data_frame(&mut self) -> bool {
        while self.transport.available() > 0 {
            let opcode = match self.read_head() {
                Ok(opcode) => opcode,
                Err(err) => {
                    if let Some(code) = err.close_code() {
                        self.abort(code, &err);
                    }
                    return false;
                }
            };

            match opcode {
                OpCode::Continuation | OpCode::Text | OpCode::Binary => {
                    if self.in_frame_size > 0 {
                        return true;
                    }
                    // Empty data frame: nothing for the caller, keep going.
                }
                OpCode::Close => {
                    self.handle_close();
                    return false;
                }
                OpCode::Ping => {
                    let mut payload = [0u8; MAX_CONTROL_PAYLOAD as usize];
                    let len = self.in_frame_size as usize;
                    if self.read_payload(&mut payload[..len], true).is_err() {
                        return false;
                    }
                    let _ = self.write_frame(OpCode::Pong, true, &payload[..len]);
                }
                OpCode::Pong => {
                    let mut payload = [0u8; MAX_CONTROL_PAYLOAD as usize];
                    let len = self.in_frame_size as usize;
                    if self.read_payload(&mut payload[..len], true).is_err() {
                        return false;
                    }
                    self.hooks.on_pong(&payload[..len]);
                }
            }
        }
        false
    }

    fn handle_close(&mut self) {
        let mut payload = [0u8; MAX_CONTROL_PAYLOAD as usize];
        let len = self.in_frame_size as usize;
        if self.read_payload(&mut payload[..len], true).is_ok() {
            let code = if len >= 2 {
                u16::from_be_bytes([payload[0], payload[1]])
            } else {
                0
            };
            debug!(code, "close received");
            if !self.closing {
                // Reply right away: no data frames may follow anyway.
                let _ = self.close(code);
            }
        }
        self.transport.close();
        self.state = ConnectionState::Closed;
    }

    fn abort(&mut self, code: u16, err: &Error) {
        warn!(code, %err, "protocol violation, dropping connection");
        let _ = self.close(code);
        // The peer is broken; don't wait for its close reply.
        self.discard_incoming();
        self.transport.close();
        self.state = ConnectionState::Closed;
    }

    // ------------------------------------------------------------------
    // Frame codec glue
    // ------------------------------------------------------------------

    fn read_head(&mut self) -> Result<OpCode> {
        let mut prefix = [0u8; 2];
        self.read_exact(&mut prefix)?;

        // One more read covers extended length and masking key together.
        let mut rest = [0u8; MAX_HEAD_LEN - 2];
        let need = FrameHead::remainder_len(prefix[1]);
        self.read_exact(&mut rest[..need])?;

        let head = FrameHead::decode(prefix, &rest[..need])?;
        head.validate(self.role)?;

        debug!(
            opcode = ?head.opcode,
            fin = head.fin,
            len = head.payload_len,
            "frame in"
        );

        self.in_frame_size = head.payload_len;
        self.in_frame_pos = 0;
        if let Some(key) = head.mask {
            self.in_mask = key;
        }
        Ok(head.opcode)
    }

    fn write_head(&mut self, opcode: OpCode, fin: bool, payload_len: u64) -> Result<()> {
        debug!(?opcode, fin, len = payload_len, "frame out");

        let mask = if self.role.must_mask() {
            let key = self.keys.next_key();
            self.out_mask = key;
            Some(key)
        } else {
            None
        };

        let head = FrameHead {
            fin,
            opcode,
            payload_len,
            mask,
        };
        let mut buf = [0u8; MAX_HEAD_LEN];
        let len = head.encode(&mut buf);
        self.write_all(&buf[..len])
    }

    fn write_payload(&mut self, payload: &[u8]) -> Result<()> {
        if !self.role.must_mask() {
            return self.write_all(payload);
        }

        // Mask through a fixed scratch so the caller's buffer stays
        // untouched; the key offset carries across chunks.
        let mut scratch = [0u8; MASK_SCRATCH];
        let mut written = 0;
        while written < payload.len() {
            let chunk = (payload.len() - written).min(MASK_SCRATCH);
            scratch[..chunk].copy_from_slice(&payload[written..written + chunk]);
            apply_mask(&mut scratch[..chunk], self.out_mask, written as u64);
            self.write_all(&scratch[..chunk])?;
            written += chunk;
        }
        Ok(())
    }

    fn write_frame(&mut self, opcode: OpCode, fin: bool, payload: &[u8]) -> Result<usize> {
        self.write_head(opcode, fin, payload.len() as u64)?;
        self.write_payload(payload)?;
        Ok(payload.len())
    }

    /// Read payload bytes of the current frame, unmasking inbound client
    /// data. `exact` pulls the whole slice under the socket timeout;
    /// otherwise a single transport read decides the count.
    fn read_payload(&mut self, buf: &mut [u8], exact: bool) -> Result<usize> {
        let len = if exact {
            self.read_exact(buf)?;
            buf.len()
        } else {
            self.transport.read(buf)
        };
        if self.role.expects_masked() {
            apply_mask(&mut buf[..len], self.in_mask, self.in_frame_pos);
        }
        self.in_frame_pos += len as u64;
        Ok(len)
    }

    // ------------------------------------------------------------------
    // Bounded I/O
    // ------------------------------------------------------------------

    /// Accumulate exactly `buf.len()` bytes, yielding between polls.
    /// Timeout force-closes the transport; both failures are fatal.
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let timeout = self.config.socket_timeout;
        let start = self.transport.now();
        let mut filled = 0;

        while filled < buf.len() {
            if self.transport.available() == 0 {
                if !self.transport.connected() {
                    self.state = ConnectionState::Closed;
                    return Err(Error::ConnectionLost);
                }
                if self.transport.now().duration_since(start) >= timeout {
                    self.transport.close();
                    self.state = ConnectionState::Closed;
                    return Err(Error::Timeout(timeout));
                }
                self.transport.yield_now();
                continue;
            }
            filled += self.transport.read(&mut buf[filled..]);
        }
        Ok(())
    }

    /// Write the whole buffer across partial writes. Best effort: no
    /// timeout, fails only if the peer goes away.
    pub(crate) fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        let mut written = 0;
        while written < buf.len() {
            if !self.transport.connected() {
                self.state = ConnectionState::Closed;
                return Err(Error::ConnectionLost);
            }
            let accepted = self.transport.write(&buf[written..]);
            if accepted == 0 {
                self.transport.yield_now();
            }
            written += accepted;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Handshake plumbing
    // ------------------------------------------------------------------

    pub(crate) fn read_http_line<'a>(&mut self, buf: &'a mut [u8]) -> Result<&'a str> {
        http::read_line(&mut self.transport, buf, self.config.socket_timeout)
    }

    pub(crate) fn discard_incoming(&mut self) {
        let mut sink = [0u8; MASK_SCRATCH];
        while self.transport.available() > 0 {
            if self.transport.read(&mut sink) == 0 {
                break;
            }
        }
    }

    pub(crate) fn next_nonce(&mut self) -> String {
        BASE64.encode(self.keys.nonce())
    }

    pub(crate) fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub(crate) fn hooks_mut(&mut self) -> &mut H {
        &mut self.hooks
    }

    pub(crate) fn set_open(&mut self) {
        self.state = ConnectionState::Open;
    }

    pub(crate) fn set_closed(&mut self) {
        self.state = ConnectionState::Closed;
    }

    pub(crate) fn set_accepted_protocol(&mut self, protocol: Option<String>) {
        self.accepted_protocol = protocol;
    }
}
