//! Shared in-memory transport for integration tests.

#![allow(dead_code)]

use std::time::{Duration, Instant};

use wscore::Transport;

/// Scripted transport: reads come from a prepared input buffer, writes are
/// captured, and the clock is virtual — `yield_now` advances it, so timeout
/// paths run instantly and deterministically.
pub struct MockTransport {
    input: Vec<u8>,
    cursor: usize,
    output: Vec<u8>,
    connected: bool,
    start: Instant,
    elapsed: Duration,
    write_limit: Option<usize>,
    responder: Option<Box<dyn FnMut(&[u8]) -> Vec<u8>>>,
}

impl MockTransport {
    pub fn new(input: &[u8]) -> Self {
        Self {
            input: input.to_vec(),
            cursor: 0,
            output: Vec::new(),
            connected: true,
            start: Instant::now(),
            elapsed: Duration::ZERO,
            write_limit: None,
            responder: None,
        }
    }

    pub fn idle() -> Self {
        Self::new(&[])
    }

    /// Queue a reply that is generated from the captured output the first
    /// time the reader has to wait. Lets a test answer a request whose
    /// contents (e.g. a random nonce) are not known up front.
    pub fn with_responder(mut self, responder: impl FnMut(&[u8]) -> Vec<u8> + 'static) -> Self {
        self.responder = Some(Box::new(responder));
        self
    }

    /// Cap how many bytes a single `write` call accepts, to exercise the
    /// partial-write path.
    pub fn with_write_limit(mut self, limit: usize) -> Self {
        self.write_limit = Some(limit);
        self
    }

    pub fn output(&self) -> &[u8] {
        &self.output
    }

    pub fn output_str(&self) -> &str {
        std::str::from_utf8(&self.output).expect("non-UTF-8 output")
    }

    pub fn remaining_input(&self) -> usize {
        self.input.len() - self.cursor
    }

    pub fn feed(&mut self, bytes: &[u8]) {
        self.input.extend_from_slice(bytes);
    }

    pub fn disconnect(&mut self) {
        self.connected = false;
    }
}

impl Transport for MockTransport {
    fn read(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.input.len() - self.cursor);
        buf[..n].copy_from_slice(&self.input[self.cursor..self.cursor + n]);
        self.cursor += n;
        n
    }

    fn write(&mut self, buf: &[u8]) -> usize {
        if !self.connected {
            return 0;
        }
        let n = self.write_limit.map_or(buf.len(), |limit| limit.min(buf.len()));
        self.output.extend_from_slice(&buf[..n]);
        n
    }

    fn available(&self) -> usize {
        self.input.len() - self.cursor
    }

    fn connected(&self) -> bool {
        self.connected
    }

    fn close(&mut self) {
        self.connected = false;
    }

    fn peek(&mut self) -> Option<u8> {
        self.input.get(self.cursor).copied()
    }

    fn now(&self) -> Instant {
        self.start + self.elapsed
    }

    fn yield_now(&mut self) {
        self.elapsed += Duration::from_millis(10);
        if self.cursor == self.input.len() {
            if let Some(mut responder) = self.responder.take() {
                let reply = responder(&self.output);
                self.input.extend_from_slice(&reply);
            }
        }
    }
}

/// Masked `"Hello"` text frame using the RFC 6455 sample key.
pub const MASKED_HELLO: [u8; 11] = [
    0x81, 0x85, 0x37, 0xfa, 0x21, 0x3d, 0x7f, 0x9f, 0x4d, 0x51, 0x58,
];

/// Build a masked frame as a client would send it.
pub fn masked_frame(byte0: u8, key: [u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut frame = vec![byte0];
    if payload.len() <= 125 {
        frame.push(0x80 | payload.len() as u8);
    } else if payload.len() <= 0xFFFF {
        frame.push(0x80 | 126);
        frame.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    } else {
        frame.push(0x80 | 127);
        frame.extend_from_slice(&(payload.len() as u64).to_be_bytes());
    }
    frame.extend_from_slice(&key);
    frame.extend(
        payload
            .iter()
            .enumerate()
            .map(|(i, byte)| byte ^ key[i & 3]),
    );
    frame
}
