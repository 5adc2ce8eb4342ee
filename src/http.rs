//! Bounded reader for CRLF-terminated HTTP handshake lines.

use std::time::Duration;

use tracing::{trace, warn};

use crate::error::{Error, Result};
use crate::transport::Transport;

/// Longest accepted HTTP line during the handshake, terminator excluded.
///
/// The reader takes a caller-provided buffer, so an embedder that needs
/// longer request lines can simply pass a bigger one; this is the size the
/// endpoint itself uses.
pub const MAX_HTTP_LINE_LENGTH: usize = 128;

/// Read one `\r\n`-terminated ASCII line into `buf`.
///
/// Bytes below 0x20 (other than the terminating CR) and 0x7F are illegal,
/// and a CR must be immediately followed by LF. While no byte is buffered
/// the reader yields cooperatively until data arrives, the peer disconnects
/// or `timeout` elapses.
///
/// # Errors
///
/// - [`Error::LineTooLong`] if the line outgrows `buf`.
/// - [`Error::HttpViolation`] on an illegal character or a lone CR.
/// - [`Error::ConnectionLost`] if the peer goes away mid-line.
/// - [`Error::Timeout`] if `timeout` passes without a byte. The transport
///   is left open so the caller can still send an error response.
pub(crate) fn read_line<'a, T: Transport>(
    transport: &mut T,
    buf: &'a mut [u8],
    timeout: Duration,
) -> Result<&'a str> {
    let start = transport.now();
    let mut pos = 0;
    let mut ending = false;

    loop {
        let byte = match transport.read_byte() {
            Some(byte) => byte,
            None => {
                if !transport.connected() {
                    return Err(Error::ConnectionLost);
                }
                if transport.now().duration_since(start) > timeout {
                    return Err(Error::Timeout(timeout));
                }
                transport.yield_now();
                continue;
            }
        };

        if ending {
            if byte != b'\n' {
                warn!("HTTP line CR not followed by LF");
                return Err(Error::HttpViolation("CR not followed by LF"));
            }
            let line = std::str::from_utf8(&buf[..pos])
                .map_err(|_| Error::HttpViolation("non-ASCII byte in line"))?;
            trace!(line, "HTTP line received");
            return Ok(line);
        }

        if byte == b'\r' {
            ending = true;
        } else if byte < 0x20 || byte == 0x7F {
            warn!(byte, "illegal character in HTTP line");
            return Err(Error::HttpViolation("control character in line"));
        } else if pos == buf.len() {
            return Err(Error::LineTooLong(buf.len()));
        } else {
            buf[pos] = byte;
            pos += 1;
        }
    }
}
