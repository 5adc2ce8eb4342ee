//! Frame header encoding, decoding and validation (RFC 6455 section 5.2).
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
//! |I|S|S|S|  (4)  |A|     (7)     |             (16/64)           |
//! |N|V|V|V|       |S|             |   (if payload len==126/127)   |
//! | |1|2|3|       |K|             |                               |
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |                Masking key (if MASK set)                      |
//! +---------------------------------------------------------------+
//! ```
//!
//! Only the header lives here. Payload bytes never pass through this module;
//! they flow between the transport and caller buffers, so a frame of any
//! size costs a 14-byte header buffer and nothing else.

use crate::connection::Role;
use crate::error::{Error, Result};
use crate::protocol::OpCode;

/// Maximum payload of a control frame (RFC 6455 section 5.5).
pub const MAX_CONTROL_PAYLOAD: u64 = 125;

/// Largest possible header: 2 prefix bytes, 8 extended-length bytes,
/// 4 masking-key bytes.
pub const MAX_HEAD_LEN: usize = 14;

/// A parsed or to-be-written frame header.
///
/// `mask` holds the key exactly as it appears on the wire; `None` means the
/// MASK bit is clear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHead {
    /// Final fragment flag.
    pub fin: bool,
    /// Frame opcode.
    pub opcode: OpCode,
    /// Payload length in bytes.
    pub payload_len: u64,
    /// Masking key, present iff the payload is masked.
    pub mask: Option<[u8; 4]>,
}

impl FrameHead {
    /// Serialize the header into `buf`, returning the number of bytes used.
    ///
    /// The length prefix is minimal: one byte up to 125, `126` + u16 up to
    /// 0xFFFF, `127` + u64 beyond.
    pub fn encode(&self, buf: &mut [u8; MAX_HEAD_LEN]) -> usize {
        buf[0] = self.opcode.as_u8() | if self.fin { 0x80 } else { 0 };

        let mask_bit = if self.mask.is_some() { 0x80 } else { 0 };
        let mut pos = 2;
        if self.payload_len <= 125 {
            buf[1] = self.payload_len as u8 | mask_bit;
        } else if self.payload_len <= 0xFFFF {
            buf[1] = 126 | mask_bit;
            buf[2..4].copy_from_slice(&(self.payload_len as u16).to_be_bytes());
            pos = 4;
        } else {
            buf[1] = 127 | mask_bit;
            buf[2..10].copy_from_slice(&self.payload_len.to_be_bytes());
            pos = 10;
        }

        if let Some(key) = self.mask {
            buf[pos..pos + 4].copy_from_slice(&key);
            pos += 4;
        }

        pos
    }

    /// How many header bytes follow the two-byte prefix, given the second
    /// prefix byte. Lets the reader fetch the whole remainder in one read
    /// instead of going field by field.
    #[must_use]
    pub fn remainder_len(byte1: u8) -> usize {
        let extended = match byte1 & 0x7F {
            126 => 2,
            127 => 8,
            _ => 0,
        };
        extended + if byte1 & 0x80 != 0 { 4 } else { 0 }
    }

    /// Parse a header from its two-byte prefix and the remainder bytes
    /// (`rest.len()` must equal [`FrameHead::remainder_len`] of the prefix).
    ///
    /// # Errors
    ///
    /// - [`Error::ReservedBitsSet`] if any RSV bit is set (no extensions
    ///   are ever negotiated).
    /// - [`Error::ReservedOpcode`] for opcodes 0x3–0x7 and 0xB–0xF.
    /// - [`Error::ProtocolViolation`] if a 64-bit length has its top bit
    ///   set.
    /// - [`Error::MessageTooBig`] if the length does not fit `usize`.
    pub fn decode(prefix: [u8; 2], rest: &[u8]) -> Result<Self> {
        debug_assert_eq!(rest.len(), Self::remainder_len(prefix[1]));

        if prefix[0] & 0x70 != 0 {
            return Err(Error::ReservedBitsSet);
        }
        let fin = prefix[0] & 0x80 != 0;
        let opcode = OpCode::from_u8(prefix[0] & 0x0F)?;

        let masked = prefix[1] & 0x80 != 0;
        let (payload_len, mask_at) = match prefix[1] & 0x7F {
            126 => (u64::from(u16::from_be_bytes([rest[0], rest[1]])), 2),
            127 => {
                let len = u64::from_be_bytes([
                    rest[0], rest[1], rest[2], rest[3], rest[4], rest[5], rest[6], rest[7],
                ]);
                if len & (1 << 63) != 0 {
                    return Err(Error::ProtocolViolation("extended length top bit set"));
                }
                (len, 8)
            }
            short => (u64::from(short), 0),
        };

        if usize::try_from(payload_len).is_err() {
            return Err(Error::MessageTooBig(payload_len));
        }

        let mask = masked.then(|| {
            [
                rest[mask_at],
                rest[mask_at + 1],
                rest[mask_at + 2],
                rest[mask_at + 3],
            ]
        });

        Ok(Self {
            fin,
            opcode,
            payload_len,
            mask,
        })
    }

    /// Check the header against the rules that depend on frame class and
    /// connection role.
    ///
    /// # Errors
    ///
    /// - [`Error::FragmentedControlFrame`] for a control frame with FIN=0.
    /// - [`Error::ControlFrameTooLarge`] for a control payload over 125
    ///   bytes.
    /// - [`Error::UnmaskedClientFrame`] / [`Error::MaskedServerFrame`] when
    ///   the MASK bit contradicts the peer's role.
    pub fn validate(&self, role: Role) -> Result<()> {
        if self.opcode.is_control() {
            if !self.fin {
                return Err(Error::FragmentedControlFrame);
            }
            if self.payload_len > MAX_CONTROL_PAYLOAD {
                return Err(Error::ControlFrameTooLarge(self.payload_len));
            }
        }

        match (self.mask.is_some(), role.expects_masked()) {
            (false, true) => Err(Error::UnmaskedClientFrame),
            (true, false) => Err(Error::MaskedServerFrame),
            _ => Ok(()),
        }
    }
}
