//! Wire-format layer: opcodes, masking, frame headers.

pub mod frame;
pub mod mask;
pub mod opcode;

pub use frame::{FrameHead, MAX_CONTROL_PAYLOAD, MAX_HEAD_LEN};
pub use mask::apply_mask;
pub use opcode::OpCode;

/// Close codes the endpoint emits (RFC 6455 section 7.4).
pub mod close_code {
    /// Normal closure.
    pub const NORMAL: u16 = 1000;
    /// Protocol error.
    pub const PROTOCOL_ERROR: u16 = 1002;
    /// Message too big for the receiver.
    pub const MESSAGE_TOO_BIG: u16 = 1009;
}
