//! Wire protocol for the gpsbridge RPC link.
//!
//! Every message is a fixed-size frame: a 4-byte little-endian operation
//! code followed by exactly [`PAYLOAD_CAPACITY`] payload bytes. There is no
//! per-frame length field — both ends compile against the same capacity.
//! Payload contents are packed field by field with [`PayloadWriter`] and read
//! back in the same order and arity with [`PayloadReader`]; the protocol
//! carries no self-describing schema.

pub mod error;
pub mod frame;
pub mod opcode;
pub mod payload;

pub use error::{Result, WireError};
pub use frame::{decode_frame, encode_frame, Frame, FrameReader, FrameWriter, FRAME_SIZE};
pub use opcode::{Category, CodeKind, OpCode};
pub use payload::{Payload, PayloadReader, PayloadWriter, PAYLOAD_CAPACITY};
