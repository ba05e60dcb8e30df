//! Frame encode/decode and blocking frame I/O.
//!
//! Wire layout, identical for requests, replies and events:
//!
//! ```text
//! ┌───────────────┬──────────────────────────────┐
//! │ Code (4B LE)  │ Payload (PAYLOAD_CAPACITY B) │
//! └───────────────┴──────────────────────────────┘
//! ```
//!
//! There is no per-frame length field; both ends compile against the same
//! payload capacity. A connection that closes mid-frame is a protocol error.

use std::io::{ErrorKind, Read, Write};

use bytes::{Buf, BufMut, BytesMut};
use tracing::warn;

use crate::error::{Result, WireError};
use crate::opcode::{CodeKind, OpCode};
use crate::payload::{Payload, PAYLOAD_CAPACITY};

/// Total size of one frame on the wire.
pub const FRAME_SIZE: usize = 4 + PAYLOAD_CAPACITY;

/// The unit of transport: an operation code plus a bounded payload.
///
/// The code is kept as the raw wire integer so that an unknown code reaches
/// the dispatcher as a policy decision instead of failing the read loop.
#[derive(Clone)]
pub struct Frame {
    pub code: u32,
    pub payload: Payload,
}

impl Frame {
    /// An empty-payload frame for the given operation.
    pub fn new(op: OpCode) -> Self {
        Self {
            code: op.as_u32(),
            payload: Payload::new(),
        }
    }

    /// A frame carrying a pre-packed payload.
    pub fn with_payload(op: OpCode, payload: Payload) -> Self {
        Self {
            code: op.as_u32(),
            payload,
        }
    }

    /// Decode the code into the known operation set.
    pub fn opcode(&self) -> Result<OpCode> {
        OpCode::from_u32(self.code)
    }

    /// Range classification of the code, defined for unknown codes too.
    pub fn kind(&self) -> CodeKind {
        CodeKind::classify(self.code)
    }

    /// Diagnostic name of the code.
    pub fn code_name(&self) -> &'static str {
        match OpCode::from_u32(self.code) {
            Ok(op) => op.name(),
            Err(_) => "UNKNOWN",
        }
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("code", &self.code_name())
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

/// Encode a frame into the wire format.
pub fn encode_frame(frame: &Frame, dst: &mut BytesMut) {
    dst.reserve(FRAME_SIZE);
    dst.put_u32_le(frame.code);
    dst.put_slice(frame.payload.as_wire_bytes());
}

/// Decode a frame from a buffer.
///
/// Returns `None` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut) -> Option<Frame> {
    if src.len() < FRAME_SIZE {
        return None;
    }

    let code = u32::from_le_bytes(src[0..4].try_into().unwrap());
    let mut bytes = [0u8; PAYLOAD_CAPACITY];
    bytes.copy_from_slice(&src[4..FRAME_SIZE]);
    src.advance(FRAME_SIZE);

    Some(Frame {
        code,
        payload: Payload::from_wire(bytes),
    })
}

const READ_CHUNK_SIZE: usize = FRAME_SIZE;

/// Reads complete frames from any `Read` stream.
///
/// Handles partial reads internally — callers always get complete frames.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
}

impl<T: Read> FrameReader<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(2 * FRAME_SIZE),
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `WireError::ConnectionClosed` on EOF at a frame boundary and
    /// `WireError::Truncated` on EOF mid-frame.
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = decode_frame(&mut self.buf) {
                return Ok(frame);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(WireError::Io(err)),
            };

            if read == 0 {
                if self.buf.is_empty() {
                    return Err(WireError::ConnectionClosed);
                }
                warn!(got = self.buf.len(), need = FRAME_SIZE, "stream ended mid-frame");
                return Err(WireError::Truncated {
                    got: self.buf.len(),
                    need: FRAME_SIZE,
                });
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

/// Writes complete frames to any `Write` stream.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
}

impl<T: Write> FrameWriter<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(FRAME_SIZE),
        }
    }

    /// Write a complete frame (blocking).
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.buf.clear();
        encode_frame(frame, &mut self.buf);

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(WireError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(WireError::Io(err)),
            }
        }

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(WireError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}
