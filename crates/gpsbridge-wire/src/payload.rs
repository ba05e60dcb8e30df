//! Bounded payload buffer and cursor codec.
//!
//! Producer and consumer must agree byte-for-byte on every operation code's
//! payload shape: fields are packed in a fixed order and read back in the
//! same order and arity. Scalars are little-endian regardless of host
//! architecture. Any operation that would cross the capacity boundary fails
//! with a bounds error and leaves the cursor where it was.

use crate::error::{Result, WireError};

/// Fixed payload capacity, identical on both ends of the link.
pub const PAYLOAD_CAPACITY: usize = 1024;

/// A fixed-capacity payload buffer.
///
/// `len` is the producer-side write cursor; the wire always carries the full
/// capacity, zero-filled past the written region.
#[derive(Clone)]
pub struct Payload {
    bytes: [u8; PAYLOAD_CAPACITY],
    len: usize,
}

impl Default for Payload {
    fn default() -> Self {
        Self::new()
    }
}

impl Payload {
    pub fn new() -> Self {
        Self {
            bytes: [0u8; PAYLOAD_CAPACITY],
            len: 0,
        }
    }

    /// Reconstruct a payload received off the wire.
    pub fn from_wire(bytes: [u8; PAYLOAD_CAPACITY]) -> Self {
        Self {
            bytes,
            len: PAYLOAD_CAPACITY,
        }
    }

    /// Bytes written so far by the producer.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The full capacity-sized buffer as it travels on the wire.
    pub fn as_wire_bytes(&self) -> &[u8; PAYLOAD_CAPACITY] {
        &self.bytes
    }

    /// Begin packing fields at the current write cursor.
    pub fn writer(&mut self) -> PayloadWriter<'_> {
        PayloadWriter { payload: self }
    }

    /// Begin unpacking fields from the start of the buffer.
    pub fn reader(&self) -> PayloadReader<'_> {
        PayloadReader {
            bytes: &self.bytes,
            cursor: 0,
        }
    }
}

impl std::fmt::Debug for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Payload")
            .field("len", &self.len)
            .field("capacity", &PAYLOAD_CAPACITY)
            .finish()
    }
}

/// Packs fields into a [`Payload`], advancing its write cursor.
pub struct PayloadWriter<'a> {
    payload: &'a mut Payload,
}

impl PayloadWriter<'_> {
    fn reserve(&mut self, need: usize) -> Result<usize> {
        let remaining = PAYLOAD_CAPACITY - self.payload.len;
        if need > remaining {
            return Err(WireError::Overflow { need, remaining });
        }
        Ok(self.payload.len)
    }

    fn put_raw(&mut self, bytes: &[u8]) -> Result<()> {
        let at = self.reserve(bytes.len())?;
        self.payload.bytes[at..at + bytes.len()].copy_from_slice(bytes);
        self.payload.len = at + bytes.len();
        Ok(())
    }

    pub fn put_u8(&mut self, v: u8) -> Result<()> {
        self.put_raw(&[v])
    }

    pub fn put_u16(&mut self, v: u16) -> Result<()> {
        self.put_raw(&v.to_le_bytes())
    }

    pub fn put_u32(&mut self, v: u32) -> Result<()> {
        self.put_raw(&v.to_le_bytes())
    }

    pub fn put_i32(&mut self, v: i32) -> Result<()> {
        self.put_raw(&v.to_le_bytes())
    }

    pub fn put_u64(&mut self, v: u64) -> Result<()> {
        self.put_raw(&v.to_le_bytes())
    }

    pub fn put_i64(&mut self, v: i64) -> Result<()> {
        self.put_raw(&v.to_le_bytes())
    }

    pub fn put_f32(&mut self, v: f32) -> Result<()> {
        self.put_raw(&v.to_le_bytes())
    }

    pub fn put_f64(&mut self, v: f64) -> Result<()> {
        self.put_raw(&v.to_le_bytes())
    }

    /// Write a length-prefixed raw byte range.
    pub fn put_bytes(&mut self, data: &[u8]) -> Result<()> {
        // One bounds check for prefix + data so a failure leaves nothing
        // partially written.
        self.reserve(4 + data.len())?;
        self.put_raw(&(data.len() as u32).to_le_bytes())?;
        self.put_raw(data)
    }

    /// Write a null-terminated string.
    pub fn put_str(&mut self, s: &str) -> Result<()> {
        self.reserve(s.len() + 1)?;
        self.put_raw(s.as_bytes())?;
        self.put_raw(&[0u8])
    }

    /// Bytes still available before the capacity boundary.
    pub fn remaining(&self) -> usize {
        PAYLOAD_CAPACITY - self.payload.len
    }
}

/// Reads fields back from a [`Payload`] at an advancing cursor.
///
/// Reads are bounded by the payload capacity; the zero-filled slack past the
/// producer's last field reads back as zeros, exactly as it does on the wire.
pub struct PayloadReader<'a> {
    bytes: &'a [u8; PAYLOAD_CAPACITY],
    cursor: usize,
}

impl PayloadReader<'_> {
    fn take(&mut self, need: usize) -> Result<&[u8]> {
        let remaining = PAYLOAD_CAPACITY - self.cursor;
        if need > remaining {
            return Err(WireError::Underrun { need, remaining });
        }
        let slice = &self.bytes[self.cursor..self.cursor + need];
        self.cursor += need;
        Ok(slice)
    }

    pub fn get_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn get_u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.take(2)?.try_into().unwrap()))
    }

    pub fn get_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub fn get_i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub fn get_u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    pub fn get_i64(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    pub fn get_f32(&mut self) -> Result<f32> {
        Ok(f32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub fn get_f64(&mut self) -> Result<f64> {
        Ok(f64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    /// Read a length-prefixed raw byte range.
    pub fn get_bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.get_u32()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    /// Read a null-terminated string.
    pub fn get_str(&mut self) -> Result<String> {
        let rest = &self.bytes[self.cursor..];
        let nul = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(WireError::UnterminatedString)?;
        let s = std::str::from_utf8(&rest[..nul]).map_err(|_| WireError::InvalidUtf8)?;
        self.cursor += nul + 1;
        Ok(s.to_string())
    }

    /// Bytes left before the capacity boundary.
    pub fn remaining(&self) -> usize {
        PAYLOAD_CAPACITY - self.cursor
    }
}
