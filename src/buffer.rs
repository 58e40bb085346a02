//! A growable byte buffer with fixed width little-endian reads and writes.
//!
//! Both the instruction stream and the document body are built on top of
//! this. Reads are bounds checked and return an [`Error`] of kind
//! [`Internal`][crate::ErrorKind::Internal] when the data is truncated.

use crate::{Error, Result};

/// The largest value a 24-bit operand can hold.
pub const MAX_U24: u32 = 0x00ff_ffff;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Buffer {
    data: Vec<u8>,
}

impl Buffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    /// Make sure there is room for `additional` more bytes, at least doubling
    /// the capacity when growing.
    fn reserve(&mut self, additional: usize) {
        let needed = self.data.len() + additional;
        let capacity = self.data.capacity();
        if needed > capacity {
            let target = needed.max(capacity * 2).max(16);
            self.data.reserve_exact(target - self.data.len());
        }
    }

    pub fn write_u8(&mut self, v: u8) {
        self.reserve(1);
        self.data.push(v);
    }

    pub fn write_u16(&mut self, v: u16) {
        self.write_bytes(&v.to_le_bytes());
    }

    /// Writes the low three bytes of `v`.
    pub fn write_u24(&mut self, v: u32) {
        debug_assert!(v <= MAX_U24);
        self.write_bytes(&v.to_le_bytes()[..3]);
    }

    pub fn write_u32(&mut self, v: u32) {
        self.write_bytes(&v.to_le_bytes());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.reserve(bytes.len());
        self.data.extend_from_slice(bytes);
    }

    /// Appends another buffer to this one.
    pub fn concat(&mut self, other: &Buffer) {
        self.write_bytes(&other.data);
    }

    /// Pads the buffer with zeroes until its length is a multiple of `n`.
    pub fn align(&mut self, n: usize) {
        let rem = self.data.len() % n;
        if rem != 0 {
            let pad = n - rem;
            self.reserve(pad);
            self.data.resize(self.data.len() + pad, 0);
        }
    }

    pub fn truncate(&mut self, len: usize) {
        self.data.truncate(len);
    }
}

////////////////////////////////////////////////////////////////////////////////
// Reads
////////////////////////////////////////////////////////////////////////////////

fn read_array<const N: usize>(data: &[u8], at: usize) -> Result<[u8; N]> {
    data.get(at..at + N)
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or_else(|| err_truncated(at))
}

pub fn read_u8(data: &[u8], at: usize) -> Result<u8> {
    data.get(at).copied().ok_or_else(|| err_truncated(at))
}

pub fn read_u16(data: &[u8], at: usize) -> Result<u16> {
    read_array(data, at).map(u16::from_le_bytes)
}

pub fn read_u24(data: &[u8], at: usize) -> Result<u32> {
    let [a, b, c] = read_array(data, at)?;
    Ok(u32::from_le_bytes([a, b, c, 0]))
}

pub fn read_u32(data: &[u8], at: usize) -> Result<u32> {
    read_array(data, at).map(u32::from_le_bytes)
}

pub fn read_bytes(data: &[u8], at: usize, len: usize) -> Result<&[u8]> {
    data.get(at..at + len).ok_or_else(|| err_truncated(at))
}

fn err_truncated(at: usize) -> Error {
    Error::internal(format!("unexpected end of buffer at offset {at}"))
}
