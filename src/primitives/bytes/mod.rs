#![forbid(unsafe_code)]
//! Fixed-width big-endian encoding helpers shared by the record codec, the
//! redo log, and page formats.

pub mod be {
    //! In-place big-endian reads and writes at fixed offsets.
    //!
    //! Callers validate bounds up front (page formats check their header
    //! before touching slots), so these panic on short slices like slice
    //! indexing does.

    /// Reads a `u16` at `off`.
    #[inline]
    pub fn read_u16(src: &[u8], off: usize) -> u16 {
        u16::from_be_bytes([src[off], src[off + 1]])
    }

    /// Writes a `u16` at `off`.
    #[inline]
    pub fn write_u16(dst: &mut [u8], off: usize, value: u16) {
        dst[off..off + 2].copy_from_slice(&value.to_be_bytes());
    }

    /// Reads a `u64` at `off`.
    #[inline]
    pub fn read_u64(src: &[u8], off: usize) -> u64 {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&src[off..off + 8]);
        u64::from_be_bytes(bytes)
    }

    /// Writes a `u64` at `off`.
    #[inline]
    pub fn write_u64(dst: &mut [u8], off: usize, value: u64) {
        dst[off..off + 8].copy_from_slice(&value.to_be_bytes());
    }
}

pub mod put {
    //! Appending encoders for growable buffers.

    /// Appends a byte.
    #[inline]
    pub fn u8(out: &mut Vec<u8>, value: u8) {
        out.push(value);
    }

    /// Appends a big-endian `u16`.
    #[inline]
    pub fn u16(out: &mut Vec<u8>, value: u16) {
        out.extend_from_slice(&value.to_be_bytes());
    }

    /// Appends a big-endian `u32`.
    #[inline]
    pub fn u32(out: &mut Vec<u8>, value: u32) {
        out.extend_from_slice(&value.to_be_bytes());
    }

    /// Appends a big-endian `i32`.
    #[inline]
    pub fn i32(out: &mut Vec<u8>, value: i32) {
        out.extend_from_slice(&value.to_be_bytes());
    }

    /// Appends a big-endian `u64`.
    #[inline]
    pub fn u64(out: &mut Vec<u8>, value: u64) {
        out.extend_from_slice(&value.to_be_bytes());
    }
}

use crate::types::{PageLogError, Result};

/// Bounds-checked cursor over an encoded buffer.
///
/// Every read that would run past the end fails with
/// [`PageLogError::Corruption`] carrying the reader's context message.
#[derive(Debug)]
pub struct Reader<'a> {
    src: &'a [u8],
    off: usize,
    context: &'static str,
}

impl<'a> Reader<'a> {
    /// Creates a reader; `context` is reported when the input is truncated.
    pub fn new(src: &'a [u8], context: &'static str) -> Self {
        Self {
            src,
            off: 0,
            context,
        }
    }

    /// Current offset from the start of the input.
    pub fn position(&self) -> usize {
        self.off
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.src.len() - self.off
    }

    /// Takes the next `len` bytes.
    pub fn bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .off
            .checked_add(len)
            .filter(|end| *end <= self.src.len())
            .ok_or(PageLogError::Corruption(self.context))?;
        let out = &self.src[self.off..end];
        self.off = end;
        Ok(out)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(N)?);
        Ok(out)
    }

    /// Reads a byte.
    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.array::<1>()?[0])
    }

    /// Reads a big-endian `u16`.
    pub fn u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.array()?))
    }

    /// Reads a big-endian `u32`.
    pub fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.array()?))
    }

    /// Reads a big-endian `i32`.
    pub fn i32(&mut self) -> Result<i32> {
        Ok(i32::from_be_bytes(self.array()?))
    }

    /// Reads a big-endian `u64`.
    pub fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_be_bytes(self.array()?))
    }

    /// Fails unless the whole input has been consumed.
    pub fn finish(self, trailing: &'static str) -> Result<()> {
        if self.remaining() != 0 {
            return Err(PageLogError::Corruption(trailing));
        }
        Ok(())
    }
}
