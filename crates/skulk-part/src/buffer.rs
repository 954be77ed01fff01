//! Growable byte buffer that tracks segment offsets.

use crate::error::{PartError, Result};
use std::io::{self, Write};
use tracing::error;

/// Append-only byte buffer backing one blob of an in-memory part.
///
/// [`ByteBuffer::append`] returns the length of the buffer before the
/// append, which is the offset of the new segment. Block headers take their
/// offsets from this value, so offsets always match the bytes actually
/// written.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ByteBuffer {
    buf: Vec<u8>,
}

impl ByteBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty buffer with the given capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Appends `data` and returns the offset it starts at.
    #[inline]
    pub fn append(&mut self, data: &[u8]) -> u64 {
        let offset = self.buf.len() as u64;
        self.buf.extend_from_slice(data);
        offset
    }

    /// Truncates to zero length, keeping the allocation.
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    /// Number of bytes written.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns true if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Allocated capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    /// Written bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Writes the whole buffer to `w`.
    ///
    /// # Panics
    ///
    /// Panics if the sink fails. There is no meaningful way to continue
    /// building a part after its bytes were partially lost.
    pub fn must_write_to<W: Write>(&self, w: &mut W) {
        must_write(w, &self.buf);
    }
}

impl Write for ByteBuffer {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl AsRef<[u8]> for ByteBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.buf
    }
}

/// Writes `data` fully to `w` or aborts the process path with a panic.
pub(crate) fn must_write<W: Write>(w: &mut W, data: &[u8]) {
    if let Err(e) = w.write_all(data) {
        error!("cannot write {} bytes: {}", data.len(), e);
        panic!("FATAL: cannot write {} bytes: {}", data.len(), e);
    }
}

/// Little-endian reader over a byte slice.
///
/// Every read checks the remaining length and reports [`PartError::Truncated`]
/// naming the item being decoded.
pub(crate) struct SliceReader<'a> {
    src: &'a [u8],
    what: &'static str,
}

impl<'a> SliceReader<'a> {
    pub(crate) fn new(src: &'a [u8], what: &'static str) -> Self {
        Self { src, what }
    }

    /// Fails unless at least `n` bytes remain.
    pub(crate) fn require(&self, n: usize) -> Result<()> {
        if self.src.len() < n {
            return Err(PartError::truncated(self.what, n, self.src.len()));
        }
        Ok(())
    }

    pub(crate) fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.require(n)?;
        let (head, tail) = self.src.split_at(n);
        self.src = tail;
        Ok(head)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    pub(crate) fn read_i16(&mut self) -> Result<i16> {
        Ok(i16::from_le_bytes(self.read_array()?))
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub(crate) fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    pub(crate) fn read_i64(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.read_array()?))
    }

    /// Unread tail.
    pub(crate) fn remaining(&self) -> &'a [u8] {
        self.src
    }
}
