//! Cursor-tracked byte buffer.
//!
//! A [`Buffer`] owns a fixed storage region and tracks three positions inside
//! it: the read cursor, the write cursor, and the logical size. Unread bytes
//! live in `[read, write)`, free space in `[write, size)`. The storage never
//! grows; callers that need more room allocate a larger buffer.
//!
//! Buffers obtained from a [`BufferPool`] remember their pool and hand their
//! storage back when freed or dropped. A `Buffer` has exactly one owner; to
//! share one between several owners (for example stacked cache layers) turn
//! it into a [`SharedBuffer`](crate::SharedBuffer).

use std::fmt;
use std::io::{self, Read, Write};
use std::sync::Arc;

use crate::error::BufferError;
use crate::pool::BufferPool;

/// Consecutive zero-progress results tolerated by the draining loops.
///
/// The next one fails with [`BufferError::NoProgress`].
pub const MAX_ZERO_PROGRESS_RETRIES: usize = 100;

/// A fixed-capacity byte region with read and write cursors.
///
/// Invariant: `read <= write <= size <= capacity`.
pub struct Buffer {
    data: Vec<u8>,
    size: usize,
    read: usize,
    write: usize,
    pool: Option<Arc<BufferPool>>,
}

impl Buffer {
    /// Allocates an unmanaged, empty buffer of `size` bytes.
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![0; size],
            size,
            read: 0,
            write: 0,
            pool: None,
        }
    }

    /// Wraps existing bytes as an unmanaged buffer with every byte unread.
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        let len = bytes.len();
        Self {
            data: bytes,
            size: len,
            read: 0,
            write: len,
            pool: None,
        }
    }

    pub(crate) fn from_pool(data: Vec<u8>, size: usize, pool: Arc<BufferPool>) -> Self {
        debug_assert!(size <= data.len());
        Self {
            data,
            size,
            read: 0,
            write: 0,
            pool: Some(pool),
        }
    }

    /// Unread bytes.
    #[inline]
    pub fn unread(&self) -> &[u8] {
        &self.data[self.read..self.write]
    }

    /// Writable region between the write cursor and the logical size.
    ///
    /// Bytes written here become visible after [`Buffer::commit`].
    #[inline]
    pub fn free_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data[self.write..self.size]
    }

    /// Marks `n` bytes of the free region as written.
    pub fn commit(&mut self, n: usize) -> Result<(), BufferError> {
        if n > self.free_len() {
            return Err(BufferError::Overflow);
        }
        self.write += n;
        Ok(())
    }

    /// Number of unread bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.write - self.read
    }

    /// Returns `true` when no unread bytes remain.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.read == self.write
    }

    /// Returns `true` when the write cursor reached the logical size.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.write == self.size
    }

    /// Bytes that can still be written before the buffer is full.
    #[inline]
    pub fn free_len(&self) -> usize {
        self.size - self.write
    }

    /// Logical size.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Length of the underlying storage; zero once freed.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` when the storage came from a pool.
    pub fn is_managed(&self) -> bool {
        self.pool.is_some()
    }

    /// Copies the unread bytes into a new vector.
    pub fn to_vec(&self) -> Vec<u8> {
        self.unread().to_vec()
    }

    /// Changes the logical size, clamping both cursors into the new bounds.
    pub fn resize(&mut self, size: usize) -> Result<(), BufferError> {
        if size > self.data.len() {
            return Err(BufferError::Overflow);
        }
        self.size = size;
        self.write = self.write.min(size);
        self.read = self.read.min(self.write);
        Ok(())
    }

    /// Keeps only the first `n` unread bytes.
    pub fn truncate(&mut self, n: usize) {
        self.write = self.read + n.min(self.len());
    }

    /// Rewinds both cursors, discarding unread bytes.
    pub fn reset(&mut self) {
        self.read = 0;
        self.write = 0;
    }

    /// Releases the storage, returning it to the owning pool when managed.
    ///
    /// No-op after a previous free.
    pub fn free(&mut self) {
        if self.data.is_empty() {
            return;
        }
        let data = std::mem::take(&mut self.data);
        self.size = 0;
        self.reset();
        if let Some(pool) = self.pool.take() {
            pool.recycle(data);
        }
    }

    pub(crate) fn belongs_to(&self, pool: &BufferPool) -> bool {
        self.pool
            .as_ref()
            .is_some_and(|owner| std::ptr::eq(Arc::as_ptr(owner), pool))
    }

    /// Drops the storage without recycling it.
    pub(crate) fn discard_storage(&mut self) {
        self.pool = None;
        self.data = Vec::new();
        self.size = 0;
        self.reset();
    }

    /// Fills the free region from `source` until end of stream.
    ///
    /// Returns the bytes read once the source reports end of stream. Fails
    /// with [`BufferError::ShortBuffer`] when the buffer fills first; the bytes
    /// read so far stay in the buffer.
    pub fn read_from<R: Read + ?Sized>(&mut self, source: &mut R) -> Result<u64, BufferError> {
        if self.is_full() {
            return Err(BufferError::ShortBuffer);
        }
        let mut total = 0u64;
        let mut stalls = 0usize;
        loop {
            match source.read(&mut self.data[self.write..self.size]) {
                Ok(0) => return Ok(total),
                Ok(n) => {
                    self.write += n;
                    total += n as u64;
                    stalls = 0;
                    if self.is_full() {
                        return Err(BufferError::ShortBuffer);
                    }
                }
                Err(err) if is_transient(&err) => {
                    stalls += 1;
                    if stalls > MAX_ZERO_PROGRESS_RETRIES {
                        return Err(BufferError::NoProgress);
                    }
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Performs one read from `source` into the free region.
    ///
    /// `Ok(0)` means end of stream. Interrupted reads are retried.
    pub fn read_from_once<R: Read + ?Sized>(
        &mut self,
        source: &mut R,
    ) -> Result<usize, BufferError> {
        if self.is_full() {
            return Err(BufferError::ShortBuffer);
        }
        loop {
            match source.read(&mut self.data[self.write..self.size]) {
                Ok(n) => {
                    self.write += n;
                    return Ok(n);
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Reads exactly `len` bytes from `source`.
    ///
    /// Bytes that arrived before a failure stay in the buffer.
    pub fn read_full<R: Read + ?Sized>(
        &mut self,
        source: &mut R,
        len: usize,
    ) -> Result<usize, BufferError> {
        if len > self.free_len() {
            return Err(BufferError::ShortBuffer);
        }
        let end = self.write + len;
        while self.write < end {
            match source.read(&mut self.data[self.write..end]) {
                Ok(0) => return Err(BufferError::Io(io::ErrorKind::UnexpectedEof.into())),
                Ok(n) => self.write += n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(len)
    }

    /// Writes every unread byte to `sink`.
    ///
    /// Zero-length writes and `WouldBlock`/`Interrupted` results count as no
    /// progress; more than [`MAX_ZERO_PROGRESS_RETRIES`] in a row fail with
    /// [`BufferError::NoProgress`]. Bytes written before a failure are consumed.
    pub fn write_to<W: Write + ?Sized>(&mut self, sink: &mut W) -> Result<u64, BufferError> {
        if self.is_empty() {
            return Err(BufferError::EndOfStream);
        }
        let mut total = 0u64;
        let mut stalls = 0usize;
        loop {
            match sink.write(&self.data[self.read..self.write]) {
                Ok(n) if n > 0 => {
                    total += self.consume(n) as u64;
                    stalls = 0;
                    if self.is_empty() {
                        return Ok(total);
                    }
                    continue;
                }
                Ok(_) => {}
                Err(err) if is_transient(&err) => {}
                Err(err) => return Err(err.into()),
            }
            stalls += 1;
            if stalls > MAX_ZERO_PROGRESS_RETRIES {
                return Err(BufferError::NoProgress);
            }
        }
    }

    /// Performs one write of the unread bytes to `sink`.
    pub fn write_to_once<W: Write + ?Sized>(&mut self, sink: &mut W) -> Result<usize, BufferError> {
        if self.is_empty() {
            return Err(BufferError::EndOfStream);
        }
        loop {
            match sink.write(&self.data[self.read..self.write]) {
                Ok(n) => {
                    let n = n.min(self.len());
                    self.read += n;
                    return Ok(n);
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Consumes and returns the next unread byte.
    pub fn read_byte(&mut self) -> Result<u8, BufferError> {
        if self.is_empty() {
            return Err(BufferError::EndOfStream);
        }
        let byte = self.data[self.read];
        self.read += 1;
        Ok(byte)
    }

    /// Appends one byte.
    pub fn write_byte(&mut self, byte: u8) -> Result<(), BufferError> {
        if self.is_full() {
            return Err(BufferError::ShortBuffer);
        }
        self.data[self.write] = byte;
        self.write += 1;
        Ok(())
    }

    /// Appends a whole string or nothing at all.
    pub fn write_str(&mut self, text: &str) -> Result<usize, BufferError> {
        let bytes = text.as_bytes();
        if bytes.len() > self.free_len() {
            return Err(BufferError::ShortBuffer);
        }
        self.data[self.write..self.write + bytes.len()].copy_from_slice(bytes);
        self.write += bytes.len();
        Ok(bytes.len())
    }

    /// Returns the next `n` unread bytes without consuming them.
    pub fn peek(&self, n: usize) -> Result<&[u8], BufferError> {
        if n == 0 {
            return Ok(&[]);
        }
        if self.is_empty() {
            return Err(BufferError::EndOfStream);
        }
        if n > self.len() {
            return Err(BufferError::Overflow);
        }
        Ok(&self.data[self.read..self.read + n])
    }

    /// Skips up to `n` unread bytes, returning how many were skipped.
    pub fn discard(&mut self, n: usize) -> Result<usize, BufferError> {
        if self.is_empty() {
            return Err(BufferError::EndOfStream);
        }
        Ok(self.consume(n))
    }

    pub(crate) fn consume(&mut self, n: usize) -> usize {
        let n = n.min(self.len());
        self.read += n;
        n
    }
}

#[inline]
pub(crate) fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("read", &self.read)
            .field("write", &self.write)
            .field("size", &self.size)
            .field("capacity", &self.data.len())
            .field("managed", &self.pool.is_some())
            .finish()
    }
}

impl Read for Buffer {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(self.len());
        buf[..n].copy_from_slice(&self.data[self.read..self.read + n]);
        self.read += n;
        Ok(n)
    }
}

impl Write for Buffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.is_full() {
            return Err(BufferError::ShortBuffer.into());
        }
        let n = buf.len().min(self.free_len());
        self.data[self.write..self.write + n].copy_from_slice(&buf[..n]);
        self.write += n;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        self.free();
    }
}

#[cfg(test)]
mod tests;
