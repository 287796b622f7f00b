//! A write buffer over any sink, backed by a relay [`Buffer`].
//!
//! Small writes gather in the buffer; anything that does not fit flushes the
//! buffer and goes straight to the wrapped writer. Unlike
//! [`std::io::BufWriter`] the buffer can come from a pool and be released
//! early with [`BufWriter::free`], and [`BufWriter::read_from`] lets the
//! wrapped sink pull from a reader directly when it knows how.
//!
//! Dropping a `BufWriter` does not flush. Call [`Write::flush`],
//! [`BufWriter::free`] or [`Close::close`] first.

use std::io::{self, Read, Write};

use crate::buffer::Buffer;
use crate::close::Close;
use crate::error::{STAGE_FLUSH, TransferError};
use crate::pool::STANDARD_BUFFER_SIZE;
use crate::stream::Sink;

/// Buffers small writes in front of `W`.
#[derive(Debug)]
pub struct BufWriter<W> {
    inner: W,
    buffer: Buffer,
}

impl<W: Write> BufWriter<W> {
    /// Wraps `inner` with a fresh 4 KiB buffer.
    pub fn new(inner: W) -> Self {
        Self::with_buffer(inner, Buffer::new(STANDARD_BUFFER_SIZE))
    }

    /// Wraps `inner` with `buffer`, typically one taken from a pool.
    ///
    /// Bytes already in `buffer` are written ahead of anything else.
    pub fn with_buffer(inner: W, buffer: Buffer) -> Self {
        Self { inner, buffer }
    }

    /// Borrows the wrapped writer.
    pub const fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Mutably borrows the wrapped writer.
    ///
    /// Writing through it directly reorders output around buffered bytes.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    /// Bytes waiting to be flushed.
    pub fn buffered(&self) -> &[u8] {
        self.buffer.unread()
    }

    /// Writes buffered bytes to the inner writer without flushing it.
    fn flush_buffer(&mut self) -> io::Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        self.buffer
            .write_to(&mut self.inner)
            .map_err(|err| io::Error::from(TransferError::from(err).at(STAGE_FLUSH)))?;
        self.buffer.reset();
        Ok(())
    }

    /// Writes the whole string, buffering it when it fits.
    pub fn write_str(&mut self, text: &str) -> io::Result<usize> {
        if text.len() <= self.buffer.free_len() {
            return self.buffer.write_str(text).map_err(io::Error::from);
        }
        self.flush_buffer()?;
        if text.len() <= self.buffer.free_len() {
            return self.buffer.write_str(text).map_err(io::Error::from);
        }
        self.inner.write_all(text.as_bytes())?;
        Ok(text.len())
    }

    /// Writes one byte.
    pub fn write_byte(&mut self, byte: u8) -> io::Result<()> {
        if self.buffer.is_full() {
            self.flush_buffer()?;
        }
        if self.buffer.is_full() {
            // Freed buffers hold nothing.
            return self.inner.write_all(&[byte]);
        }
        self.buffer.write_byte(byte).map_err(io::Error::from)
    }

    /// Flushes, then releases the buffer. Later writes pass straight through.
    pub fn free(&mut self) -> io::Result<()> {
        self.flush_buffer()?;
        self.buffer.free();
        Ok(())
    }

    /// Flushes and returns the wrapped writer.
    pub fn into_inner(mut self) -> io::Result<W> {
        self.free()?;
        Ok(self.inner)
    }
}

impl<W: Sink> BufWriter<W> {
    /// Moves everything from `source` into the wrapped sink.
    ///
    /// Buffered bytes go first. A sink that can pull from a reader itself
    /// does so; otherwise the buffer is filled and flushed until `source`
    /// reports end of stream.
    pub fn read_from(&mut self, source: &mut dyn Read) -> io::Result<u64> {
        self.flush_buffer()?;
        if let Some(result) = self.inner.bulk_read_from(source) {
            return result;
        }
        if self.buffer.size() == 0 {
            self.buffer = Buffer::new(STANDARD_BUFFER_SIZE);
        }
        let mut total = 0u64;
        loop {
            let n = self.buffer.read_from_once(source).map_err(io::Error::from)?;
            if n == 0 {
                return Ok(total);
            }
            total += n as u64;
            self.flush_buffer()?;
        }
    }
}

impl<W: Write> Write for BufWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if buf.len() > self.buffer.free_len() {
            self.flush_buffer()?;
            return self.inner.write(buf);
        }
        self.buffer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_buffer()?;
        self.inner.flush()
    }
}

impl<W: Sink + 'static> Sink for BufWriter<W> {
    fn bulk_read_from(&mut self, source: &mut dyn Read) -> Option<io::Result<u64>> {
        Some(self.read_from(source))
    }
}

impl<W: Write + Close> Close for BufWriter<W> {
    /// Flushes, releases the buffer and closes the wrapped writer.
    ///
    /// The writer is closed even when flushing fails.
    fn close(&mut self) -> io::Result<()> {
        let flushed = self.free();
        if flushed.is_err() {
            self.buffer.free();
        }
        let closed = self.inner.close();
        let failures = [flushed, closed]
            .into_iter()
            .filter_map(Result::err)
            .map(TransferError::from);
        TransferError::join(failures).map_or(Ok(()), |err| Err(err.into()))
    }
}
