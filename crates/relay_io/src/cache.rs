//! Replay caches: readers that yield buffered bytes before their live source.
//!
//! When a protocol peeks at the first bytes of a connection (to sniff a
//! protocol, parse a header, or similar) those bytes must still reach the
//! eventual destination. A [`CacheReader`] wraps the live source together with
//! the already-read bytes and serves them first.
//!
//! Caches nest: wrapping a cached source again puts the new buffer in front.
//! [`pick_one`] and [`pick_chain`] take the layers apart again, outermost
//! first, so the copy engine can write cached bytes without copying them
//! through another buffer.

use std::io::{self, Read};
use std::mem;
#[cfg(unix)]
use std::os::fd::RawFd;

use crate::buffer::is_transient;
use crate::shared::SharedBuffer;
use crate::stream::{BoxSource, Source};

/// A source that drains a cached buffer before reading its inner source.
///
/// Each layer holds one [`SharedBuffer`] handle for as long as the buffer has
/// unread bytes. Once drained the handle is released; the storage is freed
/// when no other owner remains.
pub struct CacheReader {
    inner: BoxSource,
    buffer: Option<SharedBuffer>,
    deferred: Option<io::Error>,
}

impl CacheReader {
    /// Puts `buffer` in front of `source`.
    ///
    /// An empty buffer is released and `source` comes back unchanged.
    pub fn wrap(source: BoxSource, buffer: impl Into<SharedBuffer>) -> BoxSource {
        let buffer = buffer.into();
        if buffer.is_empty() {
            return source;
        }
        Box::new(Self {
            inner: source,
            buffer: Some(buffer),
            deferred: None,
        })
    }

    /// Wraps several buffers so that reading yields them in list order.
    ///
    /// This is the inverse of [`pick_chain`].
    pub fn wrap_chain<I>(source: BoxSource, buffers: I) -> BoxSource
    where
        I: IntoIterator,
        I::Item: Into<SharedBuffer>,
        I::IntoIter: DoubleEndedIterator,
    {
        buffers
            .into_iter()
            .rev()
            .fold(source, |source, buffer| Self::wrap(source, buffer))
    }

    /// Cached bytes not yet read.
    pub fn pending(&self) -> usize {
        self.buffer.as_ref().map_or(0, SharedBuffer::len)
    }
}

impl Read for CacheReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(err) = self.deferred.take() {
            return Err(err);
        }
        if buf.is_empty() {
            return Ok(0);
        }

        let mut offset = 0;
        if let Some(buffer) = self.buffer.as_ref() {
            let drained = {
                let mut cached = buffer.lock();
                offset = cached.read(buf)?;
                cached.is_empty()
            };
            if drained {
                self.buffer = None;
            }
            if offset == buf.len() {
                return Ok(offset);
            }
        }

        match self.inner.read(&mut buf[offset..]) {
            Ok(n) => Ok(offset + n),
            Err(err) if offset == 0 => Err(err),
            Err(err) => {
                // Cached bytes go out now; a hard failure surfaces next call.
                if !is_transient(&err) {
                    self.deferred = Some(err);
                }
                Ok(offset)
            }
        }
    }
}

impl Source for CacheReader {
    fn detach_cache(mut self: Box<Self>) -> (BoxSource, Option<SharedBuffer>) {
        if self.deferred.is_some() {
            return (self, None);
        }
        let inner = mem::replace(&mut self.inner, Box::new(io::empty()));
        match self.buffer.take() {
            Some(buffer) => (inner, Some(buffer)),
            // A drained layer is transparent.
            None => inner.detach_cache(),
        }
    }

    #[cfg(unix)]
    fn raw_fd(&self) -> Option<RawFd> {
        None
    }
}

/// Removes the outermost cache layer of `source`.
///
/// Returns the source beneath it and the layer's buffer handle, or `source`
/// unchanged and `None` when it carries no cache.
pub fn pick_one(source: BoxSource) -> (BoxSource, Option<SharedBuffer>) {
    source.detach_cache()
}

/// Removes every cache layer of `source`, outermost first.
///
/// Empty buffers met along the way are released and left out.
pub fn pick_chain(mut source: BoxSource) -> (BoxSource, Vec<SharedBuffer>) {
    let mut buffers = Vec::new();
    loop {
        let (inner, buffer) = pick_one(source);
        source = inner;
        match buffer {
            None => return (source, buffers),
            Some(buffer) if buffer.is_empty() => {}
            Some(buffer) => buffers.push(buffer),
        }
    }
}
