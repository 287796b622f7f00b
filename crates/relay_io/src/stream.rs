//! Endpoint capability traits.
//!
//! The copy engine works on boxed endpoints and discovers what they can do
//! through these traits instead of runtime type checks:
//!
//! - [`Source::detach_cache`] peels one replay-cache layer off a source.
//! - [`Source::detach_read_counters`] and [`Sink::detach_write_counters`] peel
//!   one counting layer.
//! - [`Sink::pending_handshake`] exposes a destination that must be driven
//!   before ordinary writes.
//! - `raw_fd` on both traits exposes the descriptor for splice.
//! - [`Sink::bulk_read_from`] lets a destination pull from a reader itself.
//!
//! Every capability has a default that reports "not supported", so wrapping a
//! type in [`Plain`] hides all of them.

use std::fs::File;
use std::io::{self, Cursor, Read, Write};
use std::net::TcpStream;
#[cfg(unix)]
use std::os::fd::{AsRawFd, RawFd};
#[cfg(unix)]
use std::os::unix::net::UnixStream;
use std::process::{ChildStderr, ChildStdin, ChildStdout};

use crate::buffer::Buffer;
use crate::counter::Counter;
use crate::shared::SharedBuffer;

/// A boxed, type-erased source.
pub type BoxSource = Box<dyn Source>;

/// A boxed, type-erased sink.
pub type BoxSink = Box<dyn Sink>;

/// Conversion into a [`BoxSource`], implemented for every sized source.
pub trait IntoBoxedSource {
    /// Erases the concrete type.
    fn into_boxed_source(self: Box<Self>) -> BoxSource;
}

impl<T: Source + 'static> IntoBoxedSource for T {
    fn into_boxed_source(self: Box<Self>) -> BoxSource {
        self
    }
}

/// Conversion into a [`BoxSink`], implemented for every sized sink.
pub trait IntoBoxedSink {
    /// Erases the concrete type.
    fn into_boxed_sink(self: Box<Self>) -> BoxSink;
}

impl<T: Sink + 'static> IntoBoxedSink for T {
    fn into_boxed_sink(self: Box<Self>) -> BoxSink {
        self
    }
}

/// A readable endpoint with optional relay capabilities.
pub trait Source: Read + Send + IntoBoxedSource {
    /// Removes the outermost cache layer, returning the source beneath it and
    /// the pending bytes. Sources without a cache return themselves and `None`.
    fn detach_cache(self: Box<Self>) -> (BoxSource, Option<SharedBuffer>) {
        (self.into_boxed_source(), None)
    }

    /// Removes the outermost counting layer, returning the source beneath it
    /// and that layer's counters. Sources that are not a counting layer
    /// return themselves and `None`.
    fn detach_read_counters(self: Box<Self>) -> (BoxSource, Option<Vec<Counter>>) {
        (self.into_boxed_source(), None)
    }

    /// Descriptor usable for splice, if any.
    #[cfg(unix)]
    fn raw_fd(&self) -> Option<RawFd> {
        None
    }
}

/// A destination driven before ordinary writes, with no input.
pub trait Handshaker {
    /// Performs the handshake.
    fn handshake(&mut self) -> io::Result<()>;
}

/// A destination that must be fed leading source bytes before ordinary writes.
pub trait BufferHandshaker {
    /// Offers `bytes`, returning how many the handshake consumed.
    fn handshake(&mut self, bytes: &[u8]) -> io::Result<usize>;
}

/// A handshake a destination still needs.
pub enum Handshake<'a> {
    /// A handshake that needs no source bytes.
    Plain(&'a mut dyn Handshaker),
    /// A handshake that consumes leading source bytes.
    Buffered(&'a mut dyn BufferHandshaker),
}

/// A writable endpoint with optional relay capabilities.
pub trait Sink: Write + Send + IntoBoxedSink {
    /// Returns the handshake this destination still needs, if any.
    fn pending_handshake(&mut self) -> Option<Handshake<'_>> {
        None
    }

    /// Removes the outermost counting layer, returning the sink beneath it and
    /// that layer's counters, or itself and `None`.
    fn detach_write_counters(self: Box<Self>) -> (BoxSink, Option<Vec<Counter>>) {
        (self.into_boxed_sink(), None)
    }

    /// Descriptor usable for splice, if any.
    #[cfg(unix)]
    fn raw_fd(&self) -> Option<RawFd> {
        None
    }

    /// Pulls everything from `source` through the sink's own mechanism.
    ///
    /// `None` means the sink has no such mechanism and the caller should copy.
    fn bulk_read_from(&mut self, _source: &mut dyn Read) -> Option<io::Result<u64>> {
        None
    }
}

/// Hides every relay capability of the wrapped endpoint.
///
/// Copies involving a `Plain` endpoint always take the buffered path.
#[derive(Debug, Default, Clone)]
pub struct Plain<T>(T);

impl<T> Plain<T> {
    /// Wraps `inner`.
    pub const fn new(inner: T) -> Self {
        Self(inner)
    }

    /// Borrows the wrapped endpoint.
    pub const fn get_ref(&self) -> &T {
        &self.0
    }

    /// Mutably borrows the wrapped endpoint.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.0
    }

    /// Unwraps the endpoint.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T: Read> Read for Plain<T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl<T: Write> Write for Plain<T> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl<T: Read + Send + 'static> Source for Plain<T> {}

impl<T: Write + Send + 'static> Sink for Plain<T> {}

macro_rules! fd_source {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Source for $ty {
                #[cfg(unix)]
                fn raw_fd(&self) -> Option<RawFd> {
                    Some(self.as_raw_fd())
                }
            }
        )*
    };
}

macro_rules! fd_sink {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Sink for $ty {
                #[cfg(unix)]
                fn raw_fd(&self) -> Option<RawFd> {
                    Some(self.as_raw_fd())
                }
            }
        )*
    };
}

fd_source!(File, TcpStream, ChildStdout, ChildStderr);
fd_sink!(File, TcpStream, ChildStdin);

#[cfg(unix)]
fd_source!(UnixStream);
#[cfg(unix)]
fd_sink!(UnixStream);

// Boxed endpoints forward every capability, so wrappers over a `BoxSource`
// or `BoxSink` stay transparent to the engine.
impl Source for BoxSource {
    fn detach_cache(self: Box<Self>) -> (BoxSource, Option<SharedBuffer>) {
        (*self).detach_cache()
    }

    fn detach_read_counters(self: Box<Self>) -> (BoxSource, Option<Vec<Counter>>) {
        (*self).detach_read_counters()
    }

    #[cfg(unix)]
    fn raw_fd(&self) -> Option<RawFd> {
        (**self).raw_fd()
    }
}

impl Sink for BoxSink {
    fn pending_handshake(&mut self) -> Option<Handshake<'_>> {
        (**self).pending_handshake()
    }

    fn detach_write_counters(self: Box<Self>) -> (BoxSink, Option<Vec<Counter>>) {
        (*self).detach_write_counters()
    }

    #[cfg(unix)]
    fn raw_fd(&self) -> Option<RawFd> {
        (**self).raw_fd()
    }

    fn bulk_read_from(&mut self, source: &mut dyn Read) -> Option<io::Result<u64>> {
        (**self).bulk_read_from(source)
    }
}

impl Source for Cursor<Vec<u8>> {}
impl Source for &'static [u8] {}
impl Source for io::Empty {}
impl Source for io::Repeat {}

impl Sink for Cursor<Vec<u8>> {}
impl Sink for Vec<u8> {}
impl Sink for io::Sink {}

impl Source for Buffer {}

impl Sink for Buffer {
    fn bulk_read_from(&mut self, source: &mut dyn Read) -> Option<io::Result<u64>> {
        Some(self.read_from(source).map_err(io::Error::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_hides_descriptor() {
        let file = tempfile::tempfile().unwrap();
        #[cfg(unix)]
        assert!(Source::raw_fd(&file).is_some());

        let plain = Plain::new(file);
        #[cfg(unix)]
        assert!(Source::raw_fd(&plain).is_none());
        assert!(plain.get_ref().metadata().is_ok());
    }

    #[test]
    fn default_capabilities_are_absent() {
        let source: BoxSource = Box::new(Cursor::new(b"abc".to_vec()));
        let (source, cache) = source.detach_cache();
        assert!(cache.is_none());
        let (mut source, counters) = source.detach_read_counters();
        assert!(counters.is_none());

        let mut out = String::new();
        source.read_to_string(&mut out).unwrap();
        assert_eq!(out, "abc");
    }

    #[test]
    fn vec_sink_has_no_handshake() {
        let mut sink: BoxSink = Box::new(Vec::new());
        assert!(sink.pending_handshake().is_none());
        sink.write_all(b"xyz").unwrap();
    }

    #[test]
    fn buffer_sink_pulls_until_eof() {
        let mut buffer = Buffer::new(16);
        let mut source = Cursor::new(b"pulled".to_vec());
        let pulled = buffer.bulk_read_from(&mut source).unwrap().unwrap();
        assert_eq!(pulled, 6);
        assert_eq!(buffer.unread(), b"pulled");
    }
}
