//! Byte-count callbacks and the counting reader/writer layers that fire them.
//!
//! A [`Counter`] is a shared callback invoked with the number of bytes that
//! moved through a layer. [`CountingReader`] and [`CountingWriter`] fire their
//! counters after every successful read or write that moved at least one byte.
//!
//! Re-wrapping an already counted endpoint through [`wrap_source`] or
//! [`wrap_sink`] does not stack layers: the existing counters are peeled off
//! and merged into a single layer, so every callback fires exactly once per
//! byte.

use std::fmt;
use std::io::{self, Read, Write};
#[cfg(unix)]
use std::os::fd::RawFd;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::stream::{BoxSink, BoxSource, Sink, Source};

/// A shared byte-count callback.
#[derive(Clone)]
pub struct Counter(Arc<dyn Fn(u64) + Send + Sync>);

impl Counter {
    /// Wraps a callback.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(u64) + Send + Sync + 'static,
    {
        Self(Arc::new(callback))
    }

    /// A counter that adds every count to `total`.
    pub fn tally(total: Arc<AtomicU64>) -> Self {
        Self::new(move |n| {
            total.fetch_add(n, Ordering::Relaxed);
        })
    }

    /// Invokes the callback.
    #[inline]
    pub fn record(&self, n: u64) {
        (self.0)(n);
    }
}

impl fmt::Debug for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Counter").field(&Arc::as_ptr(&self.0)).finish()
    }
}

/// Fires every counter in order; zero counts are dropped.
pub(crate) fn fire(counters: &[Counter], n: u64) {
    if n == 0 {
        return;
    }
    for counter in counters {
        counter.record(n);
    }
}

/// Read-side and write-side counters of one copy.
#[derive(Debug, Clone, Default)]
pub struct CounterSet {
    /// Fired for bytes taken from the source.
    pub read: Vec<Counter>,
    /// Fired for bytes delivered to the destination.
    pub write: Vec<Counter>,
}

impl CounterSet {
    /// Bundles both sides.
    pub const fn new(read: Vec<Counter>, write: Vec<Counter>) -> Self {
        Self { read, write }
    }

    /// Fires read counters, then write counters.
    pub fn record(&self, n: u64) {
        fire(&self.read, n);
        fire(&self.write, n);
    }
}

/// A reader that reports every chunk it reads.
pub struct CountingReader<R> {
    inner: R,
    counters: Vec<Counter>,
    total: u64,
}

impl<R> CountingReader<R> {
    /// Wraps `inner`.
    pub const fn new(inner: R, counters: Vec<Counter>) -> Self {
        Self {
            inner,
            counters,
            total: 0,
        }
    }

    /// Counters fired by this layer.
    pub fn counters(&self) -> &[Counter] {
        &self.counters
    }

    /// Bytes read through this layer.
    pub const fn total(&self) -> u64 {
        self.total
    }

    /// Borrows the wrapped reader.
    pub const fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Unwraps the reader, dropping the counters.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.total += n as u64;
        fire(&self.counters, n as u64);
        Ok(n)
    }
}

impl<R: Source + 'static> Source for CountingReader<R> {
    fn detach_read_counters(self: Box<Self>) -> (BoxSource, Option<Vec<Counter>>) {
        let this = *self;
        (Box::new(this.inner), Some(this.counters))
    }

    // Splicing would bypass the counters.
    #[cfg(unix)]
    fn raw_fd(&self) -> Option<RawFd> {
        None
    }
}

/// A writer that reports every chunk it writes.
pub struct CountingWriter<W> {
    inner: W,
    counters: Vec<Counter>,
    total: u64,
}

impl<W> CountingWriter<W> {
    /// Wraps `inner`.
    pub const fn new(inner: W, counters: Vec<Counter>) -> Self {
        Self {
            inner,
            counters,
            total: 0,
        }
    }

    /// Counters fired by this layer.
    pub fn counters(&self) -> &[Counter] {
        &self.counters
    }

    /// Bytes written through this layer.
    pub const fn total(&self) -> u64 {
        self.total
    }

    /// Borrows the wrapped writer.
    pub const fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Unwraps the writer, dropping the counters.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.total += n as u64;
        fire(&self.counters, n as u64);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Sink + 'static> Sink for CountingWriter<W> {
    fn detach_write_counters(self: Box<Self>) -> (BoxSink, Option<Vec<Counter>>) {
        let this = *self;
        (Box::new(this.inner), Some(this.counters))
    }

    #[cfg(unix)]
    fn raw_fd(&self) -> Option<RawFd> {
        None
    }
}

/// Peels every counting layer off `source`.
///
/// Counters of inner layers were registered first and come first.
pub fn unwrap_read_counters(mut source: BoxSource) -> (BoxSource, Vec<Counter>) {
    let mut layers = Vec::new();
    loop {
        let (inner, counters) = source.detach_read_counters();
        source = inner;
        match counters {
            Some(counters) => layers.push(counters),
            None => break,
        }
    }
    (source, layers.into_iter().rev().flatten().collect())
}

/// Peels every counting layer off `sink`.
///
/// Counters of inner layers were registered first and come first.
pub fn unwrap_write_counters(mut sink: BoxSink) -> (BoxSink, Vec<Counter>) {
    let mut layers = Vec::new();
    loop {
        let (inner, counters) = sink.detach_write_counters();
        sink = inner;
        match counters {
            Some(counters) => layers.push(counters),
            None => break,
        }
    }
    (sink, layers.into_iter().rev().flatten().collect())
}

/// Adds `counters` to `source`, merging with any existing counting layers.
pub fn wrap_source(source: BoxSource, counters: Vec<Counter>) -> BoxSource {
    if counters.is_empty() {
        return source;
    }
    let (inner, mut merged) = unwrap_read_counters(source);
    merged.extend(counters);
    Box::new(CountingReader::new(inner, merged))
}

/// Adds `counters` to `sink`, merging with any existing counting layers.
pub fn wrap_sink(sink: BoxSink, counters: Vec<Counter>) -> BoxSink {
    if counters.is_empty() {
        return sink;
    }
    let (inner, mut merged) = unwrap_write_counters(sink);
    merged.extend(counters);
    Box::new(CountingWriter::new(inner, merged))
}
