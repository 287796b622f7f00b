//! The copy engine: replays caches, drives handshakes, then moves the rest.
//!
//! A copy runs in two phases.
//!
//! 1. **Early** ([`STAGE_COPY_EARLY`]): before each cache layer is written the
//!    destination's pending handshake, if any, is driven. A buffered
//!    handshake is fed the first cached bytes (or one fresh read from the
//!    source) and whatever it leaves unconsumed goes back in front of the
//!    source. Then the outermost cache layer is written as-is. The loop ends
//!    when no cache layer is left, so bytes come out in source order.
//! 2. **Pure** ([`STAGE_COPY_PURE`]): when both ends expose descriptors the
//!    rest is spliced. Whatever splice does not handle is copied through a
//!    pooled buffer until the source reports end of stream.
//!
//! Byte counters found on either endpoint are peeled off and fired by the
//! engine itself, so a counted endpoint never blocks the splice path and no
//! callback fires twice for the same byte.

use std::io::{Read, Write};
use std::sync::Arc;

use crate::buffer::Buffer;
use crate::cache::{self, CacheReader};
use crate::config::CopyConfig;
use crate::counter::{self, Counter, CounterSet, CountingReader, CountingWriter};
use crate::debug_io;
use crate::error::{
    BufferError, CopyError, STAGE_COPY_EARLY, STAGE_COPY_PURE, STAGE_HANDSHAKE,
    STAGE_HANDSHAKE_READ, STAGE_WRITE_CACHE, TransferError, TransferResult,
};
use crate::pool::BufferAllocator;
use crate::shared::SharedBuffer;
#[cfg(unix)]
use crate::splice::Spliced;
use crate::splice::SplicePipePool;
use crate::stream::{BoxSink, BoxSource, BufferHandshaker, Handshake, Sink, Source};

/// Copies bytes between endpoints using pooled buffers and pipes.
///
/// The engine is cheap to share: pools live behind [`Arc`]s and every method
/// takes `&self`.
///
/// # Example
///
/// ```
/// use relay_io::{Buffer, CacheReader, CopyEngine};
/// use std::io::Cursor;
///
/// let engine = CopyEngine::default();
/// let source = CacheReader::wrap(
///     Box::new(Cursor::new(b" world".to_vec())),
///     Buffer::from_vec(b"hello".to_vec()),
/// );
/// let copied = engine.copy(Box::new(Vec::new()), source).unwrap();
/// assert_eq!(copied, 11);
/// ```
#[derive(Debug)]
pub struct CopyEngine {
    config: CopyConfig,
    buffers: Arc<BufferAllocator>,
    pipes: Arc<SplicePipePool>,
}

impl CopyEngine {
    /// Creates an engine with its own pools.
    #[must_use]
    pub fn new(config: CopyConfig) -> Self {
        let buffers = Arc::new(BufferAllocator::new(&config.buffers));
        let pipes = Arc::new(SplicePipePool::new(&config.splice));
        Self::with_pools(config, buffers, pipes)
    }

    /// Creates an engine sharing existing pools.
    #[must_use]
    pub fn with_pools(
        config: CopyConfig,
        buffers: Arc<BufferAllocator>,
        pipes: Arc<SplicePipePool>,
    ) -> Self {
        Self {
            config,
            buffers,
            pipes,
        }
    }

    /// Engine configuration.
    pub const fn config(&self) -> &CopyConfig {
        &self.config
    }

    /// Buffer allocator used for handshake reads and the bulk loop.
    pub const fn buffers(&self) -> &Arc<BufferAllocator> {
        &self.buffers
    }

    /// Pipe pool used for splice.
    pub const fn pipes(&self) -> &Arc<SplicePipePool> {
        &self.pipes
    }

    /// Copies everything from `source` to `destination`.
    ///
    /// Counters attached to either endpoint fire exactly once per byte. On
    /// failure the error carries the bytes delivered so far and the stage
    /// that failed.
    pub fn copy(&self, destination: BoxSink, source: BoxSource) -> Result<u64, CopyError> {
        let (source, read) = counter::unwrap_read_counters(source);
        let (destination, write) = counter::unwrap_write_counters(destination);
        self.copy_counted(destination, source, read, write)
    }

    /// Copies with explicit counters.
    ///
    /// `read` fires for bytes taken from the source and `write` for bytes
    /// delivered to the destination. Counting layers still attached to the
    /// endpoints keep counting on their own.
    pub fn copy_counted(
        &self,
        mut destination: BoxSink,
        source: BoxSource,
        read: Vec<Counter>,
        write: Vec<Counter>,
    ) -> Result<u64, CopyError> {
        let mut counters = CounterSet::new(read, write);
        let mut copied = 0u64;

        let source = match self.copy_early(destination.as_mut(), source, &counters, &mut copied) {
            Ok(source) => source,
            Err(err) => return Err(fail(copied, err.at(STAGE_COPY_EARLY))),
        };
        debug_io::trace_copy_phase(STAGE_COPY_EARLY, copied);

        // Counting layers under a cache only become visible now.
        let (source, exposed) = counter::unwrap_read_counters(source);
        if !exposed.is_empty() {
            counters.read.splice(0..0, exposed);
        }

        let before = copied;
        match self.copy_pure(destination.as_mut(), source, &counters, &mut copied) {
            Ok(()) => {}
            Err(err) if err.is_end_of_stream() => {}
            Err(err) => return Err(fail(copied, err.at(STAGE_COPY_PURE))),
        }
        debug_io::trace_copy_phase(STAGE_COPY_PURE, copied - before);
        Ok(copied)
    }

    fn copy_early(
        &self,
        destination: &mut dyn Sink,
        mut source: BoxSource,
        counters: &CounterSet,
        copied: &mut u64,
    ) -> TransferResult<BoxSource> {
        loop {
            let (next, drained) = self.handshake(destination, source, counters, copied)?;
            source = next;
            // Everything offered was taken and more is wanted before any write.
            if drained && destination.pending_handshake().is_some() {
                continue;
            }

            let (inner, cached) = cache::pick_one(source);
            source = inner;
            let Some(shared) = cached else {
                return Ok(source);
            };
            let mut buffer = shared.lock();
            if buffer.is_empty() {
                continue;
            }

            let mut sink = CountingWriter::new(&mut *destination, Vec::new());
            let result = buffer.write_to(&mut sink);
            let written = sink.total();
            *copied += written;
            counters.record(written);
            if let Err(err) = result {
                return Err(TransferError::from(err).at(STAGE_WRITE_CACHE));
            }
            debug_io::trace_cache_replay(written);

            if self.config.consistency_checks {
                assert!(
                    buffer.is_empty(),
                    "cache buffer still holds {} bytes after a successful write",
                    buffer.len()
                );
            }
        }
    }

    fn handshake(
        &self,
        destination: &mut dyn Sink,
        source: BoxSource,
        counters: &CounterSet,
        copied: &mut u64,
    ) -> TransferResult<(BoxSource, bool)> {
        match destination.pending_handshake() {
            None => Ok((source, false)),
            Some(Handshake::Plain(handshaker)) => {
                handshaker
                    .handshake()
                    .map_err(|err| TransferError::from(err).at(STAGE_HANDSHAKE))?;
                Ok((source, false))
            }
            Some(Handshake::Buffered(handshaker)) => {
                self.buffered_handshake(handshaker, source, counters, copied)
            }
        }
    }

    /// Offers the next cached or freshly read bytes to `handshaker`.
    ///
    /// Returns the source with any unconsumed bytes back in front, and whether
    /// the handshake took everything it was offered.
    fn buffered_handshake(
        &self,
        handshaker: &mut dyn BufferHandshaker,
        source: BoxSource,
        counters: &CounterSet,
        copied: &mut u64,
    ) -> TransferResult<(BoxSource, bool)> {
        let (mut source, cached) = cache::pick_one(source);
        let shared = match cached {
            Some(shared) if !shared.is_empty() => shared,
            stale => {
                drop(stale);
                SharedBuffer::new(self.read_handshake_input(&mut source)?)
            }
        };

        let consumed = {
            let mut buffer = shared.lock();
            let offered = buffer.len();
            let consumed = handshaker
                .handshake(buffer.unread())
                .map_err(|err| TransferError::from(err).at(STAGE_HANDSHAKE))?;
            if consumed > offered {
                return Err(TransferError::from(BufferError::Overflow).at(STAGE_HANDSHAKE));
            }
            debug_io::trace_handshake(offered, consumed);
            buffer.consume(consumed)
        };
        *copied += consumed as u64;
        counters.record(consumed as u64);

        if shared.is_empty() {
            Ok((source, true))
        } else {
            Ok((CacheReader::wrap(source, shared), false))
        }
    }

    fn read_handshake_input(&self, source: &mut BoxSource) -> TransferResult<Buffer> {
        let mut buffer = self.buffers.standard();
        match buffer.read_from_once(source) {
            Ok(0) => Err(TransferError::from(BufferError::EndOfStream).at(STAGE_HANDSHAKE_READ)),
            Ok(_) => Ok(buffer),
            Err(err) => Err(TransferError::from(err).at(STAGE_HANDSHAKE_READ)),
        }
    }

    fn copy_pure(
        &self,
        destination: &mut dyn Sink,
        mut source: BoxSource,
        counters: &CounterSet,
        copied: &mut u64,
    ) -> TransferResult<()> {
        #[cfg(unix)]
        if self.config.splice.enabled {
            if let (Some(src), Some(dst)) = (source.raw_fd(), destination.raw_fd()) {
                let outcome = crate::splice::splice_copy(
                    &self.pipes,
                    src,
                    dst,
                    counters,
                    self.config.splice.max_chunk,
                    copied,
                )?;
                if outcome == Spliced::Done {
                    return Ok(());
                }
            }
        }
        self.copy_buffered(destination, source.as_mut(), counters, copied)
    }

    fn copy_buffered(
        &self,
        destination: &mut dyn Sink,
        source: &mut dyn Source,
        counters: &CounterSet,
        copied: &mut u64,
    ) -> TransferResult<()> {
        let mut buffer = self.buffers.huge();
        let mut reader = CountingReader::new(source, counters.read.clone());
        let mut writer = CountingWriter::new(destination, counters.write.clone());

        let result = pump(&mut buffer, &mut reader, &mut writer);
        *copied += writer.total();
        buffer.free();
        result
    }
}

impl Default for CopyEngine {
    fn default() -> Self {
        Self::new(CopyConfig::default())
    }
}

fn fail(copied: u64, err: TransferError) -> CopyError {
    let err = CopyError::new(copied, err);
    debug_io::trace_copy_failed(copied, &err);
    err
}

/// Moves bytes through `buffer` until `reader` reports end of stream.
fn pump<R: Read, W: Write>(buffer: &mut Buffer, reader: &mut R, writer: &mut W) -> TransferResult<()> {
    loop {
        buffer.reset();
        if buffer.read_from_once(reader)? == 0 {
            return Ok(());
        }
        buffer.write_to(writer)?;
    }
}
