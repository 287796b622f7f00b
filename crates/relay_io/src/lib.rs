//! Byte relaying between readers and writers.
//!
//! This crate moves bytes from a source to a destination as cheaply as the
//! endpoints allow, while keeping per-byte accounting exact.
//!
//! # Features
//!
//! - **Pooled buffers** ([`Buffer`], [`BufferPool`], [`BufferAllocator`])
//!   with cursor-based read/write and bounded retry on stalled endpoints, and
//!   reference-counted [`SharedBuffer`] handles for buffers with several owners
//! - **Replay caches** ([`CacheReader`]) that put already-read bytes back in
//!   front of a source, stackable and detachable
//! - **Byte counters** ([`Counter`], [`CountingReader`], [`CountingWriter`])
//!   that merge when re-wrapped and fire once per chunk
//! - **Destination handshakes** driven with leading source bytes before any
//!   ordinary write
//! - **Zero-copy splice** between descriptors on Linux through a pool of
//!   reusable pipes, with transparent fallback to buffered copying
//! - **Buffered writes** ([`BufWriter`]) over any sink
//!
//! # Example
//!
//! ```
//! use relay_io::{Counter, CopyEngine, wrap_source};
//! use std::io::Cursor;
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicU64, Ordering};
//!
//! let read = Arc::new(AtomicU64::new(0));
//! let source = wrap_source(
//!     Box::new(Cursor::new(vec![7u8; 10_000])),
//!     vec![Counter::tally(Arc::clone(&read))],
//! );
//!
//! let copied = CopyEngine::default()
//!     .copy(Box::new(Vec::new()), source)
//!     .unwrap();
//! assert_eq!(copied, 10_000);
//! assert_eq!(read.load(Ordering::SeqCst), 10_000);
//! ```
//!
//! # Logging
//!
//! With the default `tracing` feature, trace points are emitted under the
//! `relay::*` targets described in the `logging` crate. Without it every
//! trace point compiles to nothing.

#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_docs)]

pub mod buf_writer;
pub mod buffer;
pub mod cache;
pub mod close;
pub mod config;
pub mod copy;
pub mod counter;
pub mod error;
pub mod pool;
pub mod shared;
pub mod stream;

mod debug_io;

/// Zero-copy relaying through kernel pipes.
///
/// On Linux this uses `splice(2)` with a shared pool of non-blocking pipes.
/// Elsewhere a stub with the same interface reports every pair as not
/// handled, so copies fall back to buffers.
#[cfg(target_os = "linux")]
pub mod splice;
#[cfg(not(target_os = "linux"))]
#[path = "splice_stub.rs"]
pub mod splice;

pub use buf_writer::BufWriter;
pub use buffer::{Buffer, MAX_ZERO_PROGRESS_RETRIES};
pub use cache::{CacheReader, pick_chain, pick_one};
pub use close::{Close, close_all};
pub use config::{BufferConfig, CopyConfig, SpliceConfig};
pub use copy::CopyEngine;
pub use counter::{
    Counter, CounterSet, CountingReader, CountingWriter, unwrap_read_counters,
    unwrap_write_counters, wrap_sink, wrap_source,
};
pub use error::{BufferError, CopyError, TransferError, TransferResult};
pub use pool::{BufferAllocator, BufferPool};
pub use shared::SharedBuffer;
pub use splice::{PipePoolStats, SplicePipePool, Spliced};
pub use stream::{
    BoxSink, BoxSource, BufferHandshaker, Handshake, Handshaker, Plain, Sink, Source,
};
