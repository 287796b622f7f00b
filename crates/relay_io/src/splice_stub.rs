//! Splice stand-in for platforms without `splice(2)`.
//!
//! Exposes the same pool and entry point as the Linux module; every attempt
//! reports [`Spliced::NotHandled`] so copies take the buffered path.

use std::io;
#[cfg(unix)]
use std::os::fd::RawFd;

use crate::config::SpliceConfig;
#[cfg(unix)]
use crate::counter::CounterSet;
#[cfg(unix)]
use crate::error::TransferError;

/// How a splice attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Spliced {
    /// The source reached end of stream; everything was moved.
    Done,
    /// Splice cannot serve this pair; continue with a buffered copy.
    NotHandled,
}

/// Snapshot of pipe pool activity. Always zero here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipePoolStats {
    /// Pipes created.
    pub created: u64,
    /// Checkouts served from the idle list.
    pub reused: u64,
    /// Pipes returned to the idle list.
    pub recycled: u64,
    /// Pipes closed on checkin.
    pub destroyed: u64,
    /// Pipes currently idle.
    pub idle: usize,
}

/// A pipe pool that never holds pipes.
#[derive(Debug, Default)]
pub struct SplicePipePool;

impl SplicePipePool {
    /// Creates the pool.
    #[must_use]
    pub fn new(_config: &SpliceConfig) -> Self {
        Self
    }

    /// Pipes are unavailable on this platform.
    pub fn prewarm(&self, _count: usize) -> io::Result<usize> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "splice pipes are not available on this platform",
        ))
    }

    /// Always zero.
    pub fn idle(&self) -> usize {
        0
    }

    /// Always zero.
    pub fn stats(&self) -> PipePoolStats {
        PipePoolStats::default()
    }
}

/// Always reports [`Spliced::NotHandled`] without touching either descriptor.
#[cfg(unix)]
pub fn splice_copy(
    _pool: &SplicePipePool,
    _source: RawFd,
    _destination: RawFd,
    _counters: &CounterSet,
    _max_chunk: usize,
    _copied: &mut u64,
) -> Result<Spliced, TransferError> {
    Ok(Spliced::NotHandled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_is_always_empty() {
        let pool = SplicePipePool::default();
        assert!(pool.prewarm(4).is_err());
        assert_eq!(pool.idle(), 0);
        assert_eq!(pool.stats(), PipePoolStats::default());
    }
}
