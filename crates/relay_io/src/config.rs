//! Tuning knobs for buffer pools, splice pipes and the copy engine.
//!
//! Everything here is plain data: construct a config, adjust fields, and hand
//! it to [`CopyEngine::new`](crate::CopyEngine::new). Nothing is read from
//! the environment.

use crate::pool::{HUGE_BUFFER_SIZE, LARGE_BUFFER_SIZE, MINIMAL_BUFFER_SIZE, STANDARD_BUFFER_SIZE};

/// Default kernel pipe capacity requested for splice pipes (1 MiB).
pub const DEFAULT_PIPE_SIZE: usize = 1 << 20;

/// Default upper bound for a single splice call (1 MiB).
pub const DEFAULT_SPLICE_CHUNK: usize = 1 << 20;

/// Buffer pool layout.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BufferConfig {
    /// Size classes, one pool each. Classes of 64 KiB or more are never pooled.
    pub class_sizes: Vec<usize>,
    /// Idle buffers each class keeps for reuse.
    pub max_retained: usize,
    /// Size used for handshake reads and other small scratch buffers.
    pub standard_size: usize,
    /// Size used for the bulk copy loop.
    pub huge_size: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        let max_retained = std::thread::available_parallelism()
            .map(|p| p.get() * 4)
            .unwrap_or(16);
        Self {
            class_sizes: vec![
                MINIMAL_BUFFER_SIZE,
                STANDARD_BUFFER_SIZE,
                LARGE_BUFFER_SIZE,
                HUGE_BUFFER_SIZE,
            ],
            max_retained,
            standard_size: STANDARD_BUFFER_SIZE,
            huge_size: HUGE_BUFFER_SIZE,
        }
    }
}

/// Splice pipe pool settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SpliceConfig {
    /// Whether descriptor pairs may take the splice path at all.
    pub enabled: bool,
    /// Capacity requested from the kernel for new pipes. Best effort.
    pub pipe_size: usize,
    /// Upper bound for one splice call.
    pub max_chunk: usize,
    /// Idle pipes kept for reuse.
    pub max_idle_pipes: usize,
}

impl Default for SpliceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            pipe_size: DEFAULT_PIPE_SIZE,
            max_chunk: DEFAULT_SPLICE_CHUNK,
            max_idle_pipes: 16,
        }
    }
}

/// Copy engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CopyConfig {
    /// Buffer pool layout.
    pub buffers: BufferConfig,
    /// Splice settings.
    pub splice: SpliceConfig,
    /// Panic when a cache buffer is not fully drained after being written.
    pub consistency_checks: bool,
}

impl Default for CopyConfig {
    fn default() -> Self {
        Self {
            buffers: BufferConfig::default(),
            splice: SpliceConfig::default(),
            consistency_checks: cfg!(debug_assertions),
        }
    }
}

impl CopyConfig {
    /// A few long-lived, high-volume streams: larger pipes, more idle pipes.
    #[must_use]
    pub fn for_bulk_transfers() -> Self {
        let mut config = Self::default();
        config.splice.pipe_size = 4 << 20;
        config.splice.max_chunk = 4 << 20;
        config.splice.max_idle_pipes = 64;
        config
    }

    /// Many short-lived connections: small pipes, deep buffer retention.
    #[must_use]
    pub fn for_many_connections() -> Self {
        let mut config = Self::default();
        config.buffers.max_retained *= 4;
        config.splice.pipe_size = 64 * 1024;
        config.splice.max_chunk = 64 * 1024;
        config.splice.max_idle_pipes = 256;
        config
    }

    /// Disables the splice path, forcing every copy through buffers.
    #[must_use]
    pub fn without_splice(mut self) -> Self {
        self.splice.enabled = false;
        self
    }
}
