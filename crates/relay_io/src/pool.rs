//! Size-classed pools of reusable buffer storage.
//!
//! A [`BufferPool`] serves one size class and keeps up to `max_retained` idle
//! storage vectors behind a mutex. A [`BufferAllocator`] holds several classes
//! and routes each request to the smallest class that fits, falling back to an
//! ad hoc allocation when none does.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::buffer::Buffer;
use crate::config::BufferConfig;
use crate::debug_io;

/// Classes at or above this size are allocated ad hoc, never pooled.
pub const MAX_POOLED_SIZE: usize = 64 * 1024;

/// Smallest default size class (512 B).
pub const MINIMAL_BUFFER_SIZE: usize = 512;
/// Default class for handshakes and small scratch buffers (4 KiB).
pub const STANDARD_BUFFER_SIZE: usize = 4 * 1024;
/// Default intermediate class (16 KiB).
pub const LARGE_BUFFER_SIZE: usize = 16 * 1024;
/// Default class for the bulk copy loop (32 KiB).
pub const HUGE_BUFFER_SIZE: usize = 32 * 1024;

/// A thread-safe pool of buffers of one size class.
///
/// # Example
///
/// ```
/// use relay_io::BufferPool;
/// use std::sync::Arc;
///
/// let pool = Arc::new(BufferPool::new(4096, 8));
/// let mut buffer = pool.get();
/// buffer.write_str("hello").unwrap();
/// buffer.free();
/// assert_eq!(pool.available(), 1);
/// ```
#[derive(Debug)]
pub struct BufferPool {
    idle: Mutex<Vec<Vec<u8>>>,
    size: usize,
    max_retained: usize,
}

impl BufferPool {
    /// Creates a pool handing out buffers of `size` bytes.
    #[must_use]
    pub fn new(size: usize, max_retained: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::with_capacity(max_retained.min(64))),
            size,
            max_retained,
        }
    }

    /// Size class served by this pool.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Maximum idle buffers retained.
    pub fn max_retained(&self) -> usize {
        self.max_retained
    }

    /// Returns `true` when buffers from this pool are recycled.
    pub fn is_pooling(&self) -> bool {
        self.size > 0 && self.size < MAX_POOLED_SIZE && self.max_retained > 0
    }

    /// Idle buffers ready for reuse.
    pub fn available(&self) -> usize {
        self.lock_idle().len()
    }

    /// Hands out an empty buffer of the class size.
    ///
    /// The buffer is managed (returns to this pool on free) only when the pool
    /// is pooling; otherwise it is an ad hoc allocation.
    pub fn get(self: &Arc<Self>) -> Buffer {
        self.get_size(self.size)
    }

    /// Hands out an empty buffer whose logical size is `size`.
    ///
    /// Requests larger than the class, or any request on a non-pooling pool,
    /// get an ad hoc buffer.
    pub fn get_size(self: &Arc<Self>, size: usize) -> Buffer {
        if size > self.size || !self.is_pooling() {
            return Buffer::new(size);
        }
        let storage = self.lock_idle().pop();
        let storage = storage.unwrap_or_else(|| {
            debug_io::trace_pool_miss(self.size);
            vec![0u8; self.size]
        });
        Buffer::from_pool(storage, size, Arc::clone(self))
    }

    /// Returns a buffer to the pool.
    ///
    /// Buffers owned by another pool and ad hoc buffers are dropped without
    /// recycling. A buffer with several owners is a
    /// [`SharedBuffer`](crate::SharedBuffer) and only comes back through its
    /// last handle.
    pub fn put(&self, mut buffer: Buffer) {
        if buffer.belongs_to(self) {
            buffer.free();
        } else {
            buffer.discard_storage();
        }
    }

    pub(crate) fn recycle(&self, storage: Vec<u8>) {
        if storage.len() != self.size || !self.is_pooling() {
            return;
        }
        let mut idle = self.lock_idle();
        if idle.len() < self.max_retained {
            idle.push(storage);
        }
    }

    fn lock_idle(&self) -> MutexGuard<'_, Vec<Vec<u8>>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Routes allocations to the smallest fitting size class.
#[derive(Debug)]
pub struct BufferAllocator {
    classes: Vec<Arc<BufferPool>>,
    standard_size: usize,
    huge_size: usize,
}

impl BufferAllocator {
    /// Builds one pool per configured class, ignoring zero and duplicate sizes.
    #[must_use]
    pub fn new(config: &BufferConfig) -> Self {
        let mut sizes: Vec<usize> = config
            .class_sizes
            .iter()
            .copied()
            .filter(|&size| size > 0)
            .collect();
        sizes.sort_unstable();
        sizes.dedup();
        Self {
            classes: sizes
                .into_iter()
                .map(|size| Arc::new(BufferPool::new(size, config.max_retained)))
                .collect(),
            standard_size: config.standard_size,
            huge_size: config.huge_size,
        }
    }

    /// Allocates an empty buffer of exactly `size` logical bytes.
    pub fn alloc(&self, size: usize) -> Buffer {
        self.classes
            .iter()
            .find(|pool| pool.is_pooling() && pool.size() >= size)
            .map_or_else(|| Buffer::new(size), |pool| pool.get_size(size))
    }

    /// Smallest class buffer.
    pub fn minimal(&self) -> Buffer {
        let size = self.classes.first().map_or(MINIMAL_BUFFER_SIZE, |pool| pool.size());
        self.alloc(size)
    }

    /// Handshake-sized buffer.
    pub fn standard(&self) -> Buffer {
        self.alloc(self.standard_size)
    }

    /// Bulk-copy-sized buffer.
    pub fn huge(&self) -> Buffer {
        self.alloc(self.huge_size)
    }

    /// Returns a buffer to whichever class owns it.
    pub fn put(&self, mut buffer: Buffer) {
        match self.classes.iter().find(|pool| buffer.belongs_to(pool)) {
            Some(pool) => pool.put(buffer),
            None => buffer.discard_storage(),
        }
    }

    /// Pools backing each class, smallest first.
    pub fn classes(&self) -> &[Arc<BufferPool>] {
        &self.classes
    }
}

impl Default for BufferAllocator {
    fn default() -> Self {
        Self::new(&BufferConfig::default())
    }
}
