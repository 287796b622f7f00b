//! Reference-counted handles over a [`Buffer`].
//!
//! Every [`SharedBuffer`] handle is one registered owner. Cloning (or
//! [`SharedBuffer::inc_ref`]) registers another, dropping a handle (or
//! [`SharedBuffer::dec_ref`]) releases it. The storage goes back to its pool
//! when the last handle is released and never earlier.
//!
//! Handles share the buffer's cursors: bytes read through one handle are gone
//! for all of them.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::buffer::Buffer;

/// A buffer shared by several owners.
#[derive(Clone)]
pub struct SharedBuffer {
    inner: Arc<Mutex<Buffer>>,
}

impl SharedBuffer {
    /// Turns `buffer` into a shared handle with one owner.
    pub fn new(buffer: Buffer) -> Self {
        Self {
            inner: Arc::new(Mutex::new(buffer)),
        }
    }

    /// Registers another owner and returns its handle.
    #[must_use]
    pub fn inc_ref(&self) -> Self {
        self.clone()
    }

    /// Releases this owner. The storage is freed once no owner remains.
    pub fn dec_ref(self) {
        drop(self);
    }

    /// Owners currently registered, this handle included.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Locks the buffer for reading or writing.
    pub fn lock(&self) -> MutexGuard<'_, Buffer> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of unread bytes.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` when no unread bytes remain.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copies the unread bytes into a new vector.
    pub fn to_vec(&self) -> Vec<u8> {
        self.lock().to_vec()
    }

    /// Takes the buffer back when this is the only owner.
    pub fn try_into_buffer(self) -> Result<Buffer, Self> {
        Arc::try_unwrap(self.inner)
            .map(|mutex| mutex.into_inner().unwrap_or_else(PoisonError::into_inner))
            .map_err(|inner| Self { inner })
    }
}

impl From<Buffer> for SharedBuffer {
    fn from(buffer: Buffer) -> Self {
        Self::new(buffer)
    }
}

impl fmt::Debug for SharedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedBuffer")
            .field("owners", &self.ref_count())
            .field("buffer", &*self.lock())
            .finish()
    }
}
