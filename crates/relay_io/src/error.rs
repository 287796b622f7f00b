//! crates/relay_io/src/error.rs
//!
//! Error types for buffer, cache and copy operations.
//!
//! [`BufferError`] covers the fixed-region failures a [`Buffer`](crate::Buffer)
//! can report. [`TransferError`] layers stage context and multi-error
//! aggregation on top, and [`CopyError`] pairs a transfer failure with the
//! number of bytes already delivered to the destination.

use std::fmt;
use std::io;

use thiserror::Error;

/// Stage tag for the cache replay and handshake phase of a copy.
pub const STAGE_COPY_EARLY: &str = "copyEarly";
/// Stage tag for the bulk phase of a copy.
pub const STAGE_COPY_PURE: &str = "copyPure";
/// Stage tag for a failed destination handshake.
pub const STAGE_HANDSHAKE: &str = "handshake";
/// Stage tag for the initial source read that feeds a buffered handshake.
pub const STAGE_HANDSHAKE_READ: &str = "handshakeRead";
/// Stage tag for draining a cache buffer into the destination.
pub const STAGE_WRITE_CACHE: &str = "writeCache";
/// Stage tag for flushing a buffered writer.
pub const STAGE_FLUSH: &str = "flush";
/// Stage tag for moving bytes from the source descriptor into a pipe.
pub const STAGE_SPLICE_READ: &str = "splice read";
/// Stage tag for moving bytes from a pipe into the destination descriptor.
pub const STAGE_SPLICE_WRITE: &str = "splice write";

/// Result type for transfer operations.
pub type TransferResult<T> = Result<T, TransferError>;

/// Failures reported by [`Buffer`](crate::Buffer) operations.
#[derive(Debug, Error)]
pub enum BufferError {
    /// The buffer has no room for the requested bytes.
    #[error("short buffer")]
    ShortBuffer,
    /// A size, count or cursor exceeds the buffer's storage.
    #[error("buffer overflow")]
    Overflow,
    /// There are no unread bytes left to hand out.
    #[error("end of stream")]
    EndOfStream,
    /// The peer made no progress for too many consecutive attempts.
    #[error("multiple read or write calls made no progress")]
    NoProgress,
    /// The underlying reader or writer failed.
    #[error("I/O error: {0}")]
    Io(#[source] io::Error),
}

impl BufferError {
    /// Returns the [`io::ErrorKind`] used when this error crosses an
    /// [`io::Read`]/[`io::Write`] boundary.
    pub fn io_kind(&self) -> io::ErrorKind {
        match self {
            Self::ShortBuffer => io::ErrorKind::WriteZero,
            Self::Overflow => io::ErrorKind::InvalidInput,
            Self::EndOfStream => io::ErrorKind::UnexpectedEof,
            Self::NoProgress => io::ErrorKind::Other,
            Self::Io(err) => err.kind(),
        }
    }

    /// Returns `true` for [`BufferError::EndOfStream`].
    pub const fn is_end_of_stream(&self) -> bool {
        matches!(self, Self::EndOfStream)
    }
}

impl From<io::Error> for BufferError {
    fn from(err: io::Error) -> Self {
        // Buffer errors that crossed an io::Read/io::Write boundary come back
        // as themselves instead of nesting.
        if err.get_ref().is_some_and(|inner| inner.is::<Self>()) {
            let kind = err.kind();
            return match err.into_inner().map(|inner| inner.downcast::<Self>()) {
                Some(Ok(inner)) => *inner,
                Some(Err(other)) => Self::Io(io::Error::new(kind, other)),
                None => Self::Io(kind.into()),
            };
        }
        Self::Io(err)
    }
}

impl From<BufferError> for io::Error {
    fn from(err: BufferError) -> Self {
        match err {
            BufferError::Io(inner) => inner,
            other => Self::new(other.io_kind(), other),
        }
    }
}

/// A failure anywhere in a transfer, optionally tagged with the stage it
/// happened in.
#[derive(Debug, Error)]
pub enum TransferError {
    /// A buffer-level failure.
    #[error(transparent)]
    Buffer(BufferError),
    /// An I/O failure from a reader, writer or syscall.
    #[error(transparent)]
    Io(io::Error),
    /// An error annotated with the stage that produced it.
    #[error("{stage} : {source}")]
    Stage {
        /// Stage tag, for example [`STAGE_COPY_PURE`].
        stage: &'static str,
        /// The wrapped failure.
        #[source]
        source: Box<TransferError>,
    },
    /// Several distinct failures, deduplicated by message.
    #[error("{}", MultiDisplay(.0))]
    Multi(Vec<TransferError>),
}

impl TransferError {
    /// Wraps `self` with a stage tag.
    pub fn at(self, stage: &'static str) -> Self {
        Self::Stage {
            stage,
            source: Box::new(self),
        }
    }

    /// Returns the outermost stage tag, if any.
    pub const fn stage(&self) -> Option<&'static str> {
        match self {
            Self::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Returns every stage tag from the outermost inwards.
    pub fn stages(&self) -> Vec<&'static str> {
        let mut stages = Vec::new();
        let mut current = self;
        while let Self::Stage { stage, source } = current {
            stages.push(*stage);
            current = source;
        }
        stages
    }

    /// Returns the innermost failure with all stage tags peeled off.
    pub fn root(&self) -> &Self {
        let mut current = self;
        while let Self::Stage { source, .. } = current {
            current = source;
        }
        current
    }

    /// Returns `true` when this error is only end-of-stream, possibly tagged.
    ///
    /// A multi-error qualifies only when every member does.
    pub fn is_end_of_stream(&self) -> bool {
        match self.root() {
            Self::Buffer(err) => err.is_end_of_stream(),
            Self::Multi(errors) => !errors.is_empty() && errors.iter().all(Self::is_end_of_stream),
            _ => false,
        }
    }

    /// Returns `true` when the root cause is [`BufferError::NoProgress`].
    pub fn is_no_progress(&self) -> bool {
        matches!(self.root(), Self::Buffer(BufferError::NoProgress))
    }

    /// Returns the [`io::ErrorKind`] of the root cause.
    pub fn kind(&self) -> io::ErrorKind {
        match self.root() {
            Self::Buffer(err) => err.io_kind(),
            Self::Io(err) => err.kind(),
            _ => io::ErrorKind::Other,
        }
    }

    /// Aggregates failures, dropping duplicates by rendered message.
    ///
    /// Returns `None` for an empty input and the sole error unchanged when only
    /// one distinct failure remains.
    pub fn join<I>(errors: I) -> Option<Self>
    where
        I: IntoIterator<Item = Self>,
    {
        let mut seen = Vec::new();
        let mut distinct = Vec::new();
        for err in errors {
            let message = err.to_string();
            if !seen.contains(&message) {
                seen.push(message);
                distinct.push(err);
            }
        }
        match distinct.len() {
            0 => None,
            1 => distinct.pop(),
            _ => Some(Self::Multi(distinct)),
        }
    }
}

impl From<BufferError> for TransferError {
    fn from(err: BufferError) -> Self {
        match err {
            BufferError::Io(inner) => Self::Io(inner),
            other => Self::Buffer(other),
        }
    }
}

impl From<io::Error> for TransferError {
    fn from(err: io::Error) -> Self {
        if err.get_ref().is_some_and(|inner| inner.is::<Self>()) {
            let kind = err.kind();
            return match err.into_inner().map(|inner| inner.downcast::<Self>()) {
                Some(Ok(inner)) => *inner,
                Some(Err(other)) => Self::Io(io::Error::new(kind, other)),
                None => Self::Io(kind.into()),
            };
        }
        BufferError::from(err).into()
    }
}

impl From<TransferError> for io::Error {
    fn from(err: TransferError) -> Self {
        match err {
            TransferError::Io(inner) => inner,
            TransferError::Buffer(inner) => inner.into(),
            other => Self::new(other.kind(), other),
        }
    }
}

struct MultiDisplay<'a>(&'a [TransferError]);

impl fmt::Display for MultiDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, err) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str(";\n")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

/// A failed copy together with the bytes already delivered.
#[derive(Debug, Error)]
#[error("copy failed after {copied} bytes: {source}")]
pub struct CopyError {
    copied: u64,
    #[source]
    source: TransferError,
}

impl CopyError {
    /// Creates a copy error.
    pub const fn new(copied: u64, source: TransferError) -> Self {
        Self { copied, source }
    }

    /// Bytes written to the destination before the failure.
    pub const fn copied(&self) -> u64 {
        self.copied
    }

    /// Outermost stage tag of the failure.
    pub const fn stage(&self) -> Option<&'static str> {
        self.source.stage()
    }

    /// Borrows the underlying transfer error.
    pub const fn transfer_error(&self) -> &TransferError {
        &self.source
    }

    /// Consumes the copy error, returning the transfer error.
    pub fn into_transfer_error(self) -> TransferError {
        self.source
    }
}

impl From<CopyError> for io::Error {
    fn from(err: CopyError) -> Self {
        Self::new(err.source.kind(), err)
    }
}
