//! crates/logging/src/tracing_macros.rs
//! Convenience macros for relay subsystem tracing.
//!
//! Each macro forwards to a standard tracing macro with the subsystem's fixed
//! target, so filters built by [`crate::env_filter`] apply to it.

/// Emit a copy engine trace.
///
/// # Example
/// ```ignore
/// trace_copy!("copyPure moved {} bytes", bytes);
/// ```
#[macro_export]
macro_rules! trace_copy {
    ($($arg:tt)*) => {
        ::tracing::info!(target: "relay::copy", $($arg)*);
    };
}

/// Emit a cache replay trace.
///
/// # Example
/// ```ignore
/// trace_cache!("replayed {} cached bytes", len);
/// ```
#[macro_export]
macro_rules! trace_cache {
    ($($arg:tt)*) => {
        ::tracing::debug!(target: "relay::cache", $($arg)*);
    };
}

/// Emit a handshake trace.
///
/// # Example
/// ```ignore
/// trace_handshake!("handshake consumed {} bytes", consumed);
/// ```
#[macro_export]
macro_rules! trace_handshake {
    ($($arg:tt)*) => {
        ::tracing::debug!(target: "relay::handshake", $($arg)*);
    };
}

/// Emit a splice trace.
///
/// # Example
/// ```ignore
/// trace_splice!("spliced {} bytes", chunk);
/// ```
#[macro_export]
macro_rules! trace_splice {
    ($($arg:tt)*) => {
        ::tracing::trace!(target: "relay::splice", $($arg)*);
    };
}

/// Emit a buffer or pipe pool trace.
///
/// # Example
/// ```ignore
/// trace_pool!("pipe recycled (idle={})", idle);
/// ```
#[macro_export]
macro_rules! trace_pool {
    ($($arg:tt)*) => {
        ::tracing::trace!(target: "relay::pool", $($arg)*);
    };
}
