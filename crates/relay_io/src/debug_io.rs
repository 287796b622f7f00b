//! Tracing points for copy phases, cache replays, splice and pool churn.
//!
//! Each function has a no-op twin so call sites stay unconditional when the
//! `tracing` feature is off.

#![cfg_attr(not(target_os = "linux"), allow(dead_code))]

/// Trace the end of a copy phase.
#[cfg(feature = "tracing")]
#[inline]
pub fn trace_copy_phase(phase: &'static str, bytes: u64) {
    logging::trace_copy!(phase = phase, bytes = bytes, "{} moved {} bytes", phase, bytes);
}

/// Trace the end of a copy phase - no-op when tracing is disabled.
#[cfg(not(feature = "tracing"))]
#[inline]
pub fn trace_copy_phase(_phase: &'static str, _bytes: u64) {}

/// Trace a copy failure together with the bytes already delivered.
#[cfg(feature = "tracing")]
#[inline]
pub fn trace_copy_failed(copied: u64, error: &dyn std::error::Error) {
    logging::trace_copy!(copied = copied, "copy failed after {} bytes: {}", copied, error);
}

/// Trace a copy failure - no-op when tracing is disabled.
#[cfg(not(feature = "tracing"))]
#[inline]
pub fn trace_copy_failed(_copied: u64, _error: &dyn std::error::Error) {}

/// Trace one cache buffer replayed into the destination.
#[cfg(feature = "tracing")]
#[inline]
pub fn trace_cache_replay(bytes: u64) {
    logging::trace_cache!(bytes = bytes, "replayed {} cached bytes", bytes);
}

/// Trace a cache replay - no-op when tracing is disabled.
#[cfg(not(feature = "tracing"))]
#[inline]
pub fn trace_cache_replay(_bytes: u64) {}

/// Trace a buffered handshake step.
#[cfg(feature = "tracing")]
#[inline]
pub fn trace_handshake(offered: usize, consumed: usize) {
    logging::trace_handshake!(
        offered = offered,
        consumed = consumed,
        "handshake consumed {} of {} bytes",
        consumed,
        offered
    );
}

/// Trace a buffered handshake step - no-op when tracing is disabled.
#[cfg(not(feature = "tracing"))]
#[inline]
pub fn trace_handshake(_offered: usize, _consumed: usize) {}

/// Trace one chunk moved through a splice pipe.
#[cfg(feature = "tracing")]
#[inline]
pub fn trace_splice_chunk(bytes: usize) {
    logging::trace_splice!(bytes = bytes, "spliced {} bytes", bytes);
}

/// Trace a splice chunk - no-op when tracing is disabled.
#[cfg(not(feature = "tracing"))]
#[inline]
pub fn trace_splice_chunk(_bytes: usize) {}

/// Trace a hand-off from splice to the buffered path.
#[cfg(feature = "tracing")]
#[inline]
pub fn trace_splice_fallback(reason: &str, moved: u64) {
    logging::trace_splice!(
        reason = reason,
        moved = moved,
        "splice not handled after {} bytes: {}",
        moved,
        reason
    );
}

/// Trace a splice fallback - no-op when tracing is disabled.
#[cfg(not(feature = "tracing"))]
#[inline]
pub fn trace_splice_fallback(_reason: &str, _moved: u64) {}

/// Trace a pipe entering or leaving the pipe pool.
#[cfg(feature = "tracing")]
#[inline]
pub fn trace_pipe_event(event: &'static str, idle: usize) {
    logging::trace_pool!(event = event, idle = idle, "pipe {} (idle={})", event, idle);
}

/// Trace a pipe pool event - no-op when tracing is disabled.
#[cfg(not(feature = "tracing"))]
#[inline]
pub fn trace_pipe_event(_event: &'static str, _idle: usize) {}

/// Trace a buffer pool miss that forced a fresh allocation.
#[cfg(feature = "tracing")]
#[inline]
pub fn trace_pool_miss(class: usize) {
    logging::trace_pool!(class = class, "buffer pool miss for {} byte class", class);
}

/// Trace a buffer pool miss - no-op when tracing is disabled.
#[cfg(not(feature = "tracing"))]
#[inline]
pub fn trace_pool_miss(_class: usize) {}
