//! Zero-copy descriptor-to-descriptor transfer through pooled kernel pipes.
//!
//! `splice(2)` moves data between a descriptor and a pipe without copying it
//! through userspace. Relaying from one descriptor to another therefore takes
//! two calls per chunk: source into the pipe, pipe into the destination. Pipes
//! are costly to create, so they live in a [`SplicePipePool`] and are reused
//! as long as they come back empty.
//!
//! # Fallback
//!
//! [`splice_copy`] reports [`Spliced::NotHandled`] when the kernel rejects the
//! descriptor pair (`EINVAL`/`ENOSYS`, e.g. a destination opened with
//! `O_APPEND`) or when no pipe can be created. Bytes already moved stay
//! counted and the caller continues with a buffered copy from where splice
//! stopped. If the rejection happens on the write side the bytes stranded in
//! the pipe are first delivered with plain `read`/`write`.
//!
//! # Blocking
//!
//! Calls use `SPLICE_F_NONBLOCK`. On `EAGAIN` the descriptor is polled for
//! readiness, honouring `SO_RCVTIMEO`/`SO_SNDTIMEO` when it is a socket with a
//! timeout set. Non-sockets wait indefinitely.

use std::io;
use std::mem::{self, ManuallyDrop};
use std::ops::{Deref, DerefMut};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::ptr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::config::SpliceConfig;
use crate::counter::CounterSet;
use crate::debug_io;
use crate::error::{STAGE_SPLICE_READ, STAGE_SPLICE_WRITE, TransferError};

const SPLICE_FLAGS: libc::c_uint = libc::SPLICE_F_NONBLOCK | libc::SPLICE_F_MOVE;

/// Scratch size for draining a pipe through userspace.
const DRAIN_CHUNK: usize = 64 * 1024;

/// How a splice attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Spliced {
    /// The source reached end of stream; everything was moved.
    Done,
    /// Splice cannot serve this pair; continue with a buffered copy.
    NotHandled,
}

/// A kernel pipe with a count of bytes sitting in it.
#[derive(Debug)]
pub struct SplicePipe {
    read_end: OwnedFd,
    write_end: OwnedFd,
    pending: usize,
}

impl SplicePipe {
    /// Creates a non-blocking, close-on-exec pipe and asks the kernel to size
    /// it to `capacity` bytes. The resize is best effort.
    pub fn open(capacity: usize) -> io::Result<Self> {
        let mut fds = [0 as libc::c_int; 2];
        // SAFETY: `fds` is a valid two-element array for pipe2 to fill.
        let rc = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC | libc::O_NONBLOCK) };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: pipe2 succeeded, so both descriptors are open and owned by
        // nothing else.
        let (read_end, write_end) =
            unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };

        let capacity = capacity.min(libc::c_int::MAX as usize) as libc::c_int;
        // SAFETY: `write_end` is an open pipe descriptor; failure leaves the
        // default capacity in place.
        unsafe {
            libc::fcntl(write_end.as_raw_fd(), libc::F_SETPIPE_SZ, capacity);
        }

        Ok(Self {
            read_end,
            write_end,
            pending: 0,
        })
    }

    /// Bytes written into the pipe and not yet read out.
    pub const fn pending(&self) -> usize {
        self.pending
    }
}

/// Snapshot of pipe pool activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipePoolStats {
    /// Pipes created.
    pub created: u64,
    /// Checkouts served from the idle list.
    pub reused: u64,
    /// Pipes returned to the idle list.
    pub recycled: u64,
    /// Pipes closed on checkin, dirty or surplus.
    pub destroyed: u64,
    /// Pipes currently idle.
    pub idle: usize,
}

#[derive(Debug, Default)]
struct PoolCounters {
    created: AtomicU64,
    reused: AtomicU64,
    recycled: AtomicU64,
    destroyed: AtomicU64,
}

/// A pool of reusable splice pipes.
///
/// Only pipes that come back with nothing pending are reused; a pipe that
/// still holds bytes is closed.
#[derive(Debug)]
pub struct SplicePipePool {
    idle: Mutex<Vec<SplicePipe>>,
    pipe_size: usize,
    max_idle: usize,
    counters: PoolCounters,
}

impl SplicePipePool {
    /// Creates an empty pool.
    #[must_use]
    pub fn new(config: &SpliceConfig) -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
            pipe_size: config.pipe_size,
            max_idle: config.max_idle_pipes,
            counters: PoolCounters::default(),
        }
    }

    /// Takes an idle pipe or creates one.
    pub fn checkout(&self) -> io::Result<PipeGuard<'_>> {
        let reusable = self.lock_idle().pop();
        let pipe = match reusable {
            Some(pipe) => {
                self.counters.reused.fetch_add(1, Ordering::Relaxed);
                pipe
            }
            None => {
                let pipe = SplicePipe::open(self.pipe_size)?;
                self.counters.created.fetch_add(1, Ordering::Relaxed);
                debug_io::trace_pipe_event("created", self.idle());
                pipe
            }
        };
        Ok(PipeGuard {
            pipe: ManuallyDrop::new(pipe),
            pool: self,
        })
    }

    /// Creates pipes up front until `count` are idle or the idle limit is
    /// reached. Returns how many were added.
    pub fn prewarm(&self, count: usize) -> io::Result<usize> {
        let target = count.min(self.max_idle);
        let mut added = 0;
        while self.idle() < target {
            let pipe = SplicePipe::open(self.pipe_size)?;
            self.counters.created.fetch_add(1, Ordering::Relaxed);
            self.lock_idle().push(pipe);
            added += 1;
        }
        Ok(added)
    }

    /// Pipes currently idle.
    pub fn idle(&self) -> usize {
        self.lock_idle().len()
    }

    /// Activity counters.
    pub fn stats(&self) -> PipePoolStats {
        PipePoolStats {
            created: self.counters.created.load(Ordering::Relaxed),
            reused: self.counters.reused.load(Ordering::Relaxed),
            recycled: self.counters.recycled.load(Ordering::Relaxed),
            destroyed: self.counters.destroyed.load(Ordering::Relaxed),
            idle: self.idle(),
        }
    }

    fn checkin(&self, pipe: SplicePipe) {
        if pipe.pending != 0 {
            self.counters.destroyed.fetch_add(1, Ordering::Relaxed);
            debug_io::trace_pipe_event("destroyed dirty", self.idle());
            return;
        }
        let mut idle = self.lock_idle();
        if idle.len() < self.max_idle {
            idle.push(pipe);
            self.counters.recycled.fetch_add(1, Ordering::Relaxed);
        } else {
            self.counters.destroyed.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn lock_idle(&self) -> MutexGuard<'_, Vec<SplicePipe>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SplicePipePool {
    fn default() -> Self {
        Self::new(&SpliceConfig::default())
    }
}

/// A checked-out pipe, handed back to its pool when dropped.
#[derive(Debug)]
pub struct PipeGuard<'a> {
    pipe: ManuallyDrop<SplicePipe>,
    pool: &'a SplicePipePool,
}

impl Deref for PipeGuard<'_> {
    type Target = SplicePipe;

    fn deref(&self) -> &SplicePipe {
        &self.pipe
    }
}

impl DerefMut for PipeGuard<'_> {
    fn deref_mut(&mut self) -> &mut SplicePipe {
        &mut self.pipe
    }
}

impl Drop for PipeGuard<'_> {
    fn drop(&mut self) {
        // SAFETY: the pipe is taken exactly once, here, and the guard is not
        // touched afterwards.
        let pipe = unsafe { ManuallyDrop::take(&mut self.pipe) };
        self.pool.checkin(pipe);
    }
}

/// Moves everything from `source` to `destination` through a pooled pipe.
///
/// Each chunk fires `counters` once with the bytes that reached the
/// destination, so on failure they agree with `copied`. Failures are tagged
/// [`STAGE_SPLICE_READ`] or [`STAGE_SPLICE_WRITE`].
pub fn splice_copy(
    pool: &SplicePipePool,
    source: RawFd,
    destination: RawFd,
    counters: &CounterSet,
    max_chunk: usize,
    copied: &mut u64,
) -> Result<Spliced, TransferError> {
    let mut pipe = match pool.checkout() {
        Ok(pipe) => pipe,
        Err(err) => {
            debug_io::trace_splice_fallback(&err.to_string(), 0);
            return Ok(Spliced::NotHandled);
        }
    };
    let max_chunk = max_chunk.max(1);
    let start = *copied;

    loop {
        let chunk = match splice_in(source, &pipe, max_chunk) {
            Ok(0) => return Ok(Spliced::Done),
            Ok(n) => n,
            Err(err) if is_unsupported(&err) => {
                debug_io::trace_splice_fallback(&err.to_string(), *copied - start);
                return Ok(Spliced::NotHandled);
            }
            Err(err) => return Err(TransferError::from(err).at(STAGE_SPLICE_READ)),
        };
        pipe.pending = chunk;
        let before = *copied;

        let result = match splice_out(&mut pipe, destination, copied) {
            Err(err) if is_unsupported(&err) => {
                let drained = drain_pipe(&mut pipe, destination, copied);
                counters.record(*copied - before);
                drained.map_err(|err| TransferError::from(err).at(STAGE_SPLICE_WRITE))?;
                debug_io::trace_splice_fallback(&err.to_string(), *copied - start);
                return Ok(Spliced::NotHandled);
            }
            result => result,
        };
        // Bytes that reached the destination count even when the chunk failed.
        counters.record(*copied - before);
        result.map_err(|err| TransferError::from(err).at(STAGE_SPLICE_WRITE))?;
        debug_io::trace_splice_chunk(chunk);
    }
}

fn is_unsupported(err: &io::Error) -> bool {
    matches!(err.raw_os_error(), Some(libc::EINVAL | libc::ENOSYS))
}

fn splice_in(source: RawFd, pipe: &SplicePipe, len: usize) -> io::Result<usize> {
    loop {
        // SAFETY: both descriptors stay open for the duration of the call;
        // null offsets make the kernel use and advance the file positions.
        let n = unsafe {
            libc::splice(
                source,
                ptr::null_mut(),
                pipe.write_end.as_raw_fd(),
                ptr::null_mut(),
                len,
                SPLICE_FLAGS,
            )
        };
        if n >= 0 {
            return Ok(n as usize);
        }
        let err = io::Error::last_os_error();
        match err.kind() {
            io::ErrorKind::Interrupted => {}
            io::ErrorKind::WouldBlock => wait_ready(source, libc::POLLIN, libc::SO_RCVTIMEO)?,
            _ => return Err(err),
        }
    }
}

fn splice_out(pipe: &mut SplicePipe, destination: RawFd, copied: &mut u64) -> io::Result<()> {
    while pipe.pending > 0 {
        // SAFETY: see `splice_in`.
        let n = unsafe {
            libc::splice(
                pipe.read_end.as_raw_fd(),
                ptr::null_mut(),
                destination,
                ptr::null_mut(),
                pipe.pending,
                SPLICE_FLAGS,
            )
        };
        if n > 0 {
            let n = (n as usize).min(pipe.pending);
            pipe.pending -= n;
            *copied += n as u64;
            continue;
        }
        if n == 0 {
            return Err(io::ErrorKind::WriteZero.into());
        }
        let err = io::Error::last_os_error();
        match err.kind() {
            io::ErrorKind::Interrupted => {}
            io::ErrorKind::WouldBlock => {
                wait_ready(destination, libc::POLLOUT, libc::SO_SNDTIMEO)?;
            }
            _ => return Err(err),
        }
    }
    Ok(())
}

/// Delivers the bytes stranded in `pipe` with plain read/write.
fn drain_pipe(pipe: &mut SplicePipe, destination: RawFd, copied: &mut u64) -> io::Result<()> {
    let mut scratch = vec![0u8; pipe.pending.min(DRAIN_CHUNK)];
    while pipe.pending > 0 {
        let want = pipe.pending.min(scratch.len());
        let got = read_fd(pipe.read_end.as_raw_fd(), &mut scratch[..want])?;
        if got == 0 {
            break;
        }
        write_all_fd(destination, &scratch[..got], copied)?;
        pipe.pending -= got;
    }
    Ok(())
}

fn read_fd(fd: RawFd, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        // SAFETY: `buf` is valid for writes of `buf.len()` bytes.
        let n = unsafe { libc::read(fd, buf.as_mut_ptr().cast::<libc::c_void>(), buf.len()) };
        if n >= 0 {
            return Ok(n as usize);
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

fn write_all_fd(fd: RawFd, mut buf: &[u8], copied: &mut u64) -> io::Result<()> {
    while !buf.is_empty() {
        // SAFETY: `buf` is valid for reads of `buf.len()` bytes.
        let n = unsafe { libc::write(fd, buf.as_ptr().cast::<libc::c_void>(), buf.len()) };
        if n > 0 {
            let n = n as usize;
            buf = &buf[n..];
            *copied += n as u64;
            continue;
        }
        if n == 0 {
            return Err(io::ErrorKind::WriteZero.into());
        }
        let err = io::Error::last_os_error();
        match err.kind() {
            io::ErrorKind::Interrupted => {}
            io::ErrorKind::WouldBlock => wait_ready(fd, libc::POLLOUT, libc::SO_SNDTIMEO)?,
            _ => return Err(err),
        }
    }
    Ok(())
}

/// Blocks until `fd` is ready for `events` or its socket timeout expires.
fn wait_ready(fd: RawFd, events: libc::c_short, timeout_option: libc::c_int) -> io::Result<()> {
    let timeout_ms = socket_timeout(fd, timeout_option).map_or(-1, |timeout| {
        timeout.as_millis().clamp(1, libc::c_int::MAX as u128) as libc::c_int
    });
    let mut pollfd = libc::pollfd {
        fd,
        events,
        revents: 0,
    };
    loop {
        // SAFETY: `pollfd` is a single valid entry.
        let rc = unsafe { libc::poll(&raw mut pollfd, 1, timeout_ms) };
        if rc > 0 {
            if pollfd.revents & libc::POLLNVAL != 0 {
                return Err(io::Error::from_raw_os_error(libc::EBADF));
            }
            return Ok(());
        }
        if rc == 0 {
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "descriptor not ready before its deadline",
            ));
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

/// Reads a socket timeout option. `None` for non-sockets and unset timeouts.
fn socket_timeout(fd: RawFd, option: libc::c_int) -> Option<Duration> {
    // SAFETY: `timeval` is plain data; all-zero is a valid value.
    let mut tv: libc::timeval = unsafe { mem::zeroed() };
    let mut len = mem::size_of::<libc::timeval>() as libc::socklen_t;
    // SAFETY: `tv` and `len` are valid for writes and `len` holds tv's size.
    let rc = unsafe {
        libc::getsockopt(
            fd,
            libc::SOL_SOCKET,
            option,
            (&raw mut tv).cast::<libc::c_void>(),
            &raw mut len,
        )
    };
    if rc != 0 {
        return None;
    }
    let timeout = Duration::from_secs(tv.tv_sec.max(0) as u64)
        + Duration::from_micros(tv.tv_usec.max(0) as u64);
    (!timeout.is_zero()).then_some(timeout)
}
