//! Shared fixtures for relay_io tests.
//!
//! Scripted readers and writers reproduce stalls and failures on demand, and
//! the data helpers produce payloads whose corruption is easy to spot.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

/// Bytes following a short-period pattern that never lines up with buffer sizes.
pub fn patterned(len: usize) -> Vec<u8> {
    (0..len).map(|i| ((i * 7 + 13) % 256) as u8).collect()
}

/// Bytes `0, 1, 2, ...` wrapping at 256.
pub fn sequential(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 256) as u8).collect()
}

/// Writes `data` from a background thread, then drops `writer`.
///
/// Dropping the writer closes the stream, so the reading end sees end of
/// stream once every byte was taken.
pub fn feed<W>(mut writer: W, data: Vec<u8>) -> JoinHandle<io::Result<()>>
where
    W: Write + Send + 'static,
{
    thread::spawn(move || {
        writer.write_all(&data)?;
        writer.flush()
    })
}

/// An anonymous temporary file holding `data`, rewound to the start.
pub fn scratch_file(data: &[u8]) -> io::Result<File> {
    let mut file = tempfile::tempfile()?;
    file.write_all(data)?;
    file.seek(SeekFrom::Start(0))?;
    Ok(file)
}

/// Reads a whole file from the start.
pub fn read_file(file: &mut File) -> io::Result<Vec<u8>> {
    file.seek(SeekFrom::Start(0))?;
    let mut out = Vec::new();
    file.read_to_end(&mut out)?;
    Ok(out)
}

/// One scripted read result.
#[derive(Debug)]
pub enum Step {
    /// Hands out these bytes, split across calls if the caller's buffer is small.
    Data(Vec<u8>),
    /// Fails once with this kind, without consuming anything.
    Stall(io::ErrorKind),
    /// Fails with this kind on this and every later call.
    Fail(io::ErrorKind),
}

/// A reader that replays a script, then reports end of stream.
#[derive(Debug, Default)]
pub struct ScriptedReader {
    steps: VecDeque<Step>,
    calls: usize,
}

impl ScriptedReader {
    /// Creates a reader from `steps`.
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
            calls: 0,
        }
    }

    /// Number of `read` calls so far.
    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl Read for ScriptedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.calls += 1;
        match self.steps.front_mut() {
            None => Ok(0),
            Some(Step::Data(bytes)) => {
                let n = buf.len().min(bytes.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                bytes.drain(..n);
                if bytes.is_empty() {
                    self.steps.pop_front();
                }
                Ok(n)
            }
            Some(Step::Stall(kind)) => {
                let kind = *kind;
                self.steps.pop_front();
                Err(kind.into())
            }
            Some(Step::Fail(kind)) => Err((*kind).into()),
        }
    }
}

/// A reader that never makes progress.
#[derive(Debug)]
pub struct StallingReader {
    kind: io::ErrorKind,
    calls: usize,
}

impl StallingReader {
    /// Fails every read with `kind`.
    pub fn new(kind: io::ErrorKind) -> Self {
        Self { kind, calls: 0 }
    }

    /// Number of `read` calls so far.
    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl Read for StallingReader {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        self.calls += 1;
        Err(self.kind.into())
    }
}

/// A writer that accepts nothing: every write returns `Ok(0)`.
///
/// The call count is shared, so it stays readable after the writer was boxed
/// and handed away.
#[derive(Debug, Clone, Default)]
pub struct StallingWriter {
    calls: Arc<AtomicUsize>,
}

impl StallingWriter {
    /// Creates the writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `write` calls so far, across clones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Write for StallingWriter {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(0)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// An in-memory writer whose contents stay reachable through clones.
#[derive(Debug, Clone, Default)]
pub struct SharedBuf {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuf {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything written so far.
    pub fn contents(&self) -> Vec<u8> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A shared byte total, meant to back a counter callback.
#[derive(Debug, Clone, Default)]
pub struct ByteTally {
    total: Arc<AtomicU64>,
}

impl ByteTally {
    /// Starts at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to the underlying total.
    pub fn handle(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.total)
    }

    /// Current total.
    pub fn get(&self) -> u64 {
        self.total.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_reader_splits_data_and_stalls_once() {
        let mut reader = ScriptedReader::new([
            Step::Data(b"abcdef".to_vec()),
            Step::Stall(io::ErrorKind::WouldBlock),
            Step::Data(b"g".to_vec()),
        ]);
        let mut buf = [0u8; 4];
        assert_eq!(reader.read(&mut buf).unwrap(), 4);
        assert_eq!(reader.read(&mut buf).unwrap(), 2);
        assert_eq!(
            reader.read(&mut buf).unwrap_err().kind(),
            io::ErrorKind::WouldBlock
        );
        assert_eq!(reader.read(&mut buf).unwrap(), 1);
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
        assert_eq!(reader.calls(), 5);
    }

    #[test]
    fn scripted_failure_is_sticky() {
        let mut reader = ScriptedReader::new([Step::Fail(io::ErrorKind::BrokenPipe)]);
        let mut buf = [0u8; 4];
        for _ in 0..3 {
            assert_eq!(
                reader.read(&mut buf).unwrap_err().kind(),
                io::ErrorKind::BrokenPipe
            );
        }
    }

    #[test]
    fn feed_closes_the_stream() {
        let shared = SharedBuf::new();
        feed(shared.clone(), patterned(100)).join().unwrap().unwrap();
        assert_eq!(shared.contents(), patterned(100));
    }

    #[test]
    fn stalling_writer_counts_across_clones() {
        let writer = StallingWriter::new();
        let mut clone = writer.clone();
        assert_eq!(clone.write(b"x").unwrap(), 0);
        assert_eq!(writer.calls(), 1);
    }

    #[test]
    fn scratch_file_round_trips() {
        let mut file = scratch_file(b"scratch").unwrap();
        assert_eq!(read_file(&mut file).unwrap(), b"scratch");
    }
}
