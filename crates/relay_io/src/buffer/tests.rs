use super::*;
use std::io::Cursor;

use crate::shared::SharedBuffer;

use test_support::{ScriptedReader, StallingReader, StallingWriter, Step, patterned};

fn pool(size: usize) -> Arc<BufferPool> {
    Arc::new(BufferPool::new(size, 4))
}

// ---------------------------------------------------------------------------
// Cursors and sizing
// ---------------------------------------------------------------------------

#[test]
fn new_buffer_is_empty_and_writable() {
    let buffer = Buffer::new(16);
    assert!(buffer.is_empty());
    assert!(!buffer.is_full());
    assert_eq!(buffer.free_len(), 16);
    assert!(!buffer.is_managed());
}

#[test]
fn from_vec_is_fully_readable() {
    let buffer = Buffer::from_vec(b"ready".to_vec());
    assert_eq!(buffer.unread(), b"ready");
    assert!(buffer.is_full());
}

#[test]
fn commit_exposes_written_bytes() {
    let mut buffer = Buffer::new(8);
    buffer.free_bytes_mut()[..3].copy_from_slice(b"abc");
    buffer.commit(3).unwrap();
    assert_eq!(buffer.unread(), b"abc");
    assert!(matches!(buffer.commit(6), Err(BufferError::Overflow)));
}

#[test]
fn resize_clamps_cursors() {
    let mut buffer = Buffer::from_vec(patterned(32));
    buffer.discard(10).unwrap();

    buffer.resize(8).unwrap();
    assert_eq!(buffer.size(), 8);
    assert!(buffer.is_empty(), "read cursor clamped to write cursor");

    buffer.resize(32).unwrap();
    assert!(matches!(buffer.resize(33), Err(BufferError::Overflow)));
}

#[test]
fn truncate_keeps_leading_bytes() {
    let mut buffer = Buffer::from_vec(b"abcdef".to_vec());
    buffer.truncate(2);
    assert_eq!(buffer.unread(), b"ab");
    buffer.truncate(10);
    assert_eq!(buffer.unread(), b"ab");
}

// ---------------------------------------------------------------------------
// Byte-level operations
// ---------------------------------------------------------------------------

#[test]
fn peek_does_not_consume() {
    let buffer = Buffer::from_vec(b"peek".to_vec());
    assert_eq!(buffer.peek(2).unwrap(), b"pe");
    assert_eq!(buffer.peek(0).unwrap(), b"");
    assert!(matches!(buffer.peek(5), Err(BufferError::Overflow)));
    assert_eq!(buffer.len(), 4);
}

#[test]
fn peek_on_empty_buffer_is_end_of_stream() {
    let buffer = Buffer::new(4);
    assert!(matches!(buffer.peek(1), Err(BufferError::EndOfStream)));
    assert!(buffer.peek(0).unwrap().is_empty());
}

#[test]
fn discard_is_clamped() {
    let mut buffer = Buffer::from_vec(b"abc".to_vec());
    assert_eq!(buffer.discard(10).unwrap(), 3);
    assert!(matches!(buffer.discard(1), Err(BufferError::EndOfStream)));
}

#[test]
fn byte_round_trip() {
    let mut buffer = Buffer::new(2);
    buffer.write_byte(b'x').unwrap();
    buffer.write_byte(b'y').unwrap();
    assert!(matches!(buffer.write_byte(b'z'), Err(BufferError::ShortBuffer)));

    assert_eq!(buffer.read_byte().unwrap(), b'x');
    assert_eq!(buffer.read_byte().unwrap(), b'y');
    assert!(matches!(buffer.read_byte(), Err(BufferError::EndOfStream)));
}

#[test]
fn write_str_is_all_or_nothing() {
    let mut buffer = Buffer::new(4);
    assert_eq!(buffer.write_str("ab").unwrap(), 2);
    assert!(matches!(buffer.write_str("cde"), Err(BufferError::ShortBuffer)));
    assert_eq!(buffer.unread(), b"ab");
}

// ---------------------------------------------------------------------------
// Reading from sources
// ---------------------------------------------------------------------------

#[test]
fn read_from_stops_at_end_of_stream() {
    let mut buffer = Buffer::new(64);
    let n = buffer.read_from(&mut Cursor::new(b"short".to_vec())).unwrap();
    assert_eq!(n, 5);
    assert_eq!(buffer.unread(), b"short");
}

#[test]
fn read_from_reports_short_buffer_and_keeps_bytes() {
    let mut buffer = Buffer::new(4);
    let err = buffer
        .read_from(&mut Cursor::new(b"too long".to_vec()))
        .unwrap_err();
    assert!(matches!(err, BufferError::ShortBuffer));
    assert_eq!(buffer.unread(), b"too ");
}

#[test]
fn read_from_survives_intermittent_stalls() {
    let mut reader = ScriptedReader::new([
        Step::Data(b"ab".to_vec()),
        Step::Stall(io::ErrorKind::WouldBlock),
        Step::Stall(io::ErrorKind::Interrupted),
        Step::Data(b"cd".to_vec()),
    ]);
    let mut buffer = Buffer::new(16);
    assert_eq!(buffer.read_from(&mut reader).unwrap(), 4);
    assert_eq!(buffer.unread(), b"abcd");
}

#[test]
fn read_from_gives_up_on_the_101st_stall() {
    let mut reader = StallingReader::new(io::ErrorKind::WouldBlock);
    let mut buffer = Buffer::new(16);

    let err = buffer.read_from(&mut reader).unwrap_err();

    assert!(matches!(err, BufferError::NoProgress));
    assert_eq!(reader.calls(), MAX_ZERO_PROGRESS_RETRIES + 1);
}

#[test]
fn read_from_once_retries_interrupts_only() {
    let mut reader = ScriptedReader::new([
        Step::Stall(io::ErrorKind::Interrupted),
        Step::Data(b"ok".to_vec()),
    ]);
    let mut buffer = Buffer::new(8);
    assert_eq!(buffer.read_from_once(&mut reader).unwrap(), 2);

    let mut blocked = ScriptedReader::new([Step::Stall(io::ErrorKind::WouldBlock)]);
    let err = buffer.read_from_once(&mut blocked).unwrap_err();
    assert_eq!(err.io_kind(), io::ErrorKind::WouldBlock);
}

#[test]
fn read_full_requires_every_byte() {
    let mut buffer = Buffer::new(8);
    assert_eq!(
        buffer
            .read_full(&mut Cursor::new(b"exact".to_vec()), 5)
            .unwrap(),
        5
    );

    let mut buffer = Buffer::new(8);
    let err = buffer
        .read_full(&mut Cursor::new(b"abc".to_vec()), 5)
        .unwrap_err();
    assert_eq!(err.io_kind(), io::ErrorKind::UnexpectedEof);
    assert_eq!(buffer.unread(), b"abc");

    assert!(matches!(
        buffer.read_full(&mut io::empty(), 6),
        Err(BufferError::ShortBuffer)
    ));
}

// ---------------------------------------------------------------------------
// Writing to sinks
// ---------------------------------------------------------------------------

#[test]
fn write_to_drains_everything() {
    let mut buffer = Buffer::from_vec(patterned(10_000));
    let mut out = Vec::new();
    assert_eq!(buffer.write_to(&mut out).unwrap(), 10_000);
    assert!(buffer.is_empty());
    assert_eq!(out, patterned(10_000));
}

#[test]
fn write_to_on_empty_buffer_is_end_of_stream() {
    let mut buffer = Buffer::new(4);
    assert!(matches!(
        buffer.write_to(&mut Vec::new()),
        Err(BufferError::EndOfStream)
    ));
}

#[test]
fn write_to_gives_up_on_the_101st_zero_write() {
    let mut writer = StallingWriter::new();
    let mut buffer = Buffer::from_vec(b"stuck".to_vec());

    let err = buffer.write_to(&mut writer).unwrap_err();

    assert!(matches!(err, BufferError::NoProgress));
    assert_eq!(writer.calls(), MAX_ZERO_PROGRESS_RETRIES + 1);
    assert_eq!(buffer.len(), 5, "nothing was consumed");
}

#[test]
fn write_to_once_moves_one_chunk() {
    let mut buffer = Buffer::from_vec(b"chunk".to_vec());
    let mut out = [0u8; 3];
    let mut sink = &mut out[..];
    assert_eq!(buffer.write_to_once(&mut sink).unwrap(), 3);
    assert_eq!(buffer.unread(), b"nk");
}

// ---------------------------------------------------------------------------
// std::io adapters
// ---------------------------------------------------------------------------

#[test]
fn io_read_consumes_unread_bytes() {
    let mut buffer = Buffer::from_vec(b"stream".to_vec());
    let mut out = String::new();
    buffer.read_to_string(&mut out).unwrap();
    assert_eq!(out, "stream");
}

#[test]
fn io_write_fills_then_fails() {
    let mut buffer = Buffer::new(4);
    assert_eq!(buffer.write(b"").unwrap(), 0);
    assert_eq!(buffer.write(b"abcdef").unwrap(), 4);

    let err = buffer.write(b"g").unwrap_err();
    assert!(matches!(BufferError::from(err), BufferError::ShortBuffer));
}

// ---------------------------------------------------------------------------
// Reference counting and pools
// ---------------------------------------------------------------------------

#[test]
fn storage_waits_for_the_last_reference() {
    let pool = pool(32);
    let first = SharedBuffer::new(pool.get());
    let second = first.inc_ref();
    let third = second.inc_ref();
    assert_eq!(first.ref_count(), 3);

    first.dec_ref();
    second.dec_ref();
    assert_eq!(pool.available(), 0);
    assert_eq!(third.lock().capacity(), 32, "still referenced");

    third.dec_ref();
    assert_eq!(pool.available(), 1);
}

#[test]
fn double_free_is_harmless() {
    let pool = pool(32);
    let mut buffer = pool.get();
    buffer.free();
    buffer.free();
    drop(buffer);
    assert_eq!(pool.available(), 1);
}

#[test]
fn drop_returns_storage_to_pool() {
    let pool = pool(32);
    drop(pool.get());
    assert_eq!(pool.available(), 1);
}

#[test]
fn recycled_storage_comes_back_reset() {
    let pool = pool(32);
    let mut buffer = pool.get();
    buffer.write_str("dirty").unwrap();
    buffer.free();

    let buffer = pool.get();
    assert!(buffer.is_empty());
    assert_eq!(buffer.free_len(), 32);
}

#[test]
fn debug_output_names_cursors() {
    let rendered = format!("{:?}", Buffer::from_vec(b"ab".to_vec()));
    assert!(rendered.contains("write: 2"), "{rendered}");
}
