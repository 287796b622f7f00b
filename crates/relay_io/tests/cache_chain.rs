//! Replay caches stacked over live sources.

use std::io::{self, Cursor, Read};
use std::sync::Arc;

use relay_io::{
    BoxSource, Buffer, BufferPool, CacheReader, Plain, SharedBuffer, pick_chain, pick_one,
};
use test_support::{ScriptedReader, SharedBuf, Step};

fn live(bytes: &[u8]) -> BoxSource {
    Box::new(Cursor::new(bytes.to_vec()))
}

fn filled(pool: &Arc<BufferPool>, bytes: &[u8]) -> Buffer {
    let mut buffer = pool.get();
    buffer.write_str(std::str::from_utf8(bytes).unwrap()).unwrap();
    buffer
}

#[test]
fn pooled_caches_return_storage_once_drained() {
    let pool = Arc::new(BufferPool::new(64, 8));
    let mut source = CacheReader::wrap_chain(
        live(b"live"),
        vec![filled(&pool, b"one "), filled(&pool, b"two ")],
    );
    assert_eq!(pool.available(), 0);

    let mut out = String::new();
    source.read_to_string(&mut out).unwrap();

    assert_eq!(out, "one two live");
    assert_eq!(pool.available(), 2);
}

#[test]
fn small_reads_walk_layers_in_order() {
    let mut source = CacheReader::wrap_chain(
        live(b"CC"),
        vec![Buffer::from_vec(b"AA".to_vec()), Buffer::from_vec(b"BB".to_vec())],
    );
    let mut out = Vec::new();
    let mut byte = [0u8; 1];
    while source.read(&mut byte).unwrap() == 1 {
        out.push(byte[0]);
    }
    assert_eq!(out, b"AABBCC");
}

#[test]
fn partially_read_layer_is_picked_with_the_rest() {
    let mut source = CacheReader::wrap(live(b"tail"), Buffer::from_vec(b"abcdef".to_vec()));
    let mut head = [0u8; 2];
    source.read_exact(&mut head).unwrap();

    let (_, buffer) = pick_one(source);
    assert_eq!(buffer.unwrap().to_vec(), b"cdef");
}

#[test]
fn drained_layers_are_skipped_by_pick_chain() {
    let mut source = CacheReader::wrap_chain(
        live(b"z"),
        vec![Buffer::from_vec(b"x".to_vec()), Buffer::from_vec(b"y".to_vec())],
    );
    let mut first = [0u8; 1];
    source.read_exact(&mut first).unwrap();

    let (mut rest, buffers) = pick_chain(source);
    let contents: Vec<Vec<u8>> = buffers.iter().map(SharedBuffer::to_vec).collect();
    assert_eq!(contents, [b"y".to_vec()]);

    let mut tail = Vec::new();
    rest.read_to_end(&mut tail).unwrap();
    assert_eq!(tail, b"z");
}

#[test]
fn live_failure_after_cached_bytes_is_deferred() {
    let failing: BoxSource = Box::new(Plain::new(ScriptedReader::new([Step::Fail(
        io::ErrorKind::ConnectionAborted,
    )])));
    let mut source = CacheReader::wrap(failing, Buffer::from_vec(b"cached".to_vec()));

    let mut buf = [0u8; 16];
    assert_eq!(source.read(&mut buf).unwrap(), 6);
    assert_eq!(&buf[..6], b"cached");
    assert_eq!(
        source.read(&mut buf).unwrap_err().kind(),
        io::ErrorKind::ConnectionAborted
    );
}

#[test]
fn buffer_shared_by_two_layers_is_freed_once_both_let_go() {
    let pool = Arc::new(BufferPool::new(64, 8));
    let shared = SharedBuffer::new(filled(&pool, b"head"));
    let owner = shared.inc_ref();

    let inner = CacheReader::wrap(live(b" body"), shared.inc_ref());
    let source = CacheReader::wrap(inner, shared);
    assert_eq!(owner.ref_count(), 3);

    let out = SharedBuf::new();
    let copied = relay_io::CopyEngine::default()
        .copy(Box::new(Plain::new(out.clone())), source)
        .unwrap();

    assert_eq!(copied, 9);
    assert_eq!(out.contents(), b"head body");
    assert_eq!(owner.ref_count(), 1);
    assert_eq!(pool.available(), 0, "outside owner still registered");

    owner.dec_ref();
    assert_eq!(pool.available(), 1);
}
