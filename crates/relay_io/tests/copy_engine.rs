//! End-to-end copies through the public engine API.

use std::io::{self, Cursor, Write};

use relay_io::{
    BoxSource, Buffer, BufferHandshaker, CacheReader, CopyConfig, CopyEngine, Counter, Handshake,
    Plain, SharedBuffer, Sink, pick_chain, unwrap_read_counters, wrap_sink, wrap_source,
};
use test_support::{ByteTally, SharedBuf, patterned, read_file, scratch_file};

fn buffered_engine() -> CopyEngine {
    CopyEngine::new(CopyConfig::default().without_splice())
}

fn live(data: &[u8]) -> BoxSource {
    Box::new(Cursor::new(data.to_vec()))
}

#[test]
fn large_copy_between_files_without_splice() {
    let data = patterned(1_048_575);
    let source = scratch_file(&data).unwrap();
    let mut dest = tempfile::tempfile().unwrap();
    let tally = ByteTally::new();

    let copied = buffered_engine()
        .copy_counted(
            Box::new(dest.try_clone().unwrap()),
            Box::new(source),
            vec![Counter::tally(tally.handle())],
            Vec::new(),
        )
        .unwrap();

    assert_eq!(copied, data.len() as u64);
    assert_eq!(tally.get(), copied);
    assert_eq!(read_file(&mut dest).unwrap(), data);
}

#[test]
fn rewrapping_counters_keeps_a_single_layer() {
    let first = ByteTally::new();
    let second = ByteTally::new();
    let order = SharedBuf::new();

    let log = |tag: u8| {
        let order = order.clone();
        Counter::new(move |_| {
            order.clone().write_all(&[tag]).unwrap();
        })
    };

    let source = wrap_source(
        live(b"abc"),
        vec![Counter::tally(first.handle()), log(b'1')],
    );
    let source = wrap_source(source, vec![Counter::tally(second.handle()), log(b'2')]);

    let (inner, counters) = unwrap_read_counters(source);
    assert_eq!(counters.len(), 4);
    let (_, nothing) = unwrap_read_counters(inner);
    assert!(nothing.is_empty(), "only one counting layer existed");

    let source = wrap_source(
        live(b"abc"),
        vec![Counter::tally(first.handle()), log(b'1')],
    );
    let source = wrap_source(source, vec![Counter::tally(second.handle()), log(b'2')]);
    let copied = buffered_engine()
        .copy(Box::new(Vec::new()), source)
        .unwrap();

    assert_eq!(copied, 3);
    assert_eq!(first.get(), 3);
    assert_eq!(second.get(), 3);
    assert_eq!(order.contents(), b"12", "registration order, one chunk");
}

#[test]
fn cache_chain_replays_in_order() {
    let chunks = [b"AA".as_slice(), b"BB"];
    let source = CacheReader::wrap_chain(
        live(b"CC"),
        chunks.iter().map(|c| Buffer::from_vec(c.to_vec())).collect::<Vec<_>>(),
    );
    let out = SharedBuf::new();

    let copied = buffered_engine()
        .copy(Box::new(Plain::new(out.clone())), source)
        .unwrap();

    assert_eq!(copied, 6);
    assert_eq!(out.contents(), b"AABBCC");
}

#[test]
fn pick_chain_then_wrap_chain_restores_order() {
    let source = CacheReader::wrap_chain(
        live(b"3"),
        vec![Buffer::from_vec(b"1".to_vec()), Buffer::from_vec(b"2".to_vec())],
    );
    let (inner, buffers) = pick_chain(source);
    let contents: Vec<Vec<u8>> = buffers.iter().map(SharedBuffer::to_vec).collect();
    assert_eq!(contents, [b"1".to_vec(), b"2".to_vec()]);

    let out = SharedBuf::new();
    buffered_engine()
        .copy(
            Box::new(Plain::new(out.clone())),
            CacheReader::wrap_chain(inner, buffers),
        )
        .unwrap();
    assert_eq!(out.contents(), b"123");
}

/// Takes a fixed-length preamble before accepting payload writes.
struct Preamble {
    preamble: SharedBuf,
    payload: SharedBuf,
    remaining: usize,
}

impl Write for Preamble {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.payload.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl BufferHandshaker for Preamble {
    fn handshake(&mut self, bytes: &[u8]) -> io::Result<usize> {
        let take = self.remaining.min(bytes.len());
        self.preamble.write_all(&bytes[..take])?;
        self.remaining -= take;
        Ok(take)
    }
}

impl Sink for Preamble {
    fn pending_handshake(&mut self) -> Option<Handshake<'_>> {
        if self.remaining > 0 {
            Some(Handshake::Buffered(self))
        } else {
            None
        }
    }
}

#[test]
fn handshake_bytes_are_counted_once() {
    let preamble = SharedBuf::new();
    let payload = SharedBuf::new();
    let read = ByteTally::new();
    let write = ByteTally::new();
    let data = patterned(50_000);

    let source = CacheReader::wrap(live(&data[16..]), Buffer::from_vec(data[..16].to_vec()));
    let sink = Preamble {
        preamble: preamble.clone(),
        payload: payload.clone(),
        remaining: 5,
    };

    let copied = buffered_engine()
        .copy(
            wrap_sink(Box::new(sink), vec![Counter::tally(write.handle())]),
            wrap_source(source, vec![Counter::tally(read.handle())]),
        )
        .unwrap();

    assert_eq!(copied, data.len() as u64);
    assert_eq!(preamble.contents(), &data[..5]);
    assert_eq!(payload.contents(), &data[5..]);
    assert_eq!(read.get(), copied);
    assert_eq!(write.get(), copied);
}

#[test]
fn errors_render_with_stage_and_progress() {
    let source: BoxSource = Box::new(Plain::new(test_support::ScriptedReader::new([
        test_support::Step::Data(b"ok".to_vec()),
        test_support::Step::Fail(io::ErrorKind::BrokenPipe),
    ])));

    let err = buffered_engine()
        .copy(Box::new(Vec::new()), source)
        .unwrap_err();

    assert_eq!(err.copied(), 2);
    assert!(err.to_string().starts_with("copy failed after 2 bytes: copyPure : "));
    let io_err = io::Error::from(err);
    assert_eq!(io_err.kind(), io::ErrorKind::BrokenPipe);
}
