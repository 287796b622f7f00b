//! Property tests: bytes survive every path unchanged and fully counted.

use std::io::{Cursor, Read, Write};
use std::sync::Arc;

use proptest::prelude::*;
use relay_io::{
    BoxSource, Buffer, BufferConfig, BufWriter, CacheReader, CopyConfig, CopyEngine, Counter,
    wrap_source,
};
use test_support::ByteTally;

fn small_pool_engine() -> CopyEngine {
    let config = CopyConfig {
        buffers: BufferConfig {
            class_sizes: vec![16, 64],
            max_retained: 2,
            standard_size: 16,
            huge_size: 64,
        },
        ..CopyConfig::default().without_splice()
    };
    CopyEngine::new(config)
}

fn split_into_layers(data: &[u8], cuts: &[usize]) -> (Vec<Buffer>, Vec<u8>) {
    let mut layers = Vec::new();
    let mut rest = data;
    for &cut in cuts {
        let cut = cut.min(rest.len());
        let (head, tail) = rest.split_at(cut);
        layers.push(Buffer::from_vec(head.to_vec()));
        rest = tail;
    }
    (layers, rest.to_vec())
}

proptest! {
    #[test]
    fn cache_layers_then_live_copy_preserves_bytes(
        data in proptest::collection::vec(any::<u8>(), 0..4096),
        cuts in proptest::collection::vec(0usize..512, 0..6),
    ) {
        let (layers, live) = split_into_layers(&data, &cuts);
        let live_len = live.len() as u64;
        let tally = ByteTally::new();
        let live: BoxSource = wrap_source(
            Box::new(Cursor::new(live)),
            vec![Counter::tally(tally.handle())],
        );
        let source = CacheReader::wrap_chain(live, layers);

        let out = test_support::SharedBuf::new();
        let copied = small_pool_engine()
            .copy(Box::new(relay_io::Plain::new(out.clone())), source)
            .unwrap();

        prop_assert_eq!(copied, data.len() as u64);
        prop_assert_eq!(out.contents(), data);
        prop_assert_eq!(tally.get(), live_len);
    }

    #[test]
    fn chunked_writes_read_back_intact(
        chunks in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..40), 0..20),
    ) {
        let expected: Vec<u8> = chunks.concat();
        let mut buffer = Buffer::new(expected.len());
        for chunk in &chunks {
            buffer.write_all(chunk).unwrap();
        }
        prop_assert!(buffer.is_full());

        let mut out = Vec::new();
        buffer.read_to_end(&mut out).unwrap();
        prop_assert_eq!(out, expected);
    }

    #[test]
    fn buf_writer_output_matches_input(
        chunks in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..100), 0..30),
        capacity in 1usize..64,
    ) {
        let out = test_support::SharedBuf::new();
        let mut writer = BufWriter::with_buffer(out.clone(), Buffer::new(capacity));
        for chunk in &chunks {
            writer.write_all(chunk).unwrap();
        }
        writer.flush().unwrap();
        prop_assert_eq!(out.contents(), chunks.concat());
    }

    #[test]
    fn pooled_buffers_never_exceed_retention(rounds in 1usize..20) {
        let pool = Arc::new(relay_io::BufferPool::new(32, 3));
        let held: Vec<Buffer> = (0..rounds).map(|_| pool.get()).collect();
        drop(held);
        prop_assert_eq!(pool.available(), rounds.min(3));
    }
}
