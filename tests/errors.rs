#![cfg(all(feature = "gzip", feature = "bzip2"))]

mod common;

use std::cell::RefCell;

use stream_gzdec::{
    dispatch::assembler::{AllocationError, ChunkAllocator},
    DispatchError, Dispatcher, DispatcherConfig, Format, OutputUnit, SessionState,
};

use common::{bzip2, gzip, payload};

/// Fails every "period"-th allocation, or hands out unwritable chunks
struct TestAllocator {
    calls: usize,
    period: usize,
    unwritable: bool
}

impl ChunkAllocator for TestAllocator {
    fn allocate(&mut self, capacity: usize) -> Result<Vec<u8>, AllocationError> {
        self.calls += 1;

        if self.calls % self.period == 0 {
            if self.unwritable {
                return Ok(Vec::new());
            }
            return Err(AllocationError(capacity));
        }

        Ok(vec![0; capacity])
    }
}

#[test]
fn allocation_failures_lose_no_data() {
    let data = payload(40_000);
    let compressed = gzip(&data);

    let allocator = TestAllocator { calls: 0, period: 3, unwritable: false };
    let config = DispatcherConfig::default().with_chunk_capacity(512);
    let mut dispatcher = Dispatcher::with_config(config).unwrap().with_allocator(allocator);

    let mut out = Vec::new();
    let mut failures = 0;
    for piece in compressed.chunks(1000) {
        loop {
            match dispatcher.update(piece) {
                Ok(decoded) => {
                    out.extend(decoded.unit.to_vec());
                    break;
                },
                Err(DispatchError::AllocationFailure(AllocationError(512))) => {
                    failures += 1;
                    assert_eq!(dispatcher.state(), SessionState::Decoding);
                },
                Err(e) => panic!("unexpected error: {e}")
            }
        }
    }

    assert!(failures > 0);
    assert_eq!(out, data);
}

#[test]
fn unwritable_chunks_are_map_errors() {
    let data = payload(10_000);
    let compressed = bzip2(&data);

    let allocator = TestAllocator { calls: 0, period: 4, unwritable: true };
    let mut dispatcher = Dispatcher::new().with_allocator(allocator);
    dispatcher.set_format("application/x-bzip2").unwrap();

    let mut out = Vec::new();
    let mut failures = 0;
    for piece in compressed.chunks(300) {
        loop {
            match dispatcher.update(piece) {
                Ok(decoded) => {
                    out.extend(decoded.unit.to_vec());
                    break;
                },
                Err(e) => {
                    assert!(matches!(e, DispatchError::Map));
                    assert!(e.is_retryable());
                    failures += 1;
                }
            }
        }
    }

    assert!(failures > 0);
    assert_eq!(out, data);
}

#[test]
fn initialization_failure() {
    let config = DispatcherConfig::default().with_window_bits(20);
    let mut dispatcher = Dispatcher::with_config(config).unwrap();
    dispatcher.set_format("application/x-gzip").unwrap();

    let err = dispatcher.update(&gzip(b"never decoded")).unwrap_err();
    assert!(matches!(err, DispatchError::Init { format: Format::Gzip, .. }));
    assert_eq!(dispatcher.state(), SessionState::Idle);

    // bzip2 has no window setting, so it is unaffected
    dispatcher.set_format("application/x-bzip2").unwrap();
    let decoded = dispatcher.update(&bzip2(b"decoded")).unwrap();
    assert_eq!(decoded.unit.to_vec(), b"decoded");
}

#[test]
fn small_window_rejects_large_zlib_window() {
    let config = DispatcherConfig::default().with_window_bits(9);
    let mut dispatcher = Dispatcher::with_config(config).unwrap();

    let err = dispatcher.update(&common::zlib(&payload(100))).unwrap_err();
    assert!(matches!(err, DispatchError::Backend { format: Format::Gzip, .. }));
    assert_eq!(dispatcher.state(), SessionState::Failed);
}

#[test]
fn format_change_mid_stream() {
    let compressed = gzip(&payload(1000));
    let (head, tail) = compressed.split_at(100);

    let mut dispatcher = Dispatcher::new();
    dispatcher.set_format("application/x-gzip").unwrap();
    dispatcher.update(head).unwrap();

    assert!(matches!(
        dispatcher.set_format("application/x-bzip2"),
        Err(DispatchError::ProtocolViolation(..))
    ));
    assert!(matches!(
        dispatcher.set_format("application/x-unknown"),
        Err(DispatchError::UnsupportedFormat(..))
    ));

    // Repeating the current tag is harmless
    assert_eq!(dispatcher.set_format("application/x-gzip").unwrap(), Format::Gzip);

    let decoded = dispatcher.update(tail).unwrap();
    assert!(decoded.is_end_of_stream());
    assert_eq!(dispatcher.session().active_format(), None);
}

#[test]
fn data_without_format() {
    let config = DispatcherConfig::default().with_default_format(None);
    let mut dispatcher = Dispatcher::with_config(config).unwrap();

    assert!(matches!(dispatcher.update(&gzip(b"x")), Err(DispatchError::NotNegotiated)));
    assert_eq!(dispatcher.state(), SessionState::Idle);
}

#[test]
fn callback_receives_every_unit() {
    let data = payload(20_000);
    let compressed = gzip(&data);
    let received: RefCell<Vec<OutputUnit>> = RefCell::new(Vec::new());

    {
        let mut dispatcher = Dispatcher::new();
        dispatcher.set_callback(|unit| {
            assert!(!unit.is_empty());
            received.borrow_mut().push(unit.clone());
            Ok(())
        });

        for piece in compressed.chunks(50) {
            dispatcher.update(piece).unwrap();
        }
    }

    let received = received.into_inner();
    let out: Vec<u8> = received.iter().flat_map(OutputUnit::to_vec).collect();
    assert_eq!(out, data);

    for pair in received.windows(2) {
        assert_eq!(pair[0].end_offset(), pair[1].offset);
    }
}

#[test]
fn callback_errors_surface() {
    let compressed = gzip(b"rejected downstream");

    let mut dispatcher = Dispatcher::new();
    dispatcher.set_callback(|_| anyhow::bail!("sink is full"));

    let err = dispatcher.update(&compressed).unwrap_err();
    assert!(matches!(err, DispatchError::Downstream(..)));
    assert!(err.to_string().contains("sink is full"));

    // The stream itself completed before the handoff
    assert_eq!(dispatcher.session().streams_completed(), 1);
}
