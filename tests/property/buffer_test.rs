// tests/property/buffer_test.rs

//! Property-based tests for the transmission buffer strategy

use crate::test_helpers::TestContext;
use peerhub::core::buffer::{BufferLayout, StorageKind, TxBuffer};
use peerhub::core::RegistryOptions;
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 200,
        ..ProptestConfig::default()
    })]

    #[test]
    fn test_storage_selection_follows_inline_limit(
        margin in 0usize..64,
        extra in 1usize..512,
        len in 1usize..2048
    ) {
        let layout = BufferLayout::new(margin + extra, margin).unwrap();
        let expected = if len <= extra { StorageKind::Inline } else { StorageKind::Heap };
        prop_assert_eq!(layout.select(len), expected);

        let mut tx = TxBuffer::new(layout);
        let payload = vec![0xC3u8; len];
        prop_assert_eq!(tx.load(&payload).unwrap(), expected);
    }

    #[test]
    fn test_flushed_bytes_match_payload(
        margin in 4usize..32,
        payloads in prop::collection::vec(prop::collection::vec(any::<u8>(), 1..300), 1..20)
    ) {
        let layout = BufferLayout::new(margin + 128, margin).unwrap();
        let ctx = TestContext::with_options(RegistryOptions { max_clients: 0, layout });
        let (client, conn) = ctx.connect();

        for payload in &payloads {
            let storage = ctx.registry.enqueue(client.id(), payload).unwrap();
            prop_assert_eq!(storage, layout.select(payload.len()));
            prop_assert!(ctx.registry.on_writable(client.id()).unwrap());
        }

        let frames = conn.frames();
        prop_assert_eq!(frames.len(), payloads.len());
        for (frame, payload) in frames.iter().zip(&payloads) {
            prop_assert_eq!(frame.header_margin, margin);
            prop_assert_eq!(&frame.payload, payload);
        }
    }

    #[test]
    fn test_pending_payload_is_an_exact_copy(data in prop::collection::vec(any::<u8>(), 1..9000)) {
        let mut tx = TxBuffer::new(BufferLayout::default());
        tx.load(&data).unwrap();
        prop_assert_eq!(tx.pending_payload(), Some(&data[..]));

        let mut frame = tx.begin_flush().unwrap();
        let view = frame.as_tx_frame();
        prop_assert_eq!(view.payload(), &data[..]);
        drop(view);
        tx.finish_flush(frame);
        prop_assert!(!tx.is_pending());
    }
}
