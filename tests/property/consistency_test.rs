// tests/property/consistency_test.rs

//! Property-based tests for registry consistency
//! Tests that capacity, id uniqueness and the single-pending-message rule hold
//! for arbitrary operation sequences.

use crate::test_helpers::{MockConnection, TestContext};
use peerhub::core::{ClientId, PeerHubError};
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Clone)]
enum Op {
    Register,
    Unregister(usize),
    Enqueue(usize, Vec<u8>),
    Writable(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Register),
        (0usize..16).prop_map(Op::Unregister),
        (0usize..16, prop::collection::vec(any::<u8>(), 1..64)).prop_map(|(i, p)| Op::Enqueue(i, p)),
        (0usize..16).prop_map(Op::Writable),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 100,
        max_shrink_iters: 500,
        ..ProptestConfig::default()
    })]

    #[test]
    fn test_registry_model_consistency(
        max_clients in 0usize..6,
        ops in prop::collection::vec(op_strategy(), 1..80)
    ) {
        let ctx = TestContext::with_max_clients(max_clients);
        // Model: live clients with their pending payload, if any.
        let mut live: Vec<(ClientId, Arc<MockConnection>, Option<Vec<u8>>)> = Vec::new();
        let mut delivered: Vec<(ClientId, Vec<u8>)> = Vec::new();

        for op in ops {
            match op {
                Op::Register => {
                    let conn = MockConnection::new();
                    match ctx.registry.register(conn.clone()) {
                        Ok(client) => {
                            prop_assert!(max_clients == 0 || live.len() < max_clients);
                            live.push((client.id().clone(), conn, None));
                        }
                        Err(PeerHubError::CapacityExceeded { max }) => {
                            prop_assert_eq!(max, max_clients);
                            prop_assert_eq!(live.len(), max_clients);
                        }
                        Err(e) => prop_assert!(false, "unexpected error: {}", e),
                    }
                }
                Op::Unregister(i) if !live.is_empty() => {
                    let (id, _, _) = live.remove(i % live.len());
                    prop_assert!(ctx.registry.unregister(&id));
                    prop_assert!(!ctx.registry.unregister(&id));
                }
                Op::Enqueue(i, payload) if !live.is_empty() => {
                    let idx = i % live.len();
                    let (id, _, pending) = &mut live[idx];
                    let result = ctx.registry.enqueue(id, &payload);
                    if pending.is_some() {
                        prop_assert_eq!(result, Err(PeerHubError::Busy));
                    } else {
                        prop_assert!(result.is_ok());
                        *pending = Some(payload);
                    }
                }
                Op::Writable(i) if !live.is_empty() => {
                    let idx = i % live.len();
                    let (id, conn, pending) = &mut live[idx];
                    let written = ctx.registry.on_writable(id).unwrap();
                    prop_assert_eq!(written, pending.is_some());
                    if let Some(payload) = pending.take() {
                        prop_assert_eq!(conn.payloads().last().cloned(), Some(payload.clone()));
                        delivered.push((id.clone(), payload));
                    }
                }
                _ => {}
            }

            prop_assert_eq!(ctx.registry.count(), live.len());
            if max_clients > 0 {
                prop_assert!(ctx.registry.count() <= max_clients);
            }
            for (id, _, pending) in &live {
                prop_assert_eq!(ctx.registry.is_pending(id), Some(pending.is_some()));
            }
        }

        // Every delivered message was delivered exactly once, in order, per client.
        for (id, conn, _) in &live {
            let expected: Vec<Vec<u8>> = delivered
                .iter()
                .filter(|(d, _)| d == id)
                .map(|(_, p)| p.clone())
                .collect();
            prop_assert_eq!(conn.payloads(), expected);
        }
    }

    #[test]
    fn test_broadcast_except_count(clients in 1usize..20, excluded in 0usize..20) {
        let ctx = TestContext::new();
        let ids: Vec<ClientId> = (0..clients).map(|_| ctx.connect().0.id().clone()).collect();

        if excluded < clients {
            let scheduled = ctx.registry.broadcast_except(&ids[excluded], b"x").unwrap();
            prop_assert_eq!(scheduled, clients - 1);
            prop_assert_eq!(ctx.registry.is_pending(&ids[excluded]), Some(false));
        } else {
            let scheduled = ctx.registry.broadcast_except(&ClientId::from("absent"), b"x").unwrap();
            prop_assert_eq!(scheduled, clients);
        }
    }
}

#[test]
fn test_concurrent_registration_respects_capacity() {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .build()
        .unwrap();
    rt.block_on(async {
        let ctx = TestContext::with_max_clients(25);
        let mut tasks = Vec::new();
        for _ in 0..100 {
            let registry = ctx.registry.clone();
            tasks.push(tokio::spawn(async move {
                registry.register(MockConnection::new())
            }));
        }

        let mut accepted = 0;
        let mut rejected = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => accepted += 1,
                Err(PeerHubError::CapacityExceeded { max: 25 }) => rejected += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(accepted, 25);
        assert_eq!(rejected, 75);
        assert_eq!(ctx.registry.count(), 25);
    });
}

#[test]
fn test_concurrent_ids_are_unique() {
    let handles: Vec<_> = (0..8)
        .map(|_| std::thread::spawn(|| (0..1000).map(|_| ClientId::generate()).collect::<Vec<_>>()))
        .collect();

    let mut seen = HashSet::new();
    for handle in handles {
        for id in handle.join().unwrap() {
            assert!(seen.insert(id), "duplicate client id generated");
        }
    }
    assert_eq!(seen.len(), 8000);
}

#[test]
fn test_concurrent_senders_never_double_load() {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .build()
        .unwrap();
    rt.block_on(async {
        let ctx = TestContext::new();
        let (client, conn) = ctx.connect();

        let mut tasks = Vec::new();
        for i in 0..50u8 {
            let registry = ctx.registry.clone();
            let id = client.id().clone();
            tasks.push(tokio::spawn(async move { registry.enqueue(&id, &[i + 1]) }));
        }
        let ok = futures::future::join_all(tasks)
            .await
            .into_iter()
            .filter(|r| matches!(r, Ok(Ok(_))))
            .count();

        // No flush happened in between, so exactly one send won.
        assert_eq!(ok, 1);
        assert!(ctx.registry.on_writable(client.id()).unwrap());
        assert_eq!(conn.payloads().len(), 1);
    });
}
