// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present RINA (Rust) Contributors

//! Scenarios S5-S6: a blocked reader interrupted out from under it
//! without tearing the flow down, and two concurrent writers draining
//! before a deallocated flow is freed exactly once.

use std::sync::Arc;

use ari::{Kfa, KfaError, KfaFlowState};

#[tokio::test]
async fn interrupting_a_blocked_reader_leaves_the_flow_allocated() {
    let mut kfa = Kfa::new();
    let port_id = kfa.reserve_port_id().unwrap();
    let flow = kfa.create_flow(port_id, 1, 1500);
    assert_eq!(flow.state(), KfaFlowState::Allocated);

    let reader_flow = Arc::clone(&flow);
    let reader = tokio::spawn(async move { reader_flow.read().await });
    tokio::task::yield_now().await;

    // Interrupts the blocked read without deallocating the flow, standing
    // in for a signal delivered to the blocked caller.
    flow.cancel_io();
    let result = reader.await.unwrap();
    assert!(matches!(result, Err(KfaError::Interrupted { bytes_written: 0 })));
    assert_eq!(flow.state(), KfaFlowState::Allocated);
}

#[tokio::test]
async fn deallocate_waits_for_both_writers_then_frees_the_flow_once() {
    let mut kfa = Kfa::new();
    let mut port_id = 0;
    for _ in 0..9 {
        port_id = kfa.reserve_port_id().unwrap();
    }
    assert_eq!(port_id, 9);
    let flow = kfa.create_flow(port_id, 1, 1500);

    // Two writers grab the flow's writer guard up front, standing in for
    // two blocking writes already admitted but not yet posted.
    let guard1 = flow.begin_write();
    let guard2 = flow.begin_write();

    let flow_for_check = Arc::clone(&flow);
    let deallocator = tokio::spawn(async move {
        kfa.deallocate(port_id).await.unwrap();
        kfa
    });
    tokio::task::yield_now().await;
    assert!(
        !flow_for_check.maybe_destroy(),
        "flow must survive while writers hold guards"
    );

    // Both writers now attempt their post, observe the flow already
    // deallocated, and return a shutdown status rather than silently
    // succeeding against a torn-down flow.
    let r1 = flow.post(vec![1]).await;
    let r2 = flow.post(vec![2]).await;
    assert!(matches!(r1, Err(KfaError::Shutdown)));
    assert!(matches!(r2, Err(KfaError::Shutdown)));

    drop(guard1);
    drop(guard2);

    let kfa = deallocator.await.unwrap();
    assert_eq!(kfa.flow_count(), 0);
}
