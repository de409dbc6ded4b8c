// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present RINA (Rust) Contributors

//! Scenario S1: a single write/read round trip over one flow with no
//! DTCP and no fragmentation, exercising the EFCP admission path and the
//! Kernel Flow Allocator's data plane together the way `main.rs`'s own
//! demo wires them.

use ari::device::{DataDeviceHandle, PollReadable};
use ari::{DataTransferConstants, EfcpContainer, Kfa, SendOutcome};

#[tokio::test]
async fn write_then_read_round_trips_a_loopback_sdu() {
    let constants = DataTransferConstants::builder()
        .max_pdu_size(1500)
        .max_sdu_size(1460)
        .build()
        .unwrap();

    let efcp = EfcpContainer::new(constants);
    let mut kfa = Kfa::new();

    let mut port_id = 0;
    for _ in 0..7 {
        port_id = kfa.reserve_port_id().unwrap();
    }
    assert_eq!(port_id, 7);

    let flow = kfa.create_flow(port_id, 0, constants.max_sdu_size);
    let device = DataDeviceHandle::new(flow);

    let cep_id = efcp.create_connection(1, 2, port_id, 0, None).await.unwrap();

    let payload = vec![0xABu8; 100];
    let outcomes = efcp.write(cep_id, payload.clone()).await.unwrap();
    assert_eq!(outcomes.len(), 1);
    match &outcomes[0] {
        SendOutcome::Ready {
            sequence_number,
            payload: admitted,
            ..
        } => {
            assert_eq!(*sequence_number, 0);
            device.write(admitted.clone()).await.unwrap();
        }
        SendOutcome::Queued => panic!("no DTCP is configured, admission must be immediate"),
    }

    assert_eq!(device.poll_readable(), PollReadable::Ready);
    let received = device.read().await.unwrap();
    assert_eq!(received.len(), 100);
    assert_eq!(received, payload);
    assert_eq!(device.poll_readable(), PollReadable::Pending);

    efcp.destroy(cep_id).await.unwrap();
    kfa.deallocate(port_id).await.unwrap();
}
