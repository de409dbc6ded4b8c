// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present RINA (Rust) Contributors

//! DTP (Data Transfer Protocol): sequencing, fragment reassembly and the
//! send/receive admission path for one connection. DTCP, when present,
//! gates admission and owns the closed-window queue; DTP owns ordering.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use crate::du::Du;
use crate::efcp::connection::Connection;
use crate::efcp::constants::DataTransferConstants;
use crate::efcp::dtcp::Dtcp;
use crate::efcp::timer::Timer;
use crate::error::EfcpError;
use crate::pci::{self, PciOffsetTable, PciValues, PduType};

/// `{Allocated, Deallocated}` — a DTP instance only ever moves forward,
/// mirroring the reference's flow state enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Allocated,
    Deallocated,
}

/// Result of [`Dtp::send`].
#[derive(Debug)]
pub enum SendOutcome {
    /// Admitted: `wire_bytes` is the fully-formatted DT PDU (PCI header
    /// plus `payload`), ready to hand to the RMT; `payload` is the bare
    /// SDU bytes, still useful to callers that only care about local
    /// delivery (e.g. loopback).
    Ready {
        sequence_number: u64,
        payload: Vec<u8>,
        wire_bytes: Vec<u8>,
    },
    /// Window/rate closed: payload was queued, nothing to send yet.
    Queued,
}

/// Result of [`Dtp::receive_data`].
#[derive(Debug)]
pub enum RecvOutcome {
    /// One or more payloads are now deliverable in order (the triggering
    /// PDU plus anything the reassembly queue released behind it).
    Deliver(Vec<Vec<u8>>),
    /// Out-of-order PDU buffered, nothing new deliverable yet.
    Buffered,
    /// Sequence number already delivered or below the left window edge.
    Duplicate,
}

/// Per-connection DTP state vector.
#[derive(Debug)]
pub struct Dtp {
    pub connection: Connection,
    pub constants: DataTransferConstants,
    pub state: FlowState,
    pub dtcp: Option<Dtcp>,
    /// Next sequence number this side will assign to an outgoing DT PDU.
    next_send_seq: u64,
    /// Highest sequence number delivered in order so far (left window
    /// edge on the receive side); the next expected is this + 1.
    left_window_edge: u64,
    /// Out-of-order DT PDUs buffered pending reassembly, keyed by
    /// sequence number.
    reassembly: BTreeMap<u64, Vec<u8>>,
    /// First DT PDU has not yet been received on this connection.
    recv_initialised: bool,
    /// A-timer: batches acknowledgement/delivery of in-order arrivals
    /// over `constants.a_timer_ms` instead of reacting to every PDU.
    /// Rearmed on every in-order receipt; fires once arrivals stop for
    /// the full window, signalling the owner that an ACK (or FC) is now
    /// due for `left_window_edge`. A no-op when `a_timer_ms == 0`, in
    /// which case callers should acknowledge synchronously instead.
    a_timer: Timer,
    a_timer_sink: Option<mpsc::Sender<()>>,
    /// Per-type PCI field layout for `constants`, computed once and
    /// reused for every outgoing DT PDU on this connection.
    pci_table: PciOffsetTable,
}

impl Dtp {
    pub fn new(connection: Connection, constants: DataTransferConstants, dtcp: Option<Dtcp>) -> Self {
        let pci_table = PciOffsetTable::new(&constants);
        Self {
            connection,
            constants,
            state: FlowState::Allocated,
            dtcp,
            next_send_seq: 0,
            left_window_edge: 0,
            reassembly: BTreeMap::new(),
            recv_initialised: false,
            a_timer: Timer::new(),
            a_timer_sink: None,
            pci_table,
        }
    }

    /// Registers where A-timer expiry notifications are delivered. Until
    /// this is called `receive_data` still tracks in-order arrivals but
    /// never actually arms a sleep.
    pub fn set_a_timer_sink(&mut self, sink: mpsc::Sender<()>) {
        self.a_timer_sink = Some(sink);
    }

    /// Whether A-timer batching is configured for this connection.
    pub fn a_timer_enabled(&self) -> bool {
        self.constants.a_timer_ms > 0
    }

    pub fn is_allocated(&self) -> bool {
        self.state == FlowState::Allocated
    }

    pub fn deallocate(&mut self) {
        self.state = FlowState::Deallocated;
    }

    /// Admits `payload` for sending. Fragmentation above `max_sdu_size`
    /// is the delimiter module's concern and is rejected here.
    pub fn send(&mut self, payload: Vec<u8>, now: Instant) -> Result<SendOutcome, EfcpError> {
        if self.state != FlowState::Allocated {
            return Err(EfcpError::ConnectionDeallocated(self.connection.source_cep_id));
        }
        if payload.len() > self.constants.max_sdu_size {
            return Err(EfcpError::SendFailed(format!(
                "payload of {} bytes exceeds max SDU size {}",
                payload.len(),
                self.constants.max_sdu_size
            )));
        }

        let seq = self.next_send_seq;
        let admitted = match self.dtcp.as_mut() {
            Some(dtcp) => dtcp.window_open(seq, now),
            None => true,
        };

        if !admitted {
            if let Some(dtcp) = self.dtcp.as_mut() {
                dtcp.closed_window_queue
                    .push(payload)
                    .map_err(|_| EfcpError::SendFailed("closed window queue full".to_string()))?;
            }
            return Ok(SendOutcome::Queued);
        }

        self.next_send_seq += 1;
        if let Some(dtcp) = self.dtcp.as_mut() {
            dtcp.register_sent(seq, payload.clone(), now);
        }

        let wire_bytes = self.wrap_outgoing_dt(&payload, seq)?;
        Ok(SendOutcome::Ready {
            sequence_number: seq,
            payload,
            wire_bytes,
        })
    }

    /// Allocates a DU with EFCP PCI room ahead of `payload`, formats a DT
    /// PCI header addressed to the connection's peer with `sequence_number`,
    /// and returns the resulting on-the-wire bytes.
    fn wrap_outgoing_dt(&self, payload: &[u8], sequence_number: u64) -> Result<Vec<u8>, EfcpError> {
        let pci_len = self.pci_table.calculate_size(PduType::Dt);
        let mut du = wrap_outgoing(payload, pci_len)
            .map_err(|e| EfcpError::SendFailed(format!("DU allocation failed: {e}")))?;

        let values = PciValues {
            dst_addr: self.connection.destination_address,
            src_addr: self.connection.source_address,
            qos_id: self.connection.qos_id as u64,
            dst_cep: self.connection.destination_cep_id.unwrap_or(0) as u64,
            src_cep: self.connection.source_cep_id as u64,
            length: (pci_len + payload.len()) as u64,
            sequence_number: Some(sequence_number),
            ..Default::default()
        };
        {
            let mut pci = du.pci_bytes_mut().expect("PCI room just reserved by wrap_outgoing");
            pci::pci_format(&mut pci, &self.constants, &self.pci_table, PduType::Dt, &values)
                .map_err(|e| EfcpError::SendFailed(format!("PCI format failed: {e}")))?;
        }
        Ok(du.wire_bytes())
    }

    /// Releases payloads the closed-window queue can now send after a
    /// flow-control update widened the window, assigning each a
    /// sequence number.
    pub fn drain_closed_window(&mut self, released: Vec<Vec<u8>>) -> Vec<(u64, Vec<u8>)> {
        released
            .into_iter()
            .map(|payload| {
                let seq = self.next_send_seq;
                self.next_send_seq += 1;
                (seq, payload)
            })
            .collect()
    }

    /// Handles an incoming DT/MGMT PDU: sequencing, duplicate detection
    /// and in-order reassembly. Binds the peer's cep-id on first receipt
    /// if the connection is still nascent.
    pub fn receive_data(
        &mut self,
        sequence_number: u64,
        src_cep_id: u32,
        payload: Vec<u8>,
    ) -> RecvOutcome {
        self.connection.bind_destination_cep_id(src_cep_id);

        if !self.recv_initialised {
            // First PDU on this connection defines the initial left
            // window edge one below its sequence number.
            self.left_window_edge = sequence_number.saturating_sub(1);
            self.recv_initialised = true;
        }

        if sequence_number <= self.left_window_edge {
            return RecvOutcome::Duplicate;
        }

        if sequence_number == self.left_window_edge + 1 {
            let mut delivered = vec![payload];
            self.left_window_edge += 1;
            while let Some(next) = self.reassembly.remove(&(self.left_window_edge + 1)) {
                self.left_window_edge += 1;
                delivered.push(next);
            }
            if let Some(sink) = self.a_timer_sink.as_ref() {
                if self.constants.a_timer_ms > 0 {
                    self.a_timer
                        .arm(Duration::from_millis(self.constants.a_timer_ms), sink.clone());
                }
            }
            RecvOutcome::Deliver(delivered)
        } else {
            self.reassembly.insert(sequence_number, payload);
            RecvOutcome::Buffered
        }
    }

    pub fn left_window_edge(&self) -> u64 {
        self.left_window_edge
    }

    pub fn pending_reassembly(&self) -> usize {
        self.reassembly.len()
    }
}

/// Wraps a fully-admitted outgoing DT payload in a zero-copy [`Du`] with
/// PCI headroom reserved, ready for [`crate::pci::pci_format`]. The
/// payload is copied in first, then the head is pushed left to make
/// room for the PCI, so the payload region and its length never move
/// out from under the copy.
pub fn wrap_outgoing(payload: &[u8], pci_len: usize) -> Result<Du, crate::error::DuError> {
    let mut du = Du::from_payload(payload);
    du.encap(pci_len)?;
    Ok(du)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::efcp::dtcp::{RetransmissionQueue, WindowFlowControl};

    fn conn() -> Connection {
        Connection::new(1, 2, 10, 100, 0)
    }

    fn dtc() -> DataTransferConstants {
        DataTransferConstants::builder().build().unwrap()
    }

    #[test]
    fn send_without_dtcp_always_admits_in_order() {
        let mut dtp = Dtp::new(conn(), dtc(), None);
        let now = Instant::now();
        match dtp.send(vec![1, 2, 3], now).unwrap() {
            SendOutcome::Ready { sequence_number, .. } => assert_eq!(sequence_number, 0),
            SendOutcome::Queued => panic!("expected immediate admission"),
        }
        match dtp.send(vec![4], now).unwrap() {
            SendOutcome::Ready { sequence_number, .. } => assert_eq!(sequence_number, 1),
            SendOutcome::Queued => panic!("expected immediate admission"),
        }
    }

    #[test]
    fn send_queues_when_window_closed() {
        let mut dtcp = Dtcp::new(
            Some(WindowFlowControl::new(1)),
            None,
            Some(RetransmissionQueue::new(3)),
            10,
        );
        dtcp.window.as_mut().unwrap().send_right_we = 0;
        let mut dtp = Dtp::new(conn(), dtc(), Some(dtcp));
        let now = Instant::now();
        match dtp.send(vec![9], now).unwrap() {
            SendOutcome::Queued => {}
            SendOutcome::Ready { .. } => panic!("window should be closed"),
        }
    }

    #[test]
    fn receive_reassembles_out_of_order_pdus() {
        let mut dtp = Dtp::new(conn(), dtc(), None);
        assert!(matches!(
            dtp.receive_data(0, 99, vec![0]),
            RecvOutcome::Deliver(_)
        ));
        assert!(matches!(
            dtp.receive_data(2, 99, vec![2]),
            RecvOutcome::Buffered
        ));
        match dtp.receive_data(1, 99, vec![1]) {
            RecvOutcome::Deliver(payloads) => {
                assert_eq!(payloads, vec![vec![1], vec![2]]);
            }
            _ => panic!("expected reassembly to release the buffered PDU"),
        }
        assert_eq!(dtp.left_window_edge(), 2);
        assert_eq!(dtp.pending_reassembly(), 0);
    }

    #[test]
    fn receive_drops_duplicates_below_left_window_edge() {
        let mut dtp = Dtp::new(conn(), dtc(), None);
        dtp.receive_data(0, 99, vec![0]);
        assert!(matches!(dtp.receive_data(0, 99, vec![0]), RecvOutcome::Duplicate));
    }

    #[tokio::test]
    async fn a_timer_fires_once_in_order_arrivals_stop() {
        let constants = DataTransferConstants::builder().a_timer_ms(5).build().unwrap();
        let mut dtp = Dtp::new(conn(), constants, None);
        let (tx, mut rx) = mpsc::channel(1);
        dtp.set_a_timer_sink(tx);
        assert!(dtp.a_timer_enabled());
        dtp.receive_data(0, 99, vec![0]);
        rx.recv().await.expect("a-timer should fire once batching window elapses");
    }

    #[tokio::test]
    async fn a_timer_rearms_on_every_in_order_arrival() {
        let constants = DataTransferConstants::builder().a_timer_ms(20).build().unwrap();
        let mut dtp = Dtp::new(conn(), constants, None);
        let (tx, mut rx) = mpsc::channel(2);
        dtp.set_a_timer_sink(tx);
        dtp.receive_data(0, 99, vec![0]);
        tokio::time::sleep(Duration::from_millis(10)).await;
        dtp.receive_data(1, 99, vec![1]);
        tokio::time::sleep(Duration::from_millis(15)).await;
        assert!(
            rx.try_recv().is_err(),
            "second arrival should have superseded the first arm"
        );
        rx.recv().await.expect("a-timer should fire after the final arrival's window");
    }

    #[test]
    fn a_timer_disabled_by_default_does_not_arm() {
        let mut dtp = Dtp::new(conn(), dtc(), None);
        let (tx, mut rx) = mpsc::channel(1);
        dtp.set_a_timer_sink(tx);
        assert!(!dtp.a_timer_enabled());
        dtp.receive_data(0, 99, vec![0]);
        assert!(rx.try_recv().is_err());
    }
}
