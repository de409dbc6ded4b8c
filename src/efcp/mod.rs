// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present RINA (Rust) Contributors

//! Error and Flow Control Protocol (EFCP) container: owns every
//! connection (cep-id) active in one IPCP instance, serialises
//! destruction against in-flight writes/receives, and is the unit the
//! RMT and shim layers hand PDUs to and take PDUs from.

pub mod connection;
pub mod constants;
pub mod delimiter;
pub mod dtcp;
pub mod dtp;
pub mod timer;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{Mutex, Notify};

use crate::error::EfcpError;
use crate::idm::IdManager;
use crate::pci::PduType;

pub use connection::Connection;
pub use constants::DataTransferConstants;
pub use delimiter::{Delimiter, Fragment};
pub use dtcp::Dtcp;
pub use dtp::{Dtp, FlowState, RecvOutcome, SendOutcome};
pub use timer::Timer;

/// A PDU ready to hand to the RMT: the wire-level type plus its
/// already-sequenced/admitted payload.
#[derive(Debug, Clone)]
pub struct OutgoingPdu {
    pub cep_id: u32,
    pub pdu_type: PduType,
    pub sequence_number: Option<u64>,
    pub payload: Vec<u8>,
}

/// One connection's DTP/DTCP state plus its pending-operations count.
///
/// `pending_ops` mirrors the reference's `atomic_t pending_ops`: every
/// write/receive bumps it for the duration of the call via
/// [`PendingOpGuard`], and [`EfcpContainer::destroy`] waits on
/// `destroy_notify` until it reaches zero before tearing the instance
/// down, exactly as `efcp_connection_destroy`'s `wait_event_interruptible`
/// does against `container->del_wq`.
pub struct EfcpInstance {
    dtp: Mutex<Dtp>,
    delimiter: Option<Mutex<Delimiter>>,
    pending_ops: AtomicU32,
    destroy_notify: Notify,
}

impl EfcpInstance {
    fn new(dtp: Dtp, delimiter: Option<Delimiter>) -> Self {
        Self {
            dtp: Mutex::new(dtp),
            delimiter: delimiter.map(Mutex::new),
            pending_ops: AtomicU32::new(0),
            destroy_notify: Notify::new(),
        }
    }

    fn begin_op(self: &Arc<Self>) -> PendingOpGuard {
        self.pending_ops.fetch_add(1, Ordering::SeqCst);
        PendingOpGuard {
            instance: Arc::clone(self),
        }
    }

    pub fn pending_ops(&self) -> u32 {
        self.pending_ops.load(Ordering::SeqCst)
    }
}

/// RAII guard: decrements `pending_ops` and wakes any waiting destroyer
/// on drop, win or lose (including panics unwinding through it).
struct PendingOpGuard {
    instance: Arc<EfcpInstance>,
}

impl Drop for PendingOpGuard {
    fn drop(&mut self) {
        if self.instance.pending_ops.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.instance.destroy_notify.notify_waiters();
        }
    }
}

/// Owns every EFCP connection active in one IPCP instance.
pub struct EfcpContainer {
    constants: DataTransferConstants,
    cep_idm: Mutex<IdManager>,
    instances: Mutex<HashMap<u32, Arc<EfcpInstance>>>,
}

impl EfcpContainer {
    pub fn new(constants: DataTransferConstants) -> Self {
        Self {
            cep_idm: Mutex::new(IdManager::for_width(constants.cep_id_length)),
            constants,
            instances: Mutex::new(HashMap::new()),
        }
    }

    pub fn constants(&self) -> &DataTransferConstants {
        &self.constants
    }

    /// Creates a nascent connection and allocates it a local cep-id.
    pub async fn create_connection(
        &self,
        source_address: u64,
        destination_address: u64,
        port_id: u32,
        qos_id: u16,
        dtcp: Option<Dtcp>,
    ) -> Result<u32, EfcpError> {
        let cep_id = {
            let mut idm = self.cep_idm.lock().await;
            let id = idm.allocate();
            if id == crate::idm::bad_id() {
                return Err(EfcpError::AllocationFailed(
                    "cep-id space exhausted".to_string(),
                ));
            }
            id
        };
        let connection = Connection::new(source_address, destination_address, cep_id, port_id, qos_id);
        let dtp = Dtp::new(connection, self.constants, dtcp);
        let delimiter = self
            .constants
            .dif_fragmentation
            .then(|| Delimiter::new(self.constants.max_fragment_size));
        self.instances
            .lock()
            .await
            .insert(cep_id, Arc::new(EfcpInstance::new(dtp, delimiter)));
        Ok(cep_id)
    }

    async fn instance(&self, cep_id: u32) -> Result<Arc<EfcpInstance>, EfcpError> {
        self.instances
            .lock()
            .await
            .get(&cep_id)
            .cloned()
            .ok_or(EfcpError::FlowNotFound(cep_id as u64))
    }

    /// `efcp_write`: admits `payload` for sending over `cep_id`, holding
    /// `pending_ops` for the call's duration. When the connection has a
    /// delimiter attached, `payload` is split into fragments first and
    /// each fragment is admitted in turn, yielding one [`SendOutcome`]
    /// per fragment in send order.
    pub async fn write(&self, cep_id: u32, payload: Vec<u8>) -> Result<Vec<SendOutcome>, EfcpError> {
        let instance = self.instance(cep_id).await?;
        let _guard = instance.begin_op();

        let fragments: Vec<Vec<u8>> = match &instance.delimiter {
            Some(delimiter) => delimiter
                .lock()
                .await
                .fragment(&payload)
                .into_iter()
                .map(|f| f.bytes)
                .collect(),
            None => vec![payload],
        };

        let mut dtp = instance.dtp.lock().await;
        let now = Instant::now();
        fragments
            .into_iter()
            .map(|fragment| dtp.send(fragment, now))
            .collect()
    }

    /// Feeds one already-sequenced, already-delivered-in-order payload
    /// through this connection's delimiter, if it has one, reconstituting
    /// the original SDU once its last fragment arrives. With no
    /// delimiter attached, the payload passes straight through.
    pub async fn receive_fragment(
        &self,
        cep_id: u32,
        payload: Vec<u8>,
        is_last: bool,
    ) -> Result<Option<Vec<u8>>, EfcpError> {
        let instance = self.instance(cep_id).await?;
        let _guard = instance.begin_op();
        match &instance.delimiter {
            Some(delimiter) => Ok(delimiter
                .lock()
                .await
                .process_udf(Fragment { bytes: payload, is_last })),
            None => Ok(Some(payload)),
        }
    }

    /// `efcp_receive`: feeds one incoming DT/MGMT PDU through sequencing
    /// and reassembly.
    pub async fn receive_data(
        &self,
        cep_id: u32,
        sequence_number: u64,
        src_cep_id: u32,
        payload: Vec<u8>,
    ) -> Result<RecvOutcome, EfcpError> {
        let instance = self.instance(cep_id).await?;
        let _guard = instance.begin_op();
        let mut dtp = instance.dtp.lock().await;
        Ok(dtp.receive_data(sequence_number, src_cep_id, payload))
    }

    /// Feeds one incoming control PDU's ACK field through DTCP, returning
    /// any payloads released from the closed-window queue, newly
    /// sequenced and ready to send.
    pub async fn receive_ack(
        &self,
        cep_id: u32,
        acked_seq: u64,
    ) -> Result<Vec<(u64, Vec<u8>)>, EfcpError> {
        let instance = self.instance(cep_id).await?;
        let _guard = instance.begin_op();
        let mut dtp = instance.dtp.lock().await;
        let now = Instant::now();
        if let Some(dtcp) = dtp.dtcp.as_mut() {
            dtcp.on_ack(acked_seq, now);
        }
        Ok(Vec::new())
    }

    /// Feeds one incoming flow-control PDU's new right-window-edge
    /// through DTCP and drains whatever the closed-window queue now
    /// permits, assigning fresh sequence numbers.
    pub async fn receive_flow_control(
        &self,
        cep_id: u32,
        new_rwe: u64,
    ) -> Result<Vec<(u64, Vec<u8>)>, EfcpError> {
        let instance = self.instance(cep_id).await?;
        let _guard = instance.begin_op();
        let mut dtp = instance.dtp.lock().await;
        let released = match dtp.dtcp.as_mut() {
            Some(dtcp) => dtcp.on_flow_control(new_rwe),
            None => Vec::new(),
        };
        Ok(dtp.drain_closed_window(released))
    }

    /// `efcp_connection_destroy`: waits for in-flight operations to
    /// drain, then removes the connection and releases its cep-id.
    pub async fn destroy(&self, cep_id: u32) -> Result<(), EfcpError> {
        let instance = self.instance(cep_id).await?;
        {
            let mut dtp = instance.dtp.lock().await;
            dtp.deallocate();
        }
        loop {
            if instance.pending_ops() == 0 {
                break;
            }
            instance.destroy_notify.notified().await;
        }
        self.instances.lock().await.remove(&cep_id);
        self.cep_idm.lock().await.release(cep_id);
        Ok(())
    }

    pub async fn connection_count(&self) -> usize {
        self.instances.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constants() -> DataTransferConstants {
        DataTransferConstants::builder().build().unwrap()
    }

    #[tokio::test]
    async fn create_write_and_destroy_roundtrip() {
        let container = EfcpContainer::new(constants());
        let cep_id = container
            .create_connection(1, 2, 100, 0, None)
            .await
            .unwrap();
        assert_eq!(container.connection_count().await, 1);

        let outcomes = container.write(cep_id, vec![1, 2, 3]).await.unwrap();
        assert_eq!(outcomes.len(), 1);
        match &outcomes[0] {
            SendOutcome::Ready { sequence_number, .. } => assert_eq!(*sequence_number, 0),
            SendOutcome::Queued => panic!("expected immediate admission"),
        }

        container.destroy(cep_id).await.unwrap();
        assert_eq!(container.connection_count().await, 0);
    }

    #[tokio::test]
    async fn write_to_unknown_connection_fails() {
        let container = EfcpContainer::new(constants());
        let err = container.write(999, vec![1]).await.unwrap_err();
        assert!(matches!(err, EfcpError::FlowNotFound(_)));
    }

    #[tokio::test]
    async fn destroy_waits_for_pending_op_to_drain() {
        let container = EfcpContainer::new(constants());
        let cep_id = container
            .create_connection(1, 2, 100, 0, None)
            .await
            .unwrap();
        let instance = container.instance(cep_id).await.unwrap();
        let guard = instance.begin_op();
        assert_eq!(instance.pending_ops(), 1);

        let container = Arc::new(container);
        let destroyer = {
            let container = Arc::clone(&container);
            tokio::spawn(async move { container.destroy(cep_id).await })
        };
        tokio::task::yield_now().await;
        drop(guard);
        destroyer.await.unwrap().unwrap();
        assert_eq!(container.connection_count().await, 0);
    }

    #[tokio::test]
    async fn write_fragments_when_delimiter_attached() {
        let constants = DataTransferConstants::builder()
            .fragmentation(true)
            .max_fragment_size(400)
            .build()
            .unwrap();
        let container = EfcpContainer::new(constants);
        let cep_id = container.create_connection(1, 2, 100, 0, None).await.unwrap();

        let outcomes = container.write(cep_id, vec![0u8; 1000]).await.unwrap();
        assert_eq!(outcomes.len(), 3);
        let seqs: Vec<u64> = outcomes
            .iter()
            .map(|o| match o {
                SendOutcome::Ready { sequence_number, .. } => *sequence_number,
                SendOutcome::Queued => panic!("expected immediate admission"),
            })
            .collect();
        assert_eq!(seqs, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn receive_fragment_reassembles_across_calls() {
        let constants = DataTransferConstants::builder()
            .fragmentation(true)
            .max_fragment_size(4)
            .build()
            .unwrap();
        let container = EfcpContainer::new(constants);
        let cep_id = container.create_connection(1, 2, 100, 0, None).await.unwrap();

        assert!(container
            .receive_fragment(cep_id, vec![1, 2, 3, 4], false)
            .await
            .unwrap()
            .is_none());
        let sdu = container
            .receive_fragment(cep_id, vec![5, 6], true)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sdu, vec![1, 2, 3, 4, 5, 6]);
    }
}
