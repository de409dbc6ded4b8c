// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present RINA (Rust) Contributors

//! Actor-based components using Tokio
//!
//! Each data-transfer collaborator (EFCP, KFA, KIPCM, RMT, the UDP
//! shim) is also reachable as an actor behind a mailbox, so callers
//! that want to drive it from another task don't need to share a lock
//! directly — the actor's own message loop already gives mutual
//! exclusion.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::efcp::{DataTransferConstants, Dtcp, EfcpContainer, RecvOutcome, SendOutcome};
use crate::error::{EfcpError, KfaError, KipcmError};
use crate::kfa::{Flow, Kfa};
use crate::kipcm::{ControlMessage, ControlOutcome, Kipcm};
use crate::pdu::Pdu;
use crate::rmt::{ForwardingEntry, Rmt};
use crate::shim::UdpShim;

/// Messages for the EFCP actor
#[derive(Debug)]
pub enum EfcpMessage {
    CreateConnection {
        source_address: u64,
        destination_address: u64,
        port_id: u32,
        qos_id: u16,
        response: mpsc::Sender<Result<u32, EfcpError>>,
    },
    Write {
        cep_id: u32,
        payload: Vec<u8>,
        response: mpsc::Sender<Result<Vec<SendOutcome>, EfcpError>>,
    },
    ReceiveData {
        cep_id: u32,
        sequence_number: u64,
        src_cep_id: u32,
        payload: Vec<u8>,
        response: mpsc::Sender<Result<RecvOutcome, EfcpError>>,
    },
    Destroy {
        cep_id: u32,
        response: mpsc::Sender<Result<(), EfcpError>>,
    },
    ConnectionCount {
        response: mpsc::Sender<usize>,
    },
}

/// EFCP Actor - serializes access to one IPCP instance's [`EfcpContainer`]
pub struct EfcpActor {
    container: Arc<EfcpContainer>,
    receiver: mpsc::Receiver<EfcpMessage>,
}

impl EfcpActor {
    pub fn new(constants: DataTransferConstants, receiver: mpsc::Receiver<EfcpMessage>) -> Self {
        Self {
            container: Arc::new(EfcpContainer::new(constants)),
            receiver,
        }
    }

    pub async fn run(mut self) {
        while let Some(msg) = self.receiver.recv().await {
            match msg {
                EfcpMessage::CreateConnection {
                    source_address,
                    destination_address,
                    port_id,
                    qos_id,
                    response,
                } => {
                    let result = self
                        .container
                        .create_connection(source_address, destination_address, port_id, qos_id, None::<Dtcp>)
                        .await;
                    let _ = response.send(result).await;
                }
                EfcpMessage::Write { cep_id, payload, response } => {
                    let result = self.container.write(cep_id, payload).await;
                    let _ = response.send(result).await;
                }
                EfcpMessage::ReceiveData { cep_id, sequence_number, src_cep_id, payload, response } => {
                    let result = self
                        .container
                        .receive_data(cep_id, sequence_number, src_cep_id, payload)
                        .await;
                    let _ = response.send(result).await;
                }
                EfcpMessage::Destroy { cep_id, response } => {
                    let result = self.container.destroy(cep_id).await;
                    let _ = response.send(result).await;
                }
                EfcpMessage::ConnectionCount { response } => {
                    let count = self.container.connection_count().await;
                    let _ = response.send(count).await;
                }
            }
        }
    }
}

/// Messages for the KFA actor
#[derive(Debug)]
pub enum KfaMessage {
    ReservePortId {
        response: mpsc::Sender<Result<u32, KfaError>>,
    },
    CreateFlow {
        port_id: u32,
        ipcp_id: u16,
        max_sdu_size: usize,
        response: mpsc::Sender<Arc<Flow>>,
    },
    Deallocate {
        port_id: u32,
        response: mpsc::Sender<Result<(), KfaError>>,
    },
    FlowCount {
        response: mpsc::Sender<usize>,
    },
}

/// KFA Actor - serializes port-id and flow bookkeeping for one IPCP
pub struct KfaActor {
    kfa: Kfa,
    receiver: mpsc::Receiver<KfaMessage>,
}

impl KfaActor {
    pub fn new(receiver: mpsc::Receiver<KfaMessage>) -> Self {
        Self {
            kfa: Kfa::new(),
            receiver,
        }
    }

    pub async fn run(mut self) {
        while let Some(msg) = self.receiver.recv().await {
            match msg {
                KfaMessage::ReservePortId { response } => {
                    let result = self.kfa.reserve_port_id();
                    let _ = response.send(result).await;
                }
                KfaMessage::CreateFlow { port_id, ipcp_id, max_sdu_size, response } => {
                    let flow = self.kfa.create_flow(port_id, ipcp_id, max_sdu_size);
                    let _ = response.send(flow).await;
                }
                KfaMessage::Deallocate { port_id, response } => {
                    let result = self.kfa.deallocate(port_id).await;
                    let _ = response.send(result).await;
                }
                KfaMessage::FlowCount { response } => {
                    let _ = response.send(self.kfa.flow_count()).await;
                }
            }
        }
    }
}

/// Messages for the KIPCM actor
#[derive(Debug)]
pub enum KipcmMessage {
    Dispatch {
        msg: ControlMessage,
        response: mpsc::Sender<Result<ControlOutcome, KipcmError>>,
    },
    InstanceCount {
        response: mpsc::Sender<usize>,
    },
}

/// KIPCM Actor - the single serialized front door for IPCP lifecycle and
/// flow-allocation control messages
pub struct KipcmActor {
    kipcm: Kipcm,
    receiver: mpsc::Receiver<KipcmMessage>,
}

impl KipcmActor {
    pub fn new(kipcm: Kipcm, receiver: mpsc::Receiver<KipcmMessage>) -> Self {
        Self { kipcm, receiver }
    }

    pub async fn run(mut self) {
        while let Some(msg) = self.receiver.recv().await {
            match msg {
                KipcmMessage::Dispatch { msg, response } => {
                    let result = self.kipcm.dispatch(msg);
                    let _ = response.send(result).await;
                }
                KipcmMessage::InstanceCount { response } => {
                    let _ = response.send(self.kipcm.instance_count()).await;
                }
            }
        }
    }
}

/// Messages for RMT actor
#[derive(Debug)]
pub enum RmtMessage {
    AddForwardingEntry {
        entry: ForwardingEntry,
        response: mpsc::Sender<()>,
    },
    ProcessOutgoing {
        pdu: Pdu,
        response: mpsc::Sender<Result<u64, String>>,
    },
    ProcessIncoming {
        pdu: Pdu,
        response: mpsc::Sender<Result<Option<u64>, String>>,
    },
    DequeueForNextHop {
        next_hop: u64,
        response: mpsc::Sender<Option<Pdu>>,
    },
    GetForwardingTableSize {
        response: mpsc::Sender<usize>,
    },
}

/// RMT Actor - handles relaying and multiplexing
pub struct RmtActor {
    rmt: Rmt,
    receiver: mpsc::Receiver<RmtMessage>,
}

impl RmtActor {
    pub fn new(local_addr: u64, receiver: mpsc::Receiver<RmtMessage>) -> Self {
        Self {
            rmt: Rmt::new(local_addr),
            receiver,
        }
    }

    pub async fn run(mut self) {
        while let Some(msg) = self.receiver.recv().await {
            match msg {
                RmtMessage::AddForwardingEntry { entry, response } => {
                    self.rmt.add_forwarding_entry(entry);
                    let _ = response.send(()).await;
                }
                RmtMessage::ProcessOutgoing { pdu, response } => {
                    let result = self.rmt.process_outgoing(pdu);
                    let _ = response.send(result).await;
                }
                RmtMessage::ProcessIncoming { pdu, response } => {
                    let result = self.rmt.process_incoming(pdu);
                    let _ = response.send(result).await;
                }
                RmtMessage::DequeueForNextHop { next_hop, response } => {
                    let pdu = self.rmt.dequeue_for_next_hop(next_hop);
                    let _ = response.send(pdu).await;
                }
                RmtMessage::GetForwardingTableSize { response } => {
                    let _ = response.send(self.rmt.forwarding_table_size()).await;
                }
            }
        }
    }
}

/// Messages for Shim actor
#[derive(Debug)]
pub enum ShimMessage {
    Bind {
        addr: String,
        response: mpsc::Sender<Result<(), String>>,
    },
    Send {
        data: Vec<u8>,
        dest: String,
        response: mpsc::Sender<Result<usize, String>>,
    },
    GetLocalAddr {
        response: mpsc::Sender<Result<String, String>>,
    },
}

/// Shim Actor - handles UDP/IP networking
pub struct ShimActor {
    shim: UdpShim,
    receiver: mpsc::Receiver<ShimMessage>,
}

impl ShimActor {
    pub fn new(local_rina_addr: u64, receiver: mpsc::Receiver<ShimMessage>) -> Self {
        Self {
            shim: UdpShim::new(local_rina_addr),
            receiver,
        }
    }

    pub async fn run(mut self) {
        while let Some(msg) = self.receiver.recv().await {
            match msg {
                ShimMessage::Bind { addr, response } => {
                    let result = self.shim.bind(&addr).map_err(|e| e.to_string());
                    let _ = response.send(result).await;
                }
                ShimMessage::Send { data, dest, response } => {
                    let result = self.shim.send_to(&data, &dest).map_err(|e| e.to_string());
                    let _ = response.send(result).await;
                }
                ShimMessage::GetLocalAddr { response } => {
                    let result = self
                        .shim
                        .local_addr()
                        .map(|a| a.to_string())
                        .map_err(|e| e.to_string());
                    let _ = response.send(result).await;
                }
            }
        }
    }
}

/// Actor handle for sending messages to an actor
pub struct ActorHandle<T> {
    sender: mpsc::Sender<T>,
}

impl<T> Clone for ActorHandle<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<T> ActorHandle<T> {
    pub fn new(sender: mpsc::Sender<T>) -> Self {
        Self { sender }
    }

    pub async fn send(&self, msg: T) -> Result<(), String> {
        self.sender
            .send(msg)
            .await
            .map_err(|_| "Failed to send message".to_string())
    }
}

pub type EfcpHandle = ActorHandle<EfcpMessage>;
pub type KfaHandle = ActorHandle<KfaMessage>;
pub type KipcmHandle = ActorHandle<KipcmMessage>;
pub type RmtHandle = ActorHandle<RmtMessage>;
pub type ShimHandle = ActorHandle<ShimMessage>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_efcp_actor_create_connection_and_write() {
        let (tx, rx) = mpsc::channel(32);
        let constants = DataTransferConstants::builder().build().unwrap();
        let actor = EfcpActor::new(constants, rx);

        tokio::spawn(async move {
            actor.run().await;
        });

        let handle = EfcpHandle::new(tx);

        let (resp_tx, mut resp_rx) = mpsc::channel(1);
        handle
            .send(EfcpMessage::CreateConnection {
                source_address: 1,
                destination_address: 2,
                port_id: 100,
                qos_id: 0,
                response: resp_tx,
            })
            .await
            .unwrap();
        let cep_id = resp_rx.recv().await.unwrap().unwrap();

        let (resp_tx, mut resp_rx) = mpsc::channel(1);
        handle
            .send(EfcpMessage::Write {
                cep_id,
                payload: vec![1, 2, 3],
                response: resp_tx,
            })
            .await
            .unwrap();
        let outcomes = resp_rx.recv().await.unwrap().unwrap();
        match &outcomes[0] {
            SendOutcome::Ready { sequence_number, .. } => assert_eq!(*sequence_number, 0),
            SendOutcome::Queued => panic!("expected immediate admission"),
        }
    }

    #[tokio::test]
    async fn test_kfa_actor_reserve_and_create_flow() {
        let (tx, rx) = mpsc::channel(32);
        let actor = KfaActor::new(rx);
        tokio::spawn(async move {
            actor.run().await;
        });
        let handle = KfaHandle::new(tx);

        let (resp_tx, mut resp_rx) = mpsc::channel(1);
        handle
            .send(KfaMessage::ReservePortId { response: resp_tx })
            .await
            .unwrap();
        let port_id = resp_rx.recv().await.unwrap().unwrap();

        let (resp_tx, mut resp_rx) = mpsc::channel(1);
        handle
            .send(KfaMessage::CreateFlow {
                port_id,
                ipcp_id: 1,
                max_sdu_size: 1500,
                response: resp_tx,
            })
            .await
            .unwrap();
        let flow = resp_rx.recv().await.unwrap();
        assert_eq!(flow.port_id, port_id);
    }

    #[tokio::test]
    async fn test_kipcm_actor_instance_count_starts_at_zero() {
        let (tx, rx) = mpsc::channel(32);
        let actor = KipcmActor::new(Kipcm::new(), rx);
        tokio::spawn(async move {
            actor.run().await;
        });
        let handle = KipcmHandle::new(tx);

        let (resp_tx, mut resp_rx) = mpsc::channel(1);
        handle
            .send(KipcmMessage::InstanceCount { response: resp_tx })
            .await
            .unwrap();
        assert_eq!(resp_rx.recv().await.unwrap(), 0);
    }
}
