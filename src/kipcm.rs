// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present RINA (Rust) Contributors

//! Kernel IPC Manager (KIPCM): the single front door for every control
//! operation on IPCP instances — create, destroy, flow-allocation
//! request/response — serialized by dispatch through one mailbox rather
//! than an explicit mutex, since an actor's own message loop already
//! gives mutual exclusion.

use std::collections::HashMap;

use crate::error::KipcmError;

/// Capability set an IPCP implementation must provide to be registered
/// with KIPCM. Shim and normal IPCPs alike implement this.
pub trait IpcpInstanceOps: Send + Sync {
    fn ipcp_id(&self) -> u16;
    fn name(&self) -> &str;
}

/// Builds `IpcpInstanceOps` instances for one IPCP type ("shim-udp",
/// "normal", ...), analogous to the reference's per-type factory ops.
pub trait IpcpFactory: Send + Sync {
    fn create(&self, ipcp_id: u16, name: &str) -> Box<dyn IpcpInstanceOps>;
    fn instance_count(&self) -> usize;
}

/// Control-plane requests KIPCM dispatches, mirroring the reference's
/// `kipcm_kipcm_sock_*` and `rnl`-carried message set at the scope this
/// crate covers.
#[derive(Debug)]
pub enum ControlMessage {
    CreateIpcp { ipcp_id: u16, factory: String, name: String },
    DestroyIpcp { ipcp_id: u16 },
    AllocateFlowRequest { event_id: u64, source_ipcp: u16, dest_name: String },
    AllocateFlowResponse { event_id: u64, port_id: Option<u32> },
    DeallocateFlow { ipcp_id: u16, port_id: u32 },
}

/// Outcome of dispatching one [`ControlMessage`].
#[derive(Debug, PartialEq, Eq)]
pub enum ControlOutcome {
    IpcpCreated(u16),
    IpcpDestroyed(u16),
    FlowAllocationPending(u64),
    FlowAllocated { event_id: u64, port_id: u32 },
    FlowAllocationRefused(u64),
    FlowDeallocated,
}

struct PendingAllocation {
    #[allow(dead_code)]
    source_ipcp: u16,
    #[allow(dead_code)]
    dest_name: String,
}

/// Registry of IPCP factories and live instances, plus in-flight
/// flow-allocation requests correlated by event-id.
pub struct Kipcm {
    factories: HashMap<String, Box<dyn IpcpFactory>>,
    instances: HashMap<u16, Box<dyn IpcpInstanceOps>>,
    pending_allocations: HashMap<u64, PendingAllocation>,
}

impl Default for Kipcm {
    fn default() -> Self {
        Self::new()
    }
}

impl Kipcm {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
            instances: HashMap::new(),
            pending_allocations: HashMap::new(),
        }
    }

    pub fn register_factory(&mut self, name: impl Into<String>, factory: Box<dyn IpcpFactory>) {
        self.factories.insert(name.into(), factory);
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// `kipcm_ipcp_create`/`kipcm_dispatch`: the single entry point every
    /// control-plane request goes through.
    pub fn dispatch(&mut self, msg: ControlMessage) -> Result<ControlOutcome, KipcmError> {
        match msg {
            ControlMessage::CreateIpcp { ipcp_id, factory, name } => {
                if self.instances.contains_key(&ipcp_id) {
                    return Err(KipcmError::DuplicateIpcpId(ipcp_id));
                }
                let factory = self
                    .factories
                    .get(&factory)
                    .ok_or(KipcmError::UnknownFactory(factory))?;
                let instance = factory.create(ipcp_id, &name);
                self.instances.insert(ipcp_id, instance);
                Ok(ControlOutcome::IpcpCreated(ipcp_id))
            }
            ControlMessage::DestroyIpcp { ipcp_id } => {
                self.instances
                    .remove(&ipcp_id)
                    .ok_or(KipcmError::UnknownIpcp(ipcp_id))?;
                Ok(ControlOutcome::IpcpDestroyed(ipcp_id))
            }
            ControlMessage::AllocateFlowRequest { event_id, source_ipcp, dest_name } => {
                if !self.instances.contains_key(&source_ipcp) {
                    return Err(KipcmError::UnknownIpcp(source_ipcp));
                }
                self.pending_allocations.insert(
                    event_id,
                    PendingAllocation { source_ipcp, dest_name },
                );
                Ok(ControlOutcome::FlowAllocationPending(event_id))
            }
            ControlMessage::AllocateFlowResponse { event_id, port_id } => {
                self.pending_allocations
                    .remove(&event_id)
                    .ok_or(KipcmError::UnknownEventId(event_id))?;
                match port_id {
                    Some(port_id) => Ok(ControlOutcome::FlowAllocated { event_id, port_id }),
                    None => Ok(ControlOutcome::FlowAllocationRefused(event_id)),
                }
            }
            ControlMessage::DeallocateFlow { ipcp_id, .. } => {
                if !self.instances.contains_key(&ipcp_id) {
                    return Err(KipcmError::UnknownIpcp(ipcp_id));
                }
                Ok(ControlOutcome::FlowDeallocated)
            }
        }
    }
}
