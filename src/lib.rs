// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present RINA (Rust) Contributors

//! A kernel-resident RINA data-transfer core: EFCP/DTP/DTCP connection
//! state, the PCI wire codec, zero-copy DU buffers, the identifier
//! managers (CIDM/PIDM), the Kernel Flow Allocator and Kernel IPC
//! Manager, reworked from the reference IPCP's full control-plane stack
//! down to the data-transfer path it actually moves SDUs over.

// Public module declarations
pub mod actors;
pub mod config;
pub mod device;
pub mod du;
pub mod efcp;
pub mod error;
pub mod idm;
pub mod ipcp;
pub mod kfa;
pub mod kipcm;
pub mod pci;
pub mod pdu;
pub mod rmt;
pub mod shim;

// Re-export commonly used types
pub use actors::{
    EfcpActor, EfcpHandle, EfcpMessage, KfaActor, KfaHandle, KfaMessage, KipcmActor, KipcmHandle,
    RmtActor, RmtHandle, RmtMessage, ShimActor, ShimHandle, ShimMessage,
};
pub use du::Du;
pub use efcp::{
    Connection, DataTransferConstants, Dtcp, Dtp, EfcpContainer, FlowState as DtpFlowState,
    RecvOutcome, SendOutcome,
};
pub use error::{
    AriError, DuError, EfcpError, IdmError, KfaError, KipcmError, PciError, RmtError,
    SerializationError, ShimError,
};
pub use idm::IdManager;
pub use ipcp::{IpcProcess, IpcpState};
pub use kfa::{Flow, FlowState as KfaFlowState, Kfa};
pub use kipcm::{ControlMessage, ControlOutcome, Kipcm};
pub use pci::{PciFieldIndex, PciOffsetTable, PduType};
pub use rmt::{ForwardingEntry, Rmt};
pub use shim::{AddressMapper, AddressMapping, UdpShim};

/// Membership and data-transfer profile of a Distributed IPC Facility.
///
/// A DIF is a scope of communication, managed by a set of cooperating
/// IPC Processes, that all honour one [`DataTransferConstants`] profile
/// and share one address space. The RIB/enrollment/routing machinery
/// that would populate and reconcile this membership is out of this
/// crate's scope; `Dif` here records the shape of that agreement, not
/// the protocol that reaches it.
#[derive(Debug, Clone)]
pub struct Dif {
    /// Name of this DIF
    pub name: String,
    /// Per-DIF PCI field widths and policy flags
    pub data_transfer: DataTransferConstants,
    /// Addresses of IPCPs known to be members of this DIF
    pub member_addresses: Vec<u64>,
}

impl Dif {
    /// Creates a new DIF with the given name and data-transfer profile.
    pub fn new_with_name(name: String, data_transfer: DataTransferConstants) -> Self {
        Self {
            name,
            data_transfer,
            member_addresses: Vec::new(),
        }
    }

    /// Creates a new DIF with a default name and the default profile.
    pub fn new() -> Self {
        Self::new_with_name(
            "default-dif".to_string(),
            DataTransferConstants::builder()
                .build()
                .expect("default profile is valid"),
        )
    }

    /// Adds an IPCP to this DIF
    pub fn add_member(&mut self, address: u64) {
        if !self.member_addresses.contains(&address) {
            self.member_addresses.push(address);
        }
    }

    /// Removes an IPCP from this DIF
    pub fn remove_member(&mut self, address: u64) {
        self.member_addresses.retain(|&addr| addr != address);
    }

    /// Returns the number of member IPCPs
    pub fn member_count(&self) -> usize {
        self.member_addresses.len()
    }
}

impl Default for Dif {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dif_tracks_membership() {
        let mut dif = Dif::new();
        dif.add_member(100);
        dif.add_member(200);
        dif.add_member(100);
        assert_eq!(dif.member_count(), 2);
        dif.remove_member(100);
        assert_eq!(dif.member_count(), 1);
    }
}
