// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present RINA (Rust) Contributors

//! The fixed enum of PCI field positions, reproduced from the reference
//! `enum pci_field_index` in the same order so that the offset-table walk
//! below lines up field-for-field with the reference layout.

/// A PDU type, as carried in the base header's `type` byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum PduType {
    /// Data transfer PDU.
    Dt = 1,
    /// Management PDU (carries mgmt SDUs, uses the DT/MGMT sequence space).
    Mgmt = 2,
    /// Flow-control PDU.
    Fc = 3,
    /// Acknowledgement PDU.
    Ack = 4,
    /// Combined acknowledgement + flow-control PDU.
    AckAndFc = 5,
    /// Cumulative ack PDU.
    Cack = 6,
    /// Rendezvous PDU.
    Rendezvous = 7,
}

impl PduType {
    pub fn from_wire(byte: u8) -> Option<Self> {
        Some(match byte {
            1 => Self::Dt,
            2 => Self::Mgmt,
            3 => Self::Fc,
            4 => Self::Ack,
            5 => Self::AckAndFc,
            6 => Self::Cack,
            7 => Self::Rendezvous,
            _ => return None,
        })
    }

    pub fn to_wire(self) -> u8 {
        self as u8
    }

    /// Whether this type uses the DT/MGMT sequence-number space rather
    /// than the control sequence-number space.
    pub fn is_data_type(self) -> bool {
        matches!(self, Self::Dt | Self::Mgmt)
    }
}

/// Field positions within a PDU, in the order the reference's
/// `enum pci_field_index` walks them. Not every field is defined for
/// every [`PduType`]; [`super::PciOffsetTable`] records only the ones
/// that apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PciFieldIndex {
    // Base header, common to all PDU types.
    Version,
    DstAddr,
    SrcAddr,
    QosId,
    DstCep,
    SrcCep,
    Type,
    Flags,
    Length,
    // DT/MGMT only.
    SequenceNumber,
    // All control types.
    ControlSequenceNumber,
    // FC / ACK_AND_FC / CACK / RENDEZVOUS.
    NewRwe,
    MyLwe,
    MyRwe,
    SndrRate,
    TimeFrame,
    // ACK_AND_FC / CACK / RENDEZVOUS.
    LastCtrlCsn,
    NewLwe,
    // ACK / ACK_AND_FC.
    AckedSn,
}
