// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present RINA (Rust) Contributors

//! Data-Transfer Constants: the per-DIF profile of field widths and
//! policy flags that the PCI codec and DTP/DTCP state vectors are
//! parameterised by. Fixed at DIF configuration time and immutable
//! thereafter.

use crate::error::EfcpError;

/// Widths (in bytes) and policy flags of a DIF's data-transfer profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataTransferConstants {
    pub address_length: u8,
    pub qos_id_length: u8,
    pub cep_id_length: u8,
    pub port_id_length: u8,
    pub length_length: u8,
    pub seq_num_length: u8,
    pub ctrl_seq_num_length: u8,
    pub rate_length: u8,
    pub frame_length: u8,
    pub max_pdu_size: usize,
    pub max_sdu_size: usize,
    /// Maximum PDU lifetime, in milliseconds.
    pub max_pdu_life_ms: u64,
    pub dif_integrity: bool,
    pub dif_fragmentation: bool,
    pub dif_concatenation: bool,
    /// Largest fragment the delimiter will emit when `dif_fragmentation`
    /// is set; unused otherwise.
    pub max_fragment_size: usize,
    /// A-timer: delayed-ack / in-order-batching window, in milliseconds.
    /// Zero disables batching — acknowledgement follows every in-order
    /// PDU immediately.
    pub a_timer_ms: u64,
    /// tr-timer: per-PDU retransmission interval, in milliseconds. An
    /// unacknowledged entry at the head of the retransmission queue is
    /// retried once this elapses, independent of any NACK from the peer.
    pub tr_timer_ms: u64,
    /// Idle gap, in milliseconds, after which a sender with nothing
    /// queued emits a RENDEZVOUS PDU; zero disables rendezvous.
    pub rendezvous_ms: u64,
}

impl DataTransferConstants {
    /// A reasonable profile for tests and loopback scenarios: 4-byte
    /// addresses and sequence numbers, 2-byte cep/qos/port ids, matching
    /// the widths the base crate's `Pdu` already used (`u32` cep-ids,
    /// `u64` addresses truncated to what the wire actually needs).
    pub fn builder() -> DataTransferConstantsBuilder {
        DataTransferConstantsBuilder::default()
    }
}

/// Validated construction: every field width must be one of 1, 2, 4, 8.
pub struct DataTransferConstantsBuilder {
    address_length: u8,
    qos_id_length: u8,
    cep_id_length: u8,
    port_id_length: u8,
    length_length: u8,
    seq_num_length: u8,
    ctrl_seq_num_length: u8,
    rate_length: u8,
    frame_length: u8,
    max_pdu_size: usize,
    max_sdu_size: usize,
    max_pdu_life_ms: u64,
    dif_integrity: bool,
    dif_fragmentation: bool,
    dif_concatenation: bool,
    max_fragment_size: usize,
    a_timer_ms: u64,
    tr_timer_ms: u64,
    rendezvous_ms: u64,
}

impl Default for DataTransferConstantsBuilder {
    fn default() -> Self {
        Self {
            address_length: 4,
            qos_id_length: 2,
            cep_id_length: 2,
            port_id_length: 2,
            length_length: 2,
            seq_num_length: 4,
            ctrl_seq_num_length: 4,
            rate_length: 2,
            frame_length: 2,
            max_pdu_size: 1500,
            max_sdu_size: 1460,
            max_pdu_life_ms: 60_000,
            dif_integrity: false,
            dif_fragmentation: false,
            dif_concatenation: false,
            max_fragment_size: 1460,
            a_timer_ms: 0,
            tr_timer_ms: 0,
            rendezvous_ms: 0,
        }
    }
}

macro_rules! width_setter {
    ($name:ident, $field:ident) => {
        pub fn $name(mut self, width: u8) -> Self {
            self.$field = width;
            self
        }
    };
}

impl DataTransferConstantsBuilder {
    width_setter!(address_length, address_length);
    width_setter!(qos_id_length, qos_id_length);
    width_setter!(cep_id_length, cep_id_length);
    width_setter!(port_id_length, port_id_length);
    width_setter!(length_length, length_length);
    width_setter!(seq_num_length, seq_num_length);
    width_setter!(ctrl_seq_num_length, ctrl_seq_num_length);
    width_setter!(rate_length, rate_length);
    width_setter!(frame_length, frame_length);

    pub fn max_pdu_size(mut self, v: usize) -> Self {
        self.max_pdu_size = v;
        self
    }

    pub fn max_sdu_size(mut self, v: usize) -> Self {
        self.max_sdu_size = v;
        self
    }

    pub fn max_pdu_life_ms(mut self, v: u64) -> Self {
        self.max_pdu_life_ms = v;
        self
    }

    pub fn fragmentation(mut self, v: bool) -> Self {
        self.dif_fragmentation = v;
        self
    }

    pub fn max_fragment_size(mut self, v: usize) -> Self {
        self.max_fragment_size = v;
        self
    }

    pub fn a_timer_ms(mut self, v: u64) -> Self {
        self.a_timer_ms = v;
        self
    }

    pub fn tr_timer_ms(mut self, v: u64) -> Self {
        self.tr_timer_ms = v;
        self
    }

    pub fn rendezvous_ms(mut self, v: u64) -> Self {
        self.rendezvous_ms = v;
        self
    }

    pub fn build(self) -> Result<DataTransferConstants, EfcpError> {
        for width in [
            self.address_length,
            self.qos_id_length,
            self.cep_id_length,
            self.port_id_length,
            self.length_length,
            self.seq_num_length,
            self.ctrl_seq_num_length,
            self.rate_length,
            self.frame_length,
        ] {
            if ![1u8, 2, 4, 8].contains(&width) {
                return Err(EfcpError::InvalidConfig(format!(
                    "field width must be 1, 2, 4 or 8 bytes, got {width}"
                )));
            }
        }
        Ok(DataTransferConstants {
            address_length: self.address_length,
            qos_id_length: self.qos_id_length,
            cep_id_length: self.cep_id_length,
            port_id_length: self.port_id_length,
            length_length: self.length_length,
            seq_num_length: self.seq_num_length,
            ctrl_seq_num_length: self.ctrl_seq_num_length,
            rate_length: self.rate_length,
            frame_length: self.frame_length,
            max_pdu_size: self.max_pdu_size,
            max_sdu_size: self.max_sdu_size,
            max_pdu_life_ms: self.max_pdu_life_ms,
            dif_integrity: self.dif_integrity,
            dif_fragmentation: self.dif_fragmentation,
            dif_concatenation: self.dif_concatenation,
            max_fragment_size: self.max_fragment_size,
            a_timer_ms: self.a_timer_ms,
            tr_timer_ms: self.tr_timer_ms,
            rendezvous_ms: self.rendezvous_ms,
        })
    }
}
