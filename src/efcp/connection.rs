// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present RINA (Rust) Contributors

//! Connection record: the addressing and identity state shared by a
//! connection's DTP and (optional) DTCP state vectors.

/// `{source_address, destination_address, source_cep_id,
/// destination_cep_id, port_id, qos_id}` — identifies one EFCP endpoint.
///
/// Mutated only by the owning [`super::EfcpContainer`] while holding its
/// lock; destroyed together with the owning EFCP instance.
#[derive(Debug, Clone)]
pub struct Connection {
    pub source_address: u64,
    pub destination_address: u64,
    pub source_cep_id: u32,
    /// `None` until the first DT PDU from the peer reveals it (a nascent
    /// connection created locally before the peer has replied).
    pub destination_cep_id: Option<u32>,
    pub port_id: u32,
    pub qos_id: u16,
}

impl Connection {
    pub fn new(
        source_address: u64,
        destination_address: u64,
        source_cep_id: u32,
        port_id: u32,
        qos_id: u16,
    ) -> Self {
        Self {
            source_address,
            destination_address,
            source_cep_id,
            destination_cep_id: None,
            port_id,
            qos_id,
        }
    }

    /// Captures the peer's cep-id the first time it is observed, as the
    /// reference does on the first DT PDU received on a nascent
    /// connection.
    pub fn bind_destination_cep_id(&mut self, cep_id: u32) {
        if self.destination_cep_id.is_none() {
            self.destination_cep_id = Some(cep_id);
        }
    }
}
