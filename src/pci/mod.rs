// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present RINA (Rust) Contributors

//! Table-driven PCI (Protocol Control Information) codec.
//!
//! At DIF-configuration time, [`PciOffsetTable::new`] walks
//! [`fields::PciFieldIndex`] in order, accumulating field offsets from the
//! widths in [`DataTransferConstants`], and records one layout per
//! [`PduType`]. Every getter/setter then loads or stores at
//! `offset_table[pdu_type][field]`, switching on the PDU type first for
//! fields that are not defined on every type.

pub mod fields;

pub use fields::{PciFieldIndex, PduType};

use crate::efcp::constants::DataTransferConstants;
use crate::error::PciError;
use std::collections::HashMap;

/// Per-PDU-type field layout: offsets of each defined field plus the
/// total header size for that type.
#[derive(Debug, Clone, Default)]
struct Layout {
    offsets: HashMap<PciFieldIndex, usize>,
    size: usize,
}

/// The full set of per-type layouts for one [`DataTransferConstants`]
/// profile. Computed once at DIF-configuration time and then reused for
/// every PDU of that DIF.
#[derive(Debug, Clone)]
pub struct PciOffsetTable {
    base_offset: usize,
    layouts: HashMap<PduType, Layout>,
}

impl PciOffsetTable {
    /// Builds the offset table for `dtc`.
    pub fn new(dtc: &DataTransferConstants) -> Self {
        use PciFieldIndex::*;

        let addr = dtc.address_length as usize;
        let qos = dtc.qos_id_length as usize;
        let cep = dtc.cep_id_length as usize;
        let len = dtc.length_length as usize;
        let seq = dtc.seq_num_length as usize;
        let ctrl = dtc.ctrl_seq_num_length as usize;
        let rate = dtc.rate_length as usize;
        let frame = dtc.frame_length as usize;

        // Base header, common to every PDU type.
        let mut base = Layout::default();
        let mut offset = 0usize;
        for (field, width) in [
            (Version, 1),
            (DstAddr, addr),
            (SrcAddr, addr),
            (QosId, qos),
            (DstCep, cep),
            (SrcCep, cep),
            (Type, 1),
            (Flags, 1),
            (Length, len),
        ] {
            base.offsets.insert(field, offset);
            offset += width;
        }
        let base_offset = offset;

        let mut layouts = HashMap::new();

        // DT / MGMT: just the data sequence number after the base header.
        for ty in [PduType::Dt, PduType::Mgmt] {
            let mut layout = base.clone();
            layout.offsets.insert(SequenceNumber, base_offset);
            layout.size = base_offset + seq;
            layouts.insert(ty, layout);
        }

        // All control types start with a control sequence number.
        let ctrl_base = |layout: &mut Layout| -> usize {
            layout.offsets.insert(ControlSequenceNumber, base_offset);
            base_offset + ctrl
        };

        // FC.
        {
            let mut layout = base.clone();
            let mut running = ctrl_base(&mut layout);
            for (field, width) in [
                (NewRwe, seq),
                (MyLwe, seq),
                (MyRwe, seq),
                (SndrRate, rate),
                (TimeFrame, frame),
            ] {
                layout.offsets.insert(field, running);
                running += width;
            }
            layout.size = running;
            layouts.insert(PduType::Fc, layout);
        }

        // ACK.
        {
            let mut layout = base.clone();
            let mut running = ctrl_base(&mut layout);
            layout.offsets.insert(AckedSn, running);
            running += seq;
            layout.size = running;
            layouts.insert(PduType::Ack, layout);
        }

        // ACK + FC.
        {
            let mut layout = base.clone();
            let mut running = ctrl_base(&mut layout);
            layout.offsets.insert(AckedSn, running);
            running += seq;
            for (field, width) in [
                (LastCtrlCsn, ctrl),
                (NewLwe, seq),
                (NewRwe, seq),
                (MyLwe, seq),
                (MyRwe, seq),
                (SndrRate, rate),
                (TimeFrame, frame),
            ] {
                layout.offsets.insert(field, running);
                running += width;
            }
            layout.size = running;
            layouts.insert(PduType::AckAndFc, layout);
        }

        // CACK / RENDEZVOUS share the same extra-field shape.
        for ty in [PduType::Cack, PduType::Rendezvous] {
            let mut layout = base.clone();
            let mut running = ctrl_base(&mut layout);
            for (field, width) in [
                (LastCtrlCsn, ctrl),
                (NewLwe, seq),
                (NewRwe, seq),
                (MyLwe, seq),
                (MyRwe, seq),
                (SndrRate, rate),
                (TimeFrame, frame),
            ] {
                layout.offsets.insert(field, running);
                running += width;
            }
            layout.size = running;
            layouts.insert(ty, layout);
        }

        Self {
            base_offset,
            layouts,
        }
    }

    /// Precomputed total header size for `pdu_type` (`pci_calculate_size`).
    pub fn calculate_size(&self, pdu_type: PduType) -> usize {
        self.layouts.get(&pdu_type).map(|l| l.size).unwrap_or(self.base_offset)
    }

    fn offset(&self, pdu_type: PduType, field: PciFieldIndex) -> Option<usize> {
        self.layouts.get(&pdu_type)?.offsets.get(&field).copied()
    }
}

fn read_field(bytes: &[u8], offset: usize, width: u8) -> Result<u64, PciError> {
    let width = width as usize;
    let slice = bytes
        .get(offset..offset + width)
        .ok_or(PciError::BufferTooShort { offset, width })?;
    let mut buf = [0u8; 8];
    buf[8 - width..].copy_from_slice(slice);
    Ok(u64::from_be_bytes(buf))
}

fn write_field(bytes: &mut [u8], offset: usize, width: u8, value: u64) -> Result<(), PciError> {
    let width = width as usize;
    let slice = bytes
        .get_mut(offset..offset + width)
        .ok_or(PciError::BufferTooShort { offset, width })?;
    let full = value.to_be_bytes();
    slice.copy_from_slice(&full[8 - width..]);
    Ok(())
}

/// The fully decoded contents of a PCI header: the base fields plus
/// whichever control-field family applies to the PDU's type.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PciValues {
    pub dst_addr: u64,
    pub src_addr: u64,
    pub qos_id: u64,
    pub dst_cep: u64,
    pub src_cep: u64,
    pub flags: u8,
    pub length: u64,
    /// DT/MGMT sequence number.
    pub sequence_number: Option<u64>,
    /// Control sequence number (all non-DT/MGMT types).
    pub control_sequence_number: Option<u64>,
    pub new_rwe: Option<u64>,
    pub new_lwe: Option<u64>,
    pub my_lwe: Option<u64>,
    pub my_rwe: Option<u64>,
    pub sndr_rate: Option<u64>,
    pub time_frame: Option<u64>,
    pub last_ctrl_csn: Option<u64>,
    pub acked_sn: Option<u64>,
}

/// Writes the base header and type-specific fields for `pdu_type` into
/// `buf`, which must be at least `table.calculate_size(pdu_type)` bytes.
pub fn pci_format(
    buf: &mut [u8],
    dtc: &DataTransferConstants,
    table: &PciOffsetTable,
    pdu_type: PduType,
    values: &PciValues,
) -> Result<(), PciError> {
    use PciFieldIndex::*;

    let base_at = |f| table.offset(pdu_type, f).expect("base field always present");
    write_field(buf, base_at(Version), 1, 1)?;
    write_field(buf, base_at(DstAddr), dtc.address_length, values.dst_addr)?;
    write_field(buf, base_at(SrcAddr), dtc.address_length, values.src_addr)?;
    write_field(buf, base_at(QosId), dtc.qos_id_length, values.qos_id)?;
    write_field(buf, base_at(DstCep), dtc.cep_id_length, values.dst_cep)?;
    write_field(buf, base_at(SrcCep), dtc.cep_id_length, values.src_cep)?;
    write_field(buf, base_at(Type), 1, pdu_type.to_wire() as u64)?;
    write_field(buf, base_at(Flags), 1, values.flags as u64)?;
    write_field(buf, base_at(Length), dtc.length_length, values.length)?;

    if pdu_type.is_data_type() {
        let off = table
            .offset(pdu_type, SequenceNumber)
            .ok_or(PciError::UndefinedField { pdu_type, field: "sequence_number" })?;
        write_field(buf, off, dtc.seq_num_length, values.sequence_number.unwrap_or(0))?;
        return Ok(());
    }

    let off = table
        .offset(pdu_type, ControlSequenceNumber)
        .ok_or(PciError::UndefinedField { pdu_type, field: "control_sequence_number" })?;
    write_field(buf, off, dtc.ctrl_seq_num_length, values.control_sequence_number.unwrap_or(0))?;

    populate_ctrl_pci(buf, dtc, table, pdu_type, values)
}

/// Fills in the control-field families beyond the (already-written)
/// control sequence number: ACK, ACK+FC, FC, CACK, RENDEZVOUS.
fn populate_ctrl_pci(
    buf: &mut [u8],
    dtc: &DataTransferConstants,
    table: &PciOffsetTable,
    pdu_type: PduType,
    values: &PciValues,
) -> Result<(), PciError> {
    use PciFieldIndex::*;

    let maybe_write = |buf: &mut [u8], field, width: u8, value: Option<u64>| -> Result<(), PciError> {
        if let Some(off) = table.offset(pdu_type, field) {
            write_field(buf, off, width, value.unwrap_or(0))?;
        }
        Ok(())
    };

    maybe_write(buf, AckedSn, dtc.seq_num_length, values.acked_sn)?;
    maybe_write(buf, LastCtrlCsn, dtc.ctrl_seq_num_length, values.last_ctrl_csn)?;
    maybe_write(buf, NewLwe, dtc.seq_num_length, values.new_lwe)?;
    maybe_write(buf, NewRwe, dtc.seq_num_length, values.new_rwe)?;
    maybe_write(buf, MyLwe, dtc.seq_num_length, values.my_lwe)?;
    maybe_write(buf, MyRwe, dtc.seq_num_length, values.my_rwe)?;
    maybe_write(buf, SndrRate, dtc.rate_length, values.sndr_rate)?;
    maybe_write(buf, TimeFrame, dtc.frame_length, values.time_frame)?;
    Ok(())
}

/// Reads the PDU type at the position the offset table says it lives at.
/// The `Type` field's offset is identical across every PDU type (it is
/// part of the common base header), so any type's layout may be used to
/// locate it.
pub fn pci_type_at(buf: &[u8], table: &PciOffsetTable) -> Result<PduType, PciError> {
    let off = table
        .offset(PduType::Dt, PciFieldIndex::Type)
        .expect("Type field always present in the base header");
    let raw = read_field(buf, off, 1)? as u8;
    PduType::from_wire(raw).ok_or(PciError::UnknownPduType(raw))
}

/// Parses a full PCI header out of `buf` for the already-known `pdu_type`.
pub fn pci_parse(
    buf: &[u8],
    dtc: &DataTransferConstants,
    table: &PciOffsetTable,
    pdu_type: PduType,
) -> Result<PciValues, PciError> {
    use PciFieldIndex::*;

    let base_at = |f| table.offset(pdu_type, f).expect("base field always present");
    let mut values = PciValues {
        dst_addr: read_field(buf, base_at(DstAddr), dtc.address_length)?,
        src_addr: read_field(buf, base_at(SrcAddr), dtc.address_length)?,
        qos_id: read_field(buf, base_at(QosId), dtc.qos_id_length)?,
        dst_cep: read_field(buf, base_at(DstCep), dtc.cep_id_length)?,
        src_cep: read_field(buf, base_at(SrcCep), dtc.cep_id_length)?,
        flags: read_field(buf, base_at(Flags), 1)? as u8,
        length: read_field(buf, base_at(Length), dtc.length_length)?,
        ..Default::default()
    };

    if pdu_type.is_data_type() {
        let off = table.offset(pdu_type, SequenceNumber).expect("DT/MGMT always has a sequence number");
        values.sequence_number = Some(read_field(buf, off, dtc.seq_num_length)?);
        return Ok(values);
    }

    let off = table
        .offset(pdu_type, ControlSequenceNumber)
        .expect("control types always have a control sequence number");
    values.control_sequence_number = Some(read_field(buf, off, dtc.ctrl_seq_num_length)?);

    let maybe_read = |buf: &[u8], field, width: u8| -> Result<Option<u64>, PciError> {
        match table.offset(pdu_type, field) {
            Some(off) => Ok(Some(read_field(buf, off, width)?)),
            None => Ok(None),
        }
    };

    values.acked_sn = maybe_read(buf, AckedSn, dtc.seq_num_length)?;
    values.last_ctrl_csn = maybe_read(buf, LastCtrlCsn, dtc.ctrl_seq_num_length)?;
    values.new_lwe = maybe_read(buf, NewLwe, dtc.seq_num_length)?;
    values.new_rwe = maybe_read(buf, NewRwe, dtc.seq_num_length)?;
    values.my_lwe = maybe_read(buf, MyLwe, dtc.seq_num_length)?;
    values.my_rwe = maybe_read(buf, MyRwe, dtc.seq_num_length)?;
    values.sndr_rate = maybe_read(buf, SndrRate, dtc.rate_length)?;
    values.time_frame = maybe_read(buf, TimeFrame, dtc.frame_length)?;

    Ok(values)
}

/// Computes the acknowledged sequence number for an ACK-style control PDU:
/// `LWE` for plain ACKs, `LWE + 1` for NACK-style retransmission requests.
pub fn acked_sequence_for(lwe: u64, is_nack: bool) -> u64 {
    if is_nack { lwe + 1 } else { lwe }
}
