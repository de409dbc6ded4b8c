// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present RINA (Rust) Contributors

//! Data Unit (DU) buffer management.
//!
//! A [`Du`] is an exclusively-owned view over a shared, refcounted byte
//! buffer with head- and tail-room that can grow or shrink without
//! copying the payload. PCI is written by pushing the head pointer
//! leftward into the reserved headroom; [`Du::dup`] produces a clone that
//! shares the underlying bytes but owns its own view (its own notion of
//! where the data starts and ends, and its own PCI length).

use crate::error::DuError;
use std::sync::{Arc, Mutex};

/// Head-room reserved by [`Du::create`], matching the reference's
/// `MAX_PCIS_LEN = 40 * 5`.
pub const DU_MAX_HEAD_ROOM: usize = 40 * 5;
/// Tail-room reserved by [`Du::create`], matching the reference's
/// `MAX_TAIL_LEN`.
pub const DU_MAX_TAIL_ROOM: usize = 20;

/// The shared backing store. Several [`Du`]s may point at the same
/// `Inner` (via `Arc`); the bytes are only freed once the last `Arc` is
/// dropped.
struct Inner {
    bytes: Mutex<Vec<u8>>,
}

/// An owned view over a (possibly shared) byte buffer.
///
/// `data_start..data_start+data_len` is the current payload region within
/// `bytes`; everything before `data_start` is headroom, everything after
/// `data_start + data_len` is tailroom. `pci_offset` is `Some(offset)`
/// while a PCI has been attached at that offset (always `<= data_start`).
pub struct Du {
    inner: Arc<Inner>,
    data_start: usize,
    data_len: usize,
    pci_offset: Option<usize>,
    pci_len: usize,
}

impl Du {
    /// Allocates a buffer with [`DU_MAX_HEAD_ROOM`] headroom, `data_len`
    /// bytes of payload (zeroed), and [`DU_MAX_TAIL_ROOM`] tailroom. No
    /// PCI is attached.
    pub fn create(data_len: usize) -> Self {
        let total = DU_MAX_HEAD_ROOM + data_len + DU_MAX_TAIL_ROOM;
        Self {
            inner: Arc::new(Inner {
                bytes: Mutex::new(vec![0u8; total]),
            }),
            data_start: DU_MAX_HEAD_ROOM,
            data_len,
            pci_offset: None,
            pci_len: 0,
        }
    }

    /// Allocates a buffer from an existing payload, copying it into the
    /// data region (headroom/tailroom still reserved around it).
    pub fn from_payload(payload: &[u8]) -> Self {
        let mut du = Self::create(payload.len());
        du.data_mut().copy_from_slice(payload);
        du
    }

    /// Allocates a buffer and immediately reserves PCI room of
    /// `pci_len` bytes ahead of the payload, attaching a PCI handle.
    pub fn create_efcp(data_len: usize, pci_len: usize) -> Result<Self, DuError> {
        let mut du = Self::create(data_len);
        du.reserve_pci(pci_len)?;
        Ok(du)
    }

    /// Current payload length.
    pub fn len(&self) -> usize {
        self.data_len
    }

    pub fn is_empty(&self) -> bool {
        self.data_len == 0
    }

    /// Whether a PCI handle is attached.
    pub fn has_pci(&self) -> bool {
        self.pci_offset.is_some()
    }

    /// Length of the attached PCI region, if any.
    pub fn pci_len(&self) -> usize {
        self.pci_len
    }

    /// Returns a copy of the current payload bytes.
    pub fn payload(&self) -> Vec<u8> {
        let bytes = self.inner.bytes.lock().expect("du buffer poisoned");
        bytes[self.data_start..self.data_start + self.data_len].to_vec()
    }

    /// Returns a mutable view over the current payload bytes.
    pub fn data_mut(&mut self) -> DataGuard<'_> {
        DataGuard {
            bytes: self.inner.bytes.lock().expect("du buffer poisoned"),
            start: self.data_start,
            len: self.data_len,
        }
    }

    /// Returns a copy of the whole region from the PCI offset (if any,
    /// else the data start) through the end of the payload — i.e. the
    /// bytes that would go on the wire.
    pub fn wire_bytes(&self) -> Vec<u8> {
        let start = self.pci_offset.unwrap_or(self.data_start);
        let bytes = self.inner.bytes.lock().expect("du buffer poisoned");
        bytes[start..self.data_start + self.data_len].to_vec()
    }

    /// Grows the headroom by `n` bytes, re-homing any attached PCI handle
    /// so that its position relative to the old data start is preserved.
    pub fn head_grow(&mut self, n: usize) -> Result<(), DuError> {
        if n == 0 {
            return Ok(());
        }
        let mut bytes = self.inner.bytes.lock().expect("du buffer poisoned");
        if self.data_start < n {
            // Expand the backing buffer: insert `n` fresh bytes at the front.
            let deficit = n - self.data_start;
            let mut grown = vec![0u8; deficit];
            grown.extend_from_slice(&bytes);
            *bytes = grown;
            self.data_start += deficit;
            if let Some(off) = self.pci_offset.as_mut() {
                *off += deficit;
            }
        }
        self.data_start -= n;
        self.data_len += n;
        if let Some(off) = self.pci_offset.as_mut() {
            // PCI sits within the grown region; its absolute offset does
            // not move, only the data start did, which we already adjusted
            // for below via pci_len bookkeeping by callers.
            let _ = off;
        }
        Ok(())
    }

    /// Shrinks the headroom by `n` bytes (the first `n` bytes of the
    /// payload become headroom again).
    pub fn head_shrink(&mut self, n: usize) -> Result<(), DuError> {
        if n > self.data_len {
            return Err(DuError::RoomExceeded {
                requested: n,
                available: self.data_len,
            });
        }
        self.data_start += n;
        self.data_len -= n;
        Ok(())
    }

    /// Grows the tailroom by `n` bytes (appends `n` zeroed bytes to the
    /// payload), expanding the backing buffer if needed.
    pub fn tail_grow(&mut self, n: usize) -> Result<(), DuError> {
        if n == 0 {
            return Ok(());
        }
        let mut bytes = self.inner.bytes.lock().expect("du buffer poisoned");
        let end = self.data_start + self.data_len;
        let available_tail = bytes.len() - end;
        if available_tail < n {
            bytes.resize(bytes.len() + (n - available_tail), 0);
        }
        self.data_len += n;
        Ok(())
    }

    /// Shrinks the tailroom by `n` bytes (the last `n` bytes of the
    /// payload become tailroom again).
    pub fn tail_shrink(&mut self, n: usize) -> Result<(), DuError> {
        if n > self.data_len {
            return Err(DuError::RoomExceeded {
                requested: n,
                available: self.data_len,
            });
        }
        self.data_len -= n;
        Ok(())
    }

    /// Reserves `pci_len` bytes of headroom ahead of the payload and
    /// attaches a PCI handle there (used by `create_efcp` and `encap`).
    pub fn reserve_pci(&mut self, pci_len: usize) -> Result<(), DuError> {
        self.head_grow(pci_len)?;
        self.pci_offset = Some(self.data_start);
        self.pci_len = pci_len;
        Ok(())
    }

    /// Pushes the head pointer leftward by `pci_len`, attaching a PCI
    /// handle of that size ahead of the current payload.
    pub fn encap(&mut self, pci_len: usize) -> Result<(), DuError> {
        self.reserve_pci(pci_len)
    }

    /// Reads the PCI region's bytes out (for decap) and pulls the head
    /// past it, detaching the PCI handle. Fails if no PCI is attached.
    pub fn decap(&mut self) -> Result<Vec<u8>, DuError> {
        let offset = self.pci_offset.ok_or(DuError::NoPciAttached)?;
        let pci_len = self.pci_len;
        let pci_bytes = {
            let bytes = self.inner.bytes.lock().expect("du buffer poisoned");
            bytes[offset..offset + pci_len].to_vec()
        };
        self.data_start = offset + pci_len;
        self.data_len -= pci_len;
        self.pci_offset = None;
        self.pci_len = 0;
        Ok(pci_bytes)
    }

    /// Returns a mutable view over the attached PCI region, if any.
    pub fn pci_bytes_mut(&mut self) -> Option<PciGuard<'_>> {
        let offset = self.pci_offset?;
        let len = self.pci_len;
        Some(PciGuard {
            bytes: self.inner.bytes.lock().expect("du buffer poisoned"),
            offset,
            len,
        })
    }

    /// Returns the attached PCI region's bytes, if any.
    pub fn pci_bytes(&self) -> Option<Vec<u8>> {
        let offset = self.pci_offset?;
        let bytes = self.inner.bytes.lock().expect("du buffer poisoned");
        Some(bytes[offset..offset + self.pci_len].to_vec())
    }

    /// Clones this DU: the new DU shares the underlying buffer (via
    /// `Arc`) but owns its own view (data bounds, PCI offset/length).
    pub fn dup(&self) -> Du {
        Du {
            inner: Arc::clone(&self.inner),
            data_start: self.data_start,
            data_len: self.data_len,
            pci_offset: self.pci_offset,
            pci_len: self.pci_len,
        }
    }
}

/// A mutable window into a DU's payload bytes.
pub struct DataGuard<'a> {
    bytes: std::sync::MutexGuard<'a, Vec<u8>>,
    start: usize,
    len: usize,
}

impl std::ops::Deref for DataGuard<'_> {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.bytes[self.start..self.start + self.len]
    }
}

impl std::ops::DerefMut for DataGuard<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.bytes[self.start..self.start + self.len]
    }
}

/// A mutable window into a DU's attached PCI region.
pub struct PciGuard<'a> {
    bytes: std::sync::MutexGuard<'a, Vec<u8>>,
    offset: usize,
    len: usize,
}

impl std::ops::Deref for PciGuard<'_> {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.bytes[self.offset..self.offset + self.len]
    }
}

impl std::ops::DerefMut for PciGuard<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.bytes[self.offset..self.offset + self.len]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_reserves_head_and_tail_room() {
        let du = Du::create(100);
        assert_eq!(du.len(), 100);
        assert!(!du.has_pci());
    }

    #[test]
    fn head_grow_then_shrink_is_invariant() {
        let mut du = Du::from_payload(b"hello world");
        let before = du.payload();
        du.head_grow(16).unwrap();
        du.head_shrink(16).unwrap();
        assert_eq!(du.payload(), before);
    }

    #[test]
    fn encap_then_decap_round_trips_pci_bytes() {
        let mut du = Du::from_payload(b"payload");
        du.encap(8).unwrap();
        assert!(du.has_pci());
        {
            let mut pci = du.pci_bytes_mut().unwrap();
            pci.copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        }
        let pci_bytes = du.decap().unwrap();
        assert_eq!(pci_bytes, vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(du.payload(), b"payload");
        assert!(!du.has_pci());
    }

    #[test]
    fn dup_shares_buffer_but_not_view() {
        let mut du = Du::from_payload(b"shared");
        let clone = du.dup();
        du.tail_grow(4).unwrap();
        assert_eq!(clone.len(), 6);
        assert_eq!(du.len(), 10);
    }

    #[test]
    fn decap_without_pci_fails() {
        let mut du = Du::from_payload(b"x");
        assert!(matches!(du.decap(), Err(DuError::NoPciAttached)));
    }

    #[test]
    fn shrink_beyond_payload_fails() {
        let mut du = Du::from_payload(b"abc");
        assert!(matches!(
            du.tail_shrink(10),
            Err(DuError::RoomExceeded { .. })
        ));
    }
}
