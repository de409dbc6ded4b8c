// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present RINA (Rust) Contributors

//! Delimiter: splits a user SDU larger than `max_fragment_size` into
//! ordered fragments on send, and reassembles fragments into SDUs on
//! receive. Only consulted when the DIF's constants enable
//! fragmentation; with fragmentation off, DTP hands payloads straight
//! through.

/// One connection's fragmentation state: the configured fragment size
/// plus whatever partial SDU is awaiting more fragments on receive.
#[derive(Debug)]
pub struct Delimiter {
    max_fragment_size: usize,
    rx_partial: Option<Vec<u8>>,
}

/// One fragment of a user SDU, in send order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub bytes: Vec<u8>,
    pub is_last: bool,
}

impl Delimiter {
    pub fn new(max_fragment_size: usize) -> Self {
        Self {
            max_fragment_size,
            rx_partial: None,
        }
    }

    /// Splits `sdu` into fragments of at most `max_fragment_size` bytes
    /// each, in order. An empty `sdu` still yields one (empty, last)
    /// fragment, matching a zero-length write being sendable.
    pub fn fragment(&self, sdu: &[u8]) -> Vec<Fragment> {
        if sdu.is_empty() {
            return vec![Fragment { bytes: Vec::new(), is_last: true }];
        }
        let chunks: Vec<_> = sdu.chunks(self.max_fragment_size).collect();
        let last_index = chunks.len() - 1;
        chunks
            .into_iter()
            .enumerate()
            .map(|(i, chunk)| Fragment {
                bytes: chunk.to_vec(),
                is_last: i == last_index,
            })
            .collect()
    }

    /// Feeds one incoming fragment through reassembly. Returns the
    /// reassembled SDU once the fragment marked `is_last` arrives.
    pub fn process_udf(&mut self, fragment: Fragment) -> Option<Vec<u8>> {
        let mut partial = self.rx_partial.take().unwrap_or_default();
        partial.extend_from_slice(&fragment.bytes);
        if fragment.is_last {
            Some(partial)
        } else {
            self.rx_partial = Some(partial);
            None
        }
    }

    pub fn has_pending_reassembly(&self) -> bool {
        self.rx_partial.is_some()
    }
}
