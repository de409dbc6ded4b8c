// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present RINA (Rust) Contributors

//! Kernel Flow Allocator (KFA): owns port-ids and the [`Flow`] objects
//! bound to them, multiplexing DUs between the data-transfer stack and
//! whatever is reading/writing a flow's data endpoint.
//!
//! A flow is destroyed only once it has no readers, writers or posters
//! left, mirroring the reference's reference-counted teardown
//! ("structure automatically freed when there are no more readers or
//! writers").

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::error::KfaError;
use crate::idm::{self, IdManager};

const FLOW_STATE_PENDING: u8 = 0;
const FLOW_STATE_ALLOCATED: u8 = 1;
const FLOW_STATE_DISABLED: u8 = 2;
const FLOW_STATE_DEALLOCATED: u8 = 3;

/// `{Pending, Allocated, Disabled, Deallocated}` — a flow's life cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Pending,
    Allocated,
    Disabled,
    Deallocated,
}

impl FlowState {
    fn from_u8(v: u8) -> Self {
        match v {
            FLOW_STATE_PENDING => FlowState::Pending,
            FLOW_STATE_ALLOCATED => FlowState::Allocated,
            FLOW_STATE_DISABLED => FlowState::Disabled,
            _ => FlowState::Deallocated,
        }
    }

    fn to_u8(self) -> u8 {
        match self {
            FlowState::Pending => FLOW_STATE_PENDING,
            FlowState::Allocated => FLOW_STATE_ALLOCATED,
            FlowState::Disabled => FLOW_STATE_DISABLED,
            FlowState::Deallocated => FLOW_STATE_DEALLOCATED,
        }
    }
}

/// Which of the three live-reference counters a [`FlowRefGuard`] tracks.
#[derive(Debug, Clone, Copy)]
enum FlowRefRole {
    Reader,
    Writer,
    Poster,
}

/// RAII guard: increments the chosen counter on acquisition, decrements
/// it and wakes anyone waiting on `destroy_notify` if that was the last
/// live reference, mirroring [`crate::efcp::EfcpInstance`]'s
/// `PendingOpGuard`.
struct FlowRefGuard {
    flow: Arc<Flow>,
    role: FlowRefRole,
}

impl Drop for FlowRefGuard {
    fn drop(&mut self) {
        let counter = match self.role {
            FlowRefRole::Reader => &self.flow.readers,
            FlowRefRole::Writer => &self.flow.writers,
            FlowRefRole::Poster => &self.flow.posters,
        };
        if counter.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.flow.destroy_notify.notify_waiters();
        }
    }
}

/// One allocated flow: a port-id, its read queue, and the accounting
/// that decides when it may be torn down.
pub struct Flow {
    pub port_id: u32,
    pub ipcp_id: u16,
    pub max_sdu_size: usize,
    state: AtomicU8,
    readers: AtomicU32,
    writers: AtomicU32,
    posters: AtomicU32,
    queue: tokio::sync::Mutex<VecDeque<Vec<u8>>>,
    readable: Notify,
    destroy_notify: Notify,
    cancel: CancellationToken,
}

impl Flow {
    fn new(port_id: u32, ipcp_id: u16, max_sdu_size: usize) -> Self {
        Self {
            port_id,
            ipcp_id,
            max_sdu_size,
            state: AtomicU8::new(FLOW_STATE_PENDING),
            readers: AtomicU32::new(0),
            writers: AtomicU32::new(0),
            posters: AtomicU32::new(0),
            queue: tokio::sync::Mutex::new(VecDeque::new()),
            readable: Notify::new(),
            destroy_notify: Notify::new(),
            cancel: CancellationToken::new(),
        }
    }

    fn begin_ref(self: &Arc<Self>, role: FlowRefRole) -> FlowRefGuard {
        let counter = match role {
            FlowRefRole::Reader => &self.readers,
            FlowRefRole::Writer => &self.writers,
            FlowRefRole::Poster => &self.posters,
        };
        counter.fetch_add(1, Ordering::SeqCst);
        FlowRefGuard {
            flow: Arc::clone(self),
            role,
        }
    }

    /// Held by a caller across a user-space write call (`ub_write`
    /// analogue) so the flow cannot be torn down mid-write even though
    /// the actual enqueue happens via [`Flow::post`].
    pub fn begin_write(self: &Arc<Self>) -> impl Drop {
        self.begin_ref(FlowRefRole::Writer)
    }

    pub fn state(&self) -> FlowState {
        FlowState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: FlowState) {
        self.state.store(state.to_u8(), Ordering::SeqCst);
    }

    /// Total of readers + writers + posters currently bound to this flow.
    fn live_refs(&self) -> u32 {
        self.readers.load(Ordering::SeqCst)
            + self.writers.load(Ordering::SeqCst)
            + self.posters.load(Ordering::SeqCst)
    }

    /// `true` once deallocated and every reader/writer/poster has
    /// detached: the caller should now drop this flow's last handle.
    pub fn maybe_destroy(&self) -> bool {
        self.state() == FlowState::Deallocated && self.live_refs() == 0
    }

    /// Enqueues a DU posted by the data-transfer stack for an upward
    /// reader (`kfa_flow_du_post`/`kfa_sdu_post` analogue). Held for the
    /// duration of the call via the `posters` counter.
    pub async fn post(self: &Arc<Self>, payload: Vec<u8>) -> Result<(), KfaError> {
        let _guard = self.begin_ref(FlowRefRole::Poster);
        if self.state() == FlowState::Deallocated {
            return Err(KfaError::Shutdown);
        }
        if payload.len() > self.max_sdu_size {
            return Err(KfaError::OversizedDatagram {
                size: payload.len(),
                max: self.max_sdu_size,
            });
        }
        self.queue.lock().await.push_back(payload);
        self.readable.notify_waiters();
        Ok(())
    }

    /// Reads the next queued DU, blocking until one is posted or the
    /// flow is cancelled/deallocated, mirroring
    /// `wait_event_interruptible` raced against a pending signal. Held
    /// for the duration of the call via the `readers` counter, so a
    /// blocked reader keeps the flow alive until it returns.
    pub async fn read(self: &Arc<Self>) -> Result<Vec<u8>, KfaError> {
        let _guard = self.begin_ref(FlowRefRole::Reader);
        loop {
            if let Some(payload) = self.queue.lock().await.pop_front() {
                return Ok(payload);
            }
            if self.state() == FlowState::Deallocated {
                return Err(KfaError::Shutdown);
            }
            tokio::select! {
                _ = self.readable.notified() => continue,
                _ = self.cancel.cancelled() => return Err(KfaError::Interrupted { bytes_written: 0 }),
            }
        }
    }

    pub fn poll_readable(&self) -> bool {
        !self.queue.try_lock().map(|q| q.is_empty()).unwrap_or(true)
    }

    pub fn cancel_io(&self) {
        self.cancel.cancel();
    }
}

/// Owns every flow in one IPCP instance's data plane.
pub struct Kfa {
    port_idm: IdManager,
    flows: HashMap<u32, Arc<Flow>>,
}

impl Default for Kfa {
    fn default() -> Self {
        Self::new()
    }
}

impl Kfa {
    pub fn new() -> Self {
        Self {
            port_idm: IdManager::for_width(2),
            flows: HashMap::new(),
        }
    }

    /// `kfa_port_id_reserve`: allocates a port-id without yet attaching
    /// a flow to it.
    pub fn reserve_port_id(&mut self) -> Result<u32, KfaError> {
        let id = self.port_idm.allocate();
        if id == idm::bad_id() {
            return Err(KfaError::BadPortId);
        }
        Ok(id)
    }

    /// `kfa_flow_create`: attaches a newly-allocated flow to a
    /// previously reserved port-id.
    pub fn create_flow(&mut self, port_id: u32, ipcp_id: u16, max_sdu_size: usize) -> Arc<Flow> {
        let flow = Arc::new(Flow::new(port_id, ipcp_id, max_sdu_size));
        flow.set_state(FlowState::Allocated);
        self.flows.insert(port_id, Arc::clone(&flow));
        flow
    }

    pub fn flow(&self, port_id: u32) -> Result<Arc<Flow>, KfaError> {
        self.flows
            .get(&port_id)
            .cloned()
            .ok_or(KfaError::FlowNotFound(port_id))
    }

    pub fn flow_exists(&self, port_id: u32) -> bool {
        self.flows.contains_key(&port_id)
    }

    /// `kfa_flow_deallocate`: marks the flow deallocated, cancels any
    /// blocked reader, wakes all waiters, and then waits for every
    /// reader/writer/poster bound to the flow to detach before removing
    /// it and releasing its port-id, as the invariant in spec.md §3
    /// requires.
    pub async fn deallocate(&mut self, port_id: u32) -> Result<(), KfaError> {
        let flow = self.flow(port_id)?;
        flow.set_state(FlowState::Deallocated);
        flow.cancel_io();
        flow.readable.notify_waiters();
        while !flow.maybe_destroy() {
            flow.destroy_notify.notified().await;
        }
        self.flows.remove(&port_id);
        self.port_idm.release(port_id);
        Ok(())
    }

    pub fn flow_count(&self) -> usize {
        self.flows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn post_then_read_delivers_in_fifo_order() {
        let mut kfa = Kfa::new();
        let port_id = kfa.reserve_port_id().unwrap();
        let flow = kfa.create_flow(port_id, 1, 1500);
        flow.post(vec![1]).await.unwrap();
        flow.post(vec![2]).await.unwrap();
        assert_eq!(flow.read().await.unwrap(), vec![1]);
        assert_eq!(flow.read().await.unwrap(), vec![2]);
    }

    #[tokio::test]
    async fn oversized_post_is_rejected() {
        let mut kfa = Kfa::new();
        let port_id = kfa.reserve_port_id().unwrap();
        let flow = kfa.create_flow(port_id, 1, 4);
        let err = flow.post(vec![0; 5]).await.unwrap_err();
        assert!(matches!(err, KfaError::OversizedDatagram { .. }));
    }

    #[tokio::test]
    async fn deallocate_wakes_blocked_reader() {
        let mut kfa = Kfa::new();
        let port_id = kfa.reserve_port_id().unwrap();
        let flow = kfa.create_flow(port_id, 1, 1500);
        let reader_flow = Arc::clone(&flow);
        let reader = tokio::spawn(async move { reader_flow.read().await });
        tokio::task::yield_now().await;
        kfa.deallocate(port_id).await.unwrap();
        let result = reader.await.unwrap();
        assert!(matches!(result, Err(KfaError::Shutdown) | Err(KfaError::Interrupted { .. })));
        assert_eq!(kfa.flow_count(), 0);
    }

    #[tokio::test]
    async fn deallocate_unknown_port_fails() {
        let mut kfa = Kfa::new();
        assert!(matches!(kfa.deallocate(42).await, Err(KfaError::FlowNotFound(42))));
    }

    #[tokio::test]
    async fn deallocate_waits_for_concurrent_writers_to_drain() {
        let mut kfa = Kfa::new();
        let port_id = kfa.reserve_port_id().unwrap();
        let flow = kfa.create_flow(port_id, 1, 1500);

        let writer_guard = flow.begin_write();
        let flow_for_deallocate = Arc::clone(&flow);
        let deallocator = tokio::spawn(async move {
            let mut kfa = kfa;
            kfa.deallocate(port_id).await.unwrap();
            kfa
        });
        tokio::task::yield_now().await;
        // The flow must still be alive: the writer guard is still held.
        assert!(!flow_for_deallocate.maybe_destroy());
        drop(writer_guard);

        let kfa = deallocator.await.unwrap();
        assert_eq!(kfa.flow_count(), 0);
    }
}
