// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present RINA (Rust) Contributors

//! Device endpoints: async handles replacing the reference's
//! `/dev/rina-data`/`/dev/rina-ctrl` character devices. An application
//! reads and writes SDUs through [`DataDeviceHandle`]; the control
//! plane exchanges [`crate::kipcm::ControlMessage`]s through
//! [`ControlSessionHandle`], both over in-process channels rather than
//! file descriptors.

use tokio::sync::mpsc;

use crate::error::KfaError;
use crate::kfa::Flow;
use crate::kipcm::ControlMessage;
use std::sync::Arc;

/// Data-plane handle bound to one flow's port-id.
pub struct DataDeviceHandle {
    flow: Arc<Flow>,
}

impl DataDeviceHandle {
    pub fn new(flow: Arc<Flow>) -> Self {
        Self { flow }
    }

    pub fn port_id(&self) -> u32 {
        self.flow.port_id
    }

    /// Blocks until an SDU is available, as a read on the data device
    /// would.
    pub async fn read(&self) -> Result<Vec<u8>, KfaError> {
        self.flow.read().await
    }

    /// Posts an SDU for the flow's peer, as a write on the data device
    /// would (accepted here; actual framing/DTP admission happens in
    /// the EFCP layer this handle is wired to). Held across the call via
    /// the flow's `writers` counter, so a deallocate racing a write
    /// can't tear the flow down underneath it.
    pub async fn write(&self, payload: Vec<u8>) -> Result<(), KfaError> {
        let _guard = self.flow.begin_write();
        self.flow.post(payload).await
    }

    pub fn poll_readable(&self) -> PollReadable {
        if self.flow.poll_readable() {
            PollReadable::Ready
        } else {
            PollReadable::Pending
        }
    }
}

/// Result of a non-blocking readability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollReadable {
    Ready,
    Pending,
}

/// Control-plane session: an in-process duplex channel of
/// [`ControlMessage`]s, standing in for the reference's netlink/ioctl
/// control socket.
pub struct ControlSessionHandle {
    outbound: mpsc::Sender<ControlMessage>,
    inbound: mpsc::Receiver<ControlMessage>,
}

impl ControlSessionHandle {
    pub fn new(outbound: mpsc::Sender<ControlMessage>, inbound: mpsc::Receiver<ControlMessage>) -> Self {
        Self { outbound, inbound }
    }

    pub async fn send(&self, msg: ControlMessage) -> Result<(), mpsc::error::SendError<ControlMessage>> {
        self.outbound.send(msg).await
    }

    pub async fn recv(&mut self) -> Option<ControlMessage> {
        self.inbound.recv().await
    }
}
