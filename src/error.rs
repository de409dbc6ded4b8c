// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present ARI Contributors

//! Error types for ARI
//!
//! This module provides typed errors for all RINA components,
//! replacing string-based errors with structured error types.

use thiserror::Error;

/// Main error type for ARI operations
#[derive(Error, Debug)]
pub enum AriError {
    #[error("RMT error: {0}")]
    Rmt(#[from] RmtError),

    #[error("EFCP error: {0}")]
    Efcp(#[from] EfcpError),

    #[error("Shim error: {0}")]
    Shim(#[from] ShimError),

    #[error("Identifier manager error: {0}")]
    Idm(#[from] IdmError),

    #[error("DU buffer error: {0}")]
    Du(#[from] DuError),

    #[error("PCI codec error: {0}")]
    Pci(#[from] PciError),

    #[error("KFA error: {0}")]
    Kfa(#[from] KfaError),

    #[error("KIPCM error: {0}")]
    Kipcm(#[from] KipcmError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] SerializationError),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Actor channel closed")]
    ChannelClosed,

    #[error("Operation timed out")]
    Timeout,

    #[error("Feature not implemented: {0}")]
    NotImplemented(String),
}

/// RMT-specific errors
#[derive(Error, Debug, Clone)]
pub enum RmtError {
    #[error("No route to destination: {0}")]
    NoRoute(u64),

    #[error("Route not found for destination: {0}")]
    RouteNotFound(u64),

    #[error("Queue full for next hop: {0}")]
    QueueFull(u64),

    #[error("Invalid PDU: {0}")]
    InvalidPdu(String),

    #[error("Forwarding failed: {0}")]
    ForwardingFailed(String),

    #[error("Next hop unreachable: {0}")]
    NextHopUnreachable(u64),

    #[error("Network error: {0}")]
    Network(String),
}

/// EFCP-specific errors
#[derive(Error, Debug, Clone)]
pub enum EfcpError {
    #[error("Flow not found: {0}")]
    FlowNotFound(u64),

    #[error("Flow already exists: {0}")]
    FlowAlreadyExists(u64),

    #[error("Flow allocation failed: {0}")]
    AllocationFailed(String),

    #[error("Invalid flow configuration: {0}")]
    InvalidConfig(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    #[error("Flow closed: {0}")]
    FlowClosed(u64),

    #[error("Sequence number error: expected {expected}, got {actual}")]
    SequenceError { expected: u64, actual: u64 },

    #[error("Connection {0} is deallocated")]
    ConnectionDeallocated(u32),

    #[error("Connection {cep_id} still has {pending} pending operation(s)")]
    PendingOpsNotDrained { cep_id: u32, pending: u32 },

    #[error("No route to destination {0}, PDU dropped")]
    NoRoute(u64),
}

/// Identifier manager (CIDM/PIDM) errors.
#[derive(Error, Debug, Clone)]
pub enum IdmError {
    #[error("identifier space exhausted")]
    Exhausted,

    #[error("invalid (sentinel) identifier")]
    BadId,
}

/// DU buffer errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DuError {
    #[error("requested {requested} bytes but only {available} are available")]
    RoomExceeded { requested: usize, available: usize },

    #[error("no PCI handle attached to this DU")]
    NoPciAttached,

    #[error("PDU type is unrecognised or computed PCI size is non-positive")]
    MalformedPci,
}

/// PCI codec errors.
#[derive(Error, Debug, Clone)]
pub enum PciError {
    #[error("buffer too short to read/write {width} byte(s) at offset {offset}")]
    BufferTooShort { offset: usize, width: usize },

    #[error("field {field} is not defined for PDU type {pdu_type:?}")]
    UndefinedField {
        pdu_type: crate::pci::PduType,
        field: &'static str,
    },

    #[error("unknown PDU type byte: {0}")]
    UnknownPduType(u8),
}

/// Kernel Flow Allocator errors.
#[derive(Error, Debug, Clone)]
pub enum KfaError {
    #[error("bad port-id")]
    BadPortId,

    #[error("flow {0} not found")]
    FlowNotFound(u32),

    #[error("flow is deallocated, write/read refused")]
    Shutdown,

    #[error("flow not ready, try again")]
    WouldBlock,

    #[error("blocked call interrupted by signal after writing {bytes_written} byte(s)")]
    Interrupted { bytes_written: usize },

    #[error("datagram of {size} bytes exceeds max SDU size {max}")]
    OversizedDatagram { size: usize, max: usize },
}

/// Kernel IPC Manager errors.
#[derive(Error, Debug, Clone)]
pub enum KipcmError {
    #[error("unknown IPCP id: {0}")]
    UnknownIpcp(u16),

    #[error("IPCP id {0} already registered")]
    DuplicateIpcpId(u16),

    #[error("factory '{0}' still has live instances")]
    FactoryBusy(String),

    #[error("no factory registered under name '{0}'")]
    UnknownFactory(String),

    #[error("no pending request for event id {0}")]
    UnknownEventId(u64),
}

/// Shim layer errors
#[derive(Error, Debug, Clone)]
pub enum ShimError {
    #[error("Failed to bind socket: {0}")]
    BindFailed(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    #[error("Invalid socket address: {0}")]
    InvalidAddress(String),

    #[error("Peer not registered: {0}")]
    PeerNotRegistered(u64),

    #[error("Socket closed")]
    SocketClosed,

    #[error("I/O error: {0}")]
    IoError(String),
}

/// Serialization/deserialization errors
#[derive(Error, Debug)]
pub enum SerializationError {
    #[error("Postcard serialization failed: {0}")]
    PostcardSerialization(#[from] postcard::Error),

    #[error("JSON serialization failed: {0}")]
    JsonSerialization(#[from] serde_json::Error),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),
}

// Conversion from String for backwards compatibility during migration
impl From<String> for AriError {
    fn from(s: String) -> Self {
        AriError::Config(s)
    }
}

impl From<&str> for AriError {
    fn from(s: &str) -> Self {
        AriError::Config(s.to_string())
    }
}

// Enable conversion to String for backwards compatibility
impl From<AriError> for String {
    fn from(err: AriError) -> Self {
        err.to_string()
    }
}

impl From<RmtError> for String {
    fn from(err: RmtError) -> Self {
        err.to_string()
    }
}

impl From<EfcpError> for String {
    fn from(err: EfcpError) -> Self {
        err.to_string()
    }
}

impl From<ShimError> for String {
    fn from(err: ShimError) -> Self {
        err.to_string()
    }
}
