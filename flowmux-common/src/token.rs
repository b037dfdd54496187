//! Opaque identities used across the engine contract
//!
//! The bridge treats both of these as comparable tokens only: map keys
//! and arguments to engine calls. Ownership of whatever they identify
//! (a configured transfer, an open descriptor) stays with the caller or
//! the registry respectively.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of one configured transfer
///
/// The caller keeps the underlying configured transfer alive from
/// `start` until its terminal completion, and must not reconfigure it
/// while it is admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransferToken(u64);

impl TransferToken {
    /// Wrap a raw identity value
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw identity value
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransferToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transfer-{}", self.0)
    }
}

/// Identity of a native socket descriptor
///
/// The value is the platform's raw descriptor number. The engine
/// receives it from a successful open request and names the socket with
/// it in every later interest, close, and readiness exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SocketId(i32);

impl SocketId {
    /// Wrap a raw descriptor value
    #[must_use]
    pub const fn new(raw: i32) -> Self {
        Self(raw)
    }

    /// Get the raw descriptor value
    #[must_use]
    pub fn as_raw(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for SocketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "socket-{}", self.0)
    }
}
