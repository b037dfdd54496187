//! The transfer engine contract
//!
//! A transfer engine multiplexes many concurrent transfers over sockets
//! it does not own. It has no event loop of its own: the host opens and
//! closes sockets on its behalf, watches them for readiness, and runs a
//! single polling timer, all driven by requests the engine makes
//! *synchronously from inside* the host's calls into it.
//!
//! The C-style rendering of that protocol registers callback pointers
//! plus a user-data pointer on the engine. Here the host instead passes
//! `&mut dyn EngineHost` into every entry point; the engine calls back
//! through it before the entry point returns. Same reentrant protocol,
//! exclusive ownership.
//!
//! Call rules an engine implementation must honor:
//!
//! - `begin_tracking` and `stop_tracking` may invoke any host method
//!   before returning, including opening or closing sockets.
//! - `perform` is the only entry point that advances transfers. It may
//!   likewise invoke any host method, and it reports how many transfers
//!   are still running.
//! - After any `perform` call the host drains `next_finished` until it
//!   returns `None`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::status::{EngineStatus, TransferStatus};
use crate::token::{SocketId, TransferToken};

/// Address family of a requested socket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressFamily {
    /// IPv4
    V4,
    /// IPv6
    V6,
    /// Any other family, carrying the platform value
    Other(i32),
}

/// Transport type of a requested socket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SocketKind {
    /// Connection-oriented stream
    Stream,
    /// Datagram
    Datagram,
    /// Any other type, carrying the platform value
    Other(i32),
}

/// A socket the engine wants opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocketRequest {
    pub family: AddressFamily,
    pub kind: SocketKind,
    /// Raw protocol number; 0 selects the family/kind default
    pub protocol: i32,
}

impl SocketRequest {
    /// An IPv4 stream socket with the default protocol
    #[must_use]
    pub fn ipv4_stream() -> Self {
        Self {
            family: AddressFamily::V4,
            kind: SocketKind::Stream,
            protocol: 0,
        }
    }
}

/// What the engine wants to be told about a socket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Interest {
    /// Wake on readability
    Read,
    /// Wake on writability
    Write,
    /// Wake on either
    Both,
    /// The engine no longer cares about this socket
    ///
    /// Not a close: teardown arrives separately through the close
    /// request. Hosts treat this as informational.
    Stop,
}

impl Interest {
    /// Whether this interest includes readability
    #[must_use]
    pub fn wants_read(&self) -> bool {
        matches!(self, Self::Read | Self::Both)
    }

    /// Whether this interest includes writability
    #[must_use]
    pub fn wants_write(&self) -> bool {
        matches!(self, Self::Write | Self::Both)
    }
}

/// Readiness bits reported back to the engine for one socket
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Readiness {
    pub readable: bool,
    pub writable: bool,
    /// The wait itself failed at the reactor level; the engine should
    /// fail the affected transfer through its normal path
    pub error: bool,
}

impl Readiness {
    /// Readability only
    #[must_use]
    pub fn readable() -> Self {
        Self {
            readable: true,
            ..Self::default()
        }
    }

    /// Writability only
    #[must_use]
    pub fn writable() -> Self {
        Self {
            writable: true,
            ..Self::default()
        }
    }
}

/// Why the action-processing entry point is being called
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wakeup {
    /// The polling deadline expired
    Deadline,
    /// A watched socket became ready (or its wait failed)
    Socket {
        socket: SocketId,
        readiness: Readiness,
    },
}

/// One finished transfer, reported at drain time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finished {
    pub token: TransferToken,
    pub status: TransferStatus,
}

/// The host surface an engine calls back into
///
/// Implemented by the bridge. Every method may be invoked synchronously
/// from inside any [`TransferEngine`] entry point.
pub trait EngineHost {
    /// The engine wants a socket opened
    ///
    /// `None` tells the engine the open was refused (unsupported family
    /// or creation failure); the engine then fails the transfer through
    /// its own completion path.
    fn open_socket(&mut self, request: SocketRequest) -> Option<SocketId>;

    /// The engine is done with a socket; returns whether it was known
    fn close_socket(&mut self, socket: SocketId) -> bool;

    /// The engine's readiness interest in a socket changed
    fn update_interest(&mut self, socket: SocketId, interest: Interest);

    /// The engine wants to be polled after `deadline`, or never
    /// (`None` cancels any pending poll)
    fn set_deadline(&mut self, deadline: Option<Duration>);
}

/// A socket-driven transfer multiplexing engine
///
/// One value of this trait is one multiplexing context: it owns the
/// engine-side state for every transfer it is tracking. The bridge owns
/// the value exclusively and calls it only from its serialization
/// domain, so implementations need `Send` but not `Sync`.
pub trait TransferEngine: Send {
    /// Start tracking a configured transfer
    ///
    /// May synchronously call back into `host`. Any status other than
    /// [`EngineStatus::Ok`] means the transfer was not admitted.
    fn begin_tracking(&mut self, token: TransferToken, host: &mut dyn EngineHost) -> EngineStatus;

    /// Stop tracking a transfer
    ///
    /// Called on every terminal transition: normal completion,
    /// cancellation, and abort. May synchronously call back into `host`
    /// (closing sockets the transfer was using).
    fn stop_tracking(&mut self, token: TransferToken, host: &mut dyn EngineHost);

    /// Advance transfers in response to a wakeup
    ///
    /// Returns the number of transfers still running, or the
    /// engine-fatal status that invalidated the multiplexing context.
    fn perform(&mut self, wakeup: Wakeup, host: &mut dyn EngineHost) -> Result<u32, EngineStatus>;

    /// Pop the next finished transfer, if any
    fn next_finished(&mut self) -> Option<Finished>;
}
