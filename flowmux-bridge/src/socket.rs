//! Socket registry: native sockets opened on the engine's behalf
//!
//! The engine asks for sockets by family/type/protocol and afterwards
//! names them only by raw descriptor. The registry owns the descriptors,
//! registers them with the runtime for readiness, and arms one wait task
//! per watched direction. Wait completions are delivered to the
//! multiplexer's event pump as [`ReadyEvent`]s and are re-validated there
//! against the registry: a socket can be closed by the engine while a
//! wait is still in flight, and such stale events must dissolve silently.
//!
//! Each entry carries a generation number. The OS reuses descriptor
//! numbers, so an event is only acknowledged when both the descriptor and
//! the generation match the live entry.
//!
//! Only IPv4 stream sockets are supported. Everything else is refused at
//! open time so the engine fails the transfer through its normal path
//! instead of limping along on a half-supported transport.

use std::collections::HashMap;
use std::net::Shutdown;
use std::os::fd::AsRawFd;
use std::sync::Arc;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::io::unix::AsyncFd;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use flowmux_common::{AddressFamily, Interest, SocketId, SocketKind, SocketRequest};

/// Which readiness direction a wait was armed for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    Read,
    Write,
}

impl Direction {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

/// A completed readiness wait, delivered to the event pump
#[derive(Debug, Clone, Copy)]
pub(crate) struct ReadyEvent {
    pub socket: SocketId,
    pub generation: u64,
    pub direction: Direction,
    /// The wait failed at the reactor level rather than becoming ready
    pub error: bool,
}

/// One native socket the registry owns for the engine
struct SocketEntry {
    io: Arc<AsyncFd<Socket>>,
    generation: u64,
    want_read: bool,
    want_write: bool,
    read_wait: Option<JoinHandle<()>>,
    write_wait: Option<JoinHandle<()>>,
}

/// Owns every socket the engine has open and their readiness waits
pub(crate) struct SocketRegistry {
    entries: HashMap<SocketId, SocketEntry>,
    events: mpsc::UnboundedSender<ReadyEvent>,
    next_generation: u64,
}

impl SocketRegistry {
    pub(crate) fn new(events: mpsc::UnboundedSender<ReadyEvent>) -> Self {
        Self {
            entries: HashMap::new(),
            events,
            next_generation: 0,
        }
    }

    /// Open a native socket for the engine
    ///
    /// Returns `None` for unsupported requests and creation failures;
    /// the engine turns that into a per-transfer failure on its own.
    pub(crate) fn open(&mut self, request: SocketRequest) -> Option<SocketId> {
        if request.family != AddressFamily::V4 || request.kind != SocketKind::Stream {
            debug!(?request, "refusing socket open: only IPv4 stream sockets are supported");
            return None;
        }
        let protocol = (request.protocol != 0).then(|| Protocol::from(request.protocol));
        let socket = match Socket::new(Domain::IPV4, Type::STREAM, protocol) {
            Ok(socket) => socket,
            Err(err) => {
                debug!(%err, "native socket creation failed");
                return None;
            }
        };
        if let Err(err) = socket.set_nonblocking(true) {
            debug!(%err, "could not make engine socket non-blocking");
            return None;
        }
        let id = SocketId::new(socket.as_raw_fd());
        let io = match AsyncFd::new(socket) {
            Ok(io) => io,
            Err(err) => {
                debug!(%err, "reactor registration failed for engine socket");
                return None;
            }
        };

        let generation = self.next_generation;
        self.next_generation += 1;
        self.entries.insert(id, SocketEntry {
            io: Arc::new(io),
            generation,
            want_read: false,
            want_write: false,
            read_wait: None,
            write_wait: None,
        });
        trace!(%id, "socket opened for engine");
        Some(id)
    }

    /// Close a socket the engine is done with
    ///
    /// The entry is removed first, then both directions are shut down
    /// *before* the descriptor is released: a pending readiness wait on a
    /// connected socket wakes from the shutdown now, instead of racing
    /// the close. Waits that cannot be woken that way (never-connected
    /// sockets) are aborted outright.
    pub(crate) fn close(&mut self, id: SocketId) -> bool {
        let Some(mut entry) = self.entries.remove(&id) else {
            return false;
        };
        let _ = entry.io.get_ref().shutdown(Shutdown::Both);
        if let Some(wait) = entry.read_wait.take() {
            wait.abort();
        }
        if let Some(wait) = entry.write_wait.take() {
            wait.abort();
        }
        trace!(%id, "socket closed for engine");
        true
    }

    /// Record the engine's interest in a socket and arm missing waits
    ///
    /// Arms a wait only for a wanted direction that has none outstanding;
    /// the reactor forbids double-issuing. `Stop` is informational:
    /// teardown arrives via [`SocketRegistry::close`].
    pub(crate) fn update_interest(&mut self, id: SocketId, interest: Interest) {
        if matches!(interest, Interest::Stop) {
            return;
        }
        let Some(entry) = self.entries.get_mut(&id) else {
            return;
        };
        entry.want_read = interest.wants_read();
        entry.want_write = interest.wants_write();
        Self::arm(&self.events, id, entry);
    }

    /// Validate an event against the live entry and retire its wait slot
    ///
    /// `false` means the event is stale: the socket was closed (or the
    /// descriptor number reused) while the wait was in flight, or no
    /// wait is outstanding for that direction. The caller must treat a
    /// stale event as if it never happened.
    pub(crate) fn acknowledge(
        &mut self,
        socket: SocketId,
        generation: u64,
        direction: Direction,
    ) -> bool {
        let Some(entry) = self.entries.get_mut(&socket) else {
            return false;
        };
        if entry.generation != generation {
            return false;
        }
        let slot = match direction {
            Direction::Read => &mut entry.read_wait,
            Direction::Write => &mut entry.write_wait,
        };
        slot.take().is_some()
    }

    /// Re-arm waits for directions the engine still wants
    ///
    /// Called after a readiness event has been consumed. A readiness wait
    /// is one-shot; current interest decides whether a fresh one goes
    /// out.
    pub(crate) fn rearm(&mut self, socket: SocketId) {
        if let Some(entry) = self.entries.get_mut(&socket) {
            Self::arm(&self.events, socket, entry);
        }
    }

    /// Number of sockets currently open for the engine
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    fn arm(events: &mpsc::UnboundedSender<ReadyEvent>, id: SocketId, entry: &mut SocketEntry) {
        if entry.want_read && entry.read_wait.is_none() {
            entry.read_wait = Some(Self::spawn_wait(
                events.clone(),
                Arc::clone(&entry.io),
                id,
                entry.generation,
                Direction::Read,
            ));
        }
        if entry.want_write && entry.write_wait.is_none() {
            entry.write_wait = Some(Self::spawn_wait(
                events.clone(),
                Arc::clone(&entry.io),
                id,
                entry.generation,
                Direction::Write,
            ));
        }
    }

    fn spawn_wait(
        events: mpsc::UnboundedSender<ReadyEvent>,
        io: Arc<AsyncFd<Socket>>,
        socket: SocketId,
        generation: u64,
        direction: Direction,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let error = match direction {
                Direction::Read => match io.readable().await {
                    Ok(mut guard) => {
                        guard.clear_ready();
                        false
                    }
                    Err(err) => {
                        debug!(%socket, %err, "read wait failed");
                        true
                    }
                },
                Direction::Write => match io.writable().await {
                    Ok(mut guard) => {
                        guard.clear_ready();
                        false
                    }
                    Err(err) => {
                        debug!(%socket, %err, "write wait failed");
                        true
                    }
                },
            };
            // The pump may be gone during shutdown; nothing to do then.
            let _ = events.send(ReadyEvent {
                socket,
                generation,
                direction,
                error,
            });
        })
    }
}

impl Drop for SocketRegistry {
    fn drop(&mut self) {
        for (_, mut entry) in self.entries.drain() {
            let _ = entry.io.get_ref().shutdown(Shutdown::Both);
            if let Some(wait) = entry.read_wait.take() {
                wait.abort();
            }
            if let Some(wait) = entry.write_wait.take() {
                wait.abort();
            }
        }
    }
}
