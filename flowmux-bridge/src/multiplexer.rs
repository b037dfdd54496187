//! The transfer multiplexer: engine callbacks bridged onto the reactor
//!
//! One `Multiplexer` owns one engine multiplexing context and runs one
//! event pump task. The pump is the serialization domain: every mutation
//! of the transfer table, the socket registry, and the timer happens on
//! it, strictly one event at a time, even when the runtime itself is
//! multi-threaded.
//!
//! **Flow:**
//! 1. A caller starts a transfer; the admission command is funneled into
//!    the pump, which asks the engine to begin tracking it. The engine
//!    may synchronously open sockets and set a polling deadline from
//!    inside that call.
//! 2. Readiness waits and the deadline resolve as pump events. Each one
//!    is fed to the engine's action entry point, which advances
//!    transfers and may adjust sockets, interest, and the deadline again.
//! 3. After every action call the pump drains finished transfers from
//!    the engine and resolves their completion handlers. Terminal
//!    transitions always unregister the token from the engine, whichever
//!    way the transfer ended.
//!
//! Reentrancy discipline: entries leave the table *before* anything
//! observable runs (engine unregistration, completion posting), so a
//! continuation that immediately starts or cancels transfers finds the
//! table already consistent.

use std::collections::HashMap;
use std::time::Instant;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace, warn};

use flowmux_common::{
    EngineStatus, Readiness, TransferEngine, TransferOutcome, TransferToken, Wakeup,
};

use crate::bridge::EngineBridge;
use crate::completion::CompletionHandler;
use crate::socket::{Direction, ReadyEvent};

/// Errors surfaced by the public multiplexer operations
#[derive(Debug, Error)]
pub enum MultiplexerError {
    /// The multiplexer's event pump has shut down
    #[error("multiplexer is shut down")]
    Closed,
}

/// One admitted transfer awaiting completion
///
/// The handler leaves this struct (and this struct leaves the table)
/// exactly once; that move is the double-completion guard.
struct PendingTransfer {
    handler: CompletionHandler,
    admitted_at: Instant,
}

enum Command {
    Start {
        token: TransferToken,
        handler: CompletionHandler,
    },
    Cancel {
        token: TransferToken,
        reply: oneshot::Sender<bool>,
    },
    CancelAll {
        reply: oneshot::Sender<usize>,
    },
    ActiveCount {
        reply: oneshot::Sender<usize>,
    },
}

/// Handle to a running transfer multiplexer
///
/// Deliberately not `Clone`: dropping the handle is the teardown signal
/// (every in-flight transfer resolves with [`TransferOutcome::Aborted`]
/// before the engine context is released). Share it behind an `Arc` when
/// several tasks need it; all operations take `&self`.
#[derive(Debug)]
pub struct Multiplexer {
    commands: mpsc::UnboundedSender<Command>,
}

impl Multiplexer {
    /// Spawn the event pump around an engine multiplexing context
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn new<E>(engine: E) -> Self
    where
        E: TransferEngine + 'static,
    {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let core = MuxCore {
            engine,
            bridge: EngineBridge::new(event_tx),
            transfers: HashMap::new(),
            commands: command_rx,
            events: event_rx,
        };
        tokio::spawn(core.run());
        Self { commands }
    }

    /// Start a transfer; completion arrives only through the handler
    ///
    /// Returns as soon as the admission command is queued. If the engine
    /// refuses to track the token, or a transfer with the same token is
    /// already in flight, the handler resolves with
    /// [`TransferOutcome::Rejected`]. The caller keeps the configured
    /// transfer alive and unmodified until the handler fires.
    ///
    /// On `Err(Closed)` the handler has already been resolved with
    /// [`TransferOutcome::Aborted`]; no completion is silently dropped.
    pub fn start(
        &self,
        token: TransferToken,
        handler: CompletionHandler,
    ) -> Result<(), MultiplexerError> {
        match self.commands.send(Command::Start { token, handler }) {
            Ok(()) => Ok(()),
            Err(mpsc::error::SendError(command)) => {
                if let Command::Start { handler, .. } = command {
                    handler.complete(TransferOutcome::Aborted);
                }
                Err(MultiplexerError::Closed)
            }
        }
    }

    /// Cancel one transfer
    ///
    /// `true` if a transfer with this token was in flight; its handler
    /// resolves with [`TransferOutcome::Cancelled`]. `false` means the
    /// token was unknown (never admitted, already finished, or already
    /// cancelled) and nothing happened.
    pub async fn cancel(&self, token: TransferToken) -> Result<bool, MultiplexerError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Cancel { token, reply })
            .map_err(|_| MultiplexerError::Closed)?;
        rx.await.map_err(|_| MultiplexerError::Closed)
    }

    /// Cancel every in-flight transfer; returns how many there were
    pub async fn cancel_all(&self) -> Result<usize, MultiplexerError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::CancelAll { reply })
            .map_err(|_| MultiplexerError::Closed)?;
        rx.await.map_err(|_| MultiplexerError::Closed)
    }

    /// Number of transfers currently in flight
    pub async fn active_count(&self) -> Result<usize, MultiplexerError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::ActiveCount { reply })
            .map_err(|_| MultiplexerError::Closed)?;
        rx.await.map_err(|_| MultiplexerError::Closed)
    }
}

enum Step {
    Command(Command),
    Ready(ReadyEvent),
    Deadline,
}

/// The event pump state: engine context, bridge, and transfer table
struct MuxCore<E> {
    engine: E,
    bridge: EngineBridge,
    transfers: HashMap<TransferToken, PendingTransfer>,
    commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedReceiver<ReadyEvent>,
}

impl<E: TransferEngine> MuxCore<E> {
    async fn run(mut self) {
        loop {
            let timer_armed = self.bridge.timer.is_armed();
            let step = tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => Step::Command(command),
                    // Every handle is gone; tear down.
                    None => break,
                },
                Some(event) = self.events.recv() => Step::Ready(event),
                () = self.bridge.timer.fired(), if timer_armed => Step::Deadline,
            };
            match step {
                Step::Command(command) => self.handle_command(command),
                Step::Ready(event) => self.handle_ready(event),
                Step::Deadline => self.handle_deadline(),
            }
        }
        self.shutdown();
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Start { token, handler } => self.admit(token, handler),
            Command::Cancel { token, reply } => {
                let found = self.cancel_one(token);
                let _ = reply.send(found);
            }
            Command::CancelAll { reply } => {
                let _ = reply.send(self.cancel_all());
            }
            Command::ActiveCount { reply } => {
                let _ = reply.send(self.transfers.len());
            }
        }
    }

    fn admit(&mut self, token: TransferToken, handler: CompletionHandler) {
        if self.transfers.contains_key(&token) {
            debug!(%token, "admission refused: token already in flight");
            handler.complete(TransferOutcome::Rejected {
                status: EngineStatus::AlreadyTracked,
            });
            return;
        }
        // May synchronously open sockets and set the deadline.
        let status = self.engine.begin_tracking(token, &mut self.bridge);
        if !status.is_ok() {
            debug!(%token, %status, "engine refused to track transfer");
            handler.complete(TransferOutcome::Rejected { status });
            return;
        }
        trace!(%token, "transfer admitted");
        self.transfers.insert(token, PendingTransfer {
            handler,
            admitted_at: Instant::now(),
        });
    }

    fn cancel_one(&mut self, token: TransferToken) -> bool {
        let Some(pending) = self.transfers.remove(&token) else {
            return false;
        };
        self.engine.stop_tracking(token, &mut self.bridge);
        trace!(%token, "transfer cancelled");
        pending.handler.complete(TransferOutcome::Cancelled);
        true
    }

    fn cancel_all(&mut self) -> usize {
        // No transfers means no reason to keep polling.
        self.bridge.timer.clear();
        self.resolve_all(TransferOutcome::Cancelled)
    }

    fn handle_deadline(&mut self) {
        trace!("poll deadline fired");
        match self.engine.perform(Wakeup::Deadline, &mut self.bridge) {
            Ok(still_running) => {
                self.drain_finished();
                if still_running == 0 {
                    self.bridge.timer.clear();
                }
            }
            Err(status) => self.engine_failure(status),
        }
    }

    fn handle_ready(&mut self, event: ReadyEvent) {
        if !self
            .bridge
            .registry
            .acknowledge(event.socket, event.generation, event.direction)
        {
            // Closed (or the descriptor number reused) while the wait
            // was in flight.
            trace!(
                socket = %event.socket,
                direction = event.direction.as_str(),
                "stale readiness event ignored"
            );
            return;
        }

        let readiness = Readiness {
            readable: event.direction == Direction::Read,
            writable: event.direction == Direction::Write,
            error: event.error,
        };
        let wakeup = Wakeup::Socket {
            socket: event.socket,
            readiness,
        };
        match self.engine.perform(wakeup, &mut self.bridge) {
            Ok(still_running) => {
                self.drain_finished();
                if !event.error {
                    // A readiness wait is one-shot; current interest
                    // decides whether a fresh one goes out. Errored
                    // sockets get no new wait.
                    self.bridge.registry.rearm(event.socket);
                }
                if still_running == 0 {
                    self.bridge.timer.clear();
                }
            }
            Err(status) => self.engine_failure(status),
        }
    }

    /// Pull every finished transfer out of the engine and resolve it
    fn drain_finished(&mut self) {
        while let Some(finished) = self.engine.next_finished() {
            let Some(pending) = self.transfers.remove(&finished.token) else {
                // Already accounted for (e.g. cancelled earlier in this
                // same pump run).
                continue;
            };
            self.engine.stop_tracking(finished.token, &mut self.bridge);
            trace!(
                token = %finished.token,
                status = %finished.status,
                elapsed_ms = pending.admitted_at.elapsed().as_millis() as u64,
                "transfer finished"
            );
            pending.handler.complete(TransferOutcome::Finished {
                status: finished.status,
            });
        }
    }

    /// An engine entry point failed: its multiplexing state is no longer
    /// trustworthy, so every tracked transfer resolves with the error
    fn engine_failure(&mut self, status: EngineStatus) {
        warn!(
            %status,
            transfers = self.transfers.len(),
            sockets = self.bridge.registry.len(),
            "engine entry point failed; failing all tracked transfers"
        );
        self.bridge.timer.clear();
        self.resolve_all(TransferOutcome::EngineFailed { status });
    }

    /// Resolve every pending transfer with the same outcome
    fn resolve_all(&mut self, outcome: TransferOutcome) -> usize {
        let drained: Vec<_> = self.transfers.drain().collect();
        let count = drained.len();
        for (token, pending) in drained {
            self.engine.stop_tracking(token, &mut self.bridge);
            pending.handler.complete(outcome);
        }
        count
    }

    /// Teardown: abort survivors, then let the engine context drop
    fn shutdown(&mut self) {
        self.bridge.timer.clear();
        let aborted = self.resolve_all(TransferOutcome::Aborted);
        if aborted > 0 {
            debug!(aborted, "multiplexer shut down with transfers in flight");
        }
    }
}
