//! Flowmux bridge: callback-driven transfer engines on the tokio reactor
//!
//! A transfer engine (see `flowmux_common`) multiplexes many concurrent
//! transfers but has no event loop: it announces which sockets it wants
//! watched and when it wants to be polled, and expects to be called back
//! when either happens. This crate supplies that loop on top of tokio:
//!
//! 1. [`Multiplexer::start`] hands a configured transfer to the engine.
//!    The engine synchronously requests sockets and a polling deadline.
//! 2. Socket readiness (via `AsyncFd`) and the deadline (one reactor
//!    timer) drive the engine's action entry point.
//! 3. Finished transfers are drained after every action call and each
//!    one resolves its caller's [`CompletionHandler`] exactly once,
//!    whether by completion, cancellation, engine failure, or teardown.
//!
//! All engine state lives on one pump task, so callbacks never race even
//! on a multi-threaded runtime. `start`/`cancel` can be called from any
//! thread; they funnel commands into the pump.
//!
//! Unix-only: readiness bridging works on raw file descriptors.

mod bridge;
mod completion;
mod multiplexer;
mod socket;
mod timer;

pub use completion::CompletionHandler;
pub use multiplexer::{Multiplexer, MultiplexerError};
