//! Completion outcomes delivered to transfer handlers
//!
//! Every admitted (or refused) transfer resolves to exactly one of these.
//! Cancellation is its own variant, never folded into a failure code, so
//! callers can tell "I asked for this" apart from "it broke".

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::status::{EngineStatus, TransferStatus};

/// The one-shot result delivered to a transfer's completion handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TransferOutcome {
    /// The engine finished the transfer and reported its result
    ///
    /// Covers success (`TransferStatus::Ok`) and per-transfer failures
    /// alike; other transfers are unaffected either way.
    Finished { status: TransferStatus },

    /// The engine refused to begin tracking the transfer
    Rejected { status: EngineStatus },

    /// An engine entry point failed, invalidating every tracked transfer
    ///
    /// All transfers in flight at that moment resolve with the same
    /// status; the failure belongs to the engine, not to any one
    /// transfer.
    EngineFailed { status: EngineStatus },

    /// The caller cancelled this transfer
    Cancelled,

    /// The multiplexer was torn down while the transfer was in flight
    Aborted,
}

impl TransferOutcome {
    /// Whether the transfer ran to successful completion
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Finished { status } if status.is_ok())
    }

    /// Whether the transfer ended because the caller asked it to
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Whether the transfer ended because the multiplexer went away
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }

    /// Short category name, for logs
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Finished { .. } => "finished",
            Self::Rejected { .. } => "rejected",
            Self::EngineFailed { .. } => "engine_failed",
            Self::Cancelled => "cancelled",
            Self::Aborted => "aborted",
        }
    }
}

impl fmt::Display for TransferOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Finished { status } => write!(f, "finished ({status})"),
            Self::Rejected { status } => write!(f, "rejected ({status})"),
            Self::EngineFailed { status } => write!(f, "engine failed ({status})"),
            Self::Cancelled => f.write_str("cancelled"),
            Self::Aborted => f.write_str("aborted"),
        }
    }
}
