//! Machine-readable status codes for the engine contract
//!
//! The engine reports results at two levels: multiplexing-level codes
//! (`EngineStatus`, returned by the tracking and action-processing entry
//! points) and per-transfer codes (`TransferStatus`, reported for each
//! finished transfer at drain time). Both serialize to stable snake_case
//! strings so they can appear in logs and monitoring payloads unchanged.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Multiplexing-level result codes
///
/// These describe the health of an engine call, not of any single
/// transfer. Anything other than `Ok` from the action-processing entry
/// point means the engine's multiplexing state can no longer be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineStatus {
    /// Call succeeded
    Ok,

    /// The multiplexing handle itself is invalid
    BadHandle,

    /// The transfer token is unknown to the engine or otherwise unusable
    BadToken,

    /// The socket passed to the action entry point is not one the
    /// engine is tracking
    BadSocket,

    /// The engine could not allocate internal resources
    OutOfMemory,

    /// The transfer token is already being tracked
    ///
    /// Admitting the same token twice is refused rather than undefined.
    AlreadyTracked,

    /// An option or mode the engine does not understand
    UnknownOption,

    /// An internal engine bug surfaced; treated as fatal
    InternalError,
}

impl EngineStatus {
    /// Convert to the string representation used in logs and payloads
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::BadHandle => "bad_handle",
            Self::BadToken => "bad_token",
            Self::BadSocket => "bad_socket",
            Self::OutOfMemory => "out_of_memory",
            Self::AlreadyTracked => "already_tracked",
            Self::UnknownOption => "unknown_option",
            Self::InternalError => "internal_error",
        }
    }

    /// Parse from the string representation
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ok" => Some(Self::Ok),
            "bad_handle" => Some(Self::BadHandle),
            "bad_token" => Some(Self::BadToken),
            "bad_socket" => Some(Self::BadSocket),
            "out_of_memory" => Some(Self::OutOfMemory),
            "already_tracked" => Some(Self::AlreadyTracked),
            "unknown_option" => Some(Self::UnknownOption),
            "internal_error" => Some(Self::InternalError),
            _ => None,
        }
    }

    /// Whether this code means the call succeeded
    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<EngineStatus> for String {
    fn from(status: EngineStatus) -> Self {
        status.as_str().to_string()
    }
}

/// Per-transfer result codes
///
/// Reported by the engine for one finished transfer. A non-`Ok` code
/// affects only that transfer; other in-flight transfers continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    /// Transfer completed successfully
    Ok,

    /// The transfer's URL scheme is not supported by the engine
    UnsupportedScheme,

    /// Host name resolution failed
    ResolveFailed,

    /// The remote endpoint could not be connected
    ConnectFailed,

    /// The transfer exceeded the engine's configured time budget
    TimedOut,

    /// Sending request data failed mid-transfer
    SendFailed,

    /// Receiving response data failed mid-transfer
    RecvFailed,

    /// The connection closed before the advertised body was complete
    PartialTransfer,

    /// The remote spoke the protocol incorrectly
    ProtocolError,

    /// The remote refused the request (authentication, access denied)
    RemoteRefused,

    /// The engine could not allocate transfer resources
    OutOfMemory,

    /// An internal engine bug surfaced while running this transfer
    InternalError,
}

impl TransferStatus {
    /// Convert to the string representation used in logs and payloads
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::UnsupportedScheme => "unsupported_scheme",
            Self::ResolveFailed => "resolve_failed",
            Self::ConnectFailed => "connect_failed",
            Self::TimedOut => "timed_out",
            Self::SendFailed => "send_failed",
            Self::RecvFailed => "recv_failed",
            Self::PartialTransfer => "partial_transfer",
            Self::ProtocolError => "protocol_error",
            Self::RemoteRefused => "remote_refused",
            Self::OutOfMemory => "out_of_memory",
            Self::InternalError => "internal_error",
        }
    }

    /// Parse from the string representation
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ok" => Some(Self::Ok),
            "unsupported_scheme" => Some(Self::UnsupportedScheme),
            "resolve_failed" => Some(Self::ResolveFailed),
            "connect_failed" => Some(Self::ConnectFailed),
            "timed_out" => Some(Self::TimedOut),
            "send_failed" => Some(Self::SendFailed),
            "recv_failed" => Some(Self::RecvFailed),
            "partial_transfer" => Some(Self::PartialTransfer),
            "protocol_error" => Some(Self::ProtocolError),
            "remote_refused" => Some(Self::RemoteRefused),
            "out_of_memory" => Some(Self::OutOfMemory),
            "internal_error" => Some(Self::InternalError),
            _ => None,
        }
    }

    /// Whether this code means the transfer succeeded
    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<TransferStatus> for String {
    fn from(status: TransferStatus) -> Self {
        status.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_ENGINE: &[EngineStatus] = &[
        EngineStatus::Ok,
        EngineStatus::BadHandle,
        EngineStatus::BadToken,
        EngineStatus::BadSocket,
        EngineStatus::OutOfMemory,
        EngineStatus::AlreadyTracked,
        EngineStatus::UnknownOption,
        EngineStatus::InternalError,
    ];

    const ALL_TRANSFER: &[TransferStatus] = &[
        TransferStatus::Ok,
        TransferStatus::UnsupportedScheme,
        TransferStatus::ResolveFailed,
        TransferStatus::ConnectFailed,
        TransferStatus::TimedOut,
        TransferStatus::SendFailed,
        TransferStatus::RecvFailed,
        TransferStatus::PartialTransfer,
        TransferStatus::ProtocolError,
        TransferStatus::RemoteRefused,
        TransferStatus::OutOfMemory,
        TransferStatus::InternalError,
    ];

    #[test]
    fn test_engine_status_roundtrip() {
        for status in ALL_ENGINE {
            assert_eq!(EngineStatus::parse(status.as_str()), Some(*status));
        }
    }

    #[test]
    fn test_transfer_status_roundtrip() {
        for status in ALL_TRANSFER {
            assert_eq!(TransferStatus::parse(status.as_str()), Some(*status));
        }
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert_eq!(EngineStatus::parse("unknown"), None);
        assert_eq!(EngineStatus::parse(""), None);
        assert_eq!(TransferStatus::parse("unknown"), None);
        assert_eq!(TransferStatus::parse(""), None);
    }

    #[test]
    fn test_is_ok() {
        assert!(EngineStatus::Ok.is_ok());
        assert!(TransferStatus::Ok.is_ok());
        for status in ALL_ENGINE.iter().skip(1) {
            assert!(!status.is_ok(), "{status} should not be ok");
        }
        for status in ALL_TRANSFER.iter().skip(1) {
            assert!(!status.is_ok(), "{status} should not be ok");
        }
    }

    #[test]
    fn test_display_matches_as_str() {
        assert_eq!(format!("{}", EngineStatus::AlreadyTracked), "already_tracked");
        assert_eq!(format!("{}", TransferStatus::PartialTransfer), "partial_transfer");
    }

    #[test]
    fn test_into_string() {
        let s: String = EngineStatus::BadToken.into();
        assert_eq!(s, "bad_token");
        let s: String = TransferStatus::TimedOut.into();
        assert_eq!(s, "timed_out");
    }

    #[test]
    fn test_serde_matches_as_str() {
        // The serde rename and as_str must agree so serialized payloads
        // and log strings are the same vocabulary.
        for status in ALL_ENGINE {
            let json = serde_json::to_string(status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
        for status in ALL_TRANSFER {
            let json = serde_json::to_string(status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }
}
