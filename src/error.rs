//! Error type shared by the polling engine, dispatcher and transports.

use std::fmt;

/// Everything that can end a polling cycle without a result.
///
/// None of these are fatal: after any of them the engine is idle and ready
/// for a new cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Bad cycle parameters
    InvalidArgument(String),
    /// A cycle is already polling or finalizing
    AlreadyInProgress,
    /// The sampler did not report within the scan timeout
    ScanTimeout {
        polls_completed: u32,
        polls_requested: u32,
    },
    /// The server answered with an `error` field
    Rejected(String),
    /// The server response was malformed or missing required fields
    Protocol(String),
    /// Network or I/O failure in the transport
    Transport(String),
}

impl EngineError {
    /// Short machine-readable name of the failure kind.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::InvalidArgument(_) => "invalid_argument",
            EngineError::AlreadyInProgress => "already_in_progress",
            EngineError::ScanTimeout { .. } => "scan_timeout",
            EngineError::Rejected(_) => "rejected",
            EngineError::Protocol(_) => "protocol_error",
            EngineError::Transport(_) => "transport_failure",
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::InvalidArgument(msg) => write!(f, "Invalid argument: {msg}"),
            EngineError::AlreadyInProgress => write!(f, "A scan cycle is already in progress"),
            EngineError::ScanTimeout {
                polls_completed,
                polls_requested,
            } => write!(
                f,
                "Scan timed out after {polls_completed} of {polls_requested} polls"
            ),
            EngineError::Rejected(msg) => write!(f, "Server rejected fingerprint: {msg}"),
            EngineError::Protocol(msg) => write!(f, "Protocol error: {msg}"),
            EngineError::Transport(msg) => write!(f, "Transport failure: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}
