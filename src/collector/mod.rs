//! Signal sampling for the Wi-Fi fingerprint agent.
//!
//! A sampler wraps the platform's wireless scan. The engine subscribes a
//! channel, then asks for one scan at a time; every `start_scan` call results
//! in exactly one [`ScanReport`] on that channel, tagged with the generation of
//! the cycle that asked for it.

pub mod scripted;
pub mod types;

#[cfg(target_os = "linux")]
pub mod linux;

#[cfg(not(target_os = "linux"))]
pub mod noop;

use crossbeam_channel::Sender;

// Re-export commonly used types
pub use scripted::ScriptedSampler;
pub use types::{EmitterId, ScanReport, SignalReading};

#[cfg(target_os = "linux")]
pub use linux::IwScanner;

/// Platform-agnostic scanner type alias
#[cfg(target_os = "linux")]
pub type Collector = IwScanner;

#[cfg(not(target_os = "linux"))]
pub use noop::NoopScanner;

/// Platform-agnostic scanner type alias
#[cfg(not(target_os = "linux"))]
pub type Collector = NoopScanner;

/// A source of wireless scans.
///
/// Implementations must never fail a scan outright: a scan that could not run
/// or saw nothing is reported as an empty [`ScanReport`].
pub trait ScanSampler: Send {
    /// Attach the channel scan reports are delivered on.
    fn subscribe(&mut self, sink: Sender<ScanReport>);

    /// Detach the report channel. Scans already in flight may still report.
    fn unsubscribe(&mut self);

    /// Start one scan asynchronously on behalf of cycle `generation`.
    fn start_scan(&mut self, generation: u64);
}

/// Errors raised inside a scan backend.
///
/// These never leave the sampler; they are logged and the scan is reported
/// as empty.
#[derive(Debug)]
pub enum CollectorError {
    /// The scan subprocess could not be spawned
    Process(String),
    /// The scan backend ran but reported failure
    ScanFailed(String),
}

impl std::fmt::Display for CollectorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectorError::Process(msg) => write!(f, "Scan process error: {msg}"),
            CollectorError::ScanFailed(msg) => write!(f, "Scan failed: {msg}"),
        }
    }
}

impl std::error::Error for CollectorError {}
