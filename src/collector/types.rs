//! Scan event types for the Wi-Fi fingerprint agent.
//!
//! These types carry ONLY emitter identifiers and received signal strength -
//! never network names, payloads, or anything sent over the air.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of one emitter (the BSSID of an access point).
///
/// Identifiers are normalised to lower case so the same access point reported
/// by different scan backends maps to a single key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmitterId(String);

impl EmitterId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(id.as_ref().trim().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EmitterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EmitterId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// One emitter seen in one scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalReading {
    pub emitter: EmitterId,
    /// Received signal strength in dBm (typically negative)
    pub strength: i32,
}

impl SignalReading {
    pub fn new(emitter: impl Into<EmitterId>, strength: i32) -> Self {
        Self {
            emitter: emitter.into(),
            strength,
        }
    }
}

/// The result of a single scan, delivered exactly once per `start_scan`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    /// Generation of the polling cycle that requested this scan
    pub generation: u64,
    /// Readings observed; empty when nothing was visible or the scan failed
    pub readings: Vec<SignalReading>,
    /// When the scan completed
    pub completed_at: DateTime<Utc>,
}

impl ScanReport {
    pub fn new(generation: u64, readings: Vec<SignalReading>) -> Self {
        Self {
            generation,
            readings,
            completed_at: Utc::now(),
        }
    }

    /// A report for a scan that saw nothing (or failed).
    pub fn empty(generation: u64) -> Self {
        Self::new(generation, Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}
