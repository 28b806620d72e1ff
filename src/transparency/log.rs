//! Privacy-preserving transparency log.
//!
//! This module tracks and exposes statistics about what the agent scanned and
//! what it sent, without storing any emitter identifiers or locations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Transparency statistics for the current session.
#[derive(Debug)]
pub struct TransparencyLog {
    /// Number of scans requested from the sampler
    scans_requested: AtomicU64,
    /// Number of scan reports recorded
    scans_completed: AtomicU64,
    /// Number of individual emitter readings recorded
    readings_recorded: AtomicU64,
    /// Number of fingerprints accepted as ground truth
    fingerprints_uploaded: AtomicU64,
    /// Number of query fingerprints that resolved to a location
    locations_resolved: AtomicU64,
    /// Number of dispatches that ended in failure
    dispatch_failures: AtomicU64,
    /// Number of cycles cancelled or timed out
    cycles_aborted: AtomicU64,
    /// Session start time
    session_start: DateTime<Utc>,
    /// Path for persisting stats
    persist_path: Option<PathBuf>,
}

impl TransparencyLog {
    /// Create a new transparency log.
    pub fn new() -> Self {
        Self {
            scans_requested: AtomicU64::new(0),
            scans_completed: AtomicU64::new(0),
            readings_recorded: AtomicU64::new(0),
            fingerprints_uploaded: AtomicU64::new(0),
            locations_resolved: AtomicU64::new(0),
            dispatch_failures: AtomicU64::new(0),
            cycles_aborted: AtomicU64::new(0),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create a transparency log with persistence.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        // Try to load existing stats
        if let Err(e) = log.load() {
            tracing::debug!("Could not load previous transparency stats: {e}");
        }

        log
    }

    pub fn record_scan_requested(&self) {
        self.scans_requested.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed scan and the number of readings it carried.
    pub fn record_scan_completed(&self, readings: usize) {
        self.scans_completed.fetch_add(1, Ordering::Relaxed);
        self.readings_recorded
            .fetch_add(readings as u64, Ordering::Relaxed);
    }

    pub fn record_fingerprint_uploaded(&self) {
        self.fingerprints_uploaded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_location_resolved(&self) {
        self.locations_resolved.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dispatch_failure(&self) {
        self.dispatch_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cycle_aborted(&self) {
        self.cycles_aborted.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn stats(&self) -> TransparencyStats {
        TransparencyStats {
            scans_requested: self.scans_requested.load(Ordering::Relaxed),
            scans_completed: self.scans_completed.load(Ordering::Relaxed),
            readings_recorded: self.readings_recorded.load(Ordering::Relaxed),
            fingerprints_uploaded: self.fingerprints_uploaded.load(Ordering::Relaxed),
            locations_resolved: self.locations_resolved.load(Ordering::Relaxed),
            dispatch_failures: self.dispatch_failures.load(Ordering::Relaxed),
            cycles_aborted: self.cycles_aborted.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds() as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Session Statistics:\n\
             - Scans requested: {}\n\
             - Scans completed: {}\n\
             - Signal readings recorded: {}\n\
             - Fingerprints uploaded: {}\n\
             - Locations resolved: {}\n\
             - Dispatch failures: {}\n\
             - Cycles aborted: {}\n\
             - Session duration: {} seconds\n\
             \n\
             Privacy Guarantee:\n\
             - No network names captured\n\
             - No traffic or payload captured\n\
             - Only access point addresses and signal strength retained",
            stats.scans_requested,
            stats.scans_completed,
            stats.readings_recorded,
            stats.fingerprints_uploaded,
            stats.locations_resolved,
            stats.dispatch_failures,
            stats.cycles_aborted,
            stats.session_duration_secs
        )
    }

    /// Save stats to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            // Ensure parent directory exists
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedStats {
                scans_requested: stats.scans_requested,
                scans_completed: stats.scans_completed,
                readings_recorded: stats.readings_recorded,
                fingerprints_uploaded: stats.fingerprints_uploaded,
                locations_resolved: stats.locations_resolved,
                dispatch_failures: stats.dispatch_failures,
                cycles_aborted: stats.cycles_aborted,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;

            std::fs::write(path, json)?;
        }
        Ok(())
    }

    /// Load stats from disk.
    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.scans_requested
                    .store(persisted.scans_requested, Ordering::Relaxed);
                self.scans_completed
                    .store(persisted.scans_completed, Ordering::Relaxed);
                self.readings_recorded
                    .store(persisted.readings_recorded, Ordering::Relaxed);
                self.fingerprints_uploaded
                    .store(persisted.fingerprints_uploaded, Ordering::Relaxed);
                self.locations_resolved
                    .store(persisted.locations_resolved, Ordering::Relaxed);
                self.dispatch_failures
                    .store(persisted.dispatch_failures, Ordering::Relaxed);
                self.cycles_aborted
                    .store(persisted.cycles_aborted, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    /// Reset all counters.
    pub fn reset(&self) {
        self.scans_requested.store(0, Ordering::Relaxed);
        self.scans_completed.store(0, Ordering::Relaxed);
        self.readings_recorded.store(0, Ordering::Relaxed);
        self.fingerprints_uploaded.store(0, Ordering::Relaxed);
        self.locations_resolved.store(0, Ordering::Relaxed);
        self.dispatch_failures.store(0, Ordering::Relaxed);
        self.cycles_aborted.store(0, Ordering::Relaxed);
    }
}

impl Default for TransparencyLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of transparency statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransparencyStats {
    pub scans_requested: u64,
    pub scans_completed: u64,
    pub readings_recorded: u64,
    pub fingerprints_uploaded: u64,
    pub locations_resolved: u64,
    pub dispatch_failures: u64,
    pub cycles_aborted: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

/// Stats format for persistence.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    scans_requested: u64,
    scans_completed: u64,
    readings_recorded: u64,
    fingerprints_uploaded: u64,
    locations_resolved: u64,
    dispatch_failures: u64,
    cycles_aborted: u64,
    last_updated: DateTime<Utc>,
}

/// Thread-safe shared transparency log.
pub type SharedTransparencyLog = Arc<TransparencyLog>;

/// Create a new shared transparency log.
pub fn create_shared_log() -> SharedTransparencyLog {
    Arc::new(TransparencyLog::new())
}

/// Create a new shared transparency log with persistence.
pub fn create_shared_log_with_persistence(path: PathBuf) -> SharedTransparencyLog {
    Arc::new(TransparencyLog::with_persistence(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transparency_log_counting() {
        let log = TransparencyLog::new();

        log.record_scan_requested();
        log.record_scan_requested();
        log.record_scan_completed(4);
        log.record_scan_completed(0);
        log.record_location_resolved();

        let stats = log.stats();
        assert_eq!(stats.scans_requested, 2);
        assert_eq!(stats.scans_completed, 2);
        assert_eq!(stats.readings_recorded, 4);
        assert_eq!(stats.locations_resolved, 1);
    }

    #[test]
    fn test_transparency_log_reset() {
        let log = TransparencyLog::new();

        log.record_scan_completed(100);
        log.record_dispatch_failure();
        log.reset();

        let stats = log.stats();
        assert_eq!(stats.readings_recorded, 0);
        assert_eq!(stats.dispatch_failures, 0);
    }

    #[test]
    fn test_persistence_round_trip() {
        let path = std::env::temp_dir()
            .join(format!("wifi-fingerprint-transparency-{}", uuid::Uuid::new_v4()))
            .join("transparency.json");

        let log = TransparencyLog::with_persistence(path.clone());
        log.record_fingerprint_uploaded();
        log.record_cycle_aborted();
        log.save().unwrap();

        let reloaded = TransparencyLog::with_persistence(path.clone());
        let stats = reloaded.stats();
        assert_eq!(stats.fingerprints_uploaded, 1);
        assert_eq!(stats.cycles_aborted, 1);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_summary_format() {
        let log = TransparencyLog::new();
        let summary = log.summary();

        assert!(summary.contains("Scans requested"));
        assert!(summary.contains("Privacy Guarantee"));
        assert!(summary.contains("No network names captured"));
    }
}
