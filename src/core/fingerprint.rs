//! Finalised fingerprints and the builder that produces them.
//!
//! A fingerprint is the immutable product of one completed polling cycle: the
//! reduced per-emitter statistics plus what the fingerprint is for.

use crate::core::stats::EmitterSummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// What a polling cycle's fingerprint will be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanMode {
    /// Store the fingerprint as ground truth for a known location
    Upload,
    /// Match the fingerprint against stored ones to estimate the location
    Query,
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanMode::Upload => write!(f, "upload"),
            ScanMode::Query => write!(f, "query"),
        }
    }
}

/// A finalised, per-emitter signal fingerprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fingerprint {
    /// Unique fingerprint identifier
    pub id: Uuid,
    /// Identifier of the agent instance that produced it
    pub producer_instance: Uuid,
    pub mode: ScanMode,
    /// Location this fingerprint is ground truth for (upload mode only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_ref: Option<String>,
    /// Per-emitter statistics, sorted by emitter id
    pub entries: Vec<EmitterSummary>,
    /// Number of scans the statistics were computed from
    pub polls: u32,
    pub collected_at: DateTime<Utc>,
}

impl Fingerprint {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Builds fingerprints stamped with this agent's instance id.
pub struct FingerprintBuilder {
    instance_id: Uuid,
}

impl FingerprintBuilder {
    /// Create a new builder with a unique instance ID.
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4(),
        }
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    /// Build a fingerprint from reduced statistics.
    ///
    /// The location reference is dropped for query fingerprints.
    pub fn build(
        &self,
        entries: Vec<EmitterSummary>,
        mode: ScanMode,
        location_ref: Option<String>,
        polls: u32,
    ) -> Fingerprint {
        Fingerprint {
            id: Uuid::new_v4(),
            producer_instance: self.instance_id,
            mode,
            location_ref: match mode {
                ScanMode::Upload => location_ref,
                ScanMode::Query => None,
            },
            entries,
            polls,
            collected_at: Utc::now(),
        }
    }
}

impl Default for FingerprintBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::types::EmitterId;

    fn summary(id: &str, mean: f64) -> EmitterSummary {
        EmitterSummary {
            emitter: EmitterId::from(id),
            mean,
            std_dev: 0.0,
            samples: 1,
        }
    }

    #[test]
    fn test_builder_instance_id() {
        let builder1 = FingerprintBuilder::new();
        let builder2 = FingerprintBuilder::new();
        assert_ne!(builder1.instance_id(), builder2.instance_id());
    }

    #[test]
    fn test_upload_keeps_location() {
        let builder = FingerprintBuilder::new();
        let fp = builder.build(
            vec![summary("aa", -40.0)],
            ScanMode::Upload,
            Some("room-101".to_string()),
            10,
        );
        assert_eq!(fp.location_ref.as_deref(), Some("room-101"));
        assert_eq!(fp.producer_instance, builder.instance_id());
        assert_eq!(fp.len(), 1);
    }

    #[test]
    fn test_query_drops_location() {
        let builder = FingerprintBuilder::new();
        let fp = builder.build(Vec::new(), ScanMode::Query, Some("ignored".to_string()), 2);
        assert!(fp.location_ref.is_none());
        assert!(fp.is_empty());
    }

    #[test]
    fn test_mode_serialization() {
        assert_eq!(serde_json::to_string(&ScanMode::Upload).unwrap(), "\"upload\"");
        assert_eq!(ScanMode::Query.to_string(), "query");
    }
}
