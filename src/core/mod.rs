//! Core functionality for the Wi-Fi fingerprint agent.
//!
//! This module contains:
//! - Aggregation of scan readings per emitter
//! - Statistical reduction of observations
//! - Fingerprint building

pub mod aggregator;
pub mod fingerprint;
pub mod stats;

// Re-export commonly used types
pub use aggregator::{Aggregator, ObservationSet};
pub use fingerprint::{Fingerprint, FingerprintBuilder, ScanMode};
pub use stats::{mean, reduce, sample_std_dev, EmitterSummary};
