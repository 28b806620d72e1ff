//! Reduction of per-emitter observations into (mean, standard deviation).
//!
//! Scans are noisy; a single RSSI reading can swing by several dBm. The
//! fingerprint therefore carries, per emitter, the mean strength over the
//! cycle and the sample standard deviation as a spread estimate.

use crate::collector::types::EmitterId;
use crate::core::aggregator::ObservationSet;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Reduced statistics for one emitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmitterSummary {
    pub emitter: EmitterId,
    /// Mean received strength in dBm
    pub mean: f64,
    /// Sample standard deviation of the strength in dBm
    pub std_dev: f64,
    /// Number of readings the summary was computed from
    pub samples: usize,
}

/// Reduce every emitter's readings. Output is sorted by emitter id.
pub fn reduce(observations: &ObservationSet) -> Vec<EmitterSummary> {
    observations
        .iter()
        .map(|(emitter, strengths)| EmitterSummary {
            emitter: emitter.clone(),
            mean: mean(strengths),
            std_dev: sample_std_dev(strengths),
            samples: strengths.len(),
        })
        .collect()
}

/// Arithmetic mean; 0 for no readings.
pub fn mean(strengths: &[i32]) -> f64 {
    if strengths.is_empty() {
        return 0.0;
    }
    as_f64(strengths).iter().mean()
}

/// Sample standard deviation (n - 1 denominator); 0 for fewer than two readings.
pub fn sample_std_dev(strengths: &[i32]) -> f64 {
    if strengths.len() < 2 {
        return 0.0;
    }
    as_f64(strengths).iter().std_dev()
}

fn as_f64(strengths: &[i32]) -> Vec<f64> {
    strengths.iter().map(|&s| f64::from(s)).collect()
}
