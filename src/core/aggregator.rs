//! Accumulation of scan readings into a per-emitter observation set.
//!
//! Readings from every scan of a polling cycle are appended to the list of the
//! emitter that produced them. No statistics are computed here.

use crate::collector::types::{EmitterId, SignalReading};
use std::collections::BTreeMap;

/// Signal strengths observed per emitter during one polling cycle.
///
/// Keys are ordered so that reductions over the set are deterministic.
pub type ObservationSet = BTreeMap<EmitterId, Vec<i32>>;

/// Collects readings for the active polling cycle.
#[derive(Debug, Default)]
pub struct Aggregator {
    /// Readings accumulated so far
    observations: ObservationSet,
    /// Number of scans recorded since the last reset
    scans_recorded: u32,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one scan's readings, creating entries for new emitters.
    pub fn record(&mut self, readings: &[SignalReading]) {
        for reading in readings {
            self.observations
                .entry(reading.emitter.clone())
                .or_default()
                .push(reading.strength);
        }
        self.scans_recorded += 1;
    }

    /// Discard everything and start a fresh observation set.
    pub fn reset(&mut self) {
        self.observations = ObservationSet::new();
        self.scans_recorded = 0;
    }

    /// Hand the accumulated observations over, leaving the aggregator empty.
    pub fn take(&mut self) -> ObservationSet {
        self.scans_recorded = 0;
        std::mem::take(&mut self.observations)
    }

    pub fn observations(&self) -> &ObservationSet {
        &self.observations
    }

    /// Number of distinct emitters seen.
    pub fn emitter_count(&self) -> usize {
        self.observations.len()
    }

    pub fn scans_recorded(&self) -> u32 {
        self.scans_recorded
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_appends_per_emitter() {
        let mut aggregator = Aggregator::new();
        aggregator.record(&[SignalReading::new("aa", -40), SignalReading::new("bb", -70)]);
        aggregator.record(&[SignalReading::new("aa", -44)]);

        let obs = aggregator.observations();
        assert_eq!(obs[&EmitterId::from("aa")], vec![-40, -44]);
        assert_eq!(obs[&EmitterId::from("bb")], vec![-70]);
        assert_eq!(aggregator.scans_recorded(), 2);
    }

    #[test]
    fn test_empty_scan_still_counts() {
        let mut aggregator = Aggregator::new();
        aggregator.record(&[]);
        assert!(aggregator.is_empty());
        assert_eq!(aggregator.scans_recorded(), 1);
    }

    #[test]
    fn test_reset_discards_state() {
        let mut aggregator = Aggregator::new();
        aggregator.record(&[SignalReading::new("aa", -40)]);
        aggregator.reset();

        assert!(aggregator.is_empty());
        assert_eq!(aggregator.scans_recorded(), 0);
    }

    #[test]
    fn test_take_leaves_aggregator_empty() {
        let mut aggregator = Aggregator::new();
        aggregator.record(&[SignalReading::new("aa", -40)]);

        let taken = aggregator.take();
        assert_eq!(taken.len(), 1);
        assert_eq!(aggregator.emitter_count(), 0);
    }
}
