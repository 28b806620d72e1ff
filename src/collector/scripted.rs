//! Replay sampler that reports a scripted sequence of scans.
//!
//! Used by the integration tests and the demo so the full engine can run on
//! machines without a wireless adapter.

use crate::collector::types::{ScanReport, SignalReading};
use crate::collector::ScanSampler;
use crossbeam_channel::Sender;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// A sampler that answers each scan with the next scripted reading list.
pub struct ScriptedSampler {
    script: VecDeque<Vec<SignalReading>>,
    sink: Option<Sender<ScanReport>>,
    /// Stay silent instead of reporting an empty scan once the script is spent
    stall_when_exhausted: bool,
    scans_started: Arc<AtomicU32>,
}

impl ScriptedSampler {
    /// Create a sampler that replays `scans` in order, then reports empty scans.
    pub fn new(scans: impl IntoIterator<Item = Vec<SignalReading>>) -> Self {
        Self {
            script: scans.into_iter().collect(),
            sink: None,
            stall_when_exhausted: false,
            scans_started: Arc::new(AtomicU32::new(0)),
        }
    }

    /// A sampler that never reports anything.
    pub fn silent() -> Self {
        Self::new(Vec::new()).stall_when_exhausted()
    }

    /// Never report once the script has run out.
    pub fn stall_when_exhausted(mut self) -> Self {
        self.stall_when_exhausted = true;
        self
    }

    /// Shared counter of `start_scan` calls, readable after the sampler has
    /// been moved into an engine.
    pub fn scan_counter(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.scans_started)
    }

    pub fn is_subscribed(&self) -> bool {
        self.sink.is_some()
    }
}

impl ScanSampler for ScriptedSampler {
    fn subscribe(&mut self, sink: Sender<ScanReport>) {
        self.sink = Some(sink);
    }

    fn unsubscribe(&mut self) {
        self.sink = None;
    }

    fn start_scan(&mut self, generation: u64) {
        self.scans_started.fetch_add(1, Ordering::SeqCst);

        let readings = match self.script.pop_front() {
            Some(readings) => readings,
            None if self.stall_when_exhausted => return,
            None => Vec::new(),
        };

        match self.sink {
            Some(ref sink) => {
                if sink.send(ScanReport::new(generation, readings)).is_err() {
                    tracing::warn!(generation, "scan report dropped: receiver gone");
                }
            }
            None => tracing::warn!(generation, "scan started without a subscriber"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    #[test]
    fn test_replays_script_in_order() {
        let (tx, rx) = unbounded();
        let mut sampler = ScriptedSampler::new(vec![
            vec![SignalReading::new("aa", -40)],
            vec![SignalReading::new("bb", -50)],
        ]);
        sampler.subscribe(tx);

        sampler.start_scan(1);
        sampler.start_scan(1);
        sampler.start_scan(1);

        let first = rx.try_recv().unwrap();
        assert_eq!(first.readings[0].emitter.as_str(), "aa");
        let second = rx.try_recv().unwrap();
        assert_eq!(second.readings[0].emitter.as_str(), "bb");
        // Script exhausted: empty scan
        assert!(rx.try_recv().unwrap().is_empty());
        assert_eq!(sampler.scan_counter().load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_silent_sampler_never_reports() {
        let (tx, rx) = unbounded();
        let mut sampler = ScriptedSampler::silent();
        sampler.subscribe(tx);
        sampler.start_scan(4);
        assert!(rx.try_recv().is_err());
        assert_eq!(sampler.scan_counter().load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe_detaches_sink() {
        let (tx, _rx) = unbounded();
        let mut sampler = ScriptedSampler::new(Vec::new());
        sampler.subscribe(tx);
        assert!(sampler.is_subscribed());
        sampler.unsubscribe();
        assert!(!sampler.is_subscribed());
    }
}
