//! Non-Linux (noop) implementation of signal sampling.
//!
//! This exists so the crate (and binary) can compile on targets without an
//! `iw`-style scan backend. Every scan completes immediately with no readings.

use crate::collector::types::ScanReport;
use crate::collector::ScanSampler;
use crossbeam_channel::Sender;

/// A scanner that never sees any emitters.
pub struct NoopScanner {
    interface: String,
    sink: Option<Sender<ScanReport>>,
}

impl NoopScanner {
    /// Create a new noop scanner. The interface name is accepted but unused.
    pub fn new(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            sink: None,
        }
    }

    /// Accepted for parity with the Linux scanner.
    pub fn use_cached(self) -> Self {
        self
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }
}

impl Default for NoopScanner {
    fn default() -> Self {
        Self::new("wlan0")
    }
}

impl ScanSampler for NoopScanner {
    fn subscribe(&mut self, sink: Sender<ScanReport>) {
        self.sink = Some(sink);
    }

    fn unsubscribe(&mut self) {
        self.sink = None;
    }

    fn start_scan(&mut self, generation: u64) {
        if let Some(ref sink) = self.sink {
            let _ = sink.send(ScanReport::empty(generation));
        }
    }
}
