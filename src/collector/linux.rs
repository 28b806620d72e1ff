//! Linux implementation of signal sampling via `iw`.
//!
//! Each scan shells out to `iw dev <iface> scan` (or `scan dump`, which reads
//! the kernel's cached results and usually works without `CAP_NET_ADMIN`) on a
//! worker thread, then reports the BSSID/signal pairs on the subscribed
//! channel. Network names are never parsed.

use crate::collector::types::{ScanReport, SignalReading};
use crate::collector::{CollectorError, ScanSampler};
use crossbeam_channel::Sender;
use std::process::Command;
use std::thread;

/// Scanner backed by the `iw` command line tool.
pub struct IwScanner {
    interface: String,
    use_dump: bool,
    sink: Option<Sender<ScanReport>>,
}

impl IwScanner {
    /// Create a scanner for the given wireless interface.
    pub fn new(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            use_dump: false,
            sink: None,
        }
    }

    /// Read cached scan results instead of triggering a fresh scan.
    pub fn use_cached(mut self) -> Self {
        self.use_dump = true;
        self
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    fn scan_sync(interface: &str, use_dump: bool) -> Result<Vec<SignalReading>, CollectorError> {
        let mut args = vec!["dev", interface, "scan"];
        if use_dump {
            args.push("dump");
        }

        let output = Command::new("iw").args(&args).output().map_err(|e| {
            CollectorError::Process(format!("failed to run `iw {}`: {e}", args.join(" ")))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CollectorError::ScanFailed(format!(
                "iw exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(parse_iw_output(&String::from_utf8_lossy(&output.stdout)))
    }
}

impl Default for IwScanner {
    fn default() -> Self {
        Self::new("wlan0")
    }
}

impl ScanSampler for IwScanner {
    fn subscribe(&mut self, sink: Sender<ScanReport>) {
        self.sink = Some(sink);
    }

    fn unsubscribe(&mut self) {
        self.sink = None;
    }

    fn start_scan(&mut self, generation: u64) {
        let Some(sink) = self.sink.clone() else {
            tracing::warn!(generation, "scan started without a subscriber");
            return;
        };
        let interface = self.interface.clone();
        let use_dump = self.use_dump;

        thread::spawn(move || {
            let readings = match Self::scan_sync(&interface, use_dump) {
                Ok(readings) => readings,
                Err(e) => {
                    tracing::warn!(%interface, "{e}; reporting empty scan");
                    Vec::new()
                }
            };
            tracing::debug!(generation, count = readings.len(), "iw scan finished");
            // The engine may have moved on; a closed channel is not an error.
            let _ = sink.send(ScanReport::new(generation, readings));
        });
    }
}

/// Parse `iw dev <iface> scan` output into readings.
///
/// Stanzas start with `BSS aa:bb:cc:dd:ee:ff(on wlan0)` at column 0; the
/// indented `signal: -52.00 dBm` line inside carries the strength. Stanzas
/// without a signal line are skipped.
pub fn parse_iw_output(output: &str) -> Vec<SignalReading> {
    let mut readings = Vec::new();
    let mut bssid: Option<String> = None;
    let mut signal: Option<i32> = None;

    let mut flush = |bssid: &mut Option<String>, signal: &mut Option<i32>| {
        if let (Some(b), Some(s)) = (bssid.take(), signal.take()) {
            readings.push(SignalReading::new(b.as_str(), s));
        }
    };

    for line in output.lines() {
        if let Some(rest) = line.strip_prefix("BSS ") {
            flush(&mut bssid, &mut signal);
            let mac_end = rest
                .find(|c: char| !c.is_ascii_hexdigit() && c != ':')
                .unwrap_or(rest.len());
            let mac = &rest[..mac_end];
            if mac.len() == 17 {
                bssid = Some(mac.to_string());
            }
            continue;
        }

        if bssid.is_some() {
            if let Some(rest) = line.trim().strip_prefix("signal:") {
                signal = parse_signal_dbm(rest);
            }
        }
    }
    flush(&mut bssid, &mut signal);

    readings
}

/// Parse `-52.00 dBm` into whole dBm.
fn parse_signal_dbm(s: &str) -> Option<i32> {
    let value: f64 = s.split_whitespace().next()?.parse().ok()?;
    Some(value.round() as i32)
}
