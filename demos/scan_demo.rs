//! Demonstration of the Wi-Fi Fingerprint Agent scan cycle.
//!
//! This example shows how to:
//! 1. Build a scan engine around a sampler
//! 2. Run a mapping (upload) cycle and watch its progress
//! 3. Run a query cycle
//! 4. Inspect the transparency log
//!
//! Run with: cargo run --example scan_demo
//!
//! A scripted sampler replays simulated scans, so no wireless adapter or
//! location service is needed. Fingerprints are exported to a temp directory.

use std::sync::Arc;

use wifi_fingerprint_agent::{
    collector::{ScriptedSampler, SignalReading},
    dispatch::{QueryCompletionHandler, UploadCompletionHandler},
    engine::{CycleRequest, EngineNotice, ScanEngine},
    transparency::create_shared_log,
    transport::ExportTransport,
    PRIVACY_DECLARATION,
};

/// Simulated scans: three access points with a little jitter, one of which
/// drops out every third scan.
fn simulated_scans(count: i32) -> Vec<Vec<SignalReading>> {
    (0..count)
        .map(|i| {
            let jitter = (i % 3) - 1;
            let mut scan = vec![
                SignalReading::new("00:11:22:33:44:55", -48 + jitter),
                SignalReading::new("66:77:88:99:AA:BB", -63 - jitter),
            ];
            if i % 3 != 2 {
                scan.push(SignalReading::new("cc:dd:ee:ff:00:11", -80 + 2 * jitter));
            }
            scan
        })
        .collect()
}

fn main() {
    println!("Wi-Fi Fingerprint Agent - Scan Demo");
    println!("===================================");
    println!();

    println!("{PRIVACY_DECLARATION}");
    println!();

    let export_dir = std::env::temp_dir().join("wifi-fingerprint-demo");
    let transport = Arc::new(ExportTransport::new(&export_dir));
    let log = create_shared_log();

    let sampler = ScriptedSampler::new(simulated_scans(12));
    let mut engine = ScanEngine::new(sampler, transport, Arc::clone(&log));
    let notices = engine.subscribe_notices();

    println!("Instance ID: {}", engine.instance_id());
    println!();

    // Mapping cycle
    println!("Mapping 'demo-room' with 10 scans...");
    let upload = Arc::new(UploadCompletionHandler::new(
        |marker| match marker {
            Some(m) => println!("  Uploaded, marker at ({}, {})", m.x, m.y),
            None => println!("  Uploaded"),
        },
        |error| println!("  Upload failed: {error}"),
    ));

    match engine.run_cycle(CycleRequest::upload(10, "demo-room"), upload) {
        Ok(summary) => println!(
            "  Fingerprint {} with {} access points from {} scans",
            summary.fingerprint_id, summary.emitters, summary.polls
        ),
        Err(e) => println!("  Cycle failed: {e}"),
    }

    for notice in notices.try_iter() {
        if let EngineNotice::Progress {
            polls_completed,
            polls_requested,
            ..
        } = notice
        {
            println!("  Did scan {polls_completed} of {polls_requested}");
        }
    }
    println!();

    // Query cycle; the export transport cannot answer, so this reports a failure.
    println!("Locating with 2 scans...");
    let query = Arc::new(QueryCompletionHandler::new(
        |location| println!("  You are at: {location}"),
        |error| println!("  Lookup failed: {error}"),
    ));
    if let Err(e) = engine.run_cycle(CycleRequest::query(2), query) {
        println!("  Cycle failed: {e}");
    }

    // Wait for both dispatches before reading the counters.
    engine.shutdown();

    println!();
    println!("Exported fingerprints to {export_dir:?}");
    println!();
    println!("{}", log.summary());
}
