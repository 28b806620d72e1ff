//! Wi-Fi Fingerprint Agent CLI
//!
//! Indoor positioning by access point signal strength.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use crossbeam_channel::{bounded, Receiver};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;
use wifi_fingerprint_agent::{
    collector::Collector,
    config::Config,
    dispatch::{CompletionHandler, DispatchOutcome, QueryCompletionHandler, UploadCompletionHandler},
    engine::{CycleRequest, EngineNotice, ScanEngine},
    error::EngineError,
    transparency::{create_shared_log_with_persistence, SharedTransparencyLog},
    transport::{ExportTransport, FingerprintTransport},
    PRIVACY_DECLARATION, VERSION,
};

#[cfg(feature = "http")]
use wifi_fingerprint_agent::transport::HttpTransport;

/// How long to wait for the location service after the last scan.
const DISPATCH_WAIT: Duration = Duration::from_secs(30);

type DispatchResult = Result<DispatchOutcome, EngineError>;

#[derive(Parser)]
#[command(name = "wifi-fingerprint")]
#[command(version = VERSION)]
#[command(about = "Wi-Fi fingerprinting for indoor positioning", long_about = None)]
struct Cli {
    /// Location service base URL (overrides the config file)
    #[arg(long, global = true)]
    server: Option<String>,

    /// Export fingerprints to disk instead of sending them
    #[arg(long, global = true)]
    offline: bool,

    /// Wireless interface to scan on
    #[arg(long, global = true)]
    interface: Option<String>,

    /// Read cached scan results instead of triggering fresh scans
    #[arg(long, global = true)]
    cached: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a ground-truth fingerprint for a known location
    Map {
        /// Location identifier the fingerprint belongs to
        #[arg(long, short)]
        location: String,

        /// Number of scans to aggregate
        #[arg(long)]
        polls: Option<u32>,
    },

    /// Ask the location service where this device is
    Locate {
        /// Number of scans to aggregate
        #[arg(long)]
        polls: Option<u32>,
    },

    /// Repeatedly locate this device until interrupted
    Track {
        /// Number of scans to aggregate per lookup
        #[arg(long)]
        polls: Option<u32>,

        /// Seconds to wait between lookups
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Show current configuration and cumulative statistics
    Status,

    /// Display privacy declaration
    Privacy,

    /// Show configuration
    Config {
        /// Write the effective configuration (including overrides) to the config file
        #[arg(long)]
        save: bool,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = Config::load().context("failed to load configuration")?;
    if let Some(ref url) = cli.server {
        config.server.base_url = url.clone();
    }
    if let Some(ref interface) = cli.interface {
        config.interface = interface.clone();
    }
    if cli.cached {
        config.use_cached_scans = true;
    }

    match cli.command {
        Commands::Map { location, polls } => {
            let polls = polls.unwrap_or(config.mapping_polls);
            cmd_map(&config, cli.offline, &location, polls)
        }
        Commands::Locate { polls } => {
            let polls = polls.unwrap_or(config.query_polls);
            cmd_locate(&config, cli.offline, polls)
        }
        Commands::Track { polls, interval } => {
            let polls = polls.unwrap_or(config.query_polls);
            let interval = interval
                .map(Duration::from_secs)
                .unwrap_or(config.track_interval);
            cmd_track(&config, cli.offline, polls, interval)
        }
        Commands::Status => {
            cmd_status(&config);
            Ok(())
        }
        Commands::Privacy => {
            cmd_privacy();
            Ok(())
        }
        Commands::Config { save } => cmd_config(&config, save),
    }
}

fn cmd_map(config: &Config, offline: bool, location: &str, polls: u32) -> anyhow::Result<()> {
    println!("Wi-Fi Fingerprint Agent v{VERSION}");
    println!();
    println!("Mapping location '{location}' with {polls} scans...");

    let log = open_log(config);
    let mut engine = build_engine(config, offline, Arc::clone(&log))?;
    let (handler, results) = upload_handler();

    let outcome = run_one(&mut engine, CycleRequest::upload(polls, location), handler, &results);
    engine.shutdown();
    finish(&log);

    match outcome? {
        DispatchOutcome::Uploaded { marker: Some(marker) } => {
            println!("Fingerprint uploaded. Map marker at ({}, {}).", marker.x, marker.y);
        }
        DispatchOutcome::Uploaded { marker: None } => println!("Fingerprint uploaded."),
        DispatchOutcome::LocationResolved { location } => println!("Location: {location}"),
    }
    Ok(())
}

fn cmd_locate(config: &Config, offline: bool, polls: u32) -> anyhow::Result<()> {
    println!("Wi-Fi Fingerprint Agent v{VERSION}");
    println!();
    println!("Locating with {polls} scans...");

    let log = open_log(config);
    let mut engine = build_engine(config, offline, Arc::clone(&log))?;
    let (handler, results) = query_handler();

    let outcome = run_one(&mut engine, CycleRequest::query(polls), handler, &results);
    engine.shutdown();
    finish(&log);

    if let DispatchOutcome::LocationResolved { location } = outcome? {
        println!("You are at: {location}");
    }
    Ok(())
}

fn cmd_track(
    config: &Config,
    offline: bool,
    polls: u32,
    interval: Duration,
) -> anyhow::Result<()> {
    println!("Wi-Fi Fingerprint Agent v{VERSION}");
    println!();
    println!(
        "Tracking location every {}s with {polls} scans per lookup.",
        interval.as_secs()
    );
    println!("Press Ctrl+C to stop");
    println!();

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(Arc::clone(&running))?;

    let log = open_log(config);
    let mut engine = build_engine(config, offline, Arc::clone(&log))?;
    let notices = engine.subscribe_notices();
    let (handler, results) = query_handler();

    while running.load(Ordering::SeqCst) {
        match run_one(&mut engine, CycleRequest::query(polls), Arc::clone(&handler), &results) {
            Ok(DispatchOutcome::LocationResolved { location }) => {
                println!("[{}] {location}", chrono::Local::now().format("%H:%M:%S"));
            }
            Ok(_) => {}
            Err(e) => eprintln!("[{}] {e}", chrono::Local::now().format("%H:%M:%S")),
        }

        for notice in notices.try_iter() {
            if let EngineNotice::Aborted { generation, reason } = notice {
                tracing::debug!(generation, %reason, "cycle aborted");
            }
        }

        let next = Instant::now() + interval;
        while running.load(Ordering::SeqCst) && Instant::now() < next {
            thread::sleep(Duration::from_millis(100));
        }
    }

    println!();
    println!("Stopping...");
    engine.shutdown();
    finish(&log);
    Ok(())
}

fn cmd_status(config: &Config) {
    println!("Wi-Fi Fingerprint Agent Status");
    println!("==============================");
    println!();

    println!("Configuration:");
    println!("  Location service: {}", config.server.base_url);
    println!("  Interface: {}", config.interface);
    println!("  Cached scans: {}", config.use_cached_scans);
    println!("  Mapping scans: {}", config.mapping_polls);
    println!("  Query scans: {}", config.query_polls);
    println!("  Scan timeout: {}s", config.scan_timeout.as_secs());
    println!(
        "  HTTP transport: {}",
        if cfg!(feature = "http") {
            "available"
        } else {
            "not built (fingerprints are exported)"
        }
    );
    println!();

    let stats_path = config.data_path.join("transparency.json");
    let stats = std::fs::read_to_string(&stats_path)
        .ok()
        .and_then(|content| serde_json::from_str::<serde_json::Value>(&content).ok());

    match stats {
        Some(stats) => {
            println!("Cumulative Statistics:");
            for (label, key) in [
                ("Scans completed", "scans_completed"),
                ("Signal readings", "readings_recorded"),
                ("Fingerprints uploaded", "fingerprints_uploaded"),
                ("Locations resolved", "locations_resolved"),
                ("Dispatch failures", "dispatch_failures"),
                ("Cycles aborted", "cycles_aborted"),
            ] {
                if let Some(value) = stats.get(key) {
                    println!("  {label}: {value}");
                }
            }
        }
        None => println!("No previous session data found."),
    }
}

fn cmd_privacy() {
    println!("{PRIVACY_DECLARATION}");
}

fn cmd_config(config: &Config, save: bool) -> anyhow::Result<()> {
    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(config)?);

    if save {
        config.save().context("Error saving config")?;
        println!();
        println!("Configuration saved.");
    }
    Ok(())
}

/// Run one cycle and wait for the dispatcher to report back.
fn run_one(
    engine: &mut ScanEngine<Collector>,
    request: CycleRequest,
    handler: Arc<dyn CompletionHandler>,
    results: &Receiver<DispatchResult>,
) -> anyhow::Result<DispatchOutcome> {
    // Drop results left over from an earlier cycle that timed out.
    while results.try_recv().is_ok() {}

    let summary = engine.run_cycle(request, handler)?;
    tracing::debug!(
        generation = summary.generation,
        emitters = summary.emitters,
        "waiting for dispatch"
    );
    if summary.emitters == 0 {
        println!("No access points were seen.");
    }

    match results.recv_timeout(DISPATCH_WAIT) {
        Ok(result) => Ok(result?),
        Err(_) => bail!(
            "no response from the location service within {}s",
            DISPATCH_WAIT.as_secs()
        ),
    }
}

fn upload_handler() -> (Arc<dyn CompletionHandler>, Receiver<DispatchResult>) {
    let (tx, rx) = bounded(4);
    let failures = tx.clone();
    let handler = UploadCompletionHandler::new(
        move |marker| {
            let _ = tx.try_send(Ok(DispatchOutcome::Uploaded { marker }));
        },
        move |error| {
            let _ = failures.try_send(Err(error.clone()));
        },
    );
    (Arc::new(handler), rx)
}

fn query_handler() -> (Arc<dyn CompletionHandler>, Receiver<DispatchResult>) {
    let (tx, rx) = bounded(4);
    let failures = tx.clone();
    let handler = QueryCompletionHandler::new(
        move |location| {
            let _ = tx.try_send(Ok(DispatchOutcome::LocationResolved {
                location: location.to_string(),
            }));
        },
        move |error| {
            let _ = failures.try_send(Err(error.clone()));
        },
    );
    (Arc::new(handler), rx)
}

fn build_engine(
    config: &Config,
    offline: bool,
    log: SharedTransparencyLog,
) -> anyhow::Result<ScanEngine<Collector>> {
    let mut sampler = Collector::new(config.interface.clone());
    if config.use_cached_scans {
        sampler = sampler.use_cached();
    }

    let transport = build_transport(config, offline)?;
    let engine = ScanEngine::new(sampler, transport, log).with_scan_timeout(config.scan_timeout);
    println!("Instance ID: {}", engine.instance_id());
    Ok(engine)
}

fn build_transport(
    config: &Config,
    offline: bool,
) -> anyhow::Result<Arc<dyn FingerprintTransport>> {
    #[cfg(feature = "http")]
    if !offline {
        let transport = HttpTransport::new(config.server.clone())?;
        println!("Location service: {}", config.server.base_url);
        println!("Device ID: {}", transport.device_id());
        return Ok(Arc::new(transport));
    }

    #[cfg(not(feature = "http"))]
    if !offline {
        eprintln!("Warning: built without the http feature, exporting fingerprints instead");
    }

    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }
    let transport = ExportTransport::new(&config.export_path);
    println!("Exporting fingerprints to {:?}", transport.export_dir());
    Ok(Arc::new(transport))
}

fn open_log(config: &Config) -> SharedTransparencyLog {
    create_shared_log_with_persistence(config.data_path.join("transparency.json"))
}

fn finish(log: &SharedTransparencyLog) {
    if let Err(e) = log.save() {
        eprintln!("Warning: Could not save transparency log: {e}");
    }
    println!();
    println!("{}", log.summary());
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .context("Error setting Ctrl+C handler")
}
