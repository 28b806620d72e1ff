//! Wi-Fi Fingerprint Agent - indoor positioning by access point signal strength.
//!
//! This library repeatedly samples nearby wireless access points, aggregates
//! their signal strengths per access point, reduces them to a mean and standard
//! deviation, and sends the resulting fingerprint to a location service either
//! as ground truth for a known location or as a query for the current one.
//!
//! # Privacy Guarantees
//!
//! - **Access points only**: We record the BSSID and signal strength of nearby
//!   access points, never network names or traffic
//! - **No raw storage**: Individual scans are discarded once a fingerprint is built
//! - **Transparency**: All scanning and sending is counted and auditable
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Wi-Fi Fingerprint Agent                    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │  Collector  │──▶│ Aggregator  │──▶│    Stats    │       │
//! │  │ (iw scans)  │   │ (per BSSID) │   │ (mean, sd)  │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! │         ▲                                    │              │
//! │         │ start_scan                         ▼              │
//! │  ┌─────────────┐                     ┌─────────────┐       │
//! │  │ ScanEngine  │────────────────────▶│ Dispatcher  │       │
//! │  │ (polling)   │     fingerprint     │ (transport) │       │
//! │  └─────────────┘                     └─────────────┘       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use wifi_fingerprint_agent::{
//!     collector::Collector, dispatch::QueryCompletionHandler, engine::CycleRequest,
//!     transparency::create_shared_log, transport::ExportTransport, ScanEngine,
//! };
//!
//! let transport = Arc::new(ExportTransport::new("exports"));
//! let mut engine = ScanEngine::new(Collector::default(), transport, create_shared_log());
//!
//! let handler = Arc::new(QueryCompletionHandler::new(
//!     |location| println!("You are at {location}"),
//!     |error| eprintln!("Lookup failed: {error}"),
//! ));
//! engine.run_cycle(CycleRequest::query(2), handler).expect("scan cycle failed");
//! engine.shutdown();
//! ```

pub mod collector;
pub mod config;
pub mod core;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod transparency;
pub mod transport;

// Re-export key types at crate root for convenience
pub use collector::{Collector, EmitterId, ScanReport, ScanSampler, SignalReading};
pub use config::{Config, ServerConfig};
pub use core::{reduce, EmitterSummary, Fingerprint, FingerprintBuilder, ScanMode};
pub use dispatch::{
    CompletionHandler, DispatchOutcome, Dispatcher, MapMarker, QueryCompletionHandler,
    UploadCompletionHandler,
};
pub use engine::{CycleRequest, CycleSummary, EngineNotice, EngineState, ReportOutcome, ScanEngine};
pub use error::EngineError;
pub use transparency::{SharedTransparencyLog, TransparencyLog, TransparencyStats};
pub use transport::{ExportTransport, FingerprintTransport};

#[cfg(feature = "http")]
pub use transport::HttpTransport;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Privacy declaration that can be displayed to users.
pub const PRIVACY_DECLARATION: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║          WI-FI FINGERPRINT AGENT - PRIVACY DECLARATION           ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  This agent measures nearby Wi-Fi signals to estimate location.  ║
║                                                                  ║
║  ✓ WHAT WE CAPTURE:                                              ║
║    • Hardware addresses (BSSIDs) of nearby access points         ║
║    • How strong each access point's signal is                    ║
║    • The location label you give when mapping                    ║
║                                                                  ║
║  ✗ WHAT WE NEVER CAPTURE:                                        ║
║    • Network names or passwords                                  ║
║    • Any network traffic                                         ║
║    • Other devices on the network                                ║
║    • Your location unless you ask for it                         ║
║                                                                  ║
║  Only averaged signal strengths leave this machine. Individual   ║
║  scans are discarded once a fingerprint is built.                ║
║                                                                  ║
║  You can view scanning statistics anytime with:                  ║
║    wifi-fingerprint status                                       ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;
