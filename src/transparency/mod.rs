//! Transparency module for the Wi-Fi fingerprint agent.
//!
//! This module provides tools for tracking and exposing what data
//! the agent collects and sends, supporting user trust.

pub mod log;

// Re-export commonly used types
pub use log::{
    create_shared_log, create_shared_log_with_persistence, SharedTransparencyLog, TransparencyLog,
    TransparencyStats,
};
