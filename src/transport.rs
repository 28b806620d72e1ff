//! Transports that carry fingerprints to the location service.
//!
//! The dispatcher only needs "submit fingerprint, get response body". The
//! HTTP transport (feature `http`) posts JSON to the configured endpoints; the
//! export transport is an offline sink that writes upload bodies to disk.

use crate::core::fingerprint::{Fingerprint, ScanMode};
use crate::error::EngineError;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;

#[cfg(feature = "http")]
use crate::config::ServerConfig;

/// Something that can submit a fingerprint and return the raw response body.
///
/// Implementations block until the response is available; the dispatcher
/// calls them from its own worker thread.
pub trait FingerprintTransport: Send + Sync {
    fn submit(&self, fingerprint: &Fingerprint) -> Result<Value, EngineError>;
}

/// One access point entry as the location service expects it.
#[derive(Debug, Clone, Serialize)]
pub struct WireAccessPoint {
    pub bssid: String,
    pub mean: f64,
    pub stddev: f64,
}

/// Request body for either mode.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum SubmitBody {
    /// `{objects: [...], lid: <location>}`
    Upload {
        objects: Vec<WireAccessPoint>,
        lid: String,
    },
    /// `{objects: [...], device_id: <id>}`
    Query {
        objects: Vec<WireAccessPoint>,
        device_id: String,
    },
}

impl SubmitBody {
    /// Build the request body for a fingerprint.
    pub fn from_fingerprint(fingerprint: &Fingerprint, device_id: &str) -> Result<Self, EngineError> {
        let objects = fingerprint
            .entries
            .iter()
            .map(|entry| WireAccessPoint {
                bssid: entry.emitter.to_string(),
                mean: entry.mean,
                stddev: entry.std_dev,
            })
            .collect();

        match fingerprint.mode {
            ScanMode::Upload => {
                let lid = fingerprint.location_ref.clone().ok_or_else(|| {
                    EngineError::InvalidArgument(
                        "upload fingerprint has no location reference".to_string(),
                    )
                })?;
                Ok(SubmitBody::Upload { objects, lid })
            }
            ScanMode::Query => Ok(SubmitBody::Query {
                objects,
                device_id: device_id.to_string(),
            }),
        }
    }
}

/// Generate a device id from hostname + a random suffix.
pub fn generate_device_id() -> String {
    let hostname = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    format!(
        "agent-{}-{}",
        hostname,
        &uuid::Uuid::new_v4().to_string()[..8]
    )
}

/// HTTP transport to the location service.
#[cfg(feature = "http")]
pub struct HttpTransport {
    server: ServerConfig,
    client: reqwest::Client,
    runtime: tokio::runtime::Runtime,
    device_id: String,
}

#[cfg(feature = "http")]
impl HttpTransport {
    /// Create a new HTTP transport.
    pub fn new(server: ServerConfig) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| EngineError::Transport(format!("Failed to create HTTP client: {e}")))?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| EngineError::Transport(format!("Failed to create runtime: {e}")))?;

        Ok(Self {
            server,
            client,
            runtime,
            device_id: generate_device_id(),
        })
    }

    /// Get the device ID sent with queries.
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    async fn post(&self, url: &str, body: &SubmitBody) -> Result<Value, EngineError> {
        let mut request = self.client.post(url).json(body);
        if let Some(ref user) = self.server.username {
            request = request.basic_auth(user, self.server.password.as_ref());
        }

        let response = request
            .send()
            .await
            .map_err(|e| EngineError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| EngineError::Transport(e.to_string()))?;
        let parsed = serde_json::from_str::<Value>(&text);

        if status.is_success() {
            return parsed
                .map_err(|e| EngineError::Protocol(format!("undecodable response body: {e}")));
        }

        // An error status with an `error` body is a rejection, not a transport failure.
        match parsed {
            Ok(body) if body.get("error").is_some() => Ok(body),
            _ => Err(EngineError::Transport(format!(
                "server returned {status}: {}",
                text.trim()
            ))),
        }
    }
}

#[cfg(feature = "http")]
impl FingerprintTransport for HttpTransport {
    fn submit(&self, fingerprint: &Fingerprint) -> Result<Value, EngineError> {
        let body = SubmitBody::from_fingerprint(fingerprint, &self.device_id)?;
        let url = match fingerprint.mode {
            ScanMode::Upload => self.server.upload_url(),
            ScanMode::Query => self.server.query_url(),
        };
        tracing::debug!(%url, mode = %fingerprint.mode, entries = fingerprint.len(), "posting fingerprint");
        self.runtime.block_on(self.post(&url, &body))
    }
}

/// Offline transport: writes upload bodies to the export directory.
///
/// Queries cannot be answered offline and are rejected.
pub struct ExportTransport {
    export_dir: PathBuf,
    device_id: String,
}

impl ExportTransport {
    pub fn new(export_dir: impl Into<PathBuf>) -> Self {
        Self {
            export_dir: export_dir.into(),
            device_id: generate_device_id(),
        }
    }

    /// Directory upload bodies are written to.
    pub fn export_dir(&self) -> &std::path::Path {
        &self.export_dir
    }
}

impl FingerprintTransport for ExportTransport {
    fn submit(&self, fingerprint: &Fingerprint) -> Result<Value, EngineError> {
        let body = SubmitBody::from_fingerprint(fingerprint, &self.device_id)?;
        let SubmitBody::Upload { ref lid, .. } = body else {
            return Ok(serde_json::json!({ "error": "no location service configured" }));
        };

        std::fs::create_dir_all(&self.export_dir)
            .map_err(|e| EngineError::Transport(e.to_string()))?;

        let safe_lid: String = lid
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        let path = self.export_dir.join(format!(
            "fingerprint_{}_{}_{}.json",
            safe_lid,
            Utc::now().format("%Y%m%d_%H%M%S%.3f"),
            fingerprint.id.simple()
        ));

        let json = serde_json::to_string_pretty(&body)
            .map_err(|e| EngineError::Transport(e.to_string()))?;
        std::fs::write(&path, json).map_err(|e| EngineError::Transport(e.to_string()))?;
        tracing::info!(path = %path.display(), "fingerprint exported");

        Ok(serde_json::json!({}))
    }
}
