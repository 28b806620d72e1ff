//! Fire-and-forget dispatch of finished fingerprints.
//!
//! The engine hands each fingerprint to the [`Dispatcher`] together with the
//! cycle's [`CompletionHandler`] and returns to idle immediately. A worker
//! thread submits the fingerprint through the transport, interprets the
//! response according to the fingerprint's mode, and calls exactly one
//! handler method.

use crate::core::fingerprint::{Fingerprint, ScanMode};
use crate::error::EngineError;
use crate::transparency::SharedTransparencyLog;
use crate::transport::FingerprintTransport;
use crossbeam_channel::{unbounded, Sender};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Map coordinates returned after a ground-truth upload, used to place a
/// confirmation marker on a floor image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapMarker {
    pub x: i64,
    pub y: i64,
}

/// A successfully interpreted response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Uploaded { marker: Option<MapMarker> },
    LocationResolved { location: String },
}

/// Receives the result of a dispatched fingerprint.
///
/// Exactly one method is called per fingerprint.
pub trait CompletionHandler: Send + Sync {
    /// The fingerprint was stored as ground truth.
    ///
    /// Handlers that only serve query cycles get a failure instead.
    fn on_uploaded(&self, _marker: Option<MapMarker>) {
        self.on_failure(&EngineError::Protocol(
            "completion handler does not accept upload results".to_string(),
        ));
    }

    /// The query fingerprint matched a stored location.
    ///
    /// Handlers that only serve upload cycles get a failure instead.
    fn on_location_resolved(&self, _location: &str) {
        self.on_failure(&EngineError::Protocol(
            "completion handler does not accept query results".to_string(),
        ));
    }

    /// The cycle ended without a result.
    fn on_failure(&self, error: &EngineError);
}

type FailureFn = Box<dyn Fn(&EngineError) + Send + Sync>;

/// Completion strategy for upload cycles.
pub struct UploadCompletionHandler {
    on_uploaded: Box<dyn Fn(Option<MapMarker>) + Send + Sync>,
    on_failure: FailureFn,
}

impl UploadCompletionHandler {
    pub fn new(
        on_uploaded: impl Fn(Option<MapMarker>) + Send + Sync + 'static,
        on_failure: impl Fn(&EngineError) + Send + Sync + 'static,
    ) -> Self {
        Self {
            on_uploaded: Box::new(on_uploaded),
            on_failure: Box::new(on_failure),
        }
    }
}

impl CompletionHandler for UploadCompletionHandler {
    fn on_uploaded(&self, marker: Option<MapMarker>) {
        (self.on_uploaded)(marker)
    }

    fn on_failure(&self, error: &EngineError) {
        (self.on_failure)(error)
    }
}

/// Completion strategy for query cycles.
pub struct QueryCompletionHandler {
    location_resolved: Box<dyn Fn(&str) + Send + Sync>,
    on_failure: FailureFn,
}

impl QueryCompletionHandler {
    pub fn new(
        location_resolved: impl Fn(&str) + Send + Sync + 'static,
        on_failure: impl Fn(&EngineError) + Send + Sync + 'static,
    ) -> Self {
        Self {
            location_resolved: Box::new(location_resolved),
            on_failure: Box::new(on_failure),
        }
    }
}

impl CompletionHandler for QueryCompletionHandler {
    fn on_location_resolved(&self, location: &str) {
        (self.location_resolved)(location)
    }

    fn on_failure(&self, error: &EngineError) {
        (self.on_failure)(error)
    }
}

/// Interpret a response body for the given mode.
pub fn interpret_response(mode: ScanMode, body: &Value) -> Result<DispatchOutcome, EngineError> {
    let object = body
        .as_object()
        .ok_or_else(|| EngineError::Protocol(format!("expected a JSON object, got {body}")))?;

    if let Some(error) = object.get("error") {
        let message = match error {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        return Err(EngineError::Rejected(message));
    }

    match mode {
        ScanMode::Upload => {
            let marker = match (object.get("x"), object.get("y")) {
                (None, None) => None,
                (Some(x), Some(y)) => match (x.as_i64(), y.as_i64()) {
                    (Some(x), Some(y)) => Some(MapMarker { x, y }),
                    _ => {
                        return Err(EngineError::Protocol(format!(
                            "marker coordinates must be integers, got x={x}, y={y}"
                        )))
                    }
                },
                _ => {
                    return Err(EngineError::Protocol(
                        "marker needs both x and y".to_string(),
                    ))
                }
            };
            Ok(DispatchOutcome::Uploaded { marker })
        }
        ScanMode::Query => match object.get("location") {
            Some(Value::String(location)) => Ok(DispatchOutcome::LocationResolved {
                location: location.clone(),
            }),
            Some(other) => Err(EngineError::Protocol(format!(
                "location must be a string, got {other}"
            ))),
            None => Err(EngineError::Protocol(
                "response carries neither location nor error".to_string(),
            )),
        },
    }
}

struct DispatchJob {
    fingerprint: Fingerprint,
    handler: Arc<dyn CompletionHandler>,
}

/// Submits fingerprints on a worker thread and routes results to handlers.
pub struct Dispatcher {
    jobs: Option<Sender<DispatchJob>>,
    worker: Option<JoinHandle<()>>,
}

impl Dispatcher {
    /// Start the dispatch worker.
    pub fn new(transport: Arc<dyn FingerprintTransport>, log: SharedTransparencyLog) -> Self {
        let (jobs, queue) = unbounded::<DispatchJob>();

        let worker = thread::Builder::new()
            .name("fingerprint-dispatch".to_string())
            .spawn(move || {
                for job in queue {
                    Self::complete(transport.as_ref(), &log, job);
                }
            });

        let worker = match worker {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::error!("Failed to start dispatch worker: {e}");
                None
            }
        };

        Self {
            jobs: Some(jobs),
            worker,
        }
    }

    /// Queue a fingerprint for submission. Returns immediately.
    pub fn dispatch(&self, fingerprint: Fingerprint, handler: Arc<dyn CompletionHandler>) {
        let job = DispatchJob {
            fingerprint,
            handler,
        };

        let rejected = match (&self.jobs, &self.worker) {
            (Some(jobs), Some(_)) => jobs.send(job).err().map(|e| e.into_inner()),
            _ => Some(job),
        };

        if let Some(job) = rejected {
            tracing::error!(fingerprint = %job.fingerprint.id, "dispatch worker unavailable");
            job.handler.on_failure(&EngineError::Transport(
                "dispatch worker unavailable".to_string(),
            ));
        }
    }

    /// Finish every queued dispatch, then stop the worker.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        // Closing the queue ends the worker loop once it is drained.
        self.jobs.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("dispatch worker panicked");
            }
        }
    }

    fn complete(transport: &dyn FingerprintTransport, log: &SharedTransparencyLog, job: DispatchJob) {
        let DispatchJob {
            fingerprint,
            handler,
        } = job;

        let result = transport
            .submit(&fingerprint)
            .and_then(|body| interpret_response(fingerprint.mode, &body));

        match result {
            Ok(DispatchOutcome::Uploaded { marker }) => {
                tracing::info!(
                    fingerprint = %fingerprint.id,
                    location = fingerprint.location_ref.as_deref().unwrap_or(""),
                    "fingerprint uploaded"
                );
                log.record_fingerprint_uploaded();
                handler.on_uploaded(marker);
            }
            Ok(DispatchOutcome::LocationResolved { location }) => {
                tracing::info!(fingerprint = %fingerprint.id, %location, "location resolved");
                log.record_location_resolved();
                handler.on_location_resolved(&location);
            }
            Err(e) => {
                tracing::warn!(fingerprint = %fingerprint.id, kind = e.kind(), "dispatch failed: {e}");
                log.record_dispatch_failure();
                handler.on_failure(&e);
            }
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fingerprint::FingerprintBuilder;
    use crate::transparency::create_shared_log;
    use serde_json::json;
    use std::sync::Mutex;

    #[test]
    fn test_upload_success_with_marker() {
        let outcome = interpret_response(ScanMode::Upload, &json!({"x": 12, "y": 40})).unwrap();
        assert_eq!(
            outcome,
            DispatchOutcome::Uploaded {
                marker: Some(MapMarker { x: 12, y: 40 })
            }
        );
    }

    #[test]
    fn test_upload_success_without_marker() {
        let outcome = interpret_response(ScanMode::Upload, &json!({})).unwrap();
        assert_eq!(outcome, DispatchOutcome::Uploaded { marker: None });
    }

    #[test]
    fn test_error_field_is_rejection() {
        let err = interpret_response(ScanMode::Upload, &json!({"error": "unknown lid"})).unwrap_err();
        assert_eq!(err, EngineError::Rejected("unknown lid".to_string()));

        let err = interpret_response(ScanMode::Query, &json!({"error": "no match", "location": "x"}))
            .unwrap_err();
        assert_eq!(err.kind(), "rejected");
    }

    #[test]
    fn test_malformed_marker_is_protocol_error() {
        let err = interpret_response(ScanMode::Upload, &json!({"x": 1})).unwrap_err();
        assert_eq!(err.kind(), "protocol_error");

        let err = interpret_response(ScanMode::Upload, &json!({"x": "1", "y": 2})).unwrap_err();
        assert_eq!(err.kind(), "protocol_error");
    }

    #[test]
    fn test_query_location() {
        let outcome = interpret_response(ScanMode::Query, &json!({"location": "room-204"})).unwrap();
        assert_eq!(
            outcome,
            DispatchOutcome::LocationResolved {
                location: "room-204".to_string()
            }
        );

        let err = interpret_response(ScanMode::Query, &json!({})).unwrap_err();
        assert_eq!(err.kind(), "protocol_error");
        let err = interpret_response(ScanMode::Query, &json!({"location": 4})).unwrap_err();
        assert_eq!(err.kind(), "protocol_error");
    }

    #[test]
    fn test_non_object_body() {
        let err = interpret_response(ScanMode::Query, &json!(["room"])).unwrap_err();
        assert_eq!(err.kind(), "protocol_error");
    }

    struct FixedTransport(Result<Value, EngineError>);

    impl FingerprintTransport for FixedTransport {
        fn submit(&self, _fingerprint: &Fingerprint) -> Result<Value, EngineError> {
            self.0.clone()
        }
    }

    #[test]
    fn test_dispatcher_routes_exactly_one_callback() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let (ok, failed) = (Arc::clone(&calls), Arc::clone(&calls));
        let handler: Arc<dyn CompletionHandler> = Arc::new(QueryCompletionHandler::new(
            move |loc| ok.lock().unwrap().push(format!("resolved:{loc}")),
            move |e| failed.lock().unwrap().push(format!("failed:{}", e.kind())),
        ));

        let log = create_shared_log();
        let dispatcher = Dispatcher::new(
            Arc::new(FixedTransport(Ok(json!({"location": "lab"})))),
            Arc::clone(&log),
        );
        let fp = FingerprintBuilder::new().build(Vec::new(), ScanMode::Query, None, 2);
        dispatcher.dispatch(fp, handler);
        dispatcher.shutdown();

        assert_eq!(*calls.lock().unwrap(), vec!["resolved:lab".to_string()]);
        assert_eq!(log.stats().locations_resolved, 1);
    }

    #[test]
    fn test_dispatcher_reports_transport_failure() {
        let failures = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&failures);
        let handler: Arc<dyn CompletionHandler> = Arc::new(UploadCompletionHandler::new(
            |_| panic!("upload must not succeed"),
            move |e| sink.lock().unwrap().push(e.clone()),
        ));

        let log = create_shared_log();
        let dispatcher = Dispatcher::new(
            Arc::new(FixedTransport(Err(EngineError::Transport("refused".into())))),
            Arc::clone(&log),
        );
        let fp = FingerprintBuilder::new().build(
            Vec::new(),
            ScanMode::Upload,
            Some("room".to_string()),
            10,
        );
        dispatcher.dispatch(fp, handler);
        drop(dispatcher);

        assert_eq!(
            *failures.lock().unwrap(),
            vec![EngineError::Transport("refused".to_string())]
        );
        assert_eq!(log.stats().dispatch_failures, 1);
    }
}
