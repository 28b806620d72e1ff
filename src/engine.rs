//! The scan polling engine.
//!
//! A cycle moves `Idle → Polling → Finalizing → Idle`:
//!
//! ```text
//!  start() ──▶ Polling ──scan report──▶ record ──more polls?──▶ start_scan
//!                                          │
//!                                          └─ done ──▶ Finalizing ──▶ reduce
//!                                                           │          │
//!                                               Idle ◀──────┴─ dispatch┘
//! ```
//!
//! Scan reports arrive on a channel owned by the engine, so they are handled
//! one at a time and the observation set is never shared. Each cycle carries a
//! generation number; reports from an older generation (a cancelled or timed
//! out cycle) are ignored.

use crate::collector::types::ScanReport;
use crate::collector::ScanSampler;
use crate::core::aggregator::{Aggregator, ObservationSet};
use crate::core::fingerprint::{FingerprintBuilder, ScanMode};
use crate::core::stats::reduce;
use crate::dispatch::{CompletionHandler, Dispatcher};
use crate::error::EngineError;
use crate::transparency::SharedTransparencyLog;
use crate::transport::FingerprintTransport;
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Progress is reported every this many completed polls.
pub const PROGRESS_INTERVAL: u32 = 5;

/// Default bound on the wait for a single scan.
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(15);

/// Engine lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Polling,
    Finalizing,
}

/// Parameters of one polling cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleRequest {
    pub poll_count: u32,
    pub mode: ScanMode,
    pub location_ref: Option<String>,
}

impl CycleRequest {
    /// Collect ground truth for `location`.
    pub fn upload(poll_count: u32, location: impl Into<String>) -> Self {
        Self {
            poll_count,
            mode: ScanMode::Upload,
            location_ref: Some(location.into()),
        }
    }

    /// Ask where the device is.
    pub fn query(poll_count: u32) -> Self {
        Self {
            poll_count,
            mode: ScanMode::Query,
            location_ref: None,
        }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.poll_count < 1 {
            return Err(EngineError::InvalidArgument(
                "poll count must be at least 1".to_string(),
            ));
        }
        let has_location = self
            .location_ref
            .as_deref()
            .is_some_and(|l| !l.trim().is_empty());
        if self.mode == ScanMode::Upload && !has_location {
            return Err(EngineError::InvalidArgument(
                "upload mode requires a location reference".to_string(),
            ));
        }
        Ok(())
    }
}

/// What a finalized cycle produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleSummary {
    pub generation: u64,
    pub mode: ScanMode,
    pub polls: u32,
    /// Distinct emitters in the fingerprint
    pub emitters: usize,
    pub fingerprint_id: Uuid,
}

/// Result of handing one scan report to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutcome {
    /// Stale generation, or no cycle polling
    Ignored,
    /// Readings recorded and the next scan issued
    Recorded { polls_completed: u32 },
    /// Last poll recorded; the fingerprint has been dispatched
    Finalized(CycleSummary),
}

/// Observational notifications for a UI. Sending never blocks the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineNotice {
    Progress {
        generation: u64,
        polls_completed: u32,
        polls_requested: u32,
    },
    Finalized(CycleSummary),
    Aborted {
        generation: u64,
        reason: String,
    },
}

/// State of the active cycle, built in full before the first scan.
struct PollCycle {
    generation: u64,
    request: CycleRequest,
    polls_completed: u32,
    handler: Arc<dyn CompletionHandler>,
}

/// Drives repeated scans, aggregates them and dispatches the fingerprint.
pub struct ScanEngine<S: ScanSampler> {
    sampler: S,
    reports_tx: Sender<ScanReport>,
    reports_rx: Receiver<ScanReport>,
    aggregator: Aggregator,
    builder: FingerprintBuilder,
    dispatcher: Dispatcher,
    state: EngineState,
    cycle: Option<PollCycle>,
    generation: u64,
    scan_timeout: Duration,
    notices: Option<Sender<EngineNotice>>,
    log: SharedTransparencyLog,
}

impl<S: ScanSampler> ScanEngine<S> {
    /// Create an idle engine. Dispatch results go to each cycle's handler.
    pub fn new(
        sampler: S,
        transport: Arc<dyn FingerprintTransport>,
        log: SharedTransparencyLog,
    ) -> Self {
        let (reports_tx, reports_rx) = unbounded();
        Self {
            sampler,
            reports_tx,
            reports_rx,
            aggregator: Aggregator::new(),
            builder: FingerprintBuilder::new(),
            dispatcher: Dispatcher::new(transport, Arc::clone(&log)),
            state: EngineState::Idle,
            cycle: None,
            generation: 0,
            scan_timeout: DEFAULT_SCAN_TIMEOUT,
            notices: None,
            log,
        }
    }

    /// Set the bounded wait used by [`run_cycle`](Self::run_cycle).
    pub fn with_scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout = timeout;
        self
    }

    /// Receive progress, finalize and abort notices. Replaces any earlier
    /// subscription.
    pub fn subscribe_notices(&mut self) -> Receiver<EngineNotice> {
        let (tx, rx) = bounded(256);
        self.notices = Some(tx);
        rx
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Generation of the most recently started cycle (0 before the first).
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Polls completed in the active cycle.
    pub fn polls_completed(&self) -> Option<u32> {
        self.cycle.as_ref().map(|c| c.polls_completed)
    }

    /// Observations accumulated in the active cycle.
    pub fn observations(&self) -> &ObservationSet {
        self.aggregator.observations()
    }

    pub fn sampler(&self) -> &S {
        &self.sampler
    }

    pub fn instance_id(&self) -> Uuid {
        self.builder.instance_id()
    }

    /// Start a polling cycle and issue its first scan.
    ///
    /// Returns the cycle's generation. A rejected call leaves the engine
    /// untouched.
    pub fn start(
        &mut self,
        request: CycleRequest,
        handler: Arc<dyn CompletionHandler>,
    ) -> Result<u64, EngineError> {
        if self.state != EngineState::Idle {
            return Err(EngineError::AlreadyInProgress);
        }
        request.validate()?;

        self.generation += 1;
        let generation = self.generation;
        tracing::info!(
            generation,
            mode = %request.mode,
            polls = request.poll_count,
            location = request.location_ref.as_deref().unwrap_or(""),
            "scan cycle started"
        );

        self.aggregator.reset();
        self.cycle = Some(PollCycle {
            generation,
            request,
            polls_completed: 0,
            handler,
        });
        self.sampler.subscribe(self.reports_tx.clone());
        self.state = EngineState::Polling;
        self.issue_scan(generation);

        Ok(generation)
    }

    /// Process one scan report.
    pub fn handle_report(&mut self, report: ScanReport) -> ReportOutcome {
        if self.state != EngineState::Polling {
            tracing::debug!(generation = report.generation, "scan report while idle, ignored");
            return ReportOutcome::Ignored;
        }

        let mut cycle = match self.cycle.take() {
            Some(cycle) if cycle.generation == report.generation => cycle,
            other => {
                tracing::debug!(
                    generation = report.generation,
                    current = self.generation,
                    "stale scan report ignored"
                );
                self.cycle = other;
                return ReportOutcome::Ignored;
            }
        };

        self.aggregator.record(&report.readings);
        self.log.record_scan_completed(report.readings.len());
        cycle.polls_completed += 1;

        let generation = cycle.generation;
        let polls_completed = cycle.polls_completed;
        let polls_requested = cycle.request.poll_count;
        tracing::debug!(
            generation,
            polls_completed,
            polls_requested,
            readings = report.readings.len(),
            "scan recorded"
        );

        if polls_completed % PROGRESS_INTERVAL == 0 {
            tracing::info!(generation, "Did scan {polls_completed} of {polls_requested}");
            self.notify(EngineNotice::Progress {
                generation,
                polls_completed,
                polls_requested,
            });
        }

        if polls_completed < polls_requested {
            self.cycle = Some(cycle);
            self.issue_scan(generation);
            ReportOutcome::Recorded { polls_completed }
        } else {
            ReportOutcome::Finalized(self.finalize(cycle))
        }
    }

    /// Wait up to `timeout` for the active cycle's next scan and process it.
    ///
    /// Stale reports are consumed without resetting the wait. When nothing
    /// arrives in time the cycle is aborted, its handler is told once, and
    /// `ScanTimeout` is returned.
    pub fn poll_next(&mut self, timeout: Duration) -> Result<ReportOutcome, EngineError> {
        if self.state != EngineState::Polling {
            return Ok(ReportOutcome::Ignored);
        }

        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.reports_rx.recv_timeout(remaining) {
                Ok(report) => match self.handle_report(report) {
                    ReportOutcome::Ignored => continue,
                    outcome => return Ok(outcome),
                },
                // The engine holds a sender itself, so disconnection cannot
                // happen; treat it like silence.
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return Err(self.abort_on_timeout());
                }
            }
        }
    }

    /// Run a whole cycle, waiting at most the scan timeout for each scan.
    pub fn run_cycle(
        &mut self,
        request: CycleRequest,
        handler: Arc<dyn CompletionHandler>,
    ) -> Result<CycleSummary, EngineError> {
        self.start(request, handler)?;
        loop {
            match self.poll_next(self.scan_timeout)? {
                ReportOutcome::Finalized(summary) => return Ok(summary),
                ReportOutcome::Recorded { .. } => continue,
                ReportOutcome::Ignored => {
                    return Err(EngineError::InvalidArgument(
                        "cycle ended without a fingerprint".to_string(),
                    ))
                }
            }
        }
    }

    /// Abandon the polling cycle. Returns false when there was none.
    ///
    /// Accumulated readings are discarded; a scan still in flight will report
    /// under the old generation and be ignored.
    pub fn cancel(&mut self) -> bool {
        match self.abort_cycle() {
            Some(cycle) => {
                tracing::info!(generation = cycle.generation, "scan cycle cancelled");
                self.notify(EngineNotice::Aborted {
                    generation: cycle.generation,
                    reason: "cancelled".to_string(),
                });
                true
            }
            None => false,
        }
    }

    /// Stop listening for scans and wait for queued dispatches to finish.
    pub fn shutdown(mut self) {
        self.abort_cycle();
        self.dispatcher.shutdown();
    }

    fn issue_scan(&mut self, generation: u64) {
        self.log.record_scan_requested();
        self.sampler.start_scan(generation);
    }

    fn finalize(&mut self, cycle: PollCycle) -> CycleSummary {
        self.state = EngineState::Finalizing;
        self.sampler.unsubscribe();

        let PollCycle {
            generation,
            request,
            polls_completed,
            handler,
        } = cycle;

        let entries = reduce(&self.aggregator.take());
        let fingerprint =
            self.builder
                .build(entries, request.mode, request.location_ref, polls_completed);

        let summary = CycleSummary {
            generation,
            mode: fingerprint.mode,
            polls: polls_completed,
            emitters: fingerprint.len(),
            fingerprint_id: fingerprint.id,
        };
        tracing::info!(
            generation,
            mode = %summary.mode,
            emitters = summary.emitters,
            fingerprint = %summary.fingerprint_id,
            "scan cycle finalized"
        );

        self.dispatcher.dispatch(fingerprint, handler);
        self.state = EngineState::Idle;
        self.notify(EngineNotice::Finalized(summary.clone()));
        summary
    }

    fn abort_cycle(&mut self) -> Option<PollCycle> {
        let cycle = self.cycle.take()?;
        self.sampler.unsubscribe();
        self.aggregator.reset();
        self.state = EngineState::Idle;
        self.log.record_cycle_aborted();
        Some(cycle)
    }

    fn abort_on_timeout(&mut self) -> EngineError {
        let Some(cycle) = self.abort_cycle() else {
            return EngineError::ScanTimeout {
                polls_completed: 0,
                polls_requested: 0,
            };
        };

        let error = EngineError::ScanTimeout {
            polls_completed: cycle.polls_completed,
            polls_requested: cycle.request.poll_count,
        };
        tracing::warn!(generation = cycle.generation, "{error}");
        cycle.handler.on_failure(&error);
        self.notify(EngineNotice::Aborted {
            generation: cycle.generation,
            reason: error.to_string(),
        });
        error
    }

    fn notify(&self, notice: EngineNotice) {
        if let Some(ref notices) = self.notices {
            // A slow or absent listener must not stall polling.
            let _ = notices.try_send(notice);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::types::SignalReading;
    use crate::collector::ScriptedSampler;
    use crate::core::fingerprint::Fingerprint;
    use crate::dispatch::QueryCompletionHandler;
    use crate::transparency::create_shared_log;
    use serde_json::{json, Value};

    struct NullTransport;

    impl FingerprintTransport for NullTransport {
        fn submit(&self, _fingerprint: &Fingerprint) -> Result<Value, EngineError> {
            Ok(json!({"location": "nowhere"}))
        }
    }

    fn handler() -> Arc<dyn CompletionHandler> {
        Arc::new(QueryCompletionHandler::new(|_| {}, |_| {}))
    }

    fn engine(sampler: ScriptedSampler) -> ScanEngine<ScriptedSampler> {
        ScanEngine::new(sampler, Arc::new(NullTransport), create_shared_log())
    }

    #[test]
    fn test_request_validation() {
        assert!(CycleRequest::query(1).validate().is_ok());
        assert!(CycleRequest::upload(10, "room-1").validate().is_ok());
        assert!(matches!(
            CycleRequest::query(0).validate(),
            Err(EngineError::InvalidArgument(_))
        ));
        assert!(matches!(
            CycleRequest::upload(3, "  ").validate(),
            Err(EngineError::InvalidArgument(_))
        ));

        let missing = CycleRequest {
            poll_count: 3,
            mode: ScanMode::Upload,
            location_ref: None,
        };
        assert!(matches!(
            missing.validate(),
            Err(EngineError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_start_enters_polling_and_scans_once() {
        let sampler = ScriptedSampler::new(Vec::new());
        let scans = sampler.scan_counter();
        let mut engine = engine(sampler);

        let generation = engine.start(CycleRequest::query(3), handler()).unwrap();
        assert_eq!(generation, 1);
        assert_eq!(engine.state(), EngineState::Polling);
        assert_eq!(engine.polls_completed(), Some(0));
        assert!(engine.sampler().is_subscribed());
        assert_eq!(scans.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn test_handle_report_ignores_stale_generation() {
        let mut engine = engine(ScriptedSampler::silent());
        let generation = engine.start(CycleRequest::query(2), handler()).unwrap();

        let stale = ScanReport::new(generation + 5, vec![SignalReading::new("aa", -40)]);
        assert_eq!(engine.handle_report(stale), ReportOutcome::Ignored);
        assert!(engine.observations().is_empty());
        assert_eq!(engine.polls_completed(), Some(0));
    }

    #[test]
    fn test_handle_report_while_idle_is_ignored() {
        let mut engine = engine(ScriptedSampler::silent());
        let outcome = engine.handle_report(ScanReport::empty(0));
        assert_eq!(outcome, ReportOutcome::Ignored);
        assert_eq!(engine.state(), EngineState::Idle);
    }

    #[test]
    fn test_finalize_returns_to_idle() {
        let mut engine = engine(ScriptedSampler::silent());
        let generation = engine.start(CycleRequest::query(2), handler()).unwrap();

        let first = engine.handle_report(ScanReport::new(
            generation,
            vec![SignalReading::new("aa", -40)],
        ));
        assert_eq!(first, ReportOutcome::Recorded { polls_completed: 1 });

        let second = engine.handle_report(ScanReport::new(
            generation,
            vec![SignalReading::new("aa", -50), SignalReading::new("bb", -70)],
        ));
        match second {
            ReportOutcome::Finalized(summary) => {
                assert_eq!(summary.generation, generation);
                assert_eq!(summary.polls, 2);
                assert_eq!(summary.emitters, 2);
            }
            other => panic!("expected finalize, got {other:?}"),
        }
        assert_eq!(engine.state(), EngineState::Idle);
        assert!(!engine.sampler().is_subscribed());
        assert_eq!(engine.polls_completed(), None);
    }

    #[test]
    fn test_cancel_discards_cycle() {
        let mut engine = engine(ScriptedSampler::silent());
        let notices = engine.subscribe_notices();
        let generation = engine.start(CycleRequest::query(4), handler()).unwrap();
        engine.handle_report(ScanReport::new(generation, vec![SignalReading::new("aa", -40)]));

        assert!(engine.cancel());
        assert_eq!(engine.state(), EngineState::Idle);
        assert!(engine.observations().is_empty());
        assert!(!engine.cancel());

        assert_eq!(
            notices.try_recv().unwrap(),
            EngineNotice::Aborted {
                generation,
                reason: "cancelled".to_string()
            }
        );
    }
}
