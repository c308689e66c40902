// src/orchestrator/orchestrator.rs
//! Mode orchestration around intercepted calls
//!
//! `intercept` wraps the host's own handling of a request. Depending on the
//! effective mode it passes the call through, captures it, or verifies the
//! fresh response against the persisted baseline. `replay` is the driver
//! side: it loads a record, re-issues it against a target and compares.

use super::mode::{EffectiveMode, Mode};
use crate::codec::SerdeRegistry;
use crate::compare::CompareEngine;
use crate::model::{find_header, HeaderMap, RequestPayload, ResponsePayload, TestRecord};
use crate::observability::{CAPTURE_DROPPED, REPLAY_TOTAL};
use crate::recording::{CaptureQueue, CapturePersister, QueueConfig};
use crate::replay::{ExecutorRegistry, ReplayReport, REPLAY_ID_HEADER, REPLAY_MODE_HEADER};
use crate::sampling::{SamplingConfig, SamplingGate};
use crate::sink::SinkPort;
use crate::utils::config::{EngineConfig, QueueSettings};
use crate::utils::errors::{EngineError, Result};
use futures::future::join_all;
use metrics::counter;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Collaborators of a `ModeOrchestrator`
pub struct OrchestratorParts {
    pub mode: Mode,
    pub sampling: SamplingConfig,
    pub queue: Arc<CaptureQueue>,
    pub sink: Arc<dyn SinkPort>,
    pub serde: Arc<SerdeRegistry>,
    pub executors: Arc<ExecutorRegistry>,
    pub compare: CompareEngine,
}

/// An inbound call as seen at the interception boundary
#[derive(Debug, Clone)]
pub struct InterceptedCall {
    /// `"METHOD PATH"` used for sampling
    pub identity: String,
    pub request: RequestPayload,

    /// Inbound headers, searched for replay markers
    pub headers: HeaderMap,
}

impl InterceptedCall {
    pub fn new(request: RequestPayload) -> Self {
        Self {
            identity: request.identity(),
            headers: request.headers().clone(),
            request,
        }
    }

    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = identity.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// What the host's handler produced
#[derive(Debug, Clone)]
pub struct Observed<T> {
    pub output: T,

    /// Response snapshot, when the host could observe one
    pub response: Option<ResponsePayload>,
}

impl<T> Observed<T> {
    pub fn new(output: T, response: ResponsePayload) -> Self {
        Self {
            output,
            response: Some(response),
        }
    }

    pub fn output_only(output: T) -> Self {
        Self {
            output,
            response: None,
        }
    }
}

/// Outcome of an intercepted call
#[derive(Debug)]
pub struct Intercepted<T> {
    /// Whatever the host's handler returned
    pub output: T,

    pub mode: EffectiveMode,

    /// Id of the queued record in PROFILE mode
    pub captured: Option<String>,

    /// Comparison verdict in TEST mode, or the error that prevented it
    pub verdict: Option<Result<ReplayReport>>,
}

/// Per-request mode resolution plus capture and verification
pub struct ModeOrchestrator {
    mode: Mode,
    gate: SamplingGate,
    sampling: SamplingConfig,
    queue: Arc<CaptureQueue>,
    sink: Arc<dyn SinkPort>,
    serde: Arc<SerdeRegistry>,
    executors: Arc<ExecutorRegistry>,
    compare: CompareEngine,
    purge_interval: Duration,
}

impl ModeOrchestrator {
    pub fn new(parts: OrchestratorParts) -> Self {
        info!("Mode orchestrator running in {} mode", parts.mode);

        Self {
            mode: parts.mode,
            gate: SamplingGate::new(),
            sampling: parts.sampling,
            queue: parts.queue,
            sink: parts.sink,
            serde: parts.serde,
            executors: parts.executors,
            compare: parts.compare,
            purge_interval: Duration::from_secs(QueueSettings::default().purge_interval_secs),
        }
    }

    /// Build every collaborator except the sink and executors from configuration
    pub fn from_config(
        config: &EngineConfig,
        sink: Arc<dyn SinkPort>,
        executors: Arc<ExecutorRegistry>,
    ) -> Result<Self> {
        config.validate()?;

        let serde = Arc::new(SerdeRegistry::from_settings(&config.codecs));
        let compare = CompareEngine::from_settings(&config.compare)?.with_registry(Arc::clone(&serde));

        Ok(Self::new(OrchestratorParts {
            mode: config.mode,
            sampling: SamplingConfig::from_settings(&config.sampling)?,
            queue: Arc::new(CaptureQueue::with_config(&QueueConfig::from(&config.queue))?),
            sink,
            serde,
            executors,
            compare,
        })
        .with_purge_interval(Duration::from_secs(config.queue.purge_interval_secs)))
    }

    pub fn with_purge_interval(mut self, purge_interval: Duration) -> Self {
        self.purge_interval = purge_interval;
        self
    }

    pub fn purge_interval(&self) -> Duration {
        self.purge_interval
    }

    /// Persister draining this orchestrator's queue into its sink every purge interval
    pub fn persister(&self) -> CapturePersister {
        CapturePersister::new(
            Arc::clone(&self.queue),
            Arc::clone(&self.sink),
            Arc::clone(&self.serde),
            self.purge_interval,
        )
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn queue(&self) -> &Arc<CaptureQueue> {
        &self.queue
    }

    pub fn sampling(&self) -> &SamplingConfig {
        &self.sampling
    }

    /// Effective mode for one call
    ///
    /// In DYNAMIC mode an `x-replay-mode` marker wins; without one, or with
    /// an unknown value, the sampling gate picks PROFILE or NONE. TEST needs
    /// an `x-replay-id` marker.
    pub fn resolve(&self, call: &InterceptedCall) -> Result<EffectiveMode> {
        match self.mode {
            Mode::None => Ok(EffectiveMode::None),
            Mode::Profile => Ok(self.sampled(call)),
            Mode::Test => Self::test_mode(call),
            Mode::Dynamic => {
                let Some(marker) = find_header(&call.headers, REPLAY_MODE_HEADER) else {
                    return Ok(self.sampled(call));
                };

                match Mode::from_marker(marker) {
                    Some(Mode::Test) => Self::test_mode(call),
                    Some(Mode::Profile) => Ok(EffectiveMode::Profile),
                    Some(Mode::None) => Ok(EffectiveMode::None),
                    _ => {
                        warn!(
                            "Unknown {} value '{}', falling back to sampling",
                            REPLAY_MODE_HEADER, marker
                        );
                        Ok(self.sampled(call))
                    }
                }
            }
        }
    }

    fn sampled(&self, call: &InterceptedCall) -> EffectiveMode {
        if self.gate.should_capture(&call.identity, &self.sampling) {
            EffectiveMode::Profile
        } else {
            EffectiveMode::None
        }
    }

    fn test_mode(call: &InterceptedCall) -> Result<EffectiveMode> {
        match find_header(&call.headers, REPLAY_ID_HEADER).map(str::trim) {
            Some(id) if !id.is_empty() => Ok(EffectiveMode::Test {
                replay_id: id.to_string(),
            }),
            _ => Err(EngineError::MissingReplayId),
        }
    }

    /// Run `work` for `call` under the call's effective mode
    ///
    /// The work always runs exactly once and its output is always returned.
    /// Capture problems are logged and dropped. Verification problems,
    /// including a TEST resolution without a replay id, come back in
    /// `verdict`.
    pub async fn intercept<T, F, Fut>(&self, call: InterceptedCall, work: F) -> Intercepted<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Observed<T>>,
    {
        let mode = match self.resolve(&call) {
            Ok(mode) => mode,
            Err(e) => {
                warn!("Passing {} through: {}", call.identity, e);
                let observed = work().await;
                return Intercepted {
                    output: observed.output,
                    mode: EffectiveMode::None,
                    captured: None,
                    verdict: Some(Err(e)),
                };
            }
        };

        debug!("{} resolved to {:?}", call.identity, mode);
        let Observed { output, response } = work().await;

        match mode {
            EffectiveMode::None => Intercepted {
                output,
                mode,
                captured: None,
                verdict: None,
            },
            EffectiveMode::Profile => {
                let captured = self.capture(call, response);
                Intercepted {
                    output,
                    mode,
                    captured,
                    verdict: None,
                }
            }
            EffectiveMode::Test { ref replay_id } => {
                let verdict = self.verify(replay_id, response.as_ref()).await;
                Intercepted {
                    output,
                    mode,
                    captured: None,
                    verdict: Some(verdict),
                }
            }
        }
    }

    fn capture(&self, call: InterceptedCall, response: Option<ResponsePayload>) -> Option<String> {
        let mut record = TestRecord::capture(call.request).with_identity(call.identity);

        if let Some(response) = response {
            if let Err(e) = record.attach_response(response) {
                counter!(CAPTURE_DROPPED).increment(1);
                warn!("Dropped capture {}: {}", record.id(), e);
                return None;
            }
        }

        let id = record.id().to_string();
        self.queue.enqueue(record).then_some(id)
    }

    /// Compare a candidate response observed in TEST mode with its baseline
    async fn verify(&self, id: &str, candidate: Option<&ResponsePayload>) -> Result<ReplayReport> {
        let start = Instant::now();
        let result = async {
            let record = self.load(id).await?;
            let report = self.judge(&record, candidate, start)?;
            self.persist_report(&report).await?;
            Ok(report)
        }
        .await;

        Self::count(&result);
        result
    }

    /// Replay one record against `client_id` and compare with its baseline
    pub async fn replay(&self, id: &str, client_id: &str) -> Result<ReplayReport> {
        let start = Instant::now();
        let result = async {
            let record = self.load(id).await?;
            let candidate = self.executors.dispatch(&record, client_id).await?;
            let report = self.judge(&record, Some(&candidate), start)?;
            self.persist_report(&report).await?;
            Ok(report)
        }
        .await;

        match &result {
            Ok(report) => debug!("Replay of {} finished: {}", id, report.outcome()),
            Err(e) => error!("Replay of {} failed: {}", id, e),
        }
        Self::count(&result);
        result
    }

    /// Replay distinct ids concurrently, in first-seen order
    pub async fn replay_many<S: AsRef<str>>(
        &self,
        ids: &[S],
        client_id: &str,
    ) -> Vec<(String, Result<ReplayReport>)> {
        let mut seen = HashSet::new();
        let distinct: Vec<&str> = ids
            .iter()
            .map(AsRef::as_ref)
            .filter(|id| seen.insert(*id))
            .collect();

        info!("Replaying {} records against {}", distinct.len(), client_id);

        let results = join_all(distinct.iter().map(|id| self.replay(id, client_id))).await;
        distinct
            .into_iter()
            .map(String::from)
            .zip(results)
            .collect()
    }

    /// Load and validate a persisted record
    pub async fn load(&self, id: &str) -> Result<TestRecord> {
        let bytes = self.sink.read(id).await?;
        let record: TestRecord = self.serde.decode(&bytes)?;
        record.validate()?;
        Ok(record)
    }

    fn judge(
        &self,
        record: &TestRecord,
        candidate: Option<&ResponsePayload>,
        start: Instant,
    ) -> Result<ReplayReport> {
        let comparable = match (record.response(), candidate) {
            (Some(baseline), Some(candidate))
                if !record.protocol().is_fire_and_forget()
                    && !baseline.is_delivery_only()
                    && !candidate.is_delivery_only() =>
            {
                Some((baseline, candidate))
            }
            _ => None,
        };

        let report = match comparable {
            Some((baseline, candidate)) => {
                let diffs = self.compare.compare(baseline, candidate)?;
                ReplayReport::compared(record.id(), record.protocol(), diffs, start.elapsed())
            }
            None => {
                debug!("Nothing to compare for {}", record.id());
                ReplayReport::not_compared(record.id(), record.protocol(), start.elapsed())
            }
        };

        Ok(report)
    }

    async fn persist_report(&self, report: &ReplayReport) -> Result<()> {
        self.sink
            .write_result(&report.record_id, &report.to_json()?)
            .await
    }

    fn count(result: &Result<ReplayReport>) {
        let outcome = match result {
            Ok(report) => report.outcome(),
            Err(_) => "error",
        };
        counter!(REPLAY_TOTAL, "outcome" => outcome).increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::DiffKind;
    use crate::model::{DeliveryReceipt, HttpRequest, HttpResponse, MessageSend, ProtocolTag};
    use crate::replay::ReplayExecutor;
    use crate::sink::InMemorySink;
    use async_trait::async_trait;

    /// Answers every replay with a fixed response
    struct FixedExecutor(ResponsePayload);

    #[async_trait]
    impl ReplayExecutor for FixedExecutor {
        async fn execute(&self, _record: &TestRecord, _client_id: &str) -> Result<ResponsePayload> {
            Ok(self.0.clone())
        }
    }

    struct Harness {
        orchestrator: ModeOrchestrator,
        sink: Arc<InMemorySink>,
        serde: Arc<SerdeRegistry>,
    }

    fn harness(mode: Mode, sampling: SamplingConfig) -> Harness {
        let sink = Arc::new(InMemorySink::new());
        let serde = Arc::new(SerdeRegistry::default());
        let executors = Arc::new(ExecutorRegistry::new());
        executors.register(
            ProtocolTag::Http,
            Arc::new(FixedExecutor(ResponsePayload::Http(
                HttpResponse::new(200).with_body(r#"{"total":12}"#),
            ))),
        );
        executors.register(
            ProtocolTag::MessageQueue,
            Arc::new(FixedExecutor(ResponsePayload::MessageQueue(
                DeliveryReceipt::default(),
            ))),
        );

        let orchestrator = ModeOrchestrator::new(OrchestratorParts {
            mode,
            sampling,
            queue: Arc::new(CaptureQueue::new(16)),
            sink: sink.clone(),
            serde: serde.clone(),
            executors,
            compare: CompareEngine::default(),
        });

        Harness {
            orchestrator,
            sink,
            serde,
        }
    }

    fn call() -> InterceptedCall {
        InterceptedCall::new(RequestPayload::Http(HttpRequest::new("GET", "/cart")))
    }

    fn ok_response(total: u32) -> ResponsePayload {
        ResponsePayload::Http(HttpResponse::new(200).with_body(format!("{{\"total\":{}}}", total)))
    }

    async fn store_baseline(h: &Harness, id: &str, total: u32) {
        let record = TestRecord::with_id(id, RequestPayload::Http(HttpRequest::new("GET", "/cart")))
            .with_response(ok_response(total))
            .unwrap();
        h.sink
            .write(id, &h.serde.encode(&record).unwrap())
            .await
            .unwrap();
    }

    #[test]
    fn test_configured_purge_interval_reaches_persister() {
        let mut config = EngineConfig::default();
        config.queue.purge_interval_secs = 7;

        let orchestrator = ModeOrchestrator::from_config(
            &config,
            Arc::new(InMemorySink::new()),
            Arc::new(ExecutorRegistry::new()),
        )
        .unwrap();

        assert_eq!(orchestrator.purge_interval(), Duration::from_secs(7));
        assert_eq!(orchestrator.persister().purge_interval(), Duration::from_secs(7));
    }

    #[test]
    fn test_from_config_rejects_zero_memory_slots() {
        let mut config = EngineConfig::default();
        config.queue.memory_slots = Some(0);

        let result = ModeOrchestrator::from_config(
            &config,
            Arc::new(InMemorySink::new()),
            Arc::new(ExecutorRegistry::new()),
        );
        assert!(matches!(result, Err(EngineError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_none_passes_through() {
        let h = harness(Mode::None, SamplingConfig::always());

        let result = h
            .orchestrator
            .intercept(call(), || async { Observed::new("body", ok_response(1)) })
            .await;

        assert_eq!(result.output, "body");
        assert_eq!(result.mode, EffectiveMode::None);
        assert!(result.captured.is_none());
        assert!(h.orchestrator.queue().is_empty());
    }

    #[tokio::test]
    async fn test_profile_captures_sampled_request() {
        let h = harness(Mode::Profile, SamplingConfig::always());

        let result = h
            .orchestrator
            .intercept(call(), || async { Observed::new(7, ok_response(3)) })
            .await;

        assert_eq!(result.output, 7);
        let id = result.captured.unwrap();

        let queued = h.orchestrator.queue().drain();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].id(), id);
        assert_eq!(queued[0].request_identity(), "GET /cart");
        assert_eq!(queued[0].response(), Some(&ok_response(3)));
    }

    #[tokio::test]
    async fn test_profile_skips_unsampled_request() {
        let h = harness(Mode::Profile, SamplingConfig::never());

        let result = h
            .orchestrator
            .intercept(call(), || async { Observed::new((), ok_response(3)) })
            .await;

        assert_eq!(result.mode, EffectiveMode::None);
        assert!(h.orchestrator.queue().is_empty());
    }

    #[tokio::test]
    async fn test_capture_failure_does_not_fail_request() {
        let h = harness(Mode::Profile, SamplingConfig::always());
        let wrong = ResponsePayload::MessageQueue(DeliveryReceipt::default());

        let result = h
            .orchestrator
            .intercept(call(), || async { Observed::new("served", wrong) })
            .await;

        assert_eq!(result.output, "served");
        assert!(result.captured.is_none());
        assert!(h.orchestrator.queue().is_empty());
    }

    #[tokio::test]
    async fn test_dynamic_profile_marker_forces_capture() {
        let h = harness(Mode::Dynamic, SamplingConfig::never());
        let call = call().with_header("X-Replay-Mode", "profile");

        let result = h
            .orchestrator
            .intercept(call, || async { Observed::output_only(()) })
            .await;

        assert_eq!(result.mode, EffectiveMode::Profile);
        assert!(result.captured.is_some());
    }

    #[tokio::test]
    async fn test_dynamic_unknown_marker_falls_back_to_sampling() {
        let h = harness(Mode::Dynamic, SamplingConfig::never());
        let call = call().with_header("x-replay-mode", "RECORD");

        assert_eq!(h.orchestrator.resolve(&call).unwrap(), EffectiveMode::None);
    }

    #[tokio::test]
    async fn test_dynamic_test_marker_compares_with_baseline() {
        let h = harness(Mode::Dynamic, SamplingConfig::never());
        store_baseline(&h, "rec-1", 10).await;

        let call = call()
            .with_header("x-replay-mode", "TEST")
            .with_header("x-replay-id", "rec-1");
        let result = h
            .orchestrator
            .intercept(call, || async { Observed::new("fresh", ok_response(12)) })
            .await;

        assert_eq!(result.output, "fresh");
        assert_eq!(
            result.mode,
            EffectiveMode::Test {
                replay_id: "rec-1".to_string()
            }
        );

        let report = result.verdict.unwrap().unwrap();
        assert!(report.compared);
        assert!(!report.passed);
        assert_eq!(report.diffs.len(), 1);
        assert_eq!(report.diffs[0].kind, DiffKind::Modify);
        assert_eq!(report.diffs[0].path, "/body/total");

        let stored: ReplayReport = serde_json::from_str(&h.sink.result("rec-1").unwrap()).unwrap();
        assert_eq!(stored.diffs, report.diffs);
    }

    #[tokio::test]
    async fn test_test_without_id_surfaces_error() {
        let h = harness(Mode::Dynamic, SamplingConfig::always());
        let call = call().with_header("x-replay-mode", "TEST");

        let mut ran = false;
        let result = h
            .orchestrator
            .intercept(call, || {
                ran = true;
                async { Observed::output_only(()) }
            })
            .await;

        assert!(ran);
        assert!(matches!(result.verdict, Some(Err(EngineError::MissingReplayId))));
        assert!(h.orchestrator.queue().is_empty());
    }

    #[tokio::test]
    async fn test_test_with_unknown_id_is_not_found() {
        let h = harness(Mode::Test, SamplingConfig::never());
        let call = call().with_header("x-replay-id", "missing");

        let result = h
            .orchestrator
            .intercept(call, || async { Observed::new((), ok_response(1)) })
            .await;

        assert!(matches!(result.verdict, Some(Err(EngineError::NotFound(_)))));
    }

    #[tokio::test]
    async fn test_replay_driver_side() {
        let h = harness(Mode::None, SamplingConfig::never());
        store_baseline(&h, "rec-2", 12).await;

        let report = h.orchestrator.replay("rec-2", "staging").await.unwrap();
        assert!(report.compared);
        assert!(report.passed);
        assert!(h.sink.result("rec-2").is_some());
    }

    #[tokio::test]
    async fn test_replay_unregistered_protocol() {
        let h = harness(Mode::None, SamplingConfig::never());
        let record = TestRecord::with_id(
            "evt-1",
            RequestPayload::EventStream(MessageSend::new("clicks", b"{}".to_vec())),
        );
        h.sink
            .write("evt-1", &h.serde.encode(&record).unwrap())
            .await
            .unwrap();

        assert!(matches!(
            h.orchestrator.replay("evt-1", "staging").await,
            Err(EngineError::Dispatch(ProtocolTag::EventStream))
        ));
    }

    #[tokio::test]
    async fn test_fire_and_forget_not_compared() {
        let h = harness(Mode::None, SamplingConfig::never());
        let record = TestRecord::with_id(
            "mq-1",
            RequestPayload::MessageQueue(MessageSend::new("orders", b"{}".to_vec())),
        )
        .with_response(ResponsePayload::MessageQueue(DeliveryReceipt {
            destination: "orders".to_string(),
            offset: Some(41),
            ..Default::default()
        }))
        .unwrap();
        h.sink
            .write("mq-1", &h.serde.encode(&record).unwrap())
            .await
            .unwrap();

        let report = h.orchestrator.replay("mq-1", "staging").await.unwrap();
        assert!(!report.compared);
        assert!(report.passed);
    }

    #[tokio::test]
    async fn test_replay_many_distinct_ids() {
        let h = harness(Mode::None, SamplingConfig::never());
        store_baseline(&h, "a", 12).await;
        store_baseline(&h, "b", 99).await;

        let results = h
            .orchestrator
            .replay_many(&["a", "b", "a", "missing"], "staging")
            .await;

        let ids: Vec<_> = results.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "missing"]);
        assert!(results[0].1.as_ref().unwrap().passed);
        assert!(!results[1].1.as_ref().unwrap().passed);
        assert!(matches!(results[2].1, Err(EngineError::NotFound(_))));
    }
}
