// tests/end_to_end.rs
//! Capture in one process, replay against a candidate, compare

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use parking_lot::Mutex;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;
use tokio::net::TcpListener;
use traffic_replay_engine::compare::DiffKind;
use traffic_replay_engine::model::{HttpRequest, HttpResponse, ProtocolTag, RequestPayload, ResponsePayload};
use traffic_replay_engine::orchestrator::{
    EffectiveMode, InterceptedCall, Mode, ModeOrchestrator, Observed,
};
use traffic_replay_engine::replay::{ExecutorRegistry, HttpReplayExecutor, ReplayReport, TargetTable};
use traffic_replay_engine::sink::{SinkPort, SqliteSink, StorageConfig};
use traffic_replay_engine::utils::config::{EngineConfig, StorageSettings, TargetSettings};

fn price_response(price: u32) -> HttpResponse {
    HttpResponse::new(200)
        .with_header("content-type", "application/json")
        .with_body(format!("{{\"sku\":\"A-1\",\"price\":{}}}", price))
}

fn config(dir: &std::path::Path, mode: Mode, candidate: Option<SocketAddr>) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.mode = mode;
    config.sampling.percentage = 100.0;
    config.storage = StorageSettings {
        base_dir: dir.to_path_buf(),
        db_name: "records.db".to_string(),
    };
    config
        .compare
        .ignore
        .insert(DiffKind::Add, vec!["/headers/date".to_string()]);
    if let Some(addr) = candidate {
        config.targets.push(TargetSettings {
            client_id: "candidate".to_string(),
            base_url: format!("http://{}", addr),
            timeout_secs: 5,
            headers: Default::default(),
        });
    }
    config
}

/// Candidate service running its own orchestrator, answering with `price`
async fn spawn_candidate(
    orchestrator: Arc<ModeOrchestrator>,
    price: u32,
    verdicts: Arc<Mutex<Vec<ReplayReport>>>,
) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let orchestrator = Arc::clone(&orchestrator);
            let verdicts = Arc::clone(&verdicts);

            tokio::spawn(async move {
                let service = service_fn(move |req: Request<Incoming>| {
                    let orchestrator = Arc::clone(&orchestrator);
                    let verdicts = Arc::clone(&verdicts);
                    async move {
                        let mut request = HttpRequest::new(req.method().as_str(), req.uri().path());
                        if let Some(query) = req.uri().query() {
                            request = request.with_query(query);
                        }
                        for (name, value) in req.headers() {
                            request = request.with_header(name.as_str(), value.to_str().unwrap_or(""));
                        }

                        let response = price_response(price);
                        let served = response.clone();
                        let result = orchestrator
                            .intercept(InterceptedCall::new(RequestPayload::Http(request)), || async move {
                                Observed::new(served.body.clone(), ResponsePayload::Http(served))
                            })
                            .await;

                        if let Some(Ok(report)) = result.verdict {
                            verdicts.lock().push(report);
                        }

                        Ok::<_, Infallible>(
                            Response::builder()
                                .status(200)
                                .header("content-type", "application/json")
                                .body(Full::new(Bytes::from(result.output)))
                                .unwrap(),
                        )
                    }
                });
                let _ = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
            });
        }
    });

    addr
}

async fn capture_baseline(dir: &std::path::Path, sink: Arc<dyn SinkPort>) -> String {
    let production = ModeOrchestrator::from_config(
        &config(dir, Mode::Profile, None),
        sink,
        Arc::new(ExecutorRegistry::new()),
    )
    .unwrap()
    .with_purge_interval(Duration::from_millis(20));
    let mut persister = production.persister();
    persister.start().unwrap();

    let request = HttpRequest::new("GET", "/price")
        .with_query("sku=A-1")
        .with_header("accept", "application/json");
    let intercepted = production
        .intercept(InterceptedCall::new(RequestPayload::Http(request)), || async {
            Observed::new((), ResponsePayload::Http(price_response(10)))
        })
        .await;

    assert_eq!(intercepted.mode, EffectiveMode::Profile);
    let id = intercepted.captured.expect("request should be captured");

    persister.shutdown().await.unwrap();
    assert_eq!(persister.stats().records_written, 1);
    id
}

async fn driver(dir: &std::path::Path, sink: Arc<dyn SinkPort>, addr: SocketAddr) -> ModeOrchestrator {
    let config = config(dir, Mode::None, Some(addr));
    let targets = Arc::new(TargetTable::from_settings(&config.targets).unwrap());
    let executors = Arc::new(ExecutorRegistry::new());
    executors.register(ProtocolTag::Http, Arc::new(HttpReplayExecutor::new(targets)));

    ModeOrchestrator::from_config(&config, sink, executors).unwrap()
}

#[tokio::test]
async fn test_unchanged_candidate_passes() {
    let dir = tempdir().unwrap();
    let sink: Arc<dyn SinkPort> =
        Arc::new(SqliteSink::new(StorageConfig::from(config(dir.path(), Mode::None, None).storage)).await.unwrap());

    let id = capture_baseline(dir.path(), Arc::clone(&sink)).await;

    let verdicts = Arc::new(Mutex::new(Vec::new()));
    let candidate = Arc::new(
        ModeOrchestrator::from_config(
            &config(dir.path(), Mode::Dynamic, None),
            Arc::clone(&sink),
            Arc::new(ExecutorRegistry::new()),
        )
        .unwrap(),
    );
    let addr = spawn_candidate(candidate, 10, Arc::clone(&verdicts)).await;

    let report = driver(dir.path(), Arc::clone(&sink), addr)
        .await
        .replay(&id, "candidate")
        .await
        .unwrap();

    assert!(report.compared);
    assert!(report.passed, "unexpected diffs: {:?}", report.diffs);

    // The candidate saw the replay markers and verified in-process
    let verdicts = verdicts.lock();
    assert_eq!(verdicts.len(), 1);
    assert_eq!(verdicts[0].record_id, id);
    assert!(verdicts[0].passed);
}

#[tokio::test]
async fn test_changed_candidate_reports_diff() {
    let dir = tempdir().unwrap();
    let sqlite = Arc::new(
        SqliteSink::new(StorageConfig::from(config(dir.path(), Mode::None, None).storage))
            .await
            .unwrap(),
    );
    let sink: Arc<dyn SinkPort> = sqlite.clone();

    let id = capture_baseline(dir.path(), Arc::clone(&sink)).await;

    let verdicts = Arc::new(Mutex::new(Vec::new()));
    let candidate = Arc::new(
        ModeOrchestrator::from_config(
            &config(dir.path(), Mode::Dynamic, None),
            Arc::clone(&sink),
            Arc::new(ExecutorRegistry::new()),
        )
        .unwrap(),
    );
    let addr = spawn_candidate(candidate, 12, Arc::clone(&verdicts)).await;

    let report = driver(dir.path(), Arc::clone(&sink), addr)
        .await
        .replay(&id, "candidate")
        .await
        .unwrap();

    assert!(!report.passed);
    assert_eq!(report.diffs.len(), 1);
    assert_eq!(report.diffs[0].kind, DiffKind::Modify);
    assert_eq!(report.diffs[0].path, "/body/price");

    let stored: ReplayReport =
        serde_json::from_str(&sqlite.read_result(&id).await.unwrap().unwrap()).unwrap();
    assert_eq!(stored.diffs, report.diffs);
}
