// src/replay/http_executor.rs
//! HTTP replay executor
//!
//! Rebuilds the captured request against the target's base URL, tags it with
//! the replay markers and returns the live response.

use super::registry::ReplayExecutor;
use super::targets::TargetTable;
use super::{REPLAY_ID_HEADER, REPLAY_MODE_HEADER, REPLAY_MODE_TEST};
use crate::model::{
    HeaderMap, HttpResponse, ProtocolTag, RequestPayload, ResponsePayload, TestRecord,
};
use crate::utils::errors::{EngineError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::Request;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Request headers that describe the original connection, not the request
const HOP_HEADERS: [&str; 4] = ["host", "content-length", "connection", "transfer-encoding"];

/// Replays HTTP records with a hyper client
pub struct HttpReplayExecutor {
    targets: Arc<TargetTable>,
    client: Client<HttpConnector, Full<Bytes>>,
}

impl HttpReplayExecutor {
    pub fn new(targets: Arc<TargetTable>) -> Self {
        let client = Client::builder(TokioExecutor::new()).build_http();

        Self { targets, client }
    }

    fn build_request(
        &self,
        record: &TestRecord,
        base_url: &str,
        extra_headers: &HeaderMap,
    ) -> Result<Request<Full<Bytes>>> {
        let RequestPayload::Http(request) = record.request() else {
            return Err(EngineError::ProtocolMismatch {
                record: record.protocol(),
                payload: ProtocolTag::Http,
            });
        };

        let uri = format!("{}{}", base_url.trim_end_matches('/'), request.path_and_query());
        let mut builder = Request::builder().method(request.method.as_str()).uri(uri);

        for (name, value) in &request.headers {
            let lower = name.to_ascii_lowercase();
            if HOP_HEADERS.contains(&lower.as_str())
                || lower == REPLAY_ID_HEADER
                || lower == REPLAY_MODE_HEADER
                || extra_headers.keys().any(|k| k.eq_ignore_ascii_case(name))
            {
                continue;
            }
            builder = builder.header(name.as_str(), value.as_str());
        }

        for (name, value) in extra_headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        builder
            .header(REPLAY_ID_HEADER, record.id())
            .header(REPLAY_MODE_HEADER, REPLAY_MODE_TEST)
            .body(Full::new(Bytes::from(request.body.clone())))
            .map_err(|e| EngineError::ExecutionFailed(format!("Request build error: {}", e)))
    }
}

#[async_trait]
impl ReplayExecutor for HttpReplayExecutor {
    async fn execute(&self, record: &TestRecord, client_id: &str) -> Result<ResponsePayload> {
        let target = self.targets.lookup(client_id)?;
        let request = self.build_request(record, &target.base_url, &target.headers)?;

        debug!("Replaying {} {} to {}", request.method(), request.uri(), client_id);
        let start = Instant::now();

        let exchange = async {
            let response = self
                .client
                .request(request)
                .await
                .map_err(|e| EngineError::ExecutionFailed(format!("Replay request failed: {}", e)))?;

            let (parts, body) = response.into_parts();
            let body = body
                .collect()
                .await
                .map_err(|e| EngineError::ExecutionFailed(format!("Response body error: {}", e)))?
                .to_bytes();

            Ok::<_, EngineError>((parts, body))
        };

        // Covers the body as well as the head
        let (parts, body) = tokio::time::timeout(target.timeout, exchange)
            .await
            .map_err(|_| {
                EngineError::ExecutionFailed(format!(
                    "Replay of {} timed out after {:?}",
                    record.id(),
                    target.timeout
                ))
            })??;

        let mut headers = HeaderMap::new();
        for (name, value) in &parts.headers {
            let Ok(value) = value.to_str() else {
                continue;
            };
            headers
                .entry(name.as_str().to_string())
                .and_modify(|existing: &mut String| {
                    existing.push_str(", ");
                    existing.push_str(value);
                })
                .or_insert_with(|| value.to_string());
        }

        debug!(
            "Replay of {} answered {} in {:?}",
            record.id(),
            parts.status,
            start.elapsed()
        );

        Ok(ResponsePayload::Http(HttpResponse {
            status: parts.status.as_u16(),
            headers,
            body: body.to_vec(),
        }))
    }
}
