//! HTTP gateway to an external search engine. Stateless per call: one
//! composed request out, one raw result back. Connectivity failures
//! are retried with bounded backoff; a rejected query is a builder bug
//! and is surfaced immediately.

use catalog_core::{schema, Modifiers, QueryTree, RawResult, Result, SearchError};
use once_cell::sync::Lazy;
use prometheus::{register_counter_vec, register_histogram, CounterVec, Histogram};
use std::time::Duration;

use crate::traits::SearchEngine;
use crate::wire;

static ENGINE_REQUEST_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!("engine_request_seconds", "Search engine round-trip latency").unwrap()
});

static ENGINE_RETRIES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!("engine_retries_total", "Gateway retries by reason", &["reason"]).unwrap()
});

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_BACKOFF: Duration = Duration::from_millis(200);

pub struct RemoteEngine {
    client: reqwest::Client,
    base_url: String,
    index: String,
    max_attempts: u32,
    backoff: Duration,
}

impl RemoteEngine {
    /// `timeout` bounds each in-flight call; an expired call surfaces
    /// as `EngineUnavailable` instead of hanging.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SearchError::EngineUnavailable(format!("client init failed: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            index: schema::INDEX_NAME.to_string(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
        })
    }

    pub fn with_retry(mut self, max_attempts: u32, backoff: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.backoff = backoff;
        self
    }

    async fn send(&self, body: &serde_json::Value, summary: &str) -> Result<RawResult> {
        let url = format!("{}/{}/_search", self.base_url, self.index);
        let resp = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SearchError::EngineUnavailable(format!("request timed out for {summary}"))
                } else if e.is_connect() {
                    SearchError::EngineUnavailable(format!("connect failed: {e}"))
                } else {
                    SearchError::EngineUnavailable(format!("transport failure: {e}"))
                }
            })?;

        let status = resp.status();
        if status.is_client_error() {
            // Deterministic rejection: the composed tree is at fault.
            let detail = resp.text().await.unwrap_or_default();
            return Err(SearchError::EngineRejected(format!(
                "{status} for {summary}: {}",
                truncate(&detail, 200)
            )));
        }
        if !status.is_success() {
            return Err(SearchError::EngineUnavailable(format!("{status} for {summary}")));
        }
        let v: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| SearchError::Mapping(format!("undecodable response body: {e}")))?;
        wire::parse_response(&v)
    }
}

#[async_trait::async_trait]
impl SearchEngine for RemoteEngine {
    async fn execute(&self, tree: &QueryTree, mods: &Modifiers) -> Result<RawResult> {
        let body = wire::search_body(tree, mods);
        let summary = tree.describe();
        let _timer = ENGINE_REQUEST_SECONDS.start_timer();
        let mut attempt = 0;
        loop {
            match self.send(&body, &summary).await {
                Ok(raw) => return Ok(raw),
                Err(e) if e.is_retryable() && attempt + 1 < self.max_attempts => {
                    ENGINE_RETRIES_TOTAL.with_label_values(&["unavailable"]).inc();
                    let delay = self.backoff * 2u32.saturating_pow(attempt);
                    tracing::warn!("engine attempt {} failed for {}: {} — retrying in {:?}",
                        attempt + 1, summary, e, delay);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
