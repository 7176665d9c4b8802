//! Client for the external move-analysis oracle.
//!
//! One logical request is driven as a small state machine:
//!
//! ```text
//! Attempting(1) --success--> Succeeded
//!      |  timeout / transport error / bad status / id mismatch
//!      v
//! Attempting(2) -- ... --> Attempting(max) --failure--> Exhausted
//! ```
//!
//! Every attempt carries a fresh correlation id and gets its own timeout.
//! A response echoing a different id is treated like a failure, so a stale
//! answer can never be mistaken for the current one. Exhaustion yields
//! `None` rather than an error.
//!
//! The client never touches a game tree. [`AnalysisClient::spawn`] tags the
//! background request with the node it was issued for; the caller attaches
//! the result to that node, whatever is current by then.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::constants::{
    ANALYSIS_ATTEMPT_TIMEOUT, ANALYSIS_ENDPOINT, ANALYSIS_FAILURE_BACKOFF, ANALYSIS_MAX_ATTEMPTS,
    ANALYSIS_MISMATCH_BACKOFF, DEFAULT_KOMI, N,
};
use crate::tree::NodeId;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("transport unavailable: {0}")]
    Unavailable(String),
}

/// The request/response channel to the oracle.
pub trait AnalysisTransport: Send + Sync {
    fn post(
        &self,
        endpoint: &str,
        request: &AnalysisRequest,
    ) -> impl Future<Output = Result<Value, TransportError>> + Send;
}

/// JSON-over-HTTP transport.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AnalysisTransport for HttpTransport {
    fn post(
        &self,
        endpoint: &str,
        request: &AnalysisRequest,
    ) -> impl Future<Output = Result<Value, TransportError>> + Send {
        async move {
            let response = self.client.post(endpoint).json(request).send().await?;
            let status = response.status();
            if !status.is_success() {
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "no error details".to_string());
                return Err(TransportError::Status {
                    status: status.as_u16(),
                    body,
                });
            }
            Ok(response.json::<Value>().await?)
        }
    }
}

// =============================================================================
// Configuration
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    pub endpoint: String,
    pub board_size: usize,
    pub max_attempts: u32,
    pub attempt_timeout: Duration,
    pub failure_backoff: Duration,
    pub mismatch_backoff: Duration,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            endpoint: ANALYSIS_ENDPOINT.to_string(),
            board_size: N,
            max_attempts: ANALYSIS_MAX_ATTEMPTS,
            attempt_timeout: ANALYSIS_ATTEMPT_TIMEOUT,
            failure_backoff: ANALYSIS_FAILURE_BACKOFF,
            mismatch_backoff: ANALYSIS_MISMATCH_BACKOFF,
        }
    }
}

impl AnalysisConfig {
    /// Defaults overridden by `GOBAN_ANALYSIS_ENDPOINT`,
    /// `GOBAN_ANALYSIS_TIMEOUT_SECS` and `GOBAN_ANALYSIS_ATTEMPTS`.
    /// Unparseable values are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(endpoint) = std::env::var("GOBAN_ANALYSIS_ENDPOINT") {
            config = config.with_endpoint(endpoint);
        }
        if let Some(secs) = env_parse::<u64>("GOBAN_ANALYSIS_TIMEOUT_SECS") {
            config = config.with_attempt_timeout(Duration::from_secs(secs));
        }
        if let Some(attempts) = env_parse::<u32>("GOBAN_ANALYSIS_ATTEMPTS") {
            config = config.with_max_attempts(attempts);
        }
        config
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// At least one attempt is always made.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn with_backoff(mut self, failure: Duration, mismatch: Duration) -> Self {
        self.failure_backoff = failure;
        self.mismatch_backoff = mismatch;
        self
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok()?.trim().parse().ok()
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisRequest {
    pub board_size: usize,
    pub moves: Vec<String>,
    pub config: RequestConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestConfig {
    pub komi: f64,
    pub request_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateMove {
    #[serde(rename = "move")]
    pub mv: String,
    pub score: Option<f64>,
    pub winrate: Option<f64>,
}

/// What the oracle said about a position. `raw` keeps the full response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub request_id: String,
    pub best_move: Option<String>,
    pub win_probability: Option<f64>,
    pub score: Option<f64>,
    pub candidates: Vec<CandidateMove>,
    pub raw: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireResponse {
    bot_move: Option<String>,
    diagnostics: Option<WireDiagnostics>,
    #[serde(rename = "moveInfos")]
    move_infos: Vec<WireCandidate>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireDiagnostics {
    winprob: Option<f64>,
    score: Option<f64>,
    best_ten: Vec<WireCandidate>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireCandidate {
    #[serde(rename = "move")]
    mv: Option<String>,
    score: Option<f64>,
    #[serde(rename = "scoreLead")]
    score_lead: Option<f64>,
    winrate: Option<f64>,
    winprob: Option<f64>,
}

impl WireCandidate {
    fn into_candidate(self) -> Option<CandidateMove> {
        Some(CandidateMove {
            mv: self.mv?,
            score: self.score.or(self.score_lead),
            winrate: self.winrate.or(self.winprob),
        })
    }
}

impl AnalysisResult {
    /// Read either the `bot_move`/`diagnostics` shape or a bare `moveInfos` list.
    pub fn from_response(request_id: String, raw: Value) -> Self {
        let wire: WireResponse = serde_json::from_value(raw.clone()).unwrap_or_default();

        let (best_move, win_probability, score, candidates) = match wire.bot_move {
            Some(bot_move) => {
                let diag = wire.diagnostics.unwrap_or_default();
                (Some(bot_move), diag.winprob, diag.score, diag.best_ten)
            }
            None => {
                let top = wire.move_infos.first();
                (
                    top.and_then(|m| m.mv.clone()),
                    top.and_then(|m| m.winrate),
                    top.and_then(|m| m.score_lead),
                    wire.move_infos,
                )
            }
        };

        Self {
            request_id,
            best_move,
            win_probability,
            score,
            candidates: candidates
                .into_iter()
                .filter_map(WireCandidate::into_candidate)
                .collect(),
            raw,
        }
    }
}

/// Correlation id echoed by the server, from `request_id` or, when that is
/// missing or null, `config.request_id`.
fn echoed_id(raw: &Value) -> Option<String> {
    let id = raw
        .get("request_id")
        .filter(|v| !v.is_null())
        .or_else(|| raw.pointer("/config/request_id").filter(|v| !v.is_null()))?;
    match id {
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn new_correlation_id() -> String {
    format!("{:016x}", fastrand::u64(..))
}

// =============================================================================
// Retry state machine
// =============================================================================

#[derive(Debug)]
enum AttemptOutcome {
    Succeeded(AnalysisResult),
    TimedOut,
    Failed(TransportError),
    Mismatch { expected: String, received: String },
}

impl AttemptOutcome {
    fn backoff(&self, config: &AnalysisConfig) -> Duration {
        match self {
            AttemptOutcome::Mismatch { .. } => config.mismatch_backoff,
            _ => config.failure_backoff,
        }
    }
}

#[derive(Debug)]
enum RequestState {
    Attempting(u32),
    Succeeded(AnalysisResult),
    Exhausted,
}

fn transition(attempt: u32, max_attempts: u32, outcome: AttemptOutcome) -> RequestState {
    match outcome {
        AttemptOutcome::Succeeded(result) => RequestState::Succeeded(result),
        _ if attempt >= max_attempts => RequestState::Exhausted,
        _ => RequestState::Attempting(attempt + 1),
    }
}

pub struct AnalysisClient<T> {
    transport: Arc<T>,
    config: AnalysisConfig,
}

impl<T> Clone for AnalysisClient<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            config: self.config.clone(),
        }
    }
}

impl AnalysisClient<HttpTransport> {
    pub fn http(config: AnalysisConfig) -> Self {
        Self::with_transport(HttpTransport::new(), config)
    }
}

impl<T: AnalysisTransport> AnalysisClient<T> {
    pub fn with_transport(transport: T, config: AnalysisConfig) -> Self {
        Self {
            transport: Arc::new(transport),
            config,
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Ask the oracle about the position reached by `moves` (GTP vertices).
    ///
    /// Returns `None` once every attempt has failed. Dropping the future
    /// aborts the in-flight attempt and any retries.
    pub async fn request_analysis(&self, moves: &[String], komi: f64) -> Option<AnalysisResult> {
        let komi = if komi.is_finite() { komi } else { DEFAULT_KOMI };
        let max = self.config.max_attempts.max(1);
        let mut state = RequestState::Attempting(1);

        loop {
            state = match state {
                RequestState::Attempting(n) => {
                    let outcome = self.attempt(moves, komi).await;
                    match &outcome {
                        AttemptOutcome::Succeeded(_) => {}
                        AttemptOutcome::TimedOut => warn!("analysis attempt {n}/{max} timed out"),
                        AttemptOutcome::Failed(e) => {
                            warn!("analysis attempt {n}/{max} failed: {e}")
                        }
                        AttemptOutcome::Mismatch { expected, received } => {
                            warn!(
                                "analysis attempt {n}/{max}: expected request id {expected}, \
                                 got {received}"
                            )
                        }
                    }
                    let delay = outcome.backoff(&self.config);
                    let next = transition(n, max, outcome);
                    if matches!(next, RequestState::Attempting(_)) {
                        tokio::time::sleep(delay).await;
                    }
                    next
                }
                RequestState::Succeeded(result) => return Some(result),
                RequestState::Exhausted => {
                    error!("analysis failed after {max} attempts");
                    return None;
                }
            };
        }
    }

    async fn attempt(&self, moves: &[String], komi: f64) -> AttemptOutcome {
        let request = AnalysisRequest {
            board_size: self.config.board_size,
            moves: moves.to_vec(),
            config: RequestConfig {
                komi,
                request_id: new_correlation_id(),
            },
        };
        debug!(
            "analysis request {} with {} moves",
            request.config.request_id,
            request.moves.len()
        );

        let sent = self.transport.post(&self.config.endpoint, &request);
        let raw = match tokio::time::timeout(self.config.attempt_timeout, sent).await {
            Err(_) => return AttemptOutcome::TimedOut,
            Ok(Err(e)) => return AttemptOutcome::Failed(e),
            Ok(Ok(raw)) => raw,
        };

        let expected = request.config.request_id;
        match echoed_id(&raw) {
            Some(received) if received != expected => {
                AttemptOutcome::Mismatch { expected, received }
            }
            _ => AttemptOutcome::Succeeded(AnalysisResult::from_response(expected, raw)),
        }
    }
}

impl<T: AnalysisTransport + 'static> AnalysisClient<T> {
    /// Run [`request_analysis`](Self::request_analysis) as a background task
    /// tagged with the node it was issued for. Must be called from within a
    /// Tokio runtime.
    pub fn spawn(&self, node: NodeId, moves: Vec<String>, komi: f64) -> PendingAnalysis {
        let client = self.clone();
        let handle = tokio::spawn(async move { client.request_analysis(&moves, komi).await });
        PendingAnalysis { node, handle }
    }
}

/// A background analysis request and the node it belongs to.
#[derive(Debug)]
pub struct PendingAnalysis {
    node: NodeId,
    handle: JoinHandle<Option<AnalysisResult>>,
}

impl PendingAnalysis {
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Abort the in-flight attempt and suppress further retries.
    pub fn cancel(&self) {
        self.handle.abort();
    }

    /// Wait for the outcome. Cancelled requests yield `None`.
    pub async fn join(self) -> (NodeId, Option<AnalysisResult>) {
        let result = match self.handle.await {
            Ok(result) => result,
            Err(e) => {
                debug!("analysis task ended without a result: {e}");
                None
            }
        };
        (self.node, result)
    }
}
