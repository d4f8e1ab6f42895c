//! Connection gate
//!
//! Wraps exactly one outbound HTTP request and classifies what came back:
//!
//! | Outcome                                   | Classification |
//! |-------------------------------------------|----------------|
//! | 2xx response                              | `Attempt::Ok`  |
//! | Connection refused / reset, timeout       | `Retryable`    |
//! | Status in the temporary set (408, 5xx...) | `Retryable`    |
//! | Any other status                          | `Fatal`        |
//! | Request cannot be built (bad URL)         | `Fatal`        |
//!
//! The gate never retries on its own; the retry policy lives in `retry` and
//! is driven by the worker. The transport is a trait so tests can script
//! outcomes without a network.

use crate::error::{HarvestError, Result};
use async_trait::async_trait;
use lyricsift_common::config::HttpConfig;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Query parameters whose values never appear in logs
const MASKED_PARAMS: [&str; 1] = ["api_key"];

/// Outbound GET request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub query: Vec<(String, String)>,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            query: Vec::new(),
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// URL with the query appended unencoded, for matching and logging
    pub fn full_url(&self) -> String {
        self.render(false)
    }

    /// Like `full_url` but with secrets masked
    pub fn describe(&self) -> String {
        self.render(true)
    }

    fn render(&self, mask: bool) -> String {
        if self.query.is_empty() {
            return self.url.clone();
        }
        let pairs: Vec<String> = self
            .query
            .iter()
            .map(|(k, v)| {
                if mask && MASKED_PARAMS.contains(&k.as_str()) {
                    format!("{}=***", k)
                } else {
                    format!("{}={}", k, v)
                }
            })
            .collect();
        format!("{}?{}", self.url, pairs.join("&"))
    }
}

/// What the transport saw, before classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    /// URL after redirects
    pub final_url: String,
    pub body: Vec<u8>,
}

/// Successful response handed to callers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub final_url: String,
    pub body: Vec<u8>,
}

/// Transport-level failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Connection refused or could not be established
    #[error("connection failed: {0}")]
    Connect(String),

    /// No response within the configured timeout
    #[error("timed out: {0}")]
    Timeout(String),

    /// Connection reset or body read interrupted
    #[error("connection interrupted: {0}")]
    Interrupted(String),

    /// Request could not be built or followed (bad URL, redirect loop)
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl TransportError {
    /// Whether waiting and retrying can help
    pub fn is_transient(&self) -> bool {
        !matches!(self, TransportError::InvalidRequest(_))
    }
}

/// Why an attempt did not produce a usable response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureCause {
    Transport(TransportError),
    Status(u16),
    /// Remote API reported an error in a well-formed body
    Api { code: u32, message: String },
    /// Body could not be interpreted
    Parse(String),
}

/// Failed attempt with the request it belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    /// Masked request description
    pub url: String,
    pub cause: FailureCause,
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cause {
            FailureCause::Transport(e) => write!(f, "{}: {}", self.url, e),
            FailureCause::Status(status) => write!(f, "{}: HTTP {}", self.url, status),
            FailureCause::Api { code, message } => {
                write!(f, "{}: API error {}: {}", self.url, code, message)
            }
            FailureCause::Parse(msg) => write!(f, "{}: unreadable body: {}", self.url, msg),
        }
    }
}

/// Classified outcome of one attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt<T> {
    Ok(T),
    /// Transient; the caller may back off and retry
    Retryable(FetchFailure),
    /// Permanent; the caller must not retry
    Fatal(FetchFailure),
}

impl<T> Attempt<T> {
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Attempt<U> {
        match self {
            Attempt::Ok(value) => Attempt::Ok(f(value)),
            Attempt::Retryable(failure) => Attempt::Retryable(failure),
            Attempt::Fatal(failure) => Attempt::Fatal(failure),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Attempt::Retryable(_))
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Attempt::Fatal(_))
    }
}

/// Status classes used by the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    Temporary,
    Permanent,
}

/// Performs a single request
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &FetchRequest) -> std::result::Result<RawResponse, TransportError>;
}

/// Production transport backed by `reqwest`
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout())
            .build()
            .map_err(|e| HarvestError::Http(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &FetchRequest) -> std::result::Result<RawResponse, TransportError> {
        let response = self
            .client
            .get(&request.url)
            .query(&request.query)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Interrupted(e.to_string()))?;

        Ok(RawResponse {
            status,
            final_url,
            body: body.to_vec(),
        })
    }
}

fn map_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_builder() || e.is_redirect() {
        TransportError::InvalidRequest(e.to_string())
    } else if e.is_timeout() {
        TransportError::Timeout(e.to_string())
    } else if e.is_connect() {
        TransportError::Connect(e.to_string())
    } else {
        TransportError::Interrupted(e.to_string())
    }
}

/// Classifies the result of one transport call
#[derive(Clone)]
pub struct ConnectionGate {
    transport: Arc<dyn Transport>,
    temporary_statuses: Arc<[u16]>,
}

impl ConnectionGate {
    pub fn new(transport: Arc<dyn Transport>, temporary_statuses: &[u16]) -> Self {
        Self {
            transport,
            temporary_statuses: temporary_statuses.into(),
        }
    }

    pub fn classify_status(&self, status: u16) -> StatusClass {
        if (200..300).contains(&status) {
            StatusClass::Success
        } else if self.temporary_statuses.contains(&status) {
            StatusClass::Temporary
        } else {
            StatusClass::Permanent
        }
    }

    /// Perform one request and classify the outcome
    pub async fn attempt_request(&self, request: &FetchRequest) -> Attempt<FetchResponse> {
        let url = request.describe();
        debug!(url = %url, "Requesting");

        let raw = match self.transport.send(request).await {
            Ok(raw) => raw,
            Err(e) => {
                let transient = e.is_transient();
                let failure = FetchFailure {
                    url,
                    cause: FailureCause::Transport(e),
                };
                return if transient {
                    Attempt::Retryable(failure)
                } else {
                    Attempt::Fatal(failure)
                };
            }
        };

        if raw.final_url != request.url && !raw.final_url.starts_with(&request.url) {
            warn!(url = %url, final_url = %raw.final_url, "Redirected");
        }

        match self.classify_status(raw.status) {
            StatusClass::Success => Attempt::Ok(FetchResponse {
                status: raw.status,
                final_url: raw.final_url,
                body: raw.body,
            }),
            StatusClass::Temporary => Attempt::Retryable(FetchFailure {
                url,
                cause: FailureCause::Status(raw.status),
            }),
            StatusClass::Permanent => Attempt::Fatal(FetchFailure {
                url,
                cause: FailureCause::Status(raw.status),
            }),
        }
    }
}

// ============================================================================
// Scripted Transport for Testing
// ============================================================================

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    type Scripted = std::result::Result<RawResponse, TransportError>;

    /// Replays queued outcomes per full URL; unscripted URLs answer 404
    #[derive(Default)]
    pub struct ScriptedTransport {
        scripts: Mutex<HashMap<String, VecDeque<Scripted>>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push(&self, url: &str, outcome: Scripted) -> &Self {
            self.scripts
                .lock()
                .unwrap()
                .entry(url.to_string())
                .or_default()
                .push_back(outcome);
            self
        }

        pub fn respond(&self, url: &str, status: u16, body: &str) -> &Self {
            self.push(
                url,
                Ok(RawResponse {
                    status,
                    final_url: url.to_string(),
                    body: body.as_bytes().to_vec(),
                }),
            )
        }

        pub fn calls_to(&self, url: &str) -> usize {
            self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
        }

        pub fn total_calls(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&self, request: &FetchRequest) -> std::result::Result<RawResponse, TransportError> {
            let url = request.full_url();
            self.calls.lock().unwrap().push(url.clone());
            let next = self
                .scripts
                .lock()
                .unwrap()
                .get_mut(&url)
                .and_then(VecDeque::pop_front);
            next.unwrap_or(Ok(RawResponse {
                status: 404,
                final_url: url,
                body: Vec::new(),
            }))
        }
    }
}
