//! Transports that never touch the network

use async_trait::async_trait;
use lyricsift_harvest::gate::{FetchRequest, RawResponse, Transport, TransportError};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

type Scripted = Result<RawResponse, TransportError>;

/// Replays queued outcomes per full URL, then a fallback page if set,
/// otherwise 404
#[derive(Default)]
pub struct ScriptedTransport {
    scripts: Mutex<HashMap<String, VecDeque<Scripted>>>,
    pages: Mutex<HashMap<String, String>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one outcome for `url`
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
        self.push(url, Ok(response(url, status, body)))
    }

    /// Serve `body` with 200 for `url` once the queue is empty
    pub fn page(&self, url: &str, body: &str) -> &Self {
        self.pages
            .lock()
            .unwrap()
            .insert(url.to_string(), body.to_string());
        self
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

fn response(url: &str, status: u16, body: &str) -> RawResponse {
    RawResponse {
        status,
        final_url: url.to_string(),
        body: body.as_bytes().to_vec(),
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &FetchRequest) -> Result<RawResponse, TransportError> {
        let url = request.full_url();
        self.calls.lock().unwrap().push(url.clone());

        let queued = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&url)
            .and_then(VecDeque::pop_front);
        if let Some(outcome) = queued {
            return outcome;
        }

        match self.pages.lock().unwrap().get(&url) {
            Some(body) => Ok(response(&url, 200, body)),
            None => Ok(response(&url, 404, "")),
        }
    }
}

/// Serves the same page for every URL after a fixed delay
pub struct SlowTransport {
    pub delay: Duration,
    pub body: String,
}

#[async_trait]
impl Transport for SlowTransport {
    async fn send(&self, request: &FetchRequest) -> Result<RawResponse, TransportError> {
        tokio::time::sleep(self.delay).await;
        Ok(response(&request.full_url(), 200, &self.body))
    }
}
