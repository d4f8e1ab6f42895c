//! Last.fm top-tags client
//!
//! **Request:** `GET {base_url}?method=artist.gettoptags|track.gettoptags
//! &artist=..&track=..&api_key=..&format=json`
//!
//! **Reply:** either `{"error": code, "message": "..."}` or
//! `{"toptags": {"tag": [{"name": "...", "count": 100}, ...]}}`. A single tag
//! may arrive as an object instead of a list and `count` may be a string.
//!
//! Error codes 11 (service offline), 16 (temporarily unavailable) and 29
//! (rate limit exceeded) are retryable; any other API error means "no tag".

use super::{GenreTaxonomy, Tagger};
use crate::gate::{Attempt, ConnectionGate, FailureCause, FetchFailure, FetchRequest};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// API error codes worth retrying
pub const RETRYABLE_API_ERRORS: [u32; 3] = [11, 16, 29];

const ARTIST_METHOD: &str = "artist.gettoptags";
const TRACK_METHOD: &str = "track.gettoptags";

/// Last.fm tagger
pub struct LastFmTagger {
    gate: ConnectionGate,
    api_key: String,
    base_url: String,
    taxonomy: Arc<GenreTaxonomy>,
}

impl LastFmTagger {
    pub fn new(
        gate: ConnectionGate,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        taxonomy: Arc<GenreTaxonomy>,
    ) -> Self {
        Self {
            gate,
            api_key: api_key.into(),
            base_url: base_url.into(),
            taxonomy,
        }
    }

    fn request(&self, method: &str, artist: &str, title: Option<&str>) -> FetchRequest {
        let mut request = FetchRequest::get(self.base_url.clone())
            .with_query("method", method)
            .with_query("artist", artist);
        if let Some(title) = title {
            request = request.with_query("track", title);
        }
        request
            .with_query("api_key", self.api_key.clone())
            .with_query("format", "json")
    }

    async fn top_tag(&self, request: FetchRequest) -> Attempt<Option<String>> {
        match self.gate.attempt_request(&request).await {
            Attempt::Ok(response) => self.interpret(&request, &response.body),
            Attempt::Retryable(failure) => Attempt::Retryable(failure),
            Attempt::Fatal(failure) => Attempt::Fatal(failure),
        }
    }

    fn interpret(&self, request: &FetchRequest, body: &[u8]) -> Attempt<Option<String>> {
        let reply: TopTagsReply = match serde_json::from_slice(body) {
            Ok(reply) => reply,
            Err(e) => {
                return Attempt::Fatal(FetchFailure {
                    url: request.describe(),
                    cause: FailureCause::Parse(e.to_string()),
                })
            }
        };

        if let Some(code) = reply.error {
            let message = reply.message.unwrap_or_default();
            if RETRYABLE_API_ERRORS.contains(&code) {
                return Attempt::Retryable(FetchFailure {
                    url: request.describe(),
                    cause: FailureCause::Api { code, message },
                });
            }
            warn!(url = %request.describe(), code, "Last.fm error: {}", message);
            return Attempt::Ok(None);
        }

        let tags = reply.toptags.map(|t| t.tag.into_vec()).unwrap_or_default();
        debug!(url = %request.describe(), tags = tags.len(), "Top tags received");
        Attempt::Ok(
            self.taxonomy
                .canonicalize(tags.iter().map(|t| (t.name.as_str(), t.weight()))),
        )
    }
}

#[async_trait]
impl Tagger for LastFmTagger {
    fn name(&self) -> &str {
        "lastfm"
    }

    async fn tag_artist(&self, artist: &str) -> Attempt<Option<String>> {
        self.top_tag(self.request(ARTIST_METHOD, artist, None)).await
    }

    async fn tag_track(&self, artist: &str, title: &str) -> Attempt<Option<String>> {
        self.top_tag(self.request(TRACK_METHOD, artist, Some(title))).await
    }
}

// ============================================================================
// Reply Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct TopTagsReply {
    error: Option<u32>,
    message: Option<String>,
    toptags: Option<TopTags>,
}

#[derive(Debug, Deserialize)]
struct TopTags {
    #[serde(default)]
    tag: OneOrMany<RawTag>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawTag {
    name: String,
    #[serde(default)]
    count: serde_json::Value,
}

impl RawTag {
    /// Count as a vote weight; unreadable counts weigh nothing
    fn weight(&self) -> u64 {
        match &self.count {
            serde_json::Value::Number(n) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f > 0.0).map(|f| f as u64))
                .unwrap_or(0),
            serde_json::Value::String(s) => s.trim().parse().unwrap_or(0),
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::mock::ScriptedTransport;

    const BASE: &str = "http://lastfm.test/2.0/";

    fn taxonomy() -> Arc<GenreTaxonomy> {
        Arc::new(
            GenreTaxonomy::from_json_str(
                r#"[{"genre": "soul", "subgenres": ["rnb"]}, {"genre": "pop", "subgenres": []}]"#,
            )
            .unwrap(),
        )
    }

    fn tagger(transport: Arc<ScriptedTransport>) -> LastFmTagger {
        let gate = ConnectionGate::new(transport, &[408, 500, 503, 504]);
        LastFmTagger::new(gate, "key", BASE, taxonomy())
    }

    fn artist_url(artist: &str) -> String {
        format!(
            "{}?method=artist.gettoptags&artist={}&api_key=key&format=json",
            BASE, artist
        )
    }

    #[tokio::test]
    async fn test_weighted_vote() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(
            &artist_url("Alicia Keys"),
            200,
            r#"{"toptags":{"tag":[{"name":"soul","count":10},{"name":"pop","count":3}]}}"#,
        );
        let tagger = tagger(transport);
        assert_eq!(
            tagger.tag_artist("Alicia Keys").await,
            Attempt::Ok(Some("soul".to_string()))
        );
    }

    #[tokio::test]
    async fn test_single_tag_object_and_string_count() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(
            &artist_url("Cher"),
            200,
            r#"{"toptags":{"tag":{"name":"Pop","count":"100"}}}"#,
        );
        assert_eq!(
            tagger(transport).tag_artist("Cher").await,
            Attempt::Ok(Some("pop".to_string()))
        );
    }

    #[tokio::test]
    async fn test_track_request_carries_title() {
        let transport = Arc::new(ScriptedTransport::new());
        let url = format!(
            "{}?method=track.gettoptags&artist=Cher&track=Believe&api_key=key&format=json",
            BASE
        );
        transport.respond(&url, 200, r#"{"toptags":{"tag":[{"name":"rnb","count":1}]}}"#);
        let tagger = tagger(transport.clone());

        assert_eq!(
            tagger.tag_track("Cher", "Believe").await,
            Attempt::Ok(Some("soul".to_string()))
        );
        assert_eq!(transport.calls_to(&url), 1);
    }

    #[tokio::test]
    async fn test_api_errors() {
        let transport = Arc::new(ScriptedTransport::new());
        let url = artist_url("X");
        transport.respond(&url, 200, r#"{"error":6,"message":"The artist you supplied could not be found"}"#);
        transport.respond(&url, 200, r#"{"error":29,"message":"Rate limit exceeded"}"#);
        transport.respond(&url, 200, "<html>not json</html>");
        let tagger = tagger(transport);

        assert_eq!(tagger.tag_artist("X").await, Attempt::Ok(None));
        assert!(tagger.tag_artist("X").await.is_retryable());
        assert!(tagger.tag_artist("X").await.is_fatal());
    }

    #[tokio::test]
    async fn test_empty_toptags_is_none() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(
            &artist_url("Y"),
            200,
            r##"{"toptags":{"#text":"\n","@attr":{"artist":"Y"}}}"##,
        );
        assert_eq!(tagger(transport).tag_artist("Y").await, Attempt::Ok(None));
    }

    #[tokio::test]
    async fn test_http_status_passes_through_gate() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(&artist_url("Z"), 503, "");
        let tagger = tagger(transport);
        assert!(tagger.tag_artist("Z").await.is_retryable());
        // Unscripted requests answer 404
        assert!(tagger.tag_artist("Z").await.is_fatal());
    }

    #[test]
    fn test_weight_parsing() {
        let tag = |count: serde_json::Value| RawTag {
            name: "x".into(),
            count,
        };
        assert_eq!(tag(serde_json::json!(7)).weight(), 7);
        assert_eq!(tag(serde_json::json!("12")).weight(), 12);
        assert_eq!(tag(serde_json::json!(2.9)).weight(), 2);
        assert_eq!(tag(serde_json::json!("lots")).weight(), 0);
        assert_eq!(tag(serde_json::Value::Null).weight(), 0);
    }
}
