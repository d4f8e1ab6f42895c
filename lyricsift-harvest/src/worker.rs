//! Partition worker
//!
//! A worker walks its partition strictly in order. Per track:
//!
//! ```text
//! PENDING → DISPATCHING → (RETRYING)* → DONE | SKIPPED
//! ```
//!
//! - **Extraction:** pick the first matching handler, fetch the page with
//!   backoff, extract and normalize the lyrics.
//! - **Tagging:** ask each configured tagger in order; the first canonical
//!   genre wins. Artist answers are cached for the rest of the partition.
//!
//! Every DONE track is written and flushed to the worker's own output before
//! the next track starts. Output I/O errors end the worker with an error;
//! anything else about a track only ever skips it.
//!
//! The cancellation token is checked before each track and during backoff
//! sleeps. Once it fires the remaining tracks are left alone and the output
//! is closed cleanly.

use crate::error::Result;
use crate::extractors::ExtractorRegistry;
use crate::gate::{ConnectionGate, FetchRequest, HttpTransport, Transport};
use crate::retry::{retry_with_backoff, RetryOutcome, RetryTrace};
use crate::summary::{SkipReason, WorkerReport};
use crate::tagger::{ArtistTagCache, GenreTaxonomy, LastFmTagger, Tagger};
use crate::track::{JobKind, ResultRow, Track};
use crate::tsv::TsvSink;
use lyricsift_common::config::{HttpConfig, LoggingConfig, RetryConfig, TagStrategy};
use lyricsift_common::normalize::{decode_lossy, normalize_text};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

// ============================================================================
// Worker Description
// ============================================================================

/// Tagging settings carried to a worker
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggingSpec {
    pub api_key: String,
    pub base_url: String,
    pub strategy: TagStrategy,
    pub taxonomy: GenreTaxonomy,
}

impl fmt::Debug for TaggingSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaggingSpec")
            .field("api_key", &"***")
            .field("base_url", &self.base_url)
            .field("strategy", &self.strategy)
            .field("genres", &self.taxonomy.len())
            .finish()
    }
}

/// Everything one worker needs, serializable for process isolation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerSpec {
    pub index: usize,
    pub kind: JobKind,
    pub tracks: Vec<Track>,
    /// Private output file
    pub output: PathBuf,
    pub retry: RetryConfig,
    pub http: HttpConfig,
    /// Enabled extraction sites in dispatch order
    pub sites: Vec<String>,
    pub tagging: Option<TaggingSpec>,
    /// Logging setup for a worker running as a child process
    pub logging: LoggingConfig,
}

impl WorkerSpec {
    pub fn strategy(&self) -> TagStrategy {
        self.tagging
            .as_ref()
            .map(|t| t.strategy)
            .unwrap_or(TagStrategy::Artist)
    }
}

/// Read-only handles shared by every worker of a job
#[derive(Clone)]
pub struct WorkerHandles {
    pub gate: ConnectionGate,
    pub registry: Arc<ExtractorRegistry>,
    pub taggers: Vec<Arc<dyn Tagger>>,
}

impl WorkerHandles {
    /// Build the handles a job of `kind` dispatches through
    pub fn build(
        kind: JobKind,
        transport: Arc<dyn Transport>,
        http: &HttpConfig,
        sites: &[String],
        tagging: Option<&TaggingSpec>,
    ) -> Result<Self> {
        let gate = ConnectionGate::new(transport, &http.temporary_statuses);

        let registry = match kind {
            JobKind::Extract => ExtractorRegistry::from_site_names(sites)?,
            JobKind::Tag => ExtractorRegistry::new(),
        };

        let mut taggers: Vec<Arc<dyn Tagger>> = Vec::new();
        if let (JobKind::Tag, Some(tagging)) = (kind, tagging) {
            taggers.push(Arc::new(LastFmTagger::new(
                gate.clone(),
                tagging.api_key.clone(),
                tagging.base_url.clone(),
                Arc::new(tagging.taxonomy.clone()),
            )));
        }

        Ok(Self {
            gate,
            registry: Arc::new(registry),
            taggers,
        })
    }

    /// Handles over a real HTTP client
    pub fn from_spec(spec: &WorkerSpec) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(&spec.http)?);
        Self::build(
            spec.kind,
            transport,
            &spec.http,
            &spec.sites,
            spec.tagging.as_ref(),
        )
    }
}

// ============================================================================
// Track Processing
// ============================================================================

/// Per-track state, as logged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    Pending,
    Dispatching,
    Retrying,
    Done,
    Skipped,
}

impl fmt::Display for TrackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TrackState::Pending => "pending",
            TrackState::Dispatching => "dispatching",
            TrackState::Retrying => "retrying",
            TrackState::Done => "done",
            TrackState::Skipped => "skipped",
        };
        f.write_str(name)
    }
}

/// Terminal outcome of one track
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackOutcome {
    Done(ResultRow),
    Skipped(SkipReason),
}

/// Sequential processor of one partition
pub struct Worker {
    spec: WorkerSpec,
    handles: WorkerHandles,
    cache: ArtistTagCache,
    cancel: CancellationToken,
}

impl Worker {
    pub fn new(spec: WorkerSpec, handles: WorkerHandles, cancel: CancellationToken) -> Self {
        Self {
            spec,
            handles,
            cache: ArtistTagCache::new(),
            cancel,
        }
    }

    /// Process the whole partition
    pub async fn run(self) -> Result<WorkerReport> {
        let span = tracing::info_span!("worker", index = self.spec.index);
        self.run_partition().instrument(span).await
    }

    async fn run_partition(mut self) -> Result<WorkerReport> {
        let mut sink = TsvSink::create(&self.spec.output, self.spec.kind)?;
        let tracks = std::mem::take(&mut self.spec.tracks);
        let total = tracks.len();
        let mut report = WorkerReport::new(self.spec.index, total);

        info!(
            kind = %self.spec.kind,
            tracks = total,
            output = %self.spec.output.display(),
            "Worker started"
        );

        for (position, track) in tracks.iter().enumerate() {
            if self.cancel.is_cancelled() {
                warn!(remaining = total - position, "Cancelled, leaving remaining tracks");
                report.cancelled = true;
                break;
            }

            debug!(track_id = %track.track_id, state = %TrackState::Pending);
            info!("[{}/{}] {}", position + 1, total, track);

            let (outcome, trace) = self.process(track).await;
            report.attempts += u64::from(trace.attempts);
            if trace.attempts > 1 {
                debug!(
                    track_id = %track.track_id,
                    state = %TrackState::Retrying,
                    retries = trace.attempts - 1,
                    "Track needed retries"
                );
            }

            match outcome {
                TrackOutcome::Done(row) => {
                    sink.write_row(&row)?;
                    report.record_written();
                    debug!(track_id = %track.track_id, state = %TrackState::Done);
                }
                TrackOutcome::Skipped(SkipReason::Cancelled) => {
                    report.record_skip(SkipReason::Cancelled);
                    warn!(track_id = %track.track_id, "Cancelled mid-track");
                    break;
                }
                TrackOutcome::Skipped(reason) => {
                    report.record_skip(reason);
                    debug!(
                        track_id = %track.track_id,
                        state = %TrackState::Skipped,
                        reason = ?reason
                    );
                }
            }
        }

        sink.finish()?;
        info!(
            processed = report.processed,
            written = report.written,
            skipped = report.skipped(),
            cancelled = report.cancelled,
            cached_artists = self.cache.len(),
            cache_hits = self.cache.hits(),
            "Worker finished"
        );
        Ok(report)
    }

    async fn process(&mut self, track: &Track) -> (TrackOutcome, RetryTrace) {
        debug!(track_id = %track.track_id, state = %TrackState::Dispatching);
        match self.spec.kind {
            JobKind::Extract => {
                extract_lyrics(&self.handles, &self.spec.retry, &self.cancel, track).await
            }
            JobKind::Tag => {
                let strategy = self.spec.strategy();
                tag_track(
                    &self.handles.taggers,
                    &mut self.cache,
                    strategy,
                    &self.spec.retry,
                    &self.cancel,
                    track,
                )
                .await
            }
        }
    }
}

fn merge_trace(total: &mut RetryTrace, step: RetryTrace) {
    total.attempts += step.attempts;
    total.delays.extend(step.delays);
}

async fn extract_lyrics(
    handles: &WorkerHandles,
    retry: &RetryConfig,
    cancel: &CancellationToken,
    track: &Track,
) -> (TrackOutcome, RetryTrace) {
    let Some(url) = track.url.as_deref() else {
        warn!(track_id = %track.track_id, "No URL - skipping");
        return (TrackOutcome::Skipped(SkipReason::NoHandler), RetryTrace::default());
    };

    let Some(handler) = handles.registry.select(url) else {
        warn!(track_id = %track.track_id, url = %url, "No extractor suitable - skipping");
        return (TrackOutcome::Skipped(SkipReason::NoHandler), RetryTrace::default());
    };

    info!(url = %url, handler = handler.name(), "Extracting");
    let request = FetchRequest::get(url);
    let retried = retry_with_backoff(retry, cancel, handler.name(), || {
        handles.gate.attempt_request(&request)
    })
    .await;

    let outcome = match retried.outcome {
        RetryOutcome::Done(response) => {
            let html = decode_lossy(&response.body);
            let lyrics = handler
                .extract(&html)
                .map(|text| normalize_text(&text))
                .filter(|text| !text.is_empty());
            match lyrics {
                Some(lyrics) => TrackOutcome::Done(ResultRow::Lyrics {
                    track_id: track.track_id.clone(),
                    lyrics,
                }),
                None => {
                    warn!(url = %url, handler = handler.name(), "Could not find lyrics - skipping");
                    TrackOutcome::Skipped(SkipReason::NoData)
                }
            }
        }
        RetryOutcome::Fatal(_) => TrackOutcome::Skipped(SkipReason::Fatal),
        RetryOutcome::Exhausted(_) => TrackOutcome::Skipped(SkipReason::RetriesExhausted),
        RetryOutcome::Cancelled => TrackOutcome::Skipped(SkipReason::Cancelled),
    };
    (outcome, retried.trace)
}

/// Result of one tagger lookup
enum Lookup {
    Found(String),
    NotFound,
    Failed(SkipReason),
    Cancelled,
}

impl From<RetryOutcome<Option<String>>> for Lookup {
    fn from(outcome: RetryOutcome<Option<String>>) -> Self {
        match outcome {
            RetryOutcome::Done(Some(tag)) => Lookup::Found(tag),
            RetryOutcome::Done(None) => Lookup::NotFound,
            RetryOutcome::Fatal(_) => Lookup::Failed(SkipReason::Fatal),
            RetryOutcome::Exhausted(_) => Lookup::Failed(SkipReason::RetriesExhausted),
            RetryOutcome::Cancelled => Lookup::Cancelled,
        }
    }
}

async fn lookup_artist(
    tagger: &dyn Tagger,
    cache: &mut ArtistTagCache,
    retry: &RetryConfig,
    cancel: &CancellationToken,
    artist: &str,
    trace: &mut RetryTrace,
) -> Lookup {
    if let Some(cached) = cache.get(tagger.name(), artist) {
        debug!(tagger = tagger.name(), artist = %artist, "Artist tag cached");
        return match cached {
            Some(tag) => Lookup::Found(tag),
            None => Lookup::NotFound,
        };
    }

    let retried = retry_with_backoff(retry, cancel, tagger.name(), || tagger.tag_artist(artist)).await;
    merge_trace(trace, retried.trace);
    if let RetryOutcome::Done(tag) = &retried.outcome {
        cache.insert(tagger.name(), artist, tag.clone());
    }
    retried.outcome.into()
}

async fn lookup_track(
    tagger: &dyn Tagger,
    retry: &RetryConfig,
    cancel: &CancellationToken,
    track: &Track,
    trace: &mut RetryTrace,
) -> Lookup {
    let retried = retry_with_backoff(retry, cancel, tagger.name(), || {
        tagger.tag_track(&track.artist, &track.title)
    })
    .await;
    merge_trace(trace, retried.trace);
    retried.outcome.into()
}

async fn tag_track(
    taggers: &[Arc<dyn Tagger>],
    cache: &mut ArtistTagCache,
    strategy: TagStrategy,
    retry: &RetryConfig,
    cancel: &CancellationToken,
    track: &Track,
) -> (TrackOutcome, RetryTrace) {
    let mut trace = RetryTrace::default();
    let mut failure = None;

    if taggers.is_empty() {
        warn!(track_id = %track.track_id, "No tagger configured - skipping");
    }

    for tagger in taggers {
        let tagger = tagger.as_ref();
        let lookup = match strategy {
            TagStrategy::Artist => {
                lookup_artist(tagger, cache, retry, cancel, &track.artist, &mut trace).await
            }
            TagStrategy::Track => lookup_track(tagger, retry, cancel, track, &mut trace).await,
            TagStrategy::TrackThenArtist => {
                match lookup_track(tagger, retry, cancel, track, &mut trace).await {
                    Lookup::Found(tag) => Lookup::Found(tag),
                    Lookup::Cancelled => Lookup::Cancelled,
                    Lookup::NotFound | Lookup::Failed(_) => {
                        lookup_artist(tagger, cache, retry, cancel, &track.artist, &mut trace)
                            .await
                    }
                }
            }
        };

        match lookup {
            Lookup::Found(tag) => {
                info!(tagger = tagger.name(), tag = %tag, "Tagged");
                let row = ResultRow::Tag {
                    track_id: track.track_id.clone(),
                    artist: track.artist.clone(),
                    title: track.title.clone(),
                    tag,
                };
                return (TrackOutcome::Done(row), trace);
            }
            Lookup::NotFound => debug!(tagger = tagger.name(), "No canonical genre"),
            Lookup::Failed(reason) => failure = Some(reason),
            Lookup::Cancelled => return (TrackOutcome::Skipped(SkipReason::Cancelled), trace),
        }
    }

    warn!(track_id = %track.track_id, "Could not find tag - skipping");
    (
        TrackOutcome::Skipped(failure.unwrap_or(SkipReason::NoData)),
        trace,
    )
}

// ============================================================================
// Child Process Entry
// ============================================================================

pub fn read_spec(path: &Path) -> Result<WorkerSpec> {
    let bytes = std::fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

pub fn write_spec(spec: &WorkerSpec, path: &Path) -> Result<()> {
    std::fs::write(path, serde_json::to_vec(spec)?)?;
    Ok(())
}

pub fn read_report(path: &Path) -> Result<WorkerReport> {
    let bytes = std::fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Cancel `token` when stdin reaches end of file
///
/// The parent holds the write end of the child's stdin and closes it to
/// request cancellation. A plain thread is used because a blocked stdin read
/// cannot be interrupted and must not hold up runtime shutdown.
pub fn cancel_on_stdin_close(token: CancellationToken) {
    std::thread::spawn(move || {
        let mut stdin = std::io::stdin();
        let mut buf = [0u8; 64];
        loop {
            match stdin.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(_) => continue,
            }
        }
        token.cancel();
    });
}

/// Run one worker described by `spec` and write its report as JSON
///
/// `cancel` is also cancelled when stdin closes.
pub async fn run_spec(
    spec: WorkerSpec,
    report_path: &Path,
    cancel: CancellationToken,
) -> Result<WorkerReport> {
    cancel_on_stdin_close(cancel.clone());

    let handles = WorkerHandles::from_spec(&spec)?;
    let report = Worker::new(spec, handles, cancel).run().await?;
    std::fs::write(report_path, serde_json::to_vec_pretty(&report)?)?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::mock::ScriptedTransport;
    use crate::gate::{Attempt, FailureCause, FetchFailure};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    const PAGE: &str = r#"<html><div class="lyricsh"><h2>x</h2></div><div>Line One
        Line   Two</div></html>"#;

    fn track(id: &str, url: Option<&str>, artist: &str) -> Track {
        Track {
            track_id: id.into(),
            url: url.map(str::to_string),
            artist: artist.into(),
            title: format!("{} song", id),
        }
    }

    fn spec(dir: &TempDir, kind: JobKind, tracks: Vec<Track>) -> WorkerSpec {
        WorkerSpec {
            index: 0,
            kind,
            tracks,
            output: dir.path().join("w0.tsv"),
            retry: RetryConfig {
                unit_ms: 1,
                ceiling_units: 8,
            },
            http: HttpConfig::default(),
            sites: vec!["azlyrics".into()],
            tagging: None,
            logging: LoggingConfig::default(),
        }
    }

    fn rows(path: &Path, kind: JobKind) -> Vec<ResultRow> {
        let mut rows = Vec::new();
        crate::tsv::for_each_row(path, kind, |row| {
            rows.push(row);
            Ok(())
        })
        .unwrap();
        rows
    }

    #[tokio::test]
    async fn test_extraction_outcomes() {
        let dir = TempDir::new().unwrap();
        let ok = "http://www.azlyrics.com/lyrics/a/one.html";
        let flaky = "http://www.azlyrics.com/lyrics/a/two.html";
        let dead = "http://www.azlyrics.com/lyrics/a/three.html";
        let empty = "http://www.azlyrics.com/lyrics/a/four.html";

        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(ok, 200, PAGE);
        transport.respond(flaky, 503, "").respond(flaky, 200, PAGE);
        transport.respond(dead, 410, "");
        transport.respond(empty, 200, "<html>moved</html>");

        let tracks = vec![
            track("t1", Some(ok), "a"),
            track("t2", Some("http://unknown.test/x"), "a"),
            track("t3", Some(flaky), "a"),
            track("t4", Some(dead), "a"),
            track("t5", Some(empty), "a"),
        ];
        let spec = spec(&dir, JobKind::Extract, tracks);
        let output = spec.output.clone();
        let handles =
            WorkerHandles::build(JobKind::Extract, transport.clone(), &spec.http, &spec.sites, None)
                .unwrap();

        let report = Worker::new(spec, handles, CancellationToken::new())
            .run()
            .await
            .unwrap();

        assert_eq!(report.assigned, 5);
        assert_eq!(report.processed, 5);
        assert_eq!(report.written, 2);
        assert_eq!(report.no_handler, 1);
        assert_eq!(report.fatal, 1);
        assert_eq!(report.no_data, 1);
        assert_eq!(transport.calls_to(flaky), 2);

        let written = rows(&output, JobKind::Extract);
        assert_eq!(
            written[0],
            ResultRow::Lyrics {
                track_id: "t1".into(),
                lyrics: "line one line two".into()
            }
        );
        assert_eq!(written[1].track_id(), "t3");
    }

    #[tokio::test]
    async fn test_cancelled_worker_writes_header_only() {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(ScriptedTransport::new());
        let spec = spec(
            &dir,
            JobKind::Extract,
            vec![track("t1", Some("http://www.azlyrics.com/lyrics/a/one.html"), "a")],
        );
        let output = spec.output.clone();
        let handles =
            WorkerHandles::build(JobKind::Extract, transport.clone(), &spec.http, &spec.sites, None)
                .unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = Worker::new(spec, handles, cancel).run().await.unwrap();

        assert!(report.cancelled);
        assert_eq!(report.processed, 0);
        assert_eq!(transport.total_calls(), 0);
        assert_eq!(std::fs::read_to_string(output).unwrap(), "trackid\tlyrics\n");
    }

    /// Answers by artist name and counts calls
    struct FakeTagger {
        artist_calls: AtomicUsize,
        track_calls: AtomicUsize,
    }

    impl FakeTagger {
        fn new() -> Self {
            Self {
                artist_calls: AtomicUsize::new(0),
                track_calls: AtomicUsize::new(0),
            }
        }
    }

    fn failure() -> FetchFailure {
        FetchFailure {
            url: "fake".into(),
            cause: FailureCause::Status(404),
        }
    }

    #[async_trait]
    impl Tagger for FakeTagger {
        fn name(&self) -> &str {
            "fake"
        }

        async fn tag_artist(&self, artist: &str) -> Attempt<Option<String>> {
            self.artist_calls.fetch_add(1, Ordering::SeqCst);
            match artist {
                "Cher" => Attempt::Ok(Some("pop".into())),
                "Broken" => Attempt::Fatal(failure()),
                _ => Attempt::Ok(None),
            }
        }

        async fn tag_track(&self, _artist: &str, title: &str) -> Attempt<Option<String>> {
            self.track_calls.fetch_add(1, Ordering::SeqCst);
            if title == "t1 song" {
                Attempt::Ok(Some("dance".into()))
            } else {
                Attempt::Ok(None)
            }
        }
    }

    fn tag_handles(tagger: Arc<FakeTagger>) -> WorkerHandles {
        let mut handles = WorkerHandles::build(
            JobKind::Tag,
            Arc::new(ScriptedTransport::new()),
            &HttpConfig::default(),
            &[],
            None,
        )
        .unwrap();
        handles.taggers.push(tagger);
        handles
    }

    #[tokio::test]
    async fn test_artist_lookups_are_cached() {
        let dir = TempDir::new().unwrap();
        let tracks = vec![
            track("t1", None, "Cher"),
            track("t2", None, "Unknown"),
            track("t3", None, "cher"),
            track("t4", None, "Unknown"),
            track("t5", None, "Broken"),
            track("t6", None, "Broken"),
        ];
        let spec = spec(&dir, JobKind::Tag, tracks);
        let output = spec.output.clone();
        let tagger = Arc::new(FakeTagger::new());

        let report = Worker::new(spec, tag_handles(tagger.clone()), CancellationToken::new())
            .run()
            .await
            .unwrap();

        // Cher and Unknown once each; Broken is a failure and asked twice
        assert_eq!(tagger.artist_calls.load(Ordering::SeqCst), 4);
        assert_eq!(report.written, 2);
        assert_eq!(report.no_data, 2);
        assert_eq!(report.fatal, 2);

        let written = rows(&output, JobKind::Tag);
        assert_eq!(
            written[1],
            ResultRow::Tag {
                track_id: "t3".into(),
                artist: "cher".into(),
                title: "t3 song".into(),
                tag: "pop".into()
            }
        );
    }

    #[tokio::test]
    async fn test_track_then_artist_falls_back() {
        let dir = TempDir::new().unwrap();
        let tracks = vec![track("t1", None, "Cher"), track("t2", None, "Cher")];
        let mut spec = spec(&dir, JobKind::Tag, tracks);
        spec.tagging = Some(TaggingSpec {
            api_key: "k".into(),
            base_url: "http://unused.test/".into(),
            strategy: TagStrategy::TrackThenArtist,
            taxonomy: GenreTaxonomy::default(),
        });
        let output = spec.output.clone();
        let tagger = Arc::new(FakeTagger::new());

        Worker::new(spec, tag_handles(tagger.clone()), CancellationToken::new())
            .run()
            .await
            .unwrap();

        let tags: Vec<String> = rows(&output, JobKind::Tag)
            .into_iter()
            .map(|row| row.fields()[3].to_string())
            .collect();
        assert_eq!(tags, vec!["dance", "pop"]);
        assert_eq!(tagger.track_calls.load(Ordering::SeqCst), 2);
        assert_eq!(tagger.artist_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_spec_json_masks_nothing_but_debug_does() {
        let tagging = TaggingSpec {
            api_key: "secret".into(),
            base_url: "http://x/".into(),
            strategy: TagStrategy::Artist,
            taxonomy: GenreTaxonomy::default(),
        };
        assert!(!format!("{:?}", tagging).contains("secret"));
        let json = serde_json::to_string(&tagging).unwrap();
        let back: TaggingSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tagging);
    }
}
