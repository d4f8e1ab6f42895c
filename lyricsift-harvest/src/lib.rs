//! # lyricsift harvest
//!
//! Partitioned lyrics and genre harvesting.
//!
//! **Data flow:** orchestrator → partitions → workers → (connection gate →
//! extractor or tagger) → worker outputs → deterministic merge → final TSV.
//!
//! # Modules
//! - `gate` - one HTTP request, classified retryable or fatal
//! - `retry` - exponential backoff over gate attempts
//! - `extractors` - site handlers and first-match dispatch
//! - `tagger` - Last.fm client, genre taxonomy, artist cache
//! - `worker` - sequential processing of one partition
//! - `orchestrator` - partition, launch, join, merge
//! - `crawler` - MetroLyrics catalogue into extraction input
//! - `partition`, `tsv`, `track`, `summary` - data model and I/O

pub mod crawler;
pub mod error;
pub mod extractors;
pub mod gate;
pub mod orchestrator;
pub mod partition;
pub mod retry;
pub mod summary;
pub mod tagger;
pub mod track;
pub mod tsv;
pub mod worker;

pub use error::{HarvestError, Result};
pub use orchestrator::{JobOrchestrator, JobSettings};
pub use summary::{JobSummary, SkipReason, WorkerFailure, WorkerReport};
pub use track::{JobKind, ResultRow, Track};
