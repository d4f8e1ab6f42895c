//! Genre tagging
//!
//! A `Tagger` asks a remote API for the tags of an artist or a track and
//! folds them into one canonical genre via `GenreTaxonomy`. Each lookup is a
//! single request classified like any other gate attempt, so the worker owns
//! the retry loop.
//!
//! Artist lookups are memoized in an `ArtistTagCache` owned by each worker.

pub mod lastfm;
pub mod taxonomy;

pub use lastfm::LastFmTagger;
pub use taxonomy::{CanonicalGenre, GenreTaxonomy};

use crate::gate::Attempt;
use async_trait::async_trait;
use std::collections::HashMap;

/// Remote tagging service
#[async_trait]
pub trait Tagger: Send + Sync {
    /// Name used in logs and as the cache namespace
    fn name(&self) -> &str;

    /// Canonical genre of an artist, `Ok(None)` when the service has none
    async fn tag_artist(&self, artist: &str) -> Attempt<Option<String>>;

    /// Canonical genre of one track
    async fn tag_track(&self, artist: &str, title: &str) -> Attempt<Option<String>>;
}

/// Per-worker memo of definitive artist answers
///
/// Keys are `(tagger name, artist)` with the artist case-folded. Failures are
/// never stored, so a later track by the same artist asks again.
#[derive(Debug, Default)]
pub struct ArtistTagCache {
    entries: HashMap<(String, String), Option<String>>,
    hits: usize,
}

impl ArtistTagCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(tagger: &str, artist: &str) -> (String, String) {
        (tagger.to_string(), artist.trim().to_lowercase())
    }

    pub fn get(&mut self, tagger: &str, artist: &str) -> Option<Option<String>> {
        let found = self.entries.get(&Self::key(tagger, artist)).cloned();
        if found.is_some() {
            self.hits += 1;
        }
        found
    }

    pub fn insert(&mut self, tagger: &str, artist: &str, tag: Option<String>) {
        self.entries.insert(Self::key(tagger, artist), tag);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> usize {
        self.hits
    }
}
