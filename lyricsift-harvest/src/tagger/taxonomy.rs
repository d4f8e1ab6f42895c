//! Canonical genre taxonomy
//!
//! Loaded from a JSON list of `{"genre": "...", "subgenres": [...]}`. List
//! order is significant: it breaks ties between equally weighted genres.

use crate::error::{HarvestError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One canonical genre and the raw tags folded into it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalGenre {
    #[serde(rename = "genre")]
    pub name: String,
    #[serde(rename = "subgenres", default)]
    pub synonyms: Vec<String>,
}

impl CanonicalGenre {
    fn accepts(&self, tag: &str) -> bool {
        self.name == tag || self.synonyms.iter().any(|s| s == tag)
    }
}

/// Ordered list of canonical genres
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<CanonicalGenre>", into = "Vec<CanonicalGenre>")]
pub struct GenreTaxonomy {
    genres: Vec<CanonicalGenre>,
}

impl From<Vec<CanonicalGenre>> for GenreTaxonomy {
    fn from(genres: Vec<CanonicalGenre>) -> Self {
        Self::new(genres)
    }
}

impl From<GenreTaxonomy> for Vec<CanonicalGenre> {
    fn from(taxonomy: GenreTaxonomy) -> Self {
        taxonomy.genres
    }
}

fn fold(tag: &str) -> String {
    tag.trim().to_lowercase()
}

impl GenreTaxonomy {
    /// Names and synonyms are trimmed and lower-cased
    pub fn new(genres: Vec<CanonicalGenre>) -> Self {
        let genres = genres
            .into_iter()
            .map(|g| CanonicalGenre {
                name: fold(&g.name),
                synonyms: g.synonyms.iter().map(|s| fold(s)).collect(),
            })
            .collect();
        Self { genres }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let genres: Vec<CanonicalGenre> = serde_json::from_str(json)?;
        Ok(Self::new(genres))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            HarvestError::Config(format!("Read genres failed ({}): {}", path.display(), e))
        })?;
        let taxonomy = Self::from_json_str(&content).map_err(|e| {
            HarvestError::Config(format!("Parse genres failed ({}): {}", path.display(), e))
        })?;
        tracing::info!(
            path = %path.display(),
            genres = taxonomy.len(),
            "Genre taxonomy loaded"
        );
        Ok(taxonomy)
    }

    pub fn genres(&self) -> &[CanonicalGenre] {
        &self.genres
    }

    pub fn len(&self) -> usize {
        self.genres.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genres.is_empty()
    }

    /// Fold weighted raw tags into one canonical genre
    ///
    /// Each genre accepting a tag accumulates that tag's weight. Highest total
    /// wins, earlier genres win ties, and no match at all gives None.
    pub fn canonicalize<'a, I>(&self, tags: I) -> Option<String>
    where
        I: IntoIterator<Item = (&'a str, u64)>,
    {
        let mut votes: Vec<Option<u64>> = vec![None; self.genres.len()];
        for (tag, weight) in tags {
            let tag = fold(tag);
            for (genre, vote) in self.genres.iter().zip(votes.iter_mut()) {
                if genre.accepts(&tag) {
                    *vote = Some(vote.unwrap_or(0).saturating_add(weight));
                }
            }
        }

        let mut best: Option<(usize, u64)> = None;
        for (idx, vote) in votes.iter().enumerate() {
            if let Some(total) = *vote {
                if best.map_or(true, |(_, top)| total > top) {
                    best = Some((idx, total));
                }
            }
        }
        best.map(|(idx, _)| self.genres[idx].name.clone())
    }
}
