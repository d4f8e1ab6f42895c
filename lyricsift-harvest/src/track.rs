//! Track and result row types
//!
//! A `Track` is one unit of input work; a `ResultRow` is what a worker writes
//! when a track succeeds. Both are immutable once built.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of job, which decides required columns and the output layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    /// Fetch pages and extract lyrics
    Extract,
    /// Query the tagging API for a canonical genre
    Tag,
}

impl JobKind {
    /// Columns the input file must carry
    pub fn required_columns(&self) -> &'static [&'static str] {
        match self {
            JobKind::Extract => &["trackid", "url", "artist", "title"],
            JobKind::Tag => &["trackid", "artist", "title"],
        }
    }

    /// Header of worker outputs and of the final output
    pub fn output_columns(&self) -> &'static [&'static str] {
        match self {
            JobKind::Extract => &["trackid", "lyrics"],
            JobKind::Tag => &["trackid", "artist", "title", "tag"],
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKind::Extract => write!(f, "extract"),
            JobKind::Tag => write!(f, "tag"),
        }
    }
}

/// One input row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// Unique within one job's input
    pub track_id: String,
    /// Source page (required for extraction only)
    pub url: Option<String>,
    pub artist: String,
    pub title: String,
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} \"{}\" - \"{}\"", self.track_id, self.artist, self.title)
    }
}

/// One output row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultRow {
    Lyrics {
        track_id: String,
        lyrics: String,
    },
    Tag {
        track_id: String,
        artist: String,
        title: String,
        tag: String,
    },
}

impl ResultRow {
    pub fn track_id(&self) -> &str {
        match self {
            ResultRow::Lyrics { track_id, .. } | ResultRow::Tag { track_id, .. } => track_id,
        }
    }

    pub fn kind(&self) -> JobKind {
        match self {
            ResultRow::Lyrics { .. } => JobKind::Extract,
            ResultRow::Tag { .. } => JobKind::Tag,
        }
    }

    /// Fields in `JobKind::output_columns` order
    pub fn fields(&self) -> Vec<&str> {
        match self {
            ResultRow::Lyrics { track_id, lyrics } => vec![track_id.as_str(), lyrics.as_str()],
            ResultRow::Tag {
                track_id,
                artist,
                title,
                tag,
            } => vec![
                track_id.as_str(),
                artist.as_str(),
                title.as_str(),
                tag.as_str(),
            ],
        }
    }

    /// Rebuild a row from fields in `JobKind::output_columns` order
    pub fn from_fields(kind: JobKind, fields: &[&str]) -> Option<Self> {
        match (kind, fields) {
            (JobKind::Extract, [track_id, lyrics]) => Some(ResultRow::Lyrics {
                track_id: track_id.to_string(),
                lyrics: lyrics.to_string(),
            }),
            (JobKind::Tag, [track_id, artist, title, tag]) => Some(ResultRow::Tag {
                track_id: track_id.to_string(),
                artist: artist.to_string(),
                title: title.to_string(),
                tag: tag.to_string(),
            }),
            _ => None,
        }
    }
}
