//! Tab-separated input and output
//!
//! **Input:** header row plus one track per line. Header names are matched
//! case-insensitively; extra columns are ignored. A missing required column
//! rejects the whole file, while a row with a missing value or a repeated
//! track id is skipped with a warning.
//!
//! **Output:** header row from `JobKind::output_columns`, one `ResultRow` per
//! line. Sinks flush after every row so a worker that dies mid-partition
//! leaves only complete rows behind.

use crate::error::{HarvestError, Result};
use crate::track::{JobKind, ResultRow, Track};
use std::collections::{HashMap, HashSet};
use std::fs::{File, OpenOptions};
use std::path::Path;
use tracing::{debug, warn};

/// Tracks accepted from an input file
#[derive(Debug, Clone)]
pub struct TrackInput {
    /// Accepted tracks in file order
    pub tracks: Vec<Track>,
    /// Rows skipped as malformed or duplicate
    pub rejected: usize,
}

/// Read and validate the tracks of an input file
pub fn read_tracks(path: &Path, kind: JobKind) -> Result<TrackInput> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_path(path)?;

    let columns: HashMap<String, usize> = reader
        .headers()?
        .iter()
        .enumerate()
        .map(|(idx, name)| (name.trim().to_ascii_lowercase(), idx))
        .collect();

    for required in kind.required_columns() {
        if !columns.contains_key(*required) {
            return Err(HarvestError::InvalidInput(format!(
                "{} is missing required column '{}' for {} jobs",
                path.display(),
                required,
                kind
            )));
        }
    }

    let column = |name: &str| columns.get(name).copied();
    let (id_col, artist_col, title_col) = (column("trackid"), column("artist"), column("title"));
    let url_col = column("url");

    let mut tracks = Vec::new();
    let mut seen = HashSet::new();
    let mut rejected = 0;

    for (idx, record) in reader.records().enumerate() {
        // Line numbers are 1-based and the header is line 1
        let line = idx + 2;
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                warn!(line, error = %e, "Unreadable input row - skipping");
                rejected += 1;
                continue;
            }
        };

        let value = |col: Option<usize>| {
            col.and_then(|c| record.get(c))
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let url = value(url_col);
        let missing = kind
            .required_columns()
            .iter()
            .copied()
            .find(|name| value(column(*name)).is_none());
        if let Some(name) = missing {
            warn!(line, column = name, "Input row missing required field - skipping");
            rejected += 1;
            continue;
        }

        // Required columns were checked above
        let (Some(track_id), Some(artist), Some(title)) =
            (value(id_col), value(artist_col), value(title_col))
        else {
            rejected += 1;
            continue;
        };

        if !seen.insert(track_id.clone()) {
            warn!(line, track_id = %track_id, "Duplicate track id - skipping");
            rejected += 1;
            continue;
        }

        tracks.push(Track {
            track_id,
            url,
            artist,
            title,
        });
    }

    debug!(
        path = %path.display(),
        accepted = tracks.len(),
        rejected,
        "Input loaded"
    );

    Ok(TrackInput { tracks, rejected })
}

/// Row-at-a-time TSV writer for worker outputs and the final output
pub struct TsvSink {
    writer: csv::Writer<File>,
    kind: JobKind,
    rows: usize,
}

impl TsvSink {
    /// Create (or truncate) a file and write the header
    pub fn create(path: &Path, kind: JobKind) -> Result<Self> {
        let file = File::create(path)?;
        let mut sink = Self::from_file(file, kind);
        sink.writer.write_record(kind.output_columns())?;
        sink.writer.flush()?;
        Ok(sink)
    }

    /// Open an existing file for appending rows after its header
    pub fn append(path: &Path, kind: JobKind) -> Result<Self> {
        let file = OpenOptions::new().append(true).open(path)?;
        Ok(Self::from_file(file, kind))
    }

    fn from_file(file: File, kind: JobKind) -> Self {
        let writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(file);
        Self {
            writer,
            kind,
            rows: 0,
        }
    }

    /// Write one row and flush it
    pub fn write_row(&mut self, row: &ResultRow) -> Result<()> {
        if row.kind() != self.kind {
            return Err(HarvestError::InvalidInput(format!(
                "{} row written to {} output",
                row.kind(),
                self.kind
            )));
        }
        self.writer.write_record(row.fields())?;
        self.writer.flush()?;
        self.rows += 1;
        Ok(())
    }

    /// Rows written through this sink
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Flush and close, returning the number of rows written
    pub fn finish(mut self) -> Result<usize> {
        self.writer.flush()?;
        Ok(self.rows)
    }
}

/// Columns of a crawled track list, readable as extraction input
pub const TRACK_LIST_COLUMNS: [&str; 4] = ["trackid", "url", "artist", "title"];

/// Writer for `trackid, url, artist, title` files
pub struct TrackListSink {
    writer: csv::Writer<File>,
    rows: usize,
}

impl TrackListSink {
    pub fn create(path: &Path) -> Result<Self> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_path(path)?;
        writer.write_record(TRACK_LIST_COLUMNS)?;
        writer.flush()?;
        Ok(Self { writer, rows: 0 })
    }

    /// Write a batch of tracks and flush once
    pub fn write_tracks(&mut self, tracks: &[Track]) -> Result<()> {
        for track in tracks {
            let url = track.url.as_deref().unwrap_or_default();
            self.writer
                .write_record([track.track_id.as_str(), url, track.artist.as_str(), track.title.as_str()])?;
        }
        self.writer.flush()?;
        self.rows += tracks.len();
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn finish(mut self) -> Result<usize> {
        self.writer.flush()?;
        Ok(self.rows)
    }
}

/// Result of streaming a result file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowScan {
    /// Rows handed to the callback
    pub rows: usize,
    /// Rows dropped as malformed
    pub malformed: usize,
}

/// Stream every well-formed row of a result file, in file order
///
/// A malformed row is skipped. An unreadable tail (e.g. a row cut short when
/// a worker process was killed) ends the scan with a warning.
pub fn for_each_row<F>(path: &Path, kind: JobKind, mut f: F) -> Result<RowScan>
where
    F: FnMut(ResultRow) -> Result<()>,
{
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_path(path)?;

    let header: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if header != kind.output_columns() {
        warn!(
            path = %path.display(),
            header = ?header,
            "Unexpected result header"
        );
    }

    let mut scan = RowScan::default();
    for record in reader.records() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unreadable result row - stopping");
                scan.malformed += 1;
                break;
            }
        };
        let fields: Vec<&str> = record.iter().collect();
        match ResultRow::from_fields(kind, &fields) {
            Some(row) => {
                f(row)?;
                scan.rows += 1;
            }
            None => {
                warn!(
                    path = %path.display(),
                    fields = fields.len(),
                    "Malformed result row - skipping"
                );
                scan.malformed += 1;
            }
        }
    }
    Ok(scan)
}
