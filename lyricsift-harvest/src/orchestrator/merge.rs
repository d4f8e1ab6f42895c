//! Deterministic merge of worker outputs
//!
//! Worker files are read in worker-index order and each file in the order its
//! rows were written. A row is refused (with a warning) when its track id is
//! not in the job input or was already merged. With `sort_by_track_id` the
//! accepted rows are re-sorted by track id before they are appended.

use crate::error::Result;
use crate::track::{JobKind, ResultRow};
use crate::tsv::{for_each_row, TsvSink};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Worker output to merge
#[derive(Debug, Clone)]
pub struct MergeSource {
    pub index: usize,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Rows appended to the final output
    pub rows: usize,
    /// Rows taken from each source, in source order
    pub per_source: Vec<usize>,
    /// Rows refused as unknown or repeated
    pub dropped: usize,
}

pub fn merge_outputs(
    kind: JobKind,
    final_path: &Path,
    sources: &[MergeSource],
    known_ids: &HashSet<String>,
    sort_by_track_id: bool,
) -> Result<MergeStats> {
    let mut sink = TsvSink::append(final_path, kind)?;
    let mut seen: HashSet<String> = HashSet::new();
    let mut buffered: Vec<ResultRow> = Vec::new();
    let mut stats = MergeStats::default();

    for source in sources {
        if !source.path.exists() {
            warn!(worker = source.index, path = %source.path.display(), "Worker output missing");
            stats.per_source.push(0);
            continue;
        }

        // Read errors only cut a source short; write errors fail the merge
        let mut accepted: Vec<ResultRow> = Vec::new();
        let scan = for_each_row(&source.path, kind, |row| {
            let id = row.track_id();
            if !known_ids.contains(id) {
                warn!(worker = source.index, track_id = %id, "Unknown track id in worker output - dropping");
                stats.dropped += 1;
                return Ok(());
            }
            if !seen.insert(id.to_string()) {
                warn!(worker = source.index, track_id = %id, "Track id already merged - dropping");
                stats.dropped += 1;
                return Ok(());
            }
            accepted.push(row);
            Ok(())
        });

        match scan {
            Ok(scan) if scan.malformed > 0 => {
                warn!(worker = source.index, malformed = scan.malformed, "Malformed rows skipped");
            }
            Ok(_) => {}
            Err(e) => {
                warn!(
                    worker = source.index,
                    rows_read = accepted.len(),
                    error = %e,
                    "Worker output unreadable"
                );
            }
        }

        stats.per_source.push(accepted.len());
        if sort_by_track_id {
            buffered.extend(accepted);
        } else {
            for row in &accepted {
                sink.write_row(row)?;
            }
        }
    }

    if sort_by_track_id {
        buffered.sort_by(|a, b| a.track_id().cmp(b.track_id()));
        for row in &buffered {
            sink.write_row(row)?;
        }
    }

    stats.rows = sink.finish()?;
    info!(
        rows = stats.rows,
        dropped = stats.dropped,
        output = %final_path.display(),
        "Merge complete"
    );
    Ok(stats)
}
