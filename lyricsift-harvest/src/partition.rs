//! Static round-robin partitioning
//!
//! Track `n` (its index among accepted input rows) goes to worker
//! `n % worker_count`. Assignment depends only on `(n, worker_count)`, so the
//! same input and worker count always produce the same partitions, and every
//! track lands in exactly one of them.

use crate::error::{HarvestError, Result};
use crate::track::Track;

/// Tracks assigned to one worker, in input order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    /// Worker index this partition belongs to
    pub index: usize,
    pub tracks: Vec<Track>,
}

impl Partition {
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

/// Worker index for the track at `row_index`
pub fn assign(row_index: usize, worker_count: usize) -> usize {
    row_index % worker_count
}

/// Split tracks into `worker_count` partitions
///
/// Always returns exactly `worker_count` partitions; some are empty when
/// there are fewer tracks than workers.
pub fn partition(tracks: Vec<Track>, worker_count: usize) -> Result<Vec<Partition>> {
    if worker_count == 0 {
        return Err(HarvestError::Config(
            "worker count must be at least 1".to_string(),
        ));
    }

    let mut partitions: Vec<Partition> = (0..worker_count)
        .map(|index| Partition {
            index,
            tracks: Vec::with_capacity(tracks.len() / worker_count + 1),
        })
        .collect();

    for (row_index, track) in tracks.into_iter().enumerate() {
        partitions[assign(row_index, worker_count)].tracks.push(track);
    }

    Ok(partitions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn tracks(n: usize) -> Vec<Track> {
        (0..n)
            .map(|i| Track {
                track_id: format!("t{}", i),
                url: None,
                artist: format!("artist {}", i),
                title: format!("title {}", i),
            })
            .collect()
    }

    #[test]
    fn test_ten_tracks_three_workers() {
        let parts = partition(tracks(10), 3).unwrap();
        let sizes: Vec<usize> = parts.iter().map(Partition::len).collect();
        assert_eq!(sizes, vec![4, 3, 3]);

        let ids: Vec<&str> = parts[0].tracks.iter().map(|t| t.track_id.as_str()).collect();
        assert_eq!(ids, vec!["t0", "t3", "t6", "t9"]);
        let ids: Vec<&str> = parts[2].tracks.iter().map(|t| t.track_id.as_str()).collect();
        assert_eq!(ids, vec!["t2", "t5", "t8"]);
    }

    #[test]
    fn test_partitions_are_disjoint_and_exhaustive() {
        for workers in 1..8 {
            let parts = partition(tracks(23), workers).unwrap();
            assert_eq!(parts.len(), workers);

            let mut seen = HashSet::new();
            for part in &parts {
                for track in &part.tracks {
                    assert!(seen.insert(track.track_id.clone()), "duplicate {}", track.track_id);
                }
            }
            assert_eq!(seen.len(), 23);
        }
    }

    #[test]
    fn test_partitioning_is_deterministic() {
        assert_eq!(partition(tracks(17), 4).unwrap(), partition(tracks(17), 4).unwrap());
        for row in 0..50 {
            assert_eq!(assign(row, 4), row % 4);
        }
    }

    #[test]
    fn test_more_workers_than_tracks() {
        let parts = partition(tracks(2), 5).unwrap();
        assert_eq!(parts.len(), 5);
        assert_eq!(parts.iter().filter(|p| p.is_empty()).count(), 3);
        assert_eq!(parts[4].index, 4);
    }

    #[test]
    fn test_zero_workers_rejected() {
        assert!(partition(tracks(3), 0).is_err());
    }
}
