//! Job orchestration
//!
//! # Job Lifecycle
//! 1. Read the input and partition it round-robin
//! 2. Create the output directory and write the final header
//! 3. Bind each partition to a private output in a job-scoped scratch
//!    directory next to the final output
//! 4. Launch every worker (threads or child processes)
//! 5. Wait for all of them, whatever way they end
//! 6. Merge outputs in worker-index order
//! 7. Summarize; the scratch directory is removed on drop
//!
//! Per-track problems never fail a job, and neither does a failed worker:
//! its partition is listed in `JobSummary::failed` and whatever rows it had
//! flushed are merged anyway.

pub mod isolation;
pub mod merge;

use crate::error::{HarvestError, Result};
use crate::extractors::ExtractorRegistry;
use crate::gate::{HttpTransport, Transport};
use crate::partition::partition;
use crate::summary::{JobSummary, WorkerFailure};
use crate::track::JobKind;
use crate::tsv::{read_tracks, TsvSink};
use crate::worker::{TaggingSpec, WorkerHandles, WorkerSpec};
use chrono::Utc;
use isolation::WorkerRun;
use lyricsift_common::config::{HttpConfig, Isolation, LoggingConfig, RetryConfig, TomlConfig};
use merge::{merge_outputs, MergeSource};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Scratch directory prefix, next to the final output
const SCRATCH_PREFIX: &str = ".lyricsift-";

/// Settings for one job
#[derive(Debug, Clone)]
pub struct JobSettings {
    pub kind: JobKind,
    pub output: PathBuf,
    pub workers: usize,
    pub isolation: Isolation,
    pub sort_by_track_id: bool,
    pub deadline: Option<Duration>,
    /// Executable for process isolation; defaults to the current executable
    pub worker_program: Option<PathBuf>,
    pub retry: RetryConfig,
    pub http: HttpConfig,
    pub sites: Vec<String>,
    pub tagging: Option<TaggingSpec>,
    pub logging: LoggingConfig,
}

impl JobSettings {
    /// Settings from a loaded config; tagging is added separately
    pub fn from_config(kind: JobKind, output: PathBuf, config: &TomlConfig) -> Self {
        Self {
            kind,
            output,
            workers: config.job.workers,
            isolation: config.job.isolation,
            sort_by_track_id: config.job.sort_by_track_id,
            deadline: config.job.deadline(),
            worker_program: config.job.worker_program.clone(),
            retry: config.retry.clone(),
            http: config.http.clone(),
            sites: config.extract.sites.clone(),
            tagging: None,
            logging: config.logging.clone(),
        }
    }

    pub fn with_tagging(mut self, tagging: TaggingSpec) -> Self {
        self.tagging = Some(tagging);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(HarvestError::Config(
                "worker count must be at least 1".to_string(),
            ));
        }
        if self.retry.unit_ms == 0 {
            return Err(HarvestError::Config(
                "retry unit must be at least 1 ms".to_string(),
            ));
        }
        if self.kind == JobKind::Tag {
            match &self.tagging {
                None => {
                    return Err(HarvestError::Config(
                        "tag jobs need an API key and a genre taxonomy".to_string(),
                    ))
                }
                Some(tagging) if tagging.taxonomy.is_empty() => {
                    warn!("Genre taxonomy is empty; no track can be tagged");
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

/// Runs one job from input file to final output
pub struct JobOrchestrator {
    settings: JobSettings,
    transport: Option<Arc<dyn Transport>>,
    registry: Option<Arc<ExtractorRegistry>>,
    cancel: CancellationToken,
}

impl JobOrchestrator {
    pub fn new(settings: JobSettings) -> Self {
        Self {
            settings,
            transport: None,
            registry: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Transport shared by thread workers instead of a real HTTP client
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Registry shared by thread workers instead of the configured sites
    pub fn with_registry(mut self, registry: Arc<ExtractorRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run the job described by the settings over `input`
    pub async fn run(&self, input: &Path) -> Result<JobSummary> {
        let settings = &self.settings;
        settings.validate()?;

        let job_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(
            job_id = %job_id,
            kind = %settings.kind,
            workers = settings.workers,
            isolation = %settings.isolation,
            input = %input.display(),
            "Starting job"
        );

        // Step 1: input and partitions, before any existing output is touched
        let input = read_tracks(input, settings.kind)?;
        let tracks_total = input.tracks.len();
        let known_ids: HashSet<String> =
            input.tracks.iter().map(|t| t.track_id.clone()).collect();
        let partitions = partition(input.tracks, settings.workers)?;

        // Step 2: output location and header
        let out_dir = output_dir(&settings.output);
        std::fs::create_dir_all(&out_dir)?;
        TsvSink::create(&settings.output, settings.kind)?.finish()?;

        // Step 3: private outputs
        let scratch = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir_in(&out_dir)?;
        let specs: Vec<WorkerSpec> = partitions
            .into_iter()
            .map(|p| WorkerSpec {
                index: p.index,
                kind: settings.kind,
                output: scratch.path().join(format!("w{}.tsv", p.index)),
                tracks: p.tracks,
                retry: settings.retry.clone(),
                http: settings.http.clone(),
                sites: settings.sites.clone(),
                tagging: settings.tagging.clone(),
                logging: settings.logging.clone(),
            })
            .collect();
        let sources: Vec<MergeSource> = specs
            .iter()
            .map(|s| MergeSource {
                index: s.index,
                path: s.output.clone(),
            })
            .collect();

        // Steps 4 and 5: launch and join
        let deadline = settings.deadline.map(|limit| {
            let cancel = self.cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(limit).await;
                warn!(deadline_secs = limit.as_secs(), "Job deadline reached, cancelling");
                cancel.cancel();
            })
        });

        let runs = match settings.isolation {
            Isolation::Thread => {
                let handles = self.thread_handles()?;
                isolation::run_threads(specs, handles, &self.cancel).await
            }
            Isolation::Process => {
                let program = match &settings.worker_program {
                    Some(program) => program.clone(),
                    None => std::env::current_exe()?,
                };
                isolation::run_processes(specs, &program, scratch.path(), &self.cancel).await
            }
        };

        if let Some(timer) = deadline {
            timer.abort();
        }

        // Step 6: merge
        let stats = merge_outputs(
            settings.kind,
            &settings.output,
            &sources,
            &known_ids,
            settings.sort_by_track_id,
        )?;

        // Step 7: summary
        let mut workers = Vec::new();
        let mut failed = Vec::new();
        for WorkerRun { index, result, .. } in runs {
            match result {
                Ok(report) => workers.push(report),
                Err(reason) => {
                    let rows_recovered = stats.per_source.get(index).copied().unwrap_or(0);
                    error!(worker = index, rows_recovered, "Worker failed: {}", reason);
                    failed.push(WorkerFailure {
                        index,
                        reason,
                        rows_recovered,
                    });
                }
            }
        }

        let summary = JobSummary {
            job_id,
            kind: settings.kind,
            isolation: settings.isolation,
            started_at,
            finished_at: Utc::now(),
            output: settings.output.clone(),
            tracks_total,
            input_rejected: input.rejected,
            rows_written: stats.rows,
            rows_dropped: stats.dropped,
            cancelled: self.cancel.is_cancelled() || workers.iter().any(|w| w.cancelled),
            workers,
            failed,
        };

        info!(
            job_id = %summary.job_id,
            tracks = summary.tracks_total,
            written = summary.rows_written,
            skipped = summary.skipped(),
            failed_partitions = summary.failed.len(),
            cancelled = summary.cancelled,
            duration_ms = summary.duration_ms(),
            "Job complete"
        );

        if let Err(e) = scratch.close() {
            warn!(error = %e, "Could not remove scratch directory");
        }
        Ok(summary)
    }

    fn thread_handles(&self) -> Result<WorkerHandles> {
        let settings = &self.settings;
        let transport: Arc<dyn Transport> = match &self.transport {
            Some(transport) => transport.clone(),
            None => Arc::new(HttpTransport::new(&settings.http)?),
        };
        let mut handles = WorkerHandles::build(
            settings.kind,
            transport,
            &settings.http,
            &settings.sites,
            settings.tagging.as_ref(),
        )?;
        if let Some(registry) = &self.registry {
            handles.registry = registry.clone();
        }
        Ok(handles)
    }
}

fn output_dir(output: &Path) -> PathBuf {
    match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
