//! lyricsift - lyrics and genre harvester
//!
//! **Subcommands:**
//! - `extract` - fetch lyrics pages and write `trackid, lyrics`
//! - `tag` - ask Last.fm for a canonical genre and write
//!   `trackid, artist, title, tag`
//! - `crawl` - walk the MetroLyrics catalogue into `trackid, url, artist, title`
//! - `urls` - give each track of a list the page URL one site would use
//! - `worker` (hidden) - one partition, run as a child process
//!
//! Exit status is 0 when every partition finished and 2 when any failed.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use lyricsift_common::config::{
    load_toml_config, resolve_lastfm_api_key, ConfigResolver, Isolation, TagStrategy, TomlConfig,
};
use lyricsift_common::logging::init_tracing;
use lyricsift_harvest::crawler::MetroLyricsCrawler;
use lyricsift_harvest::extractors::Site;
use lyricsift_harvest::gate::{ConnectionGate, HttpTransport};
use lyricsift_harvest::tagger::GenreTaxonomy;
use lyricsift_harvest::tsv::{read_tracks, TrackListSink};
use lyricsift_harvest::worker::{self, TaggingSpec};
use lyricsift_harvest::{JobKind, JobOrchestrator, JobSettings, JobSummary, Track};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const DEFAULT_LYRICS_OUTPUT: &str = "./target/lyrics.tsv";
const DEFAULT_TAGS_OUTPUT: &str = "./target/tags.tsv";
const DEFAULT_CRAWL_OUTPUT: &str = "./target/metrolyrics.tsv";

/// Exit status when one or more partitions failed
const PARTITION_FAILURE_EXIT: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "lyricsift")]
#[command(about = "Harvest lyrics and genre tags for a list of tracks")]
#[command(version)]
struct Cli {
    /// Config file (default: LYRICSIFT_CONFIG, then the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract lyrics from the page at each track's URL
    Extract(JobArgs),
    /// Tag each track with a canonical genre
    Tag(TagArgs),
    /// Crawl lyrics URLs from metrolyrics.com
    Crawl(CrawlArgs),
    /// Build lyrics page URLs for a track list
    Urls(UrlsArgs),
    /// Run one partition described by a spec file
    #[command(hide = true)]
    Worker(WorkerArgs),
}

#[derive(Args, Debug)]
struct JobArgs {
    /// Input TSV
    #[arg(short, long)]
    input: PathBuf,

    /// Output TSV
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Number of workers
    #[arg(short = 'p', long = "workers", visible_alias = "processes")]
    workers: Option<usize>,

    /// Worker isolation (thread or process)
    #[arg(long)]
    isolation: Option<Isolation>,

    /// Sort the merged output by track id
    #[arg(long)]
    sort: bool,

    /// Cancel whatever is left after this many seconds
    #[arg(long)]
    deadline_secs: Option<u64>,

    /// Write the job summary as JSON
    #[arg(long)]
    summary: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct TagArgs {
    #[command(flatten)]
    job: JobArgs,

    /// Genre taxonomy JSON
    #[arg(short = 'g', long)]
    genres: Option<PathBuf>,

    /// Last.fm API key
    #[arg(long)]
    api_key: Option<String>,

    /// Lookups per track (artist, track or track-then-artist)
    #[arg(long)]
    strategy: Option<TagStrategy>,
}

#[derive(Args, Debug)]
struct CrawlArgs {
    /// Output TSV
    #[arg(short, long, default_value = DEFAULT_CRAWL_OUTPUT)]
    output: PathBuf,

    /// Longest total backoff for one page, in seconds
    #[arg(short = 'd', long, default_value_t = 300)]
    max_delay: u64,

    /// Highest page number followed per listing
    #[arg(long)]
    max_depth: Option<u32>,
}

#[derive(Args, Debug)]
struct UrlsArgs {
    /// Track list with trackid, artist and title columns
    #[arg(short, long)]
    input: PathBuf,

    /// Output TSV, usable as extraction input
    #[arg(short, long)]
    output: PathBuf,

    /// Site to build URLs for
    #[arg(long, default_value = "metrolyrics")]
    site: Site,
}

#[derive(Args, Debug)]
struct WorkerArgs {
    #[arg(long)]
    spec: PathBuf,

    #[arg(long)]
    report: PathBuf,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let Cli {
        config,
        log_level,
        command,
    } = Cli::parse();

    match command {
        Command::Extract(job) => {
            run_job(JobKind::Extract, job, None, config, log_level).await
        }
        Command::Tag(tag) => {
            let TagArgs {
                job,
                genres,
                api_key,
                strategy,
            } = tag;
            let tagging = TagOptions {
                genres,
                api_key,
                strategy,
            };
            run_job(JobKind::Tag, job, Some(tagging), config, log_level).await
        }
        Command::Crawl(args) => run_crawl(args, config, log_level).await,
        Command::Urls(args) => run_urls(args, config, log_level),
        Command::Worker(args) => run_worker(args, log_level).await,
    }
}

struct TagOptions {
    genres: Option<PathBuf>,
    api_key: Option<String>,
    strategy: Option<TagStrategy>,
}

fn load_config(cli_path: Option<PathBuf>) -> Result<(TomlConfig, Option<PathBuf>)> {
    let path = ConfigResolver::new(cli_path)
        .resolve_path()
        .context("Failed to locate configuration")?;
    let config = match &path {
        Some(path) => load_toml_config(path).context("Failed to load configuration")?,
        None => TomlConfig::default(),
    };
    config.validate().context("Invalid configuration")?;
    Ok((config, path))
}

async fn run_job(
    kind: JobKind,
    args: JobArgs,
    tag: Option<TagOptions>,
    config_path: Option<PathBuf>,
    log_level: Option<String>,
) -> Result<ExitCode> {
    let (config, loaded_from) = load_config(config_path)?;
    init_tracing(&config.logging, log_level.as_deref()).context("Failed to initialise logging")?;

    info!("lyricsift {} ({})", env!("CARGO_PKG_VERSION"), kind);
    match &loaded_from {
        Some(path) => info!("Configuration loaded from {}", path.display()),
        None => info!("No configuration file found, using built-in defaults"),
    }

    let default_output = match kind {
        JobKind::Extract => DEFAULT_LYRICS_OUTPUT,
        JobKind::Tag => DEFAULT_TAGS_OUTPUT,
    };
    let output = args.output.unwrap_or_else(|| PathBuf::from(default_output));

    let mut settings = JobSettings::from_config(kind, output, &config);
    if let Some(workers) = args.workers {
        settings.workers = workers;
    }
    if let Some(isolation) = args.isolation {
        settings.isolation = isolation;
    }
    if args.sort {
        settings.sort_by_track_id = true;
    }
    if let Some(secs) = args.deadline_secs {
        settings.deadline = Some(Duration::from_secs(secs));
    }
    if let Some(level) = &log_level {
        settings.logging.level = level.clone();
    }

    if let Some(tag) = tag {
        let api_key = resolve_lastfm_api_key(tag.api_key.as_deref(), &config)
            .context("Failed to resolve Last.fm API key")?;
        let genres_path = tag.genres.unwrap_or_else(|| config.genres_file.clone());
        let taxonomy = GenreTaxonomy::load(&genres_path)
            .with_context(|| format!("Failed to load genres from {}", genres_path.display()))?;
        settings = settings.with_tagging(TaggingSpec {
            api_key,
            base_url: config.lastfm.base_url.clone(),
            strategy: tag.strategy.unwrap_or(config.lastfm.strategy),
            taxonomy,
        });
    }

    let orchestrator = JobOrchestrator::new(settings);
    let cancel = orchestrator.cancellation_token();
    tokio::spawn(async move {
        shutdown_signal().await;
        cancel.cancel();
    });

    let summary = orchestrator.run(&args.input).await.context("Job failed")?;
    print_summary(&summary);

    if let Some(path) = &args.summary {
        let json = serde_json::to_vec_pretty(&summary).context("Failed to encode summary")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write summary to {}", path.display()))?;
    }

    if summary.succeeded() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(PARTITION_FAILURE_EXIT))
    }
}

async fn run_crawl(
    args: CrawlArgs,
    config_path: Option<PathBuf>,
    log_level: Option<String>,
) -> Result<ExitCode> {
    let (mut config, _) = load_config(config_path)?;
    init_tracing(&config.logging, log_level.as_deref()).context("Failed to initialise logging")?;
    if let Some(depth) = args.max_depth {
        anyhow::ensure!(depth > 0, "--max-depth must be at least 1");
        config.crawl.max_depth = depth;
    }

    let transport = HttpTransport::new(&config.http).context("Failed to build HTTP client")?;
    let gate = ConnectionGate::new(Arc::new(transport), &config.http.temporary_statuses);
    let retry = config
        .retry
        .clone()
        .with_max_delay(Duration::from_secs(args.max_delay));

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        on_signal.cancel();
    });

    let report = MetroLyricsCrawler::new(gate, &config.crawl, retry)
        .with_cancellation(cancel)
        .crawl(&args.output)
        .await
        .with_context(|| format!("Crawl into {} failed", args.output.display()))?;

    println!(
        "crawled {} tracks from {} artists ({} pages skipped){}",
        report.tracks,
        report.artists,
        report.skipped_pages,
        if report.cancelled { ", cancelled" } else { "" }
    );
    Ok(ExitCode::SUCCESS)
}

fn run_urls(args: UrlsArgs, config_path: Option<PathBuf>, log_level: Option<String>) -> Result<ExitCode> {
    let (config, _) = load_config(config_path)?;
    init_tracing(&config.logging, log_level.as_deref()).context("Failed to initialise logging")?;

    let input = read_tracks(&args.input, JobKind::Tag)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let tracks: Vec<Track> = input
        .tracks
        .into_iter()
        .map(|track| Track {
            url: Some(args.site.lyrics_url(&track.artist, &track.title)),
            ..track
        })
        .collect();

    let mut sink = TrackListSink::create(&args.output)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;
    sink.write_tracks(&tracks)?;
    let written = sink.finish()?;
    info!(site = %args.site, written, rejected = input.rejected, "Track URLs written");
    println!("{} {} URLs written to {}", written, args.site, args.output.display());
    Ok(ExitCode::SUCCESS)
}

async fn run_worker(args: WorkerArgs, log_level: Option<String>) -> Result<ExitCode> {
    let spec = worker::read_spec(&args.spec)
        .with_context(|| format!("Failed to read worker spec {}", args.spec.display()))?;
    init_tracing(&spec.logging, log_level.as_deref()).context("Failed to initialise logging")?;

    // Ctrl+C reaches the whole process group; stop cleanly like the parent
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        on_signal.cancel();
    });

    let index = spec.index;
    worker::run_spec(spec, &args.report, cancel)
        .await
        .with_context(|| format!("Worker {} failed", index))?;
    Ok(ExitCode::SUCCESS)
}

fn print_summary(summary: &JobSummary) {
    println!("job {} ({})", summary.job_id, summary.kind);
    println!(
        "  tracks: {}  written: {}  skipped: {}  rejected input rows: {}",
        summary.tracks_total,
        summary.rows_written,
        summary.skipped(),
        summary.input_rejected
    );
    for report in &summary.workers {
        println!(
            "  worker {}: {}/{} processed, {} written, {} no handler, {} no data, {} fatal, {} gave up{}",
            report.index,
            report.processed,
            report.assigned,
            report.written,
            report.no_handler,
            report.no_data,
            report.fatal,
            report.retries_exhausted,
            if report.cancelled { ", cancelled" } else { "" }
        );
    }
    for failure in &summary.failed {
        println!(
            "  worker {} FAILED: {} ({} rows recovered)",
            failure.index, failure.reason, failure.rows_recovered
        );
    }
    if summary.cancelled {
        println!("  job was cancelled before every track was processed");
    }
    println!("  output: {}", summary.output.display());
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, cancelling job");
        },
        _ = terminate => {
            info!("Received terminate signal, cancelling job");
        },
    }
}
