//! Configuration loading and resolution
//!
//! The TOML file is optional. Every section and field has a built-in default,
//! and command-line flags override whatever the file provides.
//!
//! # Config File Resolution Priority
//!
//! 1. `--config` command-line argument (file must exist)
//! 2. `LYRICSIFT_CONFIG` environment variable
//! 3. `<user config dir>/lyricsift/config.toml`
//! 4. Built-in defaults
//!
//! A missing file at step 2 or 3 is not fatal: the resolver logs a warning and
//! falls back to the defaults.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming an alternative config file
pub const CONFIG_ENV_VAR: &str = "LYRICSIFT_CONFIG";

/// Environment variable carrying the Last.fm API key
pub const API_KEY_ENV_VAR: &str = "LYRICSIFT_LASTFM_API_KEY";

/// Last.fm web service endpoint
pub const LASTFM_BASE_URL: &str = "http://ws.audioscrobbler.com/2.0/";

/// Lyrics sites reject obvious bots, so pages are requested as a desktop browser
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

/// HTTP statuses treated as temporary unless configured otherwise
pub const DEFAULT_TEMPORARY_STATUSES: [u16; 4] = [408, 500, 503, 504];

/// MetroLyrics site root walked by the crawler
pub const METROLYRICS_BASE_URL: &str = "http://www.metrolyrics.com";

/// Built-in extraction sites in registration order
pub const DEFAULT_SITES: [&str; 4] = ["metrolyrics", "lyricscom", "lyricsmode", "azlyrics"];

// ============================================================================
// Configuration Schema
// ============================================================================

/// Complete configuration loaded from TOML
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Worker pool and merge settings
    pub job: JobConfig,
    /// Backoff settings for retryable failures
    pub retry: RetryConfig,
    /// Outbound HTTP settings
    pub http: HttpConfig,
    /// Last.fm tagger settings
    pub lastfm: LastFmConfig,
    /// Lyrics extraction settings
    pub extract: ExtractConfig,
    /// Track list crawler settings
    pub crawl: CrawlConfig,
    /// Genre taxonomy file (JSON list of `{genre, subgenres}`)
    pub genres_file: PathBuf,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            job: JobConfig::default(),
            retry: RetryConfig::default(),
            http: HttpConfig::default(),
            lastfm: LastFmConfig::default(),
            extract: ExtractConfig::default(),
            crawl: CrawlConfig::default(),
            genres_file: PathBuf::from("./genres.json"),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Worker pool configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct JobConfig {
    /// Number of workers the input is partitioned across
    pub workers: usize,
    /// How workers are isolated from each other
    pub isolation: Isolation,
    /// Re-sort the merged output by track id instead of worker order
    pub sort_by_track_id: bool,
    /// Whole-job deadline; remaining tracks are abandoned when it elapses
    pub deadline_secs: Option<u64>,
    /// Executable re-entered for process isolation (default: current executable)
    pub worker_program: Option<PathBuf>,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            isolation: Isolation::Thread,
            sort_by_track_id: false,
            deadline_secs: None,
            worker_program: None,
        }
    }
}

impl JobConfig {
    /// Job deadline as a duration
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }
}

/// Exponential backoff configuration
///
/// Delays start at one unit and double after each retryable failure. Retrying
/// continues while the cumulative delay stays below `ceiling_units`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Length of one backoff unit in milliseconds
    pub unit_ms: u64,
    /// Upper bound on cumulative backoff, in units
    pub ceiling_units: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            unit_ms: 1000,
            ceiling_units: 500,
        }
    }
}

impl RetryConfig {
    /// One backoff unit
    pub fn unit(&self) -> Duration {
        Duration::from_millis(self.unit_ms)
    }

    /// Same unit, with the ceiling given as a total wait
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        let unit_ms = self.unit().as_millis().max(1);
        let units = (max_delay.as_millis() / unit_ms).max(1);
        self.ceiling_units = u64::try_from(units).unwrap_or(u64::MAX);
        self
    }
}

/// Outbound HTTP configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// User agent sent with every request
    pub user_agent: String,
    /// HTTP statuses classified as retryable
    pub temporary_statuses: Vec<u16>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            temporary_statuses: DEFAULT_TEMPORARY_STATUSES.to_vec(),
        }
    }
}

impl HttpConfig {
    /// Per-request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Last.fm tagger configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LastFmConfig {
    /// API key (also settable via `LYRICSIFT_LASTFM_API_KEY`)
    pub api_key: Option<String>,
    /// API endpoint
    pub base_url: String,
    /// Which lookups are made per track
    pub strategy: TagStrategy,
}

impl Default for LastFmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: LASTFM_BASE_URL.to_string(),
            strategy: TagStrategy::Artist,
        }
    }
}

/// Lyrics extraction configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Enabled sites, in the order handlers are tried
    pub sites: Vec<String>,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            sites: DEFAULT_SITES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Worker isolation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Isolation {
    /// One OS thread per worker inside the orchestrating process
    Thread,
    /// One child process per worker
    Process,
}

impl FromStr for Isolation {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "thread" => Ok(Isolation::Thread),
            "process" => Ok(Isolation::Process),
            other => Err(format!("unknown isolation '{}' (expected thread or process)", other)),
        }
    }
}

impl fmt::Display for Isolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Isolation::Thread => write!(f, "thread"),
            Isolation::Process => write!(f, "process"),
        }
    }
}

/// Tagging lookups performed for each track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TagStrategy {
    /// Tag by artist only (cached per worker)
    Artist,
    /// Tag by artist and title
    Track,
    /// Tag by track, falling back to the artist
    TrackThenArtist,
}

impl FromStr for TagStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "artist" => Ok(TagStrategy::Artist),
            "track" => Ok(TagStrategy::Track),
            "track-then-artist" => Ok(TagStrategy::TrackThenArtist),
            other => Err(format!(
                "unknown tag strategy '{}' (expected artist, track or track-then-artist)",
                other
            )),
        }
    }
}

impl fmt::Display for TagStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagStrategy::Artist => write!(f, "artist"),
            TagStrategy::Track => write!(f, "track"),
            TagStrategy::TrackThenArtist => write!(f, "track-then-artist"),
        }
    }
}

/// MetroLyrics crawler configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Site root; artist index pages live directly under it
    pub base_url: String,
    /// Highest page number followed per artist index and per artist
    pub max_depth: u32,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            base_url: METROLYRICS_BASE_URL.to_string(),
            max_depth: 100,
        }
    }
}

impl TomlConfig {
    /// Reject values no job can run with
    pub fn validate(&self) -> Result<()> {
        if self.job.workers == 0 {
            return Err(Error::Config("job.workers must be at least 1".to_string()));
        }
        if self.retry.unit_ms == 0 {
            return Err(Error::Config("retry.unit_ms must be at least 1".to_string()));
        }
        if let Some(status) = self
            .http
            .temporary_statuses
            .iter()
            .find(|s| !(100..=599).contains(*s))
        {
            return Err(Error::Config(format!(
                "http.temporary_statuses contains invalid status {}",
                status
            )));
        }
        if self.http.user_agent.trim().is_empty() {
            return Err(Error::Config("http.user_agent must not be empty".to_string()));
        }
        if self.crawl.max_depth == 0 {
            return Err(Error::Config("crawl.max_depth must be at least 1".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Locates and loads the configuration file
pub struct ConfigResolver {
    cli_path: Option<PathBuf>,
}

impl ConfigResolver {
    pub fn new(cli_path: Option<PathBuf>) -> Self {
        Self { cli_path }
    }

    /// Resolve the config file path, if any
    ///
    /// An explicit `--config` path that does not exist is an error. Paths from
    /// the environment or the user config directory are optional.
    pub fn resolve_path(&self) -> Result<Option<PathBuf>> {
        // Priority 1: Command-line argument
        if let Some(path) = &self.cli_path {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            return Ok(Some(path.clone()));
        }

        // Priority 2: Environment variable
        if let Ok(value) = std::env::var(CONFIG_ENV_VAR) {
            let path = PathBuf::from(value);
            if path.exists() {
                return Ok(Some(path));
            }
            warn!(
                "{} points to missing file {}, using defaults",
                CONFIG_ENV_VAR,
                path.display()
            );
            return Ok(None);
        }

        // Priority 3: User config directory
        Ok(default_config_path().filter(|p| p.exists()))
    }

    /// Load the configuration, falling back to defaults when no file is found
    pub fn load(&self) -> Result<TomlConfig> {
        match self.resolve_path()? {
            Some(path) => {
                let config = load_toml_config(&path)?;
                info!("Configuration loaded from {}", path.display());
                Ok(config)
            }
            None => {
                info!("No configuration file found, using built-in defaults");
                Ok(TomlConfig::default())
            }
        }
    }
}

/// Default per-user config file location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("lyricsift").join("config.toml"))
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed ({}): {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))
}

/// Resolve the Last.fm API key
///
/// **Priority:** command line → environment → TOML
pub fn resolve_lastfm_api_key(cli_key: Option<&str>, config: &TomlConfig) -> Result<String> {
    let env_key = std::env::var(API_KEY_ENV_VAR).ok();
    let toml_key = config.lastfm.api_key.as_deref();

    let candidates = [
        ("command line", cli_key),
        ("environment", env_key.as_deref()),
        ("TOML", toml_key),
    ];

    let sources: Vec<&str> = candidates
        .iter()
        .filter(|(_, key)| key.map(is_valid_key).unwrap_or(false))
        .map(|(source, _)| *source)
        .collect();

    if sources.len() > 1 {
        warn!(
            "Last.fm API key found in multiple sources: {}. Using {} (highest priority).",
            sources.join(", "),
            sources[0]
        );
    }

    for (source, key) in candidates {
        if let Some(key) = key.filter(|k| is_valid_key(k)) {
            info!("Last.fm API key loaded from {}", source);
            return Ok(key.trim().to_string());
        }
    }

    Err(Error::Config(format!(
        "Last.fm API key not configured. Please configure using one of:\n\
         1. Command line: --api-key your-key\n\
         2. Environment: {}=your-key\n\
         3. TOML config: [lastfm] api_key = \"your-key\"",
        API_KEY_ENV_VAR
    )))
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TomlConfig::default();
        assert_eq!(config.job.workers, 1);
        assert_eq!(config.job.isolation, Isolation::Thread);
        assert_eq!(config.retry.unit(), Duration::from_secs(1));
        assert_eq!(config.retry.ceiling_units, 500);
        assert_eq!(config.http.temporary_statuses, vec![408, 500, 503, 504]);
        assert_eq!(config.extract.sites.len(), 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: TomlConfig = toml::from_str(
            r#"
            [job]
            workers = 4
            isolation = "process"

            [lastfm]
            strategy = "track-then-artist"
            "#,
        )
        .unwrap();

        assert_eq!(config.job.workers, 4);
        assert_eq!(config.job.isolation, Isolation::Process);
        assert_eq!(config.lastfm.strategy, TagStrategy::TrackThenArtist);
        assert_eq!(config.lastfm.base_url, LASTFM_BASE_URL);
        assert_eq!(config.retry, RetryConfig::default());
        assert_eq!(config.genres_file, PathBuf::from("./genres.json"));
    }

    #[test]
    fn test_max_delay_in_units() {
        let retry = RetryConfig::default().with_max_delay(Duration::from_secs(300));
        assert_eq!(retry.ceiling_units, 300);

        let fast = RetryConfig {
            unit_ms: 5,
            ceiling_units: 1,
        }
        .with_max_delay(Duration::from_millis(42));
        assert_eq!(fast.ceiling_units, 8);

        let tiny = RetryConfig::default().with_max_delay(Duration::from_millis(10));
        assert_eq!(tiny.ceiling_units, 1);
    }

    #[test]
    fn test_crawl_section() {
        let config: TomlConfig = toml::from_str("[crawl]\nmax_depth = 3\n").unwrap();
        assert_eq!(config.crawl.max_depth, 3);
        assert_eq!(config.crawl.base_url, METROLYRICS_BASE_URL);

        let mut zero = TomlConfig::default();
        zero.crawl.max_depth = 0;
        assert!(zero.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let mut config = TomlConfig::default();
        config.job.workers = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_bad_status() {
        let mut config = TomlConfig::default();
        config.http.temporary_statuses.push(42);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_enum_parsing() {
        assert_eq!("Thread".parse::<Isolation>(), Ok(Isolation::Thread));
        assert_eq!(" process ".parse::<Isolation>(), Ok(Isolation::Process));
        assert!("fork".parse::<Isolation>().is_err());
        assert_eq!("track".parse::<TagStrategy>(), Ok(TagStrategy::Track));
        assert_eq!(TagStrategy::TrackThenArtist.to_string(), "track-then-artist");
    }

    #[test]
    fn test_is_valid_key() {
        assert!(is_valid_key("abc123"));
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("   "));
    }
}
