//! Tracing initialisation
//!
//! `RUST_LOG` wins when set. Otherwise the level comes from the command line,
//! then from `[logging] level`. Logs go to stderr unless `[logging] file` is
//! configured, in which case they are appended to that file without ANSI
//! colouring.

use crate::config::LoggingConfig;
use crate::{Error, Result};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Noisy HTTP internals stay at warn unless RUST_LOG asks otherwise
const QUIET_TARGETS: &str = "hyper=warn,reqwest=warn,html5ever=warn,selectors=warn";

/// Install the global tracing subscriber
pub fn init_tracing(config: &LoggingConfig, cli_level: Option<&str>) -> Result<()> {
    let level = cli_level.unwrap_or(&config.level);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(level)));

    let registry = tracing_subscriber::registry().with(filter);

    let installed = match &config.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| {
                    Error::Config(format!("Cannot open log file {}: {}", path.display(), e))
                })?;
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
                .try_init()
        }
        None => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init(),
    };

    installed.map_err(|e| Error::Internal(format!("Tracing already initialised: {}", e)))
}

/// Filter directives for a base level
fn filter_directives(level: &str) -> String {
    format!("{},{}", level.trim().to_ascii_lowercase(), QUIET_TARGETS)
}
