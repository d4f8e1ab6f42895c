//! Integration tests for configuration resolution
//!
//! Tests that manipulate LYRICSIFT_CONFIG or LYRICSIFT_LASTFM_API_KEY are
//! marked with #[serial] so they never race on the process environment.

use lyricsift_common::config::{
    load_toml_config, resolve_lastfm_api_key, ConfigResolver, Isolation, TomlConfig,
    API_KEY_ENV_VAR, CONFIG_ENV_VAR,
};
use lyricsift_common::Error;
use serial_test::serial;
use std::env;
use std::fs;
use tempfile::TempDir;

fn write_config(dir: &TempDir, body: &str) -> std::path::PathBuf {
    let path = dir.path().join("config.toml");
    fs::write(&path, body).unwrap();
    path
}

#[test]
#[serial]
fn test_cli_path_takes_priority_over_env() {
    let dir = TempDir::new().unwrap();
    let cli_path = write_config(&dir, "[job]\nworkers = 3\n");

    let other = TempDir::new().unwrap();
    let env_path = write_config(&other, "[job]\nworkers = 7\n");
    env::set_var(CONFIG_ENV_VAR, &env_path);

    let config = ConfigResolver::new(Some(cli_path)).load().unwrap();
    assert_eq!(config.job.workers, 3);

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_env_path_used_without_cli() {
    let dir = TempDir::new().unwrap();
    let env_path = write_config(&dir, "[job]\nisolation = \"process\"\n");
    env::set_var(CONFIG_ENV_VAR, &env_path);

    let config = ConfigResolver::new(None).load().unwrap();
    assert_eq!(config.job.isolation, Isolation::Process);

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_missing_env_file_falls_back_to_defaults() {
    env::set_var(CONFIG_ENV_VAR, "/nonexistent/lyricsift/config.toml");

    let resolver = ConfigResolver::new(None);
    assert_eq!(resolver.resolve_path().unwrap(), None);
    assert_eq!(resolver.load().unwrap(), TomlConfig::default());

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
fn test_missing_cli_file_is_an_error() {
    let resolver = ConfigResolver::new(Some("/nonexistent/lyricsift.toml".into()));
    assert!(matches!(resolver.load(), Err(Error::Config(_))));
}

#[test]
fn test_malformed_toml_is_reported() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[job\nworkers = ");
    let err = load_toml_config(&path).unwrap_err();
    assert!(err.to_string().contains("Parse TOML failed"));
}

#[test]
#[serial]
fn test_api_key_priority() {
    env::set_var(API_KEY_ENV_VAR, "env-key");
    let mut config = TomlConfig::default();
    config.lastfm.api_key = Some("toml-key".to_string());

    assert_eq!(
        resolve_lastfm_api_key(Some("cli-key"), &config).unwrap(),
        "cli-key"
    );
    assert_eq!(resolve_lastfm_api_key(None, &config).unwrap(), "env-key");

    env::remove_var(API_KEY_ENV_VAR);
    assert_eq!(resolve_lastfm_api_key(None, &config).unwrap(), "toml-key");

    // Whitespace-only keys are ignored
    assert_eq!(
        resolve_lastfm_api_key(Some("   "), &config).unwrap(),
        "toml-key"
    );
}

#[test]
#[serial]
fn test_api_key_missing_everywhere() {
    env::remove_var(API_KEY_ENV_VAR);
    let config = TomlConfig::default();
    assert!(matches!(
        resolve_lastfm_api_key(None, &config),
        Err(Error::Config(_))
    ));
}
