//! Input files, pages and settings for job tests

use lyricsift_common::config::{Isolation, RetryConfig, TagStrategy, TomlConfig};
use lyricsift_harvest::tagger::GenreTaxonomy;
use lyricsift_harvest::tsv::for_each_row;
use lyricsift_harvest::worker::TaggingSpec;
use lyricsift_harvest::{JobKind, JobSettings, ResultRow};
use std::path::{Path, PathBuf};

/// Write a TSV with the given header and rows
pub fn write_input(dir: &Path, header: &[&str], rows: &[Vec<String>]) -> PathBuf {
    let path = dir.join("input.tsv");
    let mut body = header.join("\t");
    body.push('\n');
    for row in rows {
        body.push_str(&row.join("\t"));
        body.push('\n');
    }
    std::fs::write(&path, body).unwrap();
    path
}

pub fn azlyrics_url(track_id: &str) -> String {
    format!("http://www.azlyrics.com/lyrics/artist/{}.html", track_id.replace('-', ""))
}

/// AZLyrics-style page carrying `text`
pub fn lyrics_page(text: &str) -> String {
    format!(
        "<html><body><div class=\"lyricsh\"><h2>Artist Lyrics</h2></div>\
         <div class=\"ringtone\">ad</div><div>\n{}\n</div></body></html>",
        text
    )
}

pub fn read_rows(path: &Path, kind: JobKind) -> Vec<ResultRow> {
    let mut rows = Vec::new();
    for_each_row(path, kind, |row| {
        rows.push(row);
        Ok(())
    })
    .unwrap();
    rows
}

fn fast_retry() -> RetryConfig {
    RetryConfig {
        unit_ms: 1,
        ceiling_units: 16,
    }
}

/// Thread-isolated extraction settings with millisecond backoff
pub fn extract_settings(output: PathBuf, workers: usize) -> JobSettings {
    let mut settings = JobSettings::from_config(JobKind::Extract, output, &TomlConfig::default());
    settings.workers = workers;
    settings.isolation = Isolation::Thread;
    settings.retry = fast_retry();
    settings
}

pub fn tag_settings(output: PathBuf, workers: usize, base_url: &str) -> JobSettings {
    let taxonomy = GenreTaxonomy::from_json_str(
        r#"[
            {"genre": "soul", "subgenres": ["rnb", "neo soul"]},
            {"genre": "pop", "subgenres": ["dance pop"]},
            {"genre": "rock", "subgenres": ["hard rock"]}
        ]"#,
    )
    .unwrap();

    let mut settings = JobSettings::from_config(JobKind::Tag, output, &TomlConfig::default())
        .with_tagging(TaggingSpec {
            api_key: "test-key".to_string(),
            base_url: base_url.to_string(),
            strategy: TagStrategy::Artist,
            taxonomy,
        });
    settings.workers = workers;
    settings.isolation = Isolation::Thread;
    settings.retry = fast_retry();
    settings.http.timeout_secs = 5;
    settings
}
