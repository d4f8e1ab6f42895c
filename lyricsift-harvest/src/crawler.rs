//! MetroLyrics catalogue crawler
//!
//! **Walk:**
//! 1. Artist index pages `{base}/artists-{index}-{page}.html` for index `1`
//!    then `a` to `z`
//! 2. For each artist row, the song pages `{artist}-alpage-{page}.html`
//! 3. For each song row, one `trackid, url, artist, title` line
//!
//! Pages are numbered from 1. A listing ends at the first page that fails,
//! redirects elsewhere or lies past `max_depth`. A page without the expected
//! table is skipped and the next page is tried. The output is ready to use
//! as extraction input.

use crate::error::Result;
use crate::gate::{ConnectionGate, FetchRequest};
use crate::retry::{retry_with_backoff, RetryOutcome};
use crate::track::Track;
use crate::tsv::TrackListSink;
use lyricsift_common::config::{CrawlConfig, RetryConfig};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

static ARTISTS_TABLE: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("table.songs-table").expect("static 'table.songs-table' selector is valid")
});
static SONGS_TABLE: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("table.songs-table.compact")
        .expect("static 'table.songs-table.compact' selector is valid")
});
static TABLE_ROW: Lazy<Selector> =
    Lazy::new(|| Selector::parse("tbody tr").expect("static 'tbody tr' selector is valid"));
static CELL: Lazy<Selector> =
    Lazy::new(|| Selector::parse("td").expect("static 'td' selector is valid"));
static LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("static 'a[href]' selector is valid"));

/// Artist indexes in crawl order; `1` holds every artist not starting with a letter
pub fn artist_indexes() -> impl Iterator<Item = String> {
    std::iter::once("1".to_string()).chain(('a'..='z').map(String::from))
}

const LINK_SUFFIX: &str = " Lyrics";
const ARTIST_LINK_END: &str = "-lyrics.html";

/// Counters for one crawl
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlReport {
    pub index_pages: usize,
    pub artists: usize,
    pub song_pages: usize,
    /// Rows written
    pub tracks: usize,
    /// Pages fetched without the expected table
    pub skipped_pages: usize,
    /// Listings cut short by `max_depth`
    pub depth_limited: usize,
    pub cancelled: bool,
}

/// One artist row of an index page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtistLink {
    pub name: String,
    /// Artist page URL
    pub url: String,
}

impl ArtistLink {
    /// Song page `page` of this artist, if the link has the usual shape
    pub fn songs_page(&self, page: u32) -> Option<String> {
        self.url
            .strip_suffix(ARTIST_LINK_END)
            .map(|stem| format!("{}-alpage-{}.html", stem, page))
    }
}

/// One song row of an artist's song page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongLink {
    pub title: String,
    pub url: String,
}

/// Artist rows of an index page; None when the page has no artists table
pub fn parse_artists_page(html: &str, base_url: &str) -> Option<Vec<ArtistLink>> {
    let document = Html::parse_document(html);
    let table = document.select(&ARTISTS_TABLE).next()?;
    let artists = table
        .select(&TABLE_ROW)
        .filter_map(|row| {
            let link = row.select(&CELL).next()?.select(&LINK).next()?;
            Some(ArtistLink {
                name: link_text(link),
                url: absolute(base_url, link.value().attr("href")?),
            })
        })
        .collect();
    Some(artists)
}

/// Song rows of a song page; None when the page has no songs table
///
/// The song link sits in the first cell without a class attribute.
pub fn parse_songs_page(html: &str, base_url: &str) -> Option<Vec<SongLink>> {
    let document = Html::parse_document(html);
    let table = document.select(&SONGS_TABLE).next()?;
    let songs = table
        .select(&TABLE_ROW)
        .filter_map(|row| {
            let cell = row
                .select(&CELL)
                .find(|td| td.value().attr("class").is_none())?;
            let link = cell.select(&LINK).next()?;
            Some(SongLink {
                title: link_text(link),
                url: absolute(base_url, link.value().attr("href")?),
            })
        })
        .collect();
    Some(songs)
}

/// Link text without the trailing " Lyrics"
fn link_text(link: ElementRef<'_>) -> String {
    let text: String = link.text().collect();
    let text = text.trim();
    text.strip_suffix(LINK_SUFFIX).unwrap_or(text).trim().to_string()
}

fn absolute(base_url: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else {
        format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            href.trim_start_matches('/')
        )
    }
}

/// Crawls the MetroLyrics catalogue into a track list
pub struct MetroLyricsCrawler {
    gate: ConnectionGate,
    retry: RetryConfig,
    base_url: String,
    max_depth: u32,
    cancel: CancellationToken,
    next_id: u64,
}

impl MetroLyricsCrawler {
    pub fn new(gate: ConnectionGate, config: &CrawlConfig, retry: RetryConfig) -> Self {
        Self {
            gate,
            retry,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_depth: config.max_depth,
            cancel: CancellationToken::new(),
            next_id: 0,
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Crawl every artist index into `output`, replacing it
    pub async fn crawl(&mut self, output: &Path) -> Result<CrawlReport> {
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut sink = TrackListSink::create(output)?;
        let mut report = CrawlReport::default();
        info!(
            base_url = %self.base_url,
            max_depth = self.max_depth,
            output = %output.display(),
            "Starting crawl"
        );

        for index in artist_indexes() {
            if self.cancel.is_cancelled() {
                break;
            }
            info!(index = %index, "Crawling artist index");
            self.crawl_index(&index, &mut sink, &mut report).await?;
        }

        report.cancelled = self.cancel.is_cancelled();
        report.tracks = sink.finish()?;
        info!(
            index_pages = report.index_pages,
            artists = report.artists,
            song_pages = report.song_pages,
            tracks = report.tracks,
            skipped_pages = report.skipped_pages,
            cancelled = report.cancelled,
            "Crawl complete"
        );
        Ok(report)
    }

    async fn crawl_index(
        &mut self,
        index: &str,
        sink: &mut TrackListSink,
        report: &mut CrawlReport,
    ) -> Result<()> {
        for page in 1..=self.max_depth {
            let url = format!("{}/artists-{}-{}.html", self.base_url, index, page);
            let Some(html) = self.fetch_page(&url).await else {
                info!(index = %index, pages = page - 1, "No more artist pages");
                return Ok(());
            };
            report.index_pages += 1;

            let Some(artists) = parse_artists_page(&html, &self.base_url) else {
                warn!(url = %url, "No artists table - skipping page");
                report.skipped_pages += 1;
                continue;
            };
            for artist in artists {
                if self.cancel.is_cancelled() {
                    return Ok(());
                }
                report.artists += 1;
                self.crawl_artist(&artist, sink, report).await?;
            }
        }
        warn!(index = %index, max_depth = self.max_depth, "Reached max depth - moving on");
        report.depth_limited += 1;
        Ok(())
    }

    async fn crawl_artist(
        &mut self,
        artist: &ArtistLink,
        sink: &mut TrackListSink,
        report: &mut CrawlReport,
    ) -> Result<()> {
        for page in 1..=self.max_depth {
            let Some(url) = artist.songs_page(page) else {
                warn!(artist = %artist.name, url = %artist.url, "Unexpected artist link - skipping");
                return Ok(());
            };
            let Some(html) = self.fetch_page(&url).await else {
                debug!(artist = %artist.name, pages = page - 1, "No more song pages");
                return Ok(());
            };
            report.song_pages += 1;

            let Some(songs) = parse_songs_page(&html, &self.base_url) else {
                warn!(url = %url, "No songs table - skipping page");
                report.skipped_pages += 1;
                continue;
            };
            let tracks: Vec<Track> = songs
                .into_iter()
                .map(|song| {
                    self.next_id += 1;
                    Track {
                        track_id: self.next_id.to_string(),
                        url: Some(song.url),
                        artist: artist.name.clone(),
                        title: song.title,
                    }
                })
                .collect();
            sink.write_tracks(&tracks)?;
            info!(artist = %artist.name, page, tracks = tracks.len(), "Song page crawled");
        }
        warn!(artist = %artist.name, max_depth = self.max_depth, "Reached max depth - moving on");
        report.depth_limited += 1;
        Ok(())
    }

    /// Body of `url`, or None when the listing ends there
    async fn fetch_page(&self, url: &str) -> Option<String> {
        let request = FetchRequest::get(url);
        let retried = retry_with_backoff(&self.retry, &self.cancel, "crawl", || {
            self.gate.attempt_request(&request)
        })
        .await;

        match retried.outcome {
            RetryOutcome::Done(response) if response.final_url == url => {
                Some(String::from_utf8_lossy(&response.body).into_owned())
            }
            RetryOutcome::Done(response) => {
                debug!(url = %url, final_url = %response.final_url, "Redirected - end of listing");
                None
            }
            RetryOutcome::Fatal(failure) | RetryOutcome::Exhausted(failure) => {
                warn!(url = %url, "Cannot open page - skipping: {}", failure);
                None
            }
            RetryOutcome::Cancelled => None,
        }
    }
}
