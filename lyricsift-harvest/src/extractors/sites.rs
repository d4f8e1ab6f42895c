//! Built-in lyrics sites
//!
//! Selectors follow the page layouts these sites used; if a layout changes
//! the handler returns None and the track is skipped as "no data".

use super::PageExtractor;
use lyricsift_common::normalize::transliterate;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::fmt;
use std::str::FromStr;

static METROLYRICS_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://(www\.)?metrolyrics\.com/[a-z0-9-]+-lyrics-[a-z0-9-]+\.html")
        .expect("static metrolyrics pattern is valid")
});
static LYRICSCOM_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://(www\.)?lyrics\.com/[a-z0-9-]+-lyrics-[a-z0-9-]+\.html")
        .expect("static lyrics.com pattern is valid")
});
static LYRICSMODE_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://(www\.)?lyricsmode\.com/lyrics/([a-z]|0-9)/[a-z0-9_]+/[a-z0-9_]+\.html")
        .expect("static lyricsmode pattern is valid")
});
static AZLYRICS_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://(www\.)?azlyrics\.com/lyrics/[a-z0-9]+/[a-z0-9]+\.html")
        .expect("static azlyrics pattern is valid")
});

static HYPHEN_SLUG_DROP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[^a-zA-Z0-9\s-]").expect("static hyphen slug filter is valid")
});
static UNDERSCORE_SLUG_DROP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[^a-zA-Z0-9\s_]").expect("static underscore slug filter is valid")
});
static UNDERSCORE_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\s_]+").expect("static underscore run pattern is valid"));
static WHITESPACE_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("static whitespace pattern is valid"));

static METROLYRICS_BODY: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("#lyrics-body-text").expect("static '#lyrics-body-text' selector is valid")
});
static PARAGRAPH: Lazy<Selector> =
    Lazy::new(|| Selector::parse("p").expect("static 'p' selector is valid"));
static LYRICSCOM_BODY: Lazy<Selector> =
    Lazy::new(|| Selector::parse("#lyrics").expect("static '#lyrics' selector is valid"));
static LYRICSMODE_BODY: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("#lyrics_text").expect("static '#lyrics_text' selector is valid")
});

/// Paragraph MetroLyrics injects between verses
const METROLYRICS_DISCUSSION_ID: &str = "mid-song-discussion";

/// Class of the AZLyrics heading that precedes the lyrics block
const AZLYRICS_HEADING_CLASS: &str = "lyricsh";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Site {
    MetroLyrics,
    LyricsCom,
    LyricsMode,
    AzLyrics,
}

impl Site {
    /// Default registration order
    pub const ALL: [Site; 4] = [Site::MetroLyrics, Site::LyricsCom, Site::LyricsMode, Site::AzLyrics];

    /// Config name
    pub fn key(&self) -> &'static str {
        match self {
            Site::MetroLyrics => "metrolyrics",
            Site::LyricsCom => "lyricscom",
            Site::LyricsMode => "lyricsmode",
            Site::AzLyrics => "azlyrics",
        }
    }

    /// Page this site would serve the lyrics of `title` by `artist` at
    pub fn lyrics_url(&self, artist: &str, title: &str) -> String {
        match self {
            Site::MetroLyrics => format!(
                "http://www.metrolyrics.com/{}-lyrics-{}.html",
                hyphen_slug(title),
                hyphen_slug(artist)
            ),
            Site::LyricsCom => format!(
                "http://www.lyrics.com/{}-lyrics-{}.html",
                hyphen_slug(title),
                hyphen_slug(artist)
            ),
            Site::LyricsMode => {
                let artist = underscore_slug(artist);
                let index = match artist.chars().next() {
                    Some(c) if c.is_ascii_lowercase() => c.to_string(),
                    _ => "0-9".to_string(),
                };
                format!(
                    "http://www.lyricsmode.com/lyrics/{}/{}/{}.html",
                    index,
                    artist,
                    underscore_slug(title)
                )
            }
            Site::AzLyrics => format!(
                "http://www.azlyrics.com/lyrics/{}/{}.html",
                compact_slug(artist),
                compact_slug(title)
            ),
        }
    }

    fn url_pattern(&self) -> &'static Regex {
        match self {
            Site::MetroLyrics => &METROLYRICS_URL,
            Site::LyricsCom => &LYRICSCOM_URL,
            Site::LyricsMode => &LYRICSMODE_URL,
            Site::AzLyrics => &AZLYRICS_URL,
        }
    }
}

impl FromStr for Site {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Site::ALL
            .into_iter()
            .find(|site| site.key() == wanted)
            .ok_or_else(|| {
                format!(
                    "unknown extraction site '{}' (expected one of: {})",
                    s,
                    Site::ALL.map(|site| site.key()).join(", ")
                )
            })
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl PageExtractor for Site {
    fn name(&self) -> &str {
        self.key()
    }

    fn matches(&self, url: &str) -> bool {
        self.url_pattern().is_match(url)
    }

    fn extract(&self, html: &str) -> Option<String> {
        let document = Html::parse_document(html);
        let text = match self {
            Site::MetroLyrics => metrolyrics(&document),
            Site::LyricsCom => first_text(&document, &LYRICSCOM_BODY),
            Site::LyricsMode => first_text(&document, &LYRICSMODE_BODY),
            Site::AzLyrics => azlyrics(&document),
        }?;
        Some(text).filter(|t| !t.trim().is_empty())
    }
}

/// `Can't Stop` -> `cant-stop`
fn hyphen_slug(text: &str) -> String {
    let transliterated = transliterate(text);
    let kept = HYPHEN_SLUG_DROP.replace_all(&transliterated, "");
    WHITESPACE_RUN
        .replace_all(kept.trim(), "-")
        .trim_matches('-')
        .to_lowercase()
}

/// `AC/DC` -> `ac_dc`; hyphens are dropped, dots and slashes separate
fn underscore_slug(text: &str) -> String {
    let separated = transliterate(text).replace(['.', '/'], "_");
    let kept = UNDERSCORE_SLUG_DROP.replace_all(&separated, "");
    UNDERSCORE_RUN
        .replace_all(&kept, "_")
        .trim_matches('_')
        .to_lowercase()
}

fn compact_slug(text: &str) -> String {
    transliterate(text)
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect::<String>()
        .to_lowercase()
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect()
}

fn first_text(document: &Html, selector: &Selector) -> Option<String> {
    document.select(selector).next().map(element_text)
}

fn metrolyrics(document: &Html) -> Option<String> {
    let body = document.select(&METROLYRICS_BODY).next()?;
    let verses: Vec<String> = body
        .select(&PARAGRAPH)
        .filter(|p| p.value().id() != Some(METROLYRICS_DISCUSSION_ID))
        .map(element_text)
        .collect();
    Some(verses.join(" "))
}

fn azlyrics(document: &Html) -> Option<String> {
    let mut elements = document
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap);

    elements.find(|e| e.value().classes().any(|c| c == AZLYRICS_HEADING_CLASS))?;
    elements
        .find(|e| e.value().name() == "div" && e.value().attr("class").is_none())
        .map(element_text)
}
