//! Test Helper Utilities
//!
//! Shared utilities for testing lyricsift-harvest

#![allow(dead_code)]

pub mod fixtures;
pub mod transport;

pub use fixtures::{
    azlyrics_url, extract_settings, lyrics_page, read_rows, tag_settings, write_input,
};
pub use transport::{ScriptedTransport, SlowTransport};
