//! # lyricsift Common Library
//!
//! Shared code for the lyricsift crates including:
//! - Error types
//! - Configuration loading and resolution
//! - Tracing setup
//! - Text normalization for extracted lyrics

pub mod config;
pub mod error;
pub mod logging;
pub mod normalize;

pub use error::{Error, Result};
