//! Error types for langfilter operations.
//!
//! This module defines the main error type [`FilterError`] which represents
//! everything that can go wrong while loading pages and settings, parsing
//! HTML, or running a filtering session.
//!
//! Classification and extraction never surface errors to the host page:
//! an extraction miss skips the item and a recognizer failure is reported
//! through the classifier observer. The variants below cover the edges of
//! the system (I/O, settings, selectors, the session channel).
//!
//! # Example
//!
//! ```rust
//! use langfilter_core::{FilterError, Result};
//!
//! fn load_page(html: &str) -> Result<String> {
//!     if html.is_empty() {
//!         return Err(FilterError::HtmlParseError("empty document".to_string()));
//!     }
//!     Ok(html.to_string())
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for feed filtering operations.
#[derive(Error, Debug)]
pub enum FilterError {
    /// HTTP request errors from reqwest.
    #[cfg(feature = "fetch")]
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Request timeout.
    ///
    /// Returned when fetching a listing page exceeds the configured timeout.
    #[error("Request timed out after {timeout} seconds")]
    Timeout { timeout: u64 },

    /// Invalid URL provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// HTML parsing or rendering errors.
    #[error("Failed to parse HTML: {0}")]
    HtmlParseError(String),

    /// A CSS selector in the scan tables could not be compiled.
    #[error("Invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    /// File not found.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// File read/write errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings could not be loaded or are invalid.
    ///
    /// A session that hits this at startup runs disabled rather than
    /// falling back to guessed defaults.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Settings (de)serialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A language recognizer failed on a piece of text.
    #[error("Recognizer for '{language}' failed: {reason}")]
    RecognizerError { language: String, reason: String },

    /// The session event loop has shut down.
    #[error("Filtering session is closed")]
    SessionClosed,
}

/// Result type alias for FilterError.
pub type Result<T> = std::result::Result<T, FilterError>;
