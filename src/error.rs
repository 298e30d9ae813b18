//! Error types for rs-catchup.
//!
//! This module defines the error types returned by detection, extraction,
//! fetching and site-checking operations.

/// Error type for detection, extraction and checking operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The site has no selector and auto-detection found nothing.
    #[error("No selector configured for this site")]
    NeedsSelector,

    /// A login wall was detected in place of the content.
    #[error("Login required")]
    NeedsLogin,

    /// The selector matched zero elements.
    #[error("elements not found")]
    ElementsNotFound,

    /// HTTP error status returned by the watched page.
    #[error("HTTP {0}")]
    HttpStatus(u16),

    /// Network failure while fetching a page.
    #[error("Fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),

    /// The synced store cannot take the write.
    #[error("Storage quota exceeded ({percentage:.1}% of {quota} bytes in use)")]
    QuotaExceeded {
        /// Bytes currently stored.
        bytes_in_use: usize,
        /// Total quota in bytes.
        quota: usize,
        /// Usage that the write would reach, in percent.
        percentage: f64,
    },

    /// The selector string is not valid CSS.
    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    /// HTML or feed parsing failed.
    #[error("Parsing failed: {0}")]
    ParseError(String),

    /// The parse worker is gone or a job panicked.
    #[error("Parse worker failed: {0}")]
    WorkerError(String),

    /// The rendered-tab path failed.
    #[error("Render failed: {0}")]
    RenderError(String),

    /// Reading or writing the key-value store failed.
    #[error("Storage error: {0}")]
    StorageError(String),

    /// A stored value could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The URL is already registered.
    #[error("Site already registered: {0}")]
    DuplicateSite(String),

    /// No site or feed with that key.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Whether the next scheduled pass may succeed without user action.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::HttpStatus(_) | Self::Fetch(_) | Self::RenderError(_) | Self::WorkerError(_)
        )
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::StorageError(err.to_string())
    }
}

/// Result type alias for rs-catchup operations.
pub type Result<T> = std::result::Result<T, Error>;
