//! Error types and result handling for Kanko operations.
//!
//! This module defines the error handling system used throughout Kanko.
//! All operations return a [`Result<T>`] which is a type alias for `std::result::Result<T, Error>`.
//!
//! # Error Categories
//!
//! Kanko errors fall into a few broad groups:
//!
//! - **Validation Errors**: Malformed provider info, metadata or options. Never retried.
//! - **Transient Errors**: Network failures and rate limiting, surfaced as-is
//! - **Metadata Errors**: Metadata could not be resolved or a sidecar could not be produced
//! - **Cache Errors**: The cache store failed, kept apart from provider errors
//! - **Archive Errors**: ZIP, PDF and image encoding failures
//! - **Cancellation**: The caller cancelled the download
//!
//! # Examples
//!
//! ```rust
//! use kanko::error::{Error, Result};
//!
//! fn describe(result: Result<()>) -> &'static str {
//!     match result {
//!         Ok(()) => "ok",
//!         Err(Error::Cache(_)) => "the cache is broken",
//!         Err(Error::Cancelled) => "cancelled",
//!         Err(_) => "something else",
//!     }
//! }
//!
//! assert_eq!(describe(Err(Error::cache("bucket unavailable"))), "the cache is broken");
//! ```

use thiserror::Error;

/// Type alias for Results with Kanko errors.
///
/// # Examples
///
/// ```rust
/// use kanko::{Result, Error};
///
/// fn example_operation() -> Result<String> {
///     Ok("Success".to_string())
/// }
///
/// fn example_with_error() -> Result<()> {
///     Err(Error::validation("version must be semver"))
/// }
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for all Kanko operations.
///
/// Each variant provides specific context about what went wrong. Cache
/// failures are always reported through [`Error::Cache`] so callers can tell
/// "the provider said no" apart from "the cache is broken".
#[derive(Error, Debug)]
pub enum Error {
    /// Network-related errors from HTTP operations.
    ///
    /// This variant wraps errors from the underlying HTTP client (reqwest),
    /// including connection timeouts, DNS resolution failures, invalid URLs and
    /// HTTP transport errors.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Data parsing and format errors.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Source-specific errors with contextual information.
    ///
    /// # Fields
    ///
    /// * `src` - The identifier of the source that encountered the error
    /// * `message` - Descriptive error message explaining what went wrong
    ///
    /// # Examples
    ///
    /// ```rust
    /// use kanko::Error;
    ///
    /// let error = Error::source("mangadex", "HTTP 503");
    /// assert_eq!(error.to_string(), "Source error [mangadex]: HTTP 503");
    /// ```
    #[error("Source error [{src}]: {message}")]
    Source { src: String, message: String },

    /// Resource not found errors.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limiting errors.
    ///
    /// Optionally includes the number of seconds to wait before retrying,
    /// as provided by the `Retry-After` header.
    #[error("Rate limited, retry after {retry_after:?} seconds")]
    RateLimit { retry_after: Option<u64> },

    /// Malformed input: provider info, metadata fields, options or arguments.
    ///
    /// Validation errors are always fatal and never retried.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Metadata resolution or sidecar generation failed.
    #[error("Metadata error: {0}")]
    Metadata(String),

    /// The cache store failed to read, write or decode an entry.
    #[error("Cache error: {0}")]
    Cache(String),

    /// Authentication with a metadata provider failed.
    #[error("Auth error: {0}")]
    Auth(String),

    /// The operation was cancelled by the caller.
    #[error("Operation cancelled")]
    Cancelled,

    /// File system and IO operation errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization and deserialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Image decoding or encoding errors.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// ZIP/CBZ archive errors.
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// PDF document errors.
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    /// Join errors.
    ///
    /// This variant wraps errors from tokio tasks.
    #[error("Join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// Several independent errors collected during a loop.
    #[error("{}", join_errors(.0))]
    Aggregate(Vec<Error>),

    /// Generic error messages.
    #[error("{0}")]
    Other(String),
}

fn join_errors(errors: &[Error]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

impl Error {
    /// Creates a parse error with the given message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Error::Parse(msg.into())
    }

    /// Creates a source-specific error with source ID and message.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use kanko::Error;
    ///
    /// let error = Error::source("download", "Failed to create directory");
    /// ```
    pub fn source(src: impl Into<String>, msg: impl Into<String>) -> Self {
        Error::Source {
            src: src.into(),
            message: msg.into(),
        }
    }

    /// Creates a not found error with the given message.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }

    /// Creates a rate limit error with optional retry-after time.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use kanko::Error;
    ///
    /// let error = Error::rate_limit(Some(60));
    /// let error = Error::rate_limit(None);
    /// ```
    pub fn rate_limit(retry_after: Option<u64>) -> Self {
        Error::RateLimit { retry_after }
    }

    /// Creates a validation error with the given message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    /// Creates a metadata error with the given message.
    pub fn metadata(msg: impl Into<String>) -> Self {
        Error::Metadata(msg.into())
    }

    /// Creates a cache error with the given message.
    pub fn cache(msg: impl Into<String>) -> Self {
        Error::Cache(msg.into())
    }

    /// Creates an authentication error with the given message.
    pub fn auth(msg: impl Into<String>) -> Self {
        Error::Auth(msg.into())
    }

    /// Returns `true` if this error originated from the cache store.
    pub fn is_cache(&self) -> bool {
        matches!(self, Error::Cache(_))
    }
}
