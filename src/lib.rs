//! # Kanko - Manga metadata resolution and chapter archival
//!
//! Kanko wraps a content source (anything able to list mangas, volumes,
//! chapters and page images) and turns its chapters into files on disk in one
//! of several formats, together with the metadata sidecars library readers
//! understand.
//!
//! ## Features
//!
//! - **Pluggable Sources**: Implement the [`Source`] trait for any catalog
//! - **Metadata Providers**: Resolve bibliographic records through any
//!   [`MetadataProvider`](metadata::MetadataProvider), cached per provider
//! - **Closest-Title Matching**: Forgiving title search with trimming retries
//! - **Six Output Formats**: PDF, TAR, TAR.GZ, ZIP, CBZ and plain images
//! - **Sidecars**: `ComicInfo.xml`, `series.json`, cover and banner images
//! - **All-or-Nothing Writes**: Downloads are staged in memory and merged
//!   only when every page and sidecar succeeded
//! - **Concurrent Fetching**: Pages download concurrently and fail fast
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kanko::prelude::*;
//! use kanko::fs::LocalFs;
//! use kanko::options::{DownloadOptionsBuilder, Format};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(source: Arc<dyn Source>) -> kanko::Result<()> {
//! let client = Client::new(source, Arc::new(LocalFs::new()), ClientOptions::default(), Logger::new())?;
//!
//! let manga = client.search_mangas("one piece").await?.remove(0);
//! let volume = client.manga_volumes(&manga).await?.remove(0);
//! let chapter = client.volume_chapters(&volume).await?.remove(0);
//!
//! let options = DownloadOptionsBuilder::default()
//!     .directory("./downloads")
//!     .format(Format::Cbz)
//!     .search_metadata(false)
//!     .strict(false)
//!     .build()
//!     .unwrap();
//!
//! let downloaded = client.download_chapter(&chapter, &options, &CancellationToken::new()).await?;
//! println!("Downloaded to: {}", downloaded.path().display());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! The library is organized into several key modules:
//!
//! - [`client`]: The [`Client`] orchestrating sources, providers and downloads
//! - [`source`]: Content source trait
//! - [`types`]: Mangas, volumes, chapters and pages
//! - [`metadata`]: Records, providers, the cache and sidecar documents
//! - [`download`]: The chapter pipeline, page fetcher and archive writers
//! - [`options`]: Client and download configuration
//! - [`fs`]: Filesystem abstraction with local and in-memory backends
//! - [`net`]: HTTP client with rate limiting and retries
//! - [`logger`]: Injected progress logger
//! - [`error`]: Comprehensive error handling

pub mod client;
pub mod download;
pub mod error;
pub mod fs;
pub mod logger;
pub mod metadata;
pub mod net;
pub mod options;
pub mod source;
pub mod types;

/// Prelude module for convenient imports.
///
/// ```rust
/// use kanko::prelude::*;
///
/// // Now you have access to:
/// // - Client, ClientOptions, DownloadOptions, Format
/// // - Source, SourceInfo
/// // - Manga, Volume, Chapter, Page
/// // - Metadata, MetadataProvider, CachedProvider
/// ```
pub mod prelude {
    pub use crate::{
        client::Client,
        download::{DownloadStatus, DownloadedChapter},
        error::{Error, Result},
        logger::Logger,
        metadata::{CachedProvider, Metadata, MetadataProvider, ProviderInfo},
        options::{ClientOptions, DownloadOptions, DownloadOptionsBuilder, Format},
        source::{Source, SourceInfo},
        types::{Chapter, Manga, Page, PageWithImage, Volume},
    };
}

// Re-export main types at crate root for direct access
pub use client::Client;
pub use download::{DownloadStatus, DownloadedChapter, extract_extension, sanitize_filename};
pub use error::{Error, Result};
pub use logger::Logger;
pub use source::{Source, SourceInfo};
pub use types::{Chapter, Manga, Page, PageWithImage, Volume};
