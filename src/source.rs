//! Content source contract.
//!
//! This module defines the [`Source`] trait every content provider implements
//! and the [`SourceInfo`] passport describing it. The client never inspects
//! how a source fetches its data; scrapers, HTTP APIs or scripted plugins all
//! look the same from here.
//!
//! # Examples
//!
//! ```rust
//! use kanko::prelude::*;
//! use kanko::error::Result;
//! use async_trait::async_trait;
//! use bytes::Bytes;
//! use std::sync::Arc;
//!
//! struct Shelf;
//!
//! #[async_trait]
//! impl Source for Shelf {
//!     fn info(&self) -> SourceInfo {
//!         SourceInfo::new("shelf", "Shelf", "0.1.0")
//!     }
//!
//!     async fn search_mangas(&self, query: &str) -> Result<Vec<Manga>> {
//!         Ok(vec![Manga::new(query, query)])
//!     }
//!
//!     async fn manga_volumes(&self, manga: &Manga) -> Result<Vec<Volume>> {
//!         Ok(vec![Volume::new(1.0, Arc::new(manga.clone()))])
//!     }
//!
//!     async fn volume_chapters(&self, volume: &Volume) -> Result<Vec<Chapter>> {
//!         Ok(vec![Chapter::new("Prologue", 1.0, Arc::new(volume.clone()))])
//!     }
//!
//!     async fn chapter_pages(&self, _chapter: &Chapter) -> Result<Vec<Page>> {
//!         Ok(vec![Page::new("https://example.com/1.png", ".png")])
//!     }
//!
//!     async fn get_page_image(&self, _page: &Page) -> Result<Bytes> {
//!         Ok(Bytes::from_static(b"\x89PNG"))
//!     }
//! }
//!
//! assert!(Shelf.info().validate().is_ok());
//! ```

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{
    error::{Error, Result},
    logger::Logger,
    metadata::provider::is_semver,
    types::{Chapter, Manga, Page, Volume},
};

/// Passport of a content source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    /// Unique identifier, lowercase and hyphen-separated.
    pub id: String,
    pub name: String,
    /// Semantic version without a `v` prefix.
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub website: String,
}

impl SourceInfo {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: version.into(),
            description: String::new(),
            website: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_website(mut self, website: impl Into<String>) -> Self {
        self.website = website.into();
        self
    }

    /// Id and name must be non-empty and the version a valid semver.
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(Error::validation("source id must be non-empty"));
        }
        if self.name.is_empty() {
            return Err(Error::validation("source name must be non-empty"));
        }
        if !is_semver(&self.version) {
            return Err(Error::validation(format!(
                "invalid source semver: {}",
                self.version
            )));
        }
        Ok(())
    }
}

impl fmt::Display for SourceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Trait that all content sources must implement.
///
/// # Required Methods
///
/// * [`info()`](Source::info) - Passport of the source
/// * [`search_mangas()`](Source::search_mangas) - Search the catalog
/// * [`manga_volumes()`](Source::manga_volumes) - Volumes of a manga
/// * [`volume_chapters()`](Source::volume_chapters) - Chapters of a volume
/// * [`chapter_pages()`](Source::chapter_pages) - Ordered pages of a chapter
/// * [`get_page_image()`](Source::get_page_image) - Image bytes of one page
///
/// # Implementation Guidelines
///
/// - Use the [`net::HttpClient`](crate::net::HttpClient) for HTTP requests
/// - Return pages in reading order; output archives keep that order
/// - Pre-populate [`Page::image`] when the bytes are already at hand
/// - Return detailed errors using the [`Error`](crate::Error) types
#[async_trait]
pub trait Source: Send + Sync {
    /// Returns the passport of this source.
    fn info(&self) -> SourceInfo;

    /// Sets the logger used for progress messages.
    ///
    /// Called once by the [`Client`](crate::Client) at construction.
    fn set_logger(&self, _logger: Logger) {}

    /// Searches the source catalog.
    ///
    /// # Errors
    ///
    /// * [`Error::Source`](crate::Error::Source) - For source-specific errors
    /// * [`Error::Network`](crate::Error::Network) - For network/connection issues
    async fn search_mangas(&self, query: &str) -> Result<Vec<Manga>>;

    /// Retrieves the volumes of a manga. At least one volume is expected.
    async fn manga_volumes(&self, manga: &Manga) -> Result<Vec<Volume>>;

    /// Retrieves the chapters of a volume.
    async fn volume_chapters(&self, volume: &Volume) -> Result<Vec<Chapter>>;

    /// Retrieves the ordered pages of a chapter.
    ///
    /// # Errors
    ///
    /// * [`Error::NotFound`](crate::Error::NotFound) - If the chapter doesn't exist
    async fn chapter_pages(&self, chapter: &Chapter) -> Result<Vec<Page>>;

    /// Downloads the image of a single page.
    async fn get_page_image(&self, page: &Page) -> Result<Bytes>;

    /// Releases the resources held by the source.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_info_validation() {
        assert!(SourceInfo::new("mangadex", "MangaDex", "1.2.0").validate().is_ok());
        assert!(SourceInfo::new("", "MangaDex", "1.2.0").validate().is_err());
        assert!(SourceInfo::new("mangadex", "MangaDex", "v1.2.0").validate().is_err());
    }
}
