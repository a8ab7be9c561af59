//! Bibliographic metadata for manga works.
//!
//! This module holds the value types describing a work's bibliographic record
//! and the machinery to resolve it from external metadata providers:
//!
//! - [`Metadata`] - The record itself, with title resolution and validation
//! - [`Id`] - A provider identity (raw value, [`IdSource`], code)
//! - [`provider`] - The [`MetadataProvider`] capability and its passport
//! - [`cache`] - The injected key-value [`CacheStore`] and its buckets
//! - [`cached`] - [`CachedProvider`], memoization and closest-title matching
//! - [`comicinfo`] / [`series`] - Sidecar documents derived from a record
//!
//! # Examples
//!
//! ```rust
//! use kanko::metadata::{Metadata, Status, Date, Id, IdSource};
//!
//! let meta = Metadata {
//!     romaji_title: "Berserk".to_string(),
//!     native_title: "ベルセルク".to_string(),
//!     authors: vec!["Kentarou Miura".to_string()],
//!     start_date: Date::new(1989, 8, 25),
//!     status: Some(Status::Hiatus),
//!     id: Id::new("30002", IdSource::Anilist, "al"),
//!     ..Default::default()
//! };
//!
//! assert_eq!(meta.title(), "Berserk");
//! assert!(meta.validate().is_ok());
//! ```

pub mod cache;
pub mod cached;
pub mod comicinfo;
pub mod provider;
pub mod series;

pub use cache::{CacheStore, MemoryStore};
pub use cached::CachedProvider;
pub use comicinfo::{ComicInfo, ComicInfoChapter, ComicInfoOptions};
pub use provider::{AuthData, CodeGrant, LoginOption, MetadataProvider, ProviderInfo, User};
pub use series::SeriesJson;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Filename of the per-chapter metadata sidecar embedded in CBZ archives.
pub const FILENAME_COMIC_INFO_XML: &str = "ComicInfo.xml";
/// Filename of the series summary sidecar.
pub const FILENAME_SERIES_JSON: &str = "series.json";
/// Filename of the downloaded cover image.
pub const FILENAME_COVER_JPG: &str = "cover.jpg";
/// Filename of the downloaded banner image.
pub const FILENAME_BANNER_JPG: &str = "banner.jpg";

/// Id code used by Anilist.
pub const ID_CODE_ANILIST: &str = "al";
/// Id code used by MyAnimeList.
pub const ID_CODE_MYANIMELIST: &str = "mal";

/// Publication status of a work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Finished,
    Releasing,
    NotYetReleased,
    Cancelled,
    Hiatus,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Finished => "FINISHED",
            Status::Releasing => "RELEASING",
            Status::NotYetReleased => "NOT_YET_RELEASED",
            Status::Cancelled => "CANCELLED",
            Status::Hiatus => "HIATUS",
        };
        f.write_str(s)
    }
}

/// Simple calendar date. A zero field means "unknown".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Date {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl Date {
    pub fn new(year: i32, month: u32, day: u32) -> Self {
        Self { year, month, day }
    }

    /// Returns `true` when no part of the date is known.
    pub fn is_zero(&self) -> bool {
        *self == Date::default()
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

/// Where a metadata id comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdSource {
    Anilist,
    MyAnimeList,
    /// The content source itself; its ids may be arbitrary strings.
    #[default]
    Provider,
}

impl fmt::Display for IdSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IdSource::Anilist => "anilist",
            IdSource::MyAnimeList => "myanimelist",
            IdSource::Provider => "provider",
        };
        f.write_str(s)
    }
}

/// Identity of a work on one provider.
///
/// Several ids may describe the same work across providers; a [`Metadata`]
/// record carries a primary [`id`](Metadata::id) plus
/// [`extra_ids`](Metadata::extra_ids).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Id {
    /// Raw value as reported by the provider.
    pub raw: String,
    pub source: IdSource,
    /// Short code such as `al` or `mal`.
    pub code: String,
}

impl Id {
    pub fn new(raw: impl Into<String>, source: IdSource, code: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            source,
            code: code.into(),
        }
    }

    /// Convenience constructor for an Anilist id.
    pub fn anilist(id: u64) -> Self {
        Self::new(id.to_string(), IdSource::Anilist, ID_CODE_ANILIST)
    }

    /// Convenience constructor for a MyAnimeList id.
    pub fn myanimelist(id: u64) -> Self {
        Self::new(id.to_string(), IdSource::MyAnimeList, ID_CODE_MYANIMELIST)
    }

    /// The raw value as a positive integer, if it is one.
    pub fn value(&self) -> Option<u64> {
        self.raw.trim().parse::<u64>().ok().filter(|v| *v > 0)
    }

    /// Checks the id invariants.
    ///
    /// The code must be non-empty and, unless the id comes from the content
    /// provider itself, the raw value must be a positive integer.
    pub fn validate(&self) -> Result<()> {
        if self.code.is_empty() {
            return Err(Error::validation("id code must be non-empty"));
        }
        if self.source != IdSource::Provider && self.value().is_none() {
            return Err(Error::validation(format!(
                "id {:?} from {} must be a positive integer",
                self.raw, self.source
            )));
        }
        Ok(())
    }
}

/// Bibliographic record of a manga.
///
/// Contains everything needed to build the `series.json` and `ComicInfo.xml`
/// sidecars. A record is only usable for sidecars when [`validate`](Self::validate)
/// passes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// English title.
    #[serde(default)]
    pub english_title: String,
    /// Romanized title.
    #[serde(default)]
    pub romaji_title: String,
    /// Native title, usually in kanji.
    #[serde(default)]
    pub native_title: String,
    /// Other known titles in order of relevance.
    #[serde(default)]
    pub synonyms: Vec<String>,
    /// Community score between 0.0 and 5.0.
    #[serde(default)]
    pub score: f32,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub cover_image: String,
    #[serde(default)]
    pub banner_image: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub characters: Vec<String>,
    /// Writers, in order of relevance. At least one is required.
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub artists: Vec<String>,
    #[serde(default)]
    pub translators: Vec<String>,
    #[serde(default)]
    pub letterers: Vec<String>,
    #[serde(default)]
    pub start_date: Date,
    #[serde(default)]
    pub end_date: Date,
    #[serde(default)]
    pub publisher: String,
    #[serde(default)]
    pub status: Option<Status>,
    /// Original publication format, e.g. `Web` or `Digital`.
    #[serde(default)]
    pub format: String,
    /// ISO 3166-1 alpha-2 country of origin.
    #[serde(default)]
    pub country: String,
    /// Chapter count up to this point.
    #[serde(default)]
    pub chapters: u32,
    #[serde(default)]
    pub notes: String,
    /// Source URL of the record.
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub id: Id,
    #[serde(default)]
    pub extra_ids: Vec<Id>,
}

impl Metadata {
    /// Resolved title: English, then Romanized, then Native.
    pub fn title(&self) -> &str {
        [&self.english_title, &self.romaji_title, &self.native_title]
            .into_iter()
            .find(|t| !t.is_empty())
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// All titles other than [`title`](Self::title), in order of relevance.
    pub fn alternate_titles(&self) -> Vec<String> {
        let title = self.title();
        [&self.english_title, &self.romaji_title, &self.native_title]
            .into_iter()
            .chain(self.synonyms.iter())
            .filter(|t| !t.is_empty() && t.as_str() != title)
            .cloned()
            .collect()
    }

    /// The primary id followed by the extra ids.
    pub fn ids(&self) -> impl Iterator<Item = &Id> {
        std::iter::once(&self.id).chain(self.extra_ids.iter())
    }

    /// Checks the record invariants.
    ///
    /// Title, at least one author, start date and status must be present,
    /// and every id must be valid.
    pub fn validate(&self) -> Result<()> {
        if self.title().is_empty() {
            return Err(Error::validation("metadata title must be non-empty"));
        }
        if self.authors.iter().all(|a| a.is_empty()) {
            return Err(Error::validation("metadata must contain at least one author"));
        }
        if self.start_date.is_zero() {
            return Err(Error::validation("metadata start date must be non-zero"));
        }
        if self.status.is_none() {
            return Err(Error::validation("metadata status must be non-empty"));
        }
        self.id.validate()?;
        for id in &self.extra_ids {
            id.validate()?;
        }
        Ok(())
    }

    /// Returns `true` when [`validate`](Self::validate) passes.
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

impl fmt::Display for Metadata {
    /// `Title (Year) [code-id]`, omitting the year or id when unknown.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())?;
        if self.start_date.year != 0 {
            write!(f, " ({})", self.start_date.year)?;
        }
        if !self.id.code.is_empty() && !self.id.raw.is_empty() {
            write!(f, " [{}-{}]", self.id.code, self.id.raw)?;
        }
        Ok(())
    }
}

/// Validates optional metadata, treating a missing record as invalid.
pub fn validate(metadata: Option<&Metadata>) -> Result<()> {
    match metadata {
        Some(meta) => meta.validate(),
        None => Err(Error::validation("metadata is missing")),
    }
}
