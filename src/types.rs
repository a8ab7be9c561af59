//! Domain objects supplied by content sources.
//!
//! This module defines the structures a [`Source`](crate::Source) hands to the
//! client:
//!
//! - [`Manga`] - A series with its optional bibliographic record
//! - [`Volume`] - A volume of a manga, owning one or more chapters
//! - [`Chapter`] - A single chapter, the unit of download
//! - [`Page`] / [`PageWithImage`] - Page descriptors and their downloaded bytes
//!
//! Volumes point back to their manga and chapters to their volume through an
//! [`Arc`], so a chapter alone is enough to lay out the download directory.
//!
//! # Examples
//!
//! ```rust
//! use kanko::types::{Chapter, Manga, Volume};
//! use std::sync::Arc;
//!
//! let manga = Arc::new(Manga::new("one-piece", "One Piece").with_url("https://example.com/one-piece"));
//! let volume = Arc::new(Volume::new(1.0, manga));
//! let chapter = Chapter::new("Romance Dawn", 1.0, volume);
//!
//! assert_eq!(chapter.manga().title, "One Piece");
//! ```

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::metadata::{ComicInfo, Date, Metadata, SeriesJson};

/// A manga series as reported by a content source.
///
/// # Fields
///
/// * `id` - Unique identifier within the source
/// * `title` - Title used for directory names
/// * `search_title` - Title used for metadata searches when non-empty
/// * `url` - Web page of the manga, also sent as `Referer` for cover downloads
/// * `cover` / `banner` - Image URLs; preferred over the metadata ones
/// * `metadata` - Record known by the source, replaced by metadata searches
/// * `series_json` - Ready `series.json` replacing the synthesized one
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manga {
    pub id: String,

    pub title: String,

    /// Metadata providers may only know the English, native or romanized
    /// title, while `title` can be in any language.
    #[serde(default)]
    pub search_title: String,

    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub cover: String,

    #[serde(default)]
    pub banner: String,

    #[serde(default)]
    pub metadata: Option<Metadata>,

    #[serde(default)]
    pub series_json: Option<SeriesJson>,
}

impl Manga {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_search_title(mut self, title: impl Into<String>) -> Self {
        self.search_title = title.into();
        self
    }

    pub fn with_cover(mut self, cover: impl Into<String>) -> Self {
        self.cover = cover.into();
        self
    }

    pub fn with_banner(mut self, banner: impl Into<String>) -> Self {
        self.banner = banner.into();
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_series_json(mut self, series_json: SeriesJson) -> Self {
        self.series_json = Some(series_json);
        self
    }

    /// Title to search metadata providers with.
    pub fn metadata_search_title(&self) -> &str {
        if self.search_title.is_empty() {
            &self.title
        } else {
            &self.search_title
        }
    }
}

impl fmt::Display for Manga {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title)
    }
}

/// A volume of a manga.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Volume {
    pub number: f32,
    pub manga: Arc<Manga>,
}

impl Volume {
    pub fn new(number: f32, manga: Arc<Manga>) -> Self {
        Self { number, manga }
    }
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Vol. {}", self.number)
    }
}

/// A single chapter, the unit of download.
///
/// The chapter number is a float to support extra chapters such as `10.5`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub title: String,

    #[serde(default)]
    pub url: String,

    pub number: f32,

    /// Publication date, zero when unknown.
    #[serde(default)]
    pub date: Date,

    #[serde(default)]
    pub scanlation_group: String,

    pub volume: Arc<Volume>,

    /// Ready `ComicInfo.xml` replacing the synthesized one.
    #[serde(default)]
    pub comic_info: Option<ComicInfo>,
}

impl Chapter {
    pub fn new(title: impl Into<String>, number: f32, volume: Arc<Volume>) -> Self {
        Self {
            title: title.into(),
            url: String::new(),
            number,
            date: Date::default(),
            scanlation_group: String::new(),
            volume,
            comic_info: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_date(mut self, date: Date) -> Self {
        self.date = date;
        self
    }

    pub fn with_scanlation_group(mut self, group: impl Into<String>) -> Self {
        self.scanlation_group = group.into();
        self
    }

    pub fn with_comic_info(mut self, comic_info: ComicInfo) -> Self {
        self.comic_info = Some(comic_info);
        self
    }

    /// The manga this chapter belongs to.
    pub fn manga(&self) -> &Manga {
        &self.volume.manga
    }
}

impl fmt::Display for Chapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.title, self.number)
    }
}

/// A page descriptor.
///
/// Sources that already hold the image bytes set `image`, in which case no
/// network request is made for the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub url: String,

    /// Image extension including the leading dot, e.g. `.png`.
    pub extension: String,

    /// Extra request headers, e.g. `Referer`.
    #[serde(default)]
    pub headers: HashMap<String, String>,

    #[serde(skip)]
    pub image: Option<Bytes>,
}

impl Page {
    pub fn new(url: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            extension: extension.into(),
            headers: HashMap::new(),
            image: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Pre-populates the image bytes.
    pub fn with_image(mut self, image: impl Into<Bytes>) -> Self {
        self.image = Some(image.into());
        self
    }
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

/// A page together with its downloaded image.
#[derive(Debug, Clone, PartialEq)]
pub struct PageWithImage {
    pub page: Page,
    pub image: Bytes,
}

impl PageWithImage {
    pub fn extension(&self) -> &str {
        &self.page.extension
    }
}
