//! Client and download configuration.
//!
//! [`ClientOptions`] is fixed when a [`Client`](crate::Client) is built and
//! controls permissions, HTTP behavior and how directories and files are
//! named. [`DownloadOptions`] is passed to every
//! [`Client::download_chapter`](crate::Client::download_chapter) call.
//!
//! # Examples
//!
//! ```rust
//! use kanko::options::{DownloadOptionsBuilder, Format};
//!
//! let options = DownloadOptionsBuilder::default()
//!     .directory("/srv/manga")
//!     .format(Format::Cbz)
//!     .write_comic_info_xml(true)
//!     .build()
//!     .unwrap();
//!
//! assert!(options.strict);
//! assert_eq!(options.format.extension(), ".cbz");
//! ```

use bytes::Bytes;
use derive_builder::Builder;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use crate::{
    download::sanitize_filename,
    error::{Error, Result},
    metadata::ComicInfoOptions,
    net::DEFAULT_USER_AGENT,
    source::SourceInfo,
    types::{Chapter, Manga, Volume},
};

/// Output format of a downloaded chapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Format {
    /// Image-only PDF document.
    #[default]
    Pdf,
    Tar,
    /// Gzip-compressed TAR.
    TarGz,
    Zip,
    /// ZIP with an optional `ComicInfo.xml` entry.
    Cbz,
    /// Plain directory of images.
    Images,
}

impl Format {
    pub const ALL: [Format; 6] = [
        Format::Pdf,
        Format::Tar,
        Format::TarGz,
        Format::Zip,
        Format::Cbz,
        Format::Images,
    ];

    /// File extension including the leading dot, empty for [`Format::Images`].
    pub fn extension(&self) -> &'static str {
        match self {
            Format::Pdf => ".pdf",
            Format::Tar => ".tar",
            Format::TarGz => ".tar.gz",
            Format::Zip => ".zip",
            Format::Cbz => ".cbz",
            Format::Images => "",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Format::Pdf => "pdf",
            Format::Tar => "tar",
            Format::TarGz => "tar.gz",
            Format::Zip => "zip",
            Format::Cbz => "cbz",
            Format::Images => "images",
        };
        f.write_str(name)
    }
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Format::ALL
            .into_iter()
            .find(|format| format.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::validation(format!("unknown format: {s}")))
    }
}

type TransformFn = dyn Fn(Bytes) -> Result<Bytes> + Send + Sync;

/// Function applied to every page image before it is archived.
#[derive(Clone)]
pub struct ImageTransformer(Arc<TransformFn>);

impl ImageTransformer {
    pub fn new(transform: impl Fn(Bytes) -> Result<Bytes> + Send + Sync + 'static) -> Self {
        Self(Arc::new(transform))
    }

    pub fn apply(&self, image: Bytes) -> Result<Bytes> {
        (self.0)(image)
    }
}

impl Default for ImageTransformer {
    fn default() -> Self {
        Self::new(Ok)
    }
}

impl fmt::Debug for ImageTransformer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ImageTransformer")
    }
}

/// Options for a single chapter download.
///
/// Build it with [`DownloadOptionsBuilder`]; every field has a default.
#[derive(Debug, Clone, Builder)]
#[builder(default, setter(into))]
pub struct DownloadOptions {
    /// Root directory of the library.
    pub directory: PathBuf,

    pub format: Format,

    /// Nest everything under a directory named after the content source.
    pub create_provider_dir: bool,

    /// Nest chapters under a directory named after the manga. Manga level
    /// files (`series.json`, covers) go into it as well.
    pub create_manga_dir: bool,

    /// Nest chapters under a directory named after the volume.
    pub create_volume_dir: bool,

    /// Abort the download when metadata is missing or a sidecar fails.
    pub strict: bool,

    /// Leave an already downloaded chapter untouched.
    pub skip_if_exists: bool,

    /// Replace the manga metadata with a fresh search before downloading.
    pub search_metadata: bool,

    pub download_manga_cover: bool,

    pub download_manga_banner: bool,

    pub write_series_json: bool,

    /// Don't write `series.json` while the series is still releasing.
    pub skip_series_json_if_ongoing: bool,

    /// Embed `ComicInfo.xml` into CBZ archives.
    pub write_comic_info_xml: bool,

    pub comic_info_options: ComicInfoOptions,

    pub image_transformer: ImageTransformer,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            format: Format::Pdf,
            create_provider_dir: false,
            create_manga_dir: true,
            create_volume_dir: false,
            strict: true,
            skip_if_exists: true,
            search_metadata: true,
            download_manga_cover: false,
            download_manga_banner: false,
            write_series_json: false,
            skip_series_json_if_ongoing: false,
            write_comic_info_xml: false,
            comic_info_options: ComicInfoOptions::default(),
            image_transformer: ImageTransformer::default(),
        }
    }
}

type ProviderTemplate = dyn Fn(&SourceInfo) -> String + Send + Sync;
type MangaTemplate = dyn Fn(&str, &Manga) -> String + Send + Sync;
type VolumeTemplate = dyn Fn(&str, &Volume) -> String + Send + Sync;
type ChapterTemplate = dyn Fn(&str, &Chapter) -> String + Send + Sync;

/// Runtime options of a [`Client`](crate::Client).
///
/// Name templates receive the source name as their first argument.
///
/// # Examples
///
/// ```rust
/// use kanko::options::ClientOptions;
///
/// let options = ClientOptions::default()
///     .with_modes(0o750, 0o640)
///     .with_chapter_template(|_, chapter| format!("Ch. {}", chapter.number));
/// ```
#[derive(Clone)]
pub struct ClientOptions {
    pub mode_dir: u32,
    pub mode_file: u32,
    pub user_agent: String,
    /// Minimum delay between cover and banner requests.
    pub http_delay_ms: u64,
    pub http_max_retries: u32,
    provider_template: Arc<ProviderTemplate>,
    manga_template: Arc<MangaTemplate>,
    volume_template: Arc<VolumeTemplate>,
    chapter_template: Arc<ChapterTemplate>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            mode_dir: 0o755,
            mode_file: 0o644,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            http_delay_ms: 200,
            http_max_retries: 3,
            provider_template: Arc::new(|info| sanitize_filename(&info.name)),
            manga_template: Arc::new(|_, manga| sanitize_filename(&manga.title)),
            volume_template: Arc::new(|_, volume| {
                sanitize_filename(&format!("Vol. {}", volume.number))
            }),
            chapter_template: Arc::new(|_, chapter| {
                sanitize_filename(&format!("[{:06.1}] {}", chapter.number, chapter.title))
            }),
        }
    }
}

impl ClientOptions {
    pub fn with_modes(mut self, mode_dir: u32, mode_file: u32) -> Self {
        self.mode_dir = mode_dir;
        self.mode_file = mode_file;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_http(mut self, delay_ms: u64, max_retries: u32) -> Self {
        self.http_delay_ms = delay_ms;
        self.http_max_retries = max_retries;
        self
    }

    pub fn with_provider_template(
        mut self,
        template: impl Fn(&SourceInfo) -> String + Send + Sync + 'static,
    ) -> Self {
        self.provider_template = Arc::new(template);
        self
    }

    pub fn with_manga_template(
        mut self,
        template: impl Fn(&str, &Manga) -> String + Send + Sync + 'static,
    ) -> Self {
        self.manga_template = Arc::new(template);
        self
    }

    pub fn with_volume_template(
        mut self,
        template: impl Fn(&str, &Volume) -> String + Send + Sync + 'static,
    ) -> Self {
        self.volume_template = Arc::new(template);
        self
    }

    pub fn with_chapter_template(
        mut self,
        template: impl Fn(&str, &Chapter) -> String + Send + Sync + 'static,
    ) -> Self {
        self.chapter_template = Arc::new(template);
        self
    }

    /// Directory name of the content source.
    pub fn provider_name(&self, source: &SourceInfo) -> String {
        (self.provider_template)(source)
    }

    /// Directory name of a manga.
    pub fn manga_name(&self, source: &SourceInfo, manga: &Manga) -> String {
        (self.manga_template)(&source.name, manga)
    }

    /// Directory name of a volume.
    pub fn volume_name(&self, source: &SourceInfo, volume: &Volume) -> String {
        (self.volume_template)(&source.name, volume)
    }

    /// File name of a chapter, including the format extension.
    pub fn chapter_name(&self, source: &SourceInfo, chapter: &Chapter, format: Format) -> String {
        format!(
            "{}{}",
            (self.chapter_template)(&source.name, chapter),
            format.extension()
        )
    }
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientOptions")
            .field("mode_dir", &format_args!("{:o}", self.mode_dir))
            .field("mode_file", &format_args!("{:o}", self.mode_file))
            .field("user_agent", &self.user_agent)
            .field("http_delay_ms", &self.http_delay_ms)
            .field("http_max_retries", &self.http_max_retries)
            .finish_non_exhaustive()
    }
}
