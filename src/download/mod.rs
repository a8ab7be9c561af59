//! Chapter download and archival.
//!
//! A chapter download resolves the destination directory, fetches every
//! page concurrently, serializes the pages in the requested
//! [`Format`](crate::options::Format) and writes the manga level sidecars
//! (`series.json`, cover and banner). Everything is written to a staging
//! [`MemoryFs`] which the [`Client`](crate::Client) merges into the real
//! filesystem once the whole chapter succeeded.
//!
//! The outcome of every artifact is reported through a [`DownloadedChapter`].

pub mod archive;
pub mod fetch;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::{
    error::{Error, Result},
    fs::{Filesystem, MemoryFs},
    logger::Logger,
    metadata::{
        ComicInfo, ComicInfoChapter, FILENAME_BANNER_JPG, FILENAME_COVER_JPG,
        FILENAME_SERIES_JSON, Metadata, SeriesJson, Status,
    },
    net::{ACCEPT_IMAGE, HttpClient},
    options::{ClientOptions, DownloadOptions, Format},
    source::{Source, SourceInfo},
    types::{Chapter, Manga, PageWithImage},
};

/// Outcome of a single artifact of a chapter download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    /// Written by this download.
    New,
    /// Not requested.
    Skip,
    /// Already present, left untouched.
    Exists,
    /// Already present and written again.
    Overwritten,
    /// Requested but could not be produced.
    Failed,
    /// Requested but no valid metadata was available.
    MissingMetadata,
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self {
            DownloadStatus::New => "new",
            DownloadStatus::Skip => "skip",
            DownloadStatus::Exists => "exists",
            DownloadStatus::Overwritten => "overwritten",
            DownloadStatus::Failed => "failed",
            DownloadStatus::MissingMetadata => "missing-metadata",
        };
        f.write_str(status)
    }
}

/// Result of [`Client::download_chapter`](crate::Client::download_chapter).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadedChapter {
    pub number: f32,
    pub title: String,
    /// File name of the chapter, or directory name for [`Format::Images`].
    pub filename: String,
    /// Directory the chapter was written to.
    pub directory: PathBuf,
    pub chapter_status: DownloadStatus,
    pub series_json_status: DownloadStatus,
    pub comic_info_xml_status: DownloadStatus,
    pub cover_status: DownloadStatus,
    pub banner_status: DownloadStatus,
    /// Metadata the download was made with.
    pub metadata: Option<Metadata>,
}

impl DownloadedChapter {
    /// Full path of the chapter.
    pub fn path(&self) -> PathBuf {
        self.directory.join(&self.filename)
    }
}

/// Sanitizes a filename by replacing invalid characters.
///
/// Characters that are not allowed in filenames on common filesystems are
/// replaced with `_`, surrounding whitespace is trimmed and the result is
/// capped at 200 bytes.
///
/// # Examples
///
/// ```rust
/// use kanko::download::sanitize_filename;
///
/// let clean = sanitize_filename("Chapter: 1 - The Beginning!");
/// assert_eq!(clean, "Chapter_ 1 - The Beginning!");
/// ```
pub fn sanitize_filename(name: &str) -> String {
    const INVALID: [char; 9] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

    let replaced: String = name
        .chars()
        .map(|c| if INVALID.contains(&c) || c.is_control() { '_' } else { c })
        .collect();
    let mut sanitized = replaced.trim().to_string();

    if sanitized.len() > 200 {
        let mut cut = 200;
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized.truncate(cut);
    }

    if sanitized.is_empty() {
        sanitized = "untitled".to_string();
    }

    sanitized
}

/// Extracts the file extension of a URL, lowercased and without the dot.
///
/// # Examples
///
/// ```rust
/// use kanko::download::extract_extension;
///
/// assert_eq!(extract_extension("https://example.com/image.jpg"), Some("jpg".to_string()));
/// assert_eq!(extract_extension("https://example.com/image.png?v=123"), Some("png".to_string()));
/// assert_eq!(extract_extension("https://example.com/image"), None);
/// ```
pub fn extract_extension(url: &str) -> Option<String> {
    let path = match url::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split(['?', '#']).next()?.to_string(),
    };

    let name = path.rsplit('/').next()?;
    let (_, ext) = name.rsplit_once('.')?;
    if ext.is_empty() || ext.len() > 10 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

#[derive(Debug, Clone, Copy)]
enum MangaImage {
    Cover,
    Banner,
}

impl MangaImage {
    fn filename(self) -> &'static str {
        match self {
            MangaImage::Cover => FILENAME_COVER_JPG,
            MangaImage::Banner => FILENAME_BANNER_JPG,
        }
    }

    fn url<'a>(self, manga: &'a Manga, meta: &'a Metadata) -> Option<&'a str> {
        let (own, fallback) = match self {
            MangaImage::Cover => (&manga.cover, &meta.cover_image),
            MangaImage::Banner => (&manga.banner, &meta.banner_image),
        };
        [own, fallback]
            .into_iter()
            .find(|url| !url.is_empty())
            .map(String::as_str)
    }
}

impl fmt::Display for MangaImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MangaImage::Cover => f.write_str("cover"),
            MangaImage::Banner => f.write_str("banner"),
        }
    }
}

/// One chapter download writing into a staging filesystem.
///
/// Existence checks go to `fs`, every write goes to `staging`.
pub(crate) struct ChapterDownload<'a> {
    pub source: &'a dyn Source,
    pub source_info: &'a SourceInfo,
    pub fs: &'a dyn Filesystem,
    pub staging: &'a MemoryFs,
    pub client_options: &'a ClientOptions,
    pub options: &'a DownloadOptions,
    pub http: &'a HttpClient,
    pub logger: &'a Logger,
    pub cancel: &'a CancellationToken,
}

impl ChapterDownload<'_> {
    /// Writes the chapter and its sidecars using `meta` as the manga metadata.
    #[instrument(skip_all, fields(chapter = %chapter, format = %self.options.format))]
    pub async fn run(
        &self,
        chapter: &Chapter,
        meta: Option<Metadata>,
    ) -> Result<DownloadedChapter> {
        let manga = chapter.manga();
        let mut directory = self.options.directory.clone();
        let mut manga_dir = directory.clone();

        if self.options.create_provider_dir {
            directory.push(self.client_options.provider_name(self.source_info));
        }
        if self.options.create_manga_dir {
            directory.push(self.client_options.manga_name(self.source_info, manga));
            manga_dir = directory.clone();
        }
        if self.options.create_volume_dir {
            directory.push(
                self.client_options
                    .volume_name(self.source_info, &chapter.volume),
            );
        }

        self.staging
            .create_dir_all(&directory, self.client_options.mode_dir)
            .await?;

        let filename =
            self.client_options
                .chapter_name(self.source_info, chapter, self.options.format);
        let chapter_path = directory.join(&filename);
        let chapter_exists = self.fs.exists(&chapter_path).await?;

        let mut downloaded = DownloadedChapter {
            number: chapter.number,
            title: chapter.title.clone(),
            filename,
            directory,
            chapter_status: DownloadStatus::Exists,
            series_json_status: DownloadStatus::Skip,
            comic_info_xml_status: DownloadStatus::Skip,
            cover_status: DownloadStatus::Skip,
            banner_status: DownloadStatus::Skip,
            metadata: meta,
        };

        if !chapter_exists || !self.options.skip_if_exists {
            downloaded.comic_info_xml_status = self
                .write_chapter(chapter, downloaded.metadata.as_ref(), &chapter_path)
                .await?;
            downloaded.chapter_status = if chapter_exists {
                DownloadStatus::Overwritten
            } else {
                DownloadStatus::New
            };
        }

        let meta = match downloaded.metadata.as_ref() {
            Some(meta) if meta.is_valid() => meta,
            _ => {
                debug!("no valid metadata, skipping manga sidecars");
                downloaded.series_json_status = DownloadStatus::MissingMetadata;
                downloaded.cover_status = DownloadStatus::MissingMetadata;
                downloaded.banner_status = DownloadStatus::MissingMetadata;
                return Ok(downloaded);
            }
        };

        let ongoing = meta.status == Some(Status::Releasing);
        if self.options.write_series_json
            && !(self.options.skip_series_json_if_ongoing && ongoing)
        {
            let path = manga_dir.join(FILENAME_SERIES_JSON);
            downloaded.series_json_status = self
                .write_sidecar(&path, self.series_json(manga, meta))
                .await?;
        }

        if self.options.download_manga_cover {
            let path = manga_dir.join(MangaImage::Cover.filename());
            downloaded.cover_status = self
                .write_sidecar(&path, self.manga_image(manga, meta, MangaImage::Cover))
                .await?;
        }

        if self.options.download_manga_banner {
            let path = manga_dir.join(MangaImage::Banner.filename());
            downloaded.banner_status = self
                .write_sidecar(&path, self.manga_image(manga, meta, MangaImage::Banner))
                .await?;
        }

        Ok(downloaded)
    }

    /// Writes a manga level file unless it already exists.
    ///
    /// A failure to produce the content is fatal under strict mode and
    /// reported as [`DownloadStatus::Failed`] otherwise.
    async fn write_sidecar(
        &self,
        path: &Path,
        content: impl Future<Output = Result<Vec<u8>>>,
    ) -> Result<DownloadStatus> {
        if self.fs.exists(path).await? {
            return Ok(DownloadStatus::Exists);
        }

        match content.await {
            Ok(data) => {
                self.staging
                    .write(path, &data, self.client_options.mode_file)
                    .await?;
                Ok(DownloadStatus::New)
            }
            Err(e) if self.options.strict => Err(Error::metadata(e.to_string())),
            Err(e) => {
                self.logger
                    .log(format!("failed to write {}: {e}", path.display()));
                Ok(DownloadStatus::Failed)
            }
        }
    }

    async fn series_json(&self, manga: &Manga, meta: &Metadata) -> Result<Vec<u8>> {
        self.logger.log(format!("writing {FILENAME_SERIES_JSON}"));
        match &manga.series_json {
            Some(series) => series.to_json(),
            None => SeriesJson::from_metadata(meta).to_json(),
        }
    }

    async fn manga_image(
        &self,
        manga: &Manga,
        meta: &Metadata,
        kind: MangaImage,
    ) -> Result<Vec<u8>> {
        self.logger.log(format!("downloading {kind}"));

        let url = kind
            .url(manga, meta)
            .ok_or_else(|| Error::not_found(format!("{kind} url not found for {manga}")))?;
        self.logger.log(format!("{kind} url: {url}"));

        let mut headers = HashMap::from([("Accept".to_string(), ACCEPT_IMAGE.to_string())]);
        if !manga.url.is_empty() {
            headers.insert("Referer".to_string(), manga.url.clone());
        }

        let image = self.http.get_with_headers(url, &headers).await?;
        Ok(image.to_vec())
    }

    /// Downloads, transforms and serializes the chapter pages.
    ///
    /// Returns the status of the embedded `ComicInfo.xml`.
    async fn write_chapter(
        &self,
        chapter: &Chapter,
        meta: Option<&Metadata>,
        path: &Path,
    ) -> Result<DownloadStatus> {
        let pages = self.source.chapter_pages(chapter).await?;
        let mut pages = fetch::download_pages_in_batch(
            self.source,
            &pages,
            self.logger,
            self.cancel,
        )
        .await?;

        for page in &mut pages {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            page.image = self.options.image_transformer.apply(page.image.clone())?;
        }

        let format = self.options.format;
        let mode_file = self.client_options.mode_file;
        self.logger
            .log(format!("saving {} pages as {format}", pages.len()));

        let (data, comic_info_status) = match format {
            Format::Images => {
                self.write_images(&pages, path).await?;
                return Ok(DownloadStatus::Skip);
            }
            Format::Cbz => {
                let (comic_info, status) = self.comic_info(chapter, meta, pages.len());
                let options = self.options.comic_info_options;
                let xml = comic_info.map(|info| info.to_xml(&options));
                let data =
                    tokio::task::spawn_blocking(move || archive::write_cbz(&pages, xml.as_deref()))
                        .await??;
                (data, status)
            }
            _ => {
                let data = tokio::task::spawn_blocking(move || match format {
                    Format::Tar => archive::write_tar(&pages, mode_file),
                    Format::TarGz => archive::write_tar_gz(&pages, mode_file),
                    Format::Zip => archive::write_zip(&pages),
                    _ => archive::write_pdf(&pages),
                })
                .await??;
                (data, DownloadStatus::Skip)
            }
        };

        self.staging.write(path, &data, mode_file).await?;
        Ok(comic_info_status)
    }

    async fn write_images(&self, pages: &[PageWithImage], dir: &Path) -> Result<()> {
        self.staging
            .create_dir_all(dir, self.client_options.mode_dir)
            .await?;
        for (i, page) in pages.iter().enumerate() {
            let path = dir.join(archive::page_name(i, page));
            self.staging
                .write(&path, &page.image, self.client_options.mode_file)
                .await?;
        }
        Ok(())
    }

    /// Picks the `ComicInfo.xml` to embed: the chapter override first, then
    /// one built from valid metadata.
    fn comic_info(
        &self,
        chapter: &Chapter,
        meta: Option<&Metadata>,
        pages: usize,
    ) -> (Option<ComicInfo>, DownloadStatus) {
        if !self.options.write_comic_info_xml {
            return (None, DownloadStatus::Skip);
        }

        let pages = u32::try_from(pages).unwrap_or(u32::MAX);
        if let Some(info) = &chapter.comic_info {
            let mut info = info.clone();
            info.page_count = pages;
            return (Some(info), DownloadStatus::New);
        }

        match meta {
            Some(meta) if meta.is_valid() => {
                let details = ComicInfoChapter {
                    title: chapter.title.clone(),
                    url: chapter.url.clone(),
                    number: chapter.number,
                    date: chapter.date,
                    scanlation_group: chapter.scanlation_group.clone(),
                    pages,
                };
                (
                    Some(ComicInfo::from_metadata(meta, &details)),
                    DownloadStatus::New,
                )
            }
            _ => (None, DownloadStatus::MissingMetadata),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("normal_file.txt"), "normal_file.txt");
        assert_eq!(
            sanitize_filename("file/with\\bad:chars"),
            "file_with_bad_chars"
        );
        assert_eq!(sanitize_filename("  "), "untitled");

        let long_name = "ä".repeat(150);
        let sanitized = sanitize_filename(&long_name);
        assert!(sanitized.len() <= 200);
        assert_eq!(sanitized.chars().count(), 100);
    }

    #[test]
    fn test_extract_extension() {
        assert_eq!(
            extract_extension("https://example.com/image.PNG"),
            Some("png".to_string())
        );
        assert_eq!(
            extract_extension("https://example.com/data/0001.webp?token=a.b#frag"),
            Some("webp".to_string())
        );
        assert_eq!(extract_extension("pages/0002.jpeg"), Some("jpeg".to_string()));
        assert_eq!(extract_extension("https://example.com/image."), None);
        assert_eq!(extract_extension("https://example.com/v1.2/image"), None);
    }

    #[test]
    fn test_manga_image_prefers_manga_url() {
        let meta = Metadata {
            cover_image: "https://meta/cover.jpg".into(),
            banner_image: "https://meta/banner.jpg".into(),
            ..Default::default()
        };
        let manga = Manga::new("x", "X").with_cover("https://source/cover.jpg");

        assert_eq!(
            MangaImage::Cover.url(&manga, &meta),
            Some("https://source/cover.jpg")
        );
        assert_eq!(
            MangaImage::Banner.url(&manga, &meta),
            Some("https://meta/banner.jpg")
        );
        assert_eq!(MangaImage::Banner.url(&manga, &Metadata::default()), None);
    }

    #[test]
    fn test_downloaded_chapter_path() {
        let downloaded = DownloadedChapter {
            number: 1.0,
            title: "Prologue".into(),
            filename: "[0001.0] Prologue.cbz".into(),
            directory: PathBuf::from("/library/Berserk"),
            chapter_status: DownloadStatus::New,
            series_json_status: DownloadStatus::Skip,
            comic_info_xml_status: DownloadStatus::New,
            cover_status: DownloadStatus::Skip,
            banner_status: DownloadStatus::Skip,
            metadata: None,
        };
        assert_eq!(
            downloaded.path(),
            PathBuf::from("/library/Berserk/[0001.0] Prologue.cbz")
        );
        assert_eq!(DownloadStatus::MissingMetadata.to_string(), "missing-metadata");
    }
}
