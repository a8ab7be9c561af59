//! The [`Client`], tying a content source to metadata providers and storage.
//!
//! # Examples
//!
//! ```rust,no_run
//! use kanko::prelude::*;
//! use kanko::fs::LocalFs;
//! use kanko::metadata::{CachedProvider, MemoryStore, MetadataProvider};
//! use kanko::options::{DownloadOptionsBuilder, Format};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(source: Arc<dyn Source>, anilist: Arc<dyn MetadataProvider>) -> kanko::Result<()> {
//! let client = Client::new(source, Arc::new(LocalFs::new()), ClientOptions::default(), Logger::new())?;
//! client.add_metadata_provider(Arc::new(CachedProvider::new(anilist, Arc::new(MemoryStore::new()))?))?;
//!
//! let manga = client.search_mangas("berserk").await?.remove(0);
//! let volume = client.manga_volumes(&manga).await?.remove(0);
//! let chapter = client.volume_chapters(&volume).await?.remove(0);
//!
//! let options = DownloadOptionsBuilder::default()
//!     .directory("/srv/manga")
//!     .format(Format::Cbz)
//!     .write_comic_info_xml(true)
//!     .build()
//!     .unwrap();
//! let downloaded = client
//!     .download_chapter(&chapter, &options, &CancellationToken::new())
//!     .await?;
//! println!("{} is {}", downloaded.path().display(), downloaded.chapter_status);
//! # Ok(())
//! # }
//! ```

use parking_lot::RwLock;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::{
    download::{ChapterDownload, DownloadedChapter, fetch},
    error::{Error, Result},
    fs::{Filesystem, MemoryFs, merge_directories},
    logger::Logger,
    metadata::{
        self, CachedProvider, Metadata, MetadataProvider,
        cached::{DEFAULT_STEP, DEFAULT_TRIES},
    },
    net::HttpClient,
    options::{ClientOptions, DownloadOptions},
    source::{Source, SourceInfo},
    types::{Chapter, Manga, Page, PageWithImage, Volume},
};

/// Wrapper around a content [`Source`] with metadata resolution and
/// chapter downloads.
pub struct Client {
    source: Arc<dyn Source>,
    info: SourceInfo,
    fs: Arc<dyn Filesystem>,
    options: ClientOptions,
    logger: Logger,
    http: HttpClient,
    providers: RwLock<Vec<Arc<CachedProvider>>>,
}

impl Client {
    /// Creates a client for `source` writing to `fs`.
    ///
    /// The source receives `logger` through [`Source::set_logger`].
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] when the source info is malformed.
    pub fn new(
        source: Arc<dyn Source>,
        fs: Arc<dyn Filesystem>,
        options: ClientOptions,
        logger: Logger,
    ) -> Result<Self> {
        let info = source.info();
        info.validate()?;

        source.set_logger(logger.clone());

        let http = HttpClient::new(format!("{}-images", info.id))
            .with_rate_limit(options.http_delay_ms)
            .with_max_retries(options.http_max_retries)
            .with_header("User-Agent", &options.user_agent);

        Ok(Self {
            source,
            info,
            fs,
            options,
            logger,
            http,
            providers: RwLock::new(Vec::new()),
        })
    }

    pub fn info(&self) -> &SourceInfo {
        &self.info
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    pub fn fs(&self) -> &dyn Filesystem {
        self.fs.as_ref()
    }

    /// Registers a metadata provider. Providers are consulted in
    /// registration order and log through the client logger, prefixed with
    /// their id.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] when the provider info is malformed or a
    /// provider with the same id is already registered.
    pub fn add_metadata_provider(&self, provider: Arc<CachedProvider>) -> Result<()> {
        let info = provider.info();
        info.validate()?;

        let mut providers = self.providers.write();
        if providers.iter().any(|p| p.info().id == info.id) {
            return Err(Error::validation(format!(
                "metadata provider {:?} is already registered",
                info.id
            )));
        }

        provider.set_logger(self.logger.clone().with_prefix(&info.id));
        self.logger
            .log(format!("registered metadata provider {:?}", info.name));
        providers.push(provider);
        Ok(())
    }

    /// Looks up a registered metadata provider by its id code.
    pub fn metadata_provider(&self, code: &str) -> Option<Arc<CachedProvider>> {
        self.providers
            .read()
            .iter()
            .find(|p| p.info().id == code)
            .cloned()
    }

    /// Registered metadata providers, in registration order.
    pub fn metadata_providers(&self) -> Vec<Arc<CachedProvider>> {
        self.providers.read().clone()
    }

    pub async fn search_mangas(&self, query: &str) -> Result<Vec<Manga>> {
        self.source.search_mangas(query).await
    }

    pub async fn manga_volumes(&self, manga: &Manga) -> Result<Vec<Volume>> {
        self.source.manga_volumes(manga).await
    }

    pub async fn volume_chapters(&self, volume: &Volume) -> Result<Vec<Chapter>> {
        self.source.volume_chapters(volume).await
    }

    pub async fn chapter_pages(&self, chapter: &Chapter) -> Result<Vec<Page>> {
        self.source.chapter_pages(chapter).await
    }

    /// Closes the content source.
    pub async fn close(&self) -> Result<()> {
        self.source.close().await
    }

    /// Searches metadata for `manga` on every registered provider, in
    /// registration order, returning the first record found.
    ///
    /// Provider and cache errors abort the search.
    ///
    /// # Errors
    ///
    /// [`Error::Metadata`] when no provider is registered.
    pub async fn search_metadata(&self, manga: &Manga) -> Result<Option<Metadata>> {
        let providers = self.metadata_providers();
        if providers.is_empty() {
            return Err(Error::metadata("no metadata providers available"));
        }

        self.logger
            .log(format!("searching metadata for manga {:?}", manga.title));

        for provider in providers {
            if let Some(meta) = self.search_by_manga(&provider, manga).await? {
                return Ok(Some(meta));
            }
        }

        self.logger
            .log(format!("couldn't find metadata for manga {:?}", manga.title));
        Ok(None)
    }

    /// Resolves `manga` on a single provider.
    ///
    /// Ids on the existing metadata of the manga that belong to the
    /// provider are tried first, then the closest match to the search
    /// title.
    pub async fn search_by_manga(
        &self,
        provider: &CachedProvider,
        manga: &Manga,
    ) -> Result<Option<Metadata>> {
        if let Some(existing) = &manga.metadata {
            let source = provider.info().source;
            let ids = existing
                .ids()
                .filter(|id| id.source == source)
                .filter_map(|id| id.value());

            for id in ids {
                if let Some(meta) = provider.search_by_id(id).await? {
                    return Ok(Some(meta));
                }
            }
        }

        provider
            .find_closest(manga.metadata_search_title(), DEFAULT_TRIES, DEFAULT_STEP)
            .await
    }

    /// Sets the reading progress of the chapter manga on every provider to
    /// the integer part of the chapter number.
    ///
    /// Every provider is attempted; failures are collected into an
    /// [`Error::Aggregate`]. Fails with [`Error::Metadata`] when no provider
    /// is registered.
    pub async fn sync_progress(&self, chapter: &Chapter) -> Result<()> {
        let providers = self.metadata_providers();
        if providers.is_empty() {
            return Err(Error::metadata(
                "no metadata providers available to sync progress",
            ));
        }

        let title = chapter.manga().metadata_search_title();
        if title.is_empty() {
            return Err(Error::validation(format!(
                "can't find a title for chapter {chapter}"
            )));
        }

        let progress = chapter.number.trunc().max(0.0) as u32;
        let mut errors = Vec::new();

        for provider in providers {
            let name = provider.info().name;
            let result = match provider.find_closest(title, DEFAULT_TRIES, DEFAULT_STEP).await {
                Ok(Some(meta)) => match meta.id.value() {
                    Some(id) => provider.set_manga_progress(id, progress).await,
                    None => Err(Error::metadata(format!(
                        "manga {:?} on {name} has no numeric id",
                        meta.title()
                    ))),
                },
                Ok(None) => Err(Error::not_found(format!(
                    "manga for chapter {chapter} was not found on {name}"
                ))),
                Err(e) => Err(e),
            };

            match result {
                Ok(()) => self
                    .logger
                    .log(format!("set progress of {title:?} to {progress} on {name}")),
                Err(e) => errors.push(e),
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Aggregate(errors))
        }
    }

    /// Downloads `chapter` with its sidecars into `options.directory`.
    ///
    /// With `search_metadata` set, the manga metadata is replaced by a
    /// fresh search result, even when nothing is found. The download is
    /// staged in memory and merged into the client filesystem only when
    /// every step succeeded; on error the filesystem is left untouched.
    ///
    /// # Errors
    ///
    /// * [`Error::Metadata`] - Strict mode without valid metadata, a failed sidecar, or
    ///   `search_metadata` set without any registered provider
    /// * [`Error::Cancelled`] - `cancel` was triggered
    /// * Any source, network or archive error
    #[instrument(skip_all, fields(chapter = %chapter, format = %options.format))]
    pub async fn download_chapter(
        &self,
        chapter: &Chapter,
        options: &DownloadOptions,
        cancel: &CancellationToken,
    ) -> Result<DownloadedChapter> {
        self.logger.log(format!(
            "downloading chapter {:?} as {}",
            chapter.title, options.format
        ));

        let manga = chapter.manga();
        let meta = if options.search_metadata {
            self.search_metadata(manga).await?
        } else {
            manga.metadata.clone()
        };

        if let Err(e) = metadata::validate(meta.as_ref()) {
            if options.strict {
                return Err(Error::metadata(format!(
                    "no valid metadata for manga {:?}: {e}",
                    manga.title
                )));
            }
        }

        let staging = MemoryFs::new();
        let download = ChapterDownload {
            source: self.source.as_ref(),
            source_info: &self.info,
            fs: self.fs.as_ref(),
            staging: &staging,
            client_options: &self.options,
            options,
            http: &self.http,
            logger: &self.logger,
            cancel,
        };
        let downloaded = download.run(chapter, meta).await?;

        merge_directories(
            self.fs.as_ref(),
            &options.directory,
            &staging,
            &options.directory,
            self.options.mode_dir,
            self.options.mode_file,
        )
        .await?;

        Ok(downloaded)
    }

    /// Downloads `pages` concurrently. See [`fetch::download_pages_in_batch`].
    pub async fn download_pages_in_batch(
        &self,
        pages: &[Page],
        cancel: &CancellationToken,
    ) -> Result<Vec<PageWithImage>> {
        fetch::download_pages_in_batch(self.source.as_ref(), pages, &self.logger, cancel).await
    }

    /// Downloads the image of a single page.
    pub async fn download_page(&self, page: &Page) -> Result<PageWithImage> {
        fetch::download_page(self.source.as_ref(), page).await
    }

    /// Removes a downloaded chapter, archive file or images directory alike.
    pub async fn remove_chapter(&self, path: &Path) -> Result<()> {
        self.logger.log(format!("removing {}", path.display()));
        self.fs.remove(path).await
    }
}

impl fmt::Display for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.info.name)
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("source", &self.info.id)
            .field("fs", &self.fs.name())
            .field("options", &self.options)
            .field("providers", &self.providers.read().len())
            .finish()
    }
}
