//! Common test utilities and fixtures
//!
//! Stub content source, call-counting metadata provider and builders shared
//! across the integration tests. Nothing here touches the network.

use async_trait::async_trait;
use bytes::Bytes;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use kanko::error::{Error, Result};
use kanko::fs::Filesystem;
use kanko::metadata::{
    AuthData, CachedProvider, Date, Id, IdSource, LoginOption, MemoryStore, Metadata,
    MetadataProvider, ProviderInfo, Status, User,
};
use kanko::prelude::*;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[allow(dead_code)]
pub const LIBRARY: &str = "/library";

/// A small solid PNG whose color encodes `shade`.
#[allow(dead_code)]
pub fn png(shade: u8) -> Bytes {
    let image = RgbImage::from_pixel(4, 6, Rgb([shade, 255 - shade, 128]));
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image)
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    Bytes::from(out.into_inner())
}

/// A valid Anilist record for Berserk.
#[allow(dead_code)]
pub fn berserk_metadata() -> Metadata {
    Metadata {
        romaji_title: "Berserk".to_string(),
        native_title: "ベルセルク".to_string(),
        description: "Guts, a former mercenary.".to_string(),
        cover_image: "not-a-url/cover.jpg".to_string(),
        genres: vec!["Action".to_string(), "Drama".to_string()],
        authors: vec!["Kentarou Miura".to_string()],
        start_date: Date::new(1989, 8, 25),
        status: Some(Status::Hiatus),
        chapters: 364,
        id: Id::anilist(30002),
        ..Default::default()
    }
}

#[allow(dead_code)]
pub fn manga() -> Manga {
    Manga::new("berserk", "Berserk").with_url("https://example.com/berserk")
}

#[allow(dead_code)]
pub fn chapter(manga: Manga, number: f32, title: &str) -> Chapter {
    let volume = Arc::new(Volume::new(1.0, Arc::new(manga)));
    Chapter::new(title, number, volume)
}

/// A page served by [`StubSource`].
#[allow(dead_code)]
#[derive(Clone)]
pub struct StubPage {
    pub image: Bytes,
    pub delay: Duration,
    pub fails: bool,
    pub embedded: bool,
}

#[allow(dead_code)]
impl StubPage {
    pub fn new(image: Bytes) -> Self {
        Self {
            image,
            delay: Duration::ZERO,
            fails: false,
            embedded: false,
        }
    }

    pub fn delayed(mut self, millis: u64) -> Self {
        self.delay = Duration::from_millis(millis);
        self
    }

    pub fn failing(mut self) -> Self {
        self.fails = true;
        self
    }

    pub fn embedded(mut self) -> Self {
        self.embedded = true;
        self
    }
}

/// In-memory content source serving the same pages for every chapter.
#[allow(dead_code)]
pub struct StubSource {
    pub pages: Vec<StubPage>,
    pub image_requests: AtomicUsize,
    pub completed: AtomicUsize,
}

#[allow(dead_code)]
impl StubSource {
    pub fn new(pages: Vec<StubPage>) -> Self {
        Self {
            pages,
            image_requests: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
        }
    }

    /// A source with `count` immediately available PNG pages.
    pub fn with_pages(count: u8) -> Self {
        Self::new((1..=count).map(|i| StubPage::new(png(i * 20))).collect())
    }

    pub fn requests(&self) -> usize {
        self.image_requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Source for StubSource {
    fn info(&self) -> SourceInfo {
        SourceInfo::new("stub", "Stub Source", "1.0.0")
    }

    async fn search_mangas(&self, _query: &str) -> Result<Vec<Manga>> {
        Ok(vec![manga()])
    }

    async fn manga_volumes(&self, manga: &Manga) -> Result<Vec<Volume>> {
        Ok(vec![Volume::new(1.0, Arc::new(manga.clone()))])
    }

    async fn volume_chapters(&self, volume: &Volume) -> Result<Vec<Chapter>> {
        Ok(vec![Chapter::new("Prologue", 1.0, Arc::new(volume.clone()))])
    }

    async fn chapter_pages(&self, _chapter: &Chapter) -> Result<Vec<Page>> {
        Ok(self
            .pages
            .iter()
            .enumerate()
            .map(|(i, stub)| {
                let page = Page::new(format!("https://example.com/pages/{i}"), ".png");
                if stub.embedded {
                    page.with_image(stub.image.clone())
                } else {
                    page
                }
            })
            .collect())
    }

    async fn get_page_image(&self, page: &Page) -> Result<Bytes> {
        self.image_requests.fetch_add(1, Ordering::SeqCst);
        let index: usize = page
            .url
            .rsplit('/')
            .next()
            .and_then(|i| i.parse().ok())
            .ok_or_else(|| Error::not_found(page.url.clone()))?;
        let stub = &self.pages[index];

        tokio::time::sleep(stub.delay).await;
        if stub.fails {
            return Err(Error::source("stub", format!("page {index} is broken")));
        }
        self.completed.fetch_add(1, Ordering::SeqCst);
        Ok(stub.image.clone())
    }
}

/// Metadata provider answering from fixed tables and counting calls.
#[allow(dead_code)]
pub struct CountingProvider {
    pub info: ProviderInfo,
    pub records: HashMap<u64, Metadata>,
    pub queries: HashMap<String, Vec<u64>>,
    pub search_calls: AtomicUsize,
    pub search_by_id_calls: AtomicUsize,
    pub progress: Mutex<Vec<(u64, u32)>>,
    pub user: Mutex<Option<User>>,
}

#[allow(dead_code)]
impl CountingProvider {
    pub fn new(id: &str, source: IdSource) -> Self {
        Self {
            info: ProviderInfo::new(id, source, id.to_uppercase(), "1.0.0").unwrap(),
            records: HashMap::new(),
            queries: HashMap::new(),
            search_calls: AtomicUsize::new(0),
            search_by_id_calls: AtomicUsize::new(0),
            progress: Mutex::new(Vec::new()),
            user: Mutex::new(None),
        }
    }

    pub fn anilist() -> Self {
        Self::new("anilist", IdSource::Anilist)
    }

    pub fn with_record(mut self, meta: Metadata) -> Self {
        let id = meta.id.value().unwrap();
        self.records.insert(id, meta);
        self
    }

    pub fn with_query(mut self, query: &str, ids: &[u64]) -> Self {
        self.queries.insert(query.to_string(), ids.to_vec());
        self
    }

    pub fn searches(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn id_searches(&self) -> usize {
        self.search_by_id_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataProvider for CountingProvider {
    fn info(&self) -> ProviderInfo {
        self.info.clone()
    }

    async fn search_by_id(&self, id: u64) -> Result<Option<Metadata>> {
        self.search_by_id_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.records.get(&id).cloned())
    }

    async fn search(&self, query: &str) -> Result<Vec<Metadata>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .queries
            .get(query)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.records.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn set_manga_progress(&self, id: u64, chapter_number: u32) -> Result<()> {
        if !self.records.contains_key(&id) {
            return Err(Error::not_found(format!("manga {id}")));
        }
        self.progress.lock().push((id, chapter_number));
        Ok(())
    }

    fn authenticated(&self) -> bool {
        self.user.lock().is_some()
    }

    fn user(&self) -> Option<User> {
        self.user.lock().clone()
    }

    async fn login(&self, option: &LoginOption) -> Result<AuthData> {
        match option {
            LoginOption::CodeGrant(grant) => {
                grant.validate()?;
                *self.user.lock() = Some(User {
                    id: 7,
                    name: "guts".to_string(),
                    about: String::new(),
                    avatar: String::new(),
                    url: String::new(),
                    source: self.info.source,
                });
                Ok(AuthData {
                    access_token: format!("token-{}", grant.code),
                    ..Default::default()
                })
            }
            LoginOption::CachedUser { user, auth } => {
                *self.user.lock() = Some(user.clone());
                Ok(auth.clone())
            }
        }
    }

    async fn logout(&self) -> Result<()> {
        *self.user.lock() = None;
        Ok(())
    }
}

/// Wraps `provider` in a [`CachedProvider`] over a fresh [`MemoryStore`].
#[allow(dead_code)]
pub fn cached(provider: Arc<CountingProvider>) -> Arc<CachedProvider> {
    Arc::new(CachedProvider::new(provider, Arc::new(MemoryStore::new())).unwrap())
}

/// A client without HTTP delays or retries.
#[allow(dead_code)]
pub fn client(source: Arc<StubSource>, fs: Arc<dyn Filesystem>) -> Client {
    let options = ClientOptions::default().with_http(0, 0);
    Client::new(source, fs, options, Logger::new()).unwrap()
}

/// Every file below `dir`, recursively.
#[allow(dead_code)]
pub async fn list_files(fs: &dyn Filesystem, dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let Ok(entries) = fs.read_dir(&dir).await else {
            continue;
        };
        for entry in entries {
            if entry.is_dir {
                pending.push(entry.path);
            } else {
                files.push(entry.path);
            }
        }
    }
    files.sort();
    files
}
