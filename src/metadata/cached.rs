//! Memoizing decorator around a [`MetadataProvider`].
//!
//! [`CachedProvider`] adds three lookup buckets (query to ids, title to id,
//! id to record) and a closest-title search on top of any provider, plus
//! persistence of authenticated users keyed by username.
//!
//! # Examples
//!
//! ```rust,no_run
//! use kanko::metadata::{CachedProvider, MemoryStore, MetadataProvider};
//! use std::sync::Arc;
//!
//! # async fn example(anilist: Arc<dyn MetadataProvider>) -> kanko::Result<()> {
//! let provider = CachedProvider::new(anilist, Arc::new(MemoryStore::new()))?;
//!
//! if let Some(meta) = provider.find_closest("Berserk: The Black Swordsman", 3, 3).await? {
//!     println!("resolved {meta}");
//! }
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::logger::Logger;
use crate::metadata::Metadata;
use crate::metadata::cache::{CacheStore, ProviderCache};
use crate::metadata::provider::{AuthData, LoginOption, MetadataProvider, ProviderInfo, User};

/// Default number of attempts for [`CachedProvider::find_closest`].
pub const DEFAULT_TRIES: usize = 3;
/// Default number of characters trimmed per attempt.
pub const DEFAULT_STEP: usize = 3;

/// [`MetadataProvider`] with a cache and closest-title search.
///
/// Only positive lookups are memoized: a provider answering "no match" is
/// asked again next time. Cache failures surface as [`Error::Cache`], provider
/// failures are returned untouched.
pub struct CachedProvider {
    provider: Arc<dyn MetadataProvider>,
    info: ProviderInfo,
    cache: ProviderCache,
    logger: RwLock<Logger>,
}

impl CachedProvider {
    /// Wraps `provider`, keeping its entries in `store` under buckets
    /// prefixed with the provider id.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] when the provider info is malformed.
    pub fn new(provider: Arc<dyn MetadataProvider>, store: Arc<dyn CacheStore>) -> Result<Self> {
        let info = provider.info();
        info.validate()?;

        let logger = Logger::new().with_prefix(&info.id);
        provider.set_logger(logger.clone());

        Ok(Self {
            cache: ProviderCache::new(info.id.clone(), store),
            provider,
            info,
            logger: RwLock::new(logger),
        })
    }

    /// Replaces the logger of this wrapper and of the wrapped provider.
    pub fn with_logger(self, logger: Logger) -> Self {
        self.set_logger(logger);
        self
    }

    fn log(&self, message: impl AsRef<str>) {
        self.logger.read().log(message);
    }

    /// Finds the record closest to `title`.
    ///
    /// A title previously bound through [`bind_title_with_id`](Self::bind_title_with_id)
    /// or resolved by an earlier call is answered from the cache. Otherwise the
    /// provider is searched up to `tries` times, trimming `step` characters off
    /// the end of the title after every empty answer. The first ranked result
    /// is accepted as the match and bound to `title`.
    #[instrument(skip(self), fields(provider = %self.info.id))]
    pub async fn find_closest(
        &self,
        title: &str,
        tries: usize,
        step: usize,
    ) -> Result<Option<Metadata>> {
        self.log(format!(
            "finding closest manga metadata with title {title:?} on {:?}",
            self.info.name
        ));

        if let Some(id) = self.cache.title_id(title)? {
            if let Some(meta) = self.cache.metadata(id)? {
                return Ok(Some(meta));
            }
            debug!(id, "title bound to an id without a cached record");
        }

        let Some(meta) = self.search_closest(title, tries, step).await? else {
            return Ok(None);
        };

        let id = record_id(&meta)?;
        self.cache.set_title_id(title, id)?;
        Ok(Some(meta))
    }

    async fn search_closest(
        &self,
        title: &str,
        tries: usize,
        step: usize,
    ) -> Result<Option<Metadata>> {
        let mut query = title.to_string();

        for attempt in 1..=tries {
            self.log(format!("finding closest try {attempt}/{tries}"));

            let metas = self.search(&query).await?;
            if let Some(closest) = metas.into_iter().next() {
                self.log(format!("found closest: {closest}"));
                return Ok(Some(closest));
            }

            match shorten(&query, step) {
                Some(shorter) => query = shorter,
                None => break,
            }
        }

        Ok(None)
    }

    /// Pins `title` to the record with `id`, bypassing fuzzy search from now on.
    pub fn bind_title_with_id(&self, title: &str, id: u64) -> Result<()> {
        self.cache.set_title_id(title, id)
    }

    /// Restores the session cached for `username`.
    ///
    /// Returns `Ok(false)` when nothing usable is cached. A cached token whose
    /// user record is missing is deleted so the next login starts clean.
    pub async fn login_with_cached_user(&self, username: &str) -> Result<bool> {
        self.log(format!(
            "authenticating {:?} via cached user {username:?}",
            self.info.name
        ));

        let Some(auth) = self.cache.auth_data(username).map_err(auth_error)? else {
            return Ok(false);
        };

        let Some(user) = self.cache.user(username).map_err(auth_error)? else {
            self.log(format!(
                "cached access token for {username:?} has no cached user, re-authentication needed"
            ));
            self.cache.delete_auth_data(username).map_err(auth_error)?;
            return Ok(false);
        };

        self.provider
            .login(&LoginOption::CachedUser { user, auth })
            .await?;
        Ok(true)
    }

    /// Deletes the user and auth data cached for `username`.
    pub fn delete_cached_user(&self, username: &str) -> Result<()> {
        self.log(format!(
            "deleting cached authentication data for {username:?} on {:?}",
            self.info.name
        ));
        self.cache.delete_user(username)?;
        self.cache.delete_auth_data(username)
    }
}

#[async_trait]
impl MetadataProvider for CachedProvider {
    fn info(&self) -> ProviderInfo {
        self.info.clone()
    }

    fn set_logger(&self, logger: Logger) {
        self.provider.set_logger(logger.clone());
        *self.logger.write() = logger;
    }

    async fn search_by_id(&self, id: u64) -> Result<Option<Metadata>> {
        self.log(format!(
            "searching manga metadata with id {id} on {:?}",
            self.info.name
        ));

        if let Some(meta) = self.cache.metadata(id)? {
            return Ok(Some(meta));
        }

        let Some(meta) = self.provider.search_by_id(id).await? else {
            return Ok(None);
        };
        self.cache.set_metadata(id, &meta)?;
        Ok(Some(meta))
    }

    async fn search(&self, query: &str) -> Result<Vec<Metadata>> {
        self.log(format!(
            "searching manga metadata with query {query:?} on {:?}",
            self.info.name
        ));

        if let Some(ids) = self.cache.query_ids(query)? {
            let mut metas = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(meta) = self.search_by_id(id).await? {
                    metas.push(meta);
                }
            }
            return Ok(metas);
        }

        let metas = self.provider.search(query).await?;

        let mut ids = Vec::with_capacity(metas.len());
        for meta in &metas {
            let id = record_id(meta)?;
            self.cache.set_metadata(id, meta)?;
            ids.push(id);
        }
        self.cache.set_query_ids(query, &ids)?;

        Ok(metas)
    }

    async fn set_manga_progress(&self, id: u64, chapter_number: u32) -> Result<()> {
        self.provider.set_manga_progress(id, chapter_number).await
    }

    fn authenticated(&self) -> bool {
        self.provider.authenticated()
    }

    fn user(&self) -> Option<User> {
        self.provider.user()
    }

    /// Authenticates through the wrapped provider and caches the resulting
    /// user and auth data under the username.
    async fn login(&self, option: &LoginOption) -> Result<AuthData> {
        self.log(format!(
            "authenticating {:?} with login option {option}",
            self.info.name
        ));

        let auth = self
            .provider
            .login(option)
            .await
            .map_err(|e| match e {
                Error::Auth(_) => e,
                other => Error::auth(other.to_string()),
            })?;

        let user = self.provider.user().ok_or_else(|| {
            Error::auth(format!("no user after logging into {}", self.info.name))
        })?;

        self.cache.set_user(&user.name, &user).map_err(auth_error)?;
        self.cache
            .set_auth_data(&user.name, &auth)
            .map_err(auth_error)?;

        Ok(auth)
    }

    async fn logout(&self) -> Result<()> {
        self.provider.logout().await
    }
}

fn record_id(meta: &Metadata) -> Result<u64> {
    meta.id.value().ok_or_else(|| {
        Error::metadata(format!(
            "record {:?} has a non-numeric id {:?}",
            meta.title(),
            meta.id.raw
        ))
    })
}

fn auth_error(error: Error) -> Error {
    Error::auth(error.to_string())
}

/// Trims surrounding whitespace and then `step` characters from the end.
///
/// Titles of at most `step` characters lose one character instead, and
/// `None` is returned once a single character is left.
fn shorten(title: &str, step: usize) -> Option<String> {
    let title = title.trim();
    let len = title.chars().count();

    let keep = if len > step {
        len - step
    } else if len > 1 {
        len - 1
    } else {
        return None;
    };

    Some(title.chars().take(keep).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shorten_by_step() {
        assert_eq!(shorten("Berserk", 3).as_deref(), Some("Bers"));
        assert_eq!(shorten("  Berserk  ", 3).as_deref(), Some("Bers"));
        assert_eq!(shorten("Ber", 3).as_deref(), Some("Be"));
        assert_eq!(shorten("B", 3), None);
        assert_eq!(shorten("", 3), None);
    }

    #[test]
    fn test_shorten_counts_chars() {
        assert_eq!(shorten("ベルセルク", 3).as_deref(), Some("ベル"));
    }
}
