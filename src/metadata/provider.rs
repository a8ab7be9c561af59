//! Metadata provider capability and its passport.
//!
//! Concrete providers (Anilist, MyAnimeList, ...) live outside this crate;
//! the core only depends on the [`MetadataProvider`] trait.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};
use crate::logger::Logger;
use crate::metadata::{IdSource, Metadata};

static SEMVER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(0|[1-9]\d*)\.(0|[1-9]\d*)\.(0|[1-9]\d*)(?:-((?:0|[1-9]\d*|\d*[a-zA-Z-][0-9a-zA-Z-]*)(?:\.(?:0|[1-9]\d*|\d*[a-zA-Z-][0-9a-zA-Z-]*))*))?(?:\+([0-9a-zA-Z-]+(?:\.[0-9a-zA-Z-]+)*))?$",
    )
    .expect("semver pattern is valid")
});

/// Returns `true` if `version` is a semantic version without a `v` prefix.
///
/// # Examples
///
/// ```rust
/// use kanko::metadata::provider::is_semver;
///
/// assert!(is_semver("0.1.0"));
/// assert!(is_semver("1.0.0-beta.2+build.5"));
/// assert!(!is_semver("v0.1.0"));
/// assert!(!is_semver("1.0"));
/// ```
pub fn is_semver(version: &str) -> bool {
    SEMVER.is_match(version)
}

/// Passport of a metadata provider.
///
/// For a [`CachedProvider`](crate::metadata::CachedProvider) the `id` is also the
/// cache bucket prefix, so it must be unique among providers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderInfo {
    /// Unique id code, e.g. `al`.
    pub id: String,
    pub source: IdSource,
    pub name: String,
    /// Semantic version, "v" prefix not permitted.
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub website: String,
}

impl ProviderInfo {
    /// Builds and validates a passport.
    pub fn new(
        id: impl Into<String>,
        source: IdSource,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Result<Self> {
        let info = Self {
            id: id.into(),
            source,
            name: name.into(),
            version: version.into(),
            description: String::new(),
            website: String::new(),
        };
        info.validate()?;
        Ok(info)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_website(mut self, website: impl Into<String>) -> Self {
        self.website = website.into();
        self
    }

    /// Id and name must be non-empty and version a valid semver.
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(Error::validation("provider id must be non-empty"));
        }
        if self.name.is_empty() {
            return Err(Error::validation("provider name must be non-empty"));
        }
        if !is_semver(&self.version) {
            return Err(Error::validation(format!("invalid semver: {}", self.version)));
        }
        Ok(())
    }
}

impl fmt::Display for ProviderInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.version)
    }
}

/// Authenticated user of a metadata provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub about: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub url: String,
    pub source: IdSource,
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// Access/refresh token data and its expiration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthData {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    /// Unix timestamp at which the access token was created.
    #[serde(default)]
    pub created_at: i64,
    /// Seconds until the access token expires.
    #[serde(default)]
    pub expires_in: i64,
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub token_type: String,
}

/// Authorization code grant.
///
/// Leaving `client_secret` empty turns it into an implicit grant, in which case
/// `code` is the access token itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeGrant {
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    pub code: String,
    #[serde(default)]
    pub redirect_uri: String,
}

impl CodeGrant {
    pub fn validate(&self) -> Result<()> {
        if self.client_id.is_empty() {
            return Err(Error::auth("client id is empty"));
        }
        if self.code.is_empty() {
            return Err(Error::auth("code/access token is empty"));
        }
        Ok(())
    }
}

/// How a provider should authenticate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOption {
    /// Exchange a code grant with the provider.
    CodeGrant(CodeGrant),
    /// Restore a session from previously cached data.
    CachedUser { user: User, auth: AuthData },
}

impl fmt::Display for LoginOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoginOption::CodeGrant(_) => f.write_str("Code Grant Login"),
            LoginOption::CachedUser { .. } => f.write_str("Cached User Login"),
        }
    }
}

/// Source of bibliographic metadata.
///
/// Implementations should only handle requests and decoding; caching and
/// fuzzy lookup are layered on top by [`CachedProvider`](crate::metadata::CachedProvider).
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Passport of the provider.
    fn info(&self) -> ProviderInfo;

    /// Sets the logger used for progress messages.
    fn set_logger(&self, _logger: Logger) {}

    /// Looks up a record by its id on this provider.
    async fn search_by_id(&self, id: u64) -> Result<Option<Metadata>>;

    /// Free-text search, provider-ranked.
    async fn search(&self, query: &str) -> Result<Vec<Metadata>>;

    /// Sets the reading progress of the authenticated user.
    async fn set_manga_progress(&self, id: u64, chapter_number: u32) -> Result<()>;

    /// Returns `true` if a user is logged in.
    fn authenticated(&self) -> bool;

    /// The logged in user, if any.
    fn user(&self) -> Option<User>;

    /// Authenticates and returns the resulting auth data.
    async fn login(&self, option: &LoginOption) -> Result<AuthData>;

    /// De-authenticates the current user.
    async fn logout(&self) -> Result<()>;
}
