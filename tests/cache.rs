//! Cached metadata provider tests
//!
//! Memoization, closest-title search, title binding and cached logins, all
//! against the call-counting provider.

use kanko::error::{Error, Result};
use kanko::metadata::cache::{BUCKET_NAME_TO_ACCESS_DATA, BUCKET_NAME_TO_USER};
use kanko::metadata::{
    AuthData, CacheStore, CachedProvider, CodeGrant, Id, LoginOption, MemoryStore, Metadata,
    MetadataProvider,
};
use std::sync::Arc;

mod common;
use common::{CountingProvider, berserk_metadata, cached};

fn monster() -> Metadata {
    Metadata {
        english_title: "Monster".to_string(),
        id: Id::anilist(30001),
        ..berserk_metadata()
    }
}

fn grant() -> LoginOption {
    LoginOption::CodeGrant(CodeGrant {
        client_id: "kanko".to_string(),
        code: "abc".to_string(),
        ..Default::default()
    })
}

/// Store whose every operation fails.
struct BrokenStore;

impl CacheStore for BrokenStore {
    fn get(&self, _bucket: &str, _key: &str) -> Result<Option<Vec<u8>>> {
        Err(Error::Other("disk on fire".to_string()))
    }

    fn set(&self, _bucket: &str, _key: &str, _value: &[u8]) -> Result<()> {
        Err(Error::Other("disk on fire".to_string()))
    }

    fn delete(&self, _bucket: &str, _key: &str) -> Result<()> {
        Err(Error::Other("disk on fire".to_string()))
    }
}

#[cfg(test)]
mod cache_tests {
    use super::*;

    #[tokio::test]
    async fn test_search_is_served_from_cache() {
        let provider = Arc::new(
            CountingProvider::anilist()
                .with_record(berserk_metadata())
                .with_record(monster())
                .with_query("seinen", &[30002, 30001]),
        );
        let cached = cached(provider.clone());

        let first = cached.search("seinen").await.unwrap();
        let second = cached.search("seinen").await.unwrap();

        let ids = |metas: &[Metadata]| metas.iter().map(|m| m.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&first), ids(&second));
        assert_eq!(ids(&first), vec![Id::anilist(30002), Id::anilist(30001)]);
        assert_eq!(provider.searches(), 1);
        assert_eq!(provider.id_searches(), 0);
    }

    #[tokio::test]
    async fn test_empty_search_results_are_cached() {
        let provider = Arc::new(CountingProvider::anilist());
        let cached = cached(provider.clone());

        assert!(cached.search("nothing").await.unwrap().is_empty());
        assert!(cached.search("nothing").await.unwrap().is_empty());
        assert_eq!(provider.searches(), 1);
    }

    #[tokio::test]
    async fn test_only_found_records_are_cached_by_id() {
        let provider = Arc::new(CountingProvider::anilist().with_record(berserk_metadata()));
        let cached = cached(provider.clone());

        assert!(cached.search_by_id(30002).await.unwrap().is_some());
        assert!(cached.search_by_id(30002).await.unwrap().is_some());
        assert_eq!(provider.id_searches(), 1);

        assert!(cached.search_by_id(1).await.unwrap().is_none());
        assert!(cached.search_by_id(1).await.unwrap().is_none());
        assert_eq!(provider.id_searches(), 3);
    }

    #[tokio::test]
    async fn test_find_closest_gives_up_after_tries() {
        let provider = Arc::new(CountingProvider::anilist());
        let cached = cached(provider.clone());

        let found = cached.find_closest("short", 3, 3).await.unwrap();
        assert!(found.is_none());
        assert_eq!(provider.searches(), 3);
    }

    #[tokio::test]
    async fn test_find_closest_stops_at_single_character() {
        let provider = Arc::new(CountingProvider::anilist());
        let cached = cached(provider.clone());

        assert!(cached.find_closest("ab", 10, 3).await.unwrap().is_none());
        assert_eq!(provider.searches(), 2);
    }

    #[tokio::test]
    async fn test_find_closest_trims_and_binds_title() {
        let provider = Arc::new(
            CountingProvider::anilist()
                .with_record(berserk_metadata())
                .with_query("Bers", &[30002]),
        );
        let cached = cached(provider.clone());

        let found = cached.find_closest("Berserk", 3, 3).await.unwrap().unwrap();
        assert_eq!(found.title(), "Berserk");
        assert_eq!(provider.searches(), 2);

        let again = cached.find_closest("Berserk", 3, 3).await.unwrap().unwrap();
        assert_eq!(again, found);
        assert_eq!(provider.searches(), 2);
    }

    #[tokio::test]
    async fn test_find_closest_accepts_first_ranked_result() {
        let provider = Arc::new(
            CountingProvider::anilist()
                .with_record(berserk_metadata())
                .with_record(monster())
                .with_query("Naoki Urasawa", &[30001, 30002]),
        );
        let cached = cached(provider);

        let found = cached.find_closest("Naoki Urasawa", 3, 3).await.unwrap().unwrap();
        assert_eq!(found.id, Id::anilist(30001));
    }

    #[tokio::test]
    async fn test_bound_title_skips_search() {
        let provider = Arc::new(CountingProvider::anilist().with_record(berserk_metadata()));
        let cached = cached(provider.clone());

        cached.search_by_id(30002).await.unwrap();
        cached.bind_title_with_id("Kenpuu Denki", 30002).unwrap();

        let found = cached.find_closest("Kenpuu Denki", 3, 3).await.unwrap();
        assert_eq!(found.map(|m| m.id), Some(Id::anilist(30002)));
        assert_eq!(provider.searches(), 0);
    }

    #[tokio::test]
    async fn test_bound_title_without_record_falls_back_to_search() {
        let provider = Arc::new(
            CountingProvider::anilist()
                .with_record(berserk_metadata())
                .with_query("Kenpuu Denki", &[30002]),
        );
        let cached = cached(provider.clone());

        cached.bind_title_with_id("Kenpuu Denki", 30002).unwrap();
        let found = cached.find_closest("Kenpuu Denki", 3, 3).await.unwrap();
        assert!(found.is_some());
        assert_eq!(provider.searches(), 1);
    }

    #[tokio::test]
    async fn test_cache_failures_are_cache_errors() {
        let provider = Arc::new(CountingProvider::anilist().with_record(berserk_metadata()));
        let cached = CachedProvider::new(provider.clone(), Arc::new(BrokenStore)).unwrap();

        let err = cached.search_by_id(30002).await.unwrap_err();
        assert!(err.is_cache(), "unexpected error: {err}");
        assert_eq!(provider.id_searches(), 0);
    }

    #[tokio::test]
    async fn test_login_caches_user_for_later_sessions() {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(CountingProvider::anilist());
        let cached = CachedProvider::new(provider.clone(), store.clone()).unwrap();

        let auth = cached.login(&grant()).await.unwrap();
        assert_eq!(auth.access_token, "token-abc");
        assert_eq!(store.len(&format!("anilist/{BUCKET_NAME_TO_USER}")), 1);

        cached.logout().await.unwrap();
        assert!(!cached.authenticated());

        let restored = CachedProvider::new(provider, store).unwrap();
        assert!(restored.login_with_cached_user("guts").await.unwrap());
        assert_eq!(restored.user().map(|u| u.name), Some("guts".to_string()));
    }

    #[tokio::test]
    async fn test_orphaned_token_is_deleted() {
        let store = Arc::new(MemoryStore::new());
        let bucket = format!("anilist/{BUCKET_NAME_TO_ACCESS_DATA}");
        let auth = AuthData {
            access_token: "stale".to_string(),
            ..Default::default()
        };
        store
            .set(&bucket, "guts", &serde_json::to_vec(&auth).unwrap())
            .unwrap();

        let cached = CachedProvider::new(Arc::new(CountingProvider::anilist()), store.clone())
            .unwrap();

        assert!(!cached.login_with_cached_user("guts").await.unwrap());
        assert_eq!(store.get(&bucket, "guts").unwrap(), None);
        assert!(!cached.authenticated());
    }

    #[tokio::test]
    async fn test_delete_cached_user() {
        let store = Arc::new(MemoryStore::new());
        let cached =
            CachedProvider::new(Arc::new(CountingProvider::anilist()), store.clone()).unwrap();

        cached.login(&grant()).await.unwrap();
        cached.delete_cached_user("guts").unwrap();

        assert!(store.is_empty());
        assert!(!cached.login_with_cached_user("guts").await.unwrap());
    }

    #[tokio::test]
    async fn test_invalid_login_is_an_auth_error() {
        let cached = cached(Arc::new(CountingProvider::anilist()));
        let option = LoginOption::CodeGrant(CodeGrant::default());

        assert!(matches!(cached.login(&option).await, Err(Error::Auth(_))));
    }
}
