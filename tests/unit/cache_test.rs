//! Cache store behavior against the in-process backend

use chrono::NaiveDate;
use flight_search::cache::{CacheKey, CacheStore, KeyValueStore, LocalStore};
use flight_search::config::{CacheConfig, WithDefaults};
use flight_search::provider::SearchQuery;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Quote {
    route: String,
    total: String,
}

fn query(origin: &str, destination: &str, day: u32) -> SearchQuery {
    SearchQuery {
        origin: origin.to_string(),
        destination: destination.to_string(),
        departure_date: NaiveDate::from_ymd_opt(2030, 5, day).unwrap(),
        return_date: None,
        adults: 1,
        max_results: 10,
    }
}

fn store() -> (Arc<LocalStore>, CacheStore) {
    let backend = Arc::new(LocalStore::new());
    let cache = CacheStore::new(backend.clone(), &CacheConfig::with_defaults());
    (backend, cache)
}

#[test]
fn test_search_key_layout() {
    let mut query = query("jfk", "lax", 1);
    assert_eq!(
        CacheKey::flight_search(&query),
        "search:flights:JFK:LAX:2030-05-01:oneway:1:10"
    );

    query.return_date = NaiveDate::from_ymd_opt(2030, 5, 8);
    assert_eq!(
        CacheKey::flight_search(&query),
        "search:flights:JFK:LAX:2030-05-01:2030-05-08:1:10"
    );
    assert_eq!(CacheKey::flight_search_origin_pattern("jfk"), "search:flights:JFK:*");
    assert_eq!(CacheKey::credential("amadeus"), "credentials:amadeus:access_token");
}

#[tokio::test]
async fn test_origin_invalidation_leaves_other_origins() {
    let (backend, cache) = store();

    for day in 1..=3 {
        let key = CacheKey::flight_search(&query("JFK", "LAX", day));
        cache.set(&key, &vec!["offer"], 600).await;
    }
    let lax_key = CacheKey::flight_search(&query("LAX", "JFK", 1));
    cache.set(&lax_key, &vec!["offer"], 600).await;
    cache.set(&CacheKey::credential("amadeus"), "token", 600).await;

    let deleted = cache
        .delete_by_pattern(&CacheKey::flight_search_origin_pattern("JFK"))
        .await;

    assert_eq!(deleted, 3);
    assert_eq!(backend.len(), 2);
    assert!(cache.get::<Vec<String>>(&lax_key).await.is_some());
    assert_eq!(
        cache.get::<String>(&CacheKey::credential("amadeus")).await,
        Some("token".to_string())
    );
}

#[tokio::test]
async fn test_pattern_without_matches_deletes_nothing() {
    let (_, cache) = store();
    cache.set("search:flights:LAX:JFK:x", &1u32, 600).await;

    assert_eq!(cache.delete_by_pattern("search:flights:SFO:*").await, 0);
}

#[tokio::test]
async fn test_wrap_serves_cached_value() {
    let (_, cache) = store();
    let quote = Quote {
        route: "JFK-LAX".to_string(),
        total: "199.00".to_string(),
    };

    let produced = quote.clone();
    let first: Result<Quote, anyhow::Error> =
        cache.wrap("quote:1", 600, move || async move { Ok(produced) }).await;
    assert_eq!(first.unwrap(), quote);

    // Write-back happens off the request path
    tokio::time::sleep(Duration::from_millis(50)).await;

    let second: Result<Quote, anyhow::Error> = cache
        .wrap("quote:1", 600, || async { Err(anyhow::anyhow!("producer must not run")) })
        .await;
    assert_eq!(second.unwrap(), quote);
}

#[tokio::test]
async fn test_expired_entries_are_misses() {
    let (backend, cache) = store();
    backend.set_ex("short", "\"lived\"", 1).await.unwrap();

    assert_eq!(cache.get::<String>("short").await, Some("lived".to_string()));
    tokio::time::sleep(Duration::from_millis(1_100)).await;
    assert_eq!(cache.get::<String>("short").await, None);
}

#[tokio::test]
async fn test_stats_track_hits_and_misses() {
    let (_, cache) = store();
    cache.set("present", &42u32, 600).await;

    assert_eq!(cache.get::<u32>("present").await, Some(42));
    assert_eq!(cache.get::<u32>("present").await, Some(42));
    assert_eq!(cache.get::<u32>("absent").await, None);

    let stats = cache.stats();
    assert_eq!(stats.hits, 2);
    assert_eq!(stats.misses, 1);
    assert!((stats.hit_rate - 2.0 / 3.0).abs() < f64::EPSILON);
}
