//! HTTP provider client against the scripted provider

use chrono::{Duration, NaiveDate, Utc};
use flight_search::cache::{CacheStore, LocalStore};
use flight_search::config::AppConfig;
use flight_search::provider::{
    self, CredentialManager, FlightProvider, HttpCredentialFetcher, HttpFlightProvider,
    SEARCH_OPERATION, SearchQuery, TOKEN_OPERATION,
};
use flight_search::resilience::{CircuitState, ResilienceExecutor};
use flight_search::services::SearchError;
use std::sync::Arc;

use super::mock_provider::{MockProvider, Reply};

fn query() -> SearchQuery {
    SearchQuery {
        origin: "JFK".to_string(),
        destination: "LAX".to_string(),
        departure_date: departure(),
        return_date: None,
        adults: 1,
        max_results: 5,
    }
}

fn departure() -> NaiveDate {
    Utc::now().date_naive() + Duration::days(30)
}

fn client(config: &AppConfig) -> (HttpFlightProvider, Arc<ResilienceExecutor>) {
    let cache = CacheStore::new(Arc::new(LocalStore::new()), &config.cache);
    let executor = Arc::new(ResilienceExecutor::new(config.resilience.clone()));
    let http = provider::http_client().unwrap();
    let fetcher = Arc::new(HttpCredentialFetcher::new(http.clone(), &config.provider));
    let credentials = Arc::new(CredentialManager::new(
        &config.provider,
        &config.cache,
        cache,
        Arc::clone(&executor),
        fetcher,
    ));

    let client = HttpFlightProvider::new(http, &config.provider, credentials, Arc::clone(&executor));
    (client, executor)
}

#[actix_web::test]
async fn test_search_reuses_cached_token() {
    let mock = MockProvider::start(vec![Reply::Offers(3), Reply::Offers(1)]).await;
    let (client, _) = client(&mock.config());

    let first = client.search(&query()).await.unwrap();
    assert_eq!(first.len(), 3);
    assert_eq!(first[0].price.currency, "EUR");
    assert_eq!(first[0].itineraries.len(), 1);

    let second = client.search(&query()).await.unwrap();
    assert_eq!(second.len(), 1);

    assert_eq!(mock.state.token_calls(), 1);
    assert_eq!(mock.state.search_calls(), 2);
    assert_eq!(
        mock.state.authorizations(),
        vec!["Bearer token-1".to_string(), "Bearer token-1".to_string()]
    );
}

#[actix_web::test]
async fn test_unauthorized_refreshes_token_once() {
    let mock = MockProvider::start(vec![Reply::Status(401), Reply::Offers(2)]).await;
    let (client, _) = client(&mock.config());

    let offers = client.search(&query()).await.unwrap();

    assert_eq!(offers.len(), 2);
    assert_eq!(mock.state.token_calls(), 2);
    assert_eq!(mock.state.search_calls(), 2);
    assert_eq!(
        mock.state.authorizations(),
        vec!["Bearer token-1".to_string(), "Bearer token-2".to_string()]
    );
}

#[actix_web::test]
async fn test_second_unauthorized_is_returned() {
    let mock = MockProvider::start(vec![Reply::Status(401), Reply::Status(401)]).await;
    let (client, _) = client(&mock.config());

    let err = SearchError::from_provider(client.search(&query()).await.unwrap_err());

    assert!(matches!(err, SearchError::Upstream { status: Some(401), .. }));
    assert_eq!(mock.state.token_calls(), 2);
    assert_eq!(mock.state.search_calls(), 2);
}

#[actix_web::test]
async fn test_bad_request_is_attempted_once() {
    let mock = MockProvider::start(vec![Reply::Status(400)]).await;
    let (client, _) = client(&mock.config());

    let err = SearchError::from_provider(client.search(&query()).await.unwrap_err());

    match err {
        SearchError::Upstream { status, message, detail } => {
            assert_eq!(status, Some(400));
            assert_eq!(message, "MOCK ERROR");
            assert_eq!(detail.as_deref(), Some("scripted failure"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(mock.state.search_calls(), 1);
}

#[actix_web::test]
async fn test_server_errors_are_retried_until_exhausted() {
    let mock = MockProvider::start(vec![
        Reply::Status(503),
        Reply::Status(503),
        Reply::Status(503),
    ])
    .await;
    let (client, _) = client(&mock.config());

    let err = SearchError::from_provider(client.search(&query()).await.unwrap_err());

    assert!(matches!(err, SearchError::Upstream { status: Some(503), .. }));
    assert_eq!(mock.state.search_calls(), 3);
    assert_eq!(mock.state.token_calls(), 1);
}

#[actix_web::test]
async fn test_transient_failure_recovers() {
    let mock = MockProvider::start(vec![Reply::Status(500), Reply::Status(429), Reply::Offers(4)]).await;
    let (client, executor) = client(&mock.config());

    let offers = client.search(&query()).await.unwrap();

    assert_eq!(offers.len(), 4);
    assert_eq!(mock.state.search_calls(), 3);
    assert_eq!(executor.circuit_state(SEARCH_OPERATION), Some(CircuitState::Closed));
}

#[actix_web::test]
async fn test_token_failure_is_retried_but_search_is_not() {
    let mock = MockProvider::start_with_tokens(vec![], vec![500, 500, 500]).await;
    let (client, executor) = client(&mock.config());

    let err = SearchError::from_provider(client.search(&query()).await.unwrap_err());

    assert!(matches!(err, SearchError::Upstream { status: Some(500), .. }));
    assert_eq!(mock.state.token_calls(), 3);
    assert_eq!(mock.state.search_calls(), 0);
    assert!(executor.circuit_state(TOKEN_OPERATION).is_some());
}

#[actix_web::test]
async fn test_open_circuit_skips_provider() {
    let mock = MockProvider::start(vec![Reply::Status(500), Reply::Status(500)]).await;
    let mut config = mock.config();
    config.resilience.retry.enabled = false;
    config.resilience.circuit_breaker.failure_threshold = 2;
    let (client, executor) = client(&config);

    for _ in 0..2 {
        assert!(client.search(&query()).await.is_err());
    }
    assert_eq!(executor.circuit_state(SEARCH_OPERATION), Some(CircuitState::Open));

    let err = SearchError::from_provider(client.search(&query()).await.unwrap_err());
    assert!(matches!(err, SearchError::Unavailable { .. }));
    assert_eq!(mock.state.search_calls(), 2);
}
