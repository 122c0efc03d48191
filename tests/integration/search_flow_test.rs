//! End-to-end search flow over the HTTP API

use actix_web::http::StatusCode;
use actix_web::test::{TestRequest, call_service, init_service, read_body_json};
use actix_web::App;
use chrono::{Duration, Utc};
use flight_search::AppState;
use flight_search::responses::v1::cache::{CacheInvalidationResponse, CacheStatsResponse};
use flight_search::responses::v1::error::ErrorResponse;
use flight_search::responses::v1::flight::FlightSearchResponse;
use std::time::Duration as StdDuration;

use super::mock_provider::{MockProvider, Reply};

fn search_uri(origin: &str, days_ahead: i64) -> String {
    let departure = Utc::now().date_naive() + Duration::days(days_ahead);
    format!(
        "/v1/flights/search?origin={}&destination=LAX&departureDate={}&adults=1&max=5",
        origin,
        departure.format("%Y-%m-%d")
    )
}

/// Let the cache write-back task land
async fn settle() {
    tokio::time::sleep(StdDuration::from_millis(50)).await;
}

#[actix_web::test]
async fn test_repeated_search_is_served_from_cache() {
    let mock = MockProvider::start(vec![Reply::Offers(2)]).await;
    let state = AppState::build(mock.config()).await.unwrap();
    let service = init_service(App::new().configure(|app| state.configure(app))).await;

    let req = TestRequest::get().uri(&search_uri("JFK", 20)).to_request();
    let resp = call_service(&service, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let first: FlightSearchResponse = read_body_json(resp).await;
    assert_eq!(first.meta.count, 2);
    assert_eq!(first.meta.provider, "amadeus");

    settle().await;

    let req = TestRequest::get().uri(&search_uri("jfk", 20)).to_request();
    let resp = call_service(&service, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let second: FlightSearchResponse = read_body_json(resp).await;
    assert_eq!(second, first);

    assert_eq!(mock.state.search_calls(), 1);
    assert_eq!(mock.state.token_calls(), 1);

    let req = TestRequest::get().uri("/v1/cache/stats").to_request();
    let stats: CacheStatsResponse = read_body_json(call_service(&service, req).await).await;
    assert_eq!(stats.hits, 1);
    assert!(stats.misses >= 1);
}

#[actix_web::test]
async fn test_invalidation_forces_fresh_search() {
    let mock = MockProvider::start(vec![Reply::Offers(2), Reply::Offers(3)]).await;
    let state = AppState::build(mock.config()).await.unwrap();
    let service = init_service(App::new().configure(|app| state.configure(app))).await;

    let req = TestRequest::get().uri(&search_uri("JFK", 20)).to_request();
    assert_eq!(call_service(&service, req).await.status(), StatusCode::OK);
    settle().await;

    let req = TestRequest::delete().uri("/v1/cache/flights/jfk").to_request();
    let resp = call_service(&service, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: CacheInvalidationResponse = read_body_json(resp).await;
    assert_eq!(body.origin, "JFK");
    assert_eq!(body.deleted, 1);

    let req = TestRequest::get().uri(&search_uri("JFK", 20)).to_request();
    let resp = call_service(&service, req).await;
    let body: FlightSearchResponse = read_body_json(resp).await;
    assert_eq!(body.meta.count, 3);
    assert_eq!(mock.state.search_calls(), 2);
}

#[actix_web::test]
async fn test_invalid_origin_for_invalidation() {
    let mock = MockProvider::start(vec![]).await;
    let state = AppState::build(mock.config()).await.unwrap();
    let service = init_service(App::new().configure(|app| state.configure(app))).await;

    let req = TestRequest::delete().uri("/v1/cache/flights/JFKX").to_request();
    let resp = call_service(&service, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_invalid_parameters_never_reach_provider() {
    let mock = MockProvider::start(vec![]).await;
    let state = AppState::build(mock.config()).await.unwrap();
    let service = init_service(App::new().configure(|app| state.configure(app))).await;

    let uris = [
        search_uri("J1K", 20),
        search_uri("JFK", -1),
        "/v1/flights/search?origin=JFK&destination=LAX".to_string(),
        "/v1/flights/search?origin=JFK&destination=LAX&departureDate=tomorrow".to_string(),
    ];

    for uri in uris {
        let req = TestRequest::get().uri(&uri).to_request();
        let resp = call_service(&service, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{uri}");
        let body: ErrorResponse = read_body_json(resp).await;
        assert_eq!(body.error, "validation_error");
    }

    assert_eq!(mock.state.search_calls(), 0);
    assert_eq!(mock.state.token_calls(), 0);
}

#[actix_web::test]
async fn test_provider_error_maps_to_bad_gateway() {
    let mock = MockProvider::start(vec![Reply::Status(400)]).await;
    let state = AppState::build(mock.config()).await.unwrap();
    let service = init_service(App::new().configure(|app| state.configure(app))).await;

    let req = TestRequest::get().uri(&search_uri("JFK", 3)).to_request();
    let resp = call_service(&service, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

    let body: ErrorResponse = read_body_json(resp).await;
    assert_eq!(body.error, "provider_error");
    assert_eq!(body.detail.as_deref(), Some("scripted failure"));
}

#[actix_web::test]
async fn test_open_circuit_maps_to_service_unavailable() {
    let mock = MockProvider::start(vec![Reply::Status(500), Reply::Status(500)]).await;
    let mut config = mock.config();
    config.resilience.retry.enabled = false;
    config.resilience.circuit_breaker.failure_threshold = 2;
    let state = AppState::build(config).await.unwrap();
    let service = init_service(App::new().configure(|app| state.configure(app))).await;

    for _ in 0..2 {
        let req = TestRequest::get().uri(&search_uri("JFK", 3)).to_request();
        assert_eq!(call_service(&service, req).await.status(), StatusCode::BAD_GATEWAY);
    }

    let req = TestRequest::get().uri(&search_uri("JFK", 3)).to_request();
    let resp = call_service(&service, req).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: ErrorResponse = read_body_json(resp).await;
    assert_eq!(body.error, "provider_unavailable");
    assert_eq!(mock.state.search_calls(), 2);

    let req = TestRequest::get().uri("/ready").to_request();
    assert_eq!(call_service(&service, req).await.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[actix_web::test]
async fn test_slow_provider_maps_to_gateway_timeout() {
    let mock = MockProvider::start(vec![Reply::Slow(StdDuration::from_millis(800))]).await;
    let mut config = mock.config();
    config.resilience.retry.enabled = false;
    config.resilience.timeout.duration_ms = 200;
    let state = AppState::build(config).await.unwrap();
    let service = init_service(App::new().configure(|app| state.configure(app))).await;

    let req = TestRequest::get().uri(&search_uri("JFK", 3)).to_request();
    let resp = call_service(&service, req).await;
    assert_eq!(resp.status(), StatusCode::GATEWAY_TIMEOUT);

    let body: ErrorResponse = read_body_json(resp).await;
    assert_eq!(body.error, "provider_timeout");
}
