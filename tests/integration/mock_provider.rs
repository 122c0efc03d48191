//! Scripted stand-in for the upstream flight API

use actix_web::web::{self, Data, Form};
use actix_web::{App, HttpRequest, HttpResponse, HttpServer};
use flight_search::config::{AppConfig, WithDefaults};
use serde::Deserialize;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// What the search endpoint does for one request
#[derive(Debug, Clone)]
pub enum Reply {
    /// 200 with this many offers
    Offers(usize),
    /// The given status with a provider error body
    Status(u16),
    /// Wait, then answer with two offers
    Slow(Duration),
}

#[derive(Debug, Default)]
pub struct MockState {
    replies: Mutex<VecDeque<Reply>>,
    token_statuses: Mutex<VecDeque<u16>>,
    token_calls: AtomicU32,
    search_calls: AtomicU32,
    authorizations: Mutex<Vec<String>>,
}

impl MockState {
    pub fn token_calls(&self) -> u32 {
        self.token_calls.load(Ordering::SeqCst)
    }

    pub fn search_calls(&self) -> u32 {
        self.search_calls.load(Ordering::SeqCst)
    }

    /// Authorization headers seen by the search endpoint, in order
    pub fn authorizations(&self) -> Vec<String> {
        self.authorizations.lock().unwrap().clone()
    }
}

#[derive(Debug, Deserialize)]
struct TokenForm {
    grant_type: String,
    client_id: String,
}

fn offers(count: usize) -> serde_json::Value {
    let data: Vec<serde_json::Value> = (1..=count)
        .map(|id| {
            json!({
                "id": id.to_string(),
                "price": { "total": format!("{}.00", 100 + id), "currency": "EUR" },
                "itineraries": [{ "duration": "PT6H10M" }]
            })
        })
        .collect();

    json!({ "meta": { "count": count }, "data": data })
}

async fn token(state: Data<MockState>, form: Form<TokenForm>) -> HttpResponse {
    let call = state.token_calls.fetch_add(1, Ordering::SeqCst) + 1;

    if form.grant_type != "client_credentials" || form.client_id.is_empty() {
        return HttpResponse::BadRequest().json(json!({
            "error": "invalid_request",
            "error_description": "client credentials are required"
        }));
    }

    let scripted = state.token_statuses.lock().unwrap().pop_front();
    if let Some(status) = scripted {
        let status = actix_web::http::StatusCode::from_u16(status).unwrap();
        return HttpResponse::build(status).json(json!({
            "error": "server_error",
            "error_description": "scripted token failure"
        }));
    }

    HttpResponse::Ok().json(json!({
        "type": "amadeusOAuth2Token",
        "access_token": format!("token-{}", call),
        "token_type": "Bearer",
        "expires_in": 1799
    }))
}

async fn search(state: Data<MockState>, req: HttpRequest) -> HttpResponse {
    state.search_calls.fetch_add(1, Ordering::SeqCst);

    let authorization = req
        .headers()
        .get("Authorization")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    state.authorizations.lock().unwrap().push(authorization);

    let reply = state
        .replies
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or(Reply::Offers(2));

    match reply {
        Reply::Offers(count) => HttpResponse::Ok().json(offers(count)),
        Reply::Status(status) => {
            let status = actix_web::http::StatusCode::from_u16(status).unwrap();
            HttpResponse::build(status).json(json!({
                "errors": [{
                    "status": status.as_u16(),
                    "title": "MOCK ERROR",
                    "detail": "scripted failure"
                }]
            }))
        }
        Reply::Slow(delay) => {
            tokio::time::sleep(delay).await;
            HttpResponse::Ok().json(offers(2))
        }
    }
}

/// A running mock provider
pub struct MockProvider {
    pub base_url: String,
    pub state: Data<MockState>,
}

impl MockProvider {
    pub async fn start(replies: Vec<Reply>) -> Self {
        Self::start_with_tokens(replies, Vec::new()).await
    }

    /// Start with scripted search replies and token endpoint failure statuses.
    /// Once a script runs out the endpoint succeeds.
    pub async fn start_with_tokens(replies: Vec<Reply>, token_statuses: Vec<u16>) -> Self {
        let state = Data::new(MockState {
            replies: Mutex::new(replies.into()),
            token_statuses: Mutex::new(token_statuses.into()),
            ..MockState::default()
        });

        let app_state = state.clone();
        let server = HttpServer::new(move || {
            App::new()
                .app_data(app_state.clone())
                .route("/v1/security/oauth2/token", web::post().to(token))
                .route("/v2/shopping/flight-offers", web::get().to(search))
        })
        .workers(1)
        .disable_signals()
        .bind(("127.0.0.1", 0))
        .expect("Failed to bind mock provider");

        let address = server.addrs()[0];
        actix_web::rt::spawn(server.run());

        Self {
            base_url: format!("http://{}", address),
            state,
        }
    }

    /// Service configuration pointing at this provider, with short retry delays
    pub fn config(&self) -> AppConfig {
        let mut config = AppConfig::with_defaults();
        config.provider.base_url = self.base_url.clone();
        config.provider.client_id = "test-client".to_string();
        config.provider.client_secret = "test-secret".to_string();
        config.resilience.timeout.duration_ms = 2_000;
        config.resilience.retry.base_delay_ms = 10;
        config.resilience.retry.max_delay_ms = 20;
        config
    }
}
