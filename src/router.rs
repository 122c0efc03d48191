use actix_web::error::InternalError;
use actix_web::web::{self, QueryConfig, ServiceConfig};
use actix_web::HttpResponse;
use utoipa::OpenApi;
use utoipa_swagger_ui::{SwaggerUi, Url};

use crate::api::Definition;
use crate::controllers;
use crate::responses::v1::error::ErrorResponse;

/// Register every endpoint.
///
/// Expects `FlightSearchService`, `ResilienceExecutor` and `AppMetrics` to be
/// provided as app data by the caller.
pub fn route(app: &mut ServiceConfig) {
    app.app_data(QueryConfig::default().error_handler(|err, _req| {
        let body = ErrorResponse::new("validation_error", err.to_string());
        InternalError::from_response(err, HttpResponse::BadRequest().json(body)).into()
    }));

    // Flights
    app.service(controllers::v1::flight::search);
    // Cache
    app.service(controllers::v1::cache::invalidate);
    app.service(controllers::v1::cache::stats);

    // Health check endpoints
    app.service(controllers::health::health);
    app.service(controllers::health::ready);

    // Metrics endpoint
    app.service(controllers::metrics::metrics);

    // must at the end!
    app.service(web::redirect("/docs", "/docs/"));
    app.service(SwaggerUi::new("/docs/{_:.*}").urls(vec![(
        Url::new("Flight Search", "/api.json"),
        Definition::openapi(),
    )]));
}
