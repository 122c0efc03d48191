use actix_web::web::{Data, Json, Path};
use actix_web::{HttpResponse, Responder, delete, get};

use crate::requests::v1::flight::is_iata_code;
use crate::responses::v1::cache::{CacheInvalidationResponse, CacheStatsResponse};
use crate::responses::v1::error::ErrorResponse;
use crate::services::FlightSearchService;

/// Drop cached searches departing from an origin
#[utoipa::path(
    tag = "Cache",
    params(("origin" = String, Path, description = "IATA code of the departure airport", example = "JFK")),
    responses(
        (status = 200, description = "Cached searches removed", body = CacheInvalidationResponse),
        (status = 400, description = "Invalid origin", body = ErrorResponse),
    )
)]
#[delete("/v1/cache/flights/{origin}")]
pub async fn invalidate(service: Data<FlightSearchService>, origin: Path<String>) -> HttpResponse {
    let origin = origin.into_inner();
    if !is_iata_code(&origin) {
        return HttpResponse::BadRequest().json(ErrorResponse::new(
            "validation_error",
            format!("origin must be a 3-letter IATA code, got '{}'", origin),
        ));
    }

    let origin = origin.to_uppercase();
    let deleted = service.invalidate_origin(&origin).await;

    HttpResponse::Ok().json(CacheInvalidationResponse { origin, deleted })
}

/// Cache hit and miss counters since startup
#[utoipa::path(
    tag = "Cache",
    responses(
        (status = 200, description = "Cache statistics", body = CacheStatsResponse),
    )
)]
#[get("/v1/cache/stats")]
pub async fn stats(service: Data<FlightSearchService>) -> impl Responder {
    Json(CacheStatsResponse::from(service.cache_stats()))
}
