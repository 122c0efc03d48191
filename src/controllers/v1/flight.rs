use actix_web::web::{Data, Json, Query};
use actix_web::{Responder, get};

use crate::requests::v1::flight::FlightSearchRequest;
use crate::responses::v1::error::ErrorResponse;
use crate::responses::v1::flight::FlightSearchResponse;
use crate::services::{FlightSearchService, SearchError};

/// Search flight offers
///
/// Served from cache when the same search ran recently. Fail if:
/// - a location code, date or count is invalid
/// - the provider fails, times out, or its circuit is open
#[utoipa::path(
    tag = "Flights",
    params(FlightSearchRequest),
    responses(
        (status = 200, description = "Matching offers", body = FlightSearchResponse),
        (status = 400, description = "Invalid search parameters", body = ErrorResponse),
        (status = 502, description = "Provider returned an error", body = ErrorResponse),
        (status = 503, description = "Provider circuit is open", body = ErrorResponse),
        (status = 504, description = "Provider timed out", body = ErrorResponse),
    )
)]
#[get("/v1/flights/search")]
pub async fn search(
    service: Data<FlightSearchService>,
    Query(request): Query<FlightSearchRequest>,
) -> Result<impl Responder, SearchError> {
    let query = request.into_query()?;
    let offers = service.search(&query).await?;

    Ok(Json(FlightSearchResponse::new(service.provider_name(), offers)))
}
