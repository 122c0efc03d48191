use utoipa::OpenApi;

use crate::{controllers, provider, requests, responses};

#[derive(OpenApi)]
#[openapi(
    info(title = "Flight Search", description = "Cached flight offer search"),
    tags(
        (name = "Flights"),
        (name = "Cache"),
        (name = "Health"),
    ),
    paths(
        controllers::v1::flight::search,

        controllers::v1::cache::invalidate,
        controllers::v1::cache::stats,

        controllers::health::health,
        controllers::health::ready,
    ),
    components(schemas(
        requests::v1::flight::FlightSearchRequest,

        provider::FlightOffer,
        provider::OfferPrice,

        responses::v1::flight::FlightSearchResponse,
        responses::v1::flight::FlightSearchMeta,
        responses::v1::cache::CacheInvalidationResponse,
        responses::v1::cache::CacheStatsResponse,
        responses::v1::error::ErrorResponse,

        controllers::health::LivenessResponse,
        controllers::health::ReadinessResponse,
        controllers::health::CircuitStatus,
    )),
)]
pub struct Definition;
