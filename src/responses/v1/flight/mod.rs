use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::provider::FlightOffer;

#[derive(Clone, Debug, Deserialize, Serialize, ToSchema, PartialEq)]
pub struct FlightSearchResponse {
    pub data: Vec<FlightOffer>,
    pub meta: FlightSearchMeta,
}

#[derive(Clone, Debug, Deserialize, Serialize, ToSchema, PartialEq, Eq)]
pub struct FlightSearchMeta {
    /// Number of offers returned
    #[schema(example = 10)]
    pub count: usize,
    #[schema(example = "amadeus")]
    pub provider: String,
}

impl FlightSearchResponse {
    pub fn new(provider: &str, data: Vec<FlightOffer>) -> Self {
        Self {
            meta: FlightSearchMeta {
                count: data.len(),
                provider: provider.to_string(),
            },
            data,
        }
    }
}
