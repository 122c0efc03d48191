use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::cache::CacheStats;

#[derive(Clone, Debug, Deserialize, Serialize, ToSchema, PartialEq, Eq)]
pub struct CacheInvalidationResponse {
    #[schema(example = "JFK")]
    pub origin: String,
    /// Number of cached searches removed
    #[schema(example = 12)]
    pub deleted: u64,
}

#[derive(Clone, Debug, Deserialize, Serialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatsResponse {
    pub hits: u64,
    pub misses: u64,
    /// Fraction of reads served from cache, 0.0 to 1.0
    #[schema(example = 0.75)]
    pub hit_rate: f64,
}

impl From<CacheStats> for CacheStatsResponse {
    fn from(stats: CacheStats) -> Self {
        Self {
            hits: stats.hits,
            misses: stats.misses,
            hit_rate: stats.hit_rate,
        }
    }
}
