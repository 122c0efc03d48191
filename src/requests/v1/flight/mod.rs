use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::cache::ttl::parse_date;
use crate::provider::SearchQuery;
use crate::services::SearchError;

/// Three-letter IATA location code
static IATA_CODE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z]{3}$").unwrap());

pub const MAX_ADULTS: u8 = 9;
pub const MAX_RESULTS: u32 = 250;

fn default_adults() -> u8 {
    1
}

fn default_max() -> u32 {
    10
}

/// Whether `code` looks like an IATA airport or city code
pub fn is_iata_code(code: &str) -> bool {
    IATA_CODE_REGEX.is_match(code)
}

#[derive(Clone, Debug, Deserialize, Serialize, ToSchema, IntoParams, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct FlightSearchRequest {
    /// IATA code of the departure airport
    #[param(example = "JFK")]
    #[schema(example = "JFK")]
    pub origin: String,
    /// IATA code of the arrival airport
    #[param(example = "LAX")]
    #[schema(example = "LAX")]
    pub destination: String,
    /// Departure date, YYYY-MM-DD
    #[param(example = "2026-11-02")]
    #[schema(example = "2026-11-02")]
    pub departure_date: String,
    /// Return date, YYYY-MM-DD; omit for one-way
    #[param(example = "2026-11-09")]
    #[schema(example = "2026-11-09")]
    pub return_date: Option<String>,
    /// Number of adult travellers, 1 to 9
    #[serde(default = "default_adults")]
    #[param(minimum = 1, maximum = 9)]
    pub adults: u8,
    /// Maximum number of offers, 1 to 250
    #[serde(default = "default_max")]
    #[param(minimum = 1, maximum = 250)]
    pub max: u32,
}

impl FlightSearchRequest {
    /// Validate and normalize into a [`SearchQuery`]
    pub fn into_query(self) -> Result<SearchQuery, SearchError> {
        for (field, code) in [("origin", &self.origin), ("destination", &self.destination)] {
            if !is_iata_code(code) {
                return Err(SearchError::Validation(format!(
                    "{} must be a 3-letter IATA code, got '{}'",
                    field, code
                )));
            }
        }

        let origin = self.origin.to_uppercase();
        let destination = self.destination.to_uppercase();
        if origin == destination {
            return Err(SearchError::Validation(
                "origin and destination must differ".to_string(),
            ));
        }

        if !(1..=MAX_ADULTS).contains(&self.adults) {
            return Err(SearchError::Validation(format!(
                "adults must be between 1 and {}",
                MAX_ADULTS
            )));
        }
        if !(1..=MAX_RESULTS).contains(&self.max) {
            return Err(SearchError::Validation(format!(
                "max must be between 1 and {}",
                MAX_RESULTS
            )));
        }

        let departure_date = parse_date("departure date", &self.departure_date)?;
        let return_date = self
            .return_date
            .as_deref()
            .filter(|value| !value.is_empty())
            .map(|value| parse_date("return date", value))
            .transpose()?;

        Ok(SearchQuery {
            origin,
            destination,
            departure_date,
            return_date,
            adults: self.adults,
            max_results: self.max,
        })
    }
}
