pub mod search;

pub use search::{FlightSearchService, SearchError};
