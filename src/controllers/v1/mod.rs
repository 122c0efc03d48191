pub mod cache;
pub mod flight;
