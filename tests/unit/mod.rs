pub mod cache_test;
pub mod resilience_test;
pub mod ttl_test;
