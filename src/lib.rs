// Library for tests to access modules

pub mod aggregation_worker;
pub mod config;
pub mod device_repo;
pub mod metrics;
pub mod models;
pub mod routes;
pub mod version;
pub mod worker;
