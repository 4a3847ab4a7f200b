// Library for tests to access modules

pub mod cache;
pub mod collector;
pub mod config;
pub mod models;
pub mod protocol;
pub mod routes;
pub mod sampler;
pub mod transport;
pub mod version;
