pub mod analytics;
pub mod config;
pub mod interceptor;
pub mod routes;
