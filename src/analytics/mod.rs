//! Feed analytics module
//!
//! Builds pseudonymized data points for tracked feed fetches and hands them
//! to a write-only sink in the background. Nothing here may affect the
//! response served to the client.

pub mod geoip;
pub mod ip_extractor;
pub mod models;
pub mod sink;
pub mod tasks;
pub mod visitor;

// Re-export commonly used types
pub use geoip::GeoIpService;
pub use ip_extractor::{extract_client_ip, extract_visitor_metadata};
pub use models::{AnalyticsRecord, VisitorMetadata};
pub use sink::{AnalyticsSink, HttpSink, SinkError, SinkResult};
pub use tasks::BackgroundTasks;
pub use visitor::{truncate_user_agent, visitor_key};
