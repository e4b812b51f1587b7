//! Data models for analytics

use serde::{Deserialize, Serialize};

use crate::analytics::visitor::{truncate_user_agent, visitor_key};

/// Request metadata that feeds a single data point.
///
/// Every field is an empty string when the request did not carry it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisitorMetadata {
    /// Connecting client IP as text
    pub ip: String,

    /// Raw `user-agent` header
    pub user_agent: String,

    /// Raw `referer` header
    pub referer: String,

    /// ISO country code (e.g., "US", "GB")
    pub country: String,
}

/// Analytics data point for a single feed fetch.
///
/// The field names are the collector's wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsRecord {
    /// Grouping keys: `[visitor_key]`
    pub indexes: Vec<String>,

    /// Payloads: `[path, referer, user_agent, country]`
    pub blobs: Vec<String>,

    /// Numeric payloads, currently always empty
    pub doubles: Vec<f64>,
}

impl AnalyticsRecord {
    /// Build the data point for a tracked path
    pub fn from_visit(path: &str, meta: &VisitorMetadata) -> Self {
        Self {
            indexes: vec![visitor_key(&meta.ip, &meta.user_agent)],
            blobs: vec![
                path.to_string(),
                meta.referer.clone(),
                truncate_user_agent(&meta.user_agent).to_string(),
                meta.country.clone(),
            ],
            doubles: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_visit_layout() {
        let meta = VisitorMetadata {
            ip: "1.2.3.4".to_string(),
            user_agent: "TestAgent/1.0".to_string(),
            referer: String::new(),
            country: "US".to_string(),
        };

        let record = AnalyticsRecord::from_visit("/ipo.ics", &meta);

        assert_eq!(record.indexes, vec![visitor_key("1.2.3.4", "TestAgent/1.0")]);
        assert_eq!(record.blobs, vec!["/ipo.ics", "", "TestAgent/1.0", "US"]);
        assert!(record.doubles.is_empty());
    }

    #[test]
    fn test_from_visit_hashes_full_user_agent() {
        let long_ua = "a".repeat(300);
        let meta = VisitorMetadata {
            ip: "10.0.0.1".to_string(),
            user_agent: long_ua.clone(),
            ..Default::default()
        };

        let record = AnalyticsRecord::from_visit("/all.ics", &meta);

        assert_eq!(record.blobs[2].len(), 128);
        assert_eq!(record.indexes[0], visitor_key("10.0.0.1", &long_ua));
    }

    #[test]
    fn test_wire_format() {
        let record = AnalyticsRecord {
            indexes: vec!["k".to_string()],
            blobs: vec!["/ipo.ics".to_string(), String::new()],
            doubles: vec![],
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "indexes": ["k"],
                "blobs": ["/ipo.ics", ""],
                "doubles": []
            })
        );
    }
}
