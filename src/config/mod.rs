use anyhow::Context;
use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Feeds tracked when `TRACKED_PATHS` is not set.
pub const DEFAULT_TRACKED_PATHS: [&str; 3] = ["/ipo.ics", "/earnings.ics", "/all.ics"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub feeds: FeedsConfig,
    pub tracked_paths: TrackedPaths,
    pub analytics: AnalyticsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedsConfig {
    /// Directory the calendar feeds are served from
    pub dir: String,
}

/// Immutable set of request paths that produce an analytics data point.
///
/// Matching is exact against the URI path component; query strings and
/// trailing slashes are not normalized.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrackedPaths(HashSet<String>);

impl TrackedPaths {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(paths.into_iter().map(Into::into).collect())
    }

    /// Parse a comma-separated list, ignoring blank entries.
    pub fn parse(list: &str) -> Self {
        Self::new(
            list.split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty()),
        )
    }

    pub fn contains(&self, path: &str) -> bool {
        self.0.contains(path)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for TrackedPaths {
    fn default() -> Self {
        Self::new(DEFAULT_TRACKED_PATHS)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TrustedProxyMode {
    /// Trust the platform-injected `cf-connecting-ip` header
    #[default]
    Cloudflare,
    /// Walk `Forwarded` / `X-Forwarded-For` with trusted-proxy validation
    Standard,
    /// Use the socket peer address only
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Collector endpoint; analytics is disabled when unset
    pub endpoint: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "AnalyticsConfig::default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "AnalyticsConfig::default_drain_timeout_secs")]
    pub drain_timeout_secs: u64,
    #[serde(default)]
    pub trusted_proxy_mode: TrustedProxyMode,
    #[serde(default)]
    pub trusted_proxies: Vec<IpNet>,
    #[serde(default)]
    pub num_trusted_proxies: Option<usize>,
    #[serde(default)]
    pub geoip_db_path: Option<String>,
}

impl AnalyticsConfig {
    const fn default_timeout_secs() -> u64 {
        5
    }

    const fn default_drain_timeout_secs() -> u64 {
        10
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            token: None,
            timeout_secs: Self::default_timeout_secs(),
            drain_timeout_secs: Self::default_drain_timeout_secs(),
            trusted_proxy_mode: TrustedProxyMode::default(),
            trusted_proxies: Vec::new(),
            num_trusted_proxies: None,
            geoip_db_path: None,
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "8787".to_string())
            .parse::<u16>()
            .context("PORT must be a valid port number")?;

        let feeds_dir = std::env::var("FEEDS_DIR").unwrap_or_else(|_| "./dist".to_string());

        let tracked_paths = match non_empty_var("TRACKED_PATHS") {
            Some(list) => TrackedPaths::parse(&list),
            None => TrackedPaths::default(),
        };

        let timeout_secs = std::env::var("ANALYTICS_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or_else(AnalyticsConfig::default_timeout_secs);
        let drain_timeout_secs = std::env::var("ANALYTICS_DRAIN_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or_else(AnalyticsConfig::default_drain_timeout_secs);

        let trusted_proxy_mode = match std::env::var("TRUSTED_PROXY_MODE")
            .unwrap_or_else(|_| "cloudflare".to_string())
            .to_lowercase()
            .as_str()
        {
            "cloudflare" => TrustedProxyMode::Cloudflare,
            "standard" => TrustedProxyMode::Standard,
            "none" => TrustedProxyMode::None,
            other => {
                tracing::warn!(
                    "Unknown TRUSTED_PROXY_MODE '{other}', falling back to 'cloudflare'. \
                     Supported values: cloudflare, standard, none"
                );
                TrustedProxyMode::Cloudflare
            }
        };

        let trusted_proxies = match non_empty_var("TRUSTED_PROXIES") {
            Some(list) => parse_cidrs(&list)?,
            None => Vec::new(),
        };

        let num_trusted_proxies = match non_empty_var("NUM_TRUSTED_PROXIES") {
            Some(v) => Some(
                v.parse::<usize>()
                    .context("NUM_TRUSTED_PROXIES must be a non-negative integer")?,
            ),
            None => None,
        };

        Ok(Config {
            server: ServerConfig { host, port },
            feeds: FeedsConfig { dir: feeds_dir },
            tracked_paths,
            analytics: AnalyticsConfig {
                endpoint: non_empty_var("ANALYTICS_ENDPOINT"),
                token: non_empty_var("ANALYTICS_TOKEN"),
                timeout_secs,
                drain_timeout_secs,
                trusted_proxy_mode,
                trusted_proxies,
                num_trusted_proxies,
                geoip_db_path: non_empty_var("GEOIP_DB_PATH"),
            },
        })
    }
}

/// Parse a comma-separated CIDR list. Bare addresses are accepted as host routes.
pub fn parse_cidrs(list: &str) -> anyhow::Result<Vec<IpNet>> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<IpNet>()
                .or_else(|_| s.parse::<std::net::IpAddr>().map(IpNet::from))
                .with_context(|| format!("invalid trusted proxy entry '{s}'"))
        })
        .collect()
}
