//! Client metadata extraction from HTTP headers with trust validation
//!
//! This module implements client IP extraction that:
//! - Uses the platform-injected `CF-Connecting-IP` header in Cloudflare mode
//! - Validates trust chains for X-Forwarded-For and Forwarded headers
//! - Falls back to the socket remote address when headers are absent or untrusted
//!
//! It also pulls the `user-agent`, `referer` and country code for a data point.

use axum::http::{header, HeaderMap};
use std::net::IpAddr;
use tracing::debug;

use crate::analytics::geoip::GeoIpService;
use crate::analytics::models::VisitorMetadata;
use crate::config::{AnalyticsConfig, TrustedProxyMode};

/// Country header set by the edge platform
pub const COUNTRY_HEADER: &str = "cf-ipcountry";

/// Extract the client IP address from HTTP headers
///
/// # Arguments
/// * `headers` - HTTP request headers
/// * `socket_addr` - The socket remote address, when the listener provides one
/// * `config` - Analytics configuration with trust settings
///
/// # Returns
/// The client IP address, or `None` when nothing trustworthy is available
pub fn extract_client_ip(
    headers: &HeaderMap,
    socket_addr: Option<IpAddr>,
    config: &AnalyticsConfig,
) -> Option<IpAddr> {
    match config.trusted_proxy_mode {
        TrustedProxyMode::Cloudflare => extract_cloudflare_ip(headers).or_else(|| {
            debug!("CF-Connecting-IP header missing in Cloudflare mode, using socket address");
            socket_addr
        }),
        TrustedProxyMode::Standard => extract_standard_ip(headers, config).or(socket_addr),
        TrustedProxyMode::None => socket_addr,
    }
}

/// Extract IP from Cloudflare-specific header
fn extract_cloudflare_ip(headers: &HeaderMap) -> Option<IpAddr> {
    cloudflare_ip_text(headers).map(|(ip, _)| ip)
}

/// Cloudflare header as the parsed address plus its trimmed text as sent
fn cloudflare_ip_text(headers: &HeaderMap) -> Option<(IpAddr, &str)> {
    let text = headers.get("cf-connecting-ip")?.to_str().ok()?.trim();
    let ip = text.parse::<IpAddr>().ok()?;
    Some((ip, text))
}

/// Extract IP from standard headers (Forwarded, X-Forwarded-For) with trust validation
fn extract_standard_ip(headers: &HeaderMap, config: &AnalyticsConfig) -> Option<IpAddr> {
    // Prefer RFC 7239 Forwarded header
    let chain = forwarded_chain(headers);
    let chain = if chain.is_empty() {
        x_forwarded_for_chain(headers)
    } else {
        chain
    };

    select_from_chain(&chain, config)
}

/// Parse the `for=` parameters of an RFC 7239 Forwarded header, left to right
fn forwarded_chain(headers: &HeaderMap) -> Vec<IpAddr> {
    let Some(forwarded) = headers.get("forwarded").and_then(|h| h.to_str().ok()) else {
        return Vec::new();
    };

    // Forwarded: for=192.0.2.60;proto=http;by=203.0.113.43, for="[2001:db8::1]:4711"
    forwarded
        .split(',')
        .flat_map(|element| element.split(';'))
        .filter_map(|param| {
            let (key, value) = param.trim().split_once('=')?;
            if !key.eq_ignore_ascii_case("for") {
                return None;
            }
            parse_forwarded_node(value)
        })
        .collect()
}

fn parse_forwarded_node(value: &str) -> Option<IpAddr> {
    let value = value.trim().trim_matches('"');
    if let Some(rest) = value.strip_prefix('[') {
        // Bracketed IPv6, optionally followed by a port
        return rest.split(']').next()?.parse().ok();
    }
    if let Ok(ip) = value.parse::<IpAddr>() {
        return Some(ip);
    }
    // IPv4 with port
    value.rsplit_once(':')?.0.parse().ok()
}

fn x_forwarded_for_chain(headers: &HeaderMap) -> Vec<IpAddr> {
    headers
        .get_all("x-forwarded-for")
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|s| s.trim().parse::<IpAddr>().ok())
        .collect()
}

/// Pick the client hop from a left-to-right proxy chain, walking right-to-left
fn select_from_chain(ips: &[IpAddr], config: &AnalyticsConfig) -> Option<IpAddr> {
    if ips.is_empty() {
        return None;
    }

    // If num_trusted_proxies is specified, skip that many from the right
    if let Some(num_trusted) = config.num_trusted_proxies {
        if ips.len() > num_trusted {
            return Some(ips[ips.len() - num_trusted - 1]);
        }
        // Not enough IPs in chain, return the leftmost (least trusted)
        return ips.first().copied();
    }

    // Skip hops inside trusted CIDRs; the first untrusted hop is the client
    if !config.trusted_proxies.is_empty() {
        return ips
            .iter()
            .rev()
            .find(|ip| !config.trusted_proxies.iter().any(|net| net.contains(*ip)))
            .or_else(|| ips.first())
            .copied();
    }

    // No trust configuration, return the rightmost IP
    ips.last().copied()
}

/// Header value as text, or an empty string when absent.
///
/// Non-ASCII bytes are decoded as UTF-8; invalid sequences become U+FFFD.
fn header_str(headers: &HeaderMap, name: impl header::AsHeaderName) -> String {
    headers
        .get(name)
        .map(|h| String::from_utf8_lossy(h.as_bytes()).into_owned())
        .unwrap_or_default()
}

/// Gather everything a data point needs from the request
pub fn extract_visitor_metadata(
    headers: &HeaderMap,
    socket_addr: Option<IpAddr>,
    config: &AnalyticsConfig,
    geoip: Option<&GeoIpService>,
) -> VisitorMetadata {
    // The platform header is hashed exactly as sent, not re-rendered from the parsed address
    let (client_ip, ip_text) = match cloudflare_ip_text(headers) {
        Some((ip, text)) if config.trusted_proxy_mode == TrustedProxyMode::Cloudflare => {
            (Some(ip), text.to_string())
        }
        _ => {
            let ip = extract_client_ip(headers, socket_addr, config);
            (ip, ip.map(|ip| ip.to_string()).unwrap_or_default())
        }
    };

    let mut country = header_str(headers, COUNTRY_HEADER).trim().to_string();
    if country.is_empty() {
        if let (Some(geoip), Some(ip)) = (geoip, client_ip) {
            country = geoip.lookup_country(ip).unwrap_or_default();
        }
    }

    VisitorMetadata {
        ip: ip_text,
        user_agent: header_str(headers, header::USER_AGENT),
        referer: header_str(headers, header::REFERER),
        country,
    }
}
