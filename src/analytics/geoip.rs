//! Country lookup using a MaxMind GeoLite2/GeoIP2 MMDB
//!
//! Only consulted when the edge platform did not supply a country header.

use anyhow::{Context, Result};
use maxminddb::{geoip2, Mmap, Reader};
use std::net::IpAddr;
use std::sync::Arc;

/// Thread-safe country resolver backed by a memory-mapped database
#[derive(Clone)]
pub struct GeoIpService {
    reader: Arc<Reader<Mmap>>,
}

impl GeoIpService {
    /// Open a Country or City database
    pub fn new(path: &str) -> Result<Self> {
        let reader = unsafe { Reader::open_mmap(path) }
            .with_context(|| format!("Failed to open GeoIP database at {}", path))?;

        Ok(Self {
            reader: Arc::new(reader),
        })
    }

    /// Open the database named in configuration, if any
    pub fn from_path(path: Option<&str>) -> Result<Option<Self>> {
        path.map(Self::new).transpose()
    }

    /// ISO country code for `ip`, if the database knows it
    pub fn lookup_country(&self, ip: IpAddr) -> Option<String> {
        let result = self.reader.lookup(ip).ok()?;

        // geoip2::Country decodes from both Country and City databases
        let country = result.decode::<geoip2::Country>().ok()??;
        country.country.iso_code.map(|s| s.to_string())
    }
}
