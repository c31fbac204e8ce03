//! Address geocoding with a persistent JSON cache.
//!
//! Lookups go through the cache first; misses hit a Nominatim-style search
//! endpoint at roughly one request per second. A failed lookup is retried
//! once with a simplified address (last three comma-separated parts).
//! Failures are degraded conditions: the site is left without a coordinate
//! and excluded from routing with a warning.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::Result;
use crate::geo::Point;
use crate::types::{Depot, Site};

/// Cache flush interval, in new entries.
const FLUSH_EVERY: usize = 50;

/// Minimum spacing between live requests (free-service rate limit).
const MIN_REQUEST_DELAY: Duration = Duration::from_millis(1100);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodeEntry {
    pub lat: f64,
    pub lon: f64,
    pub resolved: String,
    pub source: String,
}

impl GeocodeEntry {
    pub fn point(&self) -> Point {
        Point::new(self.lat, self.lon)
    }
}

/// Append-mostly geocode cache keyed by the raw address string.
pub struct GeocodeCache {
    path: PathBuf,
    entries: HashMap<String, GeocodeEntry>,
    pending: usize,
}

impl GeocodeCache {
    pub fn open(path: PathBuf) -> Result<Self> {
        let entries = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str(&content).unwrap_or_default()
        } else {
            HashMap::new()
        };
        Ok(Self {
            path,
            entries,
            pending: 0,
        })
    }

    pub fn get(&self, address: &str) -> Option<&GeocodeEntry> {
        self.entries.get(address)
    }

    pub fn insert(&mut self, address: String, entry: GeocodeEntry) -> Result<()> {
        self.entries.insert(address, entry);
        self.pending += 1;
        if self.pending >= FLUSH_EVERY {
            self.flush()?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(&self.path, content)?;
        self.pending = 0;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    lat: String,
    lon: String,
    display_name: String,
}

/// Geocoder: cache-backed, with optional live lookups.
pub struct Geocoder {
    cache: GeocodeCache,
    client: Option<reqwest::blocking::Client>,
    base_url: Option<String>,
    last_request: Option<Instant>,
}

impl Geocoder {
    /// Open the geocoder. With `cache_only` no live requests are made and
    /// any address missing from the cache stays unresolved.
    pub fn open(config: &Config, cache_only: bool) -> Result<Self> {
        let cache = GeocodeCache::open(config.geocode_cache_path())?;
        let (client, base_url) = if cache_only {
            (None, None)
        } else {
            match &config.endpoints.geocoder_url {
                Some(url) => {
                    let client = reqwest::blocking::Client::builder()
                        .timeout(Duration::from_secs(config.endpoints.timeout_secs))
                        .user_agent("pickup-planner")
                        .build()
                        .ok();
                    (client, Some(url.clone()))
                }
                None => (None, None),
            }
        };
        Ok(Self {
            cache,
            client,
            base_url,
            last_request: None,
        })
    }

    /// Resolve one address to a coordinate. Cache first, then live lookup
    /// with a simplified-address retry. Returns None on failure.
    pub fn resolve(&mut self, address: &str) -> Option<Point> {
        if let Some(entry) = self.cache.get(address) {
            return Some(entry.point());
        }

        let clean = clean_address(address);
        if let Some(entry) = self.lookup(&clean) {
            let point = entry.point();
            let _ = self.cache.insert(address.to_string(), entry);
            return Some(point);
        }

        // Retry with the last three address parts (street noise confuses
        // the free service).
        if let Some(simplified) = simplify_address(&clean) {
            if let Some(entry) = self.lookup(&simplified) {
                let point = entry.point();
                let _ = self.cache.insert(address.to_string(), entry);
                return Some(point);
            }
        }

        None
    }

    /// Resolve all depot coordinates. A depot that cannot be geocoded
    /// cannot dispatch trucks, so this is fatal.
    pub fn resolve_depots(&mut self, depots: &mut [Depot]) -> Result<()> {
        for depot in depots.iter_mut() {
            let address = depot.address.clone();
            match self.resolve(&address) {
                Some(point) => depot.coord = Some(point),
                None => {
                    return Err(crate::error::Error::Config(format!(
                        "depot '{}' could not be geocoded: {}",
                        depot.key, depot.address
                    )))
                }
            }
        }
        self.cache.flush()?;
        Ok(())
    }

    /// Resolve site coordinates. Returns the number of sites left without
    /// a coordinate; those are excluded from routing.
    pub fn resolve_sites(&mut self, sites: &mut [Site]) -> Result<usize> {
        let mut missing = 0;
        for site in sites.iter_mut() {
            let address = site.address.clone();
            match self.resolve(&address) {
                Some(point) => site.coord = Some(point),
                None => {
                    eprintln!(
                        "warning: site {} could not be geocoded, excluded from routing: {}",
                        site.site_id, site.address
                    );
                    missing += 1;
                }
            }
        }
        self.cache.flush()?;
        Ok(missing)
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }

    fn lookup(&mut self, address: &str) -> Option<GeocodeEntry> {
        let client = self.client.as_ref()?;
        let base_url = self.base_url.as_ref()?;

        // Stay under the free-service rate limit.
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < MIN_REQUEST_DELAY {
                std::thread::sleep(MIN_REQUEST_DELAY - elapsed);
            }
        }
        self.last_request = Some(Instant::now());

        let response = client
            .get(format!("{}/search", base_url))
            .query(&[("q", address), ("format", "json"), ("limit", "1")])
            .send()
            .ok()?;
        if !response.status().is_success() {
            return None;
        }
        let hits: Vec<SearchHit> = response.json().ok()?;
        let hit = hits.into_iter().next()?;

        Some(GeocodeEntry {
            lat: hit.lat.parse().ok()?,
            lon: hit.lon.parse().ok()?,
            resolved: hit.display_name,
            source: "nominatim".to_string(),
        })
    }
}

/// Normalize tab separators and ensure a country suffix.
fn clean_address(address: &str) -> String {
    let mut clean = address.replace('\t', ", ").trim().to_string();
    if !clean.to_lowercase().ends_with("canada") {
        clean.push_str(", Canada");
    }
    clean
}

/// Last three comma-separated parts, or None when already that short.
fn simplify_address(address: &str) -> Option<String> {
    let parts: Vec<&str> = address.split(',').map(str::trim).collect();
    if parts.len() <= 3 {
        return None;
    }
    Some(parts[parts.len() - 3..].join(", "))
}
