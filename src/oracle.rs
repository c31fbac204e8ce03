//! Road-distance oracle client with a persistent pair cache.
//!
//! Talks to an OSRM-style table service, batched at most 10x10 coordinate
//! pairs per request. Every fetched pair lands in a JSON disk cache keyed
//! by the coordinate pair, flushed every 500 additions and at the end of
//! each matrix build. Request failures are never fatal: unanswered cells
//! are reported as `None` and counted, and the matrix builder fills them
//! with the straight-line estimate.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Config;
use crate::error::Result;
use crate::geo::Point;
use crate::matrix::{DistanceSource, Leg};

/// Oracle batching limits (per request).
const MAX_ORIGINS: usize = 10;
const MAX_DESTINATIONS: usize = 10;

/// Cache flush interval, in new pairs.
const FLUSH_EVERY: usize = 500;

#[derive(Error, Debug)]
pub enum OracleError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("oracle returned error status: {0}")]
    Status(String),

    #[error("malformed oracle response")]
    Malformed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct CachedLeg {
    dist_km: f64,
    time_min: u32,
}

/// Deterministic cache key for a directed coordinate pair.
fn pair_key(from: Point, to: Point) -> String {
    format!(
        "{:.6},{:.6}|{:.6},{:.6}",
        from.lat, from.lon, to.lat, to.lon
    )
}

/// Disk-backed cache of fetched pairs.
struct DistanceCache {
    path: PathBuf,
    pairs: HashMap<String, CachedLeg>,
    pending: usize,
}

impl DistanceCache {
    fn open(path: PathBuf) -> Result<Self> {
        let pairs = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str(&content).unwrap_or_default()
        } else {
            HashMap::new()
        };
        Ok(Self {
            path,
            pairs,
            pending: 0,
        })
    }

    fn get(&self, key: &str) -> Option<CachedLeg> {
        self.pairs.get(key).copied()
    }

    fn insert(&mut self, key: String, leg: CachedLeg) {
        self.pairs.insert(key, leg);
        self.pending += 1;
        if self.pending >= FLUSH_EVERY {
            let _ = self.flush();
        }
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string(&self.pairs)?;
        std::fs::write(&self.path, content)?;
        self.pending = 0;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct TableResponse {
    code: String,
    durations: Option<Vec<Vec<Option<f64>>>>,
    distances: Option<Vec<Vec<Option<f64>>>>,
}

/// Distance-matrix oracle over HTTP, with cache and degradation counter.
pub struct MatrixOracle {
    cache: DistanceCache,
    client: reqwest::blocking::Client,
    base_url: String,
    degraded_pairs: usize,
    fetched_pairs: usize,
}

impl MatrixOracle {
    /// Build an oracle from config. Returns None when no oracle endpoint
    /// is configured; callers then use the fallback source.
    pub fn from_config(config: &Config) -> Result<Option<Self>> {
        let base_url = match &config.endpoints.oracle_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => return Ok(None),
        };
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.endpoints.timeout_secs))
            .build()
            .map_err(|e| crate::error::Error::Config(format!("oracle client: {}", e)))?;
        let cache = DistanceCache::open(config.distance_cache_path())?;
        Ok(Some(Self {
            cache,
            client,
            base_url,
            degraded_pairs: 0,
            fetched_pairs: 0,
        }))
    }

    /// Pairs that had to fall back to the straight-line estimate so far.
    pub fn degraded_pairs(&self) -> usize {
        self.degraded_pairs
    }

    /// Pairs fetched live from the oracle so far.
    pub fn fetched_pairs(&self) -> usize {
        self.fetched_pairs
    }

    pub fn flush_cache(&mut self) -> Result<()> {
        self.cache.flush()
    }

    fn fetch_batch(
        &self,
        points: &[Point],
        origins: &[usize],
        destinations: &[usize],
    ) -> std::result::Result<TableResponse, OracleError> {
        // Coordinate list is origins then destinations; sources and
        // destinations index into that list.
        let coords: Vec<String> = origins
            .iter()
            .chain(destinations.iter())
            .map(|&i| format!("{:.6},{:.6}", points[i].lon, points[i].lat))
            .collect();
        let sources: Vec<String> = (0..origins.len()).map(|i| i.to_string()).collect();
        let dests: Vec<String> = (origins.len()..origins.len() + destinations.len())
            .map(|i| i.to_string())
            .collect();

        let url = format!(
            "{}/table/v1/driving/{}?sources={}&destinations={}&annotations=duration,distance",
            self.base_url,
            coords.join(";"),
            sources.join(";"),
            dests.join(";"),
        );

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| OracleError::Request(e.to_string()))?;
        if !response.status().is_success() {
            return Err(OracleError::Request(format!("HTTP {}", response.status())));
        }
        let body: TableResponse = response.json().map_err(|_| OracleError::Malformed)?;
        if body.code != "Ok" {
            return Err(OracleError::Status(body.code));
        }
        Ok(body)
    }
}

impl DistanceSource for MatrixOracle {
    fn legs_for(&mut self, points: &[Point]) -> Vec<Vec<Option<Leg>>> {
        let n = points.len();
        let mut legs: Vec<Vec<Option<Leg>>> = vec![vec![None; n]; n];

        // Cache pass: collect the pairs still needed.
        let mut by_origin: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for i in 0..n {
            for j in 0..n {
                if i == j {
                    continue;
                }
                let key = pair_key(points[i], points[j]);
                if let Some(cached) = self.cache.get(&key) {
                    legs[i][j] = Some(Leg {
                        dist_km: cached.dist_km,
                        time_min: cached.time_min,
                    });
                } else {
                    by_origin.entry(i).or_default().push(j);
                }
            }
        }

        let origin_indices: Vec<usize> = by_origin.keys().copied().collect();

        for origin_batch in origin_indices.chunks(MAX_ORIGINS) {
            // All destinations any origin in this batch still needs.
            let mut dest_set: BTreeSet<usize> = BTreeSet::new();
            for oi in origin_batch {
                dest_set.extend(by_origin[oi].iter().copied());
            }
            let dest_list: Vec<usize> = dest_set.into_iter().collect();

            for dest_batch in dest_list.chunks(MAX_DESTINATIONS) {
                match self.fetch_batch(points, origin_batch, dest_batch) {
                    Ok(table) => {
                        for (oi_idx, &oi) in origin_batch.iter().enumerate() {
                            for (dj_idx, &dj) in dest_batch.iter().enumerate() {
                                if oi == dj {
                                    continue;
                                }
                                let duration = table
                                    .durations
                                    .as_ref()
                                    .and_then(|d| d.get(oi_idx))
                                    .and_then(|row| row.get(dj_idx))
                                    .and_then(|v| *v);
                                let distance = table
                                    .distances
                                    .as_ref()
                                    .and_then(|d| d.get(oi_idx))
                                    .and_then(|row| row.get(dj_idx))
                                    .and_then(|v| *v);
                                match (duration, distance) {
                                    (Some(secs), Some(meters)) => {
                                        let leg = Leg {
                                            dist_km: meters / 1000.0,
                                            time_min: (secs / 60.0).ceil() as u32,
                                        };
                                        legs[oi][dj] = Some(leg);
                                        self.cache.insert(
                                            pair_key(points[oi], points[dj]),
                                            CachedLeg {
                                                dist_km: leg.dist_km,
                                                time_min: leg.time_min,
                                            },
                                        );
                                        self.fetched_pairs += 1;
                                    }
                                    _ => {
                                        // Unroutable cell; leave it to the fallback.
                                        self.degraded_pairs += 1;
                                    }
                                }
                            }
                        }
                    }
                    Err(e) => {
                        eprintln!("warning: distance oracle batch failed ({}), using fallback", e);
                        self.degraded_pairs += origin_batch.len() * dest_batch.len();
                    }
                }
            }
        }

        let _ = self.cache.flush();
        legs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_pair_key_format() {
        let a = Point::new(43.7, -79.4);
        let b = Point::new(45.42, -75.7);
        assert_eq!(
            pair_key(a, b),
            "43.700000,-79.400000|45.420000,-75.700000"
        );
        // Both orderings are distinct keys
        assert_ne!(pair_key(a, b), pair_key(b, a));
    }

    #[test]
    fn test_cache_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("distance_cache.json");

        let mut cache = DistanceCache::open(path.clone()).unwrap();
        cache.insert(
            "a|b".to_string(),
            CachedLeg {
                dist_km: 12.3,
                time_min: 19,
            },
        );
        cache.flush().unwrap();

        let reopened = DistanceCache::open(path).unwrap();
        let leg = reopened.get("a|b").unwrap();
        assert!((leg.dist_km - 12.3).abs() < 1e-9);
        assert_eq!(leg.time_min, 19);
    }

    #[test]
    fn test_no_oracle_configured() {
        let config = Config::default();
        assert!(MatrixOracle::from_config(&config).unwrap().is_none());
    }
}
