//! Configuration for pickup-planner.
//!
//! All costs, depot definitions, fleet parameters, and solver settings.
//! Defaults carry the production values; a JSON config file can override
//! any of them, and the CLI can override solver limits on top.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Fleet and payload limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetParams {
    pub max_legal_payload_lbs: u32,
    /// Practical daily maximum used as solver capacity.
    pub target_daily_payload_lbs: u32,
}

impl Default for FleetParams {
    fn default() -> Self {
        Self {
            max_legal_payload_lbs: 6000,
            target_daily_payload_lbs: 4000,
        }
    }
}

/// Cost and revenue parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostParams {
    pub driver_wage_per_hour: f64,
    pub ot_multiplier: f64,
    pub ot_weekly_threshold_hours: f64,
    pub truck_lease_monthly: f64,
    pub insurance_annual: f64,
    pub fuel_per_km: f64,
    pub maintenance_per_km: f64,
    pub mileage_per_km: f64,
    pub revenue_per_lb: f64,
    pub average_speed_kmh: f64,
    /// Road distance ~= straight line x this factor.
    pub road_factor: f64,
}

impl Default for CostParams {
    fn default() -> Self {
        Self {
            driver_wage_per_hour: 24.0,
            ot_multiplier: 1.5,
            ot_weekly_threshold_hours: 44.0,
            truck_lease_monthly: 2077.0,
            insurance_annual: 8166.0,
            fuel_per_km: 0.25,
            maintenance_per_km: 0.05,
            mileage_per_km: 0.09,
            revenue_per_lb: 0.30,
            average_speed_kmh: 40.0,
            road_factor: 1.3,
        }
    }
}

impl CostParams {
    /// Fuel + maintenance + mileage, per km.
    pub fn variable_cost_per_km(&self) -> f64 {
        self.fuel_per_km + self.maintenance_per_km + self.mileage_per_km
    }

    pub fn truck_fixed_annual(&self) -> f64 {
        self.truck_lease_monthly * 12.0 + self.insurance_annual
    }

    pub fn truck_fixed_weekly(&self) -> f64 {
        self.truck_fixed_annual() / 52.0
    }

    pub fn truck_fixed_daily(&self) -> f64 {
        self.truck_fixed_annual() / 365.0
    }

    /// Per-vehicle activation cost fed to the daily solver, in cents.
    /// The daily heuristic discourages extra trucks per day; the real
    /// fleet-level cost is charged weekly by the aggregator.
    pub fn solver_fixed_cost_cents(&self) -> i64 {
        (self.truck_fixed_daily() * 100.0).round() as i64
    }
}

/// Driver shift limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShiftParams {
    pub max_shift_minutes: u32,
    /// Total unpaid break time within a shift.
    pub total_break_minutes: u32,
    pub service_minutes_per_bin: u32,
}

impl Default for ShiftParams {
    fn default() -> Self {
        Self {
            max_shift_minutes: 720,
            total_break_minutes: 60,
            service_minutes_per_bin: 15,
        }
    }
}

impl ShiftParams {
    /// Route time budget: shift length minus breaks.
    pub fn effective_driving_minutes(&self) -> u32 {
        self.max_shift_minutes - self.total_break_minutes
    }
}

/// Search budget for the daily VRP solver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverParams {
    pub time_limit_seconds: u64,
    pub solution_limit: u32,
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            time_limit_seconds: 60,
            solution_limit: 100,
        }
    }
}

/// A depot definition. Coordinates are geocoded at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepotConfig {
    pub key: String,
    pub name: String,
    pub address: String,
    pub max_trucks: u32,
    #[serde(default)]
    pub anchor: bool,
}

/// External service endpoints. The distance oracle is optional; without
/// one every matrix cell uses the straight-line fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointParams {
    /// Distance oracle base URL (OSRM-style table service).
    #[serde(default)]
    pub oracle_url: Option<String>,
    /// Geocoding service base URL (Nominatim-style search endpoint).
    #[serde(default = "default_geocoder_url")]
    pub geocoder_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EndpointParams {
    fn default() -> Self {
        Self {
            oracle_url: None,
            geocoder_url: default_geocoder_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_geocoder_url() -> Option<String> {
    Some("https://nominatim.openstreetmap.org".to_string())
}

fn default_timeout_secs() -> u64 {
    30
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub fleet: FleetParams,
    #[serde(default)]
    pub costs: CostParams,
    #[serde(default)]
    pub shift: ShiftParams,
    #[serde(default)]
    pub solver: SolverParams,
    #[serde(default)]
    pub endpoints: EndpointParams,
    #[serde(default = "default_depots")]
    pub depots: Vec<DepotConfig>,
    /// Geocode cache override; defaults under the user cache dir.
    #[serde(default)]
    pub geocode_cache_path: Option<PathBuf>,
    /// Distance cache override; defaults under the user cache dir.
    #[serde(default)]
    pub distance_cache_path: Option<PathBuf>,
}

fn default_depots() -> Vec<DepotConfig> {
    let mk = |key: &str, name: &str, address: &str, max_trucks: u32, anchor: bool| DepotConfig {
        key: key.to_string(),
        name: name.to_string(),
        address: address.to_string(),
        max_trucks,
        anchor,
    };
    vec![
        mk("wh", "Main Warehouse (GTA)", "37 Alexdon Rd, North York, ON, Canada", 20, true),
        mk("barrie", "Barrie Depot", "320 Bayfield St, Barrie, ON L4M 3C1, Canada", 1, false),
        mk("london", "London Depot", "1345 Huron St #1a, London, ON N5V 2E3, Canada", 1, false),
        mk("newmarket", "Newmarket Depot", "570 Steven Ct, Newmarket, ON, Canada", 1, false),
        mk("ottawa", "Ottawa Depot", "995 Moodie Dr, Ottawa, ON, Canada", 2, false),
        mk("hamilton", "Hamilton Depot", "1400 Upper James St, Hamilton, ON L9B 1K3, Canada", 1, false),
        mk("kitchener", "Kitchener Depot", "1144 Courtland Ave E, Kitchener, ON N2C 1N2, Canada", 1, false),
    ]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fleet: FleetParams::default(),
            costs: CostParams::default(),
            shift: ShiftParams::default(),
            solver: SolverParams::default(),
            endpoints: EndpointParams::default(),
            depots: default_depots(),
            geocode_cache_path: None,
            distance_cache_path: None,
        }
    }
}

impl Config {
    /// Load config from a JSON file, or defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(p) => {
                let content = std::fs::read_to_string(p)?;
                serde_json::from_str(&content)?
            }
            None => Config::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Save config to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Exactly one depot must be the anchor.
    pub fn validate(&self) -> Result<()> {
        let anchors = self.depots.iter().filter(|d| d.anchor).count();
        if anchors != 1 {
            return Err(Error::Config(format!(
                "exactly one anchor depot required, found {}",
                anchors
            )));
        }
        let mut keys: Vec<&str> = self.depots.iter().map(|d| d.key.as_str()).collect();
        keys.sort_unstable();
        keys.dedup();
        if keys.len() != self.depots.len() {
            return Err(Error::Config("duplicate depot keys".to_string()));
        }
        Ok(())
    }

    pub fn depot(&self, key: &str) -> Option<&DepotConfig> {
        self.depots.iter().find(|d| d.key == key)
    }

    fn cache_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pickup-planner")
    }

    pub fn geocode_cache_path(&self) -> PathBuf {
        self.geocode_cache_path
            .clone()
            .unwrap_or_else(|| Self::cache_dir().join("geocode_cache.json"))
    }

    pub fn distance_cache_path(&self) -> PathBuf {
        self.distance_cache_path
            .clone()
            .unwrap_or_else(|| Self::cache_dir().join("distance_cache.json"))
    }
}
