//! Network P&L aggregation over solved daily sub-problems.
//!
//! Rolls route outcomes into weekly and per-depot totals. Fixed truck cost
//! is charged per vehicle dispatched at least once during the week: a
//! depot's fleet is the peak truck count over its seven days. Overtime
//! kicks in past the weekly threshold per truck, with hours assumed spread
//! evenly across the fleet.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::CostParams;
use crate::types::DailySolution;

/// Weekly network-level P&L.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WeeklyPnl {
    pub total_lbs: u64,
    pub total_km: f64,
    pub total_hours: f64,
    /// Sum of per-depot peak daily truck counts.
    pub fleet_size: u32,
    pub trucks_per_day: [u32; 7],
    pub driver_regular_cost: f64,
    pub driver_ot_cost: f64,
    pub ot_hours: f64,
    pub variable_vehicle_cost: f64,
    pub fixed_truck_cost: f64,
    pub revenue: f64,
    pub total_cost: f64,
    pub net: f64,
    pub dropped_visits: usize,
}

/// Post-solve P&L for one open depot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepotPnl {
    pub depot_key: String,
    pub lbs: u64,
    pub km: f64,
    pub hours: f64,
    /// Peak trucks used on any single day.
    pub fleet: u32,
    pub revenue: f64,
    pub driver_cost: f64,
    pub variable_cost: f64,
    pub fixed_cost: f64,
    pub total_cost: f64,
    pub net: f64,
}

impl DepotPnl {
    /// A depot that cannot cover its own costs from solved routes.
    pub fn is_marginal(&self) -> bool {
        self.net < 0.0
    }
}

/// Aggregate solved sub-problems into weekly and per-depot P&L.
/// Depot ordering follows the depot key, ascending.
pub fn aggregate(solutions: &[DailySolution], costs: &CostParams) -> (WeeklyPnl, Vec<DepotPnl>) {
    let mut weekly = WeeklyPnl::default();

    // Group by depot key for per-depot rollups and peak fleet counts.
    let mut by_depot: BTreeMap<&str, Vec<&DailySolution>> = BTreeMap::new();
    for solution in solutions {
        by_depot.entry(&solution.depot_key).or_default().push(solution);
    }

    let mut depot_pnls = Vec::with_capacity(by_depot.len());
    for (depot_key, days) in &by_depot {
        let mut lbs = 0u64;
        let mut km = 0.0;
        let mut minutes = 0u64;
        let mut fleet = 0u32;
        for solution in days {
            lbs += solution.stats.total_lbs as u64;
            km += solution.stats.total_km;
            minutes += solution.stats.total_minutes as u64;
            fleet = fleet.max(solution.stats.trucks_used);
        }
        let hours = minutes as f64 / 60.0;

        let revenue = lbs as f64 * costs.revenue_per_lb;
        let driver_cost = hours * costs.driver_wage_per_hour;
        let variable_cost = km * costs.variable_cost_per_km();
        let fixed_cost = fleet as f64 * costs.truck_fixed_weekly();
        let total_cost = driver_cost + variable_cost + fixed_cost;

        depot_pnls.push(DepotPnl {
            depot_key: depot_key.to_string(),
            lbs,
            km,
            hours,
            fleet,
            revenue,
            driver_cost,
            variable_cost,
            fixed_cost,
            total_cost,
            net: revenue - total_cost,
        });

        weekly.fleet_size += fleet;
    }

    for solution in solutions {
        weekly.total_lbs += solution.stats.total_lbs as u64;
        weekly.total_km += solution.stats.total_km;
        weekly.total_hours += solution.stats.total_minutes as f64 / 60.0;
        weekly.trucks_per_day[solution.weekday] += solution.stats.trucks_used;
        weekly.dropped_visits += solution.dropped.len();
    }

    // Driver cost with the overtime split. Hours are assumed spread evenly
    // across the fleet; each truck pays OT past the weekly threshold.
    if weekly.fleet_size > 0 {
        let avg_hours_per_truck = weekly.total_hours / weekly.fleet_size as f64;
        let per_truck_ot = (avg_hours_per_truck - costs.ot_weekly_threshold_hours).max(0.0);
        weekly.ot_hours = per_truck_ot * weekly.fleet_size as f64;
    }
    weekly.driver_regular_cost = (weekly.total_hours - weekly.ot_hours) * costs.driver_wage_per_hour;
    weekly.driver_ot_cost = weekly.ot_hours * costs.driver_wage_per_hour * costs.ot_multiplier;

    weekly.variable_vehicle_cost = weekly.total_km * costs.variable_cost_per_km();
    weekly.fixed_truck_cost = weekly.fleet_size as f64 * costs.truck_fixed_weekly();
    weekly.revenue = weekly.total_lbs as f64 * costs.revenue_per_lb;
    weekly.total_cost = weekly.driver_regular_cost
        + weekly.driver_ot_cost
        + weekly.variable_vehicle_cost
        + weekly.fixed_truck_cost;
    weekly.net = weekly.revenue - weekly.total_cost;

    (weekly, depot_pnls)
}
