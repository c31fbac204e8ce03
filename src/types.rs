//! Core types for the pickup network: sites, depots, visits, routes.

use serde::{Deserialize, Serialize};

use crate::geo::Point;

/// Visit frequency code from the site catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Frequency {
    /// Daily, one visit per day
    D1,
    /// Twice daily, every day
    D2,
    /// Twice a week (Tue, Thu)
    D3,
    /// Three times a week (Mon, Wed, Fri)
    D4,
    /// Weekly, single day derived from the site id
    D5,
}

impl Frequency {
    /// Parse a catalog frequency code. Unknown codes fall back to D1,
    /// matching how the catalog treats blank cells.
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "D2" => Frequency::D2,
            "D3" => Frequency::D3,
            "D4" => Frequency::D4,
            "D5" => Frequency::D5,
            _ => Frequency::D1,
        }
    }

    /// Scheduled visits per week.
    pub fn weekly_visits(&self) -> u32 {
        match self {
            Frequency::D1 => 7,
            Frequency::D2 => 14,
            Frequency::D3 => 2,
            Frequency::D4 => 3,
            Frequency::D5 => 1,
        }
    }

    /// Scheduled visits per year.
    pub fn annual_visits(&self) -> u32 {
        match self {
            Frequency::D1 => 364,
            Frequency::D2 => 728,
            Frequency::D3 => 104,
            Frequency::D4 => 156,
            Frequency::D5 => 52,
        }
    }

    /// Fixed weekday pattern (0=Mon..6=Sun), or None when the day is
    /// derived per site (D5).
    pub fn day_pattern(&self) -> Option<&'static [usize]> {
        match self {
            Frequency::D1 | Frequency::D2 => Some(&[0, 1, 2, 3, 4, 5, 6]),
            Frequency::D3 => Some(&[1, 3]),
            Frequency::D4 => Some(&[0, 2, 4]),
            Frequency::D5 => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Frequency::D1 => "Daily",
            Frequency::D2 => "2x Daily",
            Frequency::D3 => "2x Week",
            Frequency::D4 => "3x Week",
            Frequency::D5 => "Weekly",
        }
    }
}

/// A service site from the catalog. Immutable after load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Site {
    pub site_id: u32,
    pub address: String,
    /// Resolved coordinate; None until geocoded, and sites that stay None
    /// are excluded from routing.
    pub coord: Option<Point>,
    pub frequency: Frequency,
    pub bins: u32,
    pub annual_lbs: f64,
    pub annual_visits: u32,
    /// Per-visit pickup weight. For D2 sites this is the full daily amount;
    /// the scheduler halves it per visit.
    pub demand_per_visit_lbs: u32,
    pub revenue_per_visit: f64,
    /// (annual rent + annual waste) / annual visits
    pub structural_cost_per_visit: f64,
    /// revenue_per_visit - structural_cost_per_visit; may be negative
    pub net_contribution_per_visit: f64,
    /// bins x SERVICE_MINUTES_PER_BIN
    pub service_minutes: u32,
    pub annual_site_value: f64,
}

impl Site {
    pub fn weekly_visits(&self) -> u32 {
        self.frequency.weekly_visits()
    }

    /// Short label for route listings.
    pub fn short_label(&self) -> String {
        let mut label: String = self.address.chars().take(40).collect();
        if self.address.chars().count() > 40 {
            label.push_str("..");
        }
        label
    }
}

/// A dispatch depot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Depot {
    pub key: String,
    pub name: String,
    pub address: String,
    pub coord: Option<Point>,
    pub max_trucks: u32,
    /// The anchor depot is never a closure candidate.
    pub anchor: bool,
}

/// A single scheduled visit, used as a routing node.
///
/// D2 sites produce two of these per day, each with half the daily demand
/// but the full service time (bins are unloaded on every visit).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitNode {
    /// Index into the site catalog.
    pub site_index: usize,
    pub site_id: u32,
    /// 1 or 2 (second daily visit for D2 sites).
    pub visit_number: u8,
    pub demand_lbs: u32,
    pub service_minutes: u32,
    pub net_contribution_per_visit: f64,
    pub coord: Point,
    pub label: String,
}

/// One stop on a solved route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stop {
    pub visit: VisitNode,
}

/// A solved route for one vehicle: depot -> stops -> depot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub vehicle_id: usize,
    pub stops: Vec<Stop>,
    pub total_lbs: u32,
    pub total_km: f64,
    /// Travel plus service minutes over the whole route.
    pub total_minutes: u32,
    /// Arc costs plus the vehicle activation cost, in cents.
    pub cost_cents: i64,
    /// Sum of positive per-stop net contributions, in cents.
    pub revenue_cents: i64,
}

impl Route {
    pub fn num_stops(&self) -> usize {
        self.stops.len()
    }
}

/// Why a visit ended up unserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DropReason {
    /// The solver left the node out (routing cost exceeded its value).
    NotServed,
    /// The daily sub-problem had no feasible solution in budget.
    SolverInfeasible,
    /// The whole route failed the post-solve profitability check.
    RouteNotCostJustified,
}

impl DropReason {
    pub fn label(&self) -> &'static str {
        match self {
            DropReason::NotServed => "dropped by solver",
            DropReason::SolverInfeasible => "no feasible solution",
            DropReason::RouteNotCostJustified => "route not cost-justified",
        }
    }
}

/// An unserved visit with its reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DroppedVisit {
    pub visit: VisitNode,
    pub reason: DropReason,
}

/// Aggregate numbers for one (depot, weekday) solution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SolveStats {
    pub trucks_used: u32,
    pub total_lbs: u32,
    pub total_km: f64,
    pub total_minutes: u32,
    pub total_cost_cents: i64,
}

/// Solver output for one depot on one weekday.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailySolution {
    pub depot_key: String,
    pub weekday: usize,
    pub routes: Vec<Route>,
    pub dropped: Vec<DroppedVisit>,
    pub stats: SolveStats,
}

impl DailySolution {
    pub fn empty(depot_key: &str, weekday: usize) -> Self {
        Self {
            depot_key: depot_key.to_string(),
            weekday,
            routes: Vec::new(),
            dropped: Vec::new(),
            stats: SolveStats::default(),
        }
    }
}

pub const DAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];
