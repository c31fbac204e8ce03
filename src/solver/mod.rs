//! Daily VRP solver.
//!
//! One sub-problem per (open depot, weekday): node 0 is the depot, nodes
//! 1..=n the day's visits, and up to `max_trucks` identical vehicles. Every
//! visit is optional behind a drop penalty equal to its positive net
//! contribution in cents, which turns profit maximization into the cost
//! minimization the search works on: a visit is served exactly when its
//! marginal routing cost stays below its value.
//!
//! The objective is arc costs plus a per-vehicle activation cost plus the
//! penalties of dropped visits. Vehicles are bounded by payload capacity
//! and by shift minutes (travel plus service). After extraction a route
//! whose stop revenue does not cover its cost is deleted whole; that
//! post-solve filter is a separate safety net and deliberately not folded
//! into the search objective.

mod search;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use crate::config::SolverParams;
use crate::error::{Error, Result};
use crate::matrix::TravelMatrices;
use crate::types::{DailySolution, DropReason, DroppedVisit, Route, SolveStats, Stop, VisitNode};

/// One (depot, weekday) routing sub-problem.
pub struct DailyProblem<'a> {
    pub depot_key: &'a str,
    pub weekday: usize,
    pub visits: &'a [VisitNode],
    /// (n+1) x (n+1); index 0 is the depot.
    pub matrices: &'a TravelMatrices,
    pub num_vehicles: usize,
    pub capacity_lbs: u32,
    pub max_route_minutes: u32,
    pub vehicle_fixed_cost_cents: i64,
}

/// Search budget.
#[derive(Debug, Clone)]
pub struct SolveOptions {
    pub time_limit: Duration,
    pub solution_limit: u32,
    /// Cooperative cancellation; the best solution so far is returned.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            time_limit: Duration::from_secs(60),
            solution_limit: 100,
            cancel: None,
        }
    }
}

impl SolveOptions {
    pub fn from_params(params: &SolverParams) -> Self {
        Self {
            time_limit: Duration::from_secs(params.time_limit_seconds),
            solution_limit: params.solution_limit,
            cancel: None,
        }
    }
}

/// Drop penalty in cents: the foregone profit of skipping a visit.
/// Never negative, so unprofitable visits are free to drop.
pub fn drop_penalty_cents(net_contribution: f64) -> i64 {
    ((net_contribution * 100.0).round() as i64).max(0)
}

/// Solve one daily sub-problem.
pub fn solve(problem: &DailyProblem, options: &SolveOptions) -> Result<DailySolution> {
    let n = problem.visits.len();
    if n == 0 {
        return Ok(DailySolution::empty(problem.depot_key, problem.weekday));
    }
    if problem.matrices.len() != n + 1 {
        return Err(Error::Invariant(format!(
            "matrix dimension {} does not match {} visits",
            problem.matrices.len(),
            n
        )));
    }

    // Node id 0 is the depot; ids 1..=n map to visits[id - 1].
    let mut penalties = vec![0i64; n + 1];
    let mut node_feasible = vec![true; n + 1];
    for (i, visit) in problem.visits.iter().enumerate() {
        let node = i + 1;
        penalties[node] = drop_penalty_cents(visit.net_contribution_per_visit);
        let round_trip_minutes = problem.matrices.time_min[0][node]
            + visit.service_minutes
            + problem.matrices.time_min[node][0];
        node_feasible[node] = visit.demand_lbs <= problem.capacity_lbs
            && round_trip_minutes <= problem.max_route_minutes;
    }

    let routes = search::Search::new(problem, &penalties, &node_feasible, options).run();

    let mut solution = extract(problem, &routes, &node_feasible)?;
    filter_unprofitable_routes(&mut solution);
    solution.stats = stats_of(&solution);
    Ok(solution)
}

/// Turn the search's route node lists into the reported solution, with
/// per-route totals. Bound violations here mean a solver bug.
fn extract(
    problem: &DailyProblem,
    routes: &[Vec<usize>],
    node_feasible: &[bool],
) -> Result<DailySolution> {
    let mut out_routes = Vec::new();
    let mut routed = vec![false; problem.visits.len() + 1];

    for (vehicle_id, route) in routes.iter().enumerate() {
        if route.is_empty() {
            continue;
        }

        let mut stops = Vec::with_capacity(route.len());
        let mut total_lbs = 0u32;
        let mut total_km = 0.0;
        let mut total_minutes = 0u32;
        let mut cost_cents = problem.vehicle_fixed_cost_cents;
        let mut revenue_cents = 0i64;

        let mut prev = 0usize;
        for &node in route {
            let visit = &problem.visits[node - 1];
            routed[node] = true;

            total_km += problem.matrices.dist_km[prev][node];
            total_minutes += problem.matrices.time_min[prev][node] + visit.service_minutes;
            cost_cents += problem.matrices.cost_cents[prev][node];

            total_lbs += visit.demand_lbs;
            revenue_cents += drop_penalty_cents(visit.net_contribution_per_visit);
            stops.push(Stop { visit: visit.clone() });
            prev = node;
        }
        total_km += problem.matrices.dist_km[prev][0];
        total_minutes += problem.matrices.time_min[prev][0];
        cost_cents += problem.matrices.cost_cents[prev][0];

        if total_lbs > problem.capacity_lbs {
            return Err(Error::Invariant(format!(
                "vehicle {} exceeds capacity: {} > {} lbs",
                vehicle_id, total_lbs, problem.capacity_lbs
            )));
        }
        if total_minutes > problem.max_route_minutes {
            return Err(Error::Invariant(format!(
                "vehicle {} exceeds shift: {} > {} minutes",
                vehicle_id, total_minutes, problem.max_route_minutes
            )));
        }

        out_routes.push(Route {
            vehicle_id,
            stops,
            total_lbs,
            total_km,
            total_minutes,
            cost_cents,
            revenue_cents,
        });
    }

    let mut dropped = Vec::new();
    for node in 1..=problem.visits.len() {
        if !routed[node] {
            dropped.push(DroppedVisit {
                visit: problem.visits[node - 1].clone(),
                reason: if node_feasible[node] {
                    DropReason::NotServed
                } else {
                    DropReason::SolverInfeasible
                },
            });
        }
    }

    Ok(DailySolution {
        depot_key: problem.depot_key.to_string(),
        weekday: problem.weekday,
        routes: out_routes,
        dropped,
        stats: SolveStats::default(),
    })
}

/// Post-solve profitability filter: a route whose stop revenue does not
/// cover its cost (arcs plus activation) is deleted whole and its stops
/// reported as dropped. Each route is judged independently; there is no
/// re-optimization.
pub fn filter_unprofitable_routes(solution: &mut DailySolution) {
    let mut kept = Vec::with_capacity(solution.routes.len());
    for route in solution.routes.drain(..) {
        if route.revenue_cents < route.cost_cents {
            for stop in route.stops {
                solution.dropped.push(DroppedVisit {
                    visit: stop.visit,
                    reason: DropReason::RouteNotCostJustified,
                });
            }
        } else {
            kept.push(route);
        }
    }
    solution.routes = kept;
}

fn stats_of(solution: &DailySolution) -> SolveStats {
    SolveStats {
        trucks_used: solution.routes.len() as u32,
        total_lbs: solution.routes.iter().map(|r| r.total_lbs).sum(),
        total_km: solution.routes.iter().map(|r| r.total_km).sum(),
        total_minutes: solution.routes.iter().map(|r| r.total_minutes).sum(),
        total_cost_cents: solution.routes.iter().map(|r| r.cost_cents).sum(),
    }
}
