//! End-to-end tests for the optimization pipeline: schedule expansion,
//! depot selection, daily solving, post-solve filtering, and aggregation
//! wired together the way the CLI drives them.

use std::time::Duration;

use pickup_planner::config::{Config, CostParams};
use pickup_planner::depots::{self, Assignment};
use pickup_planner::geo::Point;
use pickup_planner::matrix::{self, NoOracle};
use pickup_planner::pnl;
use pickup_planner::schedule;
use pickup_planner::solver::{self, DailyProblem, SolveOptions};
use pickup_planner::types::{DailySolution, Depot, Frequency, Site, VisitNode};

/// ~10 km road distance at the default 1.3 road factor: 7.6923 km
/// straight-line, which is a 0.06918 degree latitude offset.
const TEN_KM_LAT_OFFSET: f64 = 0.06918;

fn depot(key: &str, lat: f64, lon: f64, max_trucks: u32, anchor: bool) -> Depot {
    Depot {
        key: key.to_string(),
        name: key.to_string(),
        address: format!("{} depot address", key),
        coord: Some(Point::new(lat, lon)),
        max_trucks,
        anchor,
    }
}

#[allow(clippy::too_many_arguments)]
fn site(
    site_id: u32,
    lat: f64,
    lon: f64,
    frequency: Frequency,
    bins: u32,
    demand: u32,
    revenue: f64,
    structural: f64,
) -> Site {
    Site {
        site_id,
        address: format!("{} Test Rd, Toronto, ON", site_id),
        coord: Some(Point::new(lat, lon)),
        frequency,
        bins,
        annual_lbs: demand as f64 * frequency.annual_visits() as f64,
        annual_visits: frequency.annual_visits(),
        demand_per_visit_lbs: demand,
        revenue_per_visit: revenue,
        structural_cost_per_visit: structural,
        net_contribution_per_visit: revenue - structural,
        service_minutes: bins * 15,
        annual_site_value: 0.0,
    }
}

/// Costs with the truck fixed cost zeroed out, so route economics are
/// driven by arc costs and penalties alone.
fn costs_without_fixed() -> CostParams {
    CostParams {
        truck_lease_monthly: 0.0,
        insurance_annual: 0.0,
        ..CostParams::default()
    }
}

fn config_with_costs(costs: CostParams) -> Config {
    Config {
        costs,
        ..Config::default()
    }
}

/// Solve one (depot, weekday) sub-problem the way the pipeline does,
/// straight-line matrices included.
fn solve_day(
    depot: &Depot,
    weekday: usize,
    visits: &[VisitNode],
    config: &Config,
) -> DailySolution {
    let mut points = vec![depot.coord.unwrap()];
    points.extend(visits.iter().map(|v| v.coord));
    let matrices = matrix::build_matrices(&points, &mut NoOracle, &config.costs);

    let problem = DailyProblem {
        depot_key: &depot.key,
        weekday,
        visits,
        matrices: &matrices,
        num_vehicles: depot.max_trucks as usize,
        capacity_lbs: config.fleet.target_daily_payload_lbs,
        max_route_minutes: config.shift.effective_driving_minutes(),
        vehicle_fixed_cost_cents: config.costs.solver_fixed_cost_cents(),
    };
    let options = SolveOptions {
        time_limit: Duration::from_secs(5),
        solution_limit: 100,
        cancel: None,
    };
    solver::solve(&problem, &options).expect("solve should not fail")
}

fn assign_all_to(depot_index: usize, count: usize) -> Assignment {
    vec![Some(depot_index); count]
}

/// Scenario: one daily site 10 road-km from the anchor, $25 net per
/// visit. Served every weekday by one vehicle; arc cost ~1980 cents
/// against 2500 cents of revenue, so the route is always retained.
#[test]
fn single_daily_site_served_all_week() {
    let config = config_with_costs(costs_without_fixed());
    let anchor = depot("wh", 43.70, -79.40, 20, true);
    let sites = vec![site(
        1,
        43.70 + TEN_KM_LAT_OFFSET,
        -79.40,
        Frequency::D1,
        2,
        500,
        30.0,
        5.0,
    )];

    let week = schedule::weekly_schedule(&sites, &[]);
    let assignment = assign_all_to(0, sites.len());

    for weekday in 0..7 {
        let visits = schedule::depot_visits(&week[weekday], &assignment, 0);
        assert_eq!(visits.len(), 1, "weekday {}", weekday);

        let solution = solve_day(&anchor, weekday, &visits, &config);
        assert_eq!(solution.routes.len(), 1, "weekday {}", weekday);
        assert!(solution.dropped.is_empty());

        let route = &solution.routes[0];
        assert_eq!(route.stops.len(), 1);
        assert_eq!(route.revenue_cents, 2500);
        // round(20 km x $0.39) + round(30 min at $24/hr) in cents
        assert!(
            (route.cost_cents - 1980).abs() <= 10,
            "arc cost should be ~1980, got {}",
            route.cost_cents
        );
        assert!(route.revenue_cents >= route.cost_cents, "route must be retained");
    }
}

/// Scenario: same geometry but $5 revenue against $10 structural cost.
/// Net is negative, the drop penalty is zero, and no truck rolls.
#[test]
fn unprofitable_site_dropped() {
    let config = config_with_costs(costs_without_fixed());
    let anchor = depot("wh", 43.70, -79.40, 20, true);
    let sites = vec![site(
        1,
        43.70 + TEN_KM_LAT_OFFSET,
        -79.40,
        Frequency::D1,
        2,
        500,
        5.0,
        10.0,
    )];

    let week = schedule::weekly_schedule(&sites, &[]);
    let visits = schedule::depot_visits(&week[0], &assign_all_to(0, 1), 0);

    let solution = solve_day(&anchor, 0, &visits, &config);
    assert!(solution.routes.is_empty());
    assert_eq!(solution.dropped.len(), 1);
    assert_eq!(solution.stats.trucks_used, 0);
}

/// Scenario: a D2 site with a 4000 lbs daily total splits into two
/// 2000 lbs visit nodes per day, fourteen per week, and both daily
/// visits fit on one truck when time allows.
#[test]
fn twice_daily_split() {
    let config = config_with_costs(costs_without_fixed());
    let anchor = depot("wh", 43.70, -79.40, 20, true);
    // Catalog carries the per-visit (half daily) demand for D2.
    let sites = vec![site(2, 43.72, -79.40, Frequency::D2, 1, 2000, 300.0, 10.0)];

    let week = schedule::weekly_schedule(&sites, &[]);
    let weekly_nodes: usize = week.iter().map(Vec::len).sum();
    assert_eq!(weekly_nodes, 14);

    for day in &week {
        assert_eq!(day.len(), 2);
        assert_eq!(day[0].demand_lbs + day[1].demand_lbs, 4000);
        assert_eq!(day[0].service_minutes, 15);
        assert_eq!(day[1].service_minutes, 15);
    }

    let visits = schedule::depot_visits(&week[0], &assign_all_to(0, 1), 0);
    let solution = solve_day(&anchor, 0, &visits, &config);
    assert_eq!(solution.routes.len(), 1, "both visits share one truck");
    assert_eq!(solution.routes[0].stops.len(), 2);
    assert_eq!(solution.routes[0].total_lbs, 4000);
}

/// Scenario: two 3500 lbs sites overflow a single 4000 lbs truck; a
/// 2-truck depot runs two single-stop routes and neither exceeds the
/// payload bound.
#[test]
fn capacity_overflow_forces_second_truck() {
    let config = config_with_costs(costs_without_fixed());
    let d = depot("wh", 43.70, -79.40, 2, true);
    let sites = vec![
        site(1, 43.72, -79.40, Frequency::D1, 1, 3500, 400.0, 0.0),
        site(2, 43.70, -79.42, Frequency::D1, 1, 3500, 400.0, 0.0),
    ];

    let week = schedule::weekly_schedule(&sites, &[]);
    let visits = schedule::depot_visits(&week[0], &assign_all_to(0, 2), 0);

    let solution = solve_day(&d, 0, &visits, &config);
    assert_eq!(solution.routes.len(), 2);
    for route in &solution.routes {
        assert_eq!(route.stops.len(), 1);
        assert!(route.total_lbs <= 4000);
    }
    assert!(solution.dropped.is_empty());
}

/// Scenario: six regional depots each serving one $50/week site cannot
/// cover a ~$636 weekly truck cost. The selector closes all six, the
/// anchor stays open, and every site reassigns to it.
#[test]
fn greedy_depot_closure() {
    let costs = CostParams::default();
    let mut depots = vec![depot("wh", 43.70, -79.40, 20, true)];
    let mut sites = Vec::new();
    for i in 0..6u32 {
        let lat = 43.80 + i as f64 * 0.05;
        depots.push(depot(&format!("regional{}", i), lat, -79.40, 1, false));
        sites.push(site(700 + i, lat + 0.01, -79.40, Frequency::D5, 1, 150, 50.0, 0.0));
    }

    let selection = depots::select_depots(&sites, &depots, &costs).unwrap();

    assert_eq!(selection.open, vec![0], "anchor only");
    assert_eq!(selection.closed.len(), 6);
    for assigned in &selection.assignment {
        assert_eq!(*assigned, Some(0));
    }
}

/// Scenario: weekday 3 is a holiday. A daily site with negative net is
/// excluded that day only and still served the other six days.
#[test]
fn holiday_pruning() {
    let sites = vec![site(1, 43.72, -79.40, Frequency::D1, 1, 500, 8.0, 10.0)];
    let week = schedule::weekly_schedule(&sites, &[3]);

    assert!(week[3].is_empty(), "unprofitable site skipped on the holiday");
    for day in [0, 1, 2, 4, 5, 6] {
        assert_eq!(week[day].len(), 1, "weekday {}", day);
    }
}

/// A mixed-frequency network solved across the whole week upholds the
/// structural invariants: payload and shift bounds, retained-route
/// profitability, no visit both served and dropped, and D5 single-day
/// placement.
#[test]
fn weekly_invariants_hold() {
    let config = config_with_costs(costs_without_fixed());
    let anchor = depot("wh", 43.70, -79.40, 4, true);
    let sites = vec![
        site(1, 43.72, -79.40, Frequency::D1, 2, 900, 60.0, 10.0),
        site(2, 43.68, -79.45, Frequency::D2, 1, 1200, 80.0, 5.0),
        site(3, 43.75, -79.35, Frequency::D3, 1, 700, 25.0, 5.0),
        site(4, 43.66, -79.38, Frequency::D4, 3, 1500, 90.0, 20.0),
        site(5, 43.71, -79.50, Frequency::D5, 1, 600, 40.0, 2.0),
        site(6, 43.73, -79.44, Frequency::D1, 1, 400, 3.0, 9.0),
    ];
    let assignment = assign_all_to(0, sites.len());
    let week = schedule::weekly_schedule(&sites, &[]);

    // D5 site 5 appears exactly once, on weekday 5 % 7 = 5.
    let d5_days: Vec<usize> = (0..7)
        .filter(|&d| week[d].iter().any(|v| v.site_id == 5))
        .collect();
    assert_eq!(d5_days, vec![5]);

    let mut solutions = Vec::new();
    for weekday in 0..7 {
        let visits = schedule::depot_visits(&week[weekday], &assignment, 0);
        let solution = solve_day(&anchor, weekday, &visits, &config);

        for route in &solution.routes {
            assert!(route.total_lbs <= config.fleet.target_daily_payload_lbs);
            assert!(route.total_minutes <= config.shift.effective_driving_minutes());
            assert!(
                route.revenue_cents >= route.cost_cents,
                "post-filter guarantee violated on weekday {}",
                weekday
            );
        }

        // A visit is either routed or dropped, never both, never neither.
        let mut seen: Vec<(u32, u8)> = Vec::new();
        for route in &solution.routes {
            for stop in &route.stops {
                seen.push((stop.visit.site_id, stop.visit.visit_number));
            }
        }
        for dropped in &solution.dropped {
            let key = (dropped.visit.site_id, dropped.visit.visit_number);
            assert!(!seen.contains(&key), "visit both routed and dropped");
            seen.push(key);
        }
        seen.sort_unstable();
        let mut expected: Vec<(u32, u8)> =
            visits.iter().map(|v| (v.site_id, v.visit_number)).collect();
        expected.sort_unstable();
        assert_eq!(seen, expected, "every visit accounted for on weekday {}", weekday);

        solutions.push(solution);
    }

    let (weekly, depot_pnls) = pnl::aggregate(&solutions, &config.costs);
    assert_eq!(depot_pnls.len(), 1);
    assert!(weekly.total_lbs > 0);
    assert_eq!(
        weekly.fleet_size,
        solutions.iter().map(|s| s.stats.trucks_used).max().unwrap()
    );
}

/// Identical inputs and budgets reproduce byte-identical solutions.
#[test]
fn pipeline_is_deterministic() {
    let config = config_with_costs(costs_without_fixed());
    let anchor = depot("wh", 43.70, -79.40, 3, true);
    let sites = vec![
        site(1, 43.72, -79.40, Frequency::D1, 2, 900, 60.0, 10.0),
        site(2, 43.68, -79.45, Frequency::D2, 1, 1200, 80.0, 5.0),
        site(3, 43.75, -79.35, Frequency::D1, 1, 700, 25.0, 5.0),
        site(4, 43.66, -79.38, Frequency::D1, 3, 1500, 90.0, 20.0),
    ];
    let assignment = assign_all_to(0, sites.len());

    let run = || {
        let week = schedule::weekly_schedule(&sites, &[]);
        let mut solutions = Vec::new();
        for weekday in 0..7 {
            let visits = schedule::depot_visits(&week[weekday], &assignment, 0);
            solutions.push(solve_day(&anchor, weekday, &visits, &config));
        }
        serde_json::to_string(&solutions).unwrap()
    };

    assert_eq!(run(), run());
}

/// Zero visits for a depot-day produces an empty solution, not an error.
#[test]
fn empty_day_is_empty_solution() {
    let config = config_with_costs(CostParams::default());
    let anchor = depot("wh", 43.70, -79.40, 20, true);
    let solution = solve_day(&anchor, 6, &[], &config);
    assert!(solution.routes.is_empty());
    assert!(solution.dropped.is_empty());
}
