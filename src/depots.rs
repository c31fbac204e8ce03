//! Depot selection: nearest-depot assignment and the greedy closure loop.
//!
//! Before any routing happens, every site is assigned to its nearest open
//! depot and the network repeatedly tries to close its least profitable
//! non-anchor depot. A closure is kept only when the estimated total
//! weekly network profit improves after reassigning the closed depot's
//! sites to their next-nearest open depot.
//!
//! The estimate is deliberately coarse: straight-line distance times the
//! road factor approximates the amortized per-visit driving of a chained
//! route. The daily solver later prices routes exactly.

use crate::config::CostParams;
use crate::error::{Error, Result};
use crate::geo::{self, Point};
use crate::types::{Depot, Site};

/// Site index -> open depot index. None for sites excluded from routing.
pub type Assignment = Vec<Option<usize>>;

/// Estimated weekly P&L for one depot.
#[derive(Debug, Clone)]
pub struct DepotEstimate {
    pub depot_key: String,
    pub num_sites: usize,
    pub weekly_revenue: f64,
    pub fixed_cost: f64,
    pub variable_cost: f64,
    pub net_profit: f64,
    pub total_weekly_lbs: f64,
}

/// A depot the closure loop decided to shut.
#[derive(Debug, Clone)]
pub struct ClosedDepot {
    pub key: String,
    pub reason: String,
}

/// Outcome of the selection phase.
#[derive(Debug, Clone)]
pub struct Selection {
    /// Indices of depots kept open, in configuration order.
    pub open: Vec<usize>,
    pub closed: Vec<ClosedDepot>,
    pub assignment: Assignment,
    /// Final estimates for the open depots, in configuration order.
    pub estimates: Vec<DepotEstimate>,
    pub network_profit: f64,
}

impl Selection {
    pub fn is_open(&self, depot_index: usize) -> bool {
        self.open.contains(&depot_index)
    }
}

fn depot_coord(depot: &Depot) -> Result<Point> {
    depot
        .coord
        .ok_or_else(|| Error::Invariant(format!("depot '{}' has no coordinate", depot.key)))
}

/// Assign each site to its nearest depot by straight-line distance.
/// Sites without a coordinate stay unassigned.
pub fn nearest_assignment(sites: &[Site], depots: &[Depot]) -> Result<Assignment> {
    let mut assignment = vec![None; sites.len()];
    for (site_index, site) in sites.iter().enumerate() {
        let coord = match site.coord {
            Some(coord) => coord,
            None => continue,
        };
        let mut best: Option<(usize, f64)> = None;
        for (depot_index, depot) in depots.iter().enumerate() {
            let d = geo::haversine_km(coord, depot_coord(depot)?);
            if best.map_or(true, |(_, best_d)| d < best_d) {
                best = Some((depot_index, d));
            }
        }
        assignment[site_index] = best.map(|(i, _)| i);
    }
    Ok(assignment)
}

/// Estimate one depot's weekly P&L from its assigned sites.
pub fn estimate_depot_pnl(
    depot: &Depot,
    depot_coord: Point,
    assigned: &[&Site],
    costs: &CostParams,
) -> DepotEstimate {
    let fixed_cost = if assigned.is_empty() {
        0.0
    } else {
        depot.max_trucks as f64 * costs.truck_fixed_weekly()
    };

    let mut weekly_revenue = 0.0;
    let mut weekly_lbs = 0.0;
    let mut variable_cost = 0.0;

    for site in assigned {
        let weekly_visits = site.weekly_visits() as f64;
        weekly_revenue += site.revenue_per_visit * weekly_visits;
        weekly_lbs += site.demand_per_visit_lbs as f64 * weekly_visits;

        if let Some(coord) = site.coord {
            // Chained routes amortize the round trip; the road factor
            // doubles as that amortization here.
            let est_km = geo::haversine_km(depot_coord, coord) * costs.road_factor;
            let driving_cost = est_km * costs.variable_cost_per_km();
            let driver_cost = est_km / costs.average_speed_kmh * costs.driver_wage_per_hour;
            variable_cost += (driving_cost + driver_cost) * weekly_visits;
        }
    }

    DepotEstimate {
        depot_key: depot.key.clone(),
        num_sites: assigned.len(),
        weekly_revenue,
        fixed_cost,
        variable_cost,
        net_profit: weekly_revenue - fixed_cost - variable_cost,
        total_weekly_lbs: weekly_lbs,
    }
}

struct NetworkState {
    total: f64,
    estimates: Vec<Option<DepotEstimate>>,
}

fn compute_network(
    sites: &[Site],
    depots: &[Depot],
    assignment: &Assignment,
    open: &[bool],
    costs: &CostParams,
) -> Result<NetworkState> {
    let mut estimates = vec![None; depots.len()];
    let mut total = 0.0;
    for (depot_index, depot) in depots.iter().enumerate() {
        if !open[depot_index] {
            continue;
        }
        let assigned: Vec<&Site> = sites
            .iter()
            .enumerate()
            .filter(|(i, _)| assignment[*i] == Some(depot_index))
            .map(|(_, s)| s)
            .collect();
        let estimate = estimate_depot_pnl(depot, depot_coord(depot)?, &assigned, costs);
        total += estimate.net_profit;
        estimates[depot_index] = Some(estimate);
    }
    Ok(NetworkState { total, estimates })
}

/// Run the greedy closure loop.
///
/// Starts from the nearest-depot assignment, then repeatedly simulates
/// closing the open non-anchor depot with the lowest estimated net,
/// reassigning its sites to their next-nearest open depot. The closure is
/// committed only when total network profit improves; the first
/// non-improving simulation is reverted and the loop stops.
pub fn select_depots(sites: &[Site], depots: &[Depot], costs: &CostParams) -> Result<Selection> {
    let anchor_index = depots
        .iter()
        .position(|d| d.anchor)
        .ok_or_else(|| Error::Invariant("no anchor depot configured".to_string()))?;

    let mut assignment = nearest_assignment(sites, depots)?;
    let mut open = vec![true; depots.len()];
    let mut closed = Vec::new();

    // Per-site depot distances, nearest first, for reassignment. Ties
    // break on configuration order.
    let mut site_depot_dists: Vec<Vec<(usize, f64)>> = Vec::with_capacity(sites.len());
    for site in sites {
        let mut dists = Vec::new();
        if let Some(coord) = site.coord {
            for (depot_index, depot) in depots.iter().enumerate() {
                dists.push((depot_index, geo::haversine_km(coord, depot_coord(depot)?)));
            }
            dists.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap().then(a.0.cmp(&b.0)));
        }
        site_depot_dists.push(dists);
    }

    let mut state = compute_network(sites, depots, &assignment, &open, costs)?;

    loop {
        // Lowest-net open depot, anchor excluded. Stable on ties.
        let worst = state
            .estimates
            .iter()
            .enumerate()
            .filter(|(i, e)| *i != anchor_index && e.is_some())
            .min_by(|(ai, a), (bi, b)| {
                let an = a.as_ref().unwrap().net_profit;
                let bn = b.as_ref().unwrap().net_profit;
                an.partial_cmp(&bn).unwrap().then(ai.cmp(bi))
            })
            .map(|(i, _)| i);

        let worst_index = match worst {
            Some(i) => i,
            None => break,
        };

        // Simulate: shift every site of the candidate to its next-nearest
        // open depot. The anchor is always open, so nobody is orphaned.
        let saved_assignment = assignment.clone();
        for (site_index, assigned) in assignment.iter_mut().enumerate() {
            if *assigned != Some(worst_index) {
                continue;
            }
            let next = site_depot_dists[site_index]
                .iter()
                .find(|(depot_index, _)| *depot_index != worst_index && open[*depot_index])
                .map(|(depot_index, _)| *depot_index);
            *assigned = next;
        }
        open[worst_index] = false;

        let candidate_state = compute_network(sites, depots, &assignment, &open, costs)?;

        if candidate_state.total > state.total {
            let moved = saved_assignment
                .iter()
                .zip(assignment.iter())
                .filter(|(before, after)| before != after)
                .count();
            closed.push(ClosedDepot {
                key: depots[worst_index].key.clone(),
                reason: format!(
                    "closing saves ${:.0}/week; {} sites reassigned",
                    candidate_state.total - state.total,
                    moved
                ),
            });
            state = candidate_state;
        } else {
            open[worst_index] = true;
            assignment = saved_assignment;
            break;
        }
    }

    if !open[anchor_index] {
        return Err(Error::Invariant("anchor depot ended up closed".to_string()));
    }
    for (site_index, assigned) in assignment.iter().enumerate() {
        if let Some(depot_index) = assigned {
            if !open[*depot_index] {
                return Err(Error::Invariant(format!(
                    "site {} assigned to closed depot '{}'",
                    sites[site_index].site_id, depots[*depot_index].key
                )));
            }
        }
    }

    let open_indices: Vec<usize> = (0..depots.len()).filter(|&i| open[i]).collect();
    let estimates: Vec<DepotEstimate> = open_indices
        .iter()
        .map(|&i| state.estimates[i].clone().expect("open depot has estimate"))
        .collect();

    Ok(Selection {
        open: open_indices,
        closed,
        assignment,
        estimates,
        network_profit: state.total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Frequency;

    // ~1 degree latitude is ~111 km; offsets below keep distances honest.
    fn depot(key: &str, lat: f64, lon: f64, max_trucks: u32, anchor: bool) -> Depot {
        Depot {
            key: key.to_string(),
            name: key.to_string(),
            address: String::new(),
            coord: Some(Point::new(lat, lon)),
            max_trucks,
            anchor,
        }
    }

    fn site(site_id: u32, lat: f64, lon: f64, revenue: f64, frequency: Frequency) -> Site {
        Site {
            site_id,
            address: format!("{} Test St", site_id),
            coord: Some(Point::new(lat, lon)),
            frequency,
            bins: 1,
            annual_lbs: 0.0,
            annual_visits: frequency.annual_visits(),
            demand_per_visit_lbs: 100,
            revenue_per_visit: revenue,
            structural_cost_per_visit: 0.0,
            net_contribution_per_visit: revenue,
            service_minutes: 15,
            annual_site_value: 0.0,
        }
    }

    #[test]
    fn test_nearest_assignment() {
        let depots = vec![
            depot("wh", 43.70, -79.40, 20, true),
            depot("north", 44.40, -79.40, 1, false),
        ];
        let sites = vec![
            site(1, 43.71, -79.41, 30.0, Frequency::D1),
            site(2, 44.39, -79.39, 30.0, Frequency::D1),
        ];
        let assignment = nearest_assignment(&sites, &depots).unwrap();
        assert_eq!(assignment, vec![Some(0), Some(1)]);
    }

    #[test]
    fn test_unresolved_site_unassigned() {
        let depots = vec![depot("wh", 43.70, -79.40, 20, true)];
        let mut s = site(1, 43.71, -79.41, 30.0, Frequency::D1);
        s.coord = None;
        let assignment = nearest_assignment(&[s], &depots).unwrap();
        assert_eq!(assignment, vec![None]);
    }

    #[test]
    fn test_estimate_pnl_formula() {
        let costs = CostParams::default();
        let d = depot("wh", 43.70, -79.40, 1, true);
        let s = site(1, 43.70, -79.40, 30.0, Frequency::D1); // zero distance
        let estimate = estimate_depot_pnl(&d, d.coord.unwrap(), &[&s], &costs);

        assert_eq!(estimate.num_sites, 1);
        assert!((estimate.weekly_revenue - 210.0).abs() < 1e-9);
        assert!((estimate.fixed_cost - costs.truck_fixed_weekly()).abs() < 1e-9);
        assert!(estimate.variable_cost.abs() < 1e-9);
        assert!(estimate.net_profit < 0.0, "one small site cannot carry a truck");
    }

    #[test]
    fn test_empty_depot_costs_nothing() {
        let costs = CostParams::default();
        let d = depot("empty", 43.0, -79.0, 3, false);
        let estimate = estimate_depot_pnl(&d, d.coord.unwrap(), &[], &costs);
        assert_eq!(estimate.fixed_cost, 0.0);
        assert_eq!(estimate.net_profit, 0.0);
    }

    #[test]
    fn test_unprofitable_satellites_close() {
        // Six regional depots each serving one $50/week site cannot cover
        // a ~$636/week truck. Everything folds into the anchor.
        let mut depots = vec![depot("wh", 43.70, -79.40, 20, true)];
        let mut sites = vec![];
        for i in 0..6u32 {
            let lat = 43.80 + i as f64 * 0.05;
            depots.push(depot(&format!("sat{}", i), lat, -79.40, 1, false));
            // One weekly visit worth $50
            sites.push(site(700 + i, lat + 0.005, -79.40, 50.0, Frequency::D5));
        }

        let selection = select_depots(&sites, &depots, &CostParams::default()).unwrap();

        assert_eq!(selection.open, vec![0], "only the anchor stays open");
        assert_eq!(selection.closed.len(), 6);
        for assigned in &selection.assignment {
            assert_eq!(*assigned, Some(0), "all sites reassigned to the anchor");
        }
    }

    #[test]
    fn test_profitable_depot_stays_open() {
        let depots = vec![
            depot("wh", 43.70, -79.40, 1, true),
            depot("far", 45.40, -75.70, 1, false),
        ];
        // A dense profitable cluster near the satellite: closing it would
        // send 200+ km round trips to the anchor.
        let mut sites = vec![];
        for i in 0..10u32 {
            sites.push(site(100 + i, 45.41, -75.70 + i as f64 * 0.001, 500.0, Frequency::D1));
        }

        let selection = select_depots(&sites, &depots, &CostParams::default()).unwrap();
        assert!(selection.is_open(1), "profitable satellite must stay open");
        assert!(selection.closed.is_empty());
    }

    #[test]
    fn test_anchor_never_closes() {
        // The anchor serves nothing and the satellite is profitable; the
        // anchor still cannot be closed.
        let depots = vec![
            depot("wh", 43.70, -79.40, 1, true),
            depot("busy", 45.40, -75.70, 1, false),
        ];
        let sites: Vec<Site> = (0..10u32)
            .map(|i| site(100 + i, 45.41, -75.70 + i as f64 * 0.001, 500.0, Frequency::D1))
            .collect();

        let selection = select_depots(&sites, &depots, &CostParams::default()).unwrap();
        assert!(selection.is_open(0));
    }

    #[test]
    fn test_reassignment_prefers_next_nearest_open() {
        // Three depots on a line; closing the middle one must send its
        // site to the nearer neighbor, not the anchor across the map.
        let depots = vec![
            depot("wh", 43.00, -79.40, 20, true),
            depot("mid", 44.00, -79.40, 1, false),
            depot("north", 44.30, -79.40, 5, false),
        ];
        let mut sites = vec![site(1, 44.05, -79.40, 20.0, Frequency::D5)];
        // Keep "north" open with real volume
        for i in 0..10u32 {
            sites.push(site(100 + i, 44.31, -79.40 + i as f64 * 0.001, 500.0, Frequency::D1));
        }

        let selection = select_depots(&sites, &depots, &CostParams::default()).unwrap();
        assert!(!selection.is_open(1), "middle depot should close");
        assert_eq!(selection.assignment[0], Some(2), "site moves to next-nearest open depot");
    }
}
