//! Console report formatting

use std::collections::BTreeMap;

use crate::config::CostParams;
use crate::depots::ClosedDepot;
use crate::pnl::{DepotPnl, WeeklyPnl};
use crate::types::{DailySolution, Site, DAY_NAMES};

/// Routes for a single day across all depots.
pub fn print_daily_report(weekday: usize, solutions: &[&DailySolution]) {
    println!("\n{}", "=".repeat(80));
    println!("  {}", DAY_NAMES[weekday].to_uppercase());
    println!("{}", "=".repeat(80));

    let mut day_trucks = 0u32;
    let mut day_lbs = 0u64;
    let mut day_km = 0.0;
    let mut day_minutes = 0u64;
    let mut day_dropped = 0usize;

    for solution in solutions {
        let stats = &solution.stats;
        if stats.trucks_used == 0 && solution.dropped.is_empty() {
            continue;
        }

        println!("\n  Depot: {}", solution.depot_key.to_uppercase());
        println!(
            "  Trucks used: {} | Lbs: {} | Km: {:.1} | Time: {} min | Dropped: {}",
            stats.trucks_used,
            stats.total_lbs,
            stats.total_km,
            stats.total_minutes,
            solution.dropped.len()
        );

        for route in &solution.routes {
            println!(
                "\n    Truck #{}: {} stops | {} lbs | {:.1} km | {} min",
                route.vehicle_id + 1,
                route.num_stops(),
                route.total_lbs,
                route.total_km,
                route.total_minutes
            );
            for stop in &route.stops {
                println!(
                    "      -> {:<45} {:>5} lbs | {:>3} min | net ${:>8.2}",
                    stop.visit.label,
                    stop.visit.demand_lbs,
                    stop.visit.service_minutes,
                    stop.visit.net_contribution_per_visit
                );
            }
        }

        day_trucks += stats.trucks_used;
        day_lbs += stats.total_lbs as u64;
        day_km += stats.total_km;
        day_minutes += stats.total_minutes as u64;
        day_dropped += solution.dropped.len();
    }

    println!(
        "\n  DAY TOTAL: {} trucks | {} lbs | {:.1} km | {} min driving | {} dropped visits",
        day_trucks, day_lbs, day_km, day_minutes, day_dropped
    );
}

/// Aggregated weekly stats and cost breakdown.
pub fn print_weekly_summary(weekly: &WeeklyPnl, costs: &CostParams) {
    println!("\n{}", "=".repeat(80));
    println!("  WEEKLY SUMMARY");
    println!("{}", "=".repeat(80));

    for (day, trucks) in weekly.trucks_per_day.iter().enumerate() {
        println!("  {:<12} {:>3} trucks", DAY_NAMES[day], trucks);
    }
    println!(
        "\n  Fleet size: {} trucks | {} lbs | {:.1} km | {:.1} hrs",
        weekly.fleet_size, weekly.total_lbs, weekly.total_km, weekly.total_hours
    );
    println!("  (Fleet = sum of per-depot peak trucks; a truck dispatched even once carries its full weekly cost)");

    println!("\n{}", "=".repeat(80));
    println!("  WEEKLY COST BREAKDOWN");
    println!("{}", "=".repeat(80));

    println!(
        "\n  Driver cost (regular):    ${:>12.2}  ({:.1} hrs @ ${}/hr)",
        weekly.driver_regular_cost,
        weekly.total_hours - weekly.ot_hours,
        costs.driver_wage_per_hour
    );
    println!(
        "  Driver cost (OT):         ${:>12.2}  ({:.1} hrs @ ${}/hr)",
        weekly.driver_ot_cost,
        weekly.ot_hours,
        costs.driver_wage_per_hour * costs.ot_multiplier
    );
    println!(
        "\n  Fuel (${}/km):          ${:>12.2}",
        costs.fuel_per_km,
        weekly.total_km * costs.fuel_per_km
    );
    println!(
        "  Maintenance (${}/km):   ${:>12.2}",
        costs.maintenance_per_km,
        weekly.total_km * costs.maintenance_per_km
    );
    println!(
        "  Mileage (${}/km):       ${:>12.2}",
        costs.mileage_per_km,
        weekly.total_km * costs.mileage_per_km
    );
    println!("  Vehicle variable total:   ${:>12.2}", weekly.variable_vehicle_cost);
    println!(
        "\n  Fixed truck cost (weekly): ${:>11.2}  ({} trucks in fleet)",
        weekly.fixed_truck_cost, weekly.fleet_size
    );
    println!("\n  {}", "-".repeat(40));
    println!("  TOTAL WEEKLY COST:        ${:>12.2}", weekly.total_cost);
    println!("  TOTAL WEEKLY REVENUE:     ${:>12.2}", weekly.revenue);
    println!("  NET WEEKLY CONTRIBUTION:  ${:>12.2}", weekly.net);
    if weekly.total_lbs > 0 {
        println!(
            "\n  Cost per pound:           ${:>12.4}",
            weekly.total_cost / weekly.total_lbs as f64
        );
        println!("  Revenue per pound:        ${:>12.2}", costs.revenue_per_lb);
        println!(
            "  Net per pound:            ${:>12.4}",
            weekly.net / weekly.total_lbs as f64
        );
    }
    println!("\n  ANNUALIZED:");
    println!("    Total cost:             ${:>12.0}", weekly.total_cost * 52.0);
    println!("    Total revenue:          ${:>12.0}", weekly.revenue * 52.0);
    println!("    Net contribution:       ${:>12.0}", weekly.net * 52.0);
    println!("    Total lbs collected:    {:>13}", weekly.total_lbs * 52);
}

/// Dropped sites across the week, worst net contribution first.
pub fn print_dropped_sites(solutions: &[DailySolution], sites: &[Site]) {
    let mut unique: BTreeMap<u32, &Site> = BTreeMap::new();
    for solution in solutions {
        for dropped in &solution.dropped {
            if let Some(site) = sites.iter().find(|s| s.site_id == dropped.visit.site_id) {
                unique.insert(site.site_id, site);
            }
        }
    }
    if unique.is_empty() {
        return;
    }

    println!("\n{}", "=".repeat(80));
    println!("  DROPPED SITES ({} unique)", unique.len());
    println!("{}", "=".repeat(80));

    let mut sorted: Vec<&Site> = unique.into_values().collect();
    sorted.sort_by(|a, b| {
        a.net_contribution_per_visit
            .partial_cmp(&b.net_contribution_per_visit)
            .unwrap()
            .then(a.site_id.cmp(&b.site_id))
    });
    for site in sorted {
        println!(
            "  {:<57} Net/visit: ${:>8.2} | Lbs/yr: {:>10.0} | {}",
            site.short_label(),
            site.net_contribution_per_visit,
            site.annual_lbs,
            site.frequency.label()
        );
    }
}

/// Post-solve per-depot P&L, plus closure decisions.
pub fn print_depot_pnl(depot_pnls: &[DepotPnl], closed: &[ClosedDepot]) {
    println!("\n{}", "=".repeat(80));
    println!("  DEPOT PROFITABILITY REPORT (Post-Solve)");
    println!("{}", "=".repeat(80));

    let mut network_net = 0.0;
    for pnl in depot_pnls {
        let status = if pnl.is_marginal() {
            "MARGINAL - consider closing"
        } else {
            "KEEP"
        };
        println!("\n  {}", pnl.depot_key.to_uppercase());
        println!(
            "    Lbs: {:>10} | Km: {:>8.1} | Hours: {:>6.1} | Fleet: {} trucks",
            pnl.lbs, pnl.km, pnl.hours, pnl.fleet
        );
        println!("    Revenue:       ${:>10.2}", pnl.revenue);
        println!("    Driver cost:   ${:>10.2}", pnl.driver_cost);
        println!("    Vehicle var:   ${:>10.2}", pnl.variable_cost);
        println!("    Fixed cost:    ${:>10.2}", pnl.fixed_cost);
        println!("    TOTAL COST:    ${:>10.2}", pnl.total_cost);
        println!("    NET PROFIT:    ${:>+10.2}  [{}]", pnl.net, status);
        network_net += pnl.net;
    }

    if !closed.is_empty() {
        println!("\n  CLOSED DEPOTS:");
        for depot in closed {
            println!("    {}: {}", depot.key.to_uppercase(), depot.reason);
        }
    }

    println!("\n  {}", "-".repeat(60));
    println!("  NETWORK TOTAL NET PROFIT:  ${:>+12.2}/week", network_net);
    println!("  ANNUALIZED:                ${:>+12.0}/year", network_net * 52.0);
    println!(
        "  Open depots: {} | Closed: {}",
        depot_pnls.len(),
        closed.len()
    );
}
