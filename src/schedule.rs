//! Weekly scheduler: expands site frequency codes into per-day visit lists.
//!
//! Handles the twice-daily split, the deterministic weekly-day assignment,
//! and the holiday rule (holidays keep only profitable sites).

use crate::types::{Frequency, Site, VisitNode};

/// Weekday -> visits due that day (0=Mon..6=Sun).
pub type WeeklySchedule = [Vec<VisitNode>; 7];

/// Weekly sites land on a day derived from their id; no randomness.
pub fn weekly_day(site_id: u32) -> usize {
    (site_id % 7) as usize
}

/// Split a daily total across the two D2 visits. The first visit takes the
/// ceiling so the two always sum back to the daily total.
pub fn split_daily(daily_lbs: u32) -> (u32, u32) {
    let first = daily_lbs.div_ceil(2);
    (first, daily_lbs - first)
}

fn due_today(site: &Site, weekday: usize) -> bool {
    match site.frequency.day_pattern() {
        Some(pattern) => pattern.contains(&weekday),
        None => weekly_day(site.site_id) == weekday,
    }
}

/// Visits due on one weekday. Sites without a coordinate are excluded
/// (they cannot be routed). On holidays only sites with a positive net
/// contribution are emitted.
pub fn daily_visits(sites: &[Site], weekday: usize, is_holiday: bool) -> Vec<VisitNode> {
    let mut visits = Vec::new();

    for (site_index, site) in sites.iter().enumerate() {
        let coord = match site.coord {
            Some(coord) => coord,
            None => continue,
        };

        if !due_today(site, weekday) {
            continue;
        }
        if is_holiday && site.net_contribution_per_visit <= 0.0 {
            continue;
        }

        if site.frequency == Frequency::D2 {
            // Two visits a day; the catalog demand is half the daily total.
            // Bins are emptied each visit, so service time is not halved.
            let daily_total = site.demand_per_visit_lbs * 2;
            let (first, second) = split_daily(daily_total);
            for (visit_number, demand_lbs) in [(1u8, first), (2u8, second)] {
                visits.push(VisitNode {
                    site_index,
                    site_id: site.site_id,
                    visit_number,
                    demand_lbs,
                    service_minutes: site.service_minutes,
                    net_contribution_per_visit: site.net_contribution_per_visit,
                    coord,
                    label: format!("{} (visit {})", site.short_label(), visit_number),
                });
            }
        } else {
            visits.push(VisitNode {
                site_index,
                site_id: site.site_id,
                visit_number: 1,
                demand_lbs: site.demand_per_visit_lbs,
                service_minutes: site.service_minutes,
                net_contribution_per_visit: site.net_contribution_per_visit,
                coord,
                label: site.short_label(),
            });
        }
    }

    visits
}

/// Build the full seven-day schedule.
pub fn weekly_schedule(sites: &[Site], holidays: &[usize]) -> WeeklySchedule {
    std::array::from_fn(|day| daily_visits(sites, day, holidays.contains(&day)))
}

/// Filter one day's visits down to those whose site is assigned to the
/// given depot.
pub fn depot_visits(
    day: &[VisitNode],
    assignment: &[Option<usize>],
    depot_index: usize,
) -> Vec<VisitNode> {
    day.iter()
        .filter(|v| assignment[v.site_index] == Some(depot_index))
        .cloned()
        .collect()
}
