//! Pipeline orchestration: load, geocode, select depots, schedule, solve,
//! aggregate, report.

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use crate::cli::{Cli, OutputFormat};
use crate::config::Config;
use crate::depots::{self, Selection};
use crate::error::{Error, Result};
use crate::geocode::Geocoder;
use crate::matrix::{self, NoOracle};
use crate::oracle::MatrixOracle;
use crate::pnl::{self, DepotPnl, WeeklyPnl};
use crate::solver::{self, DailyProblem, SolveOptions};
use crate::types::{DailySolution, Depot};
use crate::{export, loader, report, schedule};

/// Full run output, also the JSON format payload.
#[derive(Debug, Serialize)]
struct RunSummary<'a> {
    weekly: &'a WeeklyPnl,
    depots: &'a [DepotPnl],
    days: &'a [DailySolution],
}

/// Execute the CLI pipeline.
pub fn execute(cli: Cli) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(seconds) = cli.solver_time {
        config.solver.time_limit_seconds = seconds;
    }

    // Stage 1: site catalog.
    eprintln!("[1/6] Loading site catalog from {}...", cli.input.display());
    let mut sites = loader::load_sites(&cli.input, &config)?;
    eprintln!("      {} sites loaded", sites.len());

    // Stage 2: geocoding.
    eprintln!("[2/6] Resolving coordinates{}...", if cli.skip_geocode { " (cache only)" } else { "" });
    let mut depots: Vec<Depot> = config
        .depots
        .iter()
        .map(|d| Depot {
            key: d.key.clone(),
            name: d.name.clone(),
            address: d.address.clone(),
            coord: None,
            max_trucks: d.max_trucks,
            anchor: d.anchor,
        })
        .collect();

    let mut geocoder = Geocoder::open(&config, cli.skip_geocode)?;
    geocoder.resolve_depots(&mut depots)?;
    let unresolved = geocoder.resolve_sites(&mut sites)?;
    if unresolved > 0 {
        eprintln!("      {} sites without coordinates, excluded from routing", unresolved);
    }
    if cli.verbose {
        eprintln!("      geocode cache holds {} entries", geocoder.cached_entries());
    }

    // Stage 3: depot selection.
    eprintln!("[3/6] Selecting depots...");
    let selection = depots::select_depots(&sites, &depots, &config.costs)?;
    if selection.open.is_empty() {
        return Err(Error::Invariant("no depot remained open".to_string()));
    }
    for closed in &selection.closed {
        eprintln!("      closed {}: {}", closed.key, closed.reason);
    }
    if cli.verbose {
        for estimate in &selection.estimates {
            eprintln!(
                "      {:<12} {:>3} sites | est. net ${:>+9.0}/week",
                estimate.depot_key, estimate.num_sites, estimate.net_profit
            );
        }
        eprintln!("      estimated network profit ${:+.0}/week", selection.network_profit);
    }

    // Stage 4: weekly schedule.
    let holidays: Vec<usize> = cli.holidays.iter().map(|&d| d as usize).collect();
    eprintln!("[4/6] Building weekly schedule...");
    let week = schedule::weekly_schedule(&sites, &holidays);

    // Stage 5: daily sub-problems.
    eprintln!("[5/6] Solving daily routing problems...");
    let solutions = solve_week(&cli, &config, &depots, &selection, &week)?;

    // Stage 6: aggregate and report.
    eprintln!("[6/6] Aggregating results...");
    let (weekly, depot_pnls) = pnl::aggregate(&solutions, &config.costs);

    match cli.format {
        OutputFormat::Json => {
            let summary = RunSummary {
                weekly: &weekly,
                depots: &depot_pnls,
                days: &solutions,
            };
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        OutputFormat::Table => {
            let mut days: Vec<usize> = solutions.iter().map(|s| s.weekday).collect();
            days.sort_unstable();
            days.dedup();
            for day in days {
                let for_day: Vec<&DailySolution> =
                    solutions.iter().filter(|s| s.weekday == day).collect();
                report::print_daily_report(day, &for_day);
            }
            report::print_weekly_summary(&weekly, &config.costs);
            report::print_dropped_sites(&solutions, &sites);
            report::print_depot_pnl(&depot_pnls, &selection.closed);
        }
    }

    if let Some(path) = &cli.output {
        export::export_workbook(path, &solutions, &weekly, &depot_pnls, &selection.closed)?;
        eprintln!("Workbook written to {}", path.display());
    }

    Ok(())
}

/// Solve every (open depot, weekday) sub-problem in stable order:
/// weekday ascending, depot key ascending within the day.
fn solve_week(
    cli: &Cli,
    config: &Config,
    depots: &[Depot],
    selection: &Selection,
    week: &schedule::WeeklySchedule,
) -> Result<Vec<DailySolution>> {
    let mut depot_indices: Vec<usize> = match &cli.depot {
        Some(key) => {
            let index = depots
                .iter()
                .position(|d| &d.key == key)
                .ok_or_else(|| Error::UnknownDepot(key.clone()))?;
            vec![index]
        }
        None => selection.open.clone(),
    };
    depot_indices.sort_by(|&a, &b| depots[a].key.cmp(&depots[b].key));

    let days: Vec<usize> = match cli.day {
        Some(day) => vec![day as usize],
        None => (0..7).collect(),
    };

    let mut oracle = MatrixOracle::from_config(config)?;
    let options = SolveOptions::from_params(&config.solver);

    let bar = ProgressBar::new((days.len() * depot_indices.len()) as u64);
    bar.set_style(
        ProgressStyle::with_template("  {bar:30} {pos}/{len} {msg}")
            .expect("static progress template"),
    );

    let mut solutions = Vec::new();
    for &day in &days {
        for &depot_index in &depot_indices {
            let depot = &depots[depot_index];
            bar.set_message(format!("{} / {}", crate::types::DAY_NAMES[day], depot.key));

            let visits = schedule::depot_visits(&week[day], &selection.assignment, depot_index);
            if visits.is_empty() {
                solutions.push(DailySolution::empty(&depot.key, day));
                bar.inc(1);
                continue;
            }

            let depot_coord = depot.coord.ok_or_else(|| {
                Error::Invariant(format!("depot '{}' has no coordinate", depot.key))
            })?;
            let mut points = Vec::with_capacity(visits.len() + 1);
            points.push(depot_coord);
            points.extend(visits.iter().map(|v| v.coord));

            let matrices = match oracle.as_mut() {
                Some(oracle) => matrix::build_matrices(&points, oracle, &config.costs),
                None => matrix::build_matrices(&points, &mut NoOracle, &config.costs),
            };

            let problem = DailyProblem {
                depot_key: &depot.key,
                weekday: day,
                visits: &visits,
                matrices: &matrices,
                num_vehicles: depot.max_trucks as usize,
                capacity_lbs: config.fleet.target_daily_payload_lbs,
                max_route_minutes: config.shift.effective_driving_minutes(),
                vehicle_fixed_cost_cents: config.costs.solver_fixed_cost_cents(),
            };
            solutions.push(solver::solve(&problem, &options)?);
            bar.inc(1);
        }
    }
    bar.finish_and_clear();

    if let Some(oracle) = oracle.as_mut() {
        oracle.flush_cache()?;
        if cli.verbose && oracle.fetched_pairs() > 0 {
            eprintln!("      {} distance pairs fetched from the oracle", oracle.fetched_pairs());
        }
        if oracle.degraded_pairs() > 0 {
            eprintln!(
                "warning: {} distance pairs fell back to straight-line estimates",
                oracle.degraded_pairs()
            );
        }
    }

    Ok(solutions)
}
