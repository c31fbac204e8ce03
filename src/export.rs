//! Excel export of optimization results

use chrono::Utc;
use rust_xlsxwriter::{Format, Workbook, Worksheet};
use std::path::Path;

use crate::depots::ClosedDepot;
use crate::error::{Error, Result};
use crate::pnl::{DepotPnl, WeeklyPnl};
use crate::types::{DailySolution, DAY_NAMES};

fn excel_err(e: rust_xlsxwriter::XlsxError) -> Error {
    Error::Excel(e.to_string())
}

/// Write the results workbook: Summary, Routes, Dropped, and Depots sheets.
pub fn export_workbook(
    path: &Path,
    solutions: &[DailySolution],
    weekly: &WeeklyPnl,
    depot_pnls: &[DepotPnl],
    closed: &[ClosedDepot],
) -> Result<()> {
    let mut workbook = Workbook::new();

    write_summary_sheet(workbook.add_worksheet(), weekly)?;
    write_routes_sheet(workbook.add_worksheet(), solutions)?;
    write_dropped_sheet(workbook.add_worksheet(), solutions)?;
    write_depots_sheet(workbook.add_worksheet(), depot_pnls, closed)?;

    workbook.save(path).map_err(excel_err)?;
    Ok(())
}

fn write_summary_sheet(sheet: &mut Worksheet, weekly: &WeeklyPnl) -> Result<()> {
    sheet.set_name("Summary").map_err(excel_err)?;
    let header = Format::new().set_bold();

    sheet
        .write_string_with_format(0, 0, "Pickup Planner Weekly Results", &header)
        .map_err(excel_err)?;
    sheet
        .write_string(1, 0, "Generated:")
        .map_err(excel_err)?;
    sheet
        .write_string(1, 1, Utc::now().to_rfc3339().as_str())
        .map_err(excel_err)?;

    let rows: [(&str, f64); 10] = [
        ("Total lbs", weekly.total_lbs as f64),
        ("Total km", weekly.total_km),
        ("Total hours", weekly.total_hours),
        ("Fleet size", weekly.fleet_size as f64),
        ("Driver cost (regular)", weekly.driver_regular_cost),
        ("Driver cost (OT)", weekly.driver_ot_cost),
        ("Vehicle variable cost", weekly.variable_vehicle_cost),
        ("Fixed truck cost", weekly.fixed_truck_cost),
        ("Revenue", weekly.revenue),
        ("Net contribution", weekly.net),
    ];
    for (i, (label, value)) in rows.iter().enumerate() {
        let row = 3 + i as u32;
        sheet.write_string(row, 0, *label).map_err(excel_err)?;
        sheet.write_number(row, 1, *value).map_err(excel_err)?;
    }

    sheet
        .write_string_with_format(14, 0, "Trucks per day", &header)
        .map_err(excel_err)?;
    for (day, trucks) in weekly.trucks_per_day.iter().enumerate() {
        let row = 15 + day as u32;
        sheet.write_string(row, 0, DAY_NAMES[day]).map_err(excel_err)?;
        sheet.write_number(row, 1, *trucks as f64).map_err(excel_err)?;
    }

    Ok(())
}

fn write_routes_sheet(sheet: &mut Worksheet, solutions: &[DailySolution]) -> Result<()> {
    sheet.set_name("Routes").map_err(excel_err)?;
    let header = Format::new().set_bold();

    let headers = [
        "Day",
        "Depot",
        "Truck",
        "Stop #",
        "Site ID",
        "Site",
        "Lbs",
        "Service min",
        "Net/visit",
        "Route lbs",
        "Route km",
        "Route min",
        "Route cost $",
    ];
    for (col, text) in headers.iter().enumerate() {
        sheet
            .write_string_with_format(0, col as u16, *text, &header)
            .map_err(excel_err)?;
    }

    let mut row = 1u32;
    for solution in solutions {
        for route in &solution.routes {
            for (stop_index, stop) in route.stops.iter().enumerate() {
                sheet
                    .write_string(row, 0, DAY_NAMES[solution.weekday])
                    .map_err(excel_err)?;
                sheet
                    .write_string(row, 1, solution.depot_key.as_str())
                    .map_err(excel_err)?;
                sheet
                    .write_number(row, 2, (route.vehicle_id + 1) as f64)
                    .map_err(excel_err)?;
                sheet
                    .write_number(row, 3, (stop_index + 1) as f64)
                    .map_err(excel_err)?;
                sheet
                    .write_number(row, 4, stop.visit.site_id as f64)
                    .map_err(excel_err)?;
                sheet
                    .write_string(row, 5, stop.visit.label.as_str())
                    .map_err(excel_err)?;
                sheet
                    .write_number(row, 6, stop.visit.demand_lbs as f64)
                    .map_err(excel_err)?;
                sheet
                    .write_number(row, 7, stop.visit.service_minutes as f64)
                    .map_err(excel_err)?;
                sheet
                    .write_number(row, 8, stop.visit.net_contribution_per_visit)
                    .map_err(excel_err)?;
                sheet
                    .write_number(row, 9, route.total_lbs as f64)
                    .map_err(excel_err)?;
                sheet
                    .write_number(row, 10, route.total_km)
                    .map_err(excel_err)?;
                sheet
                    .write_number(row, 11, route.total_minutes as f64)
                    .map_err(excel_err)?;
                sheet
                    .write_number(row, 12, route.cost_cents as f64 / 100.0)
                    .map_err(excel_err)?;
                row += 1;
            }
        }
    }

    Ok(())
}

fn write_dropped_sheet(sheet: &mut Worksheet, solutions: &[DailySolution]) -> Result<()> {
    sheet.set_name("Dropped").map_err(excel_err)?;
    let header = Format::new().set_bold();

    let headers = ["Day", "Depot", "Site ID", "Site", "Lbs", "Net/visit", "Reason"];
    for (col, text) in headers.iter().enumerate() {
        sheet
            .write_string_with_format(0, col as u16, *text, &header)
            .map_err(excel_err)?;
    }

    let mut row = 1u32;
    for solution in solutions {
        for dropped in &solution.dropped {
            sheet
                .write_string(row, 0, DAY_NAMES[solution.weekday])
                .map_err(excel_err)?;
            sheet
                .write_string(row, 1, solution.depot_key.as_str())
                .map_err(excel_err)?;
            sheet
                .write_number(row, 2, dropped.visit.site_id as f64)
                .map_err(excel_err)?;
            sheet
                .write_string(row, 3, dropped.visit.label.as_str())
                .map_err(excel_err)?;
            sheet
                .write_number(row, 4, dropped.visit.demand_lbs as f64)
                .map_err(excel_err)?;
            sheet
                .write_number(row, 5, dropped.visit.net_contribution_per_visit)
                .map_err(excel_err)?;
            sheet
                .write_string(row, 6, dropped.reason.label())
                .map_err(excel_err)?;
            row += 1;
        }
    }

    Ok(())
}

fn write_depots_sheet(
    sheet: &mut Worksheet,
    depot_pnls: &[DepotPnl],
    closed: &[ClosedDepot],
) -> Result<()> {
    sheet.set_name("Depots").map_err(excel_err)?;
    let header = Format::new().set_bold();

    let headers = [
        "Depot", "Lbs", "Km", "Hours", "Fleet", "Revenue", "Driver cost", "Variable cost",
        "Fixed cost", "Net", "Status", "Notes",
    ];
    for (col, text) in headers.iter().enumerate() {
        sheet
            .write_string_with_format(0, col as u16, *text, &header)
            .map_err(excel_err)?;
    }

    let mut row = 1u32;
    for pnl in depot_pnls {
        sheet.write_string(row, 0, pnl.depot_key.as_str()).map_err(excel_err)?;
        sheet.write_number(row, 1, pnl.lbs as f64).map_err(excel_err)?;
        sheet.write_number(row, 2, pnl.km).map_err(excel_err)?;
        sheet.write_number(row, 3, pnl.hours).map_err(excel_err)?;
        sheet.write_number(row, 4, pnl.fleet as f64).map_err(excel_err)?;
        sheet.write_number(row, 5, pnl.revenue).map_err(excel_err)?;
        sheet.write_number(row, 6, pnl.driver_cost).map_err(excel_err)?;
        sheet.write_number(row, 7, pnl.variable_cost).map_err(excel_err)?;
        sheet.write_number(row, 8, pnl.fixed_cost).map_err(excel_err)?;
        sheet.write_number(row, 9, pnl.net).map_err(excel_err)?;
        sheet
            .write_string(row, 10, if pnl.is_marginal() { "MARGINAL" } else { "KEEP" })
            .map_err(excel_err)?;
        row += 1;
    }

    for depot in closed {
        sheet.write_string(row, 0, depot.key.as_str()).map_err(excel_err)?;
        sheet.write_string(row, 10, "CLOSED").map_err(excel_err)?;
        sheet.write_string(row, 11, depot.reason.as_str()).map_err(excel_err)?;
        row += 1;
    }

    Ok(())
}
