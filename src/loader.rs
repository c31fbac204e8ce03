//! Site catalog loader.
//!
//! Consumes the Site_Table export as CSV: two leading header rows, then
//! one data row per site. Column layout (0-indexed) matches the workbook:
//! 1=Site_ID, 2=Address, 3=FrequencyCode, 4=Bins, 5=Annual_Lbs,
//! 6=RentAnnual, 7=WasteAnnual, 8=Annual_Visits, 9=Lbs_Per_Visit,
//! 10=RevenuePerVisit, 11=ServiceMinutes (annual total, unused),
//! 12=AnnualSiteValue.

use std::collections::HashSet;
use std::path::Path;

use thiserror::Error;

use crate::config::Config;
use crate::types::{Frequency, Site};

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Site table is empty")]
    Empty,

    #[error("Invalid number in row {row}, column {column}: {value}")]
    InvalidNumber {
        row: usize,
        column: &'static str,
        value: String,
    },

    #[error("Row {row}: per-visit demand {demand} lbs exceeds legal payload {limit} lbs")]
    OverLegalPayload { row: usize, demand: u32, limit: u32 },

    #[error("Row {row}: site {site_id} has demand but no bins")]
    NoBins { row: usize, site_id: u32 },
}

/// Parse the site catalog CSV and return the deduplicated site list.
///
/// Rows without a Site_ID or address are skipped. A duplicate Site_ID keeps
/// the first data-bearing occurrence (the catalog carries stub rows at the
/// end with no weight data).
pub fn load_sites(path: &Path, config: &Config) -> Result<Vec<Site>, LoaderError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let mut sites = Vec::new();
    let mut seen_ids: HashSet<u32> = HashSet::new();

    for (row_idx, result) in reader.records().enumerate() {
        let record = result?;
        let row_num = row_idx + 1;

        // Data starts at row 3; the first two rows are headers.
        if row_num < 3 {
            continue;
        }

        let site_id_raw = record.get(1).unwrap_or("");
        let address = record.get(2).unwrap_or("");
        if site_id_raw.is_empty() || address.is_empty() {
            continue;
        }

        let site_id = parse_u32(site_id_raw, row_num, "Site_ID")?;
        let annual_lbs = parse_f64(record.get(5).unwrap_or(""), row_num, "Annual_Lbs")?;

        if seen_ids.contains(&site_id) {
            // Stub duplicate with no weight data; keep the first occurrence.
            if annual_lbs == 0.0 {
                continue;
            }
        }
        seen_ids.insert(site_id);

        let frequency = Frequency::from_code(record.get(3).unwrap_or(""));
        let bins = match record.get(4).map(str::trim) {
            Some("") | None => 1,
            Some(s) => parse_u32(s, row_num, "Bins")?,
        };
        let rent_annual = parse_f64(record.get(6).unwrap_or(""), row_num, "RentAnnual")?;
        let waste_annual = parse_f64(record.get(7).unwrap_or(""), row_num, "WasteAnnual")?;

        // Pre-calculated annual visits from the sheet when present,
        // otherwise derived from the frequency code.
        let annual_visits_raw = parse_f64(record.get(8).unwrap_or(""), row_num, "Annual_Visits")?;
        let annual_visits = if annual_visits_raw > 0.0 {
            annual_visits_raw as u32
        } else {
            frequency.annual_visits()
        };

        let lbs_per_visit_raw = parse_f64(record.get(9).unwrap_or(""), row_num, "Lbs_Per_Visit")?;
        let lbs_per_visit = if lbs_per_visit_raw > 0.0 {
            lbs_per_visit_raw
        } else if annual_visits > 0 {
            annual_lbs / annual_visits as f64
        } else {
            0.0
        };

        let revenue_raw = parse_f64(record.get(10).unwrap_or(""), row_num, "RevenuePerVisit")?;
        let revenue_per_visit = if revenue_raw > 0.0 {
            revenue_raw
        } else {
            lbs_per_visit * config.costs.revenue_per_lb
        };

        let annual_site_value = parse_f64(record.get(12).unwrap_or(""), row_num, "AnnualSiteValue")?;

        let structural_cost_per_visit = if annual_visits > 0 {
            (rent_annual + waste_annual) / annual_visits as f64
        } else {
            0.0
        };

        let demand_per_visit_lbs = lbs_per_visit.round() as u32;
        if demand_per_visit_lbs > config.fleet.max_legal_payload_lbs {
            return Err(LoaderError::OverLegalPayload {
                row: row_num,
                demand: demand_per_visit_lbs,
                limit: config.fleet.max_legal_payload_lbs,
            });
        }
        if bins == 0 && demand_per_visit_lbs > 0 {
            return Err(LoaderError::NoBins { row: row_num, site_id });
        }

        sites.push(Site {
            site_id,
            address: address.to_string(),
            coord: None,
            frequency,
            bins,
            annual_lbs,
            annual_visits,
            demand_per_visit_lbs,
            revenue_per_visit,
            structural_cost_per_visit,
            net_contribution_per_visit: revenue_per_visit - structural_cost_per_visit,
            service_minutes: bins * config.shift.service_minutes_per_bin,
            annual_site_value,
        });
    }

    if sites.is_empty() {
        return Err(LoaderError::Empty);
    }

    Ok(sites)
}

fn parse_f64(s: &str, row: usize, column: &'static str) -> Result<f64, LoaderError> {
    let cleaned = s.trim().replace(',', "");
    if cleaned.is_empty() {
        return Ok(0.0);
    }
    cleaned.parse().map_err(|_| LoaderError::InvalidNumber {
        row,
        column,
        value: s.to_string(),
    })
}

fn parse_u32(s: &str, row: usize, column: &'static str) -> Result<u32, LoaderError> {
    let cleaned = s.trim().replace(',', "");
    if cleaned.is_empty() {
        return Ok(0);
    }
    // The sheet stores integers as floats in places ("52.0")
    cleaned
        .parse::<f64>()
        .map(|v| v as u32)
        .map_err(|_| LoaderError::InvalidNumber {
            row,
            column,
            value: s.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HEADER: &str = "\
,Site_ID,Address,FrequencyCode,Bins,Annual_Lbs,RentAnnual,WasteAnnual,Annual_Visits,Lbs_Per_Visit,RevenuePerVisit,ServiceMinutes,AnnualSiteValue
,,,,,,,,,,,,
";

    fn write_catalog(rows: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}{}", HEADER, rows).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_basic_site() {
        let file = write_catalog(",101,123 Main St,D1,2,182000,3640,1820,364,500,150,,50000\n");
        let sites = load_sites(file.path(), &Config::default()).unwrap();
        assert_eq!(sites.len(), 1);

        let s = &sites[0];
        assert_eq!(s.site_id, 101);
        assert_eq!(s.frequency, Frequency::D1);
        assert_eq!(s.bins, 2);
        assert_eq!(s.demand_per_visit_lbs, 500);
        assert_eq!(s.service_minutes, 30);
        assert!((s.revenue_per_visit - 150.0).abs() < 1e-9);
        // (3640 + 1820) / 364 = 15
        assert!((s.structural_cost_per_visit - 15.0).abs() < 1e-9);
        assert!((s.net_contribution_per_visit - 135.0).abs() < 1e-9);
    }

    #[test]
    fn test_derived_fields_recomputed() {
        // No pre-calculated lbs/visit or revenue: derive from annual totals.
        let file = write_catalog(",102,45 Oak Ave,D5,1,5200,0,0,52,,,,\n");
        let sites = load_sites(file.path(), &Config::default()).unwrap();
        let s = &sites[0];
        assert_eq!(s.annual_visits, 52);
        assert_eq!(s.demand_per_visit_lbs, 100);
        // 100 lbs x $0.30
        assert!((s.revenue_per_visit - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_duplicate_stub_skipped() {
        let rows = "\
,103,1 First St,D1,1,36400,0,0,364,100,30,,0
,103,1 First St,D1,1,0,0,0,,,,,
";
        let file = write_catalog(rows);
        let sites = load_sites(file.path(), &Config::default()).unwrap();
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].demand_per_visit_lbs, 100);
    }

    #[test]
    fn test_rows_without_id_skipped() {
        let rows = "\
,,No Id St,D1,1,100,0,0,,,,,
,104,2 Second St,D4,1,15600,0,0,156,100,30,,0
";
        let file = write_catalog(rows);
        let sites = load_sites(file.path(), &Config::default()).unwrap();
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].site_id, 104);
    }

    #[test]
    fn test_over_payload_rejected() {
        let file = write_catalog(",105,9 Heavy Rd,D1,4,0,0,0,364,6500,,,\n");
        let err = load_sites(file.path(), &Config::default()).unwrap_err();
        assert!(matches!(err, LoaderError::OverLegalPayload { .. }));
    }

    #[test]
    fn test_demand_without_bins_rejected() {
        let file = write_catalog(",106,7 Binless Way,D1,0,36400,0,0,364,100,30,,0\n");
        let err = load_sites(file.path(), &Config::default()).unwrap_err();
        assert!(matches!(err, LoaderError::NoBins { .. }));
    }

    #[test]
    fn test_malformed_number_rejected() {
        let file = write_catalog(",107,3 Bad Row,D1,1,not-a-number,0,0,364,100,30,,0\n");
        let err = load_sites(file.path(), &Config::default()).unwrap_err();
        assert!(matches!(err, LoaderError::InvalidNumber { column: "Annual_Lbs", .. }));
    }

    #[test]
    fn test_empty_catalog_rejected() {
        let file = write_catalog("");
        assert!(matches!(
            load_sites(file.path(), &Config::default()),
            Err(LoaderError::Empty)
        ));
    }
}
