//! Distance, time, and arc-cost matrices for routing sub-problems.
//!
//! Given an ordered point list (depot first, then visit nodes) this builds
//! the three matrices the solver consumes, in one shot so their dimensions
//! always agree. Cells the distance source cannot supply fall back to
//! haversine with the road factor; downstream code cannot tell the
//! difference, which is deliberate.
//!
//! All money enters integer territory here: arc costs are rounded to cents
//! at this boundary and stay integral through the solver and the
//! post-solve filter.

use crate::config::CostParams;
use crate::geo::{self, Point};

/// One directed leg from a distance source.
#[derive(Debug, Clone, Copy)]
pub struct Leg {
    pub dist_km: f64,
    pub time_min: u32,
}

/// Supplies road legs for point pairs. Cells it cannot answer are `None`
/// and fall back to the straight-line estimate.
pub trait DistanceSource {
    fn legs_for(&mut self, points: &[Point]) -> Vec<Vec<Option<Leg>>>;
}

/// A source with no oracle behind it; every cell falls back.
pub struct NoOracle;

impl DistanceSource for NoOracle {
    fn legs_for(&mut self, points: &[Point]) -> Vec<Vec<Option<Leg>>> {
        vec![vec![None; points.len()]; points.len()]
    }
}

/// Distance (km), travel time (whole minutes), and arc cost (cents)
/// matrices over one sub-problem's node list.
#[derive(Debug, Clone)]
pub struct TravelMatrices {
    pub dist_km: Vec<Vec<f64>>,
    pub time_min: Vec<Vec<u32>>,
    pub cost_cents: Vec<Vec<i64>>,
}

impl TravelMatrices {
    pub fn len(&self) -> usize {
        self.dist_km.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dist_km.is_empty()
    }
}

/// Build all three matrices for a point list.
pub fn build_matrices(
    points: &[Point],
    source: &mut dyn DistanceSource,
    costs: &CostParams,
) -> TravelMatrices {
    let n = points.len();
    let legs = source.legs_for(points);

    let mut dist_km = vec![vec![0.0; n]; n];
    let mut time_min = vec![vec![0u32; n]; n];

    for i in 0..n {
        for j in 0..n {
            if i == j {
                continue;
            }
            let leg = match legs[i][j] {
                Some(leg) => leg,
                None => fallback_leg(points[i], points[j], costs),
            };
            dist_km[i][j] = leg.dist_km;
            time_min[i][j] = leg.time_min;
        }
    }

    let cost_cents = build_cost_matrix(&dist_km, &time_min, costs);

    TravelMatrices {
        dist_km,
        time_min,
        cost_cents,
    }
}

/// Straight-line estimate: haversine times road factor, timed at the
/// average speed.
pub fn fallback_leg(from: Point, to: Point, costs: &CostParams) -> Leg {
    let dist_km = geo::road_km(from, to, costs.road_factor);
    Leg {
        dist_km,
        time_min: geo::travel_minutes(dist_km, costs.average_speed_kmh),
    }
}

/// Combined arc cost in cents: per-km variable cost plus driver wage for
/// the travel time.
fn build_cost_matrix(
    dist_km: &[Vec<f64>],
    time_min: &[Vec<u32>],
    costs: &CostParams,
) -> Vec<Vec<i64>> {
    let n = dist_km.len();
    let mut cost = vec![vec![0i64; n]; n];
    for i in 0..n {
        for j in 0..n {
            if i == j {
                continue;
            }
            let dist_cents = (dist_km[i][j] * costs.variable_cost_per_km() * 100.0).round() as i64;
            let time_cents = ((time_min[i][j] as f64 / 60.0)
                * costs.driver_wage_per_hour
                * 100.0)
                .round() as i64;
            cost[i][j] = dist_cents + time_cents;
        }
    }
    cost
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points() -> Vec<Point> {
        vec![
            Point::new(43.70, -79.40),
            Point::new(43.80, -79.40),
            Point::new(43.70, -79.50),
        ]
    }

    #[test]
    fn test_diagonal_is_zero() {
        let m = build_matrices(&points(), &mut NoOracle, &CostParams::default());
        for i in 0..3 {
            assert_eq!(m.dist_km[i][i], 0.0);
            assert_eq!(m.time_min[i][i], 0);
            assert_eq!(m.cost_cents[i][i], 0);
        }
    }

    #[test]
    fn test_fallback_symmetric() {
        let m = build_matrices(&points(), &mut NoOracle, &CostParams::default());
        for i in 0..3 {
            for j in 0..3 {
                assert!((m.dist_km[i][j] - m.dist_km[j][i]).abs() < 1e-9);
                assert_eq!(m.time_min[i][j], m.time_min[j][i]);
            }
        }
    }

    #[test]
    fn test_cost_formula() {
        // 10 km, 15 min at default rates:
        // round(10 * 0.39 * 100) + round(15/60 * 24 * 100) = 390 + 600
        let dist = vec![vec![0.0, 10.0], vec![10.0, 0.0]];
        let time = vec![vec![0, 15], vec![15, 0]];
        let cost = build_cost_matrix(&dist, &time, &CostParams::default());
        assert_eq!(cost[0][1], 990);
        assert_eq!(cost[1][0], 990);
    }

    #[test]
    fn test_partial_source_falls_back() {
        struct OneCell;
        impl DistanceSource for OneCell {
            fn legs_for(&mut self, points: &[Point]) -> Vec<Vec<Option<Leg>>> {
                let mut legs = vec![vec![None; points.len()]; points.len()];
                legs[0][1] = Some(Leg {
                    dist_km: 12.5,
                    time_min: 20,
                });
                legs
            }
        }

        let m = build_matrices(&points(), &mut OneCell, &CostParams::default());
        assert!((m.dist_km[0][1] - 12.5).abs() < 1e-9);
        assert_eq!(m.time_min[0][1], 20);
        // The unanswered reverse direction took the fallback instead
        assert!(m.dist_km[1][0] > 0.0);
        assert!(m.time_min[1][0] > 0);
    }

    #[test]
    fn test_fallback_uses_road_factor() {
        let costs = CostParams::default();
        let from = Point::new(43.70, -79.40);
        let to = Point::new(43.80, -79.40);
        let leg = fallback_leg(from, to, &costs);
        let straight = geo::haversine_km(from, to);
        assert!((leg.dist_km - straight * 1.3).abs() < 1e-9);
    }
}
