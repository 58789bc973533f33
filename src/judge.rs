//! Post-flight landing point judgement against restricted areas.
//!
//! Areas are described in geodetic coordinates, `[latitude, longitude]` in
//! degrees. A landing passes only if every configured area constraint is
//! satisfied.

use serde::Deserialize;

use crate::sim::environment::deg_to_meters_at;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaMode {
    /// The landing point must fall inside the area.
    Inside,
    /// The landing point must stay outside the area.
    Outside,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RestrictedArea {
    Circle {
        name: String,
        /// Center as `[lat, lon]` degrees.
        center: [f64; 2],
        radius_m: f64,
        mode: AreaMode,
    },
    Polygon {
        name: String,
        /// Ordered vertex ring as `[lat, lon]` degrees, first vertex
        /// repeated at the end to close the ring.
        points: Vec<[f64; 2]>,
        mode: AreaMode,
    },
    /// A boundary line; the landing must end up on the same side as the
    /// launch rail.
    Line {
        name: String,
        end_a: [f64; 2],
        end_b: [f64; 2],
        /// Rail position as `[lat, lon]` degrees, the reference side.
        rail: [f64; 2],
    },
}

impl RestrictedArea {
    pub fn name(&self) -> &str {
        match self {
            RestrictedArea::Circle { name, .. }
            | RestrictedArea::Polygon { name, .. }
            | RestrictedArea::Line { name, .. } => name,
        }
    }

    /// True when the point satisfies this constraint.
    pub fn judge(&self, lat_deg: f64, lon_deg: f64) -> bool {
        match self {
            RestrictedArea::Circle {
                center,
                radius_m,
                mode,
                ..
            } => {
                let deg2met = deg_to_meters_at(center[0]);
                let dlat = (lat_deg - center[0]) * deg2met;
                let dlon = (lon_deg - center[1]) * deg2met;
                let distance = dlat.hypot(dlon);
                match mode {
                    AreaMode::Inside => distance < *radius_m,
                    AreaMode::Outside => distance > *radius_m,
                }
            }
            RestrictedArea::Polygon { points, mode, .. } => {
                let inside = point_in_ring(points, lat_deg, lon_deg);
                match mode {
                    AreaMode::Inside => inside,
                    AreaMode::Outside => !inside,
                }
            }
            RestrictedArea::Line {
                end_a, end_b, rail, ..
            } => {
                let side_point = line_side(end_a, end_b, lat_deg, lon_deg);
                let side_rail = line_side(end_a, end_b, rail[0], rail[1]);
                side_point == side_rail
            }
        }
    }
}

/// Even-odd ray cast in the +latitude direction, edge cases matching the
/// half-open treatment of vertex hits on the first endpoint.
fn point_in_ring(points: &[[f64; 2]], lat: f64, lon: f64) -> bool {
    let mut crossings = 0usize;
    for pair in points.windows(2) {
        let (p0, p1) = (pair[0], pair[1]);
        let lon_min = p0[1].min(p1[1]);
        let lon_max = p0[1].max(p1[1]);

        if lon == p0[1] {
            if lat < p0[0] {
                crossings += 1;
            }
        } else if lon_min < lon && lon < lon_max {
            let dlat = p1[0] - p0[0];
            let dlon = p1[1] - p0[1];
            if dlon == 0.0 {
                continue;
            }
            if dlat == 0.0 {
                if lat < p0[0] {
                    crossings += 1;
                }
            } else {
                let slope = dlon / dlat;
                let intercept = p0[1] - slope * p0[0];
                let crossing_lat = (lon - intercept) / slope;
                if lat < crossing_lat {
                    crossings += 1;
                }
            }
        }
    }
    crossings % 2 == 1
}

fn line_side(a: &[f64; 2], b: &[f64; 2], lat: f64, lon: f64) -> bool {
    let cross = (b[0] - a[0]) * (lon - a[1]) - (b[1] - a[1]) * (lat - a[0]);
    cross >= 0.0
}

/// Conjunction of all configured constraints.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct AreaJudgement {
    areas: Vec<RestrictedArea>,
}

impl AreaJudgement {
    pub fn new(areas: Vec<RestrictedArea>) -> Self {
        AreaJudgement { areas }
    }

    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }

    /// True iff the landing point satisfies every area.
    pub fn judge(&self, lat_deg: f64, lon_deg: f64) -> bool {
        self.areas.iter().all(|a| a.judge(lat_deg, lon_deg))
    }

    /// Names of the areas the point violates.
    pub fn violations(&self, lat_deg: f64, lon_deg: f64) -> Vec<&str> {
        self.areas
            .iter()
            .filter(|a| !a.judge(lat_deg, lon_deg))
            .map(|a| a.name())
            .collect()
    }
}
