//! Point-in-zone resolution over the polygon boundaries of the registry.

use tracing::warn;

use crate::model::{GeoPoint, Zone, ZoneId};

/// Slack used when deciding whether a point lies on a boundary edge, in degrees.
const EDGE_TOLERANCE: f64 = 1e-12;

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
/// The point handed to [`resolve`] cannot be located on the globe.
pub enum ResolveError {
    /// Non-finite or out-of-range coordinates.
    #[error("Invalid point: {0}")]
    InvalidPoint(GeoPoint),
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
/// Why a zone boundary cannot be used for containment tests.
pub enum GeometryError {
    /// Fewer than three distinct vertices.
    #[error("boundary has {count} vertices, at least 3 are required")]
    TooFewVertices {
        /// Distinct vertices of the boundary.
        count: usize,
    },
    /// A vertex has a NaN or infinite coordinate.
    #[error("vertex {index} has a non-finite coordinate")]
    NonFiniteCoordinate {
        /// Position of the offending vertex in the boundary.
        index: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Non-fatal findings of a resolution pass.
pub enum ResolveWarning {
    /// A zone was skipped because its boundary is unusable.
    InvalidGeometry {
        /// Skipped zone.
        zone: ZoneId,
        /// What is wrong with it.
        error: GeometryError,
    },
    /// The point lies in more than one zone; the first in registry order was kept.
    ZoneOverlap {
        /// Zone returned by the resolution.
        selected: ZoneId,
        /// Another zone that also contains the point.
        also: ZoneId,
    },
}

#[derive(Debug, Clone)]
/// Outcome of resolving a valid point.
pub struct Resolution<'z> {
    /// The containing zone, or `None` when the point is outside every zone.
    pub zone: Option<&'z Zone>,
    /// Skipped zones and overlaps encountered on the way.
    pub warnings: Vec<ResolveWarning>,
}

/// Find the zone whose boundary encloses `point`.
///
/// Zones are tested in the given order and the first containing zone wins. Every
/// other zone that also contains the point is reported as a
/// [`ResolveWarning::ZoneOverlap`]. Zones with an unusable boundary are skipped and
/// reported as [`ResolveWarning::InvalidGeometry`]. Points on an edge count as inside.
///
/// # Errors
///
/// Returns [`ResolveError::InvalidPoint`] when `point` is not a valid coordinate. A
/// valid point that lies in no zone is not an error; it yields `zone: None`.
pub fn resolve(point: GeoPoint, zones: &[Zone]) -> Result<Resolution<'_>, ResolveError> {
    if !point.is_valid() {
        return Err(ResolveError::InvalidPoint(point));
    }

    let mut selected: Option<&Zone> = None;
    let mut warnings = Vec::new();

    for zone in zones {
        let ring = match validate_ring(&zone.boundary) {
            Ok(ring) => ring,
            Err(error) => {
                warn!(zone = %zone.id, %error, "skipping zone with invalid geometry");
                warnings.push(ResolveWarning::InvalidGeometry {
                    zone: zone.id.clone(),
                    error,
                });
                continue;
            }
        };

        if !ring_contains(ring, point) {
            continue;
        }

        match selected {
            None => selected = Some(zone),
            Some(first) => {
                warn!(
                    selected = %first.id,
                    also = %zone.id,
                    %point,
                    "point lies in overlapping zones"
                );
                warnings.push(ResolveWarning::ZoneOverlap {
                    selected: first.id.clone(),
                    also: zone.id.clone(),
                });
            }
        }
    }

    Ok(Resolution {
        zone: selected,
        warnings,
    })
}

/// Check a boundary and return the ring without a repeated closing vertex.
///
/// # Errors
///
/// Returns a [`GeometryError`] for non-finite vertices or fewer than three distinct
/// vertices.
pub fn validate_ring(boundary: &[GeoPoint]) -> Result<&[GeoPoint], GeometryError> {
    if let Some(index) = boundary.iter().position(|vertex| !vertex.is_finite()) {
        return Err(GeometryError::NonFiniteCoordinate { index });
    }

    let ring = match boundary {
        [first, .., last] if same_vertex(*first, *last) => {
            boundary.split_last().map_or(boundary, |(_, rest)| rest)
        }
        _ => boundary,
    };

    // Repeated vertices only add zero-length edges, which ray casting ignores.
    let distinct = ring
        .iter()
        .enumerate()
        .filter(|&(index, vertex)| {
            ring.iter()
                .take(index)
                .all(|earlier| !same_vertex(*earlier, *vertex))
        })
        .count();
    if distinct < 3 {
        return Err(GeometryError::TooFewVertices { count: distinct });
    }
    Ok(ring)
}

/// Even-odd ray casting with the ring implicitly closed. Boundary points are inside.
#[must_use]
pub fn ring_contains(ring: &[GeoPoint], point: GeoPoint) -> bool {
    let edges = ring.iter().zip(ring.iter().cycle().skip(1));
    let mut inside = false;

    for (start, end) in edges {
        if on_segment(*start, *end, point) {
            return true;
        }

        // Cast the ray towards increasing longitude.
        if (start.lat > point.lat) != (end.lat > point.lat) {
            let crossing_lon =
                start.lon + (point.lat - start.lat) / (end.lat - start.lat) * (end.lon - start.lon);
            if point.lon < crossing_lon {
                inside = !inside;
            }
        }
    }

    inside
}

fn on_segment(start: GeoPoint, end: GeoPoint, point: GeoPoint) -> bool {
    let cross = (end.lon - start.lon) * (point.lat - start.lat)
        - (end.lat - start.lat) * (point.lon - start.lon);
    if cross.abs() > EDGE_TOLERANCE {
        return false;
    }

    let within = |value: f64, bound_a: f64, bound_b: f64| {
        value >= bound_a.min(bound_b) - EDGE_TOLERANCE
            && value <= bound_a.max(bound_b) + EDGE_TOLERANCE
    };
    within(point.lat, start.lat, end.lat) && within(point.lon, start.lon, end.lon)
}

fn same_vertex(left: GeoPoint, right: GeoPoint) -> bool {
    (left.lat - right.lat).abs() <= EDGE_TOLERANCE
        && (left.lon - right.lon).abs() <= EDGE_TOLERANCE
}
