//! Point-in-polygon test for zone boundaries.
//!
//! Latitude is treated as the y axis and longitude as x. Zones are small
//! enough that the planar approximation is fine and nothing crosses the
//! antimeridian.
//!
//! Boundary policy: a point lying exactly on an edge or a vertex counts as
//! inside. Ray casting alone is ambiguous there, so edges are checked first.

use crate::models::zone::GeoPoint;

const EPSILON: f64 = 1e-12;

/// Even-odd ray cast towards +∞ longitude.
///
/// The ring may or may not repeat its first vertex at the end. Fewer than
/// three distinct vertices never contain anything.
pub fn contains(point: &GeoPoint, ring: &[GeoPoint]) -> bool {
    let vertices = normalize(ring);
    if vertices.len() < 3 {
        return false;
    }

    let edges = || {
        vertices
            .iter()
            .zip(vertices.iter().cycle().skip(1))
            .take(vertices.len())
    };

    if edges().any(|(a, b)| on_segment(point, a, b)) {
        return true;
    }

    let mut inside = false;
    for (a, b) in edges() {
        let straddles = (a.lat > point.lat) != (b.lat > point.lat);
        if !straddles {
            continue;
        }

        let crossing_lng = a.lng + (point.lat - a.lat) * (b.lng - a.lng) / (b.lat - a.lat);
        if point.lng < crossing_lng {
            inside = !inside;
        }
    }

    inside
}

/// Whether `ring` can serve as a zone boundary: coordinates in range and at
/// least three distinct vertices.
pub fn is_valid_ring(ring: &[GeoPoint]) -> bool {
    let in_range = ring.iter().all(|v| {
        v.lat.is_finite()
            && v.lng.is_finite()
            && (-90.0..=90.0).contains(&v.lat)
            && (-180.0..=180.0).contains(&v.lng)
    });
    in_range && normalize(ring).len() >= 3
}

/// Drops consecutive duplicates and the explicit closing vertex.
fn normalize(ring: &[GeoPoint]) -> Vec<GeoPoint> {
    let mut vertices: Vec<GeoPoint> = Vec::with_capacity(ring.len());
    for vertex in ring {
        if vertices.last().is_some_and(|last| same_point(last, vertex)) {
            continue;
        }
        vertices.push(*vertex);
    }

    while vertices.len() > 1 && same_point(&vertices[0], &vertices[vertices.len() - 1]) {
        vertices.pop();
    }

    vertices
}

fn same_point(a: &GeoPoint, b: &GeoPoint) -> bool {
    (a.lat - b.lat).abs() <= EPSILON && (a.lng - b.lng).abs() <= EPSILON
}

fn on_segment(p: &GeoPoint, a: &GeoPoint, b: &GeoPoint) -> bool {
    let cross = (b.lng - a.lng) * (p.lat - a.lat) - (b.lat - a.lat) * (p.lng - a.lng);
    if cross.abs() > EPSILON {
        return false;
    }

    p.lng >= a.lng.min(b.lng) - EPSILON
        && p.lng <= a.lng.max(b.lng) + EPSILON
        && p.lat >= a.lat.min(b.lat) - EPSILON
        && p.lat <= a.lat.max(b.lat) + EPSILON
}
