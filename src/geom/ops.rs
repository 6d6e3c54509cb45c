use anyhow::{anyhow, Result};
use geo::{Area, BooleanOps, Intersects, MultiLineString, MultiPolygon, Point, Relate};

/// Planar area in square meters (coordinates are expected in a metric CRS).
pub fn area_m2(polygon: &MultiPolygon<f64>) -> f64 {
    polygon.unsigned_area()
}

/// Planar length in kilometers (coordinates are expected in a metric CRS).
pub fn length_km(line: &MultiLineString<f64>) -> f64 {
    let meters: f64 = line
        .0
        .iter()
        .flat_map(|part| part.lines())
        .map(|segment| (segment.dx() * segment.dx() + segment.dy() * segment.dy()).sqrt())
        .sum();
    meters / 1000.0
}

/// Boundary-inclusive point-in-polygon test.
pub fn point_in_polygon(point: &Point<f64>, polygon: &MultiPolygon<f64>) -> bool {
    polygon.intersects(point)
}

/// Indices of the points that lie within the polygon (boundary inclusive).
pub fn points_within(points: &[Point<f64>], polygon: &MultiPolygon<f64>) -> Vec<usize> {
    points
        .iter()
        .enumerate()
        .filter(|(_, point)| polygon.intersects(*point))
        .map(|(idx, _)| idx)
        .collect()
}

/// Whether the line lies entirely within the polygon.
pub fn line_within(line: &MultiLineString<f64>, polygon: &MultiPolygon<f64>) -> bool {
    line.relate(polygon).is_within()
}

/// Whether the line and the polygon share any point.
pub fn line_intersects(line: &MultiLineString<f64>, polygon: &MultiPolygon<f64>) -> bool {
    line.relate(polygon).is_intersects()
}

/// Intersection of two polygon geometries.
///
/// `Ok(None)` means the inputs do not overlap; `Err` means the boolean
/// operation failed on degenerate input. The panic guard keeps one bad ring
/// from taking down a whole run.
pub fn intersection(
    a: &MultiPolygon<f64>,
    b: &MultiPolygon<f64>,
) -> Result<Option<MultiPolygon<f64>>> {
    let clipped = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| a.intersection(b)))
        .map_err(|_| anyhow!("boolean intersection failed"))?;
    if clipped.0.is_empty() { Ok(None) } else { Ok(Some(clipped)) }
}
