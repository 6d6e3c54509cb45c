use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use geo::{Coord, MapCoords};
use proj4rs::{proj::Proj, transform::transform};

use crate::feature::Geom;

/// Registry of named projections, keyed by CRS code.
pub struct ProjectionSet {
    projs: HashMap<String, Proj>,
}

impl ProjectionSet {
    /// Build the registry from `(code, PROJ.4 definition)` pairs.
    pub fn new(definitions: &[(String, String)]) -> Result<Self> {
        let mut projs = HashMap::new();
        for (code, definition) in definitions {
            let proj = Proj::from_proj_string(definition)
                .with_context(|| anyhow!("failed to build PROJ.4 for {code}: {definition}"))?;
            projs.insert(code.clone(), proj);
        }
        Ok(Self { projs })
    }

    #[inline]
    pub fn contains(&self, code: &str) -> bool {
        self.projs.contains_key(code)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.projs.is_empty()
    }

    /// Reproject a geometry between two registered CRS codes.
    ///
    /// Geographic endpoints work in degrees here; the radian conversion the
    /// transform expects happens inside.
    pub fn reproject(&self, geom: &Geom, from: &str, to: &str) -> Result<Geom> {
        let src = self.projs.get(from).ok_or_else(|| anyhow!("unknown CRS code: {from}"))?;
        let dst = self.projs.get(to).ok_or_else(|| anyhow!("unknown CRS code: {to}"))?;

        let map = |coord: Coord<f64>| -> Result<Coord<f64>> {
            let mut point = if src.is_latlong() {
                (coord.x.to_radians(), coord.y.to_radians(), 0.0)
            } else {
                (coord.x, coord.y, 0.0)
            };
            transform(src, dst, &mut point).map_err(|e| anyhow!("CRS transform failed: {e}"))?;
            if dst.is_latlong() {
                Ok(Coord { x: point.0.to_degrees(), y: point.1.to_degrees() })
            } else {
                Ok(Coord { x: point.0, y: point.1 })
            }
        };

        Ok(match geom {
            Geom::Point(p) => Geom::Point(p.try_map_coords(map)?),
            Geom::Line(l) => Geom::Line(l.try_map_coords(map)?),
            Geom::Area(a) => Geom::Area(a.try_map_coords(map)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Point;

    fn registry() -> ProjectionSet {
        ProjectionSet::new(&[
            (
                "EPSG:25832".to_string(),
                "+proj=utm +zone=32 +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +units=m +no_defs"
                    .to_string(),
            ),
            ("EPSG:4326".to_string(), "+proj=longlat +datum=WGS84 +no_defs".to_string()),
        ])
        .unwrap()
    }

    #[test]
    fn roundtrip_through_utm_is_stable() {
        let projs = registry();
        let start = Geom::Point(Point::new(9.99, 53.55));

        let projected = projs.reproject(&start, "EPSG:4326", "EPSG:25832").unwrap();
        let metric = projected.as_point().copied().unwrap();
        assert!(metric.x() > 100_000.0 && metric.y() > 5_000_000.0);

        let back = projs.reproject(&projected, "EPSG:25832", "EPSG:4326").unwrap();
        let degrees = back.as_point().copied().unwrap();
        assert!((degrees.x() - 9.99).abs() < 1e-6);
        assert!((degrees.y() - 53.55).abs() < 1e-6);
    }

    #[test]
    fn unknown_codes_are_rejected() {
        let projs = registry();
        let geom = Geom::Point(Point::new(0.0, 0.0));
        assert!(projs.reproject(&geom, "EPSG:4326", "EPSG:9999").is_err());
    }
}
