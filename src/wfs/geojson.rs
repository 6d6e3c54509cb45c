use anyhow::{anyhow, bail, Result};
use geo::{Coord, LineString, MultiLineString, MultiPolygon, Point, Polygon};
use serde_json::Value;

use crate::feature::{Feature, Geom, PropertyMap};

/// Decodes a GeoJSON feature collection into features plus the
/// collection-level CRS, when the server declares one.
pub(super) fn parse_collection(body: &str) -> Result<(Vec<Feature>, Option<String>)> {
    let root: Value = serde_json::from_str(body)?;
    match root["type"].as_str() {
        Some("FeatureCollection") => {}
        other => bail!("expected a FeatureCollection, got {:?}", other),
    }
    let crs = root["crs"]["properties"]["name"]
        .as_str()
        .map(normalize_crs);
    let mut features = Vec::new();
    if let Some(members) = root["features"].as_array() {
        for member in members {
            decode_feature(member, &mut features)?;
        }
    }
    Ok((features, crs))
}

/// Collapses the CRS spellings servers use onto `EPSG:<code>`.
///
/// Handles `EPSG:25832`, `urn:ogc:def:crs:EPSG::25832` and
/// `http://www.opengis.net/def/crs/EPSG/0/25832` alike.
pub(super) fn normalize_crs(name: &str) -> String {
    if name.to_uppercase().contains("EPSG") {
        let code = name
            .rsplit(|c| c == ':' || c == '/')
            .find(|part| !part.is_empty())
            .unwrap_or(name);
        format!("EPSG:{code}")
    } else {
        name.to_string()
    }
}

fn decode_feature(member: &Value, out: &mut Vec<Feature>) -> Result<()> {
    let id = match &member["id"] {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    };
    let props = member["properties"]
        .as_object()
        .map(PropertyMap::from_object)
        .unwrap_or_default();

    let geometry = &member["geometry"];
    if geometry.is_null() {
        out.push(Feature { id, geometry: None, props });
        return Ok(());
    }

    let coords = &geometry["coordinates"];
    match geometry["type"].as_str() {
        Some("Point") => {
            let point = Point::from(parse_coord(coords)?);
            out.push(Feature { id, geometry: Some(Geom::Point(point)), props });
        }
        Some("MultiPoint") => {
            // One feature per member point, so each carries one count unit.
            for item in as_array(coords)? {
                let point = Point::from(parse_coord(item)?);
                out.push(Feature {
                    id: id.clone(),
                    geometry: Some(Geom::Point(point)),
                    props: props.clone(),
                });
            }
        }
        Some("LineString") => {
            let line = MultiLineString::new(vec![parse_line(coords)?]);
            out.push(Feature { id, geometry: Some(Geom::Line(line)), props });
        }
        Some("MultiLineString") => {
            let mut parts = Vec::new();
            for item in as_array(coords)? {
                parts.push(parse_line(item)?);
            }
            out.push(Feature {
                id,
                geometry: Some(Geom::Line(MultiLineString::new(parts))),
                props,
            });
        }
        Some("Polygon") => {
            let polygon = MultiPolygon::new(vec![parse_polygon(coords)?]);
            out.push(Feature { id, geometry: Some(Geom::Area(polygon)), props });
        }
        Some("MultiPolygon") => {
            let mut parts = Vec::new();
            for item in as_array(coords)? {
                parts.push(parse_polygon(item)?);
            }
            out.push(Feature {
                id,
                geometry: Some(Geom::Area(MultiPolygon::new(parts))),
                props,
            });
        }
        other => bail!("unsupported geometry type: {:?}", other),
    }
    Ok(())
}

fn as_array(value: &Value) -> Result<&Vec<Value>> {
    value
        .as_array()
        .ok_or_else(|| anyhow!("expected a coordinate array, got {value}"))
}

fn parse_coord(value: &Value) -> Result<Coord<f64>> {
    let pair = as_array(value)?;
    let x = pair
        .first()
        .and_then(Value::as_f64)
        .ok_or_else(|| anyhow!("coordinate without a numeric x: {value}"))?;
    let y = pair
        .get(1)
        .and_then(Value::as_f64)
        .ok_or_else(|| anyhow!("coordinate without a numeric y: {value}"))?;
    Ok(Coord { x, y })
}

fn parse_line(value: &Value) -> Result<LineString<f64>> {
    let mut coords = Vec::new();
    for item in as_array(value)? {
        coords.push(parse_coord(item)?);
    }
    Ok(LineString::new(coords))
}

fn parse_polygon(value: &Value) -> Result<Polygon<f64>> {
    let rings = as_array(value)?;
    let mut exterior = LineString::new(Vec::new());
    let mut interiors = Vec::new();
    for (index, ring) in rings.iter().enumerate() {
        let parsed = parse_line(ring)?;
        if index == 0 {
            exterior = parsed;
        } else {
            interiors.push(parsed);
        }
    }
    Ok(Polygon::new(exterior, interiors))
}
