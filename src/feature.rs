use std::collections::BTreeMap;

use geo::{BoundingRect, MultiLineString, MultiPolygon, Point, Rect};
use serde_json::Value;

/// Geometry kind of an analysis layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeomKind {
    Point,
    Line,
    Polygon,
}

impl GeomKind {
    pub const ALL: [GeomKind; 3] = [GeomKind::Point, GeomKind::Line, GeomKind::Polygon];

    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            GeomKind::Point => "point",
            GeomKind::Line => "line",
            GeomKind::Polygon => "polygon",
        }
    }
}

/// Feature geometry, normalized to the three kinds the engine processes.
#[derive(Debug, Clone)]
pub enum Geom {
    Point(Point<f64>),
    Line(MultiLineString<f64>),
    Area(MultiPolygon<f64>),
}

impl Geom {
    #[inline]
    pub fn kind(&self) -> GeomKind {
        match self {
            Geom::Point(_) => GeomKind::Point,
            Geom::Line(_) => GeomKind::Line,
            Geom::Area(_) => GeomKind::Polygon,
        }
    }

    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        match self {
            Geom::Point(p) => Some(Rect::new(p.0, p.0)),
            Geom::Line(l) => l.bounding_rect(),
            Geom::Area(a) => a.bounding_rect(),
        }
    }

    #[inline]
    pub fn as_point(&self) -> Option<&Point<f64>> {
        match self {
            Geom::Point(p) => Some(p),
            _ => None,
        }
    }

    #[inline]
    pub fn as_line(&self) -> Option<&MultiLineString<f64>> {
        match self {
            Geom::Line(l) => Some(l),
            _ => None,
        }
    }

    #[inline]
    pub fn as_area(&self) -> Option<&MultiPolygon<f64>> {
        match self {
            Geom::Area(a) => Some(a),
            _ => None,
        }
    }
}

/// Ordered property record of a feature.
#[derive(Debug, Clone, Default)]
pub struct PropertyMap(BTreeMap<String, Value>);

impl PropertyMap {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn from_object(object: &serde_json::Map<String, Value>) -> Self {
        Self(object.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }

    #[inline]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    #[inline]
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    #[inline]
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    #[inline]
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    #[inline]
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// String view of a property (string-typed values only).
    pub fn as_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Bucket label of a property: strings verbatim, other values in their
    /// JSON rendering, absent values as "null".
    pub fn label(&self, key: &str) -> String {
        match self.get(key) {
            None | Some(Value::Null) => "null".to_string(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }
}

/// A vector feature fetched from a remote service.
///
/// Statistics responses carry no geometry, so the geometry slot is optional;
/// the spatial paths skip features without one.
#[derive(Debug, Clone)]
pub struct Feature {
    pub id: Option<String>,
    pub geometry: Option<Geom>,
    pub props: PropertyMap,
}

impl Feature {
    pub fn new(geometry: Geom, props: PropertyMap) -> Self {
        Self { id: None, geometry: Some(geometry), props }
    }

    #[inline]
    pub fn kind(&self) -> Option<GeomKind> {
        self.geometry.as_ref().map(Geom::kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn label_renders_every_value_shape() {
        let mut props = PropertyMap::new();
        props.set("name", json!("Altona"));
        props.set("zone", json!(30));
        props.set("active", json!(true));
        props.set("missing_value", json!(null));

        assert_eq!(props.label("name"), "Altona");
        assert_eq!(props.label("zone"), "30");
        assert_eq!(props.label("active"), "true");
        assert_eq!(props.label("missing_value"), "null");
        assert_eq!(props.label("not_there"), "null");
    }

    #[test]
    fn geom_kind_and_accessors_agree() {
        let geom = Geom::Point(Point::new(1.0, 2.0));
        assert_eq!(geom.kind(), GeomKind::Point);
        assert!(geom.as_point().is_some());
        assert!(geom.as_area().is_none());
        assert_eq!(GeomKind::Polygon.as_str(), "polygon");
    }
}
