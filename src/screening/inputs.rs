use serde::Deserialize;

use crate::feature::GeomKind;

/// One layer id, or several grouped into one logical unit.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LayerIds {
    One(String),
    Many(Vec<String>),
}

impl LayerIds {
    #[inline]
    pub fn ids(&self) -> &[String] {
        match self {
            LayerIds::One(id) => std::slice::from_ref(id),
            LayerIds::Many(ids) => ids,
        }
    }

    #[inline]
    pub fn is_group(&self) -> bool {
        matches!(self, LayerIds::Many(ids) if ids.len() > 1)
    }
}

/// One analysis layer declaration: its id(s), an optional attribute to
/// bucket by and an optional attribute to sum up.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerSpec {
    pub id: LayerIds,
    #[serde(default)]
    pub attr_to_categorize: Option<String>,
    #[serde(default)]
    pub attr_to_calc: Option<String>,
}

/// The layer declarations of a run, one list per geometry kind.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LayerInputs {
    #[serde(default)]
    pub point: Vec<LayerSpec>,
    #[serde(default)]
    pub line: Vec<LayerSpec>,
    #[serde(default)]
    pub polygon: Vec<LayerSpec>,
}

impl LayerInputs {
    /// Flat worklist of `(layer id, kind)`, groups expanded in place.
    ///
    /// Ids are not deduplicated; declaring an id twice within one kind
    /// fetches and processes it twice.
    pub fn resolve(&self) -> Vec<(String, GeomKind)> {
        let mut worklist = Vec::new();
        for (specs, kind) in [
            (&self.point, GeomKind::Point),
            (&self.line, GeomKind::Line),
            (&self.polygon, GeomKind::Polygon),
        ] {
            for spec in specs {
                for id in spec.id.ids() {
                    worklist.push((id.clone(), kind));
                }
            }
        }
        worklist
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.point.is_empty() && self.line.is_empty() && self.polygon.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(ids: LayerIds) -> LayerSpec {
        LayerSpec { id: ids, attr_to_categorize: None, attr_to_calc: None }
    }

    #[test]
    fn resolve_expands_groups_in_declaration_order() {
        let inputs = LayerInputs {
            point: vec![spec(LayerIds::One("8712".to_string()))],
            line: vec![spec(LayerIds::Many(vec![
                "20609".to_string(),
                "20610".to_string(),
            ]))],
            polygon: vec![spec(LayerIds::One("1605".to_string()))],
        };
        let worklist = inputs.resolve();

        assert_eq!(
            worklist,
            vec![
                ("8712".to_string(), GeomKind::Point),
                ("20609".to_string(), GeomKind::Line),
                ("20610".to_string(), GeomKind::Line),
                ("1605".to_string(), GeomKind::Polygon),
            ]
        );
    }

    #[test]
    fn duplicate_ids_are_kept() {
        let inputs = LayerInputs {
            point: vec![
                spec(LayerIds::One("1".to_string())),
                spec(LayerIds::One("1".to_string())),
            ],
            ..Default::default()
        };
        assert_eq!(inputs.resolve().len(), 2);
        assert!(!inputs.is_empty());
    }

    #[test]
    fn specs_deserialize_from_both_id_shapes() {
        let one: LayerSpec =
            serde_json::from_str(r#"{"id": "8712", "attrToCategorize": "art"}"#).unwrap();
        let many: LayerSpec =
            serde_json::from_str(r#"{"id": ["20609", "20610"], "attrToCalc": "laenge"}"#).unwrap();

        assert_eq!(one.id.ids(), ["8712".to_string()]);
        assert!(!one.id.is_group());
        assert!(many.id.is_group());
        assert_eq!(many.attr_to_calc.as_deref(), Some("laenge"));
    }
}
