pub mod stats;

use std::collections::{BTreeMap, BTreeSet};
use std::ops::{Index, IndexMut};

use geo::MultiPolygon;

use crate::config::DistrictLevelConfig;
use crate::feature::{Feature, Geom};
use stats::StatsRecord;

/// Attribute bag holding the computed values of one result map.
pub type AttrBag = BTreeMap<String, f64>;

/// Where the statistical features of a level come from.
#[derive(Debug, Clone)]
pub struct StatsSources {
    pub key_of_attr_name: String,
    pub base_urls: Vec<String>,
    /// Per-source property names, introspected once and then kept.
    pub property_name_list: Option<Vec<Vec<String>>>,
}

/// One administrative level: its boundary layer, naming rules, stats
/// sources and the districts loaded for it.
#[derive(Debug, Clone)]
pub struct DistrictLevel {
    pub layer_id: String,
    pub label: String,
    pub key_of_attr_name: String,
    pub duplicate_district_names: BTreeSet<String>,
    pub stats: StatsSources,
    /// Index of the next coarser level, if any.
    pub reference_level: Option<usize>,
    pub districts: Vec<District>,
}

/// All configured levels, ordered fine to coarse.
#[derive(Debug, Clone, Default)]
pub struct DistrictLevels {
    levels: Vec<DistrictLevel>,
}

impl DistrictLevels {
    pub fn from_configs(configs: &[DistrictLevelConfig]) -> Self {
        let levels = configs
            .iter()
            .enumerate()
            .map(|(index, config)| DistrictLevel {
                layer_id: config.layer_id.clone(),
                label: config.label.clone(),
                key_of_attr_name: config.key_of_attr_name.clone(),
                duplicate_district_names: config
                    .duplicate_district_names
                    .iter()
                    .cloned()
                    .collect(),
                stats: StatsSources {
                    key_of_attr_name: config.stats.key_of_attr_name.clone(),
                    base_urls: config.stats.base_url.clone(),
                    property_name_list: None,
                },
                reference_level: (index + 1 < configs.len()).then_some(index + 1),
                districts: Vec::new(),
            })
            .collect();
        Self { levels }
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&DistrictLevel> {
        self.levels.get(index)
    }

    #[inline]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut DistrictLevel> {
        self.levels.get_mut(index)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &DistrictLevel> {
        self.levels.iter()
    }

    pub fn find_by_layer_id(&self, layer_id: &str) -> Option<usize> {
        self.levels.iter().position(|level| level.layer_id == layer_id)
    }

    pub fn find_by_label(&self, label: &str) -> Option<usize> {
        self.levels.iter().position(|level| level.label == label)
    }

    /// The next coarser level of the given one.
    pub fn reference_of(&self, index: usize) -> Option<&DistrictLevel> {
        self.levels
            .get(index)
            .and_then(|level| level.reference_level)
            .and_then(|reference| self.levels.get(reference))
    }
}

impl Index<usize> for DistrictLevels {
    type Output = DistrictLevel;

    #[inline]
    fn index(&self, index: usize) -> &DistrictLevel {
        &self.levels[index]
    }
}

impl IndexMut<usize> for DistrictLevels {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut DistrictLevel {
        &mut self.levels[index]
    }
}

/// One district: its boundary feature, attached statistics and the
/// per-map result bags filled by a screening run.
#[derive(Debug, Clone)]
pub struct District {
    id: String,
    name: String,
    label: String,
    pub boundary: Feature,
    pub stats: BTreeMap<String, StatsRecord>,
    pub results: BTreeMap<String, AttrBag>,
}

impl District {
    pub(crate) fn new(
        index: usize,
        boundary: Feature,
        level_label: &str,
        key_of_attr_name: &str,
        duplicates: &BTreeSet<String>,
    ) -> Self {
        let raw = boundary.props.label(key_of_attr_name);
        // The label keeps the raw name; duplicates across levels get the
        // singular level label appended.
        let label = if duplicates.contains(&raw) {
            let mut singular = level_label.to_string();
            singular.pop();
            format!("{raw} ({singular})")
        } else {
            raw.clone()
        };
        // Boundary layers write "St. Pauli", the stats services "St.Pauli";
        // the name is what stats records are matched against.
        let name = if raw.contains("St. ") {
            raw.replacen(' ', "", 1)
        } else {
            raw
        };
        let id = boundary
            .id
            .clone()
            .unwrap_or_else(|| format!("{key_of_attr_name}:{index}"));
        Self {
            id,
            name,
            label,
            boundary,
            stats: BTreeMap::new(),
            results: BTreeMap::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[inline]
    pub fn polygon(&self) -> Option<&MultiPolygon<f64>> {
        match &self.boundary.geometry {
            Some(Geom::Area(area)) => Some(area),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DistrictLevelConfig, StatsSourceConfig};
    use crate::feature::PropertyMap;
    use serde_json::json;

    fn boundary(key: &str, name: &str) -> Feature {
        let mut props = PropertyMap::new();
        props.set(key, json!(name));
        Feature { id: None, geometry: None, props }
    }

    #[test]
    fn saint_names_lose_their_space() {
        let district = District::new(
            0,
            boundary("stadtteil_name", "St. Pauli"),
            "Stadtteile",
            "stadtteil_name",
            &BTreeSet::new(),
        );
        assert_eq!(district.name(), "St.Pauli");
        assert_eq!(district.label(), "St. Pauli");
        assert_eq!(district.id(), "stadtteil_name:0");
    }

    #[test]
    fn duplicates_are_labelled_with_the_level() {
        let duplicates: BTreeSet<String> = ["Altona".to_string()].into();
        let district = District::new(
            3,
            boundary("bezirk_name", "Altona"),
            "Bezirke",
            "bezirk_name",
            &duplicates,
        );
        assert_eq!(district.name(), "Altona");
        assert_eq!(district.label(), "Altona (Bezirk)");
    }

    #[test]
    fn levels_reference_the_next_coarser_one() {
        let configs = vec![
            DistrictLevelConfig {
                layer_id: "100".to_string(),
                label: "Stadtteile".to_string(),
                key_of_attr_name: "stadtteil_name".to_string(),
                duplicate_district_names: vec![],
                stats: StatsSourceConfig {
                    key_of_attr_name: "stadtteil".to_string(),
                    base_url: vec![],
                },
            },
            DistrictLevelConfig {
                layer_id: "200".to_string(),
                label: "Bezirke".to_string(),
                key_of_attr_name: "bezirk_name".to_string(),
                duplicate_district_names: vec![],
                stats: StatsSourceConfig {
                    key_of_attr_name: "bezirk".to_string(),
                    base_url: vec![],
                },
            },
        ];
        let levels = DistrictLevels::from_configs(&configs);

        assert_eq!(levels.len(), 2);
        assert_eq!(levels[0].reference_level, Some(1));
        assert_eq!(levels[1].reference_level, None);
        assert_eq!(levels.reference_of(0).map(|l| l.label.as_str()), Some("Bezirke"));
        assert!(levels.reference_of(1).is_none());
        assert_eq!(levels.find_by_label("Bezirke"), Some(1));
        assert_eq!(levels.find_by_layer_id("100"), Some(0));
    }
}
