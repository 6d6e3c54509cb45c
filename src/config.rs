use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;

/// Portal configuration: the coordinate setup, the service registry
/// location, the district levels and the statistics mappings.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortalConfig {
    #[serde(default = "default_crs")]
    pub crs: String,
    #[serde(default = "default_bbox")]
    pub bbox: [f64; 4],
    #[serde(default = "default_named_projections")]
    pub named_projections: Vec<(String, String)>,
    #[serde(default = "default_services_url")]
    pub services_url: String,
    #[serde(default)]
    pub stats: StatsConfig,
    pub district_levels: Vec<DistrictLevelConfig>,
    #[serde(default)]
    pub mappings: Vec<StatMapping>,
}

impl PortalConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let body = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_json::from_str(&body)
            .with_context(|| format!("failed to parse config {}", path.display()))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsConfig {
    #[serde(default = "default_timestamp_prefix")]
    pub timestamp_prefix: String,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self { timestamp_prefix: default_timestamp_prefix() }
    }
}

/// One administrative level as configured, fine to coarse.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistrictLevelConfig {
    pub layer_id: String,
    pub label: String,
    pub key_of_attr_name: String,
    #[serde(default)]
    pub duplicate_district_names: Vec<String>,
    pub stats: StatsSourceConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSourceConfig {
    pub key_of_attr_name: String,
    #[serde(default)]
    pub base_url: Vec<String>,
}

/// Maps a statistic category to its value attribute, display group and
/// the per-level source layer ids (keyed by each level's stats name key).
#[derive(Debug, Clone, Deserialize)]
pub struct StatMapping {
    pub category: String,
    pub value: String,
    #[serde(default)]
    pub group: String,
    #[serde(flatten)]
    pub layer_ids: BTreeMap<String, Value>,
}

impl StatMapping {
    /// Source layer id for a level, addressed by the level's stats name key.
    pub fn layer_id_for(&self, key_of_attr_name: &str) -> Option<String> {
        match self.layer_ids.get(key_of_attr_name)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

fn default_crs() -> String {
    "EPSG:25832".to_string()
}

fn default_bbox() -> [f64; 4] {
    [510000.0, 5850000.0, 625000.0, 6000000.0]
}

fn default_named_projections() -> Vec<(String, String)> {
    vec![
        (
            "EPSG:25832".to_string(),
            "+proj=utm +zone=32 +ellps=GRS80 +towgs84=0,0,0,0,0,0,1 +units=m +no_defs".to_string(),
        ),
        (
            "EPSG:4326".to_string(),
            "+proj=longlat +datum=WGS84 +no_defs".to_string(),
        ),
    ]
}

fn default_services_url() -> String {
    "https://geoportal-hamburg.de/lgv-config/services-internet.json".to_string()
}

fn default_timestamp_prefix() -> String {
    "jahr".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sparse_config_fills_the_defaults() {
        let body = r#"{
            "districtLevels": [
                {
                    "layerId": "1694",
                    "label": "Stadtteile",
                    "keyOfAttrName": "stadtteil_name",
                    "stats": {"keyOfAttrName": "stadtteil"}
                }
            ]
        }"#;
        let config: PortalConfig = serde_json::from_str(body).unwrap();

        assert_eq!(config.crs, "EPSG:25832");
        assert_eq!(config.stats.timestamp_prefix, "jahr");
        assert_eq!(config.bbox[0], 510000.0);
        assert_eq!(config.named_projections.len(), 2);
        assert!(config.services_url.ends_with("services-internet.json"));
        assert!(config.district_levels[0].duplicate_district_names.is_empty());
        assert!(config.mappings.is_empty());
    }

    #[test]
    fn mapping_layer_ids_come_from_the_extension_keys() {
        let body = r#"{
            "category": "bev_insgesamt",
            "value": "Bevölkerung insgesamt",
            "group": "Bevölkerung",
            "stadtteil": "20141",
            "bezirk": 20142
        }"#;
        let mapping: StatMapping = serde_json::from_str(body).unwrap();

        assert_eq!(mapping.layer_id_for("stadtteil").as_deref(), Some("20141"));
        assert_eq!(mapping.layer_id_for("bezirk").as_deref(), Some("20142"));
        assert!(mapping.layer_id_for("quartier").is_none());
    }
}
