use std::collections::BTreeMap;

use serde_json::Value;

use crate::config::StatMapping;
use crate::district::District;
use crate::feature::Feature;

/// Formats and strips the year keys of statistics records.
///
/// Keys read `<prefix>_<year>`; with an empty prefix the separator is
/// dropped too, so stripping always inverts formatting exactly.
#[derive(Debug, Clone)]
pub struct StatsKeys {
    prefix: String,
}

impl StatsKeys {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    #[inline]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn format(&self, year: i32) -> String {
        if self.prefix.is_empty() {
            year.to_string()
        } else {
            format!("{}_{year}", self.prefix)
        }
    }

    pub fn strip(&self, key: &str) -> Option<i32> {
        if self.prefix.is_empty() {
            key.parse().ok()
        } else {
            key.strip_prefix(&self.prefix)?
                .strip_prefix('_')?
                .parse()
                .ok()
        }
    }
}

/// One category's time series for one district.
#[derive(Debug, Clone)]
pub struct StatsRecord {
    pub category: String,
    pub group: String,
    pub name: String,
    pub values: BTreeMap<String, Value>,
}

impl StatsRecord {
    #[inline]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Years present in this record, stripped from its stored keys.
    pub fn years(&self, keys: &StatsKeys) -> Vec<i32> {
        self.values.keys().filter_map(|key| keys.strip(key)).collect()
    }
}

/// Turns a statistics response into per-district records.
///
/// Services answer in two shapes. The timeline shape has one feature
/// per district and year, marked by a `<prefix>` year property next to
/// a `<prefix>_timestamp` property; rows are grouped by district name
/// and pivoted into year keys. Anything else is the legacy shape with
/// one feature per district already carrying year-keyed properties.
pub(crate) fn parse_stats_features(
    features: &[Feature],
    mapping: &StatMapping,
    keys: &StatsKeys,
    name_key: &str,
    reference_name_key: Option<&str>,
) -> Vec<StatsRecord> {
    let timestamp_key = format!("{}_timestamp", keys.prefix());
    let is_timeline = !features.is_empty()
        && features.iter().all(|feature| {
            feature.props.contains(keys.prefix()) && feature.props.contains(&timestamp_key)
        });
    if is_timeline {
        parse_timeline(features, mapping, keys, name_key, reference_name_key)
    } else {
        features
            .iter()
            .map(|feature| parse_legacy(feature, mapping, name_key))
            .collect()
    }
}

fn parse_timeline(
    features: &[Feature],
    mapping: &StatMapping,
    keys: &StatsKeys,
    name_key: &str,
    reference_name_key: Option<&str>,
) -> Vec<StatsRecord> {
    let mut records: Vec<StatsRecord> = Vec::new();
    for feature in features {
        let name = feature.props.label(name_key);
        let position = match records.iter().position(|record| record.name == name) {
            Some(existing) => existing,
            None => {
                let mut values = BTreeMap::new();
                values.insert(name_key.to_string(), Value::String(name.clone()));
                if let Some(reference_key) = reference_name_key {
                    if let Some(reference) = feature.props.get(reference_key) {
                        values.insert(reference_key.to_string(), reference.clone());
                    }
                }
                records.push(StatsRecord {
                    category: mapping.value.clone(),
                    group: mapping.group.clone(),
                    name,
                    values,
                });
                records.len() - 1
            }
        };
        let Some(year) = feature.props.get(keys.prefix()).and_then(value_year) else {
            continue;
        };
        if let Some(value) = feature.props.get(&mapping.category) {
            records[position].values.insert(keys.format(year), value.clone());
        }
    }
    records
}

fn parse_legacy(feature: &Feature, mapping: &StatMapping, name_key: &str) -> StatsRecord {
    let mut values: BTreeMap<String, Value> = feature
        .props
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect();
    // Some sources accidentally serve their geometry column.
    values.remove("geom");
    StatsRecord {
        category: mapping.value.clone(),
        group: mapping.group.clone(),
        name: feature.props.label(name_key),
        values,
    }
}

fn value_year(value: &Value) -> Option<i32> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .map(|i| i as i32)
            .or_else(|| n.as_f64().map(|f| f as i32)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Attaches each record to the district with the matching name.
pub(crate) fn attach_stats(districts: &mut [District], category: &str, records: &[StatsRecord]) {
    for district in districts {
        if let Some(record) = records.iter().find(|record| record.name == district.name()) {
            district.stats.insert(category.to_string(), record.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::PropertyMap;
    use serde_json::json;

    fn mapping() -> StatMapping {
        StatMapping {
            category: "bev_insgesamt".to_string(),
            value: "Bevölkerung insgesamt".to_string(),
            group: "Bevölkerung".to_string(),
            layer_ids: BTreeMap::new(),
        }
    }

    fn feature(props: &[(&str, Value)]) -> Feature {
        let mut map = PropertyMap::new();
        for (key, value) in props {
            map.set(*key, value.clone());
        }
        Feature { id: None, geometry: None, props: map }
    }

    #[test]
    fn keys_roundtrip_and_reject_foreign_keys() {
        let keys = StatsKeys::new("jahr");
        assert_eq!(keys.format(2020), "jahr_2020");
        assert_eq!(keys.strip("jahr_2020"), Some(2020));
        assert_eq!(keys.strip("jahr_timestamp"), None);
        assert_eq!(keys.strip("other_2020"), None);

        let bare = StatsKeys::new("");
        assert_eq!(bare.format(2020), "2020");
        assert_eq!(bare.strip("2020"), Some(2020));
    }

    #[test]
    fn legacy_features_become_one_record_each() {
        let features = vec![
            feature(&[
                ("stadtteil", json!("Altona")),
                ("jahr_2019", json!(120)),
                ("jahr_2020", json!(140)),
                ("geom", json!("POINT (0 0)")),
            ]),
            feature(&[("stadtteil", json!("Ottensen")), ("jahr_2020", json!(90))]),
        ];
        let keys = StatsKeys::new("jahr");
        let records = parse_stats_features(&features, &mapping(), &keys, "stadtteil", None);

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "Altona");
        assert_eq!(records[0].category, "Bevölkerung insgesamt");
        assert_eq!(records[0].get("jahr_2020"), Some(&json!(140)));
        assert!(records[0].get("geom").is_none());
        assert_eq!(records[0].years(&keys), vec![2019, 2020]);
    }

    #[test]
    fn timeline_rows_pivot_into_year_keys_per_district() {
        let features = vec![
            feature(&[
                ("stadtteil", json!("Altona")),
                ("bezirk", json!("Altona")),
                ("jahr", json!(2019)),
                ("jahr_timestamp", json!("2019-12-31")),
                ("bev_insgesamt", json!(120)),
            ]),
            feature(&[
                ("stadtteil", json!("Altona")),
                ("bezirk", json!("Altona")),
                ("jahr", json!("2020")),
                ("jahr_timestamp", json!("2020-12-31")),
                ("bev_insgesamt", json!(140)),
            ]),
            feature(&[
                ("stadtteil", json!("Ottensen")),
                ("bezirk", json!("Altona")),
                ("jahr", json!(2020)),
                ("jahr_timestamp", json!("2020-12-31")),
                ("bev_insgesamt", json!(90)),
            ]),
        ];
        let keys = StatsKeys::new("jahr");
        let records =
            parse_stats_features(&features, &mapping(), &keys, "stadtteil", Some("bezirk"));

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "Altona");
        assert_eq!(records[0].get("jahr_2019"), Some(&json!(120)));
        assert_eq!(records[0].get("jahr_2020"), Some(&json!(140)));
        assert_eq!(records[0].get("bezirk"), Some(&json!("Altona")));
        assert_eq!(records[1].name, "Ottensen");
        assert_eq!(records[1].get("jahr_2020"), Some(&json!(90)));
    }
}
