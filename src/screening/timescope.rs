use serde::de::Error;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::district::stats::StatsKeys;
use crate::district::District;

/// Which year slice(s) of the statistics a run exposes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Timescope {
    #[default]
    Latest,
    Year(i32),
    Years(Vec<i32>),
}

impl Timescope {
    /// Concrete years for a category. `Latest` scans the first district
    /// carrying the category and takes its maximum stored year; without
    /// any match the result is empty.
    pub(crate) fn resolve(
        &self,
        category: &str,
        districts: &[District],
        keys: &StatsKeys,
    ) -> Vec<i32> {
        match self {
            Timescope::Year(year) => vec![*year],
            Timescope::Years(years) => years.clone(),
            Timescope::Latest => districts
                .iter()
                .find_map(|district| district.stats.get(category))
                .and_then(|record| record.years(keys).into_iter().max())
                .map(|latest| vec![latest])
                .unwrap_or_default(),
        }
    }
}

impl<'de> Deserialize<'de> for Timescope {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::String(s) if s == "latest" => Ok(Timescope::Latest),
            Value::Number(n) => n
                .as_i64()
                .map(|year| Timescope::Year(year as i32))
                .ok_or_else(|| D::Error::custom("timescope year must be an integer")),
            Value::Array(items) => items
                .iter()
                .map(|item| item.as_i64().map(|year| year as i32))
                .collect::<Option<Vec<i32>>>()
                .map(Timescope::Years)
                .ok_or_else(|| D::Error::custom("timescope years must be integers")),
            other => Err(D::Error::custom(format!("invalid timescope: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::Feature;
    use std::collections::BTreeSet;

    fn district_with_years(name: &str, years: &[i32]) -> District {
        let mut boundary = Feature { id: None, geometry: None, props: Default::default() };
        boundary.props.set("name", Value::String(name.to_string()));
        let mut district = District::new(0, boundary, "Stadtteile", "name", &BTreeSet::new());
        let keys = StatsKeys::new("jahr");
        let mut values = std::collections::BTreeMap::new();
        for year in years {
            values.insert(keys.format(*year), Value::from(1));
        }
        district.stats.insert(
            "bev_insgesamt".to_string(),
            crate::district::stats::StatsRecord {
                category: "Bevölkerung insgesamt".to_string(),
                group: String::new(),
                name: name.to_string(),
                values,
            },
        );
        district
    }

    #[test]
    fn three_scope_shapes_deserialize() {
        assert_eq!(
            serde_json::from_str::<Timescope>(r#""latest""#).unwrap(),
            Timescope::Latest
        );
        assert_eq!(
            serde_json::from_str::<Timescope>("2019").unwrap(),
            Timescope::Year(2019)
        );
        assert_eq!(
            serde_json::from_str::<Timescope>("[2018, 2020]").unwrap(),
            Timescope::Years(vec![2018, 2020])
        );
        assert!(serde_json::from_str::<Timescope>(r#""tomorrow""#).is_err());
    }

    #[test]
    fn latest_takes_the_maximum_stored_year() {
        let districts = vec![district_with_years("Altona", &[2019, 2021, 2020])];
        let keys = StatsKeys::new("jahr");

        let scope = Timescope::Latest;
        assert_eq!(scope.resolve("bev_insgesamt", &districts, &keys), vec![2021]);
        assert!(scope.resolve("unknown", &districts, &keys).is_empty());
    }

    #[test]
    fn explicit_scopes_pass_through_verbatim() {
        let keys = StatsKeys::new("jahr");
        assert_eq!(Timescope::Year(2019).resolve("x", &[], &keys), vec![2019]);
        assert_eq!(
            Timescope::Years(vec![2020, 2018]).resolve("x", &[], &keys),
            vec![2020, 2018]
        );
    }
}
