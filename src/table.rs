use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use polars::{
    frame::DataFrame,
    io::SerWriter,
    prelude::{CsvWriter, JsonWriter, NamedFrom},
    series::Series,
};
use tempfile::NamedTempFile;

use crate::district::District;

/// Output encodings of the result table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Json,
}

/// Flattens the per-district result bags into one DataFrame.
///
/// The first three columns identify the district; every attribute that
/// any district produced becomes a `layer.attribute` column, null where
/// a district has no value for it.
pub fn results_frame(districts: &[District]) -> Result<DataFrame> {
    let ids: Vec<String> = districts.iter().map(|d| d.id().to_string()).collect();
    let names: Vec<String> = districts.iter().map(|d| d.name().to_string()).collect();
    let labels: Vec<String> = districts.iter().map(|d| d.label().to_string()).collect();

    let mut attrs: BTreeSet<(String, String)> = BTreeSet::new();
    for district in districts {
        for (map_key, bag) in &district.results {
            for attr in bag.keys() {
                attrs.insert((map_key.clone(), attr.clone()));
            }
        }
    }

    let mut columns = vec![
        Series::new("id".into(), ids).into(),
        Series::new("name".into(), names).into(),
        Series::new("label".into(), labels).into(),
    ];
    for (map_key, attr) in &attrs {
        let values: Vec<Option<f64>> = districts
            .iter()
            .map(|district| {
                district
                    .results
                    .get(map_key)
                    .and_then(|bag| bag.get(attr))
                    .copied()
            })
            .collect();
        columns.push(Series::new(format!("{map_key}.{attr}").into(), values).into());
    }
    Ok(DataFrame::new(columns)?)
}

/// Writes the frame to `path` through a temp file in the same
/// directory, so readers never observe a half-written table.
pub fn write_table(df: &mut DataFrame, path: &Path, format: TableFormat) -> Result<()> {
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir).context("create temp file")?;
    match format {
        TableFormat::Csv => CsvWriter::new(&mut tmp)
            .finish(df)
            .with_context(|| format!("write CSV to {}", path.display()))?,
        TableFormat::Json => JsonWriter::new(&mut tmp)
            .with_json_format(polars::io::json::JsonFormat::Json)
            .finish(df)
            .with_context(|| format!("write JSON to {}", path.display()))?,
    }
    tmp.persist(path)
        .with_context(|| format!("rename to {}", path.display()))?;
    Ok(())
}
