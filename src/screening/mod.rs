mod combine;
mod fetch;
mod inputs;
mod lines;
mod log;
mod points;
mod polygons;
mod run;
mod timescope;
mod values;

pub use fetch::FeatureCache;
pub use inputs::{LayerIds, LayerInputs, LayerSpec};
pub use log::RunLogSnapshot;
pub use timescope::Timescope;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::Deserialize;

use crate::catalog::LayerCatalog;
use crate::config::{PortalConfig, StatMapping};
use crate::district::stats::StatsKeys;
use crate::district::{AttrBag, District, DistrictLevel, DistrictLevels};
use crate::feature::Feature;
use crate::wfs::FeatureService;

use fetch::Fetcher;
use log::RunLog;

/// Which district level a run operates on.
#[derive(Debug, Clone, Deserialize)]
pub enum LevelSelector {
    #[serde(rename = "layerId")]
    LayerId(String),
    #[serde(rename = "label")]
    Label(String),
}

/// One run's inputs, usually read from a scenario file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreeningOptions {
    pub district_level: LevelSelector,
    #[serde(default)]
    pub timescope: Timescope,
    #[serde(default)]
    pub stats: Vec<String>,
    #[serde(default)]
    pub layers: LayerInputs,
    #[serde(default)]
    pub crs: Option<String>,
    #[serde(default)]
    pub bbox: Option<[f64; 4]>,
    #[serde(default)]
    pub refresh: bool,
}

/// How a run ended. An abort leaves the districts without derived
/// results but is not an error of the engine itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    Aborted { reason: String },
}

impl RunStatus {
    #[inline]
    pub fn is_completed(&self) -> bool {
        matches!(self, RunStatus::Completed)
    }
}

/// Result bags of one geometry kind, ready for fan-in.
pub(crate) struct KindOutput {
    pub(crate) bags: Vec<(usize, String, AttrBag)>,
    pub(crate) elapsed: Duration,
    pub(crate) intersection_errors: usize,
}

/// The district aggregation engine.
///
/// One instance holds the configured levels, the service collaborators
/// and the feature cache; `run` executes one screening over them.
pub struct Screening {
    fetcher: Fetcher,
    levels: DistrictLevels,
    level_idx: usize,
    options: ScreeningOptions,
    mappings: Vec<StatMapping>,
    keys: StatsKeys,
    crs: String,
    bbox: [f64; 4],
    log: RunLog,
}

impl Screening {
    pub fn new(
        config: &PortalConfig,
        options: ScreeningOptions,
        service: Arc<dyn FeatureService>,
        catalog: LayerCatalog,
    ) -> Result<Self> {
        let levels = DistrictLevels::from_configs(&config.district_levels);
        let level_idx = match &options.district_level {
            LevelSelector::LayerId(id) => levels
                .find_by_layer_id(id)
                .ok_or_else(|| anyhow!("no district level with layer id {id:?}"))?,
            LevelSelector::Label(label) => levels
                .find_by_label(label)
                .ok_or_else(|| anyhow!("no district level labelled {label:?}"))?,
        };
        let crs = options.crs.clone().unwrap_or_else(|| config.crs.clone());
        let bbox = options.bbox.unwrap_or(config.bbox);
        Ok(Self {
            fetcher: Fetcher::new(service, catalog),
            levels,
            level_idx,
            options,
            mappings: config.mappings.clone(),
            keys: StatsKeys::new(config.stats.timestamp_prefix.clone()),
            crs,
            bbox,
            log: RunLog::default(),
        })
    }

    /// Executes one screening run end to end.
    pub async fn run(&mut self) -> Result<RunStatus> {
        run::execute(self).await
    }

    #[inline]
    pub fn level(&self) -> &DistrictLevel {
        &self.levels[self.level_idx]
    }

    fn level_mut(&mut self) -> &mut DistrictLevel {
        &mut self.levels[self.level_idx]
    }

    #[inline]
    pub fn districts(&self) -> &[District] {
        &self.level().districts
    }

    #[inline]
    pub fn cache(&self) -> &FeatureCache {
        &self.fetcher.cache
    }

    #[inline]
    pub fn cache_mut(&mut self) -> &mut FeatureCache {
        &mut self.fetcher.cache
    }

    pub fn log(&self) -> RunLogSnapshot {
        self.log.snapshot()
    }
}

/// Part over total, with empty totals pinned to zero.
pub(super) fn share(part: f64, total: f64) -> f64 {
    if total == 0.0 { 0.0 } else { part / total }
}

/// Parsed value attribute of a feature, when one is configured.
pub(super) fn parse_calc(feature: &Feature, calc: Option<&str>) -> Option<f64> {
    calc.and_then(|attr| feature.props.get(attr))
        .and_then(values::parse_number)
}

/// Index of `label` in the first-seen bucket order, appending new ones.
pub(super) fn bucket_index(labels: &mut Vec<String>, label: &str) -> usize {
    match labels.iter().position(|known| known == label) {
        Some(found) => found,
        None => {
            labels.push(label.to_string());
            labels.len() - 1
        }
    }
}
