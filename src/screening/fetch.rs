use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, warn};

use crate::catalog::LayerCatalog;
use crate::config::StatMapping;
use crate::district::stats::{parse_stats_features, StatsKeys, StatsRecord};
use crate::district::DistrictLevel;
use crate::feature::{Feature, GeomKind};
use crate::wfs::{FeatureService, FetchOptions};

/// Features fetched so far, keyed by layer id.
///
/// Owned by the fetcher; `refresh` on the run options empties it
/// instead of any implicit global state.
#[derive(Debug, Default)]
pub struct FeatureCache {
    entries: HashMap<String, Vec<Feature>>,
}

impl FeatureCache {
    pub fn get(&self, layer_id: &str) -> Option<&[Feature]> {
        self.entries.get(layer_id).map(Vec::as_slice)
    }

    pub fn insert(&mut self, layer_id: impl Into<String>, features: Vec<Feature>) {
        self.entries.insert(layer_id.into(), features);
    }

    pub fn invalidate(&mut self, layer_id: &str) -> bool {
        self.entries.remove(layer_id).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Service, registry and cache bundled for the fetch phase.
pub(crate) struct Fetcher {
    pub(crate) service: Arc<dyn FeatureService>,
    pub(crate) catalog: LayerCatalog,
    pub(crate) cache: FeatureCache,
}

impl Fetcher {
    pub(crate) fn new(service: Arc<dyn FeatureService>, catalog: LayerCatalog) -> Self {
        Self { service, catalog, cache: FeatureCache::default() }
    }

    /// One layer fetch with cache short-circuit. Failures are reported,
    /// never raised.
    pub(super) async fn outcome(&self, layer_id: &str, opts: &FetchOptions) -> FetchOutcome {
        if self.cache.get(layer_id).is_some() {
            debug!(id = layer_id, "serving layer from cache");
            return FetchOutcome::Cached;
        }
        let Some(layer) = self.catalog.by_id(layer_id) else {
            warn!(id = layer_id, "layer is not in the service registry");
            return FetchOutcome::Failed;
        };
        match self.service.fetch_features(layer, opts).await {
            Some(features) => FetchOutcome::Fetched(features),
            None => FetchOutcome::Failed,
        }
    }
}

pub(super) enum FetchOutcome {
    Cached,
    Fetched(Vec<Feature>),
    Failed,
}

pub(super) struct LayerFetch {
    pub(super) id: String,
    pub(super) kind: GeomKind,
    pub(super) outcome: FetchOutcome,
}

/// Fetches every analysis layer concurrently. Results come back in
/// worklist order; nothing is written anywhere until the caller folds
/// them in.
pub(super) async fn fetch_layers(
    fetcher: &Fetcher,
    worklist: &[(String, GeomKind)],
    opts: &FetchOptions,
) -> Vec<LayerFetch> {
    join_all(worklist.iter().map(|(id, kind)| async move {
        LayerFetch {
            id: id.clone(),
            kind: *kind,
            outcome: fetcher.outcome(id, opts).await,
        }
    }))
    .await
}

pub(super) struct CategoryStats {
    pub(super) category: String,
    pub(super) records: Vec<StatsRecord>,
    pub(super) ok: bool,
}

/// Everything the district side of a run produces: the boundary
/// features, freshly introspected property names (when the level had
/// none yet) and the parsed statistics per requested category.
pub(super) struct DistrictBundle {
    pub(super) boundary: FetchOutcome,
    pub(super) property_name_list: Option<Vec<Vec<String>>>,
    pub(super) stats: Vec<CategoryStats>,
}

pub(super) async fn district_bundle(
    fetcher: &Fetcher,
    level: &DistrictLevel,
    reference_key: Option<&str>,
    categories: &[String],
    mappings: &[StatMapping],
    keys: &StatsKeys,
    opts: &FetchOptions,
) -> DistrictBundle {
    let boundary = if level.districts.is_empty() {
        fetcher.outcome(&level.layer_id, opts).await
    } else {
        FetchOutcome::Cached
    };
    if matches!(boundary, FetchOutcome::Failed) {
        warn!(layer = %level.layer_id, "district boundaries could not be loaded");
        return DistrictBundle { boundary, property_name_list: None, stats: Vec::new() };
    }

    let resolved = if level.stats.property_name_list.is_none()
        && !level.stats.base_urls.is_empty()
    {
        Some(resolve_property_names(fetcher, &level.stats.base_urls).await)
    } else {
        None
    };
    let names = resolved.as_ref().or(level.stats.property_name_list.as_ref());

    let stats = join_all(categories.iter().map(|category| {
        fetch_category(fetcher, level, reference_key, category, mappings, keys, names)
    }))
    .await;

    DistrictBundle { boundary, property_name_list: resolved, stats }
}

/// Schema introspection against every distinct statistics source URL.
/// A source that cannot be described yields an empty name list and the
/// fetch for it falls back to all properties.
async fn resolve_property_names(fetcher: &Fetcher, base_urls: &[String]) -> Vec<Vec<String>> {
    join_all(base_urls.iter().map(|url| async move {
        let Some(layer) = fetcher.catalog.find_by_url(url) else {
            warn!(%url, "no registry entry for stats source");
            return Vec::new();
        };
        match fetcher
            .service
            .describe_feature_type(url, layer.version.as_deref())
            .await
        {
            Ok(schema) => schema.property_names(Some(&layer.feature_type)),
            Err(err) => {
                warn!(%url, error = %err, "DescribeFeatureType failed");
                Vec::new()
            }
        }
    }))
    .await
}

async fn fetch_category(
    fetcher: &Fetcher,
    level: &DistrictLevel,
    reference_key: Option<&str>,
    category: &str,
    mappings: &[StatMapping],
    keys: &StatsKeys,
    names: Option<&Vec<Vec<String>>>,
) -> CategoryStats {
    let failed = |reason: &str| {
        warn!(%category, "{reason}");
        CategoryStats { category: category.to_string(), records: Vec::new(), ok: false }
    };

    let Some(mapping) = mappings.iter().find(|m| m.category == category) else {
        return failed("no mapping for category");
    };
    let Some(layer_id) = mapping.layer_id_for(&level.stats.key_of_attr_name) else {
        return failed("mapping has no source layer for this level");
    };
    let Some(layer) = fetcher.catalog.by_id(&layer_id) else {
        return failed("stats layer is not in the service registry");
    };

    let property_names = names
        .and_then(|list| {
            let index = level.stats.base_urls.iter().position(|url| *url == layer.url)?;
            list.get(index).cloned()
        })
        .filter(|names| !names.is_empty());
    let stat_opts = FetchOptions { property_names, ..FetchOptions::default() };

    let features = match fetcher.outcome(&layer_id, &stat_opts).await {
        FetchOutcome::Fetched(features) => features,
        FetchOutcome::Cached => fetcher
            .cache
            .get(&layer_id)
            .map(<[Feature]>::to_vec)
            .unwrap_or_default(),
        FetchOutcome::Failed => {
            return failed("stats features could not be loaded");
        }
    };
    let records = parse_stats_features(
        &features,
        mapping,
        keys,
        &level.stats.key_of_attr_name,
        reference_key,
    );
    CategoryStats { category: category.to_string(), records, ok: true }
}
