use anyhow::Result;
use futures::join;
use tracing::{info, warn};

use crate::district::stats::{self, StatsKeys};
use crate::district::{AttrBag, District};
use crate::feature::{Geom, GeomKind};
use crate::wfs::FetchOptions;

use super::fetch::{self, FetchOutcome};
use super::{lines, points, polygons, values, RunStatus, Screening, Timescope};

/// One full screening run: fetch everything, build the districts,
/// intersect the analysis layers and attach the result bags.
pub(super) async fn execute(s: &mut Screening) -> Result<RunStatus> {
    let worklist = s.options.layers.resolve();
    s.log.start(worklist.len());
    info!(level = %s.level().label, layers = worklist.len(), "starting screening run");

    if s.options.refresh {
        s.fetcher.cache.clear();
        let level = s.level_mut();
        level.districts.clear();
        level.stats.property_name_list = None;
    }

    let opts = FetchOptions {
        bbox: Some(s.bbox),
        srs_name: Some(s.crs.clone()),
        property_names: None,
    };
    let reference_key = s
        .levels
        .reference_of(s.level_idx)
        .map(|level| level.stats.key_of_attr_name.clone());

    let (bundle, layer_results) = {
        let fetcher = &s.fetcher;
        let level = &s.levels[s.level_idx];
        join!(
            fetch::district_bundle(
                fetcher,
                level,
                reference_key.as_deref(),
                &s.options.stats,
                &s.mappings,
                &s.keys,
                &opts,
            ),
            fetch::fetch_layers(fetcher, &worklist, &opts),
        )
    };

    // Fan-in: all cache and district mutation happens here.
    for result in layer_results {
        match result.outcome {
            FetchOutcome::Fetched(features) => {
                s.fetcher.cache.insert(result.id, features);
                s.log.record_layer(true);
            }
            FetchOutcome::Cached => s.log.record_layer(true),
            FetchOutcome::Failed => {
                warn!(id = %result.id, kind = result.kind.as_str(), "layer could not be loaded");
                s.log.record_layer(false);
            }
        }
    }
    let boundary_failed = matches!(bundle.boundary, FetchOutcome::Failed);
    if let FetchOutcome::Fetched(features) = bundle.boundary {
        let layer_id = s.level().layer_id.clone();
        s.fetcher.cache.insert(layer_id, features);
    }
    if let Some(list) = bundle.property_name_list {
        s.level_mut().stats.property_name_list = Some(list);
    }

    if s.level().districts.is_empty() && !boundary_failed {
        let level = s.level();
        let layer_id = level.layer_id.clone();
        let label = level.label.clone();
        let key = level.key_of_attr_name.clone();
        let duplicates = level.duplicate_district_names.clone();
        let districts = s
            .fetcher
            .cache
            .get(&layer_id)
            .map(|features| {
                features
                    .iter()
                    .enumerate()
                    .filter_map(|(index, feature)| {
                        if matches!(feature.geometry, Some(Geom::Area(_))) {
                            Some(District::new(index, feature.clone(), &label, &key, &duplicates))
                        } else {
                            warn!(layer = %layer_id, index, "boundary feature without a polygon, skipping");
                            None
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();
        s.level_mut().districts = districts;
    }
    for category_stats in &bundle.stats {
        if category_stats.ok {
            stats::attach_stats(
                &mut s.level_mut().districts,
                &category_stats.category,
                &category_stats.records,
            );
        }
    }

    s.log.finish_fetch();
    info!(
        successes = s.log.successes(),
        layers = s.log.layer_count(),
        errors = s.log.errors(),
        "input fetch finished"
    );

    if s.log.successes() != s.log.layer_count() {
        let reason = format!(
            "{} of {} layers failed to load",
            s.log.errors(),
            s.log.layer_count()
        );
        warn!(%reason, "aborting screening run");
        s.log.finish();
        return Ok(RunStatus::Aborted { reason });
    }
    if s.districts().is_empty() {
        let reason = "no districts have been loaded".to_string();
        warn!(%reason, "aborting screening run");
        s.log.finish();
        return Ok(RunStatus::Aborted { reason });
    }

    let (stats_bags, point_out, line_out, polygon_out) = {
        let level = &s.levels[s.level_idx];
        let districts = &level.districts;
        let cache = &s.fetcher.cache;
        let layers = &s.options.layers;
        join!(
            compute_stats(districts, &s.options.stats, &s.options.timescope, &s.keys),
            points::process(districts, &layers.point, cache),
            lines::process(districts, &layers.line, cache),
            polygons::process(districts, &layers.polygon, cache),
        )
    };

    s.log.record_kind(GeomKind::Point, point_out.elapsed);
    s.log.record_kind(GeomKind::Line, line_out.elapsed);
    s.log.record_kind(GeomKind::Polygon, polygon_out.elapsed);
    s.log
        .add_intersection_errors(line_out.intersection_errors + polygon_out.intersection_errors);

    {
        let districts = &mut s.level_mut().districts;
        for (district_idx, key, bag) in stats_bags {
            districts[district_idx].results.insert(key, bag);
        }
        for output in [point_out, line_out, polygon_out] {
            for (district_idx, key, bag) in output.bags {
                districts[district_idx].results.insert(key, bag);
            }
        }
    }

    s.log.finish();
    info!(districts = s.districts().len(), "screening run finished");
    Ok(RunStatus::Completed)
}

/// One bag per requested category and district, holding the stored
/// values of the years the timescope resolves to.
async fn compute_stats(
    districts: &[District],
    categories: &[String],
    scope: &Timescope,
    keys: &StatsKeys,
) -> Vec<(usize, String, AttrBag)> {
    let mut bags = Vec::new();
    for category in categories {
        let years = scope.resolve(category, districts, keys);
        for (district_idx, district) in districts.iter().enumerate() {
            let mut bag = AttrBag::new();
            if let Some(record) = district.stats.get(category) {
                for year in &years {
                    let key = keys.format(*year);
                    if let Some(value) = record.get(&key).and_then(values::parse_number) {
                        bag.insert(key, value);
                    }
                }
            }
            bags.push((district_idx, category.clone(), bag));
        }
    }
    bags
}
