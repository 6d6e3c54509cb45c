use std::time::Instant;

use geo::{BoundingRect, MultiPolygon};
use tracing::{debug, info};

use crate::district::{AttrBag, District};
use crate::feature::{Feature, Geom};
use crate::geom::{ops, rtree_candidates, rtree_of};

use super::fetch::FeatureCache;
use super::inputs::LayerSpec;
use super::{bucket_index, combine, parse_calc, share, KindOutput};

/// Polygon layers: intersection areas and value sums per district and
/// bucket, with the share of the layer and of the district itself.
pub(super) async fn process(
    districts: &[District],
    specs: &[LayerSpec],
    cache: &FeatureCache,
) -> KindOutput {
    let started = Instant::now();
    let mut bags = Vec::new();
    let mut intersection_errors = 0;
    for spec in specs {
        let group = spec.id.ids();
        for id in group {
            let Some(features) = cache.get(id) else { continue };
            info!(
                layer = %id,
                districts = districts.len(),
                features = features.len(),
                "intersecting polygon layer"
            );
            intersection_errors += process_layer(districts, id, features, spec, &mut bags);
        }
        if spec.id.is_group() {
            info!(layers = group.join(","), "renormalizing grouped polygon layers");
            combine::renormalize(
                &mut bags,
                districts.len(),
                group,
                "area",
                spec.attr_to_calc.as_deref(),
            );
        }
    }
    KindOutput { bags, elapsed: started.elapsed(), intersection_errors }
}

/// Returns the number of failed intersections; failures skip the
/// feature and the run continues.
fn process_layer(
    districts: &[District],
    layer_id: &str,
    features: &[Feature],
    spec: &LayerSpec,
    bags: &mut Vec<(usize, String, AttrBag)>,
) -> usize {
    let categorize = spec.attr_to_categorize.as_deref();
    let calc = spec.attr_to_calc.as_deref();

    let mut labels: Vec<String> = Vec::new();
    let mut items: Vec<(&MultiPolygon<f64>, &Feature, Option<usize>)> = Vec::new();
    let mut rects = Vec::new();
    for feature in features {
        let Some(Geom::Area(area)) = &feature.geometry else { continue };
        let bucket =
            categorize.map(|attr| bucket_index(&mut labels, &feature.props.label(attr)));
        if let Some(rect) = area.bounding_rect() {
            rects.push((items.len(), rect));
        }
        items.push((area, feature, bucket));
    }
    let tree = rtree_of(rects.into_iter());

    let mut errors = 0;
    for (district_idx, district) in districts.iter().enumerate() {
        let Some(polygon) = district.polygon() else { continue };
        let Some(query) = polygon.bounding_rect() else { continue };
        let district_area = ops::area_m2(polygon);

        let mut layer_area = 0.0;
        let mut layer_value = 0.0;
        // (area, value) per bucket
        let mut by_label = vec![(0.0, 0.0); labels.len()];

        for candidate in rtree_candidates(&tree, &query) {
            let (area_geom, feature, bucket) = &items[candidate];
            let clipped = match ops::intersection(area_geom, polygon) {
                Ok(Some(clipped)) => clipped,
                Ok(None) => continue,
                Err(err) => {
                    debug!(layer = %layer_id, district = %district.id(), error = %err,
                        "intersection failed");
                    errors += 1;
                    continue;
                }
            };
            let area = ops::area_m2(&clipped);
            let value = parse_calc(feature, calc).unwrap_or(area);
            layer_area += area;
            layer_value += value;
            if let Some(bucket) = bucket {
                by_label[*bucket].0 += area;
                by_label[*bucket].1 += value;
            }
        }

        let mut bag = AttrBag::new();
        for (bucket_idx, label) in labels.iter().enumerate() {
            let (area, value) = by_label[bucket_idx];
            if let Some(attr) = calc {
                bag.insert(format!("{label}_{attr}"), value);
                bag.insert(format!("{label}_{attr}_%_of_layer"), share(value, layer_value));
            }
            bag.insert(format!("{label}_area"), area);
            bag.insert(format!("{label}_area_%_of_layer"), share(area, layer_area));
            bag.insert(format!("{label}_area_%_of_district"), share(area, district_area));
        }
        if let Some(attr) = calc {
            bag.insert(format!("{layer_id}_{attr}"), layer_value);
        }
        bag.insert(format!("{layer_id}_area"), layer_area);
        bags.push((district_idx, layer_id.to_string(), bag));
    }
    errors
}
