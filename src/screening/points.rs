use std::time::Instant;

use geo::Point;
use tracing::info;

use crate::district::{AttrBag, District};
use crate::feature::{Feature, Geom};
use crate::geom::ops;

use super::fetch::FeatureCache;
use super::inputs::LayerSpec;
use super::values::Fallback;
use super::{bucket_index, parse_calc, share, KindOutput};

/// Point layers: per district and bucket, the contained count and the
/// sum of the value attribute, plus each bucket's share of the layer.
pub(super) async fn process(
    districts: &[District],
    specs: &[LayerSpec],
    cache: &FeatureCache,
) -> KindOutput {
    let started = Instant::now();
    let mut bags = Vec::new();
    for spec in specs {
        for id in spec.id.ids() {
            let Some(features) = cache.get(id) else { continue };
            info!(
                layer = %id,
                districts = districts.len(),
                features = features.len(),
                "intersecting point layer"
            );
            process_layer(districts, id, features, spec, &mut bags);
        }
    }
    KindOutput { bags, elapsed: started.elapsed(), intersection_errors: 0 }
}

fn process_layer(
    districts: &[District],
    layer_id: &str,
    features: &[Feature],
    spec: &LayerSpec,
    bags: &mut Vec<(usize, String, AttrBag)>,
) {
    let categorize = spec.attr_to_categorize.as_deref();
    let calc = spec.attr_to_calc.as_deref();

    // Each point is one count unit; items runs parallel to points.
    let mut labels: Vec<String> = Vec::new();
    let mut points: Vec<Point<f64>> = Vec::new();
    let mut items: Vec<(Option<f64>, Option<usize>)> = Vec::new();
    for feature in features {
        let Some(Geom::Point(point)) = &feature.geometry else { continue };
        let raw = parse_calc(feature, calc);
        let bucket =
            categorize.map(|attr| bucket_index(&mut labels, &feature.props.label(attr)));
        points.push(*point);
        items.push((raw, bucket));
    }

    for (district_idx, district) in districts.iter().enumerate() {
        let Some(polygon) = district.polygon() else { continue };
        let contained = ops::points_within(&points, polygon);

        let mut bag = AttrBag::new();
        let layer_raws: Vec<Option<f64>> = contained.iter().map(|&i| items[i].0).collect();
        write_bucket(&mut bag, layer_id, calc, &layer_raws);

        for (bucket_idx, label) in labels.iter().enumerate() {
            let raws: Vec<Option<f64>> = contained
                .iter()
                .copied()
                .filter(|&i| items[i].1 == Some(bucket_idx))
                .map(|i| items[i].0)
                .collect();
            write_bucket(&mut bag, label, calc, &raws);
            for attr in percent_attrs(calc) {
                let part = bag.get(&format!("{label}_{attr}")).copied().unwrap_or(0.0);
                let total = bag.get(&format!("{layer_id}_{attr}")).copied().unwrap_or(0.0);
                bag.insert(format!("{label}_{attr}_%_of_layer"), share(part, total));
            }
        }
        bags.push((district_idx, layer_id.to_string(), bag));
    }
}

/// Count and value sum of one bucket. Invalid values resolve to the
/// median of the bucket's valid ones.
fn write_bucket(bag: &mut AttrBag, prefix: &str, calc: Option<&str>, raws: &[Option<f64>]) {
    bag.insert(format!("{prefix}_count"), raws.len() as f64);
    if let Some(attr) = calc {
        let fallback = Fallback::new(raws);
        let sum: f64 = raws.iter().map(|raw| fallback.resolve(*raw)).sum();
        bag.insert(format!("{prefix}_{attr}"), sum);
    }
}

fn percent_attrs(calc: Option<&str>) -> Vec<&str> {
    match calc {
        Some(attr) => vec![attr, "count"],
        None => vec!["count"],
    }
}
