use std::time::Instant;

use geo::{MultiLineString, MultiPolygon, Point};
use tracing::info;

use crate::district::{AttrBag, District};
use crate::feature::{Feature, Geom};
use crate::geom::ops;
use crate::geom::split::split_line;

use super::fetch::FeatureCache;
use super::inputs::LayerSpec;
use super::{bucket_index, combine, parse_calc, share, KindOutput};

/// Line layers: metric lengths of the in-district portions, bucketed
/// and percentaged like areas, with grouped layers renormalized as one
/// unit afterwards.
pub(super) async fn process(
    districts: &[District],
    specs: &[LayerSpec],
    cache: &FeatureCache,
) -> KindOutput {
    let started = Instant::now();
    let mut bags = Vec::new();
    for spec in specs {
        let group = spec.id.ids();
        for id in group {
            let Some(features) = cache.get(id) else { continue };
            info!(
                layer = %id,
                districts = districts.len(),
                features = features.len(),
                "intersecting line layer"
            );
            process_layer(districts, id, features, spec, &mut bags);
        }
        if spec.id.is_group() {
            info!(layers = group.join(","), "renormalizing grouped line layers");
            combine::renormalize(
                &mut bags,
                districts.len(),
                group,
                "length",
                spec.attr_to_calc.as_deref(),
            );
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

    let mut labels: Vec<String> = Vec::new();
    let mut items: Vec<(&MultiLineString<f64>, &Feature, Option<usize>)> = Vec::new();
    for feature in features {
        let Some(Geom::Line(line)) = &feature.geometry else { continue };
        let bucket =
            categorize.map(|attr| bucket_index(&mut labels, &feature.props.label(attr)));
        items.push((line, feature, bucket));
    }

    for (district_idx, district) in districts.iter().enumerate() {
        let Some(polygon) = district.polygon() else { continue };

        let mut layer_length = 0.0;
        let mut layer_value = 0.0;
        // (length, value) per bucket
        let mut by_label = vec![(0.0, 0.0); labels.len()];

        for (line, feature, bucket) in &items {
            let Some(inside) = trimmed(line, polygon) else { continue };
            let length = ops::length_km(&inside) * 1000.0;
            let value = parse_calc(feature, calc).unwrap_or(length);
            layer_length += length;
            layer_value += value;
            if let Some(bucket) = bucket {
                by_label[*bucket].0 += length;
                by_label[*bucket].1 += value;
            }
        }

        let mut bag = AttrBag::new();
        for (bucket_idx, label) in labels.iter().enumerate() {
            let (length, value) = by_label[bucket_idx];
            if let Some(attr) = calc {
                bag.insert(format!("{label}_{attr}"), value);
                bag.insert(format!("{label}_{attr}_%_of_layer"), share(value, layer_value));
            }
            bag.insert(format!("{label}_length"), length);
            bag.insert(format!("{label}_length_%_of_layer"), share(length, layer_length));
        }
        if let Some(attr) = calc {
            bag.insert(format!("{layer_id}_{attr}"), layer_value);
        }
        bag.insert(format!("{layer_id}_length"), layer_length);
        bags.push((district_idx, layer_id.to_string(), bag));
    }
}

/// The portion of a line that counts for a district: fully contained
/// lines verbatim; crossing lines are split at the boundary, keeping
/// per part the piece whose second vertex lies inside the polygon;
/// disjoint lines yield nothing.
fn trimmed(
    line: &MultiLineString<f64>,
    polygon: &MultiPolygon<f64>,
) -> Option<MultiLineString<f64>> {
    if ops::line_within(line, polygon) {
        return Some(line.clone());
    }
    if !ops::line_intersects(line, polygon) {
        return None;
    }
    let mut kept = Vec::new();
    for part in &line.0 {
        let pieces = split_line(part, polygon);
        if let Some(inside) = pieces.into_iter().find(|piece| {
            piece.0.len() >= 2 && ops::point_in_polygon(&Point::from(piece.0[1]), polygon)
        }) {
            kept.push(inside);
        }
    }
    if kept.is_empty() {
        None
    } else {
        Some(MultiLineString::new(kept))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, LineString};

    fn unit_square() -> MultiPolygon<f64> {
        MultiPolygon(vec![polygon![
            (x: 0.0, y: 0.0),
            (x: 10.0, y: 0.0),
            (x: 10.0, y: 10.0),
            (x: 0.0, y: 10.0),
        ]])
    }

    fn line(coords: &[(f64, f64)]) -> MultiLineString<f64> {
        MultiLineString::new(vec![LineString::from(coords.to_vec())])
    }

    #[test]
    fn contained_lines_come_back_whole() {
        let inside = line(&[(2.0, 2.0), (8.0, 2.0)]);
        let trimmed = trimmed(&inside, &unit_square()).unwrap();
        assert_eq!(trimmed.0.len(), 1);
        assert_eq!(trimmed.0[0].0.len(), 2);
    }

    #[test]
    fn disjoint_lines_are_dropped() {
        let outside = line(&[(20.0, 20.0), (30.0, 20.0)]);
        assert!(trimmed(&outside, &unit_square()).is_none());
    }

    #[test]
    fn crossing_lines_keep_the_inside_piece() {
        // Intermediate vertex keeps the second-vertex rule unambiguous.
        let crossing = line(&[(-5.0, 5.0), (-2.0, 5.0), (5.0, 5.0)]);
        let kept = trimmed(&crossing, &unit_square()).unwrap();
        let length = ops::length_km(&kept) * 1000.0;
        assert!((length - 5.0).abs() < 1e-9);
    }
}
