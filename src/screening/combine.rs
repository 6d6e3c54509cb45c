use crate::district::AttrBag;

use super::share;

/// Recomputes the `_%_of_layer` shares of a layer group against the
/// group-wide totals instead of the per-layer ones. Runs strictly after
/// every grouped layer has been processed, so the totals are complete.
pub(super) fn renormalize(
    bags: &mut [(usize, String, AttrBag)],
    district_count: usize,
    group: &[String],
    suffix: &str,
    calc: Option<&str>,
) {
    let geom_suffix = format!("_{suffix}");
    for district_idx in 0..district_count {
        let mut total_geom = 0.0;
        let mut total_value = 0.0;
        for (idx, key, bag) in bags.iter() {
            if *idx != district_idx || !group.contains(key) {
                continue;
            }
            total_geom += bag.get(&format!("{key}{geom_suffix}")).copied().unwrap_or(0.0);
            if let Some(attr) = calc {
                total_value += bag.get(&format!("{key}_{attr}")).copied().unwrap_or(0.0);
            }
        }
        for (idx, key, bag) in bags.iter_mut() {
            if *idx != district_idx || !group.contains(key) {
                continue;
            }
            let bases: Vec<String> = bag
                .keys()
                .filter_map(|name| name.strip_suffix(&geom_suffix))
                .map(str::to_string)
                .collect();
            for base in bases {
                let part = bag.get(&format!("{base}{geom_suffix}")).copied().unwrap_or(0.0);
                bag.insert(
                    format!("{base}{geom_suffix}_%_of_layer"),
                    share(part, total_geom),
                );
                if let Some(attr) = calc {
                    let value_key = format!("{base}_{attr}");
                    if let Some(value) = bag.get(&value_key).copied() {
                        bag.insert(format!("{value_key}_%_of_layer"), share(value, total_value));
                    }
                }
            }
        }
    }
}
