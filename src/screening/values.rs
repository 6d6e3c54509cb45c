use serde_json::Value;

/// Numeric view of a property value: numbers as-is, numeric strings
/// parsed, everything else (and every non-finite result) rejected.
pub(crate) fn parse_number(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.and_then(|v| v.is_finite().then_some(v))
}

/// Median substitute for invalid values within one comparison set.
///
/// The median is taken once over the finite peers and reused for every
/// invalid value in the set; an empty peer set yields zero.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Fallback {
    median: f64,
}

impl Fallback {
    pub(crate) fn new(values: &[Option<f64>]) -> Self {
        let mut finite: Vec<f64> = values.iter().filter_map(|v| *v).collect();
        finite.sort_by(f64::total_cmp);
        let median = match finite.len() {
            0 => 0.0,
            n if n % 2 == 1 => finite[n / 2],
            n => (finite[n / 2 - 1] + finite[n / 2]) / 2.0,
        };
        Self { median }
    }

    #[inline]
    pub(crate) fn resolve(&self, value: Option<f64>) -> f64 {
        value.unwrap_or(self.median)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_number_accepts_numbers_and_numeric_strings() {
        assert_eq!(parse_number(&json!(42)), Some(42.0));
        assert_eq!(parse_number(&json!(1.5)), Some(1.5));
        assert_eq!(parse_number(&json!(" 7 ")), Some(7.0));
        assert_eq!(parse_number(&json!("abc")), None);
        assert_eq!(parse_number(&json!(null)), None);
        assert_eq!(parse_number(&json!(true)), None);
        assert_eq!(parse_number(&json!("inf")), None);
    }

    #[test]
    fn median_of_odd_and_even_sets() {
        let odd = Fallback::new(&[Some(10.0), Some(30.0), Some(20.0)]);
        assert_eq!(odd.resolve(None), 20.0);

        let even = Fallback::new(&[Some(10.0), None, Some(20.0)]);
        assert_eq!(even.resolve(None), 15.0);
        assert_eq!(even.resolve(Some(99.0)), 99.0);
    }

    #[test]
    fn empty_peer_set_resolves_to_zero() {
        let fallback = Fallback::new(&[None, None]);
        assert_eq!(fallback.resolve(None), 0.0);
    }
}
