use std::fmt;
use std::str::FromStr;

/// Allowed numeric values for a parameter, declared as `range` in the manifest
///
/// Grammar: `min..max`, `min-max`, `min+` (at least min), `max-` (at most max) or a single
/// number for an exact value. Bounds may be negative or fractional, e.g. `-1.5..2.5`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeValues<T> {
    pub min: Option<T>,
    pub max: Option<T>,
}

impl<T> Default for RangeValues<T> {
    fn default() -> Self {
        RangeValues { min: None, max: None }
    }
}

impl<T: Copy + PartialOrd + FromStr> RangeValues<T> {
    pub fn parse(spec: &str) -> Result<RangeValues<T>, String> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Ok(RangeValues::default());
        }
        if let Some((min, max)) = spec.split_once("..") {
            return RangeValues::bounded(min, max);
        }
        if let Some(min) = spec.strip_suffix('+') {
            return Ok(RangeValues { min: Some(parse_number(min)?), max: None });
        }
        // a leading '-' is a sign, a trailing '-' marks an upper bound
        if let Some(max) = spec.strip_suffix('-') {
            return Ok(RangeValues { min: None, max: Some(parse_number(max)?) });
        }
        if let Some(idx) = separator_dash(spec) {
            return RangeValues::bounded(&spec[..idx], &spec[idx + 1..]);
        }
        let n = parse_number(spec)?;
        Ok(RangeValues { min: Some(n), max: Some(n) })
    }

    fn bounded(min: &str, max: &str) -> Result<RangeValues<T>, String> {
        let min = parse_number(min)?;
        let max = parse_number(max)?;
        if min > max {
            return Err("min is greater than max".to_string());
        }
        Ok(RangeValues { min: Some(min), max: Some(max) })
    }

    pub fn is_set(&self) -> bool {
        self.min.is_some() || self.max.is_some()
    }

    pub fn contains(&self, value: T) -> bool {
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }
}

/// Position of a '-' separating two bounds, skipping signs and exponents
fn separator_dash(spec: &str) -> Option<usize> {
    let bytes = spec.as_bytes();
    (1..bytes.len()).find(|&i| bytes[i] == b'-' && !matches!(bytes[i - 1], b'-' | b'e' | b'E'))
}

fn parse_number<T: FromStr>(s: &str) -> Result<T, String> {
    let s = s.trim();
    s.parse::<T>().map_err(|_| format!("'{s}' is not a number"))
}

impl<T: fmt::Display> fmt::Display for RangeValues<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match (&self.min, &self.max) {
            (Some(min), Some(max)) => write!(f, "min={min}, max={max}"),
            (Some(min), None) => write!(f, "min={min}"),
            (None, Some(max)) => write!(f, "max={max}"),
            (None, None) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(spec: &str) -> Result<RangeValues<f64>, String> {
        RangeValues::parse(spec)
    }

    #[test]
    fn parses_bounded_and_open_ranges() {
        assert_eq!(parse("0..1").unwrap(), RangeValues { min: Some(0.0), max: Some(1.0) });
        assert_eq!(parse("2+").unwrap(), RangeValues { min: Some(2.0), max: None });
        assert_eq!(parse("0-").unwrap(), RangeValues { min: None, max: Some(0.0) });
        assert_eq!(parse("-1.5..2.5").unwrap(), RangeValues { min: Some(-1.5), max: Some(2.5) });
        assert_eq!(parse("1-3").unwrap(), RangeValues { min: Some(1.0), max: Some(3.0) });
        assert_eq!(parse("-5+").unwrap(), RangeValues { min: Some(-5.0), max: None });
        assert!(!parse("").unwrap().is_set());
    }

    #[test]
    fn rejects_malformed_ranges() {
        assert!(parse("abc").is_err());
        assert!(parse("3..1").is_err());
        assert!(parse("1..x").is_err());
    }

    #[test]
    fn contains_respects_one_sided_bounds() {
        let at_most_zero = parse("0-").unwrap();
        assert!(at_most_zero.contains(-3.0));
        assert!(!at_most_zero.contains(3.0));
        let at_least_two = parse("2+").unwrap();
        assert!(!at_least_two.contains(1.0));
        assert!(at_least_two.contains(2.0));
    }
}
