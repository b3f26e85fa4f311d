use std::fmt;

/// Allowed number of values for a parameter, declared as `numValues` in the manifest
///
/// Grammar: `N`, `N+`, `N..M` or `N-M`. An empty declaration leaves both bounds unset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NumValues {
    pub min: Option<u32>,
    pub max: Option<u32>,
}

impl NumValues {
    pub fn new(min: u32, max: Option<u32>) -> NumValues {
        NumValues { min: Some(min), max }
    }

    pub fn parse(spec: &str) -> Result<NumValues, String> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Ok(NumValues::default());
        }
        if let Some(min) = spec.strip_suffix('+') {
            return Ok(NumValues::new(parse_bound(min)?, None));
        }
        let bounds = spec.split_once("..").or_else(|| spec.split_once('-'));
        match bounds {
            Some((min, max)) => {
                let min = parse_bound(min)?;
                let max = parse_bound(max)?;
                if min > max {
                    return Err(format!("min ({min}) is greater than max ({max})"));
                }
                Ok(NumValues::new(min, Some(max)))
            }
            None => {
                let n = parse_bound(spec)?;
                Ok(NumValues::new(n, Some(n)))
            }
        }
    }

    /// More than one value may be submitted, so the parameter is a list
    pub fn accepts_list(&self) -> bool {
        match (self.min, self.max) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(_), Some(max)) => max > 1,
        }
    }
}

fn parse_bound(s: &str) -> Result<u32, String> {
    let s = s.trim();
    s.parse::<u32>().map_err(|_| format!("'{s}' is not a non-negative integer"))
}

impl fmt::Display for NumValues {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match (self.min, self.max) {
            (None, _) => Ok(()),
            (Some(min), None) => write!(f, "{min}+"),
            (Some(min), Some(max)) if min == max => write!(f, "{min}"),
            (Some(min), Some(max)) => write!(f, "{min}..{max}"),
        }
    }
}
