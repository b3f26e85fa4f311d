//! Versioned module identifiers, e.g. `urn:lsid:broad.mit.edu:cancer.software.genepattern.module.analysis:00020:4`

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Lsid {
    pub authority: String,
    pub namespace: String,
    pub identifier: String,
    pub version: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
pub struct LsidParseError(pub String);

impl fmt::Display for LsidParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "invalid lsid: {}", self.0)
    }
}

impl std::error::Error for LsidParseError {}

impl FromStr for Lsid {
    type Err = LsidParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        if parts.len() < 5 || !parts[0].eq_ignore_ascii_case("urn") || !parts[1].eq_ignore_ascii_case("lsid") {
            return Err(LsidParseError(s.to_string()));
        }
        if parts.len() > 6 || parts[2..5].iter().any(|p| p.is_empty()) {
            return Err(LsidParseError(s.to_string()));
        }
        let version = parts.get(5).filter(|v| !v.is_empty()).map(|v| v.to_string());
        Ok(Lsid {
            authority: parts[2].to_string(),
            namespace: parts[3].to_string(),
            identifier: parts[4].to_string(),
            version,
        })
    }
}

impl fmt::Display for Lsid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "urn:lsid:{}:{}:{}", self.authority, self.namespace, self.identifier)?;
        if let Some(version) = &self.version {
            write!(f, ":{version}")?;
        }
        Ok(())
    }
}

impl Lsid {
    /// Same module, ignoring the version
    pub fn same_module(&self, other: &Lsid) -> bool {
        self.authority == other.authority && self.namespace == other.namespace && self.identifier == other.identifier
    }

    pub fn without_version(&self) -> Lsid {
        Lsid { version: None, ..self.clone() }
    }
}

/// Compare versions numerically by dot-separated component, so that "1.10" > "1.9" and "2" > "1.5".
/// A missing version sorts first.
pub fn compare_versions(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => {
            let mut left = a.split('.');
            let mut right = b.split('.');
            loop {
                match (left.next(), right.next()) {
                    (None, None) => return Ordering::Equal,
                    (None, Some(_)) => return Ordering::Less,
                    (Some(_), None) => return Ordering::Greater,
                    (Some(l), Some(r)) => {
                        let ord = match (l.parse::<u64>(), r.parse::<u64>()) {
                            (Ok(l), Ok(r)) => l.cmp(&r),
                            _ => l.cmp(r),
                        };
                        if ord != Ordering::Equal {
                            return ord;
                        }
                    }
                }
            }
        }
    }
}

impl Serialize for Lsid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Lsid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
