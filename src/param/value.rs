use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::lsid::Lsid;
use crate::param::spec::ParameterSpec;

/// One raw value as submitted, with the group it belongs to ("" when ungrouped)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ParamValue {
    pub value: String,
    #[serde(default)]
    pub group_id: String,
}

impl ParamValue {
    pub fn new(value: &str) -> ParamValue {
        ParamValue { value: value.to_string(), group_id: String::new() }
    }

    pub fn grouped(value: &str, group_id: &str) -> ParamValue {
        ParamValue { value: value.to_string(), group_id: group_id.to_string() }
    }
}

/// The actual values of one parameter, in submission order
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Param {
    pub name: String,
    pub values: Vec<ParamValue>,
    /// The values are batch inputs, each one (or each file in it) is a separate job
    #[serde(default)]
    pub batch: bool,
}

impl Param {
    pub fn new(name: &str) -> Param {
        Param { name: name.to_string(), values: Vec::new(), batch: false }
    }

    pub fn with_values(name: &str, values: &[&str]) -> Param {
        let mut param = Param::new(name);
        for value in values {
            param.values.push(ParamValue::new(value));
        }
        param
    }

    /// Initialize from the declared default value
    pub fn from_default(spec: &ParameterSpec) -> Param {
        let mut param = Param::new(&spec.name);
        if let Some(defaults) = spec.default_values() {
            param.values.extend(defaults.iter().map(|v| ParamValue::new(v)));
        }
        param
    }

    pub fn num_values(&self) -> usize {
        self.values.len()
    }

    pub fn raw_values(&self) -> Vec<&str> {
        self.values.iter().map(|v| v.value.as_str()).collect()
    }

    /// Distinct group ids in order of first appearance
    pub fn groups(&self) -> Vec<&str> {
        let mut groups: Vec<&str> = Vec::new();
        for value in &self.values {
            if !groups.contains(&value.group_id.as_str()) {
                groups.push(&value.group_id);
            }
        }
        groups
    }
}

/// Everything submitted for one job: the module and the values of its parameters
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct JobInputSet {
    pub lsid: Lsid,
    /// Overrides the configured base href, e.g. when the request came in through another host name
    pub base_href: Option<String>,
    pub params: BTreeMap<String, Param>,
}

impl JobInputSet {
    pub fn new(lsid: Lsid) -> JobInputSet {
        JobInputSet { lsid, base_href: None, params: BTreeMap::new() }
    }

    pub fn add_value(&mut self, name: &str, value: ParamValue, batch: bool) {
        let param = self.params.entry(name.to_string()).or_insert_with(|| Param::new(name));
        param.batch |= batch;
        param.values.push(value);
    }

    pub fn set_param(&mut self, param: Param) {
        self.params.insert(param.name.clone(), param);
    }

    pub fn param(&self, name: &str) -> Option<&Param> {
        self.params.get(name)
    }

    pub fn batch_params(&self) -> impl Iterator<Item = &Param> {
        self.params.values().filter(|p| p.batch)
    }

    pub fn is_batch(&self) -> bool {
        self.batch_params().next().is_some()
    }
}

/// Who is submitting and for which module
#[derive(Debug, Clone)]
pub struct JobContext {
    pub user_id: String,
    pub is_admin: bool,
    pub lsid: Lsid,
    /// Distinguishes the generated files of one submission from another
    pub submission_id: String,
}

impl JobContext {
    pub fn new(user_id: &str, is_admin: bool, lsid: Lsid) -> JobContext {
        JobContext {
            user_id: user_id.to_string(),
            is_admin,
            lsid,
            submission_id: Utc::now().format("%Y%m%d%H%M%S%6f").to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::spec::ParamKind;

    fn lsid() -> Lsid {
        "urn:lsid:example.org:module:00001:1".parse().unwrap()
    }

    #[test]
    fn values_keep_submission_order() {
        let mut input = JobInputSet::new(lsid());
        input.add_value("files", ParamValue::grouped("b.gct", "tumor"), false);
        input.add_value("files", ParamValue::grouped("a.gct", "normal"), false);
        input.add_value("files", ParamValue::grouped("c.gct", "tumor"), false);
        let param = input.param("files").unwrap();
        assert_eq!(param.raw_values(), vec!["b.gct", "a.gct", "c.gct"]);
        assert_eq!(param.groups(), vec!["tumor", "normal"]);
        assert!(!input.is_batch());
    }

    #[test]
    fn batch_flag_sticks_to_param() {
        let mut input = JobInputSet::new(lsid());
        input.add_value("dir", ParamValue::new("/data/batch"), true);
        input.add_value("threshold", ParamValue::new("1"), false);
        let names: Vec<&str> = input.batch_params().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["dir"]);
    }

    #[test]
    fn default_value_initializes_param() {
        let mut spec = ParameterSpec::new("t", ParamKind::Text);
        assert_eq!(Param::from_default(&spec).num_values(), 0);
        spec.default_value = Some("5".to_string());
        assert_eq!(Param::from_default(&spec).raw_values(), vec!["5"]);
    }
}
