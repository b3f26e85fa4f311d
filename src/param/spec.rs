use serde::{Deserialize, Serialize};

use crate::error::{JobInputError, Result};
use crate::lsid::Lsid;
use crate::param::list_mode::{CmdLineFormat, ListMode};
use crate::param::num_values::NumValues;
use crate::param::range::RangeValues;
use crate::policy::ListPolicy;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    #[default]
    Text,
    Integer,
    Float,
    File,
    Directory,
}

/// A command line value and the label shown for it in the job input form
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Choice {
    pub label: String,
    pub value: String,
}

/// Declares that the values of a list parameter are organised in groups
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupInfo {
    /// Allowed number of distinct groups, in numValues grammar
    pub num_groups: Option<String>,
    pub group_column_label: Option<String>,
    pub file_column_label: Option<String>,
}

/// A formal parameter, one entry of a module manifest
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterSpec {
    pub name: String,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub kind: ParamKind,
    pub num_values: Option<String>,
    pub range: Option<String>,
    pub list_mode: Option<String>,
    pub list_mode_sep: Option<String>,
    pub prefix_when_specified: Option<String>,
    #[serde(default)]
    pub file_formats: Vec<String>,
    /// External URLs are handed to the job as is, never downloaded
    #[serde(default)]
    pub pass_by_reference: bool,
    #[serde(default)]
    pub choices: Vec<Choice>,
    pub default_value: Option<String>,
    pub group_info: Option<GroupInfo>,
}

impl ParameterSpec {
    pub fn new(name: &str, kind: ParamKind) -> ParameterSpec {
        ParameterSpec {
            name: name.to_string(),
            optional: false,
            kind,
            num_values: None,
            range: None,
            list_mode: None,
            list_mode_sep: None,
            prefix_when_specified: None,
            file_formats: Vec::new(),
            pass_by_reference: false,
            choices: Vec::new(),
            default_value: None,
            group_info: None,
        }
    }

    pub fn is_file(&self) -> bool {
        self.kind == ParamKind::File
    }

    pub fn is_directory(&self) -> bool {
        self.kind == ParamKind::Directory
    }

    pub fn is_file_or_directory(&self) -> bool {
        self.is_file() || self.is_directory()
    }

    pub fn allowed_num_values(&self) -> Result<NumValues> {
        let spec = self.num_values.as_deref().unwrap_or("");
        NumValues::parse(spec).map_err(|reason| JobInputError::Parse {
            param: self.name.clone(),
            attribute: "numValues",
            spec: spec.to_string(),
            reason,
        })
    }

    pub fn allowed_range(&self) -> Result<RangeValues<f64>> {
        let spec = self.range.as_deref().unwrap_or("");
        RangeValues::parse(spec).map_err(|reason| JobInputError::Parse {
            param: self.name.clone(),
            attribute: "range",
            spec: spec.to_string(),
            reason,
        })
    }

    pub fn allowed_num_groups(&self) -> Result<Option<NumValues>> {
        let spec = match self.group_info.as_ref().and_then(|g| g.num_groups.as_deref()) {
            Some(spec) => spec,
            None => return Ok(None),
        };
        NumValues::parse(spec).map(Some).map_err(|reason| JobInputError::Parse {
            param: self.name.clone(),
            attribute: "numGroups",
            spec: spec.to_string(),
            reason,
        })
    }

    /// The declared listMode, or the policy default when none is declared
    pub fn resolve_list_mode(&self, policy: &ListPolicy) -> Result<ListMode> {
        let declared = match self.list_mode.as_deref().map(str::trim) {
            Some(declared) if !declared.is_empty() => declared,
            _ => return Ok(policy.default_list_mode),
        };
        let mode: ListMode = declared.parse().map_err(|message| JobInputError::InvalidConfig {
            param: self.name.clone(),
            message,
        })?;
        if !policy.supports(mode) {
            return Err(JobInputError::InvalidConfig {
                param: self.name.clone(),
                message: format!("listMode={mode} is not supported by this server"),
            });
        }
        Ok(mode)
    }

    pub fn is_cmd_line_list(&self, policy: &ListPolicy) -> Result<bool> {
        let allowed = self.allowed_num_values()?;
        let mode = self.resolve_list_mode(policy)?;
        Ok(crate::param::list_mode::is_cmd_line_list(&allowed, mode))
    }

    pub fn cmd_line_format(&self) -> CmdLineFormat {
        let mut format = CmdLineFormat { prefix: self.prefix_when_specified.clone(), ..Default::default() };
        if let Some(sep) = self.list_mode_sep.as_ref().filter(|s| !s.is_empty()) {
            format.separator = sep.clone();
        }
        format
    }

    /// The default value as a list, `None` when no default applies
    ///
    /// An empty default counts as a value for text parameters but not for files.
    pub fn default_values(&self) -> Option<Vec<String>> {
        match self.default_value.as_deref() {
            None => None,
            Some("") if self.is_file() => None,
            Some(value) => Some(vec![value.to_string()]),
        }
    }

    /// Map a form label to its command line value
    pub fn choice_value_for_label(&self, label: &str) -> Option<&str> {
        self.choices.iter().find(|c| c.label == label).map(|c| c.value.as_str())
    }

    pub fn is_choice_value(&self, value: &str) -> bool {
        self.choices.iter().any(|c| c.value == value)
    }
}

/// A versioned module and its parameters
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModuleSpec {
    pub lsid: Lsid,
    pub name: String,
    /// e.g. `python <libdir>preprocess.py <input.file> <threshold>`; without it the command is the
    /// module name followed by the args of every parameter
    #[serde(default, rename = "commandLine")]
    pub command_line: Option<String>,
    #[serde(default)]
    pub params: Vec<ParameterSpec>,
}

impl ModuleSpec {
    pub fn param(&self, name: &str) -> Option<&ParameterSpec> {
        self.params.iter().find(|p| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::PolicyProfile;

    #[test]
    fn deserialises_manifest_entry() {
        let json = r#"{
            "name": "input.file", "kind": "file", "numValues": "1+", "listMode": "cmd_opt",
            "prefixWhenSpecified": "-i ", "fileFormats": ["gct", "res"], "passByReference": true
        }"#;
        let spec: ParameterSpec = serde_json::from_str(json).unwrap();
        assert!(spec.is_file());
        assert!(spec.pass_by_reference);
        assert_eq!(spec.allowed_num_values().unwrap(), NumValues::new(1, None));
        let policy = PolicyProfile::Current.policy();
        assert_eq!(spec.resolve_list_mode(&policy).unwrap(), ListMode::CmdOpt);
        assert!(spec.is_cmd_line_list(&policy).unwrap());
    }

    #[test]
    fn bad_metadata_is_reported_with_param_name() {
        let mut spec = ParameterSpec::new("p", ParamKind::Text);
        spec.num_values = Some("5..2".to_string());
        let err = spec.allowed_num_values().unwrap_err();
        assert!(matches!(err, JobInputError::Parse { .. }));
        assert!(err.to_string().contains("numValues=5..2 for p"));

        spec.list_mode = Some("sideways".to_string());
        let err = spec.resolve_list_mode(&PolicyProfile::Current.policy()).unwrap_err();
        assert!(matches!(err, JobInputError::InvalidConfig { .. }));
    }

    #[test]
    fn list_mode_defaults_follow_policy() {
        let spec = ParameterSpec::new("p", ParamKind::File);
        assert_eq!(spec.resolve_list_mode(&PolicyProfile::Legacy.policy()).unwrap(), ListMode::Legacy);
        assert_eq!(spec.resolve_list_mode(&PolicyProfile::Current.policy()).unwrap(), ListMode::List);

        let mut cmd = ParameterSpec::new("p", ParamKind::Text);
        cmd.list_mode = Some("CMD".to_string());
        assert!(cmd.resolve_list_mode(&PolicyProfile::Legacy.policy()).is_err());
    }

    #[test]
    fn empty_default_is_no_value_for_files() {
        let mut file = ParameterSpec::new("f", ParamKind::File);
        file.default_value = Some(String::new());
        assert_eq!(file.default_values(), None);
        let mut text = ParameterSpec::new("t", ParamKind::Text);
        text.default_value = Some(String::new());
        assert_eq!(text.default_values(), Some(vec![String::new()]));
    }
}
