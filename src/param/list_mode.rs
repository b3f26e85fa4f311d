use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::param::num_values::NumValues;

/// How the values of a list parameter reach the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ListMode {
    /// 0 values: no arg, 1 value: the value itself, >1 values: a file list
    Legacy,
    /// 0 values: no arg, otherwise a file list
    List,
    /// Always a file list, even when empty
    ListIncludeEmpty,
    /// All values joined into one arg: `argA,argB`, `-iargA,argB` or `-i`, `argA,argB`
    Cmd,
    /// One arg per value: `argA`, `argB`, `-iargA`, `-iargB` or `-i`, `argA`, `-i`, `argB`
    CmdOpt,
}

impl FromStr for ListMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "LEGACY" => Ok(ListMode::Legacy),
            "LIST" => Ok(ListMode::List),
            "LIST_INCLUDE_EMPTY" | "LISTINCLUDEEMPTY" => Ok(ListMode::ListIncludeEmpty),
            "CMD" => Ok(ListMode::Cmd),
            "CMD_OPT" => Ok(ListMode::CmdOpt),
            other => Err(format!("Error initializing listMode from listMode={other}")),
        }
    }
}

impl fmt::Display for ListMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            ListMode::Legacy => "LEGACY",
            ListMode::List => "LIST",
            ListMode::ListIncludeEmpty => "LIST_INCLUDE_EMPTY",
            ListMode::Cmd => "CMD",
            ListMode::CmdOpt => "CMD_OPT",
        };
        write!(f, "{name}")
    }
}

impl ListMode {
    pub fn is_cmd(&self) -> bool {
        matches!(self, ListMode::Cmd | ListMode::CmdOpt)
    }
}

/// Do we need to write a file list for this parameter?
///
/// Never for command line lists or parameters that don't accept a list. Otherwise always for
/// more than one value; for 0 values only with LIST_INCLUDE_EMPTY; for 1 value unless LEGACY.
pub fn is_create_filelist(allowed: &NumValues, num_values: usize, mode: ListMode) -> bool {
    if !allowed.accepts_list() || mode.is_cmd() {
        return false;
    }
    match num_values {
        0 => mode == ListMode::ListIncludeEmpty,
        1 => mode != ListMode::Legacy,
        _ => true,
    }
}

/// A group file accompanies every file list of a parameter which declares group info, no matter
/// how many groups a particular job uses.
pub fn is_create_group_file(create_filelist: bool, has_group_info: bool) -> bool {
    create_filelist && has_group_info
}

/// Values are passed inline on the command line rather than as a file list
pub fn is_cmd_line_list(allowed: &NumValues, mode: ListMode) -> bool {
    allowed.accepts_list() && mode.is_cmd()
}

/// Separator and prefix for CMD and CMD_OPT lists
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmdLineFormat {
    pub separator: String,
    /// `prefix_when_specified`; a trailing space makes the prefix a separate arg
    pub prefix: Option<String>,
}

impl Default for CmdLineFormat {
    fn default() -> Self {
        CmdLineFormat { separator: ",".to_string(), prefix: None }
    }
}

impl CmdLineFormat {
    /// Build the command line args for the given values, in order
    pub fn tokens(&self, mode: ListMode, values: &[&str]) -> Vec<String> {
        if values.is_empty() {
            return Vec::new();
        }
        match mode {
            ListMode::Cmd => {
                let joined = values.join(self.separator.as_str());
                self.prefixed(&joined)
            }
            ListMode::CmdOpt => values.iter().flat_map(|v| self.prefixed(v)).collect(),
            _ => values.iter().map(|v| v.to_string()).collect(),
        }
    }

    fn prefixed(&self, arg: &str) -> Vec<String> {
        match self.prefix.as_deref() {
            None | Some("") => vec![arg.to_string()],
            Some(prefix) if prefix.ends_with(' ') => vec![prefix.trim_end().to_string(), arg.to_string()],
            Some(prefix) => vec![format!("{prefix}{arg}")],
        }
    }
}
