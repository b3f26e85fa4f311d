use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::param::list_mode::ListMode;

/// Which generation of the list-handling rules applies to a server
///
/// Older servers only understood file lists (LEGACY by default, no command line lists, no grouped
/// lists, no external collaboration service). Both generations are served by the same assembler;
/// the profile expands into a [ListPolicy] of capability flags.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyProfile {
    Legacy,
    #[default]
    Current,
}

impl fmt::Display for PolicyProfile {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PolicyProfile::Legacy => write!(f, "legacy"),
            PolicyProfile::Current => write!(f, "current"),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ListPolicy {
    pub default_list_mode: ListMode,
    pub cmd_line_lists: bool,
    pub grouped_lists: bool,
    pub external_service: bool,
}

impl PolicyProfile {
    pub fn policy(&self) -> ListPolicy {
        match self {
            PolicyProfile::Legacy => ListPolicy {
                default_list_mode: ListMode::Legacy,
                cmd_line_lists: false,
                grouped_lists: false,
                external_service: false,
            },
            PolicyProfile::Current => ListPolicy {
                default_list_mode: ListMode::List,
                cmd_line_lists: true,
                grouped_lists: true,
                external_service: true,
            },
        }
    }
}

impl ListPolicy {
    pub fn supports(&self, mode: ListMode) -> bool {
        match mode {
            ListMode::Cmd | ListMode::CmdOpt => self.cmd_line_lists,
            _ => true,
        }
    }
}
