use std::fmt;
use std::str::FromStr;

/// A simple way to keep track of job state.
///
/// Only two states are supported: staged (working directory and job script written) and
/// submitted (after the queue accepted the job script).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Staged,
    Submitted,
}

impl JobState {
    /// value of the `state` column
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Staged => "staged",
            JobState::Submitted => "submitted",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for JobState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "staged" => Ok(JobState::Staged),
            "submitted" => Ok(JobState::Submitted),
            other => Err(format!("unknown job state {other}")),
        }
    }
}
