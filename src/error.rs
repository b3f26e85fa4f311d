//! Errors raised while resolving, validating and expanding job inputs
//!
//! Every variant that concerns a parameter carries the parameter name. Permission errors carry
//! the literal value the user submitted and never the resolved server path.

use std::fmt;
use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum JobInputError {
    /// Malformed declarative metadata (numValues, range, groupInfo) in a module manifest
    #[error("Error parsing {attribute}={spec} for {param}: {reason}")]
    Parse {
        param: String,
        attribute: &'static str,
        spec: String,
        reason: String,
    },

    #[error("Invalid configuration for {param}: {message}")]
    InvalidConfig { param: String, message: String },

    #[error("{kind} for {param}, num={actual}{bound}")]
    Cardinality {
        param: String,
        kind: CardinalityKind,
        actual: usize,
        bound: String,
    },

    #[error("Value for {param} is out of the expected range, value={value}, {bound}")]
    Range {
        param: String,
        value: String,
        bound: String,
    },

    /// `detail` is either empty or starts with a separator, e.g. " (not a directory)"
    #[error("Error initializing input value for {param}: {value}{detail}")]
    Resolution {
        param: String,
        value: String,
        detail: String,
    },

    #[error("For the input parameter, {param}, you are not permitted to access: {value}")]
    PermissionDenied { param: String, value: String },

    #[error("No matching input files for batch parameter {param} in directory {directory}")]
    EmptyBatch { param: String, directory: String },

    #[error("External service not available for {param}: {url}")]
    ExternalServiceUnavailable { param: String, url: String },

    #[error("Storage error for {param}, {target}: {source}")]
    Storage {
        param: String,
        target: String,
        #[source]
        source: io::Error,
    },

    #[error("Batch parameters do not pair up: {message}")]
    BatchMismatch { message: String },

    #[error("No matching parameter, '{param}', for module {lsid}")]
    UnknownParameter { param: String, lsid: String },

    #[error("Module not found: {lsid}")]
    UnknownModule { lsid: String },

    #[error("Invalid job request: {0}")]
    InvalidRequest(String),

    #[error("Error dispatching job: {0}")]
    Dispatch(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardinalityKind {
    MissingRequired,
    NotEnough,
    TooMany,
    Groups,
}

impl fmt::Display for CardinalityKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CardinalityKind::MissingRequired => write!(f, "Missing required parameter"),
            CardinalityKind::NotEnough => write!(f, "Not enough values"),
            CardinalityKind::TooMany => write!(f, "Too many values"),
            CardinalityKind::Groups => write!(f, "Wrong number of groups"),
        }
    }
}

impl JobInputError {
    /// Name of the parameter the error was raised for, if any
    pub fn param(&self) -> Option<&str> {
        match self {
            JobInputError::Parse { param, .. }
            | JobInputError::InvalidConfig { param, .. }
            | JobInputError::Cardinality { param, .. }
            | JobInputError::Range { param, .. }
            | JobInputError::Resolution { param, .. }
            | JobInputError::PermissionDenied { param, .. }
            | JobInputError::EmptyBatch { param, .. }
            | JobInputError::ExternalServiceUnavailable { param, .. }
            | JobInputError::Storage { param, .. }
            | JobInputError::UnknownParameter { param, .. } => Some(param),
            _ => None,
        }
    }

    pub(crate) fn resolution(param: &str, value: &str, detail: Option<&str>) -> Self {
        JobInputError::Resolution {
            param: param.to_string(),
            value: value.to_string(),
            detail: detail.map(|d| format!(" ({d})")).unwrap_or_default(),
        }
    }

    pub(crate) fn storage(param: &str, target: impl fmt::Display, source: io::Error) -> Self {
        JobInputError::Storage {
            param: param.to_string(),
            target: target.to_string(),
            source,
        }
    }
}

/// All parameter errors collected for one job, reported together
#[derive(Debug, Error)]
pub struct SubmissionErrors(pub Vec<JobInputError>);

impl fmt::Display for SubmissionErrors {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let messages: Vec<String> = self.0.iter().map(|e| e.to_string()).collect();
        write!(f, "{}", messages.join("; "))
    }
}

impl From<JobInputError> for SubmissionErrors {
    fn from(err: JobInputError) -> Self {
        SubmissionErrors(vec![err])
    }
}

pub type Result<T> = std::result::Result<T, JobInputError>;
