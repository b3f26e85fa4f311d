use std::fs;
use std::path::{Path, PathBuf};

use jsonschema::JSONSchema;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::lsid::Lsid;
use crate::param::value::{JobInputSet, Param, ParamValue};

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("Job request fails validation: {0}")]
    JSONValidationError(String),
    #[error("Job request is not valid JSON: {0}")]
    JSONDecodeError(String),
    #[error("Can't deserialise job request: {0}")]
    DeserialisationError(String),
    #[error("Can't read job request {0}")]
    MessageReadError(String),
}

/// A job request message on disk
pub struct Message {
    pub path: PathBuf,
    pub compiled_schema: JSONSchema,
}

impl Message {
    pub fn read(&self) -> Result<JobRequest, MessageError> {
        let json_string = self.read_file()?;
        parse_request(&self.compiled_schema, &json_string)
    }

    fn read_file(&self) -> Result<String, MessageError> {
        let path: &Path = self.path.as_path();
        info!("Reading message at {}", path.display());
        fs::read_to_string(path).map_err(|err| {
            warn!("Can't read message job request at path {}: {}", path.display(), err);
            MessageError::MessageReadError(format!("{}: {err}", path.display()))
        })
    }
}

/// Validate a raw request against the schema, then deserialise it
pub fn parse_request(schema: &JSONSchema, json_string: &str) -> Result<JobRequest, MessageError> {
    let json = parse_untyped_json(json_string)?;
    match validate(schema, &json) {
        Ok(_) => {
            info!("Message is valid");
            parse_json(json)
        }
        Err(err) => {
            warn!("Message fails validation");
            Err(err)
        }
    }
}

fn validate(schema: &JSONSchema, json: &Value) -> Result<(), MessageError> {
    info!("Validating raw message against JSON schema");
    schema.validate(json).map_err(|errors| {
        let messages: Vec<String> = errors.map(|e| format!("{} at {}", e, e.instance_path)).collect();
        MessageError::JSONValidationError(messages.join("; "))
    })
}

fn parse_json(value: Value) -> Result<JobRequest, MessageError> {
    info!("Deserialising valid JSON into typed Rust object");
    // from_value is a generic function, so request JobRequest specifically
    serde_json::from_value::<JobRequest>(value).map_err(|err| MessageError::DeserialisationError(err.to_string()))
}

fn parse_untyped_json(json_string: &str) -> Result<Value, MessageError> {
    info!("Parsing JSON into untyped structure");
    serde_json::from_str::<Value>(json_string).map_err(|err| MessageError::JSONDecodeError(err.to_string()))
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    pub lsid: Lsid,
    pub base_href: Option<String>,
    pub params: Vec<RequestParam>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestParam {
    pub name: String,
    #[serde(default, alias = "isBatch")]
    pub batch_param: bool,
    pub values: Vec<RequestValue>,
}

/// Either a bare value or a value with its group
#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RequestValue {
    Plain(String),
    #[serde(rename_all = "camelCase")]
    Grouped { value: String, group_id: Option<String> },
}

impl JobRequest {
    /// Values of a repeated parameter name are appended in request order
    pub fn into_input_set(self) -> JobInputSet {
        let mut input = JobInputSet::new(self.lsid);
        input.base_href = self.base_href;
        for param in self.params {
            if param.values.is_empty() {
                let mut empty = Param::new(&param.name);
                empty.batch = param.batch_param;
                input.set_param(empty);
                continue;
            }
            for value in param.values {
                let value = match value {
                    RequestValue::Plain(value) => ParamValue::new(&value),
                    RequestValue::Grouped { value, group_id } => ParamValue::grouped(&value, group_id.as_deref().unwrap_or("")),
                };
                input.add_value(&param.name, value, param.batch_param);
            }
        }
        input
    }
}
