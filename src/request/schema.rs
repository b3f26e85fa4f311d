use anyhow::{anyhow, Context, Result};
use jsonschema::JSONSchema;
use serde_json::Value;

/// included request schema
static JOB_REQUEST_SCHEMA: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/schema/job_request.json"));

pub fn load_schema() -> Result<JSONSchema> {
    let schema: Value = serde_json::from_str(JOB_REQUEST_SCHEMA).context("Job request schema is not valid JSON")?;
    compile_schema(&schema)
}

fn compile_schema(schema: &Value) -> Result<JSONSchema> {
    JSONSchema::options()
        .compile(schema)
        .map_err(|err| anyhow!("Can't compile job request schema: {err}"))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn schema_accepts_plain_and_grouped_values() {
        let schema = load_schema().unwrap();
        let request = json!({
            "lsid": "urn:lsid:example.org:module:00001:1",
            "params": [
                {"name": "input.file", "values": ["a.gct", {"value": "b.gct", "groupId": "tumor"}]},
                {"name": "dir", "values": ["/data/batch"], "batchParam": true}
            ]
        });
        assert!(schema.is_valid(&request));
    }

    #[test]
    fn schema_rejects_malformed_requests() {
        let schema = load_schema().unwrap();
        assert!(!schema.is_valid(&json!({"params": []})));
        assert!(!schema.is_valid(&json!({"lsid": "not an lsid", "params": []})));
        assert!(!schema.is_valid(&json!({
            "lsid": "urn:lsid:example.org:module:00001",
            "params": [{"name": "x", "values": [1]}]
        })));
    }
}
