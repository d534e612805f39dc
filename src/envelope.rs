//! Response envelope handling.
//!
//! Every response body is a JSON object with exactly one key, named after
//! the command (`listzonesresponse`, `queryasyncjobresultresponse`, ...).
//! The payload is whatever that single key holds.

use crate::error::{KcpsError, Result};
use serde_json::Value;

/// Extract the payload of a single-key envelope, whatever its key.
pub fn unwrap(envelope: Value) -> Result<Value> {
    match envelope {
        Value::Object(map) if map.len() == 1 => {
            // len() == 1, so there is exactly one value to take.
            Ok(map.into_iter().next().map(|(_, v)| v).unwrap_or(Value::Null))
        }
        Value::Object(map) => Err(KcpsError::Decode(format!(
            "expected a single-key response envelope, found {} keys",
            map.len()
        ))),
        other => Err(KcpsError::Decode(format!(
            "expected a JSON object envelope, found {}",
            kind(&other)
        ))),
    }
}

/// Parse raw bytes and unwrap the envelope.
pub fn unwrap_bytes(body: &[u8]) -> Result<Value> {
    let envelope: Value = serde_json::from_slice(body).map_err(|e| {
        KcpsError::Decode(format!(
            "unable to parse response envelope: {e}: {}",
            String::from_utf8_lossy(body)
        ))
    })?;
    unwrap(envelope)
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
