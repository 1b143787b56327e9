// Request shape checks and lenient normalization
//
// Everything here runs before the rate limiter or the queue are touched.

use super::{AdmissionError, AdmissionLimits};
use crate::domain::{normalize_difficulty, HashAlgorithm, JobId};
use serde_json::{Map, Value};

pub const INVALID_JSON: &str = "Invalid JSON body";
pub const SEEDS_NOT_STRINGS: &str = "Seeds must be a list of strings.";
pub const IDS_NOT_STRINGS: &str = "Request ids must be a list of strings.";

/// A normalized submission batch
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitBatch {
    pub seeds: Vec<String>,
    pub difficulty: u32,
    pub algorithm: HashAlgorithm,
    pub callback_url: Option<String>,
}

/// Decode a raw request body. An empty body is an empty object.
pub fn parse_body(body: &[u8], limits: &AdmissionLimits) -> Result<Value, AdmissionError> {
    if body.len() > limits.max_body_bytes {
        return Err(AdmissionError::Validation(format!(
            "Request body exceeds {} bytes.",
            limits.max_body_bytes
        )));
    }
    if body.is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_slice(body).map_err(|_| AdmissionError::Validation(INVALID_JSON.to_string()))
}

/// Missing, null and empty values behave like "not provided"
fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

fn as_object(payload: &Value) -> Result<&Map<String, Value>, AdmissionError> {
    payload
        .as_object()
        .ok_or_else(|| AdmissionError::Validation("Request body must be a JSON object.".to_string()))
}

fn string_list(value: Option<&Value>, message: &str) -> Result<Vec<String>, AdmissionError> {
    let value = match value {
        Some(v) if !is_falsy(v) => v,
        _ => return Ok(Vec::new()),
    };
    let items = value
        .as_array()
        .ok_or_else(|| AdmissionError::Validation(message.to_string()))?;
    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_string)
                .ok_or_else(|| AdmissionError::Validation(message.to_string()))
        })
        .collect()
}

fn validate_callback_url(value: Option<&Value>, limits: &AdmissionLimits) -> Result<Option<String>, AdmissionError> {
    let url = match value {
        Some(v) if !is_falsy(v) => v
            .as_str()
            .ok_or_else(|| AdmissionError::Validation("callbackUrl must be a string.".to_string()))?,
        _ => return Ok(None),
    };

    if url.len() > limits.max_callback_url_len {
        return Err(AdmissionError::Validation(format!(
            "callbackUrl exceeds maximum length of {} characters.",
            limits.max_callback_url_len
        )));
    }

    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or_else(|| {
            AdmissionError::Validation("callbackUrl must be an http or https URL.".to_string())
        })?;
    let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if host.is_empty() || host.chars().any(char::is_whitespace) {
        return Err(AdmissionError::Validation(
            "callbackUrl must include a valid host.".to_string(),
        ));
    }

    Ok(Some(url.to_string()))
}

/// Validate and normalize a sync or async submission.
///
/// `difficulty` and `algorithm` are normalized leniently; a difficulty that
/// normalizes above the limit is rejected.
pub fn parse_submit(
    payload: &Value,
    limits: &AdmissionLimits,
    accept_callback: bool,
) -> Result<SubmitBatch, AdmissionError> {
    let body = as_object(payload)?;

    let seeds = string_list(body.get("seeds"), SEEDS_NOT_STRINGS)?;
    if seeds.len() > limits.max_seeds {
        return Err(AdmissionError::Validation(format!(
            "Too many seeds: at most {} per request.",
            limits.max_seeds
        )));
    }
    if let Some(seed) = seeds
        .iter()
        .find(|s| s.chars().count() > limits.max_seed_len)
    {
        return Err(AdmissionError::Validation(format!(
            "Seed of {} characters exceeds maximum length of {}.",
            seed.chars().count(),
            limits.max_seed_len
        )));
    }

    let difficulty = normalize_difficulty(body.get("difficulty"));
    if difficulty > u64::from(limits.max_difficulty) {
        return Err(AdmissionError::Validation(format!(
            "Difficulty must be at most {}.",
            limits.max_difficulty
        )));
    }

    let callback_url = if accept_callback {
        validate_callback_url(body.get("callbackUrl"), limits)?
    } else {
        None
    };

    Ok(SubmitBatch {
        seeds,
        // bounded by max_difficulty above
        difficulty: difficulty as u32,
        algorithm: HashAlgorithm::normalize(body.get("algorithm")),
        callback_url,
    })
}

/// Validate a status lookup batch
pub fn parse_status(payload: &Value, limits: &AdmissionLimits) -> Result<Vec<JobId>, AdmissionError> {
    let body = as_object(payload)?;
    let ids = string_list(body.get("requestIds"), IDS_NOT_STRINGS)?;
    if ids.len() > limits.max_status_ids {
        return Err(AdmissionError::Validation(format!(
            "Too many request ids: at most {} per request.",
            limits.max_status_ids
        )));
    }
    Ok(ids)
}

/// Constant-time string equality for shared-secret checks
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
