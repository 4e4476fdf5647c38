use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use crate::catalog::Credential;
use crate::config::types::{ExpiryFormat, ResponseConfig};
use crate::error::IssuerError;
use crate::store::Token;

/// Parse an issuer response body into a token owned by `credential`
pub fn parse_token(
    body: &str,
    response: &ResponseConfig,
    credential: &Credential,
    now: DateTime<Utc>,
) -> Result<Token, IssuerError> {
    let json: Value = serde_json::from_str(body)
        .map_err(|e| IssuerError::Parse(format!("body is not JSON: {}", e)))?;

    let session_id = extract_string(&json, &response.session_id)?;
    let value = extract_string(&json, &response.value)?;
    let expiry = extract_expiry(&json, &response.expiry, response.expiry_format, now)?;

    Ok(Token {
        session_id,
        app_id: credential.service.app_id().to_owned(),
        owner_id: credential.id.to_owned(),
        value,
        expiry,
    })
}

fn lookup<'a>(json: &'a Value, pointer: &str) -> Result<&'a Value, IssuerError> {
    json.pointer(pointer)
        .filter(|v| !v.is_null())
        .ok_or_else(|| IssuerError::Parse(format!("field '{}' is missing", pointer)))
}

fn extract_string(json: &Value, pointer: &str) -> Result<String, IssuerError> {
    match lookup(json, pointer)? {
        Value::String(s) if !s.is_empty() => Ok(s.to_owned()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(IssuerError::Parse(format!(
            "field '{}' is not a non-empty string: {}",
            pointer, other
        ))),
    }
}

fn extract_i64(json: &Value, pointer: &str) -> Result<i64, IssuerError> {
    let value = lookup(json, pointer)?;
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse::<i64>().ok()))
        .ok_or_else(|| IssuerError::Parse(format!("field '{}' is not an integer: {}", pointer, value)))
}

fn extract_expiry(
    json: &Value,
    pointer: &str,
    format: ExpiryFormat,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, IssuerError> {
    match format {
        ExpiryFormat::Rfc3339 => {
            let raw = extract_string(json, pointer)?;
            DateTime::parse_from_rfc3339(&raw)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| IssuerError::Parse(format!("field '{}' is not RFC 3339: {}", pointer, e)))
        }
        ExpiryFormat::Unix => {
            let secs = extract_i64(json, pointer)?;
            DateTime::from_timestamp(secs, 0)
                .ok_or_else(|| IssuerError::Parse(format!("field '{}' is out of range: {}", pointer, secs)))
        }
        ExpiryFormat::Seconds => {
            let secs = extract_i64(json, pointer)?;
            Duration::try_seconds(secs)
                .and_then(|lifetime| now.checked_add_signed(lifetime))
                .ok_or_else(|| IssuerError::Parse(format!("field '{}' is out of range: {}", pointer, secs)))
        }
    }
}
