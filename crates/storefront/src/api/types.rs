//! Response envelope handling.
//!
//! The backend is inconsistent about wrapping: the same resource may arrive
//! bare, as `{cart: ...}`, or as a list inside `{orders: [...]}` or
//! `{data: [...]}`. These helpers accept every shape.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{NetworkError, Result};

/// Decode `value[key]` if the key is present, else the whole value.
///
/// `null` (either the whole body or the keyed field) decodes to `None`.
pub(crate) fn extract_enveloped<T: DeserializeOwned>(value: Value, key: &str) -> Result<Option<T>> {
    let inner = match value {
        Value::Object(mut map) if map.contains_key(key) => map.remove(key).unwrap_or(Value::Null),
        other => other,
    };
    if inner.is_null() {
        return Ok(None);
    }
    decode(inner).map(Some)
}

/// Like [`extract_enveloped`], but absence is a malformed response.
pub(crate) fn extract_required<T: DeserializeOwned>(value: Value, key: &str) -> Result<T> {
    extract_enveloped(value, key)?
        .ok_or_else(|| NetworkError::Malformed(format!("response has no {key}")).into())
}

/// Decode a list that may be bare or wrapped under one of `keys`.
pub(crate) fn extract_list<T: DeserializeOwned>(value: Value, keys: &[&str]) -> Result<Vec<T>> {
    let list = match value {
        Value::Array(_) => value,
        Value::Null => return Ok(Vec::new()),
        Value::Object(mut map) => keys
            .iter()
            .find_map(|key| map.remove(*key).filter(Value::is_array))
            .ok_or_else(|| {
                NetworkError::Malformed(format!("expected a list under one of {keys:?}"))
            })?,
        other => {
            return Err(NetworkError::Malformed(format!("expected a list, got {other}")).into());
        }
    };
    decode(list)
}

pub(crate) fn decode<T: DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| NetworkError::Malformed(e.to_string()).into())
}
