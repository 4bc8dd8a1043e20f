//! Canonical-JSON content hashing.
//!
//! Object keys are sorted recursively before hashing, so two values that differ only in key
//! insertion order produce the same digest.

use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};

const CONTENT_HASH_DOMAIN: &[u8] = b"weave/content_hash/v1";

/// Serialize `value` as compact JSON with recursively sorted object keys.
pub fn canonical_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let value = serde_json::to_value(value)?;
    let mut out = String::new();
    write_canonical(&value, &mut out);
    Ok(out)
}

/// Lower-hex blake3 digest of the canonical JSON encoding of `value`.
pub fn content_hash<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let canonical = canonical_json(value)?;
    let mut hasher = blake3::Hasher::new();
    hasher.update(CONTENT_HASH_DOMAIN);
    hasher.update(canonical.as_bytes());
    Ok(hasher.finalize().to_hex().to_string())
}

/// Hash an already-decoded JSON document. Absent or `null` input is an error.
pub fn hash_value(value: Option<&Value>) -> Result<String> {
    match value {
        None | Some(Value::Null) => Err(Error::InvalidInput("cannot hash a null value".into())),
        Some(value) => content_hash(value),
    }
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_order_does_not_change_digest() {
        let a: Value = serde_json::from_str(r#"{"a":1,"b":2}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"b":2,"a":1}"#).unwrap();
        assert_eq!(hash_value(Some(&a)).unwrap(), hash_value(Some(&b)).unwrap());
    }

    #[test]
    fn nested_objects_are_sorted() {
        let value = json!({"z": {"y": [1, {"b": true, "a": null}], "x": "s"}, "a": 0});
        assert_eq!(
            canonical_json(&value).unwrap(),
            r#"{"a":0,"z":{"x":"s","y":[1,{"a":null,"b":true}]}}"#
        );
    }

    #[test]
    fn different_content_differs() {
        let a = content_hash(&json!({"a": 1})).unwrap();
        let b = content_hash(&json!({"a": 2})).unwrap();
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn null_input_is_rejected() {
        assert!(matches!(hash_value(None), Err(Error::InvalidInput(_))));
        assert!(matches!(hash_value(Some(&Value::Null)), Err(Error::InvalidInput(_))));
    }
}
