//! Canonical JSON serialization of the signed payload.
//!
//! Signer and verifier must hash exactly the same bytes, so the payload is
//! reduced to the canonical form of RFC 8785 (JCS) before hashing and
//! signing: object keys sorted by UTF-16 code units, arrays in input order,
//! no whitespace, standard string escapes. All numbers in the manifest
//! schema are small non-negative integers, which serialize identically
//! across implementations.

use serde_json::Value;

use crate::error::{Result, UpdaterError};

/// Parse `data` as JSON and return its canonical byte representation.
pub fn transform(data: &[u8]) -> Result<Vec<u8>> {
    let value: Value = serde_json::from_slice(data)?;
    canonicalize(&value)
}

/// Canonicalize an already-parsed JSON tree.
pub fn canonicalize(value: &Value) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    emit(value, &mut out)?;
    Ok(out)
}

fn emit(value: &Value, out: &mut Vec<u8>) -> Result<()> {
    match value {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(true) => out.extend_from_slice(b"true"),
        Value::Bool(false) => out.extend_from_slice(b"false"),
        Value::Number(n) => {
            if let Some(f) = n.as_f64() {
                if !f.is_finite() {
                    return Err(UpdaterError::Canonicalization(format!(
                        "non-finite number: {n}"
                    )));
                }
            }
            // serde_json prints integers without a fractional part.
            out.extend_from_slice(n.to_string().as_bytes());
        }
        Value::String(s) => emit_string(s, out)?,
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                emit(item, out)?;
            }
            out.push(b']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_by(|a, b| utf16_units(a).cmp(&utf16_units(b)));
            out.push(b'{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                emit_string(key, out)?;
                out.push(b':');
                emit(&map[key.as_str()], out)?;
            }
            out.push(b'}');
        }
    }
    Ok(())
}

fn emit_string(s: &str, out: &mut Vec<u8>) -> Result<()> {
    let escaped = serde_json::to_string(s)
        .map_err(|err| UpdaterError::Canonicalization(err.to_string()))?;
    out.extend_from_slice(escaped.as_bytes());
    Ok(())
}

// RFC 8785 orders object keys by their UTF-16 code units, which differs from
// byte order for strings containing supplementary-plane characters.
fn utf16_units(s: &str) -> Vec<u16> {
    s.encode_utf16().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transform_str(input: &str) -> String {
        let out = transform(input.as_bytes()).expect("transform succeeds");
        String::from_utf8(out).expect("canonical output is UTF-8")
    }

    #[test]
    fn sorts_object_keys() {
        assert_eq!(transform_str(r#"{"b":"2","a":"1"}"#), r#"{"a":"1","b":"2"}"#);
    }

    #[test]
    fn sorts_nested_objects() {
        assert_eq!(
            transform_str(r#"{"z":null,"a":{"b":2,"a":1}}"#),
            r#"{"a":{"a":1,"b":2},"z":null}"#
        );
    }

    #[test]
    fn preserves_array_order() {
        assert_eq!(
            transform_str(r#"{"b":[3,2,1],"a":true}"#),
            r#"{"a":true,"b":[3,2,1]}"#
        );
    }

    #[test]
    fn integers_have_no_fraction() {
        assert_eq!(transform_str(r#"{"size":1024,"v":1}"#), r#"{"size":1024,"v":1}"#);
    }

    #[test]
    fn escapes_control_characters() {
        assert_eq!(transform_str("{\"a\":\"x\\ny\"}"), r#"{"a":"x\ny"}"#);
    }

    #[test]
    fn non_ascii_passes_through_as_utf8() {
        assert_eq!(transform_str(r#"{"name":"żółw"}"#), r#"{"name":"żółw"}"#);
    }

    #[test]
    fn roundtrip_is_stable() {
        let canonical = transform_str(r#"{"b":{"d":4,"c":[true,false,null]},"a":"x"}"#);
        assert_eq!(transform_str(&canonical), canonical);
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(transform(b"{not json").is_err());
    }
}
