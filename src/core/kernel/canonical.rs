use crate::core::errors::PelagosError;
use serde::Serialize;
use serde_json::Value;

/// Render a value as canonical JSON: object keys in ascending lexicographic
/// order at every nesting level, array order preserved, scalars in their
/// minimal form, zero embedded whitespace.
///
/// This is the exact byte sequence that gets signed, so the output must be
/// identical across platforms and insertion orders.
pub fn canonicalize(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(&mut out, value);
    out
}

/// Canonicalize any serializable payload.
///
/// Fails with [`PelagosError::Encoding`] when the value has no JSON
/// rendering (e.g. a map whose keys are not strings).
pub fn canonical_json<T: Serialize>(payload: &T) -> Result<String, PelagosError> {
    let value = serde_json::to_value(payload)
        .map_err(|e| PelagosError::Encoding(format!("value has no canonical form: {}", e)))?;
    Ok(canonicalize(&value))
}

fn write_canonical(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        // serde_json renders numbers in their shortest round-trippable form
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => write_escaped(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable();

            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_escaped(out, key);
                out.push(':');
                write_canonical(out, &map[key.as_str()]);
            }
            out.push('}');
        }
    }
}

fn write_escaped(out: &mut String, s: &str) {
    // serialize through serde_json for standards-conformant escaping;
    // serializing a bare string cannot fail
    out.push_str(&serde_json::to_string(s).unwrap_or_default());
}
