//! JSON decoder.
//!
//! Flattens a JSON document into `key: value` lines in document order
//! (object keys keep their source order). Nested containers emit a `key:`
//! header line and indent their children by two spaces per level. Every line
//! maps back to the RFC 6901 pointer of the value it came from.

use super::encoding::decode_text;
use super::{DecodeLimits, DecodeResult, Decoder};
use crate::error::DecodeError;
use crate::format::Format;
use crate::offset::{NormalizedText, Origin, TextBuilder};
use serde_json::Value;

/// JSON decoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDecoder;

/// Nesting depth past which values are skipped (with a warning).
const MAX_DEPTH: usize = 64;

impl Decoder for JsonDecoder {
    fn format(&self) -> Format {
        Format::Json
    }

    fn decode(&self, bytes: &[u8], _limits: &DecodeLimits) -> DecodeResult<NormalizedText> {
        let (text, warning) = decode_text(bytes);
        let value: Value = serde_json::from_str(&text)
            .map_err(|e| DecodeError::corrupt(Format::Json, e.to_string()))?;

        let mut builder = TextBuilder::new(Format::Json);
        if let Some(warning) = warning {
            builder.warn(warning);
        }
        let mut truncated = false;
        match &value {
            Value::Object(_) | Value::Array(_) => {
                walk_children(&value, "", 0, &mut builder, &mut truncated)
            },
            scalar => builder.push_line(
                &scalar_to_string(scalar),
                Origin::JsonPath {
                    pointer: String::new(),
                },
            ),
        }
        if truncated {
            builder.warn(format!("values nested deeper than {} levels were skipped", MAX_DEPTH));
        }
        builder.trim_trailing_blank_lines();
        Ok(builder.finish())
    }
}

fn walk_children(
    value: &Value,
    pointer: &str,
    depth: usize,
    builder: &mut TextBuilder,
    truncated: &mut bool,
) {
    if depth >= MAX_DEPTH {
        *truncated = true;
        return;
    }
    let indent = "  ".repeat(depth);
    let entries: Vec<(String, &Value)> = match value {
        Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v)).collect(),
        Value::Array(items) => items.iter().enumerate().map(|(i, v)| (i.to_string(), v)).collect(),
        _ => return,
    };
    let is_array = value.is_array();

    for (key, child) in entries {
        let child_pointer = format!("{}/{}", pointer, escape_pointer(&key));
        let origin = Origin::JsonPath {
            pointer: child_pointer.clone(),
        };
        let label = if is_array { "-".to_string() } else { format!("{}:", key) };
        match child {
            Value::Object(_) | Value::Array(_) => {
                builder.push_line(&format!("{}{}", indent, label), origin);
                walk_children(child, &child_pointer, depth + 1, builder, truncated);
            },
            scalar => {
                let rendered = scalar_to_string(scalar).replace('\n', " ");
                builder.push_line(&format!("{}{} {}", indent, label, rendered), origin);
            },
        }
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn escape_pointer(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(input: &str) -> NormalizedText {
        JsonDecoder
            .decode(input.as_bytes(), &DecodeLimits::default())
            .unwrap()
    }

    #[test]
    fn test_flat_object_keeps_order() {
        let t = decode(r#"{"name": "Taro Yamada", "age": 31, "email": "t@example.com"}"#);
        assert_eq!(t.text, "name: Taro Yamada\nage: 31\nemail: t@example.com");
    }

    #[test]
    fn test_nested_pointer_origins() {
        let t = decode(r#"{"profile": {"address": "Tokyo"}, "skills": ["rust", "go"]}"#);
        assert_eq!(t.text, "profile:\n  address: Tokyo\nskills:\n  - rust\n  - go");
        let idx = t.text.find("Tokyo").unwrap();
        assert_eq!(
            t.origin_of(idx),
            Some(&Origin::JsonPath {
                pointer: "/profile/address".to_string()
            })
        );
        let idx = t.text.find("go").unwrap();
        assert_eq!(
            t.origin_of(idx),
            Some(&Origin::JsonPath {
                pointer: "/skills/1".to_string()
            })
        );
    }

    #[test]
    fn test_invalid_json_is_corrupt() {
        let err = JsonDecoder
            .decode(b"{\"a\": ", &DecodeLimits::default())
            .unwrap_err();
        assert_eq!(err.kind, crate::error::DecodeErrorKind::Corrupt);
    }

    #[test]
    fn test_pointer_escaping() {
        assert_eq!(escape_pointer("a/b~c"), "a~1b~0c");
    }
}
