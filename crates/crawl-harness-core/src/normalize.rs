//! Field Normalizer for legacy list-valued columns.
//!
//! Older crawler versions wrote list fields as Python-style literals
//! (`['a', 'b']`), comma-joined strings, bare URLs, or quoted variants of
//! those. A [`ListDecoder`] turns any of them back into a sequence.
//!
//! Image lists and tag lists have historically been decoded by different
//! rules. Both rule sets are kept as named presets:
//!
//! | step | [`ListDecoder::IMAGE_LIST`] | [`ListDecoder::TAG_LIST`] |
//! |---|---|---|
//! | already a sequence | unchanged | unchanged |
//! | `[`-prefixed text | text elements, trimmed | every element |
//! | contains `,` | split, trimmed, empties dropped | split verbatim |
//! | URL prefix | one-element sequence | n/a |
//! | anything else | empty | original value kept |
//!
//! Decoding never fails a record: errors are logged and the field degrades
//! to an empty sequence.

use serde_json::{Map, Value};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed array literal {raw:?}: {reason}")]
    MalformedArray { raw: String, reason: String },
}

/// A configurable list-field decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListDecoder {
    pub name: &'static str,
    pub separator: char,
    /// Keep only text elements of a parsed array, trimmed.
    pub text_elements_only: bool,
    /// Trim split pieces and drop empty ones.
    pub clean_pieces: bool,
    /// Prefixes that mark a lone value as a single-element list.
    pub url_prefixes: &'static [&'static str],
    /// Return unmatched values as they were instead of an empty list.
    pub keep_unmatched: bool,
}

impl ListDecoder {
    pub const IMAGE_LIST: ListDecoder = ListDecoder {
        name: "image_list",
        separator: ',',
        text_elements_only: true,
        clean_pieces: true,
        url_prefixes: &["http"],
        keep_unmatched: false,
    };

    pub const TAG_LIST: ListDecoder = ListDecoder {
        name: "tag_list",
        separator: ',',
        text_elements_only: false,
        clean_pieces: false,
        url_prefixes: &[],
        keep_unmatched: true,
    };

    /// Decode a raw value. The result is an array, or the original value
    /// when the preset keeps unmatched input.
    pub fn decode(&self, raw: &Value) -> Result<Value, DecodeError> {
        let text = match raw {
            Value::Array(_) => return Ok(raw.clone()),
            Value::String(s) => s.as_str(),
            _ => return Ok(self.unmatched(raw)),
        };

        let clean = strip_quotes(text);

        if clean.starts_with('[') {
            let items = parse_array(clean)?;
            let items = if self.text_elements_only {
                items
                    .into_iter()
                    .filter_map(|v| match v {
                        Value::String(s) => Some(Value::String(s.trim().to_string())),
                        _ => None,
                    })
                    .collect()
            } else {
                items
            };
            return Ok(Value::Array(items));
        }

        if clean.contains(self.separator) {
            let pieces = clean.split(self.separator);
            let items: Vec<Value> = if self.clean_pieces {
                pieces
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(|p| Value::String(p.to_string()))
                    .collect()
            } else {
                pieces.map(|p| Value::String(p.to_string())).collect()
            };
            return Ok(Value::Array(items));
        }

        if self.url_prefixes.iter().any(|p| clean.starts_with(p)) {
            return Ok(Value::Array(vec![Value::String(clean.to_string())]));
        }

        Ok(self.unmatched(raw))
    }

    /// Decode into a list of strings, degrading to empty on any failure.
    pub fn decode_or_empty(&self, raw: &Value) -> Vec<String> {
        match self.decode(raw) {
            Ok(Value::Array(items)) => items
                .into_iter()
                .map(|v| match v {
                    Value::String(s) => s,
                    other => other.to_string(),
                })
                .collect(),
            Ok(_) => Vec::new(),
            Err(e) => {
                warn!(field = self.name, raw = %raw, error = %e, "list decode failed");
                Vec::new()
            }
        }
    }

    fn unmatched(&self, raw: &Value) -> Value {
        if self.keep_unmatched {
            raw.clone()
        } else {
            Value::Array(Vec::new())
        }
    }
}

pub fn decode_image_list(raw: &Value) -> Vec<String> {
    ListDecoder::IMAGE_LIST.decode_or_empty(raw)
}

/// Tag lists may legitimately stay scalar; only a decode failure empties them.
pub fn decode_tag_list(raw: &Value) -> Value {
    ListDecoder::TAG_LIST.decode(raw).unwrap_or_else(|e| {
        warn!(field = "tag_list", raw = %raw, error = %e, "list decode failed");
        Value::Array(Vec::new())
    })
}

/// Normalize the list fields of a raw row in place.
pub fn normalize_row(row: &mut Map<String, Value>) {
    if let Some(v) = row.get_mut("image_list") {
        let decoded = decode_image_list(v);
        *v = Value::Array(decoded.into_iter().map(Value::String).collect());
    }
    if let Some(v) = row.get_mut("tag_list") {
        if v.is_string() {
            *v = decode_tag_list(v);
        }
    }
}

fn strip_quotes(s: &str) -> &str {
    s.trim().trim_matches('"').trim_matches('\'')
}

/// Parse a JSON array, falling back to a single-quoted literal like `['a', "b"]`.
fn parse_array(text: &str) -> Result<Vec<Value>, DecodeError> {
    if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(text) {
        return Ok(items);
    }
    parse_quoted_literal(text).map_err(|reason| DecodeError::MalformedArray {
        raw: text.to_string(),
        reason,
    })
}

fn parse_quoted_literal(text: &str) -> Result<Vec<Value>, String> {
    let inner = text
        .trim()
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .ok_or_else(|| "unterminated array".to_string())?;

    let mut items = Vec::new();
    let mut chars = inner.chars().peekable();
    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        let quote = match chars.next() {
            None if items.is_empty() => return Ok(items),
            None => return Err("trailing separator".to_string()),
            Some(q @ ('\'' | '"')) => q,
            Some(c) => return Err(format!("unexpected character '{}'", c)),
        };
        let mut item = String::new();
        loop {
            match chars.next() {
                None => return Err("unterminated string".to_string()),
                Some('\\') => match chars.next() {
                    Some(c) => item.push(c),
                    None => return Err("dangling escape".to_string()),
                },
                Some(c) if c == quote => break,
                Some(c) => item.push(c),
            }
        }
        items.push(Value::String(item));
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        match chars.next() {
            None => return Ok(items),
            Some(',') => continue,
            Some(c) => return Err(format!("expected ',' but found '{}'", c)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_image_list_single_quoted_literal() {
        assert_eq!(decode_image_list(&json!("['a', 'b']")), vec!["a", "b"]);
    }

    #[test]
    fn test_image_list_json_array_text() {
        assert_eq!(
            decode_image_list(&json!(r#"[" x.jpg ", 3, "y.jpg"]"#)),
            vec!["x.jpg", "y.jpg"]
        );
    }

    #[test]
    fn test_image_list_comma_separated() {
        assert_eq!(decode_image_list(&json!("a,b,c")), vec!["a", "b", "c"]);
        assert_eq!(decode_image_list(&json!(" a , ,b,")), vec!["a", "b"]);
    }

    #[test]
    fn test_image_list_quoted_comma_string() {
        assert_eq!(
            decode_image_list(&json!("\"http://a.com,http://b.com\"")),
            vec!["http://a.com", "http://b.com"]
        );
    }

    #[test]
    fn test_image_list_single_url() {
        assert_eq!(
            decode_image_list(&json!("http://x.com")),
            vec!["http://x.com"]
        );
    }

    #[test]
    fn test_image_list_empty_and_junk() {
        assert!(decode_image_list(&json!("")).is_empty());
        assert!(decode_image_list(&json!("not a url")).is_empty());
        assert!(decode_image_list(&Value::Null).is_empty());
        assert!(decode_image_list(&json!(42)).is_empty());
    }

    #[test]
    fn test_image_list_malformed_array_degrades() {
        assert!(decode_image_list(&json!("['a', 'b'")).is_empty());
        assert!(decode_image_list(&json!("[a, b]")).is_empty());
    }

    #[test]
    fn test_sequence_passes_through() {
        let raw = json!(["u1", "u2"]);
        assert_eq!(ListDecoder::IMAGE_LIST.decode(&raw).unwrap(), raw);
        assert_eq!(decode_image_list(&raw), vec!["u1", "u2"]);
        assert_eq!(decode_tag_list(&raw), raw);
    }

    #[test]
    fn test_tag_list_diverges_from_image_list() {
        // Split pieces are kept verbatim.
        assert_eq!(decode_tag_list(&json!("a, b,")), json!(["a", " b", ""]));
        // No URL branch; unmatched scalars stay as they were.
        assert_eq!(decode_tag_list(&json!("http://x.com")), json!("http://x.com"));
        assert_eq!(decode_tag_list(&json!("solo")), json!("solo"));
        // Parsed arrays keep non-text elements.
        assert_eq!(decode_tag_list(&json!("[1, \"x\"]")), json!([1, "x"]));
        assert_eq!(decode_tag_list(&json!("[broken")), json!([]));
    }

    #[test]
    fn test_normalize_row_is_field_local() {
        let mut row = json!({
            "note_id": "n1",
            "image_list": "['a'",
            "tag_list": "x,y",
            "title": "kept"
        })
        .as_object()
        .unwrap()
        .clone();
        normalize_row(&mut row);
        assert_eq!(row["image_list"], json!([]));
        assert_eq!(row["tag_list"], json!(["x", "y"]));
        assert_eq!(row["title"], json!("kept"));
    }
}
