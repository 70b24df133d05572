//! Record schema codec
//!
//! Parses the backing file's bytes into validated records and serializes
//! them back to formatted JSON. Malformed JSON is a [`LibraryError::Parse`];
//! a well-formed document with the wrong shape is a
//! [`LibraryError::Validation`] carrying the offending field path. The
//! schema is open: unknown fields are passed through, never stripped.

use serde_json::{Map, Value};

use crate::error::LibraryError;
use crate::identity::normalize_custom;
use crate::record::Record;

/// Parse a byte buffer into records.
///
/// An empty or whitespace-only buffer is the empty record set, so a
/// freshly `touch`ed file is usable. Every returned record has been run
/// through identity normalization and is guaranteed a valid UUID and
/// timestamp pair.
pub fn parse(bytes: &[u8]) -> Result<Vec<Record>, LibraryError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| LibraryError::Parse(format!("not valid UTF-8: {e}")))?;
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let value: Value =
        serde_json::from_str(text).map_err(|e| LibraryError::Parse(e.to_string()))?;
    let items = match value {
        Value::Array(items) => items,
        _ => {
            return Err(LibraryError::validation(
                "$",
                "expected a top-level array of records",
            ))
        }
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| parse_record(item, index))
        .collect()
}

/// Serialize records as human-diffable JSON: 2-space indentation, object
/// keys in the order they were parsed, trailing newline.
pub fn serialize(records: &[&Record]) -> Result<String, LibraryError> {
    let mut text = serde_json::to_string_pretty(&records)
        .map_err(|e| LibraryError::Serialize(e.to_string()))?;
    text.push('\n');
    Ok(text)
}

fn parse_record(value: Value, index: usize) -> Result<Record, LibraryError> {
    let mut obj = match value {
        Value::Object(obj) => obj,
        _ => return Err(LibraryError::validation(format!("[{index}]"), "expected an object")),
    };

    validate_shape(&obj, index)?;
    convert_legacy_keyword(&mut obj);

    let mut record: Record = serde_json::from_value(Value::Object(obj))
        .map_err(|e| LibraryError::validation(format!("[{index}]"), e.to_string()))?;

    normalize_custom(&mut record.custom);
    Ok(record)
}

/// Structural checks that produce field-level diagnostics before serde
/// gets a chance to report something vaguer.
fn validate_shape(obj: &Map<String, Value>, index: usize) -> Result<(), LibraryError> {
    require_string(obj, "id", index)?;
    require_string(obj, "type", index)?;

    if let Some(author) = obj.get("author") {
        let entries = author.as_array().ok_or_else(|| {
            LibraryError::validation(format!("[{index}].author"), "expected an array of names")
        })?;
        for (i, entry) in entries.iter().enumerate() {
            if !entry.is_object() {
                return Err(LibraryError::validation(
                    format!("[{index}].author[{i}]"),
                    "expected a name object",
                ));
            }
        }
    }

    if let Some(issued) = obj.get("issued") {
        let issued_obj = issued.as_object().ok_or_else(|| {
            LibraryError::validation(format!("[{index}].issued"), "expected a date object")
        })?;
        if let Some(parts) = issued_obj.get("date-parts") {
            let outer = parts.as_array().ok_or_else(|| {
                LibraryError::validation(
                    format!("[{index}].issued.date-parts"),
                    "expected an array of date parts",
                )
            })?;
            for (i, part) in outer.iter().enumerate() {
                if !part.is_array() {
                    return Err(LibraryError::validation(
                        format!("[{index}].issued.date-parts[{i}]"),
                        "expected an array",
                    ));
                }
            }
        }
    }

    if let Some(keyword) = obj.get("keyword") {
        let ok = match keyword {
            Value::String(_) => true,
            Value::Array(items) => items.iter().all(Value::is_string),
            _ => false,
        };
        if !ok {
            return Err(LibraryError::validation(
                format!("[{index}].keyword"),
                "expected a string or an array of strings",
            ));
        }
    }

    if let Some(custom) = obj.get("custom") {
        if !custom.is_object() {
            return Err(LibraryError::validation(
                format!("[{index}].custom"),
                "expected an object",
            ));
        }
    }

    Ok(())
}

fn require_string(obj: &Map<String, Value>, field: &str, index: usize) -> Result<(), LibraryError> {
    match obj.get(field) {
        None => Err(LibraryError::validation(
            format!("[{index}].{field}"),
            "missing required field",
        )),
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(()),
        Some(Value::String(_)) => Err(LibraryError::validation(
            format!("[{index}].{field}"),
            "must be a non-empty string",
        )),
        Some(_) => Err(LibraryError::validation(
            format!("[{index}].{field}"),
            "expected a string",
        )),
    }
}

/// Legacy convenience: a semicolon-separated `keyword` string becomes an
/// array of trimmed substrings. A blank string means "absent".
fn convert_legacy_keyword(obj: &mut Map<String, Value>) {
    let Some(Value::String(raw)) = obj.get("keyword") else {
        return;
    };
    let keywords: Vec<Value> = raw
        .split(';')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(Value::from)
        .collect();
    if keywords.is_empty() {
        obj.remove("keyword");
    } else {
        obj.insert("keyword".to_string(), Value::Array(keywords));
    }
}
