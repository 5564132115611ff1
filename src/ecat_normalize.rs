//
// ecat_normalize.rs
// Pet2Bids-rs
//
// Turns decoded ECAT header records into plain JSON-friendly mappings, decoding byte strings to text per field.
//
// Thales Matheus Mendonça Santos - November 2025

use serde::Serialize;
use serde_json::{Map, Number, Value};
use tracing::warn;

use crate::ecat::{EcatHeaderSource, RawField, RawValue};

/// Per-frame sub-header: field name → `{"value": ..., "dtype": ...}`.
pub type Subheader = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EcatHeaders {
    pub main_header: Map<String, Value>,
    pub subheaders: Vec<Subheader>,
}

fn is_padding(name: &str) -> bool {
    name.to_ascii_lowercase().contains("fill")
}

/// Decode header text strictly, falling back to dropping invalid byte sequences.
/// Trailing NUL padding is removed first.
pub fn decode_text(name: &str, bytes: &[u8]) -> String {
    let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    let bytes = &bytes[..end];
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(e) => {
            warn!(field = name, error = %e, "dropping invalid bytes from header text");
            bytes.utf8_chunks().map(|chunk| chunk.valid()).collect()
        }
    }
}

fn float_value(f: f64) -> Value {
    Number::from_f64(f).map_or_else(|| Value::String(f.to_string()), Value::Number)
}

fn normalize_value(field: &RawField) -> Value {
    match &field.value {
        RawValue::Bytes(bytes) => Value::String(decode_text(field.name, bytes)),
        RawValue::Int(i) => Value::from(*i),
        RawValue::Float(f) => float_value(*f),
        RawValue::IntList(items) => Value::from(items.clone()),
        RawValue::FloatList(items) => Value::Array(items.iter().copied().map(float_value).collect()),
    }
}

pub fn normalize_main_header(fields: &[RawField]) -> Map<String, Value> {
    fields
        .iter()
        .filter(|f| !is_padding(f.name))
        .map(|f| (f.name.to_string(), normalize_value(f)))
        .collect()
}

pub fn normalize_subheader(fields: &[RawField]) -> Subheader {
    fields
        .iter()
        .map(|f| {
            let mut typed = Map::new();
            typed.insert("value".into(), normalize_value(f));
            typed.insert("dtype".into(), Value::String(f.dtype.clone()));
            (f.name.to_string(), Value::Object(typed))
        })
        .collect()
}

pub fn normalize<S: EcatHeaderSource + ?Sized>(source: &S) -> EcatHeaders {
    EcatHeaders {
        main_header: normalize_main_header(source.main_header()),
        subheaders: source
            .subheaders()
            .iter()
            .map(|s| normalize_subheader(s))
            .collect(),
    }
}
