//
// dump.rs
// Pet2Bids-rs
//
// Renders a human-readable dump of ECAT main and frame headers, with value previews, or writes them as JSON.
//
// Thales Matheus Mendonça Santos - November 2025

use std::fmt::Write;
use std::path::Path;

use serde_json::{Map, Value};

use crate::ecat::EcatFile;
use crate::ecat_normalize::{normalize, EcatHeaders};
use crate::error::Result;
use crate::writer::write_json;

pub fn read_headers(path: &Path) -> Result<EcatHeaders> {
    let ecat = EcatFile::open(path)?;
    Ok(normalize(&ecat))
}

pub fn write_headers_json(headers: &EcatHeaders, output: &Path) -> Result<()> {
    write_json(output, headers)
}

/// Render every header field, truncating long values to `max_value_len` characters.
pub fn dump_to_string(headers: &EcatHeaders, max_value_len: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Main header ({} fields)", headers.main_header.len());
    dump_fields(&headers.main_header, 1, max_value_len, &mut out);

    for (idx, subheader) in headers.subheaders.iter().enumerate() {
        let _ = writeln!(out, "Frame {} sub-header", idx + 1);
        for (name, typed) in subheader {
            let (value, dtype) = match typed {
                Value::Object(entry) => (
                    entry.get("value").unwrap_or(&Value::Null),
                    entry.get("dtype").and_then(Value::as_str).unwrap_or(""),
                ),
                other => (other, ""),
            };
            let _ = writeln!(
                out,
                "  {} {} {}",
                name,
                dtype,
                preview(value, max_value_len)
            );
        }
    }
    out
}

fn dump_fields(fields: &Map<String, Value>, depth: usize, max_value_len: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    for (name, value) in fields {
        let _ = writeln!(out, "{}{} {}", indent, name, preview(value, max_value_len));
    }
}

fn preview(value: &Value, max_value_len: usize) -> String {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Array(items) if items.len() > 8 => format!("[{} values]", items.len()),
        other => other.to_string(),
    };
    truncate(&text, max_value_len)
}

fn truncate(input: &str, limit: usize) -> String {
    if input.chars().count() <= limit {
        input.to_string()
    } else {
        let mut truncated: String = input.chars().take(limit).collect();
        truncated.push('…');
        truncated
    }
}
