//
// sidecar.rs
// Pet2Bids-rs
//
// Locates and parses the JSON sidecar that dcm2niix writes next to the converted image.
//
// Thales Matheus Mendonça Santos - November 2025

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::info;
use walkdir::WalkDir;

use crate::error::{ConvertError, Result};
use crate::models::SidecarJson;
use crate::writer::is_generated_output;

fn is_sidecar_candidate(path: &Path) -> bool {
    let is_json = path.extension().map_or(false, |ext| ext == "json");
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    is_json && !is_generated_output(name)
}

/// Every sidecar candidate under `dir`: sorted direct children first, then anything deeper.
pub fn candidates(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut direct: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|e| ConvertError::io(dir, e))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && is_sidecar_candidate(p))
        .collect();
    direct.sort();

    let nested = WalkDir::new(dir)
        .min_depth(2)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_sidecar_candidate(e.path()))
        .map(|e| e.into_path());
    Ok(direct.into_iter().chain(nested).collect())
}

/// Find the converter's sidecar, preferring files that are not in `existing`.
///
/// `existing` is the candidate list taken before the converter ran. When the converter
/// skipped its outputs nothing is new, and the first candidate wins, so an unrelated JSON
/// file that sorts earlier in the same folder can still be picked.
pub fn locate(dir: &Path, existing: &[PathBuf]) -> Result<PathBuf> {
    let found = candidates(dir)?;
    found
        .iter()
        .find(|p| !existing.contains(p))
        .or_else(|| found.first())
        .cloned()
        .ok_or_else(|| ConvertError::SidecarNotFound {
            dir: dir.to_path_buf(),
        })
}

pub fn load(path: &Path) -> Result<SidecarJson> {
    let file = File::open(path).map_err(|e| ConvertError::io(path, e))?;
    let value: Value =
        serde_json::from_reader(BufReader::new(file)).map_err(|source| ConvertError::Json {
            path: path.to_path_buf(),
            source,
        })?;
    match value {
        Value::Object(map) => Ok(map),
        other => Err(ConvertError::InvalidFormat(format!(
            "sidecar {} holds a JSON {} instead of an object",
            path.display(),
            json_kind(&other)
        ))),
    }
}

pub fn locate_and_load(dir: &Path, existing: &[PathBuf]) -> Result<(PathBuf, SidecarJson)> {
    let path = locate(dir, existing)?;
    info!(sidecar = %path.display(), "reading converter sidecar");
    let sidecar = load(&path)?;
    Ok((path, sidecar))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
