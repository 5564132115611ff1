//
// models.rs
// Pet2Bids-rs
//
// Plain data produced and consumed by the conversion stages: the DICOM header excerpt, the BIDS documents and tables.
//
// Thales Matheus Mendonça Santos - November 2025

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Attributes lifted from the first decodable DICOM file, keyed by DICOM keyword.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DicomHeader {
    pub attributes: BTreeMap<String, String>,
    /// Every lower/upper limit (keV) found in the energy window range items.
    pub energy_window_limits: Vec<f64>,
}

impl DicomHeader {
    pub fn get(&self, keyword: &str) -> Option<&str> {
        self.attributes.get(keyword).map(String::as_str)
    }
}

/// Converter-emitted sidecar, kept as the raw JSON object.
pub type SidecarJson = Map<String, Value>;

/// BIDS PET sidecar document, in rule-table order.
pub type BidsPetJson = Map<String, Value>;

/// One column of the manual blood recording.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BloodColumn {
    pub name: &'static str,
    pub description: &'static str,
    pub units: &'static str,
    pub values: Vec<f64>,
}

/// Manual blood samples, one column per measured quantity; all columns share the same length.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BloodTsvTable {
    pub columns: Vec<BloodColumn>,
}

impl BloodTsvTable {
    pub fn len(&self) -> usize {
        self.columns.first().map_or(0, |c| c.values.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn column(&self, name: &str) -> Option<&BloodColumn> {
        self.columns.iter().find(|c| c.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantsTsvRow {
    pub participant_id: String,
    pub weight: f64,
    pub sex: String,
}

/// Everything the remapper hands to the writer.
#[derive(Debug, Clone, PartialEq)]
pub struct BidsOutputs {
    pub pet: BidsPetJson,
    pub blood: Option<BloodTsvTable>,
    pub participant: ParticipantsTsvRow,
}
