//
// layout.rs
// Pet2Bids-rs
//
// Named cell offsets into the investigator metadata spreadsheet, loadable from JSON so a new template is a data edit.
//
// Thales Matheus Mendonça Santos - November 2025

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConvertError, Result};

/// Zero-based position of a data cell. Row 0 is the first row *below* the header row.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct CellPosition {
    pub row: usize,
    pub column: usize,
}

impl CellPosition {
    pub const fn new(row: usize, column: usize) -> Self {
        Self { row, column }
    }
}

/// Injected mass per kilogram of body weight (nmol/kg) in the legacy template.
pub const LEGACY_INJECTED_MASS_PER_KG: CellPosition = CellPosition::new(35, 10);
/// Subject weight (kg) in the legacy template.
pub const LEGACY_SUBJECT_WEIGHT: CellPosition = CellPosition::new(38, 6);
/// Molar activity (µCi/nmol) in the legacy template.
pub const LEGACY_MOLAR_ACTIVITY: CellPosition = CellPosition::new(0, 35);

/// Columns holding manual blood samples, read downwards from `first_row` until the time cell is empty.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct BloodLayout {
    pub first_row: usize,
    pub time_column: usize,
    pub plasma_column: usize,
    pub whole_blood_column: usize,
    pub parent_fraction_column: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpreadsheetLayout {
    pub injected_mass_per_kg: CellPosition,
    pub subject_weight: CellPosition,
    pub molar_activity: CellPosition,
    /// The legacy template's blood block was never documented, so there is no default.
    pub blood: Option<BloodLayout>,
}

impl Default for SpreadsheetLayout {
    fn default() -> Self {
        Self {
            injected_mass_per_kg: LEGACY_INJECTED_MASS_PER_KG,
            subject_weight: LEGACY_SUBJECT_WEIGHT,
            molar_activity: LEGACY_MOLAR_ACTIVITY,
            blood: None,
        }
    }
}

impl SpreadsheetLayout {
    pub fn from_file(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| ConvertError::io(path, e))?;
        serde_json::from_reader(BufReader::new(file)).map_err(|source| ConvertError::Json {
            path: path.to_path_buf(),
            source,
        })
    }
}
