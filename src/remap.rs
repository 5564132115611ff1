//
// remap.rs
// Pet2Bids-rs
//
// Applies the field rule table to the DICOM header, converter sidecar and spreadsheet to build the BIDS documents.
//
// Thales Matheus Mendonça Santos - November 2025

use serde_json::{Map, Number, Value};
use tracing::warn;

use crate::error::{ConvertError, Result};
use crate::layout::{BloodLayout, CellPosition, SpreadsheetLayout};
use crate::models::{
    BidsOutputs, BidsPetJson, BloodColumn, BloodTsvTable, DicomHeader, ParticipantsTsvRow,
    SidecarJson,
};
use crate::rules::{
    BloodMeasure, CharRange, Constant, Derivation, Extraction, FieldRule, Requirement, SheetCell,
    Source, BLOOD_COLUMN_RULES, FRAME_DURATION_KEY, PET_FIELD_RULES,
};
use crate::spreadsheet::{Cell, MetadataTable};

const SIDECAR: &str = "converter sidecar";
const DICOM: &str = "DICOM header";

/// Everything the remapper reads. Nothing here is mutated.
#[derive(Debug, Clone, Copy)]
pub struct Sources<'a> {
    pub sidecar: &'a SidecarJson,
    pub header: Option<&'a DicomHeader>,
    pub table: Option<&'a MetadataTable>,
    pub layout: &'a SpreadsheetLayout,
}

impl<'a> Sources<'a> {
    fn header(&self, keyword: &str) -> Result<&'a DicomHeader> {
        self.header.ok_or_else(|| ConvertError::missing(keyword, DICOM))
    }

    fn sheet_number(&self, table: &MetadataTable, cell: SheetCell) -> Result<f64> {
        let (pos, label) = match cell {
            SheetCell::InjectedMassPerKg => (self.layout.injected_mass_per_kg, "injected mass per kg"),
            SheetCell::SubjectWeight => (self.layout.subject_weight, "subject weight"),
            SheetCell::MolarActivity => (self.layout.molar_activity, "molar activity"),
        };
        table.number(pos, label)
    }
}

/// Build every output document, or fail without producing any of them.
pub fn remap(sources: &Sources, subject_id: &str) -> Result<BidsOutputs> {
    Ok(BidsOutputs {
        pet: build_pet_json(sources)?,
        blood: build_blood_table(sources)?,
        participant: build_participant(sources, subject_id)?,
    })
}

pub fn build_pet_json(sources: &Sources) -> Result<BidsPetJson> {
    let mut doc = Map::new();
    for rule in PET_FIELD_RULES {
        if let Some(value) = resolve(rule, sources)? {
            doc.insert(rule.field.to_string(), value);
        }
    }
    Ok(doc)
}

fn resolve(rule: &FieldRule, sources: &Sources) -> Result<Option<Value>> {
    if rule.requirement == Requirement::WithSpreadsheet && sources.table.is_none() {
        return Ok(None);
    }

    let raw = match rule.source {
        Source::Sidecar(key) => sidecar_value(sources.sidecar, key)?.clone(),
        Source::Dicom(keyword) => {
            let header = sources.header(keyword)?;
            let text = header
                .get(keyword)
                .ok_or_else(|| ConvertError::missing(keyword, DICOM))?;
            Value::String(text.to_string())
        }
        Source::Sheet(cell) => {
            let table = spreadsheet(sources, rule.field)?;
            number_value(sources.sheet_number(table, cell)?, rule.field)?
        }
        Source::Constant(constant) => constant_value(constant),
        Source::Derived(derivation) => derive(derivation, sources, rule.field)?,
    };

    let value = match rule.extraction {
        Extraction::Identity => raw,
        Extraction::Substring(range) => {
            let text = raw.as_str().ok_or_else(|| {
                ConvertError::InvalidFormat(format!("{} source is not text: {raw}", rule.field))
            })?;
            Value::String(substring(text, range, rule.field)?)
        }
        Extraction::Convert(conversion) => {
            number_value(conversion.apply(as_number(&raw, rule.field)?), rule.field)?
        }
    };
    Ok(Some(value))
}

fn spreadsheet<'a>(sources: &Sources<'a>, field: &str) -> Result<&'a MetadataTable> {
    sources
        .table
        .ok_or_else(|| ConvertError::missing(field, "metadata spreadsheet"))
}

fn sidecar_value<'a>(sidecar: &'a SidecarJson, key: &str) -> Result<&'a Value> {
    sidecar
        .get(key)
        .filter(|v| !v.is_null())
        .ok_or_else(|| ConvertError::missing(key, SIDECAR))
}

fn constant_value(constant: Constant) -> Value {
    match constant {
        Constant::Text(s) => Value::from(s),
        Constant::Integer(i) => Value::from(i),
        Constant::Flag(b) => Value::from(b),
        Constant::TextList(items) => Value::from(items.to_vec()),
    }
}

fn derive(derivation: Derivation, sources: &Sources, field: &str) -> Result<Value> {
    match derivation {
        Derivation::InjectedMass => {
            let table = spreadsheet(sources, field)?;
            let per_kg = sources.sheet_number(table, SheetCell::InjectedMassPerKg)?;
            let weight = sources.sheet_number(table, SheetCell::SubjectWeight)?;
            number_value(per_kg * weight, field)
        }
        Derivation::FrameTimesStart => {
            let durations = frame_durations(sources.sidecar)?;
            Ok(Value::from(truncate_seconds(&frame_times_start(&durations))))
        }
        Derivation::FrameDurations => {
            let durations = frame_durations(sources.sidecar)?;
            Ok(Value::from(truncate_seconds(&durations)))
        }
        Derivation::EnergyWindow => {
            let header = sources.header("EnergyWindowRangeSequence")?;
            let (low, high) = energy_window(header)?;
            Ok(Value::Array(vec![
                number_value(low, field)?,
                number_value(high, field)?,
            ]))
        }
    }
}

/// Extract `range` counted in characters. A source too short for the range is an error.
pub fn substring(text: &str, range: CharRange, field: &str) -> Result<String> {
    let chars: Vec<char> = text.chars().collect();
    let end = range.end.unwrap_or(chars.len());
    if end > chars.len() || range.start >= end {
        return Err(ConvertError::InvalidFormat(format!(
            "{field}: {text:?} is too short for characters {}..{}",
            range.start,
            range.end.map_or_else(String::new, |e| e.to_string())
        )));
    }
    Ok(chars[range.start..end].iter().collect())
}

/// Start time of each frame: `[0, d0, d0 + d1, ...]`, one entry per duration.
pub fn frame_times_start(durations: &[f64]) -> Vec<f64> {
    durations
        .iter()
        .scan(0.0, |elapsed, d| {
            let start = *elapsed;
            *elapsed += d;
            Some(start)
        })
        .collect()
}

/// Frame timing is reported in whole seconds; fractions are cut, not rounded.
pub fn truncate_seconds(values: &[f64]) -> Vec<i64> {
    values.iter().map(|v| v.trunc() as i64).collect()
}

fn frame_durations(sidecar: &SidecarJson) -> Result<Vec<f64>> {
    let value = sidecar_value(sidecar, FRAME_DURATION_KEY)?;
    let items = value.as_array().ok_or_else(|| {
        ConvertError::InvalidFormat(format!("{FRAME_DURATION_KEY} is not a list: {value}"))
    })?;
    items
        .iter()
        .map(|item| as_number(item, FRAME_DURATION_KEY))
        .collect()
}

fn energy_window(header: &DicomHeader) -> Result<(f64, f64)> {
    let limits = &header.energy_window_limits;
    if limits.is_empty() {
        return Err(ConvertError::missing("EnergyWindowRangeSequence", DICOM));
    }
    let low = limits.iter().copied().fold(f64::INFINITY, f64::min);
    let high = limits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Ok((low, high))
}

fn as_number(value: &Value, field: &str) -> Result<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .ok_or_else(|| ConvertError::InvalidFormat(format!("{field} is not numeric: {value}")))
}

fn number_value(value: f64, field: &str) -> Result<Value> {
    Number::from_f64(value)
        .map(Value::Number)
        .ok_or_else(|| ConvertError::InvalidFormat(format!("{field} is not a finite number")))
}

fn blood_column(layout: &BloodLayout, measure: BloodMeasure) -> usize {
    match measure {
        BloodMeasure::Time => layout.time_column,
        BloodMeasure::Plasma => layout.plasma_column,
        BloodMeasure::WholeBlood => layout.whole_blood_column,
        BloodMeasure::ParentFraction => layout.parent_fraction_column,
    }
}

/// Manual blood samples; `None` when there is no spreadsheet or no blood block in the layout.
pub fn build_blood_table(sources: &Sources) -> Result<Option<BloodTsvTable>> {
    let Some(table) = sources.table else {
        return Ok(None);
    };
    let Some(blood) = sources.layout.blood else {
        warn!("no blood sample layout configured, skipping blood recording");
        return Ok(None);
    };

    let row_count = (blood.first_row..)
        .take_while(|&row| {
            !matches!(
                table.cell(CellPosition::new(row, blood.time_column)),
                None | Some(Cell::Empty)
            )
        })
        .count();
    if row_count == 0 {
        return Err(ConvertError::InvalidFormat(format!(
            "no blood samples found at row {} of {}",
            blood.first_row,
            table.path.display()
        )));
    }

    let columns = BLOOD_COLUMN_RULES
        .iter()
        .map(|rule| -> Result<BloodColumn> {
            let column = blood_column(&blood, rule.measure);
            let values = (blood.first_row..blood.first_row + row_count)
                .map(|row| {
                    table
                        .number(CellPosition::new(row, column), rule.name)
                        .map(|v| rule.conversion.apply(v))
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(BloodColumn {
                name: rule.name,
                description: rule.description,
                units: rule.conversion.to,
                values,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Some(BloodTsvTable { columns }))
}

pub fn build_participant(sources: &Sources, subject_id: &str) -> Result<ParticipantsTsvRow> {
    let header = sources.header("PatientSex")?;

    let weight = match header.get("PatientWeight") {
        Some(text) => text.trim().parse::<f64>().map_err(|_| {
            ConvertError::InvalidFormat(format!("PatientWeight is not numeric: {text:?}"))
        })?,
        None => match sources.table {
            Some(table) => sources.sheet_number(table, SheetCell::SubjectWeight)?,
            None => return Err(ConvertError::missing("PatientWeight", DICOM)),
        },
    };
    let sex = header
        .get("PatientSex")
        .ok_or_else(|| ConvertError::missing("PatientSex", DICOM))?;

    Ok(ParticipantsTsvRow {
        participant_id: format!("sub-{subject_id}"),
        weight,
        sex: sex.to_string(),
    })
}
