//
// dicom_header.rs
// Pet2Bids-rs
//
// Scans a series folder for the first decodable DICOM file and lifts the patient and reconstruction attributes from it.
//
// Thales Matheus Mendonça Santos - November 2025

use std::path::{Path, PathBuf};

use dicom::core::Tag;
use dicom::dictionary_std::tags;
use dicom::object::OpenFileOptions;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::dicom_access::ElementAccess;
use crate::models::DicomHeader;

/// Keyword/tag pairs copied verbatim into the header excerpt.
const HEADER_ATTRIBUTES: &[(&str, Tag)] = &[
    ("PatientID", tags::PATIENT_ID),
    ("PatientName", tags::PATIENT_NAME),
    ("PatientWeight", tags::PATIENT_WEIGHT),
    ("PatientSex", tags::PATIENT_SEX),
    ("ReconstructionMethod", tags::RECONSTRUCTION_METHOD),
    ("ConvolutionKernel", tags::CONVOLUTION_KERNEL),
    ("AttenuationCorrectionMethod", tags::ATTENUATION_CORRECTION_METHOD),
];

pub fn extract_header<T: ElementAccess>(obj: &T) -> DicomHeader {
    let attributes = HEADER_ATTRIBUTES
        .iter()
        .filter_map(|(keyword, tag)| obj.element_str(*tag).map(|v| (keyword.to_string(), v)))
        .collect();

    DicomHeader {
        attributes,
        energy_window_limits: energy_window_limits(obj),
    }
}

/// Limits may sit at the top level or inside the energy window information items.
fn energy_window_limits<T: ElementAccess>(obj: &T) -> Vec<f64> {
    let nested = obj
        .sequence_items(tags::ENERGY_WINDOW_INFORMATION_SEQUENCE)
        .iter()
        .flat_map(|info| info.sequence_items(tags::ENERGY_WINDOW_RANGE_SEQUENCE));

    obj.sequence_items(tags::ENERGY_WINDOW_RANGE_SEQUENCE)
        .iter()
        .chain(nested)
        .flat_map(|range| {
            [
                range.element_f64(tags::ENERGY_WINDOW_LOWER_LIMIT),
                range.element_f64(tags::ENERGY_WINDOW_UPPER_LIMIT),
            ]
        })
        .flatten()
        .collect()
}

/// Walk `folder` and return the header of the first file that decodes as DICOM.
///
/// Files that fail to decode are skipped, whatever their extension. The walk follows
/// filesystem enumeration order, so with several series in one tree the chosen file
/// is not stable across platforms.
pub fn find_first_dicom(folder: &Path) -> Option<(PathBuf, DicomHeader)> {
    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.path();
        match OpenFileOptions::new()
            .read_until(tags::PIXEL_DATA)
            .open_file(path)
        {
            Ok(obj) => {
                info!(file = %path.display(), "using DICOM header");
                return Some((path.to_path_buf(), extract_header(&*obj)));
            }
            Err(e) => debug!(file = %path.display(), error = %e, "not a DICOM file, skipping"),
        }
    }
    None
}

/// Keep only ASCII letters and digits, as BIDS labels require.
pub fn sanitize_label(input: &str) -> String {
    input.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

/// Explicit ids win; otherwise fall back to the patient name, then the patient id.
pub fn resolve_subject_id(explicit: Option<&str>, header: Option<&DicomHeader>) -> Option<String> {
    if let Some(id) = explicit {
        return Some(id.to_string());
    }
    let header = header?;
    ["PatientName", "PatientID"]
        .iter()
        .filter_map(|k| header.get(k))
        .map(sanitize_label)
        .find(|s| !s.is_empty())
}
