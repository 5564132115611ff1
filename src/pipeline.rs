//
// pipeline.rs
// Pet2Bids-rs
//
// Runs a DICOM PET conversion end to end: converter, header, sidecar, spreadsheet, remap and output writing.
//
// Thales Matheus Mendonça Santos - November 2025

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::dcm2niix::{ConversionOutcome, Dcm2niix};
use crate::dicom_header::{find_first_dicom, resolve_subject_id};
use crate::error::{ConvertError, Result};
use crate::layout::SpreadsheetLayout;
use crate::remap::{remap, Sources};
use crate::sidecar;
use crate::spreadsheet::MetadataTable;
use crate::writer::{write_outputs, BidsPaths, WrittenFiles, PARTICIPANTS_FILE};

/// Inputs for one subject's conversion.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub image_folder: PathBuf,
    pub metadata_path: Option<PathBuf>,
    /// Defaults to `image_folder`.
    pub destination: Option<PathBuf>,
    pub subject_id: Option<String>,
    pub session_id: Option<String>,
    pub layout: SpreadsheetLayout,
    pub converter: Dcm2niix,
    pub participants_path: PathBuf,
}

impl ConversionRequest {
    pub fn new(image_folder: impl Into<PathBuf>) -> Self {
        Self {
            image_folder: image_folder.into(),
            metadata_path: None,
            destination: None,
            subject_id: None,
            session_id: None,
            layout: SpreadsheetLayout::default(),
            converter: Dcm2niix::default(),
            participants_path: PathBuf::from(PARTICIPANTS_FILE),
        }
    }

    pub fn destination(&self) -> &Path {
        self.destination.as_deref().unwrap_or(&self.image_folder)
    }
}

#[derive(Debug, Clone)]
pub struct ConversionReport {
    pub outcome: ConversionOutcome,
    pub dicom_file: Option<PathBuf>,
    pub sidecar: PathBuf,
    pub subject_id: String,
    pub files: WrittenFiles,
}

pub fn convert(request: &ConversionRequest) -> Result<ConversionReport> {
    request.converter.preflight()?;

    let destination = request.destination();
    fs::create_dir_all(destination).map_err(|e| ConvertError::io(destination, e))?;

    let existing = sidecar::candidates(destination)?;
    let outcome = request.converter.run(&request.image_folder, destination)?;
    info!(?outcome, "image conversion finished");

    let found = find_first_dicom(&request.image_folder);
    let (dicom_file, header) = match found {
        Some((path, header)) => (Some(path), Some(header)),
        None => (None, None),
    };

    let (sidecar_path, sidecar) = sidecar::locate_and_load(destination, &existing)?;
    info!(file = %sidecar_path.display(), "loaded converter sidecar");

    let table = request
        .metadata_path
        .as_deref()
        .map(MetadataTable::open)
        .transpose()?;

    let subject_id = resolve_subject_id(request.subject_id.as_deref(), header.as_ref())
        .ok_or_else(|| ConvertError::missing("subject id", "DICOM header"))?;

    let sources = Sources {
        sidecar: &sidecar,
        header: header.as_ref(),
        table: table.as_ref(),
        layout: &request.layout,
    };
    let outputs = remap(&sources, &subject_id)?;

    let paths = BidsPaths::new(destination, &subject_id, request.session_id.as_deref());
    let files = write_outputs(&paths, &outputs, &request.participants_path)?;

    Ok(ConversionReport {
        outcome,
        dicom_file,
        sidecar: sidecar_path,
        subject_id,
        files,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destination_defaults_to_image_folder() {
        let mut request = ConversionRequest::new("/scans/pet");
        assert_eq!(request.destination(), Path::new("/scans/pet"));
        request.destination = Some(PathBuf::from("/bids/sub-01/pet"));
        assert_eq!(request.destination(), Path::new("/bids/sub-01/pet"));
    }

    #[test]
    fn missing_converter_stops_before_any_output() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut request = ConversionRequest::new(dir.path());
        request.destination = Some(dir.path().join("out"));
        request.converter = Dcm2niix::new("pet2bids-no-such-converter");

        let err = convert(&request).expect_err("must fail");
        assert!(matches!(err, ConvertError::ToolNotFound { .. }));
        assert!(!dir.path().join("out").exists());
    }
}
