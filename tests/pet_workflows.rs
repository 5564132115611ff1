//
// pet_workflows.rs
// Pet2Bids-rs
//
// Integration-style tests covering DICOM header discovery, sidecar lookup, field remapping and BIDS output round-trips.
//
// Thales Matheus Mendonça Santos - November 2025

mod common;

use std::fs;

use pet2bids::dicom_header::{find_first_dicom, resolve_subject_id};
use pet2bids::layout::SpreadsheetLayout;
use pet2bids::remap::{remap, Sources};
use pet2bids::spreadsheet::MetadataTable;
use pet2bids::writer::{read_pet_json, write_outputs, BidsPaths};
use pet2bids::{sidecar, ConvertError};
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::tempdir;

#[test]
fn first_dicom_is_found_past_other_files() {
    let dir = tempdir().expect("tempdir");
    fs::write(dir.path().join("notes.txt"), "not an image").expect("junk");
    fs::create_dir(dir.path().join("series")).expect("series dir");
    let written = common::write_pet_dicom(&dir.path().join("series"), "IM0001");

    let (path, header) = find_first_dicom(dir.path()).expect("dicom header");
    assert_eq!(path, written);
    assert_eq!(header.get("PatientSex"), Some("F"));
    assert_eq!(header.get("PatientWeight"), Some("71.5"));
    assert_eq!(header.get("ConvolutionKernel"), Some("XYZGAUSSIAN4.00"));
    assert_eq!(header.energy_window_limits, vec![435.0, 650.0]);
    assert_eq!(
        resolve_subject_id(None, Some(&header)).as_deref(),
        Some("DoeJane")
    );
}

#[test]
fn folder_without_dicom_leaves_subject_unset() {
    let dir = tempdir().expect("tempdir");
    fs::write(dir.path().join("scan.nii"), [0u8; 348]).expect("nifti");
    fs::write(dir.path().join("scan.json"), "{}").expect("json");

    let found = find_first_dicom(dir.path());
    assert!(found.is_none());
    assert_eq!(resolve_subject_id(None, None), None);
}

#[test]
fn written_pet_json_reads_back_equal() {
    let dir = tempdir().expect("tempdir");
    common::write_pet_dicom(dir.path(), "IM0001");
    let (_, header) = find_first_dicom(dir.path()).expect("dicom header");

    // Full-precision factors must survive the write/read cycle bit for bit.
    let factors = json!([
        0.9611757480989835,
        1.2095605455522853,
        1.1215412408514747,
        0.11034448250981299
    ]);
    let mut converted = common::raclopride_sidecar();
    converted.insert("DecayFactor".into(), factors.clone());
    let sidecar_path = dir.path().join("converted").join("scan_pet.json");
    fs::create_dir(sidecar_path.parent().expect("parent")).expect("mkdir");
    fs::write(&sidecar_path, serde_json::to_vec(&converted).expect("encode"))
    .expect("sidecar");
    let (located, sidecar) = sidecar::locate_and_load(dir.path(), &[]).expect("sidecar");
    assert_eq!(located, sidecar_path);

    let layout = SpreadsheetLayout::default();
    let sources = Sources {
        sidecar: &sidecar,
        header: Some(&header),
        table: None,
        layout: &layout,
    };
    let outputs = remap(&sources, "DoeJane").expect("remap");

    let paths = BidsPaths::new(dir.path(), "DoeJane", Some("baseline"));
    let participants = dir.path().join("participants.tsv");
    let files = write_outputs(&paths, &outputs, &participants).expect("write");
    assert!(files.blood.is_none());
    assert!(files
        .pet_json
        .ends_with("sub-DoeJane_ses-baseline_pet.json"));

    let reread = read_pet_json(&files.pet_json).expect("read back");
    assert_eq!(reread, outputs.pet);
    assert_eq!(reread["TracerName"], "Raclopride");
    assert_eq!(reread["ReconMethodName"], "OSEM3D 4i21s");
    assert_eq!(reread["AttenuationCorrection"], "measured,AC_CT");
    assert_eq!(reread["DecayCorrectionFactor"], factors);

    let table = fs::read_to_string(&participants).expect("participants");
    assert_eq!(table, "participant_id\tweight\tsex\nsub-DoeJane\t71.5\tF\n");
}

#[test]
fn spreadsheet_in_tsv_form_is_addressed_below_header() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("metadata.tsv");
    fs::write(&path, "subject\tdose\n01\t0.5\n02\t0.75\n").expect("tsv");

    let table = MetadataTable::open(&path).expect("table");
    assert_eq!(table.headers, vec!["subject", "dose"]);
    let dose = table
        .number(pet2bids::layout::CellPosition::new(1, 1), "dose")
        .expect("dose");
    assert_eq!(dose, 0.75);
}

#[test]
fn unknown_spreadsheet_extension_is_rejected() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("metadata.docx");
    fs::write(&path, "irrelevant").expect("write");

    assert!(matches!(
        MetadataTable::open(&path),
        Err(ConvertError::UnsupportedFormat { .. })
    ));
}
