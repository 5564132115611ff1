//
// writer.rs
// Pet2Bids-rs
//
// Names and writes the BIDS outputs: PET sidecar, manual blood recording (JSON + TSV) and participants.tsv.
//
// Thales Matheus Mendonça Santos - November 2025

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::info;

use crate::error::{ConvertError, Result};
use crate::models::{BidsOutputs, BidsPetJson, BloodTsvTable, ParticipantsTsvRow};
use crate::spreadsheet::csv_error;

const JSON_INDENT: &[u8] = b"    ";
const PET_SUFFIX: &str = "_pet.json";
const BLOOD_JSON_SUFFIX: &str = "_recording-manual-blood.json";
const BLOOD_TSV_SUFFIX: &str = "_recording-manual_blood.tsv";
pub const PARTICIPANTS_FILE: &str = "participants.tsv";

const BLOOD_DESCRIPTION: &str = "Manually sampled arterial blood radioactivity and metabolite data";

/// True for file names this tool writes itself, so reruns never mistake them for converter output.
pub fn is_generated_output(name: &str) -> bool {
    name.starts_with("sub-")
        && [PET_SUFFIX, BLOOD_JSON_SUFFIX, BLOOD_TSV_SUFFIX]
            .iter()
            .any(|suffix| name.ends_with(suffix))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BidsPaths {
    pub pet_json: PathBuf,
    pub blood_json: PathBuf,
    pub blood_tsv: PathBuf,
}

impl BidsPaths {
    pub fn new(destination: &Path, subject: &str, session: Option<&str>) -> Self {
        let stem = match session {
            Some(session) => format!("sub-{subject}_ses-{session}"),
            None => format!("sub-{subject}"),
        };
        Self {
            pet_json: destination.join(format!("{stem}{PET_SUFFIX}")),
            blood_json: destination.join(format!("{stem}{BLOOD_JSON_SUFFIX}")),
            blood_tsv: destination.join(format!("{stem}{BLOOD_TSV_SUFFIX}")),
        }
    }
}

fn json_error(path: &Path) -> impl FnOnce(serde_json::Error) -> ConvertError + '_ {
    move |source| ConvertError::Json {
        path: path.to_path_buf(),
        source,
    }
}

/// Pretty-print `value` with four-space indentation.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(JSON_INDENT);
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut serializer).map_err(json_error(path))?;
    buf.push(b'\n');
    fs::write(path, buf).map_err(|e| ConvertError::io(path, e))
}

pub fn read_pet_json(path: &Path) -> Result<BidsPetJson> {
    let file = File::open(path).map_err(|e| ConvertError::io(path, e))?;
    serde_json::from_reader(BufReader::new(file)).map_err(json_error(path))
}

/// Column descriptions that accompany the blood TSV.
pub fn blood_sidecar(table: &BloodTsvTable) -> Map<String, Value> {
    let mut doc = Map::new();
    doc.insert("Description".into(), json!(BLOOD_DESCRIPTION));
    doc.insert("PlasmaAvail".into(), json!(table.column("plasma_radioactivity").is_some()));
    doc.insert(
        "WholeBloodAvail".into(),
        json!(table.column("whole_blood_radioactivity").is_some()),
    );
    doc.insert(
        "MetaboliteAvail".into(),
        json!(table.column("metabolite_parent_fraction").is_some()),
    );
    doc.insert("DispersionCorrected".into(), json!(false));
    for column in &table.columns {
        doc.insert(
            column.name.to_string(),
            json!({ "Description": column.description, "Units": column.units }),
        );
    }
    doc
}

pub fn write_blood_tsv(path: &Path, table: &BloodTsvTable) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path)
        .map_err(|e| csv_error(path, e))?;
    writer
        .write_record(table.columns.iter().map(|c| c.name))
        .map_err(|e| csv_error(path, e))?;
    for row in 0..table.len() {
        writer
            .write_record(table.columns.iter().map(|c| c.values[row].to_string()))
            .map_err(|e| csv_error(path, e))?;
    }
    writer.flush().map_err(|e| ConvertError::io(path, e))
}

/// Overwrites `path`; earlier subjects are not kept.
pub fn write_participants(path: &Path, rows: &[ParticipantsTsvRow]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path)
        .map_err(|e| csv_error(path, e))?;
    for row in rows {
        writer.serialize(row).map_err(|e| csv_error(path, e))?;
    }
    writer.flush().map_err(|e| ConvertError::io(path, e))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFiles {
    pub pet_json: PathBuf,
    pub blood: Option<(PathBuf, PathBuf)>,
    pub participants: PathBuf,
}

const STAGING_SUFFIX: &str = ".partial";

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(STAGING_SUFFIX);
    path.with_file_name(name)
}

/// Output files written next to their targets and only moved into place once all of them exist.
#[derive(Default)]
struct Staged {
    files: Vec<(PathBuf, PathBuf)>,
}

impl Staged {
    fn write(&mut self, target: &Path, write: impl FnOnce(&Path) -> Result<()>) -> Result<()> {
        let staging = staging_path(target);
        self.files.push((staging.clone(), target.to_path_buf()));
        write(&staging)
    }

    fn commit(&self) -> Result<()> {
        for (done, (staging, target)) in self.files.iter().enumerate() {
            if let Err(e) = fs::rename(staging, target) {
                for (_, committed) in &self.files[..done] {
                    let _ = fs::remove_file(committed);
                }
                return Err(ConvertError::io(target, e));
            }
        }
        Ok(())
    }

    fn discard(&self) {
        for (staging, _) in &self.files {
            let _ = fs::remove_file(staging);
        }
    }
}

/// Write every output or none of them.
pub fn write_outputs(
    paths: &BidsPaths,
    outputs: &BidsOutputs,
    participants: &Path,
) -> Result<WrittenFiles> {
    let mut staged = Staged::default();
    let result = stage_outputs(&mut staged, paths, outputs, participants)
        .and_then(|()| staged.commit());
    if let Err(e) = result {
        staged.discard();
        return Err(e);
    }

    info!(file = %paths.pet_json.display(), "wrote PET sidecar");
    let blood = outputs.blood.as_ref().map(|table| {
        info!(file = %paths.blood_tsv.display(), samples = table.len(), "wrote blood recording");
        (paths.blood_json.clone(), paths.blood_tsv.clone())
    });
    info!(file = %participants.display(), "wrote participants table");

    Ok(WrittenFiles {
        pet_json: paths.pet_json.clone(),
        blood,
        participants: participants.to_path_buf(),
    })
}

fn stage_outputs(
    staged: &mut Staged,
    paths: &BidsPaths,
    outputs: &BidsOutputs,
    participants: &Path,
) -> Result<()> {
    staged.write(&paths.pet_json, |p| write_json(p, &outputs.pet))?;
    if let Some(table) = &outputs.blood {
        staged.write(&paths.blood_json, |p| write_json(p, &blood_sidecar(table)))?;
        staged.write(&paths.blood_tsv, |p| write_blood_tsv(p, table))?;
    }
    staged.write(participants, |p| {
        write_participants(p, std::slice::from_ref(&outputs.participant))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BloodColumn;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn paths_follow_bids_patterns() {
        let paths = BidsPaths::new(Path::new("/data"), "01", Some("baseline"));
        assert_eq!(paths.pet_json, Path::new("/data/sub-01_ses-baseline_pet.json"));
        assert_eq!(
            paths.blood_json,
            Path::new("/data/sub-01_ses-baseline_recording-manual-blood.json")
        );
        assert_eq!(
            paths.blood_tsv,
            Path::new("/data/sub-01_ses-baseline_recording-manual_blood.tsv")
        );

        let paths = BidsPaths::new(Path::new("/data"), "01", None);
        assert_eq!(paths.pet_json, Path::new("/data/sub-01_pet.json"));
    }

    #[test]
    fn generated_names_are_recognised() {
        assert!(is_generated_output("sub-01_pet.json"));
        assert!(is_generated_output("sub-01_ses-2_recording-manual-blood.json"));
        assert!(!is_generated_output("series_pet.json"));
        assert!(!is_generated_output("sub-01_T1w.json"));
    }

    #[test]
    fn json_uses_four_space_indent() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("doc.json");
        write_json(&path, &json!({"Units": "Bq/mL"})).expect("write");
        let text = fs::read_to_string(&path).expect("read");
        assert_eq!(text, "{\n    \"Units\": \"Bq/mL\"\n}\n");
    }

    #[test]
    fn blood_tsv_has_header_and_no_index() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("blood.tsv");
        let table = BloodTsvTable {
            columns: vec![
                BloodColumn {
                    name: "time",
                    description: "t",
                    units: "s",
                    values: vec![0.0, 30.0],
                },
                BloodColumn {
                    name: "plasma_radioactivity",
                    description: "p",
                    units: "kBq/mL",
                    values: vec![1.5, 2.25],
                },
            ],
        };
        write_blood_tsv(&path, &table).expect("write");
        let text = fs::read_to_string(&path).expect("read");
        assert_eq!(text, "time\tplasma_radioactivity\n0\t1.5\n30\t2.25\n");

        let sidecar = blood_sidecar(&table);
        assert_eq!(sidecar["time"]["Units"], "s");
        assert_eq!(sidecar["PlasmaAvail"], true);
        assert_eq!(sidecar["MetaboliteAvail"], false);
    }

    fn outputs() -> BidsOutputs {
        let mut pet = BidsPetJson::new();
        pet.insert("Units".into(), json!("Bq/mL"));
        BidsOutputs {
            pet,
            blood: None,
            participant: ParticipantsTsvRow {
                participant_id: "sub-01".into(),
                weight: 70.5,
                sex: "M".into(),
            },
        }
    }

    #[test]
    fn outputs_are_all_written() {
        let dir = tempdir().expect("tempdir");
        let paths = BidsPaths::new(dir.path(), "01", None);
        let participants = dir.path().join(PARTICIPANTS_FILE);

        let files = write_outputs(&paths, &outputs(), &participants).expect("write");
        assert_eq!(read_pet_json(&files.pet_json).expect("pet")["Units"], "Bq/mL");
        assert!(participants.is_file());
        assert!(!staging_path(&participants).exists());
        assert!(!staging_path(&paths.pet_json).exists());
    }

    #[test]
    fn failed_write_leaves_no_outputs_behind() {
        let dir = tempdir().expect("tempdir");
        let paths = BidsPaths::new(dir.path(), "01", None);
        let participants = dir.path().join("missing").join(PARTICIPANTS_FILE);

        assert!(write_outputs(&paths, &outputs(), &participants).is_err());
        assert!(!paths.pet_json.exists());
        assert!(!staging_path(&paths.pet_json).exists());
        let leftovers: Vec<_> = fs::read_dir(dir.path()).expect("list").collect();
        assert!(leftovers.is_empty(), "unexpected files: {leftovers:?}");
    }

    #[test]
    fn participants_are_overwritten() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join(PARTICIPANTS_FILE);
        let row = |id: &str| ParticipantsTsvRow {
            participant_id: id.to_string(),
            weight: 70.5,
            sex: "M".into(),
        };
        write_participants(&path, &[row("sub-01")]).expect("first");
        write_participants(&path, &[row("sub-02")]).expect("second");
        let text = fs::read_to_string(&path).expect("read");
        assert_eq!(text, "participant_id\tweight\tsex\nsub-02\t70.5\tM\n");
    }
}
