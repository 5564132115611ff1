//
// ecat.rs
// Pet2Bids-rs
//
// Table-driven reader for ECAT 7 files: main header, matrix directory and the image sub-header of every frame.
//
// Thales Matheus Mendonça Santos - November 2025

use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;

use byteordered::ByteOrdered;
use tracing::debug;

use crate::error::{ConvertError, Result};
use FieldKind::{Bytes, F32Array, I16Array, F32, I16, I32, U32};

/// ECAT files are laid out in 512-byte blocks, numbered from 1.
pub const BLOCK_SIZE: usize = 512;
const MAGIC_PREFIX: &[u8] = b"MATRIX";
/// Directory block number of the first directory block; the chain loops back to it.
const FIRST_DIRECTORY_BLOCK: i32 = 2;
/// Volume8 and Volume16 files carry image sub-headers.
const IMAGE_FILE_TYPES: [i64; 2] = [6, 7];

/// Encoding of a single header field. All numbers are big-endian.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FieldKind {
    Bytes(usize),
    I16,
    I32,
    U32,
    F32,
    I16Array(usize),
    F32Array(usize),
}

impl FieldKind {
    pub fn size(self) -> usize {
        match self {
            FieldKind::Bytes(n) => n,
            FieldKind::I16 => 2,
            FieldKind::I32 | FieldKind::U32 | FieldKind::F32 => 4,
            FieldKind::I16Array(n) => 2 * n,
            FieldKind::F32Array(n) => 4 * n,
        }
    }

    /// Type label in the numpy-style notation the header dumps use (`>i2`, `|S14`, ...).
    pub fn dtype(self) -> String {
        match self {
            FieldKind::Bytes(n) => format!("|S{n}"),
            FieldKind::I16 | FieldKind::I16Array(_) => ">i2".to_string(),
            FieldKind::I32 => ">i4".to_string(),
            FieldKind::U32 => ">u4".to_string(),
            FieldKind::F32 | FieldKind::F32Array(_) => ">f4".to_string(),
        }
    }
}

#[derive(Debug, Copy, Clone)]
pub struct FieldDef {
    pub name: &'static str,
    pub kind: FieldKind,
}

const fn field(name: &'static str, kind: FieldKind) -> FieldDef {
    FieldDef { name, kind }
}

pub const MAIN_HEADER_LAYOUT: &[FieldDef] = &[
    field("magic_number", Bytes(14)),
    field("original_file_name", Bytes(32)),
    field("sw_version", I16),
    field("system_type", I16),
    field("file_type", I16),
    field("serial_number", Bytes(10)),
    field("scan_start_time", U32),
    field("isotope_name", Bytes(8)),
    field("isotope_halflife", F32),
    field("radiopharmaceutical", Bytes(32)),
    field("gantry_tilt", F32),
    field("gantry_rotation", F32),
    field("bed_elevation", F32),
    field("intrinsic_tilt", F32),
    field("wobble_speed", I16),
    field("transm_source_type", I16),
    field("distance_scanned", F32),
    field("transaxial_fov", F32),
    field("angular_compression", I16),
    field("coin_samp_mode", I16),
    field("axial_samp_mode", I16),
    field("ecat_calibration_factor", F32),
    field("calibration_units", I16),
    field("calibration_units_type", I16),
    field("compression_code", I16),
    field("study_type", Bytes(12)),
    field("patient_id", Bytes(16)),
    field("patient_name", Bytes(32)),
    field("patient_sex", Bytes(1)),
    field("patient_dexterity", Bytes(1)),
    field("patient_age", F32),
    field("patient_height", F32),
    field("patient_weight", F32),
    field("patient_birth_date", U32),
    field("physician_name", Bytes(32)),
    field("operator_name", Bytes(32)),
    field("study_description", Bytes(32)),
    field("acquisition_type", I16),
    field("patient_orientation", I16),
    field("facility_name", Bytes(20)),
    field("num_planes", I16),
    field("num_frames", I16),
    field("num_gates", I16),
    field("num_bed_pos", I16),
    field("init_bed_position", F32),
    field("bed_position", F32Array(15)),
    field("plane_separation", F32),
    field("lwr_sctr_thres", I16),
    field("lwr_true_thres", I16),
    field("upr_true_thres", I16),
    field("user_process_code", Bytes(10)),
    field("acquisition_mode", I16),
    field("bin_size", F32),
    field("branching_fraction", F32),
    field("dose_start_time", U32),
    field("dosage", F32),
    field("well_counter_corr_factor", F32),
    field("data_units", Bytes(32)),
    field("septa_state", I16),
    field("fill", Bytes(12)),
];

pub const IMAGE_SUBHEADER_LAYOUT: &[FieldDef] = &[
    field("data_type", I16),
    field("num_dimensions", I16),
    field("x_dimension", I16),
    field("y_dimension", I16),
    field("z_dimension", I16),
    field("x_offset", F32),
    field("y_offset", F32),
    field("z_offset", F32),
    field("recon_zoom", F32),
    field("scale_factor", F32),
    field("image_min", I16),
    field("image_max", I16),
    field("x_pixel_size", F32),
    field("y_pixel_size", F32),
    field("z_pixel_size", F32),
    field("frame_duration", U32),
    field("frame_start_time", U32),
    field("filter_code", I16),
    field("x_resolution", F32),
    field("y_resolution", F32),
    field("z_resolution", F32),
    field("num_r_elements", F32),
    field("num_angles", F32),
    field("z_rotation_angle", F32),
    field("decay_corr_fctr", F32),
    field("processing_code", I32),
    field("gate_duration", U32),
    field("r_wave_offset", I32),
    field("num_accepted_beats", I32),
    field("filter_cutoff_frequency", F32),
    field("filter_resolution", F32),
    field("filter_ramp_slope", F32),
    field("filter_order", I16),
    field("filter_scatter_fraction", F32),
    field("filter_scatter_slope", F32),
    field("annotation", Bytes(40)),
    field("mt_1_1", F32),
    field("mt_1_2", F32),
    field("mt_1_3", F32),
    field("mt_2_1", F32),
    field("mt_2_2", F32),
    field("mt_2_3", F32),
    field("mt_3_1", F32),
    field("mt_3_2", F32),
    field("mt_3_3", F32),
    field("rfilter_cutoff", F32),
    field("rfilter_resolution", F32),
    field("rfilter_code", I16),
    field("rfilter_order", I16),
    field("zfilter_cutoff", F32),
    field("zfilter_resolution", F32),
    field("zfilter_code", I16),
    field("zfilter_order", I16),
    field("mt_1_4", F32),
    field("mt_2_4", F32),
    field("mt_3_4", F32),
    field("scatter_type", I16),
    field("recon_type", I16),
    field("recon_views", I16),
    field("fill_cti", I16Array(87)),
    field("fill_user", I16Array(49)),
];

/// A decoded field before any text normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Bytes(Vec<u8>),
    Int(i64),
    Float(f64),
    IntList(Vec<i64>),
    FloatList(Vec<f64>),
}

impl RawValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            RawValue::Int(i) => Some(*i),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawField {
    pub name: &'static str,
    pub dtype: String,
    pub value: RawValue,
}

/// Anything that can hand over a decoded ECAT main header and per-frame sub-headers.
pub trait EcatHeaderSource {
    fn main_header(&self) -> &[RawField];
    fn subheaders(&self) -> &[Vec<RawField>];
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub matrix_id: i32,
    pub start_block: i32,
    pub end_block: i32,
    pub status: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EcatFile {
    pub main_header: Vec<RawField>,
    pub directory: Vec<DirectoryEntry>,
    pub subheaders: Vec<Vec<RawField>>,
}

impl EcatHeaderSource for EcatFile {
    fn main_header(&self) -> &[RawField] {
        &self.main_header
    }

    fn subheaders(&self) -> &[Vec<RawField>] {
        &self.subheaders
    }
}

fn invalid(msg: impl Into<String>) -> ConvertError {
    ConvertError::InvalidFormat(msg.into())
}

fn block(data: &[u8], number: i32) -> Result<&[u8]> {
    let out_of_range = || invalid(format!("block number {number} is out of range"));
    let start = number
        .checked_sub(1)
        .and_then(|n| usize::try_from(n).ok())
        .and_then(|n| n.checked_mul(BLOCK_SIZE))
        .ok_or_else(out_of_range)?;
    let end = start.checked_add(BLOCK_SIZE).ok_or_else(out_of_range)?;
    data.get(start..end)
        .ok_or_else(|| invalid(format!("file ends before block {number}")))
}

/// Decode the fields of `layout` from the start of `bytes`.
pub fn read_record(bytes: &[u8], layout: &[FieldDef]) -> Result<Vec<RawField>> {
    let needed: usize = layout.iter().map(|f| f.kind.size()).sum();
    if bytes.len() < needed {
        return Err(invalid(format!(
            "record needs {needed} bytes, only {} available",
            bytes.len()
        )));
    }

    let mut input = ByteOrdered::be(Cursor::new(bytes));
    layout
        .iter()
        .map(|def| -> std::io::Result<RawField> {
            let value = match def.kind {
                FieldKind::Bytes(n) => {
                    let mut buf = vec![0u8; n];
                    input.read_exact(&mut buf)?;
                    RawValue::Bytes(buf)
                }
                FieldKind::I16 => RawValue::Int(input.read_i16()?.into()),
                FieldKind::I32 => RawValue::Int(input.read_i32()?.into()),
                FieldKind::U32 => RawValue::Int(input.read_u32()?.into()),
                FieldKind::F32 => RawValue::Float(input.read_f32()?.into()),
                FieldKind::I16Array(n) => RawValue::IntList(
                    (0..n)
                        .map(|_| input.read_i16().map(i64::from))
                        .collect::<std::io::Result<_>>()?,
                ),
                FieldKind::F32Array(n) => RawValue::FloatList(
                    (0..n)
                        .map(|_| input.read_f32().map(f64::from))
                        .collect::<std::io::Result<_>>()?,
                ),
            };
            Ok(RawField {
                name: def.name,
                dtype: def.kind.dtype(),
                value,
            })
        })
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(|e| invalid(format!("truncated header record: {e}")))
}

/// Walk the chained directory blocks and collect every matrix entry.
pub fn read_directory(data: &[u8]) -> Result<Vec<DirectoryEntry>> {
    let mut entries = Vec::new();
    let mut current = FIRST_DIRECTORY_BLOCK;
    let max_blocks = data.len() / BLOCK_SIZE;

    for _ in 0..max_blocks {
        let words = block(data, current)?
            .chunks_exact(4)
            .map(|w| i32::from_be_bytes([w[0], w[1], w[2], w[3]]))
            .collect::<Vec<_>>();
        let next = words[1];
        let used = usize::try_from(words[3]).unwrap_or(0);

        entries.extend(
            words[4..]
                .chunks_exact(4)
                .take(used)
                .filter(|e| e[0] != 0)
                .map(|e| DirectoryEntry {
                    matrix_id: e[0],
                    start_block: e[1],
                    end_block: e[2],
                    status: e[3],
                }),
        );

        if next == FIRST_DIRECTORY_BLOCK || next <= 0 {
            return Ok(entries);
        }
        current = next;
    }
    Err(invalid("directory block chain does not terminate"))
}

impl EcatFile {
    pub fn open(path: &Path) -> Result<Self> {
        let data = fs::read(path).map_err(|e| ConvertError::io(path, e))?;
        Self::from_bytes(&data)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if !data.starts_with(MAGIC_PREFIX) {
            return Err(invalid("missing ECAT 7 magic number"));
        }
        let main_header = read_record(block(data, 1)?, MAIN_HEADER_LAYOUT)?;

        let file_type = main_header
            .iter()
            .find(|f| f.name == "file_type")
            .and_then(|f| f.value.as_int())
            .unwrap_or_default();
        if !IMAGE_FILE_TYPES.contains(&file_type) {
            return Err(invalid(format!(
                "ECAT file type {file_type} is not an image volume"
            )));
        }

        let directory = read_directory(data)?;
        let subheaders = directory
            .iter()
            .map(|entry| {
                debug!(matrix = entry.matrix_id, block = entry.start_block, "reading sub-header");
                read_record(block(data, entry.start_block)?, IMAGE_SUBHEADER_LAYOUT)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            main_header,
            directory,
            subheaders,
        })
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Offset of a named field inside a layout.
    pub fn offset_of(layout: &[FieldDef], name: &str) -> usize {
        layout
            .iter()
            .take_while(|f| f.name != name)
            .map(|f| f.kind.size())
            .sum()
    }

    /// Three blocks: main header, one directory block, one image sub-header.
    pub fn minimal_ecat(radiopharmaceutical: &[u8], frame_duration: u32) -> Vec<u8> {
        let mut data = vec![0u8; 3 * BLOCK_SIZE];
        data[..9].copy_from_slice(b"MATRIX72v");
        let at = offset_of(MAIN_HEADER_LAYOUT, "file_type");
        data[at..at + 2].copy_from_slice(&7i16.to_be_bytes());
        let at = offset_of(MAIN_HEADER_LAYOUT, "radiopharmaceutical");
        data[at..at + radiopharmaceutical.len()].copy_from_slice(radiopharmaceutical);
        let at = offset_of(MAIN_HEADER_LAYOUT, "num_frames");
        data[at..at + 2].copy_from_slice(&1i16.to_be_bytes());

        let dir = BLOCK_SIZE;
        for (i, word) in [31i32, 2, 0, 1, 16_842_753, 3, 3, 1].iter().enumerate() {
            data[dir + 4 * i..dir + 4 * i + 4].copy_from_slice(&word.to_be_bytes());
        }

        let sub = 2 * BLOCK_SIZE;
        let at = sub + offset_of(IMAGE_SUBHEADER_LAYOUT, "frame_duration");
        data[at..at + 4].copy_from_slice(&frame_duration.to_be_bytes());
        let at = sub + offset_of(IMAGE_SUBHEADER_LAYOUT, "scale_factor");
        data[at..at + 4].copy_from_slice(&0.5f32.to_be_bytes());
        data
    }
}
