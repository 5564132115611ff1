//
// common/mod.rs
// Pet2Bids-rs
//
// Fixture builders shared by the integration tests: a small PET DICOM instance and a converter sidecar.
//
// Thales Matheus Mendonça Santos - November 2025

use std::path::{Path, PathBuf};

use dicom::core::value::DataSetSequence;
use dicom::core::{DataElement, PrimitiveValue, VR};
use dicom::dictionary_std::{tags, StandardDataDictionary};
use dicom::object::{FileDicomObject, FileMetaTableBuilder, InMemDicomObject};
use dicom::transfer_syntax::entries::EXPLICIT_VR_LITTLE_ENDIAN;
use serde_json::{json, Map, Value};
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

const PET_IMAGE_STORAGE: &str = "1.2.840.10008.5.1.4.1.1.128";

fn text(tag: dicom::core::Tag, vr: VR, value: &str) -> DataElement<InMemDicomObject> {
    DataElement::new(tag, vr, PrimitiveValue::from(value))
}

/// Write a PET instance with the attributes the converter reads into `dir/name`.
pub fn write_pet_dicom(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);

    let mut obj = InMemDicomObject::new_empty_with_dict(StandardDataDictionary);
    obj.put(text(tags::PATIENT_NAME, VR::PN, "Doe^Jane"));
    obj.put(text(tags::PATIENT_ID, VR::LO, "PET-042"));
    obj.put(text(tags::PATIENT_SEX, VR::CS, "F"));
    obj.put(text(tags::PATIENT_WEIGHT, VR::DS, "71.5"));
    obj.put(text(tags::MODALITY, VR::CS, "PT"));
    obj.put(text(tags::SOP_CLASS_UID, VR::UI, PET_IMAGE_STORAGE));
    obj.put(text(tags::SOP_INSTANCE_UID, VR::UI, "1.2.826.0.1.3680043.2.1125.7"));
    obj.put(text(tags::RECONSTRUCTION_METHOD, VR::LO, "OSEM3D 4i21s"));
    obj.put(text(tags::CONVOLUTION_KERNEL, VR::SH, "XYZGAUSSIAN4.00"));
    obj.put(text(
        tags::ATTENUATION_CORRECTION_METHOD,
        VR::LO,
        "measured,AC_CT",
    ));
    let window = InMemDicomObject::from_element_iter([
        text(tags::ENERGY_WINDOW_LOWER_LIMIT, VR::DS, "435"),
        text(tags::ENERGY_WINDOW_UPPER_LIMIT, VR::DS, "650"),
    ]);
    obj.put(DataElement::new(
        tags::ENERGY_WINDOW_RANGE_SEQUENCE,
        VR::SQ,
        DataSetSequence::from(vec![window]),
    ));

    let meta = FileMetaTableBuilder::new()
        .transfer_syntax(EXPLICIT_VR_LITTLE_ENDIAN.uid())
        .media_storage_sop_class_uid(PET_IMAGE_STORAGE)
        .media_storage_sop_instance_uid("1.2.826.0.1.3680043.2.1125.7")
        .build()
        .expect("meta");

    let mut file_obj = FileDicomObject::new_empty_with_dict_and_meta(StandardDataDictionary, meta);
    for elem in obj {
        file_obj.put(elem);
    }
    file_obj.write_to_file(&path).expect("write test dicom");
    path
}

/// A converter sidecar as dcm2niix writes it for a four-frame raclopride scan.
pub fn raclopride_sidecar() -> Map<String, Value> {
    match json!({
        "Modality": "PT",
        "Manufacturer": "Siemens",
        "ManufacturersModelName": "Biograph_mMR",
        "Radiopharmaceutical": "11C-Raclopride",
        "RadionuclideTotalDose": 370000000,
        "FrameDuration": [30.7, 30, 60.2, 120],
        "DecayFactor": [1.01, 1.02, 1.04, 1.09],
        "ConversionSoftware": "dcm2niix"
    }) {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

/// Mimics dcm2niix: answers `-h`, writes a sidecar into the `-o` folder, and reports
/// existing outputs the way the real tool does when `-w 0` is given.
#[cfg(unix)]
#[allow(dead_code)]
pub fn write_fake_converter(dir: &Path, sidecar: &str) -> String {
    let script = format!(
        r#"#!/bin/sh
if [ "$1" = "-h" ]; then
  exit 0
fi
out=""
while [ $# -gt 0 ]; do
  if [ "$1" = "-o" ]; then
    out="$2"
    shift
  fi
  shift
done
if [ -f "$out/scan_pet.json" ]; then
  echo "Skipping existing file named $out/scan_pet.nii"
  exit 1
fi
cat > "$out/scan_pet.json" <<'EOF'
{sidecar}
EOF
echo "Convert 4 DICOM as $out/scan_pet"
"#
    );
    let path = dir.join("fake-dcm2niix");
    std::fs::write(&path, script).expect("write script");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).expect("chmod");
    path.to_string_lossy().into_owned()
}
