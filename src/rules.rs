//
// rules.rs
// Pet2Bids-rs
//
// Declarative table describing where every BIDS PET field comes from and how its value is shaped.
//
// Thales Matheus Mendonça Santos - November 2025

use Extraction::{Convert, Identity, Substring};

/// A fixed multiplicative conversion between two units.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct UnitConversion {
    pub from: &'static str,
    pub to: &'static str,
    pub factor: f64,
}

impl UnitConversion {
    pub fn apply(&self, value: f64) -> f64 {
        value * self.factor
    }
}

pub const BQ_TO_MBQ: UnitConversion = UnitConversion {
    from: "Bq",
    to: "MBq",
    factor: 1e-6,
};

pub const UCI_TO_GBQ: UnitConversion = UnitConversion {
    from: "uCi",
    to: "GBq",
    factor: 0.000037,
};

pub const MINUTES_TO_SECONDS: UnitConversion = UnitConversion {
    from: "min",
    to: "s",
    factor: 60.0,
};

pub const UCI_PER_ML_TO_KBQ_PER_ML: UnitConversion = UnitConversion {
    from: "uCi/mL",
    to: "kBq/mL",
    factor: 37.0,
};

pub const FRACTION_IDENTITY: UnitConversion = UnitConversion {
    from: "unitless",
    to: "unitless",
    factor: 1.0,
};

pub const UNITS: &str = "Bq/mL";
pub const INJECTED_RADIOACTIVITY_UNITS: &str = "MBq";
pub const INJECTED_MASS_UNITS: &str = "nmol";
pub const MOLAR_ACTIVITY_UNITS: &str = "GBq/nmol";
pub const NOT_APPLICABLE: &str = "n/a";
pub const MODE_OF_ADMINISTRATION: &str = "bolus";
pub const TIME_ZERO: &str = "10:15:14";
pub const SCAN_START: i64 = 61;
pub const INJECTION_START: i64 = 0;
pub const ACQUISITION_MODE: &str = "list mode";
pub const IMAGE_DECAY_CORRECTED: bool = true;
pub const IMAGE_DECAY_CORRECTION_TIME: i64 = -61;
pub const RECON_PARAMETER_LABELS: &[&str] = &["lower energy threshold", "upper energy threshold"];
pub const RECON_PARAMETER_UNITS: &[&str] = &["keV", "keV"];
pub const RECON_FILTER_SIZE: i64 = 0;

/// Character range `[start, end)`; `end: None` runs to the end of the string.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct CharRange {
    pub start: usize,
    pub end: Option<usize>,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Constant {
    Text(&'static str),
    Integer(i64),
    Flag(bool),
    TextList(&'static [&'static str]),
}

/// Spreadsheet cells the rules can refer to; positions come from the layout.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SheetCell {
    InjectedMassPerKg,
    SubjectWeight,
    MolarActivity,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Derivation {
    /// Dose per kilogram times body weight.
    InjectedMass,
    /// Cumulative frame durations shifted to start at zero.
    FrameTimesStart,
    /// Frame durations truncated to whole seconds.
    FrameDurations,
    /// Lowest and highest energy window limit.
    EnergyWindow,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Source {
    Sidecar(&'static str),
    Dicom(&'static str),
    Sheet(SheetCell),
    Constant(Constant),
    Derived(Derivation),
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Extraction {
    Identity,
    Substring(CharRange),
    Convert(UnitConversion),
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Requirement {
    Always,
    /// Only produced, and then required, when a metadata spreadsheet was supplied.
    WithSpreadsheet,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FieldRule {
    pub field: &'static str,
    pub source: Source,
    pub extraction: Extraction,
    pub requirement: Requirement,
}

const fn rule(field: &'static str, source: Source, extraction: Extraction) -> FieldRule {
    FieldRule {
        field,
        source,
        extraction,
        requirement: Requirement::Always,
    }
}

const fn sheet_rule(field: &'static str, source: Source, extraction: Extraction) -> FieldRule {
    FieldRule {
        field,
        source,
        extraction,
        requirement: Requirement::WithSpreadsheet,
    }
}

const fn constant(field: &'static str, value: Constant) -> FieldRule {
    rule(field, Source::Constant(value), Extraction::Identity)
}

pub const TRACER_NAME_RANGE: CharRange = CharRange {
    start: 4,
    end: None,
};

pub const TRACER_RADIONUCLIDE_RANGE: CharRange = CharRange {
    start: 0,
    end: Some(3),
};

/// BIDS PET sidecar fields, in output order.
pub const PET_FIELD_RULES: &[FieldRule] = &[
    rule("Manufacturer", Source::Sidecar("Manufacturer"), Identity),
    rule(
        "ManufacturersModelName",
        Source::Sidecar("ManufacturersModelName"),
        Identity,
    ),
    constant("Units", Constant::Text(UNITS)),
    rule(
        "TracerName",
        Source::Sidecar("Radiopharmaceutical"),
        Substring(TRACER_NAME_RANGE),
    ),
    rule(
        "TracerRadionuclide",
        Source::Sidecar("Radiopharmaceutical"),
        Substring(TRACER_RADIONUCLIDE_RANGE),
    ),
    rule(
        "InjectedRadioactivity",
        Source::Sidecar("RadionuclideTotalDose"),
        Convert(BQ_TO_MBQ),
    ),
    constant(
        "InjectedRadioactivityUnits",
        Constant::Text(INJECTED_RADIOACTIVITY_UNITS),
    ),
    sheet_rule(
        "InjectedMass",
        Source::Derived(Derivation::InjectedMass),
        Identity,
    ),
    sheet_rule(
        "InjectedMassUnits",
        Source::Constant(Constant::Text(INJECTED_MASS_UNITS)),
        Identity,
    ),
    sheet_rule(
        "MolarActivity",
        Source::Sheet(SheetCell::MolarActivity),
        Convert(UCI_TO_GBQ),
    ),
    sheet_rule(
        "MolarActivityUnits",
        Source::Constant(Constant::Text(MOLAR_ACTIVITY_UNITS)),
        Identity,
    ),
    constant("SpecificRadioactivity", Constant::Text(NOT_APPLICABLE)),
    constant("SpecificRadioactivityUnits", Constant::Text(NOT_APPLICABLE)),
    constant(
        "ModeOfAdministration",
        Constant::Text(MODE_OF_ADMINISTRATION),
    ),
    constant("TimeZero", Constant::Text(TIME_ZERO)),
    constant("ScanStart", Constant::Integer(SCAN_START)),
    constant("InjectionStart", Constant::Integer(INJECTION_START)),
    rule(
        "FrameTimesStart",
        Source::Derived(Derivation::FrameTimesStart),
        Identity,
    ),
    rule(
        "FrameDuration",
        Source::Derived(Derivation::FrameDurations),
        Identity,
    ),
    constant("AcquisitionMode", Constant::Text(ACQUISITION_MODE)),
    constant("ImageDecayCorrected", Constant::Flag(IMAGE_DECAY_CORRECTED)),
    constant(
        "ImageDecayCorrectionTime",
        Constant::Integer(IMAGE_DECAY_CORRECTION_TIME),
    ),
    rule(
        "ReconMethodName",
        Source::Dicom("ReconstructionMethod"),
        Identity,
    ),
    constant(
        "ReconMethodParameterLabels",
        Constant::TextList(RECON_PARAMETER_LABELS),
    ),
    constant(
        "ReconMethodParameterUnits",
        Constant::TextList(RECON_PARAMETER_UNITS),
    ),
    rule(
        "ReconMethodParameterValues",
        Source::Derived(Derivation::EnergyWindow),
        Identity,
    ),
    rule("ReconFilterType", Source::Dicom("ConvolutionKernel"), Identity),
    constant("ReconFilterSize", Constant::Integer(RECON_FILTER_SIZE)),
    rule(
        "AttenuationCorrection",
        Source::Dicom("AttenuationCorrectionMethod"),
        Identity,
    ),
    rule(
        "DecayCorrectionFactor",
        Source::Sidecar("DecayFactor"),
        Identity,
    ),
];

/// Sidecar key holding per-frame durations in seconds.
pub const FRAME_DURATION_KEY: &str = "FrameDuration";

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BloodMeasure {
    Time,
    Plasma,
    WholeBlood,
    ParentFraction,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct BloodColumnRule {
    pub name: &'static str,
    pub description: &'static str,
    pub measure: BloodMeasure,
    pub conversion: UnitConversion,
}

/// Columns of the manual blood recording, in output order.
pub const BLOOD_COLUMN_RULES: &[BloodColumnRule] = &[
    BloodColumnRule {
        name: "time",
        description: "Time in relation to time zero defined by the _pet.json",
        measure: BloodMeasure::Time,
        conversion: MINUTES_TO_SECONDS,
    },
    BloodColumnRule {
        name: "plasma_radioactivity",
        description: "Radioactivity in plasma samples",
        measure: BloodMeasure::Plasma,
        conversion: UCI_PER_ML_TO_KBQ_PER_ML,
    },
    BloodColumnRule {
        name: "whole_blood_radioactivity",
        description: "Radioactivity in whole blood samples",
        measure: BloodMeasure::WholeBlood,
        conversion: UCI_PER_ML_TO_KBQ_PER_ML,
    },
    BloodColumnRule {
        name: "metabolite_parent_fraction",
        description: "Parent fraction of the radiotracer",
        measure: BloodMeasure::ParentFraction,
        conversion: FRACTION_IDENTITY,
    },
];
