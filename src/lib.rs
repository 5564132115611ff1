//
// lib.rs
// Pet2Bids-rs
//
// Exposes the crate's modules and re-exports the CLI entry point for both binary and library consumers.
//
// Thales Matheus Mendonça Santos - November 2025

// Public surface of the library: one module per conversion stage, plus the ECAT reader and the CLI.
pub mod cli;
pub mod dcm2niix;
pub mod dicom_access;
pub mod dicom_header;
pub mod dump;
pub mod ecat;
pub mod ecat_normalize;
pub mod error;
pub mod layout;
pub mod models;
pub mod pipeline;
pub mod remap;
pub mod rules;
pub mod sidecar;
pub mod spreadsheet;
pub mod writer;

pub use cli::{run as run_cli, Cli, Commands};
pub use error::{ConvertError, Result};
