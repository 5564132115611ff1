//
// cli.rs
// Pet2Bids-rs
//
// Defines the CLI surface with Clap and dispatches the DICOM and ECAT conversions.
//
// Thales Matheus Mendonça Santos - November 2025

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::dcm2niix::{ConversionOutcome, Dcm2niix, StderrPolicy, DEFAULT_PROGRAM};
use crate::dump;
use crate::layout::SpreadsheetLayout;
use crate::pipeline::{self, ConversionRequest};
use crate::writer::PARTICIPANTS_FILE;

/// Command-line interface glue code: defines the available verbs and dispatches to modules.
#[derive(Parser)]
#[command(name = "pet2bids")]
#[command(about = "Convert PET scanner output to NIfTI with BIDS metadata", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert a folder of DICOM PET images and write the BIDS sidecars
    Dicom {
        folder: PathBuf,
        /// Investigator spreadsheet (xls, xlsx, ods, csv or tsv)
        #[arg(short, long)]
        metadata: Option<PathBuf>,
        /// Output folder (defaults to the image folder). Keep unrelated JSON files out of it:
        /// when the converter skips existing outputs, the first JSON by name is taken as its sidecar
        #[arg(short, long)]
        destination: Option<PathBuf>,
        #[arg(short, long)]
        subject: Option<String>,
        #[arg(long)]
        session: Option<String>,
        /// JSON file overriding spreadsheet cell positions
        #[arg(long)]
        layout: Option<PathBuf>,
        #[arg(long, default_value = PARTICIPANTS_FILE)]
        participants: PathBuf,
        #[arg(long, env = "DCM2NIIX", default_value = DEFAULT_PROGRAM)]
        dcm2niix: String,
        /// Replace existing converter outputs
        #[arg(long)]
        overwrite: bool,
        /// Write gzip-compressed NIfTI
        #[arg(long)]
        compress: bool,
        /// Log converter diagnostics instead of failing on them
        #[arg(long)]
        tolerate_stderr: bool,
    },
    /// Read the headers of an ECAT 7 file
    Ecat {
        file: PathBuf,
        /// Print the headers
        #[arg(long)]
        show: bool,
        /// Write the headers as JSON
        #[arg(long)]
        json: Option<PathBuf>,
        #[arg(long, default_value_t = 64)]
        max_value_len: usize,
    },
}

pub fn run() -> anyhow::Result<()> {
    // Parse the raw CLI arguments once and dispatch to a subcommand handler.
    let cli = Cli::parse();

    match cli.command {
        Commands::Dicom {
            folder,
            metadata,
            destination,
            subject,
            session,
            layout,
            participants,
            dcm2niix,
            overwrite,
            compress,
            tolerate_stderr,
        } => {
            let layout = match layout {
                Some(path) => SpreadsheetLayout::from_file(&path)
                    .with_context(|| format!("Failed to load layout {}", path.display()))?,
                None => SpreadsheetLayout::default(),
            };
            let converter = Dcm2niix {
                overwrite,
                compress,
                stderr_policy: if tolerate_stderr {
                    StderrPolicy::Warn
                } else {
                    StderrPolicy::Fatal
                },
                ..Dcm2niix::new(dcm2niix)
            };
            let request = ConversionRequest {
                metadata_path: metadata,
                destination,
                subject_id: subject,
                session_id: session,
                layout,
                converter,
                participants_path: participants,
                ..ConversionRequest::new(folder)
            };

            let report = pipeline::convert(&request).with_context(|| {
                format!("Failed to convert {}", request.image_folder.display())
            })?;

            if report.outcome == ConversionOutcome::SkippedExisting {
                println!("Existing NIfTI outputs kept");
            }
            println!("Subject: sub-{}", report.subject_id);
            println!("PET sidecar: {}", report.files.pet_json.display());
            if let Some((json, tsv)) = &report.files.blood {
                println!("Blood recording: {} / {}", json.display(), tsv.display());
            }
            println!("Participants: {}", report.files.participants.display());
        }
        Commands::Ecat {
            file,
            show,
            json,
            max_value_len,
        } => {
            let headers = dump::read_headers(&file)
                .with_context(|| format!("Failed to read ECAT file {}", file.display()))?;
            if show {
                println!("{}", dump::dump_to_string(&headers, max_value_len));
            }
            if let Some(output) = &json {
                dump::write_headers_json(&headers, output)
                    .with_context(|| format!("Failed to write {}", output.display()))?;
                println!("Headers written to {}", output.display());
            }
            if !show && json.is_none() {
                println!(
                    "{}: {} frame(s)",
                    file.display(),
                    headers.subheaders.len()
                );
            }
        }
    }

    Ok(())
}
