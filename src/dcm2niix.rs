//
// dcm2niix.rs
// Pet2Bids-rs
//
// Runs the external dcm2niix converter and classifies its exit status and output streams.
//
// Thales Matheus Mendonça Santos - November 2025

use std::path::Path;
use std::process::{Command, Stdio};

use tracing::{info, warn};

use crate::error::{ConvertError, Result};

/// dcm2niix prints this when `-w 0` makes it leave an earlier output in place.
pub const SKIP_EXISTING_MARKER: &str = "Skipping existing file named";

pub const DEFAULT_PROGRAM: &str = "dcm2niix";

/// What to do with text on the converter's error stream when nothing else went wrong.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum StderrPolicy {
    /// Any diagnostic text fails the conversion.
    #[default]
    Fatal,
    /// Diagnostic text is logged and the conversion proceeds.
    Warn,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ConversionOutcome {
    Converted,
    /// Outputs from an earlier run were left untouched.
    SkippedExisting,
    /// Succeeded, but the error stream carried text that the policy tolerated.
    ConvertedWithWarnings(String),
}

#[derive(Debug, Clone)]
pub struct Dcm2niix {
    pub program: String,
    pub overwrite: bool,
    pub compress: bool,
    pub stderr_policy: StderrPolicy,
}

impl Default for Dcm2niix {
    fn default() -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            overwrite: false,
            compress: false,
            stderr_policy: StderrPolicy::Fatal,
        }
    }
}

impl Dcm2niix {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    /// Probe the tool with `-h` so a missing binary is reported before any work starts.
    pub fn preflight(&self) -> Result<()> {
        let found = Command::new(&self.program)
            .arg("-h")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false);
        if found {
            Ok(())
        } else {
            Err(ConvertError::ToolNotFound {
                tool: self.program.clone(),
            })
        }
    }

    pub fn args(&self, input: &Path, output_dir: &Path) -> Vec<std::ffi::OsString> {
        vec![
            "-w".into(),
            (if self.overwrite { "1" } else { "0" }).into(),
            "-z".into(),
            (if self.compress { "y" } else { "n" }).into(),
            "-o".into(),
            output_dir.as_os_str().to_owned(),
            input.as_os_str().to_owned(),
        ]
    }

    pub fn run(&self, input: &Path, output_dir: &Path) -> Result<ConversionOutcome> {
        info!(
            program = %self.program,
            input = %input.display(),
            output = %output_dir.display(),
            "running image conversion"
        );
        let output = Command::new(&self.program)
            .args(self.args(input, output_dir))
            .output()
            .map_err(|_| ConvertError::ToolNotFound {
                tool: self.program.clone(),
            })?;

        let outcome = classify(
            output.status.code(),
            &String::from_utf8_lossy(&output.stdout),
            &String::from_utf8_lossy(&output.stderr),
            self.stderr_policy,
        )?;
        if let ConversionOutcome::ConvertedWithWarnings(text) = &outcome {
            warn!(diagnostics = %text, "converter wrote to its error stream");
        }
        Ok(outcome)
    }
}

/// Decide whether a finished converter run succeeded.
///
/// `code` is `None` when the process was killed by a signal.
pub fn classify(
    code: Option<i32>,
    stdout: &str,
    stderr: &str,
    policy: StderrPolicy,
) -> Result<ConversionOutcome> {
    let skipped = stdout.contains(SKIP_EXISTING_MARKER) || stderr.contains(SKIP_EXISTING_MARKER);
    let diagnostics = stderr
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.contains(SKIP_EXISTING_MARKER))
        .collect::<Vec<_>>()
        .join("\n");

    if code != Some(0) && !skipped {
        let detail = if diagnostics.is_empty() {
            stdout.trim().to_string()
        } else {
            diagnostics
        };
        return Err(ConvertError::ConversionFailed {
            code,
            diagnostics: detail,
        });
    }

    if !diagnostics.is_empty() {
        return match policy {
            StderrPolicy::Fatal => Err(ConvertError::ConversionFailed { code, diagnostics }),
            StderrPolicy::Warn => Ok(ConversionOutcome::ConvertedWithWarnings(diagnostics)),
        };
    }

    Ok(if skipped {
        ConversionOutcome::SkippedExisting
    } else {
        ConversionOutcome::Converted
    })
}
