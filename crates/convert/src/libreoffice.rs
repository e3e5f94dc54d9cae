//! LibreOffice headless conversion.

use crate::Converter;
use certgen_core::{Error, OutputFormat, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Program names tried, in order, when locating LibreOffice on `PATH`.
pub const PROGRAM_CANDIDATES: [&str; 2] = ["soffice", "libreoffice"];

/// Base name of the document handed to the converter.
const INPUT_STEM: &str = "document";

/// Converter that runs `soffice --headless --convert-to`.
///
/// Each conversion gets its own temporary directory holding the input, the
/// output and a throwaway user profile; the directory is removed when the
/// call returns, whatever the outcome. There is no timeout: a converter that
/// never exits blocks the caller.
#[derive(Debug, Clone, Default)]
pub struct LibreOffice {
    program: Option<PathBuf>,
}

impl LibreOffice {
    /// Look for LibreOffice on `PATH`.
    pub fn locate() -> Self {
        let program = PROGRAM_CANDIDATES
            .iter()
            .find_map(|name| which::which(name).ok());

        match &program {
            Some(path) => log::debug!("Found converter at {}", path.display()),
            None => log::debug!("No converter found (tried {})", PROGRAM_CANDIDATES.join(", ")),
        }

        Self { program }
    }

    /// Use a specific program instead of searching `PATH`.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: Some(program.into()),
        }
    }

    /// The program that will be run, if any.
    pub fn program(&self) -> Option<&Path> {
        self.program.as_deref()
    }
}

impl Converter for LibreOffice {
    fn is_available(&self) -> bool {
        self.program
            .as_ref()
            .is_some_and(|program| which::which(program).is_ok())
    }

    fn convert(&self, document: &[u8], target: OutputFormat) -> Result<Vec<u8>> {
        if !target.requires_conversion() {
            return Ok(document.to_vec());
        }

        let program = self.program.as_ref().ok_or_else(|| {
            Error::ConverterUnavailable(format!(
                "none of {} found on PATH",
                PROGRAM_CANDIDATES.join(", ")
            ))
        })?;

        let workdir = tempfile::Builder::new().prefix("certgen-").tempdir()?;
        let input = workdir
            .path()
            .join(INPUT_STEM)
            .with_extension(OutputFormat::Native.extension());
        fs::write(&input, document)?;

        let profile = workdir.path().join("profile");
        log::debug!(
            "Running {} --convert-to {} in {}",
            program.display(),
            target.extension(),
            workdir.path().display()
        );

        let output = Command::new(program)
            .arg(format!("-env:UserInstallation={}", file_url(&profile)))
            .arg("--headless")
            .arg("--convert-to")
            .arg(target.extension())
            .arg("--outdir")
            .arg(workdir.path())
            .arg(&input)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => {
                    Error::ConverterUnavailable(format!("{}: {}", program.display(), e))
                }
                _ => Error::ConversionFailed(format!("Failed to run {}: {}", program.display(), e)),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::ConversionFailed(format!(
                "{} exited with {}: {}",
                program.display(),
                output.status,
                stderr.trim()
            )));
        }

        let produced = input.with_extension(target.extension());
        fs::read(&produced).map_err(|e| {
            Error::ConversionFailed(format!(
                "expected output {} is missing: {}",
                produced.display(),
                e
            ))
        })
    }
}

/// `file://` URL for a local path, as LibreOffice expects for `-env:` options.
fn file_url(path: &Path) -> String {
    let path = path.to_string_lossy().replace('\\', "/");
    if path.starts_with('/') {
        format!("file://{}", path)
    } else {
        format!("file:///{}", path)
    }
}
