//! External media services: PDF concatenation, JPEG derivatives and
//! spreadsheet output

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{AppError, AppResult};

/// Concatenates PDFs into a single document
#[cfg_attr(test, mockall::automock)]
pub trait PdfMerger: Send + Sync {
    fn merge(&self, inputs: &[PathBuf], output: &Path) -> AppResult<()>;
}

/// Produces bounded JPEG derivatives of master images
#[cfg_attr(test, mockall::automock)]
pub trait ImageDeriver: Send + Sync {
    /// Write `<out_dir>/<stem>.jpg`, skipping existing outputs, and return
    /// its path
    fn derive(&self, source: &Path, out_dir: &Path, dimension: u32) -> AppResult<PathBuf>;
}

/// Writes one spreadsheet per batch
#[cfg_attr(test, mockall::automock)]
pub trait TabularSink: Send + Sync {
    /// Write `header` and `rows` next to `stem`, returning the written path
    fn write_sheet(&self, stem: &Path, header: &[String], rows: &[Vec<Option<String>>]) -> AppResult<PathBuf>;
}

/// PDF merging through the `qpdf` command line tool
#[derive(Debug, Clone)]
pub struct QpdfMerger {
    program: String,
}

impl QpdfMerger {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into() }
    }
}

impl PdfMerger for QpdfMerger {
    fn merge(&self, inputs: &[PathBuf], output: &Path) -> AppResult<()> {
        let names: Vec<String> = inputs
            .iter()
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect();
        tracing::info!(
            "Concatenating {} to {}",
            names.join(", "),
            output.display()
        );

        let result = Command::new(&self.program)
            .arg("--empty")
            .arg("--pages")
            .args(inputs)
            .arg("--")
            .arg(output)
            .output()
            .map_err(|e| AppError::Pdf(format!("{}: {}", self.program, e)))?;

        // qpdf exits with 3 when it succeeded with warnings
        if !result.status.success() && result.status.code() != Some(3) {
            return Err(AppError::Pdf(format!(
                "exit code {:?}: {}",
                result.status.code(),
                String::from_utf8_lossy(&result.stderr).trim()
            )));
        }
        Ok(())
    }
}

/// JPEG derivatives through ImageMagick
#[derive(Debug, Clone)]
pub struct MagickDeriver {
    program: String,
}

impl MagickDeriver {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into() }
    }
}

/// Output path of a derivative for `source`
pub fn derivative_path(source: &Path, out_dir: &Path) -> AppResult<PathBuf> {
    let stem = source
        .file_stem()
        .ok_or_else(|| AppError::Image(format!("{} has no file name", source.display())))?;
    let mut name = stem.to_os_string();
    name.push(".jpg");
    Ok(out_dir.join(name))
}

impl ImageDeriver for MagickDeriver {
    fn derive(&self, source: &Path, out_dir: &Path, dimension: u32) -> AppResult<PathBuf> {
        let output = derivative_path(source, out_dir)?;
        if output.exists() {
            tracing::debug!("Derivative {} already exists", output.display());
            return Ok(output);
        }
        tracing::info!(
            "Creating derivative {} -> {}",
            source.display(),
            output.display()
        );

        let result = Command::new(&self.program)
            .arg("convert")
            .arg(source)
            .args(["-resize", &format!("{0}x{0}^>", dimension)])
            .args(["-quality", "65", "-depth", "8", "-unsharp", "1.5x1+0.7+0.02"])
            .arg(&output)
            .output()
            .map_err(|e| AppError::Image(format!("{}: {}", self.program, e)))?;

        if !result.status.success() {
            return Err(AppError::Image(format!(
                "{}: exit code {:?}: {}",
                source.display(),
                result.status.code(),
                String::from_utf8_lossy(&result.stderr).trim()
            )));
        }
        Ok(output)
    }
}

/// UTF-8 CSV spreadsheets with a byte order mark so spreadsheet tools pick up
/// the encoding
#[derive(Debug, Clone, Default)]
pub struct CsvSink;

impl TabularSink for CsvSink {
    fn write_sheet(&self, stem: &Path, header: &[String], rows: &[Vec<Option<String>>]) -> AppResult<PathBuf> {
        let path = stem.with_extension("csv");
        let mut file = File::create(&path)?;
        file.write_all("\u{feff}".as_bytes())?;

        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(header)?;
        for row in rows {
            writer.write_record(row.iter().map(|cell| cell.as_deref().unwrap_or("")))?;
        }
        writer.flush()?;
        Ok(path)
    }
}
