//! Report export collaborators.
//!
//! The quiz hands a finalized [`Report`] to a [`ReportExporter`] exactly once.
//! Export failures are logged by [`export_logged`] and never reach the caller,
//! so a broken export target cannot keep the learner from seeing results.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::json::JsonGenerator;
use crate::{MarkdownGenerator, Report, ReportError, Result};

/// Base file name for exported reports.
pub const REPORT_FILE_STEM: &str = "radsim-report";

/// On-disk report format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportFormat {
    /// Pretty-printed JSON.
    Json,
    /// Markdown document.
    Markdown,
}

impl ReportFormat {
    /// File extension for the format.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Markdown => "md",
        }
    }
}

impl FromStr for ReportFormat {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "markdown" | "md" => Ok(Self::Markdown),
            other => Err(ReportError::InvalidData(format!(
                "unknown report format '{other}'"
            ))),
        }
    }
}

/// A collaborator that persists or submits finalized reports.
pub trait ReportExporter: Send + Sync {
    /// Short description of the destination, used in logs.
    fn target(&self) -> String;

    /// Exports the report.
    fn export(&self, report: &Report) -> Result<()>;
}

/// Writes reports into a directory, one file per configured format.
#[derive(Debug, Clone)]
pub struct FileExporter {
    output_dir: PathBuf,
    formats: Vec<ReportFormat>,
}

impl FileExporter {
    /// Creates an exporter writing JSON and Markdown into `output_dir`.
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            formats: vec![ReportFormat::Json, ReportFormat::Markdown],
        }
    }

    /// Restricts the exporter to the given formats.
    #[must_use]
    pub fn with_formats(mut self, formats: Vec<ReportFormat>) -> Self {
        self.formats = formats;
        self
    }

    /// Returns the output directory.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Path the given format is written to.
    #[must_use]
    pub fn path_for(&self, format: ReportFormat) -> PathBuf {
        self.output_dir
            .join(format!("{REPORT_FILE_STEM}.{}", format.extension()))
    }

    /// Writes every configured format and returns the written paths.
    pub fn write_all(&self, report: &Report) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(&self.output_dir)?;

        let mut written = Vec::with_capacity(self.formats.len());
        for format in &self.formats {
            let path = self.path_for(*format);
            match format {
                ReportFormat::Json => JsonGenerator::new(report).write_to_file(&path, true)?,
                ReportFormat::Markdown => {
                    std::fs::write(&path, MarkdownGenerator::new(report).generate())?;
                }
            }
            written.push(path);
        }
        Ok(written)
    }
}

impl ReportExporter for FileExporter {
    fn target(&self) -> String {
        self.output_dir.display().to_string()
    }

    fn export(&self, report: &Report) -> Result<()> {
        self.write_all(report)
            .map(|_| ())
            .map_err(|e| ReportError::export(self.target(), e.to_string()))
    }
}

/// Hands the report to the exporter once and logs the result.
///
/// Returns whether the export succeeded; the error itself is swallowed.
pub fn export_logged(exporter: &dyn ReportExporter, report: &Report) -> bool {
    match exporter.export(report) {
        Ok(()) => {
            info!(
                target_dir = %exporter.target(),
                passed = report.passed_count,
                total = report.total_exercises,
                "Report exported"
            );
            true
        }
        Err(e) => {
            warn!(target_dir = %exporter.target(), error = %e, "Report export failed");
            false
        }
    }
}
