//! Result types: per-file outcomes and the batch report.

use crate::document::{DocumentClass, DocumentFormat};
use crate::error::{FileError, ReasonCode, Warning};
use serde::Serialize;

/// A successfully converted buffer and what it ended up as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConvertedDocument {
    /// Encoded output. Omitted from JSON reports.
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub byte_len: u64,
    pub format: DocumentFormat,
    /// Achieved geometry; `None` when the backend never decoded the file.
    pub geometry: Option<ImageGeometry>,
    /// Whether the content was re-encoded (false for pass-through).
    pub reencoded: bool,
}

impl ConvertedDocument {
    pub fn new(
        bytes: Vec<u8>,
        format: DocumentFormat,
        geometry: Option<ImageGeometry>,
        reencoded: bool,
    ) -> Self {
        Self {
            byte_len: bytes.len() as u64,
            bytes,
            format,
            geometry,
            reencoded,
        }
    }
}

/// Pixel dimensions plus the DPI tagged in the file's metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImageGeometry {
    pub width: u32,
    pub height: u32,
    pub dpi: Option<u32>,
}

/// The result of converting one file.
///
/// A `Converted` outcome never exceeds the exam's size ceiling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConversionOutcome {
    Converted(ConvertedDocument),
    Failed { reason: ReasonCode, message: String },
}

impl ConversionOutcome {
    pub fn is_converted(&self) -> bool {
        matches!(self, ConversionOutcome::Converted(_))
    }

    pub fn converted(&self) -> Option<&ConvertedDocument> {
        match self {
            ConversionOutcome::Converted(doc) => Some(doc),
            ConversionOutcome::Failed { .. } => None,
        }
    }

    pub fn reason(&self) -> Option<ReasonCode> {
        match self {
            ConversionOutcome::Converted(_) => None,
            ConversionOutcome::Failed { reason, .. } => Some(*reason),
        }
    }
}

impl From<FileError> for ConversionOutcome {
    fn from(err: FileError) -> Self {
        ConversionOutcome::Failed {
            reason: err.reason_code(),
            message: err.to_string(),
        }
    }
}

/// Everything the batch learned about one input file.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    /// 0-based position in the batch.
    pub index: usize,
    pub filename: String,
    pub mime_type: String,
    pub input_len: u64,
    pub class: DocumentClass,
    pub warnings: Vec<Warning>,
    /// `<examName>_<documentClass>_<originalFilename>`; set only when converted.
    pub output_name: Option<String>,
    pub outcome: ConversionOutcome,
}

impl FileReport {
    pub fn is_degraded(&self) -> bool {
        self.warnings.contains(&Warning::ClassificationDegraded)
    }
}

/// Aggregate counters for one batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    pub total_files: usize,
    pub converted_files: usize,
    pub failed_files: usize,
    /// Files classified from filename keywords only.
    pub degraded_files: usize,
    pub input_bytes: u64,
    pub output_bytes: u64,
    pub total_duration_ms: u64,
}

/// The result of a whole batch, one [`FileReport`] per input in input order.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub exam_id: String,
    pub exam_name: String,
    pub files: Vec<FileReport>,
    /// Required classes no converted file covers.
    pub missing_documents: Vec<DocumentClass>,
    pub cancelled: bool,
    pub stats: BatchStats,
}

impl BatchReport {
    pub fn converted(&self) -> impl Iterator<Item = (&FileReport, &ConvertedDocument)> {
        self.files
            .iter()
            .filter_map(|f| f.outcome.converted().map(|doc| (f, doc)))
    }

    pub fn failed(&self) -> impl Iterator<Item = &FileReport> {
        self.files.iter().filter(|f| !f.outcome.is_converted())
    }
}

/// Derive the download name for a converted file.
pub fn output_name(exam_name: &str, class: DocumentClass, original_filename: &str) -> String {
    format!("{exam_name}_{}_{original_filename}", class.as_str())
}
