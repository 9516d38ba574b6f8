//! Error types for the exam-convert library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ConvertError`] — **Fatal**: the batch cannot start at all (empty
//!   batch, malformed format spec, unknown exam, bad configuration).
//!   Returned as `Err(ConvertError)` from the top-level `run*` functions and
//!   reported once, never per file.
//!
//! * [`FileError`] — **Non-fatal**: a single file could not be converted
//!   (zero bytes, undecodable, format not allowed, cannot meet the size
//!   ceiling). Stored inside [`crate::output::ConversionOutcome::Failed`] so
//!   one bad upload never costs the user the rest of the batch.
//!
//! A third, softer signal, [`Warning::ClassificationDegraded`], marks files
//! whose class came from the filename fallback rather than image geometry.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the exam-convert library.
///
/// File-level failures use [`FileError`] and are stored in
/// [`crate::output::FileReport`] rather than propagated here.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── Batch errors ──────────────────────────────────────────────────────
    /// `run()` was called with no files.
    #[error("Batch is empty: select at least one file to convert")]
    EmptyBatch,

    /// The format spec is missing a required sub-spec or carries
    /// non-positive dimensions, DPI or size ceiling.
    #[error("Format spec for exam '{exam}' is malformed: {detail}")]
    InvalidSpec { exam: String, detail: String },

    // ── Catalog errors ────────────────────────────────────────────────────
    /// The exam identifier is not in the catalog.
    #[error("Unknown exam '{exam}'. Known exams: {known}")]
    UnknownExam { exam: String, known: String },

    /// A catalog file could not be read or parsed.
    #[error("Failed to load format catalog: {detail}")]
    CatalogLoad { detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write a converted output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Machine-readable failure reason attached to a failed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    EmptyInput,
    Unsupported,
    UnsupportedFormat,
    TooLarge,
    Cancelled,
    Internal,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::EmptyInput => "empty_input",
            ReasonCode::Unsupported => "unsupported",
            ReasonCode::UnsupportedFormat => "unsupported_format",
            ReasonCode::TooLarge => "too_large",
            ReasonCode::Cancelled => "cancelled",
            ReasonCode::Internal => "internal",
        }
    }
}

/// A non-fatal error for a single file.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum FileError {
    /// The file has zero bytes.
    #[error("File is empty")]
    EmptyInput,

    /// The content is not a decodable image (or not a recognised document).
    #[error("Unsupported content: {detail}")]
    Unsupported { detail: String },

    /// The document's format is not in the exam's allow-list.
    #[error("Format {format} is not accepted for this exam (allowed: {allowed})")]
    UnsupportedFormat { format: String, allowed: String },

    /// The output cannot be brought under the exam's size ceiling.
    #[error("Output is {size} bytes, exceeding the {limit}-byte limit")]
    TooLarge { size: u64, limit: u64 },

    /// The batch was cancelled before this file was started.
    #[error("Batch cancelled before this file was processed")]
    Cancelled,

    /// The worker converting this file died (e.g. a decoder panic).
    #[error("Conversion task failed: {detail}")]
    Internal { detail: String },
}

impl FileError {
    /// The reason code recorded in a failed outcome.
    pub fn reason_code(&self) -> ReasonCode {
        match self {
            FileError::EmptyInput => ReasonCode::EmptyInput,
            FileError::Unsupported { .. } => ReasonCode::Unsupported,
            FileError::UnsupportedFormat { .. } => ReasonCode::UnsupportedFormat,
            FileError::TooLarge { .. } => ReasonCode::TooLarge,
            FileError::Cancelled => ReasonCode::Cancelled,
            FileError::Internal { .. } => ReasonCode::Internal,
        }
    }
}

/// Non-error conditions worth surfacing to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Warning {
    /// The class came from filename keywords, not image geometry.
    ClassificationDegraded,
}
