//! # exam-convert
//!
//! Classify exam-application uploads and convert passport photos and
//! signatures to an exam portal's exact format contract.
//!
//! ## Why this crate?
//!
//! Application portals reject uploads that are a few pixels off, tagged with
//! the wrong DPI, or a few kilobytes over the limit, and every exam uses a
//! different contract. This crate works out what each upload is (photo,
//! signature, marksheet, certificate, ...) and brings it in line with the
//! chosen exam's [`FormatSpec`]: exact width × height, DPI written into the
//! file's metadata, the right encoding, and a hard byte ceiling. One bad file
//! never costs the rest of the batch.
//!
//! ## Pipeline Overview
//!
//! ```text
//! files + exam id
//!  │
//!  ├─ 1. Lookup    exam id → FormatSpec (built-in or JSON catalog)
//!  ├─ 2. Classify  image geometry, falling back to filename keywords
//!  ├─ 3. Convert   photo/signature → resample, opt-in enhance, tag DPI,
//!  │               encode under ceiling;
//!  │               other documents → allow-list + size check, pass through
//!  ├─ 4. Format    derive <examName>_<class>_<originalFilename>
//!  └─ 5. Report    one outcome per file + stats + missing documents
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use exam_convert::{lookup, progress_channel, Pipeline, PipelineConfig, RawDocument};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let spec = lookup("neet")?;
//!     let files = vec![
//!         RawDocument::from_path("photo1.jpg")?,
//!         RawDocument::from_path("signature.png")?,
//!     ];
//!     let (sink, _events) = progress_channel();
//!     let report = Pipeline::new(PipelineConfig::default())
//!         .run(&files, spec, &sink, None)
//!         .await?;
//!     eprintln!("{}/{} converted", report.stats.converted_files, report.stats.total_files);
//!     exam_convert::convert_to_dir(&report, "out").await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `exam-convert` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! exam-convert = { version = "0.1", default-features = false }
//! ```
//!
//! ## Backends
//!
//! | Backend | Decodes | Classification | Photos / signatures |
//! |---------|---------|----------------|---------------------|
//! | `full-decode`  | yes | geometry, then filename | resampled + re-encoded |
//! | `pass-through` | no  | filename only (degraded) | emitted unchanged if already compliant |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod catalog;
pub mod config;
pub mod document;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{convert_to_dir, CancelFlag, Pipeline};
pub use catalog::{lookup, FormatCatalog, FormatSpec, ImageEncoding, ImageSpec};
pub use config::{BackendKind, PipelineConfig, PipelineConfigBuilder, QualityPolicy};
pub use document::{DocumentClass, DocumentFormat, RawDocument};
pub use error::{ConvertError, FileError, ReasonCode, Warning};
pub use output::{
    BatchReport, BatchStats, ConversionOutcome, ConvertedDocument, FileReport, ImageGeometry,
};
pub use pipeline::backend::{FullDecodeBackend, ImageBackend, PassThroughBackend};
pub use pipeline::classify::{Classification, ClassificationMethod};
pub use pipeline::encode::read_dpi;
pub use progress::{
    progress_channel, BatchProgress, ChannelProgressSink, NoopProgressSink, ProgressSink, Stage,
};
pub use stream::{run_stream, ReportStream};
