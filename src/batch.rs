//! Batch orchestration: classify → convert → name, one file at a time.
//!
//! ## Why sequential?
//!
//! Every conversion holds a full decoded pixel buffer, and progress events
//! must arrive in a deterministic, non-decreasing order. Files are therefore
//! processed strictly one after another. Decoding, resampling and encoding
//! are CPU-bound, so each file's classify and convert steps run on tokio's
//! blocking pool via `spawn_blocking`; the async worker only sequences files
//! and emits progress. A caller can therefore redraw a display or flip a
//! [`CancelFlag`] while a file converts; a file already in flight always
//! runs to completion.
//!
//! ## Failure isolation
//!
//! Only two conditions abort a batch, and both are checked before the loop
//! starts: an empty batch and a malformed [`FormatSpec`]. Everything that
//! goes wrong inside the loop is a [`crate::FileError`] recorded on that
//! file's [`FileReport`], so every input yields exactly one outcome. A panic
//! inside a backend surfaces as a `JoinError` and is recorded as
//! [`FileError::Internal`] for that file only.

use crate::catalog::FormatSpec;
use crate::config::PipelineConfig;
use crate::document::{DocumentClass, RawDocument};
use crate::error::{ConvertError, FileError, Warning};
use crate::output::{output_name, BatchReport, BatchStats, ConversionOutcome, FileReport};
use crate::pipeline::backend::{backend_for, ImageBackend};
use crate::pipeline::classify::{classify, Classification};
use crate::pipeline::convert::Converter;
use crate::progress::{BatchProgress, NoopProgressSink, ProgressSink, Stage};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

// ── Cancellation ─────────────────────────────────────────────────────────

/// Shared flag asking a running batch to stop at the next file boundary.
///
/// Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ── Pipeline context ─────────────────────────────────────────────────────

/// An explicitly constructed conversion context.
///
/// Holds the configuration and the image backend chosen for it. Nothing is
/// global: independent pipelines (e.g. one per test) never share state.
///
/// # Example
/// ```rust,no_run
/// use exam_convert::{lookup, NoopProgressSink, Pipeline, PipelineConfig, RawDocument};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let pipeline = Pipeline::new(PipelineConfig::default());
/// let files = vec![RawDocument::from_path("photo1.jpg")?];
/// let report = pipeline
///     .run(&files, lookup("neet")?, &NoopProgressSink, None)
///     .await?;
/// for (file, doc) in report.converted() {
///     println!("{} → {} bytes", file.filename, doc.byte_len);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    backend: Arc<dyn ImageBackend>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("backend", &self.backend.kind())
            .finish()
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

impl Pipeline {
    /// Build a pipeline with the backend named in `config`.
    pub fn new(config: PipelineConfig) -> Self {
        let backend = backend_for(config.backend);
        Self { config, backend }
    }

    /// Build a pipeline around a caller-supplied backend.
    ///
    /// `config.backend` is ignored; the injected backend wins.
    pub fn with_backend(config: PipelineConfig, backend: Arc<dyn ImageBackend>) -> Self {
        Self { config, backend }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn backend(&self) -> &dyn ImageBackend {
        self.backend.as_ref()
    }

    /// Classify a single document with this pipeline's backend.
    pub fn classify(&self, doc: &RawDocument) -> Classification {
        classify(self.backend.as_ref(), doc.content(), doc.filename())
    }

    /// Convert a single, already classified document.
    pub fn convert(
        &self,
        doc: &RawDocument,
        class: DocumentClass,
        spec: &FormatSpec,
    ) -> ConversionOutcome {
        Converter::new(self.backend.as_ref(), &self.config).convert(doc, class, spec)
    }

    /// Run the whole per-file sequence for one document, emitting the
    /// analyzing / converting / formatting events at `percent`.
    ///
    /// Classification and conversion run on the blocking pool. A panic in
    /// either becomes a [`FileError::Internal`] outcome for this file.
    pub async fn process_file(
        &self,
        index: usize,
        doc: &RawDocument,
        spec: &FormatSpec,
        sink: &dyn ProgressSink,
        percent: f64,
    ) -> FileReport {
        let filename = doc.filename();

        sink.emit(BatchProgress::new(filename, percent, Stage::Analyzing));
        let classified = self.off_thread(doc, |p, d| p.classify(d)).await;
        let class = classified
            .as_ref()
            .map_or(DocumentClass::Unknown, |c| c.class);
        let mut warnings = Vec::new();
        if classified.as_ref().is_ok_and(Classification::is_degraded) {
            warnings.push(Warning::ClassificationDegraded);
        }

        sink.emit(BatchProgress::new(filename, percent, Stage::Converting));
        let outcome = match classified {
            Ok(_) => {
                let spec = spec.clone();
                self.off_thread(doc, move |p, d| p.convert(d, class, &spec))
                    .await
                    .unwrap_or_else(ConversionOutcome::from)
            }
            Err(e) => e.into(),
        };

        sink.emit(BatchProgress::new(filename, percent, Stage::Formatting));
        let output_name = outcome
            .is_converted()
            .then(|| output_name(&spec.name, class, filename));

        match &outcome {
            ConversionOutcome::Converted(converted) => debug!(
                "[{index}] {filename}: {} → {} ({} bytes)",
                class, converted.format, converted.byte_len
            ),
            ConversionOutcome::Failed { reason, message } => warn!(
                "[{index}] {filename}: failed ({}): {message}",
                reason.as_str()
            ),
        }

        FileReport {
            index,
            filename: filename.to_string(),
            mime_type: doc.mime_type().to_string(),
            input_len: doc.len() as u64,
            class,
            warnings,
            output_name,
            outcome,
        }
    }

    /// Run `work` against this pipeline and `doc` on the blocking pool.
    async fn off_thread<T, F>(&self, doc: &RawDocument, work: F) -> Result<T, FileError>
    where
        T: Send + 'static,
        F: FnOnce(&Pipeline, &RawDocument) -> T + Send + 'static,
    {
        let pipeline = self.clone();
        let doc = doc.clone();
        tokio::task::spawn_blocking(move || work(&pipeline, &doc))
            .await
            .map_err(|e| FileError::Internal {
                detail: e.to_string(),
            })
    }

    /// Convert a batch of files against `spec`.
    ///
    /// # Returns
    /// `Ok(BatchReport)` with exactly one [`FileReport`] per input, in input
    /// order, even when every file failed.
    ///
    /// # Errors
    /// Returns `Err(ConvertError)` only when the batch cannot start:
    /// - `files` is empty
    /// - `spec` is missing a sub-spec or carries non-positive values
    pub async fn run(
        &self,
        files: &[RawDocument],
        spec: &FormatSpec,
        sink: &dyn ProgressSink,
        cancel: Option<&CancelFlag>,
    ) -> Result<BatchReport, ConvertError> {
        let start = Instant::now();
        if files.is_empty() {
            return Err(ConvertError::EmptyBatch);
        }
        spec.validate()?;

        let total = files.len();
        info!(
            "Starting batch: {} files for {} ({} backend)",
            total,
            spec.name,
            self.backend.kind()
        );

        let mut reports = Vec::with_capacity(total);
        let mut cancelled = false;
        for (index, doc) in files.iter().enumerate() {
            if !cancelled && cancel.is_some_and(CancelFlag::is_cancelled) {
                info!("Batch cancelled after {index}/{total} files");
                cancelled = true;
            }
            if cancelled {
                reports.push(cancelled_report(index, doc));
                continue;
            }

            let percent = index as f64 / total as f64 * 100.0;
            reports.push(self.process_file(index, doc, spec, sink, percent).await);
        }

        let last = files.last().map(RawDocument::filename).unwrap_or_default();
        sink.emit(BatchProgress::new(last, 100.0, Stage::Completed));

        let report = finish_report(spec, reports, cancelled, start);
        info!(
            "Batch complete: {}/{} converted, {} failed, {}ms",
            report.stats.converted_files,
            report.stats.total_files,
            report.stats.failed_files,
            report.stats.total_duration_ms
        );
        Ok(report)
    }

    /// Synchronous wrapper around [`Pipeline::run`] with no progress sink.
    ///
    /// Creates a temporary tokio runtime internally; do not call from inside
    /// an async context.
    pub fn run_sync(
        &self,
        files: &[RawDocument],
        spec: &FormatSpec,
    ) -> Result<BatchReport, ConvertError> {
        tokio::runtime::Runtime::new()
            .map_err(|e| ConvertError::Internal(format!("Failed to create tokio runtime: {e}")))?
            .block_on(self.run(files, spec, &NoopProgressSink, None))
    }
}

fn cancelled_report(index: usize, doc: &RawDocument) -> FileReport {
    FileReport {
        index,
        filename: doc.filename().to_string(),
        mime_type: doc.mime_type().to_string(),
        input_len: doc.len() as u64,
        class: DocumentClass::Unknown,
        warnings: Vec::new(),
        output_name: None,
        outcome: FileError::Cancelled.into(),
    }
}

fn finish_report(
    spec: &FormatSpec,
    files: Vec<FileReport>,
    cancelled: bool,
    start: Instant,
) -> BatchReport {
    let converted: Vec<DocumentClass> = files
        .iter()
        .filter(|f| f.outcome.is_converted())
        .map(|f| f.class)
        .collect();

    let stats = BatchStats {
        total_files: files.len(),
        converted_files: converted.len(),
        failed_files: files.len() - converted.len(),
        degraded_files: files.iter().filter(|f| f.is_degraded()).count(),
        input_bytes: files.iter().map(|f| f.input_len).sum(),
        output_bytes: files
            .iter()
            .filter_map(|f| f.outcome.converted())
            .map(|d| d.byte_len)
            .sum(),
        total_duration_ms: start.elapsed().as_millis() as u64,
    };

    BatchReport {
        exam_id: spec.id.clone(),
        exam_name: spec.name.clone(),
        missing_documents: spec.missing_documents(&converted),
        files,
        cancelled,
        stats,
    }
}

// ── Writing outputs ──────────────────────────────────────────────────────

/// Write every converted file in `report` into `dir` under its output name.
///
/// Each file is written to a temporary sibling and renamed into place so a
/// crash never leaves a truncated output behind. Two files that map to the
/// same name (e.g. `a/photo.jpg` and `b/photo.jpg`) are kept apart with a
/// numeric suffix: `NEET_passport_photo_photo_2.jpg`. Returns the written
/// paths in batch order.
pub async fn convert_to_dir(
    report: &BatchReport,
    dir: impl AsRef<Path>,
) -> Result<Vec<PathBuf>, ConvertError> {
    let dir = dir.as_ref();
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| ConvertError::OutputWriteFailed {
            path: dir.to_path_buf(),
            source: e,
        })?;

    let mut used = HashSet::new();
    let mut written = Vec::new();
    for (file, doc) in report.converted() {
        let Some(name) = file.output_name.as_deref() else {
            continue;
        };
        // Only the final component: an uploaded name must not escape `dir`.
        let Some(leaf) = Path::new(name).file_name() else {
            warn!("Skipping {}: output name has no file component", file.filename);
            continue;
        };
        let leaf = leaf.to_string_lossy();
        let unique = unique_name(&leaf, &mut used);
        if unique != leaf {
            warn!("{}: {leaf} already written in this batch, using {unique}", file.filename);
        }
        let path = dir.join(&unique);
        let tmp_path = dir.join(format!(".{unique}.tmp"));

        tokio::fs::write(&tmp_path, &doc.bytes)
            .await
            .map_err(|e| ConvertError::OutputWriteFailed {
                path: path.clone(),
                source: e,
            })?;
        tokio::fs::rename(&tmp_path, &path)
            .await
            .map_err(|e| ConvertError::OutputWriteFailed {
                path: path.clone(),
                source: e,
            })?;

        debug!("Wrote {}", path.display());
        written.push(path);
    }
    Ok(written)
}

/// `name`, or `stem_N.ext` with the smallest N ≥ 2 not yet in `used`.
fn unique_name(name: &str, used: &mut HashSet<String>) -> String {
    if used.insert(name.to_string()) {
        return name.to_string();
    }
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    };
    (2u64..)
        .map(|n| match ext {
            Some(ext) => format!("{stem}_{n}.{ext}"),
            None => format!("{stem}_{n}"),
        })
        .find(|candidate| used.insert(candidate.clone()))
        .unwrap_or_else(|| name.to_string())
}
