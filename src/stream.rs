//! Streaming batch API: emit each file's report as soon as it is done.
//!
//! ## Why stream?
//!
//! A large batch of scans takes a while. A `Stream`-based API lets callers
//! show results immediately or write each converted file to disk as it
//! arrives instead of holding the whole batch in memory.
//!
//! Unlike [`crate::Pipeline::run`], which returns only after every file has
//! been processed, [`run_stream`] yields [`FileReport`] items one by one, in
//! input order. Dropping the stream abandons the batch at the next file
//! boundary; the file in flight is never interrupted.

use crate::batch::Pipeline;
use crate::catalog::FormatSpec;
use crate::document::RawDocument;
use crate::error::ConvertError;
use crate::output::FileReport;
use crate::progress::{BatchProgress, ProgressSink, Stage};
use futures::stream::{self, Stream};
use std::pin::Pin;
use tracing::info;

/// A boxed stream of per-file reports.
pub type ReportStream<'a> = Pin<Box<dyn Stream<Item = FileReport> + Send + 'a>>;

/// Convert a batch, yielding one [`FileReport`] per input in input order.
///
/// Progress events are the same as for [`Pipeline::run`], including the
/// single final `completed` event once the last report has been yielded.
///
/// # Errors
/// Returns `Err(ConvertError)` up front for an empty batch or a malformed
/// spec; nothing is processed in that case.
///
/// # Example
/// ```rust,no_run
/// use exam_convert::{lookup, run_stream, NoopProgressSink, Pipeline, RawDocument};
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let pipeline = Pipeline::default();
/// let files = vec![RawDocument::from_path("sign.png")?];
/// let mut reports = run_stream(&pipeline, &files, lookup("jee")?, &NoopProgressSink)?;
/// while let Some(report) = reports.next().await {
///     println!("{}: {:?}", report.filename, report.outcome.reason());
/// }
/// # Ok(())
/// # }
/// ```
pub fn run_stream<'a>(
    pipeline: &'a Pipeline,
    files: &'a [RawDocument],
    spec: &'a FormatSpec,
    sink: &'a dyn ProgressSink,
) -> Result<ReportStream<'a>, ConvertError> {
    if files.is_empty() {
        return Err(ConvertError::EmptyBatch);
    }
    spec.validate()?;

    let total = files.len();
    info!("Starting streaming batch: {} files for {}", total, spec.name);

    let s = stream::unfold(0usize, move |index| async move {
        let Some(doc) = files.get(index) else {
            let last = files.last().map(RawDocument::filename).unwrap_or_default();
            sink.emit(BatchProgress::new(last, 100.0, Stage::Completed));
            return None;
        };
        let percent = index as f64 / total as f64 * 100.0;
        let report = pipeline.process_file(index, doc, spec, sink, percent).await;
        Some((report, index + 1))
    });

    Ok(Box::pin(s))
}
