//! Converter: bring one classified document in line with the exam's contract.
//!
//! * Passport photos and signatures are handed to the active
//!   [`ImageBackend`] with the matching sub-spec (exact width × height, DPI
//!   tag, target encoding, size ceiling).
//! * Everything else passes through unresized: its format must be in the
//!   exam's allow-list and its size under the ceiling.
//!
//! Whatever the path, a `Converted` outcome is re-checked against the
//! ceiling before it leaves this module.

use crate::catalog::FormatSpec;
use crate::config::PipelineConfig;
use crate::document::{DocumentClass, DocumentFormat, RawDocument};
use crate::error::FileError;
use crate::output::{ConversionOutcome, ConvertedDocument};
use crate::pipeline::backend::{ImageBackend, RenderTarget};
use crate::pipeline::enhance::Adjustments;
use tracing::{debug, warn};

/// Per-file conversion over a fixed backend and configuration.
#[derive(Clone, Copy)]
pub struct Converter<'a> {
    backend: &'a dyn ImageBackend,
    config: &'a PipelineConfig,
}

impl<'a> Converter<'a> {
    pub fn new(backend: &'a dyn ImageBackend, config: &'a PipelineConfig) -> Self {
        Self { backend, config }
    }

    /// Convert `doc` as `class` under `spec`. Never panics; every failure is
    /// a `Failed` outcome.
    pub fn convert(
        &self,
        doc: &RawDocument,
        class: DocumentClass,
        spec: &FormatSpec,
    ) -> ConversionOutcome {
        match self.try_convert(doc, class, spec) {
            Ok(converted) => ConversionOutcome::Converted(converted),
            Err(e) => {
                warn!("{}: {e}", doc.filename());
                e.into()
            }
        }
    }

    fn try_convert(
        &self,
        doc: &RawDocument,
        class: DocumentClass,
        spec: &FormatSpec,
    ) -> Result<ConvertedDocument, FileError> {
        if doc.is_empty() {
            return Err(FileError::EmptyInput);
        }

        let converted = match spec.image_spec(class) {
            Some(image_spec) => {
                let target = RenderTarget {
                    spec: image_spec,
                    max_bytes: spec.max_file_size,
                    quality: &self.config.quality,
                    adjust: Adjustments::for_class(self.config, class),
                };
                self.backend.render(doc.content(), &target)?
            }
            None => pass_through_document(doc, spec)?,
        };

        if converted.byte_len > spec.max_file_size {
            return Err(FileError::TooLarge {
                size: converted.byte_len,
                limit: spec.max_file_size,
            });
        }
        Ok(converted)
    }
}

/// Non-photo documents: check format and size, emit unchanged.
fn pass_through_document(
    doc: &RawDocument,
    spec: &FormatSpec,
) -> Result<ConvertedDocument, FileError> {
    let format = document_format(doc, spec)?;
    if !spec.allows(format) {
        return Err(FileError::UnsupportedFormat {
            format: format.label().into(),
            allowed: spec.allowed_formats_label(),
        });
    }

    let len = doc.len() as u64;
    if len > spec.max_file_size {
        return Err(FileError::TooLarge {
            size: len,
            limit: spec.max_file_size,
        });
    }

    debug!("{}: {format} document passed through ({len} bytes)", doc.filename());
    Ok(ConvertedDocument::new(
        doc.content().to_vec(),
        format,
        None,
        false,
    ))
}

/// The declared MIME type decides; content is sniffed only when the upload
/// carried no useful MIME type.
fn document_format(doc: &RawDocument, spec: &FormatSpec) -> Result<DocumentFormat, FileError> {
    let mime = doc.mime_type().trim();
    if let Some(format) = DocumentFormat::from_mime(mime) {
        return Ok(format);
    }
    if !mime.is_empty() && !mime.eq_ignore_ascii_case("application/octet-stream") {
        return Err(FileError::UnsupportedFormat {
            format: mime.to_string(),
            allowed: spec.allowed_formats_label(),
        });
    }
    DocumentFormat::sniff(doc.content()).ok_or_else(|| FileError::Unsupported {
        detail: "unrecognised document content".into(),
    })
}
