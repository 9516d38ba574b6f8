//! Image backends: the capability seam between the pipeline and pixel work.
//!
//! Two interchangeable strategies sit behind [`ImageBackend`]:
//!
//! * [`FullDecodeBackend`] — decodes, resamples to the exact target size,
//!   tags DPI and re-encodes under the size ceiling.
//! * [`PassThroughBackend`] — no decoding capability. Geometry is unknown
//!   (the classifier falls back to filename keywords) and images are emitted
//!   byte-for-byte, provided they are already in the target encoding and
//!   under the ceiling.
//!
//! The backend is chosen once when a [`crate::Pipeline`] is built and
//! injected from there; capability is never re-checked per call.

use crate::catalog::ImageSpec;
use crate::config::{BackendKind, QualityPolicy};
use crate::document::DocumentFormat;
use crate::error::FileError;
use crate::output::{ConvertedDocument, ImageGeometry};
use crate::pipeline::enhance::Adjustments;
use crate::pipeline::{encode, resample};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// What a photo or signature must become.
#[derive(Debug, Clone, Copy)]
pub struct RenderTarget<'a> {
    pub spec: &'a ImageSpec,
    pub max_bytes: u64,
    pub quality: &'a QualityPolicy,
    /// Applied after resampling; identity unless configured.
    pub adjust: Adjustments,
}

/// Capability interface for decoding and re-encoding images.
pub trait ImageBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Pixel dimensions of `content`, if this backend can read them.
    fn dimensions(&self, content: &[u8]) -> Option<(u32, u32)>;

    /// Bring an image to `target`, or explain why it cannot be.
    fn render(&self, content: &[u8], target: &RenderTarget<'_>)
        -> Result<ConvertedDocument, FileError>;
}

/// Instantiate the backend for `kind`.
pub fn backend_for(kind: BackendKind) -> Arc<dyn ImageBackend> {
    match kind {
        BackendKind::FullDecode => Arc::new(FullDecodeBackend),
        BackendKind::PassThrough => Arc::new(PassThroughBackend),
    }
}

// ── Full decode ──────────────────────────────────────────────────────────────

/// Real resize/encode via the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct FullDecodeBackend;

impl ImageBackend for FullDecodeBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::FullDecode
    }

    fn dimensions(&self, content: &[u8]) -> Option<(u32, u32)> {
        encode::read_dimensions(content)
    }

    #[instrument(skip_all, fields(len = content.len(), width = target.spec.width, height = target.spec.height))]
    fn render(
        &self,
        content: &[u8],
        target: &RenderTarget<'_>,
    ) -> Result<ConvertedDocument, FileError> {
        let spec = target.spec;
        let source = image::load_from_memory(content).map_err(|e| FileError::Unsupported {
            detail: format!("not a decodable image: {e}"),
        })?;
        debug!("Decoded {}x{}", source.width(), source.height());

        let resized = resample::resample(&source, spec.width, spec.height);
        drop(source);
        let resized = target.adjust.apply(resized);

        let encoded = encode::encode_within(
            &resized,
            spec.format,
            spec.dpi,
            target.max_bytes,
            target.quality,
        )?;
        info!(
            "Encoded {}x{} {} @{}dpi → {} bytes{}",
            spec.width,
            spec.height,
            spec.format,
            spec.dpi,
            encoded.bytes.len(),
            encoded
                .quality
                .map(|q| format!(" (q={q})"))
                .unwrap_or_default()
        );

        Ok(ConvertedDocument::new(
            encoded.bytes,
            spec.format.as_document_format(),
            Some(ImageGeometry {
                width: spec.width,
                height: spec.height,
                dpi: Some(spec.dpi),
            }),
            true,
        ))
    }
}

// ── Pass-through ─────────────────────────────────────────────────────────────

/// Emits the input unchanged; never decodes.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThroughBackend;

impl ImageBackend for PassThroughBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::PassThrough
    }

    fn dimensions(&self, _content: &[u8]) -> Option<(u32, u32)> {
        None
    }

    fn render(
        &self,
        content: &[u8],
        target: &RenderTarget<'_>,
    ) -> Result<ConvertedDocument, FileError> {
        let wanted = target.spec.format.as_document_format();
        let format = DocumentFormat::sniff(content).ok_or_else(|| FileError::Unsupported {
            detail: "unrecognised image content".into(),
        })?;
        if format != wanted {
            return Err(FileError::UnsupportedFormat {
                format: format.label().into(),
                allowed: wanted.label().into(),
            });
        }
        let len = content.len() as u64;
        if len > target.max_bytes {
            return Err(FileError::TooLarge {
                size: len,
                limit: target.max_bytes,
            });
        }
        debug!("Passing {len} bytes through unchanged");
        Ok(ConvertedDocument::new(content.to_vec(), format, None, false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ImageEncoding;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn encoded(w: u32, h: u32, format: ImageFormat) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([90, 120, 150])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), format).unwrap();
        buf
    }

    fn target<'a>(spec: &'a ImageSpec, quality: &'a QualityPolicy, max: u64) -> RenderTarget<'a> {
        RenderTarget {
            spec,
            max_bytes: max,
            quality,
            adjust: Adjustments::default(),
        }
    }

    const PHOTO: ImageSpec = ImageSpec {
        width: 200,
        height: 230,
        dpi: 200,
        format: ImageEncoding::Jpeg,
    };

    #[test]
    fn full_decode_hits_exact_geometry_and_dpi() {
        let q = QualityPolicy::default();
        let out = FullDecodeBackend
            .render(&encoded(600, 690, ImageFormat::Png), &target(&PHOTO, &q, 1 << 20))
            .unwrap();
        assert_eq!(out.format, DocumentFormat::Jpeg);
        assert!(out.reencoded);
        assert_eq!(encode::read_dimensions(&out.bytes), Some((200, 230)));
        assert_eq!(encode::read_dpi(&out.bytes), Some(200));
        assert_eq!(out.byte_len, out.bytes.len() as u64);
    }

    #[test]
    fn full_decode_rejects_garbage() {
        let q = QualityPolicy::default();
        let err = FullDecodeBackend
            .render(b"definitely not an image", &target(&PHOTO, &q, 1 << 20))
            .unwrap_err();
        assert!(matches!(err, FileError::Unsupported { .. }));
    }

    #[test]
    fn grayscale_signature_output() {
        let q = QualityPolicy::default();
        let spec = ImageSpec {
            width: 140,
            height: 60,
            dpi: 300,
            format: ImageEncoding::Png,
        };
        let mut t = target(&spec, &q, 1 << 20);
        t.adjust.grayscale = true;
        let out = FullDecodeBackend
            .render(&encoded(700, 300, ImageFormat::Jpeg), &t)
            .unwrap();
        let decoded = image::load_from_memory(&out.bytes).unwrap();
        assert_eq!(decoded.color(), image::ColorType::L8);
    }

    #[test]
    fn binarized_signature_keeps_geometry_and_dpi() {
        let q = QualityPolicy::default();
        let spec = ImageSpec {
            width: 140,
            height: 60,
            dpi: 200,
            format: ImageEncoding::Png,
        };
        let mut t = target(&spec, &q, 1 << 20);
        t.adjust.contrast = 20.0;
        t.adjust.threshold = Some(128);
        let out = FullDecodeBackend
            .render(&encoded(700, 300, ImageFormat::Png), &t)
            .unwrap();
        assert_eq!(encode::read_dimensions(&out.bytes), Some((140, 60)));
        assert_eq!(encode::read_dpi(&out.bytes), Some(200));
        let decoded = image::load_from_memory(&out.bytes).unwrap().to_rgb8();
        assert!(decoded
            .pixels()
            .all(|p| p.0 == [0, 0, 0] || p.0 == [255, 255, 255]));
    }

    #[test]
    fn pass_through_returns_input_unchanged() {
        let q = QualityPolicy::default();
        let input = encoded(300, 300, ImageFormat::Jpeg);
        let out = PassThroughBackend
            .render(&input, &target(&PHOTO, &q, 1 << 20))
            .unwrap();
        assert_eq!(out.bytes, input);
        assert!(!out.reencoded);
        assert!(out.geometry.is_none());
    }

    #[test]
    fn pass_through_still_enforces_format_and_size() {
        let q = QualityPolicy::default();
        let png = encoded(10, 10, ImageFormat::Png);
        let err = PassThroughBackend
            .render(&png, &target(&PHOTO, &q, 1 << 20))
            .unwrap_err();
        assert!(matches!(err, FileError::UnsupportedFormat { .. }));

        let jpeg = encoded(10, 10, ImageFormat::Jpeg);
        let err = PassThroughBackend
            .render(&jpeg, &target(&PHOTO, &q, 10))
            .unwrap_err();
        assert!(matches!(err, FileError::TooLarge { limit: 10, .. }));
    }

    #[test]
    fn backend_for_selects_kind() {
        assert_eq!(backend_for(BackendKind::FullDecode).kind(), BackendKind::FullDecode);
        assert_eq!(backend_for(BackendKind::PassThrough).kind(), BackendKind::PassThrough);
        assert!(backend_for(BackendKind::PassThrough)
            .dimensions(&encoded(4, 4, ImageFormat::Png))
            .is_none());
    }
}
