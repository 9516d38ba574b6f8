//! Optional pixel adjustments applied after resampling.
//!
//! Every adjustment is off in [`PipelineConfig::default`], so by default a
//! converted image differs from its source only in geometry, DPI tag and
//! encoding. When enabled:
//!
//! | Class | Adjustment |
//! |-------|------------|
//! | passport photo | brighten by `brighten_photos` |
//! | signature | contrast by `signature_contrast`, then binarize at `binarize_signatures`, then grayscale |
//!
//! Non-image documents are never decoded, so nothing here applies to them.

use crate::config::PipelineConfig;
use crate::document::DocumentClass;
use image::{DynamicImage, GrayImage, Luma};
use tracing::debug;

/// The adjustments for one render.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Adjustments {
    pub brighten: i32,
    /// Percent, as taken by [`DynamicImage::adjust_contrast`].
    pub contrast: f32,
    /// Luma above this becomes white, everything else black.
    pub threshold: Option<u8>,
    pub grayscale: bool,
}

impl Adjustments {
    /// Pick the configured adjustments that apply to `class`.
    pub fn for_class(config: &PipelineConfig, class: DocumentClass) -> Self {
        match class {
            DocumentClass::PassportPhoto => Self {
                brighten: config.brighten_photos,
                ..Self::default()
            },
            DocumentClass::Signature => Self {
                contrast: config.signature_contrast,
                threshold: config.binarize_signatures,
                grayscale: config.grayscale_signatures,
                ..Self::default()
            },
            _ => Self::default(),
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::default()
    }

    /// Apply to `img`, in the order brighten, contrast, threshold, grayscale.
    pub fn apply(&self, img: DynamicImage) -> DynamicImage {
        if self.is_identity() {
            return img;
        }
        debug!("Adjusting pixels: {self:?}");

        let mut img = img;
        if self.brighten != 0 {
            img = img.brighten(self.brighten);
        }
        if self.contrast != 0.0 {
            img = img.adjust_contrast(self.contrast);
        }
        if let Some(threshold) = self.threshold {
            let binary = binarize(&img.to_luma8(), threshold);
            img = if self.grayscale {
                DynamicImage::ImageLuma8(binary)
            } else {
                DynamicImage::ImageRgb8(DynamicImage::ImageLuma8(binary).to_rgb8())
            };
        }
        if self.grayscale && !matches!(img, DynamicImage::ImageLuma8(_)) {
            img = DynamicImage::ImageLuma8(img.to_luma8());
        }
        img
    }
}

fn binarize(luma: &GrayImage, threshold: u8) -> GrayImage {
    GrayImage::from_fn(luma.width(), luma.height(), |x, y| {
        let Luma([v]) = *luma.get_pixel(x, y);
        Luma([if v > threshold { 255 } else { 0 }])
    })
}
