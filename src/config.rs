//! Configuration types for a conversion batch.
//!
//! All pipeline behaviour is controlled through [`PipelineConfig`], built via
//! its [`PipelineConfigBuilder`]. The format contract itself lives in
//! [`crate::catalog::FormatSpec`]; this struct only holds knobs that are
//! independent of the exam (backend choice, encoder quality policy, optional
//! pixel adjustments).

use crate::error::ConvertError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Configuration for a conversion batch.
///
/// # Example
/// ```rust
/// use exam_convert::{BackendKind, PipelineConfig};
///
/// let config = PipelineConfig::builder()
///     .backend(BackendKind::FullDecode)
///     .jpeg_quality(85)
///     .min_jpeg_quality(50)
///     .build()
///     .unwrap();
/// assert_eq!(config.quality.initial, 85);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Which image backend the pipeline is built with. Default: `FullDecode`.
    ///
    /// `PassThrough` never decodes: classification falls back to filename
    /// keywords and files are emitted unchanged, subject to the size and
    /// format checks.
    pub backend: BackendKind,

    /// JPEG quality ladder used to meet the size ceiling.
    pub quality: QualityPolicy,

    /// Convert signatures to grayscale before encoding. Default: false.
    pub grayscale_signatures: bool,

    /// Luma threshold for signatures: above it becomes white, the rest black.
    /// Default: `None` (off). 128 gives the classic black-ink-on-white look.
    pub binarize_signatures: Option<u8>,

    /// Contrast boost for signatures, in percent, applied before
    /// binarizing. Default: 0.0 (off).
    pub signature_contrast: f32,

    /// Brightness offset added to every channel of passport photos
    /// (-255..=255). Default: 0 (off).
    pub brighten_photos: i32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            quality: QualityPolicy::default(),
            grayscale_signatures: false,
            binarize_signatures: None,
            signature_contrast: 0.0,
            brighten_photos: 0,
        }
    }
}

impl PipelineConfig {
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn backend(mut self, backend: BackendKind) -> Self {
        self.config.backend = backend;
        self
    }

    pub fn jpeg_quality(mut self, q: u8) -> Self {
        self.config.quality.initial = q.clamp(1, 100);
        self
    }

    pub fn min_jpeg_quality(mut self, q: u8) -> Self {
        self.config.quality.floor = q.clamp(1, 100);
        self
    }

    pub fn quality_step(mut self, step: u8) -> Self {
        self.config.quality.step = step.max(1);
        self
    }

    pub fn grayscale_signatures(mut self, v: bool) -> Self {
        self.config.grayscale_signatures = v;
        self
    }

    pub fn binarize_signatures(mut self, threshold: Option<u8>) -> Self {
        self.config.binarize_signatures = threshold;
        self
    }

    pub fn signature_contrast(mut self, percent: f32) -> Self {
        self.config.signature_contrast = percent;
        self
    }

    pub fn brighten_photos(mut self, offset: i32) -> Self {
        self.config.brighten_photos = offset;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, ConvertError> {
        let q = &self.config.quality;
        if q.floor > q.initial {
            return Err(ConvertError::InvalidConfig(format!(
                "minimum JPEG quality ({}) exceeds initial quality ({})",
                q.floor, q.initial
            )));
        }
        if !(-255..=255).contains(&self.config.brighten_photos) {
            return Err(ConvertError::InvalidConfig(format!(
                "photo brightness offset must be within -255..=255, got {}",
                self.config.brighten_photos
            )));
        }
        if !self.config.signature_contrast.is_finite() {
            return Err(ConvertError::InvalidConfig(
                "signature contrast must be a finite number".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// The two interchangeable image backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// Decode, resample to the target geometry, tag DPI, re-encode. (default)
    #[default]
    FullDecode,
    /// No decoding capability: emit the input unchanged.
    PassThrough,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BackendKind::FullDecode => "full-decode",
            BackendKind::PassThrough => "pass-through",
        })
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "full-decode" | "full" => Ok(BackendKind::FullDecode),
            "pass-through" | "passthrough" => Ok(BackendKind::PassThrough),
            other => Err(format!("unknown backend '{other}'")),
        }
    }
}

/// JPEG quality ladder: start at `initial`, step down by `step` while the
/// output exceeds the ceiling, never below `floor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityPolicy {
    pub initial: u8,
    pub floor: u8,
    pub step: u8,
}

impl Default for QualityPolicy {
    fn default() -> Self {
        Self {
            initial: 90,
            floor: 40,
            step: 10,
        }
    }
}

impl QualityPolicy {
    /// Qualities to try, highest first. The floor is always the last rung.
    pub fn ladder(&self) -> Vec<u8> {
        let mut rungs = Vec::new();
        let mut q = self.initial.max(self.floor);
        loop {
            rungs.push(q);
            if q <= self.floor {
                break;
            }
            q = q.saturating_sub(self.step.max(1)).max(self.floor);
        }
        rungs
    }
}
