//! Classifier: assign a [`DocumentClass`] to an uploaded file.
//!
//! Two paths, tried in order:
//!
//! 1. **Geometry** — for files with an image extension, read the pixel size
//!    through the active [`ImageBackend`] and apply the aspect-ratio bands
//!    below. Cheap and format-agnostic.
//! 2. **Filename keywords** — when the file is not an image, the backend
//!    cannot decode, decoding fails, or the shape only says "generic
//!    document". Always produces a label, at the cost of precision; a class
//!    taken from the name is flagged as degraded.
//!
//! Classification never fails. The thresholds are kept exactly as the
//! portal-facing tool has always applied them.

use crate::document::{extension_of, DocumentClass};
use crate::pipeline::backend::ImageBackend;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

/// Extensions eligible for geometry classification.
const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "tiff"];

/// How a class was decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum ClassificationMethod {
    Geometry { width: u32, height: u32 },
    Filename,
}

/// The classifier's verdict for one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub class: DocumentClass,
    pub method: ClassificationMethod,
}

impl Classification {
    /// True when the filename fallback produced the class.
    pub fn is_degraded(&self) -> bool {
        self.method == ClassificationMethod::Filename
    }
}

/// Classify a file from its content and name.
pub fn classify(backend: &dyn ImageBackend, content: &[u8], filename: &str) -> Classification {
    let is_image_name = extension_of(filename)
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false);

    if is_image_name {
        match backend.dimensions(content) {
            Some((width, height)) if height > 0 => {
                let class = classify_geometry(width, height);
                debug!("{filename}: {width}x{height} → {class}");
                if class != DocumentClass::GenericDocument {
                    return Classification {
                        class,
                        method: ClassificationMethod::Geometry { width, height },
                    };
                }
                // Oversized photos and scans land in the generic band; a
                // keyword in the name is the only remaining evidence.
                let named = classify_filename(filename);
                if named != DocumentClass::GenericDocument {
                    warn!("{filename}: {width}x{height} is generic by shape, named {named}");
                    return Classification {
                        class: named,
                        method: ClassificationMethod::Filename,
                    };
                }
                return Classification {
                    class,
                    method: ClassificationMethod::Geometry { width, height },
                };
            }
            _ => debug!("{filename}: geometry unavailable via {} backend", backend.kind()),
        }
    }

    let mut class = classify_filename(filename);
    if content.is_empty() && class == DocumentClass::GenericDocument {
        class = DocumentClass::Unknown;
    }
    warn!("{filename}: classified from filename only → {class}");
    Classification {
        class,
        method: ClassificationMethod::Filename,
    }
}

// ── Geometry rules ───────────────────────────────────────────────────────────

/// Aspect-ratio bands, first match wins.
///
/// | Rule | Condition | Class |
/// |------|-----------|-------|
/// | 1 | `0.6 ≤ W/H ≤ 0.9` and `W < 500` | passport photo |
/// | 2 | `W/H > 2.0` and `H < 100` | signature |
/// | 3 | otherwise | generic document |
pub fn classify_geometry(width: u32, height: u32) -> DocumentClass {
    if height == 0 {
        return DocumentClass::GenericDocument;
    }
    let ratio = f64::from(width) / f64::from(height);

    if (0.6..=0.9).contains(&ratio) && width < 500 {
        DocumentClass::PassportPhoto
    } else if ratio > 2.0 && height < 100 {
        DocumentClass::Signature
    } else {
        DocumentClass::GenericDocument
    }
}

// ── Filename rules ───────────────────────────────────────────────────────────

static FILENAME_RULES: Lazy<Vec<(Regex, DocumentClass)>> = Lazy::new(|| {
    [
        (r"photo|passport", DocumentClass::PassportPhoto),
        (r"sign", DocumentClass::Signature),
        (r"aadhar|aadhaar", DocumentClass::AadharCard),
        (r"10th|ssc", DocumentClass::Marksheet10th),
        (r"12th|hsc", DocumentClass::Marksheet12th),
        (r"certificate", DocumentClass::CategoryCertificate),
    ]
    .into_iter()
    .map(|(pattern, class)| (Regex::new(pattern).unwrap(), class))
    .collect()
});

/// Keyword match on the lower-cased filename, first rule wins.
pub fn classify_filename(filename: &str) -> DocumentClass {
    let name = filename.to_lowercase();
    FILENAME_RULES
        .iter()
        .find(|(re, _)| re.is_match(&name))
        .map(|(_, class)| *class)
        .unwrap_or(DocumentClass::GenericDocument)
}
