//! Per-exam format contracts and the catalog that serves them.
//!
//! A [`FormatSpec`] is read-only for the whole batch: every conversion in a
//! run borrows the same spec. The built-in catalog covers the exams listed in
//! [`FormatCatalog::builtin`]; callers with other portals load their own from
//! JSON using the same camelCase shape:
//!
//! ```json
//! [{
//!   "id": "neet", "name": "NEET",
//!   "requirements": {
//!     "photoSize":     { "width": 200, "height": 230, "dpi": 200, "format": "JPEG" },
//!     "signatureSize": { "width": 140, "height": 60,  "dpi": 200, "format": "JPEG" },
//!     "documentFormats": ["PDF", "JPEG", "PNG"],
//!     "maxFileSize": 1048576,
//!     "requiredDocuments": ["passport_photo", "signature"]
//!   }
//! }]
//! ```

use crate::document::{DocumentClass, DocumentFormat};
use crate::error::ConvertError;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Output encodings a photo or signature can be converted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ImageEncoding {
    #[serde(alias = "JPG", alias = "jpeg", alias = "jpg")]
    Jpeg,
    #[serde(alias = "png")]
    Png,
}

impl ImageEncoding {
    /// Lossy encodings can trade quality for size.
    pub fn is_lossy(&self) -> bool {
        matches!(self, ImageEncoding::Jpeg)
    }

    pub fn as_document_format(&self) -> DocumentFormat {
        match self {
            ImageEncoding::Jpeg => DocumentFormat::Jpeg,
            ImageEncoding::Png => DocumentFormat::Png,
        }
    }
}

impl fmt::Display for ImageEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_document_format().label())
    }
}

/// Largest accepted target edge, in pixels. A photo or signature target
/// beyond this is a catalog mistake, and the decoded buffer alone would
/// exhaust memory.
pub const MAX_TARGET_EDGE: u32 = 10_000;

/// Target geometry and encoding for one image category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSpec {
    pub width: u32,
    pub height: u32,
    pub dpi: u32,
    pub format: ImageEncoding,
}

impl ImageSpec {
    fn check(&self, what: &str) -> Result<(), String> {
        if self.width == 0 || self.height == 0 {
            return Err(format!(
                "{what} dimensions must be positive, got {}x{}",
                self.width, self.height
            ));
        }
        if self.width > MAX_TARGET_EDGE || self.height > MAX_TARGET_EDGE {
            return Err(format!(
                "{what} dimensions must be at most {MAX_TARGET_EDGE}px per edge, got {}x{}",
                self.width, self.height
            ));
        }
        if self.dpi == 0 || self.dpi > u32::from(u16::MAX) {
            return Err(format!("{what} DPI must be 1–65535, got {}", self.dpi));
        }
        Ok(())
    }
}

/// The exam-specific contract every converted file must satisfy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormatSpec {
    pub id: String,
    /// Display name, used as the output filename prefix.
    pub name: String,
    pub photo_size: Option<ImageSpec>,
    pub signature_size: Option<ImageSpec>,
    /// Container formats accepted for non-photo documents.
    pub document_formats: Vec<DocumentFormat>,
    /// Byte ceiling applied to every output file.
    pub max_file_size: u64,
    /// Document classes a complete application needs, in display order.
    pub required_documents: Vec<DocumentClass>,
}

impl FormatSpec {
    /// Check the invariants the pipeline relies on.
    pub fn validate(&self) -> Result<(), ConvertError> {
        let invalid = |detail: String| ConvertError::InvalidSpec {
            exam: self.id.clone(),
            detail,
        };

        let photo = self
            .photo_size
            .as_ref()
            .ok_or_else(|| invalid("missing photo sub-spec".into()))?;
        let signature = self
            .signature_size
            .as_ref()
            .ok_or_else(|| invalid("missing signature sub-spec".into()))?;
        photo.check("photo").map_err(invalid)?;
        signature.check("signature").map_err(invalid)?;
        if self.max_file_size == 0 {
            return Err(invalid("max file size must be positive".into()));
        }
        Ok(())
    }

    /// The sub-spec a class is resized to, if any.
    pub fn image_spec(&self, class: DocumentClass) -> Option<&ImageSpec> {
        match class {
            DocumentClass::PassportPhoto => self.photo_size.as_ref(),
            DocumentClass::Signature => self.signature_size.as_ref(),
            _ => None,
        }
    }

    pub fn allows(&self, format: DocumentFormat) -> bool {
        self.document_formats.contains(&format)
    }

    /// Allowed document formats as a human-readable list.
    pub fn allowed_formats_label(&self) -> String {
        self.document_formats
            .iter()
            .map(|f| f.label())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Required classes not covered by `present`, in catalog order.
    pub fn missing_documents(&self, present: &[DocumentClass]) -> Vec<DocumentClass> {
        let mut missing: Vec<DocumentClass> = Vec::new();
        for class in &self.required_documents {
            if !present.contains(class) && !missing.contains(class) {
                missing.push(*class);
            }
        }
        missing
    }
}

// ── JSON wire shape ──────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequirementsWire {
    #[serde(default)]
    photo_size: Option<ImageSpec>,
    #[serde(default)]
    signature_size: Option<ImageSpec>,
    #[serde(default)]
    document_formats: Vec<DocumentFormat>,
    max_file_size: u64,
    #[serde(default)]
    required_documents: Vec<DocumentClass>,
}

#[derive(Deserialize)]
struct ExamWire {
    #[serde(default)]
    id: Option<String>,
    name: String,
    requirements: RequirementsWire,
}

impl ExamWire {
    fn into_spec(self, fallback_id: Option<&str>) -> FormatSpec {
        let id = self
            .id
            .or_else(|| fallback_id.map(str::to_string))
            .unwrap_or_else(|| self.name.to_ascii_lowercase());
        let r = self.requirements;
        FormatSpec {
            id: id.to_ascii_lowercase(),
            name: self.name,
            photo_size: r.photo_size,
            signature_size: r.signature_size,
            document_formats: r.document_formats,
            max_file_size: r.max_file_size,
            required_documents: r.required_documents,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogWire {
    List(Vec<ExamWire>),
    Map(BTreeMap<String, ExamWire>),
}

// ── Catalog ──────────────────────────────────────────────────────────────

/// A fixed set of exams keyed by lower-case identifier.
#[derive(Debug, Clone, Default)]
pub struct FormatCatalog {
    exams: BTreeMap<String, FormatSpec>,
}

static BUILTIN: Lazy<FormatCatalog> = Lazy::new(|| {
    let common = |photo: (u32, u32, u32), sig_dpi: u32, max: u64, graduation: bool| {
        let mut required = vec![
            DocumentClass::PassportPhoto,
            DocumentClass::Signature,
            DocumentClass::Marksheet10th,
            DocumentClass::Marksheet12th,
        ];
        if graduation {
            required.push(DocumentClass::GenericDocument);
        }
        required.push(DocumentClass::CategoryCertificate);
        required.push(DocumentClass::AadharCard);
        (
            ImageSpec {
                width: photo.0,
                height: photo.1,
                dpi: photo.2,
                format: ImageEncoding::Jpeg,
            },
            ImageSpec {
                width: 140,
                height: 60,
                dpi: sig_dpi,
                format: ImageEncoding::Jpeg,
            },
            max,
            required,
        )
    };

    let exams = [
        ("neet", "NEET", common((200, 230, 200), 200, 1024 * 1024, false)),
        ("jee", "JEE", common((180, 240, 300), 300, 500 * 1024, false)),
        ("upsc", "UPSC", common((300, 400, 300), 300, 2 * 1024 * 1024, true)),
        ("cat", "CAT", common((240, 320, 200), 200, 1024 * 1024, true)),
        ("gate", "GATE", common((240, 320, 200), 200, 1024 * 1024, true)),
    ];

    FormatCatalog::from_specs(exams.into_iter().map(
        |(id, name, (photo, signature, max, required))| FormatSpec {
            id: id.to_string(),
            name: name.to_string(),
            photo_size: Some(photo),
            signature_size: Some(signature),
            document_formats: vec![DocumentFormat::Pdf, DocumentFormat::Jpeg, DocumentFormat::Png],
            max_file_size: max,
            required_documents: required,
        },
    ))
});

impl FormatCatalog {
    /// The built-in exams: `neet`, `jee`, `upsc`, `cat`, `gate`.
    pub fn builtin() -> &'static FormatCatalog {
        &BUILTIN
    }

    pub fn from_specs(specs: impl IntoIterator<Item = FormatSpec>) -> Self {
        let exams = specs
            .into_iter()
            .map(|s| (s.id.to_ascii_lowercase(), s))
            .collect();
        Self { exams }
    }

    /// Parse a catalog from JSON: either an array of exams or an object keyed by id.
    pub fn from_json_str(json: &str) -> Result<Self, ConvertError> {
        let wire: CatalogWire =
            serde_json::from_str(json).map_err(|e| ConvertError::CatalogLoad {
                detail: e.to_string(),
            })?;
        let specs: Vec<FormatSpec> = match wire {
            CatalogWire::List(list) => list.into_iter().map(|e| e.into_spec(None)).collect(),
            CatalogWire::Map(map) => map
                .into_iter()
                .map(|(key, e)| e.into_spec(Some(&key)))
                .collect(),
        };
        if specs.is_empty() {
            return Err(ConvertError::CatalogLoad {
                detail: "catalog contains no exams".into(),
            });
        }
        Ok(Self::from_specs(specs))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConvertError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| ConvertError::CatalogLoad {
            detail: format!("{}: {e}", path.display()),
        })?;
        Self::from_json_str(&json)
    }

    /// Look up an exam by identifier (case-insensitive).
    pub fn lookup(&self, exam_id: &str) -> Result<&FormatSpec, ConvertError> {
        self.exams
            .get(&exam_id.trim().to_ascii_lowercase())
            .ok_or_else(|| ConvertError::UnknownExam {
                exam: exam_id.to_string(),
                known: self.ids().collect::<Vec<_>>().join(", "),
            })
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.exams.keys().map(String::as_str)
    }

    pub fn specs(&self) -> impl Iterator<Item = &FormatSpec> {
        self.exams.values()
    }

    pub fn len(&self) -> usize {
        self.exams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exams.is_empty()
    }
}

/// Look up an exam in the built-in catalog.
pub fn lookup(exam_id: &str) -> Result<&'static FormatSpec, ConvertError> {
    FormatCatalog::builtin().lookup(exam_id)
}
