//! Input documents and the labels the classifier assigns to them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

/// An uploaded file, exactly as the user selected it.
///
/// Created once at selection time and never mutated. The content is shared,
/// so a clone handed to a blocking worker does not copy the bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    filename: String,
    mime_type: String,
    content: Arc<[u8]>,
}

impl RawDocument {
    pub fn new(
        filename: impl Into<String>,
        mime_type: impl Into<String>,
        content: impl Into<Vec<u8>>,
    ) -> Self {
        let content: Vec<u8> = content.into();
        Self {
            filename: filename.into(),
            mime_type: mime_type.into(),
            content: content.into(),
        }
    }

    /// Build a document whose MIME type is inferred from the filename extension.
    pub fn with_guessed_mime(filename: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        let filename = filename.into();
        let mime = mime_from_filename(&filename);
        Self::new(filename, mime, content)
    }

    /// Read a document from disk. The filename is the path's final component.
    pub fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read(path)?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::with_guessed_mime(filename, content))
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// The document's container format: declared MIME first, then magic bytes.
    pub fn detected_format(&self) -> Option<DocumentFormat> {
        DocumentFormat::from_mime(&self.mime_type).or_else(|| DocumentFormat::sniff(&self.content))
    }
}

/// The semantic category assigned to an uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentClass {
    #[serde(alias = "photo")]
    PassportPhoto,
    Signature,
    #[serde(alias = "10th_marksheet")]
    Marksheet10th,
    #[serde(alias = "12th_marksheet")]
    Marksheet12th,
    CategoryCertificate,
    #[serde(alias = "aadhaar_card")]
    AadharCard,
    #[serde(alias = "document", alias = "graduation_certificate")]
    GenericDocument,
    #[serde(alias = "unknown_document")]
    Unknown,
}

impl DocumentClass {
    pub const ALL: [DocumentClass; 8] = [
        DocumentClass::PassportPhoto,
        DocumentClass::Signature,
        DocumentClass::Marksheet10th,
        DocumentClass::Marksheet12th,
        DocumentClass::CategoryCertificate,
        DocumentClass::AadharCard,
        DocumentClass::GenericDocument,
        DocumentClass::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentClass::PassportPhoto => "passport_photo",
            DocumentClass::Signature => "signature",
            DocumentClass::Marksheet10th => "marksheet_10th",
            DocumentClass::Marksheet12th => "marksheet_12th",
            DocumentClass::CategoryCertificate => "category_certificate",
            DocumentClass::AadharCard => "aadhar_card",
            DocumentClass::GenericDocument => "generic_document",
            DocumentClass::Unknown => "unknown",
        }
    }

    /// Whether this class is resized to one of the exam's image sub-specs.
    pub fn is_resized(&self) -> bool {
        matches!(self, DocumentClass::PassportPhoto | DocumentClass::Signature)
    }
}

impl fmt::Display for DocumentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.to_ascii_lowercase()))
            .map_err(|_| format!("unknown document class '{s}'"))
    }
}

/// File container formats the pipeline recognises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DocumentFormat {
    #[serde(alias = "JPG", alias = "jpeg", alias = "jpg")]
    Jpeg,
    #[serde(alias = "png")]
    Png,
    #[serde(alias = "pdf")]
    Pdf,
    #[serde(alias = "bmp")]
    Bmp,
    #[serde(alias = "TIF", alias = "tiff", alias = "tif")]
    Tiff,
}

impl DocumentFormat {
    pub fn label(&self) -> &'static str {
        match self {
            DocumentFormat::Jpeg => "JPEG",
            DocumentFormat::Png => "PNG",
            DocumentFormat::Pdf => "PDF",
            DocumentFormat::Bmp => "BMP",
            DocumentFormat::Tiff => "TIFF",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            DocumentFormat::Jpeg => "image/jpeg",
            DocumentFormat::Png => "image/png",
            DocumentFormat::Pdf => "application/pdf",
            DocumentFormat::Bmp => "image/bmp",
            DocumentFormat::Tiff => "image/tiff",
        }
    }

    pub fn from_mime(mime: &str) -> Option<Self> {
        // Ignore parameters such as "; charset=binary".
        let essence = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        match essence.as_str() {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(DocumentFormat::Jpeg),
            "image/png" => Some(DocumentFormat::Png),
            "application/pdf" => Some(DocumentFormat::Pdf),
            "image/bmp" | "image/x-ms-bmp" => Some(DocumentFormat::Bmp),
            "image/tiff" => Some(DocumentFormat::Tiff),
            _ => None,
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(DocumentFormat::Jpeg),
            "png" => Some(DocumentFormat::Png),
            "pdf" => Some(DocumentFormat::Pdf),
            "bmp" => Some(DocumentFormat::Bmp),
            "tif" | "tiff" => Some(DocumentFormat::Tiff),
            _ => None,
        }
    }

    /// Identify a format from its leading magic bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"%PDF") {
            Some(DocumentFormat::Pdf)
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(DocumentFormat::Jpeg)
        } else if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(DocumentFormat::Png)
        } else if bytes.starts_with(b"BM") {
            Some(DocumentFormat::Bmp)
        } else if bytes.starts_with(b"II*\0") || bytes.starts_with(b"MM\0*") {
            Some(DocumentFormat::Tiff)
        } else {
            None
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Lower-cased extension of `filename`, without the dot.
pub fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
}

/// Best-effort MIME type for a filename; `application/octet-stream` when unknown.
pub fn mime_from_filename(filename: &str) -> &'static str {
    extension_of(filename)
        .and_then(|ext| DocumentFormat::from_extension(&ext))
        .map(|f| f.mime_type())
        .unwrap_or("application/octet-stream")
}
