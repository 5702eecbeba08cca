//! Documents and their processing lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::core::errors::StoreError;

/// Identifier of a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub i64);

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a document.
///
/// The only edges are `uploaded -> processing` (the claim) and
/// `processing -> ocr_completed | error`. Both of the latter are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    /// Waiting for a worker.
    Uploaded,
    /// Claimed by a worker.
    Processing,
    /// Pipeline finished and results were committed.
    OcrCompleted,
    /// Processing failed.
    Error,
}

impl DocumentStatus {
    /// Stable string form used in storage and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Uploaded => "uploaded",
            DocumentStatus::Processing => "processing",
            DocumentStatus::OcrCompleted => "ocr_completed",
            DocumentStatus::Error => "error",
        }
    }

    /// Whether no automatic transition leaves this status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, DocumentStatus::OcrCompleted | DocumentStatus::Error)
    }

    /// Whether `self -> next` is an edge of the lifecycle.
    pub fn can_transition_to(&self, next: DocumentStatus) -> bool {
        matches!(
            (self, next),
            (DocumentStatus::Uploaded, DocumentStatus::Processing)
                | (DocumentStatus::Processing, DocumentStatus::OcrCompleted)
                | (DocumentStatus::Processing, DocumentStatus::Error)
        )
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uploaded" => Ok(DocumentStatus::Uploaded),
            "processing" => Ok(DocumentStatus::Processing),
            "ocr_completed" => Ok(DocumentStatus::OcrCompleted),
            "error" => Ok(DocumentStatus::Error),
            other => Err(StoreError::UnknownStatus(other.to_string())),
        }
    }
}

/// How the source file has to be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    /// A single raster image (PNG, JPEG, TIFF, BMP).
    Raster,
    /// A paginated document (PDF); only the first page is used.
    Paginated,
}

impl DocumentKind {
    /// Infers the kind from the file extension.
    ///
    /// Returns `None` for formats the loader does not accept.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(DocumentKind::Paginated),
            "png" | "jpg" | "jpeg" | "tif" | "tiff" | "bmp" => Some(DocumentKind::Raster),
            _ => None,
        }
    }

    /// Stable string form used in storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Raster => "raster",
            DocumentKind::Paginated => "paginated",
        }
    }

    /// Infers the kind from the leading bytes of the file.
    pub fn sniff(bytes: &[u8]) -> Self {
        if is_pdf_bytes(bytes) {
            DocumentKind::Paginated
        } else {
            DocumentKind::Raster
        }
    }
}

impl FromStr for DocumentKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "raster" => Ok(DocumentKind::Raster),
            "paginated" => Ok(DocumentKind::Paginated),
            other => Err(StoreError::UnknownKind(other.to_string())),
        }
    }
}

/// Check if bytes represent a PDF file (magic bytes: %PDF)
pub fn is_pdf_bytes(bytes: &[u8]) -> bool {
    bytes.len() >= 4 && &bytes[0..4] == b"%PDF"
}

/// A submitted document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    /// Original file name as submitted.
    pub filename: String,
    /// Where the source bytes live.
    pub source_path: String,
    pub kind: DocumentKind,
    pub status: DocumentStatus,
    pub created_at: DateTime<Utc>,
}

/// Fields needed to register a document.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDocument {
    pub filename: String,
    pub source_path: String,
    pub kind: DocumentKind,
}

impl NewDocument {
    /// Builds a submission for `path`, inferring the kind from its extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let kind = DocumentKind::from_path(path)?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Some(Self {
            filename,
            source_path: path.to_string_lossy().into_owned(),
            kind,
        })
    }
}
