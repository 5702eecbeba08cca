//! Core error types for the document pipeline and the job coordinator.
//!
//! The pipeline stages report [`PipelineError`], the collaborators at the edges report
//! their own error enums ([`StoreError`], [`ArtifactError`], [`RecognitionError`]) and the
//! coordinator folds everything into [`JobError`], which mirrors the failure classes the
//! worker has to tell apart: load failures, critical failures, lost claims and failures
//! of the polling cycle itself.

use crate::domain::{DocumentId, DocumentStatus};
use thiserror::Error;

/// Boxed error used where a failure can come from any collaborator.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Enum representing the stages a document goes through.
///
/// Used to attach stage context to errors and log records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    /// Reading and decoding the source file.
    Load,
    /// Background estimation, division and binarization.
    BackgroundNormalization,
    /// Border, ruling-line and speckle removal.
    StructuralCleaning,
    /// Coarse 0°/90° orientation decision.
    Orientation,
    /// Fine skew estimation and correction.
    Deskew,
    /// Line band detection and cropping.
    Segmentation,
    /// Per-line recognition.
    Recognition,
    /// Reading or writing records and artifacts.
    Persistence,
    /// Looking for the next pending document.
    Polling,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineStage::Load => write!(f, "load"),
            PipelineStage::BackgroundNormalization => write!(f, "background normalization"),
            PipelineStage::StructuralCleaning => write!(f, "structural cleaning"),
            PipelineStage::Orientation => write!(f, "orientation"),
            PipelineStage::Deskew => write!(f, "deskew"),
            PipelineStage::Segmentation => write!(f, "segmentation"),
            PipelineStage::Recognition => write!(f, "recognition"),
            PipelineStage::Persistence => write!(f, "persistence"),
            PipelineStage::Polling => write!(f, "polling"),
        }
    }
}

/// Errors raised while turning a source file into line crops.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The source file is missing, unreadable, corrupt or has no pages.
    #[error("failed to load '{path}': {reason}")]
    Load {
        /// Path of the source file.
        path: String,
        /// Short reason string.
        reason: String,
    },

    /// Error from the image codec.
    #[error("image decode")]
    Image(#[from] image::ImageError),

    /// A stage rejected its input.
    #[error("{stage} failed: {context}")]
    Processing {
        /// The stage where the error occurred.
        stage: PipelineStage,
        /// Additional context about the error.
        context: String,
    },
}

impl PipelineError {
    /// Creates a load error for `path`.
    pub fn load(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Load {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates a processing error for `stage`.
    pub fn processing(stage: PipelineStage, context: impl Into<String>) -> Self {
        Self::Processing {
            stage,
            context: context.into(),
        }
    }

    /// Returns true when the error means the source could not be loaded.
    pub fn is_load_error(&self) -> bool {
        matches!(self, Self::Load { .. } | Self::Image(_))
    }
}

/// A single line could not be recognized.
#[derive(Error, Debug)]
pub enum RecognitionError {
    /// The recognizer could not be reached or timed out.
    #[error("recognizer transport: {0}")]
    Transport(String),

    /// The recognizer answered with a non-success status.
    #[error("recognizer returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },

    /// The recognizer answered with something that is not a recognition.
    #[error("malformed recognizer response: {0}")]
    Malformed(String),

    /// The line image could not be encoded for the recognizer.
    #[error("line encoding")]
    Encode(#[from] image::ImageError),

    /// Recognizer specific failure.
    #[error("{0}")]
    Engine(String),
}

/// Errors raised by a [`crate::store::DocumentStore`].
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite failure.
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    /// The referenced record does not exist.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Entity kind, e.g. "document".
        entity: &'static str,
        /// Record identifier.
        id: i64,
    },

    /// The requested status change is not an edge of the lifecycle.
    #[error("invalid status transition {from} -> {to}")]
    InvalidTransition {
        /// Expected current status.
        from: DocumentStatus,
        /// Requested next status.
        to: DocumentStatus,
    },

    /// A stored status string could not be parsed.
    #[error("unknown document status '{0}'")]
    UnknownStatus(String),

    /// A stored document kind could not be parsed.
    #[error("unknown document kind '{0}'")]
    UnknownKind(String),

    /// The in-memory store lock was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    Poisoned,
}

/// Errors raised by a [`crate::artifacts::ArtifactStore`].
#[derive(Error, Debug)]
pub enum ArtifactError {
    /// IO error.
    #[error("io")]
    Io(#[from] std::io::Error),

    /// The crop could not be encoded.
    #[error("encode")]
    Encode(#[from] image::ImageError),
}

/// Errors at the granularity of the job coordinator.
#[derive(Error, Debug)]
pub enum JobError {
    /// The document source could not be loaded; the document ends in `error`.
    #[error("document {document_id}: load failed")]
    Load {
        /// The document being processed.
        document_id: DocumentId,
        /// The underlying load error.
        #[source]
        source: PipelineError,
    },

    /// Unexpected failure above line granularity; the document ends in `error`.
    #[error("document {document_id}: critical failure during {stage}")]
    Critical {
        /// The document being processed.
        document_id: DocumentId,
        /// The stage where the failure occurred.
        stage: PipelineStage,
        /// The underlying error.
        #[source]
        source: BoxError,
    },

    /// Another worker claimed the document first.
    #[error("document {document_id}: claim lost to another worker")]
    ClaimLost {
        /// The document that could not be claimed.
        document_id: DocumentId,
    },

    /// Failure while polling for work.
    #[error("worker cycle failed")]
    Cycle {
        /// The underlying store error.
        #[source]
        source: StoreError,
    },
}

impl JobError {
    /// Wraps an error that occurred while `document_id` was claimed.
    pub fn critical(
        document_id: DocumentId,
        stage: PipelineStage,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::Critical {
            document_id,
            stage,
            source: source.into(),
        }
    }

    /// Maps a pipeline error to the matching job error for `document_id`.
    pub fn from_pipeline(document_id: DocumentId, error: PipelineError) -> Self {
        if error.is_load_error() {
            return Self::Load {
                document_id,
                source: error,
            };
        }
        let stage = match &error {
            PipelineError::Processing { stage, .. } => *stage,
            _ => PipelineStage::Load,
        };
        Self::critical(document_id, stage, error)
    }

    /// The document the error refers to, if any.
    pub fn document_id(&self) -> Option<DocumentId> {
        match self {
            Self::Load { document_id, .. }
            | Self::Critical { document_id, .. }
            | Self::ClaimLost { document_id } => Some(*document_id),
            Self::Cycle { .. } => None,
        }
    }

    /// The stage the error refers to.
    pub fn stage(&self) -> PipelineStage {
        match self {
            Self::Load { .. } => PipelineStage::Load,
            Self::Critical { stage, .. } => *stage,
            Self::ClaimLost { .. } | Self::Cycle { .. } => PipelineStage::Polling,
        }
    }
}

/// Errors raised while building or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A field holds a value outside its domain.
    #[error("invalid value for field '{field}': expected {expected}, got {actual}")]
    InvalidField {
        /// Field name.
        field: &'static str,
        /// Description of the accepted values.
        expected: String,
        /// The provided value.
        actual: String,
    },

    /// The configuration file could not be read.
    #[error("io")]
    Io(#[from] std::io::Error),

    /// The configuration file could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ConfigError {
    /// Creates an error for an out-of-domain field value.
    pub fn invalid_field(
        field: &'static str,
        expected: impl Into<String>,
        actual: impl std::fmt::Display,
    ) -> Self {
        Self::InvalidField {
            field,
            expected: expected.into(),
            actual: actual.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_stage_display() {
        assert_eq!(PipelineStage::Deskew.to_string(), "deskew");
        assert_eq!(
            PipelineStage::BackgroundNormalization.to_string(),
            "background normalization"
        );
    }

    #[test]
    fn test_from_pipeline_classifies_load_errors() {
        let err = JobError::from_pipeline(DocumentId(7), PipelineError::load("a.png", "missing"));
        assert!(matches!(err, JobError::Load { .. }));
        assert_eq!(err.document_id(), Some(DocumentId(7)));
        assert_eq!(err.stage(), PipelineStage::Load);
    }

    #[test]
    fn test_from_pipeline_keeps_processing_stage() {
        let err = JobError::from_pipeline(
            DocumentId(3),
            PipelineError::processing(PipelineStage::Segmentation, "empty mask"),
        );
        assert!(matches!(err, JobError::Critical { .. }));
        assert_eq!(err.stage(), PipelineStage::Segmentation);
    }

    #[test]
    fn test_config_error_message() {
        let err = ConfigError::invalid_field("background_kernel", "a positive size", 0);
        assert_eq!(
            err.to_string(),
            "invalid value for field 'background_kernel': expected a positive size, got 0"
        );
    }
}
