//! Recognition results, line segments and human corrections.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::DocumentId;

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

record_id!(
    /// Identifier of a [`RecognitionResult`].
    ResultId
);
record_id!(
    /// Identifier of a [`LineSegment`].
    SegmentId
);
record_id!(
    /// Identifier of a [`Correction`].
    CorrectionId
);

/// Aggregate output of one processing attempt.
///
/// Created empty before the first line is recognized so that partial results can be
/// inspected while the attempt runs; the text and confidence are written on completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionResult {
    pub id: ResultId,
    pub document_id: DocumentId,
    /// Persisted line texts joined with `\n`, top to bottom.
    pub full_text: String,
    /// Mean of the persisted line confidences, 0 when nothing was persisted.
    pub confidence: f32,
}

/// One recognized line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineSegment {
    pub id: SegmentId,
    pub result_id: ResultId,
    /// Zero-based position among the persisted segments of the result.
    pub position: u32,
    /// Reference returned by the artifact store for the line crop.
    pub image_path: String,
    pub text: String,
    pub confidence: f32,
}

/// Fields needed to persist a line.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLineSegment {
    pub image_path: String,
    pub text: String,
    pub confidence: f32,
}

/// Human-corrected text for a segment. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correction {
    pub id: CorrectionId,
    /// Weak reference; the segment may have been discarded since.
    pub segment_id: SegmentId,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Joins line texts the way a result's full text is built.
pub fn join_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> String {
    lines.into_iter().collect::<Vec<_>>().join("\n")
}

/// Mean confidence, 0 for an empty slice.
pub fn mean_confidence(confidences: &[f32]) -> f32 {
    if confidences.is_empty() {
        return 0.0;
    }
    confidences.iter().sum::<f32>() / confidences.len() as f32
}
