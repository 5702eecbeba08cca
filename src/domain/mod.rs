//! Domain records: documents, recognition results, line segments and corrections.
//!
//! A [`Document`] owns its [`RecognitionResult`]s, a result owns its [`LineSegment`]s and
//! a [`Correction`] only points back at a segment so that it survives for audit purposes.

mod document;
mod records;

pub use document::{Document, DocumentId, DocumentKind, DocumentStatus, NewDocument, is_pdf_bytes};
pub use records::{
    Correction, CorrectionId, LineSegment, NewLineSegment, RecognitionResult, ResultId, SegmentId,
    join_lines, mean_confidence,
};
