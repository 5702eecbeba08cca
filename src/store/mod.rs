//! Persistence of documents, results, segments and corrections.
//!
//! [`DocumentStore`] is the boundary the coordinator writes through. Two
//! implementations are provided:
//!
//! - [`MemoryStore`]: process-local state behind a mutex, for tests and one-shot runs
//! - [`SqliteStore`]: a SQLite database shared by any number of worker processes
//!
//! Claiming is a compare-and-set on the status (`transition_status`), so two workers
//! racing on one document cannot both win.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::core::errors::StoreError;
use crate::domain::{
    Correction, Document, DocumentId, DocumentStatus, LineSegment, NewDocument, NewLineSegment,
    RecognitionResult, ResultId, SegmentId,
};

/// Blocking persistence operations used by the pipeline and the binary.
pub trait DocumentStore: Send + Sync {
    /// Registers a document in `uploaded` state.
    fn insert_document(&self, document: NewDocument) -> Result<Document, StoreError>;

    fn get_document(&self, id: DocumentId) -> Result<Document, StoreError>;

    /// The oldest document still in `uploaded` state, by creation time then id.
    fn oldest_uploaded(&self) -> Result<Option<Document>, StoreError>;

    /// Atomically moves `id` from `expected` to `next`.
    ///
    /// Returns `Ok(false)` when the document is not in `expected`, e.g. because
    /// another worker claimed it first. Edges outside the lifecycle are rejected with
    /// [`StoreError::InvalidTransition`].
    fn transition_status(
        &self,
        id: DocumentId,
        expected: DocumentStatus,
        next: DocumentStatus,
    ) -> Result<bool, StoreError>;

    /// Creates an empty result for a processing attempt.
    fn create_result(&self, document_id: DocumentId) -> Result<RecognitionResult, StoreError>;

    /// Appends a segment; its position is the number of segments already in the result.
    fn add_segment(
        &self,
        result_id: ResultId,
        segment: NewLineSegment,
    ) -> Result<LineSegment, StoreError>;

    /// Writes the aggregate text and confidence and moves the document from
    /// `processing` to `ocr_completed`, as one unit.
    fn complete_document(
        &self,
        document_id: DocumentId,
        result_id: ResultId,
        full_text: &str,
        confidence: f32,
    ) -> Result<(), StoreError>;

    /// Discards the attempt's result and segments, if any, and moves the document from
    /// `processing` to `error`, as one unit. Corrections are kept.
    fn fail_document(
        &self,
        document_id: DocumentId,
        result_id: Option<ResultId>,
    ) -> Result<(), StoreError>;

    fn results_for_document(
        &self,
        document_id: DocumentId,
    ) -> Result<Vec<RecognitionResult>, StoreError>;

    /// Segments of a result ordered by position.
    fn segments_for_result(&self, result_id: ResultId) -> Result<Vec<LineSegment>, StoreError>;

    fn get_segment(&self, id: SegmentId) -> Result<LineSegment, StoreError>;

    /// Appends a correction to an existing segment.
    fn add_correction(&self, segment_id: SegmentId, text: &str) -> Result<Correction, StoreError>;

    /// Corrections of a segment, oldest first.
    fn corrections_for_segment(&self, segment_id: SegmentId)
    -> Result<Vec<Correction>, StoreError>;
}

/// Rejects edges that are not part of the document lifecycle.
pub(crate) fn check_edge(expected: DocumentStatus, next: DocumentStatus) -> Result<(), StoreError> {
    if expected.can_transition_to(next) {
        Ok(())
    } else {
        Err(StoreError::InvalidTransition {
            from: expected,
            to: next,
        })
    }
}

#[cfg(test)]
pub(crate) mod contract {
    //! Behavior every [`DocumentStore`] implementation must show.

    use super::*;
    use crate::domain::DocumentKind;

    fn submit(store: &dyn DocumentStore, name: &str) -> Document {
        store
            .insert_document(NewDocument {
                filename: name.to_string(),
                source_path: format!("uploads/{name}"),
                kind: DocumentKind::Raster,
            })
            .expect("should insert")
    }

    fn segment(text: &str) -> NewLineSegment {
        NewLineSegment {
            image_path: format!("segments/{text}.png"),
            text: text.to_string(),
            confidence: 0.5,
        }
    }

    pub fn oldest_uploaded_is_fifo(store: &dyn DocumentStore) {
        assert!(store.oldest_uploaded().expect("should query").is_none());
        let first = submit(store, "a.png");
        let second = submit(store, "b.png");
        assert_eq!(first.status, DocumentStatus::Uploaded);

        let next = store.oldest_uploaded().expect("should query").expect("should find");
        assert_eq!(next.id, first.id);

        assert!(
            store
                .transition_status(first.id, DocumentStatus::Uploaded, DocumentStatus::Processing)
                .expect("should claim")
        );
        let next = store.oldest_uploaded().expect("should query").expect("should find");
        assert_eq!(next.id, second.id);
    }

    pub fn claim_is_compare_and_set(store: &dyn DocumentStore) {
        let document = submit(store, "a.png");
        let claim = |s: &dyn DocumentStore| {
            s.transition_status(document.id, DocumentStatus::Uploaded, DocumentStatus::Processing)
                .expect("should run")
        };
        assert!(claim(store));
        assert!(!claim(store));
        assert_eq!(
            store.get_document(document.id).expect("should get").status,
            DocumentStatus::Processing
        );

        let err = store
            .transition_status(document.id, DocumentStatus::Processing, DocumentStatus::Uploaded)
            .expect_err("should reject edge");
        assert!(matches!(err, StoreError::InvalidTransition { .. }));
    }

    pub fn complete_writes_aggregate(store: &dyn DocumentStore) {
        let document = submit(store, "a.png");
        store
            .transition_status(document.id, DocumentStatus::Uploaded, DocumentStatus::Processing)
            .expect("should claim");
        let result = store.create_result(document.id).expect("should create");
        assert_eq!(result.full_text, "");

        let first = store.add_segment(result.id, segment("one")).expect("should add");
        let second = store.add_segment(result.id, segment("two")).expect("should add");
        assert_eq!((first.position, second.position), (0, 1));

        store
            .complete_document(document.id, result.id, "one\ntwo", 0.5)
            .expect("should complete");

        assert_eq!(
            store.get_document(document.id).expect("should get").status,
            DocumentStatus::OcrCompleted
        );
        let results = store.results_for_document(document.id).expect("should list");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].full_text, "one\ntwo");
        let segments = store.segments_for_result(result.id).expect("should list");
        assert_eq!(
            segments.iter().map(|s| s.text.as_str()).collect::<Vec<_>>(),
            vec!["one", "two"]
        );
        assert_eq!(store.get_segment(second.id).expect("should get"), second);
    }

    pub fn complete_requires_processing(store: &dyn DocumentStore) {
        let document = submit(store, "a.png");
        let result = store.create_result(document.id).expect("should create");
        let err = store
            .complete_document(document.id, result.id, "", 0.0)
            .expect_err("should reject");
        assert!(matches!(err, StoreError::InvalidTransition { .. }));
    }

    pub fn fail_discards_attempt(store: &dyn DocumentStore) {
        let document = submit(store, "a.png");
        store
            .transition_status(document.id, DocumentStatus::Uploaded, DocumentStatus::Processing)
            .expect("should claim");
        let result = store.create_result(document.id).expect("should create");
        let kept = store.add_segment(result.id, segment("one")).expect("should add");
        let correction = store.add_correction(kept.id, "One").expect("should correct");

        store
            .fail_document(document.id, Some(result.id))
            .expect("should fail document");

        assert_eq!(
            store.get_document(document.id).expect("should get").status,
            DocumentStatus::Error
        );
        assert!(store.results_for_document(document.id).expect("should list").is_empty());
        assert!(store.segments_for_result(result.id).expect("should list").is_empty());
        assert!(matches!(
            store.get_segment(kept.id),
            Err(StoreError::NotFound { .. })
        ));
        assert_eq!(
            store.corrections_for_segment(kept.id).expect("should list"),
            vec![correction]
        );
    }

    pub fn corrections_are_append_only(store: &dyn DocumentStore) {
        let document = submit(store, "a.png");
        let result = store.create_result(document.id).expect("should create");
        let line = store.add_segment(result.id, segment("tbe")).expect("should add");

        let first = store.add_correction(line.id, "the").expect("should correct");
        let second = store.add_correction(line.id, "The").expect("should correct");
        let corrections = store.corrections_for_segment(line.id).expect("should list");
        assert_eq!(corrections, vec![first, second]);

        let err = store
            .add_correction(SegmentId(9999), "x")
            .expect_err("should reject unknown segment");
        assert!(matches!(err, StoreError::NotFound { entity: "segment", .. }));
    }

    pub fn missing_records_are_not_found(store: &dyn DocumentStore) {
        assert!(matches!(
            store.get_document(DocumentId(42)),
            Err(StoreError::NotFound { entity: "document", id: 42 })
        ));
        assert!(matches!(
            store.create_result(DocumentId(42)),
            Err(StoreError::NotFound { entity: "document", .. })
        ));
        assert!(matches!(
            store.add_segment(ResultId(42), segment("x")),
            Err(StoreError::NotFound { entity: "result", .. })
        ));
    }

    pub fn run_all(make: impl Fn() -> Box<dyn DocumentStore>) {
        oldest_uploaded_is_fifo(make().as_ref());
        claim_is_compare_and_set(make().as_ref());
        complete_writes_aggregate(make().as_ref());
        complete_requires_processing(make().as_ref());
        fail_discards_attempt(make().as_ref());
        corrections_are_append_only(make().as_ref());
        missing_records_are_not_found(make().as_ref());
    }
}
