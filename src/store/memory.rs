//! In-process store.

use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use super::{DocumentStore, check_edge};
use crate::core::errors::StoreError;
use crate::domain::{
    Correction, CorrectionId, Document, DocumentId, DocumentStatus, LineSegment, NewDocument,
    NewLineSegment, RecognitionResult, ResultId, SegmentId,
};

#[derive(Debug, Default)]
struct State {
    next_id: i64,
    documents: BTreeMap<DocumentId, Document>,
    results: BTreeMap<ResultId, RecognitionResult>,
    segments: BTreeMap<SegmentId, LineSegment>,
    corrections: Vec<Correction>,
}

impl State {
    fn allocate(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn document_mut(&mut self, id: DocumentId) -> Result<&mut Document, StoreError> {
        self.documents.get_mut(&id).ok_or(StoreError::NotFound {
            entity: "document",
            id: id.0,
        })
    }

    /// Moves `id` from `processing` to `next`, failing if it is elsewhere.
    fn finish(&mut self, id: DocumentId, next: DocumentStatus) -> Result<(), StoreError> {
        let document = self.document_mut(id)?;
        if document.status != DocumentStatus::Processing {
            return Err(StoreError::InvalidTransition {
                from: document.status,
                to: next,
            });
        }
        document.status = next;
        Ok(())
    }
}

/// [`DocumentStore`] keeping everything in memory behind a mutex.
///
/// Every operation holds the lock for its whole duration, which makes the
/// multi-record operations atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, StoreError> {
        self.state.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl DocumentStore for MemoryStore {
    fn insert_document(&self, document: NewDocument) -> Result<Document, StoreError> {
        let mut state = self.lock()?;
        let id = DocumentId(state.allocate());
        let document = Document {
            id,
            filename: document.filename,
            source_path: document.source_path,
            kind: document.kind,
            status: DocumentStatus::Uploaded,
            created_at: Utc::now(),
        };
        state.documents.insert(id, document.clone());
        Ok(document)
    }

    fn get_document(&self, id: DocumentId) -> Result<Document, StoreError> {
        self.lock()?.document_mut(id).map(|document| document.clone())
    }

    fn oldest_uploaded(&self) -> Result<Option<Document>, StoreError> {
        let state = self.lock()?;
        Ok(state
            .documents
            .values()
            .filter(|document| document.status == DocumentStatus::Uploaded)
            .min_by_key(|document| (document.created_at, document.id))
            .cloned())
    }

    fn transition_status(
        &self,
        id: DocumentId,
        expected: DocumentStatus,
        next: DocumentStatus,
    ) -> Result<bool, StoreError> {
        check_edge(expected, next)?;
        let mut state = self.lock()?;
        let document = state.document_mut(id)?;
        if document.status != expected {
            return Ok(false);
        }
        document.status = next;
        Ok(true)
    }

    fn create_result(&self, document_id: DocumentId) -> Result<RecognitionResult, StoreError> {
        let mut state = self.lock()?;
        state.document_mut(document_id)?;
        let result = RecognitionResult {
            id: ResultId(state.allocate()),
            document_id,
            full_text: String::new(),
            confidence: 0.0,
        };
        state.results.insert(result.id, result.clone());
        Ok(result)
    }

    fn add_segment(
        &self,
        result_id: ResultId,
        segment: NewLineSegment,
    ) -> Result<LineSegment, StoreError> {
        let mut state = self.lock()?;
        if !state.results.contains_key(&result_id) {
            return Err(StoreError::NotFound {
                entity: "result",
                id: result_id.0,
            });
        }
        let position = state
            .segments
            .values()
            .filter(|existing| existing.result_id == result_id)
            .count() as u32;
        let segment = LineSegment {
            id: SegmentId(state.allocate()),
            result_id,
            position,
            image_path: segment.image_path,
            text: segment.text,
            confidence: segment.confidence,
        };
        state.segments.insert(segment.id, segment.clone());
        Ok(segment)
    }

    fn complete_document(
        &self,
        document_id: DocumentId,
        result_id: ResultId,
        full_text: &str,
        confidence: f32,
    ) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        if !state.results.contains_key(&result_id) {
            return Err(StoreError::NotFound {
                entity: "result",
                id: result_id.0,
            });
        }
        state.finish(document_id, DocumentStatus::OcrCompleted)?;
        if let Some(result) = state.results.get_mut(&result_id) {
            result.full_text = full_text.to_string();
            result.confidence = confidence;
        }
        Ok(())
    }

    fn fail_document(
        &self,
        document_id: DocumentId,
        result_id: Option<ResultId>,
    ) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        state.finish(document_id, DocumentStatus::Error)?;
        if let Some(result_id) = result_id {
            state.segments.retain(|_, segment| segment.result_id != result_id);
            state.results.remove(&result_id);
        }
        Ok(())
    }

    fn results_for_document(
        &self,
        document_id: DocumentId,
    ) -> Result<Vec<RecognitionResult>, StoreError> {
        let state = self.lock()?;
        Ok(state
            .results
            .values()
            .filter(|result| result.document_id == document_id)
            .cloned()
            .collect())
    }

    fn segments_for_result(&self, result_id: ResultId) -> Result<Vec<LineSegment>, StoreError> {
        let state = self.lock()?;
        let mut segments: Vec<LineSegment> = state
            .segments
            .values()
            .filter(|segment| segment.result_id == result_id)
            .cloned()
            .collect();
        segments.sort_by_key(|segment| segment.position);
        Ok(segments)
    }

    fn get_segment(&self, id: SegmentId) -> Result<LineSegment, StoreError> {
        self.lock()?
            .segments
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound {
                entity: "segment",
                id: id.0,
            })
    }

    fn add_correction(&self, segment_id: SegmentId, text: &str) -> Result<Correction, StoreError> {
        let mut state = self.lock()?;
        if !state.segments.contains_key(&segment_id) {
            return Err(StoreError::NotFound {
                entity: "segment",
                id: segment_id.0,
            });
        }
        let correction = Correction {
            id: CorrectionId(state.allocate()),
            segment_id,
            text: text.to_string(),
            created_at: Utc::now(),
        };
        state.corrections.push(correction.clone());
        Ok(correction)
    }

    fn corrections_for_segment(
        &self,
        segment_id: SegmentId,
    ) -> Result<Vec<Correction>, StoreError> {
        let state = self.lock()?;
        Ok(state
            .corrections
            .iter()
            .filter(|correction| correction.segment_id == segment_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::contract;

    #[test]
    fn test_memory_store_contract() {
        contract::run_all(|| Box::new(MemoryStore::new()));
    }

    #[test]
    fn test_ids_are_unique_across_records() {
        let store = MemoryStore::new();
        let document = store
            .insert_document(NewDocument {
                filename: "a.png".into(),
                source_path: "a.png".into(),
                kind: crate::domain::DocumentKind::Raster,
            })
            .expect("should insert");
        let result = store.create_result(document.id).expect("should create");
        assert_ne!(document.id.0, result.id.0);
    }
}
