//! Word error rate of recognized text against human corrections.

use serde::Serialize;

use crate::core::errors::StoreError;
use crate::domain::{DocumentId, ResultId, SegmentId};
use crate::store::DocumentStore;

/// Word error rate of `hypothesis` against `reference`.
///
/// Word-level Levenshtein distance over whitespace-separated tokens, divided by the
/// number of reference words. An empty reference scores 0.0 against an empty hypothesis
/// and 1.0 against anything else.
pub fn word_error_rate(reference: &str, hypothesis: &str) -> f64 {
    let reference: Vec<&str> = reference.split_whitespace().collect();
    let hypothesis: Vec<&str> = hypothesis.split_whitespace().collect();
    if reference.is_empty() {
        return if hypothesis.is_empty() { 0.0 } else { 1.0 };
    }
    word_distance(&reference, &hypothesis) as f64 / reference.len() as f64
}

/// Minimum number of word substitutions, insertions and deletions.
fn word_distance(reference: &[&str], hypothesis: &[&str]) -> usize {
    let mut previous: Vec<usize> = (0..=hypothesis.len()).collect();
    let mut current = vec![0; hypothesis.len() + 1];

    for (i, r) in reference.iter().enumerate() {
        current[0] = i + 1;
        for (j, h) in hypothesis.iter().enumerate() {
            let substitution = previous[j] + usize::from(r != h);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[hypothesis.len()]
}

/// One corrected line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentEvaluation {
    pub segment_id: SegmentId,
    pub predicted: String,
    /// Latest correction of the segment.
    pub corrected: String,
    pub word_errors: usize,
    pub reference_words: usize,
}

/// Evaluation of the latest result of a document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub document_id: DocumentId,
    pub result_id: Option<ResultId>,
    /// Segments of the result, corrected or not.
    pub total_segments: usize,
    pub segments: Vec<SegmentEvaluation>,
}

impl EvaluationReport {
    /// Corpus WER over the corrected segments; `None` when nothing was corrected.
    pub fn word_error_rate(&self) -> Option<f64> {
        if self.segments.is_empty() {
            return None;
        }
        let errors: usize = self.segments.iter().map(|s| s.word_errors).sum();
        let words: usize = self.segments.iter().map(|s| s.reference_words).sum();
        Some(if words == 0 {
            if errors == 0 { 0.0 } else { 1.0 }
        } else {
            errors as f64 / words as f64
        })
    }
}

/// Pairs each segment of the document's latest result with its latest correction.
pub fn evaluate_result(
    store: &dyn DocumentStore,
    document_id: DocumentId,
) -> Result<EvaluationReport, StoreError> {
    let results = store.results_for_document(document_id)?;
    let Some(result) = results.last() else {
        return Ok(EvaluationReport {
            document_id,
            result_id: None,
            total_segments: 0,
            segments: Vec::new(),
        });
    };

    let segments = store.segments_for_result(result.id)?;
    let mut evaluated = Vec::new();
    for segment in &segments {
        let Some(correction) = store.corrections_for_segment(segment.id)?.pop() else {
            continue;
        };
        let reference: Vec<&str> = correction.text.split_whitespace().collect();
        let hypothesis: Vec<&str> = segment.text.split_whitespace().collect();
        evaluated.push(SegmentEvaluation {
            segment_id: segment.id,
            predicted: segment.text.clone(),
            word_errors: word_distance(&reference, &hypothesis),
            reference_words: reference.len(),
            corrected: correction.text,
        });
    }

    Ok(EvaluationReport {
        document_id,
        result_id: Some(result.id),
        total_segments: segments.len(),
        segments: evaluated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DocumentKind, DocumentStatus, NewDocument, NewLineSegment};
    use crate::store::MemoryStore;

    #[test]
    fn test_word_error_rate_values() {
        assert_eq!(word_error_rate("o rato roeu", "o rato roeu"), 0.0);
        assert!((word_error_rate("o rato roeu", "o gato roeu") - 1.0 / 3.0).abs() < 1e-9);
        assert!((word_error_rate("o rato roeu", "o rato") - 1.0 / 3.0).abs() < 1e-9);
        assert!((word_error_rate("a b", "a x b y") - 1.0).abs() < 1e-9);
        assert_eq!(word_error_rate("  ", ""), 0.0);
        assert_eq!(word_error_rate("", "algo"), 1.0);
    }

    #[test]
    fn test_word_error_rate_ignores_spacing() {
        assert_eq!(word_error_rate("Anno  de\t1901", " Anno de 1901 "), 0.0);
    }

    #[test]
    fn test_evaluate_result_uses_latest_correction() {
        let store = MemoryStore::new();
        let document = store
            .insert_document(NewDocument {
                filename: "livro.png".into(),
                source_path: "uploads/livro.png".into(),
                kind: DocumentKind::Raster,
            })
            .expect("should insert");
        store
            .transition_status(document.id, DocumentStatus::Uploaded, DocumentStatus::Processing)
            .expect("should claim");
        let result = store.create_result(document.id).expect("should create");
        let mut segments = Vec::new();
        for text in ["Jose Maria filho", "de Antonio", "baptizado"] {
            segments.push(
                store
                    .add_segment(
                        result.id,
                        NewLineSegment {
                            image_path: format!("{text}.png"),
                            text: text.to_string(),
                            confidence: 0.9,
                        },
                    )
                    .expect("should add"),
            );
        }
        store
            .complete_document(document.id, result.id, "ignored", 0.9)
            .expect("should complete");

        store
            .add_correction(segments[0].id, "Jose Maria filho legitimo")
            .expect("should correct");
        store
            .add_correction(segments[1].id, "do Antonio")
            .expect("should correct");
        store
            .add_correction(segments[1].id, "de Antonio")
            .expect("should correct");

        let report = evaluate_result(&store, document.id).expect("should evaluate");
        assert_eq!(report.result_id, Some(result.id));
        assert_eq!(report.total_segments, 3);
        assert_eq!(report.segments.len(), 2);
        assert_eq!(report.segments[0].word_errors, 1);
        assert_eq!(report.segments[1].corrected, "de Antonio");
        assert_eq!(report.segments[1].word_errors, 0);
        let wer = report.word_error_rate().expect("should have corrected segments");
        assert!((wer - 1.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_evaluate_result_without_results() {
        let store = MemoryStore::new();
        let document = store
            .insert_document(NewDocument {
                filename: "vazio.png".into(),
                source_path: "uploads/vazio.png".into(),
                kind: DocumentKind::Raster,
            })
            .expect("should insert");
        let report = evaluate_result(&store, document.id).expect("should evaluate");
        assert_eq!(report.result_id, None);
        assert_eq!(report.word_error_rate(), None);
    }
}
