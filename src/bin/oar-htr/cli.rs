//! Subcommand implementations.
//!
//! Everything here blocks; `main` runs these functions off the async runtime.

use oar_htr::artifacts::FsArtifactStore;
use oar_htr::core::{AppConfig, BoxError};
use oar_htr::domain::{
    Correction, Document, DocumentId, DocumentKind, LineSegment, NewDocument, RecognitionResult,
    SegmentId, is_pdf_bytes,
};
use oar_htr::evaluation::{EvaluationReport, evaluate_result};
use oar_htr::pipeline::DocumentPipeline;
use oar_htr::recognizer::HttpRecognizer;
use oar_htr::store::{DocumentStore, SqliteStore};
use oar_htr::worker::{CycleOutcome, JobCoordinator, WorkerStats};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Instant;
use tracing::info;

fn open_store(config: &AppConfig) -> Result<Arc<SqliteStore>, BoxError> {
    Ok(Arc::new(SqliteStore::open(&config.worker.database)?))
}

fn build_coordinator(config: &AppConfig) -> Result<JobCoordinator, BoxError> {
    let store = open_store(config)?;
    let recognizer = HttpRecognizer::new(&config.worker.recognizer)?;
    info!(
        database = %config.worker.database.display(),
        endpoint = recognizer.endpoint(),
        segments_dir = %config.worker.segments_dir.display(),
        "Coordinator ready"
    );
    Ok(JobCoordinator::new(
        store,
        Arc::new(FsArtifactStore::new(&config.worker.segments_dir)),
        Arc::new(DocumentPipeline::new(&config.pipeline)),
        Arc::new(recognizer),
        config.worker.clone(),
    ))
}

/// Runs the coordinator until `shutdown` is set.
pub fn run_worker(config: &AppConfig, shutdown: &AtomicBool) -> Result<WorkerStats, BoxError> {
    let coordinator = build_coordinator(config)?;
    Ok(coordinator.run(shutdown))
}

/// Processes one uploaded document in the foreground.
pub fn process(config: &AppConfig, document: i64) -> Result<(), BoxError> {
    let coordinator = build_coordinator(config)?;
    let start = Instant::now();
    let outcome = coordinator.process_document(DocumentId(document))?;
    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

    match outcome {
        CycleOutcome::Completed { document_id, lines } => {
            println!("Document {document_id} completed: {lines} lines in {elapsed_ms:.2}ms");
        }
        CycleOutcome::Failed { document_id } => {
            println!("Document {document_id} failed after {elapsed_ms:.2}ms; see the log");
        }
        CycleOutcome::Skipped { document_id } => {
            println!("Document {document_id} is not waiting for processing");
        }
        CycleOutcome::Idle => println!("Nothing to do"),
    }
    Ok(())
}

/// Copies `file` into the uploads directory and registers it.
pub fn submit(config: &AppConfig, file: &Path) -> Result<(), BoxError> {
    let kind = match DocumentKind::from_path(file) {
        Some(kind) => kind,
        None => {
            // Extension-less PDFs are still accepted.
            let bytes = std::fs::read(file)?;
            if !is_pdf_bytes(&bytes) {
                return Err(format!(
                    "unsupported format for '{}': expected PNG, JPEG, TIFF, BMP or PDF",
                    file.display()
                )
                .into());
            }
            DocumentKind::Paginated
        }
    };

    let imported = FsArtifactStore::import_upload(&config.worker.uploads_dir, file)?;
    let filename = file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| imported.to_string_lossy().into_owned());

    let store = open_store(config)?;
    let document = store.insert_document(NewDocument {
        filename,
        source_path: imported.to_string_lossy().into_owned(),
        kind,
    })?;
    info!(
        document_id = %document.id,
        kind = document.kind.as_str(),
        source = %document.source_path,
        "Document submitted"
    );
    println!("{}", document.id);
    Ok(())
}

/// Runs normalization and segmentation only and writes the crops to `out`.
pub fn segment(config: &AppConfig, file: &Path, out: &Path) -> Result<(), BoxError> {
    let kind = DocumentKind::from_path(file).unwrap_or(DocumentKind::Raster);
    let pipeline = DocumentPipeline::new(&config.pipeline);

    let start = Instant::now();
    let analysis = pipeline.run_path(file, kind)?;
    info!(
        "Segmented in {:.2}ms",
        start.elapsed().as_secs_f64() * 1000.0
    );

    std::fs::create_dir_all(out)?;
    for line in &analysis.lines {
        let path = out.join(format!("line_{:03}.png", line.index));
        line.image.save_with_format(&path, image::ImageFormat::Png)?;
    }

    println!("Rotated: {}", analysis.rotated);
    match analysis.measured_skew {
        Some(angle) => println!("Measured skew: {angle:.2}°"),
        None => println!("Measured skew: none"),
    }
    match analysis.applied_skew {
        Some(angle) => println!("Applied rotation: {angle:.2}°"),
        None => println!("Applied rotation: none"),
    }
    println!("Lines: {}", analysis.lines.len());
    for line in &analysis.lines {
        println!(
            "[{}] rows {}..{} ({} px ink)",
            line.index + 1,
            line.band.top,
            line.band.bottom,
            line.ink
        );
    }
    println!("Crops written to {}", out.display());
    Ok(())
}

#[derive(Serialize)]
struct SegmentView {
    #[serde(flatten)]
    segment: LineSegment,
    corrections: Vec<Correction>,
}

#[derive(Serialize)]
struct ResultView {
    #[serde(flatten)]
    result: RecognitionResult,
    segments: Vec<SegmentView>,
}

#[derive(Serialize)]
struct DocumentView {
    document: Document,
    results: Vec<ResultView>,
}

fn document_view(store: &dyn DocumentStore, id: DocumentId) -> Result<DocumentView, BoxError> {
    let document = store.get_document(id)?;
    let mut results = Vec::new();
    for result in store.results_for_document(id)? {
        let mut segments = Vec::new();
        for segment in store.segments_for_result(result.id)? {
            let corrections = store.corrections_for_segment(segment.id)?;
            segments.push(SegmentView {
                segment,
                corrections,
            });
        }
        results.push(ResultView { result, segments });
    }
    Ok(DocumentView { document, results })
}

/// Prints a document with its results and segments.
pub fn show(config: &AppConfig, document: i64, output: &str) -> Result<(), BoxError> {
    let store = open_store(config)?;
    let view = document_view(&*store, DocumentId(document))?;

    match output {
        "json" => println!("{}", serde_json::to_string(&view)?),
        "text" => {
            if let Some(latest) = view.results.last() {
                println!("{}", latest.result.full_text);
            }
        }
        _ => {
            let document = &view.document;
            println!("\n=== Document {} ===", document.id);
            println!("File: {}", document.filename);
            println!("Kind: {}", document.kind.as_str());
            println!("Status: {}", document.status);
            println!("Submitted: {}", document.created_at.to_rfc3339());
            println!();

            let Some(latest) = view.results.last() else {
                println!("No results yet.");
                return Ok(());
            };
            println!(
                "Result {} ({:.1}% mean confidence)",
                latest.result.id,
                latest.result.confidence * 100.0
            );
            if latest.segments.is_empty() {
                println!("No lines recognized.");
                return Ok(());
            }
            println!("--- Lines ---");
            for segment in &latest.segments {
                println!(
                    "[{}] segment {} \"{}\" ({:.1}%)",
                    segment.segment.position + 1,
                    segment.segment.id,
                    segment.segment.text,
                    segment.segment.confidence * 100.0
                );
                if let Some(correction) = segment.corrections.last() {
                    println!("    corrected: \"{}\"", correction.text);
                }
            }
            println!();
            println!("--- Full Text ---");
            println!("{}", latest.result.full_text);
        }
    }
    Ok(())
}

/// Appends a correction to a segment.
pub fn correct(config: &AppConfig, segment: i64, text: &str) -> Result<(), BoxError> {
    let store = open_store(config)?;
    let segment = store.get_segment(SegmentId(segment))?;
    let correction = store.add_correction(segment.id, text)?;
    info!(
        segment_id = %segment.id,
        correction_id = %correction.id,
        "Correction recorded"
    );
    println!("{}", correction.id);
    Ok(())
}

/// Prints the word error rate of a document against its corrections.
pub fn evaluate(config: &AppConfig, document: i64, output: &str) -> Result<(), BoxError> {
    let store = open_store(config)?;
    let report = evaluate_result(&*store, DocumentId(document))?;

    match output {
        "json" => {
            #[derive(Serialize)]
            struct Response<'a> {
                #[serde(flatten)]
                report: &'a EvaluationReport,
                word_error_rate: Option<f64>,
            }
            let response = Response {
                report: &report,
                word_error_rate: report.word_error_rate(),
            };
            println!("{}", serde_json::to_string(&response)?);
        }
        "text" => match report.word_error_rate() {
            Some(wer) => println!("{wer:.4}"),
            None => println!("n/a"),
        },
        _ => {
            println!("\n=== Evaluation of document {} ===", report.document_id);
            println!(
                "Corrected segments: {}/{}",
                report.segments.len(),
                report.total_segments
            );
            for segment in &report.segments {
                println!(
                    "[{}] {}/{} word errors",
                    segment.segment_id, segment.word_errors, segment.reference_words
                );
                println!("    predicted: \"{}\"", segment.predicted);
                println!("    corrected: \"{}\"", segment.corrected);
            }
            match report.word_error_rate() {
                Some(wer) => println!("WER: {:.2}%", wer * 100.0),
                None => println!("WER: n/a (no corrections)"),
            }
        }
    }
    Ok(())
}
