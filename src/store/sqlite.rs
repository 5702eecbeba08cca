//! SQLite-backed store.
//!
//! Several worker processes may share one database file. The claim is a single
//! conditional `UPDATE`, and every operation touching more than one row runs inside a
//! transaction, so an interrupted operation leaves no partial writes behind.

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

use super::{DocumentStore, check_edge};
use crate::core::errors::StoreError;
use crate::domain::{
    Correction, CorrectionId, Document, DocumentId, DocumentKind, DocumentStatus, LineSegment,
    NewDocument, NewLineSegment, RecognitionResult, ResultId, SegmentId,
};

const SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS documents (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  filename TEXT NOT NULL,
  source_path TEXT NOT NULL,
  kind TEXT NOT NULL,
  status TEXT NOT NULL,
  created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_documents_status_created
  ON documents(status, created_at, id);

CREATE TABLE IF NOT EXISTS ocr_results (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  document_id INTEGER NOT NULL REFERENCES documents(id),
  full_text TEXT NOT NULL DEFAULT '',
  confidence REAL NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS line_segments (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  result_id INTEGER NOT NULL REFERENCES ocr_results(id),
  position INTEGER NOT NULL,
  image_path TEXT NOT NULL,
  text TEXT NOT NULL,
  confidence REAL NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_line_segments_result ON line_segments(result_id, position);

-- No foreign key on segment_id: corrections outlive their segment.
CREATE TABLE IF NOT EXISTS corrections (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  segment_id INTEGER NOT NULL,
  text TEXT NOT NULL,
  created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_corrections_segment ON corrections(segment_id, created_at, id);
"#;

impl ToSql for DocumentStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for DocumentStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: StoreError| FromSqlError::Other(Box::new(e)))
    }
}

impl ToSql for DocumentKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for DocumentKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: StoreError| FromSqlError::Other(Box::new(e)))
    }
}

fn document_from_row(row: &Row<'_>) -> rusqlite::Result<Document> {
    Ok(Document {
        id: DocumentId(row.get(0)?),
        filename: row.get(1)?,
        source_path: row.get(2)?,
        kind: row.get(3)?,
        status: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn result_from_row(row: &Row<'_>) -> rusqlite::Result<RecognitionResult> {
    Ok(RecognitionResult {
        id: ResultId(row.get(0)?),
        document_id: DocumentId(row.get(1)?),
        full_text: row.get(2)?,
        confidence: row.get(3)?,
    })
}

fn segment_from_row(row: &Row<'_>) -> rusqlite::Result<LineSegment> {
    Ok(LineSegment {
        id: SegmentId(row.get(0)?),
        result_id: ResultId(row.get(1)?),
        position: row.get(2)?,
        image_path: row.get(3)?,
        text: row.get(4)?,
        confidence: row.get(5)?,
    })
}

fn correction_from_row(row: &Row<'_>) -> rusqlite::Result<Correction> {
    Ok(Correction {
        id: CorrectionId(row.get(0)?),
        segment_id: SegmentId(row.get(1)?),
        text: row.get(2)?,
        created_at: row.get(3)?,
    })
}

const DOCUMENT_COLUMNS: &str = "id, filename, source_path, kind, status, created_at";

fn load_document(conn: &Connection, id: DocumentId) -> Result<Document, StoreError> {
    conn.query_row(
        &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?1"),
        params![id.0],
        document_from_row,
    )
    .optional()?
    .ok_or(StoreError::NotFound {
        entity: "document",
        id: id.0,
    })
}

/// Moves `id` from `processing` to `next` within the caller's transaction.
fn finish(conn: &Connection, id: DocumentId, next: DocumentStatus) -> Result<(), StoreError> {
    let changed = conn.execute(
        "UPDATE documents SET status = ?1 WHERE id = ?2 AND status = ?3",
        params![next, id.0, DocumentStatus::Processing],
    )?;
    if changed == 1 {
        return Ok(());
    }
    let current = load_document(conn, id)?;
    Err(StoreError::InvalidTransition {
        from: current.status,
        to: next,
    })
}

/// [`DocumentStore`] on a SQLite database.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref())?;
        conn.busy_timeout(Duration::from_secs(5))?;
        debug!(path = %path.as_ref().display(), "opened sqlite store");
        Self::with_connection(conn)
    }

    /// A private database that lives as long as the store.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl DocumentStore for SqliteStore {
    fn insert_document(&self, document: NewDocument) -> Result<Document, StoreError> {
        let conn = self.conn()?;
        let created_at: DateTime<Utc> = Utc::now();
        conn.execute(
            "INSERT INTO documents(filename, source_path, kind, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                document.filename,
                document.source_path,
                document.kind,
                DocumentStatus::Uploaded,
                created_at
            ],
        )?;
        load_document(&conn, DocumentId(conn.last_insert_rowid()))
    }

    fn get_document(&self, id: DocumentId) -> Result<Document, StoreError> {
        load_document(&*self.conn()?, id)
    }

    fn oldest_uploaded(&self) -> Result<Option<Document>, StoreError> {
        let conn = self.conn()?;
        let document = conn
            .query_row(
                &format!(
                    "SELECT {DOCUMENT_COLUMNS} FROM documents
                     WHERE status = ?1
                     ORDER BY created_at ASC, id ASC
                     LIMIT 1"
                ),
                params![DocumentStatus::Uploaded],
                document_from_row,
            )
            .optional()?;
        Ok(document)
    }

    fn transition_status(
        &self,
        id: DocumentId,
        expected: DocumentStatus,
        next: DocumentStatus,
    ) -> Result<bool, StoreError> {
        check_edge(expected, next)?;
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE documents SET status = ?1 WHERE id = ?2 AND status = ?3",
            params![next, id.0, expected],
        )?;
        if changed == 0 {
            // Distinguish a lost race from a missing document.
            load_document(&conn, id)?;
            return Ok(false);
        }
        Ok(true)
    }

    fn create_result(&self, document_id: DocumentId) -> Result<RecognitionResult, StoreError> {
        let conn = self.conn()?;
        load_document(&conn, document_id)?;
        conn.execute(
            "INSERT INTO ocr_results(document_id, full_text, confidence) VALUES (?1, '', 0)",
            params![document_id.0],
        )?;
        Ok(RecognitionResult {
            id: ResultId(conn.last_insert_rowid()),
            document_id,
            full_text: String::new(),
            confidence: 0.0,
        })
    }

    fn add_segment(
        &self,
        result_id: ResultId,
        segment: NewLineSegment,
    ) -> Result<LineSegment, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let exists = tx
            .query_row(
                "SELECT 1 FROM ocr_results WHERE id = ?1",
                params![result_id.0],
                |_| Ok(()),
            )
            .optional()?;
        if exists.is_none() {
            return Err(StoreError::NotFound {
                entity: "result",
                id: result_id.0,
            });
        }
        let position: u32 = tx.query_row(
            "SELECT COUNT(*) FROM line_segments WHERE result_id = ?1",
            params![result_id.0],
            |row| row.get(0),
        )?;
        tx.execute(
            "INSERT INTO line_segments(result_id, position, image_path, text, confidence)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                result_id.0,
                position,
                segment.image_path,
                segment.text,
                segment.confidence
            ],
        )?;
        let id = SegmentId(tx.last_insert_rowid());
        tx.commit()?;
        Ok(LineSegment {
            id,
            result_id,
            position,
            image_path: segment.image_path,
            text: segment.text,
            confidence: segment.confidence,
        })
    }

    fn complete_document(
        &self,
        document_id: DocumentId,
        result_id: ResultId,
        full_text: &str,
        confidence: f32,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let updated = tx.execute(
            "UPDATE ocr_results SET full_text = ?1, confidence = ?2
             WHERE id = ?3 AND document_id = ?4",
            params![full_text, confidence, result_id.0, document_id.0],
        )?;
        if updated == 0 {
            return Err(StoreError::NotFound {
                entity: "result",
                id: result_id.0,
            });
        }
        finish(&tx, document_id, DocumentStatus::OcrCompleted)?;
        tx.commit()?;
        Ok(())
    }

    fn fail_document(
        &self,
        document_id: DocumentId,
        result_id: Option<ResultId>,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        finish(&tx, document_id, DocumentStatus::Error)?;
        if let Some(result_id) = result_id {
            tx.execute(
                "DELETE FROM line_segments WHERE result_id = ?1",
                params![result_id.0],
            )?;
            tx.execute(
                "DELETE FROM ocr_results WHERE id = ?1 AND document_id = ?2",
                params![result_id.0, document_id.0],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn results_for_document(
        &self,
        document_id: DocumentId,
    ) -> Result<Vec<RecognitionResult>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, document_id, full_text, confidence FROM ocr_results
             WHERE document_id = ?1 ORDER BY id ASC",
        )?;
        let results = stmt
            .query_map(params![document_id.0], result_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(results)
    }

    fn segments_for_result(&self, result_id: ResultId) -> Result<Vec<LineSegment>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, result_id, position, image_path, text, confidence FROM line_segments
             WHERE result_id = ?1 ORDER BY position ASC",
        )?;
        let segments = stmt
            .query_map(params![result_id.0], segment_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(segments)
    }

    fn get_segment(&self, id: SegmentId) -> Result<LineSegment, StoreError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, result_id, position, image_path, text, confidence FROM line_segments
             WHERE id = ?1",
            params![id.0],
            segment_from_row,
        )
        .optional()?
        .ok_or(StoreError::NotFound {
            entity: "segment",
            id: id.0,
        })
    }

    fn add_correction(&self, segment_id: SegmentId, text: &str) -> Result<Correction, StoreError> {
        let conn = self.conn()?;
        let exists = conn
            .query_row(
                "SELECT 1 FROM line_segments WHERE id = ?1",
                params![segment_id.0],
                |_| Ok(()),
            )
            .optional()?;
        if exists.is_none() {
            return Err(StoreError::NotFound {
                entity: "segment",
                id: segment_id.0,
            });
        }
        let created_at = Utc::now();
        conn.execute(
            "INSERT INTO corrections(segment_id, text, created_at) VALUES (?1, ?2, ?3)",
            params![segment_id.0, text, created_at],
        )?;
        Ok(Correction {
            id: CorrectionId(conn.last_insert_rowid()),
            segment_id,
            text: text.to_string(),
            created_at,
        })
    }

    fn corrections_for_segment(
        &self,
        segment_id: SegmentId,
    ) -> Result<Vec<Correction>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, segment_id, text, created_at FROM corrections
             WHERE segment_id = ?1 ORDER BY created_at ASC, id ASC",
        )?;
        let corrections = stmt
            .query_map(params![segment_id.0], correction_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(corrections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::contract;

    #[test]
    fn test_sqlite_store_contract() {
        contract::run_all(|| Box::new(SqliteStore::open_in_memory().expect("should open")));
    }

    #[test]
    fn test_schema_survives_reopen() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let path = dir.path().join("htr.db");
        let id = {
            let store = SqliteStore::open(&path).expect("should open");
            store
                .insert_document(NewDocument {
                    filename: "scan.pdf".into(),
                    source_path: "uploads/scan.pdf".into(),
                    kind: DocumentKind::Paginated,
                })
                .expect("should insert")
                .id
        };
        let store = SqliteStore::open(&path).expect("should reopen");
        let document = store.get_document(id).expect("should get");
        assert_eq!(document.kind, DocumentKind::Paginated);
        assert_eq!(document.status, DocumentStatus::Uploaded);
    }

    #[test]
    fn test_claim_is_exclusive_across_connections() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let path = dir.path().join("htr.db");
        let first = SqliteStore::open(&path).expect("should open");
        let second = SqliteStore::open(&path).expect("should open");
        let document = first
            .insert_document(NewDocument {
                filename: "a.png".into(),
                source_path: "a.png".into(),
                kind: DocumentKind::Raster,
            })
            .expect("should insert");

        let won_first = first
            .transition_status(document.id, DocumentStatus::Uploaded, DocumentStatus::Processing)
            .expect("should run");
        let won_second = second
            .transition_status(document.id, DocumentStatus::Uploaded, DocumentStatus::Processing)
            .expect("should run");
        assert!(won_first);
        assert!(!won_second);
    }
}
