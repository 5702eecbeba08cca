//! Discovery of pending work.

use std::sync::Arc;

use crate::core::errors::StoreError;
use crate::domain::Document;
use crate::store::DocumentStore;

/// Yields the next document waiting for processing.
///
/// The coordinator only asks this trait for work, so polling can be replaced by a
/// push-based queue without touching the claim and processing logic.
pub trait WorkSource: Send + Sync {
    fn next_pending(&self) -> Result<Option<Document>, StoreError>;
}

/// [`WorkSource`] that polls the store for the oldest `uploaded` document.
#[derive(Clone)]
pub struct StorePoller {
    store: Arc<dyn DocumentStore>,
}

impl StorePoller {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

impl WorkSource for StorePoller {
    fn next_pending(&self) -> Result<Option<Document>, StoreError> {
        self.store.oldest_uploaded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DocumentKind, DocumentStatus, NewDocument};
    use crate::store::MemoryStore;

    #[test]
    fn test_store_poller_returns_oldest_uploaded() {
        let store = Arc::new(MemoryStore::new());
        let poller = StorePoller::new(store.clone());
        assert!(poller.next_pending().expect("should poll").is_none());

        let document = store
            .insert_document(NewDocument {
                filename: "a.png".into(),
                source_path: "a.png".into(),
                kind: DocumentKind::Raster,
            })
            .expect("should insert");
        let pending = poller.next_pending().expect("should poll").expect("should find");
        assert_eq!(pending.id, document.id);

        store
            .transition_status(document.id, DocumentStatus::Uploaded, DocumentStatus::Processing)
            .expect("should claim");
        assert!(poller.next_pending().expect("should poll").is_none());
    }
}
