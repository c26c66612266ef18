use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use stockledger_core::{AggregateRoot, ExpectedVersion};
use stockledger_documents::{Document, DocumentFilter, DocumentId};

use crate::error::StoreError;

/// Persistence for documents.
pub trait DocumentStore: Send + Sync {
    fn load(&self, id: DocumentId) -> Result<Option<Document>, StoreError>;

    fn save(&self, document: &Document, expected: ExpectedVersion) -> Result<(), StoreError>;

    /// Documents matching `filter`, newest first. Soft-deleted ones are skipped.
    fn list(&self, filter: &DocumentFilter) -> Result<Vec<Document>, StoreError>;
}

impl<S> DocumentStore for Arc<S>
where
    S: DocumentStore + ?Sized,
{
    fn load(&self, id: DocumentId) -> Result<Option<Document>, StoreError> {
        (**self).load(id)
    }

    fn save(&self, document: &Document, expected: ExpectedVersion) -> Result<(), StoreError> {
        (**self).save(document, expected)
    }

    fn list(&self, filter: &DocumentFilter) -> Result<Vec<Document>, StoreError> {
        (**self).list(filter)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    documents: RwLock<HashMap<DocumentId, Document>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn load(&self, id: DocumentId) -> Result<Option<Document>, StoreError> {
        let documents = self
            .documents
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;
        Ok(documents.get(&id).cloned())
    }

    fn save(&self, document: &Document, expected: ExpectedVersion) -> Result<(), StoreError> {
        let id = document.id_typed();
        let mut documents = self
            .documents
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;

        let current = documents.get(&id).map_or(0, |d| d.version());
        if !expected.matches(current) {
            return Err(StoreError::Concurrency(format!(
                "document {id}: expected {expected:?}, found {current}"
            )));
        }

        documents.insert(id, document.clone());
        Ok(())
    }

    fn list(&self, filter: &DocumentFilter) -> Result<Vec<Document>, StoreError> {
        let documents = self
            .documents
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;

        let mut matched: Vec<Document> = documents
            .values()
            .filter(|d| filter.matches(d))
            .cloned()
            .collect();
        matched.sort_by_key(|d| {
            std::cmp::Reverse((d.audit().created.map(|stamp| stamp.at), d.id_typed()))
        });
        Ok(matched)
    }
}
