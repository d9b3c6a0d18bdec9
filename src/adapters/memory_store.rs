//! In-process document store backed by a concurrent map.

use dashmap::DashMap;
use tracing::{debug, info};

use crate::domain::document::Document;
use crate::domain::error::FundbookError;
use crate::domain::fund::FundId;
use crate::ports::document_store::DocumentStore;

#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: DashMap<FundId, Document>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl DocumentStore for MemoryStore {
    fn save(&self, mut document: Document) -> Result<FundId, FundbookError> {
        let id = document.ensure_id()?;
        debug!(%id, "saving document");
        self.documents.insert(id.clone(), document);
        Ok(id)
    }

    fn find_by_id(&self, id: &FundId) -> Result<Option<Document>, FundbookError> {
        Ok(self.documents.get(id).map(|doc| doc.value().clone()))
    }

    fn find_all(&self) -> Result<Vec<Document>, FundbookError> {
        let mut entries: Vec<(FundId, Document)> = self
            .documents
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(entries.into_iter().map(|(_, doc)| doc).collect())
    }

    fn delete_by_id(&self, id: &FundId) -> Result<bool, FundbookError> {
        Ok(self.documents.remove(id).is_some())
    }

    fn delete_all(&self) -> Result<(), FundbookError> {
        let count = self.documents.len();
        self.documents.clear();
        info!(count, "cleared memory store");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::document::{ID_FIELD, Value};

    fn named(name: &str) -> Document {
        let mut doc = Document::new();
        doc.insert("name", name);
        doc
    }

    #[test]
    fn save_assigns_native_id() {
        let store = MemoryStore::new();
        let id = store.save(named("Growth")).unwrap();
        let stored = store.find_by_id(&id).unwrap().unwrap();
        assert!(matches!(stored.get(ID_FIELD), Some(Value::ObjectId(_))));
        assert_eq!(stored.get("name"), Some(&Value::from("Growth")));
    }

    #[test]
    fn save_with_id_replaces() {
        let store = MemoryStore::new();
        let mut doc = named("Growth");
        doc.insert(ID_FIELD, "fund-1");
        store.save(doc.clone()).unwrap();
        doc.insert("name", "Income");
        let id = store.save(doc).unwrap();

        assert_eq!(id, FundId::new("fund-1"));
        assert_eq!(store.len(), 1);
        let stored = store.find_by_id(&id).unwrap().unwrap();
        assert_eq!(stored.get("name"), Some(&Value::from("Income")));
    }

    #[test]
    fn find_missing_returns_none() {
        let store = MemoryStore::new();
        assert!(store.find_by_id(&FundId::new("nope")).unwrap().is_none());
    }

    #[test]
    fn delete_by_id_and_all() {
        let store = MemoryStore::new();
        let a = store.save(named("A")).unwrap();
        store.save(named("B")).unwrap();
        assert_eq!(store.find_all().unwrap().len(), 2);

        assert!(store.delete_by_id(&a).unwrap());
        assert!(!store.delete_by_id(&a).unwrap());
        assert_eq!(store.len(), 1);

        store.delete_all().unwrap();
        assert!(store.is_empty());
    }
}
