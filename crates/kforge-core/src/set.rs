//! Insertion-ordered set of documents keyed by identity

use indexmap::IndexMap;

use crate::document::{Document, DocumentKey};
use crate::error::{CoreError, Result};

/// Documents accumulated during a build
///
/// Identity (`kind`, `namespace`, `name`) is unique within a set.
#[derive(Debug, Clone, Default)]
pub struct DocumentSet {
    documents: IndexMap<DocumentKey, Entry>,
}

#[derive(Debug, Clone)]
struct Entry {
    document: Document,
    /// Component (or "builder") that contributed the document
    source: String,
}

impl DocumentSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document, rejecting duplicate identities
    pub fn insert(&mut self, document: Document, source: &str) -> Result<()> {
        let key = document.key();
        if let Some(existing) = self.documents.get(&key) {
            return Err(CoreError::DuplicateDocument {
                key: key.to_string(),
                source_name: format!("{} and {}", existing.source, source),
            });
        }
        self.documents.insert(
            key,
            Entry {
                document,
                source: source.to_string(),
            },
        );
        Ok(())
    }

    pub fn get(&self, key: &DocumentKey) -> Option<&Document> {
        self.documents.get(key).map(|e| &e.document)
    }

    pub fn contains(&self, key: &DocumentKey) -> bool {
        self.documents.contains_key(key)
    }

    /// Remove a document, keeping the order of the others
    pub fn remove(&mut self, key: &DocumentKey) -> Option<Document> {
        self.documents.shift_remove(key).map(|e| e.document)
    }

    /// Which component contributed a document
    pub fn source_of(&self, key: &DocumentKey) -> Option<&str> {
        self.documents.get(key).map(|e| e.source.as_str())
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Documents in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Document> {
        self.documents.values().map(|e| &e.document)
    }

    /// Mutable access in insertion order
    ///
    /// Identity changes made through this iterator are not re-keyed; use
    /// [`DocumentSet::rekey`] afterwards.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Document> {
        self.documents.values_mut().map(|e| &mut e.document)
    }

    pub fn keys(&self) -> impl Iterator<Item = &DocumentKey> {
        self.documents.keys()
    }

    /// Rebuild the index after identities were changed in place
    pub fn rekey(&mut self) -> Result<()> {
        let entries = std::mem::take(&mut self.documents);
        for (_, entry) in entries {
            self.insert(entry.document, &entry.source)?;
        }
        Ok(())
    }

    /// Consume the set, yielding documents in insertion order
    pub fn into_documents(self) -> Vec<Document> {
        self.documents.into_values().map(|e| e.document).collect()
    }
}
