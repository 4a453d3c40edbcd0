//! In-memory document corpus.

use std::collections::BTreeMap;

/// One ingested text document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub name: String,
    pub path: String,
    pub content: String,
}

impl Document {
    pub fn new(name: impl Into<String>, path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            content: content.into(),
        }
    }
}

/// A complete snapshot of ingested documents, keyed by path.
///
/// Built in full before it is published; the controller swaps whole
/// snapshots behind an `Arc`, so readers never see a half-built corpus.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorpusIndex {
    documents: BTreeMap<String, Document>,
}

impl CorpusIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a document, replacing any previous one at the same path.
    pub fn insert(&mut self, document: Document) {
        self.documents.insert(document.path.clone(), document);
    }

    pub fn get(&self, path: &str) -> Option<&Document> {
        self.documents.get(path)
    }

    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.documents.values()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl FromIterator<Document> for CorpusIndex {
    fn from_iter<I: IntoIterator<Item = Document>>(iter: I) -> Self {
        let mut index = Self::new();
        for document in iter {
            index.insert(document);
        }
        index
    }
}

/// Truncate to at most `max_chars` characters, on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte, _)) => &text[..byte],
        None => text,
    }
}
