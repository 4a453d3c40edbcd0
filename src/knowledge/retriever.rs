//! Keyword retrieval over the corpus.
//!
//! Documents are pre-filtered by raw occurrence count of query tokens; the
//! surviving documents' paragraphs are then ranked by how many distinct
//! query tokens each contains.

use serde::Serialize;

use super::corpus::{CorpusIndex, truncate_chars};

/// A ranked excerpt from one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snippet {
    /// Name of the document the paragraph came from.
    pub source: String,
    pub text: String,
    /// Number of distinct query tokens present in the paragraph.
    pub score: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct Retriever {
    limit: usize,
    max_chars: usize,
}

impl Default for Retriever {
    fn default() -> Self {
        Self {
            limit: 3,
            max_chars: 500,
        }
    }
}

impl Retriever {
    pub fn new(limit: usize, max_chars: usize) -> Self {
        Self { limit, max_chars }
    }

    /// Top `limit` paragraphs for `query`, best first. Empty when nothing matches.
    pub fn retrieve(&self, query: &str, corpus: &CorpusIndex) -> Vec<Snippet> {
        let tokens = tokenize(query);
        if tokens.is_empty() || corpus.is_empty() || self.limit == 0 {
            return Vec::new();
        }

        let mut candidates = Vec::new();
        for document in corpus.documents() {
            let lowered = document.content.to_lowercase();
            if document_signal(&lowered, &tokens) == 0 {
                continue;
            }
            for paragraph in paragraphs(&document.content) {
                let lowered = paragraph.to_lowercase();
                let score = tokens.iter().filter(|t| lowered.contains(t.as_str())).count();
                if score > 0 {
                    candidates.push((score, document.name.as_str(), paragraph));
                }
            }
        }

        // Stable: ties keep corpus order, which is path order.
        candidates.sort_by(|a, b| b.0.cmp(&a.0));
        let snippets: Vec<Snippet> = candidates
            .into_iter()
            .take(self.limit)
            .map(|(score, source, paragraph)| Snippet {
                source: source.to_string(),
                text: truncate_chars(paragraph, self.max_chars).to_string(),
                score,
            })
            .collect();
        tracing::debug!(tokens = tokens.len(), snippets = snippets.len(), "Retrieval done");
        snippets
    }
}

/// Lower-cased words longer than two characters, deduplicated in order.
pub fn tokenize(query: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    for word in query.split(|c: char| !c.is_alphanumeric()) {
        if word.chars().count() <= 2 {
            continue;
        }
        let word = word.to_lowercase();
        if !tokens.contains(&word) {
            tokens.push(word);
        }
    }
    tokens
}

/// Total substring occurrences of every token in already lower-cased text.
fn document_signal(lowered: &str, tokens: &[String]) -> usize {
    tokens.iter().map(|t| lowered.matches(t.as_str()).count()).sum()
}

/// Split on blank (or whitespace-only) lines; trims each paragraph.
fn paragraphs(content: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start: Option<usize> = None;
    let mut end = 0;
    let mut offset = 0;

    for line in content.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();
        if line.trim().is_empty() {
            if let Some(s) = start.take() {
                out.push(content[s..end].trim());
            }
        } else {
            start.get_or_insert(line_start);
            end = offset;
        }
    }
    if let Some(s) = start {
        out.push(content[s..end].trim());
    }
    out
}
