//! The user's knowledge folder: ingestion, storage, and keyword retrieval.

pub mod corpus;
pub mod ingest;
pub mod retriever;

pub use corpus::{CorpusIndex, Document};
pub use ingest::{FileHandle, FolderEntry, FolderPicker, IngestReport, LocalFolderPicker, ingest};
pub use retriever::{Retriever, Snippet};
