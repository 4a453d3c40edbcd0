//! Knowledge folder ingestion.
//!
//! A [`FolderPicker`] yields a tree of [`FolderEntry`] handles; [`ingest`]
//! flattens it into a fresh [`CorpusIndex`]. Hidden entries and files outside
//! the text allow-list are ignored, unreadable files are skipped, and the
//! caller only ever receives a finished index.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs;

use crate::error::IngestError;

use super::corpus::{CorpusIndex, Document, truncate_chars};

/// Extensions treated as text documents.
pub const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "markdown", "csv", "json", "yaml", "yml", "toml", "log", "html", "htm", "xml",
    "rst", "org",
];

/// A readable file inside a picked folder.
#[async_trait]
pub trait FileHandle: Send + Sync {
    fn name(&self) -> &str;

    /// Path relative to the picked folder root, `/`-separated.
    fn path(&self) -> &str;

    /// Read and decode the file as text.
    async fn read(&self) -> Result<String, IngestError>;
}

/// A node in a picked folder tree.
#[derive(Clone)]
pub enum FolderEntry {
    File(Arc<dyn FileHandle>),
    Directory {
        name: String,
        entries: Vec<FolderEntry>,
    },
}

impl FolderEntry {
    pub fn name(&self) -> &str {
        match self {
            Self::File(handle) => handle.name(),
            Self::Directory { name, .. } => name,
        }
    }
}

impl std::fmt::Debug for FolderEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(handle) => f.debug_tuple("File").field(&handle.path()).finish(),
            Self::Directory { name, entries } => f
                .debug_struct("Directory")
                .field("name", name)
                .field("entries", entries)
                .finish(),
        }
    }
}

/// Source of folder trees, typically backed by a user prompt.
#[async_trait]
pub trait FolderPicker: Send + Sync {
    /// Pick a folder. `Ok(None)` means the user cancelled.
    async fn pick(&self, hint: Option<&str>) -> Result<Option<Vec<FolderEntry>>, IngestError>;
}

/// Outcome of a completed ingestion.
#[derive(Debug, Default)]
pub struct IngestReport {
    pub index: CorpusIndex,
    /// Paths of allow-listed files that could not be read as text.
    pub skipped: Vec<String>,
}

pub fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

pub fn has_text_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| TEXT_EXTENSIONS.iter().any(|t| t.eq_ignore_ascii_case(ext)))
}

/// Build a fresh index from a folder tree. Per-file failures are logged and skipped.
pub async fn ingest(entries: &[FolderEntry], max_chars: usize) -> IngestReport {
    let mut files = Vec::new();
    collect_files(entries, &mut files);

    let mut report = IngestReport::default();
    for handle in files {
        match handle.read().await {
            Ok(content) => {
                let content = truncate_chars(&content, max_chars).to_string();
                report
                    .index
                    .insert(Document::new(handle.name(), handle.path(), content));
            }
            Err(e) => {
                tracing::warn!(path = handle.path(), "Skipping file: {e}");
                report.skipped.push(handle.path().to_string());
            }
        }
    }

    tracing::info!(
        documents = report.index.len(),
        skipped = report.skipped.len(),
        "Knowledge folder ingested"
    );
    report
}

fn collect_files(entries: &[FolderEntry], out: &mut Vec<Arc<dyn FileHandle>>) {
    for entry in entries {
        if is_hidden(entry.name()) {
            continue;
        }
        match entry {
            FolderEntry::Directory { entries, .. } => collect_files(entries, out),
            FolderEntry::File(handle) if has_text_extension(handle.name()) => {
                out.push(Arc::clone(handle));
            }
            FolderEntry::File(handle) => {
                tracing::debug!(path = handle.path(), "Ignoring non-text file");
            }
        }
    }
}

/// A file on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalFile {
    name: String,
    relative: String,
    full_path: PathBuf,
}

#[async_trait]
impl FileHandle for LocalFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn path(&self) -> &str {
        &self.relative
    }

    async fn read(&self) -> Result<String, IngestError> {
        let bytes = fs::read(&self.full_path)
            .await
            .map_err(|e| IngestError::Read {
                path: self.relative.clone(),
                reason: e.to_string(),
            })?;
        String::from_utf8(bytes).map_err(|_| IngestError::NotText {
            path: self.relative.clone(),
        })
    }
}

/// Picks folders by path on the local disk.
///
/// The hint (a typed path) wins over the configured default. With neither,
/// the pick counts as cancelled.
#[derive(Debug, Clone, Default)]
pub struct LocalFolderPicker {
    default_path: Option<PathBuf>,
}

impl LocalFolderPicker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default(path: impl Into<PathBuf>) -> Self {
        Self {
            default_path: Some(path.into()),
        }
    }

    fn walk<'a>(
        root: &'a Path,
        dir: &'a Path,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Vec<FolderEntry>, IngestError>> + Send + 'a>>
    {
        Box::pin(async move {
            let access = |e: std::io::Error| IngestError::Access {
                path: dir.display().to_string(),
                reason: e.to_string(),
            };
            let mut entries = Vec::new();
            let mut read_dir = fs::read_dir(dir).await.map_err(access)?;
            while let Some(entry) = read_dir.next_entry().await.map_err(access)? {
                let path = entry.path();
                let name = entry.file_name().to_string_lossy().to_string();
                let Ok(metadata) = entry.metadata().await else {
                    tracing::warn!(path = %path.display(), "Cannot stat entry, skipping");
                    continue;
                };

                if metadata.is_dir() {
                    if is_hidden(&name) {
                        continue;
                    }
                    let children = match Self::walk(root, &path).await {
                        Ok(children) => children,
                        Err(e) => {
                            tracing::warn!("Skipping subfolder: {e}");
                            continue;
                        }
                    };
                    entries.push(FolderEntry::Directory {
                        name,
                        entries: children,
                    });
                } else if metadata.is_file() {
                    let relative = path
                        .strip_prefix(root)
                        .unwrap_or(&path)
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy())
                        .collect::<Vec<_>>()
                        .join("/");
                    entries.push(FolderEntry::File(Arc::new(LocalFile {
                        name,
                        relative,
                        full_path: path,
                    })));
                }
            }
            Ok(entries)
        })
    }
}

#[async_trait]
impl FolderPicker for LocalFolderPicker {
    async fn pick(&self, hint: Option<&str>) -> Result<Option<Vec<FolderEntry>>, IngestError> {
        let chosen = hint
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(expand_home)
            .or_else(|| self.default_path.clone());
        let Some(root) = chosen else {
            return Ok(None);
        };

        let metadata = fs::metadata(&root).await.map_err(|e| IngestError::Access {
            path: root.display().to_string(),
            reason: e.to_string(),
        })?;
        if !metadata.is_dir() {
            return Err(IngestError::Access {
                path: root.display().to_string(),
                reason: "not a directory".to_string(),
            });
        }

        tracing::info!(path = %root.display(), "Reading knowledge folder");
        Self::walk(&root, &root).await.map(Some)
    }
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~")
        && (rest.is_empty() || rest.starts_with('/'))
        && let Some(home) = std::env::var_os("HOME")
    {
        return PathBuf::from(home).join(rest.trim_start_matches('/'));
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MemFile {
        name: String,
        path: String,
        content: Option<String>,
    }

    #[async_trait]
    impl FileHandle for MemFile {
        fn name(&self) -> &str {
            &self.name
        }
        fn path(&self) -> &str {
            &self.path
        }
        async fn read(&self) -> Result<String, IngestError> {
            self.content.clone().ok_or_else(|| IngestError::NotText {
                path: self.path.clone(),
            })
        }
    }

    fn file(path: &str, content: Option<&str>) -> FolderEntry {
        let name = path.rsplit('/').next().unwrap_or(path).to_string();
        FolderEntry::File(Arc::new(MemFile {
            name,
            path: path.to_string(),
            content: content.map(str::to_string),
        }))
    }

    fn dir(name: &str, entries: Vec<FolderEntry>) -> FolderEntry {
        FolderEntry::Directory {
            name: name.to_string(),
            entries,
        }
    }

    #[tokio::test]
    async fn recursive_with_filters() {
        let tree = vec![
            file("notes.txt", Some("hello")),
            file("photo.png", Some("binary")),
            file(".secret.md", Some("hidden")),
            dir(
                "projects",
                vec![
                    file("projects/plan.MD", Some("plan")),
                    dir("deep", vec![file("projects/deep/data.csv", Some("a,b"))]),
                ],
            ),
            dir(".git", vec![file(".git/config.txt", Some("x"))]),
        ];
        let report = ingest(&tree, 1000).await;
        let paths: Vec<&str> = report.index.documents().map(|d| d.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["notes.txt", "projects/deep/data.csv", "projects/plan.MD"]
        );
        assert!(report.skipped.is_empty());
    }

    #[tokio::test]
    async fn unreadable_files_are_skipped() {
        let tree = vec![file("good.md", Some("ok")), file("bad.txt", None)];
        let report = ingest(&tree, 1000).await;
        assert_eq!(report.index.len(), 1);
        assert_eq!(report.skipped, vec!["bad.txt"]);
    }

    #[tokio::test]
    async fn content_is_truncated() {
        let tree = vec![file("long.txt", Some("abcdefghij"))];
        let report = ingest(&tree, 4).await;
        assert_eq!(report.index.get("long.txt").unwrap().content, "abcd");
    }

    #[test]
    fn extension_allow_list() {
        assert!(has_text_extension("a.txt"));
        assert!(has_text_extension("README.Markdown"));
        assert!(!has_text_extension("a.pdf"));
        assert!(!has_text_extension("Makefile"));
    }

    #[tokio::test]
    async fn local_picker_reads_tree() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        std::fs::create_dir_all(root.join("sub")).unwrap();
        std::fs::create_dir_all(root.join(".hidden")).unwrap();
        std::fs::write(root.join("a.txt"), "alpha").unwrap();
        std::fs::write(root.join("sub/b.md"), "beta").unwrap();
        std::fs::write(root.join(".hidden/c.txt"), "gamma").unwrap();
        std::fs::write(root.join("bin.txt"), [0xff, 0xfe, 0x00]).unwrap();

        let picker = LocalFolderPicker::new();
        let tree = picker
            .pick(Some(root.to_str().unwrap()))
            .await
            .unwrap()
            .unwrap();
        let report = ingest(&tree, 1000).await;

        assert_eq!(report.index.len(), 2);
        assert_eq!(report.index.get("sub/b.md").unwrap().content, "beta");
        assert_eq!(report.skipped, vec!["bin.txt"]);
    }

    #[tokio::test]
    async fn local_picker_without_path_is_cancel() {
        let picker = LocalFolderPicker::new();
        assert!(picker.pick(None).await.unwrap().is_none());
        assert!(picker.pick(Some("   ")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn local_picker_missing_folder_is_access_error() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("nope");
        let err = LocalFolderPicker::with_default(&missing)
            .pick(None)
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Access { .. }));
    }

    #[test]
    fn expand_home_leaves_plain_paths() {
        assert_eq!(expand_home("/tmp/x"), PathBuf::from("/tmp/x"));
        assert_eq!(expand_home("~user/x"), PathBuf::from("~user/x"));
    }
}
