//! Corpus loading and document-to-chunk processing.
//!
//! Walks a directory for text-like files, keys each one by its normalised
//! relative path (optionally prefixed, e.g. `uploaded:`), and turns documents
//! into `Chunk`s with deterministic ids.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use tracing::{debug, info};

use crate::chunker::{Chunker, ChunkingConfig};
use crate::error::{Error, Result};
use crate::types::{Chunk, Document};

const TEXT_EXTENSIONS: &[&str] = &[
    "md", "markdown", "txt", "rst", "py", "js", "ts", "jsx", "tsx", "java", "cpp", "c", "h", "hpp", "cs", "php", "rb",
    "go", "rs", "swift", "kt", "scala", "css", "html", "htm", "scss", "json", "yml", "yaml", "xml", "toml", "cfg",
    "ini", "conf", "sh", "bash", "zsh", "ps1", "bat", "sql", "r", "lua", "ipynb",
];
const TEXT_FILE_NAMES: &[&str] =
    &["readme", "license", "changelog", "contributing", "authors", "makefile", "dockerfile", "requirements"];
const SKIPPED_DIRS: &[&str] = &[".git", "node_modules", "target", "__pycache__", ".venv", "venv", "dist", "build"];

pub const DEFAULT_MAX_FILE_BYTES: u64 = 500_000;

#[derive(Debug, Clone)]
pub struct DataProcessor {
    chunker: Chunker,
    max_file_bytes: u64,
}

impl Default for DataProcessor {
    fn default() -> Self {
        Self::new(ChunkingConfig::default())
    }
}

impl DataProcessor {
    pub fn new(chunking: ChunkingConfig) -> Self {
        Self { chunker: Chunker::new(chunking), max_file_bytes: DEFAULT_MAX_FILE_BYTES }
    }

    pub fn with_max_file_bytes(mut self, limit: u64) -> Self {
        self.max_file_bytes = limit;
        self
    }

    pub fn chunking(&self) -> &ChunkingConfig {
        self.chunker.config()
    }

    pub fn chunk_document(&self, doc: &Document) -> Vec<Chunk> {
        self.chunker
            .split(&doc.text)
            .into_iter()
            .enumerate()
            .map(|(ordinal, text)| Chunk::new(&doc.key, ordinal, text))
            .collect()
    }

    /// Chunks every document. A key that appears twice keeps only its last text,
    /// so chunk ids stay unique.
    pub fn process_corpus(&self, corpus: &[Document]) -> Vec<Chunk> {
        let mut latest: BTreeMap<&str, &Document> = BTreeMap::new();
        for doc in corpus {
            latest.insert(doc.key.as_str(), doc);
        }
        let chunks: Vec<Chunk> = latest.values().flat_map(|doc| self.chunk_document(doc)).collect();
        debug!(documents = latest.len(), chunks = chunks.len(), "processed corpus");
        chunks
    }

    /// Reads text-like files under `root` into documents keyed by relative path.
    pub fn load_directory(&self, root: &Path, key_prefix: Option<&str>) -> Result<Vec<Document>> {
        if !root.is_dir() {
            return Err(Error::NotFound(root.display().to_string()));
        }
        let mut docs = Vec::new();
        let walker = walkdir::WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_skipped_dir(e));
        for entry in walker.filter_map(std::result::Result::ok).filter(|e| e.file_type().is_file()) {
            let path = entry.path();
            if !is_text_path(path) {
                continue;
            }
            let size = entry.metadata().map(|m| m.len()).unwrap_or(u64::MAX);
            if size > self.max_file_bytes {
                debug!(path = %path.display(), size, "skipping oversized file");
                continue;
            }
            let relative = path.strip_prefix(root).unwrap_or(path).to_string_lossy().to_string();
            let key = normalize_repo_path(&relative);
            if key.is_empty() {
                continue;
            }
            let text = read_file_content(path)?;
            docs.push(Document::new(format!("{}{key}", key_prefix.unwrap_or("")), text));
        }
        info!(root = %root.display(), documents = docs.len(), "loaded corpus directory");
        Ok(docs)
    }
}

/// Builds a corpus from a `key -> text` map, ordered by key.
pub fn corpus_from_map<I, K, V>(entries: I) -> Vec<Document>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let sorted: BTreeMap<String, String> = entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
    sorted.into_iter().map(|(key, text)| Document { key, text }).collect()
}

/// Normalises a repository-relative path: forward slashes, no `.`/`..` segments.
/// Returns an empty string for paths that would escape the root.
pub fn normalize_repo_path(p: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in p.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.pop().is_none() {
                    return String::new();
                }
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

fn is_text_path(path: &Path) -> bool {
    let name = path.file_name().map(|n| n.to_string_lossy().to_lowercase()).unwrap_or_default();
    let by_ext = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| TEXT_EXTENSIONS.contains(&ext.to_lowercase().as_str()));
    by_ext || TEXT_FILE_NAMES.iter().any(|n| name.starts_with(n))
}

fn is_skipped_dir(entry: &walkdir::DirEntry) -> bool {
    entry.file_type().is_dir() && entry.file_name().to_str().is_some_and(|n| SKIPPED_DIRS.contains(&n))
}

fn read_file_content(file_path: &Path) -> Result<String> {
    match fs::read_to_string(file_path) {
        Ok(content) => Ok(content),
        Err(_) => {
            let bytes = fs::read(file_path).map_err(|e| Error::NotFound(format!("{}: {e}", file_path.display())))?;
            Ok(String::from_utf8_lossy(&bytes).to_string())
        }
    }
}
