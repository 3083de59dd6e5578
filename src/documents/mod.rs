
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::{RagError, Result};

/// A source text loaded from the corpus directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Path relative to the corpus root, `/`-separated
    pub id: String,
    pub source_path: String,
    pub raw_text: String,
}

/// Load every `.txt` file below `root`, ordered by document id
///
/// Files that are not valid UTF-8 are decoded lossily. Files containing only
/// whitespace are skipped.
#[inline]
pub fn load_documents<P: AsRef<Path>>(root: P) -> Result<Vec<Document>> {
    let root = root.as_ref();

    if !root.is_dir() {
        return Err(RagError::EmptyCorpus(format!(
            "documents directory {} does not exist",
            root.display()
        )));
    }

    let mut documents = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.path();
        let is_text = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"));
        if !is_text {
            continue;
        }

        let bytes = fs::read(path)?;
        let raw_text = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => {
                warn!("{} is not valid UTF-8, decoding lossily", path.display());
                String::from_utf8_lossy(e.as_bytes()).into_owned()
            }
        };

        if raw_text.trim().is_empty() {
            debug!("Skipping empty document {}", path.display());
            continue;
        }

        let relative = path.strip_prefix(root).unwrap_or(path);
        let id = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        documents.push(Document {
            id,
            source_path: path.display().to_string(),
            raw_text,
        });
    }

    documents.sort_by(|a, b| a.id.cmp(&b.id));

    info!(
        "Loaded {} documents from {}",
        documents.len(),
        root.display()
    );

    Ok(documents)
}

/// Digest identifying the exact content of a corpus
///
/// Covers every document's id and text in id order.
#[inline]
pub fn corpus_fingerprint(documents: &[Document]) -> String {
    let mut sorted: Vec<&Document> = documents.iter().collect();
    sorted.sort_by(|a, b| a.id.cmp(&b.id));

    let mut hasher = blake3::Hasher::new();
    for document in sorted {
        hasher.update(&(document.id.len() as u64).to_le_bytes());
        hasher.update(document.id.as_bytes());
        hasher.update(&(document.raw_text.len() as u64).to_le_bytes());
        hasher.update(document.raw_text.as_bytes());
    }
    hasher.finalize().to_hex().to_string()
}
