
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::documents::Document;
use crate::{RagError, Result};

/// A bounded, contiguous slice of a document's text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// `{document_id}#{index}`
    pub id: String,
    pub document_id: String,
    /// Path of the file the document was loaded from
    pub source_path: String,
    pub text: String,
    /// Offset of the first character within the document, in characters
    pub start_offset: usize,
}

/// Configuration for content chunking, lengths are counted in characters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum number of characters in a chunk
    pub max_chunk_length: usize,
    /// Characters shared by consecutive chunks of the same document
    pub overlap_length: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            max_chunk_length: 1000,
            overlap_length: 200,
        }
    }
}

/// Fixed-window splitter with overlap
#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    #[inline]
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        if config.max_chunk_length == 0 {
            return Err(RagError::InvalidConfig(
                "max_chunk_length must be greater than 0".to_string(),
            ));
        }

        if config.overlap_length >= config.max_chunk_length {
            return Err(RagError::InvalidConfig(format!(
                "overlap_length ({}) must be smaller than max_chunk_length ({})",
                config.overlap_length, config.max_chunk_length
            )));
        }

        Ok(Self { config })
    }

    #[inline]
    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    /// Distance between the starts of consecutive windows
    #[inline]
    pub fn step(&self) -> usize {
        self.config.max_chunk_length - self.config.overlap_length
    }

    /// Split a document into windows of at most `max_chunk_length` characters
    ///
    /// Every window after the first starts `step()` characters after its
    /// predecessor, so neighbours share exactly `overlap_length` characters.
    /// The last window may be shorter. Empty text yields no chunks.
    #[inline]
    pub fn split(&self, document: &Document) -> Result<Vec<Chunk>> {
        let text = document.raw_text.as_str();

        // Byte offset of every character, plus the end of the string
        let boundaries: Vec<usize> = text
            .char_indices()
            .map(|(offset, _)| offset)
            .chain(std::iter::once(text.len()))
            .collect();
        let char_count = boundaries.len() - 1;

        let mut chunks = Vec::new();
        let mut start = 0;

        while start < char_count {
            let end = (start + self.config.max_chunk_length).min(char_count);
            let slice = text.get(boundaries[start]..boundaries[end]).ok_or_else(|| {
                RagError::InvalidConfig(format!(
                    "Chunk boundary {}..{} is not a character boundary in {}",
                    start, end, document.id
                ))
            })?;

            chunks.push(Chunk {
                id: format!("{}#{}", document.id, chunks.len()),
                document_id: document.id.clone(),
                source_path: document.source_path.clone(),
                text: slice.to_string(),
                start_offset: start,
            });

            if end == char_count {
                break;
            }
            start += self.step();
        }

        debug!(
            "Split document '{}' ({} chars) into {} chunks",
            document.id,
            char_count,
            chunks.len()
        );

        Ok(chunks)
    }

    /// Split every document, preserving document order
    #[inline]
    pub fn split_all(&self, documents: &[Document]) -> Result<Vec<Chunk>> {
        let mut chunks = Vec::new();
        for document in documents {
            chunks.extend(self.split(document)?);
        }
        Ok(chunks)
    }
}
