use crate::chunk::Chunk;

pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Packs blank-line separated paragraphs into chunks of bounded word count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    chunk_size: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

impl Chunker {
    #[must_use]
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Paragraphs are never split; one larger than the limit becomes a chunk
    /// of its own. Ids run from 0 in text order.
    #[must_use]
    pub fn split(&self, text: &str) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut words = 0;

        for paragraph in text.split("\n\n") {
            let paragraph = paragraph.trim_matches('\n');
            if paragraph.trim().is_empty() {
                continue;
            }
            let size = paragraph.split_whitespace().count();
            if words + size > self.chunk_size && !current.is_empty() {
                chunks.push(Chunk::new(chunks.len(), current.join("\n\n")));
                current.clear();
                words = 0;
            }
            current.push(paragraph);
            words += size;
        }

        if !current.is_empty() {
            chunks.push(Chunk::new(chunks.len(), current.join("\n\n")));
        }

        chunks
    }
}
