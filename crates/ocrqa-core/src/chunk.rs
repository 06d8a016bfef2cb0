use serde::{Deserialize, Serialize};

/// A bounded unit of cleaned text processed independently of its neighbors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: usize,
    pub text: String,
    pub word_count: usize,
}

impl Chunk {
    #[must_use]
    pub fn new(id: usize, text: impl Into<String>) -> Self {
        let text = text.into();
        let word_count = text.split_whitespace().count();
        Self {
            id,
            text,
            word_count,
        }
    }

    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Lines of the chunk with their byte offsets, newline excluded.
    pub fn lines(&self) -> impl Iterator<Item = (usize, &str)> {
        line_offsets(&self.text)
    }
}

pub(crate) fn line_offsets(text: &str) -> impl Iterator<Item = (usize, &str)> {
    let mut offset = 0;
    text.split('\n').map(move |line| {
        let start = offset;
        offset += line.len() + 1;
        (start, line.strip_suffix('\r').unwrap_or(line))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_count() {
        let chunk = Chunk::new(3, "Pin 7: GPIO_12\n\nVDD_CORE = 1.8V");
        assert_eq!(chunk.id, 3);
        assert_eq!(chunk.word_count, 6);
        assert!(!chunk.is_blank());
        assert!(Chunk::new(0, " \n ").is_blank());
    }

    #[test]
    fn test_line_offsets() {
        let chunk = Chunk::new(0, "ab\r\ncd\n\nef");
        let lines: Vec<_> = chunk.lines().collect();
        assert_eq!(lines, vec![(0, "ab"), (4, "cd"), (7, ""), (8, "ef")]);
        assert_eq!(&chunk.text[4..6], "cd");
    }
}
