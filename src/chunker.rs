//! Document chunking — splits long text into overlapping, bounded segments.
//!
//! The splitter works on paragraph boundaries (blank lines) and never
//! fabricates partial-word chunks: a paragraph larger than the target size
//! becomes one oversized chunk rather than being force-split. When a chunk is
//! closed, the next one is seeded with the trailing `overlap` characters of
//! the previous chunk so retrieval keeps continuity across boundaries.

/// Paragraph-aware text splitter with a target chunk size and overlap
/// carry-forward, both in characters.
#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    target_size: usize,
    overlap: usize,
}

impl Chunker {
    /// `target_size` must be non-zero; `overlap` is conventionally smaller
    /// than `target_size` (a larger overlap still terminates, it just makes
    /// chunks mostly redundant).
    pub fn new(target_size: usize, overlap: usize) -> Self {
        assert!(target_size > 0, "chunk target size must be non-zero");
        Self {
            target_size,
            overlap,
        }
    }

    pub fn target_size(&self) -> usize {
        self.target_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split `text` into ordered chunks.
    ///
    /// Paragraphs (maximal runs of non-blank lines) are accumulated into a
    /// buffer; when the next paragraph would push the buffer past
    /// `target_size`, the buffer is emitted and a new one starts with the
    /// previous chunk's tail. Whitespace-only input yields no chunks. Output
    /// order equals input paragraph order; nothing is dropped or merged out
    /// of order.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        let mut chunks: Vec<String> = Vec::new();
        let mut current = String::new();

        for para in paragraphs(text) {
            if current.len() + para.len() > self.target_size {
                if !current.is_empty() {
                    chunks.push(std::mem::take(&mut current));
                }
                // Seed the next buffer with the previous chunk's tail.
                match chunks.last() {
                    Some(prev) if self.overlap > 0 => {
                        current = format!("{}\n\n{para}", tail_chars(prev, self.overlap));
                    }
                    _ => current = para.to_string(),
                }
            } else if current.is_empty() {
                current = para.to_string();
            } else {
                current.push_str("\n\n");
                current.push_str(para);
            }
        }

        if !current.is_empty() {
            chunks.push(current);
        }
        chunks
    }
}

/// Non-empty paragraphs of `text`, split on blank lines and trimmed.
fn paragraphs(text: &str) -> impl Iterator<Item = &str> {
    text.split("\n\n").map(str::trim).filter(|p| !p.is_empty())
}

/// The last `n` characters of `s`, respecting char boundaries.
fn tail_chars(s: &str, n: usize) -> &str {
    match s.char_indices().rev().nth(n.saturating_sub(1)) {
        Some((idx, _)) => &s[idx..],
        None => s,
    }
}
