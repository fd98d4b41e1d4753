use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// How normalized text is split before dedupe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkStrategy {
    /// Fixed window of `n` characters; the last chunk may be shorter.
    Window(usize),
    /// One chunk per line.
    Lines,
}

impl ChunkStrategy {
    /// Joins chunks back into text. Windows are contiguous slices; lines
    /// lost their newline when split.
    pub fn separator(self) -> &'static str {
        match self {
            ChunkStrategy::Window(_) => "",
            ChunkStrategy::Lines => "\n",
        }
    }
}

impl Default for ChunkStrategy {
    fn default() -> Self {
        ChunkStrategy::Window(1000)
    }
}

/// Collapse whitespace runs inside each line, trim, and drop blank lines.
pub fn normalize(raw: &str) -> String {
    raw.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn chunk(text: &str, strategy: ChunkStrategy) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    match strategy {
        ChunkStrategy::Lines => text.lines().map(str::to_string).collect(),
        ChunkStrategy::Window(size) => {
            let chars: Vec<char> = text.chars().collect();
            chars
                .chunks(size.max(1))
                .map(|c| c.iter().collect())
                .collect()
        }
    }
}

/// Drop exact duplicate chunks, keeping first occurrences in order.
/// Returns the kept chunks and how many were removed.
pub fn dedupe(chunks: Vec<String>) -> (Vec<String>, usize) {
    let total = chunks.len();
    let mut seen: HashSet<Vec<u8>> = HashSet::with_capacity(total);
    let kept: Vec<String> = chunks
        .into_iter()
        .filter(|c| seen.insert(Sha256::digest(c.as_bytes()).to_vec()))
        .collect();
    let removed = total - kept.len();
    (kept, removed)
}
