//! Chunk index
//!
//! Partitions the byte stream into chunks of at most
//! [`MAX_CPP_PER_CHUNK`](crate::constants::chunks::MAX_CPP_PER_CHUNK)
//! codepoints, each node carrying `(num_bytes, num_codepoints)`. The tree
//! resolves conversions to chunk granularity; a streaming cursor decodes
//! within the chunk and reuses its state for monotone query sequences.

use crate::constants::chunks::{MAX_CPP_PER_CHUNK, MERGE_THRESHOLD};
use crate::encoding::Encoding;
use crate::tree::{FindResult, OstTree, Step, Synthesized};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkInfo {
    pub bytes: usize,
    pub codepoints: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkSummary {
    pub bytes: usize,
    pub codepoints: usize,
    pub chunks: usize,
}

impl Synthesized for ChunkSummary {
    type Value = ChunkInfo;

    fn from_value(value: &ChunkInfo) -> Self {
        Self {
            bytes: value.bytes,
            codepoints: value.codepoints,
            chunks: 1,
        }
    }

    fn add(&mut self, other: &Self) {
        self.bytes += other.bytes;
        self.codepoints += other.codepoints;
        self.chunks += other.chunks;
    }
}

/// A chunk located by one of the coordinate lookups.
#[derive(Debug, Clone, Copy)]
pub struct LocatedChunk {
    pub index: usize,
    pub prefix: ChunkSummary,
    pub info: ChunkInfo,
}

pub struct ChunkIndex {
    tree: OstTree<ChunkSummary>,
}

impl ChunkIndex {
    pub fn new() -> Self {
        Self {
            tree: OstTree::new(),
        }
    }

    pub fn from_chunks(chunks: Vec<ChunkInfo>) -> Self {
        debug_assert!(chunks.iter().all(|c| c.codepoints >= 1));
        Self {
            tree: OstTree::from_vec(chunks),
        }
    }

    pub fn num_bytes(&self) -> usize {
        self.tree.summary().bytes
    }

    pub fn num_codepoints(&self) -> usize {
        self.tree.summary().codepoints
    }

    pub fn num_chunks(&self) -> usize {
        self.tree.len()
    }

    pub fn chunk(&self, index: usize) -> Option<ChunkInfo> {
        self.tree.get(index).copied()
    }

    pub fn chunks(&self) -> impl Iterator<Item = &ChunkInfo> {
        self.tree.iter()
    }

    /// Chunk containing codepoint `cp`; `None` when `cp` is past the end.
    pub fn locate_by_codepoint(&self, cp: usize) -> Option<LocatedChunk> {
        self.tree
            .find_by(|before: &ChunkSummary, value: &ChunkInfo| {
                if cp < before.codepoints {
                    Step::Left
                } else if cp < before.codepoints + value.codepoints {
                    Step::Here
                } else {
                    Step::Right
                }
            })
            .map(|FindResult { index, prefix }| LocatedChunk {
                index,
                prefix,
                info: *self.tree.get(index).unwrap(),
            })
    }

    /// Chunk containing byte `byte`; `None` when past the end.
    pub fn locate_by_byte(&self, byte: usize) -> Option<LocatedChunk> {
        self.tree
            .find_by(|before: &ChunkSummary, value: &ChunkInfo| {
                if byte < before.bytes {
                    Step::Left
                } else if byte < before.bytes + value.bytes {
                    Step::Here
                } else {
                    Step::Right
                }
            })
            .map(|FindResult { index, prefix }| LocatedChunk {
                index,
                prefix,
                info: *self.tree.get(index).unwrap(),
            })
    }

    /// Cumulative `(codepoints, bytes)` before chunk `index`.
    pub fn prefix(&self, index: usize) -> ChunkSummary {
        self.tree.prefix(index)
    }

    /// Replace chunks `[range]` with `replacement`, then merge small chunks
    /// at the seams so no two adjacent chunks are both underfull.
    pub fn splice(&mut self, range: std::ops::Range<usize>, replacement: Vec<ChunkInfo>) {
        let replacement: Vec<ChunkInfo> =
            replacement.into_iter().filter(|c| c.codepoints > 0).collect();
        let inserted = replacement.len();
        let start = range.start;
        self.tree.splice(range, replacement);

        // Seam merges over the touched boundaries. A successful merge
        // re-examines the same position, since the merged chunk gets a new
        // right neighbor.
        let mut at = start.saturating_sub(1);
        let mut window = inserted + 2;
        while window > 0 && at + 1 < self.tree.len() {
            if !self.try_merge_at(at) {
                at += 1;
            }
            window -= 1;
        }
    }

    /// Merge chunks `index` and `index + 1` when either is underfull and the
    /// combination fits. Returns true when a merge happened.
    fn try_merge_at(&mut self, index: usize) -> bool {
        let (a, b) = match (self.tree.get(index).copied(), self.tree.get(index + 1).copied()) {
            (Some(a), Some(b)) => (a, b),
            _ => return false,
        };
        let combined = a.codepoints + b.codepoints;
        if combined > MAX_CPP_PER_CHUNK {
            return false;
        }
        if a.codepoints >= MERGE_THRESHOLD && b.codepoints >= MERGE_THRESHOLD {
            return false;
        }
        self.tree.splice(
            index..index + 2,
            vec![ChunkInfo {
                bytes: a.bytes + b.bytes,
                codepoints: combined,
            }],
        );
        true
    }

    /// Streaming conversion cursor over this index. `bytes` must be the
    /// buffer contents the index was built from.
    pub fn cursor<'a>(&'a self, encoding: &'a Encoding, bytes: &'a [u8]) -> ChunkCursor<'a> {
        ChunkCursor {
            index: self,
            encoding,
            bytes,
            cp: 0,
            byte: 0,
        }
    }
}

impl Default for ChunkIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for ChunkIndex {
    fn clone(&self) -> Self {
        Self {
            tree: self.tree.clone(),
        }
    }
}

impl std::fmt::Debug for ChunkIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkIndex")
            .field("chunks", &self.num_chunks())
            .field("codepoints", &self.num_codepoints())
            .field("bytes", &self.num_bytes())
            .finish()
    }
}

/// Group decoded codepoint byte-lengths into maximal chunks.
pub fn chunks_of_codepoints(codepoint_byte_lens: &[usize]) -> Vec<ChunkInfo> {
    let mut chunks = Vec::new();
    let mut current = ChunkInfo {
        bytes: 0,
        codepoints: 0,
    };
    for &len in codepoint_byte_lens {
        current.bytes += len;
        current.codepoints += 1;
        if current.codepoints == MAX_CPP_PER_CHUNK {
            chunks.push(current);
            current = ChunkInfo {
                bytes: 0,
                codepoints: 0,
            };
        }
    }
    if current.codepoints > 0 {
        chunks.push(current);
    }
    chunks
}

/// Codepoint/byte converter with a decode position that is reused across
/// monotone query sequences. Non-monotone queries reseek through the tree.
pub struct ChunkCursor<'a> {
    index: &'a ChunkIndex,
    encoding: &'a Encoding,
    bytes: &'a [u8],
    cp: usize,
    byte: usize,
}

impl ChunkCursor<'_> {
    /// Byte index of the start of codepoint `cp`. Past-the-end maps to the
    /// total byte length.
    pub fn byte_of_codepoint(&mut self, cp: usize) -> usize {
        if cp >= self.index.num_codepoints() {
            return self.index.num_bytes();
        }
        self.seek_codepoint(cp);
        self.byte
    }

    /// `(codepoint index, codepoint start byte)` for the codepoint covering
    /// `byte`. Past-the-end maps to the totals.
    pub fn codepoint_of_byte(&mut self, byte: usize) -> (usize, usize) {
        if byte >= self.index.num_bytes() {
            return (self.index.num_codepoints(), self.index.num_bytes());
        }
        if byte < self.byte {
            self.reseek_byte(byte);
        } else if let Some(loc) = self.index.locate_by_byte(byte) {
            // Skip whole chunks when the target is far ahead.
            if loc.prefix.bytes > self.byte {
                self.cp = loc.prefix.codepoints;
                self.byte = loc.prefix.bytes;
            }
        }
        loop {
            // A short read (bytes behind the index) ends the walk early.
            let Some(step) = self.encoding.next_codepoint(self.bytes, self.byte) else {
                return (self.cp, self.byte);
            };
            if self.byte + step.advance > byte {
                return (self.cp, self.byte);
            }
            self.byte += step.advance;
            self.cp += 1;
        }
    }

    fn seek_codepoint(&mut self, cp: usize) {
        if cp < self.cp {
            // Went backwards: restart from the containing chunk.
            let loc = self
                .index
                .locate_by_codepoint(cp)
                .expect("codepoint within index bounds");
            self.cp = loc.prefix.codepoints;
            self.byte = loc.prefix.bytes;
        } else if let Some(loc) = self.index.locate_by_codepoint(cp) {
            // Skip whole chunks when the target is far ahead.
            if loc.prefix.codepoints > self.cp {
                self.cp = loc.prefix.codepoints;
                self.byte = loc.prefix.bytes;
            }
        }
        while self.cp < cp {
            let Some(step) = self.encoding.next_codepoint(self.bytes, self.byte) else {
                break;
            };
            self.byte += step.advance;
            self.cp += 1;
        }
    }

    fn reseek_byte(&mut self, byte: usize) {
        let loc = self
            .index
            .locate_by_byte(byte)
            .expect("byte position within index bounds");
        self.cp = loc.prefix.codepoints;
        self.byte = loc.prefix.bytes;
    }
}

#[cfg(test)]
#[path = "chunk_tests.rs"]
mod chunk_tests;
