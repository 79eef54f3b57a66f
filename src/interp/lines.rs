//! Linebreak index
//!
//! Stores one node per line as `(nonbreak_chars, ending)` with synthesized
//! codepoint/char/linebreak totals, and keeps the CRLF normal form: no line
//! ending in a lone `\r` is ever followed by a line that is exactly a lone
//! `\n`, and an edit landing strictly between the `\r` and `\n` of a CRLF
//! pair splits it. Mutation positions are codepoint indices; a position
//! strictly inside a CRLF pair is therefore addressable.

use crate::tree::{FindResult, OstTree, Step, Synthesized};

pub const CR: u32 = 0x0D;
pub const LF: u32 = 0x0A;

/// How a line ends. `None` only on the last line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    None,
    R,
    N,
    Rn,
}

impl LineEnding {
    pub fn codepoints(self) -> usize {
        match self {
            LineEnding::None => 0,
            LineEnding::R | LineEnding::N => 1,
            LineEnding::Rn => 2,
        }
    }

    pub fn chars(self) -> usize {
        if self == LineEnding::None {
            0
        } else {
            1
        }
    }
}

/// One line of the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineInfo {
    pub nonbreak_chars: usize,
    pub ending: LineEnding,
}

impl LineInfo {
    pub fn new(nonbreak_chars: usize, ending: LineEnding) -> Self {
        Self {
            nonbreak_chars,
            ending,
        }
    }

    pub fn codepoints(&self) -> usize {
        self.nonbreak_chars + self.ending.codepoints()
    }

    pub fn chars(&self) -> usize {
        self.nonbreak_chars + self.ending.chars()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineSummary {
    pub codepoints: usize,
    pub chars: usize,
    pub linebreaks: usize,
    pub lines: usize,
}

impl Synthesized for LineSummary {
    type Value = LineInfo;

    fn from_value(value: &LineInfo) -> Self {
        Self {
            codepoints: value.codepoints(),
            chars: value.chars(),
            linebreaks: if value.ending == LineEnding::None { 0 } else { 1 },
            lines: 1,
        }
    }

    fn add(&mut self, other: &Self) {
        self.codepoints += other.codepoints;
        self.chars += other.chars;
        self.linebreaks += other.linebreaks;
        self.lines += other.lines;
    }
}

/// Flags reported by [`LineIndex::insert`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertFlags {
    /// The insert landed between the `\r` and `\n` of an existing CRLF,
    /// which was split into two lines.
    pub split: bool,
    /// An inserted leading `\n` merged with a preceding `\r` into CRLF.
    pub merge_front: bool,
    /// An inserted trailing `\r` merged with a following `\n` into CRLF.
    pub merge_back: bool,
}

/// Flags reported by [`LineIndex::erase`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EraseFlags {
    /// The erase began between the `\r` and `\n` of a CRLF pair.
    pub split_front: bool,
    /// The erase ended between the `\r` and `\n` of a CRLF pair.
    pub split_back: bool,
    /// The erase brought an `\r` and an `\n` together, merging them.
    pub merge: bool,
}

/// Decoded position of a codepoint within the line structure.
#[derive(Debug, Clone, Copy)]
struct Located {
    line: usize,
    prefix: LineSummary,
    info: LineInfo,
    /// Codepoint offset within the line, `0..=info.codepoints()`.
    offset: usize,
}

pub struct LineIndex {
    tree: OstTree<LineSummary>,
}

impl LineIndex {
    /// An index over empty text: a single line with no ending.
    pub fn new() -> Self {
        let mut tree = OstTree::new();
        tree.push(LineInfo::new(0, LineEnding::None));
        Self { tree }
    }

    /// Build from a complete line list; the last entry must have no ending.
    pub fn from_lines(lines: Vec<LineInfo>) -> Self {
        debug_assert!(matches!(
            lines.last(),
            Some(LineInfo {
                ending: LineEnding::None,
                ..
            })
        ));
        Self {
            tree: OstTree::from_vec(lines),
        }
    }

    pub fn num_lines(&self) -> usize {
        self.tree.len()
    }

    pub fn num_chars(&self) -> usize {
        self.tree.summary().chars
    }

    pub fn num_codepoints(&self) -> usize {
        self.tree.summary().codepoints
    }

    pub fn num_linebreaks(&self) -> usize {
        self.tree.summary().linebreaks
    }

    pub fn line(&self, index: usize) -> Option<LineInfo> {
        self.tree.get(index).copied()
    }

    pub fn lines(&self) -> impl Iterator<Item = &LineInfo> {
        self.tree.iter()
    }

    /// Iterator over lines starting at line `k`.
    pub fn lines_from(&self, k: usize) -> impl Iterator<Item = &LineInfo> {
        self.tree.iter_from(k)
    }

    /// Character index of the first character of line `k`.
    pub fn char_at_line_start(&self, k: usize) -> usize {
        self.tree.prefix(k).chars
    }

    /// Codepoint index of the first codepoint of line `k`.
    pub fn codepoint_at_line_start(&self, k: usize) -> usize {
        self.tree.prefix(k).codepoints
    }

    pub fn line_of_char(&self, c: usize) -> usize {
        self.locate_char(c).line
    }

    pub fn line_of_codepoint(&self, cp: usize) -> usize {
        self.locate_codepoint(cp).line
    }

    /// `(line, column)` of a character position; the column is measured in
    /// characters from the line start.
    pub fn line_col_of_char(&self, c: usize) -> (usize, usize) {
        let loc = self.locate_char(c);
        (loc.line, c.min(self.num_chars()) - loc.prefix.chars)
    }

    /// Character index of `(line, column)`, clamped to the line's extent.
    pub fn char_of_line_col(&self, line: usize, col: usize) -> usize {
        let line = line.min(self.num_lines().saturating_sub(1));
        let prefix = self.tree.prefix(line);
        let info = self.tree.get(line).copied().unwrap_or(LineInfo::new(0, LineEnding::None));
        prefix.chars + col.min(info.chars())
    }

    pub fn char_of_codepoint(&self, cp: usize) -> usize {
        if cp >= self.num_codepoints() {
            return self.num_chars();
        }
        let loc = self.locate_codepoint(cp);
        loc.prefix.chars + loc.offset.min(loc.info.nonbreak_chars)
    }

    pub fn codepoint_of_char(&self, c: usize) -> usize {
        if c >= self.num_chars() {
            return self.num_codepoints();
        }
        let loc = self.locate_char(c);
        let offset = c - loc.prefix.chars;
        loc.prefix.codepoints + offset
    }

    /// Stateful converter for monotone query sequences.
    pub fn converter(&self) -> LinePosConverter<'_> {
        LinePosConverter {
            index: self,
            cached: None,
        }
    }

    /// Insert a text clip at codepoint position `cp_pos`. The clip is the
    /// line structure of the inserted text; its last entry must have no
    /// ending. Returns the CRLF split/merge flags.
    pub fn insert(&mut self, cp_pos: usize, clip: &[LineInfo]) -> InsertFlags {
        debug_assert!(!clip.is_empty());
        debug_assert!(clip.last().unwrap().ending == LineEnding::None);

        let mut flags = InsertFlags::default();
        let loc = self.locate_codepoint(cp_pos.min(self.num_codepoints()));

        // Split the target line at the insert position.
        let (head, tail, split_rn) = split_line(loc.info, loc.offset);
        flags.split = split_rn;

        let mut replacement: Vec<LineInfo> = Vec::with_capacity(clip.len() + 2);
        if split_rn {
            // The head keeps its lone `\r`; the clip starts a fresh line.
            replacement.push(head);
            replacement.extend_from_slice(&clip[..clip.len() - 1]);
            let last_clip = clip[clip.len() - 1];
            replacement.push(LineInfo::new(
                last_clip.nonbreak_chars + tail.nonbreak_chars,
                tail.ending,
            ));
        } else if clip.len() == 1 {
            replacement.push(LineInfo::new(
                head.nonbreak_chars + clip[0].nonbreak_chars + tail.nonbreak_chars,
                tail.ending,
            ));
        } else {
            replacement.push(LineInfo::new(
                head.nonbreak_chars + clip[0].nonbreak_chars,
                clip[0].ending,
            ));
            replacement.extend_from_slice(&clip[1..clip.len() - 1]);
            let last_clip = clip[clip.len() - 1];
            replacement.push(LineInfo::new(
                last_clip.nonbreak_chars + tail.nonbreak_chars,
                tail.ending,
            ));
        }

        let seams = self.splice_normalized(loc.line, loc.line + 1, replacement);
        // A merge against the previous line, or against the lone `\r` left
        // by a split, consumed an inserted leading `\n`. Any other seam
        // merge consumed the tail's `\n` after an inserted trailing `\r`.
        flags.merge_front = seams.with_prev
            || (split_rn && seams.pairs.iter().any(|&(l, _)| l == 0));
        flags.merge_back = seams
            .pairs
            .iter()
            .any(|&(l, r)| r + 1 == seams.orig_len && !(split_rn && l == 0));
        flags
    }

    /// Erase codepoints `[cp_beg, cp_end)`, joining lines as needed.
    pub fn erase(&mut self, cp_beg: usize, cp_end: usize) -> EraseFlags {
        let total = self.num_codepoints();
        let cp_beg = cp_beg.min(total);
        let cp_end = cp_end.clamp(cp_beg, total);

        let mut flags = EraseFlags::default();
        if cp_beg == cp_end {
            return flags;
        }

        let beg = self.locate_codepoint(cp_beg);
        let end = self.locate_codepoint(cp_end);

        // Head kept from the first touched line.
        let (head, head_closed) = if beg.offset == beg.info.nonbreak_chars + 1 {
            debug_assert_eq!(beg.info.ending, LineEnding::Rn);
            flags.split_front = true;
            (LineInfo::new(beg.info.nonbreak_chars, LineEnding::R), true)
        } else {
            (LineInfo::new(beg.offset, LineEnding::None), false)
        };

        // Tail kept from the last touched line.
        let tail = if end.offset == end.info.nonbreak_chars + 1
            && end.info.ending == LineEnding::Rn
        {
            flags.split_back = true;
            LineInfo::new(0, LineEnding::N)
        } else {
            debug_assert!(end.offset <= end.info.nonbreak_chars);
            LineInfo::new(end.info.nonbreak_chars - end.offset, end.info.ending)
        };

        let replacement = if head_closed {
            vec![head, tail]
        } else {
            vec![LineInfo::new(head.nonbreak_chars + tail.nonbreak_chars, tail.ending)]
        };

        let seams = self.splice_normalized(beg.line, end.line + 1, replacement);
        flags.merge = seams.with_prev || !seams.pairs.is_empty();
        flags
    }

    /// Replace lines `[first, last)` with `replacement`, applying the CRLF
    /// normal form at the front seam (against the preceding line) and inside
    /// the replacement. Pair merges are reported in the replacement's
    /// original indices so callers can tell which seam produced them.
    fn splice_normalized(
        &mut self,
        mut first: usize,
        last: usize,
        mut replacement: Vec<LineInfo>,
    ) -> SeamMerges {
        let mut seams = SeamMerges {
            with_prev: false,
            pairs: Vec::new(),
            orig_len: replacement.len(),
        };

        // Front seam: the preceding line may end in a lone `\r` while the
        // first replacement line is a bare `\n`.
        if first > 0 {
            if let Some(prev) = self.tree.get(first - 1).copied() {
                if prev.ending == LineEnding::R && is_bare_n(&replacement[0]) {
                    replacement[0] = LineInfo::new(prev.nonbreak_chars, LineEnding::Rn);
                    first -= 1;
                    seams.with_prev = true;
                }
            }
        }

        // Merge lone-`\r` / bare-`\n` pairs inside the replacement.
        let mut i = 0;
        let mut removed = 0;
        while i + 1 < replacement.len() {
            if replacement[i].ending == LineEnding::R && is_bare_n(&replacement[i + 1]) {
                replacement[i] = LineInfo::new(replacement[i].nonbreak_chars, LineEnding::Rn);
                replacement.remove(i + 1);
                seams.pairs.push((i + removed, i + 1 + removed));
                removed += 1;
            } else {
                i += 1;
            }
        }

        self.tree.splice(first..last, replacement);
        debug_assert!(self.check_terminator());
        seams
    }

    fn check_terminator(&self) -> bool {
        let last_ok = matches!(
            self.tree.get(self.tree.len().saturating_sub(1)),
            Some(LineInfo {
                ending: LineEnding::None,
                ..
            })
        );
        let only_last = self
            .tree
            .iter()
            .enumerate()
            .all(|(i, l)| (l.ending == LineEnding::None) == (i + 1 == self.tree.len()));
        last_ok && only_last
    }

    fn locate_codepoint(&self, cp: usize) -> Located {
        let total = self.num_codepoints();
        let cp = cp.min(total);
        match self.tree.find_by(|before: &LineSummary, value: &LineInfo| {
            if cp < before.codepoints {
                Step::Left
            } else if cp < before.codepoints + value.codepoints() {
                Step::Here
            } else {
                Step::Right
            }
        }) {
            Some(FindResult { index, prefix }) => Located {
                line: index,
                offset: cp - prefix.codepoints,
                info: *self.tree.get(index).unwrap(),
                prefix,
            },
            None => {
                // Position at the very end: the terminator line.
                let line = self.tree.len() - 1;
                let prefix = self.tree.prefix(line);
                Located {
                    line,
                    offset: cp - prefix.codepoints,
                    info: *self.tree.get(line).unwrap(),
                    prefix,
                }
            }
        }
    }

    fn locate_char(&self, c: usize) -> Located {
        let total = self.num_chars();
        let c = c.min(total);
        match self.tree.find_by(|before: &LineSummary, value: &LineInfo| {
            if c < before.chars {
                Step::Left
            } else if c < before.chars + value.chars() {
                Step::Here
            } else {
                Step::Right
            }
        }) {
            Some(FindResult { index, prefix }) => Located {
                line: index,
                offset: c - prefix.chars,
                info: *self.tree.get(index).unwrap(),
                prefix,
            },
            None => {
                let line = self.tree.len() - 1;
                let prefix = self.tree.prefix(line);
                Located {
                    line,
                    offset: c - prefix.chars,
                    info: *self.tree.get(line).unwrap(),
                    prefix,
                }
            }
        }
    }
}

impl Default for LineIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for LineIndex {
    fn clone(&self) -> Self {
        Self {
            tree: self.tree.clone(),
        }
    }
}

impl std::fmt::Debug for LineIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineIndex")
            .field("lines", &self.num_lines())
            .field("chars", &self.num_chars())
            .finish()
    }
}

/// Seam merges performed by a normalizing splice.
struct SeamMerges {
    /// The first replacement line merged into the preceding kept line.
    with_prev: bool,
    /// `(left, right)` original replacement indices of merged pairs.
    pairs: Vec<(usize, usize)>,
    orig_len: usize,
}

fn is_bare_n(line: &LineInfo) -> bool {
    line.nonbreak_chars == 0 && line.ending == LineEnding::N
}

/// Split a line at codepoint offset `offset`. Returns the head (chars before
/// the position, no ending unless the CRLF was split), the tail (chars and
/// ending after), and whether a CRLF pair was split.
fn split_line(info: LineInfo, offset: usize) -> (LineInfo, LineInfo, bool) {
    if offset <= info.nonbreak_chars {
        (
            LineInfo::new(offset, LineEnding::None),
            LineInfo::new(info.nonbreak_chars - offset, info.ending),
            false,
        )
    } else {
        debug_assert_eq!(info.ending, LineEnding::Rn);
        debug_assert_eq!(offset, info.nonbreak_chars + 1);
        (
            LineInfo::new(info.nonbreak_chars, LineEnding::R),
            LineInfo::new(0, LineEnding::N),
            true,
        )
    }
}

/// Derive the line structure of a decoded codepoint sequence. The returned
/// clip always ends with an ending-less entry, as [`LineIndex::insert`]
/// expects.
pub fn clip_from_codepoints(codepoints: &[u32]) -> Vec<LineInfo> {
    let mut lines = Vec::new();
    let mut nonbreak = 0usize;
    let mut i = 0;
    while i < codepoints.len() {
        match codepoints[i] {
            CR => {
                if codepoints.get(i + 1) == Some(&LF) {
                    lines.push(LineInfo::new(nonbreak, LineEnding::Rn));
                    i += 2;
                } else {
                    lines.push(LineInfo::new(nonbreak, LineEnding::R));
                    i += 1;
                }
                nonbreak = 0;
            }
            LF => {
                lines.push(LineInfo::new(nonbreak, LineEnding::N));
                i += 1;
                nonbreak = 0;
            }
            _ => {
                nonbreak += 1;
                i += 1;
            }
        }
    }
    lines.push(LineInfo::new(nonbreak, LineEnding::None));
    lines
}

/// Stateful character/codepoint converter caching the current line, so a
/// monotone query sequence costs one descent per line touched.
pub struct LinePosConverter<'a> {
    index: &'a LineIndex,
    cached: Option<Located>,
}

impl LinePosConverter<'_> {
    pub fn char_to_codepoint(&mut self, c: usize) -> usize {
        let total = self.index.num_chars();
        if c >= total {
            return self.index.num_codepoints();
        }
        if let Some(loc) = self.cached {
            let start = loc.prefix.chars;
            if c >= start && c < start + loc.info.chars() {
                return loc.prefix.codepoints + (c - start);
            }
        }
        let loc = self.index.locate_char(c);
        self.cached = Some(loc);
        loc.prefix.codepoints + (c - loc.prefix.chars)
    }

    pub fn codepoint_to_char(&mut self, cp: usize) -> usize {
        let total = self.index.num_codepoints();
        if cp >= total {
            return self.index.num_chars();
        }
        if let Some(loc) = self.cached {
            let start = loc.prefix.codepoints;
            if cp >= start && cp < start + loc.info.codepoints() {
                return loc.prefix.chars + (cp - start).min(loc.info.nonbreak_chars);
            }
        }
        let loc = self.index.locate_codepoint(cp);
        self.cached = Some(loc);
        loc.prefix.chars + (cp - loc.prefix.codepoints).min(loc.info.nonbreak_chars)
    }
}

#[cfg(test)]
#[path = "line_tests.rs"]
mod line_tests;
