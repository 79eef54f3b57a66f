//! Fold index
//!
//! Stores folded regions as `(gap, range)` segments: `gap` characters (and
//! `gap_lines` lines) precede the fold, `range` characters (`folded_lines`
//! lines) are hidden by it. Byte positions of the fold edges are captured
//! lazily before an edit and replayed through the buffer's position patcher
//! afterwards, so folds survive edits that leave their content in place.

use crate::buffer::{PatchBias, PositionPatcher};
use crate::interp::lines::LineIndex;
use crate::interp::CharByteConverter;
use crate::tree::{OstTree, Step, Synthesized};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FoldInfo {
    /// Characters between the previous fold's end (or document start) and
    /// this fold.
    pub gap: usize,
    /// Characters hidden by this fold; always positive.
    pub range: usize,
    /// Lines between the previous fold's last line and this fold's first.
    pub gap_lines: usize,
    /// Lines spanned by the fold beyond its first.
    pub folded_lines: usize,
    /// Anchor bytes, valid only between `prepare_for_edit` and the patch
    /// pass that consumes them.
    pub byte_first: usize,
    pub byte_past: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FoldSummary {
    pub gap_chars: usize,
    pub span_chars: usize,
    pub gap_lines: usize,
    pub span_lines: usize,
    pub folds: usize,
}

impl Synthesized for FoldSummary {
    type Value = FoldInfo;

    fn from_value(value: &FoldInfo) -> Self {
        Self {
            gap_chars: value.gap,
            span_chars: value.gap + value.range,
            gap_lines: value.gap_lines,
            span_lines: value.gap_lines + value.folded_lines,
            folds: 1,
        }
    }

    fn add(&mut self, other: &Self) {
        self.gap_chars += other.gap_chars;
        self.span_chars += other.span_chars;
        self.gap_lines += other.gap_lines;
        self.span_lines += other.span_lines;
        self.folds += other.folds;
    }
}

pub struct FoldIndex {
    tree: OstTree<FoldSummary>,
    bytes_valid: bool,
}

impl FoldIndex {
    pub fn new() -> Self {
        Self {
            tree: OstTree::new(),
            bytes_valid: false,
        }
    }

    pub fn folded_region_count(&self) -> usize {
        self.tree.len()
    }

    /// Absolute character interval `[start, end)` of fold `index`.
    pub fn fold_extent(&self, index: usize) -> Option<(usize, usize)> {
        let info = self.tree.get(index).copied()?;
        let prefix = self.tree.prefix(index);
        let start = prefix.span_chars + info.gap;
        Some((start, start + info.range))
    }

    /// Absolute line interval `[first, last]` of fold `index`.
    pub fn fold_line_extent(&self, index: usize) -> Option<(usize, usize)> {
        let info = self.tree.get(index).copied()?;
        let prefix = self.tree.prefix(index);
        let first = prefix.span_lines + info.gap_lines;
        Some((first, first + info.folded_lines))
    }

    /// Add a fold hiding characters `[a, b)`, covering lines `[la, lb]`.
    /// Overlapping folds are absorbed.
    pub fn add_fold(&mut self, a: usize, b: usize, la: usize, lb: usize) {
        debug_assert!(a < b);

        // First fold whose span reaches past `a`, and last fold starting
        // before `b`: the inclusive range of absorbed folds.
        let beg = self.first_fold_ending_after(a);
        let end = self.last_fold_starting_before(b);

        let (erase_from, erase_to) = match (beg, end) {
            (Some(beg), Some(end)) if beg <= end => (beg, end + 1),
            (Some(beg), _) => (beg, beg),
            (None, _) => (self.tree.len(), self.tree.len()),
        };

        let before = self.tree.prefix(erase_from);
        let new_fold = FoldInfo {
            gap: a - before.span_chars,
            range: b - a,
            gap_lines: la - before.span_lines,
            folded_lines: lb - la,
            byte_first: 0,
            byte_past: 0,
        };

        // Absolute start of the successor, measured before the splice.
        let successor_abs = self.tree.prefix(erase_to).span_chars;
        let successor_lines_abs = self.tree.prefix(erase_to).span_lines;

        self.tree.splice(erase_from..erase_to, vec![new_fold]);

        // Re-anchor the successor's gap to the new fold's end.
        let successor_idx = erase_from + 1;
        if successor_idx < self.tree.len() {
            let old = *self.tree.get(successor_idx).unwrap();
            let old_start = successor_abs + old.gap;
            let old_start_lines = successor_lines_abs + old.gap_lines;
            self.tree.modify(successor_idx, |fold| {
                fold.gap = old_start.saturating_sub(b);
                fold.gap_lines = old_start_lines.saturating_sub(lb);
            });
        }

        self.bytes_valid = false;
    }

    /// Remove fold `index`; its extent is returned to the successor's gap.
    pub fn remove_fold(&mut self, index: usize) {
        let Some(info) = self.tree.get(index).copied() else {
            return;
        };
        self.tree.remove(index);
        if index < self.tree.len() {
            self.tree.modify(index, |next| {
                next.gap += info.gap + info.range;
                next.gap_lines += info.gap_lines + info.folded_lines;
            });
        }
        self.bytes_valid = false;
    }

    // --- Folded/unfolded conversions ---

    /// Map a folded-space character position to document space.
    pub fn unfolded_char(&self, folded: usize) -> usize {
        match self.tree.find_by(|before: &FoldSummary, value: &FoldInfo| {
            if folded < before.gap_chars {
                Step::Left
            } else if folded < before.gap_chars + value.gap {
                Step::Here
            } else {
                Step::Right
            }
        }) {
            Some(found) => found.prefix.span_chars + (folded - found.prefix.gap_chars),
            None => {
                let total = self.tree.summary();
                total.span_chars + (folded - total.gap_chars)
            }
        }
    }

    /// Map a document-space character position to folded space; positions
    /// inside a fold clamp to the fold's start.
    pub fn folded_char(&self, unfolded: usize) -> usize {
        match self.tree.find_by(|before: &FoldSummary, value: &FoldInfo| {
            if unfolded < before.span_chars {
                Step::Left
            } else if unfolded < before.span_chars + value.gap + value.range {
                Step::Here
            } else {
                Step::Right
            }
        }) {
            Some(found) => {
                let value = self.tree.get(found.index).unwrap();
                let offset = unfolded - found.prefix.span_chars;
                found.prefix.gap_chars + offset.min(value.gap)
            }
            None => {
                let total = self.tree.summary();
                total.gap_chars + (unfolded - total.span_chars)
            }
        }
    }

    /// Map a folded-space line to document space. The merged visual line a
    /// fold collapses into maps to the fold's first line.
    pub fn unfolded_line(&self, folded: usize) -> usize {
        // Count folds whose merged visual line lies strictly before
        // `folded`; their hidden lines all precede the answer.
        let mut lo = 0;
        let mut hi = self.tree.len();
        while lo < hi {
            let mid = (lo + hi) / 2;
            let merged = self.tree.prefix(mid).gap_lines
                + self.tree.get(mid).map_or(0, |f| f.gap_lines);
            if merged < folded {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        let before = self.tree.prefix(lo);
        folded + before.span_lines - before.gap_lines
    }

    /// Map a document-space line to folded space, clamping into folds.
    pub fn folded_line(&self, unfolded: usize) -> usize {
        match self.tree.find_by(|before: &FoldSummary, value: &FoldInfo| {
            if unfolded < before.span_lines {
                Step::Left
            } else if unfolded < before.span_lines + value.gap_lines + value.folded_lines {
                Step::Here
            } else {
                Step::Right
            }
        }) {
            Some(found) => {
                let value = self.tree.get(found.index).unwrap();
                let offset = unfolded - found.prefix.span_lines;
                found.prefix.gap_lines + offset.min(value.gap_lines)
            }
            None => {
                let total = self.tree.summary();
                total.gap_lines + (unfolded - total.span_lines)
            }
        }
    }

    // --- Edit fixup ---

    /// Capture byte anchors for every fold edge. Must run before the edit;
    /// `conv` converts pre-edit characters to bytes.
    pub fn prepare_for_edit(&mut self, conv: &mut CharByteConverter<'_>) {
        if self.bytes_valid {
            return;
        }
        let mut abs = 0usize;
        self.tree.for_each_mut(|fold| {
            abs += fold.gap;
            let start = abs;
            abs += fold.range;
            fold.byte_first = conv.char_to_byte(start);
            fold.byte_past = conv.char_to_byte(abs);
        });
        self.bytes_valid = true;
    }

    /// Replay the fold edges through the edit: patch each anchor byte
    /// (start biased back, end biased front), convert back to characters,
    /// drop folds that became empty, and rebuild the aggregates.
    ///
    /// `conv` converts post-edit bytes to characters; `lines` is the
    /// post-edit line index.
    pub fn patch_edit(
        &mut self,
        patcher: &mut PositionPatcher,
        conv: &mut CharByteConverter<'_>,
        lines: &LineIndex,
    ) {
        debug_assert!(self.bytes_valid, "prepare_for_edit must run before patch_edit");

        let mut survivors = Vec::with_capacity(self.tree.len());
        let mut prev_end_char = 0usize;
        let mut prev_end_line = 0usize;
        for fold in self.tree.iter() {
            let first = patcher.patch_next(fold.byte_first, PatchBias::Back);
            let past = patcher.patch_next(fold.byte_past, PatchBias::Front);
            if first >= past {
                continue;
            }
            let start_char = conv.byte_to_char(first);
            let end_char = conv.byte_to_char(past);
            if start_char >= end_char {
                continue;
            }
            let start_line = lines.line_of_char(start_char);
            let end_line = lines.line_of_char(end_char.saturating_sub(1));
            survivors.push(FoldInfo {
                gap: start_char - prev_end_char,
                range: end_char - start_char,
                gap_lines: start_line - prev_end_line,
                folded_lines: end_line - start_line,
                byte_first: 0,
                byte_past: 0,
            });
            prev_end_char = end_char;
            prev_end_line = end_line;
        }

        self.tree = OstTree::from_vec(survivors);
        self.bytes_valid = false;
    }

    // --- Lookups used by add_fold ---

    /// Index of the first fold whose span (gap plus range) ends past `a`.
    fn first_fold_ending_after(&self, a: usize) -> Option<usize> {
        self.tree
            .find_by(|before: &FoldSummary, value: &FoldInfo| {
                if a < before.span_chars {
                    Step::Left
                } else if a < before.span_chars + value.gap + value.range {
                    Step::Here
                } else {
                    Step::Right
                }
            })
            .map(|found| found.index)
    }

    /// Index of the last fold starting before `b`, if any.
    fn last_fold_starting_before(&self, b: usize) -> Option<usize> {
        let found = self.tree.find_by(|before: &FoldSummary, value: &FoldInfo| {
            if b < before.span_chars {
                Step::Left
            } else if b < before.span_chars + value.gap + value.range {
                Step::Here
            } else {
                Step::Right
            }
        });
        match found {
            Some(found) => {
                let value = self.tree.get(found.index).unwrap();
                if found.prefix.span_chars + value.gap < b {
                    Some(found.index)
                } else {
                    found.index.checked_sub(1)
                }
            }
            None => self.tree.len().checked_sub(1),
        }
    }
}

impl Default for FoldIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FoldIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FoldIndex")
            .field("folds", &self.folded_region_count())
            .finish()
    }
}

#[cfg(test)]
#[path = "fold_tests.rs"]
mod fold_tests;
