//! Theme styles, character-range style maps, and the capture-path
//! configuration consumed by the highlight pipeline

use std::ops::Range;

/// 24-bit RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Color { r, g, b }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FontWeight {
    #[default]
    Normal,
    Bold,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FontSlant {
    #[default]
    Normal,
    Italic,
}

/// Style applied to a character range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThemeStyle {
    pub weight: FontWeight,
    pub slant: FontSlant,
    pub color: Option<Color>,
}

impl ThemeStyle {
    pub fn colored(color: Color) -> Self {
        ThemeStyle {
            color: Some(color),
            ..Default::default()
        }
    }
}

/// A half-open character range with a style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeRange {
    pub range: Range<usize>,
    pub style: ThemeStyle,
}

/// Sorted, non-overlapping character-range style map held by one theme
/// provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThemeSpans {
    entries: Vec<ThemeRange>,
}

impl ThemeSpans {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Append a range; ranges must be pushed in order and must not overlap.
    pub fn push(&mut self, range: Range<usize>, style: ThemeStyle) {
        if range.start >= range.end {
            return;
        }
        debug_assert!(self
            .entries
            .last()
            .map_or(true, |last| last.range.end <= range.start));
        self.entries.push(ThemeRange { range, style });
    }

    /// Replace the whole map.
    pub fn set(&mut self, entries: Vec<ThemeRange>) {
        debug_assert!(entries
            .windows(2)
            .all(|w| w[0].range.end <= w[1].range.start));
        self.entries = entries;
    }

    pub fn style_at(&self, index: usize) -> Option<ThemeStyle> {
        let at = self
            .entries
            .partition_point(|entry| entry.range.end <= index);
        self.entries.get(at).and_then(|entry| {
            if entry.range.start <= index {
                Some(entry.style)
            } else {
                None
            }
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &ThemeRange> {
        self.entries.iter()
    }

    /// Entries overlapping `range`.
    pub fn ranges_in(&self, range: Range<usize>) -> impl Iterator<Item = &ThemeRange> {
        let start = self
            .entries
            .partition_point(|entry| entry.range.end <= range.start);
        self.entries[start..]
            .iter()
            .take_while(move |entry| entry.range.start < range.end)
    }
}

/// Maps dotted capture paths (e.g. `function.builtin`) to style entries.
///
/// Lookup returns the most specific declared entry: the query path is tried
/// exactly, then with its trailing components stripped one at a time.
#[derive(Debug, Clone, Default)]
pub struct ThemeConfiguration {
    entries: Vec<(String, ThemeStyle)>,
}

impl ThemeConfiguration {
    pub fn new(entries: Vec<(String, ThemeStyle)>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index of the most specific entry declared for `path`.
    pub fn get_index_for(&self, path: &str) -> Option<u32> {
        if let Some(idx) = self.find_exact(path) {
            return Some(idx);
        }
        let mut part = path;
        while let Some(dot) = part.rfind('.') {
            part = &part[..dot];
            if let Some(idx) = self.find_exact(part) {
                return Some(idx);
            }
        }
        None
    }

    pub fn style(&self, index: u32) -> Option<ThemeStyle> {
        self.entries.get(index as usize).map(|(_, style)| *style)
    }

    pub fn path(&self, index: u32) -> Option<&str> {
        self.entries.get(index as usize).map(|(path, _)| path.as_str())
    }

    fn find_exact(&self, path: &str) -> Option<u32> {
        self.entries
            .iter()
            .position(|(declared, _)| declared == path)
            .map(|idx| idx as u32)
    }
}
