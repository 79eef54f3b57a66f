//! Interpretation: a byte buffer viewed through three coordinate systems
//!
//! Owns the linebreak and chunk indices over a buffer and an encoding,
//! drives the edit protocol that keeps them consistent, precomputes byte
//! ranges for caret-driven edits, and hosts the theme- and
//! tooltip-provider registries that views compose their output from.

use crate::buffer::{ByteBuffer, SpliceRecord};
use crate::constants::decode::CACHED_BOUNDARIES;
use crate::encoding::{Encoding, EncodingRegistry};
use crate::error::Result;
use crate::event::EventList;
use crate::theme::{ThemeSpans, ThemeStyle};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

pub mod chunks;
pub mod lines;

use chunks::{chunks_of_codepoints, ChunkIndex, ChunkInfo};
use lines::{clip_from_codepoints, LineIndex, LinePosConverter};

/// Process-unique identity of one interpretation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InterpId(u64);

fn next_interp_id() -> InterpId {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    InterpId(NEXT.fetch_add(1, Ordering::Relaxed))
}

/// A caret over character positions; `start == end` is a bare caret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caret {
    pub start: usize,
    pub end: usize,
}

impl Caret {
    pub fn at(pos: usize) -> Self {
        Caret { start: pos, end: pos }
    }

    pub fn selecting(start: usize, end: usize) -> Self {
        Caret { start, end }
    }
}

/// Payload of `modification_decoded` and `end_modification`.
///
/// Positions cover the re-decoded span, which extends from the nearest
/// codepoint boundary at or before the edit to the first post-edit position
/// back in sync with the old codepoint stream. `past_erased_*` are pre-edit
/// coordinates, `past_inserted_*` post-edit coordinates; both are valid in
/// the same payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModificationInfo {
    pub start_byte: usize,
    pub past_end_byte: usize,
    pub start_codepoint: usize,
    pub past_erased_codepoint: usize,
    pub past_inserted_codepoint: usize,
    pub start_char: usize,
    pub past_erased_char: usize,
    pub past_inserted_char: usize,
    /// A CRLF pair was split by this modification.
    pub split: bool,
    /// A CR and LF merged into a pair during this modification.
    pub merge: bool,
}

/// One sub-edit's character-position delta, aggregated into `end_edit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditPosition {
    pub start_char: usize,
    pub removed_chars: usize,
    pub inserted_chars: usize,
}

/// Payload of `end_edit`: one entry per sub-edit, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditInfo {
    pub generation: u64,
    pub positions: Vec<EditPosition>,
}

/// What changed about the interpretation's appearance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppearanceChange {
    /// Only styling changed; layout is untouched.
    VisualOnly,
    /// Text layout (and therefore visuals) changed.
    LayoutAndVisual,
}

/// Observer lists for interpretation events.
#[derive(Debug, Default)]
pub struct InterpEvents {
    /// Fired before the first sub-edit of an atomic edit.
    pub begin_edit: EventList<InterpId>,
    /// Fired per sub-edit once its content has been decoded and the line
    /// index spliced, before the chunk index is touched.
    pub modification_decoded: EventList<ModificationInfo>,
    /// Fired per sub-edit after both indices have been spliced.
    pub end_modification: EventList<ModificationInfo>,
    /// Fired once per atomic edit.
    pub end_edit: EventList<EditInfo>,
    pub appearance_changed: EventList<AppearanceChange>,
}

/// Token identifying a theme or tooltip provider registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProviderToken(u64);

struct ThemeProviderEntry {
    token: u64,
    priority: i32,
    spans: ThemeSpans,
}

/// A UI-agnostic tooltip descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tooltip {
    pub text: String,
}

type TooltipFn = Box<dyn Fn(usize) -> Option<Tooltip>>;

struct TooltipProviderEntry {
    token: u64,
    provider: TooltipFn,
}

/// Boundary-cache captured by `begin_modify`, consumed by `end_modify`.
#[derive(Debug, Clone)]
struct PendingModification {
    decode_start_byte: usize,
    decode_start_cp: usize,
    /// Codepoint boundaries at and after the erased range, pre-edit
    /// coordinates; the first entry is the post-erase boundary.
    boundaries: Vec<(usize, usize)>,
    start_byte: usize,
    erase_len: usize,
}

/// Cheap copy of the interpretation's decode state, taken on the UI thread
/// and handed to the highlight worker.
pub struct InterpSnapshot {
    pub id: InterpId,
    pub bytes: Arc<RwLock<Vec<u8>>>,
    pub encoding: Encoding,
    pub chunks: ChunkIndex,
    pub lines: LineIndex,
    pub generation: u64,
}

pub struct Interpretation {
    id: InterpId,
    buffer: ByteBuffer,
    encoding: Encoding,
    chunks: ChunkIndex,
    lines: LineIndex,
    pub events: InterpEvents,
    theme_providers: Vec<ThemeProviderEntry>,
    tooltip_providers: Vec<TooltipProviderEntry>,
    next_provider_token: u64,
    edit_generation: u64,
}

impl Interpretation {
    /// Decode the entire buffer under `encoding`, building both indices.
    pub fn new(buffer: ByteBuffer, encoding: Encoding) -> Self {
        let (chunks, lines) = {
            let guard = buffer.read();
            let bytes = &guard[..];
            let mut cps = Vec::new();
            let mut lens = Vec::new();
            let mut at = 0;
            while let Some(step) = encoding.next_codepoint(bytes, at) {
                cps.push(step.codepoint);
                lens.push(step.advance);
                at += step.advance;
            }
            (
                ChunkIndex::from_chunks(chunks_of_codepoints(&lens)),
                LineIndex::from_lines(clip_from_codepoints(&cps)),
            )
        };
        let edit_generation = buffer.generation();
        Self {
            id: next_interp_id(),
            buffer,
            encoding,
            chunks,
            lines,
            events: InterpEvents::default(),
            theme_providers: Vec::new(),
            tooltip_providers: Vec::new(),
            next_provider_token: 1,
            edit_generation,
        }
    }

    /// Construct with an encoding looked up by name; unknown names fail.
    pub fn from_named(
        buffer: ByteBuffer,
        registry: &EncodingRegistry,
        encoding_name: &str,
    ) -> Result<Self> {
        let encoding = registry.get(encoding_name)?;
        Ok(Self::new(buffer, encoding))
    }

    pub fn id(&self) -> InterpId {
        self.id
    }

    pub fn buffer(&self) -> &ByteBuffer {
        &self.buffer
    }

    pub fn encoding(&self) -> &Encoding {
        &self.encoding
    }

    pub fn lines(&self) -> &LineIndex {
        &self.lines
    }

    pub fn chunks(&self) -> &ChunkIndex {
        &self.chunks
    }

    pub fn generation(&self) -> u64 {
        self.edit_generation
    }

    pub fn num_bytes(&self) -> usize {
        self.chunks.num_bytes()
    }

    pub fn num_codepoints(&self) -> usize {
        self.chunks.num_codepoints()
    }

    pub fn num_chars(&self) -> usize {
        self.lines.num_chars()
    }

    pub fn num_lines(&self) -> usize {
        self.lines.num_lines()
    }

    // --- Coordinate queries ---

    pub fn char_of_codepoint(&self, cp: usize) -> usize {
        self.lines.char_of_codepoint(cp)
    }

    pub fn codepoint_of_char(&self, c: usize) -> usize {
        self.lines.codepoint_of_char(c)
    }

    pub fn line_col_of_char(&self, c: usize) -> (usize, usize) {
        self.lines.line_col_of_char(c)
    }

    pub fn char_of_line_col(&self, line: usize, col: usize) -> usize {
        self.lines.char_of_line_col(line, col)
    }

    pub fn byte_of_char(&self, c: usize) -> usize {
        let guard = self.buffer.read();
        let cp = self.lines.codepoint_of_char(c);
        self.chunks
            .cursor(&self.encoding, &guard)
            .byte_of_codepoint(cp)
    }

    pub fn char_of_byte(&self, byte: usize) -> usize {
        let guard = self.buffer.read();
        let (cp, _) = self
            .chunks
            .cursor(&self.encoding, &guard)
            .codepoint_of_byte(byte);
        self.lines.char_of_codepoint(cp)
    }

    pub fn byte_of_codepoint(&self, cp: usize) -> usize {
        let guard = self.buffer.read();
        self.chunks
            .cursor(&self.encoding, &guard)
            .byte_of_codepoint(cp)
    }

    pub fn codepoint_of_byte(&self, byte: usize) -> usize {
        let guard = self.buffer.read();
        self.chunks
            .cursor(&self.encoding, &guard)
            .codepoint_of_byte(byte)
            .0
    }

    /// Composed streaming converter between characters and bytes. `bytes`
    /// must be a read guard (or copy) of this interpretation's buffer.
    pub fn char_byte_converter<'a>(&'a self, bytes: &'a [u8]) -> CharByteConverter<'a> {
        CharByteConverter {
            lines: self.lines.converter(),
            cursor: self.chunks.cursor(&self.encoding, bytes),
        }
    }

    /// Snapshot for off-thread consumers.
    pub fn snapshot(&self) -> InterpSnapshot {
        InterpSnapshot {
            id: self.id,
            bytes: self.buffer.share(),
            encoding: self.encoding.clone(),
            chunks: self.chunks.clone(),
            lines: self.lines.clone(),
            generation: self.edit_generation,
        }
    }

    // --- Caret-driven mutators ---

    /// Insert `text` at every caret, replacing selections.
    pub fn insert(&mut self, carets: &[Caret], text: &[u8]) {
        let mut edits = self.selection_byte_ranges(carets);
        for edit in &mut edits {
            edit.2 = text.to_vec();
        }
        self.apply_edit(edits);
    }

    /// Erase the selection, or the character before each bare caret.
    pub fn backspace(&mut self, carets: &[Caret]) {
        let num_chars = self.num_chars();
        let ranges: Vec<(usize, usize)> = carets
            .iter()
            .filter_map(|caret| {
                let (s, e) = clamp_selection(caret, num_chars);
                if s != e {
                    Some((s, e))
                } else if s > 0 {
                    Some((s - 1, s))
                } else {
                    None
                }
            })
            .collect();
        let edits = self.char_ranges_to_edits(ranges);
        self.apply_edit(edits);
    }

    /// Erase the selection, or the character after each bare caret.
    pub fn delete(&mut self, carets: &[Caret]) {
        let num_chars = self.num_chars();
        let ranges: Vec<(usize, usize)> = carets
            .iter()
            .filter_map(|caret| {
                let (s, e) = clamp_selection(caret, num_chars);
                if s != e {
                    Some((s, e))
                } else if s < num_chars {
                    Some((s, s + 1))
                } else {
                    None
                }
            })
            .collect();
        let edits = self.char_ranges_to_edits(ranges);
        self.apply_edit(edits);
    }

    /// Low-level byte splice going through the full edit protocol.
    pub fn replace_byte_range(&mut self, start: usize, erase_len: usize, bytes: &[u8]) {
        self.apply_edit(vec![(start, erase_len, bytes.to_vec())]);
    }

    fn selection_byte_ranges(&self, carets: &[Caret]) -> Vec<(usize, usize, Vec<u8>)> {
        let num_chars = self.num_chars();
        let ranges: Vec<(usize, usize)> = carets
            .iter()
            .map(|caret| clamp_selection(caret, num_chars))
            .collect();
        self.char_ranges_to_edits(ranges)
    }

    /// Convert character ranges to byte sub-edits, sorted ascending.
    fn char_ranges_to_edits(&self, mut ranges: Vec<(usize, usize)>) -> Vec<(usize, usize, Vec<u8>)> {
        ranges.sort_unstable();
        let guard = self.buffer.read();
        let mut conv = self.char_byte_converter(&guard[..]);
        ranges
            .iter()
            .map(|&(s, e)| {
                let sb = conv.char_to_byte(s);
                let eb = conv.char_to_byte(e);
                (sb, eb - sb, Vec::new())
            })
            .collect()
    }

    /// Apply an atomic edit made of byte-coordinate sub-edits (pre-edit
    /// coordinates, ascending, non-overlapping).
    fn apply_edit(&mut self, mut sub_edits: Vec<(usize, usize, Vec<u8>)>) {
        if sub_edits.is_empty() {
            return;
        }
        sub_edits.sort_by_key(|edit| edit.0);
        self.events.begin_edit.dispatch(&self.id);

        let mut records = Vec::with_capacity(sub_edits.len());
        let mut positions = Vec::with_capacity(sub_edits.len());
        let mut delta = 0isize;

        for (start, erase_len, insert) in sub_edits {
            let adjusted = (start as isize + delta) as usize;
            let pending = self.prepare_modification(adjusted, erase_len);
            self.buffer.apply_splice(adjusted, erase_len, &insert);
            let info = self.integrate_modification(pending, insert.len());

            positions.push(EditPosition {
                start_char: info.start_char,
                removed_chars: info.past_erased_char - info.start_char,
                inserted_chars: info.past_inserted_char - info.start_char,
            });
            records.push(SpliceRecord {
                start,
                erased: erase_len,
                inserted: insert.len(),
            });
            delta += insert.len() as isize - erase_len as isize;
        }

        self.buffer.commit_edit(records);
        self.edit_generation = self.buffer.generation();

        self.events.end_edit.dispatch(&EditInfo {
            generation: self.edit_generation,
            positions,
        });
        self.events
            .appearance_changed
            .dispatch(&AppearanceChange::LayoutAndVisual);
    }

    /// `begin_modify`: cache the codepoint boundaries around the region
    /// about to change, before the buffer is touched.
    fn prepare_modification(&self, start_byte: usize, erase_len: usize) -> PendingModification {
        let guard = self.buffer.read();
        let bytes = &guard[..];
        let mut cursor = self.chunks.cursor(&self.encoding, bytes);

        let (decode_start_cp, decode_start_byte) = {
            let (cp, cp_byte) = cursor.codepoint_of_byte(start_byte);
            (cp, cp_byte)
        };

        // First codepoint boundary at or past the end of the erased range.
        let erase_end = (start_byte + erase_len).min(bytes.len());
        let (mut post_cp, mut post_byte) = cursor.codepoint_of_byte(erase_end);
        if post_byte < erase_end {
            post_cp += 1;
            post_byte = cursor.byte_of_codepoint(post_cp);
        }

        // A few more boundaries for re-synchronization after the edit.
        let mut boundaries = vec![(post_cp, post_byte)];
        let (mut cp, mut byte) = (post_cp, post_byte);
        for _ in 0..CACHED_BOUNDARIES {
            match self.encoding.next_codepoint(bytes, byte) {
                Some(step) => {
                    byte += step.advance;
                    cp += 1;
                    boundaries.push((cp, byte));
                }
                None => break,
            }
        }

        PendingModification {
            decode_start_byte,
            decode_start_cp,
            boundaries,
            start_byte,
            erase_len,
        }
    }

    /// `end_modify`: re-decode the affected span, splice both indices, and
    /// fire the per-sub-edit events.
    fn integrate_modification(
        &mut self,
        pending: PendingModification,
        insert_len: usize,
    ) -> ModificationInfo {
        let delta = insert_len as isize - pending.erase_len as isize;
        let old_total_cp = self.chunks.num_codepoints();
        let old_total_bytes = self.chunks.num_bytes();
        let insert_end = pending.start_byte + insert_len;

        // Re-decode from the cached start until the decode position lands on
        // an old codepoint boundary again (shifted by the edit's delta), or
        // the buffer ends.
        let mut cps: Vec<u32> = Vec::new();
        let mut lens: Vec<usize> = Vec::new();
        let (end_cp_old, end_byte_old, decode_end_byte);
        {
            let guard = self.buffer.read();
            let bytes = &guard[..];
            let new_len = bytes.len();
            let mut boundaries = OldBoundaries::new(&pending.boundaries, &self.chunks);
            let mut pos = pending.decode_start_byte;
            loop {
                if pos >= insert_end {
                    if let Some((bcp, bbyte)) = boundaries.first_at_or_after(pos, delta) {
                        if (bbyte as isize + delta) as usize == pos {
                            end_cp_old = bcp;
                            end_byte_old = bbyte;
                            decode_end_byte = pos;
                            break;
                        }
                    }
                }
                if pos >= new_len {
                    end_cp_old = old_total_cp;
                    end_byte_old = old_total_bytes;
                    decode_end_byte = pos;
                    break;
                }
                let step = self
                    .encoding
                    .next_codepoint(bytes, pos)
                    .expect("decode position within buffer");
                cps.push(step.codepoint);
                lens.push(step.advance);
                pos += step.advance;
            }
        }

        // Old-space character positions, before the line index changes.
        let old_start_char = self.lines.char_of_codepoint(pending.decode_start_cp);
        let old_past_erased_char = self.lines.char_of_codepoint(end_cp_old);

        // Splice the line index: erase the old span, insert the new clip.
        let mut erase_flags = lines::EraseFlags::default();
        if end_cp_old > pending.decode_start_cp {
            erase_flags = self.lines.erase(pending.decode_start_cp, end_cp_old);
        }
        let mut insert_flags = lines::InsertFlags::default();
        if !cps.is_empty() {
            let clip = clip_from_codepoints(&cps);
            insert_flags = self.lines.insert(pending.decode_start_cp, &clip);
        }
        // An erase that merged a CR and LF around the edit point followed by
        // an insert that split the same transient pair cancels out.
        if erase_flags.merge && insert_flags.split {
            erase_flags.merge = false;
            insert_flags.split = false;
        }

        let past_inserted_cp = pending.decode_start_cp + cps.len();

        // A merge crossing the decode-window start pulls the affected
        // character region before the window; anchor all character fields
        // at the smaller of the old- and new-space floors.
        let new_start_char = self.lines.char_of_codepoint(pending.decode_start_cp);
        let start_char = old_start_char.min(new_start_char);
        let past_erased_char = old_past_erased_char.max(start_char);
        let past_inserted_char = self
            .lines
            .char_of_codepoint(past_inserted_cp)
            .max(start_char);

        let info = ModificationInfo {
            start_byte: pending.decode_start_byte,
            past_end_byte: decode_end_byte,
            start_codepoint: pending.decode_start_cp,
            past_erased_codepoint: end_cp_old,
            past_inserted_codepoint: past_inserted_cp,
            start_char,
            past_erased_char,
            past_inserted_char,
            split: erase_flags.split_front || erase_flags.split_back || insert_flags.split,
            merge: erase_flags.merge || insert_flags.merge_front || insert_flags.merge_back,
        };
        self.events.modification_decoded.dispatch(&info);

        // Splice the chunk index.
        self.splice_chunks(
            pending.decode_start_cp,
            pending.decode_start_byte,
            end_cp_old,
            end_byte_old,
            old_total_cp,
            &lens,
        );

        debug_assert_eq!(self.chunks.num_codepoints(), self.lines.num_codepoints());
        debug_assert_eq!(self.chunks.num_bytes(), self.buffer.len());

        self.events.end_modification.dispatch(&info);
        info
    }

    fn splice_chunks(
        &mut self,
        start_cp: usize,
        start_byte: usize,
        end_cp_old: usize,
        end_byte_old: usize,
        old_total_cp: usize,
        new_codepoint_lens: &[usize],
    ) {
        let (first_idx, head) = if start_cp == old_total_cp {
            (self.chunks.num_chunks(), None)
        } else {
            let loc = self
                .chunks
                .locate_by_codepoint(start_cp)
                .expect("start codepoint within chunk index");
            if start_cp == loc.prefix.codepoints {
                (loc.index, None)
            } else {
                (
                    loc.index,
                    Some(ChunkInfo {
                        bytes: start_byte - loc.prefix.bytes,
                        codepoints: start_cp - loc.prefix.codepoints,
                    }),
                )
            }
        };

        let (last_exclusive, tail) = if end_cp_old == old_total_cp {
            (self.chunks.num_chunks(), None)
        } else {
            let loc = self
                .chunks
                .locate_by_codepoint(end_cp_old)
                .expect("end codepoint within chunk index");
            if end_cp_old == loc.prefix.codepoints {
                (loc.index, None)
            } else {
                (
                    loc.index + 1,
                    Some(ChunkInfo {
                        bytes: loc.prefix.bytes + loc.info.bytes - end_byte_old,
                        codepoints: loc.prefix.codepoints + loc.info.codepoints - end_cp_old,
                    }),
                )
            }
        };

        let mut replacement = Vec::new();
        if let Some(head) = head {
            replacement.push(head);
        }
        replacement.extend(chunks_of_codepoints(new_codepoint_lens));
        if let Some(tail) = tail {
            replacement.push(tail);
        }

        self.chunks
            .splice(first_idx..last_exclusive.max(first_idx), replacement);
    }

    // --- Theme providers ---

    /// Register an empty theme provider at `priority`. Higher priorities
    /// override lower ones where their ranges overlap; equal priorities
    /// compose in registration order.
    pub fn add_theme_provider(&mut self, priority: i32) -> ProviderToken {
        let token = self.next_provider_token;
        self.next_provider_token += 1;
        let at = self
            .theme_providers
            .partition_point(|p| (p.priority, p.token) <= (priority, token));
        self.theme_providers.insert(
            at,
            ThemeProviderEntry {
                token,
                priority,
                spans: ThemeSpans::new(),
            },
        );
        ProviderToken(token)
    }

    pub fn remove_theme_provider(&mut self, token: ProviderToken) {
        self.theme_providers.retain(|p| p.token != token.0);
    }

    /// Mutate a provider's span map and signal a visual-only change.
    pub fn with_theme_provider(
        &mut self,
        token: ProviderToken,
        mutator: impl FnOnce(&mut ThemeSpans),
    ) -> bool {
        let Some(entry) = self
            .theme_providers
            .iter_mut()
            .find(|p| p.token == token.0)
        else {
            return false;
        };
        mutator(&mut entry.spans);
        self.events
            .appearance_changed
            .dispatch(&AppearanceChange::VisualOnly);
        true
    }

    pub fn theme_spans(&self, token: ProviderToken) -> Option<&ThemeSpans> {
        self.theme_providers
            .iter()
            .find(|p| p.token == token.0)
            .map(|p| &p.spans)
    }

    /// Style at a character index: providers are consulted in priority
    /// order and later ones override earlier ones.
    pub fn style_at(&self, c: usize) -> ThemeStyle {
        let mut style = ThemeStyle::default();
        for provider in &self.theme_providers {
            if let Some(s) = provider.spans.style_at(c) {
                style = s;
            }
        }
        style
    }

    /// Publish a highlight result computed against `generation`. A stale
    /// generation is discarded and `false` is returned.
    pub fn apply_highlight(
        &mut self,
        token: ProviderToken,
        generation: u64,
        spans: ThemeSpans,
    ) -> bool {
        if generation != self.edit_generation {
            return false;
        }
        self.with_theme_provider(token, |target| *target = spans)
    }

    // --- Tooltip providers ---

    pub fn add_tooltip_provider(
        &mut self,
        provider: impl Fn(usize) -> Option<Tooltip> + 'static,
    ) -> ProviderToken {
        let token = self.next_provider_token;
        self.next_provider_token += 1;
        self.tooltip_providers.push(TooltipProviderEntry {
            token,
            provider: Box::new(provider),
        });
        ProviderToken(token)
    }

    pub fn remove_tooltip_provider(&mut self, token: ProviderToken) {
        self.tooltip_providers.retain(|p| p.token != token.0);
    }

    /// Tooltips contributed for the character at `c`, in provider order.
    pub fn tooltips_at(&self, c: usize) -> Vec<Tooltip> {
        self.tooltip_providers
            .iter()
            .filter_map(|p| (p.provider)(c))
            .collect()
    }
}

impl std::fmt::Debug for Interpretation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interpretation")
            .field("id", &self.id)
            .field("bytes", &self.num_bytes())
            .field("codepoints", &self.num_codepoints())
            .field("chars", &self.num_chars())
            .field("lines", &self.num_lines())
            .finish()
    }
}

fn clamp_selection(caret: &Caret, num_chars: usize) -> (usize, usize) {
    let a = caret.start.min(num_chars);
    let b = caret.end.min(num_chars);
    (a.min(b), a.max(b))
}

/// Composed character/byte converter: the line converter handles CRLF, the
/// chunk cursor handles the encoding.
pub struct CharByteConverter<'a> {
    lines: LinePosConverter<'a>,
    cursor: chunks::ChunkCursor<'a>,
}

impl CharByteConverter<'_> {
    pub fn char_to_byte(&mut self, c: usize) -> usize {
        let cp = self.lines.char_to_codepoint(c);
        self.cursor.byte_of_codepoint(cp)
    }

    pub fn byte_to_char(&mut self, byte: usize) -> usize {
        let (cp, _) = self.cursor.codepoint_of_byte(byte);
        self.lines.codepoint_to_char(cp)
    }
}

/// Stream of pre-edit codepoint boundaries past the erased range: the
/// cached boundaries first, then chunk-end boundaries from the (still
/// unspliced) chunk index.
struct OldBoundaries<'a> {
    recorded: &'a [(usize, usize)],
    at: usize,
    chunks: &'a ChunkIndex,
    /// Next chunk ordinal whose end boundary to emit, once the recorded
    /// entries are exhausted.
    next_chunk_end: usize,
}

impl<'a> OldBoundaries<'a> {
    fn new(recorded: &'a [(usize, usize)], chunks: &'a ChunkIndex) -> Self {
        let last_cp = recorded.last().map_or(0, |b| b.0);
        let next_chunk_end = match chunks.locate_by_codepoint(last_cp) {
            Some(loc) => loc.index + 1,
            None => chunks.num_chunks() + 1,
        };
        Self {
            recorded,
            at: 0,
            chunks,
            next_chunk_end,
        }
    }

    /// First boundary whose shifted byte position is at or past `pos`;
    /// earlier boundaries are consumed.
    fn first_at_or_after(&mut self, pos: usize, delta: isize) -> Option<(usize, usize)> {
        loop {
            let boundary = self.peek()?;
            if (boundary.1 as isize + delta) as usize >= pos {
                return Some(boundary);
            }
            self.bump();
        }
    }

    fn peek(&self) -> Option<(usize, usize)> {
        if self.at < self.recorded.len() {
            return Some(self.recorded[self.at]);
        }
        let k = self.next_chunk_end + (self.at - self.recorded.len());
        if k > self.chunks.num_chunks() {
            return None;
        }
        let prefix = self.chunks.prefix(k);
        Some((prefix.codepoints, prefix.bytes))
    }

    fn bump(&mut self) {
        self.at += 1;
    }
}
