//! Highlight pipeline
//!
//! Runs an incremental parser over the interpretation's bytes on a worker
//! thread, walks capture events across layered injections with local-scope
//! resolution, and produces a character-range theme map that is published
//! back to the interpretation as a theme provider. See [`manager`] for the
//! worker that schedules these computations.

use crate::constants::captures as names;
use crate::constants::errors;
use crate::constants::highlight::PARSE_CHUNK;
use crate::error::{CoreError, ErrorType, Result};
use crate::interp::InterpSnapshot;
use crate::theme::{ThemeConfiguration, ThemeRange, ThemeSpans};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use streaming_iterator::StreamingIterator;
use tree_sitter::{Node, Parser, Point, Query, QueryCursor, Range as TsRange, Tree};

pub mod manager;

/// A grammar plus its compiled highlight/injection/local queries, bound to
/// a theme configuration via [`Language::configure`].
pub struct Language {
    pub name: String,
    ts_language: tree_sitter::Language,
    /// Locals patterns concatenated before highlight patterns, so local
    /// captures for a node sort before its highlight captures.
    query: Query,
    injections_query: Option<Query>,

    local_scope_capture: Option<u32>,
    local_definition_capture: Option<u32>,
    local_definition_value_capture: Option<u32>,
    local_reference_capture: Option<u32>,
    /// Per pattern: whether a `local.scope` from it inherits outer
    /// definitions.
    scope_inherits: Vec<bool>,

    /// Per capture index: theme-configuration index, set by `configure`.
    highlight_indices: Vec<Option<u32>>,

    injection_content_capture: Option<u32>,
    injection_language_capture: Option<u32>,
    /// Per injection pattern: language name from `#set!` and whether child
    /// nodes stay included.
    injection_patterns: Vec<(Option<String>, bool)>,
}

impl Language {
    pub fn new(
        name: impl Into<String>,
        ts_language: tree_sitter::Language,
        highlights_source: &str,
        injections_source: Option<&str>,
        locals_source: Option<&str>,
    ) -> Result<Self> {
        let name = name.into();
        let locals_source = locals_source.unwrap_or("");
        let combined = format!("{}\n{}", locals_source, highlights_source);

        let query = Query::new(&ts_language, &combined).map_err(|e| {
            log::warn!("highlight query for {:?} failed to compile: {}", name, e);
            CoreError::new(ErrorType::Syntax, errors::QUERY_ERROR, e.to_string())
        })?;

        let injections_query = match injections_source {
            Some(source) => Some(Query::new(&ts_language, source).map_err(|e| {
                log::warn!("injection query for {:?} failed to compile: {}", name, e);
                CoreError::new(ErrorType::Syntax, errors::QUERY_ERROR, e.to_string())
            })?),
            None => None,
        };

        let capture_index = |query: &Query, name: &str| -> Option<u32> {
            query
                .capture_names()
                .iter()
                .position(|n| *n == name)
                .map(|i| i as u32)
        };

        let scope_inherits = (0..query.pattern_count())
            .map(|pattern| {
                query.property_settings(pattern).iter().any(|prop| {
                    &*prop.key == names::LOCAL_SCOPE_INHERITS
                        && prop.value.as_deref() != Some("false")
                })
            })
            .collect();

        let (injection_content_capture, injection_language_capture, injection_patterns) =
            match &injections_query {
                Some(q) => {
                    let patterns = (0..q.pattern_count())
                        .map(|pattern| {
                            let mut language = None;
                            let mut include_children = false;
                            for prop in q.property_settings(pattern) {
                                if &*prop.key == names::INJECTION_LANGUAGE {
                                    language = prop.value.as_deref().map(str::to_string);
                                } else if &*prop.key == names::INJECTION_INCLUDE_CHILDREN {
                                    include_children = true;
                                }
                            }
                            (language, include_children)
                        })
                        .collect();
                    (
                        capture_index(q, names::INJECTION_CONTENT),
                        capture_index(q, names::INJECTION_LANGUAGE),
                        patterns,
                    )
                }
                None => (None, None, Vec::new()),
            };

        let highlight_count = query.capture_names().len();
        Ok(Self {
            name,
            local_scope_capture: capture_index(&query, names::LOCAL_SCOPE),
            local_definition_capture: capture_index(&query, names::LOCAL_DEFINITION),
            local_definition_value_capture: capture_index(&query, names::LOCAL_DEFINITION_VALUE),
            local_reference_capture: capture_index(&query, names::LOCAL_REFERENCE),
            scope_inherits,
            highlight_indices: vec![None; highlight_count],
            injection_content_capture,
            injection_language_capture,
            injection_patterns,
            ts_language,
            query,
            injections_query,
        })
    }

    /// Bind capture names to theme-configuration entries. Unbound captures
    /// produce no highlight.
    pub fn configure(&mut self, theme: &ThemeConfiguration) {
        self.highlight_indices = self
            .query
            .capture_names()
            .iter()
            .map(|capture| {
                if capture.starts_with("local.") || capture.starts_with("injection.") {
                    None
                } else {
                    theme.get_index_for(capture)
                }
            })
            .collect();
    }
}

impl std::fmt::Debug for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Language").field("name", &self.name).finish()
    }
}

/// Resolves injection language names to loaded languages.
pub trait LanguageProvider: Send + Sync {
    fn language_for(&self, name: &str) -> Option<Arc<Language>>;
}

/// Simple map-backed [`LanguageProvider`].
#[derive(Default)]
pub struct LanguageSet {
    by_name: HashMap<String, Arc<Language>>,
}

impl LanguageSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, language: Arc<Language>) {
        self.by_name.insert(language.name.clone(), language);
    }
}

impl LanguageProvider for LanguageSet {
    fn language_for(&self, name: &str) -> Option<Arc<Language>> {
        self.by_name.get(name).cloned()
    }
}

/// Everything a worker needs to compute one highlight pass.
pub struct HighlightJob {
    pub snapshot: InterpSnapshot,
    pub language: Arc<Language>,
    pub provider: Arc<dyn LanguageProvider>,
    pub theme: Arc<ThemeConfiguration>,
}

/// One parsed layer: a language over a set of included byte ranges.
struct Layer {
    language: Arc<Language>,
    tree: Tree,
    ranges: Vec<TsRange>,
    depth: usize,
}

/// Parse the root layer and all injection layers, breadth-first.
fn build_layers(job: &HighlightJob, bytes: &[u8], cancel: &AtomicBool) -> Option<Vec<Layer>> {
    let mut parser = Parser::new();
    let mut layers: Vec<Layer> = Vec::new();
    let full = TsRange {
        start_byte: 0,
        end_byte: usize::MAX,
        start_point: Point::new(0, 0),
        end_point: Point::new(usize::MAX, usize::MAX),
    };
    let mut queue: Vec<(Arc<Language>, Vec<TsRange>, usize)> =
        vec![(job.language.clone(), vec![full], 0)];

    while let Some((language, ranges, depth)) = queue.pop() {
        if cancel.load(Ordering::Relaxed) {
            return None;
        }
        if parser.set_language(&language.ts_language).is_err() {
            log::warn!("grammar for {:?} rejected by parser; layer skipped", language.name);
            continue;
        }
        if parser.set_included_ranges(&ranges).is_err() {
            continue;
        }

        let tree = parser.parse_with_options(
            &mut |byte: usize, _point: Point| {
                if byte < bytes.len() {
                    &bytes[byte..(byte + PARSE_CHUNK).min(bytes.len())]
                } else {
                    &[]
                }
            },
            None,
            None,
        );
        let Some(tree) = tree else {
            continue;
        };

        // Injections spawn deeper layers over the intersected ranges.
        if let Some(injections) = &language.injections_query {
            let mut cursor = QueryCursor::new();
            let mut matches = cursor.matches(injections, tree.root_node(), bytes);
            while let Some(m) = matches.next() {
                if cancel.load(Ordering::Relaxed) {
                    return None;
                }
                let (pattern_language, include_children) = language
                    .injection_patterns
                    .get(m.pattern_index)
                    .cloned()
                    .unwrap_or((None, false));

                let mut content: Option<Node> = None;
                let mut marker_language: Option<String> = None;
                for capture in m.captures {
                    if Some(capture.index) == language.injection_content_capture {
                        content = Some(capture.node);
                    } else if Some(capture.index) == language.injection_language_capture {
                        marker_language = String::from_utf8(
                            bytes[capture.node.byte_range()].to_vec(),
                        )
                        .ok();
                    }
                }

                let Some(content) = content else { continue };
                let Some(injected_name) = marker_language.or(pattern_language) else {
                    continue;
                };
                let Some(injected) = job.provider.language_for(&injected_name) else {
                    continue;
                };
                let child_ranges = intersect_ranges(&ranges, content, include_children);
                if !child_ranges.is_empty() {
                    queue.push((injected, child_ranges, depth + 1));
                }
            }
        }

        layers.push(Layer {
            language,
            tree,
            ranges,
            depth,
        });
    }
    Some(layers)
}

/// Byte ranges of `node` intersected with `parent_ranges`, minus the
/// node's children unless they are explicitly included.
fn intersect_ranges(
    parent_ranges: &[TsRange],
    node: Node<'_>,
    include_children: bool,
) -> Vec<TsRange> {
    let mut segments: Vec<TsRange> = Vec::new();
    if include_children {
        segments.push(node.range());
    } else {
        let mut cursor = node.walk();
        let mut prev_end = (node.start_byte(), node.start_position());
        for child in node.children(&mut cursor) {
            let child_range = child.range();
            if child_range.start_byte > prev_end.0 {
                segments.push(TsRange {
                    start_byte: prev_end.0,
                    start_point: prev_end.1,
                    end_byte: child_range.start_byte,
                    end_point: child_range.start_point,
                });
            }
            prev_end = (child_range.end_byte, child_range.end_point);
        }
        if node.end_byte() > prev_end.0 {
            segments.push(TsRange {
                start_byte: prev_end.0,
                start_point: prev_end.1,
                end_byte: node.end_byte(),
                end_point: node.end_position(),
            });
        }
        if segments.is_empty() {
            segments.push(node.range());
        }
    }

    // Clip each segment against the parent's included ranges.
    let mut out = Vec::new();
    for segment in segments {
        for parent in parent_ranges {
            let start = segment.start_byte.max(parent.start_byte);
            let end = segment.end_byte.min(parent.end_byte);
            if start >= end {
                continue;
            }
            let (start_byte, start_point) = if segment.start_byte >= parent.start_byte {
                (segment.start_byte, segment.start_point)
            } else {
                (parent.start_byte, parent.start_point)
            };
            let (end_byte, end_point) = if segment.end_byte <= parent.end_byte {
                (segment.end_byte, segment.end_point)
            } else {
                (parent.end_byte, parent.end_point)
            };
            out.push(TsRange {
                start_byte,
                start_point,
                end_byte,
                end_point,
            });
        }
    }
    out
}

/// One capture occurrence, collected per layer and replayed in tree order.
#[derive(Debug, Clone)]
struct RawCapture {
    start: usize,
    end: usize,
    capture: u32,
    pattern: usize,
}

struct LocalDef {
    name: Vec<u8>,
    range: std::ops::Range<usize>,
    value_range: Option<std::ops::Range<usize>>,
    highlight: Option<u32>,
}

struct LocalScope {
    range: std::ops::Range<usize>,
    inherits: bool,
    defs: Vec<LocalDef>,
}

/// Per-layer iteration state for the event merge.
struct LayerIter {
    depth: usize,
    captures: std::iter::Peekable<std::vec::IntoIter<RawCapture>>,
    end_stack: Vec<usize>,
    scope_stack: Vec<LocalScope>,
    language: Arc<Language>,
    last_highlight_range: Option<(usize, usize)>,
    /// Highlight override for the next capture covering this exact range,
    /// set by a resolved `local.reference`.
    reference_override: Option<(usize, usize, u32)>,
}

impl LayerIter {
    /// `(position, next-event-is-an-end)` of this layer's next event.
    fn next_key(&mut self) -> Option<(usize, bool)> {
        let end = self.end_stack.last().copied();
        let start = self.captures.peek().map(|c| c.start);
        match (end, start) {
            (Some(e), Some(s)) if e <= s => Some((e, true)),
            (_, Some(s)) => Some((s, false)),
            (Some(e), None) => Some((e, true)),
            (None, None) => None,
        }
    }
}

/// A highlight boundary: a region start carries a theme-configuration
/// index, a region end carries `None`.
type HighlightEvent = (usize, Option<u32>);

/// Status of a highlight computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightOutcome {
    Finished,
    Cancelled,
}

/// Compute the theme-range map for one snapshot. Returns `None` when the
/// cancel token fired; the partial result is discarded.
pub fn compute_highlight(job: &HighlightJob, cancel: &AtomicBool) -> Option<ThemeSpans> {
    let guard = job.snapshot.bytes.read().expect("buffer lock poisoned");
    let bytes = &guard[..];

    let layers = build_layers(job, bytes, cancel)?;
    let mut iters: Vec<LayerIter> = layers
        .iter()
        .map(|layer| collect_layer_captures(layer, bytes))
        .collect();

    // Merge events across layers: smallest position first; at equal
    // positions region starts beat region ends and deeper layers beat
    // shallower ones.
    let mut events: Vec<HighlightEvent> = Vec::new();
    let mut steps = 0usize;
    loop {
        if steps % 256 == 0 && cancel.load(Ordering::Relaxed) {
            return None;
        }
        steps += 1;

        let mut best: Option<(usize, (usize, bool, usize))> = None;
        for (idx, iter) in iters.iter_mut().enumerate() {
            if let Some((pos, is_end)) = iter.next_key() {
                let key = (pos, is_end, usize::MAX - iter.depth);
                if best.map_or(true, |(_, bkey)| key < bkey) {
                    best = Some((idx, key));
                }
            }
        }
        let Some((idx, _)) = best else { break };
        advance_layer(&mut iters[idx], bytes, &mut events);
    }

    // Byte events to character spans through the snapshot's own indices,
    // still under the same read guard.
    let spans = events_to_spans(&events, job, bytes);
    Some(spans)
}

fn collect_layer_captures(layer: &Layer, bytes: &[u8]) -> LayerIter {
    let mut cursor = QueryCursor::new();
    let mut raw: Vec<RawCapture> = Vec::new();
    let mut matches = cursor.matches(&layer.language.query, layer.tree.root_node(), bytes);
    while let Some(m) = matches.next() {
        for capture in m.captures {
            let range = capture.node.byte_range();
            raw.push(RawCapture {
                start: range.start,
                end: range.end,
                capture: capture.index,
                pattern: m.pattern_index,
            });
        }
    }
    // Tree order: by position, outermost first, locals before highlights.
    raw.sort_by(|a, b| {
        a.start
            .cmp(&b.start)
            .then(b.end.cmp(&a.end))
            .then(a.pattern.cmp(&b.pattern))
    });

    LayerIter {
        depth: layer.depth,
        captures: raw.into_iter().peekable(),
        end_stack: Vec::new(),
        scope_stack: vec![LocalScope {
            range: 0..usize::MAX,
            inherits: false,
            defs: Vec::new(),
        }],
        language: layer.language.clone(),
        last_highlight_range: None,
        reference_override: None,
    }
}

/// Emit this layer's next event (if visible) and advance its state.
fn advance_layer(layer: &mut LayerIter, bytes: &[u8], events: &mut Vec<HighlightEvent>) {
    // Region end due before the next capture starts.
    let next_start = layer.captures.peek().map(|c| c.start);
    if let Some(&end) = layer.end_stack.last() {
        if next_start.map_or(true, |s| end <= s) {
            layer.end_stack.pop();
            events.push((end, None));
            return;
        }
    }

    let Some(capture) = layer.captures.next() else {
        return;
    };
    let lang = layer.language.clone();

    // Expire local scopes the cursor has moved past.
    while layer.scope_stack.len() > 1
        && layer.scope_stack.last().unwrap().range.end <= capture.start
    {
        layer.scope_stack.pop();
    }

    if Some(capture.capture) == lang.local_scope_capture {
        let inherits = lang
            .scope_inherits
            .get(capture.pattern)
            .copied()
            .unwrap_or(false);
        layer.scope_stack.push(LocalScope {
            range: capture.start..capture.end,
            inherits,
            defs: Vec::new(),
        });
        return;
    }

    if Some(capture.capture) == lang.local_definition_capture {
        let name = bytes[capture.start..capture.end].to_vec();
        layer
            .scope_stack
            .last_mut()
            .unwrap()
            .defs
            .push(LocalDef {
                name,
                range: capture.start..capture.end,
                value_range: None,
                highlight: None,
            });
        return;
    }

    if Some(capture.capture) == lang.local_definition_value_capture {
        if let Some(def) = layer.scope_stack.last_mut().unwrap().defs.last_mut() {
            def.value_range = Some(capture.start..capture.end);
        }
        return;
    }

    if Some(capture.capture) == lang.local_reference_capture {
        let name = &bytes[capture.start..capture.end];
        let mut found = None;
        'scopes: for scope in layer.scope_stack.iter().rev() {
            for def in scope.defs.iter().rev() {
                if def.name == name {
                    // A reference inside its own definition's value does not
                    // inherit the definition's highlight.
                    let inside_value = def
                        .value_range
                        .as_ref()
                        .map_or(false, |r| r.start <= capture.start && capture.end <= r.end);
                    if !inside_value {
                        found = def.highlight;
                    }
                    break 'scopes;
                }
            }
            if !scope.inherits {
                break;
            }
        }
        if let Some(theme) = found {
            layer.reference_override = Some((capture.start, capture.end, theme));
        }
        return;
    }

    // Plain highlight capture.
    let configured = lang
        .highlight_indices
        .get(capture.capture as usize)
        .copied()
        .flatten();

    let theme = match layer.reference_override {
        Some((s, e, theme)) if s == capture.start && e == capture.end => {
            layer.reference_override = None;
            Some(theme)
        }
        _ => configured,
    };

    // First capture for a node wins; repeated captures for the same range
    // are dropped.
    if layer.last_highlight_range == Some((capture.start, capture.end)) {
        return;
    }

    let Some(theme) = theme else {
        return;
    };

    // Record the definition's own highlight for later references.
    if let Some(def) = layer
        .scope_stack
        .last_mut()
        .unwrap()
        .defs
        .last_mut()
        .filter(|def| def.highlight.is_none() && def.range == (capture.start..capture.end))
    {
        def.highlight = Some(theme);
    }

    layer.last_highlight_range = Some((capture.start, capture.end));
    if capture.end > capture.start {
        events.push((capture.start, Some(theme)));
        layer.end_stack.push(capture.end);
    }
}

/// Flatten start/end events into non-overlapping character spans.
fn events_to_spans(events: &[HighlightEvent], job: &HighlightJob, bytes: &[u8]) -> ThemeSpans {
    let mut lines_conv = job.snapshot.lines.converter();
    let mut chunk_cursor = job.snapshot.chunks.cursor(&job.snapshot.encoding, bytes);
    let mut to_char = |byte: usize| -> usize {
        let (cp, _) = chunk_cursor.codepoint_of_byte(byte);
        lines_conv.codepoint_to_char(cp)
    };

    let mut entries: Vec<ThemeRange> = Vec::new();
    let mut active: Vec<u32> = Vec::new();
    let mut span_start_char = 0usize;

    for &(byte, theme) in events {
        let at = to_char(byte);
        if at > span_start_char {
            if let Some(&top) = active.last() {
                if let Some(style) = job.theme.style(top) {
                    push_merged(&mut entries, span_start_char..at, style);
                }
            }
        }
        span_start_char = at.max(span_start_char);
        match theme {
            Some(idx) => active.push(idx),
            None => {
                active.pop();
            }
        }
    }

    let mut spans = ThemeSpans::new();
    spans.set(entries);
    spans
}

fn push_merged(
    entries: &mut Vec<ThemeRange>,
    range: std::ops::Range<usize>,
    style: crate::theme::ThemeStyle,
) {
    if let Some(last) = entries.last_mut() {
        if last.range.end == range.start && last.style == style {
            last.range.end = range.end;
            return;
        }
        debug_assert!(last.range.end <= range.start);
    }
    entries.push(ThemeRange { range, style });
}

/// Status wrapper used by the worker: distinguishes a finished map from a
/// cancelled pass.
pub fn run_job(job: &HighlightJob, cancel: &AtomicBool) -> (HighlightOutcome, Option<ThemeSpans>) {
    match compute_highlight(job, cancel) {
        Some(spans) => (HighlightOutcome::Finished, Some(spans)),
        None => (HighlightOutcome::Cancelled, None),
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
