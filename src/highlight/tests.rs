use super::*;
use crate::buffer::ByteBuffer;
use crate::encoding::Encoding;
use crate::interp::Interpretation;
use crate::theme::{Color, ThemeConfiguration, ThemeStyle};

fn rust_grammar() -> tree_sitter::Language {
    tree_sitter_rust::LANGUAGE.into()
}

fn red() -> ThemeStyle {
    ThemeStyle::colored(Color::new(255, 0, 0))
}

fn blue() -> ThemeStyle {
    ThemeStyle::colored(Color::new(0, 0, 255))
}

fn theme(entries: &[(&str, ThemeStyle)]) -> Arc<ThemeConfiguration> {
    Arc::new(ThemeConfiguration::new(
        entries.iter().map(|(n, s)| (n.to_string(), *s)).collect(),
    ))
}

fn job_for(
    source: &[u8],
    language: Language,
    provider: LanguageSet,
    theme: Arc<ThemeConfiguration>,
) -> HighlightJob {
    let mut language = language;
    language.configure(&theme);
    let interp = Interpretation::new(ByteBuffer::new(source.to_vec()), Encoding::Utf8);
    HighlightJob {
        snapshot: interp.snapshot(),
        language: Arc::new(language),
        provider: Arc::new(provider),
        theme,
    }
}

#[test]
fn test_bad_query_is_a_setup_error() {
    let err = Language::new("rust", rust_grammar(), "(no_such_node) @x", None, None).unwrap_err();
    assert_eq!(err.code, crate::constants::errors::QUERY_ERROR);
}

#[test]
fn test_basic_keyword_highlight() {
    let language =
        Language::new("rust", rust_grammar(), r#""fn" @keyword"#, None, None).unwrap();
    let theme = theme(&[("keyword", red())]);
    let job = job_for(b"fn main() {}", language, LanguageSet::new(), theme);

    let cancel = AtomicBool::new(false);
    let spans = compute_highlight(&job, &cancel).unwrap();

    assert_eq!(spans.style_at(0), Some(red()));
    assert_eq!(spans.style_at(1), Some(red()));
    assert_eq!(spans.style_at(2), None);
}

#[test]
fn test_unconfigured_capture_produces_no_spans() {
    let language =
        Language::new("rust", rust_grammar(), r#""fn" @keyword"#, None, None).unwrap();
    // Theme has no entry for "keyword".
    let theme = theme(&[("string", red())]);
    let job = job_for(b"fn main() {}", language, LanguageSet::new(), theme);

    let cancel = AtomicBool::new(false);
    let spans = compute_highlight(&job, &cancel).unwrap();
    assert!(spans.is_empty());
}

#[test]
fn test_dotted_capture_falls_back_to_prefix() {
    // Capture "function.macro" resolves through the "function" entry.
    let language = Language::new(
        "rust",
        rust_grammar(),
        r#"(macro_invocation macro: (identifier) @function.macro)"#,
        None,
        None,
    )
    .unwrap();
    let theme = theme(&[("function", blue())]);
    let job = job_for(b"foo!(1);", language, LanguageSet::new(), theme);

    let cancel = AtomicBool::new(false);
    let spans = compute_highlight(&job, &cancel).unwrap();
    assert_eq!(spans.style_at(0), Some(blue()));
    assert_eq!(spans.style_at(2), Some(blue()));
    assert_eq!(spans.style_at(3), None);
}

#[test]
fn test_cancelled_before_start_returns_none() {
    let language =
        Language::new("rust", rust_grammar(), r#""fn" @keyword"#, None, None).unwrap();
    let theme = theme(&[("keyword", red())]);
    let job = job_for(b"fn main() {}", language, LanguageSet::new(), theme);

    let cancel = AtomicBool::new(true);
    assert!(compute_highlight(&job, &cancel).is_none());
}

#[test]
fn test_injection_spawns_deeper_layer() {
    let outer = Language::new(
        "outer",
        rust_grammar(),
        r#"(macro_invocation macro: (identifier) @function)"#,
        Some(
            r#"((token_tree) @injection.content
  (#set! injection.language "inner")
  (#set! injection.include-children))"#,
        ),
        None,
    )
    .unwrap();
    let inner = Language::new("inner", rust_grammar(), r#"(identifier) @variable"#, None, None)
        .unwrap();

    let theme = theme(&[("function", red()), ("variable", blue())]);
    let mut outer = outer;
    outer.configure(&theme);
    let mut inner = inner;
    inner.configure(&theme);

    let mut provider = LanguageSet::new();
    provider.insert(Arc::new(inner));

    let source = b"foo!(bar baz);";
    let interp = Interpretation::new(ByteBuffer::new(source.to_vec()), Encoding::Utf8);
    let job = HighlightJob {
        snapshot: interp.snapshot(),
        language: Arc::new(outer),
        provider: Arc::new(provider),
        theme,
    };

    let cancel = AtomicBool::new(false);
    let guard = job.snapshot.bytes.read().unwrap();
    let layers = build_layers(&job, &guard[..], &cancel).unwrap();

    assert_eq!(layers.len(), 2);
    let deepest = layers.iter().max_by_key(|l| l.depth).unwrap();
    assert_eq!(deepest.depth, 1);
    assert_eq!(deepest.language.name, "inner");
    // The injected ranges cover the token tree "(bar baz)".
    assert_eq!(deepest.ranges[0].start_byte, 4);
    assert_eq!(deepest.ranges.last().unwrap().end_byte, 13);
}

#[test]
fn test_injection_without_known_language_is_skipped() {
    let outer = Language::new(
        "outer",
        rust_grammar(),
        r#""fn" @keyword"#,
        Some(
            r#"((token_tree) @injection.content
  (#set! injection.language "nowhere"))"#,
        ),
        None,
    )
    .unwrap();
    let theme = theme(&[("keyword", red())]);
    let job = job_for(b"foo!(1); fn x() {}", outer, LanguageSet::new(), theme);

    let cancel = AtomicBool::new(false);
    let guard = job.snapshot.bytes.read().unwrap();
    let layers = build_layers(&job, &guard[..], &cancel).unwrap();
    assert_eq!(layers.len(), 1);
}

#[test]
fn test_intersect_ranges_excludes_children_by_default() {
    let mut parser = Parser::new();
    parser.set_language(&rust_grammar()).unwrap();
    let source = b"foo!(bar baz);";
    let tree = parser.parse(source, None).unwrap();

    // Find the token_tree node: "(bar baz)" at bytes 4..13.
    let mut cursor = QueryCursor::new();
    let query = Query::new(&rust_grammar(), "(token_tree) @t").unwrap();
    let mut matches = cursor.matches(&query, tree.root_node(), source.as_slice());
    let node = {
        let m = matches.next().unwrap();
        m.captures[0].node
    };
    assert_eq!(node.byte_range(), 4..13);

    let full = TsRange {
        start_byte: 0,
        end_byte: usize::MAX,
        start_point: Point::new(0, 0),
        end_point: Point::new(usize::MAX, usize::MAX),
    };

    // Children excluded: only the whitespace between the child tokens
    // remains.
    let excluded = intersect_ranges(&[full], node, false);
    assert!(excluded.iter().all(|r| r.start_byte >= 4 && r.end_byte <= 13));
    assert!(excluded.iter().any(|r| r.start_byte == 8 && r.end_byte == 9));

    // Children included: the whole node survives.
    let included = intersect_ranges(&[full], node, true);
    assert_eq!(included.len(), 1);
    assert_eq!(included[0].start_byte, 4);
    assert_eq!(included[0].end_byte, 13);
}

#[test]
fn test_local_definition_overrides_reference_highlight() {
    let locals = r#"
(block) @local.scope
(let_declaration pattern: (identifier) @local.definition)
(identifier) @local.reference
"#;
    let highlights = r#"
(let_declaration pattern: (identifier) @constant)
(identifier) @variable
"#;
    let language =
        Language::new("rust", rust_grammar(), highlights, None, Some(locals)).unwrap();
    let theme = theme(&[("constant", red()), ("variable", blue())]);

    let source = b"fn main() { let x = 1; x; y; }";
    let job = job_for(source, language, LanguageSet::new(), theme);

    let cancel = AtomicBool::new(false);
    let spans = compute_highlight(&job, &cancel).unwrap();

    // The definition site is highlighted as a constant.
    assert_eq!(spans.style_at(16), Some(red()));
    // The reference inherits the definition's highlight.
    assert_eq!(spans.style_at(23), Some(red()));
    // An unresolved name keeps the plain identifier highlight.
    assert_eq!(spans.style_at(26), Some(blue()));
}

#[test]
fn test_crlf_highlight_positions_are_characters() {
    // A keyword on the second line after a CRLF: its character positions
    // are one less than its byte positions.
    let language =
        Language::new("rust", rust_grammar(), r#""fn" @keyword"#, None, None).unwrap();
    let theme = theme(&[("keyword", red())]);
    let source = b"//x\r\nfn main() {}";
    let job = job_for(source, language, LanguageSet::new(), theme);

    let cancel = AtomicBool::new(false);
    let spans = compute_highlight(&job, &cancel).unwrap();

    // Bytes 5..7 hold "fn"; the CRLF collapses one character, so the span
    // covers characters 4..6.
    assert_eq!(spans.style_at(4), Some(red()));
    assert_eq!(spans.style_at(5), Some(red()));
    assert_eq!(spans.style_at(6), None);
}
