use super::*;
use crate::interp::lines::{clip_from_codepoints, LineIndex};

fn line_index(text: &str) -> LineIndex {
    let cps: Vec<u32> = text.chars().map(|c| c as u32).collect();
    LineIndex::from_lines(clip_from_codepoints(&cps))
}

#[test]
fn test_empty_index_falls_back_to_hard_lines() {
    let lines = line_index("ab\ncd\nef");
    let soft = SoftBreakIndex::new();
    assert_eq!(soft.visual_line_count(&lines), 3);
    assert_eq!(soft.char_of_visual_line(0, &lines), 0);
    assert_eq!(soft.char_of_visual_line(1, &lines), 3);
    assert_eq!(soft.char_of_visual_line(2, &lines), 6);
    assert_eq!(soft.visual_line_of_char(4, &lines), 1);
}

#[test]
fn test_set_breaks_and_positions() {
    let mut soft = SoftBreakIndex::new();
    soft.set_breaks(&[4, 9, 15]);
    assert_eq!(soft.num_breaks(), 3);
    assert_eq!(soft.break_position(0), Some(4));
    assert_eq!(soft.break_position(1), Some(9));
    assert_eq!(soft.break_position(2), Some(15));
    assert_eq!(soft.break_position(3), None);

    soft.clear();
    assert_eq!(soft.num_breaks(), 0);
}

#[test]
fn test_breaks_le() {
    let mut soft = SoftBreakIndex::new();
    soft.set_breaks(&[4, 9]);
    assert_eq!(soft.breaks_le(0), 0);
    assert_eq!(soft.breaks_le(3), 0);
    assert_eq!(soft.breaks_le(4), 1);
    assert_eq!(soft.breaks_le(8), 1);
    assert_eq!(soft.breaks_le(9), 2);
    assert_eq!(soft.breaks_le(100), 2);
}

#[test]
fn test_visual_lines_with_soft_breaks_single_hard_line() {
    // "aaaabbbbcccc" wrapped every 4 characters.
    let lines = line_index("aaaabbbbcccc");
    let mut soft = SoftBreakIndex::new();
    soft.set_breaks(&[4, 8]);

    assert_eq!(soft.visual_line_count(&lines), 3);
    assert_eq!(soft.char_of_visual_line(0, &lines), 0);
    assert_eq!(soft.char_of_visual_line(1, &lines), 4);
    assert_eq!(soft.char_of_visual_line(2, &lines), 8);

    assert_eq!(soft.visual_line_of_char(0, &lines), 0);
    assert_eq!(soft.visual_line_of_char(3, &lines), 0);
    assert_eq!(soft.visual_line_of_char(4, &lines), 1);
    assert_eq!(soft.visual_line_of_char(11, &lines), 2);
}

#[test]
fn test_visual_lines_mixing_hard_and_soft() {
    // Two hard lines; the first is wrapped at 3 and 7.
    let lines = line_index("abcdefghi\nxyz");
    let mut soft = SoftBreakIndex::new();
    soft.set_breaks(&[3, 7]);

    // Visual starts: 0 (doc), 3 (soft), 7 (soft), 10 (hard).
    assert_eq!(soft.visual_line_count(&lines), 4);
    assert_eq!(soft.char_of_visual_line(0, &lines), 0);
    assert_eq!(soft.char_of_visual_line(1, &lines), 3);
    assert_eq!(soft.char_of_visual_line(2, &lines), 7);
    assert_eq!(soft.char_of_visual_line(3, &lines), 10);

    assert_eq!(soft.visual_line_of_char(2, &lines), 0);
    assert_eq!(soft.visual_line_of_char(3, &lines), 1);
    assert_eq!(soft.visual_line_of_char(9, &lines), 2); // the \n itself
    assert_eq!(soft.visual_line_of_char(10, &lines), 3);
}

#[test]
fn test_char_of_visual_line_past_end_clamps() {
    let lines = line_index("ab\ncd");
    let mut soft = SoftBreakIndex::new();
    soft.set_breaks(&[1]);
    assert_eq!(soft.char_of_visual_line(99, &lines), lines.num_chars());
}

#[test]
fn test_round_trip_visual_queries() {
    let lines = line_index("aaaa\nbbbbbbbb\ncc");
    let mut soft = SoftBreakIndex::new();
    soft.set_breaks(&[9, 12]);

    for visual in 0..soft.visual_line_count(&lines) {
        let start = soft.char_of_visual_line(visual, &lines);
        assert_eq!(
            soft.visual_line_of_char(start, &lines),
            visual,
            "start of visual line {} should map back",
            visual
        );
    }
}
