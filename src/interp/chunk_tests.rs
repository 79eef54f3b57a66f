use super::*;
use crate::constants::chunks::MAX_CPP_PER_CHUNK;

fn utf8_chunks(text: &str) -> Vec<ChunkInfo> {
    let lens: Vec<usize> = text.chars().map(|c| c.len_utf8()).collect();
    chunks_of_codepoints(&lens)
}

#[test]
fn test_empty_index() {
    let index = ChunkIndex::new();
    assert_eq!(index.num_bytes(), 0);
    assert_eq!(index.num_codepoints(), 0);
    assert!(index.locate_by_codepoint(0).is_none());
    assert!(index.locate_by_byte(0).is_none());
}

#[test]
fn test_chunks_of_codepoints_grouping() {
    let lens = vec![1usize; MAX_CPP_PER_CHUNK * 2 + 5];
    let chunks = chunks_of_codepoints(&lens);
    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks[0].codepoints, MAX_CPP_PER_CHUNK);
    assert_eq!(chunks[1].codepoints, MAX_CPP_PER_CHUNK);
    assert_eq!(chunks[2].codepoints, 5);
    assert!(chunks.iter().all(|c| c.codepoints <= MAX_CPP_PER_CHUNK));
}

#[test]
fn test_locate_by_codepoint_and_byte() {
    let index = ChunkIndex::from_chunks(vec![
        ChunkInfo { bytes: 10, codepoints: 5 },
        ChunkInfo { bytes: 6, codepoints: 6 },
        ChunkInfo { bytes: 4, codepoints: 2 },
    ]);
    let loc = index.locate_by_codepoint(7).unwrap();
    assert_eq!(loc.index, 1);
    assert_eq!(loc.prefix.codepoints, 5);
    assert_eq!(loc.prefix.bytes, 10);

    let loc = index.locate_by_byte(16).unwrap();
    assert_eq!(loc.index, 2);
    assert_eq!(loc.prefix.bytes, 16);

    assert!(index.locate_by_codepoint(13).is_none());
    assert!(index.locate_by_byte(20).is_none());
}

#[test]
fn test_cursor_byte_of_codepoint_utf8() {
    let text = "aé€b"; // 1, 2, 3, 1 bytes
    let bytes = text.as_bytes().to_vec();
    let index = ChunkIndex::from_chunks(utf8_chunks(text));
    let enc = Encoding::Utf8;
    let mut cursor = index.cursor(&enc, &bytes);

    assert_eq!(cursor.byte_of_codepoint(0), 0);
    assert_eq!(cursor.byte_of_codepoint(1), 1);
    assert_eq!(cursor.byte_of_codepoint(2), 3);
    assert_eq!(cursor.byte_of_codepoint(3), 6);
    assert_eq!(cursor.byte_of_codepoint(4), 7);
}

#[test]
fn test_cursor_codepoint_of_byte_utf8() {
    let text = "aé€b";
    let bytes = text.as_bytes().to_vec();
    let index = ChunkIndex::from_chunks(utf8_chunks(text));
    let enc = Encoding::Utf8;
    let mut cursor = index.cursor(&enc, &bytes);

    assert_eq!(cursor.codepoint_of_byte(0), (0, 0));
    assert_eq!(cursor.codepoint_of_byte(1), (1, 1));
    // Mid-codepoint bytes resolve to the covering codepoint.
    assert_eq!(cursor.codepoint_of_byte(2), (1, 1));
    assert_eq!(cursor.codepoint_of_byte(4), (2, 3));
    assert_eq!(cursor.codepoint_of_byte(6), (3, 6));
    assert_eq!(cursor.codepoint_of_byte(7), (4, 7));
}

#[test]
fn test_cursor_non_monotone_reseeks() {
    let text = "abcdefgh";
    let bytes = text.as_bytes().to_vec();
    let index = ChunkIndex::from_chunks(utf8_chunks(text));
    let enc = Encoding::Utf8;
    let mut cursor = index.cursor(&enc, &bytes);

    assert_eq!(cursor.byte_of_codepoint(6), 6);
    assert_eq!(cursor.byte_of_codepoint(2), 2);
    assert_eq!(cursor.codepoint_of_byte(1), (1, 1));
    assert_eq!(cursor.codepoint_of_byte(7), (7, 7));
}

#[test]
fn test_round_trip_at_boundaries() {
    let text = "aé€b𝄞x";
    let bytes = text.as_bytes().to_vec();
    let index = ChunkIndex::from_chunks(utf8_chunks(text));
    let enc = Encoding::Utf8;

    for cp in 0..=index.num_codepoints() {
        let mut cursor = index.cursor(&enc, &bytes);
        let byte = cursor.byte_of_codepoint(cp);
        let mut cursor = index.cursor(&enc, &bytes);
        assert_eq!(cursor.codepoint_of_byte(byte).0, cp);
    }
}

#[test]
fn test_splice_merges_small_neighbors() {
    let mut index = ChunkIndex::from_chunks(vec![
        ChunkInfo { bytes: 100, codepoints: 100 },
        ChunkInfo { bytes: 100, codepoints: 100 },
        ChunkInfo { bytes: 100, codepoints: 100 },
    ]);
    // Replace the middle chunk with two tiny ones; everything fits in one
    // chunk after seam merging.
    index.splice(
        1..2,
        vec![
            ChunkInfo { bytes: 3, codepoints: 3 },
            ChunkInfo { bytes: 2, codepoints: 2 },
        ],
    );
    assert_eq!(index.num_codepoints(), 205);
    assert_eq!(index.num_bytes(), 205);
    assert_eq!(index.num_chunks(), 1);
}

#[test]
fn test_splice_keeps_full_chunks_apart() {
    let full = ChunkInfo {
        bytes: MAX_CPP_PER_CHUNK,
        codepoints: MAX_CPP_PER_CHUNK,
    };
    let mut index = ChunkIndex::from_chunks(vec![full, full]);
    index.splice(1..1, vec![full]);
    assert_eq!(index.num_chunks(), 3);
    assert_eq!(index.num_codepoints(), 3 * MAX_CPP_PER_CHUNK);
}

#[test]
fn test_splice_drops_empty_replacement_chunks() {
    let mut index = ChunkIndex::from_chunks(vec![ChunkInfo { bytes: 5, codepoints: 5 }]);
    index.splice(0..1, vec![ChunkInfo { bytes: 0, codepoints: 0 }]);
    assert_eq!(index.num_chunks(), 0);
}

#[test]
fn test_underfull_invariant_after_splices() {
    let mut index = ChunkIndex::from_chunks(vec![
        ChunkInfo { bytes: 600, codepoints: 600 },
        ChunkInfo { bytes: 700, codepoints: 700 },
        ChunkInfo { bytes: 600, codepoints: 600 },
    ]);
    index.splice(1..2, vec![ChunkInfo { bytes: 10, codepoints: 10 }]);

    let chunks: Vec<ChunkInfo> = index.chunks().copied().collect();
    for pair in chunks.windows(2) {
        assert!(
            pair[0].codepoints >= MERGE_THRESHOLD || pair[1].codepoints >= MERGE_THRESHOLD,
            "adjacent underfull chunks: {:?}",
            chunks
        );
    }
    assert_eq!(index.num_codepoints(), 1210);
}
