use super::*;

fn decode_all(enc: &Encoding, bytes: &[u8]) -> Vec<(u32, bool)> {
    let mut out = Vec::new();
    let mut at = 0;
    while let Some(step) = enc.next_codepoint(bytes, at) {
        out.push((step.codepoint, step.valid));
        at += step.advance;
    }
    out
}

#[test]
fn test_utf8_ascii() {
    let decoded = decode_all(&Encoding::Utf8, b"abc");
    assert_eq!(decoded, vec![(97, true), (98, true), (99, true)]);
}

#[test]
fn test_utf8_multibyte() {
    // "é" = C3 A9, "€" = E2 82 AC, "𝄞" = F0 9D 84 9E
    let decoded = decode_all(&Encoding::Utf8, &[0xC3, 0xA9, 0xE2, 0x82, 0xAC, 0xF0, 0x9D, 0x84, 0x9E]);
    assert_eq!(
        decoded,
        vec![(0xE9, true), (0x20AC, true), (0x1D11E, true)]
    );
}

#[test]
fn test_utf8_invalid_byte_advances_one() {
    let decoded = decode_all(&Encoding::Utf8, &[0x61, 0xFF, 0x62]);
    assert_eq!(
        decoded,
        vec![(97, true), (REPLACEMENT_CODEPOINT, false), (98, true)]
    );
}

#[test]
fn test_utf8_truncated_sequence() {
    // Lead byte of a 3-byte sequence with only one continuation.
    let decoded = decode_all(&Encoding::Utf8, &[0xE2, 0x82]);
    assert_eq!(decoded.len(), 2);
    assert!(decoded.iter().all(|(cp, valid)| *cp == REPLACEMENT_CODEPOINT && !valid));
}

#[test]
fn test_utf8_overlong_rejected() {
    // C0 80 is the classic overlong NUL.
    let decoded = decode_all(&Encoding::Utf8, &[0xC0, 0x80]);
    assert_eq!(decoded[0], (REPLACEMENT_CODEPOINT, false));
}

#[test]
fn test_utf8_surrogate_rejected() {
    // ED A0 80 encodes U+D800.
    let decoded = decode_all(&Encoding::Utf8, &[0xED, 0xA0, 0x80]);
    assert!(!decoded[0].1);
}

#[test]
fn test_utf8_encode_roundtrip() {
    let enc = Encoding::Utf8;
    for &cp in &[0x41u32, 0xE9, 0x20AC, 0x1D11E] {
        let mut bytes = Vec::new();
        enc.encode_codepoint(cp, &mut bytes);
        let decoded = decode_all(&enc, &bytes);
        assert_eq!(decoded, vec![(cp, true)]);
    }
}

#[test]
fn test_encode_invalid_scalar_degrades_to_replacement() {
    let mut bytes = Vec::new();
    Encoding::Utf8.encode_codepoint(0xD800, &mut bytes);
    let decoded = decode_all(&Encoding::Utf8, &bytes);
    assert_eq!(decoded, vec![(REPLACEMENT_CODEPOINT, true)]);
}

#[test]
fn test_utf16le_bmp() {
    // "aé" in UTF-16LE.
    let decoded = decode_all(&Encoding::Utf16Le, &[0x61, 0x00, 0xE9, 0x00]);
    assert_eq!(decoded, vec![(0x61, true), (0xE9, true)]);
}

#[test]
fn test_utf16le_surrogate_pair() {
    // U+1D11E = D834 DD1E.
    let decoded = decode_all(&Encoding::Utf16Le, &[0x34, 0xD8, 0x1E, 0xDD]);
    assert_eq!(decoded, vec![(0x1D11E, true)]);
}

#[test]
fn test_utf16le_lone_high_surrogate() {
    let decoded = decode_all(&Encoding::Utf16Le, &[0x34, 0xD8, 0x61, 0x00]);
    assert_eq!(
        decoded,
        vec![(REPLACEMENT_CODEPOINT, false), (0x61, true)]
    );
}

#[test]
fn test_utf16le_lone_low_surrogate() {
    let decoded = decode_all(&Encoding::Utf16Le, &[0x1E, 0xDD]);
    assert_eq!(decoded, vec![(REPLACEMENT_CODEPOINT, false)]);
}

#[test]
fn test_utf16_truncated_tail_advances_one() {
    let decoded = decode_all(&Encoding::Utf16Le, &[0x61, 0x00, 0x7A]);
    assert_eq!(
        decoded,
        vec![(0x61, true), (REPLACEMENT_CODEPOINT, false)]
    );
}

#[test]
fn test_utf16be_bmp_and_pair() {
    let decoded = decode_all(&Encoding::Utf16Be, &[0x00, 0x61, 0xD8, 0x34, 0xDD, 0x1E]);
    assert_eq!(decoded, vec![(0x61, true), (0x1D11E, true)]);
}

#[test]
fn test_utf16_encode_roundtrip() {
    for enc in [Encoding::Utf16Le, Encoding::Utf16Be] {
        for &cp in &[0x41u32, 0xE9, 0xFFFD, 0x1D11E] {
            let mut bytes = Vec::new();
            enc.encode_codepoint(cp, &mut bytes);
            let decoded = decode_all(&enc, &bytes);
            assert_eq!(decoded, vec![(cp, true)]);
        }
    }
}

#[test]
fn test_registry_builtins() {
    let registry = EncodingRegistry::new();
    assert!(registry.get("utf-8").is_ok());
    assert!(registry.get("utf-16le").is_ok());
    assert!(registry.get("utf-16be").is_ok());
    assert_eq!(registry.default_name(), "utf-8");
}

#[test]
fn test_registry_unknown_name_is_error() {
    let registry = EncodingRegistry::new();
    let err = registry.get("latin9").unwrap_err();
    assert_eq!(err.code, crate::constants::errors::UNKNOWN_ENCODING);
}

#[test]
fn test_registry_refuses_duplicates() {
    let mut registry = EncodingRegistry::new();
    let err = registry.register("utf-8", Encoding::Utf8).unwrap_err();
    assert_eq!(err.code, crate::constants::errors::DUPLICATE_ENCODING);
}

#[test]
fn test_registry_set_default() {
    let mut registry = EncodingRegistry::new();
    registry.set_default("utf-16le").unwrap();
    assert_eq!(registry.default_name(), "utf-16le");
    assert!(registry.set_default("nope").is_err());
}

#[test]
fn test_custom_decoder_slot() {
    // A one-byte identity "encoding" exercising the trait-object slot.
    struct Raw;
    impl Decoder for Raw {
        fn max_codepoint_len(&self) -> usize {
            1
        }
        fn next_codepoint(&self, bytes: &[u8], at: usize) -> Option<DecodeStep> {
            bytes.get(at).map(|b| DecodeStep {
                codepoint: *b as u32,
                valid: true,
                advance: 1,
            })
        }
        fn encode_codepoint(&self, cp: u32, out: &mut Vec<u8>) {
            out.push(cp as u8);
        }
    }

    let mut registry = EncodingRegistry::new();
    registry
        .register("raw", Encoding::Custom(std::sync::Arc::new(Raw)))
        .unwrap();
    let enc = registry.get("raw").unwrap();
    let decoded = decode_all(&enc, &[0x80, 0x41]);
    assert_eq!(decoded, vec![(0x80, true), (0x41, true)]);
}
