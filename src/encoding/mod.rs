//! Encoding registry and built-in decoders
//!
//! Each encoding exposes codepoint iteration over raw bytes and encoding of
//! a single codepoint. Invalid sequences never fail: one replacement
//! codepoint is emitted per recovery step and iteration continues at the
//! next byte-sync point. Built-ins are a tagged variant; user-registered
//! encodings go through the trait-object slot.

use crate::constants::errors;
use crate::error::{CoreError, ErrorType, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Stand-in for any invalid byte sequence.
pub const REPLACEMENT_CODEPOINT: u32 = 0xFFFD;

/// One step of codepoint iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeStep {
    pub codepoint: u32,
    /// False when the bytes did not form a valid sequence and
    /// [`REPLACEMENT_CODEPOINT`] was substituted.
    pub valid: bool,
    /// Bytes consumed by this step; always at least 1.
    pub advance: usize,
}

/// Capability set for a user-registered encoding.
pub trait Decoder: Send + Sync {
    /// Maximum number of bytes a single codepoint can occupy.
    fn max_codepoint_len(&self) -> usize;

    /// Decode the codepoint starting at `at`; `None` at end of input.
    fn next_codepoint(&self, bytes: &[u8], at: usize) -> Option<DecodeStep>;

    /// Append the encoded form of `cp` to `out`.
    fn encode_codepoint(&self, cp: u32, out: &mut Vec<u8>);
}

/// An encoding known to the registry.
#[derive(Clone)]
pub enum Encoding {
    Utf8,
    Utf16Le,
    Utf16Be,
    Custom(Arc<dyn Decoder>),
}

impl Encoding {
    pub fn max_codepoint_len(&self) -> usize {
        match self {
            Encoding::Utf8 | Encoding::Utf16Le | Encoding::Utf16Be => 4,
            Encoding::Custom(d) => d.max_codepoint_len(),
        }
    }

    pub fn next_codepoint(&self, bytes: &[u8], at: usize) -> Option<DecodeStep> {
        if at >= bytes.len() {
            return None;
        }
        match self {
            Encoding::Utf8 => Some(next_utf8(bytes, at)),
            Encoding::Utf16Le => Some(next_utf16(bytes, at, read_u16_le)),
            Encoding::Utf16Be => Some(next_utf16(bytes, at, read_u16_be)),
            Encoding::Custom(d) => d.next_codepoint(bytes, at),
        }
    }

    pub fn encode_codepoint(&self, cp: u32, out: &mut Vec<u8>) {
        // Unencodable scalar values degrade to the replacement codepoint.
        let cp = if is_scalar_value(cp) { cp } else { REPLACEMENT_CODEPOINT };
        match self {
            Encoding::Utf8 => encode_utf8(cp, out),
            Encoding::Utf16Le => encode_utf16(cp, out, |unit, out| {
                out.extend_from_slice(&unit.to_le_bytes())
            }),
            Encoding::Utf16Be => encode_utf16(cp, out, |unit, out| {
                out.extend_from_slice(&unit.to_be_bytes())
            }),
            Encoding::Custom(d) => d.encode_codepoint(cp, out),
        }
    }
}

impl std::fmt::Debug for Encoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Encoding::Utf8 => write!(f, "Utf8"),
            Encoding::Utf16Le => write!(f, "Utf16Le"),
            Encoding::Utf16Be => write!(f, "Utf16Be"),
            Encoding::Custom(_) => write!(f, "Custom"),
        }
    }
}

fn is_scalar_value(cp: u32) -> bool {
    cp <= 0x10FFFF && !(0xD800..=0xDFFF).contains(&cp)
}

// --- UTF-8 ---

fn next_utf8(bytes: &[u8], at: usize) -> DecodeStep {
    let b0 = bytes[at];
    let (len, min_second, max_second) = match b0 {
        0x00..=0x7F => {
            return DecodeStep {
                codepoint: b0 as u32,
                valid: true,
                advance: 1,
            };
        }
        0xC2..=0xDF => (2, 0x80, 0xBF),
        0xE0 => (3, 0xA0, 0xBF),
        0xE1..=0xEC | 0xEE..=0xEF => (3, 0x80, 0xBF),
        0xED => (3, 0x80, 0x9F),
        0xF0 => (4, 0x90, 0xBF),
        0xF1..=0xF3 => (4, 0x80, 0xBF),
        0xF4 => (4, 0x80, 0x8F),
        _ => return replacement_step(1),
    };

    if at + len > bytes.len() {
        return replacement_step(1);
    }
    let b1 = bytes[at + 1];
    if b1 < min_second || b1 > max_second {
        return replacement_step(1);
    }
    let mut cp = match len {
        2 => (b0 as u32 & 0x1F) << 6 | (b1 as u32 & 0x3F),
        3 => (b0 as u32 & 0x0F) << 12 | (b1 as u32 & 0x3F) << 6,
        _ => (b0 as u32 & 0x07) << 18 | (b1 as u32 & 0x3F) << 12,
    };
    for i in 2..len {
        let b = bytes[at + i];
        if b & 0xC0 != 0x80 {
            return replacement_step(1);
        }
        cp |= (b as u32 & 0x3F) << (6 * (len - 1 - i));
    }
    DecodeStep {
        codepoint: cp,
        valid: true,
        advance: len,
    }
}

fn encode_utf8(cp: u32, out: &mut Vec<u8>) {
    if cp < 0x80 {
        out.push(cp as u8);
    } else if cp < 0x800 {
        out.push(0xC0 | (cp >> 6) as u8);
        out.push(0x80 | (cp & 0x3F) as u8);
    } else if cp < 0x10000 {
        out.push(0xE0 | (cp >> 12) as u8);
        out.push(0x80 | ((cp >> 6) & 0x3F) as u8);
        out.push(0x80 | (cp & 0x3F) as u8);
    } else {
        out.push(0xF0 | (cp >> 18) as u8);
        out.push(0x80 | ((cp >> 12) & 0x3F) as u8);
        out.push(0x80 | ((cp >> 6) & 0x3F) as u8);
        out.push(0x80 | (cp & 0x3F) as u8);
    }
}

// --- UTF-16 ---

fn read_u16_le(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn read_u16_be(bytes: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([bytes[at], bytes[at + 1]])
}

fn next_utf16(bytes: &[u8], at: usize, read: fn(&[u8], usize) -> u16) -> DecodeStep {
    if at + 2 > bytes.len() {
        // Truncated trailing byte.
        return replacement_step(1);
    }
    let unit = read(bytes, at);
    match unit {
        0xD800..=0xDBFF => {
            if at + 4 > bytes.len() {
                return replacement_step(2);
            }
            let low = read(bytes, at + 2);
            if !(0xDC00..=0xDFFF).contains(&low) {
                return replacement_step(2);
            }
            let cp = 0x10000 + ((unit as u32 - 0xD800) << 10) + (low as u32 - 0xDC00);
            DecodeStep {
                codepoint: cp,
                valid: true,
                advance: 4,
            }
        }
        0xDC00..=0xDFFF => replacement_step(2),
        _ => DecodeStep {
            codepoint: unit as u32,
            valid: true,
            advance: 2,
        },
    }
}

fn encode_utf16(cp: u32, out: &mut Vec<u8>, push_unit: fn(u16, &mut Vec<u8>)) {
    if cp < 0x10000 {
        push_unit(cp as u16, out);
    } else {
        let v = cp - 0x10000;
        push_unit(0xD800 + (v >> 10) as u16, out);
        push_unit(0xDC00 + (v & 0x3FF) as u16, out);
    }
}

fn replacement_step(advance: usize) -> DecodeStep {
    DecodeStep {
        codepoint: REPLACEMENT_CODEPOINT,
        valid: false,
        advance,
    }
}

// --- Registry ---

/// Name-keyed registry of decoders with a settable default.
///
/// Changing the default affects only interpretations constructed afterwards;
/// existing interpretations keep the encoding they were created with.
pub struct EncodingRegistry {
    encodings: HashMap<String, Encoding>,
    default_name: String,
}

impl EncodingRegistry {
    pub fn new() -> Self {
        let mut encodings = HashMap::new();
        encodings.insert("utf-8".to_string(), Encoding::Utf8);
        encodings.insert("utf-16le".to_string(), Encoding::Utf16Le);
        encodings.insert("utf-16be".to_string(), Encoding::Utf16Be);
        Self {
            encodings,
            default_name: "utf-8".to_string(),
        }
    }

    /// Register a new encoding; duplicate names are refused.
    pub fn register(&mut self, name: impl Into<String>, encoding: Encoding) -> Result<()> {
        let name = name.into();
        if self.encodings.contains_key(&name) {
            return Err(CoreError::new(
                ErrorType::Encoding,
                errors::DUPLICATE_ENCODING,
                format!("encoding {:?} is already registered", name),
            ));
        }
        self.encodings.insert(name, encoding);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Encoding> {
        self.encodings.get(name).cloned().ok_or_else(|| {
            CoreError::new(
                ErrorType::Encoding,
                errors::UNKNOWN_ENCODING,
                format!("no encoding registered under {:?}", name),
            )
        })
    }

    pub fn set_default(&mut self, name: &str) -> Result<()> {
        if !self.encodings.contains_key(name) {
            return Err(CoreError::new(
                ErrorType::Encoding,
                errors::UNKNOWN_ENCODING,
                format!("no encoding registered under {:?}", name),
            ));
        }
        self.default_name = name.to_string();
        Ok(())
    }

    pub fn default_name(&self) -> &str {
        &self.default_name
    }

    pub fn default_encoding(&self) -> Encoding {
        self.encodings[&self.default_name].clone()
    }
}

impl Default for EncodingRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
