//! Interlace - the text-interpretation core of a code editor
//!
//! Presents a single byte buffer simultaneously under three coordinate
//! systems (bytes, codepoints, user-visible characters, where a CRLF pair
//! counts as one character), keeps them consistent under edits, and drives
//! an asynchronous syntax-highlighting pipeline whose results feed back as
//! a theme overlay on character ranges.

pub mod buffer;
pub mod constants;
pub mod encoding;
pub mod error;
pub mod event;
pub mod highlight;
pub mod interp;
pub mod theme;
pub mod tree;
pub mod view;
