//! Windows-1252 text decoding
//!
//! The simulator writes its session YAML and variable header strings in the
//! Windows-1252 code page. Driver names, team names and track names routinely
//! contain bytes above 0x7F (accented letters, typographic quotes, the euro sign),
//! so the raw bytes are not valid UTF-8 and must be transcoded before use.
//!
//! Decoding is total: every byte produces a character.
//! - `0x00..=0x7F` is ASCII and passes through.
//! - `0xA0..=0xFF` coincides with Latin-1, i.e. U+00A0..=U+00FF.
//! - `0x80..=0x9F` goes through [`C1_TABLE`]. The five slots the code page leaves
//!   undefined (0x81, 0x8D, 0x8F, 0x90, 0x9D) map to the code point with the
//!   same value as the byte.

/// Windows-1252 assignments for `0x80..=0x9F`; `None` marks an undefined slot.
const C1_TABLE: [Option<char>; 32] = [
    Some('\u{20AC}'), // 0x80 €
    None,             // 0x81
    Some('\u{201A}'), // 0x82 ‚
    Some('\u{0192}'), // 0x83 ƒ
    Some('\u{201E}'), // 0x84 „
    Some('\u{2026}'), // 0x85 …
    Some('\u{2020}'), // 0x86 †
    Some('\u{2021}'), // 0x87 ‡
    Some('\u{02C6}'), // 0x88 ˆ
    Some('\u{2030}'), // 0x89 ‰
    Some('\u{0160}'), // 0x8A Š
    Some('\u{2039}'), // 0x8B ‹
    Some('\u{0152}'), // 0x8C Œ
    None,             // 0x8D
    Some('\u{017D}'), // 0x8E Ž
    None,             // 0x8F
    None,             // 0x90
    Some('\u{2018}'), // 0x91 ‘
    Some('\u{2019}'), // 0x92 ’
    Some('\u{201C}'), // 0x93 “
    Some('\u{201D}'), // 0x94 ”
    Some('\u{2022}'), // 0x95 •
    Some('\u{2013}'), // 0x96 –
    Some('\u{2014}'), // 0x97 —
    Some('\u{02DC}'), // 0x98 ˜
    Some('\u{2122}'), // 0x99 ™
    Some('\u{0161}'), // 0x9A š
    Some('\u{203A}'), // 0x9B ›
    Some('\u{0153}'), // 0x9C œ
    None,             // 0x9D
    Some('\u{017E}'), // 0x9E ž
    Some('\u{0178}'), // 0x9F Ÿ
];

/// Map a single Windows-1252 byte to its character.
#[inline]
pub fn decode_byte(byte: u8) -> char {
    match byte {
        0x80..=0x9F => C1_TABLE[(byte - 0x80) as usize].unwrap_or(char::from(byte)),
        _ => char::from(byte),
    }
}

/// Decode Windows-1252 bytes into a UTF-8 `String`.
///
/// Never fails. Empty input yields an empty string. NUL bytes are decoded like
/// any other ASCII byte; callers holding C strings should cut at the terminator
/// first (see [`until_nul`]).
pub fn decode_windows_1252(bytes: &[u8]) -> String {
    // Non-ASCII bytes expand to at most 3 UTF-8 bytes; ASCII-heavy YAML rarely needs more than this
    let mut result = String::with_capacity(bytes.len() + bytes.len() / 4);
    result.extend(bytes.iter().map(|&b| decode_byte(b)));
    result
}

/// Decode optional Windows-1252 bytes; an absent value decodes to the empty string.
pub fn decode_optional(bytes: Option<&[u8]>) -> String {
    bytes.map(decode_windows_1252).unwrap_or_default()
}

/// Slice a fixed-size C string buffer up to (not including) its first NUL.
pub(crate) fn until_nul(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    &bytes[..end]
}
