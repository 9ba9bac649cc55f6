//! Byte-to-text normalisation shared by all decoders.
//!
//! Sources arrive as UTF-8, UTF-16 with a BOM, Shift_JIS, EUC-JP, or a
//! Windows code page. Everything is converted to UTF-8 with LF line endings
//! before any downstream stage sees it.

use encoding_rs::{Encoding, EUC_JP, SHIFT_JIS, UTF_8, WINDOWS_1252};

/// Decode raw bytes to a `String`.
///
/// Returns the text and, when the input was not plain UTF-8, the name of the
/// encoding that was used.
pub fn decode_bytes(bytes: &[u8]) -> (String, Option<&'static str>) {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        let (text, _) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        let name = if encoding == UTF_8 {
            None
        } else {
            Some(encoding.name())
        };
        return (text.into_owned(), name);
    }

    if let Ok(text) = std::str::from_utf8(bytes) {
        return (text.to_string(), None);
    }

    // Japanese résumés are frequently CP932; try the strict decoders first
    for encoding in [SHIFT_JIS, EUC_JP] {
        if let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(bytes) {
            return (text.into_owned(), Some(encoding.name()));
        }
    }

    let (text, _, _) = WINDOWS_1252.decode(bytes);
    (text.into_owned(), Some(WINDOWS_1252.name()))
}

/// Decode bytes in a specific Windows code page (as declared by RTF `\ansicpg`).
pub fn decode_codepage(bytes: &[u8], codepage: u16) -> String {
    let encoding = codepage_encoding(codepage);
    let (text, _) = encoding.decode_without_bom_handling(bytes);
    text.into_owned()
}

/// Map a Windows code page number to an encoding (unknown pages fall back to 1252).
pub fn codepage_encoding(codepage: u16) -> &'static Encoding {
    match codepage {
        932 => SHIFT_JIS,
        936 => encoding_rs::GBK,
        949 => encoding_rs::EUC_KR,
        950 => encoding_rs::BIG5,
        1250 => encoding_rs::WINDOWS_1250,
        1251 => encoding_rs::WINDOWS_1251,
        1253 => encoding_rs::WINDOWS_1253,
        1254 => encoding_rs::WINDOWS_1254,
        1255 => encoding_rs::WINDOWS_1255,
        1256 => encoding_rs::WINDOWS_1256,
        1257 => encoding_rs::WINDOWS_1257,
        1258 => encoding_rs::WINDOWS_1258,
        65001 => UTF_8,
        _ => WINDOWS_1252,
    }
}

/// Convert CRLF and lone CR to LF and drop NUL characters.
pub fn normalize_newlines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push('\n');
            },
            '\0' => {},
            _ => out.push(c),
        }
    }
    out
}

/// Decode and normalise in one step; the warning names any fallback encoding.
pub fn decode_text(bytes: &[u8]) -> (String, Option<String>) {
    let (text, encoding) = decode_bytes(bytes);
    let warning = encoding.map(|name| format!("input decoded as {}", name));
    (normalize_newlines(&text), warning)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8_passthrough() {
        let (text, enc) = decode_bytes("氏名 山田".as_bytes());
        assert_eq!(text, "氏名 山田");
        assert!(enc.is_none());
    }

    #[test]
    fn test_utf8_bom_stripped() {
        let (text, enc) = decode_bytes(b"\xEF\xBB\xBFhello");
        assert_eq!(text, "hello");
        assert!(enc.is_none());
    }

    #[test]
    fn test_utf16le_bom() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "Hi".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        let (text, enc) = decode_bytes(&bytes);
        assert_eq!(text, "Hi");
        assert_eq!(enc, Some("UTF-16LE"));
    }

    #[test]
    fn test_shift_jis() {
        let (encoded, _, _) = SHIFT_JIS.encode("東京都");
        let (text, enc) = decode_bytes(&encoded);
        assert_eq!(text, "東京都");
        assert_eq!(enc, Some("Shift_JIS"));
    }

    #[test]
    fn test_windows_1252_fallback() {
        let (text, enc) = decode_bytes(b"caf\xE9 \x81");
        assert!(text.starts_with("caf\u{e9}"));
        assert_eq!(enc, Some("windows-1252"));
    }

    #[test]
    fn test_normalize_newlines() {
        assert_eq!(normalize_newlines("a\r\nb\rc\n\0d"), "a\nb\nc\nd");
    }
}
