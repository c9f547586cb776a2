//! Text re-encoding to UTF-8.

use std::borrow::Cow;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Source encoding picked for a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceEncoding {
    Utf8,
    Utf16Le,
    Utf16Be,
    Latin1,
}

/// Guess the encoding: UTF-16 only with a BOM, then UTF-8, else ISO-8859-1.
pub fn detect(bytes: &[u8]) -> SourceEncoding {
    match bytes {
        [0xFF, 0xFE, ..] => SourceEncoding::Utf16Le,
        [0xFE, 0xFF, ..] => SourceEncoding::Utf16Be,
        _ if std::str::from_utf8(bytes).is_ok() => SourceEncoding::Utf8,
        _ => SourceEncoding::Latin1,
    }
}

/// Re-encode `bytes` as UTF-8. Valid UTF-8 input is borrowed, minus any BOM.
pub fn to_utf8(bytes: &[u8]) -> Cow<'_, str> {
    match detect(bytes) {
        SourceEncoding::Utf8 => {
            let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
            // detect() has already validated the whole buffer.
            Cow::Borrowed(std::str::from_utf8(bytes).unwrap_or_default())
        }
        SourceEncoding::Utf16Le => Cow::Owned(decode_utf16(&bytes[2..], u16::from_le_bytes)),
        SourceEncoding::Utf16Be => Cow::Owned(decode_utf16(&bytes[2..], u16::from_be_bytes)),
        // Every Latin-1 byte is the code point of the same value.
        SourceEncoding::Latin1 => Cow::Owned(bytes.iter().map(|&b| char::from(b)).collect()),
    }
}

fn decode_utf16(bytes: &[u8], unit: fn([u8; 2]) -> u16) -> String {
    let units = bytes.chunks_exact(2).map(|pair| unit([pair[0], pair[1]]));
    char::decode_utf16(units)
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}
