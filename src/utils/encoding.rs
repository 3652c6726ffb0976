// Encoding utilities for tag text

use encoding_rs::{UTF_8, WINDOWS_1252};

/// Decode comment text. Vorbis comments are UTF-8 by definition, but
/// taggers in the wild write Latin-1; invalid UTF-8 falls back to
/// Windows-1252 instead of producing replacement characters.
pub fn decode_text(data: &[u8]) -> String {
    let (text, had_errors) = UTF_8.decode_without_bom_handling(data);
    if !had_errors {
        return text.into_owned();
    }
    WINDOWS_1252.decode_without_bom_handling(data).0.into_owned()
}

/// Encode comment text. Always UTF-8 on write.
pub fn encode_text(text: &str) -> Vec<u8> {
    UTF_8.encode(text).0.into_owned()
}
