//! Byte-preserving text decoding for project files.
//!
//! Project files are almost always UTF-8, but older ones carry stray Latin-1 bytes in comments
//! and names. Those are decoded one byte per `char` so the document model still sees a `String`,
//! and [`encode`] maps every such `char` back to its original byte.

/// How the original bytes were turned into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    /// Each byte became the `char` with the same value.
    Latin1,
}

/// Decode project bytes, falling back to one `char` per byte when they are not UTF-8.
pub fn decode(bytes: &[u8]) -> (String, TextEncoding) {
    match std::str::from_utf8(bytes) {
        Ok(text) => (text.to_string(), TextEncoding::Utf8),
        Err(_) => (
            bytes.iter().map(|&b| char::from(b)).collect(),
            TextEncoding::Latin1,
        ),
    }
}

/// Turn text produced from [`decode`] back into bytes.
///
/// In Latin-1 mode every `char` up to U+00FF is written as its single byte, so untouched regions
/// come back byte-identical. Anything wider can only come from inserted text and is written as
/// UTF-8.
pub fn encode(text: &str, encoding: TextEncoding) -> Vec<u8> {
    match encoding {
        TextEncoding::Utf8 => text.as_bytes().to_vec(),
        TextEncoding::Latin1 => {
            let mut out = Vec::with_capacity(text.len());
            for c in text.chars() {
                match u8::try_from(u32::from(c)) {
                    Ok(b) => out.push(b),
                    Err(_) => {
                        let mut buf = [0u8; 4];
                        out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                    }
                }
            }
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_passes_through() {
        let (text, enc) = decode("/* Größe */".as_bytes());
        assert_eq!(enc, TextEncoding::Utf8);
        assert_eq!(text, "/* Größe */");
        assert_eq!(encode(&text, enc), "/* Größe */".as_bytes());
    }

    #[test]
    fn latin1_bytes_survive_an_edit() {
        let original = b"/* caf\xe9 */\n\xff\xfe end\n";
        let (text, enc) = decode(original);
        assert_eq!(enc, TextEncoding::Latin1);
        assert_eq!(encode(&text, enc), original);

        let edited = text.replace("end", "end\nnew");
        let bytes = encode(&edited, enc);
        assert_eq!(bytes, b"/* caf\xe9 */\n\xff\xfe end\nnew\n");
    }

    #[test]
    fn wide_inserted_chars_are_written_as_utf8() {
        let (text, enc) = decode(b"\xe9");
        let bytes = encode(&format!("{text} \u{263a}"), enc);
        assert_eq!(bytes, b"\xe9 \xe2\x98\xba");
    }
}
