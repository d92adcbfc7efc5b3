//! Span-preserving tokenizer for the OpenStep property-list subset used by `project.pbxproj`.
//!
//! Only reads. Every node keeps its byte range in the source so that edits can be expressed as
//! insertions at exact offsets and everything else is left untouched.

use std::ops::Range;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub offset: usize,
    pub message: String,
}

impl ParseError {
    fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Value {
    pub kind: ValueKind,
    pub span: Range<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueKind {
    Scalar(String),
    List(Vec<Value>),
    Dict(Vec<Entry>),
}

impl Value {
    pub fn as_scalar(&self) -> Option<&str> {
        match &self.kind {
            ValueKind::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match &self.kind {
            ValueKind::List(items) => Some(items),
            _ => None,
        }
    }
}

/// One `key /* comment */ = value;` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: String,
    pub comment: Option<String>,
    pub value: Value,
    /// From the first byte of the key to just past the `;`.
    pub span: Range<usize>,
}

pub(crate) struct Parser<'a> {
    src: &'a str,
    pos: usize,
    end: usize,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(src: &'a str, start: usize, end: usize) -> Self {
        Self {
            src,
            pos: start,
            end,
        }
    }

    fn peek(&self) -> Option<u8> {
        if self.pos < self.end {
            Some(self.src.as_bytes()[self.pos])
        } else {
            None
        }
    }

    fn starts_with(&self, pat: &str) -> bool {
        self.src[self.pos..self.end].starts_with(pat)
    }

    /// Skips whitespace and comments; returns the text of the last block comment seen.
    fn skip_trivia(&mut self) -> Result<Option<String>, ParseError> {
        let mut last_comment = None;
        loop {
            match self.peek() {
                Some(b) if b.is_ascii_whitespace() => self.pos += 1,
                Some(b'/') if self.starts_with("/*") => {
                    let body_start = self.pos + 2;
                    let close = self.src[body_start..self.end]
                        .find("*/")
                        .ok_or_else(|| ParseError::new(self.pos, "unterminated comment"))?;
                    let comment = self.src[body_start..body_start + close].trim();
                    last_comment = Some(comment.to_string());
                    self.pos = body_start + close + 2;
                }
                Some(b'/') if self.starts_with("//") => {
                    match self.src[self.pos..self.end].find('\n') {
                        Some(nl) => self.pos += nl + 1,
                        None => self.pos = self.end,
                    }
                }
                _ => return Ok(last_comment),
            }
        }
    }

    fn expect(&mut self, byte: u8) -> Result<(), ParseError> {
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(ParseError::new(
                self.pos,
                format!("expected `{}`, found {}", byte as char, self.describe_here()),
            ))
        }
    }

    fn describe_here(&self) -> String {
        match self.src[self.pos..self.end].chars().next() {
            Some(c) => format!("`{}`", c),
            None => "end of input".to_string(),
        }
    }

    /// Parses `key = value;` entries until `terminator` (not consumed) or end of range.
    pub(crate) fn parse_entries(
        &mut self,
        terminator: Option<u8>,
    ) -> Result<Vec<Entry>, ParseError> {
        let mut entries = Vec::new();
        loop {
            self.skip_trivia()?;
            match self.peek() {
                None if terminator.is_none() => return Ok(entries),
                None => {
                    return Err(ParseError::new(
                        self.pos,
                        "unexpected end of input inside dictionary",
                    ));
                }
                Some(b) if Some(b) == terminator => return Ok(entries),
                _ => {}
            }

            let start = self.pos;
            let key = self.parse_string()?;
            let comment = self.skip_trivia()?;
            self.expect(b'=')?;
            self.skip_trivia()?;
            let value = self.parse_value()?;
            self.skip_trivia()?;
            self.expect(b';')?;

            entries.push(Entry {
                key,
                comment,
                value,
                span: start..self.pos,
            });
        }
    }

    pub(crate) fn parse_value(&mut self) -> Result<Value, ParseError> {
        let start = self.pos;
        match self.peek() {
            Some(b'{') => {
                self.pos += 1;
                let entries = self.parse_entries(Some(b'}'))?;
                self.expect(b'}')?;
                Ok(Value {
                    kind: ValueKind::Dict(entries),
                    span: start..self.pos,
                })
            }
            Some(b'(') => {
                self.pos += 1;
                let mut items = Vec::new();
                loop {
                    self.skip_trivia()?;
                    if self.peek() == Some(b')') {
                        break;
                    }
                    items.push(self.parse_value()?);
                    self.skip_trivia()?;
                    match self.peek() {
                        Some(b',') => self.pos += 1,
                        Some(b')') => break,
                        _ => {
                            return Err(ParseError::new(
                                self.pos,
                                format!("expected `,` or `)`, found {}", self.describe_here()),
                            ));
                        }
                    }
                }
                self.expect(b')')?;
                Ok(Value {
                    kind: ValueKind::List(items),
                    span: start..self.pos,
                })
            }
            Some(_) => {
                let s = self.parse_string()?;
                Ok(Value {
                    kind: ValueKind::Scalar(s),
                    span: start..self.pos,
                })
            }
            None => Err(ParseError::new(self.pos, "expected value, found end of input")),
        }
    }

    fn parse_string(&mut self) -> Result<String, ParseError> {
        if self.peek() == Some(b'"') {
            return self.parse_quoted();
        }

        let start = self.pos;
        while let Some(b) = self.peek() {
            let delimiter = b.is_ascii_whitespace()
                || matches!(b, b'=' | b';' | b',' | b'(' | b')' | b'{' | b'}' | b'"')
                || (b == b'/' && (self.starts_with("/*") || self.starts_with("//")));
            if delimiter {
                break;
            }
            self.pos += 1;
        }

        if self.pos == start {
            return Err(ParseError::new(
                start,
                format!("expected string, found {}", self.describe_here()),
            ));
        }
        Ok(self.src[start..self.pos].to_string())
    }

    fn parse_quoted(&mut self) -> Result<String, ParseError> {
        let open = self.pos;
        self.pos += 1;
        let mut out = String::new();
        let mut chunk_start = self.pos;
        loop {
            match self.peek() {
                None => return Err(ParseError::new(open, "unterminated string")),
                Some(b'"') => {
                    out.push_str(&self.src[chunk_start..self.pos]);
                    self.pos += 1;
                    return Ok(out);
                }
                Some(b'\\') => {
                    out.push_str(&self.src[chunk_start..self.pos]);
                    let escaped = self.src[self.pos + 1..self.end]
                        .chars()
                        .next()
                        .ok_or_else(|| ParseError::new(self.pos, "dangling escape"))?;
                    out.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        other => other,
                    });
                    self.pos += 1 + escaped.len_utf8();
                    chunk_start = self.pos;
                }
                Some(_) => self.pos += 1,
            }
        }
    }
}

/// Render `raw` as a property-list string, quoting when it leaves the bare-word alphabet.
pub fn quote(raw: &str) -> String {
    let bare = !raw.is_empty()
        && raw
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'$' | b'/' | b':' | b'.'))
        && !raw.contains("//")
        && !raw.contains("/*");
    if bare {
        return raw.to_string();
    }

    let mut out = String::with_capacity(raw.len() + 2);
    out.push('"');
    for c in raw.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Vec<Entry> {
        Parser::new(src, 0, src.len())
            .parse_entries(None)
            .expect("parse entries")
    }

    #[test]
    fn parses_inline_record() {
        let src = "AB12 /* Foo.swift */ = {isa = PBXFileReference; path = Foo.swift; sourceTree = \"<group>\"; };";
        let entries = parse(src);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key, "AB12");
        assert_eq!(entries[0].comment.as_deref(), Some("Foo.swift"));
        assert_eq!(entries[0].span, 0..src.len());

        let ValueKind::Dict(fields) = &entries[0].value.kind else {
            panic!("expected a dict value");
        };
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[2].value.as_scalar(), Some("<group>"));
    }

    #[test]
    fn list_span_covers_parens() {
        let src = "children = (\n\tA /* a */,\n\tB,\n);";
        let entries = parse(src);
        let list = &entries[0].value;
        assert_eq!(&src[list.span.clone()], "(\n\tA /* a */,\n\tB,\n)");
        let items: Vec<_> = list
            .as_list()
            .expect("list")
            .iter()
            .filter_map(Value::as_scalar)
            .collect();
        assert_eq!(items, vec!["A", "B"]);
    }

    #[test]
    fn quoted_strings_unescape_and_hide_delimiters() {
        let src = r#"shellScript = "echo \"{ ); }\"\n";"#;
        let entries = parse(src);
        assert_eq!(entries[0].value.as_scalar(), Some("echo \"{ ); }\"\n"));
    }

    #[test]
    fn bare_paths_keep_slashes() {
        let entries = parse("path = App/Views/Main.swift; // trailing\n");
        assert_eq!(entries[0].value.as_scalar(), Some("App/Views/Main.swift"));
    }

    #[test]
    fn missing_semicolon_is_reported_with_offset() {
        let src = "a = b c = d;";
        let err = Parser::new(src, 0, src.len())
            .parse_entries(None)
            .expect_err("must fail");
        assert_eq!(err.offset, 6);
        assert!(err.message.contains("expected `;`"));
    }

    #[test]
    fn unterminated_string_fails() {
        let src = "a = \"open;";
        assert!(Parser::new(src, 0, src.len()).parse_entries(None).is_err());
    }

    #[test]
    fn quote_leaves_bare_words_alone() {
        assert_eq!(quote("Foo.swift"), "Foo.swift");
        assert_eq!(quote("App/Views"), "App/Views");
        assert_eq!(quote("sourcecode.swift"), "sourcecode.swift");
    }

    #[test]
    fn quote_wraps_special_values() {
        assert_eq!(quote("<group>"), "\"<group>\"");
        assert_eq!(quote("Preview Content"), "\"Preview Content\"");
        assert_eq!(quote("App-Info.plist"), "\"App-Info.plist\"");
        assert_eq!(quote(""), "\"\"");
        assert_eq!(quote("say \"hi\""), "\"say \\\"hi\\\"\"");
    }
}
