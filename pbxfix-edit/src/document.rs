//! Project document model.
//!
//! A `project.pbxproj` is kept as its original text plus an index of the sections and records
//! found in it. Edits are recorded as pending insertions at byte offsets of the original text and
//! only materialised by [`Document::serialize`], so bytes outside the touched regions are never
//! rewritten.

use crate::error::DocumentError;
use crate::plist::{Entry, Parser, Value, ValueKind};
use pbxfix_types::ObjectId;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::ops::Range;
use tracing::debug;

const BEGIN_PREFIX: &str = "/* Begin ";
const END_PREFIX: &str = "/* End ";
const SECTION_SUFFIX: &str = " section */";

/// Closing marker of a section, e.g. `/* End PBXGroup section */`.
pub fn end_marker(section: &str) -> String {
    format!("{END_PREFIX}{section}{SECTION_SUFFIX}")
}

/// One `ID /* comment */ = { ... };` object inside a section.
#[derive(Debug, Clone)]
pub struct Record {
    id: ObjectId,
    comment: Option<String>,
    span: Range<usize>,
    fields: Vec<Entry>,
}

impl Record {
    pub fn id(&self) -> &ObjectId {
        &self.id
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    pub fn span(&self) -> Range<usize> {
        self.span.clone()
    }

    pub fn isa(&self) -> Option<&str> {
        self.scalar("isa")
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.iter().find(|e| e.key == key).map(|e| &e.value)
    }

    pub fn scalar(&self, key: &str) -> Option<&str> {
        self.field(key).and_then(Value::as_scalar)
    }

    /// Scalar members of a list field, in document order.
    pub fn list(&self, key: &str) -> Option<Vec<&str>> {
        let items = self.field(key)?.as_list()?;
        Some(items.iter().filter_map(Value::as_scalar).collect())
    }
}

#[derive(Debug, Clone)]
pub struct Section {
    name: String,
    records: Vec<Record>,
}

impl Section {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }
}

/// A list member to insert: `ID /* comment */`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    pub id: ObjectId,
    pub comment: Option<String>,
}

impl ListEntry {
    pub fn new(id: ObjectId, comment: impl Into<String>) -> Self {
        Self {
            id,
            comment: Some(comment.into()),
        }
    }
}

impl fmt::Display for ListEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.comment {
            Some(c) => write!(f, "{} /* {} */", self.id, c),
            None => write!(f, "{}", self.id),
        }
    }
}

#[derive(Debug, Clone)]
struct Splice {
    offset: usize,
    text: String,
}

#[derive(Debug, Clone)]
pub struct Document {
    text: String,
    sections: Vec<Section>,
    index: HashMap<String, (usize, usize)>,
    duplicates: Vec<ObjectId>,
    splices: Vec<Splice>,
    line_ending: &'static str,
}

impl Document {
    /// Index the sections and records of `text`.
    ///
    /// Only the structure needed to find insertion points is validated: section markers must pair
    /// up and every section body must tokenise into `ID = { ... };` records.
    pub fn load(text: impl Into<String>) -> Result<Self, DocumentError> {
        let text = text.into();

        let mut sections = Vec::new();
        let mut open: Option<(String, Range<usize>)> = None;
        for marker in scan_markers(&text) {
            match (marker.kind, open.take()) {
                (MarkerKind::Begin, None) => open = Some((marker.name, marker.span)),
                (MarkerKind::Begin, Some((outer, _))) => {
                    return Err(DocumentError::malformed(format!(
                        "section {} begins at line {} before section {} ends",
                        marker.name,
                        line_of(&text, marker.span.start),
                        outer
                    )));
                }
                (MarkerKind::End, Some((name, begin))) if name == marker.name => {
                    let records = parse_records(&text, &name, begin.end, marker.span.start)?;
                    sections.push(Section { name, records });
                }
                (MarkerKind::End, Some((name, _))) => {
                    return Err(DocumentError::malformed(format!(
                        "section {} is closed by an end marker for {} at line {}",
                        name,
                        marker.name,
                        line_of(&text, marker.span.start)
                    )));
                }
                (MarkerKind::End, None) => {
                    return Err(DocumentError::malformed(format!(
                        "end marker for {} at line {} has no matching begin marker",
                        marker.name,
                        line_of(&text, marker.span.start)
                    )));
                }
            }
        }

        if let Some((name, begin)) = open {
            return Err(DocumentError::malformed(format!(
                "section {} begun at line {} is never closed",
                name,
                line_of(&text, begin.start)
            )));
        }
        if sections.is_empty() {
            return Err(DocumentError::malformed("no section markers found"));
        }

        let mut index = HashMap::new();
        let mut duplicates = Vec::new();
        for (si, section) in sections.iter().enumerate() {
            for (ri, record) in section.records.iter().enumerate() {
                if index.insert(record.id.to_string(), (si, ri)).is_some() {
                    duplicates.push(record.id.clone());
                }
            }
        }
        // First definition wins for lookups.
        for (si, section) in sections.iter().enumerate().rev() {
            for (ri, record) in section.records.iter().enumerate().rev() {
                index.insert(record.id.to_string(), (si, ri));
            }
        }

        let line_ending = if text.contains("\r\n") { "\r\n" } else { "\n" };

        debug!(
            sections = sections.len(),
            records = index.len(),
            duplicates = duplicates.len(),
            "loaded project document"
        );

        Ok(Self {
            text,
            sections,
            index,
            duplicates,
            splices: Vec::new(),
            line_ending,
        })
    }

    /// The original text, without pending edits.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn line_ending(&self) -> &'static str {
        self.line_ending
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn section(&self, name: &str) -> Result<&Section, DocumentError> {
        self.sections
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| DocumentError::SectionNotFound {
                name: name.to_string(),
            })
    }

    /// Raw text of every record of a section, in original order.
    pub fn section_records(&self, name: &str) -> Result<Vec<&str>, DocumentError> {
        let section = self.section(name)?;
        Ok(section
            .records
            .iter()
            .map(|r| &self.text[r.span.clone()])
            .collect())
    }

    pub fn record(&self, id: &str) -> Option<&Record> {
        let (si, ri) = *self.index.get(id)?;
        Some(&self.sections[si].records[ri])
    }

    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.sections.iter().flat_map(|s| s.records.iter())
    }

    /// Identifiers defined by more than one record.
    pub fn duplicate_ids(&self) -> &[ObjectId] {
        &self.duplicates
    }

    /// Every identifier defined or mentioned anywhere in the text.
    ///
    /// Besides record keys this picks up every 24-digit upper-case hex token, so identifiers that
    /// are only referenced (e.g. from sections this model does not index) are still reserved.
    pub fn identifiers_in_use(&self) -> BTreeSet<String> {
        let mut used: BTreeSet<String> = self.index.keys().cloned().collect();
        for token in self.text.split(|c: char| !c.is_ascii_alphanumeric()) {
            if token.len() == 24 && token.bytes().all(|b| matches!(b, b'0'..=b'9' | b'A'..=b'F')) {
                used.insert(token.to_string());
            }
        }
        used
    }

    /// Queue `text` for insertion immediately before the single occurrence of `anchor`.
    pub fn splice_before(
        &mut self,
        anchor: &str,
        text: impl Into<String>,
    ) -> Result<(), DocumentError> {
        let mut hits = if anchor.is_empty() {
            Vec::new()
        } else {
            self.text.match_indices(anchor).map(|(i, _)| i).collect()
        };
        if hits.len() != 1 {
            return Err(DocumentError::AnchorNotFound {
                anchor: anchor.to_string(),
                matches: hits.len(),
            });
        }
        let offset = hits.remove(0);
        self.push_splice(offset, text.into());
        Ok(())
    }

    /// Queue `entries` at the end of the list field `key` of record `id`.
    pub fn append_to_list(
        &mut self,
        id: &str,
        key: &str,
        entries: &[ListEntry],
    ) -> Result<(), DocumentError> {
        if entries.is_empty() {
            return Ok(());
        }
        let (span, items) = self.list_field(id, key)?;
        let close = span.end - 1;

        if let Some(close_line) = self.multiline_close(span.start, close) {
            let indent = match items.last() {
                Some(last) => {
                    let tail = &self.text[last.span.end..close];
                    if separator_after(tail).is_none() {
                        let at = last.span.end + trailing_comments(tail);
                        self.terminate_member(at);
                    }
                    self.indent_of(last.span.start)
                }
                None => format!("{}\t", self.indent_of(close)),
            };
            let text = self.render_lines(&indent, entries);
            self.push_splice(close_line, text);
            return Ok(());
        }

        let inner_start = span.start + 1;
        let content = self.text[inner_start..close].trim_end();
        let at = inner_start + content.len();
        let content_empty = content.is_empty();
        if !content_empty && !content.ends_with(',') {
            self.terminate_member(at);
        }
        let mut text = String::new();
        for (i, entry) in entries.iter().enumerate() {
            if i > 0 || !content_empty {
                text.push(' ');
            }
            text.push_str(&format!("{entry},"));
        }
        self.push_splice(at, text);
        Ok(())
    }

    /// Queue `entries` right after the member `sibling` of the list field `key` of record `id`.
    ///
    /// The sibling must occur exactly once in the list.
    pub fn insert_after_in_list(
        &mut self,
        id: &str,
        key: &str,
        sibling: &str,
        entries: &[ListEntry],
    ) -> Result<(), DocumentError> {
        let (span, items) = self.list_field(id, key)?;
        let hits: Vec<&Value> = items
            .iter()
            .filter(|v| v.as_scalar() == Some(sibling))
            .collect();
        if hits.len() != 1 {
            return Err(DocumentError::AnchorNotFound {
                anchor: format!("{sibling} in {key} of {id}"),
                matches: hits.len(),
            });
        }
        if entries.is_empty() {
            return Ok(());
        }

        let item = hits[0].span.clone();
        let close = span.end - 1;
        let Some(comma) = separator_after(&self.text[item.end..close]) else {
            // No trailing separator: the sibling is the last member.
            return self.append_to_list(id, key, entries);
        };
        let after_comma = item.end + comma + 1;

        if self.multiline_close(span.start, close).is_some() {
            if let Some(nl) = self.text[after_comma..close].find('\n') {
                let indent = self.indent_of(item.start);
                let text = self.render_lines(&indent, entries);
                self.push_splice(after_comma + nl + 1, text);
                return Ok(());
            }
        }

        let text: String = entries.iter().map(|e| format!(" {e},")).collect();
        self.push_splice(after_comma, text);
        Ok(())
    }

    /// Number of queued insertions.
    pub fn pending_edits(&self) -> usize {
        self.splices.len()
    }

    /// The full document with every queued insertion applied.
    pub fn serialize(&self) -> String {
        let mut order: Vec<&Splice> = self.splices.iter().collect();
        // Stable: insertions at the same offset keep their queue order.
        order.sort_by_key(|s| s.offset);

        let extra: usize = order.iter().map(|s| s.text.len()).sum();
        let mut out = String::with_capacity(self.text.len() + extra);
        let mut cursor = 0;
        for splice in order {
            out.push_str(&self.text[cursor..splice.offset]);
            out.push_str(&splice.text);
            cursor = splice.offset;
        }
        out.push_str(&self.text[cursor..]);
        out
    }

    /// Queue the `,` a list member at `at` is missing, once per offset.
    fn terminate_member(&mut self, at: usize) {
        if !self.splices.iter().any(|s| s.offset == at && s.text == ",") {
            self.push_splice(at, ",".to_string());
        }
    }

    fn push_splice(&mut self, offset: usize, text: String) {
        debug!(offset, bytes = text.len(), "queued insertion");
        self.splices.push(Splice { offset, text });
    }

    fn list_field(&self, id: &str, key: &str) -> Result<(Range<usize>, Vec<Value>), DocumentError> {
        let record = self
            .record(id)
            .ok_or_else(|| DocumentError::record_not_found(format!("record {id}"), 0))?;
        let value = record
            .field(key)
            .ok_or_else(|| DocumentError::record_not_found(format!("`{key}` of record {id}"), 0))?;
        match &value.kind {
            ValueKind::List(items) => Ok((value.span.clone(), items.clone())),
            _ => Err(DocumentError::malformed(format!(
                "`{key}` of record {id} is not a list"
            ))),
        }
    }

    /// Start of the line holding `close` when the list spans lines and `)` opens its own line.
    fn multiline_close(&self, open: usize, close: usize) -> Option<usize> {
        if !self.text[open..close].contains('\n') {
            return None;
        }
        let line_start = line_start(&self.text, close);
        self.text[line_start..close]
            .chars()
            .all(|c| c == ' ' || c == '\t')
            .then_some(line_start)
    }

    fn indent_of(&self, offset: usize) -> String {
        let start = line_start(&self.text, offset);
        self.text[start..]
            .chars()
            .take_while(|c| *c == ' ' || *c == '\t')
            .collect()
    }

    fn render_lines(&self, indent: &str, entries: &[ListEntry]) -> String {
        entries
            .iter()
            .map(|e| format!("{indent}{e},{}", self.line_ending))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MarkerKind {
    Begin,
    End,
}

struct Marker {
    kind: MarkerKind,
    name: String,
    span: Range<usize>,
}

fn scan_markers(text: &str) -> Vec<Marker> {
    let mut out = Vec::new();
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let lead = line.len() - line.trim_start().len();
        let trimmed = line.trim();
        let start = offset + lead;
        offset += line.len();

        let (kind, rest) = if let Some(rest) = trimmed.strip_prefix(BEGIN_PREFIX) {
            (MarkerKind::Begin, rest)
        } else if let Some(rest) = trimmed.strip_prefix(END_PREFIX) {
            (MarkerKind::End, rest)
        } else {
            continue;
        };
        let Some(name) = rest.strip_suffix(SECTION_SUFFIX) else {
            continue;
        };
        if name.is_empty() || !name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
            continue;
        }

        out.push(Marker {
            kind,
            name: name.to_string(),
            span: start..start + trimmed.len(),
        });
    }
    out
}

fn parse_records(
    text: &str,
    section: &str,
    start: usize,
    end: usize,
) -> Result<Vec<Record>, DocumentError> {
    let entries = Parser::new(text, start, end)
        .parse_entries(None)
        .map_err(|e| {
            DocumentError::malformed(format!(
                "section {}, line {}: {}",
                section,
                line_of(text, e.offset),
                e.message
            ))
        })?;

    let mut records = Vec::with_capacity(entries.len());
    for entry in entries {
        let id = ObjectId::parse(&entry.key).ok_or_else(|| {
            DocumentError::malformed(format!(
                "section {}, line {}: record key {:?} is not an identifier",
                section,
                line_of(text, entry.span.start),
                entry.key
            ))
        })?;
        let fields = match entry.value.kind {
            ValueKind::Dict(fields) => fields,
            _ => {
                return Err(DocumentError::malformed(format!(
                    "section {}, line {}: record {} is not a dictionary",
                    section,
                    line_of(text, entry.span.start),
                    id
                )));
            }
        };
        records.push(Record {
            id,
            comment: entry.comment,
            span: entry.span,
            fields,
        });
    }
    Ok(records)
}

/// Offset of the first `,` in `tail`, skipping whitespace and block comments.
fn separator_after(tail: &str) -> Option<usize> {
    let mut pos = 0;
    loop {
        let rest = &tail[pos..];
        let trimmed = rest.trim_start();
        pos += rest.len() - trimmed.len();
        if trimmed.starts_with(',') {
            return Some(pos);
        }
        let body = trimmed.strip_prefix("/*")?;
        pos += 2 + body.find("*/")? + 2;
    }
}

/// Length of the spaces and block comments trailing a list member on its line.
fn trailing_comments(tail: &str) -> usize {
    let mut pos = 0;
    loop {
        let rest = &tail[pos..];
        let trimmed = rest.trim_start_matches([' ', '\t']);
        let Some(body) = trimmed.strip_prefix("/*") else {
            return pos;
        };
        let Some(close) = body.find("*/") else {
            return pos;
        };
        pos += rest.len() - trimmed.len() + 2 + close + 2;
    }
}

fn line_start(text: &str, offset: usize) -> usize {
    text[..offset].rfind('\n').map(|i| i + 1).unwrap_or(0)
}

fn line_of(text: &str, offset: usize) -> usize {
    text[..offset.min(text.len())].matches('\n').count() + 1
}
