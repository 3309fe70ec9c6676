//! Keyword/argument/object tokenizer for Tor descriptor text.
//!
//! Tor's directory documents are sequences of entries, one per line:
//!
//! ```text
//! keyword [arguments...]
//! [-----BEGIN LABEL-----
//! base64 body
//! -----END LABEL-----]
//! ```
//!
//! This module splits a blob holding any number of concatenated documents
//! into [`Document`]s without knowing anything else about the grammar of a
//! particular document type. The caller names the keywords that bound a
//! record with a [`Boundary`]: a new document starts at every `start` line
//! and after every `end` entry. Lines that precede any `start` keyword form
//! a document of their own, so callers can report them instead of folding
//! them into a neighbour.
//!
//! Blank lines and `@` annotation lines between entries are ignored.
//! Tokenizing stops at the first line that is not UTF-8 or at an object with
//! no closing `-----END` line. The document in progress at that point is
//! dropped and its bytes are returned as the remainder.
//!
//! # Example
//!
//! ```rust
//! use onion_desc::descriptor::{parse_documents, Boundary};
//!
//! let blob = b"greeting hello world\nfarewell\n-----BEGIN MESSAGE-----\naGk=\n-----END MESSAGE-----\ngreeting again\n";
//! let (documents, remainder) = parse_documents(blob, Boundary::new("greeting", "farewell"));
//!
//! assert_eq!(documents.len(), 2);
//! assert_eq!(documents[0].arguments("greeting"), vec!["hello world"]);
//! assert_eq!(documents[0].joined("farewell").unwrap(), b"hi");
//! assert!(remainder.is_empty());
//! ```

use tracing::debug;

use crate::util::{base64_decode, pem_begin_label, pem_end_label};

/// Keywords that open and close one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Boundary<'k> {
    /// Keyword of the first line of a record.
    pub start: &'k str,
    /// Keyword of the last entry of a record.
    pub end: &'k str,
}

impl<'k> Boundary<'k> {
    /// Records that open with `start` and close after `end`.
    pub const fn new(start: &'k str, end: &'k str) -> Self {
        Self { start, end }
    }
}

/// A PEM-armoured object following a keyword line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentObject {
    /// Label from the `-----BEGIN <LABEL>-----` line.
    pub label: String,
    /// Base64 body with line breaks removed.
    pub content: String,
}

impl DocumentObject {
    /// Decodes the base64 body. Returns `None` if it isn't valid base64.
    pub fn data(&self) -> Option<Vec<u8>> {
        base64_decode(&self.content)
    }
}

/// One keyword line and its optional object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentEntry {
    /// First word of the line.
    pub keyword: String,
    /// Everything after the keyword, without the separating whitespace.
    pub arguments: String,
    /// Object block immediately following the line, if any.
    pub object: Option<DocumentObject>,
}

/// A single tokenized document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    entries: Vec<DocumentEntry>,
}

impl Document {
    /// All entries in document order.
    pub fn entries(&self) -> &[DocumentEntry] {
        &self.entries
    }

    /// Keyword of the first entry.
    pub fn first_keyword(&self) -> Option<&str> {
        self.entries.first().map(|entry| entry.keyword.as_str())
    }

    /// First entry with `keyword`.
    pub fn entry(&self, keyword: &str) -> Option<&DocumentEntry> {
        self.entries.iter().find(|entry| entry.keyword == keyword)
    }

    /// Argument text of every entry with `keyword`, in order.
    pub fn arguments(&self, keyword: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|entry| entry.keyword == keyword)
            .map(|entry| entry.arguments.as_str())
            .collect()
    }

    /// Argument bytes followed by decoded object bytes of the first entry
    /// with `keyword`.
    ///
    /// Returns `None` if there is no such entry or its object is not valid
    /// base64.
    pub fn joined(&self, keyword: &str) -> Option<Vec<u8>> {
        let entry = self.entry(keyword)?;
        let mut bytes = entry.arguments.as_bytes().to_vec();
        if let Some(object) = &entry.object {
            bytes.extend(object.data()?);
        }
        Some(bytes)
    }
}

/// Splits `content` into documents at the keywords in `boundary`, returning
/// any bytes that could not be tokenized.
pub fn parse_documents<'a>(content: &'a [u8], boundary: Boundary<'_>) -> (Vec<Document>, &'a [u8]) {
    let mut documents = Vec::new();
    let mut current = Document::default();
    let mut current_start = 0;
    let mut lines = Lines::new(content);

    while let Some((offset, raw)) = lines.next_line() {
        let line = match std::str::from_utf8(raw) {
            Ok(line) => line.trim_end_matches('\r'),
            Err(_) => {
                debug!(offset, "Stopping at non-UTF-8 line");
                return (documents, &content[current_start..]);
            }
        };

        if line.trim().is_empty() || line.starts_with('@') {
            continue;
        }

        let (keyword, arguments) = match line.split_once([' ', '\t']) {
            Some((keyword, arguments)) => (keyword, arguments.trim_start()),
            None => (line, ""),
        };

        if keyword == boundary.start && !current.entries.is_empty() {
            documents.push(std::mem::take(&mut current));
        }
        if current.entries.is_empty() {
            current_start = offset;
        }

        let object = match lines.peek_begin_label() {
            Some(label) => match lines.read_object(&label) {
                Some(body) => Some(DocumentObject {
                    label,
                    content: body,
                }),
                None => {
                    debug!(offset, label = %label, "Stopping at unterminated object");
                    return (documents, &content[current_start..]);
                }
            },
            None => None,
        };

        current.entries.push(DocumentEntry {
            keyword: keyword.to_string(),
            arguments: arguments.to_string(),
            object,
        });

        if keyword == boundary.end {
            documents.push(std::mem::take(&mut current));
        }
    }

    if !current.entries.is_empty() {
        documents.push(current);
    }
    (documents, &content[content.len()..])
}

/// Newline-delimited cursor that reports the offset of each line.
struct Lines<'a> {
    content: &'a [u8],
    pos: usize,
}

impl<'a> Lines<'a> {
    fn new(content: &'a [u8]) -> Self {
        Self { content, pos: 0 }
    }

    fn peek_line(&self) -> Option<(usize, &'a [u8])> {
        if self.pos >= self.content.len() {
            return None;
        }
        let rest = &self.content[self.pos..];
        let end = rest.iter().position(|&b| b == b'\n').unwrap_or(rest.len());
        Some((self.pos, &rest[..end]))
    }

    fn next_line(&mut self) -> Option<(usize, &'a [u8])> {
        let (offset, line) = self.peek_line()?;
        self.pos = offset + line.len() + 1;
        Some((offset, line))
    }

    fn peek_begin_label(&self) -> Option<String> {
        let (_, line) = self.peek_line()?;
        let line = std::str::from_utf8(line).ok()?;
        pem_begin_label(line).map(str::to_string)
    }

    /// Consumes a BEGIN line through its matching END line, returning the
    /// body. Returns `None` if the object never closes.
    fn read_object(&mut self, label: &str) -> Option<String> {
        self.next_line()?;
        let mut body = String::new();
        loop {
            let (_, raw) = self.next_line()?;
            let line = std::str::from_utf8(raw).ok()?;
            if pem_end_label(line) == Some(label) {
                return Some(body);
            }
            body.push_str(line.trim());
        }
    }
}
