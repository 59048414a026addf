//! Line-tracking XML reader.
//!
//! `quick_xml`'s `Reader` reports byte offsets, not line/column; PDSC and
//! SVD diagnostics need a human-readable location, so this wraps the byte
//! offset in a small line-index built once per document, exposed as a
//! stateless offset->location lookup instead of mutable state threaded
//! through the parser.

use std::path::{Path, PathBuf};

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::util::Location;

/// Maps a byte offset within a document's source text back to a 1-based
/// line/column pair.
pub struct LineIndex {
    path: PathBuf,
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(path: impl Into<PathBuf>, text: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, byte) in text.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(i + 1);
            }
        }
        LineIndex {
            path: path.into(),
            line_starts,
        }
    }

    pub fn location(&self, offset: usize) -> Location {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i.saturating_sub(1),
        };
        let column = offset - self.line_starts.get(line).copied().unwrap_or(0);
        Location::at(self.path.clone(), (line + 1) as u32, (column + 1) as u32)
    }
}

/// A parsed XML element tree node: name, attributes, direct text content,
/// children in document order, and the byte offset its start tag began at
/// (for `LineIndex::location`). PDSC and SVD both nest elements without
/// mixed content, so a plain tree (rather than a generic document model)
/// is enough to represent either.
#[derive(Debug, Clone, Default)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<XmlElement>,
    pub offset: usize,
}

impl XmlElement {
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter(move |c| c.name == name)
    }
}

/// Parse `text` into a single root `XmlElement` tree.
pub fn parse_tree(text: &str) -> anyhow::Result<XmlElement> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;
    let mut buf = Vec::new();

    loop {
        let offset = reader.buffer_position() as usize;
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                let attributes = e
                    .attributes()
                    .filter_map(|a| a.ok())
                    .map(|a| {
                        (
                            String::from_utf8_lossy(a.key.as_ref()).to_string(),
                            a.unescape_value().unwrap_or_default().to_string(),
                        )
                    })
                    .collect();
                stack.push(XmlElement {
                    name,
                    attributes,
                    text: String::new(),
                    children: Vec::new(),
                    offset,
                });
            }
            Event::Empty(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                let attributes = e
                    .attributes()
                    .filter_map(|a| a.ok())
                    .map(|a| {
                        (
                            String::from_utf8_lossy(a.key.as_ref()).to_string(),
                            a.unescape_value().unwrap_or_default().to_string(),
                        )
                    })
                    .collect();
                let node = XmlElement {
                    name,
                    attributes,
                    text: String::new(),
                    children: Vec::new(),
                    offset,
                };
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => root = Some(node),
                }
            }
            Event::Text(e) => {
                if let Some(cur) = stack.last_mut() {
                    cur.text.push_str(&e.unescape()?);
                }
            }
            Event::End(_) => {
                if let Some(finished) = stack.pop() {
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(finished),
                        None => root = Some(finished),
                    }
                }
            }
            _ => {}
        }
        buf.clear();
    }
    root.ok_or_else(|| anyhow::anyhow!("XML document has no root element"))
}

pub fn read_file(path: &Path) -> anyhow::Result<(String, LineIndex)> {
    let text = crate::util::fs::read_to_string(path)?;
    let index = LineIndex::new(path, &text);
    Ok((text, index))
}
