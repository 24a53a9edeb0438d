//! Minimal XML writer and parser for crate-owned documents.
//!
//! The archive control file and the serialized scene-object entries are
//! small, well-formed XML documents produced by this crate itself. This
//! module implements just enough of XML for those documents: elements,
//! attributes, character data, the five predefined entities plus
//! numeric character references, comments, and leading declarations.
//! It is not a general-purpose XML parser (no namespaces, no DTDs, no
//! CDATA, no processing instructions beyond the prolog).

use crate::util::{Error, Result};

// ============================================================================
// Writing
// ============================================================================

/// Streaming writer that builds an XML document in memory.
pub struct XmlWriter {
    out: String,
    stack: Vec<String>,
    tag_open: bool,
}

impl XmlWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self {
            out: String::new(),
            stack: Vec::new(),
            tag_open: false,
        }
    }

    /// Write the standard prolog.
    pub fn declaration(&mut self) {
        self.out.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    }

    /// Open an element. Attributes may be added until the next
    /// `open`/`text`/`close` call.
    pub fn open(&mut self, name: &str) {
        self.seal();
        self.out.push('<');
        self.out.push_str(name);
        self.stack.push(name.to_string());
        self.tag_open = true;
    }

    /// Add an attribute to the most recently opened element.
    pub fn attr(&mut self, name: &str, value: &str) {
        debug_assert!(self.tag_open, "attr() outside an open tag");
        self.out.push(' ');
        self.out.push_str(name);
        self.out.push_str("=\"");
        escape_into(value, &mut self.out);
        self.out.push('"');
    }

    /// Write character data inside the current element.
    pub fn text(&mut self, value: &str) {
        self.seal();
        escape_into(value, &mut self.out);
    }

    /// Close the current element. Empty elements collapse to `<name/>`.
    pub fn close(&mut self) {
        let name = self.stack.pop().unwrap_or_default();
        if self.tag_open {
            self.out.push_str("/>");
            self.tag_open = false;
        } else {
            self.out.push_str("</");
            self.out.push_str(&name);
            self.out.push('>');
        }
    }

    /// Write `<name>text</name>` in one call.
    pub fn leaf(&mut self, name: &str, value: &str) {
        self.open(name);
        self.text(value);
        self.close();
    }

    /// Finish the document and return the XML text.
    pub fn finish(mut self) -> String {
        while !self.stack.is_empty() {
            self.close();
        }
        self.out
    }

    fn seal(&mut self) {
        if self.tag_open {
            self.out.push('>');
            self.tag_open = false;
        }
    }
}

impl Default for XmlWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn escape_into(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// A parsed XML element: name, attributes, child elements and the
/// concatenated character data directly inside it.
#[derive(Debug, Clone, Default)]
pub struct XmlElement {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<XmlElement>,
    pub text: String,
}

impl XmlElement {
    /// Parse a document and return its root element.
    pub fn parse(input: &str) -> Result<XmlElement> {
        let mut cursor = Cursor::new(input);
        cursor.skip_prolog();
        let root = cursor.parse_element()?;
        Ok(root)
    }

    /// Look up an attribute value by name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// First child element with the given name.
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All child elements with the given name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Text content of the first child with the given name.
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(|c| c.text.as_str())
    }

    /// Text content of a required child, as an error otherwise.
    pub fn require_text(&self, name: &str) -> Result<&str> {
        self.child_text(name)
            .ok_or_else(|| Error::xml(format!("missing <{}> in <{}>", name, self.name)))
    }
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str) -> Self {
        let bytes = input.as_bytes();
        // Skip a UTF-8 BOM if present.
        let pos = if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) { 3 } else { 0 };
        Self { bytes, pos }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn starts_with(&self, s: &str) -> bool {
        self.bytes[self.pos..].starts_with(s.as_bytes())
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\r' | b'\n')) {
            self.pos += 1;
        }
    }

    /// Skip the declaration, comments and doctype before the root.
    fn skip_prolog(&mut self) {
        loop {
            self.skip_ws();
            if self.starts_with("<?") {
                self.skip_until("?>");
            } else if self.starts_with("<!--") {
                self.skip_until("-->");
            } else if self.starts_with("<!") {
                self.skip_until(">");
            } else {
                return;
            }
        }
    }

    fn skip_until(&mut self, end: &str) {
        while self.pos < self.bytes.len() && !self.starts_with(end) {
            self.pos += 1;
        }
        self.pos = (self.pos + end.len()).min(self.bytes.len());
    }

    fn parse_name(&mut self) -> Result<String> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || matches!(c, b'_' | b'-' | b'.' | b':') {
                self.pos += 1;
            } else {
                break;
            }
        }
        if self.pos == start {
            return Err(Error::xml(format!("expected name at byte {}", start)));
        }
        Ok(String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned())
    }

    fn parse_element(&mut self) -> Result<XmlElement> {
        if self.peek() != Some(b'<') {
            return Err(Error::xml(format!("expected '<' at byte {}", self.pos)));
        }
        self.pos += 1;
        let name = self.parse_name()?;
        let mut elem = XmlElement {
            name,
            ..Default::default()
        };

        // Attributes until '>' or '/>'.
        loop {
            self.skip_ws();
            match self.peek() {
                Some(b'/') => {
                    self.pos += 1;
                    if self.peek() != Some(b'>') {
                        return Err(Error::xml(format!("expected '/>' at byte {}", self.pos)));
                    }
                    self.pos += 1;
                    return Ok(elem);
                }
                Some(b'>') => {
                    self.pos += 1;
                    break;
                }
                Some(_) => {
                    let key = self.parse_name()?;
                    self.skip_ws();
                    if self.peek() != Some(b'=') {
                        return Err(Error::xml(format!("expected '=' after attribute {key}")));
                    }
                    self.pos += 1;
                    self.skip_ws();
                    let quote = self.peek();
                    if !matches!(quote, Some(b'"' | b'\'')) {
                        return Err(Error::xml(format!("unquoted attribute {key}")));
                    }
                    let quote = quote.unwrap_or(b'"');
                    self.pos += 1;
                    let start = self.pos;
                    while self.peek().is_some() && self.peek() != Some(quote) {
                        self.pos += 1;
                    }
                    if self.peek().is_none() {
                        return Err(Error::xml(format!("unterminated attribute {key}")));
                    }
                    let raw = String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned();
                    self.pos += 1;
                    elem.attrs.push((key, unescape(&raw)?));
                }
                None => return Err(Error::xml("unexpected end of input in tag")),
            }
        }

        // Content until the matching close tag.
        loop {
            if self.peek().is_none() {
                return Err(Error::xml(format!("unclosed element <{}>", elem.name)));
            }
            if self.starts_with("<!--") {
                self.skip_until("-->");
                continue;
            }
            if self.starts_with("</") {
                self.pos += 2;
                let close = self.parse_name()?;
                if close != elem.name {
                    return Err(Error::xml(format!(
                        "mismatched close tag: <{}> vs </{}>",
                        elem.name, close
                    )));
                }
                self.skip_ws();
                if self.peek() != Some(b'>') {
                    return Err(Error::xml(format!("expected '>' after </{close}")));
                }
                self.pos += 1;
                return Ok(elem);
            }
            if self.peek() == Some(b'<') {
                elem.children.push(self.parse_element()?);
                continue;
            }
            let start = self.pos;
            while self.peek().is_some() && self.peek() != Some(b'<') {
                self.pos += 1;
            }
            let raw = String::from_utf8_lossy(&self.bytes[start..self.pos]);
            elem.text.push_str(&unescape(&raw)?);
        }
    }
}

fn unescape(raw: &str) -> Result<String> {
    if !raw.contains('&') {
        return Ok(raw.to_string());
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(idx) = rest.find('&') {
        out.push_str(&rest[..idx]);
        rest = &rest[idx..];
        let end = rest
            .find(';')
            .ok_or_else(|| Error::xml("unterminated entity reference"))?;
        let entity = &rest[1..end];
        match entity {
            "amp" => out.push('&'),
            "lt" => out.push('<'),
            "gt" => out.push('>'),
            "quot" => out.push('"'),
            "apos" => out.push('\''),
            _ if entity.starts_with("#x") || entity.starts_with("#X") => {
                let code = u32::from_str_radix(&entity[2..], 16)
                    .map_err(|_| Error::xml(format!("bad character reference &{entity};")))?;
                out.push(char_for(code, entity)?);
            }
            _ if entity.starts_with('#') => {
                let code = entity[1..]
                    .parse::<u32>()
                    .map_err(|_| Error::xml(format!("bad character reference &{entity};")))?;
                out.push(char_for(code, entity)?);
            }
            _ => return Err(Error::xml(format!("unknown entity &{entity};"))),
        }
        rest = &rest[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

fn char_for(code: u32, entity: &str) -> Result<char> {
    char::from_u32(code).ok_or_else(|| Error::xml(format!("invalid character reference &{entity};")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_simple_document() {
        let mut w = XmlWriter::new();
        w.declaration();
        w.open("archive");
        w.attr("major_version", "0");
        w.attr("minor_version", "8");
        w.leaf("assets_included", "True");
        w.close();
        let doc = w.finish();
        assert!(doc.starts_with("<?xml"));
        assert!(doc.contains("<archive major_version=\"0\" minor_version=\"8\">"));
        assert!(doc.contains("<assets_included>True</assets_included>"));
        assert!(doc.ends_with("</archive>"));
    }

    #[test]
    fn test_empty_element_collapses() {
        let mut w = XmlWriter::new();
        w.open("root");
        w.open("empty");
        w.close();
        w.close();
        assert_eq!(w.finish(), "<root><empty/></root>");
    }

    #[test]
    fn test_roundtrip_escaping() {
        let mut w = XmlWriter::new();
        w.open("n");
        w.attr("a", "x<y & \"z\"");
        w.text("a < b & c > d");
        w.close();
        let doc = w.finish();

        let e = XmlElement::parse(&doc).unwrap();
        assert_eq!(e.attr("a"), Some("x<y & \"z\""));
        assert_eq!(e.text, "a < b & c > d");
    }

    #[test]
    fn test_parse_nested() {
        let e = XmlElement::parse(
            "<?xml version=\"1.0\"?>\n<a><b k='1'>one</b><b k='2'>two</b><c/></a>",
        )
        .unwrap();
        assert_eq!(e.name, "a");
        assert_eq!(e.children.len(), 3);
        assert_eq!(e.children_named("b").count(), 2);
        assert_eq!(e.child("b").and_then(|b| b.attr("k")), Some("1"));
        assert_eq!(e.child_text("c"), Some(""));
    }

    #[test]
    fn test_parse_numeric_references() {
        let e = XmlElement::parse("<t>&#65;&#x42;</t>").unwrap();
        assert_eq!(e.text, "AB");
    }

    #[test]
    fn test_parse_errors() {
        assert!(XmlElement::parse("<a><b></a>").is_err());
        assert!(XmlElement::parse("<a").is_err());
        assert!(XmlElement::parse("<a attr>").is_err());
    }
}
