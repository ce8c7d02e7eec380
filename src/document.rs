use crate::error::{Error, Result};
use quick_xml::encoding::Decoder;
use quick_xml::escape::{escape, resolve_predefined_entity};
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesRef, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::borrow::Cow;
use std::io::BufRead;

const INDENT_SIZE: usize = 2;

/// A node inside an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Nested element
    Element(Element),
    /// Character data with references already resolved
    Text(String),
    /// CDATA section content
    CData(String),
    /// Comment body
    Comment(String),
}

/// An XML element with ordered attributes and children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Tag name, including any namespace prefix
    pub name: String,

    /// Attributes in document order
    pub attributes: Vec<(String, String)>,

    /// Child nodes in document order
    pub children: Vec<Node>,
}

impl Element {
    /// Creates an element without attributes or children.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Returns the value of attribute `key`, if present.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Sets attribute `key`, replacing an existing value in place.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.attributes.push((key, value)),
        }
    }

    /// Removes attribute `key`, returning its previous value.
    pub fn remove_attribute(&mut self, key: &str) -> Option<String> {
        let index = self.attributes.iter().position(|(k, _)| k == key)?;
        Some(self.attributes.remove(index).1)
    }

    /// Iterates over direct child elements.
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }

    /// Returns the first direct child element named `name`.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.child_elements().find(|element| element.name == name)
    }

    /// Returns the concatenated direct text and CDATA content.
    #[must_use]
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                Node::Text(text) | Node::CData(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Appends a child node.
    pub fn push(&mut self, node: Node) {
        self.children.push(node);
    }

    /// Applies `f` to every non-empty text and CDATA node in this subtree.
    pub fn for_each_text_mut(&mut self, f: &mut impl FnMut(&mut String)) {
        for node in &mut self.children {
            match node {
                Node::Text(text) | Node::CData(text) if !text.is_empty() => f(text),
                Node::Element(element) => element.for_each_text_mut(f),
                _ => {}
            }
        }
    }

    fn has_markup_children(&self) -> bool {
        self.children
            .iter()
            .any(|node| matches!(node, Node::Element(_) | Node::Comment(_)))
    }

    fn has_text_content(&self) -> bool {
        self.children.iter().any(|node| match node {
            Node::Text(text) => !text.trim().is_empty(),
            Node::CData(_) => true,
            _ => false,
        })
    }

    /// Elements mixing markup with real text are kept byte-for-byte.
    fn is_mixed(&self) -> bool {
        self.has_markup_children() && self.has_text_content()
    }

    /// Drops whitespace-only text between child elements and comments,
    /// unless the element also carries real text.
    fn strip_layout_whitespace(&mut self) {
        if self.has_markup_children() && !self.has_text_content() {
            self.children.retain(|node| match node {
                Node::Text(text) => !text.trim().is_empty(),
                _ => true,
            });
        }
    }

    fn push_text(&mut self, text: &str) {
        if let Some(Node::Text(last)) = self.children.last_mut() {
            last.push_str(text);
        } else {
            self.children.push(Node::Text(text.to_owned()));
        }
    }

    fn from_start(start: &BytesStart<'_>, decoder: Decoder, position: u64) -> Result<Self> {
        let name = decode(decoder, start.name().as_ref(), position)?;

        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| Error::parse(position, e))?;
            let key = decode(decoder, attr.key.as_ref(), position)?;
            let value = attr
                .decode_and_unescape_value(decoder)
                .map_err(|e| Error::parse(position, e))?;
            attributes.push((key, value.into_owned()));
        }

        Ok(Self {
            name,
            attributes,
            children: Vec::new(),
        })
    }

    fn write_to<W: std::io::Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        let mut start = BytesStart::new(self.name.as_str());
        for (key, value) in &self.attributes {
            let value = escape_attribute(value);
            start.push_attribute(Attribute::from((key.as_bytes(), value.as_bytes())));
        }

        if self.children.is_empty() {
            return write_event(writer, Event::Empty(start));
        }

        write_event(writer, Event::Start(start))?;
        if self.is_mixed() {
            // Indenting inside mixed content would add text.
            let mut inline = Writer::new(Vec::new());
            self.write_children(&mut inline)?;
            let content = String::from_utf8(inline.into_inner()).map_err(Error::serialization)?;
            write_event(writer, Event::Text(BytesText::from_escaped(content)))?;
        } else {
            self.write_children(writer)?;
        }
        write_event(writer, Event::End(BytesEnd::new(self.name.as_str())))
    }

    fn write_children<W: std::io::Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        for node in &self.children {
            match node {
                Node::Element(element) => element.write_to(writer)?,
                Node::Text(text) => write_event(writer, Event::Text(BytesText::new(text)))?,
                Node::CData(text) => write_event(writer, Event::CData(BytesCData::new(text.as_str())))?,
                Node::Comment(text) => {
                    write_event(writer, Event::Comment(BytesText::from_escaped(text.as_str())))?;
                }
            }
        }
        Ok(())
    }
}

/// An in-memory XML document with a single root element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// The root element
    pub root: Element,
}

impl Document {
    /// Creates a document from its root element.
    #[must_use]
    pub const fn new(root: Element) -> Self {
        Self { root }
    }

    /// Parses a complete document from `reader`.
    ///
    /// The XML declaration, DOCTYPE, processing instructions and anything
    /// outside the root element are discarded. Whitespace-only text between
    /// child elements is dropped since it is regenerated on output.
    ///
    /// The input is decoded with the encoding named in its XML declaration
    /// (or byte order mark), defaulting to UTF-8.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] if the input is not well-formed XML, contains
    /// an unknown entity or an illegal character reference, cannot be decoded
    /// in its declared encoding, or has no root element.
    pub fn parse<R: BufRead>(reader: R) -> Result<Self> {
        let mut reader = Reader::from_reader(reader);
        let mut buf = Vec::new();
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            let position = reader.buffer_position();
            let decoder = reader.decoder();
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    if stack.is_empty() && root.is_some() {
                        return Err(Error::parse(position, "multiple root elements"));
                    }
                    stack.push(Element::from_start(&e, decoder, position)?);
                }
                Ok(Event::Empty(e)) => {
                    let element = Element::from_start(&e, decoder, position)?;
                    attach(&mut stack, &mut root, element, position)?;
                }
                Ok(Event::End(_)) => {
                    let mut element = stack
                        .pop()
                        .ok_or_else(|| Error::parse(position, "unexpected closing tag"))?;
                    element.strip_layout_whitespace();
                    attach(&mut stack, &mut root, element, position)?;
                }
                Ok(Event::Text(e)) => {
                    let text = e.xml10_content().map_err(|err| Error::parse(position, err))?;
                    if let Some(parent) = stack.last_mut() {
                        parent.push_text(&text);
                    } else if !text.trim().is_empty() {
                        return Err(Error::parse(position, "text outside of root element"));
                    }
                }
                Ok(Event::GeneralRef(e)) => {
                    let resolved = resolve_reference(&e, position)?;
                    if let Some(parent) = stack.last_mut() {
                        parent.push_text(&resolved);
                    }
                }
                Ok(Event::CData(e)) => {
                    if let Some(parent) = stack.last_mut() {
                        let text = e.decode().map_err(|err| Error::parse(position, err))?;
                        parent.push(Node::CData(text.into_owned()));
                    }
                }
                Ok(Event::Comment(e)) => {
                    if let Some(parent) = stack.last_mut() {
                        let text = e.decode().map_err(|err| Error::parse(position, err))?;
                        parent.push(Node::Comment(text.into_owned()));
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => return Err(Error::parse(reader.error_position(), e)),
            }
            buf.clear();
        }

        if let Some(open) = stack.last() {
            return Err(Error::parse(
                reader.buffer_position(),
                format!("unclosed element '{}'", open.name),
            ));
        }

        root.map(Self::new)
            .ok_or_else(|| Error::parse(reader.buffer_position(), "document has no root element"))
    }

    /// Parses a document from a string.
    ///
    /// # Errors
    ///
    /// See [`Document::parse`].
    pub fn parse_str(xml: &str) -> Result<Self> {
        Self::parse(xml.as_bytes())
    }

    /// Serializes the document as indented UTF-8 with an XML declaration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] if writing an event fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', INDENT_SIZE);
        write_event(
            &mut writer,
            Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
        )?;
        self.root.write_to(&mut writer)?;

        let mut bytes = writer.into_inner();
        bytes.push(b'\n');
        Ok(bytes)
    }
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
    position: u64,
) -> Result<()> {
    if let Some(parent) = stack.last_mut() {
        parent.push(Node::Element(element));
        Ok(())
    } else if root.is_some() {
        Err(Error::parse(position, "multiple root elements"))
    } else {
        *root = Some(element);
        Ok(())
    }
}

fn decode(decoder: Decoder, bytes: &[u8], position: u64) -> Result<String> {
    decoder
        .decode(bytes)
        .map(Cow::into_owned)
        .map_err(|e| Error::parse(position, e))
}

/// Resolves a character reference or one of the predefined entities.
fn resolve_reference(reference: &BytesRef<'_>, position: u64) -> Result<String> {
    if let Some(ch) = reference
        .resolve_char_ref()
        .map_err(|e| Error::parse(position, e))?
    {
        return Ok(ch.to_string());
    }

    let name = reference.decode().map_err(|e| Error::parse(position, e))?;
    resolve_predefined_entity(&name)
        .map(str::to_owned)
        .ok_or_else(|| Error::parse(position, format!("unknown entity reference '&{name};'")))
}

/// Escapes an attribute value so that line breaks and tabs survive a reparse.
fn escape_attribute(value: &str) -> Cow<'_, str> {
    let escaped = escape(value);
    if !escaped.contains(['\n', '\r', '\t']) {
        return escaped;
    }

    Cow::Owned(
        escaped
            .replace('\n', "&#10;")
            .replace('\r', "&#13;")
            .replace('\t', "&#9;"),
    )
}

fn write_event<W: std::io::Write>(writer: &mut Writer<W>, event: Event<'_>) -> Result<()> {
    writer.write_event(event).map_err(Error::serialization)
}
