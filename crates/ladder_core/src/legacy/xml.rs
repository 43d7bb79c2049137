//! Minimal XML tree reader and element writer shared by the legacy formats.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlError(pub String);

impl Display for XmlError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "xml error: {}", self.0)
    }
}

impl Error for XmlError {}

fn xml_err(err: impl Display) -> XmlError {
    XmlError(err.to_string())
}

/// Element with namespace prefixes stripped from element and attribute
/// names; `xmlns` declarations are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlNode {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
    pub text: String,
}

impl XmlNode {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> {
        self.children.iter().filter(move |child| child.name == name)
    }

    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|child| child.name == name)
    }

    /// Trimmed text of the first child named `name`, if non-empty.
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name)
            .map(|child| child.text.trim())
            .filter(|text| !text.is_empty())
    }
}

fn open_node(start: &BytesStart<'_>) -> Result<XmlNode, XmlError> {
    let mut node = XmlNode {
        name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
        ..XmlNode::default()
    };
    for attribute in start.attributes() {
        let attribute = attribute.map_err(xml_err)?;
        if attribute.key.as_ref().starts_with(b"xmlns") {
            continue;
        }
        let key = String::from_utf8_lossy(attribute.key.local_name().as_ref()).into_owned();
        let value = attribute.unescape_value().map_err(xml_err)?.into_owned();
        node.attributes.push((key, value));
    }
    Ok(node)
}

/// Parses `xml` into its root element.
pub fn parse_tree(xml: &str) -> Result<XmlNode, XmlError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut stack: Vec<XmlNode> = Vec::new();
    let mut root = None;
    loop {
        match reader.read_event().map_err(xml_err)? {
            Event::Start(start) => stack.push(open_node(&start)?),
            Event::Empty(start) => {
                let node = open_node(&start)?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => root = Some(node),
                }
            }
            Event::End(_) => {
                let node = stack
                    .pop()
                    .ok_or_else(|| XmlError("unbalanced end tag".to_string()))?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => root = Some(node),
                }
            }
            Event::Text(text) => {
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&text.unescape().map_err(xml_err)?);
                }
            }
            Event::CData(data) => {
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(XmlError(format!("unclosed element `{}`", stack[stack.len() - 1].name)));
    }
    root.ok_or_else(|| XmlError("document has no root element".to_string()))
}

/// Indented element writer with an XML declaration.
pub struct XmlOut {
    writer: Writer<Vec<u8>>,
}

impl XmlOut {
    pub fn new() -> Result<Self, XmlError> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(xml_err)?;
        Ok(Self { writer })
    }

    pub fn start(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<(), XmlError> {
        let mut element = BytesStart::new(name);
        for attribute in attributes {
            element.push_attribute(*attribute);
        }
        self.writer.write_event(Event::Start(element)).map_err(xml_err)
    }

    pub fn end(&mut self, name: &str) -> Result<(), XmlError> {
        self.writer
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(xml_err)
    }

    /// Writes `<name attrs>text</name>`; blank text writes nothing.
    pub fn text(
        &mut self,
        name: &str,
        attributes: &[(&str, &str)],
        text: &str,
    ) -> Result<(), XmlError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }
        self.start(name, attributes)?;
        self.writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(xml_err)?;
        self.end(name)
    }

    pub fn finish(self) -> Result<String, XmlError> {
        String::from_utf8(self.writer.into_inner()).map_err(xml_err)
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_tree, XmlOut};

    #[test]
    fn tree_strips_prefixes_and_namespace_declarations() {
        let root = parse_tree(
            r#"<marc:collection xmlns:marc="http://www.loc.gov/MARC21/slim">
                 <marc:record><marc:leader>00000nam</marc:leader>
                   <marc:datafield tag="245" ind1="1" ind2="0"><marc:subfield code="a">Comet &amp; co</marc:subfield></marc:datafield>
                 </marc:record>
               </marc:collection>"#,
        )
        .unwrap();

        assert_eq!(root.name, "collection");
        assert!(root.attributes.is_empty());
        let record = root.child("record").unwrap();
        assert_eq!(record.child_text("leader"), Some("00000nam"));
        let field = record.child("datafield").unwrap();
        assert_eq!(field.attr("tag"), Some("245"));
        assert_eq!(field.child_text("subfield"), Some("Comet & co"));
    }

    #[test]
    fn malformed_documents_fail() {
        assert!(parse_tree("<a><b></a>").is_err());
        assert!(parse_tree("").is_err());
    }

    #[test]
    fn writer_skips_blank_text_elements() {
        let mut out = XmlOut::new().unwrap();
        out.start("mods", &[("version", "3.4")]).unwrap();
        out.text("title", &[], "  ").unwrap();
        out.text("note", &[("type", "x")], "a < b").unwrap();
        out.end("mods").unwrap();
        let xml = out.finish().unwrap();

        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(!xml.contains("<title>"));
        assert!(xml.contains("<note type=\"x\">a &lt; b</note>"));
    }
}
