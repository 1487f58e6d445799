//! Minimal XML document tree on top of quick-xml.
//!
//! The model only needs element names, attributes, text content and source lines, so the whole
//! document is materialized into [`XmlNode`]s once and then walked freely.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{Result, SchemaError};

/// One XML element with its attributes, child elements and concatenated text.
#[derive(Debug, Clone, Default)]
pub struct XmlNode {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
    pub text: String,
    pub line: usize,
}

/// Parse a complete document and return its root element.
pub fn parse_document(src: &str) -> Result<XmlNode> {
    let line_starts: Vec<usize> = std::iter::once(0)
        .chain(src.match_indices('\n').map(|(i, _)| i + 1))
        .collect();
    let line_of = |pos: usize| line_starts.partition_point(|&start| start <= pos);

    let mut reader = Reader::from_str(src);
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut stack: Vec<XmlNode> = Vec::new();
    let mut root: Option<XmlNode> = None;

    loop {
        let event = reader.read_event_into(&mut buf);
        let line = line_of(reader.buffer_position().saturating_sub(1));
        match event {
            Ok(Event::Start(e)) => {
                let node = start_node(&e, line)?;
                stack.push(node);
            }
            Ok(Event::Empty(e)) => {
                let node = start_node(&e, line)?;
                attach(&mut stack, &mut root, node)?;
            }
            Ok(Event::End(_)) => {
                let node = stack
                    .pop()
                    .ok_or_else(|| SchemaError::Xml("unbalanced closing tag".to_string()))?;
                attach(&mut stack, &mut root, node)?;
            }
            Ok(Event::Text(t)) => {
                let text = t
                    .unescape()
                    .map_err(|err| SchemaError::Xml(err.to_string()))?;
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(text.trim());
                }
            }
            Ok(Event::CData(c)) => {
                let bytes = c.into_inner();
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(String::from_utf8_lossy(&bytes).trim());
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => {
                return Err(SchemaError::Xml(format!("line {}: {}", line, err)))
            }
        }
        buf.clear();
    }

    if let Some(open) = stack.last() {
        return Err(SchemaError::Xml(format!(
            "line {}: element <{}> is not closed",
            open.line, open.name
        )));
    }
    root.ok_or_else(|| SchemaError::Xml("document has no root element".to_string()))
}

fn start_node(event: &BytesStart<'_>, line: usize) -> Result<XmlNode> {
    let name = String::from_utf8_lossy(event.name().as_ref()).into_owned();
    let mut attrs = Vec::new();
    for attr in event.attributes() {
        let attr = attr.map_err(|err| SchemaError::Xml(format!("line {}: {}", line, err)))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|err| SchemaError::Xml(format!("line {}: {}", line, err)))?;
        attrs.push((key, value.into_owned()));
    }
    Ok(XmlNode {
        name,
        attrs,
        children: Vec::new(),
        text: String::new(),
        line,
    })
}

fn attach(stack: &mut [XmlNode], root: &mut Option<XmlNode>, node: XmlNode) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => {
            if root.is_some() {
                return Err(SchemaError::Xml(format!(
                    "line {}: multiple root elements",
                    node.line
                )));
            }
            *root = Some(node);
        }
    }
    Ok(())
}

impl XmlNode {
    /// `line N` prefix used in diagnostics.
    pub fn loc(&self) -> String {
        format!("line {}", self.line)
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.iter().any(|(k, _)| k == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Value of an element used as a property: its `value` attribute or its text.
    pub fn value(&self) -> Result<String> {
        match (self.attr("value"), self.text.is_empty()) {
            (Some(_), false) => Err(SchemaError::InvalidStructure(format!(
                "{}: element <{}> has both \"value\" attribute and text",
                self.loc(),
                self.name
            ))),
            (Some(v), true) => Ok(v.to_string()),
            (None, _) => Ok(self.text.clone()),
        }
    }

    /// Attributes merged with the children listed in `child_props`, treated as properties.
    ///
    /// A child only counts as a property when it carries no child elements of its own.
    pub fn props(&self, child_props: &[&str]) -> Result<Props> {
        let mut entries = self.attrs.clone();
        for c in &self.children {
            if !child_props.contains(&c.name.as_str()) || !c.children.is_empty() {
                continue;
            }
            let value = c.value()?;
            if value.is_empty() {
                continue;
            }
            entries.push((c.name.clone(), value));
        }
        Ok(Props { entries })
    }

    /// Attributes whose names are not listed.
    pub fn unknown_attrs<'a>(&'a self, known: &'a [&str]) -> impl Iterator<Item = &'a str> + 'a {
        self.attrs
            .iter()
            .map(|(k, _)| k.as_str())
            .filter(move |k| !known.contains(k))
    }

    /// Child elements whose names are not listed.
    pub fn unknown_children<'a>(&'a self, known: &'a [&str]) -> impl Iterator<Item = &'a XmlNode> + 'a {
        self.children
            .iter()
            .filter(move |c| !known.contains(&c.name.as_str()))
    }
}

/// Property multimap of one element (attributes plus child-element properties).
#[derive(Debug, Clone, Default)]
pub struct Props {
    entries: Vec<(String, String)>,
}

impl Props {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == name)
    }

    pub fn count(&self, name: &str) -> usize {
        self.entries.iter().filter(|(k, _)| k == name).count()
    }

    /// Value of a property that may appear at most once.
    pub fn single(&self, node: &XmlNode, name: &str) -> Result<Option<&str>> {
        if self.count(name) > 1 {
            return Err(SchemaError::DuplicateProperty(format!(
                "{}: too many values of \"{}\" property for \"{}\" element",
                node.loc(),
                name,
                node.name
            )));
        }
        Ok(self.get(name))
    }

    /// Like [`Props::single`] but the property must be present.
    pub fn required(&self, node: &XmlNode, name: &str) -> Result<&str> {
        self.single(node, name)?.ok_or_else(|| {
            SchemaError::MissingProperty(format!(
                "{}: missing value for mandatory property \"{}\" for \"{}\" element",
                node.loc(),
                name,
                node.name
            ))
        })
    }

    pub fn insert(&mut self, name: &str, value: &str) {
        self.entries.push((name.to_string(), value.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_tree_with_lines() {
        let src = "<schema name=\"s\">\n  <fields>\n    <int name=\"a\" type=\"uint8\"/>\n  </fields>\n</schema>";
        let root = parse_document(src).expect("parse");
        assert_eq!(root.name, "schema");
        assert_eq!(root.attr("name"), Some("s"));
        let fields = root.child("fields").expect("fields");
        assert_eq!(fields.line, 2);
        assert_eq!(fields.children[0].line, 3);
        assert_eq!(fields.children[0].attr("type"), Some("uint8"));
    }

    #[test]
    fn children_become_props() {
        let src = r#"<int name="a"><type value="uint16"/><description>Some text</description></int>"#;
        let root = parse_document(src).expect("parse");
        let props = root.props(&["type", "description"]).expect("props");
        assert_eq!(props.get("type"), Some("uint16"));
        assert_eq!(props.get("description"), Some("Some text"));
        assert_eq!(props.get("name"), Some("a"));
    }

    #[test]
    fn duplicate_property_rejected() {
        let src = r#"<int name="a" type="uint8"><type value="uint16"/></int>"#;
        let root = parse_document(src).expect("parse");
        let props = root.props(&["type"]).expect("props");
        assert!(matches!(
            props.single(&root, "type"),
            Err(SchemaError::DuplicateProperty(_))
        ));
    }

    #[test]
    fn unclosed_element_is_error() {
        assert!(parse_document("<schema><fields></schema>").is_err());
        assert!(parse_document("").is_err());
    }
}
