use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::schema::SchemaError;

/// Minimal owned element tree, shared by the schema loader and the decoder
#[derive(Debug, Clone, PartialEq, Default)]
pub struct XmlElement {
    /// Name as written, including any prefix
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlElement>,
    pub text: String,
}

impl XmlElement {
    pub fn local_name(&self) -> &str {
        local_name(&self.name)
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn children_named<'a, 'b>(
        &'a self,
        local: &'b str,
    ) -> impl Iterator<Item = &'a XmlElement> + 'b
    where
        'a: 'b,
    {
        self.children.iter().filter(move |c| c.local_name() == local)
    }

    pub fn child_named(&self, local: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.local_name() == local)
    }
}

/// Strip a namespace prefix: `xs:element` -> `element`
pub fn local_name(qualified: &str) -> &str {
    match qualified.rsplit_once(':') {
        Some((_, local)) => local,
        None => qualified,
    }
}

/// Namespace prefix of a qualified name, if any
pub fn prefix(qualified: &str) -> Option<&str> {
    qualified.split_once(':').map(|(prefix, _)| prefix)
}

/// Namespace declarations and `xsi:` attributes are never declared in a schema
pub fn is_reserved_attribute(name: &str) -> bool {
    name == "xmlns" || name.starts_with("xmlns:") || name.starts_with("xsi:")
}

/// Parse a complete document into its root element
pub fn parse_document(bytes: &[u8]) -> Result<XmlElement, SchemaError> {
    let source = std::str::from_utf8(bytes)
        .map_err(|e| SchemaError::Malformed(format!("document is not valid UTF-8: {}", e)))?;

    // text is kept as written; string values keep their whitespace
    let mut reader = Reader::from_str(source);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        let event = reader.read_event().map_err(|e| {
            SchemaError::Malformed(format!("{} at byte {}", e, reader.buffer_position()))
        })?;

        match event {
            Event::Start(start) => stack.push(open_element(&start)?),
            Event::Empty(start) => {
                let element = open_element(&start)?;
                attach(element, &mut stack, &mut root)?;
            }
            Event::End(_) => {
                let mut element = stack
                    .pop()
                    .ok_or_else(|| SchemaError::Malformed("unbalanced end tag".to_string()))?;
                // indentation between child elements
                if !element.children.is_empty() && element.text.trim().is_empty() {
                    element.text.clear();
                }
                attach(element, &mut stack, &mut root)?;
            }
            Event::Text(text) => {
                let text = text
                    .unescape()
                    .map_err(|e| SchemaError::Malformed(e.to_string()))?;
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&text);
                }
            }
            Event::CData(data) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(SchemaError::Malformed(format!(
            "unclosed element '{}'",
            stack[stack.len() - 1].name
        )));
    }
    root.ok_or_else(|| SchemaError::Malformed("document has no root element".to_string()))
}

fn open_element(start: &BytesStart) -> Result<XmlElement, SchemaError> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| SchemaError::Malformed(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| SchemaError::Malformed(e.to_string()))?
            .into_owned();
        attributes.push((key, value));
    }

    Ok(XmlElement {
        name,
        attributes,
        children: Vec::new(),
        text: String::new(),
    })
}

fn attach(
    element: XmlElement,
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
) -> Result<(), SchemaError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => {
            return Err(SchemaError::Malformed(format!(
                "second root element '{}'",
                element.name
            )))
        }
    }
    Ok(())
}
