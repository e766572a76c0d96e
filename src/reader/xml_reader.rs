use std::io::BufRead;
use std::path::Path;

use quick_xml::escape::{resolve_predefined_entity, unescape};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use serde::{Deserialize, Serialize};

use crate::error::FieldScopeError;

/// A parsed element: tag name (prefix kept verbatim), attributes, direct text, children.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize,)]
pub struct ElementNode {
    pub name:       String,
    pub attributes: Vec<(String, String,),>,
    /// Concatenated direct text and CDATA of this element, untrimmed.
    pub text:       String,
    pub children:   Vec<ElementNode,>,
}

impl ElementNode {
    pub fn new(name: impl Into<String,>,) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String,>,) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String,>, value: impl Into<String,>,) -> Self {
        self.attributes.push((key.into(), value.into(),),);
        self
    }

    pub fn with_child(mut self, child: ElementNode,) -> Self {
        self.children.push(child,);
        self
    }

    pub fn trimmed_text(&self,) -> &str {
        self.text.trim()
    }
}

fn parse_error<E,>(path: &Path, source: E,) -> FieldScopeError
where
    E: std::error::Error + Send + Sync + 'static,
{
    FieldScopeError::ParseError {
        path:   path.to_path_buf(),
        source: Box::new(source,),
    }
}

fn start_element(start: &BytesStart, path: &Path,) -> Result<ElementNode, FieldScopeError,> {
    let mut node = ElementNode::new(String::from_utf8_lossy(start.name().into_inner(),),);
    for attr_result in start.attributes() {
        let attr = attr_result.map_err(|e| parse_error(path, e,),)?;
        let key = String::from_utf8_lossy(attr.key.into_inner(),).to_string();
        let raw = String::from_utf8_lossy(&attr.value,);
        let value = unescape(&raw,).map_err(|e| parse_error(path, e,),)?.into_owned();
        node.attributes.push((key, value,),);
    }
    Ok(node,)
}

/// Attaches a finished element to its parent, or makes it the document root.
fn close_element(
    node: ElementNode,
    stack: &mut [ElementNode],
    root: &mut Option<ElementNode,>,
    path: &Path,
) -> Result<(), FieldScopeError,> {
    match stack.last_mut() {
        Some(parent,) => parent.children.push(node,),
        None if root.is_some() => {
            return Err(FieldScopeError::malformed(
                path,
                format!("second root element <{}> after the document root", node.name),
            ),);
        },
        None => *root = Some(node,),
    }
    Ok((),)
}

/// Parses an XML document into its root [`ElementNode`].
///
/// Every malformed-document condition surfaces as [`FieldScopeError::ParseError`] tagged
/// with `path`.
pub fn parse_xml_reader<R: BufRead,>(
    reader_input: R,
    path: &Path,
) -> Result<ElementNode, FieldScopeError,> {
    let mut reader = Reader::from_reader(reader_input,);
    let mut buf = Vec::new();
    let mut stack: Vec<ElementNode,> = Vec::new();
    let mut root: Option<ElementNode,> = None;

    loop {
        match reader.read_event_into(&mut buf,) {
            Err(e,) => return Err(parse_error(path, e,),),
            Ok(Event::Eof,) => break,
            Ok(Event::Start(e,),) => {
                if stack.is_empty() && root.is_some() {
                    return Err(FieldScopeError::malformed(
                        path,
                        "more than one root element",
                    ),);
                }
                stack.push(start_element(&e, path,)?,);
            },
            Ok(Event::Empty(e,),) => {
                let node = start_element(&e, path,)?;
                close_element(node, &mut stack, &mut root, path,)?;
            },
            Ok(Event::End(_,),) => {
                // quick-xml has already matched the end tag against the open one.
                if let Some(node,) = stack.pop() {
                    close_element(node, &mut stack, &mut root, path,)?;
                }
            },
            Ok(Event::Text(e,),) => {
                let text = String::from_utf8_lossy(&e,);
                match stack.last_mut() {
                    Some(current,) => current.text.push_str(&text,),
                    None if text.trim().is_empty() => {},
                    None => {
                        return Err(FieldScopeError::malformed(
                            path,
                            "text content outside the root element",
                        ),);
                    },
                }
            },
            Ok(Event::CData(e,),) => {
                if let Some(current,) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&e,),);
                }
            },
            Ok(Event::GeneralRef(e,),) => {
                if let Some(current,) = stack.last_mut() {
                    match e.resolve_char_ref() {
                        Ok(Some(ch,),) => current.text.push(ch,),
                        Ok(None,) => {
                            let entity = String::from_utf8_lossy(&e,);
                            match resolve_predefined_entity(&entity,) {
                                Some(resolved,) => current.text.push_str(resolved,),
                                // Undeclared entities are kept verbatim.
                                None => current.text.push_str(&format!("&{entity};"),),
                            }
                        },
                        Err(err,) => return Err(parse_error(path, err,),),
                    }
                }
            },
            _ => {},
        }
        buf.clear();
    }

    if let Some(open,) = stack.last() {
        return Err(FieldScopeError::malformed(
            path,
            format!("unexpected end of document inside <{}>", open.name),
        ),);
    }
    root.ok_or_else(|| FieldScopeError::malformed(path, "document has no root element",),)
}

/// Parses an in-memory document; `name` identifies it in errors.
pub fn parse_xml_str(text: &str, name: &str,) -> Result<ElementNode, FieldScopeError,> {
    parse_xml_reader(text.as_bytes(), Path::new(name,),)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested_document() {
        let root = parse_xml_str(
            r#"<?xml version="1.0"?>
            <Order id="7"><Id>1</Id><Lines><Line/><Line>two</Line></Lines></Order>"#,
            "order.xml",
        )
        .unwrap();
        assert_eq!(root.name, "Order");
        assert_eq!(root.attributes, vec![("id".to_string(), "7".to_string())]);
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.children[0].trimmed_text(), "1");
        assert_eq!(root.children[1].children.len(), 2);
        assert_eq!(root.children[1].children[1].trimmed_text(), "two");
    }

    #[test]
    fn test_parse_keeps_namespace_prefix_and_entities() {
        let root = parse_xml_str(
            "<ns:Doc xmlns:ns=\"urn:x\"><ns:Name>A &amp; B &#65;</ns:Name><![CDATA[raw]]></ns:Doc>",
            "doc.xml",
        )
        .unwrap();
        assert_eq!(root.name, "ns:Doc");
        assert_eq!(root.children[0].name, "ns:Name");
        assert_eq!(root.children[0].trimmed_text(), "A & B A");
        assert_eq!(root.trimmed_text(), "raw");
    }

    #[test]
    fn test_mismatched_tags_are_parse_errors() {
        let err = parse_xml_str("<a><b></a>", "bad.xml",).unwrap_err();
        assert!(matches!(err, FieldScopeError::ParseError { .. }));
    }

    #[test]
    fn test_unclosed_and_empty_documents_are_parse_errors() {
        assert!(matches!(
            parse_xml_str("<a><b></b>", "open.xml"),
            Err(FieldScopeError::ParseError { .. })
        ));
        assert!(matches!(
            parse_xml_str("   ", "empty.xml"),
            Err(FieldScopeError::ParseError { .. })
        ));
        assert!(matches!(
            parse_xml_str("<a/><b/>", "two_roots.xml"),
            Err(FieldScopeError::ParseError { .. })
        ));
    }
}
