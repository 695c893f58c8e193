/// Tag tree handed to the materializer
///
/// The tokenizer itself is `roxmltree`; this module only copies the parts the
/// decoders read (element name, text, ordered children) into an owned tree so
/// the borrowed document can be dropped right after parsing.
use crate::error::{BirdfeedError, Result};

/// One element of a parsed response body
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlNode {
    /// Local element name, as written in the document
    pub name: String,
    /// Concatenated direct text and CDATA content
    pub text: String,
    /// Child elements in document order
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    /// Create an element with text and no children
    pub fn leaf(name: &str, text: &str) -> Self {
        Self {
            name: name.to_string(),
            text: text.to_string(),
            children: Vec::new(),
        }
    }

    /// Create an element with children and no text
    pub fn branch(name: &str, children: Vec<XmlNode>) -> Self {
        Self {
            name: name.to_string(),
            text: String::new(),
            children,
        }
    }

    /// Case-insensitive tag comparison
    pub fn is(&self, tag: &str) -> bool {
        self.name.eq_ignore_ascii_case(tag)
    }
}

/// Parse a response body into a tree rooted at the document element
pub fn parse(body: &[u8]) -> Result<XmlNode> {
    let text = std::str::from_utf8(body)
        .map_err(|e| BirdfeedError::Xml(format!("body is not UTF-8: {}", e)))?;
    let doc = roxmltree::Document::parse(text).map_err(|e| BirdfeedError::Xml(e.to_string()))?;
    Ok(copy_element(doc.root_element()))
}

fn copy_element(node: roxmltree::Node<'_, '_>) -> XmlNode {
    let mut out = XmlNode {
        name: node.tag_name().name().to_string(),
        ..Default::default()
    };

    for child in node.children() {
        if child.is_element() {
            out.children.push(copy_element(child));
        } else if child.is_text() {
            if let Some(t) = child.text() {
                out.text.push_str(t);
            }
        }
    }

    out
}
