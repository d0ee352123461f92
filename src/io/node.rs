//! Neutral element tree.
//!
//! The engine reads and writes [`Node`] trees instead of concrete XML or
//! JSON token streams. A supplied tokenizer maps its own syntax onto this
//! tree: XML elements map 1:1, the JSON adapter in [`super::json`] follows
//! the documented field conventions. The metadata constants below are
//! shared between every reader and writer.

use serde::{Deserialize, Serialize};

/// Namespace prefix of engine metadata attributes.
pub const CONFIG_PREFIX: &str = "config";

/// Discriminator attribute selecting a concrete subtype of an open value.
pub const INTERFACE_ATTR: &str = "config:interface";

/// Collection entry operation attribute.
pub const OPERATION_ATTR: &str = "config:operation";

/// Collection entry position attribute.
pub const POSITION_ATTR: &str = "config:position";

/// Reference key attribute for `before`/`after` anchors.
pub const REFERENCE_ATTR: &str = "config:reference";

/// Key attribute of plain-valued map entries.
pub const MAP_KEY_ATTR: &str = "key";

/// One element of a configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub tag: String,
    /// Attributes in document order.
    #[serde(default)]
    pub attributes: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if let Some(slot) = self.attributes.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        } else {
            self.attributes.push((name, value));
        }
    }

    /// Whether an attribute belongs to the engine metadata namespace.
    pub fn is_meta_attribute(name: &str) -> bool {
        name.starts_with(CONFIG_PREFIX)
            && name.as_bytes().get(CONFIG_PREFIX.len()) == Some(&b':')
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_attributes_are_prefix_scoped() {
        assert!(Node::is_meta_attribute(INTERFACE_ATTR));
        assert!(Node::is_meta_attribute(OPERATION_ATTR));
        assert!(!Node::is_meta_attribute("configuration"));
        assert!(!Node::is_meta_attribute("name"));
    }

    #[test]
    fn set_attribute_replaces_in_place() {
        let mut node = Node::new("server").with_attribute("port", "1");
        node.set_attribute("port", "2");
        assert_eq!(node.attribute("port"), Some("2"));
        assert_eq!(node.attributes.len(), 1);
    }
}
