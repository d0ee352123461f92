//! Structured element codecs.
//!
//! A [`Binding`] replaces the flat text grammar of a [`Format`](super::Format)
//! for values that need structured child elements. When a declaration names
//! both, the binding wins.

use super::{Value, ValueType};
use crate::error::FormatError;
use crate::io::Node;
use std::fmt;
use std::sync::Arc;

/// Structured codec for a single property.
///
/// `read` must consume exactly the child-element sequence below the property
/// element, and `write` must produce exactly that sequence back.
pub trait Binding: fmt::Debug + Send + Sync {
    /// The value type this binding reads and writes.
    fn value_type(&self) -> ValueType;

    /// Decode the property element's children into a value.
    fn read(&self, property: &str, element: &Node) -> Result<Value, FormatError>;

    /// Encode a value as child elements of `element`.
    fn write(&self, property: &str, value: &Value, element: &mut Node)
    -> Result<(), FormatError>;
}

/// One child element per list entry, entry text coded by an element format.
///
/// The structured counterpart of
/// [`CommaSeparatedFormat`](super::CommaSeparatedFormat) for elements whose
/// text may contain the flat delimiter.
#[derive(Debug)]
pub struct TaggedListBinding {
    entry_tag: String,
    element: Arc<dyn super::Format>,
}

impl TaggedListBinding {
    pub fn new(entry_tag: impl Into<String>, element: Arc<dyn super::Format>) -> Self {
        Self {
            entry_tag: entry_tag.into(),
            element,
        }
    }
}

impl Binding for TaggedListBinding {
    fn value_type(&self) -> ValueType {
        ValueType::list_of(self.element.value_type())
    }

    fn read(&self, property: &str, element: &Node) -> Result<Value, FormatError> {
        let mut values = Vec::new();
        for child in &element.children {
            if child.tag != self.entry_tag {
                return Err(FormatError::new(
                    property,
                    child.tag.clone(),
                    format!("expected '{}' entries only", self.entry_tag),
                ));
            }
            let text = child.text.as_deref().unwrap_or("");
            values.push(self.element.parse(property, text)?);
        }
        Ok(Value::Collection(values))
    }

    fn write(
        &self,
        property: &str,
        value: &Value,
        element: &mut Node,
    ) -> Result<(), FormatError> {
        let Value::Collection(values) = value else {
            return Err(FormatError::new(
                property,
                value.to_string(),
                "expected a list value",
            ));
        };
        for v in values {
            let mut child = Node::new(self.entry_tag.clone());
            child.text = Some(self.element.render(v));
            element.children.push(child);
        }
        Ok(())
    }
}
