//! Document writing.
//!
//! Serializes an item back to an element tree. Only explicitly set
//! properties are emitted; polymorphic values serialize to their
//! registered tag, so re-serializing a discriminator-based document yields
//! the tag-based form.

use super::node::{INTERFACE_ATTR, MAP_KEY_ATTR, Node};
use crate::error::{ConfigError, ConfigResult};
use crate::item::Item;
use crate::schema::{Descriptor, PropertyDescriptor, SchemaRegistry};
use crate::value::{CollectionKind, Value, ValueType, format_for_type};

/// Writes configuration items as element trees.
pub struct DocumentWriter<'r> {
    registry: &'r SchemaRegistry,
}

impl<'r> DocumentWriter<'r> {
    pub fn new(registry: &'r SchemaRegistry) -> Self {
        Self { registry }
    }

    /// Serialize `item` below a container element of the given tag.
    pub fn write(&self, tag: &str, item: &Item) -> ConfigResult<Node> {
        let mut node = Node::new(tag);
        self.write_properties(&mut node, item)?;
        Ok(node)
    }

    fn write_properties(&self, node: &mut Node, item: &Item) -> ConfigResult<()> {
        for property in item.descriptor().properties() {
            if property.is_derived() {
                continue;
            }
            if !item.value_set(property.name()).map_err(ConfigError::from)? {
                continue;
            }
            let value = item.get(property.name()).map_err(ConfigError::from)?;

            if let Some(binding) = property.binding() {
                let mut child = Node::new(property.name());
                binding.write(property.name(), &value, &mut child)?;
                node.children.push(child);
                continue;
            }

            match (&value, property.value_type()) {
                // Explicit null has no document form; the observable value
                // equals the nullable default after a round-trip.
                (Value::None, _) => {}
                // A declared format owns the text form even for collection
                // values (e.g. comma-separated lists).
                (collection @ (Value::Collection(_) | Value::Map(_)), _)
                    if property.format().is_some() =>
                {
                    if let Some(format) = property.format() {
                        node.set_attribute(property.name(), format.render(collection));
                    }
                }
                (Value::Item(nested), ValueType::Item(bound)) => {
                    let mut child = Node::new(property.name());
                    self.apply_discriminator(&mut child, bound, nested.descriptor());
                    self.write_properties(&mut child, nested)?;
                    node.children.push(child);
                }
                (Value::Collection(elements), ValueType::Collection(_, element_type)) => {
                    let mut container = Node::new(property.name());
                    for element in elements {
                        container
                            .children
                            .push(self.write_element(property, element_type, element)?);
                    }
                    node.children.push(container);
                }
                (Value::Map(entries), ValueType::Collection(CollectionKind::Map, element_type)) => {
                    let mut container = Node::new(property.name());
                    for (key, element) in entries {
                        let mut child = self.write_element(property, element_type, element)?;
                        if !matches!(element, Value::Item(_)) {
                            child.set_attribute(MAP_KEY_ATTR, render_plain(key));
                        }
                        container.children.push(child);
                    }
                    node.children.push(container);
                }
                (scalar, _) => {
                    if let Some(format) = property.format() {
                        node.set_attribute(property.name(), format.render(scalar));
                    }
                }
            }
        }
        Ok(())
    }

    fn write_element(
        &self,
        property: &PropertyDescriptor,
        element_type: &ValueType,
        element: &Value,
    ) -> ConfigResult<Node> {
        let entry_tag = property.entry_tag().unwrap_or("entry");
        match (element, element_type) {
            (Value::Item(nested), ValueType::Item(bound)) => {
                // Tag-based form when the subtype is registered, else the
                // entry tag resolving to the bound itself.
                let mut child = match self.registry.tag_for(bound, nested.descriptor()) {
                    Some(tag) => Node::new(tag),
                    None => Node::new(entry_tag),
                };
                self.write_properties(&mut child, nested)?;
                Ok(child)
            }
            (plain, ty) => {
                let text = format_for_type(ty)
                    .map(|format| format.render(plain))
                    .unwrap_or_else(|| render_plain(plain));
                Ok(Node::new(entry_tag).with_text(text))
            }
        }
    }

    fn apply_discriminator(&self, node: &mut Node, bound: &str, descriptor: &Descriptor) {
        if descriptor.name() != bound {
            if let Some(tag) = self.registry.tag_for(bound, descriptor) {
                node.set_attribute(INTERFACE_ATTR, tag);
            }
        }
    }
}

fn render_plain(value: &Value) -> String {
    match value {
        Value::Text(s) => s.clone(),
        other => other.to_string(),
    }
}
