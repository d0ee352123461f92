//! Document reading.
//!
//! Drives the descriptor model, the polymorphic resolver, value coding and
//! the merge engine over an element tree, writing into a fresh or layered
//! item. Element-scoped problems (format failures, unknown subtypes,
//! unknown properties) are collected and skip only the affected element;
//! merge errors abort the whole read.

use super::node::{
    INTERFACE_ATTR, MAP_KEY_ATTR, Node, OPERATION_ATTR, POSITION_ATTR, REFERENCE_ATTR,
};
use crate::error::{ConfigError, ConfigResult, FormatError, MergeError};
use crate::item::Item;
use crate::merge::{ListEntry, ListMerger, ListOperation, MapMerger, Position};
use crate::schema::{Descriptor, PropertyDescriptor, SchemaRegistry};
use crate::value::{CollectionKind, Format, Value, ValueType, format_for_type};
use std::sync::Arc;
use tracing::debug;

/// Reads element trees into configuration items.
pub struct DocumentReader<'r> {
    registry: &'r SchemaRegistry,
    problems: Vec<ConfigError>,
}

impl<'r> DocumentReader<'r> {
    pub fn new(registry: &'r SchemaRegistry) -> Self {
        Self {
            registry,
            problems: Vec::new(),
        }
    }

    /// Element-scoped problems collected by reads so far.
    pub fn problems(&self) -> &[ConfigError] {
        &self.problems
    }

    pub fn take_problems(&mut self) -> Vec<ConfigError> {
        std::mem::take(&mut self.problems)
    }

    /// Read one document into a fresh item of `shape` (or the subtype its
    /// discriminator selects).
    pub fn read(&mut self, shape: &str, document: &Node) -> ConfigResult<Item> {
        self.read_layers(shape, &[document])
    }

    /// Read ordered layers: layer 0 is the base document, later layers
    /// overlay scalar values and merge collection entries.
    pub fn read_layers(&mut self, shape: &str, layers: &[&Node]) -> ConfigResult<Item> {
        let mut item: Option<Item> = None;
        for layer in layers {
            let next = self.read_item(shape, layer, item.take())?;
            item = Some(next);
        }
        let item = match item {
            Some(item) => item,
            None => self.registry.new_instance(shape)?,
        };
        self.check_mandatory(&item);
        debug!(shape = %item.descriptor().name(), problems = self.problems.len(), "document read");
        Ok(item)
    }

    fn read_item(&mut self, bound: &str, node: &Node, base: Option<Item>) -> ConfigResult<Item> {
        let descriptor = self.element_descriptor(bound, node)?;
        let mut item = match base {
            // An overlay keeps the assembled base unless it selects a
            // different subtype.
            Some(existing) if existing.descriptor().name() == descriptor.name() => existing,
            _ => Item::new(descriptor)?,
        };
        self.read_attributes(&mut item, node);
        self.read_children(&mut item, node)?;
        Ok(item)
    }

    /// Resolve the descriptor of one element below a bound shape: an
    /// explicit discriminator wins, then the element's own tag when it is
    /// registered, then the bound itself.
    fn element_descriptor(&self, bound: &str, node: &Node) -> ConfigResult<Arc<Descriptor>> {
        if let Some(discriminator) = node.attribute(INTERFACE_ATTR) {
            return Ok(self.registry.resolve_subtype(bound, discriminator)?);
        }
        if self.registry.has_subtype_tag(bound, &node.tag) {
            return Ok(self.registry.resolve_subtype(bound, &node.tag)?);
        }
        Ok(self.registry.descriptor(bound)?)
    }

    fn read_attributes(&mut self, item: &mut Item, node: &Node) {
        for (name, text) in &node.attributes {
            if Node::is_meta_attribute(name) {
                continue;
            }
            let Some(property) = item.descriptor().property(name).cloned() else {
                self.problems.push(ConfigError::UnknownProperty {
                    shape: item.descriptor().name().to_string(),
                    name: name.clone(),
                });
                continue;
            };
            if property.is_derived() {
                self.problems.push(ConfigError::DerivedConfigured {
                    property: property.name().to_string(),
                });
                continue;
            }
            let Some(format) = property.format().cloned() else {
                self.problems.push(
                    FormatError::new(name.clone(), text.clone(), "property has no text format")
                        .into(),
                );
                continue;
            };
            self.parse_and_set(item, &property, &format, text);
        }
    }

    fn parse_and_set(
        &mut self,
        item: &mut Item,
        property: &PropertyDescriptor,
        format: &Arc<dyn Format>,
        text: &str,
    ) {
        match format.parse(property.name(), text) {
            Ok(value) => {
                if let Err(error) = item.set(property.name(), value) {
                    self.problems.push(error.into());
                }
            }
            Err(error) => self.problems.push(error.into()),
        }
    }

    fn read_children(&mut self, item: &mut Item, node: &Node) -> ConfigResult<()> {
        for child in &node.children {
            let property = match item.descriptor().property(&child.tag) {
                Some(property) => property.clone(),
                None => match self.property_for_tag(item.descriptor(), &child.tag) {
                    Some(property) => property,
                    None => {
                        self.problems.push(ConfigError::UnknownProperty {
                            shape: item.descriptor().name().to_string(),
                            name: child.tag.clone(),
                        });
                        continue;
                    }
                },
            };
            if property.is_derived() {
                self.problems.push(ConfigError::DerivedConfigured {
                    property: property.name().to_string(),
                });
                continue;
            }

            if let Some(binding) = property.binding().cloned() {
                match binding.read(property.name(), child) {
                    Ok(value) => {
                        if let Err(error) = item.set(property.name(), value) {
                            self.problems.push(error.into());
                        }
                    }
                    Err(error) => self.problems.push(error.into()),
                }
                continue;
            }

            match property.value_type().clone() {
                ValueType::Item(bound) => {
                    self.read_item_property(item, &property, &bound, child)?
                }
                ValueType::Collection(CollectionKind::Map, element) => {
                    self.read_map_property(item, &property, &element, child)?
                }
                ValueType::Collection(_, element) => {
                    self.read_list_property(item, &property, &element, child)?
                }
                _ => {
                    // Scalar in element form: text content through the
                    // property format.
                    let text = child.text.clone().unwrap_or_default();
                    match property.format().cloned() {
                        Some(format) => self.parse_and_set(item, &property, &format, &text),
                        None => self.problems.push(
                            FormatError::new(property.name(), text, "property has no text format")
                                .into(),
                        ),
                    }
                }
            }
        }
        Ok(())
    }

    /// A bare, tag-matched open element: the first item-valued property
    /// whose bound registers the tag.
    fn property_for_tag(
        &self,
        descriptor: &Descriptor,
        tag: &str,
    ) -> Option<Arc<PropertyDescriptor>> {
        descriptor
            .properties()
            .find(|p| match p.value_type() {
                ValueType::Item(bound) => self.registry.has_subtype_tag(bound, tag),
                _ => false,
            })
            .cloned()
    }

    fn read_item_property(
        &mut self,
        item: &mut Item,
        property: &PropertyDescriptor,
        bound: &str,
        child: &Node,
    ) -> ConfigResult<()> {
        let base = if item.value_set(property.name()).unwrap_or(false) {
            item.get(property.name())
                .ok()
                .and_then(|v| v.as_item().cloned())
        } else {
            None
        };
        match self.read_item(bound, child, base) {
            Ok(nested) => {
                if let Err(error) = item.set(property.name(), Value::item(nested)) {
                    self.problems.push(error.into());
                }
            }
            // Unknown or unloadable subtypes fail only this element.
            Err(ConfigError::Subtype(error)) => self.problems.push(error.into()),
            Err(fatal) => return Err(fatal),
        }
        Ok(())
    }

    fn read_list_property(
        &mut self,
        item: &mut Item,
        property: &PropertyDescriptor,
        element_type: &ValueType,
        container: &Node,
    ) -> ConfigResult<()> {
        let base = match item.get(property.name()) {
            Ok(Value::Collection(elements)) => elements,
            _ => Vec::new(),
        };
        let mut merger = ListMerger::new(property.name(), property.key_property(), base);
        for entry_node in &container.children {
            if let Some(entry) = self.parse_list_entry(property, element_type, entry_node)? {
                merger.apply(entry).map_err(ConfigError::from)?;
            }
        }
        let merged = Value::Collection(merger.into_elements());
        if let Err(error) = item.set(property.name(), merged) {
            self.problems.push(error.into());
        }
        Ok(())
    }

    fn parse_list_entry(
        &mut self,
        property: &PropertyDescriptor,
        element_type: &ValueType,
        node: &Node,
    ) -> ConfigResult<Option<ListEntry>> {
        let operation = match node.attribute(OPERATION_ATTR) {
            Some(token) => ListOperation::parse(property.name(), token)?,
            None => ListOperation::Add,
        };
        let position = match node.attribute(POSITION_ATTR) {
            Some(token) => Some(Position::parse(property.name(), token)?),
            None => None,
        };

        match element_type {
            ValueType::Item(bound) => {
                self.parse_item_entry(property, bound, node, operation, position)
            }
            plain => self.parse_plain_entry(property, plain, node, operation, position),
        }
    }

    fn parse_item_entry(
        &mut self,
        property: &PropertyDescriptor,
        bound: &str,
        node: &Node,
        operation: ListOperation,
        position: Option<Position>,
    ) -> ConfigResult<Option<ListEntry>> {
        let Some(key_property) = property.key_property() else {
            if matches!(operation, ListOperation::Add | ListOperation::AddOrUpdate) {
                // Unkeyed item lists support appends only; addOrUpdate
                // degenerates to add.
                return match self.read_entry_payload(property, bound, node) {
                    Some(payload) => Ok(Some(ListEntry {
                        operation,
                        position,
                        reference: None,
                        key: None,
                        payload: Some(payload),
                    })),
                    None => Ok(None),
                };
            }
            return Err(MergeError::MissingKey {
                property: property.name().to_string(),
            }
            .into());
        };

        let reference = match node.attribute(REFERENCE_ATTR) {
            Some(text) => match self.parse_entry_key(property, bound, key_property, text) {
                Some(value) => Some(value),
                None => return Ok(None),
            },
            None => None,
        };

        if operation == ListOperation::Remove {
            let Some(text) = node.attribute(key_property) else {
                return Err(MergeError::MissingKey {
                    property: property.name().to_string(),
                }
                .into());
            };
            let Some(key) = self.parse_entry_key(property, bound, key_property, text) else {
                return Ok(None);
            };
            return Ok(Some(ListEntry {
                operation,
                position,
                reference,
                key: Some(key),
                payload: None,
            }));
        }

        let Some(payload) = self.read_entry_payload(property, bound, node) else {
            return Ok(None);
        };
        let key = payload
            .as_item()
            .filter(|patch| patch.value_set(key_property).unwrap_or(false))
            .and_then(|patch| patch.get(key_property).ok());
        Ok(Some(ListEntry {
            operation,
            position,
            reference,
            key,
            payload: Some(payload),
        }))
    }

    fn parse_plain_entry(
        &mut self,
        property: &PropertyDescriptor,
        element_type: &ValueType,
        node: &Node,
        operation: ListOperation,
        position: Option<Position>,
    ) -> ConfigResult<Option<ListEntry>> {
        let Some(format) = format_for_type(element_type) else {
            self.problems.push(
                FormatError::new(property.name(), node.tag.clone(), "element has no text format")
                    .into(),
            );
            return Ok(None);
        };
        let reference = match node.attribute(REFERENCE_ATTR) {
            Some(text) => match format.parse(property.name(), text) {
                Ok(value) => Some(value),
                Err(error) => {
                    self.problems.push(error.into());
                    return Ok(None);
                }
            },
            None => None,
        };
        let text = node.text.clone().unwrap_or_default();
        let value = match format.parse(property.name(), &text) {
            Ok(value) => value,
            Err(error) => {
                self.problems.push(error.into());
                return Ok(None);
            }
        };
        // Plain values key by themselves; an explicit key attribute
        // addresses an existing element whose value is to change.
        let key = match node.attribute(MAP_KEY_ATTR) {
            Some(key_text) => match format.parse(property.name(), key_text) {
                Ok(key) => key,
                Err(error) => {
                    self.problems.push(error.into());
                    return Ok(None);
                }
            },
            None => value.clone(),
        };
        let payload = if operation == ListOperation::Remove {
            None
        } else {
            Some(value)
        };
        Ok(Some(ListEntry {
            operation,
            position,
            reference,
            key: Some(key),
            payload,
        }))
    }

    /// Read one collection entry element into a payload item. The entry
    /// tag selects the subtype: an explicit discriminator wins, the plain
    /// entry tag means the bound itself, any other tag must be registered.
    fn read_entry_payload(
        &mut self,
        property: &PropertyDescriptor,
        bound: &str,
        node: &Node,
    ) -> Option<Value> {
        let resolved = if node.attribute(INTERFACE_ATTR).is_some() {
            self.element_descriptor(bound, node)
        } else if Some(node.tag.as_str()) == property.entry_tag() {
            self.registry.descriptor(bound).map_err(ConfigError::from)
        } else {
            self.registry
                .resolve_subtype(bound, &node.tag)
                .map_err(ConfigError::from)
        };
        let descriptor = match resolved {
            Ok(descriptor) => descriptor,
            Err(error) => {
                // Scoped to this entry; sibling entries still load.
                self.problems.push(error);
                return None;
            }
        };
        let mut payload = match Item::new(descriptor) {
            Ok(item) => item,
            Err(error) => {
                self.problems.push(error.into());
                return None;
            }
        };
        self.read_attributes(&mut payload, node);
        if let Err(error) = self.read_children(&mut payload, node) {
            self.problems.push(error);
            return None;
        }
        Some(Value::item(payload))
    }

    /// Parse a key or reference literal through the key property's format.
    fn parse_entry_key(
        &mut self,
        property: &PropertyDescriptor,
        bound: &str,
        key_property: &str,
        text: &str,
    ) -> Option<Value> {
        let format = self
            .registry
            .descriptor(bound)
            .ok()
            .and_then(|d| d.property(key_property).and_then(|p| p.format().cloned()));
        let Some(format) = format else {
            self.problems.push(
                FormatError::new(property.name(), text, "key property has no text format").into(),
            );
            return None;
        };
        match format.parse(key_property, text) {
            Ok(value) => Some(value),
            Err(error) => {
                self.problems.push(error.into());
                None
            }
        }
    }

    fn read_map_property(
        &mut self,
        item: &mut Item,
        property: &PropertyDescriptor,
        element_type: &ValueType,
        container: &Node,
    ) -> ConfigResult<()> {
        let base = match item.get(property.name()) {
            Ok(Value::Map(entries)) => entries,
            _ => Vec::new(),
        };
        let mut merger = MapMerger::new(property.name(), base);
        merger.begin_layer();
        for entry_node in &container.children {
            let operation = match entry_node.attribute(OPERATION_ATTR) {
                Some(token) => ListOperation::parse(property.name(), token)?,
                None => ListOperation::Add,
            };
            match element_type {
                ValueType::Item(bound) => {
                    let Some(key_property) = property.key_property() else {
                        self.problems.push(
                            FormatError::new(
                                property.name(),
                                entry_node.tag.clone(),
                                "map property declares no key",
                            )
                            .into(),
                        );
                        continue;
                    };
                    if operation == ListOperation::Remove {
                        let Some(text) = entry_node.attribute(key_property) else {
                            return Err(MergeError::MissingKey {
                                property: property.name().to_string(),
                            }
                            .into());
                        };
                        if let Some(key) =
                            self.parse_entry_key(property, bound, key_property, text)
                        {
                            merger.apply(operation, key, None)?;
                        }
                        continue;
                    }
                    let Some(payload) = self.read_entry_payload(property, bound, entry_node)
                    else {
                        continue;
                    };
                    let Some(key) = payload
                        .as_item()
                        .and_then(|entry| entry.get(key_property).ok())
                    else {
                        continue;
                    };
                    merger.apply(operation, key, Some(payload))?;
                }
                plain => {
                    let Some(key_text) = entry_node.attribute(MAP_KEY_ATTR) else {
                        return Err(MergeError::MissingKey {
                            property: property.name().to_string(),
                        }
                        .into());
                    };
                    let key = Value::text(key_text);
                    if operation == ListOperation::Remove {
                        merger.apply(operation, key, None)?;
                        continue;
                    }
                    let Some(format) = format_for_type(plain) else {
                        self.problems.push(
                            FormatError::new(
                                property.name(),
                                entry_node.tag.clone(),
                                "element has no text format",
                            )
                            .into(),
                        );
                        continue;
                    };
                    let text = entry_node.text.clone().unwrap_or_default();
                    match format.parse(property.name(), &text) {
                        Ok(value) => merger.apply(operation, key, Some(value))?,
                        Err(error) => self.problems.push(error.into()),
                    }
                }
            }
        }
        let merged = Value::Map(merger.into_entries());
        if let Err(error) = item.set(property.name(), merged) {
            self.problems.push(error.into());
        }
        Ok(())
    }

    /// Report mandatory properties left unset anywhere in the tree once
    /// the document completes.
    fn check_mandatory(&mut self, item: &Item) {
        for name in item.unset_mandatory() {
            self.problems.push(ConfigError::MandatoryNotSet {
                shape: item.descriptor().name().to_string(),
                property: name,
            });
        }
        for property in item.descriptor().properties() {
            if property.is_derived() {
                continue;
            }
            match item.get(property.name()) {
                Ok(Value::Item(nested)) => self.check_mandatory(&nested),
                Ok(Value::Collection(elements)) => {
                    for element in &elements {
                        if let Value::Item(nested) = element {
                            self.check_mandatory(nested);
                        }
                    }
                }
                Ok(Value::Map(entries)) => {
                    for (_, value) in &entries {
                        if let Value::Item(nested) = value {
                            self.check_mandatory(nested);
                        }
                    }
                }
                _ => {}
            }
        }
    }
}
