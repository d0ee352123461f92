//! Frozen per-shape schema.

use super::property::PropertyDescriptor;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// The analyzed, immutable schema of one configuration shape.
///
/// Built once per shape by the [`SchemaRegistry`](super::SchemaRegistry)
/// and shared process-wide.
#[derive(Debug)]
pub struct Descriptor {
    pub(crate) name: String,
    pub(crate) supertypes: Vec<String>,
    /// Transitive supertype closure including the shape itself.
    pub(crate) ancestors: BTreeSet<String>,
    pub(crate) is_abstract: bool,
    pub(crate) properties: Vec<Arc<PropertyDescriptor>>,
    pub(crate) by_name: HashMap<String, usize>,
}

impl Descriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Direct supertypes in declaration order.
    pub fn supertypes(&self) -> &[String] {
        &self.supertypes
    }

    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    /// Whether this shape is `shape` or inherits from it.
    pub fn is_kind_of(&self, shape: &str) -> bool {
        self.ancestors.contains(shape)
    }

    /// Properties in resolution order: inherited first, then local.
    pub fn properties(&self) -> impl Iterator<Item = &Arc<PropertyDescriptor>> {
        self.properties.iter()
    }

    pub fn property_count(&self) -> usize {
        self.properties.len()
    }

    pub fn property(&self, name: &str) -> Option<&Arc<PropertyDescriptor>> {
        self.by_name.get(name).map(|&i| &self.properties[i])
    }

    pub fn property_at(&self, index: usize) -> &Arc<PropertyDescriptor> {
        &self.properties[index]
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }
}

impl PartialEq for Descriptor {
    /// Descriptor identity is shape identity; the registry guarantees one
    /// descriptor per shape name.
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Descriptor {}
