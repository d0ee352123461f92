//! Frozen per-property schema.

use crate::annotations::Annotations;
use crate::item::Item;
use crate::value::{Binding, Format, ResolvedDefault, Value, ValueType};
use std::fmt;
use std::sync::Arc;

/// Computes a derived property from its item.
pub type DerivedFn = Arc<dyn Fn(&Item) -> Value + Send + Sync>;

/// A registered derived-property function together with its name.
#[derive(Clone)]
pub struct DerivedProperty {
    pub function: String,
    pub compute: DerivedFn,
}

impl fmt::Debug for DerivedProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DerivedProperty({})", self.function)
    }
}

/// Identity of a property declaration.
///
/// Pure redeclarations (same name and type, unchanged annotations) keep the
/// identifier of the declaration they inherit; an override that adds
/// annotations or narrows the type mints a new identifier at the overriding
/// shape. Distinct identifiers through unrelated ancestors signal a true
/// conflict.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyIdentifier {
    pub shape: String,
    pub name: String,
}

impl fmt::Display for PropertyIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.shape, self.name)
    }
}

/// One named, typed slot within a [`Descriptor`](super::Descriptor).
/// Immutable after analysis.
#[derive(Debug)]
pub struct PropertyDescriptor {
    pub(crate) name: String,
    pub(crate) index: usize,
    pub(crate) value_type: ValueType,
    pub(crate) mandatory: bool,
    pub(crate) nullable: bool,
    pub(crate) has_setter: bool,
    pub(crate) is_abstract: bool,
    pub(crate) annotations: Annotations,
    pub(crate) default: ResolvedDefault,
    pub(crate) format: Option<Arc<dyn Format>>,
    pub(crate) binding: Option<Arc<dyn Binding>>,
    pub(crate) derived: Option<DerivedProperty>,
    pub(crate) key_property: Option<String>,
    pub(crate) entry_tag: Option<String>,
    /// Shape that first declared this property (common-root anchor).
    pub(crate) root_shape: String,
    pub(crate) identifier: PropertyIdentifier,
}

impl PropertyDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Position of this property's slot within its descriptor.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn value_type(&self) -> &ValueType {
        &self.value_type
    }

    pub fn is_mandatory(&self) -> bool {
        self.mandatory
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn has_setter(&self) -> bool {
        self.has_setter
    }

    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    pub fn is_derived(&self) -> bool {
        self.derived.is_some()
    }

    pub fn annotations(&self) -> &Annotations {
        &self.annotations
    }

    pub fn default(&self) -> &ResolvedDefault {
        &self.default
    }

    pub fn format(&self) -> Option<&Arc<dyn Format>> {
        self.format.as_ref()
    }

    pub fn binding(&self) -> Option<&Arc<dyn Binding>> {
        self.binding.as_ref()
    }

    pub fn derived(&self) -> Option<&DerivedProperty> {
        self.derived.as_ref()
    }

    /// Canonical name of the key property of this collection's elements.
    pub fn key_property(&self) -> Option<&str> {
        self.key_property.as_deref()
    }

    /// Document tag of one collection element.
    pub fn entry_tag(&self) -> Option<&str> {
        self.entry_tag.as_deref()
    }

    pub fn root_shape(&self) -> &str {
        &self.root_shape
    }

    pub fn identifier(&self) -> &PropertyIdentifier {
        &self.identifier
    }

    /// Element shape of an item- or item-collection-valued property.
    pub fn element_shape(&self) -> Option<&str> {
        match &self.value_type {
            ValueType::Item(shape) => Some(shape),
            ValueType::Collection(_, element) => match element.as_ref() {
                ValueType::Item(shape) => Some(shape),
                _ => None,
            },
            _ => None,
        }
    }
}
