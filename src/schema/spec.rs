//! Shape declarations.
//!
//! A [`ShapeSpec`] is the declaration-side input of the descriptor model:
//! an explicit list of accessor declarations replacing a reflective
//! interface scan. Analysis turns registered specs into frozen
//! [`Descriptor`](super::Descriptor)s.

use super::names;
use crate::annotations::{self, Annotations};
use crate::value::ValueType;
use serde_json::Value as Json;

/// Role of one accessor declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessorRole {
    /// Declares the property and its value type.
    Getter,
    /// Declares write access; requires a getter locally or inherited.
    Setter,
    /// Convenience lookup into a keyed sibling collection.
    IndexedGetter,
}

/// One declared accessor of a shape.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessorSpec {
    /// Raw accessor name, e.g. `getConnectionTimeout`.
    pub raw_name: String,
    pub role: AccessorRole,
    /// Getter return type, setter parameter type, or indexed return type.
    pub value_type: ValueType,
    /// Parameter type of an indexed getter.
    pub param_type: Option<ValueType>,
    pub annotations: Annotations,
}

impl AccessorSpec {
    pub fn getter(raw_name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            raw_name: raw_name.into(),
            role: AccessorRole::Getter,
            value_type,
            param_type: None,
            annotations: Annotations::new(),
        }
    }

    pub fn setter(raw_name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            raw_name: raw_name.into(),
            role: AccessorRole::Setter,
            value_type,
            param_type: None,
            annotations: Annotations::new(),
        }
    }

    /// Indexed lookup accessor: one parameter of the sibling collection's
    /// key type, returning the element type. `sibling` names the collection
    /// property it indexes into.
    pub fn indexed(
        raw_name: impl Into<String>,
        param_type: ValueType,
        value_type: ValueType,
        sibling: impl Into<String>,
    ) -> Self {
        let mut annotations = Annotations::new();
        annotations.set(annotations::INDEXED, Json::String(sibling.into()));
        Self {
            raw_name: raw_name.into(),
            role: AccessorRole::IndexedGetter,
            value_type,
            param_type: Some(param_type),
            annotations,
        }
    }

    /// The canonical property name this accessor contributes to.
    pub fn property_name(&self) -> String {
        names::property_name(&self.raw_name)
    }

    pub fn annotate(mut self, key: &str, value: Json) -> Self {
        self.annotations.set(key, value);
        self
    }

    pub fn mandatory(self) -> Self {
        self.annotate(annotations::MANDATORY, Json::Bool(true))
    }

    pub fn nullable(self) -> Self {
        self.annotate(annotations::NULLABLE, Json::Bool(true))
    }

    pub fn abstract_property(self) -> Self {
        self.annotate(annotations::ABSTRACT, Json::Bool(true))
    }

    pub fn default_value(self, literal: Json) -> Self {
        self.annotate(annotations::DEFAULT, literal)
    }

    pub fn default_provider(self, name: &str) -> Self {
        self.annotate(annotations::DEFAULT_PROVIDER, Json::String(name.into()))
    }

    pub fn format(self, name: &str) -> Self {
        self.annotate(annotations::FORMAT, Json::String(name.into()))
    }

    pub fn binding(self, name: &str) -> Self {
        self.annotate(annotations::BINDING, Json::String(name.into()))
    }

    pub fn derived(self, function: &str) -> Self {
        self.annotate(annotations::DERIVED, Json::String(function.into()))
    }

    /// Canonical name of the key property of this collection's elements.
    pub fn keyed_by(self, key_property: &str) -> Self {
        self.annotate(annotations::KEY, Json::String(key_property.into()))
    }

    pub fn entry_tag(self, tag: &str) -> Self {
        self.annotate(annotations::ENTRY_TAG, Json::String(tag.into()))
    }
}

/// A declared configuration shape.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeSpec {
    pub name: String,
    pub supertypes: Vec<String>,
    pub is_abstract: bool,
    pub accessors: Vec<AccessorSpec>,
}

impl ShapeSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            supertypes: Vec::new(),
            is_abstract: false,
            accessors: Vec::new(),
        }
    }

    /// A polymorphic configuration shape: carries the implementation
    /// selector property consumed by the instantiation factory.
    pub fn polymorphic(name: impl Into<String>) -> Self {
        Self::new(name).accessor(AccessorSpec::getter("getClass", ValueType::Text))
    }

    pub fn extends(mut self, supertype: impl Into<String>) -> Self {
        self.supertypes.push(supertype.into());
        self
    }

    pub fn abstract_shape(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn accessor(mut self, accessor: AccessorSpec) -> Self {
        self.accessors.push(accessor);
        self
    }

    /// Local accessors contributing to the given canonical property name.
    pub fn accessors_for(&self, property: &str) -> impl Iterator<Item = &AccessorSpec> {
        self.accessors
            .iter()
            .filter(move |a| a.property_name() == property)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accessors_group_by_canonical_name() {
        let shape = ShapeSpec::new("Server")
            .accessor(AccessorSpec::getter("getPort", ValueType::Int))
            .accessor(AccessorSpec::setter("setPort", ValueType::Int))
            .accessor(AccessorSpec::getter("getHost", ValueType::Text));

        assert_eq!(shape.accessors_for("port").count(), 2);
        assert_eq!(shape.accessors_for("host").count(), 1);
    }

    #[test]
    fn builder_annotations_land_in_the_set() {
        let a = AccessorSpec::getter("getLimit", ValueType::Int)
            .mandatory()
            .default_value(json!(10));
        assert!(a.annotations.flag(crate::annotations::MANDATORY));
        assert_eq!(a.annotations.get(crate::annotations::DEFAULT), Some(&json!(10)));
    }
}
