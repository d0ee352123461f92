//! Runtime value model: typed values, value types and conformance.

mod binding;
mod defaults;
mod format;

pub use binding::{Binding, TaggedListBinding};
pub use defaults::{DefaultProviderFn, ResolvedDefault, value_from_json};
pub use format::{
    BoolFormat, CommaSeparatedFormat, EnumFormat, FloatFormat, Format, IntFormat, TextFormat,
    format_for_type,
};

use crate::item::Item;
use std::fmt;
use std::sync::Arc;

/// A named enumeration type with a fixed literal set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumType {
    pub name: String,
    pub literals: Vec<String>,
}

impl EnumType {
    pub fn new(name: impl Into<String>, literals: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            literals: literals.iter().map(|s| s.to_string()).collect(),
        })
    }

    pub fn contains(&self, literal: &str) -> bool {
        self.literals.iter().any(|l| l == literal)
    }
}

/// Kind of a collection-valued property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
    List,
    Array,
    Set,
    Map,
}

impl CollectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionKind::List => "list",
            CollectionKind::Array => "array",
            CollectionKind::Set => "set",
            CollectionKind::Map => "map",
        }
    }

    /// Ordered kinds keep document order and support position anchors.
    pub fn is_ordered(&self) -> bool {
        !matches!(self, CollectionKind::Map)
    }
}

/// Declared type of a property value.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueType {
    Bool,
    Int,
    Float,
    Text,
    Enum(Arc<EnumType>),
    /// Nested item of the named shape (or any subshape).
    Item(String),
    Collection(CollectionKind, Box<ValueType>),
}

impl ValueType {
    pub fn list_of(element: ValueType) -> Self {
        ValueType::Collection(CollectionKind::List, Box::new(element))
    }

    pub fn map_of(element: ValueType) -> Self {
        ValueType::Collection(CollectionKind::Map, Box::new(element))
    }

    pub fn item(shape: impl Into<String>) -> Self {
        ValueType::Item(shape.into())
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, ValueType::Collection(..))
    }

    pub fn element_type(&self) -> Option<&ValueType> {
        match self {
            ValueType::Collection(_, element) => Some(element),
            _ => None,
        }
    }

    /// The intrinsic zero value of this type: `0`, `false`, the empty
    /// string, the empty collection, the first enum literal. Item-typed
    /// properties start out null; nullability is enforced on explicit
    /// writes, not on the initial default.
    pub fn zero(&self) -> Value {
        match self {
            ValueType::Bool => Value::Bool(false),
            ValueType::Int => Value::Int(0),
            ValueType::Float => Value::Float(0.0),
            ValueType::Text => Value::Text(String::new()),
            ValueType::Enum(ty) => ty
                .literals
                .first()
                .map(|l| Value::Text(l.clone()))
                .unwrap_or(Value::None),
            ValueType::Item(_) => Value::None,
            ValueType::Collection(CollectionKind::Map, _) => Value::Map(Vec::new()),
            ValueType::Collection(..) => Value::Collection(Vec::new()),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Bool => write!(f, "bool"),
            ValueType::Int => write!(f, "int"),
            ValueType::Float => write!(f, "float"),
            ValueType::Text => write!(f, "string"),
            ValueType::Enum(ty) => write!(f, "enum {}", ty.name),
            ValueType::Item(shape) => write!(f, "item {}", shape),
            ValueType::Collection(kind, element) => write!(f, "{} of {}", kind.as_str(), element),
        }
    }
}

/// A stored property value.
///
/// Map entries keep insertion order; key lookup is by structural equality.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Explicit null.
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Strings and enum literals.
    Text(String),
    /// An owned nested item subtree.
    Item(Box<Item>),
    /// List, array or set contents.
    Collection(Vec<Value>),
    /// Ordered map contents.
    Map(Vec<(Value, Value)>),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn item(item: Item) -> Self {
        Value::Item(Box::new(item))
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn as_item(&self) -> Option<&Item> {
        match self {
            Value::Item(item) => Some(item),
            _ => None,
        }
    }

    pub fn as_collection(&self) -> Option<&[Value]> {
        match self {
            Value::Collection(elements) => Some(elements),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&[(Value, Value)]> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Structural conformance to a declared type. `None` conforms to every
    /// type; nullability is a separate property-level check.
    pub fn conforms_to(&self, ty: &ValueType) -> bool {
        match (self, ty) {
            (Value::None, _) => true,
            (Value::Bool(_), ValueType::Bool) => true,
            (Value::Int(_), ValueType::Int) => true,
            (Value::Float(_), ValueType::Float) => true,
            (Value::Text(_), ValueType::Text) => true,
            (Value::Text(literal), ValueType::Enum(e)) => e.contains(literal),
            (Value::Item(item), ValueType::Item(shape)) => item.descriptor().is_kind_of(shape),
            (Value::Collection(elements), ValueType::Collection(kind, element))
                if kind.is_ordered() =>
            {
                elements.iter().all(|e| e.conforms_to(element))
            }
            (Value::Map(entries), ValueType::Collection(CollectionKind::Map, element)) => {
                entries.iter().all(|(_, v)| v.conforms_to(element))
            }
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => write!(f, "'{}'", s),
            Value::Item(item) => write!(f, "<{}>", item.descriptor().name()),
            Value::Collection(elements) => write!(f, "[{} elements]", elements.len()),
            Value::Map(entries) => write!(f, "{{{} entries}}", entries.len()),
        }
    }
}
