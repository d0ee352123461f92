//! Per-property text codecs.
//!
//! A [`Format`] owns the text grammar of a single property: parsing a
//! document literal into a [`Value`], rendering a value back to text, and
//! deciding which runtime values are legal for the property at all.

use super::{EnumType, Value, ValueType};
use crate::error::FormatError;
use std::fmt;
use std::sync::Arc;

/// Text codec for a single property.
///
/// The accepted value type must cover the whole declared property type;
/// analysis rejects formats that only accept a strict subtype, since legal
/// values would then not survive a render/parse round-trip.
pub trait Format: fmt::Debug + Send + Sync {
    /// The value type this format parses to and renders from.
    fn value_type(&self) -> ValueType;

    /// Parse a document literal. `property` is only used for error context.
    fn parse(&self, property: &str, text: &str) -> Result<Value, FormatError>;

    /// Render a legal value back to its document literal.
    fn render(&self, value: &Value) -> String;

    /// Whether a runtime value is acceptable for a property using this
    /// format. The default checks structural conformance to
    /// [`value_type`](Format::value_type).
    fn is_legal(&self, value: &Value) -> bool {
        value.conforms_to(&self.value_type())
    }
}

/// `true` / `false`, nothing else.
#[derive(Debug)]
pub struct BoolFormat;

impl Format for BoolFormat {
    fn value_type(&self) -> ValueType {
        ValueType::Bool
    }

    fn parse(&self, property: &str, text: &str) -> Result<Value, FormatError> {
        match text {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(FormatError::new(property, text, "expected 'true' or 'false'")),
        }
    }

    fn render(&self, value: &Value) -> String {
        match value {
            Value::Bool(b) => b.to_string(),
            other => other.to_string(),
        }
    }
}

/// Signed decimal integers.
#[derive(Debug)]
pub struct IntFormat;

impl Format for IntFormat {
    fn value_type(&self) -> ValueType {
        ValueType::Int
    }

    fn parse(&self, property: &str, text: &str) -> Result<Value, FormatError> {
        text.trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|e| FormatError::new(property, text, e.to_string()))
    }

    fn render(&self, value: &Value) -> String {
        match value {
            Value::Int(i) => i.to_string(),
            other => other.to_string(),
        }
    }
}

/// Decimal floating point numbers.
#[derive(Debug)]
pub struct FloatFormat;

impl Format for FloatFormat {
    fn value_type(&self) -> ValueType {
        ValueType::Float
    }

    fn parse(&self, property: &str, text: &str) -> Result<Value, FormatError> {
        text.trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|e| FormatError::new(property, text, e.to_string()))
    }

    fn render(&self, value: &Value) -> String {
        match value {
            Value::Float(x) => x.to_string(),
            other => other.to_string(),
        }
    }
}

/// Verbatim strings.
#[derive(Debug)]
pub struct TextFormat;

impl Format for TextFormat {
    fn value_type(&self) -> ValueType {
        ValueType::Text
    }

    fn parse(&self, _property: &str, text: &str) -> Result<Value, FormatError> {
        Ok(Value::text(text))
    }

    fn render(&self, value: &Value) -> String {
        match value {
            Value::Text(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// One literal out of a fixed enumeration.
#[derive(Debug)]
pub struct EnumFormat {
    ty: Arc<EnumType>,
}

impl EnumFormat {
    pub fn new(ty: Arc<EnumType>) -> Self {
        Self { ty }
    }
}

impl Format for EnumFormat {
    fn value_type(&self) -> ValueType {
        ValueType::Enum(self.ty.clone())
    }

    fn parse(&self, property: &str, text: &str) -> Result<Value, FormatError> {
        if self.ty.contains(text) {
            Ok(Value::text(text))
        } else {
            Err(FormatError::new(
                property,
                text,
                format!(
                    "expected one of: {}",
                    self.ty.literals.join(", ")
                ),
            ))
        }
    }

    fn render(&self, value: &Value) -> String {
        match value {
            Value::Text(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Elements joined by `,`.
///
/// The delimiter is not escaped: an element containing `,` does not survive
/// a round-trip. Properties whose elements may contain the delimiter must
/// use a different format or a structured binding instead.
#[derive(Debug)]
pub struct CommaSeparatedFormat {
    element: Arc<dyn Format>,
}

impl CommaSeparatedFormat {
    pub fn new(element: Arc<dyn Format>) -> Self {
        Self { element }
    }

    /// Comma-separated plain strings.
    pub fn of_text() -> Self {
        Self::new(Arc::new(TextFormat))
    }
}

impl Format for CommaSeparatedFormat {
    fn value_type(&self) -> ValueType {
        ValueType::list_of(self.element.value_type())
    }

    fn parse(&self, property: &str, text: &str) -> Result<Value, FormatError> {
        if text.is_empty() {
            return Ok(Value::Collection(Vec::new()));
        }
        let mut elements = Vec::new();
        for part in text.split(',') {
            elements.push(self.element.parse(property, part.trim())?);
        }
        Ok(Value::Collection(elements))
    }

    fn render(&self, value: &Value) -> String {
        match value {
            Value::Collection(elements) => elements
                .iter()
                .map(|e| self.element.render(e))
                .collect::<Vec<_>>()
                .join(","),
            other => other.to_string(),
        }
    }
}

/// The implicit format of a leaf type when the declaration names none.
/// Item- and collection-typed properties have no implicit text form.
pub fn format_for_type(ty: &ValueType) -> Option<Arc<dyn Format>> {
    match ty {
        ValueType::Bool => Some(Arc::new(BoolFormat)),
        ValueType::Int => Some(Arc::new(IntFormat)),
        ValueType::Float => Some(Arc::new(FloatFormat)),
        ValueType::Text => Some(Arc::new(TextFormat)),
        ValueType::Enum(e) => Some(Arc::new(EnumFormat::new(e.clone()))),
        ValueType::Item(_) | ValueType::Collection(..) => None,
    }
}
