//! Default-value resolution.
//!
//! The chain, highest priority first: the nearest declaration's literal
//! default annotation, a process-level override baked into the descriptor,
//! a dynamic provider invoked once per new item, and finally the intrinsic
//! zero of the property type.

use super::{CollectionKind, Value, ValueType};
use serde_json::Value as Json;
use std::fmt;
use std::sync::Arc;

/// Dynamic default producer, registered by name and invoked once per new
/// item. The produced value is stable for that item afterwards.
pub type DefaultProviderFn = Arc<dyn Fn() -> Value + Send + Sync>;

/// The default source a property descriptor resolved to at analysis time.
#[derive(Clone)]
pub enum ResolvedDefault {
    /// A literal default annotation or a process-level override, already
    /// coerced to the property type.
    Value(Value),
    /// A registered dynamic provider.
    Provider(DefaultProviderFn),
    /// No declared default; the type's zero value applies.
    Intrinsic,
}

impl ResolvedDefault {
    /// Produce the concrete default for one new item.
    pub fn materialize(&self, ty: &ValueType, nullable: bool) -> Value {
        match self {
            ResolvedDefault::Value(value) => value.clone(),
            ResolvedDefault::Provider(provider) => provider(),
            ResolvedDefault::Intrinsic => {
                if nullable {
                    Value::None
                } else {
                    ty.zero()
                }
            }
        }
    }
}

impl fmt::Debug for ResolvedDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedDefault::Value(value) => write!(f, "Value({})", value),
            ResolvedDefault::Provider(_) => write!(f, "Provider(..)"),
            ResolvedDefault::Intrinsic => write!(f, "Intrinsic"),
        }
    }
}

/// Coerce a JSON literal to a property type. `None` if the literal does not
/// fit the type; the caller turns that into an analysis error naming the
/// offending literal.
pub fn value_from_json(json: &Json, ty: &ValueType) -> Option<Value> {
    match (json, ty) {
        (Json::Null, _) => Some(Value::None),
        (Json::Bool(b), ValueType::Bool) => Some(Value::Bool(*b)),
        (Json::Number(n), ValueType::Int) => n.as_i64().map(Value::Int),
        (Json::Number(n), ValueType::Float) => n.as_f64().map(Value::Float),
        (Json::String(s), ValueType::Text) => Some(Value::text(s.clone())),
        (Json::String(s), ValueType::Enum(e)) if e.contains(s) => Some(Value::text(s.clone())),
        (Json::Array(entries), ValueType::Collection(kind, element)) if kind.is_ordered() => {
            let mut values = Vec::with_capacity(entries.len());
            for entry in entries {
                values.push(value_from_json(entry, element)?);
            }
            Some(Value::Collection(values))
        }
        (Json::Array(_), ValueType::Collection(CollectionKind::Map, _)) => None,
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn intrinsic_default_is_null_only_when_nullable() {
        assert_eq!(
            ResolvedDefault::Intrinsic.materialize(&ValueType::Int, false),
            Value::Int(0)
        );
        assert_eq!(
            ResolvedDefault::Intrinsic.materialize(&ValueType::Int, true),
            Value::None
        );
    }

    #[test]
    fn literal_coercion_respects_types() {
        assert_eq!(
            value_from_json(&json!(42), &ValueType::Int),
            Some(Value::Int(42))
        );
        assert_eq!(value_from_json(&json!("x"), &ValueType::Int), None);
        assert_eq!(
            value_from_json(&json!(["a", "b"]), &ValueType::list_of(ValueType::Text)),
            Some(Value::Collection(vec![Value::text("a"), Value::text("b")]))
        );
    }

    #[test]
    fn provider_is_invoked_on_materialize() {
        let d = ResolvedDefault::Provider(Arc::new(|| Value::Int(7)));
        assert_eq!(d.materialize(&ValueType::Int, false), Value::Int(7));
    }
}
