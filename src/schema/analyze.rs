//! Descriptor analysis.
//!
//! Turns a registered [`ShapeSpec`](super::ShapeSpec) and its supertype
//! descriptors into one frozen [`Descriptor`](super::Descriptor): accessor
//! pairing, inheritance merge with common-root checking, annotation
//! resolution, default and format wiring, abstract enforcement and indexed
//! accessor validation.

use super::descriptor::Descriptor;
use super::names;
use super::property::{DerivedProperty, PropertyDescriptor, PropertyIdentifier};
use super::registry::SchemaRegistry;
use super::spec::{AccessorRole, AccessorSpec, ShapeSpec};
use crate::annotations::{self, Annotations};
use crate::error::AnalysisError;
use crate::value::{ResolvedDefault, ValueType, format_for_type, value_from_json};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::debug;

/// Local declarations contributing to one canonical property name.
#[derive(Default)]
struct LocalDecl<'a> {
    getters: Vec<&'a AccessorSpec>,
    setters: Vec<&'a AccessorSpec>,
}

pub(crate) fn analyze(registry: &SchemaRegistry, shape: &str) -> Result<Descriptor, AnalysisError> {
    let spec = registry
        .spec(shape)
        .ok_or_else(|| AnalysisError::UnknownShape(shape.to_string()))?;

    let mut supers = Vec::with_capacity(spec.supertypes.len());
    for super_name in &spec.supertypes {
        supers.push(registry.descriptor(super_name)?);
    }

    let mut ancestors: BTreeSet<String> = BTreeSet::new();
    ancestors.insert(spec.name.clone());
    for sup in &supers {
        ancestors.extend(sup.ancestors.iter().cloned());
    }

    let (local_order, locals) = group_local_accessors(&spec)?;

    // Property order: inherited properties in supertype order, then new
    // local declarations in declaration order.
    let mut order: Vec<String> = Vec::new();
    let mut seen: BTreeSet<String> = BTreeSet::new();
    for sup in &supers {
        for prop in sup.properties() {
            if seen.insert(prop.name().to_string()) {
                order.push(prop.name().to_string());
            }
        }
    }
    for name in &local_order {
        if seen.insert(name.clone()) {
            order.push(name.clone());
        }
    }

    let mut properties: Vec<Arc<PropertyDescriptor>> = Vec::with_capacity(order.len());
    let mut by_name: HashMap<String, usize> = HashMap::with_capacity(order.len());
    for (index, prop_name) in order.iter().enumerate() {
        let local = locals.get(prop_name.as_str());
        let inherited: Vec<&Arc<PropertyDescriptor>> = supers
            .iter()
            .filter_map(|sup| sup.property(prop_name))
            .collect();
        let property = build_property(registry, &spec, prop_name, index, local, &inherited)?;
        by_name.insert(prop_name.clone(), index);
        properties.push(Arc::new(property));
    }

    validate_indexed_accessors(registry, &spec, &properties, &by_name)?;

    if spec.is_abstract {
        if !properties.iter().any(|p| p.is_abstract()) {
            return Err(AnalysisError::AbstractWithoutAbstractProperty(
                spec.name.clone(),
            ));
        }
    } else if let Some(open) = properties.iter().find(|p| p.is_abstract()) {
        return Err(AnalysisError::UnresolvedAbstractProperty {
            shape: spec.name.clone(),
            property: open.name().to_string(),
            declaring: open.identifier().shape.clone(),
        });
    }

    debug!(shape = %spec.name, properties = properties.len(), "analyzed shape");

    Ok(Descriptor {
        name: spec.name.clone(),
        supertypes: spec.supertypes.clone(),
        ancestors,
        is_abstract: spec.is_abstract,
        properties,
        by_name,
    })
}

fn group_local_accessors(
    spec: &ShapeSpec,
) -> Result<(Vec<String>, HashMap<String, LocalDecl<'_>>), AnalysisError> {
    let mut order: Vec<String> = Vec::new();
    let mut locals: HashMap<String, LocalDecl<'_>> = HashMap::new();
    for accessor in &spec.accessors {
        if accessor.role == AccessorRole::IndexedGetter {
            continue;
        }
        let name = accessor.property_name();
        if !locals.contains_key(&name) {
            order.push(name.clone());
        }
        let decl = locals.entry(name).or_default();
        match accessor.role {
            AccessorRole::Getter => decl.getters.push(accessor),
            AccessorRole::Setter => decl.setters.push(accessor),
            AccessorRole::IndexedGetter => unreachable!(),
        }
    }
    Ok((order, locals))
}

fn build_property(
    registry: &SchemaRegistry,
    spec: &ShapeSpec,
    prop_name: &str,
    index: usize,
    local: Option<&LocalDecl<'_>>,
    inherited: &[&Arc<PropertyDescriptor>],
) -> Result<PropertyDescriptor, AnalysisError> {
    check_common_root(spec, prop_name, inherited)?;

    let local_getter = local.and_then(|l| l.getters.first().copied());
    let local_setters = local.map(|l| l.setters.as_slice()).unwrap_or(&[]);

    if local_getter.is_none() && !local_setters.is_empty() && inherited.is_empty() {
        return Err(AnalysisError::SetterWithoutGetter {
            shape: spec.name.clone(),
            accessor: local_setters[0].raw_name.clone(),
        });
    }

    // Second local getter for the same canonical name must agree on type.
    if let Some(l) = local {
        for extra in l.getters.iter().skip(1) {
            if extra.value_type != l.getters[0].value_type {
                return Err(AnalysisError::IncompatibleRedeclaration {
                    shape: spec.name.clone(),
                    property: prop_name.to_string(),
                    inherited: l.getters[0].value_type.to_string(),
                    declared: extra.value_type.to_string(),
                });
            }
        }
    }

    let inherited_type = effective_inherited_type(registry, spec, prop_name, inherited)?;

    let value_type = match (local_getter, &inherited_type) {
        (Some(getter), Some(inherited_ty)) => {
            if !assignable(registry, inherited_ty, &getter.value_type) {
                return Err(AnalysisError::IncompatibleRedeclaration {
                    shape: spec.name.clone(),
                    property: prop_name.to_string(),
                    inherited: inherited_ty.to_string(),
                    declared: getter.value_type.to_string(),
                });
            }
            getter.value_type.clone()
        }
        (Some(getter), None) => getter.value_type.clone(),
        (None, Some(inherited_ty)) => inherited_ty.clone(),
        (None, None) => unreachable!("property without declaration"),
    };

    for setter in local_setters {
        if setter.value_type != value_type {
            return Err(AnalysisError::IncompatibleRedeclaration {
                shape: spec.name.clone(),
                property: prop_name.to_string(),
                inherited: value_type.to_string(),
                declared: setter.value_type.to_string(),
            });
        }
    }

    // Local annotations win; absent keys come from the nearest ancestor in
    // supertype order.
    let mut local_ann = Annotations::new();
    if let Some(l) = local {
        for accessor in l.getters.iter().chain(l.setters.iter()) {
            for (key, value) in accessor.annotations.iter() {
                local_ann.set(key, value.clone());
            }
        }
    }
    let locally_declared = local_getter.is_some();
    let locally_overridden = locally_declared
        && (!local_ann.is_empty()
            || inherited_type
                .as_ref()
                .is_some_and(|ty| *ty != value_type));

    let mut merged = local_ann.clone();
    for sup in inherited {
        merged.inherit_from(sup.annotations());
    }

    // A concrete local redeclaration discharges an inherited abstract
    // marker; it must not leak to subshapes through the merged set.
    let is_abstract = if locally_declared {
        local_ann.flag(annotations::ABSTRACT)
    } else {
        merged.flag(annotations::ABSTRACT)
    };
    if !is_abstract {
        merged.remove(annotations::ABSTRACT);
    }

    let root_shape = match inherited.first() {
        Some(sup) => sup.root_shape().to_string(),
        None => spec.name.clone(),
    };
    let identifier = match inherited.first() {
        Some(sup) if !locally_overridden => sup.identifier().clone(),
        _ => PropertyIdentifier {
            shape: spec.name.clone(),
            name: prop_name.to_string(),
        },
    };

    let has_setter = !local_setters.is_empty() || inherited.iter().any(|p| p.has_setter());
    let mandatory = merged.flag(annotations::MANDATORY);
    let nullable = merged.flag(annotations::NULLABLE);

    let derived = match merged.get_str(annotations::DERIVED) {
        Some(function) => Some(DerivedProperty {
            function: function.to_string(),
            compute: registry.derived_fn(function).ok_or_else(|| {
                AnalysisError::UnknownDerivedFunction {
                    shape: spec.name.clone(),
                    property: prop_name.to_string(),
                    name: function.to_string(),
                }
            })?,
        }),
        None => None,
    };

    let format = match merged.get_str(annotations::FORMAT) {
        Some(format_name) => {
            let format =
                registry
                    .format(format_name)
                    .ok_or_else(|| AnalysisError::UnknownFormat {
                        shape: spec.name.clone(),
                        property: prop_name.to_string(),
                        name: format_name.to_string(),
                    })?;
            // The format must accept every legal property value, otherwise
            // values would not survive a render/parse round-trip.
            if !assignable(registry, &format.value_type(), &value_type) {
                return Err(AnalysisError::UnformattableProperty {
                    shape: spec.name.clone(),
                    property: prop_name.to_string(),
                    format: format_name.to_string(),
                });
            }
            Some(format)
        }
        None => format_for_type(&value_type),
    };

    let binding = match merged.get_str(annotations::BINDING) {
        Some(binding_name) => Some(registry.binding(binding_name).ok_or_else(|| {
            AnalysisError::UnknownBinding {
                shape: spec.name.clone(),
                property: prop_name.to_string(),
                name: binding_name.to_string(),
            }
        })?),
        None => None,
    };

    let (key_property, entry_tag) = if value_type.is_collection() {
        let key = merged.get_str(annotations::KEY).map(str::to_string);
        if let (Some(key_name), Some(element_shape)) = (&key, element_shape_of(&value_type)) {
            if registry.find_getter_spec(element_shape, key_name).is_none() {
                return Err(AnalysisError::UnknownKeyProperty {
                    shape: spec.name.clone(),
                    property: prop_name.to_string(),
                    key: key_name.clone(),
                    element: element_shape.to_string(),
                });
            }
        }
        let tag = merged
            .get_str(annotations::ENTRY_TAG)
            .map(str::to_string)
            .unwrap_or_else(|| names::entry_tag(prop_name));
        (key, Some(tag))
    } else {
        (None, None)
    };

    let default = resolve_default(registry, spec, prop_name, &identifier, &merged, &value_type)?;

    Ok(PropertyDescriptor {
        name: prop_name.to_string(),
        index,
        value_type,
        mandatory,
        nullable,
        has_setter,
        is_abstract,
        annotations: merged,
        default,
        format,
        binding,
        derived,
        key_property,
        entry_tag,
        root_shape,
        identifier,
    })
}

fn check_common_root(
    spec: &ShapeSpec,
    prop_name: &str,
    inherited: &[&Arc<PropertyDescriptor>],
) -> Result<(), AnalysisError> {
    let mut roots: Vec<&str> = Vec::new();
    for sup in inherited {
        if !roots.contains(&sup.root_shape()) {
            roots.push(sup.root_shape());
        }
    }
    if roots.len() > 1 {
        return Err(AnalysisError::NoCommonRoot {
            shape: spec.name.clone(),
            property: prop_name.to_string(),
            first: roots[0].to_string(),
            second: roots[1].to_string(),
        });
    }
    Ok(())
}

/// The most specific type among the inherited declarations. Incomparable
/// inherited types are a redeclaration conflict.
fn effective_inherited_type(
    registry: &SchemaRegistry,
    spec: &ShapeSpec,
    prop_name: &str,
    inherited: &[&Arc<PropertyDescriptor>],
) -> Result<Option<ValueType>, AnalysisError> {
    let mut effective: Option<&ValueType> = None;
    for sup in inherited {
        let ty = sup.value_type();
        match effective {
            None => effective = Some(ty),
            Some(current) => {
                if assignable(registry, current, ty) {
                    effective = Some(ty);
                } else if !assignable(registry, ty, current) {
                    return Err(AnalysisError::IncompatibleRedeclaration {
                        shape: spec.name.clone(),
                        property: prop_name.to_string(),
                        inherited: current.to_string(),
                        declared: ty.to_string(),
                    });
                }
            }
        }
    }
    Ok(effective.cloned())
}

fn resolve_default(
    registry: &SchemaRegistry,
    spec: &ShapeSpec,
    prop_name: &str,
    identifier: &PropertyIdentifier,
    merged: &Annotations,
    value_type: &ValueType,
) -> Result<ResolvedDefault, AnalysisError> {
    if let Some(literal) = merged.get(annotations::DEFAULT) {
        let value = value_from_json(literal, value_type).ok_or_else(|| {
            AnalysisError::IllegalDefault {
                shape: spec.name.clone(),
                property: prop_name.to_string(),
                literal: literal.to_string(),
            }
        })?;
        return Ok(ResolvedDefault::Value(value));
    }

    if let Some(literal) = registry.default_override(&identifier.to_string()) {
        let value = value_from_json(&literal, value_type).ok_or_else(|| {
            AnalysisError::IllegalDefault {
                shape: spec.name.clone(),
                property: prop_name.to_string(),
                literal: literal.to_string(),
            }
        })?;
        return Ok(ResolvedDefault::Value(value));
    }

    if let Some(provider_name) = merged.get_str(annotations::DEFAULT_PROVIDER) {
        let provider = registry.default_provider(provider_name).ok_or_else(|| {
            AnalysisError::UnknownDefaultProvider {
                shape: spec.name.clone(),
                property: prop_name.to_string(),
                name: provider_name.to_string(),
            }
        })?;
        return Ok(ResolvedDefault::Provider(provider));
    }

    Ok(ResolvedDefault::Intrinsic)
}

fn validate_indexed_accessors(
    registry: &SchemaRegistry,
    spec: &ShapeSpec,
    properties: &[Arc<PropertyDescriptor>],
    by_name: &HashMap<String, usize>,
) -> Result<(), AnalysisError> {
    for accessor in &spec.accessors {
        if accessor.role != AccessorRole::IndexedGetter {
            continue;
        }
        let error = |problem: String| AnalysisError::BadIndexedAccessor {
            shape: spec.name.clone(),
            accessor: accessor.raw_name.clone(),
            problem,
        };

        let sibling_name = accessor
            .annotations
            .get_str(annotations::INDEXED)
            .ok_or_else(|| error("names no sibling collection".to_string()))?;
        let sibling = by_name
            .get(sibling_name)
            .map(|&i| &properties[i])
            .ok_or_else(|| error(format!("sibling collection '{sibling_name}' does not exist")))?;

        let element_type = sibling
            .value_type()
            .element_type()
            .ok_or_else(|| error(format!("sibling '{sibling_name}' is not a collection")))?;

        let key_name = sibling
            .key_property()
            .ok_or_else(|| error(format!("sibling '{sibling_name}' declares no key property")))?;

        let param_type = accessor
            .param_type
            .as_ref()
            .ok_or_else(|| error("declares no key parameter".to_string()))?;

        let key_type = element_shape_of(sibling.value_type())
            .and_then(|shape| registry.find_getter_spec(shape, key_name))
            .map(|getter| getter.value_type)
            .ok_or_else(|| error(format!("key property '{key_name}' cannot be resolved")))?;

        if *param_type != key_type {
            return Err(error(format!(
                "parameter type {param_type} does not match key type {key_type}"
            )));
        }

        if !assignable(registry, &accessor.value_type, element_type) {
            return Err(error(format!(
                "return type {} is not assignable from element type {element_type}",
                accessor.value_type
            )));
        }
    }
    Ok(())
}

fn element_shape_of(ty: &ValueType) -> Option<&str> {
    match ty {
        ValueType::Item(shape) => Some(shape),
        ValueType::Collection(_, element) => element_shape_of(element),
        _ => None,
    }
}

/// Whether a value of type `source` may be stored where `target` is
/// declared.
pub(crate) fn assignable(registry: &SchemaRegistry, target: &ValueType, source: &ValueType) -> bool {
    match (target, source) {
        (ValueType::Item(sup), ValueType::Item(sub)) => {
            sup == sub || registry.is_subshape(sub, sup)
        }
        (ValueType::Collection(k1, e1), ValueType::Collection(k2, e2)) => {
            k1 == k2 && assignable(registry, e1, e2)
        }
        (ValueType::Enum(a), ValueType::Enum(b)) => a.name == b.name,
        _ => target == source,
    }
}
