//! Runtime configuration instances.
//!
//! An [`Item`] holds one value slot per property of its descriptor, tracks
//! which slots were explicitly set, and notifies listeners of observable
//! changes. Access is single-threaded-cooperative: callers serialize
//! mutation of one item.

mod listener;

pub use listener::{ChangeEvent, ListenerFn, ListenerHandle};

use crate::error::{AnalysisError, StoreError};
use crate::schema::{Descriptor, PropertyDescriptor, SchemaRegistry};
use crate::value::Value;
use listener::Listeners;
use std::sync::Arc;

#[derive(Debug, Clone)]
struct Slot {
    /// Explicitly stored value; `None` means unset.
    value: Option<Value>,
    /// Per-item resolved default. Dynamic providers run once, here.
    default: Value,
}

/// A runtime instance of a configuration shape.
#[derive(Debug)]
pub struct Item {
    descriptor: Arc<Descriptor>,
    slots: Vec<Slot>,
    listeners: Listeners,
}

impl Item {
    /// Create an instance with every property at its resolved default and
    /// no property marked as set. Abstract shapes cannot be instantiated.
    pub fn new(descriptor: Arc<Descriptor>) -> Result<Self, AnalysisError> {
        if descriptor.is_abstract() {
            return Err(AnalysisError::AbstractInstantiation(
                descriptor.name().to_string(),
            ));
        }
        let slots = descriptor
            .properties()
            .map(|p| Slot {
                value: None,
                default: p.default().materialize(p.value_type(), p.is_nullable()),
            })
            .collect();
        Ok(Self {
            descriptor,
            slots,
            listeners: Listeners::default(),
        })
    }

    pub fn descriptor(&self) -> &Arc<Descriptor> {
        &self.descriptor
    }

    fn property(&self, name: &str) -> Result<Arc<PropertyDescriptor>, StoreError> {
        self.descriptor
            .property(name)
            .cloned()
            .ok_or_else(|| StoreError::NoSuchProperty {
                shape: self.descriptor.name().to_string(),
                property: name.to_string(),
            })
    }

    /// The observable value: stored if set, else the resolved default.
    /// Derived properties are computed from the item on every call.
    pub fn get(&self, name: &str) -> Result<Value, StoreError> {
        let property = self.property(name)?;
        if let Some(derived) = property.derived() {
            return Ok((derived.compute)(self));
        }
        let slot = &self.slots[property.index()];
        Ok(slot.value.clone().unwrap_or_else(|| slot.default.clone()))
    }

    /// Whether the property was explicitly set. Always false for derived
    /// properties.
    pub fn value_set(&self, name: &str) -> Result<bool, StoreError> {
        let property = self.property(name)?;
        if property.is_derived() {
            return Ok(false);
        }
        Ok(self.slots[property.index()].value.is_some())
    }

    /// Validate and store a value, marking the property as set. Fires one
    /// change notification iff the observable value changed.
    pub fn set(&mut self, name: &str, value: Value) -> Result<(), StoreError> {
        self.update(name, value).map(|_| ())
    }

    /// Like [`set`](Item::set), returning the previous observable value.
    pub fn update(&mut self, name: &str, value: Value) -> Result<Value, StoreError> {
        let property = self.property(name)?;
        if property.is_derived() {
            return Err(StoreError::DerivedProperty {
                property: name.to_string(),
            });
        }
        self.check_legal(&property, &value)?;

        let index = property.index();
        let old = self.slots[index]
            .value
            .clone()
            .unwrap_or_else(|| self.slots[index].default.clone());
        self.slots[index].value = Some(value.clone());
        if old != value {
            self.fire(&property, index, old.clone(), value);
        }
        Ok(old)
    }

    fn check_legal(&self, property: &PropertyDescriptor, value: &Value) -> Result<(), StoreError> {
        if value.is_none() {
            if !property.is_nullable() {
                return Err(StoreError::NotNullable {
                    property: property.name().to_string(),
                });
            }
            return Ok(());
        }
        // The format owns value legality where one is declared; a property
        // narrowed by an overriding descriptor checks against the narrowed
        // type, rejecting values the base declaration would accept.
        if let Some(format) = property.format() {
            if !format.is_legal(value) {
                return Err(StoreError::IllegalValue {
                    property: property.name().to_string(),
                    value: value.to_string(),
                    reason: "rejected by the property format".to_string(),
                });
            }
        } else if !value.conforms_to(property.value_type()) {
            return Err(StoreError::IllegalValue {
                property: property.name().to_string(),
                value: value.to_string(),
                reason: format!("expected {}", property.value_type()),
            });
        }
        Ok(())
    }

    /// Clear the set bit and restore the default. Fires one change
    /// notification when the observable value moves back; resetting an
    /// already-default property is a no-op without notification.
    pub fn reset(&mut self, name: &str) -> Result<(), StoreError> {
        let property = self.property(name)?;
        if property.is_derived() {
            return Err(StoreError::DerivedProperty {
                property: name.to_string(),
            });
        }
        let index = property.index();
        let Some(old) = self.slots[index].value.take() else {
            return Ok(());
        };
        let default = self.slots[index].default.clone();
        if old != default {
            self.fire(&property, index, old, default);
        }
        Ok(())
    }

    fn fire(&self, property: &PropertyDescriptor, index: usize, old: Value, new: Value) {
        if self.listeners.is_empty() {
            return;
        }
        let event = ChangeEvent {
            shape: self.descriptor.name().to_string(),
            property: property.name().to_string(),
            old,
            new,
        };
        self.listeners.notify(index, &event);
    }

    /// Observe every property of this item.
    pub fn add_listener(&mut self, callback: ListenerFn) -> ListenerHandle {
        self.listeners.register(None, callback)
    }

    /// Observe one property.
    pub fn add_property_listener(
        &mut self,
        name: &str,
        callback: ListenerFn,
    ) -> Result<ListenerHandle, StoreError> {
        let property = self.property(name)?;
        Ok(self.listeners.register(Some(property.index()), callback))
    }

    pub fn remove_listener(&mut self, handle: ListenerHandle) -> bool {
        self.listeners.remove(handle)
    }

    /// Find a keyed collection element by its key value. The runtime
    /// counterpart of a declared indexed accessor.
    pub fn lookup(&self, collection: &str, key: &Value) -> Result<Option<Value>, StoreError> {
        let property = self.property(collection)?;
        let key_property = property.key_property().ok_or_else(|| {
            StoreError::IllegalValue {
                property: collection.to_string(),
                value: key.to_string(),
                reason: "property declares no key".to_string(),
            }
        })?;
        match self.get(collection)? {
            Value::Collection(elements) => {
                for element in elements {
                    if let Value::Item(item) = &element {
                        if item.get(key_property).ok().as_ref() == Some(key) {
                            return Ok(Some(element));
                        }
                    }
                }
                Ok(None)
            }
            Value::Map(entries) => Ok(entries
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())),
            _ => Ok(None),
        }
    }

    /// Names of mandatory properties that were never set. Consulted by the
    /// document reader when a read completes.
    pub fn unset_mandatory(&self) -> Vec<String> {
        self.descriptor
            .properties()
            .filter(|p| p.is_mandatory() && self.slots[p.index()].value.is_none())
            .map(|p| p.name().to_string())
            .collect()
    }
}

/// Deep copy of the value tree. Listener registrations are not copied.
impl Clone for Item {
    fn clone(&self) -> Self {
        Self {
            descriptor: self.descriptor.clone(),
            slots: self.slots.clone(),
            listeners: Listeners::default(),
        }
    }
}

/// Structural equality: same descriptor and equal observable value for
/// every property, set or defaulted.
impl PartialEq for Item {
    fn eq(&self, other: &Self) -> bool {
        if self.descriptor.name() != other.descriptor.name() {
            return false;
        }
        self.descriptor.properties().all(|p| {
            match (self.get(p.name()), other.get(p.name())) {
                (Ok(a), Ok(b)) => a == b,
                _ => false,
            }
        })
    }
}

impl SchemaRegistry {
    /// Create a new instance of a declared shape.
    pub fn new_instance(&self, shape: &str) -> Result<Item, AnalysisError> {
        Item::new(self.descriptor(shape)?)
    }
}
