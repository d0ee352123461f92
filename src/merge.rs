//! Layered merging for collection-valued properties.
//!
//! A document read applies N ordered layers to one collection property:
//! layer 0 is the base, layers 1..N-1 are overlays. Within a layer, entries
//! apply strictly in document order. Each entry carries an operation, an
//! identity key extracted through the property's key property, and, for
//! ordered collections, an optional position anchor.

use crate::error::MergeError;
use crate::item::Item;
use crate::value::Value;
use tracing::{trace, warn};

/// Entry operation. `add` is the default when a document names none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListOperation {
    Add,
    Update,
    Remove,
    AddOrUpdate,
}

impl ListOperation {
    pub fn parse(property: &str, token: &str) -> Result<Self, MergeError> {
        match token {
            "add" => Ok(ListOperation::Add),
            "update" => Ok(ListOperation::Update),
            "remove" => Ok(ListOperation::Remove),
            "addOrUpdate" => Ok(ListOperation::AddOrUpdate),
            _ => Err(MergeError::UnknownOperation {
                property: property.to_string(),
                token: token.to_string(),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ListOperation::Add => "add",
            ListOperation::Update => "update",
            ListOperation::Remove => "remove",
            ListOperation::AddOrUpdate => "addOrUpdate",
        }
    }
}

/// Position anchor of an add or a repositioning update. Defaults to `end`
/// for add-class operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Begin,
    End,
    Before,
    After,
}

impl Position {
    pub fn parse(property: &str, token: &str) -> Result<Self, MergeError> {
        match token {
            "begin" => Ok(Position::Begin),
            "end" => Ok(Position::End),
            "before" => Ok(Position::Before),
            "after" => Ok(Position::After),
            _ => Err(MergeError::UnknownPosition {
                property: property.to_string(),
                token: token.to_string(),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Position::Begin => "begin",
            Position::End => "end",
            Position::Before => "before",
            Position::After => "after",
        }
    }
}

/// One parsed layer entry for an ordered collection property.
#[derive(Debug, Clone)]
pub struct ListEntry {
    pub operation: ListOperation,
    /// `None` means the entry declared no anchor. Add-class operations then
    /// insert at the end; updates keep the matched element in place.
    pub position: Option<Position>,
    /// Reference key for `before`/`after` anchors.
    pub reference: Option<Value>,
    /// Identity key of the entry. Extracted from the payload's key
    /// property, or given explicitly for `remove`.
    pub key: Option<Value>,
    /// New element or update patch. For items, explicitly set properties
    /// mark the declared fields of an update. Absent for `remove`.
    pub payload: Option<Value>,
}

impl ListEntry {
    pub fn add(payload: Value, key: Option<Value>) -> Self {
        Self {
            operation: ListOperation::Add,
            position: None,
            reference: None,
            key,
            payload: Some(payload),
        }
    }

    pub fn at(mut self, position: Position, reference: Option<Value>) -> Self {
        self.position = Some(position);
        self.reference = reference;
        self
    }
}

/// Applies ordered layers of entries to one list-valued property.
///
/// Duplicate identity keys are permitted on `add`; `update`, `remove` and
/// `addOrUpdate`-as-update deterministically match the FIRST element with
/// the key in current assembled order, leaving later duplicates untouched.
pub struct ListMerger<'a> {
    property: &'a str,
    key_property: Option<&'a str>,
    elements: Vec<Value>,
}

impl<'a> ListMerger<'a> {
    pub fn new(property: &'a str, key_property: Option<&'a str>, base: Vec<Value>) -> Self {
        Self {
            property,
            key_property,
            elements: base,
        }
    }

    pub fn into_elements(self) -> Vec<Value> {
        self.elements
    }

    /// Identity key of an assembled element: the key property's observable
    /// value for items, the element itself for plain values.
    fn key_of(&self, element: &Value) -> Option<Value> {
        match (element, self.key_property) {
            (Value::Item(item), Some(key)) => item.get(key).ok(),
            (Value::Item(_), None) => None,
            (plain, _) => Some(plain.clone()),
        }
    }

    /// Index of the first element carrying `key`, in assembled order.
    fn find_first(&self, key: &Value) -> Option<usize> {
        self.elements
            .iter()
            .position(|e| self.key_of(e).as_ref() == Some(key))
    }

    fn missing_identity(&self, key: &Value, operation: ListOperation) -> MergeError {
        MergeError::MissingIdentity {
            property: self.property.to_string(),
            key: key.to_string(),
            operation: operation.as_str().to_string(),
        }
    }

    fn missing_key(&self) -> MergeError {
        MergeError::MissingKey {
            property: self.property.to_string(),
        }
    }

    /// Insertion index for an anchor, against the current elements.
    fn insertion_index(
        &self,
        position: Position,
        reference: Option<&Value>,
    ) -> Result<usize, MergeError> {
        match position {
            Position::Begin => Ok(0),
            Position::End => Ok(self.elements.len()),
            Position::Before | Position::After => {
                let reference = reference.ok_or_else(|| MergeError::MissingReference {
                    property: self.property.to_string(),
                    key: "<none>".to_string(),
                })?;
                let index = self.find_first(reference).ok_or_else(|| {
                    MergeError::MissingReference {
                        property: self.property.to_string(),
                        key: reference.to_string(),
                    }
                })?;
                Ok(match position {
                    Position::Before => index,
                    _ => index + 1,
                })
            }
        }
    }

    pub fn apply(&mut self, entry: ListEntry) -> Result<(), MergeError> {
        trace!(
            property = self.property,
            operation = entry.operation.as_str(),
            "applying list entry"
        );
        match entry.operation {
            ListOperation::Add => self.apply_add(entry),
            ListOperation::Update => self.apply_update(entry),
            ListOperation::Remove => self.apply_remove(entry),
            ListOperation::AddOrUpdate => {
                match &entry.key {
                    Some(key) if self.find_first(key).is_some() => self.apply_update(entry),
                    _ => self.apply_add(entry),
                }
            }
        }
    }

    fn apply_add(&mut self, entry: ListEntry) -> Result<(), MergeError> {
        let payload = entry.payload.ok_or_else(|| self.missing_key())?;
        if let Some(key) = &entry.key {
            if self.find_first(key).is_some() {
                warn!(property = self.property, key = %key, "duplicate key added");
            }
        }
        let index =
            self.insertion_index(entry.position.unwrap_or(Position::End), entry.reference.as_ref())?;
        self.elements.insert(index, payload);
        Ok(())
    }

    fn apply_update(&mut self, entry: ListEntry) -> Result<(), MergeError> {
        let key = entry.key.as_ref().ok_or_else(|| self.missing_key())?;
        let index = self
            .find_first(key)
            .ok_or_else(|| self.missing_identity(key, entry.operation))?;
        let payload = entry.payload.ok_or_else(|| self.missing_key())?;

        let updated = match (&self.elements[index], &payload) {
            (Value::Item(existing), Value::Item(patch)) => {
                // Declared fields merge onto a clone of the matched
                // element.
                let mut clone = existing.as_ref().clone();
                merge_declared_fields(self.property, key, &mut clone, patch)?;
                Value::Item(Box::new(clone))
            }
            (existing, new_value) => {
                if existing != new_value && entry.position.is_none() {
                    return Err(MergeError::NoNewPosition {
                        property: self.property.to_string(),
                        key: key.to_string(),
                    });
                }
                new_value.clone()
            }
        };

        match entry.position {
            None => {
                self.elements[index] = updated;
            }
            Some(position) => {
                self.elements.remove(index);
                let target = self.insertion_index(position, entry.reference.as_ref())?;
                self.elements.insert(target, updated);
            }
        }
        Ok(())
    }

    fn apply_remove(&mut self, entry: ListEntry) -> Result<(), MergeError> {
        let key = entry.key.as_ref().ok_or_else(|| self.missing_key())?;
        let index = self
            .find_first(key)
            .ok_or_else(|| self.missing_identity(key, ListOperation::Remove))?;
        self.elements.remove(index);
        Ok(())
    }
}

fn merge_declared_fields(
    property: &str,
    key: &Value,
    target: &mut Item,
    patch: &Item,
) -> Result<(), MergeError> {
    for prop in patch.descriptor().properties().map(|p| p.name().to_string()) {
        let declared = patch.value_set(&prop).unwrap_or(false);
        if !declared {
            continue;
        }
        let value = patch.get(&prop).map_err(|e| MergeError::UpdateFailed {
            property: property.to_string(),
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        target.set(&prop, value).map_err(|e| MergeError::UpdateFailed {
            property: property.to_string(),
            key: key.to_string(),
            reason: e.to_string(),
        })?;
    }
    Ok(())
}

/// Applies ordered layers of keyed entries to one map-valued property.
///
/// Maps have no positions; entries merge by key. Within one layer a key may
/// appear at most once.
pub struct MapMerger<'a> {
    property: &'a str,
    entries: Vec<(Value, Value)>,
    layer_keys: Vec<Value>,
}

impl<'a> MapMerger<'a> {
    pub fn new(property: &'a str, base: Vec<(Value, Value)>) -> Self {
        Self {
            property,
            entries: base,
            layer_keys: Vec::new(),
        }
    }

    pub fn into_entries(self) -> Vec<(Value, Value)> {
        self.entries
    }

    /// Start a new overlay; per-layer duplicate tracking resets.
    pub fn begin_layer(&mut self) {
        self.layer_keys.clear();
    }

    fn duplicate(&self, key: &Value) -> MergeError {
        MergeError::DuplicateKey {
            property: self.property.to_string(),
            key: key.to_string(),
        }
    }

    fn track_layer_key(&mut self, key: &Value) -> Result<(), MergeError> {
        if self.layer_keys.contains(key) {
            return Err(self.duplicate(key));
        }
        self.layer_keys.push(key.clone());
        Ok(())
    }

    fn position_of(&self, key: &Value) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k == key)
    }

    pub fn apply(
        &mut self,
        operation: ListOperation,
        key: Value,
        payload: Option<Value>,
    ) -> Result<(), MergeError> {
        match operation {
            ListOperation::Add => {
                self.track_layer_key(&key)?;
                if self.position_of(&key).is_some() {
                    return Err(self.duplicate(&key));
                }
                let payload = payload.ok_or_else(|| MergeError::MissingKey {
                    property: self.property.to_string(),
                })?;
                self.entries.push((key, payload));
                Ok(())
            }
            ListOperation::Update => {
                self.track_layer_key(&key)?;
                self.update_existing(key, payload)
            }
            ListOperation::AddOrUpdate => {
                self.track_layer_key(&key)?;
                if self.position_of(&key).is_some() {
                    self.update_existing(key, payload)
                } else {
                    let payload = payload.ok_or_else(|| MergeError::MissingKey {
                        property: self.property.to_string(),
                    })?;
                    self.entries.push((key, payload));
                    Ok(())
                }
            }
            ListOperation::Remove => {
                // Removal may precede re-insertion at a different position
                // in the same layer; the key is released for reuse.
                if let Some(index) = self.position_of(&key) {
                    self.entries.remove(index);
                }
                self.layer_keys.retain(|k| k != &key);
                Ok(())
            }
        }
    }

    fn update_existing(&mut self, key: Value, payload: Option<Value>) -> Result<(), MergeError> {
        let index = self.position_of(&key).ok_or_else(|| MergeError::MissingIdentity {
            property: self.property.to_string(),
            key: key.to_string(),
            operation: ListOperation::Update.as_str().to_string(),
        })?;
        let payload = payload.ok_or_else(|| MergeError::MissingKey {
            property: self.property.to_string(),
        })?;
        let updated = match (&self.entries[index].1, &payload) {
            (Value::Item(existing), Value::Item(patch)) => {
                let mut clone = existing.as_ref().clone();
                merge_declared_fields(self.property, &key, &mut clone, patch)?;
                Value::Item(Box::new(clone))
            }
            _ => payload,
        };
        self.entries[index].1 = updated;
        Ok(())
    }
}
