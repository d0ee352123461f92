//! Annotation sets attached to property declarations.
//!
//! Annotations drive everything a declaration customizes beyond its plain
//! type: defaults, formats, bindings, collection keys, entry tags and the
//! mandatory/nullable/abstract/derived markers. During analysis the local
//! set of a declaration is merged with inherited sets, local keys winning.

use serde_json::Value as Json;
use std::collections::BTreeMap;

/// Literal default value.
pub const DEFAULT: &str = "default";

/// Name of a registered dynamic default provider.
pub const DEFAULT_PROVIDER: &str = "default-provider";

/// Name of a registered [`Format`](crate::value::Format).
pub const FORMAT: &str = "format";

/// Name of a registered [`Binding`](crate::value::Binding).
pub const BINDING: &str = "binding";

/// Canonical name of the key property of a keyed collection's elements.
pub const KEY: &str = "key";

/// Explicit entry tag for collection elements, overriding the derived
/// singular form.
pub const ENTRY_TAG: &str = "entry-tag";

/// Marks a property that must be set before a document read completes.
pub const MANDATORY: &str = "mandatory";

/// Allows the explicit null value.
pub const NULLABLE: &str = "nullable";

/// Marks a property that a concrete shape must override.
pub const ABSTRACT: &str = "abstract";

/// Name of a registered derived-property function; such properties are
/// computed and read-only.
pub const DERIVED: &str = "derived";

/// References the sibling collection of an indexed accessor.
pub const INDEXED: &str = "indexed";

/// An ordered, mergeable set of annotations.
///
/// Keys are well-known constants from this module; values are JSON literals
/// so that declaration data stays plain and comparable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Annotations {
    entries: BTreeMap<String, Json>,
}

impl Annotations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace one annotation.
    pub fn set(&mut self, key: impl Into<String>, value: Json) {
        self.entries.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Json> {
        self.entries.get(key)
    }

    /// Drop one annotation, e.g. when a concrete override discharges an
    /// inherited marker.
    pub fn remove(&mut self, key: &str) -> Option<Json> {
        self.entries.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// String-valued annotation, `None` if absent or not a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(Json::as_str)
    }

    /// Boolean marker annotation; a bare `true` or absence.
    pub fn flag(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .map(|v| v.as_bool().unwrap_or(true))
            .unwrap_or(false)
    }

    /// Merge `inherited` underneath this set: keys already present locally
    /// win, absent keys are taken from the inherited set.
    pub fn inherit_from(&mut self, inherited: &Annotations) {
        for (key, value) in &inherited.entries {
            self.entries
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Json)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn local_annotation_wins_over_inherited() {
        let mut local = Annotations::new();
        local.set(DEFAULT, json!(5));

        let mut inherited = Annotations::new();
        inherited.set(DEFAULT, json!(1));
        inherited.set(MANDATORY, json!(true));

        local.inherit_from(&inherited);

        assert_eq!(local.get(DEFAULT), Some(&json!(5)));
        assert!(local.flag(MANDATORY));
    }

    #[test]
    fn flag_treats_bare_presence_as_true() {
        let mut a = Annotations::new();
        a.set(ABSTRACT, json!(true));
        assert!(a.flag(ABSTRACT));
        assert!(!a.flag(MANDATORY));
    }
}
