//! Polymorphic subtype resolution.
//!
//! Each open ("bound") shape owns a tag registry mapping textual
//! discriminators to concrete subshapes. Registries are populated at
//! startup from static declarations; an entry whose backing shape cannot
//! be loaded is registered as broken and only fails lookups that actually
//! request it, never its siblings.

use crate::error::{AnalysisError, SubtypeResolutionError};
use crate::schema::{Descriptor, SchemaRegistry};
use std::sync::Arc;
use tracing::debug;

/// One tag registration under a bound shape.
#[derive(Debug, Clone)]
pub struct SubtypeEntry {
    pub tag: String,
    pub shape: String,
    /// Load failure recorded at registration; resolving this tag reports
    /// it without affecting sibling entries.
    pub broken: Option<String>,
}

impl SchemaRegistry {
    fn insert_subtype(
        &self,
        bound: &str,
        entry: SubtypeEntry,
    ) -> Result<(), AnalysisError> {
        let mut inner = self.write();
        let entries = inner.subtypes.entry(bound.to_string()).or_default();
        if entries.iter().any(|e| e.tag == entry.tag) {
            return Err(AnalysisError::DuplicateTag {
                bound: bound.to_string(),
                tag: entry.tag,
            });
        }
        entries.push(entry);
        Ok(())
    }

    /// Register a concrete subshape of `bound` under a discriminator tag.
    /// The shape must be declared and inherit from the bound.
    pub fn register_subtype(
        &self,
        bound: &str,
        tag: impl Into<String>,
        shape: impl Into<String>,
    ) -> Result<(), AnalysisError> {
        let tag = tag.into();
        let shape = shape.into();
        if !self.is_subshape(&shape, bound) {
            return Err(AnalysisError::TagOutsideBound {
                bound: bound.to_string(),
                tag,
                shape,
            });
        }
        debug!(bound, tag, shape, "subtype registered");
        self.insert_subtype(
            bound,
            SubtypeEntry {
                tag,
                shape,
                broken: None,
            },
        )
    }

    /// Record a subtype whose backing type failed to load. The tag stays
    /// visible so a lookup reports the load failure instead of an unknown
    /// discriminator.
    pub fn register_broken_subtype(
        &self,
        bound: &str,
        tag: impl Into<String>,
        reason: impl Into<String>,
    ) -> Result<(), AnalysisError> {
        self.insert_subtype(
            bound,
            SubtypeEntry {
                tag: tag.into(),
                shape: String::new(),
                broken: Some(reason.into()),
            },
        )
    }

    /// Map a discriminator to the descriptor of a concrete subshape of
    /// `bound`. Failure is scoped to this lookup; other tags of the same
    /// bound stay resolvable.
    pub fn resolve_subtype(
        &self,
        bound: &str,
        discriminator: &str,
    ) -> Result<Arc<Descriptor>, SubtypeResolutionError> {
        let entry = {
            let inner = self.read();
            inner
                .subtypes
                .get(bound)
                .and_then(|entries| entries.iter().find(|e| e.tag == discriminator).cloned())
        };
        let Some(entry) = entry else {
            return Err(SubtypeResolutionError::UnknownSubtype {
                bound: bound.to_string(),
                discriminator: discriminator.to_string(),
            });
        };
        if let Some(reason) = entry.broken {
            return Err(SubtypeResolutionError::UnloadableSubtype {
                bound: bound.to_string(),
                tag: entry.tag,
                reason,
            });
        }
        let descriptor = self.descriptor(&entry.shape).map_err(|e| {
            SubtypeResolutionError::UnloadableSubtype {
                bound: bound.to_string(),
                tag: entry.tag.clone(),
                reason: e.to_string(),
            }
        })?;
        if descriptor.is_abstract() {
            return Err(SubtypeResolutionError::UnloadableSubtype {
                bound: bound.to_string(),
                tag: entry.tag,
                reason: format!("shape '{}' is abstract", descriptor.name()),
            });
        }
        Ok(descriptor)
    }

    /// Whether a discriminator tag is registered under a bound, broken
    /// entries included.
    pub fn has_subtype_tag(&self, bound: &str, tag: &str) -> bool {
        self.read()
            .subtypes
            .get(bound)
            .is_some_and(|entries| entries.iter().any(|e| e.tag == tag))
    }

    /// The registered tag of a shape below a bound, for serialization.
    /// Prefers the shape's own tag, falling back to a tag of any ancestor
    /// registered under the bound.
    pub fn tag_for(&self, bound: &str, shape: &Descriptor) -> Option<String> {
        let inner = self.read();
        let entries = inner.subtypes.get(bound)?;
        entries
            .iter()
            .find(|e| e.broken.is_none() && e.shape == shape.name())
            .or_else(|| {
                entries
                    .iter()
                    .find(|e| e.broken.is_none() && shape.is_kind_of(&e.shape))
            })
            .map(|e| e.tag.clone())
    }
}
