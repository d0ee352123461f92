//! Process-wide schema registry.
//!
//! Holds the declared shape specs, the memoized descriptor cache, and the
//! named registries for formats, bindings, default providers, derived
//! functions, implementation constructors and subtype tags. All tables are
//! write-once-per-key and safe under concurrent readers once populated.
//!
//! Descriptor construction is two-phase: a building placeholder is claimed
//! before analysis runs, so concurrent first access for the same shape and
//! re-entrant access for mutually recursive shapes resolve to one slot, and
//! a supertype cycle surfaces as an analysis error instead of looping.

use super::analyze::analyze;
use super::descriptor::Descriptor;
use super::property::DerivedFn;
use super::spec::{AccessorRole, AccessorSpec, ShapeSpec};
use crate::error::AnalysisError;
use crate::factory::ConstructorEntry;
use crate::subtype::SubtypeEntry;
use crate::value::{Binding, DefaultProviderFn, Format};
use serde_json::Value as Json;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread::{self, ThreadId};
use tracing::{debug, warn};

pub(crate) enum CacheSlot {
    /// Claimed by the given thread; analysis is running.
    Building(ThreadId),
    Ready(Arc<Descriptor>),
    Failed(AnalysisError),
}

#[derive(Default)]
pub(crate) struct Inner {
    specs: HashMap<String, ShapeSpec>,
    cache: HashMap<String, CacheSlot>,
    formats: HashMap<String, Arc<dyn Format>>,
    bindings: HashMap<String, Arc<dyn Binding>>,
    providers: HashMap<String, DefaultProviderFn>,
    derived_fns: HashMap<String, DerivedFn>,
    default_overrides: HashMap<String, Json>,
    pub(crate) subtypes: HashMap<String, Vec<SubtypeEntry>>,
    pub(crate) constructors: HashMap<String, ConstructorEntry>,
}

/// The process-wide schema store and descriptor cache.
#[derive(Default)]
pub struct SchemaRegistry {
    inner: RwLock<Inner>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a shape declaration. Declarations are write-once: a shape
    /// whose descriptor has already been analyzed keeps its first
    /// declaration.
    pub fn declare(&self, spec: ShapeSpec) {
        let mut inner = self.write();
        if inner.cache.contains_key(&spec.name) {
            warn!(shape = %spec.name, "ignoring redeclaration of analyzed shape");
            return;
        }
        if inner.specs.insert(spec.name.clone(), spec).is_some() {
            warn!("replacing declaration of not-yet-analyzed shape");
        }
    }

    pub fn register_format(&self, name: impl Into<String>, format: Arc<dyn Format>) {
        self.write().formats.insert(name.into(), format);
    }

    pub fn register_binding(&self, name: impl Into<String>, binding: Arc<dyn Binding>) {
        self.write().bindings.insert(name.into(), binding);
    }

    pub fn register_default_provider(
        &self,
        name: impl Into<String>,
        provider: DefaultProviderFn,
    ) {
        self.write().providers.insert(name.into(), provider);
    }

    pub fn register_derived(&self, name: impl Into<String>, function: DerivedFn) {
        self.write().derived_fns.insert(name.into(), function);
    }

    /// Process-level default override, keyed by the fully-qualified
    /// property identifier (`Shape#property` of the defining declaration).
    /// Takes effect only for shapes analyzed after registration; the value
    /// is baked into the cached descriptor.
    pub fn set_default_override(&self, identifier: impl Into<String>, literal: Json) {
        self.write()
            .default_overrides
            .insert(identifier.into(), literal);
    }

    /// The analyzed descriptor of `shape`, memoized process-wide.
    ///
    /// The first call analyzes and caches; analysis failure is cached too
    /// and returned unchanged on every later call. A lookup of a shape that
    /// is mid-analysis on the same thread is a supertype cycle.
    pub fn descriptor(&self, shape: &str) -> Result<Arc<Descriptor>, AnalysisError> {
        loop {
            {
                let inner = self.read();
                match inner.cache.get(shape) {
                    Some(CacheSlot::Ready(descriptor)) => return Ok(descriptor.clone()),
                    Some(CacheSlot::Failed(error)) => return Err(error.clone()),
                    Some(CacheSlot::Building(owner)) => {
                        if *owner == thread::current().id() {
                            return Err(AnalysisError::CyclicInheritance(shape.to_string()));
                        }
                        // Another thread is analyzing this shape; wait for
                        // its slot to resolve.
                    }
                    None => {}
                }
            }

            let claimed = {
                let mut inner = self.write();
                match inner.cache.get(shape) {
                    None => {
                        inner.cache.insert(
                            shape.to_string(),
                            CacheSlot::Building(thread::current().id()),
                        );
                        true
                    }
                    Some(_) => false,
                }
            };

            if claimed {
                break;
            }
            thread::yield_now();
        }

        let result = analyze(self, shape);
        let mut inner = self.write();
        match result {
            Ok(descriptor) => {
                let descriptor = Arc::new(descriptor);
                debug!(shape, "descriptor cached");
                inner
                    .cache
                    .insert(shape.to_string(), CacheSlot::Ready(descriptor.clone()));
                Ok(descriptor)
            }
            Err(error @ AnalysisError::UnknownShape(_)) => {
                // Not a schema defect: the shape may be declared later.
                inner.cache.remove(shape);
                Err(error)
            }
            Err(error) => {
                inner
                    .cache
                    .insert(shape.to_string(), CacheSlot::Failed(error.clone()));
                Err(error)
            }
        }
    }

    pub(crate) fn spec(&self, shape: &str) -> Option<ShapeSpec> {
        self.read().specs.get(shape).cloned()
    }

    pub fn is_declared(&self, shape: &str) -> bool {
        self.read().specs.contains_key(shape)
    }

    /// Whether `sub` inherits from `sup`, walking declared supertype lists.
    pub(crate) fn is_subshape(&self, sub: &str, sup: &str) -> bool {
        if sub == sup {
            return true;
        }
        let inner = self.read();
        let mut queue: Vec<&str> = vec![sub];
        let mut visited: HashSet<&str> = HashSet::new();
        while let Some(current) = queue.pop() {
            if !visited.insert(current) {
                continue;
            }
            let Some(spec) = inner.specs.get(current) else {
                continue;
            };
            for parent in &spec.supertypes {
                if parent == sup {
                    return true;
                }
                queue.push(parent.as_str());
            }
        }
        false
    }

    /// Find the getter declaration of a property on a shape or its
    /// ancestors, from declaration data alone. Used where descriptor
    /// recursion would not terminate on mutually recursive shapes.
    pub(crate) fn find_getter_spec(&self, shape: &str, property: &str) -> Option<AccessorSpec> {
        let inner = self.read();
        let mut queue: Vec<&str> = vec![shape];
        let mut visited: HashSet<&str> = HashSet::new();
        while let Some(current) = queue.pop() {
            if !visited.insert(current) {
                continue;
            }
            let Some(spec) = inner.specs.get(current) else {
                continue;
            };
            for accessor in &spec.accessors {
                if accessor.role == AccessorRole::Getter && accessor.property_name() == property {
                    return Some(accessor.clone());
                }
            }
            queue.extend(spec.supertypes.iter().map(String::as_str));
        }
        None
    }

    pub(crate) fn format(&self, name: &str) -> Option<Arc<dyn Format>> {
        self.read().formats.get(name).cloned()
    }

    pub(crate) fn binding(&self, name: &str) -> Option<Arc<dyn Binding>> {
        self.read().bindings.get(name).cloned()
    }

    pub(crate) fn default_provider(&self, name: &str) -> Option<DefaultProviderFn> {
        self.read().providers.get(name).cloned()
    }

    pub(crate) fn derived_fn(&self, name: &str) -> Option<DerivedFn> {
        self.read().derived_fns.get(name).cloned()
    }

    pub(crate) fn default_override(&self, identifier: &str) -> Option<Json> {
        self.read().default_overrides.get(identifier).cloned()
    }
}
