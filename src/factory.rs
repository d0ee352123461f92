//! Turning configuration items into live objects.
//!
//! A [`PolymorphicConfiguration`] item carries an implementation selector;
//! the factory resolves it through the registered constructor table and
//! invokes the two-argument (context, configuration) construction
//! contract. The [`InstantiationContext`] spans one full object-graph
//! build: nested constructions share it, so error policy and reporting
//! state cover the whole tree.
//!
//! [`PolymorphicConfiguration`]: crate::item::Item

use crate::error::InstantiationError;
use crate::item::Item;
use crate::schema::SchemaRegistry;
use crate::value::Value;
use std::any::Any;
use std::sync::Arc;
use tracing::debug;

/// Canonical name of the implementation-selector property.
pub const IMPLEMENTATION_SELECTOR: &str = "class";

/// A constructed live object.
pub type ConstructedObject = Box<dyn Any>;

/// The two-argument construction contract.
pub type ConstructorFn = Arc<
    dyn Fn(&mut InstantiationContext, &Item) -> Result<ConstructedObject, InstantiationError>
        + Send
        + Sync,
>;

/// One registered implementation, or the recorded reason it failed to
/// load. A broken entry fails only requests that name it.
#[derive(Clone)]
pub enum ConstructorEntry {
    Loaded(ConstructorFn),
    Broken(String),
}

/// Error policy of one object-graph build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// The first construction error is re-raised synchronously at the
    /// call site.
    FailFast,
    /// Errors are recorded; the failed construction yields a placeholder
    /// and the build continues.
    Collect,
}

/// Shared coordinator of one object-graph build.
///
/// Keeps accepting requests after errors; a problem that has been raised
/// or queried once is never resurfaced by a later query.
pub struct InstantiationContext {
    policy: ErrorPolicy,
    problems: Vec<InstantiationError>,
    reported: usize,
}

impl InstantiationContext {
    pub fn fail_fast() -> Self {
        Self {
            policy: ErrorPolicy::FailFast,
            problems: Vec::new(),
            reported: 0,
        }
    }

    pub fn collect() -> Self {
        Self {
            policy: ErrorPolicy::Collect,
            problems: Vec::new(),
            reported: 0,
        }
    }

    pub fn policy(&self) -> ErrorPolicy {
        self.policy
    }

    /// Route one construction error through the configured policy.
    fn report(&mut self, error: InstantiationError) -> Result<(), InstantiationError> {
        self.problems.push(error.clone());
        match self.policy {
            ErrorPolicy::FailFast => {
                // Raised here; later queries must not surface it again.
                self.reported = self.problems.len();
                Err(error)
            }
            ErrorPolicy::Collect => Ok(()),
        }
    }

    /// All problems recorded so far, reported or not.
    pub fn problems(&self) -> &[InstantiationError] {
        &self.problems
    }

    pub fn has_problems(&self) -> bool {
        !self.problems.is_empty()
    }

    /// Raise the first not-yet-reported problem, marking everything
    /// recorded so far as reported. Subsequent calls return `Ok` until new
    /// problems arrive.
    pub fn check(&mut self) -> Result<(), InstantiationError> {
        if self.reported < self.problems.len() {
            let error = self.problems[self.reported].clone();
            self.reported = self.problems.len();
            return Err(error);
        }
        Ok(())
    }
}

impl SchemaRegistry {
    pub fn register_constructor(&self, name: impl Into<String>, constructor: ConstructorFn) {
        self.write()
            .constructors
            .insert(name.into(), ConstructorEntry::Loaded(constructor));
    }

    /// Record an implementation whose backing type failed to load.
    pub fn register_broken_constructor(
        &self,
        name: impl Into<String>,
        reason: impl Into<String>,
    ) {
        self.write()
            .constructors
            .insert(name.into(), ConstructorEntry::Broken(reason.into()));
    }

    pub(crate) fn constructor(&self, name: &str) -> Option<ConstructorEntry> {
        self.read().constructors.get(name).cloned()
    }
}

/// Builds live objects from polymorphic configuration items.
pub struct InstantiationFactory<'r> {
    registry: &'r SchemaRegistry,
}

impl<'r> InstantiationFactory<'r> {
    pub fn new(registry: &'r SchemaRegistry) -> Self {
        Self { registry }
    }

    /// Resolve the item's implementation selector and construct. Under the
    /// collect policy a failed construction returns `None` as placeholder;
    /// the error stays retrievable from the context.
    pub fn instantiate(
        &self,
        context: &mut InstantiationContext,
        item: &Item,
    ) -> Result<Option<ConstructedObject>, InstantiationError> {
        match self.try_instantiate(context, item) {
            Ok(object) => Ok(Some(object)),
            Err(error) => context.report(error).map(|_| None),
        }
    }

    fn try_instantiate(
        &self,
        context: &mut InstantiationContext,
        item: &Item,
    ) -> Result<ConstructedObject, InstantiationError> {
        let shape = item.descriptor().name().to_string();
        let selector = match item.get(IMPLEMENTATION_SELECTOR) {
            Ok(Value::Text(name)) if !name.is_empty() => name,
            _ => return Err(InstantiationError::MissingSelector { shape }),
        };

        let entry = self.registry.constructor(&selector).ok_or_else(|| {
            InstantiationError::UnresolvedImplementation {
                name: selector.clone(),
                reason: "no constructor registered".to_string(),
            }
        })?;

        let constructor = match entry {
            ConstructorEntry::Loaded(constructor) => constructor,
            ConstructorEntry::Broken(reason) => {
                return Err(InstantiationError::UnresolvedImplementation {
                    name: selector,
                    reason,
                });
            }
        };

        debug!(shape = %shape, implementation = %selector, "instantiating");
        constructor(context, item).map_err(|e| match e {
            error @ InstantiationError::ConstructionFailed { .. } => error,
            other => InstantiationError::ConstructionFailed {
                name: selector,
                reason: other.to_string(),
            },
        })
    }
}
