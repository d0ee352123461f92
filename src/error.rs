//! Structured error types for schema analysis, value coding and merging.

use thiserror::Error;

/// Malformed schema detected during descriptor analysis.
///
/// Analysis errors are fatal for the affected shape: they are raised on the
/// first analysis attempt, cached, and returned unchanged on every later
/// lookup of the same shape.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AnalysisError {
    #[error("unknown shape '{0}'")]
    UnknownShape(String),

    #[error("cyclic inheritance involving shape '{0}'")]
    CyclicInheritance(String),

    #[error("setter '{accessor}' on '{shape}' has no matching getter")]
    SetterWithoutGetter { shape: String, accessor: String },

    #[error(
        "inherited declarations of property '{property}' on '{shape}' have no common root \
         (declared independently by {first} and {second})"
    )]
    NoCommonRoot {
        shape: String,
        property: String,
        first: String,
        second: String,
    },

    #[error(
        "property '{property}' on '{shape}' redeclares the inherited type {inherited} \
         with incompatible type {declared}"
    )]
    IncompatibleRedeclaration {
        shape: String,
        property: String,
        inherited: String,
        declared: String,
    },

    #[error(
        "abstract property '{property}' declared by '{declaring}' is not overridden \
         in concrete shape '{shape}'"
    )]
    UnresolvedAbstractProperty {
        shape: String,
        property: String,
        declaring: String,
    },

    #[error("shape '{0}' is marked abstract but declares no abstract property and cannot be instantiated")]
    AbstractWithoutAbstractProperty(String),

    #[error("shape '{0}' is abstract and cannot be instantiated")]
    AbstractInstantiation(String),

    #[error("indexed accessor '{accessor}' on '{shape}': {problem}")]
    BadIndexedAccessor {
        shape: String,
        accessor: String,
        problem: String,
    },

    #[error(
        "format '{format}' on property '{property}' of '{shape}' accepts only a strict \
         subtype of the declared property type and cannot render all legal values"
    )]
    UnformattableProperty {
        shape: String,
        property: String,
        format: String,
    },

    #[error("unknown format '{name}' referenced by property '{property}' of '{shape}'")]
    UnknownFormat {
        shape: String,
        property: String,
        name: String,
    },

    #[error("unknown binding '{name}' referenced by property '{property}' of '{shape}'")]
    UnknownBinding {
        shape: String,
        property: String,
        name: String,
    },

    #[error("unknown derived function '{name}' referenced by property '{property}' of '{shape}'")]
    UnknownDerivedFunction {
        shape: String,
        property: String,
        name: String,
    },

    #[error("unknown default provider '{name}' referenced by property '{property}' of '{shape}'")]
    UnknownDefaultProvider {
        shape: String,
        property: String,
        name: String,
    },

    #[error("default value for property '{property}' of '{shape}' is not accepted by the property type: {literal}")]
    IllegalDefault {
        shape: String,
        property: String,
        literal: String,
    },

    #[error("duplicate tag '{tag}' registered for bound '{bound}'")]
    DuplicateTag { bound: String, tag: String },

    #[error("tag '{tag}' registered for bound '{bound}' names '{shape}', which is not a subtype of the bound")]
    TagOutsideBound {
        bound: String,
        tag: String,
        shape: String,
    },

    #[error(
        "key property '{key}' referenced by '{property}' of '{shape}' does not exist \
         on element shape '{element}'"
    )]
    UnknownKeyProperty {
        shape: String,
        property: String,
        key: String,
        element: String,
    },
}

/// A property's textual or structured value failed to parse or validate.
///
/// Carries the property name and the offending literal. Failing one property
/// aborts only that property's read; previously-applied layers stay intact.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("property '{property}': cannot parse '{literal}': {reason}")]
pub struct FormatError {
    pub property: String,
    pub literal: String,
    pub reason: String,
}

impl FormatError {
    pub fn new(
        property: impl Into<String>,
        literal: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            property: property.into(),
            literal: literal.into(),
            reason: reason.into(),
        }
    }
}

/// Legal operation tokens for collection layer entries.
pub const LEGAL_OPERATIONS: &str = "add, update, remove, addOrUpdate";

/// Legal position tokens for collection layer entries.
pub const LEGAL_POSITIONS: &str = "begin, end, before, after";

/// Invalid layer operation on a collection-valued property.
///
/// Aborts the whole multi-layer read.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MergeError {
    #[error("property '{property}': unknown operation '{token}', expected one of: {LEGAL_OPERATIONS}")]
    UnknownOperation { property: String, token: String },

    #[error("property '{property}': unknown position '{token}', expected one of: {LEGAL_POSITIONS}")]
    UnknownPosition { property: String, token: String },

    #[error("property '{property}': no element with key '{key}' to {operation}")]
    MissingIdentity {
        property: String,
        key: String,
        operation: String,
    },

    #[error("property '{property}': reference key '{key}' does not match any element")]
    MissingReference { property: String, key: String },

    #[error("property '{property}': entry carries no identity key")]
    MissingKey { property: String },

    #[error("property '{property}': value of entry '{key}' changed but no new position given")]
    NoNewPosition { property: String, key: String },

    #[error("property '{property}': duplicate key '{key}'")]
    DuplicateKey { property: String, key: String },

    #[error("property '{property}': update of entry '{key}' failed: {reason}")]
    UpdateFailed {
        property: String,
        key: String,
        reason: String,
    },
}

/// Object construction failed; routed through the configured
/// [`InstantiationContext`](crate::factory::InstantiationContext) policy.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum InstantiationError {
    #[error("configuration of shape '{shape}' carries no implementation selector")]
    MissingSelector { shape: String },

    #[error("implementation '{name}' cannot be resolved: {reason}")]
    UnresolvedImplementation { name: String, reason: String },

    #[error("construction of '{name}' failed: {reason}")]
    ConstructionFailed { name: String, reason: String },
}

/// A discriminator could not be mapped to a concrete descriptor.
///
/// Scoped to the element that carries the discriminator; sibling elements
/// in the same document still resolve.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SubtypeResolutionError {
    #[error("unknown subtype '{discriminator}' for bound '{bound}'")]
    UnknownSubtype { bound: String, discriminator: String },

    #[error("subtype '{tag}' of bound '{bound}' cannot be loaded: {reason}")]
    UnloadableSubtype {
        bound: String,
        tag: String,
        reason: String,
    },
}

/// Misuse of an [`Item`](crate::item::Item) property store.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    #[error("shape '{shape}' has no property '{property}'")]
    NoSuchProperty { shape: String, property: String },

    #[error("derived property '{property}' cannot be set directly")]
    DerivedProperty { property: String },

    #[error("property '{property}' is not nullable")]
    NotNullable { property: String },

    #[error("value {value} is not legal for property '{property}': {reason}")]
    IllegalValue {
        property: String,
        value: String,
        reason: String,
    },
}

/// Umbrella error for callers that drive whole documents through the engine.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error(transparent)]
    Instantiation(#[from] InstantiationError),

    #[error(transparent)]
    Subtype(#[from] SubtypeResolutionError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("shape '{shape}' has no property matching '{name}'")]
    UnknownProperty { shape: String, name: String },

    #[error("mandatory property '{property}' of '{shape}' was not set")]
    MandatoryNotSet { shape: String, property: String },

    #[error("derived property '{property}' cannot be configured")]
    DerivedConfigured { property: String },
}

/// Result type for document-level operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
