//! Schema-driven configuration objects.
//!
//! Applications declare configuration shapes — named, typed property sets
//! with multiple inheritance — and this crate provides the analyzed
//! descriptor model, typed and change-observable instances, polymorphic
//! subtype resolution, layered document merging, and a factory turning
//! resolved configurations into live objects.

pub mod annotations;
pub mod error;
pub mod factory;
pub mod io;
pub mod item;
pub mod merge;
pub mod schema;
pub mod subtype;
pub mod value;

pub use error::{
    AnalysisError, ConfigError, ConfigResult, FormatError, InstantiationError, MergeError,
    StoreError, SubtypeResolutionError,
};
pub use factory::{InstantiationContext, InstantiationFactory};
pub use io::{DocumentReader, DocumentWriter, Node};
pub use item::Item;
pub use schema::{AccessorSpec, Descriptor, PropertyDescriptor, SchemaRegistry, ShapeSpec};
pub use value::{Value, ValueType};
