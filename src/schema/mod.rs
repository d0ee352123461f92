//! Shape declarations and descriptor analysis.

mod analyze;
mod descriptor;
pub mod names;
mod property;
mod registry;
mod spec;

pub use descriptor::Descriptor;
pub use property::{DerivedFn, DerivedProperty, PropertyDescriptor, PropertyIdentifier};
pub use registry::SchemaRegistry;
pub use spec::{AccessorRole, AccessorSpec, ShapeSpec};
