//! Document I/O over the neutral element tree.

mod json;
mod node;
mod reader;
mod writer;

pub use json::{TEXT_FIELD, json_from_node, node_from_json};
pub use node::{
    CONFIG_PREFIX, INTERFACE_ATTR, MAP_KEY_ATTR, Node, OPERATION_ATTR, POSITION_ATTR,
    REFERENCE_ATTR,
};
pub use reader::DocumentReader;
pub use writer::DocumentWriter;
