//! JSON tokenizer binding for the element tree.
//!
//! Conventions: scalar fields become attributes, object fields become
//! child elements, array fields become repeated children under the field
//! name, and the reserved `config:value` field carries text content.
//! Engine metadata (`config:interface`, `config:operation`, ...) uses the
//! same spellings as in XML attributes.

use super::node::Node;
use serde_json::{Map, Value as Json};

/// Reserved field carrying element text content.
pub const TEXT_FIELD: &str = "config:value";

/// Map a JSON document onto an element tree rooted at `tag`.
pub fn node_from_json(tag: &str, json: &Json) -> Node {
    let mut node = Node::new(tag);
    match json {
        Json::Object(fields) => {
            for (field, value) in fields {
                match value {
                    Json::Null => {}
                    Json::String(s) if field == TEXT_FIELD => {
                        node.text = Some(s.clone());
                    }
                    Json::Bool(_) | Json::Number(_) | Json::String(_) => {
                        node.attributes.push((field.clone(), scalar_text(value)));
                    }
                    Json::Object(_) => {
                        node.children.push(node_from_json(field, value));
                    }
                    Json::Array(elements) => {
                        for element in elements {
                            node.children.push(node_from_json(field, element));
                        }
                    }
                }
            }
        }
        scalar => {
            node.text = Some(scalar_text(scalar));
        }
    }
    node
}

/// Map an element tree back to a JSON object.
pub fn json_from_node(node: &Node) -> Json {
    let mut fields = Map::new();
    for (name, value) in &node.attributes {
        fields.insert(name.clone(), Json::String(value.clone()));
    }
    if let Some(text) = &node.text {
        fields.insert(TEXT_FIELD.to_string(), Json::String(text.clone()));
    }

    // Repeated child tags collapse into one array field.
    let mut order: Vec<&str> = Vec::new();
    for child in &node.children {
        if !order.contains(&child.tag.as_str()) {
            order.push(&child.tag);
        }
    }
    for tag in order {
        let group: Vec<Json> = node
            .children
            .iter()
            .filter(|c| c.tag == tag)
            .map(json_from_node)
            .collect();
        let value = if group.len() == 1 {
            group.into_iter().next().unwrap_or(Json::Null)
        } else {
            Json::Array(group)
        };
        fields.insert(tag.to_string(), value);
    }
    Json::Object(fields)
}

fn scalar_text(json: &Json) -> String {
    match json {
        Json::String(s) => s.clone(),
        other => other.to_string(),
    }
}
