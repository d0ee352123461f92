//! Round-trip coverage: re-reading a written document yields an item equal
//! to the originally parsed one, across every property kind.

use std::sync::Arc;
use typed_config::io::{DocumentReader, DocumentWriter, Node, json_from_node, node_from_json};
use typed_config::schema::{AccessorSpec, SchemaRegistry, ShapeSpec};
use typed_config::value::{CommaSeparatedFormat, EnumType, TaggedListBinding, TextFormat, ValueType};
use typed_config::{Item, Value};

fn reparse(registry: &SchemaRegistry, shape: &str, doc: &Node) -> (Item, Item) {
    let mut reader = DocumentReader::new(registry);
    let parsed = reader.read(shape, doc).expect("initial read failed");
    assert!(reader.problems().is_empty(), "{:?}", reader.problems());

    let written = DocumentWriter::new(registry)
        .write(&doc.tag, &parsed)
        .expect("write failed");

    let mut reader = DocumentReader::new(registry);
    let reparsed = reader.read(shape, &written).expect("re-read failed");
    assert!(reader.problems().is_empty(), "{:?}", reader.problems());
    (parsed, reparsed)
}

#[test]
fn primitive_and_enum_properties_round_trip() {
    let registry = SchemaRegistry::new();
    let level = EnumType::new("Level", &["debug", "info", "warn"]);
    registry.declare(
        ShapeSpec::new("Server")
            .accessor(AccessorSpec::getter("getPort", ValueType::Int))
            .accessor(AccessorSpec::getter("getRatio", ValueType::Float))
            .accessor(AccessorSpec::getter("isEnabled", ValueType::Bool))
            .accessor(AccessorSpec::getter("getHost", ValueType::Text))
            .accessor(AccessorSpec::getter("getLevel", ValueType::Enum(level))),
    );

    let doc = Node::new("server")
        .with_attribute("port", "8080")
        .with_attribute("ratio", "0.5")
        .with_attribute("enabled", "true")
        .with_attribute("host", "localhost")
        .with_attribute("level", "warn");

    let (parsed, reparsed) = reparse(&registry, "Server", &doc);
    assert_eq!(parsed, reparsed);
    assert_eq!(parsed.get("level").unwrap(), Value::text("warn"));
}

#[test]
fn nested_item_properties_round_trip() {
    let registry = SchemaRegistry::new();
    registry.declare(
        ShapeSpec::new("Limits")
            .accessor(AccessorSpec::getter("getMax", ValueType::Int))
            .accessor(AccessorSpec::getter("getMin", ValueType::Int)),
    );
    registry.declare(
        ShapeSpec::new("Server")
            .accessor(AccessorSpec::getter("getLimits", ValueType::item("Limits")).nullable()),
    );

    let doc = Node::new("server").with_child(
        Node::new("limits")
            .with_attribute("max", "10")
            .with_attribute("min", "2"),
    );

    let (parsed, reparsed) = reparse(&registry, "Server", &doc);
    assert_eq!(parsed, reparsed);
    let limits = parsed.get("limits").unwrap();
    assert_eq!(
        limits.as_item().unwrap().get("max").unwrap(),
        Value::Int(10)
    );
}

#[test]
fn plain_list_properties_round_trip() {
    let registry = SchemaRegistry::new();
    registry.declare(
        ShapeSpec::new("Catalog").accessor(AccessorSpec::getter(
            "getNames",
            ValueType::list_of(ValueType::Text),
        )),
    );

    let doc = Node::new("catalog").with_child(
        Node::new("names")
            .with_child(Node::new("name").with_text("a"))
            .with_child(Node::new("name").with_text("b")),
    );

    let (parsed, reparsed) = reparse(&registry, "Catalog", &doc);
    assert_eq!(parsed, reparsed);
}

#[test]
fn keyed_item_lists_round_trip() {
    let registry = SchemaRegistry::new();
    registry.declare(
        ShapeSpec::new("Worker")
            .accessor(AccessorSpec::getter("getName", ValueType::Text))
            .accessor(AccessorSpec::getter("getPriority", ValueType::Int)),
    );
    registry.declare(
        ShapeSpec::new("Pool").accessor(
            AccessorSpec::getter("getWorkers", ValueType::list_of(ValueType::item("Worker")))
                .keyed_by("name"),
        ),
    );

    let doc = Node::new("pool").with_child(
        Node::new("workers")
            .with_child(
                Node::new("worker")
                    .with_attribute("name", "a")
                    .with_attribute("priority", "1"),
            )
            .with_child(
                Node::new("worker")
                    .with_attribute("name", "b")
                    .with_attribute("priority", "2"),
            ),
    );

    let (parsed, reparsed) = reparse(&registry, "Pool", &doc);
    assert_eq!(parsed, reparsed);
}

#[test]
fn item_maps_round_trip() {
    let registry = SchemaRegistry::new();
    registry.declare(
        ShapeSpec::new("Route")
            .accessor(AccessorSpec::getter("getPath", ValueType::Text))
            .accessor(AccessorSpec::getter("getTarget", ValueType::Text)),
    );
    registry.declare(
        ShapeSpec::new("Router").accessor(
            AccessorSpec::getter("getRoutes", ValueType::map_of(ValueType::item("Route")))
                .keyed_by("path"),
        ),
    );

    let doc = Node::new("router").with_child(
        Node::new("routes")
            .with_child(
                Node::new("route")
                    .with_attribute("path", "/a")
                    .with_attribute("target", "one"),
            )
            .with_child(
                Node::new("route")
                    .with_attribute("path", "/b")
                    .with_attribute("target", "two"),
            ),
    );

    let (parsed, reparsed) = reparse(&registry, "Router", &doc);
    assert_eq!(parsed, reparsed);
}

#[test]
fn format_customized_properties_round_trip_as_attributes() {
    let registry = SchemaRegistry::new();
    registry.register_format("csv", Arc::new(CommaSeparatedFormat::of_text()));
    registry.declare(
        ShapeSpec::new("Catalog").accessor(
            AccessorSpec::getter("getNames", ValueType::list_of(ValueType::Text)).format("csv"),
        ),
    );

    let doc = Node::new("catalog").with_attribute("names", "a,b,c");
    let (parsed, reparsed) = reparse(&registry, "Catalog", &doc);
    assert_eq!(parsed, reparsed);
    assert_eq!(
        parsed.get("names").unwrap(),
        Value::Collection(vec![Value::text("a"), Value::text("b"), Value::text("c")])
    );

    // The written form keeps the flat attribute grammar.
    let written = DocumentWriter::new(&registry).write("catalog", &parsed).unwrap();
    assert_eq!(written.attribute("names"), Some("a,b,c"));
}

#[test]
fn binding_customized_properties_round_trip_structurally() {
    let registry = SchemaRegistry::new();
    registry.register_binding(
        "part-list",
        Arc::new(TaggedListBinding::new("part", Arc::new(TextFormat))),
    );
    registry.declare(
        ShapeSpec::new("Assembly").accessor(
            AccessorSpec::getter("getParts", ValueType::list_of(ValueType::Text))
                .binding("part-list"),
        ),
    );

    // Embedded delimiters survive because the binding is structural.
    let doc = Node::new("assembly").with_child(
        Node::new("parts")
            .with_child(Node::new("part").with_text("bolt,m3"))
            .with_child(Node::new("part").with_text("nut")),
    );

    let (parsed, reparsed) = reparse(&registry, "Assembly", &doc);
    assert_eq!(parsed, reparsed);
    assert_eq!(
        parsed.get("parts").unwrap(),
        Value::Collection(vec![Value::text("bolt,m3"), Value::text("nut")])
    );
}

#[test]
fn unset_properties_are_not_written() {
    let registry = SchemaRegistry::new();
    registry.declare(
        ShapeSpec::new("Server")
            .accessor(AccessorSpec::getter("getPort", ValueType::Int).default_value(serde_json::json!(8080)))
            .accessor(AccessorSpec::getter("getHost", ValueType::Text)),
    );

    let mut item = registry.new_instance("Server").unwrap();
    item.set("host", Value::text("localhost")).unwrap();

    let written = DocumentWriter::new(&registry).write("server", &item).unwrap();
    assert_eq!(written.attribute("host"), Some("localhost"));
    assert_eq!(written.attribute("port"), None);
}

#[test]
fn json_documents_round_trip_through_the_adapter() -> anyhow::Result<()> {
    let registry = SchemaRegistry::new();
    registry.declare(
        ShapeSpec::new("Worker")
            .accessor(AccessorSpec::getter("getName", ValueType::Text))
            .accessor(AccessorSpec::getter("getPriority", ValueType::Int)),
    );
    registry.declare(
        ShapeSpec::new("Pool")
            .accessor(AccessorSpec::getter("getLabel", ValueType::Text))
            .accessor(
                AccessorSpec::getter("getWorkers", ValueType::list_of(ValueType::item("Worker")))
                    .keyed_by("name"),
            ),
    );

    let json = serde_json::json!({
        "label": "main",
        "workers": {
            "worker": [
                {"name": "a", "priority": 1},
                {"name": "b", "priority": 2}
            ]
        }
    });

    let doc = node_from_json("pool", &json);
    let mut reader = DocumentReader::new(&registry);
    let parsed = reader.read("Pool", &doc)?;
    assert!(reader.problems().is_empty(), "{:?}", reader.problems());

    let written = DocumentWriter::new(&registry).write("pool", &parsed)?;
    let back = json_from_node(&written);

    let mut reader = DocumentReader::new(&registry);
    let reparsed = reader.read("Pool", &node_from_json("pool", &back))?;
    assert_eq!(parsed, reparsed);
    Ok(())
}
