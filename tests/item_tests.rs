//! Tests for the instance store: defaults, validation, change
//! notification, reset semantics and structural equality.

use serde_json::json;
use std::sync::{Arc, Mutex};
use typed_config::error::StoreError;
use typed_config::item::ChangeEvent;
use typed_config::schema::{AccessorSpec, SchemaRegistry, ShapeSpec};
use typed_config::value::{Value, ValueType};

fn server_registry() -> SchemaRegistry {
    let registry = SchemaRegistry::new();
    registry.declare(
        ShapeSpec::new("Server")
            .accessor(AccessorSpec::getter("getPort", ValueType::Int).default_value(json!(8080)))
            .accessor(AccessorSpec::getter("getHost", ValueType::Text))
            .accessor(AccessorSpec::getter("getNote", ValueType::Text).nullable()),
    );
    registry
}

#[test]
fn fresh_items_report_defaults_without_value_set() {
    let registry = server_registry();
    let item = registry.new_instance("Server").unwrap();

    assert_eq!(item.get("port").unwrap(), Value::Int(8080));
    assert!(!item.value_set("port").unwrap());
    assert_eq!(item.get("host").unwrap(), Value::text(""));
}

#[test]
fn set_stores_and_marks_the_property() {
    let registry = server_registry();
    let mut item = registry.new_instance("Server").unwrap();

    item.set("port", Value::Int(9000)).unwrap();
    assert_eq!(item.get("port").unwrap(), Value::Int(9000));
    assert!(item.value_set("port").unwrap());
}

#[test]
fn update_returns_the_previous_observable_value() {
    let registry = server_registry();
    let mut item = registry.new_instance("Server").unwrap();

    let before = item.update("port", Value::Int(9000)).unwrap();
    assert_eq!(before, Value::Int(8080));
    let before = item.update("port", Value::Int(9001)).unwrap();
    assert_eq!(before, Value::Int(9000));
}

#[test]
fn set_rejects_type_mismatches_and_null_on_non_nullable() {
    let registry = server_registry();
    let mut item = registry.new_instance("Server").unwrap();

    let error = item.set("port", Value::text("nine")).unwrap_err();
    assert!(matches!(error, StoreError::IllegalValue { .. }));

    let error = item.set("host", Value::None).unwrap_err();
    assert!(matches!(error, StoreError::NotNullable { .. }));

    item.set("note", Value::None).unwrap();
}

#[test]
fn unknown_property_access_fails() {
    let registry = server_registry();
    let item = registry.new_instance("Server").unwrap();
    assert!(matches!(
        item.get("bogus").unwrap_err(),
        StoreError::NoSuchProperty { .. }
    ));
}

type Events = Arc<Mutex<Vec<ChangeEvent>>>;

fn record_events(events: &Events) -> typed_config::item::ListenerFn {
    let events = events.clone();
    Arc::new(move |event: &ChangeEvent| events.lock().unwrap().push(event.clone()))
}

#[test]
fn listeners_fire_only_on_observable_changes() {
    let registry = server_registry();
    let mut item = registry.new_instance("Server").unwrap();
    let events = Arc::new(Mutex::new(Vec::new()));
    item.add_listener(record_events(&events));

    // Setting the default value is not an observable change.
    item.set("port", Value::Int(8080)).unwrap();
    assert!(events.lock().unwrap().is_empty());

    item.set("port", Value::Int(9000)).unwrap();
    assert_eq!(events.lock().unwrap().len(), 1);
    let event = events.lock().unwrap()[0].clone();
    assert_eq!(event.property, "port");
    assert_eq!(event.old, Value::Int(8080));
    assert_eq!(event.new, Value::Int(9000));

    // Re-setting the same value stays silent.
    item.set("port", Value::Int(9000)).unwrap();
    assert_eq!(events.lock().unwrap().len(), 1);
}

#[test]
fn listener_dispatch_is_synchronous_and_in_registration_order() {
    let registry = server_registry();
    let mut item = registry.new_instance("Server").unwrap();
    let order = Arc::new(Mutex::new(Vec::new()));

    for tag in ["first", "second", "third"] {
        let order = order.clone();
        item.add_listener(Arc::new(move |_event: &ChangeEvent| {
            order.lock().unwrap().push(tag);
        }));
    }

    item.set("port", Value::Int(1)).unwrap();
    // Dispatch completed before set returned.
    assert_eq!(*order.lock().unwrap(), ["first", "second", "third"]);
}

#[test]
fn property_scoped_listeners_ignore_other_properties() {
    let registry = server_registry();
    let mut item = registry.new_instance("Server").unwrap();
    let events = Arc::new(Mutex::new(Vec::new()));
    item.add_property_listener("port", record_events(&events))
        .unwrap();

    item.set("host", Value::text("a")).unwrap();
    assert!(events.lock().unwrap().is_empty());

    item.set("port", Value::Int(1)).unwrap();
    assert_eq!(events.lock().unwrap().len(), 1);
}

#[test]
fn removed_listeners_stop_firing() {
    let registry = server_registry();
    let mut item = registry.new_instance("Server").unwrap();
    let events = Arc::new(Mutex::new(Vec::new()));
    let handle = item.add_listener(record_events(&events));

    assert!(item.remove_listener(handle));
    assert!(!item.remove_listener(handle));

    item.set("port", Value::Int(1)).unwrap();
    assert!(events.lock().unwrap().is_empty());
}

#[test]
fn repeated_reset_notifies_exactly_once() {
    let registry = server_registry();
    let mut item = registry.new_instance("Server").unwrap();
    item.set("port", Value::Int(9000)).unwrap();

    let events = Arc::new(Mutex::new(Vec::new()));
    item.add_listener(record_events(&events));

    item.reset("port").unwrap();
    item.reset("port").unwrap();

    assert_eq!(events.lock().unwrap().len(), 1);
    let event = events.lock().unwrap()[0].clone();
    assert_eq!(event.old, Value::Int(9000));
    assert_eq!(event.new, Value::Int(8080));
    assert!(!item.value_set("port").unwrap());
    assert_eq!(item.get("port").unwrap(), Value::Int(8080));
}

#[test]
fn items_with_equal_observable_state_are_equal() {
    let registry = server_registry();
    let mut a = registry.new_instance("Server").unwrap();
    let b = registry.new_instance("Server").unwrap();

    // Unset versus explicitly-set-to-default still compares equal.
    a.set("port", Value::Int(8080)).unwrap();
    assert_eq!(a, b);

    a.set("port", Value::Int(9000)).unwrap();
    assert_ne!(a, b);
}

#[test]
fn deep_copies_are_independent_and_drop_listeners() {
    let registry = server_registry();
    let mut original = registry.new_instance("Server").unwrap();
    let events = Arc::new(Mutex::new(Vec::new()));
    original.add_listener(record_events(&events));
    original.set("host", Value::text("a")).unwrap();

    let mut copy = original.clone();
    assert_eq!(copy, original);

    copy.set("host", Value::text("b")).unwrap();
    assert_ne!(copy, original);
    assert_eq!(original.get("host").unwrap(), Value::text("a"));
    // Only the original's listener saw a change.
    assert_eq!(events.lock().unwrap().len(), 1);
}

#[test]
fn derived_properties_compute_and_reject_direct_writes() {
    let registry = SchemaRegistry::new();
    registry.register_derived(
        "double-port",
        std::sync::Arc::new(|item: &typed_config::Item| match item.get("port") {
            Ok(Value::Int(port)) => Value::Int(port * 2),
            _ => Value::None,
        }),
    );
    registry.declare(
        ShapeSpec::new("Gateway")
            .accessor(AccessorSpec::getter("getPort", ValueType::Int))
            .accessor(
                AccessorSpec::getter("getUpstreamPort", ValueType::Int).derived("double-port"),
            ),
    );

    let mut item = registry.new_instance("Gateway").unwrap();
    item.set("port", Value::Int(21)).unwrap();
    assert_eq!(item.get("upstream-port").unwrap(), Value::Int(42));
    assert!(!item.value_set("upstream-port").unwrap());

    let error = item.set("upstream-port", Value::Int(5)).unwrap_err();
    assert!(matches!(error, StoreError::DerivedProperty { .. }));
}

#[test]
fn narrowed_property_rejects_base_typed_values() {
    let registry = SchemaRegistry::new();
    registry.declare(
        ShapeSpec::new("Handler").accessor(AccessorSpec::getter("getName", ValueType::Text)),
    );
    registry.declare(
        ShapeSpec::new("SpecialHandler")
            .extends("Handler")
            .accessor(AccessorSpec::getter("getLevel", ValueType::Int)),
    );
    registry.declare(
        ShapeSpec::new("Base")
            .accessor(AccessorSpec::getter("getHandler", ValueType::item("Handler")).nullable()),
    );
    registry.declare(
        ShapeSpec::new("Narrowed").extends("Base").accessor(
            AccessorSpec::getter("getHandler", ValueType::item("SpecialHandler")).nullable(),
        ),
    );

    let plain = registry.new_instance("Handler").unwrap();
    let special = registry.new_instance("SpecialHandler").unwrap();

    let mut base = registry.new_instance("Base").unwrap();
    base.set("handler", Value::item(plain.clone())).unwrap();

    let mut narrowed = registry.new_instance("Narrowed").unwrap();
    let error = narrowed.set("handler", Value::item(plain)).unwrap_err();
    assert!(matches!(error, StoreError::IllegalValue { .. }));
    narrowed.set("handler", Value::item(special)).unwrap();
}

#[test]
fn keyed_lookup_finds_the_first_matching_element() {
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

    let mut worker = registry.new_instance("Worker").unwrap();
    worker.set("name", Value::text("a")).unwrap();
    worker.set("priority", Value::Int(3)).unwrap();

    let mut pool = registry.new_instance("Pool").unwrap();
    pool.set("workers", Value::Collection(vec![Value::item(worker)]))
        .unwrap();

    let found = pool.lookup("workers", &Value::text("a")).unwrap().unwrap();
    assert_eq!(found.as_item().unwrap().get("priority").unwrap(), Value::Int(3));
    assert!(pool.lookup("workers", &Value::text("zz")).unwrap().is_none());
}

#[test]
fn mandatory_properties_are_reported_until_set() {
    let registry = SchemaRegistry::new();
    registry.declare(
        ShapeSpec::new("Job")
            .accessor(AccessorSpec::getter("getId", ValueType::Text).mandatory())
            .accessor(AccessorSpec::getter("getRetries", ValueType::Int)),
    );

    let mut item = registry.new_instance("Job").unwrap();
    assert_eq!(item.unset_mandatory(), ["id"]);

    item.set("id", Value::text("j-1")).unwrap();
    assert!(item.unset_mandatory().is_empty());
}
