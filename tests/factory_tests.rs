//! Tests for the instantiation factory: constructor resolution, error
//! policies and context sharing across nested builds.

use std::sync::Arc;
use typed_config::error::InstantiationError;
use typed_config::factory::{InstantiationContext, InstantiationFactory};
use typed_config::schema::{AccessorSpec, SchemaRegistry, ShapeSpec};
use typed_config::value::{Value, ValueType};

/// A trivial constructed service.
#[derive(Debug, PartialEq)]
struct Echo {
    label: String,
}

fn service_registry() -> Arc<SchemaRegistry> {
    let registry = Arc::new(SchemaRegistry::new());
    registry.declare(
        ShapeSpec::polymorphic("Service")
            .accessor(AccessorSpec::getter("getLabel", ValueType::Text)),
    );
    registry.register_constructor(
        "echo",
        Arc::new(|_context, config| {
            let label = match config.get("label") {
                Ok(Value::Text(label)) => label,
                _ => String::new(),
            };
            Ok(Box::new(Echo { label }))
        }),
    );
    registry.register_constructor(
        "failing",
        Arc::new(|_context, _config| {
            Err(InstantiationError::ConstructionFailed {
                name: "failing".to_string(),
                reason: "refused to start".to_string(),
            })
        }),
    );
    registry.register_broken_constructor("unloadable", "backing type missing");
    registry
}

fn service_config(registry: &SchemaRegistry, class: &str, label: &str) -> typed_config::Item {
    let mut item = registry.new_instance("Service").unwrap();
    item.set("class", Value::text(class)).unwrap();
    item.set("label", Value::text(label)).unwrap();
    item
}

#[test]
fn instantiation_resolves_the_selector_and_constructs() {
    let registry = service_registry();
    let factory = InstantiationFactory::new(&registry);
    let mut context = InstantiationContext::fail_fast();

    let config = service_config(&registry, "echo", "hello");
    let object = factory.instantiate(&mut context, &config).unwrap().unwrap();
    let echo = object.downcast::<Echo>().unwrap();
    assert_eq!(
        *echo,
        Echo {
            label: "hello".to_string()
        }
    );
    assert!(!context.has_problems());
}

#[test]
fn missing_selector_is_reported_through_the_policy() {
    let registry = service_registry();
    let factory = InstantiationFactory::new(&registry);
    let mut context = InstantiationContext::fail_fast();

    let config = registry.new_instance("Service").unwrap();
    let error = factory.instantiate(&mut context, &config).unwrap_err();
    assert!(matches!(error, InstantiationError::MissingSelector { .. }));
}

#[test]
fn fail_fast_raises_at_the_call_site_and_keeps_serving() {
    let registry = service_registry();
    let factory = InstantiationFactory::new(&registry);
    let mut context = InstantiationContext::fail_fast();

    let broken = service_config(&registry, "failing", "x");
    let error = factory.instantiate(&mut context, &broken).unwrap_err();
    assert!(error.to_string().contains("refused to start"), "{error}");

    // The raised problem is not resurfaced by later queries.
    assert!(context.check().is_ok());

    // The context keeps accepting further requests.
    let good = service_config(&registry, "echo", "next");
    assert!(factory.instantiate(&mut context, &good).unwrap().is_some());
}

#[test]
fn collect_policy_returns_a_placeholder_and_records_the_problem() {
    let registry = service_registry();
    let factory = InstantiationFactory::new(&registry);
    let mut context = InstantiationContext::collect();

    let broken = service_config(&registry, "failing", "x");
    let placeholder = factory.instantiate(&mut context, &broken).unwrap();
    assert!(placeholder.is_none());

    let good = service_config(&registry, "echo", "ok");
    assert!(factory.instantiate(&mut context, &good).unwrap().is_some());

    assert_eq!(context.problems().len(), 1);
    assert!(context.check().is_err());
    assert!(context.check().is_ok());
}

#[test]
fn unloadable_implementations_fail_only_their_own_requests() {
    let registry = service_registry();
    let factory = InstantiationFactory::new(&registry);
    let mut context = InstantiationContext::collect();

    let broken = service_config(&registry, "unloadable", "x");
    assert!(factory.instantiate(&mut context, &broken).unwrap().is_none());
    assert!(
        context.problems()[0]
            .to_string()
            .contains("backing type missing")
    );

    let good = service_config(&registry, "echo", "ok");
    assert!(factory.instantiate(&mut context, &good).unwrap().is_some());
}

#[test]
fn unregistered_implementations_are_unresolved() {
    let registry = service_registry();
    let factory = InstantiationFactory::new(&registry);
    let mut context = InstantiationContext::fail_fast();

    let config = service_config(&registry, "nowhere", "x");
    let error = factory.instantiate(&mut context, &config).unwrap_err();
    assert!(matches!(
        error,
        InstantiationError::UnresolvedImplementation { .. }
    ));
    assert!(error.to_string().contains("nowhere"), "{error}");
}

/// A composite that instantiates its children through the same context.
struct Composite {
    children: Vec<Echo>,
}

#[test]
fn nested_instantiation_shares_one_context() {
    let registry = service_registry();
    registry.declare(
        ShapeSpec::polymorphic("CompositeService").accessor(AccessorSpec::getter(
            "getChildren",
            ValueType::list_of(ValueType::item("Service")),
        )),
    );

    let nested_registry = registry.clone();
    registry.register_constructor(
        "composite",
        Arc::new(move |context, config| {
            let factory = InstantiationFactory::new(&nested_registry);
            let mut children = Vec::new();
            if let Ok(Value::Collection(elements)) = config.get("children") {
                for element in &elements {
                    if let Value::Item(child_config) = element {
                        if let Some(object) = factory.instantiate(context, child_config)? {
                            if let Ok(echo) = object.downcast::<Echo>() {
                                children.push(*echo);
                            }
                        }
                    }
                }
            }
            Ok(Box::new(Composite { children }))
        }),
    );

    let mut composite = registry.new_instance("CompositeService").unwrap();
    composite.set("class", Value::text("composite")).unwrap();
    composite
        .set(
            "children",
            Value::Collection(vec![
                Value::item(service_config(&registry, "echo", "a")),
                Value::item(service_config(&registry, "failing", "b")),
                Value::item(service_config(&registry, "echo", "c")),
            ]),
        )
        .unwrap();

    let factory = InstantiationFactory::new(&registry);
    let mut context = InstantiationContext::collect();
    let object = factory.instantiate(&mut context, &composite).unwrap().unwrap();
    let composite = object.downcast::<Composite>().unwrap();

    // The failing child left a placeholder; its siblings constructed, and
    // the shared context saw the nested problem.
    assert_eq!(composite.children.len(), 2);
    assert_eq!(context.problems().len(), 1);
    assert!(context.problems()[0].to_string().contains("refused to start"));
}
