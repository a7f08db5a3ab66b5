//! Integration tests for the complete scicat pipeline
//!
//! These tests cross crate and process-session boundaries:
//! - Runtime registry → Catalog → GraphStore snapshot file
//! - Snapshot file → fresh Catalog → rebuilt model instances
//!
//! Run with: cargo test --test integration_tests

use std::path::Path;
use std::sync::Arc;

use scicat_graph::{GraphBackend, GraphStore, Pattern};
use scicat_schema::standard::MOD_RUNNABLE;
use scicat_schema::vocab::*;
use scicat_schema::*;
use tempfile::tempdir;

const FOO_MODULE: &str = "demo.foo";
const DEMO_SCHEMA: &str = "urn:demo:schema";
const DEMO_NS: &str = "urn:demo:schema#";
const CTX1: &str = "urn:demo:ctx1";

struct Demo {
    catalog: Catalog,
    schema: StandardSchema,
    demo: ContextId,
}

/// What every process does at start: register runtime classes and declare
/// catalog classes. Nothing is saved here.
fn declare() -> Demo {
    let catalog = StandardSchema::catalog(NamespaceManager::default());
    catalog.registry().register(
        RuntimeClass::new(FOO_MODULE, "FooModel")
            .with_base(ClassDescriptor::new(MOD_RUNNABLE, "RunnableModel"))
            .with_positional("source")
            .with_setup(SetupSignature::Params(vec![SetupParam::optional("rate")])),
    );
    let schema = StandardSchema::install(&catalog).unwrap();

    let demo = catalog.new_context(DEMO_SCHEMA).unwrap();
    catalog.import_from(demo, schema.sciunit).unwrap();
    catalog
        .define_class(
            demo,
            ClassDef::model(DEMO_NS, "FooModel")
                .runtime(ClassDescriptor::new(FOO_MODULE, "FooModel"))
                .parent(ident_type(BASE_SCHEMA_NS, "RunnableModel"))
                .family(ModelFamily::file_backed(["source"])),
        )
        .unwrap();
    Demo {
        catalog,
        schema,
        demo,
    }
}

fn first_session(path: &Path) {
    let d = declare();
    let mut store = GraphStore::new();

    let ctx1 = d.catalog.new_context(CTX1).unwrap();
    d.catalog.import_from(ctx1, d.demo).unwrap();
    d.catalog
        .add_model(
            ctx1,
            ModelRecord::new("urn:demo:ctx1/foo", format!("{DEMO_NS}FooModel"))
                .named("foo")
                .with_locator("source", "https://example.org/foo.nml")
                .with_attribute("rate", 2.5)
                .unwrap(),
        )
        .unwrap();

    for ctx in [d.schema.sciunit, d.schema.neuronunit, d.demo, ctx1] {
        d.catalog.save_context(ctx, &mut store).unwrap();
    }
    store.save_to_path(path).unwrap();
}

// ============================================================================
// Save in one session, rebuild in the next
// ============================================================================

#[test]
fn test_runnable_model_survives_new_session() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("catalog.scpd");
    first_session(&path);

    let d = declare();
    let store = GraphStore::load_from_path(&path).unwrap();
    let ctx1 = d.catalog.open_context(CTX1, &store).unwrap();

    let records = d.catalog.list_models(ctx1, &store).unwrap();
    assert_eq!(records.len(), 1);

    let foo = d
        .catalog
        .registry()
        .resolve(&ClassDescriptor::new(FOO_MODULE, "FooModel"))
        .unwrap();
    let instance = d.catalog.instantiate(ctx1, &store, &records[0]).unwrap();

    assert_eq!(instance.attr("rate"), Some(&AttrValue::Float(2.5)));
    assert_eq!(instance.locator("source"), Some("https://example.org/foo.nml"));
    assert_eq!(instance.name(), Some("foo"));
    assert!(Arc::ptr_eq(instance.class(), &foo));
    assert!(instance.is_instance_of(&foo, d.catalog.registry()).unwrap());

    let runnable = d
        .catalog
        .registry()
        .resolve(&ClassDescriptor::new(MOD_RUNNABLE, "RunnableModel"))
        .unwrap();
    assert!(instance.is_instance_of(&runnable, d.catalog.registry()).unwrap());
}

#[test]
fn test_stored_capabilities_are_queryable_after_reload() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("catalog.scpd");
    first_session(&path);

    let d = declare();
    let store = GraphStore::load_from_path(&path).unwrap();
    let ctx1 = d.catalog.open_context(CTX1, &store).unwrap();
    let chain = d.catalog.contexts().chain(ctx1).unwrap();
    assert_eq!(
        chain,
        vec![CTX1, DEMO_SCHEMA, BASE_SCHEMA_URL]
            .into_iter()
            .map(String::from)
            .collect::<Vec<_>>()
    );

    let runnable = ClassDescriptor::new("sciunit.capabilities", "Runnable");
    let declaring = store
        .query(
            &chain,
            &Pattern::new()
                .of_type(TYPE_TYPE_DESCRIPTION)
                .with_link(REL_CAPABILITY, runnable.ident()),
        )
        .unwrap();
    let names: Vec<&str> = declaring.iter().filter_map(|e| e.attr(ATTR_NAME)).collect();
    assert_eq!(names, vec!["FooModel", "RunnableModel"]);

    let kinds = d.catalog.list_model_kinds(ctx1, &store, false).unwrap();
    assert_eq!(
        kinds,
        vec![
            "sciunit:Model".to_string(),
            "sciunit:RunnableModel".to_string(),
            format!("{DEMO_NS}FooModel"),
        ]
    );
}

#[test]
fn test_missing_runtime_module_in_new_session() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("catalog.scpd");
    first_session(&path);

    let d = declare();
    d.catalog.registry().remove_module(FOO_MODULE);
    let store = GraphStore::load_from_path(&path).unwrap();
    let ctx1 = d.catalog.open_context(CTX1, &store).unwrap();

    let records = d.catalog.list_models(ctx1, &store).unwrap();
    let err = d
        .catalog
        .instantiate(ctx1, &store, &records[0])
        .unwrap_err();
    assert!(matches!(err, SchemaError::ClassNotFound { .. }));
    assert!(!err.is_fatal());
}

#[test]
fn test_resaving_schema_does_not_duplicate_descriptors() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("catalog.scpd");
    first_session(&path);

    let d = declare();
    let mut store = GraphStore::load_from_path(&path).unwrap();
    d.catalog.save_context(d.schema.sciunit, &mut store).unwrap();

    let chain = vec![BASE_SCHEMA_URL.to_string()];
    let model_descriptors = store
        .query(
            &chain,
            &Pattern::new()
                .of_type(TYPE_CLASS_DESCRIPTION)
                .with_attr(ATTR_NAME, "RunnableModel"),
        )
        .unwrap();
    assert_eq!(model_descriptors.len(), 1);
    assert_eq!(store.entity_count(BASE_SCHEMA_URL), {
        let fresh = declare();
        let mut other = GraphStore::new();
        fresh
            .catalog
            .save_context(fresh.schema.sciunit, &mut other)
            .unwrap();
        other.entity_count(BASE_SCHEMA_URL)
    });
}
