//! Catalog vocabulary: the entity types, relations and attributes the engine
//! writes into the graph store, plus the namespaces and identifier helpers.
//!
//! Keeping these in one place avoids accidental drift between the code that
//! saves a context and the code that reads it back in a later session.

// -----------------------------------------------------------------------------
// Namespaces
// -----------------------------------------------------------------------------

pub const BASE_SCHEMA_URL: &str = "http://schema.openworm.org/2020/07/sciunit";
pub const BASE_SCHEMA_NS: &str = "http://schema.openworm.org/2020/07/sciunit/";

pub const BASE_DATA_URL: &str = "http://data.openworm.org/sciunit";
pub const BASE_DATA_NS: &str = "http://data.openworm.org/sciunit/";

pub const BASE_NU_SCHEMA_URL: &str = "http://schema.openworm.org/2020/07/neuronunit";
pub const BASE_NU_SCHEMA_NS: &str = "http://schema.openworm.org/2020/07/neuronunit/";

pub const BASE_NU_DATA_NS: &str = "http://data.openworm.org/neuronunit/";

// -----------------------------------------------------------------------------
// Entity types
// -----------------------------------------------------------------------------

pub const TYPE_CLASS_DESCRIPTION: &str = "ClassDescription";
pub const TYPE_MODULE: &str = "Module";
pub const TYPE_TYPE_DESCRIPTION: &str = "TypeDescription";
pub const TYPE_MODEL_ATTRIBUTE: &str = "RunnableModelAttribute";

// -----------------------------------------------------------------------------
// Relations (link labels)
// -----------------------------------------------------------------------------

/// ClassDescription → Module
pub const REL_MODULE: &str = "module";

/// TypeDescription → ClassDescription of the runtime class it stands for.
pub const REL_SCIUNIT_CLASS: &str = "sciunit_class";

/// TypeDescription → ClassDescription of a capability marker (multi-valued).
pub const REL_CAPABILITY: &str = "capability";

/// TypeDescription → parent TypeDescription.
pub const REL_SUBCLASS_OF: &str = "subclass_of";

/// Model entity → RunnableModelAttribute (multi-valued).
pub const REL_ATTRIBUTE: &str = "attribute";

// -----------------------------------------------------------------------------
// Attributes
// -----------------------------------------------------------------------------

pub const ATTR_NAME: &str = "name";
pub const ATTR_VALUE: &str = "value";
pub const ATTR_DESCRIPTION: &str = "description";

/// Position of an attribute within its snapshot, so reload keeps order.
pub const ATTR_INDEX: &str = "index";

/// Attribute keys the engine writes on stored entities.
pub const RESERVED_ATTRS: &[&str] = &[ATTR_NAME, ATTR_VALUE, ATTR_DESCRIPTION, ATTR_INDEX];

// -----------------------------------------------------------------------------
// Identifier helpers
// -----------------------------------------------------------------------------

pub fn ident_module(module: &str) -> String {
    format!("{BASE_DATA_NS}Module#{module}")
}

pub fn ident_class_description(module: &str, name: &str) -> String {
    format!("{BASE_DATA_NS}ClassDescription#{module}.{name}")
}

pub fn ident_model_attribute(model_ident: &str, attr_name: &str) -> String {
    format!("{model_ident}#attribute/{attr_name}")
}

/// Catalog class identifier: schema namespace + simple name.
pub fn ident_type(namespace: &str, name: &str) -> String {
    format!("{namespace}{name}")
}
