//! scicat-schema: derives a persisted type catalog from a runtime class
//! hierarchy and rebuilds live objects from it.
//!
//! ```text
//!   define_class ──► TypeDescription (UNINITIALIZED)
//!                          │ first access
//!                          ▼
//!          RuntimeRegistry::ancestors ──► CapabilityInferencer
//!                          │
//!                          ▼
//!                 TypeDescription (READY)
//!                          │ save_context
//!                          ▼
//!     GraphBackend: Module / ClassDescription / TypeDescription / models
//!                          │ list_models + instantiate (later session)
//!                          ▼
//!       ClassResolver ──► ModelFamily::construct ──► ModelInstance
//! ```
//!
//! The graph store is an external collaborator reached only through
//! [`scicat_graph::GraphBackend`].

pub mod capability;
pub mod catalog;
pub mod class;
pub mod config;
pub mod context;
pub mod descriptor;
pub mod error;
pub mod factory;
pub mod model;
pub mod namespace;
pub mod resolver;
pub mod runtime;
pub mod standard;
pub mod testing;
pub mod type_description;
pub mod vocab;

pub use capability::{AncestorProvider, CapabilityInferencer};
pub use catalog::{Catalog, SaveSummary};
pub use class::{CatalogClass, ClassDef, ClassKind};
pub use config::CatalogConfig;
pub use context::{ContextId, ContextRegistry};
pub use descriptor::ClassDescriptor;
pub use error::{SchemaError, SchemaResult};
pub use factory::{ClassFactory, MirroredClasses};
pub use model::{AttrValue, AttributeSnapshot, ModelFamily, ModelInstance, ModelRecord};
pub use namespace::NamespaceManager;
pub use resolver::ClassResolver;
pub use runtime::{
    ClassHandle, FamilyRoots, RuntimeClass, RuntimeRegistry, SetupParam, SetupSignature,
};
pub use standard::StandardSchema;
pub use testing::{TestInstance, TestRecord};
pub use type_description::{MaterializationState, MaterializedType, TypeDescription};
