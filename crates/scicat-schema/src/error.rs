use thiserror::Error;

use crate::descriptor::ClassDescriptor;

pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors surfaced by the schema engine.
///
/// Every error is local to the operation that raised it. The engine never
/// retries and never rolls back beyond reverting a failed materialization.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Adding the import would close a cycle in the import DAG.
    #[error("importing {imported} into {context} would create an import cycle")]
    Cycle { context: String, imported: String },

    /// The ancestor chain of a runtime class could not be computed.
    #[error("cannot inspect ancestors of {class}: {reason}")]
    Introspection { class: String, reason: String },

    /// No runtime module with this qualifier is registered.
    #[error("module `{module}` not found while resolving {descriptor}")]
    ClassNotFound {
        module: String,
        descriptor: ClassDescriptor,
    },

    /// The module is registered but has no class with this name.
    #[error("module `{module}` has no class `{name}`")]
    AttributeMissing { module: String, name: String },

    /// Two descriptor entities exist for one (name, module) pair in a context.
    /// This indicates store corruption and is never recoverable.
    #[error("duplicate class descriptors for {descriptor} in context {context}")]
    DuplicateDescriptor {
        descriptor: ClassDescriptor,
        context: String,
    },

    #[error("context {0} is frozen; it was already saved")]
    ContextFrozen(String),

    #[error("unknown context {0}")]
    UnknownContext(String),

    #[error("context {0} already exists")]
    ContextExists(String),

    #[error("context {context} is still imported by {importer}")]
    ContextInUse { context: String, importer: String },

    #[error("unknown catalog class {0}")]
    UnknownClass(String),

    #[error("catalog class {0} is already defined")]
    DuplicateClass(String),

    #[error("catalog class {0} is not a model class")]
    NotAModelClass(String),

    #[error("catalog class {0} is not a test class")]
    NotATestClass(String),

    /// A stored entity's type has no stored type description reachable from
    /// the reading context.
    #[error("no type description for {0} is visible from this context")]
    UnknownType(String),

    /// A stored entity is missing data the engine always writes.
    #[error("stored entity {ident} is malformed: {reason}")]
    CorruptEntity { ident: String, reason: String },

    #[error("attribute `{0}` is already present in the snapshot")]
    DuplicateAttribute(String),

    /// Construction arguments do not fit the runtime class's setup routine.
    #[error(
        "setup of {class} rejected arguments (unexpected: {unexpected:?}, missing: {missing:?})"
    )]
    SetupMismatch {
        class: String,
        unexpected: Vec<String>,
        missing: Vec<String>,
    },

    #[error("model {ident} has no value for locator `{locator}`")]
    MissingLocator { ident: String, locator: String },

    /// A locator key collides with an attribute the engine writes itself.
    #[error("model {ident} uses reserved key `{locator}` as a locator")]
    ReservedLocator { ident: String, locator: String },

    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl SchemaError {
    /// Invariant failures that indicate a consistency bug rather than a
    /// caller mistake. These must not be retried.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SchemaError::DuplicateDescriptor { .. } | SchemaError::CorruptEntity { .. }
        )
    }

    pub(crate) fn corrupt(ident: impl Into<String>, reason: impl Into<String>) -> Self {
        SchemaError::CorruptEntity {
            ident: ident.into(),
            reason: reason.into(),
        }
    }
}
