//! Catalog classes: the persisted kinds (`Model`, `RunnableModel`, `Test`, ...)
//! that stored entities are typed by.

use crate::context::ContextId;
use crate::descriptor::ClassDescriptor;
use crate::model::ModelFamily;
use crate::type_description::TypeDescription;
use crate::vocab::ident_type;

/// Kind of a catalog class, after inheritance has been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassKind {
    Plain,
    Model(ModelFamily),
    Test,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum DeclaredKind {
    Plain,
    /// `None` inherits the parent's family.
    Model(Option<ModelFamily>),
    Test,
}

/// Declaration of a catalog class, as passed to
/// [`crate::Catalog::define_class`].
#[derive(Debug, Clone)]
pub struct ClassDef {
    pub(crate) namespace: String,
    pub(crate) name: String,
    pub(crate) runtime: Option<ClassDescriptor>,
    pub(crate) parent: Option<String>,
    kind: DeclaredKind,
}

impl ClassDef {
    fn new(namespace: &str, name: &str, kind: DeclaredKind) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
            runtime: None,
            parent: None,
            kind,
        }
    }

    pub fn plain(namespace: &str, name: &str) -> Self {
        Self::new(namespace, name, DeclaredKind::Plain)
    }

    pub fn model(namespace: &str, name: &str) -> Self {
        Self::new(namespace, name, DeclaredKind::Model(None))
    }

    pub fn test(namespace: &str, name: &str) -> Self {
        Self::new(namespace, name, DeclaredKind::Test)
    }

    /// Runtime class this catalog class stands for. Omitted → parent's.
    pub fn runtime(mut self, descriptor: ClassDescriptor) -> Self {
        self.runtime = Some(descriptor);
        self
    }

    /// Parent catalog class, by identifier.
    pub fn parent(mut self, ident: impl Into<String>) -> Self {
        self.parent = Some(ident.into());
        self
    }

    /// Construction family of a model class. Ignored for other kinds.
    pub fn family(mut self, family: ModelFamily) -> Self {
        if let DeclaredKind::Model(slot) = &mut self.kind {
            *slot = Some(family);
        }
        self
    }

    pub fn ident(&self) -> String {
        ident_type(&self.namespace, &self.name)
    }

    /// Resolve the declared kind against the parent's resolved kind.
    pub(crate) fn resolve_kind(&self, parent: Option<&ClassKind>) -> ClassKind {
        match &self.kind {
            DeclaredKind::Plain => ClassKind::Plain,
            DeclaredKind::Test => ClassKind::Test,
            DeclaredKind::Model(Some(family)) => ClassKind::Model(family.clone()),
            DeclaredKind::Model(None) => match parent {
                Some(ClassKind::Model(family)) => ClassKind::Model(family.clone()),
                _ => ClassKind::Model(ModelFamily::Base),
            },
        }
    }
}

/// A defined catalog class with its (deferred) Type Description.
#[derive(Debug)]
pub struct CatalogClass {
    pub ident: String,
    pub name: String,
    pub namespace: String,
    pub context: ContextId,
    /// Runtime class, after inheritance from the parent.
    pub runtime: Option<ClassDescriptor>,
    /// Whether `runtime` was declared on this class rather than inherited.
    pub runtime_declared: bool,
    pub parent: Option<String>,
    pub kind: ClassKind,
    pub type_description: TypeDescription,
}

impl CatalogClass {
    pub fn is_model(&self) -> bool {
        matches!(self.kind, ClassKind::Model(_))
    }

    pub fn is_test(&self) -> bool {
        matches!(self.kind, ClassKind::Test)
    }

    pub fn family(&self) -> Option<&ModelFamily> {
        match &self.kind {
            ClassKind::Model(family) => Some(family),
            _ => None,
        }
    }
}
