//! Mirror catalog classes for runtime classes defined outside the schema.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::catalog::Catalog;
use crate::class::{CatalogClass, ClassDef, ClassKind};
use crate::context::ContextId;
use crate::error::{SchemaError, SchemaResult};
use crate::runtime::ClassHandle;
use crate::vocab::ident_type;

/// Defines one catalog class per runtime class, named after it, under a
/// fixed namespace and context.
///
/// The mirror's parent is the first class in the runtime ancestor chain that
/// already has a catalog class visible from the context; its kind follows
/// the parent's.
pub struct ClassFactory {
    context: ContextId,
    namespace: String,
}

/// Mirrors created by one [`ClassFactory::create_classes`] call, by simple
/// name, in argument order.
#[derive(Debug, Default, Clone)]
pub struct MirroredClasses {
    classes: IndexMap<String, Arc<CatalogClass>>,
}

impl MirroredClasses {
    pub fn get(&self, name: &str) -> Option<&Arc<CatalogClass>> {
        self.classes.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<CatalogClass>> {
        self.classes.values()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl ClassFactory {
    pub fn new(context: ContextId, namespace: impl Into<String>) -> Self {
        Self {
            context,
            namespace: namespace.into(),
        }
    }

    /// Catalog class mirroring `runtime`. Repeated calls return the same class.
    pub fn create(&self, catalog: &Catalog, runtime: &ClassHandle) -> SchemaResult<Arc<CatalogClass>> {
        let descriptor = &runtime.descriptor;
        let ident = ident_type(&self.namespace, descriptor.name());
        if let Some(existing) = catalog.defined_class(self.context, &ident) {
            if existing.runtime.as_ref() == Some(descriptor) {
                return Ok(existing);
            }
            return Err(SchemaError::DuplicateClass(ident));
        }

        let ancestors = catalog.registry().ancestors(descriptor)?;
        let mut parent = None;
        for ancestor in ancestors.iter().skip(1) {
            if let Some(found) = catalog.class_for_runtime(self.context, ancestor)? {
                parent = Some(found);
                break;
            }
        }
        let parent = parent.ok_or_else(|| SchemaError::Introspection {
            class: descriptor.to_string(),
            reason: "no ancestor has a catalog class".to_string(),
        })?;

        let def = match &parent.kind {
            ClassKind::Model(_) => ClassDef::model(&self.namespace, descriptor.name()),
            ClassKind::Test => ClassDef::test(&self.namespace, descriptor.name()),
            ClassKind::Plain => ClassDef::plain(&self.namespace, descriptor.name()),
        };
        catalog.define_class(
            self.context,
            def.runtime(descriptor.clone()).parent(parent.ident.clone()),
        )
    }

    /// Mirror several runtime classes in order. A class listed after one of
    /// its ancestors gets that ancestor's mirror as parent.
    pub fn create_classes<'a, I>(&self, catalog: &Catalog, runtimes: I) -> SchemaResult<MirroredClasses>
    where
        I: IntoIterator<Item = &'a ClassHandle>,
    {
        let mut out = MirroredClasses::default();
        for runtime in runtimes {
            let class = self.create(catalog, runtime)?;
            out.classes.insert(class.name.clone(), class);
        }
        Ok(out)
    }
}
