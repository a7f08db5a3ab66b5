//! Class Descriptors: the identity of a runtime class as catalog data.
//!
//! A descriptor is a `(name, module)` pair. It never holds a live reference to
//! the runtime class; the [`crate::runtime::RuntimeRegistry`] turns it back
//! into a handle.

use std::fmt;

use scicat_graph::{Entity, GraphBackend, Pattern};
use serde::{Deserialize, Serialize};

use crate::error::{SchemaError, SchemaResult};
use crate::vocab::*;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClassDescriptor {
    name: String,
    module: String,
}

impl ClassDescriptor {
    pub fn new(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            module: module.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    /// `module.Name`
    pub fn qualified(&self) -> String {
        format!("{}.{}", self.module, self.name)
    }

    /// Identifier of the stored `ClassDescription` entity.
    pub fn ident(&self) -> String {
        ident_class_description(&self.module, &self.name)
    }

    pub fn module_ident(&self) -> String {
        ident_module(&self.module)
    }

    /// The two entities that persist this descriptor: its `Module` and its
    /// `ClassDescription`.
    pub fn to_entities(&self) -> [Entity; 2] {
        let module = Entity::new(self.module_ident(), TYPE_MODULE).with_attr(ATTR_NAME, &self.module);
        let class = Entity::new(self.ident(), TYPE_CLASS_DESCRIPTION)
            .with_attr(ATTR_NAME, &self.name)
            .with_link(REL_MODULE, self.module_ident());
        [module, class]
    }

    /// Read a descriptor back from its stored `ClassDescription` entity.
    pub fn load(store: &dyn GraphBackend, chain: &[String], ident: &str) -> SchemaResult<Self> {
        let class = store
            .get(ident, chain)?
            .ok_or_else(|| SchemaError::corrupt(ident, "class description not found"))?;
        if class.entity_type != TYPE_CLASS_DESCRIPTION {
            return Err(SchemaError::corrupt(
                ident,
                format!("expected {TYPE_CLASS_DESCRIPTION}, found {}", class.entity_type),
            ));
        }
        let name = class
            .attr(ATTR_NAME)
            .ok_or_else(|| SchemaError::corrupt(ident, "class description has no name"))?;
        let module_ident = class
            .link(REL_MODULE)
            .ok_or_else(|| SchemaError::corrupt(ident, "class description has no module"))?;
        let module = store
            .get(module_ident, chain)?
            .ok_or_else(|| SchemaError::corrupt(module_ident, "module not found"))?;
        let module_name = module
            .attr(ATTR_NAME)
            .ok_or_else(|| SchemaError::corrupt(module_ident, "module has no name"))?;

        let descriptor = Self::new(module_name, name);
        descriptor.check_unique(store, chain)?;
        Ok(descriptor)
    }

    /// Descriptor creation is idempotent, so a second entity for the same
    /// `(name, module)` can only come from a corrupted store.
    fn check_unique(&self, store: &dyn GraphBackend, chain: &[String]) -> SchemaResult<()> {
        let pattern = Pattern::new()
            .of_type(TYPE_CLASS_DESCRIPTION)
            .with_attr(ATTR_NAME, &self.name)
            .with_link(REL_MODULE, self.module_ident());
        let found = store.query(chain, &pattern)?;
        if found.len() > 1 {
            return Err(SchemaError::DuplicateDescriptor {
                descriptor: self.clone(),
                context: chain.first().cloned().unwrap_or_default(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for ClassDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.module, self.name)
    }
}
