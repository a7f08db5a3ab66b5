//! Class Resolver: descriptor → runtime class handle.

use crate::descriptor::ClassDescriptor;
use crate::error::{SchemaError, SchemaResult};
use crate::runtime::{ClassHandle, RuntimeRegistry};

pub trait ClassResolver {
    /// Load the runtime class named by `descriptor`.
    ///
    /// Fails with [`SchemaError::ClassNotFound`] when the module is not
    /// registered and [`SchemaError::AttributeMissing`] when the module exists
    /// but has no such class. Never falls back to a default class.
    fn resolve(&self, descriptor: &ClassDescriptor) -> SchemaResult<ClassHandle>;
}

impl ClassResolver for RuntimeRegistry {
    fn resolve(&self, descriptor: &ClassDescriptor) -> SchemaResult<ClassHandle> {
        if !self.has_module(descriptor.module()) {
            return Err(SchemaError::ClassNotFound {
                module: descriptor.module().to_string(),
                descriptor: descriptor.clone(),
            });
        }
        self.lookup(descriptor)
            .ok_or_else(|| SchemaError::AttributeMissing {
                module: descriptor.module().to_string(),
                name: descriptor.name().to_string(),
            })
    }
}
