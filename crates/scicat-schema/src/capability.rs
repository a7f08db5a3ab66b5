//! Capability Inferencer.
//!
//! A model class declares every capability marker found in its ancestor
//! chain, in chain order, once each. The abstract capability root is never
//! declared, and neither is an ancestor that is itself in the model family.

use std::collections::HashSet;
use std::sync::Arc;

use crate::descriptor::ClassDescriptor;
use crate::error::SchemaResult;
use crate::runtime::{FamilyRoots, RuntimeRegistry};

/// Source of ancestor chains. The registry is the production provider.
pub trait AncestorProvider {
    /// Ancestors of `class` in resolution order, the class itself first.
    fn ancestors(&self, class: &ClassDescriptor) -> SchemaResult<Arc<[ClassDescriptor]>>;

    fn is_subclass(&self, sub: &ClassDescriptor, sup: &ClassDescriptor) -> SchemaResult<bool> {
        Ok(self.ancestors(sub)?.iter().any(|a| a == sup))
    }
}

impl AncestorProvider for RuntimeRegistry {
    fn ancestors(&self, class: &ClassDescriptor) -> SchemaResult<Arc<[ClassDescriptor]>> {
        RuntimeRegistry::ancestors(self, class)
    }
}

pub struct CapabilityInferencer<'a> {
    provider: &'a dyn AncestorProvider,
    roots: &'a FamilyRoots,
}

impl<'a> CapabilityInferencer<'a> {
    pub fn new(provider: &'a dyn AncestorProvider, roots: &'a FamilyRoots) -> Self {
        Self { provider, roots }
    }

    /// Ordered, duplicate-free capability markers declared by `class`.
    pub fn infer(&self, class: &ClassDescriptor) -> SchemaResult<Vec<ClassDescriptor>> {
        let chain = self.provider.ancestors(class)?;
        let mut seen = HashSet::new();
        let mut caps = Vec::new();
        for ancestor in chain.iter() {
            if ancestor == &self.roots.capability_root || seen.contains(ancestor) {
                continue;
            }
            if !self
                .provider
                .is_subclass(ancestor, &self.roots.capability_root)?
            {
                continue;
            }
            if self.provider.is_subclass(ancestor, &self.roots.model_root)? {
                continue;
            }
            seen.insert(ancestor.clone());
            caps.push(ancestor.clone());
        }
        Ok(caps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::RuntimeClass;

    fn d(name: &str) -> ClassDescriptor {
        ClassDescriptor::new("t", name)
    }

    fn registry() -> (RuntimeRegistry, FamilyRoots) {
        let reg = RuntimeRegistry::new();
        reg.register(RuntimeClass::new("t", "Model"));
        reg.register(RuntimeClass::new("t", "Capability"));
        reg.register(RuntimeClass::new("t", "Cap1").with_base(d("Capability")));
        reg.register(RuntimeClass::new("t", "Cap2").with_base(d("Cap1")));
        reg.register(RuntimeClass::new("t", "Helper"));
        let roots = FamilyRoots {
            model_root: d("Model"),
            capability_root: d("Capability"),
        };
        (reg, roots)
    }

    #[test]
    fn narrower_capability_does_not_hide_broader_one() {
        let (reg, roots) = registry();
        reg.register(
            RuntimeClass::new("t", "M").with_bases([d("Model"), d("Cap2"), d("Helper"), d("Cap1")]),
        );
        let caps = CapabilityInferencer::new(&reg, &roots).infer(&d("M")).unwrap();
        assert_eq!(caps, vec![d("Cap2"), d("Cap1")]);
    }

    #[test]
    fn model_that_is_also_a_capability_does_not_self_declare() {
        let (reg, roots) = registry();
        reg.register(RuntimeClass::new("t", "Hybrid").with_bases([d("Model"), d("Cap1")]));
        reg.register(RuntimeClass::new("t", "Sub").with_base(d("Hybrid")));

        let caps = CapabilityInferencer::new(&reg, &roots)
            .infer(&d("Sub"))
            .unwrap();
        assert_eq!(caps, vec![d("Cap1")]);
    }

    #[test]
    fn unregistered_base_surfaces_introspection_error() {
        let (reg, roots) = registry();
        reg.register(RuntimeClass::new("t", "Orphan").with_base(d("Missing")));
        assert!(CapabilityInferencer::new(&reg, &roots)
            .infer(&d("Orphan"))
            .is_err());
    }
}
