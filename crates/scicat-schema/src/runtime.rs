//! Runtime class registry.
//!
//! Every model, capability and test family registers its runtime classes here
//! at process start. The registry answers two questions for the rest of the
//! engine:
//!
//! - **Ancestors**: the method-resolution order of a class (C3 linearization
//!   over the declared bases), computed on first request and cached.
//! - **Resolution**: descriptor → live [`ClassHandle`] (see [`crate::resolver`]).
//!
//! Bases are declared by descriptor, so a class may name a base that is
//! registered later. Until then, asking for its ancestors fails with
//! [`SchemaError::Introspection`] and nothing is cached.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::descriptor::ClassDescriptor;
use crate::error::{SchemaError, SchemaResult};

// ============================================================================
// Runtime classes
// ============================================================================

/// One keyword parameter accepted by a runtime class's setup routine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupParam {
    pub name: String,
    pub required: bool,
}

impl SetupParam {
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: false,
        }
    }
}

/// What the bulk attribute-setting call of a runtime class accepts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SetupSignature {
    /// Any keyword attributes.
    #[default]
    Open,
    Params(Vec<SetupParam>),
}

#[derive(Debug, Clone)]
pub struct RuntimeClass {
    pub descriptor: ClassDescriptor,
    /// Direct bases in declaration order.
    pub bases: Vec<ClassDescriptor>,
    /// Names of positional constructor arguments after the declared name.
    pub positional: Vec<String>,
    pub setup: SetupSignature,
}

impl RuntimeClass {
    pub fn new(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            descriptor: ClassDescriptor::new(module, name),
            bases: Vec::new(),
            positional: Vec::new(),
            setup: SetupSignature::Open,
        }
    }

    pub fn with_base(mut self, base: ClassDescriptor) -> Self {
        self.bases.push(base);
        self
    }

    pub fn with_bases<I>(mut self, bases: I) -> Self
    where
        I: IntoIterator<Item = ClassDescriptor>,
    {
        self.bases.extend(bases);
        self
    }

    pub fn with_positional(mut self, name: impl Into<String>) -> Self {
        self.positional.push(name.into());
        self
    }

    pub fn with_setup(mut self, setup: SetupSignature) -> Self {
        self.setup = setup;
        self
    }
}

/// Live reference to a registered runtime class. Two handles are the same
/// class iff `Arc::ptr_eq` holds.
pub type ClassHandle = Arc<RuntimeClass>;

/// The two marker roots that split the hierarchy into families.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FamilyRoots {
    pub model_root: ClassDescriptor,
    pub capability_root: ClassDescriptor,
}

// ============================================================================
// RuntimeRegistry
// ============================================================================

type Linearization = Arc<[ClassDescriptor]>;

/// Process-wide table of runtime classes, keyed by module then class name.
#[derive(Default)]
pub struct RuntimeRegistry {
    modules: RwLock<IndexMap<String, IndexMap<String, ClassHandle>>>,
    mro_cache: RwLock<HashMap<ClassDescriptor, Linearization>>,
}

impl RuntimeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a runtime class and return its handle.
    pub fn register(&self, class: RuntimeClass) -> ClassHandle {
        let handle = Arc::new(class);
        let d = &handle.descriptor;
        self.modules
            .write()
            .entry(d.module().to_string())
            .or_default()
            .insert(d.name().to_string(), Arc::clone(&handle));
        // A replaced class may change the linearization of its subclasses.
        self.mro_cache.write().clear();
        handle
    }

    /// Unregister every class of `module`. Returns whether the module existed.
    pub fn remove_module(&self, module: &str) -> bool {
        let removed = self.modules.write().shift_remove(module).is_some();
        if removed {
            self.mro_cache.write().clear();
        }
        removed
    }

    pub fn has_module(&self, module: &str) -> bool {
        self.modules.read().contains_key(module)
    }

    pub fn lookup(&self, descriptor: &ClassDescriptor) -> Option<ClassHandle> {
        self.modules
            .read()
            .get(descriptor.module())
            .and_then(|classes| classes.get(descriptor.name()))
            .cloned()
    }

    /// All registered classes in registration order.
    pub fn classes(&self) -> Vec<ClassHandle> {
        self.modules
            .read()
            .values()
            .flat_map(|classes| classes.values().cloned())
            .collect()
    }

    /// Method-resolution order of `descriptor`, the class itself first.
    pub fn ancestors(&self, descriptor: &ClassDescriptor) -> SchemaResult<Linearization> {
        if let Some(hit) = self.mro_cache.read().get(descriptor) {
            return Ok(Arc::clone(hit));
        }

        let mut computed = HashMap::new();
        let result = {
            let modules = self.modules.read();
            let mut stack = Vec::new();
            linearize(&modules, descriptor, &mut stack, &mut computed)
        };
        let mro = match result {
            Ok(mro) => mro,
            Err(reason) => {
                return Err(SchemaError::Introspection {
                    class: descriptor.to_string(),
                    reason,
                })
            }
        };

        let mut cache = self.mro_cache.write();
        for (d, lin) in computed {
            cache.entry(d).or_insert(lin);
        }
        Ok(mro)
    }

    /// `sub` is `sup` or inherits from it.
    pub fn is_subclass(&self, sub: &ClassDescriptor, sup: &ClassDescriptor) -> SchemaResult<bool> {
        Ok(self.ancestors(sub)?.iter().any(|a| a == sup))
    }
}

// ============================================================================
// C3 linearization
// ============================================================================

fn linearize(
    modules: &IndexMap<String, IndexMap<String, ClassHandle>>,
    descriptor: &ClassDescriptor,
    stack: &mut Vec<ClassDescriptor>,
    computed: &mut HashMap<ClassDescriptor, Linearization>,
) -> Result<Linearization, String> {
    if let Some(done) = computed.get(descriptor) {
        return Ok(Arc::clone(done));
    }
    if stack.contains(descriptor) {
        return Err(format!("{descriptor} inherits from itself"));
    }

    let class = modules
        .get(descriptor.module())
        .and_then(|classes| classes.get(descriptor.name()))
        .ok_or_else(|| {
            match stack.last() {
                Some(child) => format!("base {descriptor} of {child} is not registered"),
                None => format!("{descriptor} is not registered"),
            }
        })?;

    stack.push(descriptor.clone());
    let mut seqs: Vec<Vec<ClassDescriptor>> = Vec::with_capacity(class.bases.len() + 1);
    for base in &class.bases {
        seqs.push(linearize(modules, base, stack, computed)?.to_vec());
    }
    stack.pop();
    seqs.push(class.bases.clone());

    let mut mro = vec![descriptor.clone()];
    mro.extend(
        c3_merge(seqs)
            .ok_or_else(|| format!("bases of {descriptor} have no consistent resolution order"))?,
    );

    let mro: Linearization = mro.into();
    computed.insert(descriptor.clone(), Arc::clone(&mro));
    Ok(mro)
}

/// Repeatedly take the first head that appears in no other sequence's tail.
fn c3_merge(mut seqs: Vec<Vec<ClassDescriptor>>) -> Option<Vec<ClassDescriptor>> {
    let mut out = Vec::new();
    loop {
        seqs.retain(|s| !s.is_empty());
        if seqs.is_empty() {
            return Some(out);
        }

        let head = seqs
            .iter()
            .map(|s| &s[0])
            .find(|candidate| !seqs.iter().any(|s| s[1..].contains(candidate)))?
            .clone();

        for s in seqs.iter_mut() {
            if s[0] == head {
                s.remove(0);
            }
        }
        out.push(head);
    }
}
