//! The catalog session: contexts, catalog classes, persistence and
//! reconstruction of live objects from stored entities.
//!
//! ## Persisted layout
//!
//! | Entity | Type | Attributes | Links |
//! |---|---|---|---|
//! | module | `Module` | `name` | |
//! | class descriptor | `ClassDescription` | `name` | `module` |
//! | catalog class | `TypeDescription` | `name` | `sciunit_class`, `capability`*, `subclass_of` |
//! | model | catalog class identifier | `name`, one per locator | `attribute`* |
//! | snapshot pair | `RunnableModelAttribute` | `name`, `value` (JSON), `index` | |
//! | test | catalog class identifier | `name`, `description` | |

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use parking_lot::RwLock;
use scicat_graph::{Entity, GraphBackend, Pattern};
use tracing::{debug, info, warn};

use crate::capability::CapabilityInferencer;
use crate::class::{CatalogClass, ClassDef, ClassKind};
use crate::context::{ContextId, ContextRegistry};
use crate::descriptor::ClassDescriptor;
use crate::error::{SchemaError, SchemaResult};
use crate::model::{AttrValue, ModelFamily, ModelInstance, ModelRecord};
use crate::namespace::NamespaceManager;
use crate::resolver::ClassResolver;
use crate::runtime::{ClassHandle, FamilyRoots, RuntimeRegistry};
use crate::testing::{TestInstance, TestRecord};
use crate::type_description::{MaterializedType, TypeDescription};
use crate::vocab::*;

/// Counts of entities written by one [`Catalog::save_context`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveSummary {
    pub descriptors: usize,
    pub types: usize,
    pub models: usize,
    pub tests: usize,
}

pub struct Catalog {
    registry: Arc<RuntimeRegistry>,
    roots: FamilyRoots,
    contexts: ContextRegistry,
    /// Keyed by defining context and identifier: one class may be redefined
    /// per context, and readers see the earliest definition in their chain.
    classes: RwLock<IndexMap<(ContextId, String), Arc<CatalogClass>>>,
    namespaces: NamespaceManager,
}

impl Catalog {
    pub fn new(registry: Arc<RuntimeRegistry>, roots: FamilyRoots) -> Self {
        Self {
            registry,
            roots,
            contexts: ContextRegistry::new(),
            classes: RwLock::new(IndexMap::new()),
            namespaces: NamespaceManager::default(),
        }
    }

    pub fn with_namespaces(mut self, namespaces: NamespaceManager) -> Self {
        self.namespaces = namespaces;
        self
    }

    pub fn registry(&self) -> &Arc<RuntimeRegistry> {
        &self.registry
    }

    pub fn roots(&self) -> &FamilyRoots {
        &self.roots
    }

    pub fn contexts(&self) -> &ContextRegistry {
        &self.contexts
    }

    pub fn namespaces(&self) -> &NamespaceManager {
        &self.namespaces
    }

    // ========================================================================
    // Contexts
    // ========================================================================

    pub fn new_context(&self, uri: &str) -> SchemaResult<ContextId> {
        self.contexts.new_context(uri)
    }

    pub fn import_from(&self, ctx: ContextId, other: ContextId) -> SchemaResult<()> {
        self.contexts.import_from(ctx, other)
    }

    /// Attach a previously saved context, restoring its imports from the
    /// store. Imports already known to this session are reused. The opened
    /// context is frozen: it is a read view of what was saved.
    pub fn open_context(&self, uri: &str, store: &dyn GraphBackend) -> SchemaResult<ContextId> {
        if let Some(id) = self.contexts.lookup(uri) {
            return Ok(id);
        }
        let imports = store.imports(uri)?;
        let id = self.contexts.new_context(uri)?;
        for imported in &imports {
            let other = self.open_context(imported, store)?;
            self.contexts.import_from(id, other)?;
        }
        self.contexts.freeze(id)?;
        debug!(context = uri, imports = imports.len(), "context opened");
        Ok(id)
    }

    /// Remove a context that nothing imports, along with the catalog classes
    /// defined in it.
    pub fn drop_context(&self, ctx: ContextId) -> SchemaResult<()> {
        self.contexts.drop_context(ctx)?;
        self.classes.write().retain(|(owner, _), _| *owner != ctx);
        Ok(())
    }

    // ========================================================================
    // Descriptors and catalog classes
    // ========================================================================

    /// Descriptor of a runtime class, recorded in `ctx` on first use.
    pub fn describe(&self, ctx: ContextId, class: &ClassHandle) -> SchemaResult<ClassDescriptor> {
        self.contexts.describe(ctx, &class.descriptor)
    }

    /// Define a catalog class in `ctx`. Its Type Description starts
    /// uninitialized; nothing about the runtime class is inspected yet.
    ///
    /// A class already defined in an imported context may be redefined here;
    /// readers whose chain reaches `ctx` first see this version.
    pub fn define_class(&self, ctx: ContextId, def: ClassDef) -> SchemaResult<Arc<CatalogClass>> {
        let uri = self.contexts.uri(ctx)?;
        if self.contexts.is_frozen(ctx)? {
            return Err(SchemaError::ContextFrozen(uri));
        }

        let ident = def.ident();
        let parent = match &def.parent {
            Some(p) => Some(self.visible_class(ctx, p)?),
            None => None,
        };

        let runtime = def
            .runtime
            .clone()
            .or_else(|| parent.as_ref().and_then(|p| p.runtime.clone()));
        let kind = def.resolve_kind(parent.as_ref().map(|p| &p.kind));
        let class = Arc::new(CatalogClass {
            ident: ident.clone(),
            name: def.name.clone(),
            namespace: def.namespace.clone(),
            context: ctx,
            runtime,
            runtime_declared: def.runtime.is_some(),
            parent: def.parent.clone(),
            kind,
            type_description: TypeDescription::new(ident.clone()),
        });
        let mut classes = self.classes.write();
        let key = (ctx, ident.clone());
        if classes.contains_key(&key) {
            return Err(SchemaError::DuplicateClass(ident));
        }
        classes.insert(key, Arc::clone(&class));
        debug!(class = %ident, context = %uri, "catalog class defined");
        Ok(class)
    }

    /// The version of `ident` visible from `ctx`: the definition in the
    /// earliest context of its chain.
    pub fn class(&self, ctx: ContextId, ident: &str) -> Option<Arc<CatalogClass>> {
        let chain = self.contexts.chain_ids(ctx).ok()?;
        let classes = self.classes.read();
        chain
            .into_iter()
            .find_map(|owner| classes.get(&(owner, ident.to_string())).cloned())
    }

    /// The class defined in `ctx` itself under `ident`, ignoring imports.
    pub fn defined_class(&self, ctx: ContextId, ident: &str) -> Option<Arc<CatalogClass>> {
        self.classes.read().get(&(ctx, ident.to_string())).cloned()
    }

    /// Catalog classes defined in `ctx`, in definition order.
    pub fn classes_in(&self, ctx: ContextId) -> Vec<Arc<CatalogClass>> {
        self.classes
            .read()
            .values()
            .filter(|c| c.context == ctx)
            .cloned()
            .collect()
    }

    /// Every class visible from `ctx`, one version per identifier, in chain
    /// order and then definition order.
    pub fn visible_classes(&self, ctx: ContextId) -> SchemaResult<Vec<Arc<CatalogClass>>> {
        let chain = self.contexts.chain_ids(ctx)?;
        let classes = self.classes.read();
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for owner in chain {
            for class in classes.values().filter(|c| c.context == owner) {
                if seen.insert(class.ident.as_str()) {
                    out.push(Arc::clone(class));
                }
            }
        }
        Ok(out)
    }

    /// The visible catalog class that declared `runtime` as its own runtime
    /// class.
    pub fn class_for_runtime(
        &self,
        ctx: ContextId,
        runtime: &ClassDescriptor,
    ) -> SchemaResult<Option<Arc<CatalogClass>>> {
        Ok(self
            .visible_classes(ctx)?
            .into_iter()
            .find(|c| c.runtime_declared && c.runtime.as_ref() == Some(runtime)))
    }

    /// Type Description of the version of `ident` visible from `ctx`,
    /// materialized on first access.
    pub fn type_description(&self, ctx: ContextId, ident: &str) -> SchemaResult<Arc<MaterializedType>> {
        let class = self.visible_class(ctx, ident)?;
        self.materialized(&class)
    }

    fn materialized(&self, class: &CatalogClass) -> SchemaResult<Arc<MaterializedType>> {
        class
            .type_description
            .get_or_materialize(|| self.materialize(class))
    }

    fn materialize(&self, class: &CatalogClass) -> SchemaResult<MaterializedType> {
        let capabilities = match (&class.runtime, &class.kind) {
            (Some(runtime), ClassKind::Model(_)) => {
                CapabilityInferencer::new(self.registry.as_ref(), &self.roots).infer(runtime)?
            }
            (Some(runtime), _) => {
                self.registry.ancestors(runtime)?;
                Vec::new()
            }
            (None, ClassKind::Model(_)) => {
                return Err(SchemaError::Introspection {
                    class: class.ident.clone(),
                    reason: "model class has no runtime class".to_string(),
                })
            }
            (None, _) => Vec::new(),
        };
        Ok(MaterializedType {
            ident: class.ident.clone(),
            name: class.name.clone(),
            runtime: class.runtime.clone(),
            capabilities,
            superclass: class.parent.clone(),
        })
    }

    // ========================================================================
    // Staging and save
    // ========================================================================

    pub fn add_model(&self, ctx: ContextId, record: ModelRecord) -> SchemaResult<()> {
        let class = self.visible_class(ctx, &record.class)?;
        if !class.is_model() {
            return Err(SchemaError::NotAModelClass(record.class));
        }
        if let Some(key) = record.locators.keys().find(|k| RESERVED_ATTRS.contains(&k.as_str())) {
            return Err(SchemaError::ReservedLocator {
                ident: record.ident.clone(),
                locator: key.clone(),
            });
        }
        self.contexts.stage_model(ctx, record)
    }

    pub fn add_test(&self, ctx: ContextId, record: TestRecord) -> SchemaResult<()> {
        let class = self.visible_class(ctx, &record.class)?;
        if !class.is_test() {
            return Err(SchemaError::NotATestClass(record.class));
        }
        self.contexts.stage_test(ctx, record)
    }

    fn visible_class(&self, ctx: ContextId, ident: &str) -> SchemaResult<Arc<CatalogClass>> {
        self.contexts.uri(ctx)?;
        self.class(ctx, ident)
            .ok_or_else(|| SchemaError::UnknownClass(ident.to_string()))
    }

    /// Write everything `ctx` owns, plus its import edges, then freeze it.
    ///
    /// Materialization of every class defined in `ctx` happens before the
    /// first write, so an introspection failure writes nothing. A store
    /// failure part-way leaves the context unfrozen; retry the whole save.
    pub fn save_context(&self, ctx: ContextId, store: &mut dyn GraphBackend) -> SchemaResult<SaveSummary> {
        let uri = self.contexts.uri(ctx)?;
        if self.contexts.is_frozen(ctx)? {
            return Err(SchemaError::ContextFrozen(uri));
        }

        let types = self
            .classes_in(ctx)
            .iter()
            .map(|c| self.materialized(c))
            .collect::<SchemaResult<Vec<_>>>()?;
        for t in &types {
            for d in t.runtime.iter().chain(t.capabilities.iter()) {
                self.contexts.describe(ctx, d)?;
            }
        }
        let descriptors = self.contexts.descriptors(ctx)?;
        let models = self.contexts.staged_models(ctx)?;
        let tests = self.contexts.staged_tests(ctx)?;

        for d in &descriptors {
            for e in d.to_entities() {
                store.put(&uri, &e)?;
            }
        }
        for t in &types {
            store.put(&uri, &type_entity(t))?;
        }
        for m in &models {
            for e in model_entities(m)? {
                store.put(&uri, &e)?;
            }
        }
        for t in &tests {
            store.put(&uri, &test_entity(t))?;
        }
        let imports = self
            .contexts
            .imports(ctx)?
            .into_iter()
            .map(|id| self.contexts.uri(id))
            .collect::<SchemaResult<Vec<_>>>()?;
        store.put_imports(&uri, &imports)?;
        self.contexts.freeze(ctx)?;

        let summary = SaveSummary {
            descriptors: descriptors.len(),
            types: types.len(),
            models: models.len(),
            tests: tests.len(),
        };
        info!(
            context = %uri,
            descriptors = summary.descriptors,
            types = summary.types,
            models = summary.models,
            tests = summary.tests,
            "context saved"
        );
        Ok(summary)
    }

    // ========================================================================
    // Listing
    // ========================================================================

    /// Stored models visible from `ctx`, in store order.
    pub fn list_models(&self, ctx: ContextId, store: &dyn GraphBackend) -> SchemaResult<Vec<ModelRecord>> {
        let root = self.root_class(ctx, ClassKind::is_model_kind)?;
        self.list_models_of(ctx, store, &root.ident)
    }

    /// Stored models whose type is `class` or any stored subclass of it.
    pub fn list_models_of(
        &self,
        ctx: ContextId,
        store: &dyn GraphBackend,
        class: &str,
    ) -> SchemaResult<Vec<ModelRecord>> {
        let chain = self.contexts.chain(ctx)?;
        let kinds = stored_kinds(store, &chain, class)?;
        if kinds.is_empty() {
            return Ok(Vec::new());
        }
        store
            .query(&chain, &Pattern::new().of_types(kinds))?
            .iter()
            .map(|e| load_model_record(store, &chain, e))
            .collect()
    }

    /// The Model kind and every stored subclass of it. With `full = false`
    /// identifiers are abbreviated through the namespace bindings.
    pub fn list_model_kinds(
        &self,
        ctx: ContextId,
        store: &dyn GraphBackend,
        full: bool,
    ) -> SchemaResult<Vec<String>> {
        let root = self.root_class(ctx, ClassKind::is_model_kind)?;
        let chain = self.contexts.chain(ctx)?;
        let kinds = stored_kinds(store, &chain, &root.ident)?;
        Ok(kinds
            .into_iter()
            .map(|k| if full { k } else { self.namespaces.abbreviate(&k) })
            .collect())
    }

    pub fn list_tests(&self, ctx: ContextId, store: &dyn GraphBackend) -> SchemaResult<Vec<TestRecord>> {
        let root = self.root_class(ctx, ClassKind::is_test_kind)?;
        let chain = self.contexts.chain(ctx)?;
        let kinds = stored_kinds(store, &chain, &root.ident)?;
        if kinds.is_empty() {
            return Ok(Vec::new());
        }
        Ok(store
            .query(&chain, &Pattern::new().of_types(kinds))?
            .into_iter()
            .map(|e| TestRecord {
                name: e.attr(ATTR_NAME).map(str::to_string),
                description: e.attr(ATTR_DESCRIPTION).map(str::to_string),
                ident: e.ident,
                class: e.entity_type,
            })
            .collect())
    }

    /// First visible class of the kind whose parent is not of that kind.
    fn root_class(&self, ctx: ContextId, is_kind: fn(&ClassKind) -> bool) -> SchemaResult<Arc<CatalogClass>> {
        let visible: IndexMap<String, Arc<CatalogClass>> = self
            .visible_classes(ctx)?
            .into_iter()
            .map(|c| (c.ident.clone(), c))
            .collect();
        visible
            .values()
            .find(|c| {
                is_kind(&c.kind)
                    && c.parent
                        .as_ref()
                        .and_then(|p| visible.get(p))
                        .map_or(true, |p| !is_kind(&p.kind))
            })
            .cloned()
            .ok_or_else(|| SchemaError::UnknownClass("no root catalog class of this kind".to_string()))
    }

    // ========================================================================
    // Reconstruction
    // ========================================================================

    /// Rebuild a live model from a stored record.
    ///
    /// The runtime class always comes from the stored type's own descriptor.
    /// If the stored type is not declared in this session, the nearest stored
    /// ancestor that is declared supplies the construction family.
    pub fn instantiate(
        &self,
        ctx: ContextId,
        store: &dyn GraphBackend,
        record: &ModelRecord,
    ) -> SchemaResult<ModelInstance> {
        let chain = self.contexts.chain(ctx)?;
        let (type_entity, handle) = self.resolve_stored_type(store, &chain, &record.class)?;
        let family = self.family_for(ctx, store, &chain, &type_entity)?;
        family.construct(handle, record)
    }

    /// Every stored model visible from `ctx`, rebuilt. Stops at the first
    /// failure.
    pub fn load_models(
        &self,
        ctx: ContextId,
        store: &dyn GraphBackend,
    ) -> SchemaResult<Vec<(ModelRecord, ModelInstance)>> {
        self.list_models(ctx, store)?
            .into_iter()
            .map(|record| {
                let instance = self.instantiate(ctx, store, &record)?;
                Ok((record, instance))
            })
            .collect()
    }

    pub fn create_test(
        &self,
        ctx: ContextId,
        store: &dyn GraphBackend,
        record: &TestRecord,
    ) -> SchemaResult<TestInstance> {
        let chain = self.contexts.chain(ctx)?;
        let (_, handle) = self.resolve_stored_type(store, &chain, &record.class)?;
        Ok(TestInstance::construct(handle, record))
    }

    fn resolve_stored_type(
        &self,
        store: &dyn GraphBackend,
        chain: &[String],
        type_ident: &str,
    ) -> SchemaResult<(Entity, ClassHandle)> {
        let type_entity = store
            .get(type_ident, chain)?
            .filter(|e| e.entity_type == TYPE_TYPE_DESCRIPTION)
            .ok_or_else(|| SchemaError::UnknownType(type_ident.to_string()))?;
        let class_ident = type_entity
            .link(REL_SCIUNIT_CLASS)
            .ok_or_else(|| SchemaError::corrupt(type_ident, "type description has no sciunit_class"))?;
        let descriptor = ClassDescriptor::load(store, chain, class_ident)?;
        let handle = self.registry.resolve(&descriptor)?;
        Ok((type_entity, handle))
    }

    fn family_for(
        &self,
        ctx: ContextId,
        store: &dyn GraphBackend,
        chain: &[String],
        type_entity: &Entity,
    ) -> SchemaResult<ModelFamily> {
        let mut seen = HashSet::new();
        let mut current = type_entity.clone();
        loop {
            if let Some(class) = self.class(ctx, &current.ident) {
                let family = class
                    .family()
                    .cloned()
                    .ok_or_else(|| SchemaError::NotAModelClass(type_entity.ident.clone()))?;
                if current.ident != type_entity.ident {
                    warn!(
                        stored_type = %type_entity.ident,
                        declared_ancestor = %current.ident,
                        "stored type is not declared in this session; using nearest declared ancestor"
                    );
                }
                return Ok(family);
            }
            if !seen.insert(current.ident.clone()) {
                return Err(SchemaError::corrupt(&current.ident, "subclass_of cycle"));
            }
            let parent = current
                .link(REL_SUBCLASS_OF)
                .ok_or_else(|| SchemaError::NotAModelClass(type_entity.ident.clone()))?
                .to_string();
            current = store
                .get(&parent, chain)?
                .ok_or(SchemaError::UnknownType(parent))?;
        }
    }
}

impl ClassKind {
    fn is_model_kind(&self) -> bool {
        matches!(self, ClassKind::Model(_))
    }

    fn is_test_kind(&self) -> bool {
        matches!(self, ClassKind::Test)
    }
}

// ============================================================================
// Entity mapping
// ============================================================================

fn type_entity(t: &MaterializedType) -> Entity {
    let mut e = Entity::new(&t.ident, TYPE_TYPE_DESCRIPTION).with_attr(ATTR_NAME, &t.name);
    if let Some(runtime) = &t.runtime {
        e = e.with_link(REL_SCIUNIT_CLASS, runtime.ident());
    }
    for cap in &t.capabilities {
        e = e.with_link(REL_CAPABILITY, cap.ident());
    }
    if let Some(parent) = &t.superclass {
        e = e.with_link(REL_SUBCLASS_OF, parent);
    }
    e
}

fn model_entities(m: &ModelRecord) -> SchemaResult<Vec<Entity>> {
    let mut model = Entity::new(&m.ident, &m.class);
    if let Some(name) = &m.name {
        model = model.with_attr(ATTR_NAME, name);
    }
    for (key, value) in &m.locators {
        model = model.with_attr(key, value);
    }

    let mut out = Vec::with_capacity(m.attributes.len() + 1);
    for (index, (name, value)) in m.attributes.iter().enumerate() {
        let ident = ident_model_attribute(&m.ident, name);
        model = model.with_link(REL_ATTRIBUTE, &ident);
        out.push(
            Entity::new(ident, TYPE_MODEL_ATTRIBUTE)
                .with_attr(ATTR_NAME, name)
                .with_attr(ATTR_VALUE, value.to_json()?)
                .with_attr(ATTR_INDEX, index.to_string()),
        );
    }
    out.insert(0, model);
    Ok(out)
}

fn test_entity(t: &TestRecord) -> Entity {
    let mut e = Entity::new(&t.ident, &t.class);
    if let Some(name) = &t.name {
        e = e.with_attr(ATTR_NAME, name);
    }
    if let Some(description) = &t.description {
        e = e.with_attr(ATTR_DESCRIPTION, description);
    }
    e
}

fn load_model_record(store: &dyn GraphBackend, chain: &[String], e: &Entity) -> SchemaResult<ModelRecord> {
    let mut record = ModelRecord::new(&e.ident, &e.entity_type);
    for (key, value) in &e.attrs {
        if key == ATTR_NAME {
            record.name = Some(value.clone());
        } else {
            record.locators.insert(key.clone(), value.clone());
        }
    }

    let mut pairs: Vec<(usize, String, AttrValue)> = Vec::new();
    for link in e.links(REL_ATTRIBUTE) {
        let attr = store
            .get(link, chain)?
            .ok_or_else(|| SchemaError::corrupt(link, "attribute entity not found"))?;
        let name = attr
            .attr(ATTR_NAME)
            .ok_or_else(|| SchemaError::corrupt(link, "attribute has no name"))?;
        let raw = attr
            .attr(ATTR_VALUE)
            .ok_or_else(|| SchemaError::corrupt(link, "attribute has no value"))?;
        let index = attr
            .attr(ATTR_INDEX)
            .and_then(|i| i.parse().ok())
            .unwrap_or(usize::MAX);
        pairs.push((index, name.to_string(), AttrValue::from_json(link, raw)?));
    }
    pairs.sort_by_key(|(index, _, _)| *index);
    for (_, name, value) in pairs {
        record.attributes.insert(name, value)?;
    }
    Ok(record)
}

/// `root` plus every stored type reachable through reversed `subclass_of`
/// links, breadth-first. Empty if `root` itself is not stored.
fn stored_kinds(store: &dyn GraphBackend, chain: &[String], root: &str) -> SchemaResult<Vec<String>> {
    match store.get(root, chain)? {
        Some(e) if e.entity_type == TYPE_TYPE_DESCRIPTION => {}
        _ => return Ok(Vec::new()),
    }
    let mut kinds: IndexSet<String> = IndexSet::new();
    kinds.insert(root.to_string());
    let mut i = 0;
    while let Some(current) = kinds.get_index(i).cloned() {
        let subs = store.query(
            chain,
            &Pattern::new()
                .of_type(TYPE_TYPE_DESCRIPTION)
                .with_link(REL_SUBCLASS_OF, current),
        )?;
        kinds.extend(subs.into_iter().map(|e| e.ident));
        i += 1;
    }
    Ok(kinds.into_iter().collect())
}
