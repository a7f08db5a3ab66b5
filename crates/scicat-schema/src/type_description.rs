//! Type Descriptions and deferred materialization.
//!
//! ```text
//!   UNINITIALIZED ──first access──► MATERIALIZING ──ok──► READY
//!         ▲                               │
//!         └────────────error──────────────┘
//! ```
//!
//! The slot is guarded by a mutex. A second thread arriving while another is
//! materializing waits on the condvar and then reads the published result.
//! Re-entry from the materializing thread itself is reported as an
//! introspection failure instead of deadlocking.

use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use crate::descriptor::ClassDescriptor;
use crate::error::{SchemaError, SchemaResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterializationState {
    Uninitialized,
    Materializing,
    Ready,
}

/// Populated content of a Type Description. Immutable once published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializedType {
    /// Identifier of the catalog class (also the stored entity identifier).
    pub ident: String,
    pub name: String,
    /// Runtime class the catalog class stands for, if any.
    pub runtime: Option<ClassDescriptor>,
    /// Declared capability markers, in ancestor order, without repeats.
    pub capabilities: Vec<ClassDescriptor>,
    /// Identifier of the parent catalog class.
    pub superclass: Option<String>,
}

enum Slot {
    Uninitialized,
    Materializing(ThreadId),
    Ready(Arc<MaterializedType>),
}

pub struct TypeDescription {
    ident: String,
    slot: Mutex<Slot>,
    published: Condvar,
}

impl TypeDescription {
    pub fn new(ident: impl Into<String>) -> Self {
        Self {
            ident: ident.into(),
            slot: Mutex::new(Slot::Uninitialized),
            published: Condvar::new(),
        }
    }

    pub fn ident(&self) -> &str {
        &self.ident
    }

    pub fn state(&self) -> MaterializationState {
        match &*self.slot.lock() {
            Slot::Uninitialized => MaterializationState::Uninitialized,
            Slot::Materializing(_) => MaterializationState::Materializing,
            Slot::Ready(_) => MaterializationState::Ready,
        }
    }

    /// The published content, without triggering materialization.
    pub fn get(&self) -> Option<Arc<MaterializedType>> {
        match &*self.slot.lock() {
            Slot::Ready(t) => Some(Arc::clone(t)),
            _ => None,
        }
    }

    /// Return the published content, running `materialize` first if no
    /// content has been published yet. `materialize` runs without the lock
    /// held and at most once per successful publication.
    pub fn get_or_materialize<F>(&self, materialize: F) -> SchemaResult<Arc<MaterializedType>>
    where
        F: FnOnce() -> SchemaResult<MaterializedType>,
    {
        let me = thread::current().id();
        {
            let mut slot = self.slot.lock();
            loop {
                let busy = match &*slot {
                    Slot::Ready(t) => return Ok(Arc::clone(t)),
                    Slot::Materializing(owner) if *owner == me => {
                        return Err(SchemaError::Introspection {
                            class: self.ident.clone(),
                            reason: "type description requested during its own materialization"
                                .to_string(),
                        });
                    }
                    Slot::Materializing(_) => true,
                    Slot::Uninitialized => false,
                };
                if !busy {
                    break;
                }
                self.published.wait(&mut slot);
            }
            *slot = Slot::Materializing(me);
        }

        debug!(class = %self.ident, "materializing type description");
        let mut reset = ResetOnUnwind { td: self, armed: true };
        let result = materialize();
        reset.armed = false;

        let mut slot = self.slot.lock();
        let outcome = match result {
            Ok(t) => {
                let t = Arc::new(t);
                *slot = Slot::Ready(Arc::clone(&t));
                debug!(class = %self.ident, capabilities = t.capabilities.len(), "type description ready");
                Ok(t)
            }
            Err(err) => {
                *slot = Slot::Uninitialized;
                debug!(class = %self.ident, error = %err, "materialization failed");
                Err(err)
            }
        };
        self.published.notify_all();
        outcome
    }
}

/// Puts the slot back to `Uninitialized` if the materializer panics, so
/// waiting threads are released.
struct ResetOnUnwind<'a> {
    td: &'a TypeDescription,
    armed: bool,
}

impl Drop for ResetOnUnwind<'_> {
    fn drop(&mut self) {
        if self.armed {
            *self.td.slot.lock() = Slot::Uninitialized;
            self.td.published.notify_all();
        }
    }
}

impl std::fmt::Debug for TypeDescription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeDescription")
            .field("ident", &self.ident)
            .field("state", &self.state())
            .finish()
    }
}
