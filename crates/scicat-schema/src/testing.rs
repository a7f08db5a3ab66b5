//! SciUnit test records and their constructed instances.

use crate::runtime::ClassHandle;

/// A stored test: its catalog class plus the `name` and `description`
/// properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRecord {
    pub ident: String,
    pub class: String,
    pub name: Option<String>,
    pub description: Option<String>,
}

impl TestRecord {
    pub fn new(ident: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            ident: ident.into(),
            class: class.into(),
            name: None,
            description: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A test object rebuilt from the catalog. Test classes are constructed with
/// no arguments; the stored name and description ride along as metadata.
#[derive(Debug, Clone)]
pub struct TestInstance {
    pub class: ClassHandle,
    pub name: Option<String>,
    pub description: Option<String>,
}

impl TestInstance {
    pub fn construct(class: ClassHandle, record: &TestRecord) -> Self {
        Self {
            class,
            name: record.name.clone(),
            description: record.description.clone(),
        }
    }
}
