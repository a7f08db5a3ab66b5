//! Model records, Attribute Snapshots, model families and constructed
//! instances.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{SchemaError, SchemaResult};
use crate::runtime::{ClassHandle, RuntimeClass, RuntimeRegistry, SetupSignature};

// ============================================================================
// Attribute values
// ============================================================================

/// A typed attribute value. Persisted as a JSON literal.
///
/// JSON has no NaN or infinity, so non-finite floats are stored as
/// `{"float": "NaN" | "inf" | "-inf"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

const NON_FINITE_TAG: &str = "float";

impl AttrValue {
    pub fn to_json(&self) -> SchemaResult<String> {
        let value = match self {
            AttrValue::Float(x) if !x.is_finite() => {
                let mut tagged = serde_json::Map::new();
                tagged.insert(NON_FINITE_TAG.to_string(), x.to_string().into());
                serde_json::Value::Object(tagged)
            }
            other => serde_json::to_value(other).map_err(|e| SchemaError::Store(e.into()))?,
        };
        Ok(value.to_string())
    }

    pub fn from_json(ident: &str, raw: &str) -> SchemaResult<Self> {
        let bad = |reason: String| SchemaError::corrupt(ident, format!("bad attribute value {raw:?}: {reason}"));
        let value: serde_json::Value = serde_json::from_str(raw).map_err(|e| bad(e.to_string()))?;
        if let Some(tagged) = value.as_object() {
            return match (tagged.len(), tagged.get(NON_FINITE_TAG).and_then(|v| v.as_str())) {
                (1, Some(text)) => text
                    .parse::<f64>()
                    .ok()
                    .filter(|x| !x.is_finite())
                    .map(AttrValue::Float)
                    .ok_or_else(|| bad(format!("{text:?} is not a non-finite float"))),
                _ => Err(bad("unexpected object".to_string())),
            };
        }
        serde_json::from_value(value).map_err(|e| bad(e.to_string()))
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Float(f) => Some(*f),
            AttrValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Bool(b) => write!(f, "{b}"),
            AttrValue::Int(i) => write!(f, "{i}"),
            AttrValue::Float(x) => write!(f, "{x}"),
            AttrValue::Str(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        AttrValue::Bool(v)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Int(v)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Float(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Str(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::Str(v)
    }
}

// ============================================================================
// Attribute Snapshot
// ============================================================================

/// Ordered name → value pairs with unique names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeSnapshot {
    entries: IndexMap<String, AttrValue>,
}

impl AttributeSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> SchemaResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<AttrValue>,
    {
        let mut snapshot = Self::new();
        for (k, v) in pairs {
            snapshot.insert(k, v)?;
        }
        Ok(snapshot)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> SchemaResult<()> {
        let name = name.into();
        if self.entries.contains_key(&name) {
            return Err(SchemaError::DuplicateAttribute(name));
        }
        self.entries.insert(name, value.into());
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn set(&mut self, name: &str, value: AttrValue) {
        self.entries.insert(name.to_string(), value);
    }
}

// ============================================================================
// Model records
// ============================================================================

/// A model instance as catalog data: staged into a context before save, and
/// what a query returns afterwards. `class` is the catalog class identifier
/// (the stored entity type).
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRecord {
    pub ident: String,
    pub class: String,
    pub name: Option<String>,
    pub locators: IndexMap<String, String>,
    pub attributes: AttributeSnapshot,
}

impl ModelRecord {
    pub fn new(ident: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            ident: ident.into(),
            class: class.into(),
            name: None,
            locators: IndexMap::new(),
            attributes: AttributeSnapshot::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_locator(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.locators.insert(key.into(), value.into());
        self
    }

    pub fn with_attribute(
        mut self,
        name: impl Into<String>,
        value: impl Into<AttrValue>,
    ) -> SchemaResult<Self> {
        self.attributes.insert(name, value)?;
        Ok(self)
    }

    pub fn with_attributes(mut self, attributes: AttributeSnapshot) -> Self {
        self.attributes = attributes;
        self
    }
}

// ============================================================================
// Model families
// ============================================================================

/// Construction protocol of a model class. Closed set; one strategy each.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelFamily {
    /// Constructed with no arguments.
    Base,
    /// Constructed with its declared name, then the snapshot is applied with
    /// one bulk attribute-setting call.
    Runnable,
    /// Like `Runnable`, with the named locator values passed positionally
    /// before the attributes are set.
    FileBacked { locators: Vec<String> },
}

impl ModelFamily {
    pub fn file_backed<I, S>(locators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ModelFamily::FileBacked {
            locators: locators.into_iter().map(Into::into).collect(),
        }
    }

    pub fn construct(&self, class: ClassHandle, record: &ModelRecord) -> SchemaResult<ModelInstance> {
        match self {
            ModelFamily::Base => {
                check_positional(&class, &[])?;
                Ok(ModelInstance::new(class, None, Vec::new()))
            }
            ModelFamily::Runnable => {
                check_positional(&class, &[])?;
                let mut instance = ModelInstance::new(class, record.name.clone(), Vec::new());
                instance.set_attrs(&record.attributes)?;
                Ok(instance)
            }
            ModelFamily::FileBacked { locators } => {
                let positional = locators
                    .iter()
                    .map(|key| {
                        record
                            .locators
                            .get(key)
                            .map(|v| (key.clone(), v.clone()))
                            .ok_or_else(|| SchemaError::MissingLocator {
                                ident: record.ident.clone(),
                                locator: key.clone(),
                            })
                    })
                    .collect::<SchemaResult<Vec<_>>>()?;
                check_positional(&class, locators)?;
                let mut instance = ModelInstance::new(class, record.name.clone(), positional);
                instance.set_attrs(&record.attributes)?;
                Ok(instance)
            }
        }
    }
}

fn check_positional(class: &RuntimeClass, supplied: &[String]) -> SchemaResult<()> {
    let unexpected: Vec<String> = supplied
        .iter()
        .filter(|s| !class.positional.contains(*s))
        .cloned()
        .collect();
    let missing: Vec<String> = class
        .positional
        .iter()
        .filter(|p| !supplied.contains(*p))
        .cloned()
        .collect();
    if unexpected.is_empty() && missing.is_empty() {
        Ok(())
    } else {
        Err(SchemaError::SetupMismatch {
            class: class.descriptor.to_string(),
            unexpected,
            missing,
        })
    }
}

// ============================================================================
// Constructed instances
// ============================================================================

/// A live model object rebuilt from the catalog.
#[derive(Debug, Clone)]
pub struct ModelInstance {
    class: ClassHandle,
    name: Option<String>,
    positional: Vec<(String, String)>,
    attrs: AttributeSnapshot,
}

impl ModelInstance {
    pub fn new(class: ClassHandle, name: Option<String>, positional: Vec<(String, String)>) -> Self {
        Self {
            class,
            name,
            positional,
            attrs: AttributeSnapshot::new(),
        }
    }

    pub fn class(&self) -> &ClassHandle {
        &self.class
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn locator(&self, key: &str) -> Option<&str> {
        self.positional
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        self.attrs.get(name)
    }

    pub fn attrs(&self) -> &AttributeSnapshot {
        &self.attrs
    }

    /// Bulk attribute-setting call. Keys must fit the class's setup
    /// signature; on mismatch nothing is applied.
    pub fn set_attrs(&mut self, attrs: &AttributeSnapshot) -> SchemaResult<()> {
        if let SetupSignature::Params(params) = &self.class.setup {
            let unexpected: Vec<String> = attrs
                .iter()
                .map(|(k, _)| k)
                .filter(|k| !params.iter().any(|p| p.name == *k))
                .map(str::to_string)
                .collect();
            let missing: Vec<String> = params
                .iter()
                .filter(|p| p.required && !attrs.contains(&p.name) && !self.attrs.contains(&p.name))
                .map(|p| p.name.clone())
                .collect();
            if !unexpected.is_empty() || !missing.is_empty() {
                return Err(SchemaError::SetupMismatch {
                    class: self.class.descriptor.to_string(),
                    unexpected,
                    missing,
                });
            }
        }
        for (k, v) in attrs.iter() {
            self.attrs.set(k, v.clone());
        }
        Ok(())
    }

    pub fn is_instance_of(&self, class: &ClassHandle, registry: &RuntimeRegistry) -> SchemaResult<bool> {
        if std::sync::Arc::ptr_eq(&self.class, class) {
            return Ok(true);
        }
        registry.is_subclass(&self.class.descriptor, &class.descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::SetupParam;

    #[test]
    fn snapshot_rejects_duplicate_keys_and_keeps_order() {
        let mut s = AttributeSnapshot::new();
        s.insert("rate", 2.5).unwrap();
        s.insert("label", "fast").unwrap();
        let err = s.insert("rate", 3.0).unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateAttribute(ref k) if k == "rate"));

        let keys: Vec<&str> = s.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["rate", "label"]);
    }

    #[test]
    fn attr_values_keep_their_type_through_json() {
        for v in [
            AttrValue::from(true),
            AttrValue::from(7i64),
            AttrValue::from(2.5),
            AttrValue::from("x"),
        ] {
            let raw = v.to_json().unwrap();
            assert_eq!(AttrValue::from_json("urn:a", &raw).unwrap(), v);
        }
    }

    #[test]
    fn non_finite_floats_survive_json() {
        for x in [f64::INFINITY, f64::NEG_INFINITY] {
            let raw = AttrValue::from(x).to_json().unwrap();
            assert_eq!(AttrValue::from_json("urn:a", &raw).unwrap(), AttrValue::Float(x));
        }
        let raw = AttrValue::from(f64::NAN).to_json().unwrap();
        assert_eq!(raw, r#"{"float":"NaN"}"#);
        assert!(AttrValue::from_json("urn:a", &raw).unwrap().as_f64().unwrap().is_nan());

        // A string that happens to spell NaN stays a string.
        let raw = AttrValue::from("NaN").to_json().unwrap();
        assert_eq!(AttrValue::from_json("urn:a", &raw).unwrap(), AttrValue::from("NaN"));
        assert!(AttrValue::from_json("urn:a", r#"{"float":"1.5"}"#).is_err());
    }

    #[test]
    fn file_backed_requires_each_locator() {
        let registry = RuntimeRegistry::new();
        let class = registry.register(RuntimeClass::new("m", "Sim").with_positional("path"));
        let family = ModelFamily::file_backed(["path"]);

        let record = ModelRecord::new("urn:sim", "urn:Sim");
        assert!(matches!(
            family.construct(class.clone(), &record),
            Err(SchemaError::MissingLocator { .. })
        ));

        let record = record.with_locator("path", "/tmp/model.xml");
        let instance = family.construct(class, &record).unwrap();
        assert_eq!(instance.locator("path"), Some("/tmp/model.xml"));
    }

    #[test]
    fn runnable_rejects_class_with_positional_arguments() {
        let registry = RuntimeRegistry::new();
        let class = registry.register(RuntimeClass::new("m", "Sim").with_positional("path"));
        let err = ModelFamily::Runnable
            .construct(class, &ModelRecord::new("urn:x", "urn:Sim"))
            .unwrap_err();
        assert!(matches!(err, SchemaError::SetupMismatch { ref missing, .. } if missing == &["path"]));
    }

    #[test]
    fn set_attrs_validates_declared_params() {
        let registry = RuntimeRegistry::new();
        let class = registry.register(RuntimeClass::new("m", "Strict").with_setup(
            SetupSignature::Params(vec![SetupParam::required("rate"), SetupParam::optional("seed")]),
        ));
        let mut instance = ModelInstance::new(class, None, Vec::new());

        let bad = AttributeSnapshot::from_pairs([("seed", AttrValue::from(1i64)), ("typo", 1i64.into())])
            .unwrap();
        let err = instance.set_attrs(&bad).unwrap_err();
        match err {
            SchemaError::SetupMismatch {
                unexpected, missing, ..
            } => {
                assert_eq!(unexpected, vec!["typo"]);
                assert_eq!(missing, vec!["rate"]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(instance.attrs().is_empty());

        let good = AttributeSnapshot::from_pairs([("rate", 2.5)]).unwrap();
        instance.set_attrs(&good).unwrap();
        assert_eq!(instance.attr("rate").and_then(AttrValue::as_f64), Some(2.5));
    }
}
