//! Plain value <-> typed instance conversion

use super::descriptor::TypeDescriptor;
use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Field exclusion rules applied while transforming
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformOptions {
    /// Drop every field whose name starts with one of these prefixes
    pub exclude_prefixes: Vec<String>,
    /// Drop these fields
    pub exclude: Vec<String>,
}

impl TransformOptions {
    pub fn excludes(&self, field: &str) -> bool {
        self.exclude.iter().any(|f| f == field)
            || self.exclude_prefixes.iter().any(|p| field.starts_with(p.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.exclude.is_empty() && self.exclude_prefixes.is_empty()
    }
}

/// A plain object bound to a [`TypeDescriptor`]
///
/// Carries every field of the source object, declared or not, so nothing
/// the client sent is lost unless explicitly excluded.
#[derive(Debug, Clone)]
pub struct Instance {
    descriptor: Arc<TypeDescriptor>,
    fields: Map<String, Value>,
}

impl Instance {
    pub fn new(descriptor: Arc<TypeDescriptor>, fields: Map<String, Value>) -> Self {
        Self { descriptor, fields }
    }

    pub fn type_name(&self) -> &str {
        self.descriptor.name()
    }

    pub fn descriptor(&self) -> &Arc<TypeDescriptor> {
        &self.descriptor
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub(crate) fn fields_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.fields
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }

    /// Deserialize into a concrete Rust type
    pub fn into_typed<T: DeserializeOwned>(self) -> Result<T> {
        Ok(serde_json::from_value(Value::Object(self.fields))?)
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        self.type_name() == other.type_name() && self.fields == other.fields
    }
}

impl Serialize for Instance {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}

/// Converts plain values into instances and back
pub trait Transformer: Send + Sync {
    fn plain_to_class(
        &self,
        plain: Map<String, Value>,
        target: &Arc<TypeDescriptor>,
        options: &TransformOptions,
    ) -> Result<Instance>;

    fn class_to_plain(&self, value: Value, options: &TransformOptions) -> Value;
}

/// Field-by-field mapping honoring [`TransformOptions`]
///
/// `class_to_plain` walks nested objects and arrays so excluded fields are
/// dropped at every depth.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralTransformer;

impl Transformer for StructuralTransformer {
    fn plain_to_class(
        &self,
        plain: Map<String, Value>,
        target: &Arc<TypeDescriptor>,
        options: &TransformOptions,
    ) -> Result<Instance> {
        let fields = plain
            .into_iter()
            .filter(|(key, _)| !options.excludes(key))
            .collect();
        Ok(Instance::new(Arc::clone(target), fields))
    }

    fn class_to_plain(&self, value: Value, options: &TransformOptions) -> Value {
        match value {
            Value::Object(map) => Value::Object(
                map.into_iter()
                    .filter(|(key, _)| !options.excludes(key))
                    .map(|(key, value)| (key, self.class_to_plain(value, options)))
                    .collect(),
            ),
            Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .map(|item| self.class_to_plain(item, options))
                    .collect(),
            ),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_plain_to_class_keeps_undeclared_fields() {
        let descriptor = Arc::new(TypeDescriptor::new("UserFilter").field("keyword", vec![]));
        let plain = object(json!({"keyword": "Umedi", "__somethingPrivate": "blablabla"}));

        let instance = StructuralTransformer
            .plain_to_class(plain, &descriptor, &TransformOptions::default())
            .unwrap();

        assert_eq!(instance.type_name(), "UserFilter");
        assert_eq!(instance.get("__somethingPrivate"), Some(&json!("blablabla")));
    }

    #[test]
    fn test_exclusions() {
        let descriptor = Arc::new(TypeDescriptor::new("UserFilter"));
        let options = TransformOptions {
            exclude_prefixes: vec!["__".into()],
            exclude: vec!["password".into()],
        };
        let plain = object(json!({"keyword": "a", "__private": 1, "password": "x"}));

        let instance = StructuralTransformer
            .plain_to_class(plain, &descriptor, &options)
            .unwrap();
        assert_eq!(instance.to_value(), json!({"keyword": "a"}));
    }

    #[test]
    fn test_class_to_plain_is_recursive() {
        let options = TransformOptions {
            exclude_prefixes: vec!["_".into()],
            exclude: vec![],
        };
        let value = json!([{"id": 1, "_secret": 2, "owner": {"name": "u", "_token": "t"}}]);

        assert_eq!(
            StructuralTransformer.class_to_plain(value, &options),
            json!([{"id": 1, "owner": {"name": "u"}}])
        );
    }

    #[test]
    fn test_into_typed() {
        #[derive(Deserialize)]
        struct Filter {
            keyword: String,
        }

        let instance = Instance::new(
            Arc::new(TypeDescriptor::new("Filter")),
            object(json!({"keyword": "Umedi", "extra": true})),
        );
        let filter: Filter = instance.into_typed().unwrap();
        assert_eq!(filter.keyword, "Umedi");
    }
}
