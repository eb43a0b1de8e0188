//! Parameter resolution
//!
//! Each declared parameter of an action is turned into one positional
//! [`Arg`]. The resolver extracts the raw value from the request, parses,
//! normalizes, transforms and validates it, and enforces requiredness.

pub mod descriptor;
pub mod resolver;
pub mod transform;
pub mod validation;

pub use descriptor::{FieldDescriptor, TypeDescriptor};
pub use resolver::ParamResolver;
pub use transform::{Instance, StructuralTransformer, TransformOptions, Transformer};
pub use validation::{Constraint, ConstraintValidator, Validator, ValidatorOptions};

use crate::error::{Error, Result};
use crate::http::Request;
use crate::session::Session;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

/// One resolved argument
#[derive(Debug, Clone)]
pub enum Arg {
    /// Optional parameter without a value
    Undefined,
    Value(Value),
    /// Structured parameter transformed into its declared type
    Instance(Instance),
    Session(Arc<Session>),
    Request(Arc<Request>),
    /// Placeholder for the response handle; actions write through the context
    Response,
}

impl Arg {
    pub fn is_undefined(&self) -> bool {
        matches!(self, Arg::Undefined)
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Arg::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_instance(&self) -> Option<&Instance> {
        match self {
            Arg::Instance(instance) => Some(instance),
            _ => None,
        }
    }

    /// JSON view of the argument, `null` for handles and missing values
    pub fn to_value(&self) -> Value {
        match self {
            Arg::Value(value) => value.clone(),
            Arg::Instance(instance) => instance.to_value(),
            Arg::Session(session) => session.to_value(),
            Arg::Undefined | Arg::Request(_) | Arg::Response => Value::Null,
        }
    }
}

/// Positional arguments handed to an action
#[derive(Debug, Clone, Default)]
pub struct Args(Vec<Arg>);

impl Args {
    pub fn new(args: Vec<Arg>) -> Self {
        Self(args)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn arg(&self, index: usize) -> Option<&Arg> {
        self.0.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Arg> {
        self.0.iter()
    }

    /// Deserialize the argument at `index`
    ///
    /// Missing optional values deserialize as `null`, so `Option<T>` is the
    /// natural target for optional parameters.
    pub fn get<T: DeserializeOwned>(&self, index: usize) -> Result<T> {
        let arg = self
            .arg(index)
            .ok_or_else(|| Error::internal(format!("Action has no parameter at index {}", index)))?;
        serde_json::from_value(arg.to_value())
            .map_err(|e| Error::from(e).with_context(format!("Failed to read parameter #{}", index)))
    }

    pub fn instance(&self, index: usize) -> Option<&Instance> {
        self.arg(index).and_then(Arg::as_instance)
    }

    pub fn session(&self, index: usize) -> Option<&Arc<Session>> {
        match self.arg(index) {
            Some(Arg::Session(session)) => Some(session),
            _ => None,
        }
    }

    pub fn request(&self, index: usize) -> Option<&Arc<Request>> {
        match self.arg(index) {
            Some(Arg::Request(request)) => Some(request),
            _ => None,
        }
    }
}

impl IntoIterator for Args {
    type Item = Arg;
    type IntoIter = std::vec::IntoIter<Arg>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_typed_access() {
        let args = Args::new(vec![
            Arg::Value(json!(3)),
            Arg::Undefined,
            Arg::Value(json!("large")),
        ]);

        assert_eq!(args.get::<i64>(0).unwrap(), 3);
        assert_eq!(args.get::<Option<String>>(1).unwrap(), None);
        assert_eq!(args.get::<String>(2).unwrap(), "large");
        assert!(args.get::<i64>(2).is_err());
        assert!(args.get::<i64>(7).is_err());
    }
}
