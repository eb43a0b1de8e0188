//! Constraint validation of structured parameters
//!
//! Violations use the constraint keys and messages web clients already know
//! (`isLength`, `"keyword must be longer than or equal to 5 characters"`).

use super::descriptor::TypeDescriptor;
use crate::error::Violation;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

static EMAIL_REGEX: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$",
    )
    .ok()
});

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorOptions {
    /// Skip constraints of fields that are absent or null
    pub skip_missing_properties: bool,
    /// Strip fields without declared constraints
    pub whitelist: bool,
    /// Report fields without declared constraints as violations
    pub forbid_non_whitelisted: bool,
}

/// A rule attached to a declared field
#[derive(Debug, Clone)]
pub enum Constraint {
    /// Skip the other constraints when the value is absent or null
    IsOptional,
    IsDefined,
    IsNotEmpty,
    IsString,
    IsNumber,
    IsInt,
    IsBoolean,
    IsEmail,
    /// Character count between `min` and `max`
    Length { min: usize, max: Option<usize> },
    MinLength(usize),
    MaxLength(usize),
    Min(f64),
    Max(f64),
    Matches(Regex),
    IsIn(Vec<Value>),
    /// Validate an object (or each object of an array) against another type
    Nested(Arc<TypeDescriptor>),
}

impl Constraint {
    /// Check a present value; returns the violated key and message
    fn check(&self, property: &str, value: &Value) -> Option<(&'static str, String)> {
        let chars = value.as_str().map(|s| s.chars().count());

        match self {
            Constraint::IsOptional | Constraint::Nested(_) => None,
            Constraint::IsDefined => value
                .is_null()
                .then(|| ("isDefined", format!("{} should not be null or undefined", property))),
            Constraint::IsNotEmpty => {
                matches!(value, Value::Null | Value::String(_) if chars.unwrap_or(0) == 0)
                    .then(|| ("isNotEmpty", format!("{} should not be empty", property)))
            }
            Constraint::IsString => (!value.is_string())
                .then(|| ("isString", format!("{} must be a string", property))),
            Constraint::IsNumber => (!value.is_number()).then(|| {
                (
                    "isNumber",
                    format!(
                        "{} must be a number conforming to the specified constraints",
                        property
                    ),
                )
            }),
            Constraint::IsInt => (!(value.is_i64() || value.is_u64()))
                .then(|| ("isInt", format!("{} must be an integer number", property))),
            Constraint::IsBoolean => (!value.is_boolean())
                .then(|| ("isBoolean", format!("{} must be a boolean value", property))),
            Constraint::IsEmail => {
                let valid = match (value.as_str(), EMAIL_REGEX.as_ref()) {
                    (Some(email), Some(regex)) => regex.is_match(email),
                    _ => false,
                };
                (!valid).then(|| ("isEmail", format!("{} must be an email", property)))
            }
            Constraint::Length { min, max } => match chars {
                Some(n) if n < *min => Some(too_short("isLength", property, *min)),
                Some(n) if max.map(|max| n > max).unwrap_or(false) => {
                    Some(too_long("isLength", property, max.unwrap_or(n)))
                }
                Some(_) => None,
                None => Some(too_short("isLength", property, *min)),
            },
            Constraint::MinLength(min) => match chars {
                Some(n) if n >= *min => None,
                _ => Some(too_short("minLength", property, *min)),
            },
            Constraint::MaxLength(max) => match chars {
                Some(n) if n <= *max => None,
                _ => Some(too_long("maxLength", property, *max)),
            },
            Constraint::Min(min) => match value.as_f64() {
                Some(n) if n >= *min => None,
                _ => Some(("min", format!("{} must not be less than {}", property, min))),
            },
            Constraint::Max(max) => match value.as_f64() {
                Some(n) if n <= *max => None,
                _ => Some(("max", format!("{} must not be greater than {}", property, max))),
            },
            Constraint::Matches(regex) => match value.as_str() {
                Some(s) if regex.is_match(s) => None,
                _ => Some((
                    "matches",
                    format!("{} must match {} regular expression", property, regex.as_str()),
                )),
            },
            Constraint::IsIn(allowed) => (!allowed.contains(value)).then(|| {
                let list: Vec<String> = allowed
                    .iter()
                    .map(|v| match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect();
                (
                    "isIn",
                    format!(
                        "{} must be one of the following values: {}",
                        property,
                        list.join(", ")
                    ),
                )
            }),
        }
    }
}

fn too_short(key: &'static str, property: &str, min: usize) -> (&'static str, String) {
    (
        key,
        format!("{} must be longer than or equal to {} characters", property, min),
    )
}

fn too_long(key: &'static str, property: &str, max: usize) -> (&'static str, String) {
    (
        key,
        format!("{} must be shorter than or equal to {} characters", property, max),
    )
}

/// Checks an object against the constraints of a type
///
/// Implement this trait to plug in another validation engine.
pub trait Validator: Send + Sync {
    /// Validate an object; an empty list means valid
    fn validate(
        &self,
        object: &Map<String, Value>,
        descriptor: &TypeDescriptor,
        options: &ValidatorOptions,
    ) -> Vec<Violation>;

    fn name(&self) -> &str {
        "unnamed"
    }
}

/// Runs the [`Constraint`]s declared on each field
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstraintValidator;

impl ConstraintValidator {
    fn validate_field(
        &self,
        property: &str,
        value: Option<&Value>,
        constraints: &[Constraint],
        options: &ValidatorOptions,
    ) -> Violation {
        let mut violation = Violation::new(property, value.cloned());
        let missing = matches!(value, None | Some(Value::Null));
        let optional = constraints.iter().any(|c| matches!(c, Constraint::IsOptional));

        if missing && (optional || options.skip_missing_properties) {
            if constraints.iter().any(|c| matches!(c, Constraint::IsDefined)) {
                violation = violation.constraint(
                    "isDefined",
                    format!("{} should not be null or undefined", property),
                );
            }
            return violation;
        }

        let value = value.unwrap_or(&Value::Null);
        for constraint in constraints {
            if let Some((key, message)) = constraint.check(property, value) {
                violation = violation.constraint(key, message);
            }

            if let Constraint::Nested(nested) = constraint {
                match value {
                    Value::Object(object) => {
                        violation.children.extend(self.validate(object, nested, options));
                    }
                    Value::Array(items) => {
                        for (index, item) in items.iter().enumerate() {
                            let child = match item {
                                Value::Object(object) => {
                                    let mut child = Violation::new(index.to_string(), Some(item.clone()));
                                    child.children = self.validate(object, nested, options);
                                    child
                                }
                                _ => nested_error(&index.to_string(), item),
                            };
                            if !child.is_empty() {
                                violation.children.push(child);
                            }
                        }
                    }
                    other => {
                        let error = nested_error(property, other);
                        violation.constraints.extend(error.constraints);
                    }
                }
            }
        }

        violation
    }
}

fn nested_error(property: &str, value: &Value) -> Violation {
    Violation::new(property, Some(value.clone())).constraint(
        "nestedValidation",
        format!("nested property {} must be either object or array", property),
    )
}

impl Validator for ConstraintValidator {
    fn validate(
        &self,
        object: &Map<String, Value>,
        descriptor: &TypeDescriptor,
        options: &ValidatorOptions,
    ) -> Vec<Violation> {
        let mut violations: Vec<Violation> = descriptor
            .fields()
            .iter()
            .map(|field| {
                self.validate_field(&field.name, object.get(&field.name), &field.constraints, options)
            })
            .filter(|violation| !violation.is_empty())
            .collect();

        if options.forbid_non_whitelisted {
            for (key, value) in object {
                if !descriptor.declares(key) {
                    violations.push(
                        Violation::new(key.clone(), Some(value.clone()))
                            .constraint("whitelistValidation", format!("property {} should not exist", key)),
                    );
                }
            }
        }

        violations
    }

    fn name(&self) -> &str {
        "constraints"
    }
}

/// Drop the fields a type does not declare
pub fn strip_non_whitelisted(object: &mut Map<String, Value>, descriptor: &TypeDescriptor) {
    object.retain(|key, _| descriptor.declares(key));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user_filter() -> TypeDescriptor {
        TypeDescriptor::new("UserFilter")
            .field("keyword", vec![Constraint::Length { min: 5, max: Some(15) }])
            .field("email", vec![Constraint::IsOptional, Constraint::IsEmail])
    }

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_length_violation_message() {
        let violations = ConstraintValidator.validate(
            &object(json!({"keyword": "Um"})),
            &user_filter(),
            &ValidatorOptions::default(),
        );

        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].property, "keyword");
        assert_eq!(violations[0].value, Some(json!("Um")));
        assert_eq!(
            violations[0].constraints.get("isLength").map(String::as_str),
            Some("keyword must be longer than or equal to 5 characters")
        );
    }

    #[test]
    fn test_valid_object() {
        let violations = ConstraintValidator.validate(
            &object(json!({"keyword": "Umedi", "__somethingPrivate": "x"})),
            &user_filter(),
            &ValidatorOptions::default(),
        );
        assert!(violations.is_empty());
    }

    #[test]
    fn test_missing_fields() {
        let descriptor = user_filter();
        let violations =
            ConstraintValidator.validate(&Map::new(), &descriptor, &ValidatorOptions::default());
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].property, "keyword");
        assert_eq!(violations[0].value, None);

        let options = ValidatorOptions {
            skip_missing_properties: true,
            ..Default::default()
        };
        assert!(ConstraintValidator
            .validate(&Map::new(), &descriptor, &options)
            .is_empty());
    }

    #[test]
    fn test_forbid_non_whitelisted() {
        let options = ValidatorOptions {
            forbid_non_whitelisted: true,
            ..Default::default()
        };
        let violations = ConstraintValidator.validate(
            &object(json!({"keyword": "Umedi", "admin": true})),
            &user_filter(),
            &options,
        );
        assert_eq!(violations.len(), 1);
        assert_eq!(
            violations[0].constraints.get("whitelistValidation").map(String::as_str),
            Some("property admin should not exist")
        );
    }

    #[test]
    fn test_strip_non_whitelisted() {
        let mut map = object(json!({"keyword": "Umedi", "admin": true}));
        strip_non_whitelisted(&mut map, &user_filter());
        assert_eq!(Value::Object(map), json!({"keyword": "Umedi"}));
    }

    #[test]
    fn test_nested_violations() {
        let address = Arc::new(TypeDescriptor::new("Address").field("city", vec![Constraint::IsString]));
        let descriptor = TypeDescriptor::new("User").field("address", vec![Constraint::Nested(address)]);

        let violations = ConstraintValidator.validate(
            &object(json!({"address": {"city": 5}})),
            &descriptor,
            &ValidatorOptions::default(),
        );
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].children[0].property, "city");

        let violations = ConstraintValidator.validate(
            &object(json!({"address": "nowhere"})),
            &descriptor,
            &ValidatorOptions::default(),
        );
        assert!(violations[0].constraints.contains_key("nestedValidation"));
    }

    #[test]
    fn test_primitive_constraints() {
        let descriptor = TypeDescriptor::new("Photo")
            .field("id", vec![Constraint::IsInt, Constraint::Min(1.0)])
            .field("kind", vec![Constraint::IsIn(vec![json!("jpg"), json!("png")])])
            .field("email", vec![Constraint::IsEmail]);

        let violations = ConstraintValidator.validate(
            &object(json!({"id": 0, "kind": "gif", "email": "test@example.com"})),
            &descriptor,
            &ValidatorOptions::default(),
        );
        let keys: Vec<_> = violations
            .iter()
            .flat_map(|v| v.constraints.keys().cloned())
            .collect();
        assert_eq!(keys, vec!["min", "isIn"]);
        assert_eq!(
            violations[0].constraints["min"],
            "id must not be less than 1"
        );
    }
}
