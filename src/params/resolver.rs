use super::descriptor::TypeDescriptor;
use super::transform::{TransformOptions, Transformer};
use super::validation::{strip_non_whitelisted, Validator, ValidatorOptions};
use super::{Arg, Args};
use crate::auth::CurrentUserChecker;
use crate::context::Context;
use crate::error::{Error, Result, Violation};
use crate::metadata::{ParamKind, ParamMetadata, ParamType};
use serde_json::{Map, Number, Value};
use std::sync::Arc;

/// Resolves the declared parameters of an action against a request
pub struct ParamResolver {
    transformer: Arc<dyn Transformer>,
    validator: Arc<dyn Validator>,
    current_user: Option<Arc<dyn CurrentUserChecker>>,
    transform_options: TransformOptions,
}

impl ParamResolver {
    pub fn new(
        transformer: Arc<dyn Transformer>,
        validator: Arc<dyn Validator>,
        current_user: Option<Arc<dyn CurrentUserChecker>>,
        transform_options: TransformOptions,
    ) -> Self {
        Self {
            transformer,
            validator,
            current_user,
            transform_options,
        }
    }

    /// Resolve every parameter in ascending index order
    ///
    /// Stops at the first failing parameter. Index gaps are filled with
    /// [`Arg::Undefined`] so positions always match declared indices.
    pub async fn resolve_all(&self, ctx: &Context, params: &[ParamMetadata]) -> Result<Args> {
        let len = params.iter().map(|p| p.index + 1).max().unwrap_or(0);
        let mut args = vec![Arg::Undefined; len];

        for param in params {
            args[param.index] = self.resolve(ctx, param).await?;
        }

        Ok(Args::new(args))
    }

    pub async fn resolve(&self, ctx: &Context, param: &ParamMetadata) -> Result<Arg> {
        match param.kind {
            ParamKind::Request => return Ok(Arg::Request(Arc::clone(&ctx.req))),
            ParamKind::Response => return Ok(Arg::Response),
            ParamKind::Session => {
                return match ctx.session_arc() {
                    Some(session) => Ok(Arg::Session(Arc::clone(session))),
                    None if param.required => Err(self.missing(ctx, param)),
                    None => Ok(Arg::Undefined),
                };
            }
            _ => {}
        }

        let raw = self.extract(ctx, param).await?;

        let value = match raw {
            None if param.required => return Err(self.missing(ctx, param)),
            None => return Ok(Arg::Undefined),
            Some(value) if param.required && is_empty(param, &value) => {
                return Err(self.missing(ctx, param))
            }
            Some(Value::Null) => return Ok(Arg::Value(Value::Null)),
            Some(value) => value,
        };

        let value = self.parse(param, value)?;
        let arg = self.normalize(param, value)?;
        self.validate(param, arg)
    }

    async fn extract(&self, ctx: &Context, param: &ParamMetadata) -> Result<Option<Value>> {
        let req = &ctx.req;
        let value = match param.kind {
            ParamKind::Param => req.param(&param.name).map(|v| Value::String(v.to_string())),
            ParamKind::Query => req.query_value(&param.name).map(|v| v.to_value()),
            ParamKind::Queries => Some(req.query_object()),
            ParamKind::Body => self.body(ctx, param)?,
            ParamKind::BodyParam => self
                .body(ctx, param)?
                .and_then(|body| body.get(&param.name).cloned()),
            ParamKind::Header => req.header(&param.name).map(|v| Value::String(v.to_string())),
            ParamKind::Headers => Some(req.headers_object()),
            ParamKind::Cookie => req.cookie(&param.name).map(Value::String),
            ParamKind::Cookies => Some(Value::Object(
                req.cookies()
                    .into_iter()
                    .map(|(k, v)| (k, Value::String(v)))
                    .collect(),
            )),
            ParamKind::SessionParam => ctx.session().and_then(|s| s.value(&param.name)),
            ParamKind::CurrentUser => {
                let checker = self
                    .current_user
                    .as_ref()
                    .ok_or(Error::CurrentUserCheckerNotDefined)?;
                checker.current_user(ctx).await?
            }
            ParamKind::Custom => match &param.resolver {
                Some(resolver) => resolver.resolve(ctx).await?,
                None => {
                    return Err(Error::internal(format!(
                        "Custom parameter #{} has no resolver",
                        param.index
                    )))
                }
            },
            ParamKind::Request | ParamKind::Response | ParamKind::Session => None,
        };
        Ok(value)
    }

    fn body(&self, ctx: &Context, param: &ParamMetadata) -> Result<Option<Value>> {
        ctx.req.body_value().map_err(|_| Error::ParamParse {
            name: param.display_name(),
            kind: param.kind,
            value: ctx.req.body_as_string(),
        })
    }

    fn missing(&self, ctx: &Context, param: &ParamMetadata) -> Error {
        if param.kind == ParamKind::CurrentUser {
            return Error::AuthorizationRequired {
                method: ctx.method().to_string(),
                url: ctx.url().to_string(),
            };
        }
        Error::param_required(param.display_name(), param.kind)
    }

    /// Decode JSON strings for `parse` params and structured types
    fn parse(&self, param: &ParamMetadata, value: Value) -> Result<Value> {
        let wants_json = param.parse || matches!(param.explicit_type, Some(ParamType::Class(_)));
        match value {
            Value::String(raw) if wants_json => serde_json::from_str(&raw).map_err(|_| Error::ParamParse {
                name: param.display_name(),
                kind: param.kind,
                value: raw,
            }),
            other => Ok(other),
        }
    }

    fn normalize(&self, param: &ParamMetadata, value: Value) -> Result<Arg> {
        let invalid = |value: &Value, expected: &'static str| Error::InvalidParam {
            name: param.display_name(),
            value: match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            },
            expected,
        };

        let normalized = match (&param.explicit_type, value) {
            (None, value) => value,
            (Some(ParamType::String), Value::String(s)) => Value::String(s),
            (Some(ParamType::String), other) => Value::String(other.to_string()),
            // Required empty values were rejected earlier
            (Some(ParamType::Number | ParamType::Integer), Value::String(s)) if s.trim().is_empty() => {
                return Ok(Arg::Undefined)
            }
            (Some(ParamType::Number), value) => match &value {
                Value::Number(_) => value.clone(),
                Value::String(s) => parse_number(s).ok_or_else(|| invalid(&value, "number"))?,
                _ => return Err(invalid(&value, "number")),
            },
            (Some(ParamType::Integer), value) => match &value {
                Value::Number(n) if n.is_i64() || n.is_u64() => value.clone(),
                Value::String(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(Value::from)
                    .map_err(|_| invalid(&value, "integer"))?,
                _ => return Err(invalid(&value, "integer")),
            },
            (Some(ParamType::Boolean), value) => match &value {
                Value::Bool(_) => value.clone(),
                Value::String(s) => match s.as_str() {
                    "true" | "1" | "" => Value::Bool(true),
                    "false" | "0" => Value::Bool(false),
                    _ => return Err(invalid(&value, "boolean")),
                },
                Value::Number(n) => Value::Bool(n.as_f64() != Some(0.0)),
                _ => return Err(invalid(&value, "boolean")),
            },
            (Some(ParamType::Class(descriptor)), Value::Object(map)) if param.transform => {
                return Ok(Arg::Instance(self.transformer.plain_to_class(
                    map,
                    descriptor,
                    &self.transform_options,
                )?));
            }
            (Some(ParamType::Class(_)), value) => value,
        };

        Ok(Arg::Value(normalized))
    }

    fn validate(&self, param: &ParamMetadata, arg: Arg) -> Result<Arg> {
        let (Some(options), Some(ParamType::Class(descriptor))) = (&param.validate, &param.explicit_type)
        else {
            return Ok(arg);
        };

        match arg {
            Arg::Instance(mut instance) => {
                self.check(param, instance.fields(), descriptor, options)?;
                if options.whitelist {
                    strip_non_whitelisted(instance.fields_mut(), descriptor);
                }
                Ok(Arg::Instance(instance))
            }
            Arg::Value(Value::Object(mut map)) => {
                self.check(param, &map, descriptor, options)?;
                if options.whitelist {
                    strip_non_whitelisted(&mut map, descriptor);
                }
                Ok(Arg::Value(Value::Object(map)))
            }
            Arg::Value(Value::Array(mut items)) => {
                self.check_items(param, &items, descriptor, options)?;
                if options.whitelist {
                    for item in items.iter_mut().filter_map(Value::as_object_mut) {
                        strip_non_whitelisted(item, descriptor);
                    }
                }
                Ok(Arg::Value(Value::Array(items)))
            }
            Arg::Value(value) => Err(Error::validation(
                param.display_name(),
                param.kind,
                vec![not_an_object(&param.display_name(), &value)],
            )),
            other => Ok(other),
        }
    }

    /// Every item of an array must be an object passing the descriptor
    fn check_items(
        &self,
        param: &ParamMetadata,
        items: &[Value],
        descriptor: &TypeDescriptor,
        options: &ValidatorOptions,
    ) -> Result<()> {
        let mut violations = Vec::new();
        for (index, item) in items.iter().enumerate() {
            let property = index.to_string();
            match item {
                Value::Object(map) => {
                    let children = self.validator.validate(map, descriptor, options);
                    if !children.is_empty() {
                        let mut violation = Violation::new(property, None);
                        violation.children = children;
                        violations.push(violation);
                    }
                }
                other => violations.push(not_an_object(&property, other)),
            }
        }

        if violations.is_empty() {
            return Ok(());
        }
        Err(Error::validation(param.display_name(), param.kind, violations))
    }

    fn check(
        &self,
        param: &ParamMetadata,
        object: &Map<String, Value>,
        descriptor: &TypeDescriptor,
        options: &ValidatorOptions,
    ) -> Result<()> {
        let violations = self.validator.validate(object, descriptor, options);
        if violations.is_empty() {
            return Ok(());
        }

        log::debug!(
            "Parameter '{}' failed validation with {} violation(s)",
            param.display_name(),
            violations.len()
        );
        Err(Error::validation(param.display_name(), param.kind, violations))
    }
}

fn not_an_object(property: &str, value: &Value) -> Violation {
    Violation::new(property, Some(value.clone()))
        .constraint("isObject", format!("{} must be an object", property))
}

/// Values that count as "missing" for the required check
fn is_empty(param: &ParamMetadata, value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Object(map) => param.kind == ParamKind::Body && map.is_empty(),
        _ => false,
    }
}

fn parse_number(raw: &str) -> Option<Value> {
    let raw = raw.trim();
    if let Ok(int) = raw.parse::<i64>() {
        return Some(Value::from(int));
    }
    raw.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}
