//! Response resolution
//!
//! Turns a settled [`Outcome`] into the final [`Response`] following the
//! action's response handlers. Status precedence: redirect, then the
//! `undefined`/`null` policies, then the success code. Declared headers,
//! content type and location apply independently of the status.

use crate::config::ControllersConfig;
use crate::context::Context;
use crate::error::{Error, HttpError, Result};
use crate::http::Response;
use crate::invoker::Outcome;
use crate::metadata::{ActionMetadata, ResultCode};
use crate::params::transform::Transformer;
use hyper::StatusCode;
use serde_json::{Map, Value};
use std::sync::Arc;

const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";
const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Renders `rendered-template` actions
pub trait TemplateRenderer: Send + Sync {
    fn render(&self, template: &str, data: &Value) -> Result<String>;
}

pub struct ResponseResolver {
    config: Arc<ControllersConfig>,
    transformer: Arc<dyn Transformer>,
    renderer: Option<Arc<dyn TemplateRenderer>>,
}

impl ResponseResolver {
    pub fn new(
        config: Arc<ControllersConfig>,
        transformer: Arc<dyn Transformer>,
        renderer: Option<Arc<dyn TemplateRenderer>>,
    ) -> Self {
        Self {
            config,
            transformer,
            renderer,
        }
    }

    /// Build the response for a successful invocation
    ///
    /// Headers the action or a before-middleware put on the context draft
    /// are kept; declared headers replace draft headers of the same name.
    /// The draft itself stays on the context so a failure here (error
    /// factories, template failures) still carries its headers to the error
    /// mapper.
    pub fn resolve(&self, ctx: &Context, action: &ActionMetadata, outcome: Outcome) -> Result<Response> {
        let mut response = Response::ok();
        if let Some(draft) = ctx.get_response() {
            response.headers = draft.headers.clone();
        }
        apply_declared_headers(&mut response, action);

        if let Some(redirect) = &action.redirect {
            let target = redirect_target(&redirect.url, &outcome, ctx);
            response.status = status(redirect.status);
            response.set_header("Location", &target);
            return Ok(response);
        }

        match outcome {
            Outcome::Undefined => {
                let policy = action.undefined_result.clone().or_else(|| {
                    self.config
                        .defaults
                        .undefined_result_code
                        .map(ResultCode::Status)
                });
                match policy {
                    Some(policy) => response.status = self.empty_result(ctx, policy)?,
                    None => {
                        return Err(HttpError::not_found(format!(
                            "Resource was not found for {} {}",
                            ctx.method(),
                            ctx.url()
                        ))
                        .into())
                    }
                }
            }
            Outcome::Null => {
                let policy = action
                    .null_result
                    .clone()
                    .or_else(|| self.config.defaults.null_result_code.map(ResultCode::Status));
                response.status = match policy {
                    Some(policy) => self.empty_result(ctx, policy)?,
                    None => StatusCode::NO_CONTENT,
                };
            }
            Outcome::Value(value) => {
                response.status = status(action.success_code.unwrap_or(200));
                self.emit_body(&mut response, action, value)?;
            }
        }

        Ok(response)
    }

    fn empty_result(&self, ctx: &Context, policy: ResultCode) -> Result<StatusCode> {
        match policy {
            ResultCode::Status(code) => Ok(status(code)),
            ResultCode::Error(factory) => Err(Error::Http(factory(ctx))),
        }
    }

    fn emit_body(&self, response: &mut Response, action: &ActionMetadata, value: Value) -> Result<()> {
        let value = match self.serialization_options(action) {
            Some(options) if value.is_object() || value.is_array() => {
                self.transformer.class_to_plain(value, &options)
            }
            _ => value,
        };

        let (body, inferred) = if let Some(template) = &action.rendered_template {
            let renderer = self.renderer.as_ref().ok_or_else(|| {
                Error::template(format!(
                    "{} renders '{}' but no template renderer is configured",
                    action.full_name(),
                    template
                ))
            })?;
            (renderer.render(template, &value)?.into_bytes(), HTML_CONTENT_TYPE)
        } else {
            match value {
                Value::String(text) if !action.json => (text.into_bytes(), HTML_CONTENT_TYPE),
                value => (serde_json::to_vec(&value)?, JSON_CONTENT_TYPE),
            }
        };

        if response.header("content-type").is_none() {
            response.set_header("Content-Type", inferred);
        }
        response.body = body;
        Ok(())
    }

    /// Method-level options, else the global ones, when transformation is on
    fn serialization_options(&self, action: &ActionMetadata) -> Option<crate::params::TransformOptions> {
        if !self.config.class_transformer {
            return None;
        }
        action
            .response_transform
            .clone()
            .or_else(|| self.config.class_to_plain_transform_options.clone())
    }
}

fn status(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

fn apply_declared_headers(response: &mut Response, action: &ActionMetadata) {
    if let Some(content_type) = &action.content_type {
        response.set_header("Content-Type", content_type);
    }
    if let Some(location) = &action.location {
        response.set_header("Location", location);
    }
    for (name, value) in &action.headers {
        response.set_header(name, value);
    }
}

/// Compute the redirect target
///
/// A string outcome replaces the declared URL. Otherwise `:name`
/// placeholders are filled from an object outcome, then from path params.
fn redirect_target(url: &str, outcome: &Outcome, ctx: &Context) -> String {
    let fields = match outcome {
        Outcome::Value(Value::String(target)) => return target.clone(),
        Outcome::Value(Value::Object(map)) => Some(map),
        _ => None,
    };

    url.split('/')
        .map(|segment| match segment.strip_prefix(':') {
            Some(name) => lookup(name, fields, ctx).unwrap_or_else(|| segment.to_string()),
            None => segment.to_string(),
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn lookup(name: &str, fields: Option<&Map<String, Value>>, ctx: &Context) -> Option<String> {
    let from_outcome = fields.and_then(|f| f.get(name)).map(|value| match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    });
    from_outcome.or_else(|| ctx.param(name).map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Request;
    use serde_json::json;

    #[test]
    fn test_redirect_target_templating() {
        let mut request = Request::new("GET", "/go/7");
        request.params.insert("id".into(), "7".into());
        let ctx = Context::new(request);

        assert_eq!(
            redirect_target("/users/:owner/photos/:id", &Outcome::from(json!({"owner": "umed"})), &ctx),
            "/users/umed/photos/7"
        );
        assert_eq!(
            redirect_target("http://github.com", &Outcome::text("http://microsoft.com"), &ctx),
            "http://microsoft.com"
        );
        assert_eq!(redirect_target("/a/:missing", &Outcome::Undefined, &ctx), "/a/:missing");
    }
}
