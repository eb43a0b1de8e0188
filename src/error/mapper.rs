//! Error mapping
//!
//! Every failure of the pipeline ends here and becomes a terminal response.
//! JSON controllers get an object body (`name`, `message` and the error's own
//! fields), plain controllers get the message as text.

use super::context::ErrorChain;
use super::Error;
use crate::config::ControllersConfig;
use crate::http::Response;
use crate::metadata::ActionMetadata;
use serde_json::{Map, Value};
use std::collections::HashMap;

const REDACTED_MESSAGE: &str = "Internal Server Error";

#[derive(Debug, Clone, Default)]
pub struct ErrorMapper {
    development: bool,
    overrides: HashMap<String, Value>,
}

impl ErrorMapper {
    pub fn new(config: &ControllersConfig) -> Self {
        Self {
            development: config.is_development(),
            overrides: config.error_overriding_map.clone(),
        }
    }

    /// Map an error raised while handling `action` (or before any action matched)
    pub fn map(&self, error: &Error, action: Option<&ActionMetadata>) -> Response {
        let root = error.root();
        let classified = root.is_classified();

        let mut code = root.status_code();
        if classified {
            log::debug!("Request failed with {}: {}", code, error);
        } else {
            log::error!("Unhandled error: {}", ErrorChain::new(error).format_for_log());
            if let Some(error_code) = action.and_then(|a| a.error_code) {
                code = error_code;
            }
        }

        let json = action.map(|a| a.json).unwrap_or(true);
        let mut response = if json {
            let body = self.json_body(error);
            Response::new(hyper::StatusCode::OK)
                .with_header("Content-Type", "application/json; charset=utf-8")
                .with_body(body.to_string().into_bytes())
        } else {
            Response::new(hyper::StatusCode::OK)
                .with_header("Content-Type", "text/plain; charset=utf-8")
                .with_body(self.message(error).into_bytes())
        };

        response.status = Response::with_code(code).status;
        response
    }

    /// Message exposed to clients
    fn message(&self, error: &Error) -> String {
        let root = error.root();
        match root {
            Error::Http(http) => http.message.clone(),
            _ if root.is_classified() => root.to_string(),
            _ if self.development => ErrorChain::new(error).format_for_log(),
            _ => REDACTED_MESSAGE.to_string(),
        }
    }

    pub fn json_body(&self, error: &Error) -> Value {
        let root = error.root();
        let mut body = Map::new();
        body.insert("name".into(), Value::String(root.name().to_string()));

        if root.is_classified() || self.development {
            body.insert("message".into(), Value::String(self.message(error)));
        }

        match root {
            Error::Http(http) => {
                for (key, value) in &http.extra {
                    body.insert(key.clone(), value.clone());
                }
            }
            Error::Validation {
                name, violations, ..
            } => {
                body.insert("paramName".into(), Value::String(name.clone()));
                body.insert(
                    "errors".into(),
                    serde_json::to_value(violations).unwrap_or(Value::Array(Vec::new())),
                );
            }
            Error::ParamRequired { name, .. }
            | Error::ParamParse { name, .. }
            | Error::InvalidParam { name, .. } => {
                body.insert("paramName".into(), Value::String(name.clone()));
            }
            _ => {}
        }

        if let Some(Value::Object(overrides)) = self.overrides.get(root.name()) {
            for (key, value) in overrides {
                body.insert(key.clone(), value.clone());
            }
        }

        Value::Object(body)
    }
}
