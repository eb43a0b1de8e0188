use crate::metadata::ParamKind;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

pub mod context;
pub mod mapper;

pub type Result<T> = std::result::Result<T, Error>;

pub use context::ErrorContext;
pub use mapper::ErrorMapper;

/// Main error type for the controller pipeline
///
/// Every failure a request can hit between routing and response emission is
/// one of these variants. The [`ErrorMapper`] turns any of them into a
/// terminal response.
#[derive(Error, Debug)]
pub enum Error {
    /// An error raised on purpose by user code, carrying its own status
    #[error("{0}")]
    Http(HttpError),

    #[error("Authorization is required for request on {method} {url}")]
    AuthorizationRequired { method: String, url: String },

    #[error("Access is denied for request on {method} {url}")]
    AccessDenied { method: String, url: String },

    #[error("Cannot use authorized actions without an authorization checker")]
    AuthorizationCheckerNotDefined,

    #[error("Cannot use current-user parameters without a current user checker")]
    CurrentUserCheckerNotDefined,

    #[error("Invalid request, {kind} \"{name}\" is required")]
    ParamRequired { name: String, kind: ParamKind },

    #[error("The value '{value}' of {kind} \"{name}\" is not a valid JSON string")]
    ParamParse {
        name: String,
        kind: ParamKind,
        value: String,
    },

    #[error("Given parameter {name} is invalid. Value (\"{value}\") cannot be parsed into {expected}")]
    InvalidParam {
        name: String,
        value: String,
        expected: &'static str,
    },

    #[error("Invalid {kind}, check 'errors' property for more info")]
    Validation {
        name: String,
        kind: ParamKind,
        violations: Vec<Violation>,
    },

    #[error("Template error: {0}")]
    Template(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Hyper(#[from] hyper::Error),

    #[cfg(feature = "config")]
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    // Error with context chain
    #[error("{message}")]
    WithContext {
        message: String,
        #[source]
        source: Box<Error>,
    },
}

impl From<HttpError> for Error {
    fn from(err: HttpError) -> Self {
        Self::Http(err)
    }
}

impl Error {
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn template(msg: impl Into<String>) -> Self {
        Self::Template(msg.into())
    }

    pub fn param_required(name: impl Into<String>, kind: ParamKind) -> Self {
        Self::ParamRequired {
            name: name.into(),
            kind,
        }
    }

    pub fn validation(name: impl Into<String>, kind: ParamKind, violations: Vec<Violation>) -> Self {
        Self::Validation {
            name: name.into(),
            kind,
            violations,
        }
    }

    // Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            message: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping context wrappers
    pub fn root(&self) -> &Error {
        match self {
            Error::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// Error name as exposed in JSON error bodies
    pub fn name(&self) -> &str {
        match self {
            Error::Http(err) => &err.name,
            Error::AuthorizationRequired { .. } => "AuthorizationRequiredError",
            Error::AccessDenied { .. } => "AccessDeniedError",
            Error::AuthorizationCheckerNotDefined => "AuthorizationCheckerNotDefinedError",
            Error::CurrentUserCheckerNotDefined => "CurrentUserCheckerNotDefinedError",
            Error::ParamRequired { .. } => "ParamRequiredError",
            Error::ParamParse { .. } => "ParameterParseJsonError",
            Error::InvalidParam { .. } => "InvalidParamError",
            Error::Validation { .. } => "BadRequestError",
            Error::Template(_) => "TemplateError",
            Error::Config(_) => "ConfigError",
            Error::Internal(_) | Error::Io(_) | Error::Hyper(_) => "InternalServerError",
            Error::Json(_) => "JsonError",
            #[cfg(feature = "config")]
            Error::Toml(_) => "ConfigError",
            Error::WithContext { source, .. } => source.name(),
        }
    }

    /// Get HTTP status code for the error
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Http(err) => err.status,
            Error::AuthorizationRequired { .. } => 401,
            Error::AccessDenied { .. } => 403,
            Error::ParamRequired { .. }
            | Error::ParamParse { .. }
            | Error::InvalidParam { .. }
            | Error::Validation { .. } => 400,
            Error::WithContext { source, .. } => source.status_code(),
            _ => 500,
        }
    }

    /// Whether the error has a defined HTTP meaning.
    ///
    /// Unclassified errors are reported as 500 and their message is only
    /// exposed in development mode.
    pub fn is_classified(&self) -> bool {
        match self {
            Error::WithContext { source, .. } => source.is_classified(),
            _ => self.status_code() != 500 || matches!(self, Error::Http(_)),
        }
    }
}

/// An HTTP error declared by user code
///
/// Mirrors the usual error classes of a web framework: a status, a name used
/// to look up overrides and a message. Extra fields are emitted verbatim in
/// JSON error bodies.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpError {
    pub status: u16,
    pub name: String,
    pub message: String,
    pub extra: Map<String, Value>,
}

impl HttpError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            name: "HttpError".to_string(),
            message: message.into(),
            extra: Map::new(),
        }
    }

    fn named(status: u16, name: &str, message: impl Into<String>) -> Self {
        Self::new(status, message).with_name(name)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::named(400, "BadRequestError", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::named(401, "UnauthorizedError", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::named(403, "ForbiddenError", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::named(404, "NotFoundError", message)
    }

    pub fn method_not_allowed(message: impl Into<String>) -> Self {
        Self::named(405, "MethodNotAllowedError", message)
    }

    pub fn not_acceptable(message: impl Into<String>) -> Self {
        Self::named(406, "NotAcceptableError", message)
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::named(500, "InternalServerError", message)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Attach an extra field emitted next to `name` and `message`
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.name, self.status, self.message)
    }
}

impl std::error::Error for HttpError {}

/// A single failed property check
///
/// `constraints` maps the constraint key (`isLength`, `isEmail`, ...) to a
/// human readable message, in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Violation {
    pub property: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    pub constraints: IndexMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Violation>,
}

impl Violation {
    pub fn new(property: impl Into<String>, value: Option<Value>) -> Self {
        Self {
            property: property.into(),
            value,
            constraints: IndexMap::new(),
            children: Vec::new(),
        }
    }

    pub fn constraint(mut self, key: impl Into<String>, message: impl Into<String>) -> Self {
        self.constraints.insert(key.into(), message.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty() && self.children.is_empty()
    }
}
