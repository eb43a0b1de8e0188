//! Raw declarations accumulated in the [`MetadataArgsStorage`](super::MetadataArgsStorage)
//!
//! Every struct here is created once at registration time and never mutated
//! afterwards. The [`MetadataBuilder`](super::MetadataBuilder) turns them into
//! executable [`ActionMetadata`](super::ActionMetadata).

use super::TargetKey;
use crate::config::ControllersConfig;
use crate::context::Context;
use crate::error::{HttpError, Result};
use crate::invoker::ActionHandler;
use crate::middleware::{Interceptor, Middleware};
use crate::params::descriptor::TypeDescriptor;
use crate::params::transform::TransformOptions;
use crate::params::validation::ValidatorOptions;
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// HTTP verb an action answers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionType {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    /// Any method
    All,
}

impl ActionType {
    /// Method key used by the router, `*` for [`ActionType::All`]
    pub fn as_method(&self) -> &'static str {
        match self {
            ActionType::Get => "GET",
            ActionType::Post => "POST",
            ActionType::Put => "PUT",
            ActionType::Patch => "PATCH",
            ActionType::Delete => "DELETE",
            ActionType::Head => "HEAD",
            ActionType::Options => "OPTIONS",
            ActionType::All => "*",
        }
    }

    pub fn matches(&self, method: &str) -> bool {
        matches!(self, ActionType::All) || self.as_method().eq_ignore_ascii_case(method)
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_method())
    }
}

/// Literal path template (`/photos/:id`) or regular expression
#[derive(Debug, Clone)]
pub enum RoutePattern {
    Path(String),
    Regex(Regex),
}

impl From<&str> for RoutePattern {
    fn from(path: &str) -> Self {
        RoutePattern::Path(path.to_string())
    }
}

impl From<String> for RoutePattern {
    fn from(path: String) -> Self {
        RoutePattern::Path(path)
    }
}

impl From<Regex> for RoutePattern {
    fn from(regex: Regex) -> Self {
        RoutePattern::Regex(regex)
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutePattern::Path(path) => f.write_str(path),
            RoutePattern::Regex(regex) => write!(f, "/{}/", regex.as_str()),
        }
    }
}

/// Part of the request a parameter is extracted from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    /// Named path segment
    Param,
    Query,
    /// All query parameters as one object
    Queries,
    Body,
    /// One field of the body
    BodyParam,
    Header,
    Headers,
    Cookie,
    Cookies,
    Session,
    SessionParam,
    CurrentUser,
    Request,
    Response,
    Custom,
}

impl ParamKind {
    /// Sources that are required unless configured otherwise
    pub fn is_session_like(&self) -> bool {
        matches!(self, ParamKind::Session)
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ParamKind::Param => "path parameter",
            ParamKind::Query => "query parameter",
            ParamKind::Queries => "queries",
            ParamKind::Body => "body",
            ParamKind::BodyParam => "body parameter",
            ParamKind::Header => "header",
            ParamKind::Headers => "headers",
            ParamKind::Cookie => "cookie",
            ParamKind::Cookies => "cookies",
            ParamKind::Session => "session",
            ParamKind::SessionParam => "session parameter",
            ParamKind::CurrentUser => "current user",
            ParamKind::Request => "request",
            ParamKind::Response => "response",
            ParamKind::Custom => "custom parameter",
        };
        f.write_str(label)
    }
}

/// Explicit target type of a parameter
#[derive(Debug, Clone)]
pub enum ParamType {
    String,
    Number,
    Integer,
    Boolean,
    /// Structured type: JSON strings are decoded, objects become instances
    Class(Arc<TypeDescriptor>),
}

impl ParamType {
    pub fn class(descriptor: TypeDescriptor) -> Self {
        ParamType::Class(Arc::new(descriptor))
    }
}

/// Parameter-level validation flag or options
#[derive(Debug, Clone, PartialEq)]
pub enum ValidateOption {
    Enabled(bool),
    Options(ValidatorOptions),
}

impl ValidateOption {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, ValidateOption::Enabled(false))
    }
}

/// Resolves `custom` parameters
#[async_trait]
pub trait CustomParamResolver: Send + Sync {
    async fn resolve(&self, ctx: &Context) -> Result<Option<Value>>;
}

/// Builds the error raised by an `on_null`/`on_undefined` error override
pub type ErrorFactory = Arc<dyn Fn(&Context) -> HttpError + Send + Sync>;

/// Status code or error produced for a `null`/`undefined` result
#[derive(Clone)]
pub enum ResultCode {
    Status(u16),
    Error(ErrorFactory),
}

impl ResultCode {
    pub fn error<F>(factory: F) -> Self
    where
        F: Fn(&Context) -> HttpError + Send + Sync + 'static,
    {
        ResultCode::Error(Arc::new(factory))
    }
}

impl From<u16> for ResultCode {
    fn from(code: u16) -> Self {
        ResultCode::Status(code)
    }
}

impl fmt::Debug for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultCode::Status(code) => write!(f, "Status({})", code),
            ResultCode::Error(_) => f.write_str("Error(<factory>)"),
        }
    }
}

/// Declarative response shaping rule
#[derive(Debug, Clone)]
pub enum ResponseHandler {
    SuccessCode(u16),
    /// Status for unclassified failures of the action
    ErrorCode(u16),
    ContentType(String),
    Header(String, String),
    Location(String),
    Redirect { url: String, status: Option<u16> },
    OnNull(ResultCode),
    OnUndefined(ResultCode),
    /// Authorization marker; an empty list means "any authenticated user"
    Authorized(Vec<String>),
    RenderedTemplate(String),
    ResponseClassTransformOptions(TransformOptions),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MiddlewarePhase {
    Before,
    After,
}

#[derive(Debug, Clone)]
pub struct ControllerMetadataArgs {
    pub target: TargetKey,
    /// Base route prepended to every action route
    pub route: Option<String>,
    /// JSON controllers serialize every result and error as JSON
    pub json: bool,
}

/// Method-level defaults for the parameters of one action
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionOptions {
    pub required: Option<bool>,
    pub transform: Option<bool>,
    pub validate: Option<bool>,
}

#[derive(Clone)]
pub struct ActionMetadataArgs {
    pub target: TargetKey,
    pub method: String,
    pub action_type: ActionType,
    pub route: RoutePattern,
    pub handler: ActionHandler,
    pub options: ActionOptions,
}

impl fmt::Debug for ActionMetadataArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionMetadataArgs")
            .field("target", &self.target)
            .field("method", &self.method)
            .field("action_type", &self.action_type)
            .field("route", &self.route)
            .finish()
    }
}

#[derive(Clone)]
pub struct ParamMetadataArgs {
    pub target: TargetKey,
    pub method: String,
    pub index: usize,
    pub kind: ParamKind,
    /// Name for named sources, empty otherwise
    pub name: String,
    /// Decode string values as JSON
    pub parse: bool,
    pub required: Option<bool>,
    pub transform: Option<bool>,
    pub explicit_type: Option<ParamType>,
    pub validate: Option<ValidateOption>,
    pub resolver: Option<Arc<dyn CustomParamResolver>>,
}

impl fmt::Debug for ParamMetadataArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParamMetadataArgs")
            .field("target", &self.target)
            .field("method", &self.method)
            .field("index", &self.index)
            .field("kind", &self.kind)
            .field("name", &self.name)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ResponseHandlerMetadataArgs {
    pub target: TargetKey,
    /// `None` for controller-level handlers
    pub method: Option<String>,
    pub handler: ResponseHandler,
}

#[derive(Clone)]
pub struct MiddlewareMetadataArgs {
    pub target: TargetKey,
    /// Global middlewares run for every request
    pub global: bool,
    /// Higher runs first for `Before`, last for `After`
    pub priority: i32,
    pub phase: MiddlewarePhase,
    pub middleware: Arc<dyn Middleware>,
}

impl MiddlewareMetadataArgs {
    pub fn global<M: Middleware>(middleware: M, phase: MiddlewarePhase, priority: i32) -> Self {
        Self {
            target: TargetKey::of::<M>(),
            global: true,
            priority,
            phase,
            middleware: Arc::new(middleware),
        }
    }

    /// A middleware only run where an action or controller uses it
    pub fn local<M: Middleware>(middleware: M, phase: MiddlewarePhase) -> Self {
        Self {
            target: TargetKey::of::<M>(),
            global: false,
            priority: 0,
            phase,
            middleware: Arc::new(middleware),
        }
    }
}

impl fmt::Debug for MiddlewareMetadataArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareMetadataArgs")
            .field("target", &self.target)
            .field("global", &self.global)
            .field("priority", &self.priority)
            .field("phase", &self.phase)
            .finish()
    }
}

#[derive(Clone)]
pub struct InterceptorMetadataArgs {
    pub target: TargetKey,
    pub global: bool,
    pub priority: i32,
    pub interceptor: Arc<dyn Interceptor>,
}

impl InterceptorMetadataArgs {
    pub fn global<I: Interceptor>(interceptor: I, priority: i32) -> Self {
        Self {
            target: TargetKey::of::<I>(),
            global: true,
            priority,
            interceptor: Arc::new(interceptor),
        }
    }

    pub fn local<I: Interceptor>(interceptor: I) -> Self {
        Self {
            target: TargetKey::of::<I>(),
            global: false,
            priority: 0,
            interceptor: Arc::new(interceptor),
        }
    }
}

impl fmt::Debug for InterceptorMetadataArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorMetadataArgs")
            .field("target", &self.target)
            .field("global", &self.global)
            .field("priority", &self.priority)
            .finish()
    }
}

/// Use of a registered middleware or interceptor by a controller or action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UseKind {
    Middleware(MiddlewarePhase),
    Interceptor,
}

#[derive(Debug, Clone)]
pub struct UseMetadataArgs {
    pub target: TargetKey,
    pub method: Option<String>,
    /// The middleware or interceptor being used
    pub used: TargetKey,
    pub kind: UseKind,
}

/// The generic three-level override used for `required`, `transform` and `validate`
///
/// Parameter-level beats method-level beats global; the framework default
/// applies when no level says anything.
pub fn resolve_override<T>(
    specific: Option<T>,
    method_default: Option<T>,
    global_default: Option<T>,
    framework_default: T,
) -> T {
    specific
        .or(method_default)
        .or(global_default)
        .unwrap_or(framework_default)
}

impl ParamMetadataArgs {
    pub(crate) fn resolve_required(&self, options: &ActionOptions, config: &ControllersConfig) -> bool {
        resolve_override(
            self.required,
            options.required,
            config.defaults.param_options.required,
            self.kind.is_session_like(),
        )
    }

    pub(crate) fn resolve_transform(&self, options: &ActionOptions, config: &ControllersConfig) -> bool {
        resolve_override(
            self.transform,
            options.transform,
            Some(config.class_transformer),
            true,
        )
    }

    pub(crate) fn resolve_validate(
        &self,
        options: &ActionOptions,
        config: &ControllersConfig,
    ) -> Option<ValidatorOptions> {
        let enabled = resolve_override(
            self.validate.as_ref().map(ValidateOption::is_enabled),
            options.validate,
            Some(config.validation.is_enabled()),
            false,
        );

        if !enabled {
            return None;
        }

        match &self.validate {
            Some(ValidateOption::Options(options)) => Some(options.clone()),
            _ => Some(config.validation.options()),
        }
    }
}
