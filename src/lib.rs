//! RustF controllers - declarative controller actions over hyper
//!
//! Controllers and their actions are registered once at startup, together
//! with parameter, response and authorization declarations. The pipeline
//! then routes each request to an action, resolves its parameters, invokes
//! it and shapes the response:
//! - typed parameter binding with optional transformation and validation
//! - `null`/`undefined` result policies, redirects, headers and templates
//! - role-based authorization delegated to the application
//! - uniform JSON or text error responses

// Enforce error handling best practices
#![cfg_attr(
    not(test),
    warn(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::unimplemented,
        clippy::todo,
    )
)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used,))]

pub mod auth;
pub mod builder;
pub mod config;
pub mod context;
pub mod driver;
pub mod error;
pub mod http;
pub mod invoker;
pub mod metadata;
pub mod middleware;
pub mod params;
pub mod response;
pub mod routing;
pub mod session;

// Re-export main types for public API
pub use auth::{AuthorizationChecker, AuthorizationFn, CurrentUserChecker, CurrentUserFn};
pub use builder::{ActionBuilder, ControllerBuilder, Param};
pub use config::{ControllersConfig, Environment, ValidationSetting};
pub use context::Context;
pub use driver::{RoutingControllers, RoutingControllersBuilder};
pub use error::{Error, HttpError, Result, Violation};
pub use http::{Request, Response, Server};
pub use invoker::{ActionFuture, ActionHandler, Outcome};
pub use metadata::{
    ActionType, MetadataArgsStorage, MiddlewarePhase, ParamKind, ParamType, ResponseHandler,
    ResultCode,
};
pub use middleware::{Interceptor, Middleware, MiddlewareAction};
pub use params::{Arg, Args};
pub use response::TemplateRenderer;
pub use session::{MemorySessionStore, Session, SessionMiddleware};

// Re-export commonly used external types
pub use serde::{Deserialize, Serialize};
pub use serde_json::{json, Value};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::*;
    pub use crate::metadata::{InterceptorMetadataArgs, MiddlewareMetadataArgs};
    pub use crate::params::descriptor::TypeDescriptor;
    pub use crate::params::transform::{Instance, TransformOptions};
    pub use crate::params::validation::{Constraint, ValidatorOptions};
    pub use async_trait::async_trait;
    pub use serde::{Deserialize, Serialize};
    pub use serde_json::json;
    pub use std::collections::HashMap;
}
