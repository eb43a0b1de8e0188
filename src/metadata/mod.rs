//! Metadata registry
//!
//! Declarations are recorded as plain `*MetadataArgs` records in a
//! [`MetadataArgsStorage`]. At startup the [`MetadataBuilder`] resolves them
//! against the configuration into immutable [`ControllerMetadata`] and
//! [`ActionMetadata`], which the driver executes.

pub mod action;
pub mod args;
pub mod storage;

pub use action::{ActionMetadata, ControllerMetadata, MetadataBuilder, ParamMetadata, Redirect};
pub use args::{
    resolve_override, ActionMetadataArgs, ActionOptions, ActionType, ControllerMetadataArgs,
    CustomParamResolver, ErrorFactory, InterceptorMetadataArgs, MiddlewareMetadataArgs,
    MiddlewarePhase, ParamKind, ParamMetadataArgs, ParamType, ResponseHandler,
    ResponseHandlerMetadataArgs, ResultCode, RoutePattern, UseKind, UseMetadataArgs,
    ValidateOption,
};
pub use storage::{MetadataArgs, MetadataArgsStorage};

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identity of a declaring type (controller, middleware, interceptor)
#[derive(Debug, Clone, Copy)]
pub struct TargetKey {
    id: TypeId,
    name: &'static str,
}

impl TargetKey {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Full type path
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Type name without its module path
    pub fn short_name(&self) -> &'static str {
        let base = self.name.split('<').next().unwrap_or(self.name);
        base.rsplit("::").next().unwrap_or(base)
    }
}

impl PartialEq for TargetKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TargetKey {}

impl Hash for TargetKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for TargetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}
