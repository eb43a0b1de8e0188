use super::args::*;
use super::TargetKey;
use once_cell::sync::Lazy;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// One registration record of any kind
#[derive(Debug, Clone)]
pub enum MetadataArgs {
    Controller(ControllerMetadataArgs),
    Action(ActionMetadataArgs),
    Param(ParamMetadataArgs),
    ResponseHandler(ResponseHandlerMetadataArgs),
    Middleware(MiddlewareMetadataArgs),
    Interceptor(InterceptorMetadataArgs),
    Use(UseMetadataArgs),
}

macro_rules! impl_from_args {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for MetadataArgs {
                fn from(args: $ty) -> Self {
                    MetadataArgs::$variant(args)
                }
            }
        )*
    };
}

impl_from_args! {
    Controller => ControllerMetadataArgs,
    Action => ActionMetadataArgs,
    Param => ParamMetadataArgs,
    ResponseHandler => ResponseHandlerMetadataArgs,
    Middleware => MiddlewareMetadataArgs,
    Interceptor => InterceptorMetadataArgs,
    Use => UseMetadataArgs,
}

static GLOBAL_STORAGE: Lazy<RwLock<MetadataArgsStorage>> =
    Lazy::new(|| RwLock::new(MetadataArgsStorage::new()));

/// Append-only registry of declarations
///
/// Records are kept in registration order; every query returns them in that
/// order. Construct instances freely for isolated setups, or use
/// [`MetadataArgsStorage::global`] for the process-wide registry.
#[derive(Debug, Clone, Default)]
pub struct MetadataArgsStorage {
    pub controllers: Vec<ControllerMetadataArgs>,
    pub actions: Vec<ActionMetadataArgs>,
    pub params: Vec<ParamMetadataArgs>,
    pub response_handlers: Vec<ResponseHandlerMetadataArgs>,
    pub middlewares: Vec<MiddlewareMetadataArgs>,
    pub interceptors: Vec<InterceptorMetadataArgs>,
    pub uses: Vec<UseMetadataArgs>,
}

impl MetadataArgsStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry
    pub fn global() -> &'static RwLock<MetadataArgsStorage> {
        &GLOBAL_STORAGE
    }

    /// Read access to the global registry
    pub fn read_global() -> RwLockReadGuard<'static, MetadataArgsStorage> {
        GLOBAL_STORAGE.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write access to the global registry
    pub fn write_global() -> RwLockWriteGuard<'static, MetadataArgsStorage> {
        GLOBAL_STORAGE.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(&mut self, args: impl Into<MetadataArgs>) {
        match args.into() {
            MetadataArgs::Controller(args) => self.controllers.push(args),
            MetadataArgs::Action(args) => self.actions.push(args),
            MetadataArgs::Param(args) => self.params.push(args),
            MetadataArgs::ResponseHandler(args) => self.response_handlers.push(args),
            MetadataArgs::Middleware(args) => self.middlewares.push(args),
            MetadataArgs::Interceptor(args) => self.interceptors.push(args),
            MetadataArgs::Use(args) => self.uses.push(args),
        }
    }

    pub fn register_all<I>(&mut self, records: I)
    where
        I: IntoIterator<Item = MetadataArgs>,
    {
        for record in records {
            self.register(record);
        }
    }

    /// Clear every record
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
            && self.actions.is_empty()
            && self.params.is_empty()
            && self.response_handlers.is_empty()
            && self.middlewares.is_empty()
            && self.interceptors.is_empty()
            && self.uses.is_empty()
    }

    pub fn controller_for(&self, target: TargetKey) -> Option<&ControllerMetadataArgs> {
        self.controllers.iter().rev().find(|c| c.target == target)
    }

    pub fn actions_for(&self, target: TargetKey) -> impl Iterator<Item = &ActionMetadataArgs> {
        self.actions.iter().filter(move |a| a.target == target)
    }

    pub fn params_for<'a>(
        &'a self,
        target: TargetKey,
        method: &'a str,
    ) -> impl Iterator<Item = &'a ParamMetadataArgs> {
        self.params
            .iter()
            .filter(move |p| p.target == target && p.method == method)
    }

    /// Response handlers of a controller (`method == None`) or of one action
    pub fn response_handlers_for<'a>(
        &'a self,
        target: TargetKey,
        method: Option<&'a str>,
    ) -> impl Iterator<Item = &'a ResponseHandlerMetadataArgs> {
        self.response_handlers
            .iter()
            .filter(move |h| h.target == target && h.method.as_deref() == method)
    }

    pub fn uses_for<'a>(
        &'a self,
        target: TargetKey,
        method: Option<&'a str>,
    ) -> impl Iterator<Item = &'a UseMetadataArgs> {
        self.uses
            .iter()
            .filter(move |u| u.target == target && u.method.as_deref() == method)
    }

    /// Global middlewares of a phase, in execution order
    pub fn global_middlewares(&self, phase: MiddlewarePhase) -> Vec<&MiddlewareMetadataArgs> {
        let mut middlewares: Vec<_> = self
            .middlewares
            .iter()
            .filter(|m| m.global && m.phase == phase)
            .collect();

        // stable sort keeps registration order among equal priorities
        match phase {
            MiddlewarePhase::Before => middlewares.sort_by(|a, b| b.priority.cmp(&a.priority)),
            MiddlewarePhase::After => middlewares.sort_by(|a, b| a.priority.cmp(&b.priority)),
        }
        middlewares
    }

    pub fn global_interceptors(&self) -> Vec<&InterceptorMetadataArgs> {
        let mut interceptors: Vec<_> = self.interceptors.iter().filter(|i| i.global).collect();
        interceptors.sort_by(|a, b| b.priority.cmp(&a.priority));
        interceptors
    }

    pub fn find_middleware(&self, target: TargetKey, phase: MiddlewarePhase) -> Option<&MiddlewareMetadataArgs> {
        self.middlewares
            .iter()
            .rev()
            .find(|m| m.target == target && m.phase == phase)
    }

    pub fn find_interceptor(&self, target: TargetKey) -> Option<&InterceptorMetadataArgs> {
        self.interceptors.iter().rev().find(|i| i.target == target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::error::Result;
    use crate::middleware::{Middleware, MiddlewareAction};
    use async_trait::async_trait;

    struct Photos;
    struct Users;

    struct Noop(&'static str);

    #[async_trait]
    impl Middleware for Noop {
        async fn handle(&self, _ctx: &mut Context) -> Result<MiddlewareAction> {
            Ok(MiddlewareAction::Continue)
        }

        fn name(&self) -> &'static str {
            self.0
        }
    }

    fn handler(target: TargetKey, method: Option<&str>, code: u16) -> ResponseHandlerMetadataArgs {
        ResponseHandlerMetadataArgs {
            target,
            method: method.map(str::to_string),
            handler: ResponseHandler::SuccessCode(code),
        }
    }

    #[test]
    fn test_queries_keep_registration_order() {
        let mut storage = MetadataArgsStorage::new();
        let photos = TargetKey::of::<Photos>();
        let users = TargetKey::of::<Users>();

        storage.register(handler(photos, Some("save"), 201));
        storage.register(handler(users, Some("save"), 202));
        storage.register(handler(photos, Some("save"), 203));
        storage.register(handler(photos, None, 204));

        let codes: Vec<_> = storage
            .response_handlers_for(photos, Some("save"))
            .map(|h| match h.handler {
                ResponseHandler::SuccessCode(code) => code,
                _ => 0,
            })
            .collect();
        assert_eq!(codes, vec![201, 203]);
        assert_eq!(storage.response_handlers_for(photos, None).count(), 1);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut storage = MetadataArgsStorage::new();
        storage.register(ControllerMetadataArgs {
            target: TargetKey::of::<Photos>(),
            route: Some("/photos".into()),
            json: true,
        });
        assert!(!storage.is_empty());
        assert!(storage.controller_for(TargetKey::of::<Photos>()).is_some());

        storage.reset();
        assert!(storage.is_empty());
    }

    #[test]
    fn test_global_middleware_ordering() {
        let mut storage = MetadataArgsStorage::new();
        storage.register(MiddlewareMetadataArgs::global(Noop("low"), MiddlewarePhase::Before, 1));
        storage.register(MiddlewareMetadataArgs::global(Noop("high"), MiddlewarePhase::Before, 10));
        storage.register(MiddlewareMetadataArgs::global(Noop("after-high"), MiddlewarePhase::After, 10));
        storage.register(MiddlewareMetadataArgs::global(Noop("after-low"), MiddlewarePhase::After, 1));

        let before: Vec<_> = storage
            .global_middlewares(MiddlewarePhase::Before)
            .iter()
            .map(|m| m.middleware.name())
            .collect();
        assert_eq!(before, vec!["high", "low"]);

        let after: Vec<_> = storage
            .global_middlewares(MiddlewarePhase::After)
            .iter()
            .map(|m| m.middleware.name())
            .collect();
        assert_eq!(after, vec!["after-low", "after-high"]);
    }
}
