//! Explicit registration API
//!
//! Controllers are described with a fluent builder at startup and
//! translated into metadata records:
//!
//! ```rust,ignore
//! use rustf_controllers::prelude::*;
//!
//! struct PhotoController;
//!
//! ControllerBuilder::json::<PhotoController>()
//!     .route("/photos")
//!     .action(
//!         ActionBuilder::get("get_one", "/:id", |ctx, args| {
//!             Box::pin(async move {
//!                 let id: i64 = args.get(0)?;
//!                 Outcome::json(json!({"id": id}))
//!             })
//!         })
//!         .param(Param::path("id").of_type(ParamType::Integer))
//!         .on_undefined(201),
//!     )
//!     .register_global();
//! ```

use crate::context::Context;
use crate::error::HttpError;
use crate::invoker::{ActionFuture, ActionHandler};
use crate::metadata::{
    ActionMetadataArgs, ActionOptions, ActionType, ControllerMetadataArgs, CustomParamResolver,
    MetadataArgs, MetadataArgsStorage, MiddlewarePhase, ParamKind, ParamMetadataArgs, ParamType,
    ResponseHandler, ResponseHandlerMetadataArgs, ResultCode, RoutePattern, TargetKey, UseKind,
    UseMetadataArgs, ValidateOption,
};
use crate::params::descriptor::TypeDescriptor;
use crate::params::transform::TransformOptions;
use crate::params::validation::ValidatorOptions;
use std::sync::Arc;

/// Describes one controller and its actions
pub struct ControllerBuilder {
    target: TargetKey,
    route: Option<String>,
    json: bool,
    handlers: Vec<ResponseHandler>,
    uses: Vec<(TargetKey, UseKind)>,
    actions: Vec<ActionBuilder>,
}

impl ControllerBuilder {
    /// A plain controller: strings are sent as HTML, errors as text
    pub fn new<T: ?Sized + 'static>() -> Self {
        Self {
            target: TargetKey::of::<T>(),
            route: None,
            json: false,
            handlers: Vec::new(),
            uses: Vec::new(),
            actions: Vec::new(),
        }
    }

    /// A JSON controller: every result and error is sent as JSON
    pub fn json<T: ?Sized + 'static>() -> Self {
        Self {
            json: true,
            ..Self::new::<T>()
        }
    }

    pub fn route(mut self, route: impl Into<String>) -> Self {
        self.route = Some(route.into());
        self
    }

    /// Require an authorized user for every action
    pub fn authorized(self) -> Self {
        self.response_handler(ResponseHandler::Authorized(Vec::new()))
    }

    /// Require one of `roles` for every action
    pub fn authorized_roles<I, S>(self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.response_handler(ResponseHandler::Authorized(
            roles.into_iter().map(Into::into).collect(),
        ))
    }

    /// Controller-level response handler applied to every action
    pub fn response_handler(mut self, handler: ResponseHandler) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn header(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.response_handler(ResponseHandler::Header(name.into(), value.into()))
    }

    pub fn use_before<M: 'static>(mut self) -> Self {
        self.uses
            .push((TargetKey::of::<M>(), UseKind::Middleware(MiddlewarePhase::Before)));
        self
    }

    pub fn use_after<M: 'static>(mut self) -> Self {
        self.uses
            .push((TargetKey::of::<M>(), UseKind::Middleware(MiddlewarePhase::After)));
        self
    }

    pub fn use_interceptor<I: 'static>(mut self) -> Self {
        self.uses.push((TargetKey::of::<I>(), UseKind::Interceptor));
        self
    }

    pub fn action(mut self, action: ActionBuilder) -> Self {
        self.actions.push(action);
        self
    }

    /// Translate into registration records
    pub fn into_args(self) -> Vec<MetadataArgs> {
        let target = self.target;
        let mut records = vec![MetadataArgs::from(ControllerMetadataArgs {
            target,
            route: self.route,
            json: self.json,
        })];

        records.extend(self.handlers.into_iter().map(|handler| {
            MetadataArgs::from(ResponseHandlerMetadataArgs {
                target,
                method: None,
                handler,
            })
        }));

        records.extend(self.uses.into_iter().map(|(used, kind)| {
            MetadataArgs::from(UseMetadataArgs {
                target,
                method: None,
                used,
                kind,
            })
        }));

        for action in self.actions {
            records.extend(action.into_args(target));
        }

        records
    }

    pub fn register(self, storage: &mut MetadataArgsStorage) {
        log::debug!("Registering controller {}", self.target);
        storage.register_all(self.into_args());
    }

    /// Register into the process-wide registry
    pub fn register_global(self) {
        let records = self.into_args();
        MetadataArgsStorage::write_global().register_all(records);
    }
}

/// Describes one action
pub struct ActionBuilder {
    method: String,
    action_type: ActionType,
    route: RoutePattern,
    handler: ActionHandler,
    options: ActionOptions,
    params: Vec<(usize, Param)>,
    handlers: Vec<ResponseHandler>,
    uses: Vec<(TargetKey, UseKind)>,
}

macro_rules! verb_constructors {
    ($($name:ident => $action_type:expr),* $(,)?) => {
        $(
            pub fn $name<F>(method: impl Into<String>, route: impl Into<RoutePattern>, handler: F) -> Self
            where
                F: for<'a> Fn(&'a mut Context, crate::params::Args) -> ActionFuture<'a> + Send + Sync + 'static,
            {
                Self::new($action_type, method, route, handler)
            }
        )*
    };
}

impl ActionBuilder {
    pub fn new<F>(
        action_type: ActionType,
        method: impl Into<String>,
        route: impl Into<RoutePattern>,
        handler: F,
    ) -> Self
    where
        F: for<'a> Fn(&'a mut Context, crate::params::Args) -> ActionFuture<'a> + Send + Sync + 'static,
    {
        Self {
            method: method.into(),
            action_type,
            route: route.into(),
            handler: Arc::new(handler),
            options: ActionOptions::default(),
            params: Vec::new(),
            handlers: Vec::new(),
            uses: Vec::new(),
        }
    }

    verb_constructors! {
        get => ActionType::Get,
        post => ActionType::Post,
        put => ActionType::Put,
        patch => ActionType::Patch,
        delete => ActionType::Delete,
        head => ActionType::Head,
        options => ActionType::Options,
        all => ActionType::All,
    }

    /// Append a parameter at the next free position
    pub fn param(mut self, param: Param) -> Self {
        let index = self.params.iter().map(|(i, _)| i + 1).max().unwrap_or(0);
        self.params.push((index, param));
        self
    }

    /// Declare a parameter at an explicit position
    pub fn param_at(mut self, index: usize, param: Param) -> Self {
        self.params.push((index, param));
        self
    }

    pub fn response_handler(mut self, handler: ResponseHandler) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn http_code(self, code: u16) -> Self {
        self.response_handler(ResponseHandler::SuccessCode(code))
    }

    /// Status used for unclassified failures of this action
    pub fn error_code(self, code: u16) -> Self {
        self.response_handler(ResponseHandler::ErrorCode(code))
    }

    pub fn content_type(self, content_type: impl Into<String>) -> Self {
        self.response_handler(ResponseHandler::ContentType(content_type.into()))
    }

    pub fn header(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.response_handler(ResponseHandler::Header(name.into(), value.into()))
    }

    pub fn location(self, url: impl Into<String>) -> Self {
        self.response_handler(ResponseHandler::Location(url.into()))
    }

    /// Redirect with 302
    pub fn redirect(self, url: impl Into<String>) -> Self {
        self.response_handler(ResponseHandler::Redirect {
            url: url.into(),
            status: None,
        })
    }

    pub fn redirect_with_status(self, url: impl Into<String>, status: u16) -> Self {
        self.response_handler(ResponseHandler::Redirect {
            url: url.into(),
            status: Some(status),
        })
    }

    pub fn on_null(self, code: impl Into<ResultCode>) -> Self {
        self.response_handler(ResponseHandler::OnNull(code.into()))
    }

    pub fn on_undefined(self, code: impl Into<ResultCode>) -> Self {
        self.response_handler(ResponseHandler::OnUndefined(code.into()))
    }

    /// Raise the error built by `factory` when the action returns nothing
    pub fn on_undefined_error<F>(self, factory: F) -> Self
    where
        F: Fn(&Context) -> HttpError + Send + Sync + 'static,
    {
        self.on_undefined(ResultCode::error(factory))
    }

    pub fn on_null_error<F>(self, factory: F) -> Self
    where
        F: Fn(&Context) -> HttpError + Send + Sync + 'static,
    {
        self.on_null(ResultCode::error(factory))
    }

    pub fn authorized(self) -> Self {
        self.response_handler(ResponseHandler::Authorized(Vec::new()))
    }

    pub fn authorized_roles<I, S>(self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.response_handler(ResponseHandler::Authorized(
            roles.into_iter().map(Into::into).collect(),
        ))
    }

    pub fn render(self, template: impl Into<String>) -> Self {
        self.response_handler(ResponseHandler::RenderedTemplate(template.into()))
    }

    pub fn response_transform(self, options: TransformOptions) -> Self {
        self.response_handler(ResponseHandler::ResponseClassTransformOptions(options))
    }

    /// Method-level default for `required`
    pub fn params_required(mut self, required: bool) -> Self {
        self.options.required = Some(required);
        self
    }

    pub fn params_transform(mut self, transform: bool) -> Self {
        self.options.transform = Some(transform);
        self
    }

    pub fn params_validate(mut self, validate: bool) -> Self {
        self.options.validate = Some(validate);
        self
    }

    pub fn use_before<M: 'static>(mut self) -> Self {
        self.uses
            .push((TargetKey::of::<M>(), UseKind::Middleware(MiddlewarePhase::Before)));
        self
    }

    pub fn use_after<M: 'static>(mut self) -> Self {
        self.uses
            .push((TargetKey::of::<M>(), UseKind::Middleware(MiddlewarePhase::After)));
        self
    }

    pub fn use_interceptor<I: 'static>(mut self) -> Self {
        self.uses.push((TargetKey::of::<I>(), UseKind::Interceptor));
        self
    }

    fn into_args(self, target: TargetKey) -> Vec<MetadataArgs> {
        let method = self.method;
        let mut records = vec![MetadataArgs::from(ActionMetadataArgs {
            target,
            method: method.clone(),
            action_type: self.action_type,
            route: self.route,
            handler: self.handler,
            options: self.options,
        })];

        records.extend(self.params.into_iter().map(|(index, param)| {
            MetadataArgs::from(ParamMetadataArgs {
                target,
                method: method.clone(),
                index,
                kind: param.kind,
                name: param.name,
                parse: param.parse,
                required: param.required,
                transform: param.transform,
                explicit_type: param.explicit_type,
                validate: param.validate,
                resolver: param.resolver,
            })
        }));

        records.extend(self.handlers.into_iter().map(|handler| {
            MetadataArgs::from(ResponseHandlerMetadataArgs {
                target,
                method: Some(method.clone()),
                handler,
            })
        }));

        records.extend(self.uses.into_iter().map(|(used, kind)| {
            MetadataArgs::from(UseMetadataArgs {
                target,
                method: Some(method.clone()),
                used,
                kind,
            })
        }));

        records
    }
}

/// Describes one action parameter
#[derive(Clone)]
pub struct Param {
    kind: ParamKind,
    name: String,
    parse: bool,
    required: Option<bool>,
    transform: Option<bool>,
    explicit_type: Option<ParamType>,
    validate: Option<ValidateOption>,
    resolver: Option<Arc<dyn CustomParamResolver>>,
}

impl Param {
    fn new(kind: ParamKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            parse: false,
            required: None,
            transform: None,
            explicit_type: None,
            validate: None,
            resolver: None,
        }
    }

    pub fn path(name: impl Into<String>) -> Self {
        Self::new(ParamKind::Param, name)
    }

    pub fn query(name: impl Into<String>) -> Self {
        Self::new(ParamKind::Query, name)
    }

    /// Every query parameter as one object
    pub fn queries() -> Self {
        Self::new(ParamKind::Queries, "")
    }

    pub fn body() -> Self {
        Self::new(ParamKind::Body, "")
    }

    pub fn body_param(name: impl Into<String>) -> Self {
        Self::new(ParamKind::BodyParam, name)
    }

    pub fn header(name: impl Into<String>) -> Self {
        Self::new(ParamKind::Header, name)
    }

    pub fn headers() -> Self {
        Self::new(ParamKind::Headers, "")
    }

    pub fn cookie(name: impl Into<String>) -> Self {
        Self::new(ParamKind::Cookie, name)
    }

    pub fn cookies() -> Self {
        Self::new(ParamKind::Cookies, "")
    }

    pub fn session() -> Self {
        Self::new(ParamKind::Session, "")
    }

    pub fn session_param(name: impl Into<String>) -> Self {
        Self::new(ParamKind::SessionParam, name)
    }

    pub fn current_user() -> Self {
        Self::new(ParamKind::CurrentUser, "")
    }

    pub fn request() -> Self {
        Self::new(ParamKind::Request, "")
    }

    pub fn response() -> Self {
        Self::new(ParamKind::Response, "")
    }

    pub fn custom(resolver: impl CustomParamResolver + 'static) -> Self {
        Self {
            resolver: Some(Arc::new(resolver)),
            ..Self::new(ParamKind::Custom, "")
        }
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = Some(required);
        self
    }

    /// Decode string values as JSON
    pub fn parse(mut self) -> Self {
        self.parse = true;
        self
    }

    pub fn of_type(mut self, explicit_type: ParamType) -> Self {
        self.explicit_type = Some(explicit_type);
        self
    }

    /// Structured parameter of the described type
    pub fn class(self, descriptor: TypeDescriptor) -> Self {
        self.of_type(ParamType::class(descriptor))
    }

    pub fn transform(mut self, transform: bool) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn validate(mut self, validate: bool) -> Self {
        self.validate = Some(ValidateOption::Enabled(validate));
        self
    }

    pub fn validate_with(mut self, options: ValidatorOptions) -> Self {
        self.validate = Some(ValidateOption::Options(options));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoker::Outcome;

    struct QuestionController;

    #[test]
    fn test_records_for_controller() {
        let records = ControllerBuilder::json::<QuestionController>()
            .route("/questions")
            .authorized()
            .action(
                ActionBuilder::get("get_one", "/:id", |_ctx, _args| {
                    Box::pin(async { Ok(Outcome::Undefined) })
                })
                .param(Param::path("id"))
                .param(Param::query("expand"))
                .param_at(5, Param::request())
                .header("X-A", "1"),
            )
            .into_args();

        let mut storage = MetadataArgsStorage::new();
        storage.register_all(records);

        let target = TargetKey::of::<QuestionController>();
        assert!(storage.controller_for(target).unwrap().json);
        assert_eq!(storage.actions_for(target).count(), 1);

        let indices: Vec<_> = storage.params_for(target, "get_one").map(|p| p.index).collect();
        assert_eq!(indices, vec![0, 1, 5]);
        assert_eq!(storage.response_handlers_for(target, None).count(), 1);
        assert_eq!(storage.response_handlers_for(target, Some("get_one")).count(), 1);
    }

    #[test]
    fn test_param_after_explicit_index_continues() {
        let action = ActionBuilder::post("save", "/", |_ctx, _args| Box::pin(async { Ok(Outcome::Null) }))
            .param_at(2, Param::body())
            .param(Param::header("x-token"));
        let indices: Vec<_> = action.params.iter().map(|(i, _)| *i).collect();
        assert_eq!(indices, vec![2, 3]);
    }
}
