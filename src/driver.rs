//! Request pipeline
//!
//! [`RoutingControllers`] owns everything built at startup (routes, action
//! metadata, middleware chains and the pipeline stages) and runs one request
//! through them:
//!
//! 1. global before-middlewares
//! 2. route lookup (`404` through the error mapper when nothing matches)
//! 3. authorization, then the action's own before-middlewares
//! 4. parameter resolution and invocation
//! 5. interceptors, global first
//! 6. response resolution, or error mapping on any failure
//! 7. the action's after-middlewares, then global after-middlewares

use crate::auth::{AuthorizationChecker, AuthorizationGate, CurrentUserChecker};
use crate::config::ControllersConfig;
use crate::context::Context;
use crate::error::{Error, ErrorContext, HttpError, Result};
use crate::error::mapper::ErrorMapper;
use crate::http::{Request, Response};
use crate::invoker::ActionInvoker;
use crate::metadata::{ActionMetadata, MetadataArgsStorage, MetadataBuilder, MiddlewarePhase};
use crate::middleware::{run_after, run_before, run_interceptors, Interceptor, Middleware};
use crate::params::resolver::ParamResolver;
use crate::params::transform::{StructuralTransformer, Transformer};
use crate::params::validation::{ConstraintValidator, Validator};
use crate::response::{ResponseResolver, TemplateRenderer};
use crate::routing::{RouteMatch, Router};
use crate::session::Session;
use std::sync::Arc;

/// Built controller pipeline, ready to serve requests
pub struct RoutingControllers {
    config: Arc<ControllersConfig>,
    router: Router,
    actions: Vec<Arc<ActionMetadata>>,
    before: Vec<Arc<dyn Middleware>>,
    after: Vec<Arc<dyn Middleware>>,
    interceptors: Vec<Arc<dyn Interceptor>>,
    gate: AuthorizationGate,
    params: ParamResolver,
    responses: ResponseResolver,
    errors: ErrorMapper,
}

impl RoutingControllers {
    pub fn builder() -> RoutingControllersBuilder {
        RoutingControllersBuilder::new()
    }

    pub fn config(&self) -> &ControllersConfig {
        &self.config
    }

    /// Every registered action in registration order
    pub fn actions(&self) -> &[Arc<ActionMetadata>] {
        &self.actions
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Run a request through the pipeline
    ///
    /// Never fails: every error ends up as a response built by the error
    /// mapper.
    pub async fn dispatch(&self, request: Request) -> Response {
        self.dispatch_with_session(request, None).await
    }

    /// Same as [`dispatch`](Self::dispatch) with a session already attached
    pub async fn dispatch_with_session(
        &self,
        mut request: Request,
        session: Option<Arc<Session>>,
    ) -> Response {
        let matched = self.router.match_route(&request.method, request.path());
        if let Some(RouteMatch { params, .. }) = &matched {
            request.params = params.clone();
        }

        log::debug!("{} {}", request.method, request.uri);

        let mut ctx = Context::new(request);
        ctx.set_session(session);

        let action = matched.and_then(|m| self.actions.get(m.action)).cloned();
        self.run(&mut ctx, action.as_deref()).await
    }

    async fn run(&self, ctx: &mut Context, action: Option<&ActionMetadata>) -> Response {
        match run_before(&self.before, ctx).await {
            Ok(Some(response)) => return response,
            Ok(None) => {}
            Err(e) => {
                let response = self.errors.map(&e, None);
                return with_draft_headers(response, ctx.take_response());
            }
        }

        let response = match action {
            Some(action) => match self.execute(ctx, action).await {
                Ok(response) => response,
                Err(e) => {
                    let response = self.errors.map(&e, Some(action));
                    with_draft_headers(response, ctx.take_response())
                }
            },
            None => {
                log::debug!("No route matches {} {}", ctx.method(), ctx.path());
                let error = Error::from(HttpError::not_found(format!(
                    "Cannot {} {}",
                    ctx.method(),
                    ctx.path()
                )));
                with_draft_headers(self.errors.map(&error, None), ctx.take_response())
            }
        };
        ctx.set_response(response);

        if let Some(action) = action {
            if let Err(e) = run_after(&action.after, ctx).await {
                ctx.set_response(self.errors.map(&e, Some(action)));
            }
        }
        if let Err(e) = run_after(&self.after, ctx).await {
            ctx.set_response(self.errors.map(&e, action));
        }

        ctx.take_response().unwrap_or_else(Response::internal_error)
    }

    async fn execute(&self, ctx: &mut Context, action: &ActionMetadata) -> Result<Response> {
        self.gate.check(ctx, action).await?;

        if let Some(response) = run_before(&action.before, ctx).await? {
            return Ok(response);
        }

        let args = self
            .params
            .resolve_all(ctx, &action.params)
            .await
            .with_context(|| format!("Resolving parameters of {}", action.full_name()))?;

        let outcome = ActionInvoker::invoke(action, ctx, args).await?;
        let outcome = run_interceptors(&self.interceptors, ctx, outcome).await?;
        let outcome = run_interceptors(&action.interceptors, ctx, outcome).await?;

        self.responses.resolve(ctx, action, outcome)
    }
}

/// Keep headers set before the failure (cookies, tracing ids) on error responses
fn with_draft_headers(mut response: Response, draft: Option<Response>) -> Response {
    if let Some(draft) = draft {
        for (name, value) in draft.headers {
            if response.header(&name).is_none() || name.eq_ignore_ascii_case("set-cookie") {
                response.add_header(&name, &value);
            }
        }
    }
    response
}

/// Assembles a [`RoutingControllers`] from the registry and pluggable stages
pub struct RoutingControllersBuilder {
    config: ControllersConfig,
    authorization_checker: Option<Arc<dyn AuthorizationChecker>>,
    current_user_checker: Option<Arc<dyn CurrentUserChecker>>,
    validator: Arc<dyn Validator>,
    transformer: Arc<dyn Transformer>,
    template_renderer: Option<Arc<dyn TemplateRenderer>>,
}

impl Default for RoutingControllersBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RoutingControllersBuilder {
    pub fn new() -> Self {
        Self {
            config: ControllersConfig::default(),
            authorization_checker: None,
            current_user_checker: None,
            validator: Arc::new(ConstraintValidator),
            transformer: Arc::new(StructuralTransformer),
            template_renderer: None,
        }
    }

    pub fn config(mut self, config: ControllersConfig) -> Self {
        self.config = config;
        self
    }

    pub fn authorization_checker(mut self, checker: impl AuthorizationChecker + 'static) -> Self {
        self.authorization_checker = Some(Arc::new(checker));
        self
    }

    pub fn current_user_checker(mut self, checker: impl CurrentUserChecker + 'static) -> Self {
        self.current_user_checker = Some(Arc::new(checker));
        self
    }

    pub fn validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validator = Arc::new(validator);
        self
    }

    pub fn transformer(mut self, transformer: impl Transformer + 'static) -> Self {
        self.transformer = Arc::new(transformer);
        self
    }

    pub fn template_renderer(mut self, renderer: impl TemplateRenderer + 'static) -> Self {
        self.template_renderer = Some(Arc::new(renderer));
        self
    }

    /// Build from the process-wide registry
    pub fn build(self) -> Result<RoutingControllers> {
        let storage = MetadataArgsStorage::read_global();
        self.build_from(&storage)
    }

    /// Build from an explicit registry
    ///
    /// Fails on invalid configuration or when two actions claim the same
    /// method and literal route.
    pub fn build_from(self, storage: &MetadataArgsStorage) -> Result<RoutingControllers> {
        self.config.validate()?;
        let config = Arc::new(self.config);

        let controllers = MetadataBuilder::new(&config).build(storage);

        let mut router = Router::new();
        let mut actions = Vec::new();
        for action in controllers.into_iter().flat_map(|c| c.actions) {
            router
                .add_route(action.action_type, &action.route, actions.len())
                .with_context(|| format!("Registering {}", action.full_name()))?;
            log::debug!("{} {} => {}", action.action_type, action.route, action.full_name());
            actions.push(action);
        }

        let before: Vec<_> = storage
            .global_middlewares(MiddlewarePhase::Before)
            .into_iter()
            .map(|m| Arc::clone(&m.middleware))
            .collect();
        let after: Vec<_> = storage
            .global_middlewares(MiddlewarePhase::After)
            .into_iter()
            .map(|m| Arc::clone(&m.middleware))
            .collect();
        let interceptors: Vec<_> = storage
            .global_interceptors()
            .into_iter()
            .map(|i| Arc::clone(&i.interceptor))
            .collect();

        log::info!(
            "Registered {} action(s), {} global middleware(s), {} global interceptor(s)",
            actions.len(),
            before.len() + after.len(),
            interceptors.len()
        );

        let transform_options = config.plain_to_class_transform_options.clone().unwrap_or_default();

        Ok(RoutingControllers {
            router,
            actions,
            before,
            after,
            interceptors,
            gate: AuthorizationGate::new(self.authorization_checker),
            params: ParamResolver::new(
                Arc::clone(&self.transformer),
                self.validator,
                self.current_user_checker,
                transform_options,
            ),
            responses: ResponseResolver::new(
                Arc::clone(&config),
                self.transformer,
                self.template_renderer,
            ),
            errors: ErrorMapper::new(&config),
            config,
        })
    }
}
