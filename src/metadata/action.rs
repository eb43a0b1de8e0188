use super::args::*;
use super::storage::MetadataArgsStorage;
use super::TargetKey;
use crate::config::ControllersConfig;
use crate::invoker::ActionHandler;
use crate::middleware::{Interceptor, Middleware};
use crate::params::transform::TransformOptions;
use crate::params::validation::ValidatorOptions;
use indexmap::IndexMap;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// A parameter with every flag resolved against the configuration
#[derive(Clone)]
pub struct ParamMetadata {
    pub index: usize,
    pub kind: ParamKind,
    pub name: String,
    pub parse: bool,
    pub required: bool,
    pub transform: bool,
    pub explicit_type: Option<ParamType>,
    /// Validation options when validation is enabled for this parameter
    pub validate: Option<ValidatorOptions>,
    pub resolver: Option<Arc<dyn CustomParamResolver>>,
}

impl ParamMetadata {
    /// Name used in error bodies: the declared name, or the source kind
    pub fn display_name(&self) -> String {
        if self.name.is_empty() {
            self.kind.to_string()
        } else {
            self.name.clone()
        }
    }
}

impl fmt::Debug for ParamMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParamMetadata")
            .field("index", &self.index)
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("required", &self.required)
            .field("transform", &self.transform)
            .field("validate", &self.validate)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub url: String,
    pub status: u16,
}

/// Executable description of one action
///
/// Everything the pipeline needs at request time is precomputed here:
/// the full route, positional parameters and the winning response handler
/// of every kind.
pub struct ActionMetadata {
    pub target: TargetKey,
    pub method: String,
    pub action_type: ActionType,
    /// Route including prefix and controller route
    pub route: RoutePattern,
    /// Inherited from the controller
    pub json: bool,
    /// Sorted by ascending index
    pub params: Vec<ParamMetadata>,
    pub handler: ActionHandler,
    pub success_code: Option<u16>,
    pub error_code: Option<u16>,
    pub content_type: Option<String>,
    pub location: Option<String>,
    /// Declared headers in declaration order, one entry per name
    pub headers: Vec<(String, String)>,
    pub redirect: Option<Redirect>,
    pub null_result: Option<ResultCode>,
    pub undefined_result: Option<ResultCode>,
    /// Required roles; `None` when the action is open
    pub authorized: Option<Vec<String>>,
    pub rendered_template: Option<String>,
    pub response_transform: Option<TransformOptions>,
    pub before: Vec<Arc<dyn Middleware>>,
    pub after: Vec<Arc<dyn Middleware>>,
    pub interceptors: Vec<Arc<dyn Interceptor>>,
}

impl ActionMetadata {
    /// `Controller.method`, used in logs
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.target, self.method)
    }

    fn apply(&mut self, handler: &ResponseHandler, headers: &mut IndexMap<String, (String, String)>) {
        match handler {
            ResponseHandler::SuccessCode(code) => self.success_code = Some(*code),
            ResponseHandler::ErrorCode(code) => self.error_code = Some(*code),
            ResponseHandler::ContentType(value) => self.content_type = Some(value.clone()),
            ResponseHandler::Header(name, value) => {
                headers.insert(name.to_lowercase(), (name.clone(), value.clone()));
            }
            ResponseHandler::Location(url) => self.location = Some(url.clone()),
            ResponseHandler::Redirect { url, status } => {
                self.redirect = Some(Redirect {
                    url: url.clone(),
                    status: status.unwrap_or(302),
                })
            }
            ResponseHandler::OnNull(code) => self.null_result = Some(code.clone()),
            ResponseHandler::OnUndefined(code) => self.undefined_result = Some(code.clone()),
            ResponseHandler::Authorized(roles) => self.authorized = Some(roles.clone()),
            ResponseHandler::RenderedTemplate(template) => {
                self.rendered_template = Some(template.clone())
            }
            ResponseHandler::ResponseClassTransformOptions(options) => {
                self.response_transform = Some(options.clone())
            }
        }
    }
}

impl fmt::Debug for ActionMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionMetadata")
            .field("action", &self.full_name())
            .field("action_type", &self.action_type)
            .field("route", &self.route)
            .field("json", &self.json)
            .field("params", &self.params)
            .finish()
    }
}

#[derive(Debug)]
pub struct ControllerMetadata {
    pub target: TargetKey,
    pub route: Option<String>,
    pub json: bool,
    pub actions: Vec<Arc<ActionMetadata>>,
}

/// Resolves raw declarations into executable metadata
pub struct MetadataBuilder<'a> {
    config: &'a ControllersConfig,
}

impl<'a> MetadataBuilder<'a> {
    pub fn new(config: &'a ControllersConfig) -> Self {
        Self { config }
    }

    pub fn build(&self, storage: &MetadataArgsStorage) -> Vec<ControllerMetadata> {
        self.warn_orphans(storage);

        let mut seen = HashSet::new();
        let mut controllers = Vec::new();

        for controller in &storage.controllers {
            if !seen.insert(controller.target) {
                continue;
            }
            // the latest registration of a controller wins
            let controller = storage.controller_for(controller.target).unwrap_or(controller);

            let actions: Vec<Arc<ActionMetadata>> = storage
                .actions_for(controller.target)
                .map(|action| Arc::new(self.build_action(storage, controller, action)))
                .collect();

            log::debug!(
                "Built controller {} with {} action(s)",
                controller.target,
                actions.len()
            );

            controllers.push(ControllerMetadata {
                target: controller.target,
                route: controller.route.clone(),
                json: controller.json,
                actions,
            });
        }

        controllers
    }

    fn build_action(
        &self,
        storage: &MetadataArgsStorage,
        controller: &ControllerMetadataArgs,
        args: &ActionMetadataArgs,
    ) -> ActionMetadata {
        let mut action = ActionMetadata {
            target: args.target,
            method: args.method.clone(),
            action_type: args.action_type,
            route: build_route(
                self.config.route_prefix.as_deref(),
                controller.route.as_deref(),
                &args.route,
            ),
            json: controller.json,
            params: self.build_params(storage, args),
            handler: Arc::clone(&args.handler),
            success_code: None,
            error_code: None,
            content_type: None,
            location: None,
            headers: Vec::new(),
            redirect: None,
            null_result: None,
            undefined_result: None,
            authorized: None,
            rendered_template: None,
            response_transform: None,
            before: Vec::new(),
            after: Vec::new(),
            interceptors: Vec::new(),
        };

        let mut headers = IndexMap::new();
        let class_level = storage.response_handlers_for(args.target, None);
        let method_level = storage.response_handlers_for(args.target, Some(&args.method));
        for entry in class_level.chain(method_level) {
            action.apply(&entry.handler, &mut headers);
        }
        action.headers = headers.into_values().collect();

        let class_uses = storage.uses_for(args.target, None);
        let method_uses = storage.uses_for(args.target, Some(&args.method));
        for entry in class_uses.chain(method_uses) {
            match entry.kind {
                UseKind::Middleware(phase) => match storage.find_middleware(entry.used, phase) {
                    Some(found) => {
                        let chain = match phase {
                            MiddlewarePhase::Before => &mut action.before,
                            MiddlewarePhase::After => &mut action.after,
                        };
                        chain.push(Arc::clone(&found.middleware));
                    }
                    None => log::warn!(
                        "{} uses middleware {} which is not registered, ignoring",
                        action.full_name(),
                        entry.used
                    ),
                },
                UseKind::Interceptor => match storage.find_interceptor(entry.used) {
                    Some(found) => action.interceptors.push(Arc::clone(&found.interceptor)),
                    None => log::warn!(
                        "{} uses interceptor {} which is not registered, ignoring",
                        action.full_name(),
                        entry.used
                    ),
                },
            }
        }

        log::debug!(
            "Registered {} {} => {}",
            action.action_type,
            action.route,
            action.full_name()
        );
        action
    }

    fn build_params(&self, storage: &MetadataArgsStorage, action: &ActionMetadataArgs) -> Vec<ParamMetadata> {
        let mut by_index = BTreeMap::new();

        for param in storage.params_for(action.target, &action.method) {
            let built = ParamMetadata {
                index: param.index,
                kind: param.kind,
                name: param.name.clone(),
                parse: param.parse,
                required: param.resolve_required(&action.options, self.config),
                transform: param.resolve_transform(&action.options, self.config),
                explicit_type: param.explicit_type.clone(),
                validate: param.resolve_validate(&action.options, self.config),
                resolver: param.resolver.clone(),
            };

            if by_index.insert(param.index, built).is_some() {
                log::warn!(
                    "{}.{} declares parameter #{} twice, the later declaration wins",
                    action.target,
                    action.method,
                    param.index
                );
            }
        }

        by_index.into_values().collect()
    }

    fn warn_orphans(&self, storage: &MetadataArgsStorage) {
        let has_action = |target: TargetKey, method: &str| {
            storage
                .actions
                .iter()
                .any(|a| a.target == target && a.method == method)
        };

        for action in &storage.actions {
            if storage.controller_for(action.target).is_none() {
                log::warn!(
                    "Action {}.{} belongs to no registered controller, ignoring",
                    action.target,
                    action.method
                );
            }
        }

        for param in &storage.params {
            if !has_action(param.target, &param.method) {
                log::warn!(
                    "Parameter #{} of {}.{} references no action, ignoring",
                    param.index,
                    param.target,
                    param.method
                );
            }
        }

        for entry in &storage.response_handlers {
            let known = match &entry.method {
                Some(method) => has_action(entry.target, method),
                None => storage.controller_for(entry.target).is_some(),
            };
            if !known {
                log::warn!(
                    "Response handler {:?} on {}.{} references no action, ignoring",
                    entry.handler,
                    entry.target,
                    entry.method.as_deref().unwrap_or("*")
                );
            }
        }
    }
}

/// Join prefix, controller route and action route into one literal template
///
/// Regex routes are matched against the whole path and never prefixed.
pub fn build_route(prefix: Option<&str>, controller: Option<&str>, action: &RoutePattern) -> RoutePattern {
    let path = match action {
        RoutePattern::Regex(regex) => return RoutePattern::Regex(regex.clone()),
        RoutePattern::Path(path) => path,
    };

    let joined: Vec<&str> = [prefix.unwrap_or(""), controller.unwrap_or(""), path.as_str()]
        .iter()
        .flat_map(|part| part.split('/'))
        .filter(|segment| !segment.is_empty())
        .collect();

    RoutePattern::Path(format!("/{}", joined.join("/")))
}
