use rustf_controllers::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct AdminController;

struct FailingChecker;

#[async_trait]
impl AuthorizationChecker for FailingChecker {
    async fn check(&self, _ctx: &Context, _roles: &[String]) -> Result<bool> {
        Err(Error::internal("token service unavailable"))
    }
}

/// Grants access when the `x-role` header names one of the roles
fn role_checker() -> AuthorizationFn<impl Fn(&Context, &[String]) -> bool + Send + Sync> {
    AuthorizationFn(|ctx: &Context, roles: &[String]| match ctx.header("x-role") {
        Some(role) => roles.is_empty() || roles.iter().any(|r| r == role),
        None => false,
    })
}

fn admin_controller(calls: Arc<AtomicUsize>) -> ControllerBuilder {
    let counter = Arc::clone(&calls);
    ControllerBuilder::json::<AdminController>()
        .route("/admin")
        .authorized()
        .action(
            ActionBuilder::get("dashboard", "/", |_ctx, _args| {
                Box::pin(async { Outcome::json(json!({"page": "dashboard"})) })
            }),
        )
        .action(
            ActionBuilder::delete("remove", "/users/:id", move |_ctx, _args| {
                counter.fetch_add(1, Ordering::SeqCst);
                Box::pin(async { Ok(Outcome::Null) })
            })
            .param(Param::path("id").of_type(ParamType::Integer).required(true))
            .authorized_roles(["admin"]),
        )
}

fn build(calls: Arc<AtomicUsize>, builder: RoutingControllersBuilder) -> RoutingControllers {
    let mut storage = MetadataArgsStorage::new();
    admin_controller(calls).register(&mut storage);
    builder.build_from(&storage).unwrap()
}

#[tokio::test]
async fn test_missing_checker_is_server_error() {
    let controllers = build(Arc::default(), RoutingControllers::builder());

    let response = controllers.dispatch(Request::new("GET", "/admin")).await;
    assert_eq!(response.status.as_u16(), 500);
    assert_eq!(
        response.body_json().unwrap()["name"],
        "AuthorizationCheckerNotDefinedError"
    );
}

#[tokio::test]
async fn test_refusal_without_roles_is_unauthorized() {
    let controllers = build(
        Arc::default(),
        RoutingControllers::builder().authorization_checker(role_checker()),
    );

    let response = controllers.dispatch(Request::new("GET", "/admin")).await;
    assert_eq!(response.status.as_u16(), 401);
    assert_eq!(response.body_json().unwrap()["name"], "AuthorizationRequiredError");

    let response = controllers
        .dispatch(Request::new("GET", "/admin").with_header("X-Role", "editor"))
        .await;
    assert_eq!(response.status.as_u16(), 200);
}

#[tokio::test]
async fn test_refusal_with_roles_is_forbidden() {
    let calls = Arc::new(AtomicUsize::new(0));
    let controllers = build(
        Arc::clone(&calls),
        RoutingControllers::builder().authorization_checker(role_checker()),
    );

    let response = controllers
        .dispatch(Request::new("DELETE", "/admin/users/5").with_header("X-Role", "editor"))
        .await;
    assert_eq!(response.status.as_u16(), 403);
    assert_eq!(response.body_json().unwrap()["name"], "AccessDeniedError");
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let response = controllers
        .dispatch(Request::new("DELETE", "/admin/users/5").with_header("X-Role", "admin"))
        .await;
    assert_eq!(response.status.as_u16(), 204);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_gate_runs_before_parameters() {
    let controllers = build(
        Arc::default(),
        RoutingControllers::builder().authorization_checker(role_checker()),
    );

    // the id is invalid, but the refusal must win
    let response = controllers
        .dispatch(Request::new("DELETE", "/admin/users/abc"))
        .await;
    assert_eq!(response.status.as_u16(), 403);

    let response = controllers
        .dispatch(Request::new("DELETE", "/admin/users/abc").with_header("X-Role", "admin"))
        .await;
    assert_eq!(response.status.as_u16(), 400);
}

#[tokio::test]
async fn test_failing_checker_counts_as_refusal() {
    let controllers = build(
        Arc::default(),
        RoutingControllers::builder().authorization_checker(FailingChecker),
    );

    let response = controllers.dispatch(Request::new("GET", "/admin")).await;
    assert_eq!(response.status.as_u16(), 401);

    let response = controllers
        .dispatch(Request::new("DELETE", "/admin/users/1"))
        .await;
    assert_eq!(response.status.as_u16(), 403);
}
