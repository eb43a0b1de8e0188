use rustf_controllers::prelude::*;

struct PageController;
struct ApiController;

struct Braces;

impl TemplateRenderer for Braces {
    fn render(&self, template: &str, data: &Value) -> Result<String> {
        let title = data["title"].as_str().unwrap_or_default();
        Ok(format!("<{}>{}</{}>", template, title, template))
    }
}

fn pages() -> ControllerBuilder {
    ControllerBuilder::new::<PageController>()
        .action(ActionBuilder::get("hello", "/hello", |_ctx, _args| {
            Box::pin(async { Ok(Outcome::text("<h1>Hello</h1>")) })
        }))
        .action(ActionBuilder::get("data", "/data", |_ctx, _args| {
            Box::pin(async { Outcome::json(json!({"a": 1})) })
        }))
        .action(
            ActionBuilder::get("rendered", "/rendered", |_ctx, _args| {
                Box::pin(async { Outcome::json(json!({"title": "Photos"})) })
            })
            .render("main"),
        )
        .action(
            ActionBuilder::get("csv", "/report", |_ctx, _args| {
                Box::pin(async { Ok(Outcome::text("a,b\n1,2")) })
            })
            .content_type("text/csv"),
        )
}

fn api() -> ControllerBuilder {
    ControllerBuilder::json::<ApiController>()
        .route("/api")
        .action(
            ActionBuilder::post("create", "/photos", |ctx, _args| {
                Box::pin(async move {
                    ctx.add_header("X-Draft", "kept");
                    Outcome::json(json!({"id": 10}))
                })
            })
            .http_code(201)
            .location("/api/photos/10"),
        )
        .action(
            ActionBuilder::get("github", "/github", |_ctx, _args| {
                Box::pin(async { Ok(Outcome::Undefined) })
            })
            .redirect("http://github.com"),
        )
        .action(
            ActionBuilder::get("moved", "/moved/:id", |_ctx, _args| {
                Box::pin(async { Outcome::json(json!({"owner": "umed"})) })
            })
            .redirect_with_status("/users/:owner/photos/:id", 301),
        )
        .action(
            ActionBuilder::get("elsewhere", "/elsewhere", |_ctx, _args| {
                Box::pin(async { Ok(Outcome::text("http://microsoft.com")) })
            })
            .redirect("http://github.com"),
        )
        .action(
            ActionBuilder::get("text", "/text", |_ctx, _args| {
                Box::pin(async { Ok(Outcome::text("plain")) })
            }),
        )
        .action(
            ActionBuilder::get("empty", "/empty", |_ctx, _args| {
                Box::pin(async { Ok(Outcome::Null) })
            })
            .on_null(205),
        )
        .action(
            ActionBuilder::get("missing", "/missing", |_ctx, _args| {
                Box::pin(async { Ok(Outcome::Undefined) })
            }),
        )
        .action(
            ActionBuilder::get("null_error", "/null-error", |_ctx, _args| {
                Box::pin(async { Ok(Outcome::Null) })
            })
            .on_null_error(|ctx| HttpError::bad_request(format!("Nothing at {}", ctx.path()))),
        )
        .action(
            ActionBuilder::get("user", "/user", |_ctx, _args| {
                Box::pin(async {
                    Outcome::json(json!({
                        "name": "umed",
                        "_password": "secret",
                        "profile": {"_token": "abc", "city": "Dushanbe"}
                    }))
                })
            })
            .response_transform(TransformOptions {
                exclude_prefixes: vec!["_".into()],
                ..Default::default()
            }),
        )
}

fn build(config: ControllersConfig, renderer: bool) -> RoutingControllers {
    let mut storage = MetadataArgsStorage::new();
    pages().register(&mut storage);
    api().register(&mut storage);

    let builder = RoutingControllers::builder().config(config);
    let builder = if renderer {
        builder.template_renderer(Braces)
    } else {
        builder
    };
    builder.build_from(&storage).unwrap()
}

fn controllers() -> RoutingControllers {
    build(ControllersConfig::default(), true)
}

#[tokio::test]
async fn test_plain_controller_bodies() {
    let controllers = controllers();

    let html = controllers.dispatch(Request::new("GET", "/hello")).await;
    assert_eq!(html.header("content-type"), Some("text/html; charset=utf-8"));
    assert_eq!(html.body_string(), "<h1>Hello</h1>");

    let data = controllers.dispatch(Request::new("GET", "/data")).await;
    assert_eq!(data.header("content-type"), Some("application/json; charset=utf-8"));
    assert_eq!(data.body_json().unwrap(), json!({"a": 1}));
}

#[tokio::test]
async fn test_json_controller_serializes_strings() {
    let response = controllers().dispatch(Request::new("GET", "/api/text")).await;
    assert_eq!(response.header("content-type"), Some("application/json; charset=utf-8"));
    assert_eq!(response.body_string(), "\"plain\"");
}

#[tokio::test]
async fn test_declared_content_type_wins() {
    let response = controllers().dispatch(Request::new("GET", "/report")).await;
    assert_eq!(response.header("content-type"), Some("text/csv"));
    assert_eq!(response.body_string(), "a,b\n1,2");
}

#[tokio::test]
async fn test_success_code_and_location() {
    let response = controllers()
        .dispatch(Request::new("POST", "/api/photos"))
        .await;

    assert_eq!(response.status.as_u16(), 201);
    assert_eq!(response.header("location"), Some("/api/photos/10"));
    assert_eq!(response.header("x-draft"), Some("kept"));
    assert_eq!(response.body_json().unwrap(), json!({"id": 10}));
}

#[tokio::test]
async fn test_redirects() {
    let controllers = controllers();

    let response = controllers.dispatch(Request::new("GET", "/api/github")).await;
    assert_eq!(response.status.as_u16(), 302);
    assert_eq!(response.header("location"), Some("http://github.com"));
    assert!(response.body.is_empty());

    let response = controllers.dispatch(Request::new("GET", "/api/moved/7")).await;
    assert_eq!(response.status.as_u16(), 301);
    assert_eq!(response.header("location"), Some("/users/umed/photos/7"));

    let response = controllers.dispatch(Request::new("GET", "/api/elsewhere")).await;
    assert_eq!(response.header("location"), Some("http://microsoft.com"));
}

#[tokio::test]
async fn test_empty_result_policies() {
    let controllers = controllers();

    let response = controllers.dispatch(Request::new("GET", "/api/empty")).await;
    assert_eq!(response.status.as_u16(), 205);
    assert!(response.body.is_empty());

    let response = controllers.dispatch(Request::new("GET", "/api/missing")).await;
    assert_eq!(response.status.as_u16(), 404);
    assert_eq!(response.body_json().unwrap()["name"], "NotFoundError");

    let response = controllers.dispatch(Request::new("GET", "/api/null-error")).await;
    assert_eq!(response.status.as_u16(), 400);
    assert_eq!(
        response.body_json().unwrap()["message"],
        "Nothing at /api/null-error"
    );
}

#[tokio::test]
async fn test_configured_result_defaults() {
    let mut config = ControllersConfig::default();
    config.defaults.null_result_code = Some(404);
    config.defaults.undefined_result_code = Some(204);
    let controllers = build(config, true);

    // action-level policy still wins over the configured default
    let response = controllers.dispatch(Request::new("GET", "/api/empty")).await;
    assert_eq!(response.status.as_u16(), 205);

    let response = controllers.dispatch(Request::new("GET", "/api/missing")).await;
    assert_eq!(response.status.as_u16(), 204);
    assert!(response.body.is_empty());
}

#[tokio::test]
async fn test_response_transform_excludes_fields() {
    let response = controllers().dispatch(Request::new("GET", "/api/user")).await;
    assert_eq!(
        response.body_json().unwrap(),
        json!({"name": "umed", "profile": {"city": "Dushanbe"}})
    );

    let mut config = ControllersConfig::default();
    config.class_transformer = false;
    let untouched = build(config, true)
        .dispatch(Request::new("GET", "/api/user"))
        .await;
    assert_eq!(untouched.body_json().unwrap()["_password"], "secret");
}

#[tokio::test]
async fn test_rendered_template() {
    let response = controllers().dispatch(Request::new("GET", "/rendered")).await;
    assert_eq!(response.header("content-type"), Some("text/html; charset=utf-8"));
    assert_eq!(response.body_string(), "<main>Photos</main>");

    let without_renderer = build(ControllersConfig::default(), false)
        .dispatch(Request::new("GET", "/rendered"))
        .await;
    assert_eq!(without_renderer.status.as_u16(), 500);
}

#[tokio::test]
async fn test_route_prefix() {
    let config = ControllersConfig::default().with_route_prefix("/v1");
    let controllers = build(config, true);

    let response = controllers.dispatch(Request::new("GET", "/v1/api/text")).await;
    assert_eq!(response.status.as_u16(), 200);

    let response = controllers.dispatch(Request::new("GET", "/api/text")).await;
    assert_eq!(response.status.as_u16(), 404);
}
