use criterion::{black_box, criterion_group, criterion_main, Criterion};
use regex::Regex;
use rustf_controllers::metadata::{ActionType, RoutePattern};
use rustf_controllers::routing::Router;

fn build_router() -> Router {
    let routes = [
        (ActionType::Get, "/"),
        (ActionType::Get, "/about"),
        (ActionType::Get, "/api/users"),
        (ActionType::Post, "/api/users"),
        (ActionType::Get, "/api/users/:id"),
        (ActionType::Put, "/api/users/:id"),
        (ActionType::Get, "/api/users/:id/posts/:post_id"),
        (ActionType::Get, "/files/*"),
        (ActionType::All, "/health"),
    ];

    let mut router = Router::new();
    for (index, (action_type, path)) in routes.iter().enumerate() {
        router
            .add_route(*action_type, &RoutePattern::from(*path), index)
            .expect("routes are unique");
    }
    let regex = Regex::new(r"^/archive/(?P<year>\d{4})$").expect("valid regex");
    router
        .add_route(ActionType::Get, &RoutePattern::from(regex), routes.len())
        .expect("regex routes never clash");
    router
}

fn benchmark_static_routes(c: &mut Criterion) {
    let router = build_router();

    c.bench_function("static_route_match", |b| {
        b.iter(|| black_box(router.match_route("GET", black_box("/api/users"))))
    });

    c.bench_function("static_route_miss", |b| {
        b.iter(|| black_box(router.match_route("GET", black_box("/nonexistent"))))
    });
}

fn benchmark_dynamic_routes(c: &mut Criterion) {
    let router = build_router();

    c.bench_function("param_route_match", |b| {
        b.iter(|| black_box(router.match_route("GET", black_box("/api/users/123/posts/456"))))
    });

    c.bench_function("method_fallback_match", |b| {
        b.iter(|| black_box(router.match_route("DELETE", black_box("/health"))))
    });

    c.bench_function("regex_route_match", |b| {
        b.iter(|| black_box(router.match_route("GET", black_box("/archive/2024"))))
    });
}

criterion_group!(benches, benchmark_static_routes, benchmark_dynamic_routes);
criterion_main!(benches);
