use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rustf_controllers::prelude::*;

struct PhotoController;

fn build_controllers() -> RoutingControllers {
    let filter = TypeDescriptor::new("PhotoFilter").field(
        "keyword",
        vec![Constraint::Length {
            min: 3,
            max: Some(20),
        }],
    );

    let mut storage = MetadataArgsStorage::new();
    ControllerBuilder::json::<PhotoController>()
        .route("/photos")
        .action(
            ActionBuilder::get("get_one", "/:id", |_ctx, args| {
                Box::pin(async move {
                    let id: i64 = args.get(0)?;
                    Outcome::json(json!({"id": id, "name": "Photo"}))
                })
            })
            .param(Param::path("id").of_type(ParamType::Integer))
            .header("Cache-Control", "max-age=60"),
        )
        .action(
            ActionBuilder::get("search", "/", |_ctx, args| {
                Box::pin(async move {
                    let filter: Value = args.get(0)?;
                    Outcome::json(json!({"filter": filter, "results": []}))
                })
            })
            .param(Param::query("filter").class(filter).validate(true)),
        )
        .register(&mut storage);

    RoutingControllers::builder()
        .build_from(&storage)
        .expect("controllers build")
}

fn benchmark_dispatch(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime");
    let controllers = build_controllers();

    c.bench_function("dispatch_path_param", |b| {
        b.iter(|| {
            let response = runtime.block_on(controllers.dispatch(Request::new("GET", "/photos/42")));
            black_box(response);
        })
    });

    c.bench_function("dispatch_validated_query", |b| {
        b.iter(|| {
            let request = Request::new("GET", "/photos?filter=%7B%22keyword%22%3A%22sunset%22%7D");
            black_box(runtime.block_on(controllers.dispatch(request)));
        })
    });

    c.bench_function("dispatch_not_found", |b| {
        b.iter(|| black_box(runtime.block_on(controllers.dispatch(Request::new("GET", "/missing")))))
    });
}

criterion_group!(benches, benchmark_dispatch);
criterion_main!(benches);
