use gantry::logging::{init_logging_with_config, LogConfig};
use gantry::prelude::*;
use gantry::scheduler::{SchedulerConfig, Task, TaskCatalog, Trigger};
use http::Method;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

fn build_app() -> anyhow::Result<App> {
    let item = ModelDef::new("Item")
        .description("Something for sale")
        .field("name", TypeSpec::String)
        .with_field(FieldDef::new("price", TypeSpec::Number).gt(0.0))
        .field("tags", TypeSpec::array(TypeSpec::String))
        .into_type();

    let counter = Arc::new(AtomicU64::new(0));
    let next_id = Dependency::new("next_id", move |_| {
        Ok(counter.fetch_add(1, Ordering::Relaxed) + 1)
    });

    let mut config = AppConfig::new("Gantry Demo", "0.1.0").apply_env();
    config.scheduler = Some(SchedulerConfig::default().task("heartbeat", "demo.jobs"));
    let tasks = TaskCatalog::new().with(
        "demo.jobs",
        "heartbeat",
        Task::new(|_, _| {
            tracing::info!("heartbeat");
            Ok(())
        })
        .id("heartbeat")
        .trigger(Trigger::every(30)),
    );

    let app = AppBuilder::new(config)
        .tasks(tasks)
        .dependency(next_id)
        .route(
            Route::get("/items/{item_id}", "read_item", |req| {
                HandlerResponse::ok(json!({
                    "item_id": req.param("item_id"),
                    "q": req.param("q"),
                }))
            })
            .param(ParameterDescriptor::path("item_id", TypeSpec::Integer).ge(1.0))
            .param(ParameterDescriptor::query("q", TypeSpec::optional(TypeSpec::String)).optional())
            .tag("items"),
        )
        .route(
            Route::post("/items", "create_item", |req| {
                let id = req.dependency::<u64>("next_id").map(|id| *id);
                HandlerResponse::json(201, json!({ "id": id, "item": req.param("item") }))
            })
            .param(ParameterDescriptor::body("item", item.clone()))
            .inject(["next_id"])
            .response_model(item)
            .security(SecurityScheme::bearer().bearer_format("JWT"))
            .tag("items"),
        )
        .build()?;
    Ok(app)
}

fn main() -> anyhow::Result<()> {
    let _guard = init_logging_with_config(&LogConfig::from_env())?;
    let app = build_app()?;
    app.startup()?;

    for line in app.router().dump_routes() {
        println!("{line}");
    }

    let requests = vec![
        RequestData::get("/items/42?q=pen"),
        RequestData::get("/items/0"),
        RequestData::post("/items").json(&json!({"name": "Pen", "price": 1.5, "tags": []})),
        RequestData::post("/items").json(&json!({"name": "Pen", "price": -1})),
        RequestData::new(Method::DELETE, "/items/1"),
        RequestData::get("/nowhere"),
    ];
    for request in requests {
        let label = format!("{} {}", request.method, request.path);
        let response = app.handle(request);
        println!("{label} -> {} {}", response.status, response.body);
    }

    let document = app.openapi()?;
    println!("{}", serde_json::to_string_pretty(document.as_ref())?);

    app.shutdown()?;
    Ok(())
}
