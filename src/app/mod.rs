//! # App Module
//!
//! Ties the pieces together. [`AppBuilder`] collects routes and app-wide
//! declarations and validates them all in one pass; [`App`] serves requests.
//!
//! ## Request Flow
//!
//! 1. The OpenAPI endpoint (`GET <openapi_url>`) is answered directly
//! 2. [`Router`](crate::router::Router) finds the route, or answers 404/405
//! 3. [`ParameterBinder`](crate::binder::ParameterBinder) binds inputs, or
//!    answers 422 with every failure
//! 4. [`DependencyResolver`](crate::dependency::DependencyResolver) builds the
//!    injected values; a factory error answers 500
//! 5. [`Dispatcher`](crate::dispatcher::Dispatcher) runs the handler; a panic
//!    answers 500
//!
//! ## Example
//!
//! ```rust
//! use gantry::app::AppBuilder;
//! use gantry::binder::RequestData;
//! use gantry::config::AppConfig;
//! use gantry::dispatcher::HandlerResponse;
//! use gantry::model::TypeSpec;
//! use gantry::params::ParameterDescriptor;
//! use gantry::route::Route;
//! use serde_json::json;
//!
//! let app = AppBuilder::new(AppConfig::new("Shop", "1.0.0"))
//!     .route(
//!         Route::get("/item/{id}", "read_item", |req| {
//!             HandlerResponse::ok(json!({ "id": req.param("id") }))
//!         })
//!         .param(ParameterDescriptor::path("id", TypeSpec::String)),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let response = app.handle(RequestData::get("/item/42"));
//! assert_eq!(response.status, 200);
//! assert_eq!(response.body, json!({ "id": "42" }));
//!
//! let schema = app.handle(RequestData::get("/openapi.json"));
//! assert_eq!(schema.body["openapi"], "3.1.0");
//! ```

mod builder;
mod service;

pub use builder::AppBuilder;
pub use service::App;
