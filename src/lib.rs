//! # Gantry
//!
//! **Gantry** is the request-binding and schema-assembly core of a web
//! framework. Routes are declared with builders; the same declarations drive
//! request validation, dependency injection and an
//! [OpenAPI 3.1.0](https://spec.openapis.org/oas/v3.1.0) document.
//!
//! ## Overview
//!
//! Gantry does not own a socket. A transport hands the application an
//! already-split [`RequestData`](binder::RequestData) and writes back the
//! [`HandlerResponse`](dispatcher::HandlerResponse) it receives. Everything in
//! between is declarative:
//!
//! - parameters from path, query, headers, cookies and the body, with
//!   constraints, defaults and aliases
//! - named dependencies, resolved per request with optional memoisation
//! - security schemes documented under `components.securitySchemes`
//! - models rendered as JSON Schema under `components.schemas`
//! - scheduler tasks registered with a pluggable backend
//!
//! ## Architecture
//!
//! - **[`model`]** - value types and model definitions
//! - **[`params`]** - parameter descriptors and constraint validation
//! - **[`binder`]** - request shape and parameter binding
//! - **[`dependency`]** - dependency graph and per-request resolution
//! - **[`security`]** - security scheme declarations and their registry
//! - **[`route`]** - route declarations
//! - **[`router`]** - path matching
//! - **[`dispatcher`]** - handler invocation
//! - **[`openapi`]** - OpenAPI document assembly
//! - **[`scheduler`]** - task registration with a scheduler backend
//! - **[`app`]** - the builder and the request pipeline
//! - **[`config`]** / **[`logging`]** - ambient configuration and tracing
//!
//! ### Request Handling Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant T as Transport
//!     participant A as App
//!     participant R as Router
//!     participant B as ParameterBinder
//!     participant D as DependencyResolver
//!     participant H as Handler
//!
//!     T->>A: handle(RequestData)
//!     A->>R: route(method, path)
//!     R-->>A: RouteMatch | 404 | 405
//!     A->>B: bind(request, path_params)
//!     B-->>A: BoundParams | 422
//!     A->>D: resolve(scope, request, params)
//!     D-->>A: Resolved | 500
//!     A->>H: HandlerRequest
//!     H-->>A: HandlerResponse
//!     A-->>T: HandlerResponse
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use gantry::prelude::*;
//! use serde_json::json;
//!
//! let item = ModelDef::new("Item")
//!     .field("name", TypeSpec::String)
//!     .field("price", TypeSpec::Number)
//!     .into_type();
//!
//! let app = AppBuilder::new(AppConfig::new("Shop", "1.0.0"))
//!     .route(
//!         Route::post("/items", "create_item", |req| {
//!             HandlerResponse::json(201, req.param("item").cloned().unwrap_or_default())
//!         })
//!         .param(ParameterDescriptor::body("item", item)),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let ok = app.handle(RequestData::post("/items").json(&json!({"name": "Pen", "price": 1.5})));
//! assert_eq!(ok.status, 201);
//!
//! let bad = app.handle(RequestData::post("/items").json(&json!({"name": "Pen"})));
//! assert_eq!(bad.status, 422);
//! assert_eq!(bad.body["detail"][0]["loc"], json!(["body", "price"]));
//! ```
//!
//! ## Error Handling
//!
//! Misconfiguration is caught at [`AppBuilder::build`](app::AppBuilder::build)
//! and reported all at once as a [`ConfigError`](error::ConfigError). Per
//! request, input problems become a 422, dependency failures and handler
//! panics a generic 500.

pub mod app;
pub mod binder;
pub mod config;
pub mod dependency;
pub mod dispatcher;
pub mod error;
pub mod ids;
pub mod logging;
pub mod model;
pub mod openapi;
pub mod params;
pub mod route;
pub mod router;
pub mod scheduler;
pub mod security;
pub mod validator;

pub use app::{App, AppBuilder};
pub use error::{ConfigError, SchedulerError, SchemaError};

/// The names most applications need.
pub mod prelude {
    pub use crate::app::{App, AppBuilder};
    pub use crate::binder::RequestData;
    pub use crate::config::AppConfig;
    pub use crate::dependency::{Dependency, DependencyArgs};
    pub use crate::dispatcher::{HandlerRequest, HandlerResponse};
    pub use crate::model::{FieldDef, ModelDef, TypeSpec};
    pub use crate::params::ParameterDescriptor;
    pub use crate::route::{ResponseSpec, Route};
    pub use crate::security::SecurityScheme;
}
