//! # Route Declarations
//!
//! A [`Route`] ties a method and path template to a handler and declares
//! everything the framework needs to know about it: parameters, injected
//! dependencies, security, response model and documentation fields.
//!
//! ```rust
//! use gantry::dispatcher::HandlerResponse;
//! use gantry::model::TypeSpec;
//! use gantry::params::ParameterDescriptor;
//! use gantry::route::Route;
//! use serde_json::json;
//!
//! let route = Route::get("/item/{id}", "read_item", |req| {
//!     HandlerResponse::ok(json!({ "id": req.param("id") }))
//! })
//! .param(ParameterDescriptor::path("id", TypeSpec::String))
//! .tag("items");
//!
//! assert_eq!(route.meta().operation_id(), "read_item_item__id__get");
//! assert_eq!(route.meta().summary(), "Read Item");
//! ```
//!
//! The metadata half ([`RouteMeta`]) is immutable once the application is
//! built and is shared by the router, the binder and the schema assembler.

use crate::dependency::Dependency;
use crate::dispatcher::{Handler, HandlerRequest, HandlerResponse};
use crate::model::{title_case, TypeSpec};
use crate::params::{ParamSource, ParameterDescriptor};
use crate::security::SecurityScheme;
use http::Method;
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

/// An additional documented response.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseSpec {
    pub description: String,
    pub model: Option<TypeSpec>,
    pub media_type: String,
}

impl ResponseSpec {
    pub fn new(description: impl Into<String>) -> Self {
        ResponseSpec {
            description: description.into(),
            model: None,
            media_type: "application/json".to_string(),
        }
    }

    #[must_use]
    pub fn model(mut self, model: TypeSpec) -> Self {
        self.model = Some(model);
        self
    }

    #[must_use]
    pub fn media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = media_type.into();
        self
    }
}

/// Everything known about a route except its handler.
#[derive(Debug, Clone)]
pub struct RouteMeta {
    pub method: Method,
    pub path_pattern: String,
    pub handler_name: String,
    pub parameters: Vec<ParameterDescriptor>,
    /// Route-level dependencies; app-level ones are merged in at build time
    pub dependencies: IndexMap<String, Dependency>,
    /// Dependency names the handler receives
    pub inject: Vec<String>,
    pub security: Vec<SecurityScheme>,
    pub status_code: u16,
    pub response_model: Option<TypeSpec>,
    pub response_media_type: String,
    pub responses: IndexMap<u16, ResponseSpec>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub operation_id: Option<String>,
    pub deprecated: bool,
    pub include_in_schema: bool,
}

impl RouteMeta {
    /// Explicit operation id, or `<handler>` + the path with every
    /// non-alphanumeric character replaced by `_` + `_<method>`.
    ///
    /// `read_item` on `GET /item/{id}` becomes `read_item_item__id__get`.
    pub fn operation_id(&self) -> String {
        if let Some(id) = &self.operation_id {
            return id.clone();
        }
        let path: String = self
            .path_pattern
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        format!(
            "{}{}_{}",
            self.handler_name,
            path,
            self.method.as_str().to_ascii_lowercase()
        )
    }

    /// Explicit summary, or the title-cased handler name.
    pub fn summary(&self) -> String {
        self.summary
            .clone()
            .unwrap_or_else(|| title_case(&self.handler_name))
    }

    /// Whether any request can fail input validation.
    pub fn can_fail_validation(&self) -> bool {
        !self.parameters.is_empty()
    }

    pub fn body_parameters(&self) -> impl Iterator<Item = &ParameterDescriptor> {
        self.parameters
            .iter()
            .filter(|p| p.source == ParamSource::Body)
    }

    /// `GET /items/{id}`; used to label issues and log lines.
    pub fn label(&self) -> String {
        format!("{} {}", self.method, self.path_pattern)
    }
}

/// Default status code for successful responses.
pub fn default_status(method: &Method) -> u16 {
    match *method {
        Method::POST => 201,
        Method::DELETE => 204,
        _ => 200,
    }
}

/// A route declaration: metadata plus handler.
#[derive(Clone)]
pub struct Route {
    meta: RouteMeta,
    handler: Handler,
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("meta", &self.meta)
            .finish_non_exhaustive()
    }
}

impl Route {
    pub fn new<F>(method: Method, path: impl Into<String>, handler_name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(HandlerRequest) -> HandlerResponse + Send + Sync + 'static,
    {
        let status_code = default_status(&method);
        Route {
            meta: RouteMeta {
                method,
                path_pattern: path.into(),
                handler_name: handler_name.into(),
                parameters: Vec::new(),
                dependencies: IndexMap::new(),
                inject: Vec::new(),
                security: Vec::new(),
                status_code,
                response_model: None,
                response_media_type: "application/json".to_string(),
                responses: IndexMap::new(),
                summary: None,
                description: None,
                tags: Vec::new(),
                operation_id: None,
                deprecated: false,
                include_in_schema: true,
            },
            handler: Arc::new(handler),
        }
    }

    pub fn get<F>(path: impl Into<String>, handler_name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(HandlerRequest) -> HandlerResponse + Send + Sync + 'static,
    {
        Self::new(Method::GET, path, handler_name, handler)
    }

    pub fn post<F>(path: impl Into<String>, handler_name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(HandlerRequest) -> HandlerResponse + Send + Sync + 'static,
    {
        Self::new(Method::POST, path, handler_name, handler)
    }

    pub fn put<F>(path: impl Into<String>, handler_name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(HandlerRequest) -> HandlerResponse + Send + Sync + 'static,
    {
        Self::new(Method::PUT, path, handler_name, handler)
    }

    pub fn patch<F>(path: impl Into<String>, handler_name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(HandlerRequest) -> HandlerResponse + Send + Sync + 'static,
    {
        Self::new(Method::PATCH, path, handler_name, handler)
    }

    pub fn delete<F>(path: impl Into<String>, handler_name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(HandlerRequest) -> HandlerResponse + Send + Sync + 'static,
    {
        Self::new(Method::DELETE, path, handler_name, handler)
    }

    #[must_use]
    pub fn param(mut self, descriptor: ParameterDescriptor) -> Self {
        self.meta.parameters.push(descriptor);
        self
    }

    #[must_use]
    pub fn params(mut self, descriptors: impl IntoIterator<Item = ParameterDescriptor>) -> Self {
        self.meta.parameters.extend(descriptors);
        self
    }

    /// Declare a route-level dependency; it overrides an app-level one with
    /// the same name.
    #[must_use]
    pub fn dependency(mut self, dependency: Dependency) -> Self {
        self.meta
            .dependencies
            .insert(dependency.name().to_string(), dependency);
        self
    }

    /// Names of the dependencies the handler receives.
    #[must_use]
    pub fn inject<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.meta.inject.extend(names.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn security(mut self, scheme: SecurityScheme) -> Self {
        self.meta.security.push(scheme);
        self
    }

    #[must_use]
    pub fn status_code(mut self, status: u16) -> Self {
        self.meta.status_code = status;
        self
    }

    #[must_use]
    pub fn response_model(mut self, model: TypeSpec) -> Self {
        self.meta.response_model = Some(model);
        self
    }

    #[must_use]
    pub fn response_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.meta.response_media_type = media_type.into();
        self
    }

    /// Document an additional response.
    #[must_use]
    pub fn response(mut self, status: u16, spec: ResponseSpec) -> Self {
        self.meta.responses.insert(status, spec);
        self
    }

    #[must_use]
    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.meta.summary = Some(summary.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.meta.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.meta.tags.push(tag.into());
        self
    }

    #[must_use]
    pub fn operation_id(mut self, id: impl Into<String>) -> Self {
        self.meta.operation_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn deprecated(mut self) -> Self {
        self.meta.deprecated = true;
        self
    }

    #[must_use]
    pub fn include_in_schema(mut self, include: bool) -> Self {
        self.meta.include_in_schema = include;
        self
    }

    pub fn meta(&self) -> &RouteMeta {
        &self.meta
    }

    pub fn into_parts(self) -> (RouteMeta, Handler) {
        (self.meta, self.handler)
    }
}
