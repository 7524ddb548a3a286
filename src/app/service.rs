use crate::binder::{ParameterBinder, RequestData};
use crate::config::AppConfig;
use crate::dependency::{DependencyResolver, ResolutionScope};
use crate::dispatcher::{Dispatcher, HandlerRequest, HandlerResponse};
use crate::error::{SchedulerError, SchemaError};
use crate::openapi::SchemaAssembler;
use crate::route::RouteMeta;
use crate::router::{RouteLookup, RouteMatch, Router};
use crate::scheduler::SchedulerAdapter;
use arc_swap::ArcSwapOption;
use http::Method;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, info_span, warn};

/// Per-route runtime state, indexed like the router and the dispatcher.
#[derive(Debug)]
pub(crate) struct Endpoint {
    pub(crate) meta: Arc<RouteMeta>,
    pub(crate) binder: ParameterBinder,
    pub(crate) resolver: DependencyResolver,
}

/// A built application: immutable route table plus the lazily built schema.
///
/// `App` is `Send + Sync`; share it behind an `Arc` across transport threads.
pub struct App {
    pub(crate) config: AppConfig,
    pub(crate) routes: Vec<Arc<RouteMeta>>,
    pub(crate) endpoints: Vec<Endpoint>,
    pub(crate) router: Router,
    pub(crate) dispatcher: Dispatcher,
    pub(crate) assembler: SchemaAssembler,
    pub(crate) schema: ArcSwapOption<Value>,
    pub(crate) scheduler: Option<SchedulerAdapter>,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("title", &self.config.title)
            .field("routes", &self.router.dump_routes())
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}

impl App {
    /// Handle one request end to end.
    ///
    /// Never fails: routing misses, validation failures, dependency errors
    /// and handler panics all become error responses.
    pub fn handle(&self, request: RequestData) -> HandlerResponse {
        let span = info_span!(
            "request",
            request_id = %request.request_id,
            method = %request.method,
            path = %request.path
        );
        let _entered = span.enter();
        let started = Instant::now();

        let response = self.route_request(request);

        info!(
            status = response.status,
            duration_us = started.elapsed().as_micros(),
            "Request complete"
        );
        response
    }

    fn route_request(&self, request: RequestData) -> HandlerResponse {
        if self.config.enable_openapi
            && request.method == Method::GET
            && request.path == self.config.openapi_url
        {
            return self.openapi_response();
        }

        match self.router.route(&request.method, &request.path) {
            RouteLookup::Matched(route_match) => self.run(route_match, request),
            RouteLookup::MethodNotAllowed(allowed) => {
                let allow = allowed
                    .iter()
                    .map(Method::as_str)
                    .collect::<Vec<_>>()
                    .join(", ");
                HandlerResponse::error(405, "Method Not Allowed").with_header("allow", allow)
            }
            RouteLookup::NotFound => HandlerResponse::error(404, "Not Found"),
        }
    }

    fn run(&self, route_match: RouteMatch, request: RequestData) -> HandlerResponse {
        let RouteMatch {
            index,
            path_params,
            handler_name,
            ..
        } = route_match;
        let Some(endpoint) = self.endpoints.get(index) else {
            error!(index, "Matched route has no endpoint");
            return HandlerResponse::error(500, "Internal Server Error");
        };

        let params = match endpoint.binder.bind(&request, &path_params) {
            Ok(params) => params,
            Err(errors) => return HandlerResponse::validation_error(&errors),
        };

        let mut scope = ResolutionScope::new(request.request_id);
        let dependencies = match endpoint.resolver.resolve(&mut scope, &request, &params) {
            Ok(resolved) => resolved,
            Err(e) => {
                error!(
                    route = %endpoint.meta.label(),
                    error = %e,
                    "Dependency resolution failed"
                );
                return HandlerResponse::error(500, "Internal Server Error");
            }
        };
        debug!(
            resolved = dependencies.len(),
            invocations = scope.invocations(),
            "Dependencies resolved"
        );

        let RequestData {
            request_id,
            method,
            path,
            headers,
            ..
        } = request;
        let handler_request = HandlerRequest {
            request_id,
            method,
            path,
            handler_name,
            path_params,
            params,
            dependencies,
            headers,
        };
        self.dispatcher
            .dispatch(index, handler_request)
            .unwrap_or_else(|| HandlerResponse::error(500, "Internal Server Error"))
    }

    fn openapi_response(&self) -> HandlerResponse {
        match self.openapi() {
            Ok(document) => HandlerResponse::json(200, document.as_ref().clone()),
            Err(e) => HandlerResponse::error(500, e.to_string()),
        }
    }

    /// The OpenAPI document, built on first use and cached afterwards.
    ///
    /// # Errors
    ///
    /// The [`SchemaError`] that stopped assembly. Nothing is cached then, so
    /// every call retries.
    pub fn openapi(&self) -> Result<Arc<Value>, SchemaError> {
        if let Some(document) = self.schema.load_full() {
            return Ok(document);
        }
        let document = Arc::new(self.assembler.build(&self.routes)?);
        self.schema.store(Some(Arc::clone(&document)));
        Ok(document)
    }

    /// Drop the cached document; the next request rebuilds it.
    pub fn invalidate_schema(&self) {
        self.schema.store(None);
    }

    pub fn routes(&self) -> &[Arc<RouteMeta>] {
        &self.routes
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn scheduler(&self) -> Option<&SchedulerAdapter> {
        self.scheduler.as_ref()
    }

    /// Start the scheduler, if one is configured.
    pub fn startup(&self) -> Result<(), SchedulerError> {
        match &self.scheduler {
            Some(scheduler) => scheduler.start(),
            None => Ok(()),
        }
    }

    /// Stop the scheduler, if one is configured and running.
    pub fn shutdown(&self) -> Result<(), SchedulerError> {
        match &self.scheduler {
            Some(scheduler) => scheduler.shutdown().inspect_err(|e| {
                warn!(error = %e, "Scheduler shutdown failed");
            }),
            None => Ok(()),
        }
    }
}
