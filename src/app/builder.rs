use super::service::{App, Endpoint};
use crate::binder::ParameterBinder;
use crate::config::AppConfig;
use crate::dependency::{Dependency, DependencyResolver};
use crate::dispatcher::Dispatcher;
use crate::error::ConfigError;
use crate::openapi::SchemaAssembler;
use crate::route::{Route, RouteMeta};
use crate::router::Router;
use crate::scheduler::{MemoryScheduler, Scheduler, SchedulerAdapter, TaskCatalog};
use crate::security::SecurityScheme;
use crate::validator::{fail_if_issues, ValidationIssue};
use arc_swap::ArcSwapOption;
use indexmap::IndexMap;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

/// Collects routes and app-wide declarations, then validates everything at
/// once in [`build`](Self::build).
pub struct AppBuilder {
    config: AppConfig,
    routes: Vec<Route>,
    dependencies: IndexMap<String, Dependency>,
    security: Vec<SecurityScheme>,
    catalog: TaskCatalog,
    scheduler: Option<Arc<dyn Scheduler>>,
}

impl AppBuilder {
    pub fn new(config: AppConfig) -> Self {
        AppBuilder {
            config,
            routes: Vec::new(),
            dependencies: IndexMap::new(),
            security: Vec::new(),
            catalog: TaskCatalog::new(),
            scheduler: None,
        }
    }

    #[must_use]
    pub fn route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    #[must_use]
    pub fn routes(mut self, routes: impl IntoIterator<Item = Route>) -> Self {
        self.routes.extend(routes);
        self
    }

    /// App-level dependency, available to every route unless the route
    /// declares one with the same name.
    #[must_use]
    pub fn dependency(mut self, dependency: Dependency) -> Self {
        self.dependencies
            .insert(dependency.name().to_string(), dependency);
        self
    }

    /// App-level security scheme, applied to every route that does not
    /// declare a scheme with the same identifier.
    #[must_use]
    pub fn security(mut self, scheme: SecurityScheme) -> Self {
        self.security.push(scheme);
        self
    }

    /// Task catalog and backend used when the configuration has a
    /// `scheduler` section. Without a backend a [`MemoryScheduler`] is used.
    #[must_use]
    pub fn scheduler(mut self, catalog: TaskCatalog, backend: Arc<dyn Scheduler>) -> Self {
        self.catalog = catalog;
        self.scheduler = Some(backend);
        self
    }

    #[must_use]
    pub fn tasks(mut self, catalog: TaskCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Validate every route and assemble the application.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] listing every route problem found (duplicate
    /// routes, ambiguous parameters, unresolvable dependencies, cycles),
    /// or [`ConfigError::Scheduler`] when task registration fails.
    pub fn build(self) -> Result<App, ConfigError> {
        let AppBuilder {
            config,
            routes,
            dependencies,
            security,
            catalog,
            scheduler,
        } = self;

        let mut issues: Vec<ValidationIssue> = Vec::new();
        let mut seen = HashSet::new();
        let mut metas: Vec<Arc<RouteMeta>> = Vec::with_capacity(routes.len());
        let mut endpoints = Vec::with_capacity(routes.len());
        let mut dispatcher = Dispatcher::new();

        for route in routes {
            let (mut meta, handler) = route.into_parts();
            let label = meta.label();

            if !seen.insert((meta.method.clone(), meta.path_pattern.clone())) {
                issues.push(ValidationIssue::new(
                    &label,
                    "DuplicateRoute",
                    "route is registered more than once",
                ));
                continue;
            }

            meta.dependencies = merge_dependencies(&dependencies, meta.dependencies);
            meta.security = merge_security(&security, meta.security);

            let binder =
                ParameterBinder::new(&label, &meta.path_pattern, meta.parameters.clone());
            let param_names: Vec<String> =
                meta.parameters.iter().map(|p| p.name.clone()).collect();
            let resolver = DependencyResolver::new(
                &label,
                meta.dependencies.clone(),
                meta.inject.clone(),
                &param_names,
            );

            match (binder, resolver) {
                (Ok(binder), Ok(resolver)) => {
                    dispatcher.register(&meta.handler_name, handler);
                    let meta = Arc::new(meta);
                    endpoints.push(Endpoint {
                        meta: Arc::clone(&meta),
                        binder,
                        resolver,
                    });
                    metas.push(meta);
                }
                (binder, resolver) => {
                    if let Err(found) = binder {
                        issues.extend(found);
                    }
                    if let Err(found) = resolver {
                        issues.extend(found);
                    }
                }
            }
        }

        fail_if_issues(issues)?;
        let router = Router::new(&metas).map_err(ConfigError::Invalid)?;

        let scheduler = match &config.scheduler {
            Some(scheduler_config) => {
                let backend =
                    scheduler.unwrap_or_else(|| Arc::new(MemoryScheduler::new()) as Arc<dyn Scheduler>);
                Some(SchedulerAdapter::new(scheduler_config, &catalog, backend)?)
            }
            None => None,
        };

        let assembler = SchemaAssembler::new(config.info(), config.servers());
        info!(
            title = %config.title,
            route_count = metas.len(),
            openapi_url = %config.openapi_url,
            enable_openapi = config.enable_openapi,
            scheduler = scheduler.is_some(),
            "Application built"
        );

        Ok(App {
            config,
            routes: metas,
            endpoints,
            router,
            dispatcher,
            assembler,
            schema: ArcSwapOption::empty(),
            scheduler,
        })
    }
}

/// App entries first, route entries replace same-named ones.
fn merge_dependencies(
    app: &IndexMap<String, Dependency>,
    route: IndexMap<String, Dependency>,
) -> IndexMap<String, Dependency> {
    let mut merged = app.clone();
    merged.extend(route);
    merged
}

/// App schemes not shadowed by a route scheme with the same identifier, then
/// the route's own.
fn merge_security(app: &[SecurityScheme], route: Vec<SecurityScheme>) -> Vec<SecurityScheme> {
    let mut merged: Vec<SecurityScheme> = app
        .iter()
        .filter(|scheme| !route.iter().any(|r| r.identifier() == scheme.identifier()))
        .cloned()
        .collect();
    merged.extend(route);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::{HandlerRequest, HandlerResponse};
    use crate::model::TypeSpec;
    use crate::params::ParameterDescriptor;

    fn noop(_: HandlerRequest) -> HandlerResponse {
        HandlerResponse::empty(204)
    }

    #[test]
    fn route_dependency_wins_over_app() {
        let app = AppBuilder::new(AppConfig::default())
            .dependency(Dependency::value("db", "app"))
            .dependency(Dependency::value("cache", 1u8))
            .route(
                Route::get("/", "root", noop)
                    .dependency(Dependency::value("db", "route"))
                    .inject(["db", "cache"]),
            )
            .build()
            .unwrap();
        let meta = &app.routes()[0];
        assert_eq!(meta.dependencies.keys().collect::<Vec<_>>(), vec!["db", "cache"]);
    }

    #[test]
    fn route_security_shadows_app_scheme() {
        let app = AppBuilder::new(AppConfig::default())
            .security(SecurityScheme::bearer())
            .security(SecurityScheme::basic())
            .route(Route::get("/", "root", noop).security(
                SecurityScheme::bearer().bearer_format("JWT"),
            ))
            .build()
            .unwrap();
        let ids: Vec<&str> = app.routes()[0]
            .security
            .iter()
            .map(SecurityScheme::identifier)
            .collect();
        assert_eq!(ids, vec!["Basic", "Bearer"]);
    }

    #[test]
    fn every_issue_is_reported() {
        let err = AppBuilder::new(AppConfig::default())
            .route(Route::get("/a", "a", noop))
            .route(Route::get("/a", "a_again", noop))
            .route(
                Route::get("/b/{id}", "b", noop)
                    .param(ParameterDescriptor::query("id", TypeSpec::Integer)),
            )
            .route(Route::get("/c", "c", noop).inject(["missing"]))
            .build()
            .unwrap_err();
        let kinds: Vec<&str> = err.issues().iter().map(|i| i.kind.as_str()).collect();
        assert!(kinds.contains(&"DuplicateRoute"));
        assert!(kinds.contains(&"UnresolvedDependency"));
        assert!(kinds.len() >= 3, "{kinds:?}");
    }
}
