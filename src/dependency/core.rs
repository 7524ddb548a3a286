use crate::binder::{BoundParams, RequestData};
use crate::ids::RequestId;
use crate::validator::ValidationIssue;
use indexmap::IndexMap;
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error};

/// A resolved dependency value.
pub type Injected = Arc<dyn Any + Send + Sync>;

type FactoryFn = dyn Fn(&DependencyArgs<'_>) -> anyhow::Result<Injected> + Send + Sync;

/// Failure while resolving dependencies for one request.
#[derive(Debug, Error)]
pub enum DependencyError {
    /// A cycle slipped past build-time validation.
    #[error("dependency cycle: {}", .0.join(" -> "))]
    Cycle(Vec<String>),

    #[error("dependency `{0}` is not declared")]
    Missing(String),

    #[error("dependency `{name}` is not of type `{expected}`")]
    Downcast { name: String, expected: &'static str },

    #[error("dependency `{name}` failed: {source}")]
    Factory {
        name: String,
        #[source]
        source: anyhow::Error,
    },
}

/// A named factory whose result can be injected into handlers and other
/// dependencies.
///
/// `requires` lists the names the factory consumes. Each is either another
/// dependency (resolved first) or a bound request parameter.
#[derive(Clone)]
pub struct Dependency {
    name: String,
    params: Vec<String>,
    factory: Arc<FactoryFn>,
    use_cache: bool,
    allow_none: bool,
}

impl fmt::Debug for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dependency")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("use_cache", &self.use_cache)
            .field("allow_none", &self.allow_none)
            .finish_non_exhaustive()
    }
}

impl Dependency {
    /// Declare a dependency produced by `factory`.
    ///
    /// Results are cached per request by default.
    pub fn new<T, F>(name: impl Into<String>, factory: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&DependencyArgs<'_>) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        let factory: Arc<FactoryFn> =
            Arc::new(move |args: &DependencyArgs<'_>| factory(args).map(|v| Arc::new(v) as Injected));
        Dependency {
            name: name.into(),
            params: Vec::new(),
            factory,
            use_cache: true,
            allow_none: false,
        }
    }

    /// A dependency that always yields a clone of `value`.
    pub fn value<T>(name: impl Into<String>, value: T) -> Self
    where
        T: Any + Send + Sync + Clone,
    {
        Self::new(name, move |_| Ok(value.clone()))
    }

    #[must_use]
    pub fn requires<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.params.extend(names.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn use_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    /// Tolerate required names that are neither dependencies nor parameters.
    #[must_use]
    pub fn allow_none(mut self, allow_none: bool) -> Self {
        self.allow_none = allow_none;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn is_cached(&self) -> bool {
        self.use_cache
    }
}

/// What a factory can see while it runs.
pub struct DependencyArgs<'a> {
    name: &'a str,
    request: &'a RequestData,
    params: &'a BoundParams,
    resolved: &'a IndexMap<String, Injected>,
}

impl<'a> DependencyArgs<'a> {
    /// Name of the dependency being produced.
    pub fn name(&self) -> &str {
        self.name
    }

    pub fn request(&self) -> &RequestData {
        self.request
    }

    /// A bound request parameter.
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    /// A resolved upstream dependency, downcast to `T`.
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>, DependencyError> {
        let value = self
            .resolved
            .get(name)
            .ok_or_else(|| DependencyError::Missing(name.to_string()))?;
        Arc::clone(value)
            .downcast::<T>()
            .map_err(|_| DependencyError::Downcast {
                name: name.to_string(),
                expected: std::any::type_name::<T>(),
            })
    }
}

/// Per-request resolution state: the memo of cached results and the active
/// resolution stack.
///
/// Created for one request and dropped with it.
#[derive(Debug)]
pub struct ResolutionScope {
    request_id: RequestId,
    cache: HashMap<String, Injected>,
    stack: Vec<String>,
    invocations: usize,
}

impl ResolutionScope {
    pub fn new(request_id: RequestId) -> Self {
        ResolutionScope {
            request_id,
            cache: HashMap::new(),
            stack: Vec::new(),
            invocations: 0,
        }
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Number of factory calls made in this scope.
    pub fn invocations(&self) -> usize {
        self.invocations
    }

    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }
}

/// Values injected into a handler, keyed by dependency name.
#[derive(Clone, Default)]
pub struct Resolved {
    values: IndexMap<String, Injected>,
}

impl fmt::Debug for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.values.keys()).finish()
    }
}

impl Resolved {
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.values
            .get(name)
            .and_then(|v| Arc::clone(v).downcast::<T>().ok())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    InProgress,
    Done,
}

/// Resolves the dependencies a handler asks for.
///
/// The graph is validated once in [`DependencyResolver::new`]; per request,
/// [`resolve`](Self::resolve) walks it depth-first in first-encountered order.
#[derive(Debug, Clone)]
pub struct DependencyResolver {
    dependencies: Arc<IndexMap<String, Dependency>>,
    requested: Vec<String>,
}

impl DependencyResolver {
    /// Validate the dependency graph of one route.
    ///
    /// # Arguments
    ///
    /// * `location` - Route label used in issue messages
    /// * `dependencies` - Merged app and route dependencies
    /// * `requested` - Names the handler injects
    /// * `param_names` - Binding names of the route's declared parameters
    ///
    /// # Errors
    ///
    /// Unresolvable names and cycles as [`ValidationIssue`]s.
    pub fn new(
        location: &str,
        dependencies: IndexMap<String, Dependency>,
        requested: Vec<String>,
        param_names: &[String],
    ) -> Result<Self, Vec<ValidationIssue>> {
        let mut issues = Vec::new();
        let mut state: HashMap<String, Visit> = HashMap::new();

        for name in &requested {
            if !dependencies.contains_key(name) {
                issues.push(ValidationIssue::new(
                    location,
                    "UnresolvedDependency",
                    format!("handler injects `{name}`, which is not a declared dependency"),
                ));
                continue;
            }
            let mut path = Vec::new();
            visit(
                location,
                name,
                &dependencies,
                param_names,
                &mut state,
                &mut path,
                &mut issues,
            );
        }

        if !issues.is_empty() {
            return Err(issues);
        }

        debug!(
            location = %location,
            requested = ?requested,
            declared = dependencies.len(),
            "Dependency graph validated"
        );

        Ok(DependencyResolver {
            dependencies: Arc::new(dependencies),
            requested,
        })
    }

    pub fn requested(&self) -> &[String] {
        &self.requested
    }

    /// Resolve every requested dependency for one request.
    ///
    /// # Errors
    ///
    /// The first factory failure, or a cycle detected at run time.
    pub fn resolve(
        &self,
        scope: &mut ResolutionScope,
        request: &RequestData,
        params: &BoundParams,
    ) -> Result<Resolved, DependencyError> {
        let mut values = IndexMap::with_capacity(self.requested.len());
        for name in &self.requested {
            let value = self.resolve_one(name, scope, request, params)?;
            values.insert(name.clone(), value);
        }
        Ok(Resolved { values })
    }

    fn resolve_one(
        &self,
        name: &str,
        scope: &mut ResolutionScope,
        request: &RequestData,
        params: &BoundParams,
    ) -> Result<Injected, DependencyError> {
        let dependency = self
            .dependencies
            .get(name)
            .ok_or_else(|| DependencyError::Missing(name.to_string()))?;

        if dependency.use_cache {
            if let Some(hit) = scope.cache.get(name) {
                debug!(request_id = %scope.request_id, dependency = %name, "Dependency cache hit");
                return Ok(Arc::clone(hit));
            }
        }

        if scope.stack.iter().any(|n| n == name) {
            let mut chain = scope.stack.clone();
            chain.push(name.to_string());
            error!(request_id = %scope.request_id, chain = ?chain, "Dependency cycle at resolution time");
            return Err(DependencyError::Cycle(chain));
        }

        scope.stack.push(name.to_string());
        let outcome = self.invoke(dependency, scope, request, params);
        scope.stack.pop();
        let value = outcome?;

        scope.invocations += 1;
        if dependency.use_cache {
            scope.cache.insert(name.to_string(), Arc::clone(&value));
        }
        debug!(
            request_id = %scope.request_id,
            dependency = %name,
            cached = dependency.use_cache,
            "Dependency resolved"
        );
        Ok(value)
    }

    fn invoke(
        &self,
        dependency: &Dependency,
        scope: &mut ResolutionScope,
        request: &RequestData,
        params: &BoundParams,
    ) -> Result<Injected, DependencyError> {
        let mut resolved = IndexMap::new();
        for param in &dependency.params {
            if self.dependencies.contains_key(param) {
                let value = self.resolve_one(param, scope, request, params)?;
                resolved.insert(param.clone(), value);
            }
        }
        let args = DependencyArgs {
            name: &dependency.name,
            request,
            params,
            resolved: &resolved,
        };
        (dependency.factory)(&args).map_err(|source| DependencyError::Factory {
            name: dependency.name.clone(),
            source,
        })
    }
}

fn visit(
    location: &str,
    name: &str,
    dependencies: &IndexMap<String, Dependency>,
    param_names: &[String],
    state: &mut HashMap<String, Visit>,
    path: &mut Vec<String>,
    issues: &mut Vec<ValidationIssue>,
) {
    match state.get(name) {
        Some(Visit::Done) => return,
        Some(Visit::InProgress) => {
            let start = path.iter().position(|n| n == name).unwrap_or(0);
            let mut cycle: Vec<String> = path[start..].to_vec();
            cycle.push(name.to_string());
            issues.push(ValidationIssue::new(
                location,
                "DependencyCycle",
                format!("dependency cycle: {}", cycle.join(" -> ")),
            ));
            return;
        }
        None => {}
    }

    let Some(dependency) = dependencies.get(name) else {
        return;
    };

    state.insert(name.to_string(), Visit::InProgress);
    path.push(name.to_string());

    for param in &dependency.params {
        if dependencies.contains_key(param) {
            visit(location, param, dependencies, param_names, state, path, issues);
        } else if !param_names.contains(param) && !dependency.allow_none {
            issues.push(ValidationIssue::new(
                location,
                "UnresolvedDependency",
                format!(
                    "dependency `{name}` requires `{param}`, which is neither a dependency nor a request parameter"
                ),
            ));
        }
    }

    path.pop();
    state.insert(name.to_string(), Visit::Done);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn deps(list: Vec<Dependency>) -> IndexMap<String, Dependency> {
        list.into_iter().map(|d| (d.name().to_string(), d)).collect()
    }

    #[test]
    fn unknown_injection_is_a_startup_issue() {
        let issues =
            DependencyResolver::new("GET /", IndexMap::new(), vec!["db".to_string()], &[])
                .unwrap_err();
        assert_eq!(issues[0].kind, "UnresolvedDependency");
    }

    #[test]
    fn cycles_are_reported_with_their_path() {
        let graph = deps(vec![
            Dependency::value("a", 1u8).requires(["b"]),
            Dependency::value("b", 2u8).requires(["a"]),
        ]);
        let issues =
            DependencyResolver::new("GET /", graph, vec!["a".to_string()], &[]).unwrap_err();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, "DependencyCycle");
        assert!(issues[0].message.contains("a -> b -> a"));
    }

    #[test]
    fn unknown_parameter_is_tolerated_with_allow_none() {
        let graph = deps(vec![Dependency::value("a", 1u8)
            .requires(["missing"])
            .allow_none(true)]);
        assert!(DependencyResolver::new("GET /", graph, vec!["a".to_string()], &[]).is_ok());
    }

    #[test]
    fn factory_sees_params_and_upstream_values() {
        let graph = deps(vec![
            Dependency::value("prefix", "user-".to_string()),
            Dependency::new("label", |args: &DependencyArgs<'_>| {
                let prefix = args.get::<String>("prefix")?;
                let id = args.param("id").and_then(Value::as_i64).unwrap_or_default();
                Ok(format!("{prefix}{id}"))
            })
            .requires(["prefix", "id"]),
        ]);
        let resolver = DependencyResolver::new(
            "GET /",
            graph,
            vec!["label".to_string()],
            &["id".to_string()],
        )
        .unwrap();
        let mut params = BoundParams::new();
        params.insert("id".to_string(), Value::from(7));
        let request = RequestData::get("/");
        let mut scope = ResolutionScope::new(request.request_id);
        let resolved = resolver.resolve(&mut scope, &request, &params).unwrap();
        assert_eq!(resolved.get::<String>("label").unwrap().as_str(), "user-7");
        assert!(resolved.get::<u32>("label").is_none());
    }

    #[test]
    fn factory_error_is_propagated() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let graph = deps(vec![Dependency::new("db", move |_: &DependencyArgs<'_>| {
            counter.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(anyhow::anyhow!("connection refused"))
        })]);
        let resolver =
            DependencyResolver::new("GET /", graph, vec!["db".to_string()], &[]).unwrap();
        let request = RequestData::get("/");
        let mut scope = ResolutionScope::new(request.request_id);
        let err = resolver
            .resolve(&mut scope, &request, &BoundParams::new())
            .unwrap_err();
        assert!(matches!(err, DependencyError::Factory { ref name, .. } if name == "db"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(scope.cached_count(), 0);
    }
}
