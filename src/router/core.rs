use crate::route::RouteMeta;
use crate::validator::ValidationIssue;
use http::Method;
use regex::Regex;
use smallvec::SmallVec;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Maximum number of path parameters before heap allocation.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Path captures as `(name, percent-decoded value)` pairs.
///
/// Names are shared with the compiled route table; only values are allocated
/// per request.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Successful match of a request path to a route.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    /// Position of the route in registration order
    pub index: usize,
    pub route: Arc<RouteMeta>,
    pub path_params: ParamVec,
    pub handler_name: Arc<str>,
}

impl RouteMatch {
    /// Path parameter by name; the last capture wins when a name repeats.
    #[must_use]
    pub fn get_path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Outcome of a route lookup.
#[derive(Debug, Clone)]
pub enum RouteLookup {
    Matched(RouteMatch),
    /// The path exists but not for this method; carries the allowed methods.
    MethodNotAllowed(Vec<Method>),
    NotFound,
}

#[derive(Debug, Clone)]
struct CompiledRoute {
    method: Method,
    regex: Regex,
    param_names: Vec<Arc<str>>,
    route: Arc<RouteMeta>,
    handler_name: Arc<str>,
}

/// Matches request paths against registered route templates.
///
/// Routes are tried in registration order, so a literal route registered before
/// a parameterised one with the same shape takes precedence.
#[derive(Debug, Clone)]
pub struct Router {
    routes: Vec<CompiledRoute>,
}

impl Router {
    /// Compile the routing table.
    ///
    /// # Errors
    ///
    /// One [`ValidationIssue`] per route whose template does not compile.
    pub fn new(routes: &[Arc<RouteMeta>]) -> Result<Self, Vec<ValidationIssue>> {
        let mut compiled = Vec::with_capacity(routes.len());
        let mut issues = Vec::new();

        for route in routes {
            match Self::path_to_regex(&route.path_pattern) {
                Ok((regex, names)) => compiled.push(CompiledRoute {
                    method: route.method.clone(),
                    regex,
                    param_names: names.iter().map(|n| Arc::from(n.as_str())).collect(),
                    route: Arc::clone(route),
                    handler_name: Arc::from(route.handler_name.as_str()),
                }),
                Err(e) => issues.push(ValidationIssue::new(
                    format!("{} {}", route.method, route.path_pattern),
                    "InvalidPathTemplate",
                    e.to_string(),
                )),
            }
        }

        if !issues.is_empty() {
            return Err(issues);
        }

        let routes_summary: Vec<String> = compiled
            .iter()
            .take(10)
            .map(|r| format!("{} {}", r.method, r.route.path_pattern))
            .collect();
        info!(
            routes_count = compiled.len(),
            routes_summary = ?routes_summary,
            "Routing table loaded"
        );

        Ok(Router { routes: compiled })
    }

    /// `METHOD path -> handler` lines for every route, in registration order.
    #[must_use]
    pub fn dump_routes(&self) -> Vec<String> {
        self.routes
            .iter()
            .map(|r| format!("{} {} -> {}", r.method, r.route.path_pattern, r.handler_name))
            .collect()
    }

    /// Match `method` and `path` against the table.
    #[must_use]
    pub fn route(&self, method: &Method, path: &str) -> RouteLookup {
        debug!(method = %method, path = %path, "Route match attempt");
        let match_start = std::time::Instant::now();
        let mut allowed: Vec<Method> = Vec::new();

        for (index, compiled) in self.routes.iter().enumerate() {
            let Some(captures) = compiled.regex.captures(path) else {
                continue;
            };
            if compiled.method != *method {
                if !allowed.contains(&compiled.method) {
                    allowed.push(compiled.method.clone());
                }
                continue;
            }

            let mut path_params = ParamVec::new();
            for (i, name) in compiled.param_names.iter().enumerate() {
                if let Some(raw) = captures.get(i + 1) {
                    path_params.push((Arc::clone(name), decode_segment(raw.as_str())));
                }
            }

            info!(
                method = %method,
                path = %path,
                handler_name = %compiled.handler_name,
                route_pattern = %compiled.route.path_pattern,
                path_params = ?path_params,
                duration_us = match_start.elapsed().as_micros(),
                "Route matched"
            );
            return RouteLookup::Matched(RouteMatch {
                index,
                route: Arc::clone(&compiled.route),
                path_params,
                handler_name: Arc::clone(&compiled.handler_name),
            });
        }

        if allowed.is_empty() {
            warn!(method = %method, path = %path, "No route matched");
            RouteLookup::NotFound
        } else {
            warn!(
                method = %method,
                path = %path,
                allowed = ?allowed,
                "Method not allowed for path"
            );
            RouteLookup::MethodNotAllowed(allowed)
        }
    }

    /// Convert a path template to an anchored regex and its parameter names.
    ///
    /// `/users/{id}/posts/{post_id}` becomes `^/users/([^/]+)/posts/([^/]+)$`
    /// with names `["id", "post_id"]`. Literal segments are escaped.
    pub(crate) fn path_to_regex(path: &str) -> Result<(Regex, Vec<String>), regex::Error> {
        if path == "/" || path.is_empty() {
            return Ok((Regex::new(r"^/$")?, Vec::new()));
        }

        let mut pattern = String::with_capacity(path.len() * 2);
        pattern.push('^');
        let mut names = Vec::new();

        for segment in path.split('/').filter(|s| !s.is_empty()) {
            pattern.push('/');
            match placeholder(segment) {
                Some(name) => {
                    pattern.push_str("([^/]+)");
                    names.push(name.to_string());
                }
                None => pattern.push_str(&regex::escape(segment)),
            }
        }
        pattern.push('$');

        Ok((Regex::new(&pattern)?, names))
    }
}

fn placeholder(segment: &str) -> Option<&str> {
    segment
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
        .filter(|name| !name.is_empty())
}

fn decode_segment(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

/// Names of the `{placeholders}` in a path template, in order.
pub fn path_template_params(path: &str) -> Vec<String> {
    path.split('/')
        .filter_map(placeholder)
        .map(ToString::to_string)
        .collect()
}
