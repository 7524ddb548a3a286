//! # Dependency Injection
//!
//! Handlers (and other dependencies) ask for values by name. Each name maps to a
//! [`Dependency`]: a factory plus the list of names it consumes. A consumed name
//! is either another dependency or one of the route's bound parameters.
//!
//! ## Lifecycle
//!
//! - **Build time** - [`DependencyResolver::new`] checks that every name resolves
//!   and that the graph has no cycle. Problems abort application startup.
//! - **Request time** - [`DependencyResolver::resolve`] walks the graph
//!   depth-first. Cached dependencies (the default) run at most once per
//!   request; uncached ones run once for every edge that reaches them. The memo
//!   lives in a [`ResolutionScope`] that is dropped with the request.
//!
//! Factory failures are server errors. They are logged with the request id and
//! the application answers 500 without exposing the cause.
//!
//! ## Example
//!
//! ```rust
//! use gantry::dependency::{Dependency, DependencyArgs};
//!
//! #[derive(Clone)]
//! struct Settings {
//!     page_size: usize,
//! }
//!
//! let settings = Dependency::value("settings", Settings { page_size: 20 });
//! let pager = Dependency::new("pager", |args: &DependencyArgs<'_>| {
//!     let settings = args.get::<Settings>("settings")?;
//!     Ok(settings.page_size * 2)
//! })
//! .requires(["settings"])
//! .use_cache(false);
//! # let _ = (settings, pager);
//! ```

mod core;

pub use self::core::{
    Dependency, DependencyArgs, DependencyError, DependencyResolver, Injected, ResolutionScope,
    Resolved,
};
