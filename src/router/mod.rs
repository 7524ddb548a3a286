//! # Router Module
//!
//! Matches an incoming method and path against the registered route templates
//! and extracts path parameters.
//!
//! Templates use `{name}` placeholders, one per segment:
//!
//! ```text
//! /items/{item_id}          -> ^/items/([^/]+)$
//! /users/{id}/posts/{post}  -> ^/users/([^/]+)/posts/([^/]+)$
//! ```
//!
//! Captured values are percent-decoded before they reach the binder. A path that
//! matches a template registered only for other methods yields
//! [`RouteLookup::MethodNotAllowed`] rather than a 404.

mod core;

pub use self::core::{
    path_template_params, ParamVec, RouteLookup, RouteMatch, Router, MAX_INLINE_PARAMS,
};
