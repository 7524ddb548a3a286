//! # Security Module
//!
//! Declarative security schemes for the OpenAPI document.
//!
//! ## Overview
//!
//! A [`SecurityScheme`] describes how a client authenticates. It is one of a
//! closed set of kinds ([`SecuritySchemeKind`]):
//!
//! - **API key** - a named header, query parameter or cookie
//! - **HTTP** - `Authorization` header with the `basic`, `bearer`, `digest` (or
//!   another) scheme
//! - **OAuth2** - one or more flows with their URLs and scopes
//! - **OpenID Connect** - a discovery URL
//!
//! Schemes are attached to the application (applies to every route) or to single
//! routes. When the document is assembled each distinct scheme is emitted once
//! under `components.securitySchemes` by its identifier, and every operation
//! that uses it carries `security: [{ <id>: <scheme object> }]`.
//!
//! ## Identifiers
//!
//! Each constructor has a default identifier:
//!
//! | Constructor | Identifier |
//! |---|---|
//! | [`SecurityScheme::basic`] | `Basic` |
//! | [`SecurityScheme::bearer`] | `Bearer` |
//! | [`SecurityScheme::digest`] | `Digest` |
//! | [`SecurityScheme::api_key_in_header`] | `APIKeyInHeader` |
//! | [`SecurityScheme::api_key_in_query`] | `APIKeyInQuery` |
//! | [`SecurityScheme::api_key_in_cookie`] | `APIKeyInCookie` |
//! | [`SecurityScheme::oauth2`] | `OAuth2` |
//! | [`SecurityScheme::open_id_connect`] | `OpenIdConnect` |
//!
//! Use [`SecurityScheme::scheme_name`] when two schemes of the same kind are
//! needed; two different schemes sharing an identifier fail schema assembly.
//!
//! ```rust
//! use gantry::security::SecurityScheme;
//!
//! let admin = SecurityScheme::api_key_in_header("X-Admin-Key").scheme_name("AdminKey");
//! assert_eq!(admin.identifier(), "AdminKey");
//! ```
//!
//! Schemes only describe how credentials are presented. Verifying them is the
//! job of a dependency declared on the route.

mod registry;
mod scheme;

pub use registry::SecuritySchemeRegistry;
pub use scheme::{
    ApiKeyLocation, HttpScheme, OAuthFlow, OAuthFlows, SecurityScheme, SecuritySchemeKind,
};
