//! # OpenAPI Module
//!
//! Generates an OpenAPI 3.1.0 document from the registered routes.
//!
//! ## What ends up in the document
//!
//! - **paths** - one entry per route template in registration order, one
//!   operation per method. Routes declared with `include_in_schema(false)` are
//!   skipped.
//! - **operations** - `summary` (title-cased handler name unless given),
//!   `operationId`, `parameters` for path/query/header/cookie inputs,
//!   `requestBody` for body inputs, `responses` and `security`
//! - **components.schemas** - every model reachable from a parameter, body or
//!   response, keyed by name and sorted. `ValidationError` and
//!   `HTTPValidationError` are added when any operation can answer 422.
//! - **components.securitySchemes** - every distinct security scheme, keyed by
//!   identifier
//!
//! Assembly is all-or-nothing: a model that cannot be represented fails the
//! whole build with a [`SchemaError`](crate::error::SchemaError).

mod assembler;
mod info;
mod schema;
pub mod validation;

pub use assembler::{SchemaAssembler, OPENAPI_VERSION};
pub use info::{Contact, Info, License, Server};
pub use schema::SchemaRegistry;
