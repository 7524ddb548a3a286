//! # Parameter Declarations
//!
//! A route declares each input it needs as a [`ParameterDescriptor`]: which part
//! of the request it comes from ([`ParamSource`]), its [`TypeSpec`](crate::model::TypeSpec),
//! constraints, default and documentation attributes. Descriptors are plain data;
//! the [`ParameterBinder`](crate::binder::ParameterBinder) compiles them once and
//! the [`SchemaAssembler`](crate::openapi::SchemaAssembler) renders them.
//!
//! Validation failures are reported as [`ErrorDetail`]s with a `loc` path whose
//! first element is the source (`"path"`, `"query"`, `"header"`, `"cookie"`,
//! `"body"`).

mod types;
mod validate;

pub use types::{BodyEncoding, ParamSource, ParameterDescriptor};
pub use validate::{ConstraintValidator, ErrorDetail, LocItem};
