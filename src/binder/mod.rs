//! # Parameter Binding
//!
//! The binder turns a [`RequestData`] into the map of typed values a handler
//! receives. For every declared [`ParameterDescriptor`](crate::params::ParameterDescriptor)
//! it:
//!
//! 1. **Extracts** the raw value from the declared source
//!    - path: the router capture, already percent-decoded
//!    - query, header: the first value, or every value when the type is an array
//!    - cookie: the named cookie
//!    - body: the payload decoded per the route's media type; embedded bodies
//!      read their own key, a single non-embedded body takes the whole payload
//! 2. **Falls back** to the default (or `null`) when an optional value is absent,
//!    or records a `missing` error when a required one is
//! 3. **Coerces and validates** the value against its compiled constraints
//!
//! Failures from every parameter are collected; the handler only runs when the
//! list is empty, otherwise the application answers 422.
//!
//! ## Example
//!
//! ```rust
//! use gantry::binder::{ParameterBinder, RequestData};
//! use gantry::model::TypeSpec;
//! use gantry::params::ParameterDescriptor;
//! use gantry::router::ParamVec;
//!
//! let binder = ParameterBinder::new(
//!     "GET /search",
//!     "/search",
//!     vec![ParameterDescriptor::query("limit", TypeSpec::Integer).ge(1.0)],
//! )
//! .unwrap();
//!
//! let bound = binder
//!     .bind(&RequestData::get("/search?limit=5"), &ParamVec::new())
//!     .unwrap();
//! assert_eq!(bound["limit"], 5);
//! ```

mod core;
pub mod form;
mod request;

pub use self::core::{BoundParams, ParameterBinder};
pub use form::{FormValue, UploadedFile};
pub use request::{parse_cookies, parse_query_params, HeaderVec, RequestData, MAX_INLINE_HEADERS};
