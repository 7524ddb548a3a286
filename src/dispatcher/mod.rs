//! # Dispatcher Module
//!
//! Holds the registered handlers and runs them.
//!
//! A handler receives a [`HandlerRequest`] that already carries validated
//! parameters and resolved dependencies, and returns a [`HandlerResponse`].
//! Handler panics are caught at this boundary: the client receives a generic
//! 500 while the panic message is logged with the request id.

mod core;

pub use self::core::{Dispatcher, Handler, HandlerRequest, HandlerResponse};
