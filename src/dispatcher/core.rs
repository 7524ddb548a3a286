use crate::binder::{BoundParams, HeaderVec};
use crate::dependency::Resolved;
use crate::ids::RequestId;
use crate::params::ErrorDetail;
use crate::router::ParamVec;
use http::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::any::Any;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// A route handler.
///
/// Handlers are plain synchronous functions; the transport decides how many
/// run concurrently.
pub type Handler = Arc<dyn Fn(HandlerRequest) -> HandlerResponse + Send + Sync>;

/// Everything a handler receives: bound parameters and injected dependencies.
#[derive(Debug, Clone)]
pub struct HandlerRequest {
    pub request_id: RequestId,
    pub method: Method,
    pub path: String,
    pub handler_name: Arc<str>,
    /// Raw path captures, percent-decoded
    pub path_params: ParamVec,
    /// Validated parameter values keyed by binding name
    pub params: BoundParams,
    pub dependencies: Resolved,
    pub headers: HeaderVec,
}

impl HandlerRequest {
    /// A bound parameter value.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    /// A bound parameter deserialized into `T`.
    ///
    /// # Errors
    ///
    /// When the parameter is absent or does not deserialize into `T`.
    pub fn param_as<T: DeserializeOwned>(&self, name: &str) -> anyhow::Result<T> {
        let value = self
            .params
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("parameter `{name}` is not bound"))?;
        Ok(serde_json::from_value(value.clone())?)
    }

    /// An injected dependency downcast to `T`.
    #[must_use]
    pub fn dependency<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.dependencies.get::<T>(name)
    }

    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Response produced by a handler or by the application itself.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandlerResponse {
    pub status: u16,
    #[serde(skip_serializing)]
    pub headers: HeaderVec,
    pub body: Value,
}

impl HandlerResponse {
    #[must_use]
    pub fn new(status: u16, headers: HeaderVec, body: Value) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// JSON response with a `content-type` header.
    #[must_use]
    pub fn json(status: u16, body: Value) -> Self {
        let mut headers = HeaderVec::new();
        headers.push((Arc::from("content-type"), "application/json".to_string()));
        Self {
            status,
            headers,
            body,
        }
    }

    #[must_use]
    pub fn ok(body: Value) -> Self {
        Self::json(200, body)
    }

    /// Empty response, e.g. for 204.
    #[must_use]
    pub fn empty(status: u16) -> Self {
        Self::new(status, HeaderVec::new(), Value::Null)
    }

    /// `{"detail": <detail>}` with the given status.
    #[must_use]
    pub fn error(status: u16, detail: impl Into<Value>) -> Self {
        Self::json(status, json!({ "detail": detail.into() }))
    }

    /// 422 with one entry per validation failure.
    #[must_use]
    pub fn validation_error(errors: &[ErrorDetail]) -> Self {
        let detail: Vec<Value> = errors.iter().map(ErrorDetail::to_value).collect();
        Self::json(422, json!({ "detail": detail }))
    }

    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Add or replace a header.
    pub fn set_header(&mut self, name: &str, value: String) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value));
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_header(name, value.into());
        self
    }
}

/// Handlers in route registration order.
#[derive(Clone, Default)]
pub struct Dispatcher {
    handlers: Vec<(Arc<str>, Handler)>,
}

impl Dispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler and return its slot.
    pub fn register(&mut self, name: &str, handler: Handler) -> usize {
        self.handlers.push((Arc::from(name), handler));
        self.handlers.len() - 1
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Run the handler in `slot`, or `None` when no such slot exists.
    ///
    /// A panicking handler is caught and answered with a generic 500; the panic
    /// message is logged but never sent to the client.
    pub fn dispatch(&self, slot: usize, request: HandlerRequest) -> Option<HandlerResponse> {
        let (name, handler) = self.handlers.get(slot)?;
        let request_id = request.request_id;

        info!(
            request_id = %request_id,
            handler_name = %name,
            params = ?request.params.keys().collect::<Vec<_>>(),
            dependencies = ?request.dependencies,
            "Handler execution start"
        );
        let execution_start = Instant::now();

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| handler(request)));
        let execution_time_us = execution_start.elapsed().as_micros();

        match outcome {
            Ok(response) => {
                info!(
                    request_id = %request_id,
                    handler_name = %name,
                    status = response.status,
                    execution_time_us = execution_time_us,
                    "Handler execution complete"
                );
                Some(response)
            }
            Err(panic) => {
                error!(
                    request_id = %request_id,
                    handler_name = %name,
                    panic_message = %panic_message(panic.as_ref()),
                    execution_time_us = execution_time_us,
                    "Handler panicked"
                );
                Some(HandlerResponse::error(500, "Internal Server Error"))
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> HandlerRequest {
        HandlerRequest {
            request_id: RequestId::new(),
            method: Method::GET,
            path: "/".to_string(),
            handler_name: Arc::from("root"),
            path_params: ParamVec::new(),
            params: BoundParams::new(),
            dependencies: Resolved::default(),
            headers: HeaderVec::new(),
        }
    }

    #[test]
    fn panics_become_generic_500() {
        let mut dispatcher = Dispatcher::new();
        let slot = dispatcher.register(
            "boom",
            Arc::new(|_req: HandlerRequest| -> HandlerResponse { panic!("secret detail") }),
        );
        let response = dispatcher.dispatch(slot, request()).unwrap();
        assert_eq!(response.status, 500);
        assert_eq!(response.body, json!({"detail": "Internal Server Error"}));
    }

    struct Capture(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn execution_log_names_params_without_values() {
        let mut dispatcher = Dispatcher::new();
        let slot = dispatcher.register(
            "login",
            Arc::new(|_req: HandlerRequest| HandlerResponse::ok(json!({}))),
        );
        let mut req = request();
        req.params.insert("x_token".to_string(), json!("hunter2"));

        let buf = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = Arc::clone(&buf);
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || Capture(Arc::clone(&sink)))
            .finish();
        tracing::subscriber::with_default(subscriber, || dispatcher.dispatch(slot, req)).unwrap();

        let output = String::from_utf8(buf.lock().unwrap().clone()).unwrap();
        assert!(output.contains("Handler execution start"), "{output}");
        assert!(output.contains("x_token"), "{output}");
        assert!(!output.contains("hunter2"), "{output}");
    }

    #[test]
    fn unknown_slot_is_none() {
        assert!(Dispatcher::new().dispatch(3, request()).is_none());
    }

    #[test]
    fn validation_error_body_shape() {
        let errors = vec![ErrorDetail::missing(vec!["query".into(), "q".into()])];
        let response = HandlerResponse::validation_error(&errors);
        assert_eq!(response.status, 422);
        assert_eq!(
            response.body,
            json!({"detail": [{"loc": ["query", "q"], "msg": "Field required", "type": "missing"}]})
        );
        assert_eq!(response.get_header("Content-Type"), Some("application/json"));
    }

    #[test]
    fn param_as_deserializes() {
        let mut req = request();
        req.params.insert("ids".to_string(), json!([1, 2]));
        let ids: Vec<u32> = req.param_as("ids").unwrap();
        assert_eq!(ids, vec![1, 2]);
        assert!(req.param_as::<u32>("missing").is_err());
    }
}
