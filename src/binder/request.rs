use crate::ids::RequestId;
use http::Method;
use serde_json::Value;
use smallvec::SmallVec;
use std::sync::Arc;

/// Maximum number of headers stored inline before spilling to the heap.
pub const MAX_INLINE_HEADERS: usize = 16;

/// Header or cookie list with lowercase header names.
///
/// Names are `Arc<str>` so that repeated names are cheap to clone into a
/// handler request.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// Boundary used by [`RequestData::multipart`].
pub const TEST_BOUNDARY: &str = "gantry-boundary-7MA4YWxkTrZu0gW";

/// An already-split HTTP request handed to the application by the transport.
///
/// The transport owns socket I/O and HTTP parsing; this is the boundary shape
/// it produces. Builder helpers exist so that callers (and tests) can describe
/// a request without a real connection.
#[derive(Debug, Clone)]
pub struct RequestData {
    pub request_id: RequestId,
    pub method: Method,
    /// Path without the query string
    pub path: String,
    /// Decoded query pairs in arrival order, duplicates preserved
    pub query: Vec<(String, String)>,
    /// Headers with lowercase names, duplicates preserved
    pub headers: HeaderVec,
    /// Cookies parsed from every `Cookie` header
    pub cookies: HeaderVec,
    pub body: Vec<u8>,
}

impl RequestData {
    /// Start a request for `target`, which may carry a query string.
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, parse_query_params(query)),
            None => (target, Vec::new()),
        };
        RequestData {
            request_id: RequestId::new(),
            method,
            path: if path.is_empty() { "/".to_string() } else { path.to_string() },
            query,
            headers: HeaderVec::new(),
            cookies: HeaderVec::new(),
            body: Vec::new(),
        }
    }

    pub fn get(target: &str) -> Self {
        Self::new(Method::GET, target)
    }

    pub fn post(target: &str) -> Self {
        Self::new(Method::POST, target)
    }

    pub fn put(target: &str) -> Self {
        Self::new(Method::PUT, target)
    }

    pub fn delete(target: &str) -> Self {
        Self::new(Method::DELETE, target)
    }

    /// Append a header. `Cookie` headers also populate [`cookies`](Self::cookies)
    /// and a valid `x-request-id` replaces the generated id.
    #[must_use]
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        let name = name.to_ascii_lowercase();
        let value = value.into();
        match name.as_str() {
            "cookie" => self.cookies.extend(parse_cookies(&value)),
            "x-request-id" => self.request_id = RequestId::from_header_or_new(Some(&value)),
            _ => {}
        }
        self.headers.push((Arc::from(name.as_str()), value));
        self
    }

    /// Set the body and its `Content-Type`.
    #[must_use]
    pub fn body(mut self, content_type: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.headers
            .retain(|(name, _)| name.as_ref() != "content-type");
        self.body = bytes.into();
        self.header("content-type", content_type)
    }

    #[must_use]
    pub fn json(self, value: &Value) -> Self {
        let bytes = serde_json::to_vec(value).unwrap_or_default();
        self.body("application/json", bytes)
    }

    /// URL-encoded form body.
    #[must_use]
    pub fn form<'a>(self, pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let encoded = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish();
        self.body("application/x-www-form-urlencoded", encoded)
    }

    /// Multipart body with text fields followed by files `(field, filename, content)`.
    #[must_use]
    pub fn multipart(self, fields: &[(&str, &str)], files: &[(&str, &str, &[u8])]) -> Self {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(format!("--{TEST_BOUNDARY}\r\n").as_bytes());
            body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
            );
            body.extend_from_slice(value.as_bytes());
            body.extend_from_slice(b"\r\n");
        }
        for (name, filename, content) in files {
            body.extend_from_slice(format!("--{TEST_BOUNDARY}\r\n").as_bytes());
            body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
            body.extend_from_slice(content);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{TEST_BOUNDARY}--\r\n").as_bytes());
        self.body(
            &format!("multipart/form-data; boundary={TEST_BOUNDARY}"),
            body,
        )
    }

    /// First header value for `name`, case-insensitive.
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Every header value for `name`, in arrival order.
    pub fn get_header_all(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn get_query(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_query_all(&self, name: &str) -> Vec<&str> {
        self.query
            .iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn get_cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.get_header("content-type")
    }
}

/// Split a `Cookie` header value into name/value pairs.
pub fn parse_cookies(value: &str) -> HeaderVec {
    value
        .split(';')
        .filter_map(|pair| {
            let mut parts = pair.trim().splitn(2, '=');
            let name = parts.next()?.trim();
            if name.is_empty() {
                return None;
            }
            let value = parts.next().unwrap_or("").trim();
            Some((Arc::from(name), value.to_string()))
        })
        .collect()
}

/// Decode a query string (without the leading `?`) into ordered pairs.
pub fn parse_query_params(query: &str) -> Vec<(String, String)> {
    url::form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}
