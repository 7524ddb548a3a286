use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::fmt;

/// Where an API key (or HTTP credential) is carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiKeyLocation {
    Header,
    Query,
    Cookie,
}

impl ApiKeyLocation {
    pub const fn as_str(self) -> &'static str {
        match self {
            ApiKeyLocation::Header => "header",
            ApiKeyLocation::Query => "query",
            ApiKeyLocation::Cookie => "cookie",
        }
    }
}

/// HTTP authentication scheme name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpScheme {
    Basic,
    Bearer,
    Digest,
    Other(String),
}

impl HttpScheme {
    pub fn as_str(&self) -> &str {
        match self {
            HttpScheme::Basic => "basic",
            HttpScheme::Bearer => "bearer",
            HttpScheme::Digest => "digest",
            HttpScheme::Other(name) => name,
        }
    }
}

impl fmt::Display for HttpScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One OAuth2 flow. Which URLs are meaningful depends on the flow type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OAuthFlow {
    pub authorization_url: Option<String>,
    pub token_url: Option<String>,
    pub refresh_url: Option<String>,
    pub scopes: IndexMap<String, String>,
}

impl OAuthFlow {
    #[must_use]
    pub fn authorization_url(mut self, url: impl Into<String>) -> Self {
        self.authorization_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn refresh_url(mut self, url: impl Into<String>) -> Self {
        self.refresh_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn scope(mut self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.scopes.insert(name.into(), description.into());
        self
    }

    fn to_value(&self) -> Value {
        let mut obj = Map::new();
        if let Some(url) = &self.authorization_url {
            obj.insert("authorizationUrl".to_string(), Value::String(url.clone()));
        }
        if let Some(url) = &self.token_url {
            obj.insert("tokenUrl".to_string(), Value::String(url.clone()));
        }
        if let Some(url) = &self.refresh_url {
            obj.insert("refreshUrl".to_string(), Value::String(url.clone()));
        }
        let scopes: Map<String, Value> = self
            .scopes
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        obj.insert("scopes".to_string(), Value::Object(scopes));
        Value::Object(obj)
    }
}

/// The OAuth2 flows a scheme supports.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OAuthFlows {
    pub implicit: Option<OAuthFlow>,
    pub password: Option<OAuthFlow>,
    pub client_credentials: Option<OAuthFlow>,
    pub authorization_code: Option<OAuthFlow>,
}

impl OAuthFlows {
    #[must_use]
    pub fn implicit(mut self, flow: OAuthFlow) -> Self {
        self.implicit = Some(flow);
        self
    }

    #[must_use]
    pub fn password(mut self, flow: OAuthFlow) -> Self {
        self.password = Some(flow);
        self
    }

    #[must_use]
    pub fn client_credentials(mut self, flow: OAuthFlow) -> Self {
        self.client_credentials = Some(flow);
        self
    }

    #[must_use]
    pub fn authorization_code(mut self, flow: OAuthFlow) -> Self {
        self.authorization_code = Some(flow);
        self
    }

    fn to_value(&self) -> Value {
        let mut obj = Map::new();
        let flows = [
            ("implicit", &self.implicit),
            ("password", &self.password),
            ("clientCredentials", &self.client_credentials),
            ("authorizationCode", &self.authorization_code),
        ];
        for (key, flow) in flows {
            if let Some(flow) = flow {
                obj.insert(key.to_string(), flow.to_value());
            }
        }
        Value::Object(obj)
    }
}

/// The closed set of scheme kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum SecuritySchemeKind {
    ApiKey {
        name: String,
        location: ApiKeyLocation,
    },
    Http {
        scheme: HttpScheme,
        name: Option<String>,
        location: Option<ApiKeyLocation>,
        bearer_format: Option<String>,
    },
    OAuth2 {
        flows: OAuthFlows,
    },
    OpenIdConnect {
        url: String,
    },
}

impl SecuritySchemeKind {
    /// OpenAPI `type` value.
    pub const fn type_name(&self) -> &'static str {
        match self {
            SecuritySchemeKind::ApiKey { .. } => "apiKey",
            SecuritySchemeKind::Http { .. } => "http",
            SecuritySchemeKind::OAuth2 { .. } => "oauth2",
            SecuritySchemeKind::OpenIdConnect { .. } => "openIdConnect",
        }
    }
}

/// A security scheme declaration attached to the app or to a route.
///
/// Its identifier is the explicit `scheme_name`, or the default name of the
/// constructor that built it (`Basic`, `Bearer`, `APIKeyInHeader`, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct SecurityScheme {
    kind: SecuritySchemeKind,
    default_name: &'static str,
    scheme_name: Option<String>,
    description: Option<String>,
    extensions: IndexMap<String, Value>,
}

impl SecurityScheme {
    fn with_kind(kind: SecuritySchemeKind, default_name: &'static str) -> Self {
        SecurityScheme {
            kind,
            default_name,
            scheme_name: None,
            description: None,
            extensions: IndexMap::new(),
        }
    }

    fn http(scheme: HttpScheme, name: &str, default_name: &'static str) -> Self {
        Self::with_kind(
            SecuritySchemeKind::Http {
                scheme,
                name: Some(name.to_string()),
                location: Some(ApiKeyLocation::Header),
                bearer_format: None,
            },
            default_name,
        )
    }

    /// HTTP Basic; declared with `name: "Basic"`, `in: "header"`.
    pub fn basic() -> Self {
        Self::http(HttpScheme::Basic, "Basic", "Basic")
    }

    /// HTTP Bearer; declared with `name: "Authorization"`, `in: "header"`.
    pub fn bearer() -> Self {
        Self::http(HttpScheme::Bearer, "Authorization", "Bearer")
    }

    /// HTTP Digest; declared with `name: "Authorization"`, `in: "header"`.
    pub fn digest() -> Self {
        Self::http(HttpScheme::Digest, "Authorization", "Digest")
    }

    /// Any other HTTP auth scheme, e.g. `hoba`.
    pub fn http_scheme(scheme: impl Into<String>) -> Self {
        Self::with_kind(
            SecuritySchemeKind::Http {
                scheme: HttpScheme::Other(scheme.into()),
                name: None,
                location: None,
                bearer_format: None,
            },
            "HTTPBase",
        )
    }

    pub fn api_key_in_header(name: impl Into<String>) -> Self {
        Self::api_key(name, ApiKeyLocation::Header, "APIKeyInHeader")
    }

    pub fn api_key_in_query(name: impl Into<String>) -> Self {
        Self::api_key(name, ApiKeyLocation::Query, "APIKeyInQuery")
    }

    pub fn api_key_in_cookie(name: impl Into<String>) -> Self {
        Self::api_key(name, ApiKeyLocation::Cookie, "APIKeyInCookie")
    }

    fn api_key(name: impl Into<String>, location: ApiKeyLocation, default_name: &'static str) -> Self {
        Self::with_kind(
            SecuritySchemeKind::ApiKey {
                name: name.into(),
                location,
            },
            default_name,
        )
    }

    pub fn oauth2(flows: OAuthFlows) -> Self {
        Self::with_kind(SecuritySchemeKind::OAuth2 { flows }, "OAuth2")
    }

    pub fn open_id_connect(url: impl Into<String>) -> Self {
        Self::with_kind(
            SecuritySchemeKind::OpenIdConnect { url: url.into() },
            "OpenIdConnect",
        )
    }

    #[must_use]
    pub fn scheme_name(mut self, name: impl Into<String>) -> Self {
        self.scheme_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    /// Only meaningful for HTTP schemes; ignored otherwise.
    #[must_use]
    pub fn bearer_format(mut self, format: impl Into<String>) -> Self {
        if let SecuritySchemeKind::Http { bearer_format, .. } = &mut self.kind {
            *bearer_format = Some(format.into());
        }
        self
    }

    /// Extension key, prefixed with `x-` when missing.
    #[must_use]
    pub fn extension(mut self, key: impl Into<String>, value: Value) -> Self {
        let key = key.into();
        let key = if key.starts_with("x-") { key } else { format!("x-{key}") };
        self.extensions.insert(key, value);
        self
    }

    pub fn kind(&self) -> &SecuritySchemeKind {
        &self.kind
    }

    /// Key under `components.securitySchemes`.
    pub fn identifier(&self) -> &str {
        self.scheme_name.as_deref().unwrap_or(self.default_name)
    }

    /// The OpenAPI Security Scheme Object.
    pub fn to_openapi(&self) -> Value {
        let mut obj = Map::new();
        obj.insert(
            "type".to_string(),
            Value::String(self.kind.type_name().to_string()),
        );
        if let Some(description) = &self.description {
            obj.insert("description".to_string(), Value::String(description.clone()));
        }
        match &self.kind {
            SecuritySchemeKind::ApiKey { name, location } => {
                obj.insert("name".to_string(), Value::String(name.clone()));
                obj.insert("in".to_string(), Value::String(location.as_str().to_string()));
            }
            SecuritySchemeKind::Http {
                scheme,
                name,
                location,
                bearer_format,
            } => {
                if let Some(name) = name {
                    obj.insert("name".to_string(), Value::String(name.clone()));
                }
                if let Some(location) = location {
                    obj.insert("in".to_string(), Value::String(location.as_str().to_string()));
                }
                obj.insert("scheme".to_string(), Value::String(scheme.as_str().to_string()));
                if let Some(format) = bearer_format {
                    obj.insert("bearerFormat".to_string(), Value::String(format.clone()));
                }
            }
            SecuritySchemeKind::OAuth2 { flows } => {
                obj.insert("flows".to_string(), flows.to_value());
            }
            SecuritySchemeKind::OpenIdConnect { url } => {
                obj.insert("openIdConnectUrl".to_string(), Value::String(url.clone()));
            }
        }
        for (key, value) in &self.extensions {
            obj.insert(key.clone(), value.clone());
        }
        Value::Object(obj)
    }
}
