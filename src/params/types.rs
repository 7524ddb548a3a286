use crate::model::{Constraints, TypeSpec};
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;

/// Where a parameter is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamSource {
    Path,
    Query,
    Header,
    Cookie,
    Body,
}

impl ParamSource {
    /// Name used both as the OpenAPI `in` value and the first `loc` element.
    pub const fn as_str(self) -> &'static str {
        match self {
            ParamSource::Path => "path",
            ParamSource::Query => "query",
            ParamSource::Header => "header",
            ParamSource::Cookie => "cookie",
            ParamSource::Body => "body",
        }
    }
}

impl fmt::Display for ParamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire encoding of a request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyEncoding {
    #[default]
    Json,
    UrlEncoded,
    Multipart,
}

impl BodyEncoding {
    pub const fn media_type(self) -> &'static str {
        match self {
            BodyEncoding::Json => "application/json",
            BodyEncoding::UrlEncoded => "application/x-www-form-urlencoded",
            BodyEncoding::Multipart => "multipart/form-data",
        }
    }

    /// Classify a `Content-Type` header value, ignoring parameters.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "application/json" => Some(BodyEncoding::Json),
            "application/x-www-form-urlencoded" => Some(BodyEncoding::UrlEncoded),
            "multipart/form-data" => Some(BodyEncoding::Multipart),
            other if other.ends_with("+json") => Some(BodyEncoding::Json),
            _ => None,
        }
    }

    /// Form and multipart bodies are always read field by field.
    pub const fn always_embeds(self) -> bool {
        !matches!(self, BodyEncoding::Json)
    }
}

/// One declared request input.
///
/// Built with the constructor matching its source and refined with builder
/// methods; immutable once the owning route is registered.
///
/// ```rust
/// use gantry::model::TypeSpec;
/// use gantry::params::ParameterDescriptor;
///
/// let limit = ParameterDescriptor::query("limit", TypeSpec::Integer)
///     .default(10.into())
///     .ge(1.0)
///     .le(100.0);
/// assert!(!limit.required);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDescriptor {
    /// Binding name, used as the key of the bound map
    pub name: String,
    pub source: ParamSource,
    pub ty: TypeSpec,
    pub required: bool,
    pub default: Option<Value>,
    pub constraints: Constraints,
    /// Body parameters only
    pub encoding: BodyEncoding,
    /// Body parameters only: read from `body[name]` instead of the whole body
    pub embed: bool,
    /// Accept an explicit JSON `null` even when the type is not `Optional`
    pub allow_none: bool,
    /// Wire name when it differs from `name`
    pub alias: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub examples: Vec<Value>,
    pub deprecated: bool,
    pub include_in_schema: bool,
    /// `x-*` keys merged into the emitted parameter object
    pub extensions: IndexMap<String, Value>,
}

impl ParameterDescriptor {
    pub fn new(name: impl Into<String>, source: ParamSource, ty: TypeSpec) -> Self {
        ParameterDescriptor {
            name: name.into(),
            source,
            ty,
            required: true,
            default: None,
            constraints: Constraints::default(),
            encoding: BodyEncoding::Json,
            embed: false,
            allow_none: false,
            alias: None,
            title: None,
            description: None,
            examples: Vec::new(),
            deprecated: false,
            include_in_schema: true,
            extensions: IndexMap::new(),
        }
    }

    pub fn path(name: impl Into<String>, ty: TypeSpec) -> Self {
        Self::new(name, ParamSource::Path, ty)
    }

    pub fn query(name: impl Into<String>, ty: TypeSpec) -> Self {
        Self::new(name, ParamSource::Query, ty)
    }

    pub fn header(name: impl Into<String>, ty: TypeSpec) -> Self {
        Self::new(name, ParamSource::Header, ty)
    }

    pub fn cookie(name: impl Into<String>, ty: TypeSpec) -> Self {
        Self::new(name, ParamSource::Cookie, ty)
    }

    /// JSON body. Maps to the whole payload unless [`embed`](Self::embed)ded.
    pub fn body(name: impl Into<String>, ty: TypeSpec) -> Self {
        Self::new(name, ParamSource::Body, ty)
    }

    /// Field of an `application/x-www-form-urlencoded` body.
    pub fn form(name: impl Into<String>, ty: TypeSpec) -> Self {
        Self::new(name, ParamSource::Body, ty).encoding(BodyEncoding::UrlEncoded)
    }

    /// Field of a `multipart/form-data` body.
    pub fn file(name: impl Into<String>, ty: TypeSpec) -> Self {
        Self::new(name, ParamSource::Body, ty).encoding(BodyEncoding::Multipart)
    }

    /// Not required; a missing value binds as `null`.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Not required; a missing value binds as `value`.
    #[must_use]
    pub fn default(mut self, value: Value) -> Self {
        self.required = false;
        self.default = Some(value);
        self
    }

    #[must_use]
    pub fn encoding(mut self, encoding: BodyEncoding) -> Self {
        self.encoding = encoding;
        if encoding.always_embeds() {
            self.embed = true;
        }
        self
    }

    #[must_use]
    pub fn embed(mut self) -> Self {
        self.embed = true;
        self
    }

    #[must_use]
    pub fn allow_none(mut self) -> Self {
        self.allow_none = true;
        self
    }

    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    #[must_use]
    pub fn example(mut self, value: Value) -> Self {
        self.examples.push(value);
        self
    }

    #[must_use]
    pub fn deprecated(mut self) -> Self {
        self.deprecated = true;
        self
    }

    /// Bind the parameter but leave it out of the OpenAPI document.
    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.include_in_schema = false;
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

    #[must_use]
    pub fn constraints(mut self, constraints: Constraints) -> Self {
        self.constraints = constraints;
        self
    }

    #[must_use]
    pub fn gt(mut self, bound: f64) -> Self {
        self.constraints.gt = Some(bound);
        self
    }

    #[must_use]
    pub fn ge(mut self, bound: f64) -> Self {
        self.constraints.ge = Some(bound);
        self
    }

    #[must_use]
    pub fn lt(mut self, bound: f64) -> Self {
        self.constraints.lt = Some(bound);
        self
    }

    #[must_use]
    pub fn le(mut self, bound: f64) -> Self {
        self.constraints.le = Some(bound);
        self
    }

    #[must_use]
    pub fn multiple_of(mut self, step: f64) -> Self {
        self.constraints.multiple_of = Some(step);
        self
    }

    #[must_use]
    pub fn min_length(mut self, len: usize) -> Self {
        self.constraints.min_length = Some(len);
        self
    }

    #[must_use]
    pub fn max_length(mut self, len: usize) -> Self {
        self.constraints.max_length = Some(len);
        self
    }

    #[must_use]
    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.constraints.pattern = Some(pattern.into());
        self
    }

    #[must_use]
    pub fn min_items(mut self, len: usize) -> Self {
        self.constraints.min_items = Some(len);
        self
    }

    #[must_use]
    pub fn max_items(mut self, len: usize) -> Self {
        self.constraints.max_items = Some(len);
        self
    }

    /// Name on the wire: the alias if set, otherwise the binding name.
    pub fn wire_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// Key used to look the value up in the request.
    ///
    /// Header names without an alias have `_` mapped to `-`, and all header
    /// lookups are lowercase.
    pub fn lookup_key(&self) -> String {
        match (self.source, &self.alias) {
            (ParamSource::Header, Some(alias)) => alias.to_ascii_lowercase(),
            (ParamSource::Header, None) => self.name.replace('_', "-").to_ascii_lowercase(),
            _ => self.wire_name().to_string(),
        }
    }

    /// Path parameters are always required.
    pub fn is_required(&self) -> bool {
        self.required || self.source == ParamSource::Path
    }
}
