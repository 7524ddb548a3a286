//! # Declared Value Types
//!
//! Rust has no runtime reflection, so every value a route accepts or returns is
//! described up front with a [`TypeSpec`]. The same description drives two
//! consumers:
//!
//! - the [`ConstraintValidator`](crate::params::ConstraintValidator), which
//!   coerces raw request input into the declared shape
//! - the [`SchemaAssembler`](crate::openapi::SchemaAssembler), which renders it
//!   as JSON Schema inside the OpenAPI document
//!
//! Structured bodies are declared as [`ModelDef`]s with a builder:
//!
//! ```rust
//! use gantry::model::{FieldDef, ModelDef, TypeSpec};
//!
//! let user = ModelDef::new("User")
//!     .field("name", TypeSpec::String)
//!     .field("email", TypeSpec::optional(TypeSpec::String))
//!     .with_field(FieldDef::new("age", TypeSpec::Integer).ge(0.0).default(18.into()));
//! assert_eq!(user.fields().len(), 3);
//! ```

use indexmap::IndexMap;
use serde_json::Value;
use std::sync::Arc;

/// Shape of a declared value.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeSpec {
    String,
    Integer,
    Number,
    Boolean,
    Array(Box<TypeSpec>),
    /// Accepts `null` in addition to the inner type.
    Optional(Box<TypeSpec>),
    /// Reference to a named model, emitted under `components.schemas`.
    Model(Arc<ModelDef>),
    /// Uploaded file from a multipart body.
    File,
    /// Any JSON value; no validation, empty schema.
    Any,
    /// Inline JSON Schema, used verbatim for both validation and the document.
    Json(Value),
    /// A type with no JSON Schema representation. Binding passes the raw value
    /// through; schema assembly fails.
    Opaque(String),
}

impl TypeSpec {
    pub fn array(inner: TypeSpec) -> Self {
        TypeSpec::Array(Box::new(inner))
    }

    pub fn optional(inner: TypeSpec) -> Self {
        TypeSpec::Optional(Box::new(inner))
    }

    pub fn model(def: ModelDef) -> Self {
        TypeSpec::Model(Arc::new(def))
    }

    /// Share an already-built model between several routes.
    pub fn model_ref(def: &Arc<ModelDef>) -> Self {
        TypeSpec::Model(Arc::clone(def))
    }

    /// Strip any number of `Optional` layers.
    pub fn unwrap_optional(&self) -> &TypeSpec {
        let mut current = self;
        while let TypeSpec::Optional(inner) = current {
            current = inner;
        }
        current
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, TypeSpec::Optional(_))
    }

    /// Whether query/header/form extraction should collect every value.
    pub fn is_sequence(&self) -> bool {
        matches!(self.unwrap_optional(), TypeSpec::Array(_))
    }

    /// Short human-readable name used in messages and logs.
    pub fn describe(&self) -> String {
        match self {
            TypeSpec::String => "string".to_string(),
            TypeSpec::Integer => "integer".to_string(),
            TypeSpec::Number => "number".to_string(),
            TypeSpec::Boolean => "boolean".to_string(),
            TypeSpec::Array(inner) => format!("array[{}]", inner.describe()),
            TypeSpec::Optional(inner) => format!("{} | null", inner.describe()),
            TypeSpec::Model(def) => def.name().to_string(),
            TypeSpec::File => "file".to_string(),
            TypeSpec::Any => "any".to_string(),
            TypeSpec::Json(_) => "json".to_string(),
            TypeSpec::Opaque(name) => name.clone(),
        }
    }
}

/// Validation constraints attached to a field or parameter.
///
/// `min_length`/`max_length`/`pattern` apply to strings, `min_items`/`max_items`
/// to arrays and the numeric bounds to integers and numbers. A constraint that
/// does not apply to the declared type is rejected when the route is built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Constraints {
    pub gt: Option<f64>,
    pub ge: Option<f64>,
    pub lt: Option<f64>,
    pub le: Option<f64>,
    pub multiple_of: Option<f64>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub pattern: Option<String>,
    pub min_items: Option<usize>,
    pub max_items: Option<usize>,
}

impl Constraints {
    pub fn is_empty(&self) -> bool {
        !self.has_numeric() && !self.has_string() && !self.has_items()
    }

    pub fn has_numeric(&self) -> bool {
        self.gt.is_some()
            || self.ge.is_some()
            || self.lt.is_some()
            || self.le.is_some()
            || self.multiple_of.is_some()
    }

    pub fn has_string(&self) -> bool {
        self.min_length.is_some() || self.max_length.is_some() || self.pattern.is_some()
    }

    pub fn has_items(&self) -> bool {
        self.min_items.is_some() || self.max_items.is_some()
    }
}

/// One field of a [`ModelDef`].
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub ty: TypeSpec,
    /// Absent means the field is required, even when its type is `Optional`.
    pub default: Option<Value>,
    pub constraints: Constraints,
    pub description: Option<String>,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, ty: TypeSpec) -> Self {
        FieldDef {
            name: name.into(),
            ty,
            default: None,
            constraints: Constraints::default(),
            description: None,
        }
    }

    #[must_use]
    pub fn default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    #[must_use]
    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
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
    pub fn le(mut self, bound: f64) -> Self {
        self.constraints.le = Some(bound);
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

    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }
}

/// A named structured type, emitted once under `components.schemas`.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDef {
    name: String,
    description: Option<String>,
    fields: Vec<FieldDef>,
    extensions: IndexMap<String, Value>,
}

impl ModelDef {
    pub fn new(name: impl Into<String>) -> Self {
        ModelDef {
            name: name.into(),
            description: None,
            fields: Vec::new(),
            extensions: IndexMap::new(),
        }
    }

    /// Add a required field with no constraints.
    #[must_use]
    pub fn field(self, name: impl Into<String>, ty: TypeSpec) -> Self {
        self.with_field(FieldDef::new(name, ty))
    }

    #[must_use]
    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    #[must_use]
    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    /// Extra key merged verbatim into the emitted schema object.
    #[must_use]
    pub fn extension(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extensions.insert(key.into(), value);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn get_description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn extensions(&self) -> &IndexMap<String, Value> {
        &self.extensions
    }

    pub fn into_type(self) -> TypeSpec {
        TypeSpec::model(self)
    }
}

/// `read_item` -> `Read Item`.
///
/// Used for property titles and default operation summaries.
pub fn title_case(name: &str) -> String {
    name.split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
