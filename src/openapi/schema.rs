use super::validation::{schema_ref, REF_PREFIX};
use crate::error::SchemaError;
use crate::model::{title_case, Constraints, ModelDef, TypeSpec};
use indexmap::IndexMap;
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// Collects the named schemas referenced while an OpenAPI document is built.
///
/// Models are keyed by name. Registering the same definition twice is a no-op;
/// registering a different definition under an existing name is an error.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    models: IndexMap<String, Arc<ModelDef>>,
    schemas: IndexMap<String, Value>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// JSON Schema for `ty`, registering any models it mentions.
    ///
    /// `context` names the field or parameter for error messages.
    pub fn type_schema(&mut self, ty: &TypeSpec, context: &str) -> Result<Value, SchemaError> {
        Ok(match ty {
            TypeSpec::String => json!({ "type": "string" }),
            TypeSpec::Integer => json!({ "type": "integer" }),
            TypeSpec::Number => json!({ "type": "number" }),
            TypeSpec::Boolean => json!({ "type": "boolean" }),
            TypeSpec::Array(inner) => {
                json!({ "type": "array", "items": self.type_schema(inner, context)? })
            }
            TypeSpec::Optional(inner) => {
                json!({ "anyOf": [self.type_schema(inner, context)?, { "type": "null" }] })
            }
            TypeSpec::Model(def) => self.register_model(def)?,
            TypeSpec::File => json!({ "type": "string", "format": "binary" }),
            TypeSpec::Any => json!({}),
            TypeSpec::Json(schema) => {
                if !schema.is_object() {
                    return Err(SchemaError::InvalidInlineSchema {
                        context: context.to_string(),
                    });
                }
                schema.clone()
            }
            TypeSpec::Opaque(type_name) => {
                return Err(SchemaError::OpaqueType {
                    context: context.to_string(),
                    type_name: type_name.clone(),
                })
            }
        })
    }

    /// Register `def` under `components.schemas` and return a `$ref` to it.
    pub fn register_model(&mut self, def: &Arc<ModelDef>) -> Result<Value, SchemaError> {
        let name = def.name().to_string();
        if let Some(existing) = self.models.get(&name) {
            if Arc::ptr_eq(existing, def) || existing.as_ref() == def.as_ref() {
                return Ok(schema_ref(&name));
            }
            return Err(SchemaError::ConflictingModel(name));
        }
        if self.schemas.contains_key(&name) {
            return Err(SchemaError::ConflictingModel(name));
        }
        self.models.insert(name.clone(), Arc::clone(def));

        let mut properties = Map::new();
        let mut required = Vec::new();
        for field in def.fields() {
            let context = format!("{name}.{}", field.name);
            let mut schema = self.type_schema(&field.ty, &context)?;
            decorate(
                &mut schema,
                &field.ty,
                &title_case(&field.name),
                &field.constraints,
                field.default.as_ref(),
                field.description.as_deref(),
            );
            properties.insert(field.name.clone(), schema);
            if field.is_required() {
                required.push(Value::String(field.name.clone()));
            }
        }

        let mut schema = Map::new();
        schema.insert("properties".to_string(), Value::Object(properties));
        schema.insert("type".to_string(), Value::String("object".to_string()));
        if !required.is_empty() {
            schema.insert("required".to_string(), Value::Array(required));
        }
        schema.insert("title".to_string(), Value::String(name.clone()));
        if let Some(description) = def.get_description() {
            schema.insert("description".to_string(), Value::String(description.to_string()));
        }
        for (key, value) in def.extensions() {
            schema.insert(key.clone(), value.clone());
        }
        self.schemas.insert(name.clone(), Value::Object(schema));
        Ok(schema_ref(&name))
    }

    /// Add a fixed schema (error models, synthesized bodies).
    ///
    /// Fails when `name` is already taken by a model or by a different schema.
    pub fn insert_raw(&mut self, name: &str, schema: Value) -> Result<(), SchemaError> {
        if self.models.contains_key(name) {
            return Err(SchemaError::ConflictingModel(name.to_string()));
        }
        match self.schemas.get(name) {
            Some(existing) if *existing != schema => {
                Err(SchemaError::ConflictingModel(name.to_string()))
            }
            Some(_) => Ok(()),
            None => {
                self.schemas.insert(name.to_string(), schema);
                Ok(())
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// The `components.schemas` object, sorted by name.
    pub fn into_components(self) -> Map<String, Value> {
        let mut schemas = self.schemas;
        schemas.sort_keys();
        schemas.into_iter().collect()
    }
}

/// Add `title`, constraint keywords, `default` and `description` to a
/// property or parameter schema.
///
/// `$ref` schemas are left untouched. For `Optional` types the constraints go
/// on the non-null branch.
pub fn decorate(
    schema: &mut Value,
    ty: &TypeSpec,
    title: &str,
    constraints: &Constraints,
    default: Option<&Value>,
    description: Option<&str>,
) {
    let Some(obj) = schema.as_object_mut() else {
        return;
    };
    if obj.contains_key("$ref") {
        return;
    }

    let keywords = constraint_keywords(ty.unwrap_optional(), constraints);
    if !keywords.is_empty() {
        let target = if ty.is_optional() && obj.contains_key("anyOf") {
            obj.get_mut("anyOf")
                .and_then(Value::as_array_mut)
                .and_then(|branches| branches.first_mut())
                .and_then(Value::as_object_mut)
        } else {
            Some(&mut *obj)
        };
        if let Some(target) = target {
            if !target.contains_key("$ref") {
                target.extend(keywords);
            }
        }
    }

    obj.insert("title".to_string(), Value::String(title.to_string()));
    if let Some(default) = default {
        obj.insert("default".to_string(), default.clone());
    }
    if let Some(description) = description {
        obj.insert("description".to_string(), Value::String(description.to_string()));
    }
}

fn constraint_keywords(ty: &TypeSpec, c: &Constraints) -> Map<String, Value> {
    let mut keywords = Map::new();
    let mut put = |key: &str, value: Option<Value>| {
        if let Some(value) = value {
            keywords.insert(key.to_string(), value);
        }
    };
    match ty {
        TypeSpec::Integer | TypeSpec::Number => {
            put("exclusiveMinimum", c.gt.map(number));
            put("minimum", c.ge.map(number));
            put("exclusiveMaximum", c.lt.map(number));
            put("maximum", c.le.map(number));
            put("multipleOf", c.multiple_of.map(number));
        }
        TypeSpec::String => {
            put("minLength", c.min_length.map(Value::from));
            put("maxLength", c.max_length.map(Value::from));
            put("pattern", c.pattern.clone().map(Value::String));
        }
        TypeSpec::Array(_) => {
            put("minItems", c.min_items.map(Value::from));
            put("maxItems", c.max_items.map(Value::from));
        }
        _ => {}
    }
    keywords
}

/// Render whole floats as integers so `ge(1.0)` emits `"minimum": 1`.
fn number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        Value::from(n as i64)
    } else {
        Value::from(n)
    }
}

/// `$ref` target name, when `schema` is a reference into `components.schemas`.
pub fn ref_name(schema: &Value) -> Option<&str> {
    schema
        .get("$ref")
        .and_then(Value::as_str)
        .and_then(|r| r.strip_prefix(REF_PREFIX))
}
