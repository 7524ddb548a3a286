use super::info::{Info, Server};
use super::schema::{decorate, SchemaRegistry};
use super::validation::{
    http_validation_error_schema, schema_ref, validation_error_response,
    validation_error_schema, HTTP_VALIDATION_ERROR, VALIDATION_ERROR,
};
use crate::error::SchemaError;
use crate::model::title_case;
use crate::params::{ParamSource, ParameterDescriptor};
use crate::route::RouteMeta;
use crate::security::SecuritySchemeRegistry;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// OpenAPI version emitted in every document.
pub const OPENAPI_VERSION: &str = "3.1.0";

/// Builds the OpenAPI document from route metadata.
///
/// The assembler is stateless between builds: every call to
/// [`build`](Self::build) walks the routes from scratch.
#[derive(Debug, Clone)]
pub struct SchemaAssembler {
    info: Info,
    servers: Vec<Server>,
}

impl SchemaAssembler {
    /// `servers` defaults to `[{"url": "/"}]` when empty.
    pub fn new(info: Info, servers: Vec<Server>) -> Self {
        let servers = if servers.is_empty() {
            vec![Server::new("/")]
        } else {
            servers
        };
        SchemaAssembler { info, servers }
    }

    pub fn info(&self) -> &Info {
        &self.info
    }

    /// Assemble the document for `routes`, in registration order.
    ///
    /// # Errors
    ///
    /// The first [`SchemaError`] met: a type with no JSON Schema form, a
    /// malformed inline schema, or two different models or security schemes
    /// sharing a name. No partial document is produced.
    pub fn build(&self, routes: &[Arc<RouteMeta>]) -> Result<Value, SchemaError> {
        let started = Instant::now();
        let mut schemas = SchemaRegistry::new();
        let mut security = SecuritySchemeRegistry::new();
        let mut paths = Map::new();
        let mut needs_validation_models = false;

        for route in routes.iter().filter(|r| r.include_in_schema) {
            let operation = match self.operation(route, &mut schemas, &mut security) {
                Ok(operation) => operation,
                Err(e) => {
                    error!(route = %route.label(), error = %e, "Schema assembly failed");
                    return Err(e);
                }
            };
            needs_validation_models |= route.can_fail_validation();

            let item = paths
                .entry(route.path_pattern.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(item) = item {
                item.insert(route.method.as_str().to_ascii_lowercase(), operation);
            }
        }

        if needs_validation_models {
            let fixed = [
                (VALIDATION_ERROR, validation_error_schema()),
                (HTTP_VALIDATION_ERROR, http_validation_error_schema()),
            ];
            if let Err(e) = fixed
                .into_iter()
                .try_for_each(|(name, schema)| schemas.insert_raw(name, schema))
            {
                error!(error = %e, "Schema assembly failed");
                return Err(e);
            }
        }

        let mut components = Map::new();
        if !schemas.is_empty() {
            components.insert(
                "schemas".to_string(),
                Value::Object(schemas.into_components()),
            );
        }
        if !security.is_empty() {
            components.insert(
                "securitySchemes".to_string(),
                Value::Object(security.to_components()),
            );
        }

        let mut document = Map::new();
        document.insert("openapi".to_string(), Value::String(OPENAPI_VERSION.to_string()));
        document.insert("info".to_string(), to_value(&self.info)?);
        document.insert("servers".to_string(), to_value(&self.servers)?);
        document.insert("paths".to_string(), Value::Object(paths));
        document.insert("components".to_string(), Value::Object(components));

        info!(
            route_count = routes.len(),
            security_scheme_count = security.len(),
            duration_us = started.elapsed().as_micros(),
            "OpenAPI document assembled"
        );
        Ok(Value::Object(document))
    }

    fn operation(
        &self,
        route: &RouteMeta,
        schemas: &mut SchemaRegistry,
        security: &mut SecuritySchemeRegistry,
    ) -> Result<Value, SchemaError> {
        let operation_id = route.operation_id();
        let mut op = Map::new();

        if !route.tags.is_empty() {
            op.insert(
                "tags".to_string(),
                Value::Array(route.tags.iter().cloned().map(Value::String).collect()),
            );
        }
        op.insert("summary".to_string(), Value::String(route.summary()));
        if let Some(description) = &route.description {
            op.insert("description".to_string(), Value::String(description.clone()));
        }
        op.insert("operationId".to_string(), Value::String(operation_id.clone()));

        // Path parameters are documented even when hidden; the path string names them.
        let parameters = route
            .parameters
            .iter()
            .filter(|p| match p.source {
                ParamSource::Path => true,
                ParamSource::Body => false,
                _ => p.include_in_schema,
            })
            .map(|p| parameter_object(p, &operation_id, schemas))
            .collect::<Result<Vec<_>, _>>()?;
        if !parameters.is_empty() {
            op.insert("parameters".to_string(), Value::Array(parameters));
        }

        if let Some(body) = request_body(route, &operation_id, schemas)? {
            op.insert("requestBody".to_string(), body);
        }

        op.insert("responses".to_string(), responses(route, &operation_id, schemas)?);
        op.insert("deprecated".to_string(), Value::Bool(route.deprecated));

        if !route.security.is_empty() {
            let mut requirements = Vec::with_capacity(route.security.len());
            for scheme in &route.security {
                let id = security.register(scheme)?;
                let mut requirement = Map::new();
                requirement.insert(id, scheme.to_openapi());
                requirements.push(Value::Object(requirement));
            }
            op.insert("security".to_string(), Value::Array(requirements));
        }

        Ok(Value::Object(op))
    }
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value, SchemaError> {
    serde_json::to_value(value).map_err(|e| SchemaError::Serialization(e.to_string()))
}

fn parameter_object(
    p: &ParameterDescriptor,
    operation_id: &str,
    schemas: &mut SchemaRegistry,
) -> Result<Value, SchemaError> {
    let context = format!("{operation_id}.{}", p.name);
    let mut schema = schemas.type_schema(&p.ty, &context)?;
    let title = p.title.clone().unwrap_or_else(|| title_case(p.wire_name()));
    decorate(&mut schema, &p.ty, &title, &p.constraints, p.default.as_ref(), None);
    if !p.examples.is_empty() {
        if let Value::Object(obj) = &mut schema {
            obj.insert("examples".to_string(), Value::Array(p.examples.clone()));
        }
    }

    let mut obj = Map::new();
    obj.insert("name".to_string(), Value::String(p.wire_name().to_string()));
    obj.insert("in".to_string(), Value::String(p.source.as_str().to_string()));
    obj.insert("required".to_string(), Value::Bool(p.is_required()));
    if let Some(description) = &p.description {
        obj.insert("description".to_string(), Value::String(description.clone()));
    }
    obj.insert("deprecated".to_string(), Value::Bool(p.deprecated));
    obj.insert("allowEmptyValue".to_string(), Value::Bool(false));
    obj.insert("allowReserved".to_string(), Value::Bool(false));
    obj.insert("schema".to_string(), schema);
    for (key, value) in &p.extensions {
        obj.insert(key.clone(), value.clone());
    }
    Ok(Value::Object(obj))
}

/// `requestBody` for the route, if it declares any body parameter.
///
/// A single non-embedded body uses its own schema. Otherwise the body fields
/// are wrapped into a synthesized `Body_<operationId>` model.
fn request_body(
    route: &RouteMeta,
    operation_id: &str,
    schemas: &mut SchemaRegistry,
) -> Result<Option<Value>, SchemaError> {
    let bodies: Vec<&ParameterDescriptor> = route
        .body_parameters()
        .filter(|p| p.include_in_schema)
        .collect();
    let Some(first) = bodies.first() else {
        return Ok(None);
    };

    let (schema, required) = if bodies.len() == 1 && !first.embed {
        let context = format!("{operation_id}.{}", first.name);
        let mut schema = schemas.type_schema(&first.ty, &context)?;
        if let Some(description) = &first.description {
            if let Value::Object(obj) = &mut schema {
                if !obj.contains_key("$ref") {
                    obj.insert("description".to_string(), Value::String(description.clone()));
                }
            }
        }
        (schema, first.is_required())
    } else {
        let name = format!("Body_{operation_id}");
        let mut properties = Map::new();
        let mut required_fields = Vec::new();
        for body in &bodies {
            let context = format!("{name}.{}", body.name);
            let mut schema = schemas.type_schema(&body.ty, &context)?;
            let title = body.title.clone().unwrap_or_else(|| title_case(body.wire_name()));
            decorate(
                &mut schema,
                &body.ty,
                &title,
                &body.constraints,
                body.default.as_ref(),
                body.description.as_deref(),
            );
            properties.insert(body.wire_name().to_string(), schema);
            if body.is_required() {
                required_fields.push(Value::String(body.wire_name().to_string()));
            }
        }
        let mut model = Map::new();
        model.insert("properties".to_string(), Value::Object(properties));
        model.insert("type".to_string(), Value::String("object".to_string()));
        let any_required = !required_fields.is_empty();
        if any_required {
            model.insert("required".to_string(), Value::Array(required_fields));
        }
        model.insert("title".to_string(), Value::String(name.clone()));
        schemas.insert_raw(&name, Value::Object(model))?;
        (schema_ref(&name), any_required)
    };

    let mut media = Map::new();
    media.insert("schema".to_string(), schema);
    let mut content = Map::new();
    content.insert(first.encoding.media_type().to_string(), Value::Object(media));

    let mut body = Map::new();
    body.insert("content".to_string(), Value::Object(content));
    body.insert("required".to_string(), Value::Bool(required));
    Ok(Some(Value::Object(body)))
}

fn responses(
    route: &RouteMeta,
    operation_id: &str,
    schemas: &mut SchemaRegistry,
) -> Result<Value, SchemaError> {
    let mut responses = Map::new();

    let mut success = Map::new();
    success.insert(
        "description".to_string(),
        Value::String("Successful response".to_string()),
    );
    if let Some(model) = &route.response_model {
        let schema = schemas.type_schema(model, &format!("{operation_id}.response"))?;
        success.insert("content".to_string(), content(&route.response_media_type, schema));
    }
    responses.insert(route.status_code.to_string(), Value::Object(success));

    for (status, spec) in &route.responses {
        let mut response = Map::new();
        response.insert("description".to_string(), Value::String(spec.description.clone()));
        if let Some(model) = &spec.model {
            let schema = schemas.type_schema(model, &format!("{operation_id}.{status}"))?;
            response.insert("content".to_string(), content(&spec.media_type, schema));
        }
        responses.insert(status.to_string(), Value::Object(response));
    }

    if route.can_fail_validation() {
        responses.insert("422".to_string(), validation_error_response());
    }
    Ok(Value::Object(responses))
}

fn content(media_type: &str, schema: Value) -> Value {
    let mut media = Map::new();
    media.insert("schema".to_string(), schema);
    let mut content = Map::new();
    content.insert(media_type.to_string(), Value::Object(media));
    Value::Object(content)
}
