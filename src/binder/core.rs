use super::form::{
    parse_boundary, parse_form_data, parse_multipart, parse_urlencoded, FormValue,
};
use super::request::RequestData;
use crate::model::TypeSpec;
use crate::params::{
    BodyEncoding, ConstraintValidator, ErrorDetail, LocItem, ParamSource, ParameterDescriptor,
};
use crate::router::{path_template_params, ParamVec};
use crate::validator::ValidationIssue;
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Bound parameter values keyed by binding name, in declaration order.
pub type BoundParams = IndexMap<String, Value>;

#[derive(Debug)]
struct CompiledParam {
    descriptor: ParameterDescriptor,
    validator: ConstraintValidator,
    lookup: String,
}

/// Parsed request body, narrowed by the route's declared encoding.
enum ParsedBody {
    Empty,
    Json(Value),
    /// Form fields by name, plus every uploaded file in part order.
    Form {
        fields: IndexMap<String, Value>,
        files: Vec<Value>,
    },
    /// Could not be decoded; an error has already been recorded.
    Invalid,
}

enum Extracted {
    Value(Value),
    Missing,
    Skip,
}

/// Resolves a route's declared parameters from a request.
///
/// Constructed once per route at registration time; all descriptor checks and
/// constraint compilation happen in [`ParameterBinder::new`]. The binder is
/// immutable afterwards and cheap to clone.
#[derive(Debug, Clone)]
pub struct ParameterBinder {
    params: Arc<[CompiledParam]>,
    body_encoding: Option<BodyEncoding>,
    single_body: bool,
}

impl ParameterBinder {
    /// Validate and compile the descriptors of one route.
    ///
    /// # Arguments
    ///
    /// * `location` - Route label used in issue messages, e.g. `GET /items/{id}`
    /// * `path_template` - The route's path pattern
    /// * `descriptors` - Declared parameters in declaration order
    ///
    /// # Errors
    ///
    /// Every configuration problem found, as [`ValidationIssue`]s:
    /// duplicate names, path parameters that are not in the template (and the
    /// reverse), more than one non-embedded body, mixed body encodings, models
    /// or files outside the body, and constraints that do not compile.
    pub fn new(
        location: &str,
        path_template: &str,
        descriptors: Vec<ParameterDescriptor>,
    ) -> Result<Self, Vec<ValidationIssue>> {
        let mut issues = Vec::new();
        let template_params = path_template_params(path_template);
        let mut seen: HashMap<String, ParamSource> = HashMap::new();
        let mut compiled = Vec::with_capacity(descriptors.len());
        let mut body_encoding: Option<BodyEncoding> = None;
        let mut body_count = 0usize;
        let mut unembedded_bodies = 0usize;

        for descriptor in descriptors {
            if let Some(previous) = seen.insert(descriptor.name.clone(), descriptor.source) {
                issues.push(ValidationIssue::new(
                    location,
                    "AmbiguousParameter",
                    format!(
                        "parameter `{}` is declared in both {} and {}",
                        descriptor.name, previous, descriptor.source
                    ),
                ));
                continue;
            }

            match descriptor.source {
                ParamSource::Path => {
                    if !template_params.iter().any(|p| p == descriptor.wire_name()) {
                        issues.push(ValidationIssue::new(
                            location,
                            "UnknownPathParameter",
                            format!(
                                "path parameter `{}` does not appear in `{path_template}`",
                                descriptor.wire_name()
                            ),
                        ));
                    }
                }
                ParamSource::Body => {
                    body_count += 1;
                    if !descriptor.embed {
                        unembedded_bodies += 1;
                    }
                    match body_encoding {
                        Some(existing) if existing != descriptor.encoding => {
                            issues.push(ValidationIssue::new(
                                location,
                                "ConflictingBodyEncoding",
                                format!(
                                    "body parameter `{}` uses {} but another uses {}",
                                    descriptor.name,
                                    descriptor.encoding.media_type(),
                                    existing.media_type()
                                ),
                            ));
                        }
                        _ => body_encoding = Some(descriptor.encoding),
                    }
                }
                _ => {}
            }

            if descriptor.source != ParamSource::Body
                && matches!(
                    descriptor.ty.unwrap_optional(),
                    TypeSpec::Model(_) | TypeSpec::File
                )
            {
                issues.push(ValidationIssue::new(
                    location,
                    "UnsupportedParameterType",
                    format!(
                        "{} parameter `{}` cannot have type {}",
                        descriptor.source,
                        descriptor.name,
                        descriptor.ty.describe()
                    ),
                ));
                continue;
            }

            match ConstraintValidator::compile(&descriptor.ty, &descriptor.constraints) {
                Ok(validator) => compiled.push(CompiledParam {
                    lookup: descriptor.lookup_key(),
                    descriptor,
                    validator,
                }),
                Err(reason) => issues.push(ValidationIssue::new(
                    location,
                    "InvalidConstraint",
                    format!("parameter `{}`: {reason}", descriptor.name),
                )),
            }
        }

        for placeholder in &template_params {
            let declared = compiled.iter().any(|p| {
                p.descriptor.source == ParamSource::Path && p.descriptor.wire_name() == placeholder
            });
            if !declared {
                issues.push(ValidationIssue::new(
                    location,
                    "UndeclaredPathParameter",
                    format!("`{{{placeholder}}}` in `{path_template}` has no path parameter"),
                ));
            }
        }

        if unembedded_bodies > 0 && body_count > 1 {
            issues.push(ValidationIssue::new(
                location,
                "AmbiguousBody",
                format!(
                    "{body_count} body parameters declared but {unembedded_bodies} are not embedded"
                ),
            ));
        }

        if !issues.is_empty() {
            return Err(issues);
        }

        debug!(
            location = %location,
            param_count = compiled.len(),
            has_body = body_encoding.is_some(),
            "Parameter binder compiled"
        );

        Ok(ParameterBinder {
            params: compiled.into(),
            body_encoding,
            single_body: body_count == 1,
        })
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &ParameterDescriptor> {
        self.params.iter().map(|p| &p.descriptor)
    }

    pub fn body_encoding(&self) -> Option<BodyEncoding> {
        self.body_encoding
    }

    /// Bind every declared parameter from `request`.
    ///
    /// `path_params` are the percent-decoded captures produced by the router.
    ///
    /// # Errors
    ///
    /// All validation failures across all parameters; binding never stops at
    /// the first one.
    pub fn bind(
        &self,
        request: &RequestData,
        path_params: &ParamVec,
    ) -> Result<BoundParams, Vec<ErrorDetail>> {
        let mut errors = Vec::new();
        let mut bound = BoundParams::with_capacity(self.params.len());

        let body = match self.body_encoding {
            Some(encoding) => match parse_body(request, encoding) {
                Ok(body) => body,
                Err(detail) => {
                    errors.push(detail);
                    ParsedBody::Invalid
                }
            },
            None => ParsedBody::Empty,
        };

        for param in self.params.iter() {
            let d = &param.descriptor;
            let loc = base_loc(d);

            match extract(param, request, path_params, &body, self.single_body) {
                Extracted::Skip => {}
                Extracted::Missing => {
                    if d.is_required() {
                        let mut missing_loc = vec![LocItem::from(d.source.as_str())];
                        missing_loc.push(LocItem::from(d.wire_name()));
                        errors.push(ErrorDetail::missing(missing_loc));
                    } else {
                        bound.insert(d.name.clone(), d.default.clone().unwrap_or(Value::Null));
                    }
                }
                Extracted::Value(Value::Null) if d.allow_none => {
                    bound.insert(d.name.clone(), Value::Null);
                }
                Extracted::Value(raw) => match param.validator.validate(raw, &loc) {
                    Ok(value) => {
                        bound.insert(d.name.clone(), value);
                    }
                    Err(mut failures) => errors.append(&mut failures),
                },
            }
        }

        if errors.is_empty() {
            Ok(bound)
        } else {
            warn!(
                request_id = %request.request_id,
                error_count = errors.len(),
                fields = ?errors.iter().filter_map(ErrorDetail::field).collect::<Vec<_>>(),
                "Request parameters failed validation"
            );
            Err(errors)
        }
    }
}

/// Location prefix for values of `d`.
///
/// A non-embedded body maps to the whole payload, so its field errors sit
/// directly under `"body"`.
fn base_loc(d: &ParameterDescriptor) -> Vec<LocItem> {
    if d.source == ParamSource::Body && !d.embed {
        vec![LocItem::from("body")]
    } else {
        vec![LocItem::from(d.source.as_str()), LocItem::from(d.wire_name())]
    }
}

fn parse_body(request: &RequestData, encoding: BodyEncoding) -> Result<ParsedBody, ErrorDetail> {
    if request.body.is_empty() {
        return Ok(ParsedBody::Empty);
    }
    match encoding {
        BodyEncoding::Json => serde_json::from_slice::<Value>(&request.body)
            .map(ParsedBody::Json)
            .map_err(|e| {
                ErrorDetail::new(
                    vec![LocItem::from("body"), LocItem::from(e.column())],
                    "json_invalid",
                    format!("JSON decode error: {e}"),
                )
            }),
        BodyEncoding::UrlEncoded => Ok(ParsedBody::Form {
            fields: parse_form_data(parse_urlencoded(&request.body)),
            files: Vec::new(),
        }),
        BodyEncoding::Multipart => {
            let entries = request
                .content_type()
                .ok_or(super::form::FormError::MissingBoundary)
                .and_then(parse_boundary)
                .and_then(|boundary| parse_multipart(&request.body, &boundary))
                .map_err(|e| {
                    ErrorDetail::new(
                        vec![LocItem::from("body")],
                        "multipart_invalid",
                        format!("Invalid multipart body: {e}"),
                    )
                })?;
            let files = entries
                .iter()
                .filter_map(|(_, entry)| match entry {
                    FormValue::File(file) => Some(file.to_value()),
                    FormValue::Text(_) => None,
                })
                .collect();
            Ok(ParsedBody::Form {
                fields: parse_form_data(entries),
                files,
            })
        }
    }
}

fn extract(
    param: &CompiledParam,
    request: &RequestData,
    path_params: &ParamVec,
    body: &ParsedBody,
    single_body: bool,
) -> Extracted {
    let d = &param.descriptor;
    let key = param.lookup.as_str();
    match d.source {
        ParamSource::Path => path_params
            .iter()
            .rev()
            .find(|(name, _)| name.as_ref() == key)
            .map_or(Extracted::Missing, |(_, v)| Extracted::Value(Value::String(v.clone()))),
        ParamSource::Query => {
            strings(d.ty.is_sequence(), request.get_query_all(key))
        }
        ParamSource::Header => {
            strings(d.ty.is_sequence(), request.get_header_all(key))
        }
        ParamSource::Cookie => request
            .get_cookie(key)
            .map_or(Extracted::Missing, |v| Extracted::Value(Value::String(v.to_string()))),
        ParamSource::Body => match body {
            ParsedBody::Invalid => Extracted::Skip,
            ParsedBody::Empty => Extracted::Missing,
            ParsedBody::Json(payload) if d.embed => match payload.get(key) {
                Some(value) => Extracted::Value(value.clone()),
                None => Extracted::Missing,
            },
            ParsedBody::Json(payload) => Extracted::Value(payload.clone()),
            ParsedBody::Form { fields, files } if d.embed => match fields.get(key) {
                Some(Value::Array(items)) => Extracted::Value(Value::Array(items.clone())),
                Some(value) if d.ty.is_sequence() => Extracted::Value(Value::Array(vec![value.clone()])),
                Some(value) => Extracted::Value(value.clone()),
                None if single_body && d.encoding == BodyEncoding::Multipart => {
                    unnamed_upload(&d.ty, fields, files)
                }
                None => Extracted::Missing,
            },
            ParsedBody::Form { fields, .. } => Extracted::Value(Value::Object(
                fields.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            )),
        },
    }
}

/// Fallback for the only multipart parameter of a route when no part carries
/// its name: a file takes the first uploaded file and a list takes every part.
fn unnamed_upload(
    ty: &TypeSpec,
    fields: &IndexMap<String, Value>,
    files: &[Value],
) -> Extracted {
    match ty.unwrap_optional() {
        TypeSpec::File => files
            .first()
            .map_or(Extracted::Missing, |file| Extracted::Value(file.clone())),
        TypeSpec::Array(_) if !fields.is_empty() => Extracted::Value(Value::Array(
            fields
                .values()
                .flat_map(|value| match value {
                    Value::Array(items) => items.clone(),
                    other => vec![other.clone()],
                })
                .collect(),
        )),
        _ => Extracted::Missing,
    }
}

fn strings(sequence: bool, values: Vec<&str>) -> Extracted {
    if values.is_empty() {
        return Extracted::Missing;
    }
    if sequence {
        Extracted::Value(Value::Array(
            values.into_iter().map(|v| Value::String(v.to_string())).collect(),
        ))
    } else {
        Extracted::Value(Value::String(values[0].to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use smallvec::smallvec;

    fn binder(path: &str, params: Vec<ParameterDescriptor>) -> ParameterBinder {
        ParameterBinder::new("test", path, params).unwrap()
    }

    #[test]
    fn query_defaults_apply_when_missing() {
        let b = binder(
            "/items",
            vec![
                ParameterDescriptor::query("limit", TypeSpec::Integer).default(json!(10)),
                ParameterDescriptor::query("q", TypeSpec::String).optional(),
            ],
        );
        let bound = b.bind(&RequestData::get("/items"), &ParamVec::new()).unwrap();
        assert_eq!(bound["limit"], json!(10));
        assert_eq!(bound["q"], Value::Null);
    }

    #[test]
    fn path_value_binds_as_string() {
        let b = binder(
            "/item/{id}",
            vec![ParameterDescriptor::path("id", TypeSpec::String)],
        );
        let params: ParamVec = smallvec![(Arc::from("id"), "42".to_string())];
        let bound = b.bind(&RequestData::get("/item/42"), &params).unwrap();
        assert_eq!(bound["id"], json!("42"));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let issues = ParameterBinder::new(
            "GET /x",
            "/x",
            vec![
                ParameterDescriptor::query("id", TypeSpec::String),
                ParameterDescriptor::header("id", TypeSpec::String),
            ],
        )
        .unwrap_err();
        assert_eq!(issues[0].kind, "AmbiguousParameter");
    }

    #[test]
    fn json_body_that_does_not_parse() {
        let b = binder(
            "/users",
            vec![ParameterDescriptor::body("user", TypeSpec::Any)],
        );
        let req = RequestData::post("/users").body("application/json", "{not json");
        let errors = b.bind(&req, &ParamVec::new()).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, "json_invalid");
        assert_eq!(errors[0].loc[0], LocItem::from("body"));
    }

    #[test]
    fn allow_none_accepts_explicit_null() {
        let b = binder(
            "/notes",
            vec![
                ParameterDescriptor::body("note", TypeSpec::String).embed().allow_none(),
                ParameterDescriptor::body("tag", TypeSpec::String).embed(),
            ],
        );
        let req = RequestData::post("/notes").json(&json!({"note": null, "tag": null}));
        let errors = b.bind(&req, &ParamVec::new()).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].loc, vec![LocItem::from("body"), LocItem::from("tag")]);
        assert_eq!(errors[0].kind, "string_type");
    }
}
