//! # Constraint Validation
//!
//! A [`ConstraintValidator`] is compiled once per declared parameter when the
//! route is registered. Compilation turns the [`TypeSpec`] and [`Constraints`]
//! into a tree of checkers; every numeric, length and pattern constraint becomes
//! its own single-keyword `jsonschema` validator so that a failure maps back to
//! exactly one error type.
//!
//! At request time validation works in two steps:
//!
//! 1. **Coercion** - raw input (strings from the path, query, headers or form
//!    fields; arbitrary JSON from a body) is converted to the declared scalar
//!    type. Numeric strings become integers or numbers, the usual boolean
//!    spellings (`true`/`1`/`yes`/`on`, `false`/`0`/`no`/`off`) become booleans.
//!    Strings are strict: a JSON number is not accepted as a string.
//! 2. **Constraint checking** - the coerced value is run through the compiled
//!    keyword validators.
//!
//! Every failure is recorded as an [`ErrorDetail`]; nothing short-circuits, so
//! one request reports all of its problems at once.

use crate::model::{Constraints, TypeSpec};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::fmt;
use std::sync::Arc;

/// One element of an error location.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum LocItem {
    Key(String),
    Index(usize),
}

impl From<&str> for LocItem {
    fn from(key: &str) -> Self {
        LocItem::Key(key.to_string())
    }
}

impl From<String> for LocItem {
    fn from(key: String) -> Self {
        LocItem::Key(key)
    }
}

impl From<usize> for LocItem {
    fn from(index: usize) -> Self {
        LocItem::Index(index)
    }
}

impl fmt::Display for LocItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocItem::Key(key) => f.write_str(key),
            LocItem::Index(index) => write!(f, "{index}"),
        }
    }
}

/// A single input validation failure, rendered inside a 422 `detail` list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorDetail {
    pub loc: Vec<LocItem>,
    pub msg: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
}

impl ErrorDetail {
    pub fn new(loc: Vec<LocItem>, kind: impl Into<String>, msg: impl Into<String>) -> Self {
        ErrorDetail {
            loc,
            msg: msg.into(),
            kind: kind.into(),
            input: None,
        }
    }

    pub fn missing(loc: Vec<LocItem>) -> Self {
        Self::new(loc, "missing", "Field required")
    }

    #[must_use]
    pub fn with_input(mut self, input: Value) -> Self {
        self.input = Some(input);
        self
    }

    /// JSON object as it appears in the response body.
    pub fn to_value(&self) -> Value {
        let loc: Vec<Value> = self
            .loc
            .iter()
            .map(|item| match item {
                LocItem::Key(key) => Value::String(key.clone()),
                LocItem::Index(index) => Value::from(*index),
            })
            .collect();
        let mut obj = Map::new();
        obj.insert("loc".to_string(), Value::Array(loc));
        obj.insert("msg".to_string(), Value::String(self.msg.clone()));
        obj.insert("type".to_string(), Value::String(self.kind.clone()));
        if let Some(input) = &self.input {
            obj.insert("input".to_string(), input.clone());
        }
        Value::Object(obj)
    }

    /// Last element of `loc`, usually the parameter or field name.
    pub fn field(&self) -> Option<String> {
        self.loc.last().map(ToString::to_string)
    }
}

/// One compiled keyword and the error it produces.
#[derive(Clone)]
struct KeywordCheck {
    validator: Arc<jsonschema::Validator>,
    kind: &'static str,
    msg: String,
}

impl fmt::Debug for KeywordCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeywordCheck").field("kind", &self.kind).finish()
    }
}

#[derive(Debug, Clone)]
struct FieldChecker {
    name: String,
    default: Option<Value>,
    checker: Checker,
}

#[derive(Debug, Clone)]
enum Checker {
    Str(Vec<KeywordCheck>),
    Int(Vec<KeywordCheck>),
    Num(Vec<KeywordCheck>),
    Bool,
    Array {
        items: Box<Checker>,
        checks: Vec<KeywordCheck>,
    },
    Optional(Box<Checker>),
    Model {
        name: String,
        fields: Vec<FieldChecker>,
    },
    File,
    Schema(Arc<jsonschema::Validator>),
    Any,
}

/// Compiled coercion and constraint checks for one declared value.
#[derive(Debug, Clone)]
pub struct ConstraintValidator {
    root: Checker,
}

impl ConstraintValidator {
    /// Compile the checks for `ty` with top-level `constraints`.
    ///
    /// # Errors
    ///
    /// A human-readable reason when a constraint does not apply to the type or
    /// a pattern/inline schema is not valid.
    pub fn compile(ty: &TypeSpec, constraints: &Constraints) -> Result<Self, String> {
        Ok(ConstraintValidator {
            root: compile(ty, constraints)?,
        })
    }

    /// Coerce and validate `value`, reporting failures under `loc`.
    pub fn validate(&self, value: Value, loc: &[LocItem]) -> Result<Value, Vec<ErrorDetail>> {
        let mut errors = Vec::new();
        let mut path = loc.to_vec();
        match self.root.check(value, &mut path, &mut errors) {
            Some(value) if errors.is_empty() => Ok(value),
            _ => Err(errors),
        }
    }
}

fn compile(ty: &TypeSpec, c: &Constraints) -> Result<Checker, String> {
    match ty {
        TypeSpec::String => {
            reject(c.has_numeric() || c.has_items(), "string", c)?;
            Ok(Checker::Str(string_checks(c)?))
        }
        TypeSpec::Integer => {
            reject(c.has_string() || c.has_items(), "integer", c)?;
            Ok(Checker::Int(numeric_checks(c)?))
        }
        TypeSpec::Number => {
            reject(c.has_string() || c.has_items(), "number", c)?;
            Ok(Checker::Num(numeric_checks(c)?))
        }
        TypeSpec::Boolean => {
            reject(!c.is_empty(), "boolean", c)?;
            Ok(Checker::Bool)
        }
        TypeSpec::Array(inner) => {
            reject(c.has_numeric() || c.has_string(), "array", c)?;
            Ok(Checker::Array {
                items: Box::new(compile(inner, &Constraints::default())?),
                checks: item_checks(c)?,
            })
        }
        TypeSpec::Optional(inner) => Ok(Checker::Optional(Box::new(compile(inner, c)?))),
        TypeSpec::Model(def) => {
            reject(!c.is_empty(), def.name(), c)?;
            let fields = def
                .fields()
                .iter()
                .map(|field| {
                    let checker = compile(&field.ty, &field.constraints)
                        .map_err(|e| format!("{}.{}: {e}", def.name(), field.name))?;
                    Ok(FieldChecker {
                        name: field.name.clone(),
                        default: field.default.clone(),
                        checker,
                    })
                })
                .collect::<Result<Vec<_>, String>>()?;
            Ok(Checker::Model {
                name: def.name().to_string(),
                fields,
            })
        }
        TypeSpec::File => Ok(Checker::File),
        TypeSpec::Json(schema) => {
            let validator = jsonschema::validator_for(schema)
                .map_err(|e| format!("invalid inline schema: {e}"))?;
            Ok(Checker::Schema(Arc::new(validator)))
        }
        TypeSpec::Any | TypeSpec::Opaque(_) => Ok(Checker::Any),
    }
}

fn reject(condition: bool, type_name: &str, c: &Constraints) -> Result<(), String> {
    if condition {
        Err(format!("constraints {c:?} do not apply to {type_name} values"))
    } else {
        Ok(())
    }
}

fn keyword(schema: Value, kind: &'static str, msg: String) -> Result<KeywordCheck, String> {
    let validator = jsonschema::validator_for(&schema)
        .map_err(|e| format!("invalid constraint {schema}: {e}"))?;
    Ok(KeywordCheck {
        validator: Arc::new(validator),
        kind,
        msg,
    })
}

fn numeric_checks(c: &Constraints) -> Result<Vec<KeywordCheck>, String> {
    let mut checks = Vec::new();
    if let Some(gt) = c.gt {
        checks.push(keyword(
            json!({ "exclusiveMinimum": gt }),
            "greater_than",
            format!("Input should be greater than {gt}"),
        )?);
    }
    if let Some(ge) = c.ge {
        checks.push(keyword(
            json!({ "minimum": ge }),
            "greater_than_equal",
            format!("Input should be greater than or equal to {ge}"),
        )?);
    }
    if let Some(lt) = c.lt {
        checks.push(keyword(
            json!({ "exclusiveMaximum": lt }),
            "less_than",
            format!("Input should be less than {lt}"),
        )?);
    }
    if let Some(le) = c.le {
        checks.push(keyword(
            json!({ "maximum": le }),
            "less_than_equal",
            format!("Input should be less than or equal to {le}"),
        )?);
    }
    if let Some(step) = c.multiple_of {
        if step <= 0.0 {
            return Err(format!("multiple_of must be positive, got {step}"));
        }
        checks.push(keyword(
            json!({ "multipleOf": step }),
            "multiple_of",
            format!("Input should be a multiple of {step}"),
        )?);
    }
    Ok(checks)
}

fn string_checks(c: &Constraints) -> Result<Vec<KeywordCheck>, String> {
    let mut checks = Vec::new();
    if let Some(min) = c.min_length {
        checks.push(keyword(
            json!({ "minLength": min }),
            "string_too_short",
            format!("String should have at least {min} {}", plural(min, "character")),
        )?);
    }
    if let Some(max) = c.max_length {
        checks.push(keyword(
            json!({ "maxLength": max }),
            "string_too_long",
            format!("String should have at most {max} {}", plural(max, "character")),
        )?);
    }
    if let Some(pattern) = &c.pattern {
        checks.push(keyword(
            json!({ "pattern": pattern }),
            "string_pattern_mismatch",
            format!("String should match pattern '{pattern}'"),
        )?);
    }
    Ok(checks)
}

fn item_checks(c: &Constraints) -> Result<Vec<KeywordCheck>, String> {
    let mut checks = Vec::new();
    if let Some(min) = c.min_items {
        checks.push(keyword(
            json!({ "minItems": min }),
            "too_short",
            format!("List should have at least {min} {}", plural(min, "item")),
        )?);
    }
    if let Some(max) = c.max_items {
        checks.push(keyword(
            json!({ "maxItems": max }),
            "too_long",
            format!("List should have at most {max} {}", plural(max, "item")),
        )?);
    }
    Ok(checks)
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        word.to_string()
    } else {
        format!("{word}s")
    }
}

impl Checker {
    fn check(
        &self,
        value: Value,
        loc: &mut Vec<LocItem>,
        errors: &mut Vec<ErrorDetail>,
    ) -> Option<Value> {
        match self {
            Checker::Optional(inner) => {
                if value.is_null() {
                    Some(Value::Null)
                } else {
                    inner.check(value, loc, errors)
                }
            }
            Checker::Str(checks) => {
                if value.is_string() {
                    run_checks(value, checks, loc, errors)
                } else {
                    fail(value, loc, errors, "string_type", "Input should be a valid string")
                }
            }
            Checker::Int(checks) => match coerce_int(&value) {
                Ok(coerced) => run_checks(coerced, checks, loc, errors),
                Err((kind, msg)) => fail(value, loc, errors, kind, msg),
            },
            Checker::Num(checks) => match coerce_number(&value) {
                Some(coerced) => run_checks(coerced, checks, loc, errors),
                None => fail(
                    value,
                    loc,
                    errors,
                    "float_parsing",
                    "Input should be a valid number, unable to parse string as a number",
                ),
            },
            Checker::Bool => match coerce_bool(&value) {
                Some(flag) => Some(Value::Bool(flag)),
                None => fail(
                    value,
                    loc,
                    errors,
                    "bool_parsing",
                    "Input should be a valid boolean, unable to interpret input",
                ),
            },
            Checker::Array { items, checks } => {
                let elements = match value {
                    Value::Array(elements) => elements,
                    other => {
                        return fail(other, loc, errors, "list_type", "Input should be a valid list")
                    }
                };
                let before = errors.len();
                let mut out = Vec::with_capacity(elements.len());
                for (index, element) in elements.into_iter().enumerate() {
                    loc.push(LocItem::Index(index));
                    if let Some(v) = items.check(element, loc, errors) {
                        out.push(v);
                    }
                    loc.pop();
                }
                if errors.len() > before {
                    return None;
                }
                run_checks(Value::Array(out), checks, loc, errors)
            }
            Checker::Model { name, fields } => {
                let mut obj = match value {
                    Value::Object(obj) => obj,
                    other => {
                        let msg = format!("Input should be a valid dictionary or instance of {name}");
                        return fail(other, loc, errors, "model_type", &msg);
                    }
                };
                let before = errors.len();
                let mut out = Map::new();
                for field in fields {
                    loc.push(LocItem::Key(field.name.clone()));
                    match (obj.remove(&field.name), &field.default) {
                        (Some(raw), _) => {
                            if let Some(v) = field.checker.check(raw, loc, errors) {
                                out.insert(field.name.clone(), v);
                            }
                        }
                        (None, Some(default)) => {
                            out.insert(field.name.clone(), default.clone());
                        }
                        (None, None) => errors.push(ErrorDetail::missing(loc.clone())),
                    }
                    loc.pop();
                }
                (errors.len() == before).then_some(Value::Object(out))
            }
            Checker::File => {
                if value.get("filename").is_some() {
                    Some(value)
                } else {
                    fail(value, loc, errors, "upload_file", "Expected an uploaded file")
                }
            }
            Checker::Schema(validator) => {
                if validator.is_valid(&value) {
                    Some(value)
                } else {
                    fail(
                        value,
                        loc,
                        errors,
                        "json_schema",
                        "Input does not match the declared schema",
                    )
                }
            }
            Checker::Any => Some(value),
        }
    }
}

fn fail(
    input: Value,
    loc: &[LocItem],
    errors: &mut Vec<ErrorDetail>,
    kind: &str,
    msg: &str,
) -> Option<Value> {
    errors.push(ErrorDetail::new(loc.to_vec(), kind, msg).with_input(input));
    None
}

fn run_checks(
    value: Value,
    checks: &[KeywordCheck],
    loc: &[LocItem],
    errors: &mut Vec<ErrorDetail>,
) -> Option<Value> {
    let mut ok = true;
    for check in checks {
        if !check.validator.is_valid(&value) {
            errors.push(
                ErrorDetail::new(loc.to_vec(), check.kind, check.msg.clone())
                    .with_input(value.clone()),
            );
            ok = false;
        }
    }
    ok.then_some(value)
}

fn coerce_int(value: &Value) -> Result<Value, (&'static str, &'static str)> {
    match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value.clone()),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.is_finite() && f.fract() == 0.0 => {
                // i64::MAX is not representable as f64; the bound is exclusive.
                if f >= i64::MIN as f64 && f < i64::MAX as f64 {
                    Ok(Value::from(f as i64))
                } else {
                    Err((
                        "int_parsing",
                        "Input should be a valid integer, got a number outside the integer range",
                    ))
                }
            }
            _ => Err((
                "int_from_float",
                "Input should be a valid integer, got a number with a fractional part",
            )),
        },
        Value::String(s) => s.trim().parse::<i64>().map(Value::from).map_err(|_| {
            (
                "int_parsing",
                "Input should be a valid integer, unable to parse string as an integer",
            )
        }),
        _ => Err(("int_type", "Input should be a valid integer")),
    }
}

fn coerce_number(value: &Value) -> Option<Value> {
    match value {
        Value::Number(_) => Some(value.clone()),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                return Some(Value::from(i));
            }
            s.parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(Value::from)
        }
        _ => None,
    }
}

fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" | "t" | "y" => Some(true),
            "false" | "0" | "no" | "off" | "f" | "n" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldDef, ModelDef};

    fn loc(items: &[&str]) -> Vec<LocItem> {
        items.iter().map(|s| LocItem::from(*s)).collect()
    }

    #[test]
    fn integer_strings_are_coerced() {
        let v = ConstraintValidator::compile(&TypeSpec::Integer, &Constraints::default()).unwrap();
        assert_eq!(v.validate(json!("42"), &loc(&["query", "n"])).unwrap(), json!(42));
        let errs = v.validate(json!("4x"), &loc(&["query", "n"])).unwrap_err();
        assert_eq!(errs[0].kind, "int_parsing");
        assert_eq!(errs[0].loc, loc(&["query", "n"]));
        assert_eq!(errs[0].input, Some(json!("4x")));
    }

    #[test]
    fn whole_floats_within_range_become_integers() {
        let v = ConstraintValidator::compile(&TypeSpec::Integer, &Constraints::default()).unwrap();
        assert_eq!(v.validate(json!(3.0), &[]).unwrap(), json!(3));
        assert_eq!(v.validate(json!(3.5), &[]).unwrap_err()[0].kind, "int_from_float");
        for huge in [1e20, -1e20, 9.3e18] {
            let errs = v.validate(json!(huge), &loc(&["body", "n"])).unwrap_err();
            assert_eq!(errs[0].kind, "int_parsing");
            assert_eq!(errs[0].input, Some(json!(huge)));
        }
    }

    #[test]
    fn every_failed_bound_is_reported() {
        let c = Constraints {
            gt: Some(10.0),
            multiple_of: Some(3.0),
            ..Constraints::default()
        };
        let v = ConstraintValidator::compile(&TypeSpec::Integer, &c).unwrap();
        let errs = v.validate(json!(4), &[]).unwrap_err();
        let kinds: Vec<_> = errs.iter().map(|e| e.kind.as_str()).collect();
        assert_eq!(kinds, vec!["greater_than", "multiple_of"]);
        assert_eq!(errs[0].msg, "Input should be greater than 10");
    }

    #[test]
    fn string_length_messages() {
        let c = Constraints {
            min_length: Some(3),
            ..Constraints::default()
        };
        let v = ConstraintValidator::compile(&TypeSpec::String, &c).unwrap();
        let errs = v.validate(json!("ab"), &[]).unwrap_err();
        assert_eq!(errs[0].kind, "string_too_short");
        assert_eq!(errs[0].msg, "String should have at least 3 characters");
    }

    #[test]
    fn strings_are_strict() {
        let v = ConstraintValidator::compile(&TypeSpec::String, &Constraints::default()).unwrap();
        let errs = v.validate(json!(123), &[]).unwrap_err();
        assert_eq!(errs[0].kind, "string_type");
    }

    #[test]
    fn booleans_accept_common_spellings() {
        let v = ConstraintValidator::compile(&TypeSpec::Boolean, &Constraints::default()).unwrap();
        for raw in ["true", "1", "yes", "on"] {
            assert_eq!(v.validate(json!(raw), &[]).unwrap(), json!(true));
        }
        for raw in ["false", "0", "no", "off"] {
            assert_eq!(v.validate(json!(raw), &[]).unwrap(), json!(false));
        }
        assert_eq!(v.validate(json!("maybe"), &[]).unwrap_err()[0].kind, "bool_parsing");
    }

    #[test]
    fn array_items_are_validated_with_index() {
        let ty = TypeSpec::array(TypeSpec::Integer);
        let v = ConstraintValidator::compile(&ty, &Constraints::default()).unwrap();
        assert_eq!(v.validate(json!(["1", "2"]), &[]).unwrap(), json!([1, 2]));
        let errs = v.validate(json!(["1", "x", "y"]), &loc(&["query", "ids"])).unwrap_err();
        assert_eq!(errs.len(), 2);
        assert_eq!(
            errs[0].loc,
            vec![LocItem::from("query"), LocItem::from("ids"), LocItem::Index(1)]
        );
    }

    #[test]
    fn model_fields_report_missing_and_apply_defaults() {
        let model = ModelDef::new("User")
            .field("name", TypeSpec::String)
            .field("email", TypeSpec::optional(TypeSpec::String))
            .with_field(FieldDef::new("age", TypeSpec::Integer).default(json!(18)));
        let v = ConstraintValidator::compile(&model.into_type(), &Constraints::default()).unwrap();

        let ok = v
            .validate(json!({"name": "ada", "email": null}), &loc(&["body"]))
            .unwrap();
        assert_eq!(ok, json!({"name": "ada", "email": null, "age": 18}));

        let errs = v.validate(json!({}), &loc(&["body"])).unwrap_err();
        assert_eq!(errs.len(), 2);
        assert_eq!(errs[0].loc, loc(&["body", "name"]));
        assert_eq!(errs[1].loc, loc(&["body", "email"]));
        assert!(errs.iter().all(|e| e.kind == "missing"));
    }

    #[test]
    fn constraints_must_match_type() {
        let c = Constraints {
            min_length: Some(1),
            ..Constraints::default()
        };
        assert!(ConstraintValidator::compile(&TypeSpec::Integer, &c).is_err());
        let c = Constraints {
            pattern: Some("(".to_string()),
            ..Constraints::default()
        };
        assert!(ConstraintValidator::compile(&TypeSpec::String, &c).is_err());
    }

    #[test]
    fn error_detail_serializes_like_response_body() {
        let detail = ErrorDetail::missing(vec![LocItem::from("body"), LocItem::Index(0)]);
        assert_eq!(
            serde_json::to_value(&detail).unwrap(),
            json!({"loc": ["body", 0], "msg": "Field required", "type": "missing"})
        );
        assert_eq!(detail.to_value(), serde_json::to_value(&detail).unwrap());
    }
}
