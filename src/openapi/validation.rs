//! The two component schemas describing a 422 response body.

use serde_json::{json, Value};

pub const REF_PREFIX: &str = "#/components/schemas/";

pub const VALIDATION_ERROR: &str = "ValidationError";
pub const HTTP_VALIDATION_ERROR: &str = "HTTPValidationError";

pub fn schema_ref(name: &str) -> Value {
    json!({ "$ref": format!("{REF_PREFIX}{name}") })
}

pub fn validation_error_schema() -> Value {
    json!({
        "properties": {
            "loc": {
                "items": { "anyOf": [{ "type": "string" }, { "type": "integer" }] },
                "type": "array",
                "title": "Location"
            },
            "msg": { "type": "string", "title": "Message" },
            "type": { "type": "string", "title": "Error Type" }
        },
        "type": "object",
        "required": ["loc", "msg", "type"],
        "title": VALIDATION_ERROR
    })
}

pub fn http_validation_error_schema() -> Value {
    json!({
        "properties": {
            "detail": {
                "items": schema_ref(VALIDATION_ERROR),
                "type": "array",
                "title": "Detail"
            }
        },
        "type": "object",
        "title": HTTP_VALIDATION_ERROR
    })
}

/// The `"422"` response object attached to operations with inputs.
pub fn validation_error_response() -> Value {
    json!({
        "description": "Validation Error",
        "content": {
            "application/json": { "schema": schema_ref(HTTP_VALIDATION_ERROR) }
        }
    })
}
