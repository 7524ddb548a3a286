#![allow(dead_code)]

pub mod fixtures {
    use gantry::prelude::*;
    use serde_json::{json, Map, Value};

    /// Echo every bound parameter back as the response body.
    pub fn echo_params(req: HandlerRequest) -> HandlerResponse {
        let body: Map<String, Value> = req
            .params
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        HandlerResponse::ok(Value::Object(body))
    }

    pub fn noop(_: HandlerRequest) -> HandlerResponse {
        HandlerResponse::empty(204)
    }

    pub fn user_model() -> ModelDef {
        ModelDef::new("User")
            .field("name", TypeSpec::String)
            .field("email", TypeSpec::optional(TypeSpec::String))
    }

    pub fn item_model() -> ModelDef {
        ModelDef::new("Item")
            .field("name", TypeSpec::String)
            .with_field(FieldDef::new("price", TypeSpec::Number).gt(0.0))
            .with_field(FieldDef::new("tags", TypeSpec::array(TypeSpec::String)).default(json!([])))
    }

    pub fn build(routes: Vec<Route>) -> App {
        AppBuilder::new(AppConfig::new("Test", "1.0.0"))
            .routes(routes)
            .build()
            .expect("app should build")
    }
}

pub mod temp_files {
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Write `content` to a temporary file ending in `.{ext}`.
    pub fn with_extension(content: &str, ext: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new()
            .prefix("gantry_test_")
            .suffix(&format!(".{ext}"))
            .tempfile()
            .expect("create temp file");
        file.write_all(content.as_bytes()).expect("write temp file");
        file
    }
}
