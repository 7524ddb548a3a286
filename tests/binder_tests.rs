#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Parameter binding through the full request pipeline
//!
//! Covers every parameter source, body encodings, aggregation of validation
//! failures into a single 422 and the startup checks on descriptors.

mod common;

use common::fixtures::{build, echo_params, item_model};
use gantry::binder::{ParameterBinder, RequestData};
use gantry::model::TypeSpec;
use gantry::params::ParameterDescriptor;
use gantry::route::Route;
use gantry::router::ParamVec;
use serde_json::{json, Value};
use std::sync::Arc;

fn locs(body: &Value) -> Vec<Value> {
    body["detail"]
        .as_array()
        .expect("detail list")
        .iter()
        .map(|d| d["loc"].clone())
        .collect()
}

#[test]
fn path_parameter_binds_as_declared() {
    let app = build(vec![Route::get("/item/{id}", "read_item", echo_params)
        .param(ParameterDescriptor::path("id", TypeSpec::String))]);
    let response = app.handle(RequestData::get("/item/42"));
    assert_eq!(response.status, 200);
    assert_eq!(response.body, json!({"id": "42"}));
}

#[test]
fn constrained_path_parameter_reports_its_location() {
    let app = build(vec![Route::get("/item/{id}", "read_item", echo_params)
        .param(ParameterDescriptor::path("id", TypeSpec::String).max_length(1))]);
    let response = app.handle(RequestData::get("/item/42"));
    assert_eq!(response.status, 422);
    assert_eq!(locs(&response.body), vec![json!(["path", "id"])]);
    assert_eq!(response.body["detail"][0]["type"], "string_too_long");
    assert_eq!(response.body["detail"][0]["input"], "42");
}

#[test]
fn path_parameter_is_percent_decoded_and_coerced() {
    let app = build(vec![
        Route::get("/files/{name}", "read_file", echo_params)
            .param(ParameterDescriptor::path("name", TypeSpec::String)),
        Route::get("/pages/{page}", "read_page", echo_params)
            .param(ParameterDescriptor::path("page", TypeSpec::Integer).ge(1.0)),
    ]);
    let response = app.handle(RequestData::get("/files/my%20notes.txt"));
    assert_eq!(response.body, json!({"name": "my notes.txt"}));

    let response = app.handle(RequestData::get("/pages/3"));
    assert_eq!(response.body, json!({"page": 3}));

    let response = app.handle(RequestData::get("/pages/zero"));
    assert_eq!(response.status, 422);
    assert_eq!(response.body["detail"][0]["type"], "int_parsing");
}

#[test]
fn every_missing_required_parameter_is_reported() {
    let app = build(vec![Route::get("/search", "search", echo_params).params([
        ParameterDescriptor::query("q", TypeSpec::String),
        ParameterDescriptor::header("x_token", TypeSpec::String),
        ParameterDescriptor::cookie("session", TypeSpec::String),
        ParameterDescriptor::query("limit", TypeSpec::Integer).default(json!(10)),
    ])]);
    let response = app.handle(RequestData::get("/search"));
    assert_eq!(response.status, 422);
    assert_eq!(
        locs(&response.body),
        vec![
            json!(["query", "q"]),
            json!(["header", "x_token"]),
            json!(["cookie", "session"]),
        ]
    );
    assert!(response.body["detail"]
        .as_array()
        .unwrap()
        .iter()
        .all(|d| d["type"] == "missing" && d["msg"] == "Field required"));
}

#[test]
fn headers_match_case_insensitively_with_underscores_as_dashes() {
    let app = build(vec![Route::get("/whoami", "whoami", echo_params).params([
        ParameterDescriptor::header("user_agent", TypeSpec::String),
        ParameterDescriptor::header("x_trace", TypeSpec::array(TypeSpec::String)).optional(),
    ])]);
    let request = RequestData::get("/whoami")
        .header("User-Agent", "curl/8.0")
        .header("X-Trace", "a")
        .header("X-Trace", "b");
    let response = app.handle(request);
    assert_eq!(
        response.body,
        json!({"user_agent": "curl/8.0", "x_trace": ["a", "b"]})
    );
}

#[test]
fn query_lists_and_aliases() {
    let app = build(vec![Route::get("/items", "list_items", echo_params).params([
        ParameterDescriptor::query("tags", TypeSpec::array(TypeSpec::String)).min_items(1),
        ParameterDescriptor::query("page_size", TypeSpec::Integer)
            .alias("pageSize")
            .default(json!(20)),
        ParameterDescriptor::query("first", TypeSpec::Boolean).default(json!(false)),
    ])]);
    let response = app.handle(RequestData::get("/items?tags=a&tags=b&pageSize=5&first=yes"));
    assert_eq!(response.status, 200);
    assert_eq!(
        response.body,
        json!({"tags": ["a", "b"], "page_size": 5, "first": true})
    );

    let response = app.handle(RequestData::get("/items?tags=a&page_size=5"));
    assert_eq!(response.body["page_size"], 20);
}

#[test]
fn cookies_bind_from_the_cookie_header() {
    let app = build(vec![Route::get("/me", "me", echo_params)
        .param(ParameterDescriptor::cookie("session", TypeSpec::String))]);
    let response = app.handle(RequestData::get("/me").header("Cookie", "theme=dark; session=abc123"));
    assert_eq!(response.body, json!({"session": "abc123"}));
}

#[test]
fn unembedded_json_body_maps_to_the_whole_payload() {
    let app = build(vec![Route::post("/items", "create_item", echo_params)
        .param(ParameterDescriptor::body("item", item_model().into_type()))]);

    let response = app.handle(RequestData::post("/items").json(&json!({"name": "Pen", "price": 2})));
    assert_eq!(response.status, 200);
    assert_eq!(
        response.body,
        json!({"item": {"name": "Pen", "price": 2, "tags": []}})
    );

    let response =
        app.handle(RequestData::post("/items").json(&json!({"price": 0, "tags": ["a", 1]})));
    assert_eq!(response.status, 422);
    assert_eq!(
        locs(&response.body),
        vec![
            json!(["body", "name"]),
            json!(["body", "price"]),
            json!(["body", "tags", 1]),
        ]
    );

    let response = app.handle(RequestData::post("/items"));
    assert_eq!(locs(&response.body), vec![json!(["body", "item"])]);
}

#[test]
fn embedded_bodies_read_their_own_keys() {
    let app = build(vec![Route::put("/items/{id}", "update_item", echo_params).params([
        ParameterDescriptor::path("id", TypeSpec::Integer),
        ParameterDescriptor::body("item", item_model().into_type()).embed(),
        ParameterDescriptor::body("importance", TypeSpec::Integer).embed().gt(0.0),
        ParameterDescriptor::body("note", TypeSpec::String).embed().allow_none(),
    ])]);
    let payload = json!({
        "item": {"name": "Pen", "price": 1.5},
        "importance": 5,
        "note": null
    });
    let response = app.handle(RequestData::put("/items/7").json(&payload));
    assert_eq!(response.status, 200);
    assert_eq!(response.body["importance"], 5);
    assert_eq!(response.body["note"], Value::Null);
    assert_eq!(response.body["item"]["name"], "Pen");

    let payload = json!({"item": {"name": "Pen", "price": 1.5}, "importance": 0, "note": "x"});
    let response = app.handle(RequestData::put("/items/7").json(&payload));
    assert_eq!(locs(&response.body), vec![json!(["body", "importance"])]);
    assert_eq!(response.body["detail"][0]["type"], "greater_than");
}

#[test]
fn malformed_json_is_a_single_error() {
    let app = build(vec![Route::post("/items", "create_item", echo_params)
        .param(ParameterDescriptor::body("item", item_model().into_type()))]);
    let response = app.handle(RequestData::post("/items").body("application/json", "{\"name\":"));
    assert_eq!(response.status, 422);
    let detail = response.body["detail"].as_array().unwrap();
    assert_eq!(detail.len(), 1);
    assert_eq!(detail[0]["type"], "json_invalid");
    assert_eq!(detail[0]["loc"][0], "body");
}

#[test]
fn form_fields_decode_json_scalars_and_accumulate() {
    let app = build(vec![Route::post("/login", "login", echo_params).params([
        ParameterDescriptor::form("username", TypeSpec::String),
        ParameterDescriptor::form("remember", TypeSpec::Boolean).default(json!(false)),
        ParameterDescriptor::form("scopes", TypeSpec::array(TypeSpec::String)),
        ParameterDescriptor::form("attempt", TypeSpec::Integer),
    ])]);
    let request = RequestData::post("/login").form([
        ("username", "alice"),
        ("remember", "true"),
        ("scopes", "read"),
        ("scopes", "write"),
        ("attempt", "3"),
    ]);
    let response = app.handle(request);
    assert_eq!(response.status, 200);
    assert_eq!(
        response.body,
        json!({
            "username": "alice",
            "remember": true,
            "scopes": ["read", "write"],
            "attempt": 3
        })
    );
}

#[test]
fn form_string_that_parses_as_json_number_is_not_a_string() {
    let app = build(vec![Route::post("/login", "login", echo_params)
        .param(ParameterDescriptor::form("username", TypeSpec::String))]);
    let response = app.handle(RequestData::post("/login").form([("username", "123")]));
    assert_eq!(response.status, 422);
    assert_eq!(response.body["detail"][0]["type"], "string_type");
    assert_eq!(response.body["detail"][0]["loc"], json!(["body", "username"]));
}

#[test]
fn multipart_files_and_fields() {
    let app = build(vec![Route::post("/upload", "upload", echo_params).params([
        ParameterDescriptor::file("document", TypeSpec::File),
        ParameterDescriptor::file("label", TypeSpec::String),
    ])]);
    let request = RequestData::post("/upload").multipart(
        &[("label", "invoice")],
        &[("document", "march.txt", b"hello".as_slice())],
    );
    let response = app.handle(request);
    assert_eq!(response.status, 200);
    assert_eq!(response.body["label"], "invoice");
    assert_eq!(response.body["document"]["filename"], "march.txt");
    assert_eq!(response.body["document"]["size"], 5);

    let response = app.handle(RequestData::post("/upload").multipart(&[("label", "x")], &[]));
    assert_eq!(locs(&response.body), vec![json!(["body", "document"])]);
}

#[test]
fn lone_upload_takes_parts_under_any_name() {
    let app = build(vec![Route::post("/upload", "upload", echo_params)
        .param(ParameterDescriptor::file("data", TypeSpec::File))]);
    let request = RequestData::post("/upload").multipart(
        &[("note", "ignored")],
        &[
            ("file", "first.csv", b"a,b".as_slice()),
            ("other", "second.csv", b"c,d,e".as_slice()),
        ],
    );
    let response = app.handle(request);
    assert_eq!(response.status, 200);
    assert_eq!(response.body["data"]["filename"], "first.csv");
    assert_eq!(response.body["data"]["size"], 3);

    let response = app.handle(RequestData::post("/upload").multipart(&[("note", "x")], &[]));
    assert_eq!(locs(&response.body), vec![json!(["body", "data"])]);

    let app = build(vec![Route::post("/batch", "batch", echo_params)
        .param(ParameterDescriptor::file("uploads", TypeSpec::array(TypeSpec::File)))]);
    let request = RequestData::post("/batch").multipart(
        &[],
        &[
            ("first", "a.txt", b"a".as_slice()),
            ("second", "b.txt", b"bb".as_slice()),
        ],
    );
    let response = app.handle(request);
    assert_eq!(response.status, 200);
    let uploads = response.body["uploads"].as_array().unwrap();
    assert_eq!(uploads.len(), 2);
    assert_eq!(uploads[0]["filename"], "a.txt");
    assert_eq!(uploads[1]["size"], 2);
}

#[test]
fn integers_beyond_the_64_bit_range_are_rejected() {
    let app = build(vec![Route::post("/n", "store_n", echo_params)
        .param(ParameterDescriptor::body("n", TypeSpec::Integer).embed())]);
    let response = app.handle(RequestData::post("/n").body("application/json", r#"{"n": 1e20}"#));
    assert_eq!(response.status, 422);
    assert_eq!(locs(&response.body), vec![json!(["body", "n"])]);
    assert_eq!(response.body["detail"][0]["type"], "int_parsing");

    let response = app.handle(RequestData::post("/n").body("application/json", r#"{"n": 4.0}"#));
    assert_eq!(response.status, 200);
    assert_eq!(response.body["n"], 4);
}

#[test]
fn misconfigured_descriptors_are_rejected_together() {
    let issues = ParameterBinder::new(
        "POST /a/{id}",
        "/a/{id}",
        vec![
            ParameterDescriptor::query("id", TypeSpec::String),
            ParameterDescriptor::path("id", TypeSpec::String),
            ParameterDescriptor::path("other", TypeSpec::String),
            ParameterDescriptor::body("first", TypeSpec::Any),
            ParameterDescriptor::body("second", TypeSpec::Any),
            ParameterDescriptor::query("bad", TypeSpec::Boolean).min_length(2),
        ],
    )
    .unwrap_err();
    let kinds: Vec<&str> = issues.iter().map(|i| i.kind.as_str()).collect();
    assert!(kinds.contains(&"AmbiguousParameter"), "{kinds:?}");
    assert!(kinds.contains(&"UnknownPathParameter"), "{kinds:?}");
    assert!(kinds.contains(&"UndeclaredPathParameter"), "{kinds:?}");
    assert!(kinds.contains(&"AmbiguousBody"), "{kinds:?}");
    assert!(kinds.contains(&"InvalidConstraint"), "{kinds:?}");
}

#[test]
fn binder_can_be_used_without_an_app() {
    let binder = ParameterBinder::new(
        "GET /users/{user_id}",
        "/users/{user_id}",
        vec![
            ParameterDescriptor::path("user_id", TypeSpec::Integer),
            ParameterDescriptor::query("verbose", TypeSpec::Boolean).default(json!(false)),
        ],
    )
    .unwrap();
    let mut path_params = ParamVec::new();
    path_params.push((Arc::from("user_id"), "9".to_string()));
    let bound = binder
        .bind(&RequestData::get("/users/9?verbose=1"), &path_params)
        .unwrap();
    assert_eq!(bound["user_id"], 9);
    assert_eq!(bound["verbose"], true);
}
