//! Form and multipart body decoding.
//!
//! Both encodings are flattened into an ordered `name -> value` map before the
//! binder looks parameters up in it:
//!
//! - text values that parse as JSON are decoded (`"42"` becomes `42`,
//!   `"true"` becomes `true`); anything else stays a string
//! - a key that appears more than once accumulates into a list
//! - uploaded files become an object with `filename`, `content_type`, `size`
//!   and the (lossy UTF-8) `content`

use indexmap::IndexMap;
use serde_json::{json, Value};
use std::fmt;

/// An uploaded file taken from a multipart part with a `filename`.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl UploadedFile {
    /// Representation handed to the validator and the handler.
    pub fn to_value(&self) -> Value {
        json!({
            "filename": self.filename,
            "content_type": self.content_type,
            "size": self.data.len(),
            "content": String::from_utf8_lossy(&self.data),
        })
    }
}

/// One decoded form entry.
#[derive(Debug, Clone, PartialEq)]
pub enum FormValue {
    Text(String),
    File(UploadedFile),
}

/// Malformed multipart payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormError {
    MissingBoundary,
    MissingOpeningBoundary,
    UnterminatedHeaders,
    UnterminatedPart,
    MissingContentDisposition,
    MissingFieldName,
    InvalidFilename(String),
}

impl fmt::Display for FormError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormError::MissingBoundary => write!(f, "multipart content type has no boundary"),
            FormError::MissingOpeningBoundary => write!(f, "body does not start with the boundary"),
            FormError::UnterminatedHeaders => write!(f, "part headers are not terminated"),
            FormError::UnterminatedPart => write!(f, "part is not followed by a boundary"),
            FormError::MissingContentDisposition => {
                write!(f, "part has no Content-Disposition header")
            }
            FormError::MissingFieldName => write!(f, "part has no field name"),
            FormError::InvalidFilename(name) => write!(f, "invalid filename `{name}`"),
        }
    }
}

impl std::error::Error for FormError {}

/// Decode an `application/x-www-form-urlencoded` body.
pub fn parse_urlencoded(body: &[u8]) -> Vec<(String, FormValue)> {
    url::form_urlencoded::parse(body)
        .map(|(k, v)| (k.into_owned(), FormValue::Text(v.into_owned())))
        .collect()
}

/// Extract the `boundary` parameter from a multipart `Content-Type`.
pub fn parse_boundary(content_type: &str) -> Result<String, FormError> {
    content_type
        .split(';')
        .skip(1)
        .filter_map(|param| param.trim().split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("boundary"))
        .map(|(_, value)| unquote(value.trim()).to_string())
        .filter(|boundary| !boundary.is_empty())
        .ok_or(FormError::MissingBoundary)
}

/// Decode a `multipart/form-data` body.
pub fn parse_multipart(body: &[u8], boundary: &str) -> Result<Vec<(String, FormValue)>, FormError> {
    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();
    let next_delimiter = format!("\r\n--{boundary}");
    let next_delimiter = next_delimiter.as_bytes();

    let mut pos = find(body, delimiter, 0).ok_or(FormError::MissingOpeningBoundary)?;
    let mut parts = Vec::new();

    loop {
        pos += delimiter.len();
        if body[pos..].starts_with(b"--") {
            break;
        }
        if body[pos..].starts_with(b"\r\n") {
            pos += 2;
        }

        let header_end = find(body, b"\r\n\r\n", pos).ok_or(FormError::UnterminatedHeaders)?;
        let headers = String::from_utf8_lossy(&body[pos..header_end]);
        let content_start = header_end + 4;
        let content_end =
            find(body, next_delimiter, content_start).ok_or(FormError::UnterminatedPart)?;
        let content = &body[content_start..content_end];

        let mut disposition = None;
        let mut content_type = None;
        for line in headers.split("\r\n") {
            if let Some((name, value)) = line.split_once(':') {
                let name = name.trim();
                if name.eq_ignore_ascii_case("content-disposition") {
                    disposition = Some(value.trim().to_string());
                } else if name.eq_ignore_ascii_case("content-type") {
                    content_type = Some(value.trim().to_string());
                }
            }
        }
        let disposition = disposition.ok_or(FormError::MissingContentDisposition)?;
        let (name, filename) = parse_content_disposition(&disposition)?;

        let value = match filename {
            Some(filename) => FormValue::File(UploadedFile {
                filename,
                content_type,
                data: content.to_vec(),
            }),
            None => FormValue::Text(String::from_utf8_lossy(content).into_owned()),
        };
        parts.push((name, value));

        // Skip the CRLF so `pos` sits on the next delimiter.
        pos = content_end + 2;
    }

    Ok(parts)
}

fn parse_content_disposition(header: &str) -> Result<(String, Option<String>), FormError> {
    let mut name = None;
    let mut filename = None;
    for param in header.split(';').skip(1) {
        if let Some((key, value)) = param.trim().split_once('=') {
            let value = unquote(value.trim()).to_string();
            match key.trim().to_ascii_lowercase().as_str() {
                "name" => name = Some(value),
                "filename" => filename = Some(value),
                _ => {}
            }
        }
    }
    let name = name.ok_or(FormError::MissingFieldName)?;
    if let Some(filename) = &filename {
        if filename.contains("..") || filename.contains('/') || filename.contains('\\') {
            return Err(FormError::InvalidFilename(filename.clone()));
        }
    }
    Ok((name, filename))
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > haystack.len() || needle.is_empty() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|offset| from + offset)
}

/// Decode a text value as JSON when possible, keeping the raw string otherwise.
pub fn decode_scalar(text: String) -> Value {
    match serde_json::from_str::<Value>(&text) {
        Ok(value) => value,
        Err(_) => Value::String(text),
    }
}

/// Flatten decoded entries into a map, accumulating repeated keys into lists.
pub fn parse_form_data(entries: Vec<(String, FormValue)>) -> IndexMap<String, Value> {
    let mut values: IndexMap<String, Value> = IndexMap::new();
    for (key, entry) in entries {
        let value = match entry {
            FormValue::Text(text) => decode_scalar(text),
            FormValue::File(file) => file.to_value(),
        };
        match values.get_mut(&key) {
            Some(Value::Array(existing)) => existing.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                values.insert(key, value);
            }
        }
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urlencoded_values_decode_json_scalars() {
        let map = parse_form_data(parse_urlencoded(b"age=42&name=ada&active=true&raw=%7Bbad"));
        assert_eq!(map["age"], json!(42));
        assert_eq!(map["name"], json!("ada"));
        assert_eq!(map["active"], json!(true));
        assert_eq!(map["raw"], json!("{bad"));
    }

    #[test]
    fn repeated_keys_accumulate() {
        let map = parse_form_data(parse_urlencoded(b"tag=a&tag=b&tag=c&zero=0&zero=1"));
        assert_eq!(map["tag"], json!(["a", "b", "c"]));
        assert_eq!(map["zero"], json!([0, 1]));
    }

    #[test]
    fn boundary_is_extracted() {
        assert_eq!(
            parse_boundary("multipart/form-data; boundary=\"abc\"").unwrap(),
            "abc"
        );
        assert_eq!(
            parse_boundary("multipart/form-data"),
            Err(FormError::MissingBoundary)
        );
    }

    #[test]
    fn multipart_fields_and_files() {
        let body = b"--XX\r\n\
Content-Disposition: form-data; name=\"title\"\r\n\r\n\
hello\r\n\
--XX\r\n\
Content-Disposition: form-data; name=\"doc\"; filename=\"a.txt\"\r\n\
Content-Type: text/plain\r\n\r\n\
line one\r\nline two\r\n\
--XX--\r\n";
        let parts = parse_multipart(body, "XX").unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0], ("title".to_string(), FormValue::Text("hello".to_string())));
        match &parts[1].1 {
            FormValue::File(file) => {
                assert_eq!(file.filename, "a.txt");
                assert_eq!(file.content_type.as_deref(), Some("text/plain"));
                assert_eq!(file.data, b"line one\r\nline two");
            }
            other => panic!("expected file, got {other:?}"),
        }
    }

    #[test]
    fn traversal_filenames_are_rejected() {
        let body = b"--XX\r\n\
Content-Disposition: form-data; name=\"doc\"; filename=\"../etc/passwd\"\r\n\r\n\
x\r\n--XX--\r\n";
        assert!(matches!(
            parse_multipart(body, "XX"),
            Err(FormError::InvalidFilename(_))
        ));
    }

    #[test]
    fn unterminated_part_is_an_error() {
        let body = b"--XX\r\nContent-Disposition: form-data; name=\"a\"\r\n\r\nvalue";
        assert_eq!(parse_multipart(body, "XX"), Err(FormError::UnterminatedPart));
    }
}
