//! Request value object.
//!
//! A `Request` pairs the destination path of a document with the body to send.
//! An absent body means the mapping decided the object must not be sent.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::errors::RequestError;

const PATH_KEY: &str = "path";
const BODY_KEY: &str = "body";
const SYMBOL_PATH_KEY: &str = ":path";
const SYMBOL_BODY_KEY: &str = ":body";

/// A single write against the search service: where it goes and what it carries.
///
/// Requests are immutable once built. Equality is structural over path and body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Request {
    path: String,
    body: Option<Map<String, Value>>,
}

impl Request {
    /// Create a new request.
    ///
    /// # Arguments
    ///
    /// * `path` - Destination path, e.g. `/index/type/14`
    /// * `body` - Document body, or `None` when nothing should be sent
    ///
    /// # Returns
    ///
    /// * `Ok(Request)` - The request
    /// * `Err(RequestError::EmptyPath)` - If `path` is empty
    pub fn new(
        path: impl Into<String>,
        body: Option<Map<String, Value>>,
    ) -> Result<Self, RequestError> {
        let path = path.into();
        if path.is_empty() {
            return Err(RequestError::EmptyPath);
        }
        Ok(Self { path, body })
    }

    /// The destination path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The document body, if any.
    pub fn body(&self) -> Option<&Map<String, Value>> {
        self.body.as_ref()
    }

    /// Whether this request carries a body to send.
    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    /// Split the request into its path and body.
    pub fn into_parts(self) -> (String, Option<Map<String, Value>>) {
        (self.path, self.body)
    }

    /// Build the plain key-value form handed to job queues.
    ///
    /// The result always has exactly two keys, `path` and `body`; an absent body
    /// is stored as `null`.
    pub fn to_transferable(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert(PATH_KEY.to_string(), Value::String(self.path.clone()));
        map.insert(
            BODY_KEY.to_string(),
            self.body.clone().map(Value::Object).unwrap_or(Value::Null),
        );
        map
    }

    /// Rebuild a request from its key-value form.
    ///
    /// Accepts plain keys (`path`, `body`) and symbol-style keys (`:path`, `:body`)
    /// as written by producers that serialize symbols verbatim. Plain keys win
    /// when both are present and non-null.
    pub fn from_transferable(map: &Map<String, Value>) -> Result<Self, RequestError> {
        let path = match lookup(map, PATH_KEY, SYMBOL_PATH_KEY) {
            Some(Value::String(path)) => path.clone(),
            Some(other) => {
                return Err(RequestError::invalid_field(format!(
                    "path must be a string, got {}",
                    other
                )))
            }
            None => return Err(RequestError::MissingPath),
        };

        let body = match lookup(map, BODY_KEY, SYMBOL_BODY_KEY) {
            Some(Value::Object(body)) => Some(body.clone()),
            None => None,
            Some(other) => {
                return Err(RequestError::invalid_field(format!(
                    "body must be an object or null, got {}",
                    other
                )))
            }
        };

        Self::new(path, body)
    }
}

fn lookup<'a>(map: &'a Map<String, Value>, key: &str, symbol_key: &str) -> Option<&'a Value> {
    map.get(key)
        .filter(|v| !v.is_null())
        .or_else(|| map.get(symbol_key).filter(|v| !v.is_null()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_new_keeps_path_and_body() {
        let request = Request::new("path", Some(object(json!({"body": "this"})))).unwrap();
        assert_eq!(request.path(), "path");
        assert_eq!(request.body(), Some(&object(json!({"body": "this"}))));
        assert!(request.has_body());
    }

    #[test]
    fn test_new_rejects_empty_path() {
        assert_eq!(Request::new("", None), Err(RequestError::EmptyPath));
    }

    #[test]
    fn test_to_transferable() {
        let request = Request::new("path", Some(object(json!({"body": "this"})))).unwrap();
        let got = request.to_transferable();
        assert_eq!(got["path"], json!("path"));
        assert_eq!(got["body"], json!({"body": "this"}));
        assert_eq!(got.len(), 2);
    }

    #[test]
    fn test_to_transferable_without_body() {
        let request = Request::new("/index/type/1", None).unwrap();
        assert_eq!(request.to_transferable()["body"], Value::Null);
    }

    #[test]
    fn test_from_transferable_plain_keys() {
        let got = Request::from_transferable(&object(
            json!({"path": "something", "body": {"omg": "HAI!"}}),
        ))
        .unwrap();
        assert_eq!(got.path(), "something");
        assert_eq!(got.body(), Some(&object(json!({"omg": "HAI!"}))));
    }

    #[test]
    fn test_from_transferable_symbol_keys() {
        let got = Request::from_transferable(&object(
            json!({":path": "something", ":body": {"omg": "HAI!"}}),
        ))
        .unwrap();
        assert_eq!(got.path(), "something");
        assert_eq!(got.body(), Some(&object(json!({"omg": "HAI!"}))));
    }

    #[test]
    fn test_round_trip_is_structurally_equal() {
        let with_body = Request::new("/a/b/1", Some(object(json!({"n": [1, 2]})))).unwrap();
        let without_body = Request::new("/a/b/2", None).unwrap();

        for request in [with_body, without_body] {
            let back = Request::from_transferable(&request.to_transferable()).unwrap();
            assert_eq!(back, request);
        }
    }

    #[test]
    fn test_from_transferable_missing_path() {
        let result = Request::from_transferable(&object(json!({"body": {}})));
        assert_eq!(result, Err(RequestError::MissingPath));
    }

    #[test]
    fn test_from_transferable_rejects_scalar_body() {
        let result = Request::from_transferable(&object(json!({"path": "p", "body": 4})));
        assert!(matches!(result, Err(RequestError::InvalidField(_))));
    }
}
