//! Utility functions for interpreting search service responses.

use serde_json::Value;

use crate::errors::SearchIndexError;
use crate::types::TransportResponse;

/// Build the query error for a failed search response.
///
/// The status is the `status` field of the response body when present, falling
/// back to the HTTP status. The message is the body's `error` field verbatim
/// (structured errors are rendered as JSON), or the raw body text when the body
/// is not JSON or has no `error`.
///
/// # Example
///
/// ```
/// use search_index_repository::{query_error, SearchIndexError, TransportResponse};
///
/// let response = TransportResponse::new(400, r#"{"error":"parse failure","status":400}"#);
/// assert_eq!(query_error(&response), SearchIndexError::query(400, "parse failure"));
/// ```
pub fn query_error(response: &TransportResponse) -> SearchIndexError {
    let parsed: Option<Value> = serde_json::from_str(&response.body).ok();

    let status = parsed
        .as_ref()
        .and_then(|body| body.get("status"))
        .and_then(Value::as_u64)
        .and_then(|status| u16::try_from(status).ok())
        .unwrap_or(response.status);

    let message = match parsed.as_ref().and_then(|body| body.get("error")) {
        Some(Value::String(message)) => message.clone(),
        Some(other) => other.to_string(),
        None => response.body.clone(),
    };

    SearchIndexError::query(status, message)
}

/// Describe a failed write for logs and transport errors.
pub(crate) fn write_failure(method: &str, path: &str, response: &TransportResponse) -> SearchIndexError {
    SearchIndexError::transport(format!(
        "{} {} failed with status {}: {}",
        method, path, response.status, response.body
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_from_body_wins() {
        let response = TransportResponse::new(500, r#"{"error":"boom","status":503}"#);
        assert_eq!(query_error(&response), SearchIndexError::query(503, "boom"));
    }

    #[test]
    fn test_structured_error_is_rendered() {
        let body = json!({"error": {"type": "parsing_exception"}, "status": 400});
        let response = TransportResponse::new(400, body.to_string());
        assert_eq!(
            query_error(&response),
            SearchIndexError::query(400, r#"{"type":"parsing_exception"}"#)
        );
    }

    #[test]
    fn test_non_json_body_falls_back_to_http_status() {
        let response = TransportResponse::new(502, "Bad Gateway");
        assert_eq!(query_error(&response), SearchIndexError::query(502, "Bad Gateway"));
    }

    #[test]
    fn test_write_failure_message() {
        let response = TransportResponse::new(409, "conflict");
        let err = write_failure("PUT", "/a/b/1", &response);
        assert_eq!(
            err,
            SearchIndexError::transport("PUT /a/b/1 failed with status 409: conflict")
        );
    }
}
