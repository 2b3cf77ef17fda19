// src/error.rs
use reqwest::header::InvalidHeaderValue;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("HTTP request failed: {0}")]
    ReqwestError(#[from] reqwest::Error),

    #[error("URL parsing failed: {0}")]
    UrlParseError(#[from] url::ParseError),

    #[error("JSON processing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("JSON deserialization failed: {0}")]
    JsonDeserializationFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A non-2xx response from the Parse Server. `body` is the raw response body.
    #[error("Parse API error (HTTP {status}, code {code}): {error}")]
    ApiError {
        status: u16,
        code: i64,
        error: String,
        body: Value,
    },

    #[error("Invalid schema: {0}")]
    Validation(String),

    #[error("Invalid class name: {0}")]
    InvalidClassName(String),

    #[error("Unsupported field type '{field_type}' for field '{field}' of class '{class_name}'")]
    UnsupportedFieldType {
        class_name: String,
        field: String,
        field_type: String,
    },

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid header value: {0}")]
    InvalidHeaderValue(InvalidHeaderValue),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl ParseError {
    /// Creates a `ParseError` from an HTTP status code and a JSON response body.
    ///
    /// Parse Server reports failures as `{"code": <int>, "error": "<message>"}`. Bodies that
    /// don't follow that shape still produce an `ApiError`, with code `0` and a generic message.
    pub fn from_response(status_code: u16, response_body: Value) -> Self {
        let code = response_body
            .get("code")
            .and_then(|v| v.as_i64())
            .unwrap_or(0);
        let error = response_body
            .get("error")
            .and_then(|v| v.as_str())
            .unwrap_or("Unknown error")
            .to_string();

        ParseError::ApiError {
            status: status_code,
            code,
            error,
            body: response_body,
        }
    }

    /// Returns true for errors raised by the server, as opposed to local validation or I/O.
    pub fn is_remote(&self) -> bool {
        matches!(self, ParseError::ApiError { .. } | ParseError::ReqwestError(_))
    }
}
