use crate::openai::error::Error;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Represents an error returned from the `OpenAI` API.
///
/// This struct is used to deserialize the JSON object that the API returns
/// when a request fails.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct OpenAIError {
    /// Contains specific details about the error.
    pub error: ErrorDetails,
}

/// Contains detailed information about an error from the API.
///
/// OpenAI nests this object under `error`, while compatible servers often
/// return it at the top level of the body.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ErrorDetails {
    /// A human-readable message providing more details about the error.
    pub message: String,

    /// The type of error returned. This can be used to categorize errors.
    #[serde(default)]
    pub r#type: Option<String>,

    /// (Optional) The specific parameter in the request that caused the error.
    #[serde(default)]
    pub param: Option<String>,

    /// (Optional) A code corresponding to the error, either a string or the HTTP status.
    #[serde(default)]
    pub code: Option<Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    Nested(OpenAIError),
    Flat(ErrorDetails),
}

/// Builds an [`Error::Api`] out of a failed response, preferring the message
/// from a JSON error body over the raw body text.
pub(crate) fn api_error(status: reqwest::StatusCode, body: &str) -> Error {
    let message = match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody::Nested(err)) => err.error.message,
        Ok(ErrorBody::Flat(details)) => details.message,
        Err(_) if body.trim().is_empty() => status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string(),
        Err(_) => body.trim().to_string(),
    };
    tracing::warn!(status = status.as_u16(), %message, "request failed");
    Error::Api {
        status: status.as_u16(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    fn message_of(err: Error) -> (u16, String) {
        match err {
            Error::Api { status, message } => (status, message),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_nested_error_body() {
        let body = r#"{"error": {"message": "Invalid file format.", "type": "invalid_request_error", "param": null, "code": null}}"#;
        assert_eq!(
            message_of(api_error(StatusCode::BAD_REQUEST, body)),
            (400, "Invalid file format.".to_string())
        );
    }

    #[test]
    fn test_flat_error_body() {
        let body = r#"{"object": "error", "message": "model not found", "type": "NotFoundError", "param": null, "code": 404}"#;
        assert_eq!(
            message_of(api_error(StatusCode::NOT_FOUND, body)),
            (404, "model not found".to_string())
        );
    }

    #[test]
    fn test_plain_and_empty_bodies() {
        assert_eq!(
            message_of(api_error(StatusCode::BAD_GATEWAY, "upstream down\n")),
            (502, "upstream down".to_string())
        );
        assert_eq!(
            message_of(api_error(StatusCode::SERVICE_UNAVAILABLE, "")),
            (503, "Service Unavailable".to_string())
        );
    }
}
