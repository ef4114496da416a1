//! Error types for scene composition.

/// Longest API error body surfaced to the user, in characters.
const MAX_ERROR_MESSAGE_LEN: usize = 500;

/// Errors that can occur while composing a scene.
#[derive(Debug, thiserror::Error)]
pub enum SceneCraftError {
    /// No API credential configured; nothing can be generated.
    #[error("missing credential: {0}")]
    MissingCredential(String),

    /// An input image was not a well-formed data URL.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// API key rejected by the endpoint.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Network or HTTP error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The model answered with text instead of an image.
    #[error("the model did not return an image: {0}")]
    Refusal(String),

    /// Failed to decode base64 data.
    #[error("failed to decode: {0}")]
    Decode(String),

    /// Invalid request parameters or session state.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// I/O error (e.g., reading an upload or saving a scene).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for scene composition operations.
pub type Result<T> = std::result::Result<T, SceneCraftError>;

/// Collapses whitespace in an API error body and caps its length.
pub(crate) fn sanitize_error_message(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= MAX_ERROR_MESSAGE_LEN {
        return collapsed;
    }
    let mut truncated: String = collapsed.chars().take(MAX_ERROR_MESSAGE_LEN).collect();
    truncated.push_str("...");
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SceneCraftError::Api {
            status: 404,
            message: "Not found".into(),
        };
        assert_eq!(err.to_string(), "API error: 404 - Not found");

        let err = SceneCraftError::Refusal("Cannot comply".into());
        assert_eq!(
            err.to_string(),
            "the model did not return an image: Cannot comply"
        );
    }

    #[test]
    fn test_sanitize_collapses_whitespace() {
        let text = "{\n  \"error\":   \"bad\"\n}";
        assert_eq!(sanitize_error_message(text), "{ \"error\": \"bad\" }");
    }

    #[test]
    fn test_sanitize_truncates_long_bodies() {
        let text = "x".repeat(MAX_ERROR_MESSAGE_LEN + 20);
        let sanitized = sanitize_error_message(&text);
        assert_eq!(sanitized.len(), MAX_ERROR_MESSAGE_LEN + 3);
        assert!(sanitized.ends_with("..."));
    }
}
