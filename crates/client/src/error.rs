/// Errors from the platform HTTP client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// A required id was missing; no request was sent.
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// A configured base URL could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend answered with a non-2xx status.
    #[error("Platform API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// The response envelope carried an `error` key.
    #[error("{message}")]
    Envelope { message: String },

    /// A successful response body could not be decoded.
    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Api { status: 404, .. })
    }

    /// Message suitable for a status line in the UI.
    ///
    /// API errors whose body is a JSON object with an `error` string show
    /// that string instead of the raw body.
    pub fn user_message(&self) -> String {
        match self {
            Self::Api { body, .. } => serde_json::from_str::<serde_json::Value>(body)
                .ok()
                .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
                .unwrap_or_else(|| self.to_string()),
            other => other.to_string(),
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
