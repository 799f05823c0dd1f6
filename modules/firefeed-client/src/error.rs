use thiserror::Error;

pub type Result<T> = std::result::Result<T, FetchError>;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl FetchError {
    /// Whether another attempt may succeed. 5xx and 429 are provider-side
    /// and transient; auth, not-found, and unprocessable responses are not.
    /// A well-formed 200 with a malformed body is never retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Network(_) | FetchError::Timeout => true,
            FetchError::Api { status, .. } => *status == 429 || (500..600).contains(status),
            FetchError::InvalidInput(_) | FetchError::Parse(_) => false,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_retryable() {
        for status in [429u16, 500, 502, 503, 504] {
            let err = FetchError::Api {
                status,
                message: String::new(),
            };
            assert!(err.is_retryable(), "status {status} should retry");
        }
    }

    #[test]
    fn client_errors_are_not_retryable() {
        for status in [401u16, 403, 404, 422] {
            let err = FetchError::Api {
                status,
                message: String::new(),
            };
            assert!(!err.is_retryable(), "status {status} should not retry");
        }
    }

    #[test]
    fn malformed_body_is_not_retryable() {
        assert!(!FetchError::Parse("bad json".into()).is_retryable());
    }

    #[test]
    fn network_and_timeout_are_retryable() {
        assert!(FetchError::Network("reset".into()).is_retryable());
        assert!(FetchError::Timeout.is_retryable());
    }
}
