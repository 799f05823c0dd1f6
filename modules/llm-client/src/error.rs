use thiserror::Error;

/// Classification that drives the summarizer's retry-vs-fallback decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rate limit or provider overload; one same-provider retry is worth it.
    Temporary,
    /// Auth or quota failure; the provider will not recover this run.
    Permanent,
    Unknown,
}

#[derive(Debug, Error)]
#[error("{provider} provider error ({kind:?}): {message}")]
pub struct ProviderError {
    pub provider: String,
    pub kind: ErrorKind,
    pub status: Option<u16>,
    pub message: String,
}

impl ProviderError {
    /// Classify an HTTP status from a provider API.
    pub fn from_status(provider: &str, status: u16, message: String) -> Self {
        let kind = match status {
            429 | 503 | 504 => ErrorKind::Temporary,
            401 | 402 => ErrorKind::Permanent,
            _ => ErrorKind::Unknown,
        };
        Self {
            provider: provider.to_string(),
            kind,
            status: Some(status),
            message,
        }
    }

    /// Transport-level failures (timeout, connection reset) are transient.
    pub fn from_transport(provider: &str, err: reqwest::Error) -> Self {
        Self {
            provider: provider.to_string(),
            kind: ErrorKind::Temporary,
            status: None,
            message: err.to_string(),
        }
    }

    pub fn malformed(provider: &str, message: impl Into<String>) -> Self {
        Self {
            provider: provider.to_string(),
            kind: ErrorKind::Unknown,
            status: None,
            message: message.into(),
        }
    }
}
