use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("symbol not found: {0}")]
    NotFound(String),

    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("request timed out")]
    Timeout,

    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::Unavailable(_) | ProviderError::RateLimited(_) | ProviderError::Timeout
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::NotFound(_) => "not_found",
            ProviderError::Unavailable(_) => "unavailable",
            ProviderError::RateLimited(_) => "rate_limited",
            ProviderError::Timeout => "timeout",
            ProviderError::InvalidResponse(_) => "invalid_response",
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        // The request URL carries the api key as a query parameter.
        let err = err.without_url();
        if err.is_timeout() {
            ProviderError::Timeout
        } else if err.is_decode() {
            ProviderError::InvalidResponse(err.to_string())
        } else {
            ProviderError::Unavailable(err.to_string())
        }
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;
