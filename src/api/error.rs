//! Errors from outward API calls (source hosting and chat)

use thiserror::Error;

/// Errors that can occur when interacting with external APIs
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// 401 Unauthorized - token invalid or expired
    #[error("{provider}: Unauthorized (401) - check the API token")]
    Unauthorized { provider: String },

    /// 403 Forbidden - token lacks required permissions
    #[error("{provider}: Forbidden (403) - {message}")]
    Forbidden { provider: String, message: String },

    /// 404 Not Found
    #[error("{provider}: Not found (404) - {resource}")]
    NotFound { provider: String, resource: String },

    /// 409/422 - the request was understood but refused, e.g. a ref that
    /// moved or already exists
    #[error("{provider}: Rejected ({status}) - {message}")]
    Rejected {
        provider: String,
        status: u16,
        message: String,
    },

    /// 429 Rate Limited
    #[error("{provider}: Rate limited{}", retry_suffix(.retry_after_secs))]
    RateLimited {
        provider: String,
        retry_after_secs: Option<u64>,
    },

    /// Network, timeout, or undecodable response
    #[error("{provider}: Network error - {message}")]
    NetworkError { provider: String, message: String },

    /// Other HTTP errors
    #[error("{provider}: HTTP {status} - {message}")]
    HttpError {
        provider: String,
        status: u16,
        message: String,
    },

    /// The platform answered 200 but reported a failure in its envelope
    #[error("{provider}: {code}")]
    Platform { provider: String, code: String },
}

fn retry_suffix(retry_after_secs: &Option<u64>) -> String {
    retry_after_secs
        .map(|secs| format!(" - retry after {secs}s"))
        .unwrap_or_default()
}

impl ApiError {
    /// Classify a non-success HTTP status.
    pub fn from_status(
        provider: impl Into<String>,
        status: u16,
        body: impl Into<String>,
        retry_after_secs: Option<u64>,
    ) -> Self {
        let provider = provider.into();
        let message = body.into();
        match status {
            401 => ApiError::Unauthorized { provider },
            403 => ApiError::Forbidden { provider, message },
            404 => ApiError::NotFound {
                provider,
                resource: message,
            },
            409 | 422 => ApiError::Rejected {
                provider,
                status,
                message,
            },
            429 => ApiError::RateLimited {
                provider,
                retry_after_secs,
            },
            _ => ApiError::HttpError {
                provider,
                status,
                message,
            },
        }
    }

    /// Check if this is an authentication error (401 or 403)
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            ApiError::Unauthorized { .. } | ApiError::Forbidden { .. }
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound { .. })
    }

    /// Get the provider name for this error
    pub fn provider_name(&self) -> &str {
        match self {
            ApiError::Unauthorized { provider }
            | ApiError::Forbidden { provider, .. }
            | ApiError::NotFound { provider, .. }
            | ApiError::Rejected { provider, .. }
            | ApiError::RateLimited { provider, .. }
            | ApiError::NetworkError { provider, .. }
            | ApiError::HttpError { provider, .. }
            | ApiError::Platform { provider, .. } => provider,
        }
    }

    /// Create a network error for a provider
    pub fn network(provider: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::NetworkError {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create an HTTP error for a provider
    pub fn http(provider: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Self::from_status(provider, status, message, None)
    }

    pub fn not_found(provider: impl Into<String>, resource: impl Into<String>) -> Self {
        ApiError::NotFound {
            provider: provider.into(),
            resource: resource.into(),
        }
    }

    pub fn platform(provider: impl Into<String>, code: impl Into<String>) -> Self {
        ApiError::Platform {
            provider: provider.into(),
            code: code.into(),
        }
    }
}
