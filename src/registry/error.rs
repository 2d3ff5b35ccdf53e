use aws_sdk_ecr::error::SdkError;
use aws_sdk_ecr::operation::get_authorization_token::GetAuthorizationTokenError;
use thiserror::Error;

use crate::registry::models::Provider;

/// Errors returned while exchanging cloud credentials for registry credentials
#[derive(Debug, Error)]
pub enum LoginError {
    /// Auto-login is disabled for the provider, or no client was configured for it
    #[error("{provider} authentication failed: provider is not configured: {reason}")]
    UnconfiguredProvider { provider: Provider, reason: String },

    /// The image does not belong to the provider asked to authenticate it
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    /// Upstream returned a non-success status or a body that could not be decoded
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The response decoded, but the credential payload inside it is malformed
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("ECR request failed: {0}")]
    Aws(#[from] Box<SdkError<GetAuthorizationTokenError>>),

    /// The injected token credential could not produce an access token
    #[error("Failed to acquire access token: {0}")]
    Credential(String),

    #[error("Login was cancelled")]
    Cancelled,
}

impl LoginError {
    pub(crate) fn unconfigured(provider: Provider, reason: impl Into<String>) -> Self {
        Self::UnconfiguredProvider {
            provider,
            reason: reason.into(),
        }
    }

    /// Whether the failure is a configuration problem the operator has to fix
    pub fn is_unconfigured(&self) -> bool {
        matches!(self, Self::UnconfiguredProvider { .. })
    }

    /// Whether the failure came from the transport or from cancellation, so
    /// repeating the login later may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::Aws(_) | Self::Credential(_) | Self::Cancelled
        )
    }

    /// Whether upstream answered with data that could not be turned into credentials
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::InvalidResponse(_) | Self::InvalidToken(_))
    }
}

impl From<SdkError<GetAuthorizationTokenError>> for LoginError {
    fn from(err: SdkError<GetAuthorizationTokenError>) -> Self {
        Self::Aws(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconfigured_message_names_provider() {
        let err = LoginError::unconfigured(Provider::Gcr, "auto-login is disabled");
        assert!(err.is_unconfigured());
        assert!(!err.is_transient());
        assert_eq!(
            err.to_string(),
            "GCR authentication failed: provider is not configured: auto-login is disabled"
        );
    }

    #[test]
    fn test_error_classes() {
        assert!(LoginError::Cancelled.is_transient());
        assert!(LoginError::InvalidToken("x".into()).is_malformed());
        assert!(LoginError::InvalidResponse("x".into()).is_malformed());
        assert!(!LoginError::InvalidImage("x".into()).is_malformed());
    }
}
