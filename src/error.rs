use serde_json::Value;
use thiserror::Error;

use crate::payments::types::Provider;

pub type PaymentResult<T> = Result<T, PaymentError>;

/// Failure taxonomy for a payment attempt.
///
/// Every failure surfaced by the facade is one of these four kinds; nothing
/// else escapes `CheckoutSession::initialize_payment`.
#[derive(Debug, Clone, Error)]
pub enum PaymentError {
    /// Caller or configuration mistake. No provider was contacted;
    /// recoverable by correcting the input.
    #[error("{message}")]
    Validation {
        message: String,
        suggestion: Option<String>,
    },

    /// Script delivery failed or timed out. Recoverable by retrying once
    /// connectivity is restored.
    #[error("{message}")]
    Network {
        message: String,
        provider: Option<Provider>,
    },

    /// The vendor widget itself rejected or errored the transaction.
    /// Vendor sessions are single-use, so recovery means a fresh attempt.
    #[error("{message}")]
    Provider {
        message: String,
        provider: Provider,
        suggestion: Option<String>,
        raw: Option<Value>,
    },

    /// Anything uncategorized.
    #[error("{message}")]
    Unknown {
        message: String,
        provider: Option<Provider>,
        suggestion: Option<String>,
    },
}

pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
pub const NETWORK_ERROR: &str = "NETWORK_ERROR";
pub const PROVIDER_ERROR: &str = "PROVIDER_ERROR";
pub const UNKNOWN_ERROR: &str = "UNKNOWN_ERROR";

impl PaymentError {
    pub fn validation(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            suggestion: Some(suggestion.into()),
        }
    }

    pub fn network(message: impl Into<String>, provider: Option<Provider>) -> Self {
        Self::Network {
            message: message.into(),
            provider,
        }
    }

    pub fn provider_failure(
        message: impl Into<String>,
        provider: Provider,
        raw: Option<Value>,
    ) -> Self {
        Self::Provider {
            message: message.into(),
            provider,
            suggestion: None,
            raw,
        }
    }

    pub fn unknown(message: impl Into<String>, provider: Option<Provider>) -> Self {
        Self::Unknown {
            message: message.into(),
            provider,
            suggestion: Some(
                "Please try again or contact support if the issue persists".to_string(),
            ),
        }
    }

    /// Stable machine-readable code for this failure kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => VALIDATION_ERROR,
            Self::Network { .. } => NETWORK_ERROR,
            Self::Provider { .. } => PROVIDER_ERROR,
            Self::Unknown { .. } => UNKNOWN_ERROR,
        }
    }

    /// The provider tag, absent for failures that happened before any
    /// adapter was touched.
    pub fn provider(&self) -> Option<Provider> {
        match self {
            Self::Validation { .. } => None,
            Self::Network { provider, .. } => *provider,
            Self::Provider { provider, .. } => Some(*provider),
            Self::Unknown { provider, .. } => *provider,
        }
    }

    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Validation { suggestion, .. } => suggestion.as_deref(),
            Self::Network { .. } => Some("Check your internet connection and try again."),
            Self::Provider { suggestion, .. } => suggestion.as_deref(),
            Self::Unknown { suggestion, .. } => suggestion.as_deref(),
        }
    }

    /// The unmodified vendor payload, where one was attached.
    pub fn raw(&self) -> Option<&Value> {
        match self {
            Self::Provider { raw, .. } => raw.as_ref(),
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_match_taxonomy() {
        let err = PaymentError::validation("Public key is required", "Provide your public key");
        assert_eq!(err.code(), VALIDATION_ERROR);
        assert_eq!(err.provider(), None);

        let err = PaymentError::network("Failed to load script", Some(Provider::Paystack));
        assert_eq!(err.code(), NETWORK_ERROR);
        assert!(err.is_retryable());

        let err = PaymentError::provider_failure("declined", Provider::Remita, None);
        assert_eq!(err.code(), PROVIDER_ERROR);
        assert_eq!(err.provider(), Some(Provider::Remita));

        let err = PaymentError::unknown("boom", None);
        assert_eq!(err.code(), UNKNOWN_ERROR);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_network_suggestion_is_default() {
        let err = PaymentError::network("timed out", None);
        assert_eq!(
            err.suggestion(),
            Some("Check your internet connection and try again.")
        );
    }

    #[test]
    fn test_raw_payload_preserved() {
        let raw = serde_json::json!({ "status": "FAILED", "responseCode": "02" });
        let err = PaymentError::provider_failure("failed", Provider::Monnify, Some(raw.clone()));
        assert_eq!(err.raw(), Some(&raw));
    }
}
