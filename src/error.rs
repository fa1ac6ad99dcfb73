//! Error taxonomy for the POS client.
//!
//! Failures fall into two user-visible buckets: validation errors caught
//! before anything is sent, and submission failures where the store API
//! rejected the request. Transport, decode and configuration problems are
//! kept separate so callers can log them precisely, but they surface to the
//! user the same way: one message, no automatic retry.

use std::collections::BTreeMap;

/// Generic text used when an error payload carries nothing readable.
pub const GENERIC_FAILURE_MESSAGE: &str = "Something went wrong. Please try again.";

#[derive(Debug, thiserror::Error)]
pub enum PosError {
    /// Rejected locally before submission.
    #[error("{0}")]
    Validation(String),

    /// The store API answered with a non-success status.
    #[error("{message} (HTTP {status})")]
    Submission {
        status: u16,
        message: String,
        field_errors: BTreeMap<String, Vec<String>>,
    },

    /// Connect/timeout/request-building failure.
    #[error("{0}")]
    Network(String),

    /// The response body was not the JSON we expected.
    #[error("Invalid response from store API: {0}")]
    Decode(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl PosError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Text shown to the user in a toast.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(msg) | Self::Network(msg) => msg.clone(),
            Self::Submission { message, .. } => message.clone(),
            Self::Decode(_) | Self::Config(_) => GENERIC_FAILURE_MESSAGE.to_string(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Field-level messages from a rejected submission, if any.
    pub fn field_errors(&self) -> Option<&BTreeMap<String, Vec<String>>> {
        match self {
            Self::Submission { field_errors, .. } if !field_errors.is_empty() => {
                Some(field_errors)
            }
            _ => None,
        }
    }
}

impl From<serde_json::Error> for PosError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_is_shown_verbatim() {
        let err = PosError::validation("Cart is empty");
        assert!(err.is_validation());
        assert_eq!(err.user_message(), "Cart is empty");
        assert_eq!(err.to_string(), "Cart is empty");
    }

    #[test]
    fn submission_display_includes_status() {
        let err = PosError::Submission {
            status: 422,
            message: "The name field is required.".into(),
            field_errors: BTreeMap::new(),
        };
        assert_eq!(err.to_string(), "The name field is required. (HTTP 422)");
        assert_eq!(err.user_message(), "The name field is required.");
        assert!(err.field_errors().is_none());
    }

    #[test]
    fn decode_errors_surface_generic_text() {
        let err: PosError = serde_json::from_str::<serde_json::Value>("{oops")
            .unwrap_err()
            .into();
        assert_eq!(err.user_message(), GENERIC_FAILURE_MESSAGE);
    }
}
