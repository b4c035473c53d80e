//! Error taxonomy for trend queries.
//!
//! Every failure a query can hit resolves to a [`TrendsError`]. Executors
//! store the displayable [`ErrorInfo`] form in their state so callers can
//! show a message and still dispatch on the machine-readable [`ErrorKind`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Errors raised while building, sending, or interpreting a trends query.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TrendsError {
    /// The caller's request is invalid; nothing was sent.
    #[error("Invalid input: {message}")]
    UserInput { message: String },

    /// Transport failure or non-success HTTP status.
    #[error("Network error: {message}")]
    Network {
        message: String,
        status: Option<u16>,
    },

    /// The transport succeeded but the body carried an `error` field.
    #[error("API error: {message}")]
    Api { message: String },

    /// The payload does not have the structure its endpoint promises.
    #[error("Malformed {endpoint} response: {message} (field `{field}`)")]
    Normalization {
        endpoint: String,
        field: String,
        message: String,
    },

    /// Series could not be aligned on a shared timeline.
    #[error("Cannot align series: {message}")]
    Alignment { message: String },
}

impl TrendsError {
    pub fn user_input(message: impl Into<String>) -> Self {
        TrendsError::UserInput {
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>, status: Option<u16>) -> Self {
        TrendsError::Network {
            message: message.into(),
            status,
        }
    }

    pub fn api(message: impl Into<String>) -> Self {
        TrendsError::Api {
            message: message.into(),
        }
    }

    pub fn normalization(
        endpoint: impl fmt::Display,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        TrendsError::Normalization {
            endpoint: endpoint.to_string(),
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn alignment(message: impl Into<String>) -> Self {
        TrendsError::Alignment {
            message: message.into(),
        }
    }

    /// Machine-readable kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TrendsError::UserInput { .. } => ErrorKind::UserInput,
            TrendsError::Network { .. } => ErrorKind::Network,
            TrendsError::Api { .. } => ErrorKind::Api,
            TrendsError::Normalization { .. } => ErrorKind::Normalization,
            TrendsError::Alignment { .. } => ErrorKind::Alignment,
        }
    }

    /// HTTP status attached to the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            TrendsError::Network { status, .. } => *status,
            _ => None,
        }
    }
}

/// Machine-readable error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UserInput,
    Network,
    Api,
    Normalization,
    Alignment,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::UserInput => write!(f, "UserInputError"),
            ErrorKind::Network => write!(f, "NetworkError"),
            ErrorKind::Api => write!(f, "APIError"),
            ErrorKind::Normalization => write!(f, "NormalizationError"),
            ErrorKind::Alignment => write!(f, "AlignmentError"),
        }
    }
}

/// Displayable error as stored in a request's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl From<&TrendsError> for ErrorInfo {
    fn from(err: &TrendsError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
            status: err.status(),
        }
    }
}

impl From<TrendsError> for ErrorInfo {
    fn from(err: TrendsError) -> Self {
        Self::from(&err)
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} ({}): {}", self.kind, status, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

pub type Result<T, E = TrendsError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(TrendsError::user_input("x").kind(), ErrorKind::UserInput);
        assert_eq!(TrendsError::network("x", None).kind(), ErrorKind::Network);
        assert_eq!(TrendsError::api("x").kind(), ErrorKind::Api);
        assert_eq!(
            TrendsError::normalization("categories", "categories", "missing").kind(),
            ErrorKind::Normalization
        );
        assert_eq!(TrendsError::alignment("x").kind(), ErrorKind::Alignment);
    }

    #[test]
    fn test_error_info_carries_status() {
        let info = ErrorInfo::from(TrendsError::network("Service Unavailable", Some(503)));
        assert_eq!(info.kind, ErrorKind::Network);
        assert_eq!(info.status, Some(503));
        assert_eq!(
            info.to_string(),
            "NetworkError (503): Network error: Service Unavailable"
        );
    }

    #[test]
    fn test_normalization_message_names_endpoint_and_field() {
        let err = TrendsError::normalization("interest_over_time", "date", "missing date");
        let text = err.to_string();
        assert!(text.contains("interest_over_time"));
        assert!(text.contains("`date`"));
    }
}
