use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Which of the two concurrent fetches produced a result or an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Leg {
    Text,
    Snapshot,
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Leg::Text => write!(f, "text"),
            Leg::Snapshot => write!(f, "snapshot"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TextViewError {
    #[error("{leg} fetch timeout after {timeout:?}")]
    FetchTimeout { leg: Leg, timeout: Duration },

    #[error("{leg} fetch unavailable: {reason}")]
    FetchUnavailable { leg: Leg, reason: String },

    #[error("{leg} fetch protocol error: {reason}")]
    FetchProtocol { leg: Leg, reason: String },

    #[error("Placement advisor unavailable: {0}")]
    AdvisorUnavailable(String),

    #[error("Placement advisor returned malformed response: {reason}")]
    AdvisorMalformedResponse { reason: String, raw_text: String },

    #[error("Both text and snapshot sources failed")]
    BothSourcesFailed,

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, TextViewError>;

impl TextViewError {
    pub fn unavailable<E: fmt::Display>(leg: Leg, err: E) -> Self {
        TextViewError::FetchUnavailable {
            leg,
            reason: err.to_string(),
        }
    }

    pub fn protocol<E: fmt::Display>(leg: Leg, err: E) -> Self {
        TextViewError::FetchProtocol {
            leg,
            reason: err.to_string(),
        }
    }

    /// Only a double source failure aborts a merge; everything else degrades it.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TextViewError::BothSourcesFailed)
    }
}
