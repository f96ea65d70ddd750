use ddd_eventing::EventError;
use thiserror::Error;

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum CommerceError {
    #[error("invalid state: {reason}")]
    InvalidState { reason: String },
    #[error("invalid value: {reason}")]
    InvalidValue { reason: String },
    #[error(transparent)]
    Event(#[from] EventError),
}

impl CommerceError {
    pub fn invalid_state(reason: impl Into<String>) -> Self {
        Self::InvalidState {
            reason: reason.into(),
        }
    }

    pub fn invalid_value(reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            reason: reason.into(),
        }
    }
}

pub type CommerceResult<T> = Result<T, CommerceError>;
