//! Structural errors shared by every crate.

use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

/// Failures that are not an operation being refused: malformed ids, bad
/// configuration, and pool state that cannot have come from valid history.
///
/// Refused operations use `forgelend_pool::PoolError`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid {field}: {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    /// Restored or replayed state breaks a ledger invariant.
    #[error("corrupt pool state: {0}")]
    CorruptState(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn invalid_config(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }

    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::CorruptState(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_name_the_field() {
        let err = DomainError::invalid_config("claim_symbol", "cannot be empty");
        assert_eq!(err.to_string(), "invalid claim_symbol: cannot be empty");
    }
}
