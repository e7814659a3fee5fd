use thiserror::Error;

use crate::math::Amount;

pub type PoolResult<T> = Result<T, PoolError>;

/// Why a pool operation was rejected.
///
/// Every variant is terminal for the operation that raised it and leaves the
/// pool exactly as it was.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// A zero amount was supplied, or a repayment was attempted with no debt.
    #[error("amount must be greater than zero")]
    ZeroAmount,

    /// A non-zero input converts to zero units at the current exchange rate.
    #[error("amount too small to convert at the current exchange rate")]
    DustAmount,

    /// The account holds fewer claim units than requested.
    #[error("insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: Amount, available: Amount },

    /// The pool does not hold enough cash to pay out.
    #[error("insufficient liquidity: requested {requested}, available {available}")]
    InsufficientLiquidity { requested: Amount, available: Amount },

    /// The underlying asset rejected a pull or push.
    #[error("underlying transfer failed: {0}")]
    TransferFailed(String),

    /// A checked arithmetic step overflowed or divided by zero.
    #[error("arithmetic overflow")]
    Overflow,
}

impl PoolError {
    pub fn transfer_failed(reason: impl Into<String>) -> Self {
        Self::TransferFailed(reason.into())
    }

    /// Stable machine-readable reason code.
    pub fn code(&self) -> &'static str {
        match self {
            PoolError::ZeroAmount => "zero_amount",
            PoolError::DustAmount => "dust_amount",
            PoolError::InsufficientBalance { .. } => "insufficient_balance",
            PoolError::InsufficientLiquidity { .. } => "insufficient_liquidity",
            PoolError::TransferFailed(_) => "transfer_failed",
            PoolError::Overflow => "overflow",
        }
    }
}
