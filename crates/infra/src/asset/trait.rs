use std::sync::Arc;

use thiserror::Error;

use forgelend_core::AccountId;
use forgelend_pool::Amount;

/// Why the asset refused to move units.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: Amount, available: Amount },

    #[error("insufficient allowance: requested {requested}, approved {approved}")]
    InsufficientAllowance { requested: Amount, approved: Amount },

    #[error("recipient balance would overflow")]
    Overflow,

    #[error("transfer rejected: {0}")]
    Rejected(String),
}

/// Standard fungible-token interface the pool settles against.
///
/// Calls are synchronous: each either completes or fails before returning,
/// and a failed call must not have moved any units.
pub trait UnderlyingAsset: Send + Sync {
    /// Move `amount` from `from` to `to`, spending the allowance `from`
    /// granted to `to`.
    fn transfer_from(&self, from: AccountId, to: AccountId, amount: Amount)
        -> Result<(), TransferError>;

    /// Move `amount` of `from`'s own holdings to `to`.
    fn transfer(&self, from: AccountId, to: AccountId, amount: Amount)
        -> Result<(), TransferError>;

    /// Fails only when the asset cannot answer, never with a guessed zero.
    fn balance_of(&self, account: AccountId) -> Result<Amount, TransferError>;
}

impl<A> UnderlyingAsset for Arc<A>
where
    A: UnderlyingAsset + ?Sized,
{
    fn transfer_from(
        &self,
        from: AccountId,
        to: AccountId,
        amount: Amount,
    ) -> Result<(), TransferError> {
        (**self).transfer_from(from, to, amount)
    }

    fn transfer(&self, from: AccountId, to: AccountId, amount: Amount) -> Result<(), TransferError> {
        (**self).transfer(from, to, amount)
    }

    fn balance_of(&self, account: AccountId) -> Result<Amount, TransferError> {
        (**self).balance_of(account)
    }
}
