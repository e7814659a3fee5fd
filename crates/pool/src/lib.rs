//! Lending pool ledger (exchange-rate accounting, event-driven).
//!
//! Pure domain logic only: no IO, no locking, no asset transfers. The pool
//! decides what an operation does and records it as an event; the caller
//! settles the asset movement and then applies the event.

pub mod error;
pub mod math;
pub mod pool;
pub mod snapshot;

pub use error::{PoolError, PoolResult};
pub use math::{Amount, SCALE};
pub use pool::{
    Borrow, BorrowRepaid, Borrowed, LendingPool, Mint, Minted, PoolCommand, PoolEvent, Redeem,
    Redeemed, RepayBorrow, Settlement, AGGREGATE_TYPE,
};
pub use snapshot::PoolSnapshot;
