//! Underlying fungible-asset boundary.
//!
//! The pool never owns asset balances itself; it asks an `UnderlyingAsset`
//! to move units in and out of its custody account.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryAsset;
pub use r#trait::{TransferError, UnderlyingAsset};
