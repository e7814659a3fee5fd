//! Infrastructure layer: the underlying-asset boundary, pool execution and
//! configuration.

pub mod asset;
pub mod config;
pub mod pool_service;

pub use asset::{InMemoryAsset, TransferError, UnderlyingAsset};
pub use config::PoolConfig;
pub use pool_service::{DispatchError, PoolService, Reconciliation};
