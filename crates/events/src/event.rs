use chrono::{DateTime, Utc};
use forgelend_core::{AccountId, PoolId};

/// A committed pool fact.
///
/// Events are immutable and carry a schema version so stored history can
/// outlive changes to the payload types.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable type name, e.g. `lending.pool.minted`.
    fn event_type(&self) -> &'static str;

    fn version(&self) -> u32;

    /// Pool whose ledger the event changed.
    fn pool_id(&self) -> PoolId;

    /// Account whose balances the event changed.
    fn account(&self) -> AccountId;

    /// Business time of the originating operation.
    fn occurred_at(&self) -> DateTime<Utc>;
}
