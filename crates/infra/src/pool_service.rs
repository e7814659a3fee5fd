//! Pool execution pipeline (application-level orchestration).
//!
//! `PoolService` is the public face of one lending pool. It serializes every
//! operation behind a per-pool lock and runs each through the same pipeline:
//!
//! ```text
//! Operation
//!   ↓
//! 1. Acquire pool lock (re-entrant calls are refused, not deadlocked)
//!   ↓
//! 2. Decide: pool.decide(command) → event (pure, no mutation)
//!   ↓
//! 3. Settle: pull/push the underlying asset (failure → nothing applied)
//!   ↓
//! 4. Apply the event, append it to the pool journal
//!   ↓
//! 5. Release lock, publish the envelope to the event bus
//! ```
//!
//! The asset movement is the only step that can fail after validation, and
//! it happens before any pool state changes, so every operation is
//! all-or-nothing. Publication happens after commit and is best-effort: a bus
//! failure is logged and never undoes or fails a committed operation.

use std::sync::{Mutex, MutexGuard};
use std::thread::{self, ThreadId};

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use forgelend_core::{AccountId, Aggregate, AggregateRoot, DomainResult, PoolId};
use forgelend_events::{Event, EventBus, EventEnvelope};
use forgelend_pool::{
    Amount, Borrow, LendingPool, Mint, PoolCommand, PoolError, PoolEvent,
    PoolSnapshot, Redeem, RepayBorrow, Settlement,
};

use crate::asset::{TransferError, UnderlyingAsset};
use crate::config::PoolConfig;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// The pool rejected the operation; nothing was applied.
    #[error(transparent)]
    Rejected(#[from] PoolError),

    /// Called back into the pool while one of its own settlements was in flight.
    #[error("re-entrant call into pool {0} during settlement")]
    Reentrant(PoolId),

    /// The asset could not report a balance.
    #[error("asset query failed: {0}")]
    Asset(TransferError),

    /// A previous operation panicked while holding the pool lock.
    #[error("pool state lock poisoned")]
    Poisoned,
}

/// Ledger cash compared with what the asset reports for pool custody.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub ledger_cash: Amount,
    pub custody_balance: Amount,
}

impl Reconciliation {
    pub fn is_balanced(&self) -> bool {
        self.ledger_cash == self.custody_balance
    }
}

struct PoolState {
    pool: LendingPool,
    journal: Vec<EventEnvelope<PoolEvent>>,
}

/// Clears the settling marker when an operation finishes (or unwinds).
struct SettlingGuard<'a> {
    slot: &'a Mutex<Option<ThreadId>>,
}

impl Drop for SettlingGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = None;
        }
    }
}

/// Serialized, settling front-end for a single `LendingPool`.
///
/// - `A`: the underlying asset the pool holds in custody
/// - `B`: where committed events are published
///
/// Share across threads with `Arc<PoolService<..>>`; every operation and query
/// takes the per-pool lock for its whole duration.
pub struct PoolService<A, B> {
    pool_id: PoolId,
    config: PoolConfig,
    asset: A,
    bus: B,
    state: Mutex<PoolState>,
    settling: Mutex<Option<ThreadId>>,
}

impl<A, B> core::fmt::Debug for PoolService<A, B> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PoolService")
            .field("pool_id", &self.pool_id)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<A, B> PoolService<A, B>
where
    A: UnderlyingAsset,
    B: EventBus<EventEnvelope<PoolEvent>>,
{
    /// Open a new, empty pool.
    pub fn new(config: PoolConfig, pool_id: PoolId, asset: A, bus: B) -> Self {
        Self::with_pool(config, LendingPool::empty(pool_id), asset, bus)
    }

    /// Resume a pool from a snapshot. The journal starts empty; sequence
    /// numbers continue from the snapshot version.
    pub fn from_snapshot(
        config: PoolConfig,
        snapshot: PoolSnapshot,
        asset: A,
        bus: B,
    ) -> DomainResult<Self> {
        let pool = LendingPool::restore(snapshot)?;
        info!(pool_id = %pool.id_typed(), version = pool.version(), "pool restored from snapshot");
        Ok(Self::with_pool(config, pool, asset, bus))
    }

    fn with_pool(config: PoolConfig, pool: LendingPool, asset: A, bus: B) -> Self {
        Self {
            pool_id: pool.id_typed(),
            config,
            asset,
            bus,
            state: Mutex::new(PoolState {
                pool,
                journal: Vec::new(),
            }),
            settling: Mutex::new(None),
        }
    }

    /// Deposit `amount` underlying; returns the claim units minted.
    pub fn mint(&self, account: AccountId, amount: Amount) -> Result<Amount, DispatchError> {
        let event = self.dispatch(PoolCommand::Mint(Mint {
            account,
            amount,
            occurred_at: Utc::now(),
        }))?;
        Ok(event.outcome())
    }

    /// Burn `claim_units`; returns the underlying amount paid out.
    pub fn redeem(&self, account: AccountId, claim_units: Amount) -> Result<Amount, DispatchError> {
        let event = self.dispatch(PoolCommand::Redeem(Redeem {
            account,
            claim_units,
            occurred_at: Utc::now(),
        }))?;
        Ok(event.outcome())
    }

    pub fn borrow(&self, account: AccountId, amount: Amount) -> Result<(), DispatchError> {
        self.dispatch(PoolCommand::Borrow(Borrow {
            account,
            amount,
            occurred_at: Utc::now(),
        }))?;
        Ok(())
    }

    /// Repay up to `amount` of debt; returns the amount actually repaid.
    pub fn repay_borrow(&self, account: AccountId, amount: Amount) -> Result<Amount, DispatchError> {
        let event = self.dispatch(PoolCommand::RepayBorrow(RepayBorrow {
            account,
            amount,
            occurred_at: Utc::now(),
        }))?;
        Ok(event.outcome())
    }

    pub fn exchange_rate(&self) -> Result<Amount, DispatchError> {
        self.read(|pool| pool.exchange_rate())?
            .map_err(DispatchError::from)
    }

    pub fn balance_of(&self, account: AccountId) -> Result<Amount, DispatchError> {
        self.read(|pool| pool.balance_of(account))
    }

    pub fn borrow_balance_of(&self, account: AccountId) -> Result<Amount, DispatchError> {
        self.read(|pool| pool.borrow_balance_of(account))
    }

    pub fn total_supply(&self) -> Result<Amount, DispatchError> {
        self.read(LendingPool::total_supply)
    }

    pub fn total_cash(&self) -> Result<Amount, DispatchError> {
        self.read(LendingPool::total_cash)
    }

    pub fn total_borrows(&self) -> Result<Amount, DispatchError> {
        self.read(LendingPool::total_borrows)
    }

    pub fn snapshot(&self) -> Result<PoolSnapshot, DispatchError> {
        self.read(LendingPool::snapshot)
    }

    /// Events committed since the service was opened or last compacted, in
    /// order. The journal lives in memory and grows with every operation
    /// until `compact` is called.
    pub fn history(&self) -> Result<Vec<EventEnvelope<PoolEvent>>, DispatchError> {
        self.ensure_not_settling()?;
        Ok(self.lock_state()?.journal.clone())
    }

    /// Snapshot the pool and drop the journal it covers, in one step.
    ///
    /// Restoring the returned snapshot and applying any later `history()`
    /// reproduces the live pool.
    pub fn compact(&self) -> Result<PoolSnapshot, DispatchError> {
        self.ensure_not_settling()?;
        let mut state = self.lock_state()?;
        let snapshot = state.pool.snapshot();
        let dropped = state.journal.len();
        state.journal = Vec::new();
        info!(pool_id = %self.pool_id, version = snapshot.version, dropped, "journal compacted");
        Ok(snapshot)
    }

    /// Compare ledger cash with the custody balance the asset reports.
    ///
    /// Units sent straight to custody outside `mint`/`repay_borrow` show up
    /// as a custody surplus; they are not part of the pool's value.
    pub fn reconcile(&self) -> Result<Reconciliation, DispatchError> {
        let custody = self.custody_account();
        let (ledger_cash, custody_balance) =
            self.read(|pool| (pool.total_cash(), self.asset.balance_of(custody)))?;
        let custody_balance = custody_balance.map_err(DispatchError::Asset)?;
        let report = Reconciliation {
            ledger_cash,
            custody_balance,
        };
        if !report.is_balanced() {
            warn!(
                pool_id = %self.pool_id,
                %ledger_cash,
                %custody_balance,
                "custody balance differs from ledger cash"
            );
        }
        Ok(report)
    }

    pub fn pool_id(&self) -> PoolId {
        self.pool_id
    }

    /// Account the asset credits with the pool's cash.
    pub fn custody_account(&self) -> AccountId {
        self.pool_id().custody_account()
    }

    pub fn name(&self) -> &str {
        self.config.claim_name()
    }

    pub fn symbol(&self) -> &str {
        self.config.claim_symbol()
    }

    pub fn decimals(&self) -> u8 {
        PoolConfig::DECIMALS
    }

    pub fn underlying(&self) -> &A {
        &self.asset
    }

    fn dispatch(&self, command: PoolCommand) -> Result<PoolEvent, DispatchError> {
        self.ensure_not_settling()?;

        let (event, envelope) = {
            let mut state = self.lock_state()?;
            let _settling = self.mark_settling()?;
            let pool_id = self.pool_id;

            let event = match state.pool.decide(&command) {
                Ok(event) => event,
                Err(err) => {
                    warn!(
                        %pool_id,
                        op = command.name(),
                        account = %command.account(),
                        code = err.code(),
                        "operation rejected"
                    );
                    return Err(err.into());
                }
            };
            debug!(%pool_id, event_type = event.event_type(), "operation decided");

            if let Err(err) = self.settle(pool_id, &event) {
                warn!(
                    %pool_id,
                    op = command.name(),
                    account = %command.account(),
                    code = err.code(),
                    "settlement failed; nothing applied"
                );
                return Err(err.into());
            }

            state.pool.apply(&event);
            let envelope = EventEnvelope::new(
                Uuid::now_v7(),
                event.pool_id(),
                LendingPool::AGGREGATE_TYPE,
                state.pool.version(),
                event.clone(),
            );
            state.journal.push(envelope.clone());

            info!(
                %pool_id,
                op = command.name(),
                account = %command.account(),
                amount = %event.outcome(),
                sequence = envelope.sequence_number(),
                "operation committed"
            );
            (event, envelope)
        };

        if let Err(err) = self.bus.publish(envelope) {
            warn!(error = ?err, event_type = event.event_type(), "event publication failed");
        }
        Ok(event)
    }

    fn settle(&self, pool_id: PoolId, event: &PoolEvent) -> Result<(), PoolError> {
        let custody = pool_id.custody_account();
        let result = match event.settlement() {
            Settlement::Pull { from, amount } => self.asset.transfer_from(from, custody, amount),
            Settlement::Push { to, amount } => self.asset.transfer(custody, to, amount),
        };
        result.map_err(|e| PoolError::transfer_failed(e.to_string()))
    }

    fn read<T>(&self, f: impl FnOnce(&LendingPool) -> T) -> Result<T, DispatchError> {
        self.ensure_not_settling()?;
        Ok(f(&self.lock_state()?.pool))
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, PoolState>, DispatchError> {
        self.state.lock().map_err(|_| DispatchError::Poisoned)
    }

    /// Refuse a call made from inside this pool's own settlement; taking the
    /// pool lock there would deadlock the thread.
    fn ensure_not_settling(&self) -> Result<(), DispatchError> {
        let slot = self.settling.lock().map_err(|_| DispatchError::Poisoned)?;
        if *slot == Some(thread::current().id()) {
            return Err(DispatchError::Reentrant(self.pool_id));
        }
        Ok(())
    }

    /// Must be called while holding the pool lock.
    fn mark_settling(&self) -> Result<SettlingGuard<'_>, DispatchError> {
        let mut slot = self.settling.lock().map_err(|_| DispatchError::Poisoned)?;
        *slot = Some(thread::current().id());
        Ok(SettlingGuard {
            slot: &self.settling,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use forgelend_events::InMemoryEventBus;
    use forgelend_pool::SCALE;

    use super::*;
    use crate::asset::InMemoryAsset;

    type Service = PoolService<Arc<InMemoryAsset>, Arc<InMemoryEventBus<EventEnvelope<PoolEvent>>>>;

    fn setup() -> (Service, Arc<InMemoryAsset>) {
        let asset = Arc::new(InMemoryAsset::new("Underlying Token", "UTK", 18));
        let bus = Arc::new(InMemoryEventBus::new());
        let service = PoolService::new(PoolConfig::default(), PoolId::new(), asset.clone(), bus);
        (service, asset)
    }

    fn funded(asset: &InMemoryAsset, service: &Service, amount: Amount) -> AccountId {
        let account = AccountId::new();
        asset.mint_to(account, amount).unwrap();
        asset.approve(account, service.custody_account(), amount).unwrap();
        account
    }

    #[test]
    fn mint_pulls_underlying_into_custody() {
        let (service, asset) = setup();
        let a = funded(&asset, &service, 100);

        assert_eq!(service.mint(a, 100).unwrap(), 100);
        assert_eq!(service.balance_of(a).unwrap(), 100);
        assert_eq!(asset.balance_of(a).unwrap(), 0);
        assert_eq!(asset.balance_of(service.custody_account()).unwrap(), 100);
        assert!(service.reconcile().unwrap().is_balanced());
    }

    #[test]
    fn mint_without_allowance_is_transfer_failed_and_rolls_back() {
        let (service, asset) = setup();
        let a = AccountId::new();
        asset.mint_to(a, 100).unwrap();

        let err = service.mint(a, 100).unwrap_err();
        assert!(matches!(err, DispatchError::Rejected(PoolError::TransferFailed(_))));
        assert_eq!(service.total_supply().unwrap(), 0);
        assert_eq!(service.total_cash().unwrap(), 0);
        assert_eq!(service.balance_of(a).unwrap(), 0);
        assert!(service.history().unwrap().is_empty());
        assert_eq!(asset.balance_of(a).unwrap(), 100);
    }

    #[test]
    fn rejected_operation_does_not_touch_asset() {
        let (service, asset) = setup();
        let a = funded(&asset, &service, 10);
        let err = service.redeem(a, 1).unwrap_err();
        assert_eq!(
            err,
            DispatchError::Rejected(PoolError::InsufficientBalance {
                requested: 1,
                available: 0
            })
        );
        assert_eq!(asset.balance_of(a).unwrap(), 10);
    }

    #[test]
    fn metadata_comes_from_config() {
        let (service, _) = setup();
        assert_eq!(service.symbol(), "cTKN");
        assert_eq!(service.name(), "Forgelend Claim");
        assert_eq!(service.decimals(), 18);
        assert_eq!(service.underlying().symbol(), "UTK");
        assert_eq!(service.exchange_rate().unwrap(), SCALE);
    }

    #[test]
    fn journal_sequence_matches_pool_version() {
        let (service, asset) = setup();
        let a = funded(&asset, &service, 100);
        service.mint(a, 60).unwrap();
        service.mint(a, 40).unwrap();

        let history = service.history().unwrap();
        let sequences: Vec<u64> = history.iter().map(|e| e.sequence_number()).collect();
        assert_eq!(sequences, vec![1, 2]);
        assert!(history.iter().all(|e| e.aggregate_type() == forgelend_pool::AGGREGATE_TYPE));
        assert_eq!(service.snapshot().unwrap().version, 2);
    }
}
