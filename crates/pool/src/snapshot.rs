//! Point-in-time pool state, restoration and replay.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use forgelend_core::{AccountId, Aggregate, DomainError, DomainResult, PoolId};

use crate::math::{self, Amount, SCALE};
use crate::pool::{LendingPool, PoolEvent};

/// Serializable copy of every piece of pool state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    pub pool_id: PoolId,
    pub version: u64,
    pub total_supply: Amount,
    pub total_cash: Amount,
    pub total_borrows: Amount,
    pub holders: BTreeMap<AccountId, Amount>,
    pub borrowers: BTreeMap<AccountId, Amount>,
}

impl LendingPool {
    pub fn snapshot(&self) -> PoolSnapshot {
        PoolSnapshot {
            pool_id: self.id,
            version: self.version,
            total_supply: self.total_supply,
            total_cash: self.total_cash,
            total_borrows: self.total_borrows,
            holders: self.holders.clone(),
            borrowers: self.borrowers.clone(),
        }
    }

    /// Rebuild a pool from a snapshot, refusing one that breaks the ledger
    /// invariants.
    pub fn restore(snapshot: PoolSnapshot) -> DomainResult<Self> {
        let pool = Self {
            id: snapshot.pool_id,
            version: snapshot.version,
            total_supply: snapshot.total_supply,
            total_cash: snapshot.total_cash,
            total_borrows: snapshot.total_borrows,
            holders: snapshot.holders,
            borrowers: snapshot.borrowers,
        };

        if pool.holders.values().any(|b| *b == 0) || pool.borrowers.values().any(|b| *b == 0) {
            return Err(DomainError::corrupt("snapshot contains zero-balance entries"));
        }
        pool.check_invariants()?;

        let value = math::checked_add(pool.total_cash, pool.total_borrows)
            .map_err(|_| DomainError::corrupt("pool value overflows"))?;
        if pool.total_supply > 0 && value == 0 {
            return Err(DomainError::corrupt(
                "outstanding claims are not backed by any pool value",
            ));
        }

        Ok(pool)
    }

    /// Rehydrate a pool by applying its event history in order.
    pub fn replay<'a>(id: PoolId, events: impl IntoIterator<Item = &'a PoolEvent>) -> Self {
        let mut pool = Self::empty(id);
        for event in events {
            pool.apply(event);
        }
        pool
    }

    /// Verify the ledger's structural invariants:
    ///
    /// - claim supply equals the sum of holder balances;
    /// - total borrows equals the sum of borrower debts;
    /// - `cash + borrows` is within `supply / SCALE + 1` units above
    ///   `supply * rate / SCALE` (rate truncation is the only slack).
    ///
    /// With no claims outstanding the identity is not checked: any residual
    /// cash is carried into the next deposit at the bootstrap rate.
    pub fn check_invariants(&self) -> DomainResult<()> {
        let held = sum(self.holders.values())
            .ok_or_else(|| DomainError::corrupt("holder balances overflow"))?;
        if held != self.total_supply {
            return Err(DomainError::corrupt(format!(
                "claim supply {} does not match holder balances {held}",
                self.total_supply
            )));
        }

        let owed = sum(self.borrowers.values())
            .ok_or_else(|| DomainError::corrupt("borrow balances overflow"))?;
        if owed != self.total_borrows {
            return Err(DomainError::corrupt(format!(
                "total borrows {} does not match borrower debts {owed}",
                self.total_borrows
            )));
        }

        if self.total_supply == 0 {
            return Ok(());
        }

        let value = math::checked_add(self.total_cash, self.total_borrows)
            .map_err(|_| DomainError::corrupt("pool value overflows"))?;
        let implied = self
            .exchange_rate()
            .and_then(|rate| math::to_underlying(self.total_supply, rate))
            .map_err(|e| DomainError::corrupt(format!("exchange rate unavailable: {e}")))?;
        let tolerance = self.total_supply / SCALE + 1;

        if implied > value || value - implied > tolerance {
            return Err(DomainError::corrupt(format!(
                "accounting identity broken: value {value}, supply * rate {implied}"
            )));
        }
        Ok(())
    }
}

fn sum<'a>(mut values: impl Iterator<Item = &'a Amount>) -> Option<Amount> {
    values.try_fold(0u128, |acc, v| acc.checked_add(*v))
}
