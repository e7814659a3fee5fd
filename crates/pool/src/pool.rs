use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use forgelend_core::{AccountId, Aggregate, AggregateRoot, PoolId};
use forgelend_events::Event;

use crate::error::{PoolError, PoolResult};
use crate::math::{self, Amount, SCALE};

/// Stream name used for pool event envelopes.
pub const AGGREGATE_TYPE: &str = "lending.pool";

/// Aggregate root: LendingPool.
///
/// Holds the claim-token ledger (supply + per-holder balances) and the
/// underlying-asset books (cash + borrows + per-borrower debt). The exchange
/// rate is never stored; it is derived from these totals on demand.
///
/// Accounts with a zero balance are absent from `holders` / `borrowers`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LendingPool {
    pub(crate) id: PoolId,
    pub(crate) version: u64,
    pub(crate) total_supply: Amount,
    pub(crate) total_cash: Amount,
    pub(crate) total_borrows: Amount,
    pub(crate) holders: BTreeMap<AccountId, Amount>,
    pub(crate) borrowers: BTreeMap<AccountId, Amount>,
}

impl LendingPool {
    /// A freshly initialized pool: every total and balance is zero.
    pub fn empty(id: PoolId) -> Self {
        Self {
            id,
            version: 0,
            total_supply: 0,
            total_cash: 0,
            total_borrows: 0,
            holders: BTreeMap::new(),
            borrowers: BTreeMap::new(),
        }
    }

    pub fn id_typed(&self) -> PoolId {
        self.id
    }

    /// Underlying value of one claim unit, scaled by `SCALE`.
    ///
    /// `SCALE` while no claims exist; otherwise
    /// `(cash + borrows) * SCALE / supply`, truncated.
    pub fn exchange_rate(&self) -> PoolResult<Amount> {
        if self.total_supply == 0 {
            return Ok(SCALE);
        }
        let value = math::checked_add(self.total_cash, self.total_borrows)?;
        math::mul_div(value, SCALE, self.total_supply)
    }

    /// Claim units held by `account`.
    pub fn balance_of(&self, account: AccountId) -> Amount {
        self.holders.get(&account).copied().unwrap_or(0)
    }

    /// Outstanding principal owed by `account`.
    pub fn borrow_balance_of(&self, account: AccountId) -> Amount {
        self.borrowers.get(&account).copied().unwrap_or(0)
    }

    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    pub fn total_cash(&self) -> Amount {
        self.total_cash
    }

    pub fn total_borrows(&self) -> Amount {
        self.total_borrows
    }

    /// Number of accounts holding claim units.
    pub fn holder_count(&self) -> usize {
        self.holders.len()
    }

    /// Number of accounts with outstanding debt.
    pub fn borrower_count(&self) -> usize {
        self.borrowers.len()
    }
}

impl AggregateRoot for LendingPool {
    type Id = PoolId;

    const AGGREGATE_TYPE: &'static str = AGGREGATE_TYPE;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: Mint (deposit `amount` underlying for claim units).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mint {
    pub account: AccountId,
    pub amount: Amount,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Redeem (burn `claim_units` for underlying).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redeem {
    pub account: AccountId,
    pub claim_units: Amount,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Borrow (take `amount` underlying out of the pool).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Borrow {
    pub account: AccountId,
    pub amount: Amount,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RepayBorrow (return up to `amount` of outstanding debt).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepayBorrow {
    pub account: AccountId,
    pub amount: Amount,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoolCommand {
    Mint(Mint),
    Redeem(Redeem),
    Borrow(Borrow),
    RepayBorrow(RepayBorrow),
}

impl PoolCommand {
    pub fn account(&self) -> AccountId {
        match self {
            PoolCommand::Mint(c) => c.account,
            PoolCommand::Redeem(c) => c.account,
            PoolCommand::Borrow(c) => c.account,
            PoolCommand::RepayBorrow(c) => c.account,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PoolCommand::Mint(_) => "mint",
            PoolCommand::Redeem(_) => "redeem",
            PoolCommand::Borrow(_) => "borrow",
            PoolCommand::RepayBorrow(_) => "repay_borrow",
        }
    }
}

/// Event: Minted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Minted {
    pub pool_id: PoolId,
    pub account: AccountId,
    pub underlying_amount: Amount,
    pub claim_units: Amount,
    /// Rate observed when the mint was decided.
    pub exchange_rate: Amount,
    pub occurred_at: DateTime<Utc>,
}

/// Event: Redeemed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redeemed {
    pub pool_id: PoolId,
    pub account: AccountId,
    pub claim_units: Amount,
    pub underlying_amount: Amount,
    pub exchange_rate: Amount,
    pub occurred_at: DateTime<Utc>,
}

/// Event: Borrowed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Borrowed {
    pub pool_id: PoolId,
    pub account: AccountId,
    pub amount: Amount,
    pub occurred_at: DateTime<Utc>,
}

/// Event: BorrowRepaid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorrowRepaid {
    pub pool_id: PoolId,
    pub account: AccountId,
    /// Amount actually applied (capped at the outstanding debt).
    pub amount: Amount,
    /// Amount the caller asked to repay.
    pub requested: Amount,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoolEvent {
    Minted(Minted),
    Redeemed(Redeemed),
    Borrowed(Borrowed),
    BorrowRepaid(BorrowRepaid),
}

/// Asset movement an event requires before it may be applied.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Settlement {
    /// Move `amount` from `from` into pool custody.
    Pull { from: AccountId, amount: Amount },
    /// Move `amount` out of pool custody to `to`.
    Push { to: AccountId, amount: Amount },
}

impl PoolEvent {
    pub fn settlement(&self) -> Settlement {
        match self {
            PoolEvent::Minted(e) => Settlement::Pull {
                from: e.account,
                amount: e.underlying_amount,
            },
            PoolEvent::Redeemed(e) => Settlement::Push {
                to: e.account,
                amount: e.underlying_amount,
            },
            PoolEvent::Borrowed(e) => Settlement::Push {
                to: e.account,
                amount: e.amount,
            },
            PoolEvent::BorrowRepaid(e) => Settlement::Pull {
                from: e.account,
                amount: e.amount,
            },
        }
    }

    /// The amount reported back to the caller: claim units minted, underlying
    /// redeemed, amount borrowed, or debt actually repaid.
    pub fn outcome(&self) -> Amount {
        match self {
            PoolEvent::Minted(e) => e.claim_units,
            PoolEvent::Redeemed(e) => e.underlying_amount,
            PoolEvent::Borrowed(e) => e.amount,
            PoolEvent::BorrowRepaid(e) => e.amount,
        }
    }
}

impl Event for PoolEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PoolEvent::Minted(_) => "lending.pool.minted",
            PoolEvent::Redeemed(_) => "lending.pool.redeemed",
            PoolEvent::Borrowed(_) => "lending.pool.borrowed",
            PoolEvent::BorrowRepaid(_) => "lending.pool.borrow_repaid",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn pool_id(&self) -> PoolId {
        match self {
            PoolEvent::Minted(e) => e.pool_id,
            PoolEvent::Redeemed(e) => e.pool_id,
            PoolEvent::Borrowed(e) => e.pool_id,
            PoolEvent::BorrowRepaid(e) => e.pool_id,
        }
    }

    fn account(&self) -> AccountId {
        match self {
            PoolEvent::Minted(e) => e.account,
            PoolEvent::Redeemed(e) => e.account,
            PoolEvent::Borrowed(e) => e.account,
            PoolEvent::BorrowRepaid(e) => e.account,
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PoolEvent::Minted(e) => e.occurred_at,
            PoolEvent::Redeemed(e) => e.occurred_at,
            PoolEvent::Borrowed(e) => e.occurred_at,
            PoolEvent::BorrowRepaid(e) => e.occurred_at,
        }
    }
}

impl Aggregate for LendingPool {
    type Command = PoolCommand;
    type Event = PoolEvent;
    type Error = PoolError;

    fn apply(&mut self, event: &Self::Event) {
        // `handle` has already proven every step below fits, so saturation
        // never engages for events this pool decided.
        match event {
            PoolEvent::Minted(e) => {
                self.total_supply = self.total_supply.saturating_add(e.claim_units);
                self.total_cash = self.total_cash.saturating_add(e.underlying_amount);
                credit(&mut self.holders, e.account, e.claim_units);
            }
            PoolEvent::Redeemed(e) => {
                self.total_supply = self.total_supply.saturating_sub(e.claim_units);
                self.total_cash = self.total_cash.saturating_sub(e.underlying_amount);
                debit(&mut self.holders, e.account, e.claim_units);
            }
            PoolEvent::Borrowed(e) => {
                self.total_cash = self.total_cash.saturating_sub(e.amount);
                self.total_borrows = self.total_borrows.saturating_add(e.amount);
                credit(&mut self.borrowers, e.account, e.amount);
            }
            PoolEvent::BorrowRepaid(e) => {
                self.total_cash = self.total_cash.saturating_add(e.amount);
                self.total_borrows = self.total_borrows.saturating_sub(e.amount);
                debit(&mut self.borrowers, e.account, e.amount);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        self.decide(command).map(|event| vec![event])
    }
}

impl LendingPool {
    /// Validate `command` against current state and return the single event it
    /// produces. Never mutates.
    pub fn decide(&self, command: &PoolCommand) -> PoolResult<PoolEvent> {
        match command {
            PoolCommand::Mint(cmd) => self.handle_mint(cmd),
            PoolCommand::Redeem(cmd) => self.handle_redeem(cmd),
            PoolCommand::Borrow(cmd) => self.handle_borrow(cmd),
            PoolCommand::RepayBorrow(cmd) => self.handle_repay(cmd),
        }
    }

    fn handle_mint(&self, cmd: &Mint) -> PoolResult<PoolEvent> {
        if cmd.amount == 0 {
            return Err(PoolError::ZeroAmount);
        }

        let rate = self.exchange_rate()?;
        let claim_units = math::to_claim_units(cmd.amount, rate)?;
        if claim_units == 0 {
            return Err(PoolError::DustAmount);
        }

        math::checked_add(self.total_supply, claim_units)?;
        math::checked_add(self.balance_of(cmd.account), claim_units)?;
        // Pool value must stay representable or the next rate query overflows.
        let cash = math::checked_add(self.total_cash, cmd.amount)?;
        math::checked_add(cash, self.total_borrows)?;

        Ok(PoolEvent::Minted(Minted {
            pool_id: self.id,
            account: cmd.account,
            underlying_amount: cmd.amount,
            claim_units,
            exchange_rate: rate,
            occurred_at: cmd.occurred_at,
        }))
    }

    fn handle_redeem(&self, cmd: &Redeem) -> PoolResult<PoolEvent> {
        if cmd.claim_units == 0 {
            return Err(PoolError::ZeroAmount);
        }

        let available = self.balance_of(cmd.account);
        if cmd.claim_units > available {
            return Err(PoolError::InsufficientBalance {
                requested: cmd.claim_units,
                available,
            });
        }

        let rate = self.exchange_rate()?;
        let underlying_amount = math::to_underlying(cmd.claim_units, rate)?;
        if underlying_amount == 0 {
            return Err(PoolError::DustAmount);
        }
        if underlying_amount > self.total_cash {
            return Err(PoolError::InsufficientLiquidity {
                requested: underlying_amount,
                available: self.total_cash,
            });
        }

        Ok(PoolEvent::Redeemed(Redeemed {
            pool_id: self.id,
            account: cmd.account,
            claim_units: cmd.claim_units,
            underlying_amount,
            exchange_rate: rate,
            occurred_at: cmd.occurred_at,
        }))
    }

    fn handle_borrow(&self, cmd: &Borrow) -> PoolResult<PoolEvent> {
        if cmd.amount == 0 {
            return Err(PoolError::ZeroAmount);
        }
        if cmd.amount > self.total_cash {
            return Err(PoolError::InsufficientLiquidity {
                requested: cmd.amount,
                available: self.total_cash,
            });
        }

        math::checked_add(self.total_borrows, cmd.amount)?;
        math::checked_add(self.borrow_balance_of(cmd.account), cmd.amount)?;

        Ok(PoolEvent::Borrowed(Borrowed {
            pool_id: self.id,
            account: cmd.account,
            amount: cmd.amount,
            occurred_at: cmd.occurred_at,
        }))
    }

    fn handle_repay(&self, cmd: &RepayBorrow) -> PoolResult<PoolEvent> {
        let debt = self.borrow_balance_of(cmd.account);
        if cmd.amount == 0 || debt == 0 {
            return Err(PoolError::ZeroAmount);
        }

        let amount = cmd.amount.min(debt);
        math::checked_add(self.total_cash, amount)?;

        Ok(PoolEvent::BorrowRepaid(BorrowRepaid {
            pool_id: self.id,
            account: cmd.account,
            amount,
            requested: cmd.amount,
            occurred_at: cmd.occurred_at,
        }))
    }
}

fn credit(book: &mut BTreeMap<AccountId, Amount>, account: AccountId, amount: Amount) {
    let entry = book.entry(account).or_insert(0);
    *entry = entry.saturating_add(amount);
}

fn debit(book: &mut BTreeMap<AccountId, Amount>, account: AccountId, amount: Amount) {
    if let Some(balance) = book.get_mut(&account) {
        *balance = balance.saturating_sub(amount);
        if *balance == 0 {
            book.remove(&account);
        }
    }
}
