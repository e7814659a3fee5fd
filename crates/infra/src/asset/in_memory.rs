use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::atomic::{AtomicBool, Ordering};

use forgelend_core::AccountId;
use forgelend_pool::Amount;

use super::r#trait::{TransferError, UnderlyingAsset};

#[derive(Debug, Default)]
struct Books {
    total_supply: Amount,
    balances: HashMap<AccountId, Amount>,
    allowances: HashMap<(AccountId, AccountId), Amount>,
}

impl Books {
    fn balance(&self, account: AccountId) -> Amount {
        self.balances.get(&account).copied().unwrap_or(0)
    }

    fn allowance(&self, owner: AccountId, spender: AccountId) -> Amount {
        self.allowances.get(&(owner, spender)).copied().unwrap_or(0)
    }

    /// Move units between balances; validates everything before writing.
    fn move_units(
        &mut self,
        from: AccountId,
        to: AccountId,
        amount: Amount,
    ) -> Result<(), TransferError> {
        let available = self.balance(from);
        if amount > available {
            return Err(TransferError::InsufficientBalance {
                requested: amount,
                available,
            });
        }
        if from == to {
            return Ok(());
        }
        let credited = self
            .balance(to)
            .checked_add(amount)
            .ok_or(TransferError::Overflow)?;

        self.balances.insert(from, available - amount);
        self.balances.insert(to, credited);
        Ok(())
    }
}

/// In-memory fungible token (ERC-20 style balances + allowances).
///
/// Intended for tests/dev. `set_fail_transfers(true)` makes every transfer
/// fail without moving units, to exercise rollback paths.
#[derive(Debug)]
pub struct InMemoryAsset {
    name: String,
    symbol: String,
    decimals: u8,
    books: RwLock<Books>,
    fail_transfers: AtomicBool,
}

impl InMemoryAsset {
    pub fn new(name: impl Into<String>, symbol: impl Into<String>, decimals: u8) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            decimals,
            books: RwLock::new(Books::default()),
            fail_transfers: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    /// Issue new units to `account`.
    pub fn mint_to(&self, account: AccountId, amount: Amount) -> Result<(), TransferError> {
        let mut books = self.write()?;
        let supply = books
            .total_supply
            .checked_add(amount)
            .ok_or(TransferError::Overflow)?;
        let balance = books
            .balance(account)
            .checked_add(amount)
            .ok_or(TransferError::Overflow)?;
        books.total_supply = supply;
        books.balances.insert(account, balance);
        Ok(())
    }

    /// Let `spender` pull up to `amount` of `owner`'s units (replaces any
    /// previous approval).
    pub fn approve(
        &self,
        owner: AccountId,
        spender: AccountId,
        amount: Amount,
    ) -> Result<(), TransferError> {
        let mut books = self.write()?;
        if amount == 0 {
            books.allowances.remove(&(owner, spender));
        } else {
            books.allowances.insert((owner, spender), amount);
        }
        Ok(())
    }

    pub fn allowance(&self, owner: AccountId, spender: AccountId) -> Result<Amount, TransferError> {
        Ok(self.read()?.allowance(owner, spender))
    }

    pub fn total_supply(&self) -> Result<Amount, TransferError> {
        Ok(self.read()?.total_supply)
    }

    pub fn set_fail_transfers(&self, fail: bool) {
        self.fail_transfers.store(fail, Ordering::SeqCst);
    }

    fn check_enabled(&self) -> Result<(), TransferError> {
        if self.fail_transfers.load(Ordering::SeqCst) {
            return Err(TransferError::Rejected("transfers disabled".to_string()));
        }
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Books>, TransferError> {
        self.books.read().map_err(|_| poisoned())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Books>, TransferError> {
        self.books.write().map_err(|_| poisoned())
    }
}

impl UnderlyingAsset for InMemoryAsset {
    fn transfer_from(
        &self,
        from: AccountId,
        to: AccountId,
        amount: Amount,
    ) -> Result<(), TransferError> {
        self.check_enabled()?;
        let mut books = self.write()?;

        let approved = books.allowance(from, to);
        if amount > approved {
            return Err(TransferError::InsufficientAllowance {
                requested: amount,
                approved,
            });
        }
        books.move_units(from, to, amount)?;

        let remaining = approved - amount;
        if remaining == 0 {
            books.allowances.remove(&(from, to));
        } else {
            books.allowances.insert((from, to), remaining);
        }
        Ok(())
    }

    fn transfer(&self, from: AccountId, to: AccountId, amount: Amount) -> Result<(), TransferError> {
        self.check_enabled()?;
        self.write()?.move_units(from, to, amount)
    }

    fn balance_of(&self, account: AccountId) -> Result<Amount, TransferError> {
        Ok(self.read()?.balance(account))
    }
}

fn poisoned() -> TransferError {
    TransferError::Rejected("asset ledger lock poisoned".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token() -> InMemoryAsset {
        InMemoryAsset::new("Underlying Token", "UTK", 18)
    }

    #[test]
    fn transfer_moves_balance() {
        let asset = token();
        let a = AccountId::new();
        let b = AccountId::new();
        asset.mint_to(a, 100).unwrap();

        asset.transfer(a, b, 40).unwrap();
        assert_eq!(asset.balance_of(a).unwrap(), 60);
        assert_eq!(asset.balance_of(b).unwrap(), 40);
        assert_eq!(asset.total_supply().unwrap(), 100);
    }

    #[test]
    fn transfer_beyond_balance_fails_without_effect() {
        let asset = token();
        let a = AccountId::new();
        asset.mint_to(a, 10).unwrap();

        let err = asset.transfer(a, AccountId::new(), 11).unwrap_err();
        assert_eq!(
            err,
            TransferError::InsufficientBalance {
                requested: 11,
                available: 10
            }
        );
        assert_eq!(asset.balance_of(a).unwrap(), 10);
    }

    #[test]
    fn transfer_from_spends_allowance() {
        let asset = token();
        let owner = AccountId::new();
        let pool = AccountId::new();
        asset.mint_to(owner, 100).unwrap();
        asset.approve(owner, pool, 70).unwrap();

        asset.transfer_from(owner, pool, 50).unwrap();
        assert_eq!(asset.allowance(owner, pool).unwrap(), 20);
        assert_eq!(asset.balance_of(pool).unwrap(), 50);

        let err = asset.transfer_from(owner, pool, 21).unwrap_err();
        assert_eq!(
            err,
            TransferError::InsufficientAllowance {
                requested: 21,
                approved: 20
            }
        );
        assert_eq!(asset.balance_of(owner).unwrap(), 50);
    }

    #[test]
    fn approved_but_unfunded_pull_keeps_allowance() {
        let asset = token();
        let owner = AccountId::new();
        let pool = AccountId::new();
        asset.mint_to(owner, 5).unwrap();
        asset.approve(owner, pool, 10).unwrap();

        assert!(asset.transfer_from(owner, pool, 10).is_err());
        assert_eq!(asset.allowance(owner, pool).unwrap(), 10);
        assert_eq!(asset.balance_of(owner).unwrap(), 5);
    }

    #[test]
    fn disabled_transfers_are_rejected() {
        let asset = token();
        let a = AccountId::new();
        asset.mint_to(a, 10).unwrap();
        asset.set_fail_transfers(true);

        assert!(matches!(
            asset.transfer(a, AccountId::new(), 1),
            Err(TransferError::Rejected(_))
        ));
        asset.set_fail_transfers(false);
        assert!(asset.transfer(a, AccountId::new(), 1).is_ok());
    }

    #[test]
    fn poisoned_books_are_reported_not_read_as_zero() {
        let asset = std::sync::Arc::new(token());
        let a = AccountId::new();
        asset.mint_to(a, 10).unwrap();

        let poisoner = asset.clone();
        let _ = std::thread::spawn(move || {
            let _books = poisoner.books.write().unwrap();
            panic!("writer died holding the asset books");
        })
        .join();

        assert!(matches!(asset.balance_of(a), Err(TransferError::Rejected(_))));
        assert!(asset.total_supply().is_err());
        assert!(asset.allowance(a, AccountId::new()).is_err());
        assert!(asset.transfer(a, AccountId::new(), 1).is_err());
    }
}
