//! Underlying Asset Ledger
//!
//! Balance bookkeeping for the protocol's underlying fungible asset.
//! Transfer semantics are assumed correct per the protocol boundary;
//! this ledger only tracks who holds what inside the system. Assets
//! forwarded to the external lending market leave the ledger (`debit`)
//! and re-enter it when withdrawn back (`credit`).

use crate::errors::{ProtocolError, ProtocolResult};
use crate::math::{safe_add, safe_sub};
use crate::types::Address;
use crate::BTreeMap;

/// Balance table for the underlying asset
#[derive(Debug, Clone, Default)]
pub struct TokenLedger {
    balances: BTreeMap<Address, u64>,
    total_supply: u64,
}

impl TokenLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Balance of an account (zero if never seen)
    pub fn balance_of(&self, account: &Address) -> u64 {
        self.balances.get(account).copied().unwrap_or(0)
    }

    /// Total asset units currently tracked by the ledger
    pub fn total_supply(&self) -> u64 {
        self.total_supply
    }

    /// Fail unless `account` holds at least `amount`
    pub fn require_balance(&self, account: &Address, amount: u64) -> ProtocolResult<()> {
        let available = self.balance_of(account);
        if available < amount {
            return Err(ProtocolError::InsufficientBalance {
                account: *account,
                requested: amount,
                available,
            });
        }
        Ok(())
    }

    /// Move `amount` between two accounts
    pub fn transfer(&mut self, from: &Address, to: &Address, amount: u64) -> ProtocolResult<()> {
        if amount == 0 {
            return Ok(());
        }
        self.require_balance(from, amount)?;

        let from_balance = self.balance_of(from);
        let to_balance = self.balance_of(to);
        let new_to = safe_add(to_balance, amount)?;

        self.balances.insert(*from, from_balance - amount);
        self.balances.insert(*to, new_to);
        Ok(())
    }

    /// Credit `amount` into the ledger (assets entering the system)
    pub fn credit(&mut self, account: &Address, amount: u64) -> ProtocolResult<()> {
        if amount == 0 {
            return Ok(());
        }
        let balance = self.balance_of(account);
        let new_balance = safe_add(balance, amount)?;
        self.total_supply = safe_add(self.total_supply, amount)?;
        self.balances.insert(*account, new_balance);
        Ok(())
    }

    /// Debit `amount` out of the ledger (assets leaving the system)
    pub fn debit(&mut self, account: &Address, amount: u64) -> ProtocolResult<()> {
        if amount == 0 {
            return Ok(());
        }
        self.require_balance(account, amount)?;
        let balance = self.balance_of(account);
        self.total_supply = safe_sub(self.total_supply, amount)?;
        self.balances.insert(*account, balance - amount);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: Address = [1u8; 32];
    const BOB: Address = [2u8; 32];

    #[test]
    fn test_credit_and_balance() {
        let mut ledger = TokenLedger::new();
        ledger.credit(&ALICE, 100).unwrap();

        assert_eq!(ledger.balance_of(&ALICE), 100);
        assert_eq!(ledger.total_supply(), 100);
    }

    #[test]
    fn test_transfer() {
        let mut ledger = TokenLedger::new();
        ledger.credit(&ALICE, 100).unwrap();
        ledger.transfer(&ALICE, &BOB, 40).unwrap();

        assert_eq!(ledger.balance_of(&ALICE), 60);
        assert_eq!(ledger.balance_of(&BOB), 40);
        assert_eq!(ledger.total_supply(), 100);
    }

    #[test]
    fn test_transfer_insufficient() {
        let mut ledger = TokenLedger::new();
        ledger.credit(&ALICE, 10).unwrap();

        let result = ledger.transfer(&ALICE, &BOB, 11);
        assert_eq!(
            result,
            Err(ProtocolError::InsufficientBalance {
                account: ALICE,
                requested: 11,
                available: 10,
            })
        );
        // Nothing moved
        assert_eq!(ledger.balance_of(&ALICE), 10);
        assert_eq!(ledger.balance_of(&BOB), 0);
    }

    #[test]
    fn test_debit_leaves_system() {
        let mut ledger = TokenLedger::new();
        ledger.credit(&ALICE, 100).unwrap();
        ledger.debit(&ALICE, 30).unwrap();

        assert_eq!(ledger.balance_of(&ALICE), 70);
        assert_eq!(ledger.total_supply(), 70);
    }

    #[test]
    fn test_zero_amount_noops() {
        let mut ledger = TokenLedger::new();
        ledger.transfer(&ALICE, &BOB, 0).unwrap();
        ledger.credit(&ALICE, 0).unwrap();
        ledger.debit(&ALICE, 0).unwrap();
        assert_eq!(ledger.total_supply(), 0);
    }
}
