//! Vault Share Ledger
//!
//! Vault shares are a single fungible balance across the whole vault.
//! Minting and burning happen only through deposits and withdrawals;
//! transfers move custody between holders and deliberately know nothing
//! about collections - collection records track money flows, never
//! share custody.

use nestyield_common::{
    errors::{ProtocolError, ProtocolResult},
    math::{safe_add, safe_sub},
    types::Address,
    BTreeMap,
};

/// Fungible share balances and total supply
#[derive(Debug, Clone, Default)]
pub struct ShareLedger {
    balances: BTreeMap<Address, u64>,
    total_supply: u64,
}

impl ShareLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Share balance of a holder (zero if never seen)
    pub fn balance_of(&self, holder: &Address) -> u64 {
        self.balances.get(holder).copied().unwrap_or(0)
    }

    /// Total shares outstanding
    pub fn total_supply(&self) -> u64 {
        self.total_supply
    }

    /// Fail unless `owner` holds at least `amount` shares
    pub fn require_balance(&self, owner: &Address, amount: u64) -> ProtocolResult<()> {
        let available = self.balance_of(owner);
        if available < amount {
            return Err(ProtocolError::InsufficientShares {
                owner: *owner,
                requested: amount,
                available,
            });
        }
        Ok(())
    }

    /// Mint shares to a receiver
    pub fn mint(&mut self, receiver: &Address, amount: u64) -> ProtocolResult<()> {
        if amount == 0 {
            return Ok(());
        }
        let balance = self.balance_of(receiver);
        let new_balance = safe_add(balance, amount)?;
        self.total_supply = safe_add(self.total_supply, amount)?;
        self.balances.insert(*receiver, new_balance);
        Ok(())
    }

    /// Burn shares from an owner
    pub fn burn(&mut self, owner: &Address, amount: u64) -> ProtocolResult<()> {
        if amount == 0 {
            return Ok(());
        }
        self.require_balance(owner, amount)?;
        let balance = self.balance_of(owner);
        self.total_supply = safe_sub(self.total_supply, amount)?;
        self.balances.insert(*owner, balance - amount);
        Ok(())
    }

    /// Move shares between holders
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
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: Address = [1u8; 32];
    const BOB: Address = [2u8; 32];

    #[test]
    fn test_mint_and_burn() {
        let mut shares = ShareLedger::new();
        shares.mint(&ALICE, 100).unwrap();
        assert_eq!(shares.total_supply(), 100);

        shares.burn(&ALICE, 40).unwrap();
        assert_eq!(shares.balance_of(&ALICE), 60);
        assert_eq!(shares.total_supply(), 60);
    }

    #[test]
    fn test_burn_insufficient() {
        let mut shares = ShareLedger::new();
        shares.mint(&ALICE, 10).unwrap();

        let result = shares.burn(&ALICE, 11);
        assert_eq!(
            result,
            Err(ProtocolError::InsufficientShares {
                owner: ALICE,
                requested: 11,
                available: 10,
            })
        );
    }

    #[test]
    fn test_transfer_preserves_supply() {
        let mut shares = ShareLedger::new();
        shares.mint(&ALICE, 100).unwrap();
        shares.transfer(&ALICE, &BOB, 30).unwrap();

        assert_eq!(shares.balance_of(&ALICE), 70);
        assert_eq!(shares.balance_of(&BOB), 30);
        assert_eq!(shares.total_supply(), 100);
    }
}
