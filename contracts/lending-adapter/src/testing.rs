//! Test Support
//!
//! A configurable in-memory [`LendingMarket`] used by the protocol's
//! test suites. Supports yield accrual, market-side loss, hard failure
//! injection, and partial-delivery (shortfall) injection.

use crate::LendingMarket;
use nestyield_common::{types::Address, BTreeMap};

/// In-memory lending market with failure injection
#[derive(Debug, Default)]
pub struct MockMarket {
    /// Current valuation of the position
    assets: u64,
    /// Reject all deposits when set
    pub fail_deposits: bool,
    /// Reject all withdrawals when set
    pub fail_withdrawals: bool,
    /// Under-deliver withdrawals by this many basis points when set
    pub withdraw_shortfall_bps: u64,
    /// Outstanding borrower debts capping behalf-repayments; borrowers
    /// without an entry accept any amount
    debts: BTreeMap<Address, u64>,
}

impl MockMarket {
    /// Create an empty market
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate interest accrual on the position
    pub fn accrue_yield(&mut self, amount: u64) {
        self.assets = self.assets.saturating_add(amount);
    }

    /// Simulate market-side loss
    pub fn slash(&mut self, amount: u64) {
        self.assets = self.assets.saturating_sub(amount);
    }

    /// Cap behalf-repayments for a borrower at their outstanding debt
    pub fn set_debt(&mut self, borrower: Address, amount: u64) {
        self.debts.insert(borrower, amount);
    }

    /// Outstanding debt of a borrower, if tracked
    pub fn debt_of(&self, borrower: &Address) -> Option<u64> {
        self.debts.get(borrower).copied()
    }
}

impl LendingMarket for MockMarket {
    fn deposit(&mut self, amount: u64) -> bool {
        if self.fail_deposits {
            return false;
        }
        self.assets = self.assets.saturating_add(amount);
        true
    }

    fn withdraw(&mut self, amount: u64) -> Option<u64> {
        if self.fail_withdrawals {
            return None;
        }
        let shortfall = (amount as u128 * self.withdraw_shortfall_bps as u128 / 10_000) as u64;
        let actual = amount.saturating_sub(shortfall).min(self.assets);
        self.assets -= actual;
        Some(actual)
    }

    fn total_assets(&self) -> u64 {
        self.assets
    }

    fn behalf_repay(&mut self, borrower: Address, amount: u64) -> u64 {
        match self.debts.get_mut(&borrower) {
            Some(debt) => {
                let accepted = amount.min(*debt);
                *debt -= accepted;
                accepted
            }
            // Untracked borrowers accept any repayment
            None => amount,
        }
    }
}
