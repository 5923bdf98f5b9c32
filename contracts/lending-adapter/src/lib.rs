//! Lending Adapter for the NestYield Protocol
//!
//! Wraps the external lending market behind the [`LendingMarket`] trait
//! and layers the protocol's own bookkeeping on top:
//!
//! - **Principal Tracking**: `total_principal_deposited` is cost-basis
//!   accounting - deposits add to it, principal withdrawals subtract
//! - **Yield Clamping**: available yield is `max(0, valuation - principal)`,
//!   never negative, even under market-side loss
//! - **Batch Transfers**: length-checked, size-capped, atomic yield
//!   transfer batches with per-collection attribution
//!
//! The market itself is an opaque interest-bearing counter; its
//! deposit/redeem/interest semantics live entirely behind the trait.

use nestyield_common::{
    constants::limits,
    errors::{ProtocolError, ProtocolResult},
    events::{EventLog, ProtocolEvent},
    math::safe_add,
    types::{Address, CollectionId},
    AccessController, Role, TokenLedger, Vec,
};

/// External lending market boundary.
///
/// `deposit`/`withdraw` report plain success or failure; `withdraw`
/// additionally reports the amount actually delivered, which may fall
/// short of the request when the market is degraded. `behalf_repay`
/// returns the amount the market accepted against the borrower.
pub trait LendingMarket {
    /// Place `amount` with the market
    fn deposit(&mut self, amount: u64) -> bool;

    /// Redeem up to `amount`; `None` on hard failure, otherwise the
    /// amount actually delivered
    fn withdraw(&mut self, amount: u64) -> Option<u64>;

    /// Current market valuation of the position
    fn total_assets(&self) -> u64;

    /// Repay on behalf of `borrower`; returns the amount accepted
    fn behalf_repay(&mut self, borrower: Address, amount: u64) -> u64;
}

/// Adapter state wrapping one external market position
#[derive(Debug)]
pub struct LendingAdapter<M: LendingMarket> {
    market: M,
    total_principal_deposited: u64,
    events: EventLog,
}

impl<M: LendingMarket> LendingAdapter<M> {
    /// Wrap a market with zeroed principal
    pub fn new(market: M) -> Self {
        Self {
            market,
            total_principal_deposited: 0,
            events: EventLog::new(),
        }
    }

    /// Current market valuation of the pooled position.
    ///
    /// May fall below `total_principal_deposited` under market-side loss;
    /// yield computations clamp at zero rather than going negative.
    pub fn total_assets(&self) -> u64 {
        self.market.total_assets()
    }

    /// Shared access to the wrapped market
    pub fn market(&self) -> &M {
        &self.market
    }

    /// Exclusive access to the wrapped market
    pub fn market_mut(&mut self) -> &mut M {
        &mut self.market
    }

    /// Cost-basis principal currently placed with the market
    pub fn total_principal_deposited(&self) -> u64 {
        self.total_principal_deposited
    }

    /// Yield currently available for transfer: `max(0, valuation - principal)`
    pub fn available_yield(&self) -> u64 {
        self.market
            .total_assets()
            .saturating_sub(self.total_principal_deposited)
    }

    /// Place principal with the market.
    ///
    /// Zero amounts succeed without touching the market.
    pub fn deposit(&mut self, amount: u64) -> ProtocolResult<()> {
        if amount == 0 {
            return Ok(());
        }
        if !self.market.deposit(amount) {
            return Err(ProtocolError::LendingManagerDepositFailed);
        }
        self.total_principal_deposited = safe_add(self.total_principal_deposited, amount)?;
        Ok(())
    }

    /// Withdraw principal from the market.
    ///
    /// Reduces the cost basis by the amount actually delivered, which
    /// the market may degrade below the request. Callers decide whether
    /// a shortfall is tolerable.
    pub fn withdraw(&mut self, amount: u64) -> ProtocolResult<u64> {
        if amount == 0 {
            return Ok(0);
        }
        let actual = self
            .market
            .withdraw(amount)
            .ok_or(ProtocolError::LendingManagerWithdrawFailed)?;
        self.total_principal_deposited = self.total_principal_deposited.saturating_sub(actual);
        Ok(actual)
    }

    /// Withdraw accrued yield from the market without touching the cost
    /// basis. Used to fund subsidy repayment batches.
    pub fn withdraw_for_subsidy(&mut self, amount: u64) -> ProtocolResult<u64> {
        if amount == 0 {
            return Ok(0);
        }
        self.market
            .withdraw(amount)
            .ok_or(ProtocolError::LendingManagerWithdrawFailed)
    }

    /// Return an under-delivered or unused yield withdrawal to the
    /// market, leaving the cost basis untouched. Rollback path only.
    pub fn redeposit_yield(&mut self, amount: u64) -> ProtocolResult<()> {
        if amount == 0 {
            return Ok(());
        }
        if !self.market.deposit(amount) {
            return Err(ProtocolError::LendingManagerDepositFailed);
        }
        Ok(())
    }

    /// Repay on behalf of a borrower; passthrough to the market
    pub fn behalf_repay(&mut self, borrower: Address, amount: u64) -> u64 {
        if amount == 0 {
            return 0;
        }
        self.market.behalf_repay(borrower, amount)
    }

    /// Transfer up to `amount` of accrued yield to `recipient`.
    ///
    /// Clamps to the available yield and returns the amount actually
    /// transferred - zero when none is available - rather than failing.
    /// Only a hard market failure or a missing rewards-controller
    /// capability is an error.
    pub fn transfer_yield(
        &mut self,
        amount: u64,
        recipient: Address,
        caller: &Address,
        access: &AccessController,
        ledger: &mut TokenLedger,
    ) -> ProtocolResult<u64> {
        access.require(caller, Role::RewardsController)?;

        let clamped = amount.min(self.available_yield());
        if clamped == 0 {
            return Ok(0);
        }

        let actual = self
            .market
            .withdraw(clamped)
            .ok_or(ProtocolError::LendingManagerWithdrawFailed)?;
        ledger.credit(&recipient, actual)?;

        self.events.emit(ProtocolEvent::YieldWithdrawn {
            recipient,
            amount: actual,
        });
        Ok(actual)
    }

    /// Transfer yield attributed to multiple collections in one batch.
    ///
    /// Validates array lengths and the batch-size cap before touching any
    /// state. A zero `total_amount` short-circuits to a zero-amount
    /// success without a market call. Per-collection amounts are clamped
    /// against the remaining available yield; the whole batch is atomic.
    pub fn transfer_yield_batch(
        &mut self,
        collections: &[CollectionId],
        amounts: &[u64],
        total_amount: u64,
        recipient: Address,
        caller: &Address,
        access: &AccessController,
        ledger: &mut TokenLedger,
    ) -> ProtocolResult<u64> {
        access.require(caller, Role::RewardsController)?;

        if collections.len() != amounts.len() {
            return Err(ProtocolError::ArrayLengthMismatch {
                left: collections.len(),
                right: amounts.len(),
            });
        }
        if collections.len() > limits::MAX_BATCH_SIZE {
            return Err(ProtocolError::BatchTooLarge {
                size: collections.len(),
                maximum: limits::MAX_BATCH_SIZE,
            });
        }

        if total_amount == 0 {
            self.events.emit(ProtocolEvent::YieldBatchTransferred {
                recipient,
                total_amount: 0,
                entries: collections.len() as u64,
            });
            return Ok(0);
        }

        // Single market withdrawal backs the whole batch
        let withdrawable = total_amount.min(self.available_yield());
        let withdrawn = if withdrawable == 0 {
            0
        } else {
            self.market
                .withdraw(withdrawable)
                .ok_or(ProtocolError::LendingManagerWithdrawFailed)?
        };

        let mut remaining = withdrawn;
        let mut transferred: u64 = 0;
        for (collection, amount) in collections.iter().zip(amounts.iter()) {
            let portion = (*amount).min(remaining);
            if portion == 0 {
                continue;
            }
            remaining -= portion;
            transferred = safe_add(transferred, portion)?;
            self.events.emit(ProtocolEvent::YieldTransferred {
                collection: *collection,
                recipient,
                amount: portion,
            });
        }

        ledger.credit(&recipient, transferred)?;
        self.events.emit(ProtocolEvent::YieldBatchTransferred {
            recipient,
            total_amount: transferred,
            entries: collections.len() as u64,
        });
        Ok(transferred)
    }

    /// Drain events emitted since the last drain
    pub fn take_events(&mut self) -> Vec<ProtocolEvent> {
        self.events.take()
    }
}

pub mod testing;
