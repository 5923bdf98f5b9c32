//! Collections Vault for the NestYield Protocol
//!
//! Share-based pooled vault with per-collection bookkeeping. Users
//! deposit the underlying asset "for" a collection; pooled funds are
//! placed with the lending adapter, and yield flows back through two
//! channels:
//!
//! - **Passive accrual**: the global deposit index advances against the
//!   adapter's valuation and each collection is credited proportionally
//!   to its booked assets and passive share percentage
//! - **Epoch yield**: slices of available yield are allocated into the
//!   epoch scheduler and later applied per collection once the epoch is
//!   processing
//!
//! Invariants held across every operation:
//!
//! - The sum of all collection `total_assets_deposited` equals the
//!   vault's total claim on pooled assets
//! - Combined epoch-yield shares never exceed 10_000 bps
//! - Share transfers never mutate collection records
//!
//! Every state-mutating entry point is wrapped in an explicit busy-flag
//! reentrancy guard; re-entering mid-operation fails with
//! `ReentrantCall`.

use nestyield_common::{
    constants::{bps, index, limits},
    errors::{ProtocolError, ProtocolResult},
    events::{EventLog, ProtocolEvent},
    math::{
        accrued_passive_yield, assets_to_shares, bps_share, compute_deposit_index, mul_div,
        safe_add, safe_sub, shares_for_assets, shares_to_assets,
    },
    pause::{PausableOperation, PauseState},
    types::{is_zero_address, Address, CollectionId, CollectionRecord, EpochStatus},
    AccessController, BTreeMap, BTreeSet, Role, TokenLedger, Vec,
};
use nestyield_epoch_scheduler::EpochScheduler;
use nestyield_lending_adapter::{LendingAdapter, LendingMarket};

pub mod shares;

pub use shares::ShareLedger;

/// Aggregate vault statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultStats {
    /// Number of registered collections
    pub collections: u64,
    /// Sum of all collection assets (principal + recognized yield)
    pub total_assets_deposited: u64,
    /// Shares outstanding across all holders
    pub total_shares: u64,
    /// Current global deposit index
    pub global_deposit_index: u128,
    /// Cumulative yield allocated into epochs
    pub total_epoch_yield_allocated: u64,
}

/// Share-based pooled vault with per-collection accounting
#[derive(Debug)]
pub struct CollectionsVault {
    /// Custody address of the vault in the asset ledger
    address: Address,
    /// Registered collections and their accounting records
    collections: BTreeMap<CollectionId, CollectionRecord>,
    /// Maintained aggregate of all records' `total_assets_deposited`
    total_assets_deposited: u64,
    /// Vault-wide fungible share balances
    shares: ShareLedger,
    /// Cumulative assets-per-principal index, scaled by 1e18
    global_deposit_index: u128,
    /// Cumulative yield allocated into epochs by this vault
    total_epoch_yield_allocated: u64,
    /// (epoch, collection) pairs whose epoch yield was already applied
    epoch_applied: BTreeSet<(u64, CollectionId)>,
    /// Pause state for deposits/withdrawals/claims
    pause: PauseState,
    /// Reentrancy busy flag
    entered: bool,
    events: EventLog,
}

impl CollectionsVault {
    /// Create a vault with the given custody address
    pub fn new(address: Address) -> ProtocolResult<Self> {
        if is_zero_address(&address) {
            return Err(ProtocolError::ZeroAddress { param: "vault" });
        }
        Ok(Self {
            address,
            collections: BTreeMap::new(),
            total_assets_deposited: 0,
            shares: ShareLedger::new(),
            global_deposit_index: index::INITIAL,
            total_epoch_yield_allocated: 0,
            epoch_applied: BTreeSet::new(),
            pause: PauseState::new(),
            entered: false,
            events: EventLog::new(),
        })
    }

    // ============ Queries ============

    /// Custody address of this vault
    pub fn address(&self) -> Address {
        self.address
    }

    /// Accounting record of a collection, if registered
    pub fn collection(&self, collection: &CollectionId) -> Option<&CollectionRecord> {
        self.collections.get(collection)
    }

    /// The vault's total claim on pooled assets
    pub fn total_assets_deposited(&self) -> u64 {
        self.total_assets_deposited
    }

    /// Current global deposit index
    pub fn global_deposit_index(&self) -> u128 {
        self.global_deposit_index
    }

    /// Cumulative yield this vault has allocated into epochs
    pub fn total_epoch_yield_allocated(&self) -> u64 {
        self.total_epoch_yield_allocated
    }

    /// Share balance of a holder
    pub fn share_balance_of(&self, holder: &Address) -> u64 {
        self.shares.balance_of(holder)
    }

    /// Shares outstanding across all holders
    pub fn total_shares(&self) -> u64 {
        self.shares.total_supply()
    }

    /// Aggregate statistics over all collections
    pub fn vault_stats(&self) -> VaultStats {
        VaultStats {
            collections: self.collections.len() as u64,
            total_assets_deposited: self.total_assets_deposited,
            total_shares: self.shares.total_supply(),
            global_deposit_index: self.global_deposit_index,
            total_epoch_yield_allocated: self.total_epoch_yield_allocated,
        }
    }

    /// Verify the aggregate counter against the per-collection records.
    /// Test hook for the conservation invariant.
    pub fn check_conservation(&self) -> bool {
        let sum: u128 = self
            .collections
            .values()
            .map(|r| r.total_assets_deposited as u128)
            .sum();
        sum == self.total_assets_deposited as u128
    }

    /// Drain events emitted since the last drain
    pub fn take_events(&mut self) -> Vec<ProtocolEvent> {
        self.events.take()
    }

    // ============ Admin Operations ============

    /// Register a collection with zeroed balances, caught up to the
    /// current global index.
    pub fn register_collection(
        &mut self,
        collection: CollectionId,
        caller: &Address,
        access: &AccessController,
    ) -> ProtocolResult<()> {
        access.require(caller, Role::Admin)?;
        if is_zero_address(&collection) {
            return Err(ProtocolError::ZeroAddress { param: "collection" });
        }
        if self.collections.contains_key(&collection) {
            return Err(ProtocolError::CollectionAlreadyRegistered { collection });
        }

        self.collections.insert(collection, CollectionRecord::new(self.global_deposit_index));
        self.events.emit(ProtocolEvent::CollectionRegistered { collection });
        Ok(())
    }

    /// Update a collection's yield share percentage.
    ///
    /// Passive and epoch percentages move together. Rejected if the
    /// resulting sum of all epoch shares would exceed the 10_000 bps
    /// cap, leaving every percentage unchanged.
    pub fn set_collection_yield_share(
        &mut self,
        collection: CollectionId,
        share_bps: u64,
        caller: &Address,
        access: &AccessController,
    ) -> ProtocolResult<()> {
        access.require(caller, Role::Admin)?;
        if share_bps > bps::MAX_TOTAL_SHARE {
            return Err(ProtocolError::ShareCapExceeded {
                requested_total: share_bps,
                maximum: bps::MAX_TOTAL_SHARE,
            });
        }

        let current = self
            .collections
            .get(&collection)
            .ok_or(ProtocolError::CollectionNotFound { collection })?
            .epoch_yield_share_bps;

        let others: u64 = self
            .collections
            .values()
            .map(|r| r.epoch_yield_share_bps)
            .sum::<u64>()
            - current;
        let new_total = safe_add(others, share_bps)?;
        if new_total > bps::MAX_TOTAL_SHARE {
            return Err(ProtocolError::ShareCapExceeded {
                requested_total: new_total,
                maximum: bps::MAX_TOTAL_SHARE,
            });
        }

        // Checks passed: apply both percentages together
        if let Some(record) = self.collections.get_mut(&collection) {
            record.passive_yield_share_bps = share_bps;
            record.epoch_yield_share_bps = share_bps;
        }
        self.events.emit(ProtocolEvent::YieldShareUpdated {
            collection,
            share_bps,
            total_epoch_share_bps: new_total,
        });
        Ok(())
    }

    /// Pause an operation class
    pub fn pause_operation(
        &mut self,
        operation: PausableOperation,
        caller: &Address,
        access: &AccessController,
    ) -> ProtocolResult<()> {
        access.require(caller, Role::Pauser)?;
        self.pause.pause(operation);
        self.events.emit(ProtocolEvent::OperationsPaused {
            operations: operation.mask(),
            by: *caller,
        });
        Ok(())
    }

    /// Unpause an operation class
    pub fn unpause_operation(
        &mut self,
        operation: PausableOperation,
        caller: &Address,
        access: &AccessController,
    ) -> ProtocolResult<()> {
        access.require(caller, Role::Pauser)?;
        self.pause.unpause(operation);
        self.events.emit(ProtocolEvent::OperationsUnpaused {
            operations: operation.mask(),
            by: *caller,
        });
        Ok(())
    }

    // ============ Share Custody ============

    /// Move shares between holders.
    ///
    /// Pure custody change: no collection record is touched, ever.
    pub fn transfer_shares(
        &mut self,
        from: &Address,
        to: &Address,
        amount: u64,
    ) -> ProtocolResult<()> {
        if is_zero_address(to) {
            return Err(ProtocolError::ZeroAddress { param: "to" });
        }
        self.shares.transfer(from, to, amount)
    }

    // ============ Deposits and Withdrawals ============

    /// Deposit `amount` for a collection, minting shares to `receiver`.
    ///
    /// Pulls the asset from `depositor`, forwards it to the lending
    /// adapter, and credits the collection's record. Zero amounts are
    /// legal and mint zero shares with no side effects. Returns the
    /// shares minted.
    pub fn deposit_for_collection<M: LendingMarket>(
        &mut self,
        amount: u64,
        depositor: &Address,
        receiver: &Address,
        collection: CollectionId,
        adapter: &mut LendingAdapter<M>,
        ledger: &mut TokenLedger,
    ) -> ProtocolResult<u64> {
        self.enter()?;
        let result = self.deposit_inner(amount, depositor, receiver, collection, adapter, ledger);
        self.exit();
        result
    }

    fn deposit_inner<M: LendingMarket>(
        &mut self,
        amount: u64,
        depositor: &Address,
        receiver: &Address,
        collection: CollectionId,
        adapter: &mut LendingAdapter<M>,
        ledger: &mut TokenLedger,
    ) -> ProtocolResult<u64> {
        self.pause.require_not_paused(PausableOperation::Deposits)?;
        if is_zero_address(depositor) {
            return Err(ProtocolError::ZeroAddress { param: "depositor" });
        }
        if is_zero_address(receiver) {
            return Err(ProtocolError::ZeroAddress { param: "receiver" });
        }
        if !self.collections.contains_key(&collection) {
            return Err(ProtocolError::CollectionNotFound { collection });
        }
        if amount == 0 {
            return Ok(0);
        }

        ledger.require_balance(depositor, amount)?;
        let minted = assets_to_shares(amount, self.shares.total_supply(), self.total_assets_deposited)?;

        // External call before local mutation: a rejected deposit leaves
        // the vault byte-for-byte unchanged
        adapter.deposit(amount)?;
        ledger.debit(depositor, amount)?;

        self.shares.mint(receiver, minted)?;
        self.total_assets_deposited = safe_add(self.total_assets_deposited, amount)?;
        if let Some(record) = self.collections.get_mut(&collection) {
            record.total_assets_deposited = safe_add(record.total_assets_deposited, amount)?;
            record.total_shares_minted = safe_add(record.total_shares_minted, minted)?;
            record.total_adapter_units = safe_add(record.total_adapter_units, amount)?;
        }

        self.events.emit(ProtocolEvent::CollectionDeposit {
            collection,
            depositor: *depositor,
            receiver: *receiver,
            assets: amount,
            shares: minted,
        });
        Ok(minted)
    }

    /// Withdraw an exact asset amount for a collection, burning the
    /// equivalent shares from `owner` and paying `receiver`.
    ///
    /// Fails with `CollectionInsufficientBalance` when `assets` exceeds
    /// the collection's booked balance, and with
    /// `LendingManagerWithdrawFailed` when the adapter cannot deliver
    /// the exact amount. Returns the shares burned.
    pub fn withdraw_for_collection<M: LendingMarket>(
        &mut self,
        assets: u64,
        receiver: &Address,
        owner: &Address,
        collection: CollectionId,
        adapter: &mut LendingAdapter<M>,
        ledger: &mut TokenLedger,
    ) -> ProtocolResult<u64> {
        self.enter()?;
        let result = self.withdraw_inner(assets, receiver, owner, collection, adapter, ledger);
        self.exit();
        result
    }

    fn withdraw_inner<M: LendingMarket>(
        &mut self,
        assets: u64,
        receiver: &Address,
        owner: &Address,
        collection: CollectionId,
        adapter: &mut LendingAdapter<M>,
        ledger: &mut TokenLedger,
    ) -> ProtocolResult<u64> {
        self.pause.require_not_paused(PausableOperation::Withdrawals)?;
        if is_zero_address(receiver) {
            return Err(ProtocolError::ZeroAddress { param: "receiver" });
        }
        let record = self
            .collections
            .get(&collection)
            .ok_or(ProtocolError::CollectionNotFound { collection })?;
        if assets == 0 {
            return Ok(0);
        }
        if !record.can_cover(assets) {
            return Err(ProtocolError::CollectionInsufficientBalance {
                collection,
                requested: assets,
                available: record.total_assets_deposited,
            });
        }

        let burned = shares_for_assets(assets, self.shares.total_supply(), self.total_assets_deposited)?;
        self.shares.require_balance(owner, burned)?;

        // Exact-amount path: a partial delivery is returned to the
        // market and reported as an adapter failure
        let actual = adapter.withdraw(assets)?;
        if actual < assets {
            let _ = adapter.deposit(actual);
            return Err(ProtocolError::LendingManagerWithdrawFailed);
        }

        ledger.credit(receiver, assets)?;
        self.apply_withdrawal(collection, assets, burned, owner)?;

        self.events.emit(ProtocolEvent::CollectionWithdraw {
            collection,
            receiver: *receiver,
            owner: *owner,
            assets,
            shares: burned,
        });
        Ok(burned)
    }

    /// Redeem a share amount for a collection.
    ///
    /// Shares-denominated dual of withdrawal. The adapter may deliver
    /// less than the shares' notional value; the shortfall is accepted
    /// as long as the delivery covers the shares' proportional claim on
    /// principal, and the assets actually received are returned.
    pub fn redeem_for_collection<M: LendingMarket>(
        &mut self,
        share_amount: u64,
        receiver: &Address,
        owner: &Address,
        collection: CollectionId,
        adapter: &mut LendingAdapter<M>,
        ledger: &mut TokenLedger,
    ) -> ProtocolResult<u64> {
        self.enter()?;
        let result = self.redeem_inner(share_amount, receiver, owner, collection, adapter, ledger);
        self.exit();
        result
    }

    fn redeem_inner<M: LendingMarket>(
        &mut self,
        share_amount: u64,
        receiver: &Address,
        owner: &Address,
        collection: CollectionId,
        adapter: &mut LendingAdapter<M>,
        ledger: &mut TokenLedger,
    ) -> ProtocolResult<u64> {
        self.pause.require_not_paused(PausableOperation::Withdrawals)?;
        if is_zero_address(receiver) {
            return Err(ProtocolError::ZeroAddress { param: "receiver" });
        }
        let record = self
            .collections
            .get(&collection)
            .ok_or(ProtocolError::CollectionNotFound { collection })?;
        if share_amount == 0 {
            return Ok(0);
        }
        self.shares.require_balance(owner, share_amount)?;

        let notional = shares_to_assets(share_amount, self.shares.total_supply(), self.total_assets_deposited)?;
        if !record.can_cover(notional) {
            return Err(ProtocolError::CollectionInsufficientBalance {
                collection,
                requested: notional,
                available: record.total_assets_deposited,
            });
        }

        // The delivery floor is the shares' proportional claim on
        // principal, never above the notional itself; yield slack above
        // the floor may be lost to degradation
        let principal_floor = if self.total_assets_deposited == 0 {
            0
        } else {
            mul_div(notional, adapter.total_principal_deposited(), self.total_assets_deposited)?
                .min(notional)
        };

        let actual = adapter.withdraw(notional)?;
        if actual < principal_floor {
            let _ = adapter.deposit(actual);
            return Err(ProtocolError::LendingManagerWithdrawFailed);
        }

        ledger.credit(receiver, actual)?;
        self.apply_withdrawal(collection, notional, share_amount, owner)?;

        self.events.emit(ProtocolEvent::CollectionWithdraw {
            collection,
            receiver: *receiver,
            owner: *owner,
            assets: actual,
            shares: share_amount,
        });
        Ok(actual)
    }

    /// Common bookkeeping for withdrawals and redemptions
    fn apply_withdrawal(
        &mut self,
        collection: CollectionId,
        assets: u64,
        burned: u64,
        owner: &Address,
    ) -> ProtocolResult<()> {
        self.shares.burn(owner, burned)?;
        self.total_assets_deposited = safe_sub(self.total_assets_deposited, assets)?;
        if let Some(record) = self.collections.get_mut(&collection) {
            record.total_assets_deposited = safe_sub(record.total_assets_deposited, assets)?;
            record.total_shares_minted = record.total_shares_minted.saturating_sub(burned);
            record.total_adapter_units = record.total_adapter_units.saturating_sub(assets);
        }
        Ok(())
    }

    // ============ Passive Yield ============

    /// Recompute the global deposit index from the adapter's freshest
    /// valuation and credit passive yield to every collection that is
    /// behind.
    ///
    /// A collection already caught up, or holding a 0% passive share,
    /// accrues nothing and emits nothing - its stored index still
    /// advances. Returns the total yield credited.
    pub fn index_collections_deposits<M: LendingMarket>(
        &mut self,
        adapter: &LendingAdapter<M>,
        caller: &Address,
        access: &AccessController,
    ) -> ProtocolResult<u64> {
        access.require(caller, Role::Operator)?;
        self.enter()?;
        let result = self.index_inner(adapter);
        self.exit();
        result
    }

    fn index_inner<M: LendingMarket>(&mut self, adapter: &LendingAdapter<M>) -> ProtocolResult<u64> {
        let old_index = self.global_deposit_index;
        let total_assets = adapter.total_assets();
        let total_principal = adapter.total_principal_deposited();
        let new_index = compute_deposit_index(total_assets, total_principal, old_index);

        if new_index > old_index {
            self.events.emit(ProtocolEvent::DepositIndexUpdated {
                old_index,
                new_index,
                total_assets,
                total_principal,
            });
        }

        let ids: Vec<CollectionId> = self.collections.keys().copied().collect();
        let mut total_credited: u64 = 0;
        for id in ids {
            let (balance, last_index, share_bps) = match self.collections.get(&id) {
                Some(r) => (r.total_assets_deposited, r.last_global_deposit_index, r.passive_yield_share_bps),
                None => continue,
            };
            if last_index >= new_index {
                continue;
            }

            let credit = accrued_passive_yield(balance, last_index, new_index, share_bps)?;
            if credit > 0 {
                self.total_assets_deposited = safe_add(self.total_assets_deposited, credit)?;
                total_credited = safe_add(total_credited, credit)?;
            }
            if let Some(record) = self.collections.get_mut(&id) {
                record.total_assets_deposited = safe_add(record.total_assets_deposited, credit)?;
                record.last_global_deposit_index = new_index;
                if credit > 0 {
                    let new_total = record.total_assets_deposited;
                    self.events.emit(ProtocolEvent::PassiveYieldAccrued {
                        collection: id,
                        amount: credit,
                        new_total_assets: new_total,
                        index: new_index,
                    });
                }
            }
        }

        self.global_deposit_index = new_index;
        Ok(total_credited)
    }

    // ============ Epoch Yield ============

    /// Allocate a slice of available yield into the current epoch.
    ///
    /// `available = max(0, adapter valuation - principal) - already
    /// allocated`. Allocating exactly zero always succeeds and emits a
    /// zero-amount event. Scheduler rejection propagates as
    /// `EpochManagerAllocationFailed` with no local effect.
    pub fn allocate_epoch_yield<M: LendingMarket>(
        &mut self,
        amount: u64,
        scheduler: &mut EpochScheduler,
        adapter: &LendingAdapter<M>,
        caller: &Address,
        access: &AccessController,
    ) -> ProtocolResult<()> {
        access.require(caller, Role::Operator)?;
        self.enter()?;
        let result = self.allocate_inner(amount, scheduler, adapter);
        self.exit();
        result
    }

    fn allocate_inner<M: LendingMarket>(
        &mut self,
        amount: u64,
        scheduler: &mut EpochScheduler,
        adapter: &LendingAdapter<M>,
    ) -> ProtocolResult<()> {
        let available = adapter
            .available_yield()
            .saturating_sub(self.total_epoch_yield_allocated);
        if amount > available {
            return Err(ProtocolError::InsufficientYield {
                requested: amount,
                available,
            });
        }

        scheduler
            .allocate_vault_yield(self.address, amount)
            .map_err(|_| ProtocolError::EpochManagerAllocationFailed)?;

        self.total_epoch_yield_allocated = safe_add(self.total_epoch_yield_allocated, amount)?;
        self.events.emit(ProtocolEvent::EpochYieldAllocated {
            epoch_id: scheduler.current_epoch_id(),
            vault: self.address,
            amount,
        });
        Ok(())
    }

    /// Apply a processing epoch's yield share to one collection.
    ///
    /// `share = epoch allocation x epoch_yield_share_bps / 10_000`. A 0%
    /// share or a zero allocation is a legal no-op that still emits a
    /// zero-amount event for auditability. Each (epoch, collection) pair
    /// applies at most once.
    pub fn apply_collection_epoch_yield(
        &mut self,
        collection: CollectionId,
        epoch_id: u64,
        scheduler: &EpochScheduler,
        caller: &Address,
        access: &AccessController,
    ) -> ProtocolResult<u64> {
        access.require(caller, Role::Operator)?;
        self.enter()?;
        let result = self.apply_epoch_inner(collection, epoch_id, scheduler);
        self.exit();
        result
    }

    fn apply_epoch_inner(
        &mut self,
        collection: CollectionId,
        epoch_id: u64,
        scheduler: &EpochScheduler,
    ) -> ProtocolResult<u64> {
        let record = self
            .collections
            .get(&collection)
            .ok_or(ProtocolError::CollectionNotFound { collection })?;
        let share_bps = record.epoch_yield_share_bps;

        let epoch = scheduler
            .epoch(epoch_id)
            .ok_or(ProtocolError::InvalidEpochId { epoch_id })?;
        if epoch.status != EpochStatus::Processing {
            return Err(ProtocolError::InvalidEpochStatus {
                epoch_id,
                current: epoch.status.name(),
                required: EpochStatus::Processing.name(),
            });
        }
        if self.epoch_applied.contains(&(epoch_id, collection)) {
            return Err(ProtocolError::EpochYieldAlreadyApplied { collection, epoch_id });
        }

        let allocation = scheduler.vault_allocation(epoch_id, &self.address);
        let amount = bps_share(allocation, share_bps)?;

        self.epoch_applied.insert((epoch_id, collection));
        self.total_assets_deposited = safe_add(self.total_assets_deposited, amount)?;
        let new_total = if let Some(record) = self.collections.get_mut(&collection) {
            record.total_assets_deposited = safe_add(record.total_assets_deposited, amount)?;
            record.total_assets_deposited
        } else {
            0
        };

        self.events.emit(ProtocolEvent::EpochYieldApplied {
            epoch_id,
            collection,
            amount,
            share_bps,
            new_total_assets: new_total,
        });
        Ok(amount)
    }

    // ============ Behalf Repayment ============

    /// Withdraw `total_to_withdraw` from the adapter once, then forward
    /// behalf-repayments per (collection, borrower, amount) entry.
    ///
    /// Zero-amount entries are skipped. The batch fails atomically -
    /// before any external repayment - when the parallel arrays
    /// disagree, the batch is oversized, a named collection is unknown,
    /// or the cumulative requested amounts exceed the withdrawn
    /// allowance. Amounts the market accepts short of the request stay
    /// in the vault's own balance. Returns the total actually forwarded.
    pub fn repay_borrow_behalf_batch<M: LendingMarket>(
        &mut self,
        collections: &[CollectionId],
        amounts: &[u64],
        borrowers: &[Address],
        total_to_withdraw: u64,
        adapter: &mut LendingAdapter<M>,
        ledger: &mut TokenLedger,
        caller: &Address,
        access: &AccessController,
    ) -> ProtocolResult<u64> {
        access.require(caller, Role::ClaimEngine)?;
        self.enter()?;
        let result = self.repay_batch_inner(collections, amounts, borrowers, total_to_withdraw, adapter, ledger);
        self.exit();
        result
    }

    fn repay_batch_inner<M: LendingMarket>(
        &mut self,
        collections: &[CollectionId],
        amounts: &[u64],
        borrowers: &[Address],
        total_to_withdraw: u64,
        adapter: &mut LendingAdapter<M>,
        ledger: &mut TokenLedger,
    ) -> ProtocolResult<u64> {
        self.pause.require_not_paused(PausableOperation::Claims)?;
        if collections.len() != amounts.len() {
            return Err(ProtocolError::ArrayLengthMismatch {
                left: collections.len(),
                right: amounts.len(),
            });
        }
        if collections.len() != borrowers.len() {
            return Err(ProtocolError::ArrayLengthMismatch {
                left: collections.len(),
                right: borrowers.len(),
            });
        }
        if collections.len() > limits::MAX_BATCH_SIZE {
            return Err(ProtocolError::BatchTooLarge {
                size: collections.len(),
                maximum: limits::MAX_BATCH_SIZE,
            });
        }

        // All validation happens before the first external call, so a
        // mid-batch allowance failure reverts the whole call
        let mut requested: u64 = 0;
        for ((collection, amount), borrower) in collections.iter().zip(amounts).zip(borrowers) {
            if *amount == 0 {
                continue;
            }
            if !self.collections.contains_key(collection) {
                return Err(ProtocolError::CollectionNotFound { collection: *collection });
            }
            requested = safe_add(requested, *amount)?;
            if requested > total_to_withdraw {
                return Err(ProtocolError::RepayFailed {
                    borrower: *borrower,
                    requested: *amount,
                });
            }
        }

        let withdrawn = adapter.withdraw_for_subsidy(total_to_withdraw)?;
        if withdrawn < requested {
            let _ = adapter.redeposit_yield(withdrawn);
            return Err(ProtocolError::LendingManagerWithdrawFailed);
        }
        ledger.credit(&self.address, withdrawn)?;

        let mut forwarded: u64 = 0;
        let mut entries: u64 = 0;
        for ((collection, amount), borrower) in collections.iter().zip(amounts).zip(borrowers) {
            if *amount == 0 {
                continue;
            }
            entries += 1;
            let accepted = adapter.behalf_repay(*borrower, *amount);
            if accepted == 0 {
                continue;
            }
            ledger.debit(&self.address, accepted)?;
            forwarded = safe_add(forwarded, accepted)?;
            if let Some(record) = self.collections.get_mut(collection) {
                record.total_yield_transferred = safe_add(record.total_yield_transferred, accepted)?;
            }
        }

        self.events.emit(ProtocolEvent::BatchRepaid {
            total_withdrawn: withdrawn,
            total_repaid: forwarded,
            entries,
        });
        Ok(forwarded)
    }

    // ============ Reentrancy Guard ============

    fn enter(&mut self) -> ProtocolResult<()> {
        if self.entered {
            return Err(ProtocolError::ReentrantCall);
        }
        self.entered = true;
        Ok(())
    }

    fn exit(&mut self) {
        self.entered = false;
    }
}
