//! Core Types for the NestYield Protocol
//!
//! This module defines the fundamental data structures used across the
//! protocol contracts: per-collection accounting records, epoch records,
//! subsidy claims, and weight-function metadata.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

/// Type alias for addresses (32-byte hash)
pub type Address = [u8; 32];

/// Type alias for collection identifiers (external grouping keys)
pub type CollectionId = [u8; 32];

/// Type alias for vault identifiers
pub type VaultId = [u8; 32];

/// The all-zero address, never a valid participant
pub const ZERO_ADDRESS: Address = [0u8; 32];

/// Returns true for the all-zero address
pub fn is_zero_address(address: &Address) -> bool {
    *address == ZERO_ADDRESS
}

// ============ Collection Accounting ============

/// Per-collection accounting record.
///
/// Tracks money flows attributed to one external grouping key. Share
/// custody is vault-wide and deliberately absent here: transferring
/// shares between holders never touches a collection record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct CollectionRecord {
    /// Current principal + accrued yield attributed to this collection
    pub total_assets_deposited: u64,
    /// Vault shares minted against this collection's deposits, net of redemptions
    pub total_shares_minted: u64,
    /// Adapter-side units attributed to this collection (informational)
    pub total_adapter_units: u64,
    /// Share of ongoing passive yield, in basis points (0-10000)
    pub passive_yield_share_bps: u64,
    /// Share of epoch-allocated yield, in basis points (0-10000)
    pub epoch_yield_share_bps: u64,
    /// Cumulative yield ever moved out on this collection's behalf
    pub total_yield_transferred: u64,
    /// Global deposit index at the last passive-yield accrual
    pub last_global_deposit_index: u128,
}

impl CollectionRecord {
    /// Create a fresh record, caught up to the given global index
    pub fn new(current_index: u128) -> Self {
        Self {
            total_assets_deposited: 0,
            total_shares_minted: 0,
            total_adapter_units: 0,
            passive_yield_share_bps: 0,
            epoch_yield_share_bps: 0,
            total_yield_transferred: 0,
            last_global_deposit_index: current_index,
        }
    }

    /// Check if the record can cover a withdrawal of `assets`
    pub fn can_cover(&self, assets: u64) -> bool {
        self.total_assets_deposited >= assets
    }
}

// ============ Epoch Types ============

/// Lifecycle status of an epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum EpochStatus {
    /// Epoch is open for yield allocation
    Active,
    /// Epoch ended, per-collection yield application in progress
    Processing,
    /// Epoch finalized with realized subsidy totals
    Completed,
    /// Administratively failed; permanently terminal
    Failed,
}

impl EpochStatus {
    /// Human-readable status name for error payloads
    pub fn name(&self) -> &'static str {
        match self {
            EpochStatus::Active => "Active",
            EpochStatus::Processing => "Processing",
            EpochStatus::Completed => "Completed",
            EpochStatus::Failed => "Failed",
        }
    }
}

/// Recorded cause of an administrative epoch failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum EpochFailureReason {
    /// Manual admin action
    AdminAction,
    /// Allocation bookkeeping did not reconcile
    AllocationAnomaly,
    /// Subsidy settlement could not complete
    SettlementFailure,
}

/// One global accounting epoch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Epoch {
    /// Monotonic identifier, starting at 1
    pub id: u64,
    /// Wall-clock start time (seconds)
    pub start_time: u64,
    /// Wall-clock end time: start + configured duration
    pub end_time: u64,
    /// Yield allocated into this epoch across all participating vaults
    pub total_yield_allocated: u64,
    /// Realized subsidy total recorded at finalization
    pub total_subsidies_distributed: u64,
    /// Current lifecycle status
    pub status: EpochStatus,
    /// Failure cause, set only for Failed epochs
    pub failure_reason: Option<EpochFailureReason>,
}

impl Epoch {
    /// Create a new active epoch
    pub fn new(id: u64, start_time: u64, duration_secs: u64) -> Self {
        Self {
            id,
            start_time,
            end_time: start_time.saturating_add(duration_secs),
            total_yield_allocated: 0,
            total_subsidies_distributed: 0,
            status: EpochStatus::Active,
            failure_reason: None,
        }
    }

    /// Check whether the epoch's end time has been reached
    pub fn is_ended(&self, now: u64) -> bool {
        now >= self.end_time
    }
}

// ============ Subsidy Claim Types ============

/// One signed subsidy claim entry.
///
/// Authenticated as part of a batch by a signature over the batch digest;
/// nonces are per (vault, account) and strictly sequential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct ClaimEntry {
    /// Account the subsidy settles against
    pub account: Address,
    /// Collection the subsidy is attributed to
    pub collection: CollectionId,
    /// Vault holding the pooled funds
    pub vault: VaultId,
    /// Pre-computed subsidy amount (asset base units)
    pub amount: u64,
    /// Per-(vault, account) sequence number; must match exactly
    pub nonce: u64,
    /// Latest acceptance time (seconds); expired entries are rejected
    pub deadline: u64,
}

// ============ Weight Function Metadata ============

/// Shape of the off-chain subsidy weight function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum WeightFunctionKind {
    Linear,
    Exponential,
}

/// Off-chain-evaluated weight function attached per (vault, collection).
///
/// Inert configuration: stored and emitted on change, never evaluated by
/// the protocol. It informs how an external process computes the signed
/// subsidy amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct WeightFunction {
    /// Curve family
    pub kind: WeightFunctionKind,
    /// First curve parameter
    pub p1: u64,
    /// Second curve parameter
    pub p2: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_address() {
        assert!(is_zero_address(&ZERO_ADDRESS));
        assert!(!is_zero_address(&[1u8; 32]));
    }

    #[test]
    fn test_new_collection_record() {
        let record = CollectionRecord::new(crate::constants::index::INITIAL);
        assert_eq!(record.total_assets_deposited, 0);
        assert_eq!(record.total_shares_minted, 0);
        assert_eq!(record.last_global_deposit_index, crate::constants::index::INITIAL);
        assert!(record.can_cover(0));
        assert!(!record.can_cover(1));
    }

    #[test]
    fn test_epoch_end_time() {
        let epoch = Epoch::new(1, 1_000, 3_600);
        assert_eq!(epoch.end_time, 4_600);
        assert!(!epoch.is_ended(4_599));
        assert!(epoch.is_ended(4_600));
        assert_eq!(epoch.status, EpochStatus::Active);
    }

    #[test]
    fn test_claim_entry_roundtrip() {
        let entry = ClaimEntry {
            account: [1u8; 32],
            collection: [2u8; 32],
            vault: [3u8; 32],
            amount: 500,
            nonce: 0,
            deadline: 10_000,
        };

        let bytes = borsh::to_vec(&entry).unwrap();
        let restored: ClaimEntry = borsh::from_slice(&bytes).unwrap();
        assert_eq!(entry, restored);
    }
}
