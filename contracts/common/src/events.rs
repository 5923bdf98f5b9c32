//! Protocol Events for NestYield
//!
//! Events are emitted during contract execution and can be indexed
//! off-chain for auditing, analytics, and monitoring. They are
//! observability records only: nothing in the protocol retries or
//! replays them.

use crate::access_control::Role;
use crate::types::{Address, CollectionId, EpochFailureReason, VaultId, WeightFunctionKind};
use crate::Vec;
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

/// Event types for indexing and filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
#[borsh(use_discriminant = true)]
#[repr(u8)]
pub enum EventType {
    // Vault Events (0x01 - 0x1F)
    CollectionRegistered = 0x01,
    CollectionDeposit = 0x02,
    CollectionWithdraw = 0x03,
    DepositIndexUpdated = 0x04,
    PassiveYieldAccrued = 0x05,
    YieldShareUpdated = 0x06,
    EpochYieldAllocated = 0x07,
    EpochYieldApplied = 0x08,
    BatchRepaid = 0x09,

    // Lending Adapter Events (0x20 - 0x3F)
    YieldTransferred = 0x20,
    YieldBatchTransferred = 0x21,
    YieldWithdrawn = 0x22,

    // Epoch Events (0x40 - 0x5F)
    EpochStarted = 0x40,
    EpochProcessing = 0x41,
    EpochFinalized = 0x42,
    EpochFailed = 0x43,

    // Subsidy Events (0x60 - 0x7F)
    VaultRegistered = 0x60,
    CollectionWhitelisted = 0x61,
    CollectionDelisted = 0x62,
    WeightFunctionUpdated = 0x63,
    ClaimNonceAdvanced = 0x64,
    SubsidyApplied = 0x65,

    // Protocol Events (0x80 - 0x9F)
    OperationsPaused = 0x80,
    OperationsUnpaused = 0x81,
    RoleGranted = 0x82,
    RoleRevoked = 0x83,
}

/// Main event enum containing all protocol events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum ProtocolEvent {
    // ============ Vault Events ============

    /// Emitted when a collection is registered with a vault
    CollectionRegistered { collection: CollectionId },

    /// Emitted on a deposit attributed to a collection
    CollectionDeposit {
        collection: CollectionId,
        depositor: Address,
        receiver: Address,
        assets: u64,
        shares: u64,
    },

    /// Emitted on a withdrawal or redemption attributed to a collection
    CollectionWithdraw {
        collection: CollectionId,
        receiver: Address,
        owner: Address,
        assets: u64,
        shares: u64,
    },

    /// Emitted when the global deposit index advances
    DepositIndexUpdated {
        old_index: u128,
        new_index: u128,
        total_assets: u64,
        total_principal: u64,
    },

    /// Emitted per collection receiving passive yield from an index advance
    PassiveYieldAccrued {
        collection: CollectionId,
        amount: u64,
        new_total_assets: u64,
        index: u128,
    },

    /// Emitted when a collection's yield share percentages change
    YieldShareUpdated {
        collection: CollectionId,
        share_bps: u64,
        total_epoch_share_bps: u64,
    },

    /// Emitted when the vault allocates yield into the current epoch
    EpochYieldAllocated {
        epoch_id: u64,
        vault: VaultId,
        amount: u64,
    },

    /// Emitted when an epoch's yield share is applied to a collection
    EpochYieldApplied {
        epoch_id: u64,
        collection: CollectionId,
        amount: u64,
        share_bps: u64,
        new_total_assets: u64,
    },

    /// Aggregate record of one behalf-repayment batch
    BatchRepaid {
        total_withdrawn: u64,
        total_repaid: u64,
        entries: u64,
    },

    // ============ Lending Adapter Events ============

    /// Emitted per collection in a yield transfer
    YieldTransferred {
        collection: CollectionId,
        recipient: Address,
        amount: u64,
    },

    /// Aggregate record of one yield-transfer batch
    YieldBatchTransferred {
        recipient: Address,
        total_amount: u64,
        entries: u64,
    },

    /// Emitted on a single (non-batch) yield transfer
    YieldWithdrawn { recipient: Address, amount: u64 },

    // ============ Epoch Events ============

    /// Emitted when a new epoch starts
    EpochStarted {
        epoch_id: u64,
        start_time: u64,
        end_time: u64,
    },

    /// Emitted when an epoch enters processing
    EpochProcessing {
        epoch_id: u64,
        total_yield_allocated: u64,
    },

    /// Emitted when an epoch is finalized
    EpochFinalized {
        epoch_id: u64,
        total_subsidies_distributed: u64,
    },

    /// Emitted when an epoch is administratively failed
    EpochFailed {
        epoch_id: u64,
        reason: EpochFailureReason,
    },

    // ============ Subsidy Events ============

    /// Emitted when a vault is registered with the claim engine
    VaultRegistered { vault: VaultId, signer: Address },

    /// Emitted when a collection is whitelisted for a vault
    CollectionWhitelisted { vault: VaultId, collection: CollectionId },

    /// Emitted when a collection is removed from a vault's whitelist
    CollectionDelisted { vault: VaultId, collection: CollectionId },

    /// Emitted when a (vault, collection) weight function changes
    WeightFunctionUpdated {
        vault: VaultId,
        collection: CollectionId,
        kind: WeightFunctionKind,
        p1: u64,
        p2: u64,
    },

    /// Emitted when a claim consumes a (vault, account) nonce
    ClaimNonceAdvanced {
        vault: VaultId,
        account: Address,
        new_nonce: u64,
    },

    /// Emitted per applied subsidy entry grouping
    SubsidyApplied {
        vault: VaultId,
        account: Address,
        collection: CollectionId,
        amount: u64,
        total_claimed: u64,
    },

    // ============ Protocol Events ============

    /// Emitted when operations are paused
    OperationsPaused { operations: u8, by: Address },

    /// Emitted when operations are unpaused
    OperationsUnpaused { operations: u8, by: Address },

    /// Emitted when a role is granted
    RoleGranted { account: Address, role: Role },

    /// Emitted when a role is revoked
    RoleRevoked { account: Address, role: Role },
}

impl ProtocolEvent {
    /// Get the event type for filtering
    pub fn event_type(&self) -> EventType {
        match self {
            Self::CollectionRegistered { .. } => EventType::CollectionRegistered,
            Self::CollectionDeposit { .. } => EventType::CollectionDeposit,
            Self::CollectionWithdraw { .. } => EventType::CollectionWithdraw,
            Self::DepositIndexUpdated { .. } => EventType::DepositIndexUpdated,
            Self::PassiveYieldAccrued { .. } => EventType::PassiveYieldAccrued,
            Self::YieldShareUpdated { .. } => EventType::YieldShareUpdated,
            Self::EpochYieldAllocated { .. } => EventType::EpochYieldAllocated,
            Self::EpochYieldApplied { .. } => EventType::EpochYieldApplied,
            Self::BatchRepaid { .. } => EventType::BatchRepaid,
            Self::YieldTransferred { .. } => EventType::YieldTransferred,
            Self::YieldBatchTransferred { .. } => EventType::YieldBatchTransferred,
            Self::YieldWithdrawn { .. } => EventType::YieldWithdrawn,
            Self::EpochStarted { .. } => EventType::EpochStarted,
            Self::EpochProcessing { .. } => EventType::EpochProcessing,
            Self::EpochFinalized { .. } => EventType::EpochFinalized,
            Self::EpochFailed { .. } => EventType::EpochFailed,
            Self::VaultRegistered { .. } => EventType::VaultRegistered,
            Self::CollectionWhitelisted { .. } => EventType::CollectionWhitelisted,
            Self::CollectionDelisted { .. } => EventType::CollectionDelisted,
            Self::WeightFunctionUpdated { .. } => EventType::WeightFunctionUpdated,
            Self::ClaimNonceAdvanced { .. } => EventType::ClaimNonceAdvanced,
            Self::SubsidyApplied { .. } => EventType::SubsidyApplied,
            Self::OperationsPaused { .. } => EventType::OperationsPaused,
            Self::OperationsUnpaused { .. } => EventType::OperationsUnpaused,
            Self::RoleGranted { .. } => EventType::RoleGranted,
            Self::RoleRevoked { .. } => EventType::RoleRevoked,
        }
    }

    /// Serialize event to bytes for storage/transmission
    pub fn to_bytes(&self) -> Vec<u8> {
        borsh::to_vec(self).unwrap_or_default()
    }

    /// Deserialize event from bytes
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        borsh::from_slice(bytes).ok()
    }
}

/// Event log for collecting multiple events during execution
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<ProtocolEvent>,
}

impl EventLog {
    /// Create a new empty event log
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Emit an event (add to log)
    pub fn emit(&mut self, event: ProtocolEvent) {
        self.events.push(event);
    }

    /// Get all events
    pub fn events(&self) -> &[ProtocolEvent] {
        &self.events
    }

    /// Take ownership of all events, leaving the log empty
    pub fn take(&mut self) -> Vec<ProtocolEvent> {
        core::mem::take(&mut self.events)
    }

    /// Filter events by type
    pub fn filter_by_type(&self, event_type: EventType) -> Vec<&ProtocolEvent> {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    /// Check if any events were emitted
    pub fn has_events(&self) -> bool {
        !self.events.is_empty()
    }

    /// Get number of events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if the log is empty
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Clear all events
    pub fn clear(&mut self) {
        self.events.clear();
    }
}
