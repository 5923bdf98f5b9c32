//! Error Types for the NestYield Protocol
//!
//! Typed errors with stable codes, grouped per subsystem. Validation
//! errors are raised before any state change; external-dependency
//! failures carry distinct variants so callers and monitoring can tell
//! which subsystem needs attention.

use crate::types::{Address, CollectionId};

/// Result type alias for NestYield operations
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Main error enum for all NestYield protocol errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    // ============ Input Validation Errors ============
    /// Zero address where a real address is required
    ZeroAddress { param: &'static str },

    /// Parallel batch arrays differ in length
    ArrayLengthMismatch { left: usize, right: usize },

    /// Batch size exceeds maximum
    BatchTooLarge { size: usize, maximum: usize },

    /// Zero amount where a non-zero amount is required
    ZeroAmount,

    /// Combined yield-share percentage would exceed the global cap
    ShareCapExceeded { requested_total: u64, maximum: u64 },

    /// Collection is not registered with the vault
    CollectionNotFound { collection: CollectionId },

    /// Collection is already registered with the vault
    CollectionAlreadyRegistered { collection: CollectionId },

    // ============ Balance / Capacity Errors ============
    /// Withdrawal exceeds the collection's booked assets
    CollectionInsufficientBalance {
        collection: CollectionId,
        requested: u64,
        available: u64,
    },

    /// Requested yield allocation exceeds unallocated yield
    InsufficientYield { requested: u64, available: u64 },

    /// Account balance too low for the operation
    InsufficientBalance { account: Address, requested: u64, available: u64 },

    /// Share balance too low for the burn
    InsufficientShares { owner: Address, requested: u64, available: u64 },

    // ============ Epoch Errors ============
    /// Epoch is not in the status the operation requires
    InvalidEpochStatus {
        epoch_id: u64,
        current: &'static str,
        required: &'static str,
    },

    /// Epoch end time has not been reached yet
    EpochNotEnded { epoch_id: u64, end_time: u64, now: u64 },

    /// No epoch with that id has ever started
    InvalidEpochId { epoch_id: u64 },

    /// Epoch yield was already applied to this collection
    EpochYieldAlreadyApplied { collection: CollectionId, epoch_id: u64 },

    // ============ Claim Errors ============
    /// Claim deadline has passed
    ClaimExpired { deadline: u64, now: u64 },

    /// Claim nonce does not match the account's expected nonce
    InvalidNonce { expected: u64, actual: u64 },

    /// Batch signature does not recover to the registered signer
    InvalidSignature,

    /// Vault is not registered with the claim engine
    VaultNotRegistered { vault: Address },

    /// Collection is not whitelisted for the vault
    CollectionNotWhitelisted { vault: Address, collection: CollectionId },

    // ============ Authorization Errors ============
    /// Caller lacks the required role
    MissingRole { caller: Address, role: &'static str },

    // ============ State Errors ============
    /// Protocol operation is paused
    ProtocolPaused,

    /// Re-entrant call into a guarded entry point
    ReentrantCall,

    // ============ External Dependency Errors ============
    /// Lending market rejected the deposit
    LendingManagerDepositFailed,

    /// Lending market rejected or under-delivered the withdrawal
    LendingManagerWithdrawFailed,

    /// Epoch scheduler rejected the yield allocation
    EpochManagerAllocationFailed,

    /// Behalf-repayment could not be applied in full
    RepayFailed { borrower: Address, requested: u64 },

    // ============ Math Errors ============
    /// Arithmetic overflow occurred
    Overflow,

    /// Arithmetic underflow occurred
    Underflow,

    /// Division by zero
    DivisionByZero,
}

impl ProtocolError {
    /// Returns a stable error code for logging/debugging
    pub fn code(&self) -> &'static str {
        match self {
            Self::ZeroAddress { .. } => "E001_ZERO_ADDRESS",
            Self::ArrayLengthMismatch { .. } => "E002_ARRAY_LENGTH_MISMATCH",
            Self::BatchTooLarge { .. } => "E003_BATCH_TOO_LARGE",
            Self::ZeroAmount => "E004_ZERO_AMOUNT",
            Self::ShareCapExceeded { .. } => "E005_SHARE_CAP_EXCEEDED",
            Self::CollectionNotFound { .. } => "E006_COLLECTION_NOT_FOUND",
            Self::CollectionAlreadyRegistered { .. } => "E007_COLLECTION_EXISTS",
            Self::CollectionInsufficientBalance { .. } => "E010_COLLECTION_INSUFFICIENT",
            Self::InsufficientYield { .. } => "E011_INSUFFICIENT_YIELD",
            Self::InsufficientBalance { .. } => "E012_INSUFFICIENT_BALANCE",
            Self::InsufficientShares { .. } => "E013_INSUFFICIENT_SHARES",
            Self::InvalidEpochStatus { .. } => "E020_INVALID_EPOCH_STATUS",
            Self::EpochNotEnded { .. } => "E021_EPOCH_NOT_ENDED",
            Self::InvalidEpochId { .. } => "E022_INVALID_EPOCH_ID",
            Self::EpochYieldAlreadyApplied { .. } => "E023_EPOCH_YIELD_APPLIED",
            Self::ClaimExpired { .. } => "E030_CLAIM_EXPIRED",
            Self::InvalidNonce { .. } => "E031_INVALID_NONCE",
            Self::InvalidSignature => "E032_INVALID_SIGNATURE",
            Self::VaultNotRegistered { .. } => "E033_VAULT_NOT_REGISTERED",
            Self::CollectionNotWhitelisted { .. } => "E034_NOT_WHITELISTED",
            Self::MissingRole { .. } => "E040_MISSING_ROLE",
            Self::ProtocolPaused => "E050_PAUSED",
            Self::ReentrantCall => "E051_REENTRANT_CALL",
            Self::LendingManagerDepositFailed => "E060_LENDING_DEPOSIT_FAILED",
            Self::LendingManagerWithdrawFailed => "E061_LENDING_WITHDRAW_FAILED",
            Self::EpochManagerAllocationFailed => "E062_EPOCH_ALLOCATION_FAILED",
            Self::RepayFailed { .. } => "E063_REPAY_FAILED",
            Self::Overflow => "E080_OVERFLOW",
            Self::Underflow => "E081_UNDERFLOW",
            Self::DivisionByZero => "E082_DIV_ZERO",
        }
    }

    /// Returns true if this error is recoverable (caller can fix it and retry)
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::CollectionInsufficientBalance { .. } => true, // Withdraw less
            Self::InsufficientYield { .. } => true,             // Allocate less
            Self::InsufficientBalance { .. } => true,           // Fund the account
            Self::EpochNotEnded { .. } => true,                 // Wait for end time
            Self::ProtocolPaused => true,                       // Wait for unpause
            _ => false,
        }
    }
}
