//! Pause Controls
//!
//! Selective pausing of protocol operations. Deposits, withdrawals, and
//! claim settlement check the pause state at the top of each mutating
//! call and fail uniformly while paused.

use crate::errors::{ProtocolError, ProtocolResult};

/// Operations that can be paused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PausableOperation {
    /// All operations (global pause)
    All,
    /// Deposits into the vault
    Deposits,
    /// Withdrawals and redemptions
    Withdrawals,
    /// Subsidy claim settlement
    Claims,
}

impl PausableOperation {
    /// Get operation bitmask
    pub fn mask(&self) -> u8 {
        match self {
            PausableOperation::All => 0xFF,
            PausableOperation::Deposits => 1 << 0,
            PausableOperation::Withdrawals => 1 << 1,
            PausableOperation::Claims => 1 << 2,
        }
    }
}

/// Pause state: a bitmask of paused operations
#[derive(Debug, Clone, Copy, Default)]
pub struct PauseState {
    paused: u8,
}

impl PauseState {
    /// Create a fresh, fully unpaused state
    pub fn new() -> Self {
        Self { paused: 0 }
    }

    /// Check if an operation is paused
    pub fn is_paused(&self, operation: PausableOperation) -> bool {
        self.paused & operation.mask() != 0
    }

    /// Fail with [`ProtocolError::ProtocolPaused`] if the operation is paused
    pub fn require_not_paused(&self, operation: PausableOperation) -> ProtocolResult<()> {
        if self.is_paused(operation) {
            return Err(ProtocolError::ProtocolPaused);
        }
        Ok(())
    }

    /// Pause an operation; returns the updated bitmask
    pub fn pause(&mut self, operation: PausableOperation) -> u8 {
        self.paused |= operation.mask();
        self.paused
    }

    /// Unpause an operation; returns the updated bitmask
    pub fn unpause(&mut self, operation: PausableOperation) -> u8 {
        self.paused &= !operation.mask();
        self.paused
    }
}
