//! Protocol Constants
//!
//! All magic numbers and configuration values for the NestYield protocol.
//!
//! # Network Configuration
//!
//! Use feature flags to compile for different networks:
//! - `mainnet` - Production values (week-long epochs)
//! - Default (no feature) - Testnet values (short epochs for testing)
//!
//! ```toml
//! # For mainnet deployment:
//! nestyield-common = { path = "...", features = ["mainnet"] }
//! ```

/// Underlying asset metadata
pub mod token {
    /// Asset name
    pub const NAME: &str = "NestYield Underlying";
    /// Asset symbol
    pub const SYMBOL: &str = "nyUND";
    /// Decimal places
    pub const DECIMALS: u8 = 6;
    /// One unit with decimals (1 asset unit = 1_000_000 base units)
    pub const ONE: u64 = 1_000_000;
}

/// Basis-point configuration
pub mod bps {
    /// Basis points denominator (10_000 = 100%)
    pub const DENOMINATOR: u64 = 10_000;

    /// Maximum combined epoch-yield share across all collections of a vault
    pub const MAX_TOTAL_SHARE: u64 = 10_000;
}

/// Global deposit index configuration
pub mod index {
    /// Fixed-point precision for the global deposit index (1e18)
    pub const PRECISION: u128 = 1_000_000_000_000_000_000;

    /// Initial index value: exactly one unit of assets per unit of principal
    pub const INITIAL: u128 = PRECISION;
}

/// Epoch configuration
pub mod epoch {
    /// Epoch duration in seconds
    /// - Mainnet: 7 days
    /// - Testnet: 1 hour (allows fast lifecycle testing)
    #[cfg(feature = "mainnet")]
    pub const DEFAULT_DURATION_SECS: u64 = 7 * 24 * 60 * 60;
    #[cfg(not(feature = "mainnet"))]
    pub const DEFAULT_DURATION_SECS: u64 = 60 * 60;

    /// Minimum configurable epoch duration (10 minutes)
    pub const MIN_DURATION_SECS: u64 = 600;

    /// Maximum configurable epoch duration (30 days)
    pub const MAX_DURATION_SECS: u64 = 30 * 24 * 60 * 60;

    /// Epoch ids start at 1; 0 means "no epoch has ever started"
    pub const NO_EPOCH: u64 = 0;
}

/// Batch limits
pub mod limits {
    /// Maximum entries in a yield-transfer or repayment batch
    pub const MAX_BATCH_SIZE: usize = 50;

    /// Maximum entries in a signed subsidy claim batch
    pub const MAX_CLAIM_BATCH_SIZE: usize = 50;
}

/// Subsidy claim digest configuration
pub mod claims {
    /// Domain tag bound into every claim digest
    pub const DOMAIN_TAG: &[u8] = b"NESTYIELD_SUBSIDY_CLAIM";

    /// Digest layout version
    pub const DIGEST_VERSION: u8 = 1;
}
