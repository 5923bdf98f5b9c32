//! Mathematical Utilities for the NestYield Protocol
//!
//! Safe math operations, share pricing, and fixed-point index helpers.

use crate::constants::{bps, index};
use crate::errors::{ProtocolError, ProtocolResult};

/// Safe addition with overflow check
pub fn safe_add(a: u64, b: u64) -> ProtocolResult<u64> {
    a.checked_add(b).ok_or(ProtocolError::Overflow)
}

/// Safe subtraction with underflow check
pub fn safe_sub(a: u64, b: u64) -> ProtocolResult<u64> {
    a.checked_sub(b).ok_or(ProtocolError::Underflow)
}

/// Floor of `a * b / denom` computed through u128
pub fn mul_div(a: u64, b: u64, denom: u64) -> ProtocolResult<u64> {
    if denom == 0 {
        return Err(ProtocolError::DivisionByZero);
    }
    let result = (a as u128) * (b as u128) / (denom as u128);
    if result > u64::MAX as u128 {
        return Err(ProtocolError::Overflow);
    }
    Ok(result as u64)
}

/// Ceiling of `a * b / denom` computed through u128
pub fn mul_div_up(a: u64, b: u64, denom: u64) -> ProtocolResult<u64> {
    if denom == 0 {
        return Err(ProtocolError::DivisionByZero);
    }
    let product = (a as u128) * (b as u128);
    let result = product.div_ceil(denom as u128);
    if result > u64::MAX as u128 {
        return Err(ProtocolError::Overflow);
    }
    Ok(result as u64)
}

/// Basis-point share of an amount: `amount * share_bps / 10_000`
pub fn bps_share(amount: u64, share_bps: u64) -> ProtocolResult<u64> {
    mul_div(amount, share_bps, bps::DENOMINATOR)
}

/// Shares minted for a deposit under proportional pricing.
///
/// `shares = assets * total_shares / total_assets`, or 1:1 when no shares
/// exist yet (first deposit sets the exchange rate).
pub fn assets_to_shares(assets: u64, total_shares: u64, total_assets: u64) -> ProtocolResult<u64> {
    if total_shares == 0 || total_assets == 0 {
        return Ok(assets);
    }
    mul_div(assets, total_shares, total_assets)
}

/// Shares burned to withdraw an exact asset amount.
///
/// Rounds up so a withdrawal never burns fewer shares than its
/// proportional claim.
pub fn shares_for_assets(assets: u64, total_shares: u64, total_assets: u64) -> ProtocolResult<u64> {
    if total_shares == 0 || total_assets == 0 {
        return Ok(assets);
    }
    mul_div_up(assets, total_shares, total_assets)
}

/// Asset value of a share amount under proportional pricing
pub fn shares_to_assets(shares: u64, total_shares: u64, total_assets: u64) -> ProtocolResult<u64> {
    if total_shares == 0 {
        return Ok(shares);
    }
    mul_div(shares, total_assets, total_shares)
}

/// Recompute the global deposit index from the adapter's valuation.
///
/// The index is the cumulative assets-per-principal ratio scaled by
/// [`index::PRECISION`]. It is monotonically non-decreasing: adapter-side
/// loss (valuation below principal) clamps the index at its previous
/// value rather than moving it backwards.
pub fn compute_deposit_index(total_assets: u64, total_principal: u64, prev_index: u128) -> u128 {
    if total_principal == 0 {
        return prev_index;
    }
    let candidate = (total_assets as u128) * index::PRECISION / (total_principal as u128);
    candidate.max(prev_index)
}

/// Passive yield accrued by a collection since its last index snapshot.
///
/// `balance * (new_index - old_index) / PRECISION * share_bps / 10_000`.
/// A caught-up index or a 0% share yields zero.
pub fn accrued_passive_yield(
    balance: u64,
    old_index: u128,
    new_index: u128,
    share_bps: u64,
) -> ProtocolResult<u64> {
    let delta = new_index.saturating_sub(old_index);
    if delta == 0 || share_bps == 0 || balance == 0 {
        return Ok(0);
    }

    let gross = (balance as u128)
        .checked_mul(delta)
        .ok_or(ProtocolError::Overflow)?
        / index::PRECISION;

    let share = gross
        .checked_mul(share_bps as u128)
        .ok_or(ProtocolError::Overflow)?
        / (bps::DENOMINATOR as u128);

    if share > u64::MAX as u128 {
        return Err(ProtocolError::Overflow);
    }
    Ok(share as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::index::{INITIAL, PRECISION};

    #[test]
    fn test_safe_math() {
        assert_eq!(safe_add(2, 3).unwrap(), 5);
        assert_eq!(safe_sub(5, 3).unwrap(), 2);
        assert_eq!(safe_add(u64::MAX, 1), Err(ProtocolError::Overflow));
        assert_eq!(safe_sub(0, 1), Err(ProtocolError::Underflow));
    }

    #[test]
    fn test_mul_div() {
        assert_eq!(mul_div(100, 50, 10_000).unwrap(), 0); // floors
        assert_eq!(mul_div_up(100, 50, 10_000).unwrap(), 1); // ceils
        assert_eq!(mul_div(1_000_000, 2_500, 10_000).unwrap(), 250_000);
        assert_eq!(mul_div(1, 1, 0), Err(ProtocolError::DivisionByZero));
    }

    #[test]
    fn test_share_pricing_first_deposit() {
        // No shares yet: 1:1
        assert_eq!(assets_to_shares(100, 0, 0).unwrap(), 100);
    }

    #[test]
    fn test_share_pricing_proportional() {
        // 80 shares backing 160 assets: 40 assets mint 20 shares
        assert_eq!(assets_to_shares(40, 80, 160).unwrap(), 20);
        assert_eq!(shares_to_assets(20, 80, 160).unwrap(), 40);
        // Withdrawing 41 assets burns ceil(41 * 80 / 160) = 21 shares
        assert_eq!(shares_for_assets(41, 80, 160).unwrap(), 21);
    }

    #[test]
    fn test_deposit_index_growth() {
        // 10% yield: 110 assets over 100 principal
        let idx = compute_deposit_index(110, 100, INITIAL);
        assert_eq!(idx, PRECISION + PRECISION / 10);
    }

    #[test]
    fn test_deposit_index_clamps_on_loss() {
        let grown = compute_deposit_index(110, 100, INITIAL);
        // Adapter-side loss: valuation drops below principal
        let after_loss = compute_deposit_index(90, 100, grown);
        assert_eq!(after_loss, grown);
    }

    #[test]
    fn test_deposit_index_zero_principal() {
        assert_eq!(compute_deposit_index(50, 0, INITIAL), INITIAL);
    }

    #[test]
    fn test_accrued_passive_yield() {
        let old = INITIAL;
        let new = INITIAL + PRECISION / 10; // +10%
        // 1000 balance, full share: 100
        assert_eq!(accrued_passive_yield(1_000, old, new, 10_000).unwrap(), 100);
        // Half share: 50
        assert_eq!(accrued_passive_yield(1_000, old, new, 5_000).unwrap(), 50);
        // Zero share or caught-up index: 0
        assert_eq!(accrued_passive_yield(1_000, old, new, 0).unwrap(), 0);
        assert_eq!(accrued_passive_yield(1_000, new, new, 10_000).unwrap(), 0);
    }
}
