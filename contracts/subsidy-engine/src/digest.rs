//! Claim Batch Digests and Signer Recovery
//!
//! A claim batch is authenticated by one signature over a typed digest
//! of the whole batch. The digest binds a constant domain tag, the
//! digest layout version, the engine instance, the target vault, and
//! the deterministic encoding of every entry, so a signature can never
//! be replayed against another instance, vault, or batch shape.

use nestyield_common::{
    constants::claims,
    types::{Address, ClaimEntry, VaultId},
    Vec,
};
use sha2::{Digest, Sha256};

/// Compute the typed digest over a claim batch.
///
/// Entries are bound in order via their borsh encoding; an empty batch
/// still produces a well-defined digest.
pub fn claim_batch_digest(instance: &Address, vault: &VaultId, entries: &[ClaimEntry]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(claims::DOMAIN_TAG);
    hasher.update([claims::DIGEST_VERSION]);
    hasher.update(instance);
    hasher.update(vault);
    hasher.update((entries.len() as u32).to_le_bytes());
    for entry in entries {
        hasher.update(borsh::to_vec(entry).unwrap_or_default());
    }

    let result = hasher.finalize();
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&result);
    digest
}

/// Signature verification boundary.
///
/// Implementations recover the signer identity from a digest and a
/// signature, returning `None` for anything malformed or forged. The
/// cryptographic scheme lives entirely behind this trait.
pub trait SignerRecovery {
    /// Recover the signer of `digest` from `signature`
    fn recover(&self, digest: &[u8; 32], signature: &[u8]) -> Option<Address>;
}

/// Hash-preimage recovery scheme.
///
/// A signature is `signer || sha256(signer || digest)`: producible only
/// with knowledge of the digest, and self-describing about its signer.
/// Stands in for a public-key recovery primitive in tests and local
/// deployments.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreimageRecovery;

impl PreimageRecovery {
    /// Sign a digest under the preimage scheme
    pub fn sign(signer: &Address, digest: &[u8; 32]) -> Vec<u8> {
        let mut signature = Vec::with_capacity(64);
        signature.extend_from_slice(signer);
        signature.extend_from_slice(&Self::binding(signer, digest));
        signature
    }

    fn binding(signer: &Address, digest: &[u8; 32]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(signer);
        hasher.update(digest);
        let result = hasher.finalize();
        let mut bound = [0u8; 32];
        bound.copy_from_slice(&result);
        bound
    }
}

impl SignerRecovery for PreimageRecovery {
    fn recover(&self, digest: &[u8; 32], signature: &[u8]) -> Option<Address> {
        if signature.len() != 64 {
            return None;
        }
        let mut signer = [0u8; 32];
        signer.copy_from_slice(&signature[..32]);

        if signature[32..] != Self::binding(&signer, digest) {
            return None;
        }
        Some(signer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INSTANCE: Address = [1u8; 32];
    const VAULT: VaultId = [2u8; 32];
    const SIGNER: Address = [3u8; 32];

    fn entry(nonce: u64) -> ClaimEntry {
        ClaimEntry {
            account: [4u8; 32],
            collection: [5u8; 32],
            vault: VAULT,
            amount: 100,
            nonce,
            deadline: 10_000,
        }
    }

    #[test]
    fn test_digest_is_deterministic() {
        let batch = [entry(0), entry(1)];
        assert_eq!(
            claim_batch_digest(&INSTANCE, &VAULT, &batch),
            claim_batch_digest(&INSTANCE, &VAULT, &batch)
        );
    }

    #[test]
    fn test_digest_binds_every_input() {
        let batch = [entry(0)];
        let base = claim_batch_digest(&INSTANCE, &VAULT, &batch);

        assert_ne!(base, claim_batch_digest(&[9u8; 32], &VAULT, &batch));
        assert_ne!(base, claim_batch_digest(&INSTANCE, &[9u8; 32], &batch));
        assert_ne!(base, claim_batch_digest(&INSTANCE, &VAULT, &[entry(1)]));
        assert_ne!(base, claim_batch_digest(&INSTANCE, &VAULT, &[]));
    }

    #[test]
    fn test_preimage_roundtrip() {
        let digest = claim_batch_digest(&INSTANCE, &VAULT, &[entry(0)]);
        let signature = PreimageRecovery::sign(&SIGNER, &digest);

        assert_eq!(PreimageRecovery.recover(&digest, &signature), Some(SIGNER));
    }

    #[test]
    fn test_recovery_rejects_forgeries() {
        let digest = claim_batch_digest(&INSTANCE, &VAULT, &[entry(0)]);
        let other_digest = claim_batch_digest(&INSTANCE, &VAULT, &[entry(1)]);
        let signature = PreimageRecovery::sign(&SIGNER, &digest);

        // Signature over one digest does not verify against another
        assert_eq!(PreimageRecovery.recover(&other_digest, &signature), None);
        // Truncated and corrupted signatures fail
        assert_eq!(PreimageRecovery.recover(&digest, &signature[..63]), None);
        let mut corrupted = signature.clone();
        corrupted[40] ^= 0xFF;
        assert_eq!(PreimageRecovery.recover(&digest, &corrupted), None);
    }
}
