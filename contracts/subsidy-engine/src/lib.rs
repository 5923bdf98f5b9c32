//! Subsidy Claim Engine for the NestYield Protocol
//!
//! Verifies signed claim batches against a vault's registered
//! collections and settles them through the vault's behalf-repayment
//! batch:
//!
//! - **Batch Signatures**: one signature over a typed digest of the
//!   whole batch, checked against the vault's registered signer
//! - **Replay Protection**: per-(vault, account) nonces, strictly
//!   sequential with no gaps and no reuse
//! - **Deadlines**: expired entries reject the batch
//! - **Atomic Settlement**: one repayment batch per call; any
//!   adapter-side shortfall aborts everything, leaving nonces and
//!   running totals untouched
//!
//! Weight functions are stored and emitted here but never evaluated:
//! they only inform the off-chain process that computes the signed
//! amounts.

use nestyield_collections_vault::CollectionsVault;
use nestyield_common::{
    constants::limits,
    errors::{ProtocolError, ProtocolResult},
    events::{EventLog, ProtocolEvent},
    math::safe_add,
    types::{is_zero_address, Address, ClaimEntry, CollectionId, VaultId, WeightFunction},
    AccessController, BTreeMap, BTreeSet, Role, TokenLedger, Vec,
};
use nestyield_lending_adapter::{LendingAdapter, LendingMarket};

pub mod digest;

pub use digest::{claim_batch_digest, PreimageRecovery, SignerRecovery};

/// Per-vault registration: the designated signer and the collections
/// claims may settle against
#[derive(Debug, Clone)]
struct VaultRegistration {
    signer: Address,
    whitelisted: BTreeSet<CollectionId>,
}

/// Signed-claim verification and settlement engine
#[derive(Debug)]
pub struct SubsidyClaimEngine<R: SignerRecovery> {
    /// Engine instance identity: domain-separates digests and acts as
    /// the engine's caller identity towards vaults
    instance: Address,
    recovery: R,
    vaults: BTreeMap<VaultId, VaultRegistration>,
    /// Strictly sequential per-(vault, account) claim nonces
    nonces: BTreeMap<(VaultId, Address), u64>,
    /// Running total of subsidy amounts applied per account
    user_units_claimed: BTreeMap<Address, u64>,
    /// Inert weight-function metadata per (vault, collection)
    weight_functions: BTreeMap<(VaultId, CollectionId), WeightFunction>,
    /// Cumulative subsidies settled per vault
    total_distributed: BTreeMap<VaultId, u64>,
    /// Reentrancy busy flag
    entered: bool,
    events: EventLog,
}

impl<R: SignerRecovery> SubsidyClaimEngine<R> {
    /// Create an engine with the given instance identity
    pub fn new(instance: Address, recovery: R) -> ProtocolResult<Self> {
        if is_zero_address(&instance) {
            return Err(ProtocolError::ZeroAddress { param: "instance" });
        }
        Ok(Self {
            instance,
            recovery,
            vaults: BTreeMap::new(),
            nonces: BTreeMap::new(),
            user_units_claimed: BTreeMap::new(),
            weight_functions: BTreeMap::new(),
            total_distributed: BTreeMap::new(),
            entered: false,
            events: EventLog::new(),
        })
    }

    // ============ Queries ============

    /// Engine instance identity
    pub fn instance(&self) -> Address {
        self.instance
    }

    /// Next expected nonce for a (vault, account) pair
    pub fn nonce_of(&self, vault: &VaultId, account: &Address) -> u64 {
        self.nonces.get(&(*vault, *account)).copied().unwrap_or(0)
    }

    /// Running subsidy total applied for an account
    pub fn claimed_by(&self, account: &Address) -> u64 {
        self.user_units_claimed.get(account).copied().unwrap_or(0)
    }

    /// Cumulative subsidies settled through a vault
    pub fn total_distributed(&self, vault: &VaultId) -> u64 {
        self.total_distributed.get(vault).copied().unwrap_or(0)
    }

    /// Whether a collection is whitelisted for a vault
    pub fn is_whitelisted(&self, vault: &VaultId, collection: &CollectionId) -> bool {
        self.vaults
            .get(vault)
            .map(|r| r.whitelisted.contains(collection))
            .unwrap_or(false)
    }

    /// Stored weight function for a (vault, collection), if any
    pub fn weight_function(&self, vault: &VaultId, collection: &CollectionId) -> Option<&WeightFunction> {
        self.weight_functions.get(&(*vault, *collection))
    }

    /// Drain events emitted since the last drain
    pub fn take_events(&mut self) -> Vec<ProtocolEvent> {
        self.events.take()
    }

    // ============ Registration ============

    /// Register a vault with its designated claim signer, or update the
    /// signer of an already-registered vault.
    pub fn register_vault(
        &mut self,
        vault: VaultId,
        signer: Address,
        caller: &Address,
        access: &AccessController,
    ) -> ProtocolResult<()> {
        access.require(caller, Role::Admin)?;
        if is_zero_address(&vault) {
            return Err(ProtocolError::ZeroAddress { param: "vault" });
        }
        if is_zero_address(&signer) {
            return Err(ProtocolError::ZeroAddress { param: "signer" });
        }

        self.vaults
            .entry(vault)
            .and_modify(|r| r.signer = signer)
            .or_insert_with(|| VaultRegistration {
                signer,
                whitelisted: BTreeSet::new(),
            });
        self.events.emit(ProtocolEvent::VaultRegistered { vault, signer });
        Ok(())
    }

    /// Whitelist a collection for claims against a vault
    pub fn whitelist_collection(
        &mut self,
        vault: VaultId,
        collection: CollectionId,
        caller: &Address,
        access: &AccessController,
    ) -> ProtocolResult<()> {
        access.require(caller, Role::Admin)?;
        let registration = self
            .vaults
            .get_mut(&vault)
            .ok_or(ProtocolError::VaultNotRegistered { vault })?;

        if registration.whitelisted.insert(collection) {
            self.events.emit(ProtocolEvent::CollectionWhitelisted { vault, collection });
        }
        Ok(())
    }

    /// Remove a collection from a vault's whitelist
    pub fn remove_collection(
        &mut self,
        vault: VaultId,
        collection: CollectionId,
        caller: &Address,
        access: &AccessController,
    ) -> ProtocolResult<()> {
        access.require(caller, Role::Admin)?;
        let registration = self
            .vaults
            .get_mut(&vault)
            .ok_or(ProtocolError::VaultNotRegistered { vault })?;

        if registration.whitelisted.remove(&collection) {
            self.events.emit(ProtocolEvent::CollectionDelisted { vault, collection });
        }
        Ok(())
    }

    /// Store the weight function for a (vault, collection).
    ///
    /// Takes effect for claims signed after the update; claims already
    /// signed under the old function stay valid while their nonce and
    /// deadline hold. Never evaluated by the protocol.
    pub fn set_weight_function(
        &mut self,
        vault: VaultId,
        collection: CollectionId,
        function: WeightFunction,
        caller: &Address,
        access: &AccessController,
    ) -> ProtocolResult<()> {
        access.require(caller, Role::Admin)?;
        let registration = self
            .vaults
            .get(&vault)
            .ok_or(ProtocolError::VaultNotRegistered { vault })?;
        if !registration.whitelisted.contains(&collection) {
            return Err(ProtocolError::CollectionNotWhitelisted { vault, collection });
        }

        self.weight_functions.insert((vault, collection), function);
        self.events.emit(ProtocolEvent::WeightFunctionUpdated {
            vault,
            collection,
            kind: function.kind,
            p1: function.p1,
            p2: function.p2,
        });
        Ok(())
    }

    // ============ Settlement ============

    /// Verify and settle a signed claim batch.
    ///
    /// An empty batch verifies trivially: the digest is computed and
    /// nothing else happens. A non-empty batch recovers the signer from
    /// the typed digest, validates every entry (exact nonce, live
    /// deadline, whitelisted collection), groups amounts per
    /// (collection, account), and issues one behalf-repayment batch to
    /// the vault. Any adapter-side shortfall aborts the whole call with
    /// no nonce or total mutated. Returns the total amount applied.
    #[allow(clippy::too_many_arguments)]
    pub fn subsidize<M: LendingMarket>(
        &mut self,
        vault_id: VaultId,
        subsidies: &[ClaimEntry],
        signature: &[u8],
        vault: &mut CollectionsVault,
        adapter: &mut LendingAdapter<M>,
        ledger: &mut TokenLedger,
        access: &AccessController,
        now: u64,
    ) -> ProtocolResult<u64> {
        self.enter()?;
        let result = self.subsidize_inner(vault_id, subsidies, signature, vault, adapter, ledger, access, now);
        self.exit();
        result
    }

    #[allow(clippy::too_many_arguments)]
    fn subsidize_inner<M: LendingMarket>(
        &mut self,
        vault_id: VaultId,
        subsidies: &[ClaimEntry],
        signature: &[u8],
        vault: &mut CollectionsVault,
        adapter: &mut LendingAdapter<M>,
        ledger: &mut TokenLedger,
        access: &AccessController,
        now: u64,
    ) -> ProtocolResult<u64> {
        let registration = self
            .vaults
            .get(&vault_id)
            .ok_or(ProtocolError::VaultNotRegistered { vault: vault_id })?;

        let digest = claim_batch_digest(&self.instance, &vault_id, subsidies);
        if subsidies.is_empty() {
            // Empty batches verify trivially and mutate nothing
            return Ok(0);
        }
        if subsidies.len() > limits::MAX_CLAIM_BATCH_SIZE {
            return Err(ProtocolError::BatchTooLarge {
                size: subsidies.len(),
                maximum: limits::MAX_CLAIM_BATCH_SIZE,
            });
        }

        let recovered = self.recovery.recover(&digest, signature);
        if recovered != Some(registration.signer) {
            return Err(ProtocolError::InvalidSignature);
        }

        // Validate every entry against staged nonces before any state
        // change or external call
        let mut staged_nonces: BTreeMap<Address, u64> = BTreeMap::new();
        for entry in subsidies {
            if entry.vault != vault_id {
                return Err(ProtocolError::VaultNotRegistered { vault: entry.vault });
            }

            let expected = staged_nonces
                .get(&entry.account)
                .copied()
                .unwrap_or_else(|| self.nonce_of(&vault_id, &entry.account));
            if entry.nonce != expected {
                return Err(ProtocolError::InvalidNonce {
                    expected,
                    actual: entry.nonce,
                });
            }
            staged_nonces.insert(entry.account, expected + 1);

            if now > entry.deadline {
                return Err(ProtocolError::ClaimExpired {
                    deadline: entry.deadline,
                    now,
                });
            }
            if !registration.whitelisted.contains(&entry.collection) {
                return Err(ProtocolError::CollectionNotWhitelisted {
                    vault: vault_id,
                    collection: entry.collection,
                });
            }
        }

        // Group amounts per (collection, account)
        let mut grouped: BTreeMap<(CollectionId, Address), u64> = BTreeMap::new();
        let mut total: u64 = 0;
        for entry in subsidies {
            let slot = grouped.entry((entry.collection, entry.account)).or_insert(0);
            *slot = safe_add(*slot, entry.amount)?;
            total = safe_add(total, entry.amount)?;
        }

        let collections: Vec<CollectionId> = grouped.keys().map(|(c, _)| *c).collect();
        let borrowers: Vec<Address> = grouped.keys().map(|(_, a)| *a).collect();
        let amounts: Vec<u64> = grouped.values().copied().collect();

        // One settlement call; failure aborts with nothing committed
        vault.repay_borrow_behalf_batch(
            &collections,
            &amounts,
            &borrowers,
            total,
            adapter,
            ledger,
            &self.instance,
            access,
        )?;

        // Commit: advance nonces in entry order, then running totals
        for entry in subsidies {
            let slot = self.nonces.entry((vault_id, entry.account)).or_insert(0);
            *slot += 1;
            self.events.emit(ProtocolEvent::ClaimNonceAdvanced {
                vault: vault_id,
                account: entry.account,
                new_nonce: *slot,
            });
        }
        for ((collection, account), amount) in grouped.iter().map(|(k, v)| (*k, *v)) {
            let claimed = self.user_units_claimed.entry(account).or_insert(0);
            *claimed = safe_add(*claimed, amount)?;
            self.events.emit(ProtocolEvent::SubsidyApplied {
                vault: vault_id,
                account,
                collection,
                amount,
                total_claimed: *claimed,
            });
        }
        let distributed = self.total_distributed.entry(vault_id).or_insert(0);
        *distributed = safe_add(*distributed, total)?;

        Ok(total)
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

#[cfg(test)]
mod tests;
