use super::*;
use nestyield_common::types::{WeightFunction, WeightFunctionKind};
use nestyield_lending_adapter::testing::MockMarket;

const ADMIN: Address = [1u8; 32];
const SIGNER: Address = [2u8; 32];
const ENGINE_ADDR: Address = [3u8; 32];
const ALICE: Address = [10u8; 32];
const BOB: Address = [11u8; 32];
const FUNDER: Address = [12u8; 32];
const VAULT_ADDR: Address = [20u8; 32];
const COLLECTION_X: CollectionId = [30u8; 32];
const COLLECTION_Y: CollectionId = [31u8; 32];
const NOT_WHITELISTED: CollectionId = [32u8; 32];

const NOW: u64 = 5_000;
const DEADLINE: u64 = 10_000;

struct Fixture {
    engine: SubsidyClaimEngine<PreimageRecovery>,
    vault: CollectionsVault,
    adapter: LendingAdapter<MockMarket>,
    ledger: TokenLedger,
    access: AccessController,
}

fn setup() -> Fixture {
    let mut access = AccessController::new(ADMIN);
    access.grant(&ADMIN, ENGINE_ADDR, Role::ClaimEngine).unwrap();

    let mut engine = SubsidyClaimEngine::new(ENGINE_ADDR, PreimageRecovery).unwrap();
    engine.register_vault(VAULT_ADDR, SIGNER, &ADMIN, &access).unwrap();
    engine.whitelist_collection(VAULT_ADDR, COLLECTION_X, &ADMIN, &access).unwrap();
    engine.whitelist_collection(VAULT_ADDR, COLLECTION_Y, &ADMIN, &access).unwrap();

    let mut vault = CollectionsVault::new(VAULT_ADDR).unwrap();
    vault.register_collection(COLLECTION_X, &ADMIN, &access).unwrap();
    vault.register_collection(COLLECTION_Y, &ADMIN, &access).unwrap();

    let mut adapter = LendingAdapter::new(MockMarket::new());
    let mut ledger = TokenLedger::new();
    ledger.credit(&FUNDER, 1_000_000).unwrap();
    vault
        .deposit_for_collection(10_000, &FUNDER, &FUNDER, COLLECTION_X, &mut adapter, &mut ledger)
        .unwrap();
    adapter.market_mut().accrue_yield(1_000);

    // Setup noise out of the logs; tests assert on their own events
    engine.take_events();
    vault.take_events();

    Fixture { engine, vault, adapter, ledger, access }
}

fn entry(account: Address, collection: CollectionId, amount: u64, nonce: u64) -> ClaimEntry {
    ClaimEntry {
        account,
        collection,
        vault: VAULT_ADDR,
        amount,
        nonce,
        deadline: DEADLINE,
    }
}

fn sign(engine: &SubsidyClaimEngine<PreimageRecovery>, entries: &[ClaimEntry]) -> Vec<u8> {
    let digest = claim_batch_digest(&engine.instance(), &VAULT_ADDR, entries);
    PreimageRecovery::sign(&SIGNER, &digest)
}

impl Fixture {
    fn subsidize(&mut self, entries: &[ClaimEntry], signature: &[u8]) -> ProtocolResult<u64> {
        self.engine.subsidize(
            VAULT_ADDR,
            entries,
            signature,
            &mut self.vault,
            &mut self.adapter,
            &mut self.ledger,
            &self.access,
            NOW,
        )
    }
}

// ============ Registration ============

#[test]
fn test_registration_gating() {
    let mut f = setup();

    assert!(matches!(
        f.engine.register_vault([9u8; 32], SIGNER, &ALICE, &f.access),
        Err(ProtocolError::MissingRole { .. })
    ));
    assert!(matches!(
        f.engine.register_vault([0u8; 32], SIGNER, &ADMIN, &f.access),
        Err(ProtocolError::ZeroAddress { .. })
    ));
    assert!(matches!(
        f.engine.whitelist_collection([9u8; 32], COLLECTION_X, &ADMIN, &f.access),
        Err(ProtocolError::VaultNotRegistered { .. })
    ));

    assert!(f.engine.is_whitelisted(&VAULT_ADDR, &COLLECTION_X));
    f.engine.remove_collection(VAULT_ADDR, COLLECTION_X, &ADMIN, &f.access).unwrap();
    assert!(!f.engine.is_whitelisted(&VAULT_ADDR, &COLLECTION_X));
}

#[test]
fn test_register_vault_updates_signer() {
    let mut f = setup();
    let new_signer = [7u8; 32];
    f.engine.register_vault(VAULT_ADDR, new_signer, &ADMIN, &f.access).unwrap();

    // Whitelist survives a signer rotation
    assert!(f.engine.is_whitelisted(&VAULT_ADDR, &COLLECTION_Y));

    // Batches signed by the old signer no longer verify
    let batch = [entry(ALICE, COLLECTION_X, 100, 0)];
    let signature = sign(&f.engine, &batch);
    assert_eq!(f.subsidize(&batch, &signature), Err(ProtocolError::InvalidSignature));
}

// ============ Weight Functions ============

#[test]
fn test_weight_function_stored_and_emitted() {
    let mut f = setup();
    let function = WeightFunction {
        kind: WeightFunctionKind::Exponential,
        p1: 500,
        p2: 3,
    };

    f.engine.take_events();
    f.engine
        .set_weight_function(VAULT_ADDR, COLLECTION_X, function, &ADMIN, &f.access)
        .unwrap();

    assert_eq!(f.engine.weight_function(&VAULT_ADDR, &COLLECTION_X), Some(&function));
    let events = f.engine.take_events();
    assert_eq!(events.len(), 1);
    assert!(matches!(
        events[0],
        ProtocolEvent::WeightFunctionUpdated {
            kind: WeightFunctionKind::Exponential,
            p1: 500,
            p2: 3,
            ..
        }
    ));
}

#[test]
fn test_weight_function_requires_whitelisted_collection() {
    let mut f = setup();
    let function = WeightFunction { kind: WeightFunctionKind::Linear, p1: 1, p2: 0 };

    let result = f.engine.set_weight_function(VAULT_ADDR, NOT_WHITELISTED, function, &ADMIN, &f.access);
    assert!(matches!(result, Err(ProtocolError::CollectionNotWhitelisted { .. })));
}

#[test]
fn test_weight_function_update_leaves_signed_claims_valid() {
    let mut f = setup();
    let batch = [entry(ALICE, COLLECTION_X, 100, 0)];
    let signature = sign(&f.engine, &batch);

    // Metadata changes between signing and submission
    let function = WeightFunction { kind: WeightFunctionKind::Linear, p1: 9, p2: 9 };
    f.engine
        .set_weight_function(VAULT_ADDR, COLLECTION_X, function, &ADMIN, &f.access)
        .unwrap();

    assert_eq!(f.subsidize(&batch, &signature).unwrap(), 100);
}

// ============ Settlement ============

#[test]
fn test_subsidize_applies_batch() {
    let mut f = setup();
    let batch = [
        entry(ALICE, COLLECTION_X, 100, 0),
        entry(BOB, COLLECTION_Y, 50, 0),
    ];
    let signature = sign(&f.engine, &batch);

    let total = f.subsidize(&batch, &signature).unwrap();

    assert_eq!(total, 150);
    assert_eq!(f.engine.nonce_of(&VAULT_ADDR, &ALICE), 1);
    assert_eq!(f.engine.nonce_of(&VAULT_ADDR, &BOB), 1);
    assert_eq!(f.engine.claimed_by(&ALICE), 100);
    assert_eq!(f.engine.claimed_by(&BOB), 50);
    assert_eq!(f.engine.total_distributed(&VAULT_ADDR), 150);
    assert_eq!(f.vault.collection(&COLLECTION_X).unwrap().total_yield_transferred, 100);
    assert_eq!(f.vault.collection(&COLLECTION_Y).unwrap().total_yield_transferred, 50);
}

#[test]
fn test_subsidize_groups_same_account_and_collection() {
    let mut f = setup();
    let batch = [
        entry(ALICE, COLLECTION_X, 100, 0),
        entry(ALICE, COLLECTION_X, 40, 1),
    ];
    let signature = sign(&f.engine, &batch);

    let total = f.subsidize(&batch, &signature).unwrap();

    assert_eq!(total, 140);
    // Two sequential nonces consumed in one batch
    assert_eq!(f.engine.nonce_of(&VAULT_ADDR, &ALICE), 2);
    assert_eq!(f.engine.claimed_by(&ALICE), 140);
}

#[test]
fn test_empty_batch_verifies_trivially() {
    let mut f = setup();

    // Even a garbage signature is fine: there is nothing to authenticate
    let total = f.subsidize(&[], b"not-a-signature").unwrap();

    assert_eq!(total, 0);
    assert_eq!(f.engine.total_distributed(&VAULT_ADDR), 0);
    assert!(f.engine.take_events().is_empty());
}

#[test]
fn test_invalid_signature_rejected() {
    let mut f = setup();
    let batch = [entry(ALICE, COLLECTION_X, 100, 0)];

    // Signed by someone other than the registered signer
    let digest = claim_batch_digest(&f.engine.instance(), &VAULT_ADDR, &batch);
    let forged = PreimageRecovery::sign(&[66u8; 32], &digest);
    assert_eq!(f.subsidize(&batch, &forged), Err(ProtocolError::InvalidSignature));

    // Signature over a different batch
    let other = [entry(ALICE, COLLECTION_X, 999, 0)];
    let mismatched = sign(&f.engine, &other);
    assert_eq!(f.subsidize(&batch, &mismatched), Err(ProtocolError::InvalidSignature));

    assert_eq!(f.engine.nonce_of(&VAULT_ADDR, &ALICE), 0);
}

#[test]
fn test_nonce_must_match_exactly() {
    let mut f = setup();

    // Future nonce
    let future = [entry(ALICE, COLLECTION_X, 100, 1)];
    let signature = sign(&f.engine, &future);
    assert_eq!(
        f.subsidize(&future, &signature),
        Err(ProtocolError::InvalidNonce { expected: 0, actual: 1 })
    );

    // Consume nonce 0, then a stale retry fails
    let current = [entry(ALICE, COLLECTION_X, 100, 0)];
    let signature = sign(&f.engine, &current);
    f.subsidize(&current, &signature).unwrap();

    let signature = sign(&f.engine, &current);
    assert_eq!(
        f.subsidize(&current, &signature),
        Err(ProtocolError::InvalidNonce { expected: 1, actual: 0 })
    );
    assert_eq!(f.engine.claimed_by(&ALICE), 100);
}

#[test]
fn test_replaying_consumed_signature_fails() {
    let mut f = setup();
    let batch = [entry(ALICE, COLLECTION_X, 100, 0)];
    let signature = sign(&f.engine, &batch);

    f.subsidize(&batch, &signature).unwrap();

    // Same bytes, second submission: the nonce has moved on
    assert_eq!(
        f.subsidize(&batch, &signature),
        Err(ProtocolError::InvalidNonce { expected: 1, actual: 0 })
    );
    assert_eq!(f.engine.claimed_by(&ALICE), 100);
    assert_eq!(f.engine.nonce_of(&VAULT_ADDR, &ALICE), 1);
}

#[test]
fn test_expired_claim_rejected() {
    let mut f = setup();
    let mut expired = entry(ALICE, COLLECTION_X, 100, 0);
    expired.deadline = NOW - 1;
    let batch = [expired];
    let signature = sign(&f.engine, &batch);

    assert_eq!(
        f.subsidize(&batch, &signature),
        Err(ProtocolError::ClaimExpired { deadline: NOW - 1, now: NOW })
    );
    assert_eq!(f.engine.nonce_of(&VAULT_ADDR, &ALICE), 0);
}

#[test]
fn test_non_whitelisted_collection_rejected() {
    let mut f = setup();
    let batch = [entry(ALICE, NOT_WHITELISTED, 100, 0)];
    let signature = sign(&f.engine, &batch);

    assert_eq!(
        f.subsidize(&batch, &signature),
        Err(ProtocolError::CollectionNotWhitelisted {
            vault: VAULT_ADDR,
            collection: NOT_WHITELISTED,
        })
    );
}

#[test]
fn test_unregistered_vault_rejected() {
    let mut f = setup();
    let unknown = [77u8; 32];
    let result = f.engine.subsidize(
        unknown,
        &[],
        b"",
        &mut f.vault,
        &mut f.adapter,
        &mut f.ledger,
        &f.access,
        NOW,
    );
    assert_eq!(result, Err(ProtocolError::VaultNotRegistered { vault: unknown }));
}

#[test]
fn test_entry_vault_mismatch_rejected() {
    let mut f = setup();
    let mut foreign = entry(ALICE, COLLECTION_X, 100, 0);
    foreign.vault = [77u8; 32];
    let batch = [foreign];
    let signature = sign(&f.engine, &batch);

    assert_eq!(
        f.subsidize(&batch, &signature),
        Err(ProtocolError::VaultNotRegistered { vault: [77u8; 32] })
    );
}

#[test]
fn test_oversized_batch_rejected() {
    let mut f = setup();
    let batch: Vec<ClaimEntry> = (0..limits::MAX_CLAIM_BATCH_SIZE as u64 + 1)
        .map(|nonce| entry(ALICE, COLLECTION_X, 1, nonce))
        .collect();
    let signature = sign(&f.engine, &batch);

    assert!(matches!(
        f.subsidize(&batch, &signature),
        Err(ProtocolError::BatchTooLarge { .. })
    ));
}

#[test]
fn test_adapter_shortfall_aborts_whole_batch() {
    let mut f = setup();
    let batch = [
        entry(ALICE, COLLECTION_X, 100, 0),
        entry(BOB, COLLECTION_Y, 50, 0),
    ];
    let signature = sign(&f.engine, &batch);

    f.adapter.market_mut().fail_withdrawals = true;
    let result = f.subsidize(&batch, &signature);

    assert_eq!(result, Err(ProtocolError::LendingManagerWithdrawFailed));
    // No partial subsidy application: nonces and totals untouched
    assert_eq!(f.engine.nonce_of(&VAULT_ADDR, &ALICE), 0);
    assert_eq!(f.engine.nonce_of(&VAULT_ADDR, &BOB), 0);
    assert_eq!(f.engine.claimed_by(&ALICE), 0);
    assert_eq!(f.engine.total_distributed(&VAULT_ADDR), 0);
    assert_eq!(f.vault.collection(&COLLECTION_X).unwrap().total_yield_transferred, 0);

    // The exact same signature settles once the adapter recovers
    f.adapter.market_mut().fail_withdrawals = false;
    assert_eq!(f.subsidize(&batch, &signature).unwrap(), 150);
}

#[test]
fn test_subsidize_emits_nonce_and_subsidy_events() {
    let mut f = setup();
    let batch = [entry(ALICE, COLLECTION_X, 100, 0)];
    let signature = sign(&f.engine, &batch);
    f.engine.take_events();

    f.subsidize(&batch, &signature).unwrap();

    let events = f.engine.take_events();
    assert_eq!(events.len(), 2);
    assert!(matches!(
        events[0],
        ProtocolEvent::ClaimNonceAdvanced { account: ALICE, new_nonce: 1, .. }
    ));
    assert!(matches!(
        events[1],
        ProtocolEvent::SubsidyApplied { account: ALICE, amount: 100, total_claimed: 100, .. }
    ));
}
