//! Epoch Scheduler for the NestYield Protocol
//!
//! A time-boxed state machine tracking one global epoch at a time, with
//! an independent per-(epoch, vault) yield-allocation ledger.
//!
//! Lifecycle: `Active -> Processing -> Completed`, with `Active` or
//! `Processing` -> `Failed` as an administrative escape. A `Failed`
//! epoch is permanently terminal: it can never be processed, finalized,
//! or superseded - `start_new_epoch` keeps requiring `Completed`.
//!
//! There is no background clock. Callers inject wall-clock time
//! (`now`, seconds) and the scheduler compares it against each epoch's
//! `end_time`.

use nestyield_common::{
    constants::epoch as epoch_config,
    errors::{ProtocolError, ProtocolResult},
    events::{EventLog, ProtocolEvent},
    math::safe_add,
    types::{Address, Epoch, EpochFailureReason, EpochStatus},
    AccessController, BTreeMap, Role, Vec,
};

/// Epoch state machine and per-vault allocation ledger
#[derive(Debug)]
pub struct EpochScheduler {
    /// Fixed epoch duration in seconds
    epoch_duration_secs: u64,
    /// All epochs ever started, keyed by id
    epochs: BTreeMap<u64, Epoch>,
    /// Latest epoch id; [`epoch_config::NO_EPOCH`] before the first start
    current_epoch_id: u64,
    /// Yield allocated per (epoch, vault)
    allocations: BTreeMap<(u64, Address), u64>,
    events: EventLog,
}

impl EpochScheduler {
    /// Create a scheduler with the given epoch duration, clamped into
    /// the configured min/max bounds
    pub fn new(epoch_duration_secs: u64) -> Self {
        Self {
            epoch_duration_secs: epoch_duration_secs
                .clamp(epoch_config::MIN_DURATION_SECS, epoch_config::MAX_DURATION_SECS),
            epochs: BTreeMap::new(),
            current_epoch_id: epoch_config::NO_EPOCH,
            allocations: BTreeMap::new(),
            events: EventLog::new(),
        }
    }

    /// Create a scheduler with the network's default epoch duration
    pub fn with_default_duration() -> Self {
        Self::new(epoch_config::DEFAULT_DURATION_SECS)
    }

    /// Latest epoch id, or [`epoch_config::NO_EPOCH`] if none started yet
    pub fn current_epoch_id(&self) -> u64 {
        self.current_epoch_id
    }

    /// Look up an epoch by id
    pub fn epoch(&self, id: u64) -> Option<&Epoch> {
        self.epochs.get(&id)
    }

    /// Yield allocated by `vault` into epoch `id`
    pub fn vault_allocation(&self, id: u64, vault: &Address) -> u64 {
        self.allocations.get(&(id, *vault)).copied().unwrap_or(0)
    }

    /// Start a new epoch.
    ///
    /// Legal only when no epoch exists or the latest one is `Completed`.
    /// Returns the new epoch's id (monotonic, starting at 1).
    pub fn start_new_epoch(
        &mut self,
        caller: &Address,
        access: &AccessController,
        now: u64,
    ) -> ProtocolResult<u64> {
        access.require(caller, Role::Automation)?;

        if let Some(latest) = self.epochs.get(&self.current_epoch_id) {
            if latest.status != EpochStatus::Completed {
                return Err(ProtocolError::InvalidEpochStatus {
                    epoch_id: latest.id,
                    current: latest.status.name(),
                    required: EpochStatus::Completed.name(),
                });
            }
        }

        let id = self.current_epoch_id + 1;
        let epoch = Epoch::new(id, now, self.epoch_duration_secs);
        self.events.emit(ProtocolEvent::EpochStarted {
            epoch_id: id,
            start_time: epoch.start_time,
            end_time: epoch.end_time,
        });
        self.epochs.insert(id, epoch);
        self.current_epoch_id = id;
        Ok(id)
    }

    /// Record a vault's yield allocation into the current epoch.
    ///
    /// Legal only while the current epoch is `Active`. Repeated
    /// allocations against the same epoch serialize through the epoch's
    /// allocation counter. Called by the allocating vault, which owns
    /// its own ledger entries exclusively.
    pub fn allocate_vault_yield(&mut self, vault: Address, amount: u64) -> ProtocolResult<()> {
        if self.current_epoch_id == epoch_config::NO_EPOCH {
            return Err(ProtocolError::InvalidEpochId {
                epoch_id: epoch_config::NO_EPOCH,
            });
        }

        let id = self.current_epoch_id;
        let epoch = self.epochs.get_mut(&id).ok_or(ProtocolError::InvalidEpochId { epoch_id: id })?;
        if epoch.status != EpochStatus::Active {
            return Err(ProtocolError::InvalidEpochStatus {
                epoch_id: id,
                current: epoch.status.name(),
                required: EpochStatus::Active.name(),
            });
        }

        epoch.total_yield_allocated = safe_add(epoch.total_yield_allocated, amount)?;
        let entry = self.allocations.entry((id, vault)).or_insert(0);
        *entry = safe_add(*entry, amount)?;
        Ok(())
    }

    /// Move an ended `Active` epoch into `Processing`.
    pub fn begin_epoch_processing(
        &mut self,
        id: u64,
        caller: &Address,
        access: &AccessController,
        now: u64,
    ) -> ProtocolResult<()> {
        access.require(caller, Role::Automation)?;

        let epoch = self.epochs.get_mut(&id).ok_or(ProtocolError::InvalidEpochId { epoch_id: id })?;
        if epoch.status != EpochStatus::Active {
            return Err(ProtocolError::InvalidEpochStatus {
                epoch_id: id,
                current: epoch.status.name(),
                required: EpochStatus::Active.name(),
            });
        }
        if !epoch.is_ended(now) {
            return Err(ProtocolError::EpochNotEnded {
                epoch_id: id,
                end_time: epoch.end_time,
                now,
            });
        }

        epoch.status = EpochStatus::Processing;
        self.events.emit(ProtocolEvent::EpochProcessing {
            epoch_id: id,
            total_yield_allocated: epoch.total_yield_allocated,
        });
        Ok(())
    }

    /// Finalize a `Processing` epoch with its realized subsidy total.
    pub fn finalize_epoch(
        &mut self,
        id: u64,
        total_subsidies_distributed: u64,
        caller: &Address,
        access: &AccessController,
    ) -> ProtocolResult<()> {
        access.require(caller, Role::Automation)?;

        let epoch = self.epochs.get_mut(&id).ok_or(ProtocolError::InvalidEpochId { epoch_id: id })?;
        if epoch.status != EpochStatus::Processing {
            return Err(ProtocolError::InvalidEpochStatus {
                epoch_id: id,
                current: epoch.status.name(),
                required: EpochStatus::Processing.name(),
            });
        }

        epoch.total_subsidies_distributed = total_subsidies_distributed;
        epoch.status = EpochStatus::Completed;
        self.events.emit(ProtocolEvent::EpochFinalized {
            epoch_id: id,
            total_subsidies_distributed,
        });
        Ok(())
    }

    /// Administratively fail an `Active` or `Processing` epoch.
    ///
    /// A failed epoch is a permanent dead end: no lifecycle call for it
    /// succeeds afterwards, and no new epoch can start on top of it.
    /// Recovery, if any, is operational and out of band.
    pub fn mark_epoch_failed(
        &mut self,
        id: u64,
        reason: EpochFailureReason,
        caller: &Address,
        access: &AccessController,
    ) -> ProtocolResult<()> {
        access.require(caller, Role::Admin)?;

        let epoch = self.epochs.get_mut(&id).ok_or(ProtocolError::InvalidEpochId { epoch_id: id })?;
        match epoch.status {
            EpochStatus::Active | EpochStatus::Processing => {}
            other => {
                return Err(ProtocolError::InvalidEpochStatus {
                    epoch_id: id,
                    current: other.name(),
                    required: "Active or Processing",
                });
            }
        }

        epoch.status = EpochStatus::Failed;
        epoch.failure_reason = Some(reason);
        self.events.emit(ProtocolEvent::EpochFailed { epoch_id: id, reason });
        Ok(())
    }

    /// Drain events emitted since the last drain
    pub fn take_events(&mut self) -> Vec<ProtocolEvent> {
        self.events.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADMIN: Address = [1u8; 32];
    const AUTOMATION: Address = [2u8; 32];
    const VAULT: Address = [5u8; 32];

    const DURATION: u64 = 3_600;
    const T0: u64 = 1_000;

    fn setup() -> (EpochScheduler, AccessController) {
        let mut access = AccessController::new(ADMIN);
        access.grant(&ADMIN, AUTOMATION, Role::Automation).unwrap();
        (EpochScheduler::new(DURATION), access)
    }

    #[test]
    fn test_ids_monotonic_from_one() {
        let (mut scheduler, access) = setup();

        let first = scheduler.start_new_epoch(&AUTOMATION, &access, T0).unwrap();
        assert_eq!(first, 1);

        scheduler.begin_epoch_processing(1, &AUTOMATION, &access, T0 + DURATION).unwrap();
        scheduler.finalize_epoch(1, 0, &AUTOMATION, &access).unwrap();

        let second = scheduler.start_new_epoch(&AUTOMATION, &access, T0 + DURATION).unwrap();
        assert_eq!(second, 2);
    }

    #[test]
    fn test_start_requires_completed_predecessor() {
        let (mut scheduler, access) = setup();
        scheduler.start_new_epoch(&AUTOMATION, &access, T0).unwrap();

        let result = scheduler.start_new_epoch(&AUTOMATION, &access, T0 + 1);
        assert_eq!(
            result,
            Err(ProtocolError::InvalidEpochStatus {
                epoch_id: 1,
                current: "Active",
                required: "Completed",
            })
        );
    }

    #[test]
    fn test_allocation_before_first_epoch() {
        let (mut scheduler, _) = setup();
        assert_eq!(
            scheduler.allocate_vault_yield(VAULT, 100),
            Err(ProtocolError::InvalidEpochId { epoch_id: 0 })
        );
    }

    #[test]
    fn test_allocations_serialize_through_counter() {
        let (mut scheduler, access) = setup();
        scheduler.start_new_epoch(&AUTOMATION, &access, T0).unwrap();

        scheduler.allocate_vault_yield(VAULT, 100).unwrap();
        scheduler.allocate_vault_yield(VAULT, 50).unwrap();

        assert_eq!(scheduler.vault_allocation(1, &VAULT), 150);
        assert_eq!(scheduler.epoch(1).unwrap().total_yield_allocated, 150);
    }

    #[test]
    fn test_allocation_rejected_after_processing() {
        let (mut scheduler, access) = setup();
        scheduler.start_new_epoch(&AUTOMATION, &access, T0).unwrap();
        scheduler.begin_epoch_processing(1, &AUTOMATION, &access, T0 + DURATION).unwrap();

        let result = scheduler.allocate_vault_yield(VAULT, 10);
        assert!(matches!(result, Err(ProtocolError::InvalidEpochStatus { .. })));
    }

    #[test]
    fn test_processing_requires_end_time() {
        let (mut scheduler, access) = setup();
        scheduler.start_new_epoch(&AUTOMATION, &access, T0).unwrap();

        let result = scheduler.begin_epoch_processing(1, &AUTOMATION, &access, T0 + DURATION - 1);
        assert_eq!(
            result,
            Err(ProtocolError::EpochNotEnded {
                epoch_id: 1,
                end_time: T0 + DURATION,
                now: T0 + DURATION - 1,
            })
        );
    }

    #[test]
    fn test_finalize_only_from_processing() {
        let (mut scheduler, access) = setup();
        scheduler.start_new_epoch(&AUTOMATION, &access, T0).unwrap();

        let result = scheduler.finalize_epoch(1, 0, &AUTOMATION, &access);
        assert_eq!(
            result,
            Err(ProtocolError::InvalidEpochStatus {
                epoch_id: 1,
                current: "Active",
                required: "Processing",
            })
        );
    }

    #[test]
    fn test_finalize_records_subsidy_total() {
        let (mut scheduler, access) = setup();
        scheduler.start_new_epoch(&AUTOMATION, &access, T0).unwrap();
        scheduler.begin_epoch_processing(1, &AUTOMATION, &access, T0 + DURATION).unwrap();
        scheduler.finalize_epoch(1, 777, &AUTOMATION, &access).unwrap();

        let epoch = scheduler.epoch(1).unwrap();
        assert_eq!(epoch.status, EpochStatus::Completed);
        assert_eq!(epoch.total_subsidies_distributed, 777);
    }

    #[test]
    fn test_failed_epoch_is_terminal() {
        let (mut scheduler, access) = setup();
        scheduler.start_new_epoch(&AUTOMATION, &access, T0).unwrap();
        scheduler
            .mark_epoch_failed(1, EpochFailureReason::AdminAction, &ADMIN, &access)
            .unwrap();

        // No processing, no finalization, no second failure
        assert!(scheduler
            .begin_epoch_processing(1, &AUTOMATION, &access, T0 + DURATION)
            .is_err());
        assert!(scheduler.finalize_epoch(1, 0, &AUTOMATION, &access).is_err());
        assert!(scheduler
            .mark_epoch_failed(1, EpochFailureReason::AdminAction, &ADMIN, &access)
            .is_err());

        // And no successor epoch
        let result = scheduler.start_new_epoch(&AUTOMATION, &access, T0 + DURATION);
        assert_eq!(
            result,
            Err(ProtocolError::InvalidEpochStatus {
                epoch_id: 1,
                current: "Failed",
                required: "Completed",
            })
        );
    }

    #[test]
    fn test_fail_from_processing() {
        let (mut scheduler, access) = setup();
        scheduler.start_new_epoch(&AUTOMATION, &access, T0).unwrap();
        scheduler.begin_epoch_processing(1, &AUTOMATION, &access, T0 + DURATION).unwrap();
        scheduler
            .mark_epoch_failed(1, EpochFailureReason::SettlementFailure, &ADMIN, &access)
            .unwrap();

        let epoch = scheduler.epoch(1).unwrap();
        assert_eq!(epoch.status, EpochStatus::Failed);
        assert_eq!(epoch.failure_reason, Some(EpochFailureReason::SettlementFailure));
    }

    #[test]
    fn test_role_gating() {
        let (mut scheduler, access) = setup();
        let stranger = [9u8; 32];

        assert!(matches!(
            scheduler.start_new_epoch(&stranger, &access, T0),
            Err(ProtocolError::MissingRole { .. })
        ));

        scheduler.start_new_epoch(&AUTOMATION, &access, T0).unwrap();
        // Failing an epoch needs Admin, not Automation
        assert!(matches!(
            scheduler.mark_epoch_failed(1, EpochFailureReason::AdminAction, &AUTOMATION, &access),
            Err(ProtocolError::MissingRole { .. })
        ));
    }

    #[test]
    fn test_lifecycle_events() {
        let (mut scheduler, access) = setup();
        scheduler.start_new_epoch(&AUTOMATION, &access, T0).unwrap();
        scheduler.begin_epoch_processing(1, &AUTOMATION, &access, T0 + DURATION).unwrap();
        scheduler.finalize_epoch(1, 42, &AUTOMATION, &access).unwrap();

        let events = scheduler.take_events();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], ProtocolEvent::EpochStarted { epoch_id: 1, .. }));
        assert!(matches!(events[2], ProtocolEvent::EpochFinalized {
            epoch_id: 1,
            total_subsidies_distributed: 42,
        }));
    }
}
