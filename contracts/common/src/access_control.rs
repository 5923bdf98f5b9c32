//! Access Control Module
//!
//! Explicit capability checks for the NestYield protocol. Each component
//! receives a reference to an [`AccessController`] and consults it at the
//! top of every guarded operation; there is no ambient global state and
//! no inheritance-based role hierarchy.

use crate::errors::{ProtocolError, ProtocolResult};
use crate::events::{EventLog, ProtocolEvent};
use crate::types::Address;
use crate::{BTreeMap, BTreeSet, Vec};
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

/// Protocol roles
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub enum Role {
    /// Protocol admin - registers collections, sets shares, fails epochs
    Admin,
    /// Operator - drives index accrual and epoch yield application
    Operator,
    /// Automation - drives the epoch lifecycle clock
    Automation,
    /// Rewards controller - may move yield out of the lending adapter
    RewardsController,
    /// Claim engine - may trigger batched behalf-repayments on a vault
    ClaimEngine,
    /// Pauser - may pause and unpause protocol operations
    Pauser,
}

impl Role {
    /// Stable role name for error payloads and logs
    pub fn name(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Operator => "Operator",
            Role::Automation => "Automation",
            Role::RewardsController => "RewardsController",
            Role::ClaimEngine => "ClaimEngine",
            Role::Pauser => "Pauser",
        }
    }
}

/// Owned role table consulted by every guarded operation.
///
/// The deploying admin is granted [`Role::Admin`] at construction; the
/// admin role also passes any other role check, so a fresh deployment
/// can bootstrap itself before granting out operational roles.
#[derive(Debug, Clone)]
pub struct AccessController {
    roles: BTreeMap<Address, BTreeSet<Role>>,
    events: EventLog,
}

impl AccessController {
    /// Create a controller with the given admin
    pub fn new(admin: Address) -> Self {
        let mut roles: BTreeMap<Address, BTreeSet<Role>> = BTreeMap::new();
        let mut admin_roles = BTreeSet::new();
        admin_roles.insert(Role::Admin);
        roles.insert(admin, admin_roles);

        Self {
            roles,
            events: EventLog::new(),
        }
    }

    /// Check if an address holds a role exactly
    pub fn has_role(&self, address: &Address, role: Role) -> bool {
        self.roles
            .get(address)
            .map(|set| set.contains(&role))
            .unwrap_or(false)
    }

    /// Require `caller` to hold `role` (or Admin), failing uniformly otherwise
    pub fn require(&self, caller: &Address, role: Role) -> ProtocolResult<()> {
        if self.has_role(caller, role) || self.has_role(caller, Role::Admin) {
            return Ok(());
        }
        Err(ProtocolError::MissingRole {
            caller: *caller,
            role: role.name(),
        })
    }

    /// Grant a role; only an admin may grant
    pub fn grant(&mut self, caller: &Address, account: Address, role: Role) -> ProtocolResult<()> {
        self.require(caller, Role::Admin)?;

        let inserted = self.roles.entry(account).or_default().insert(role);
        if inserted {
            self.events.emit(ProtocolEvent::RoleGranted { account, role });
        }
        Ok(())
    }

    /// Revoke a role; only an admin may revoke
    pub fn revoke(&mut self, caller: &Address, account: Address, role: Role) -> ProtocolResult<()> {
        self.require(caller, Role::Admin)?;

        let removed = self
            .roles
            .get_mut(&account)
            .map(|set| set.remove(&role))
            .unwrap_or(false);
        if removed {
            self.events.emit(ProtocolEvent::RoleRevoked { account, role });
        }
        Ok(())
    }

    /// Drain role-change events emitted since the last drain
    pub fn take_events(&mut self) -> Vec<ProtocolEvent> {
        self.events.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADMIN: Address = [1u8; 32];
    const OPERATOR: Address = [2u8; 32];
    const STRANGER: Address = [3u8; 32];

    #[test]
    fn test_admin_bootstrap() {
        let ac = AccessController::new(ADMIN);
        assert!(ac.has_role(&ADMIN, Role::Admin));
        // Admin passes any role check
        assert!(ac.require(&ADMIN, Role::Operator).is_ok());
        assert!(ac.require(&ADMIN, Role::Pauser).is_ok());
    }

    #[test]
    fn test_grant_and_require() {
        let mut ac = AccessController::new(ADMIN);
        ac.grant(&ADMIN, OPERATOR, Role::Operator).unwrap();

        assert!(ac.require(&OPERATOR, Role::Operator).is_ok());
        // Operator does not get other roles for free
        assert_eq!(
            ac.require(&OPERATOR, Role::Automation),
            Err(ProtocolError::MissingRole {
                caller: OPERATOR,
                role: "Automation",
            })
        );
    }

    #[test]
    fn test_unauthorized_grant() {
        let mut ac = AccessController::new(ADMIN);
        let result = ac.grant(&STRANGER, STRANGER, Role::Admin);
        assert!(matches!(result, Err(ProtocolError::MissingRole { .. })));
        assert!(!ac.has_role(&STRANGER, Role::Admin));
    }

    #[test]
    fn test_revoke() {
        let mut ac = AccessController::new(ADMIN);
        ac.grant(&ADMIN, OPERATOR, Role::Operator).unwrap();
        ac.revoke(&ADMIN, OPERATOR, Role::Operator).unwrap();

        assert!(ac.require(&OPERATOR, Role::Operator).is_err());
    }

    #[test]
    fn test_role_change_events() {
        let mut ac = AccessController::new(ADMIN);
        ac.grant(&ADMIN, OPERATOR, Role::Operator).unwrap();
        // Granting the same role twice emits only once
        ac.grant(&ADMIN, OPERATOR, Role::Operator).unwrap();
        ac.revoke(&ADMIN, OPERATOR, Role::Operator).unwrap();

        let events = ac.take_events();
        assert_eq!(events.len(), 2);
    }
}
