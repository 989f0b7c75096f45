use crate::config::RolesConfig;
use crate::domains::actor::ActorRef;

/// Operation classes the core gates before any read or write happens on a
/// caller's behalf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Record a set.
    RecordActivity,
    /// Record a closed deal or a scheduled install.
    CloseDeals,
    ViewStats,
    /// Export the ledger or delete events.
    ManageLedger,
}

/// Pure predicate; the concrete role/identity mapping lives outside the
/// core's logic.
pub trait PermissionGate: Send + Sync {
    fn allows(&self, actor: &ActorRef, capability: Capability) -> bool;
}

/// Role-id list gate built from the configured tiers. Tiers nest: every
/// tier holds the capabilities of the tiers below it.
pub struct RoleListGate {
    manage: Vec<String>,
    close: Vec<String>,
    record: Vec<String>,
}

impl RoleListGate {
    pub fn from_config(roles: &RolesConfig) -> Self {
        let manage: Vec<String> = roles
            .admin
            .iter()
            .chain(roles.manager.iter())
            .cloned()
            .collect();
        let close: Vec<String> = manage.iter().chain(roles.closer.iter()).cloned().collect();
        let record: Vec<String> = close.iter().chain(roles.setter.iter()).cloned().collect();
        Self {
            manage,
            close,
            record,
        }
    }

    fn required(&self, capability: Capability) -> &[String] {
        match capability {
            Capability::ManageLedger => &self.manage,
            Capability::CloseDeals => &self.close,
            Capability::RecordActivity | Capability::ViewStats => &self.record,
        }
    }
}

impl PermissionGate for RoleListGate {
    fn allows(&self, actor: &ActorRef, capability: Capability) -> bool {
        let required = self.required(capability);
        actor.roles.iter().any(|role| required.contains(role))
    }
}
