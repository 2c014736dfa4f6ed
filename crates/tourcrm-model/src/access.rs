// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::status::{string_enum, ParseError};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    Admin,
    Manager,
    Agent,
    Accountant,
    Viewer,
}

string_enum!(Role, "role", {
    SuperAdmin => "super_admin",
    Admin => "admin",
    Manager => "manager",
    Agent => "agent",
    Accountant => "accountant",
    Viewer => "viewer",
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
}

string_enum!(Action, "action", {
    Read => "read",
    Create => "create",
    Update => "update",
    Delete => "delete",
});

impl Action {
    /// GET reads, POST creates, PUT and PATCH update, DELETE deletes.
    #[must_use]
    pub fn for_method(method: &str) -> Option<Self> {
        match method {
            "GET" | "HEAD" => Some(Self::Read),
            "POST" => Some(Self::Create),
            "PUT" | "PATCH" => Some(Self::Update),
            "DELETE" => Some(Self::Delete),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum PermissionResource {
    Clients,
    Agents,
    Requests,
    Quotations,
    Bookings,
    Invoices,
    Finance,
    Providers,
    Pricing,
    Reports,
    Dashboard,
    Users,
    Admin,
    Audit,
}

string_enum!(PermissionResource, "permission resource", {
    Clients => "clients",
    Agents => "agents",
    Requests => "requests",
    Quotations => "quotations",
    Bookings => "bookings",
    Invoices => "invoices",
    Finance => "finance",
    Providers => "providers",
    Pricing => "pricing",
    Reports => "reports",
    Dashboard => "dashboard",
    Users => "users",
    Admin => "admin",
    Audit => "audit",
});

impl Role {
    /// Permission matrix. Tenant scoping is enforced separately: only
    /// `super_admin` may act on an organization other than its own.
    #[must_use]
    pub fn allows(self, resource: PermissionResource, action: Action) -> bool {
        use PermissionResource as R;
        let read = action == Action::Read;
        match self {
            Self::SuperAdmin | Self::Admin => true,
            Self::Manager => match resource {
                R::Admin => false,
                R::Users | R::Audit => read,
                _ => true,
            },
            Self::Agent => match resource {
                R::Clients | R::Requests | R::Quotations | R::Bookings => true,
                R::Providers | R::Pricing | R::Dashboard | R::Agents => read,
                _ => false,
            },
            Self::Accountant => match resource {
                R::Invoices | R::Finance => true,
                R::Admin | R::Users | R::Audit => false,
                _ => read,
            },
            Self::Viewer => match resource {
                R::Admin | R::Users | R::Audit | R::Finance => false,
                _ => read,
            },
        }
    }

    /// Granted actions per resource, omitting resources with no access.
    #[must_use]
    pub fn grants(self) -> Vec<(PermissionResource, Vec<Action>)> {
        PermissionResource::ALL
            .iter()
            .filter_map(|resource| {
                let actions: Vec<Action> = Action::ALL
                    .iter()
                    .copied()
                    .filter(|action| self.allows(*resource, *action))
                    .collect();
                (!actions.is_empty()).then_some((*resource, actions))
            })
            .collect()
    }

    #[must_use]
    pub const fn crosses_tenants(self) -> bool {
        matches!(self, Self::SuperAdmin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_maps_to_action() {
        assert_eq!(Action::for_method("GET"), Some(Action::Read));
        assert_eq!(Action::for_method("PATCH"), Some(Action::Update));
        assert_eq!(Action::for_method("OPTIONS"), None);
    }

    #[test]
    fn agent_reads_but_cannot_edit_pricing() {
        assert!(Role::Agent.allows(PermissionResource::Pricing, Action::Read));
        assert!(!Role::Agent.allows(PermissionResource::Pricing, Action::Update));
        assert!(Role::Agent.allows(PermissionResource::Quotations, Action::Delete));
        assert!(!Role::Agent.allows(PermissionResource::Invoices, Action::Read));
    }

    #[test]
    fn nobody_below_admin_touches_admin_routes() {
        for role in [Role::Manager, Role::Agent, Role::Accountant, Role::Viewer] {
            for action in Action::ALL {
                assert!(!role.allows(PermissionResource::Admin, *action), "{role}");
            }
        }
        assert!(Role::Admin.allows(PermissionResource::Admin, Action::Create));
    }

    #[test]
    fn viewer_grants_are_read_only() {
        let grants = Role::Viewer.grants();
        assert!(grants
            .iter()
            .all(|(_, actions)| actions.as_slice() == [Action::Read]));
        assert!(!grants
            .iter()
            .any(|(resource, _)| *resource == PermissionResource::Finance));
    }
}
