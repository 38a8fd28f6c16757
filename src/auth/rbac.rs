/*!
 * # Role-Based Access Control (RBAC) Module
 *
 * Static role catalogue. Roles only exist to expand into permission strings;
 * every check downstream is made against permissions.
 */

use lazy_static::lazy_static;
use std::collections::{BTreeSet, HashMap};
use tracing::warn;

use super::permissions::consts;

/// Role definition with associated permissions
#[derive(Debug, Clone)]
pub struct Role {
    pub name: String,
    pub description: String,
    pub permissions: Vec<String>,
}

fn role(name: &str, description: &str, permissions: &[&str]) -> (String, Role) {
    (
        name.to_string(),
        Role {
            name: name.to_string(),
            description: description.to_string(),
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
        },
    )
}

lazy_static! {
    pub static ref ROLES: HashMap<String, Role> = {
        let mut roles = HashMap::new();

        roles.extend([
            role("admin", "Administrator with full access", &["*"]),
            role(
                "purchase_manager",
                "Approves and places purchase orders",
                &[
                    "purchase_orders:*",
                    consts::PRODUCTS_READ,
                    consts::WAREHOUSES_READ,
                    consts::INVENTORY_READ,
                    consts::QUALITY_CONTROL_READ,
                    consts::REPORTS_READ,
                ],
            ),
            role(
                "purchase_executive",
                "Drafts purchase orders and records receipts",
                &[
                    consts::PURCHASE_ORDERS_READ,
                    consts::PURCHASE_ORDERS_CREATE,
                    consts::PURCHASE_ORDERS_UPDATE,
                    consts::PURCHASE_ORDERS_SUBMIT,
                    consts::PURCHASE_ORDERS_RECEIVE,
                    consts::PURCHASE_ORDERS_EXPORT,
                    consts::PRODUCTS_READ,
                    consts::WAREHOUSES_READ,
                ],
            ),
            role(
                "qc_manager",
                "Assigns and approves quality-control inspections",
                &[
                    "quality_control:*",
                    consts::PURCHASE_ORDERS_READ,
                    consts::PURCHASE_ORDERS_COMPLETE,
                    consts::PRODUCTS_READ,
                ],
            ),
            role(
                "qc_inspector",
                "Records inspection results",
                &[
                    consts::QUALITY_CONTROL_READ,
                    consts::QUALITY_CONTROL_UPDATE,
                    consts::PURCHASE_ORDERS_READ,
                    consts::PRODUCTS_READ,
                ],
            ),
            role(
                "warehouse_manager",
                "Approves storage and manages stock",
                &[
                    "warehouse_approval:*",
                    "inventory:*",
                    "warehouses:*",
                    consts::QUALITY_CONTROL_READ,
                    consts::PRODUCTS_READ,
                ],
            ),
            role(
                "viewer",
                "Read-only access to data",
                &[
                    consts::PURCHASE_ORDERS_READ,
                    consts::QUALITY_CONTROL_READ,
                    consts::WAREHOUSE_APPROVAL_READ,
                    consts::INVENTORY_READ,
                    consts::PRODUCTS_READ,
                    consts::WAREHOUSES_READ,
                    consts::DOCTORS_READ,
                    consts::PORTFOLIOS_READ,
                    consts::REPORTS_READ,
                ],
            ),
        ]);

        roles
    };
}

/// RBAC service for expanding roles into permissions
#[derive(Clone, Default)]
pub struct RbacService;

impl RbacService {
    pub fn new() -> Self {
        Self
    }

    pub fn get_role(&self, role_name: &str) -> Option<&'static Role> {
        ROLES.get(role_name)
    }

    pub fn get_all_roles(&self) -> Vec<&'static Role> {
        let mut roles: Vec<_> = ROLES.values().collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        roles
    }

    pub fn get_role_permissions(&self, role_name: &str) -> Vec<String> {
        match ROLES.get(role_name) {
            Some(role) => role.permissions.clone(),
            None => {
                warn!("Role not found: {}", role_name);
                vec![]
            }
        }
    }

    /// Union of the permissions of `role_names`, sorted and de-duplicated.
    pub fn get_permissions_for_roles(&self, role_names: &[String]) -> Vec<String> {
        let permissions: BTreeSet<String> = role_names
            .iter()
            .flat_map(|r| self.get_role_permissions(r))
            .collect();
        permissions.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::permissions::{has_permission, is_admin_equivalent};

    #[test]
    fn admin_expands_to_global_wildcard() {
        let rbac = RbacService::new();
        let perms = rbac.get_permissions_for_roles(&["admin".to_string()]);
        assert!(is_admin_equivalent(&perms));
    }

    #[test]
    fn roles_union_without_duplicates() {
        let rbac = RbacService::new();
        let perms = rbac.get_permissions_for_roles(&[
            "qc_inspector".to_string(),
            "viewer".to_string(),
        ]);
        let reads = perms
            .iter()
            .filter(|p| p.as_str() == consts::QUALITY_CONTROL_READ)
            .count();
        assert_eq!(reads, 1);
        assert!(has_permission(&perms, consts::QUALITY_CONTROL_UPDATE));
        assert!(!has_permission(&perms, consts::QUALITY_CONTROL_APPROVE));
    }

    #[test]
    fn unknown_role_grants_nothing() {
        let rbac = RbacService::new();
        assert!(rbac.get_role_permissions("intern").is_empty());
        assert!(rbac.get_role("intern").is_none());
    }

    #[test]
    fn executive_cannot_approve() {
        let rbac = RbacService::new();
        let perms = rbac.get_role_permissions("purchase_executive");
        assert!(has_permission(&perms, consts::PURCHASE_ORDERS_SUBMIT));
        assert!(!has_permission(&perms, consts::PURCHASE_ORDERS_APPROVE_L1));
    }
}
