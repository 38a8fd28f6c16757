/*!
 * # Permissions Module
 *
 * Permissions are `resource:action` strings. A user's permission list may
 * contain `resource:*` (every action on a resource) or `*` (everything).
 * The predicates here are pure: they only look at the list they are given.
 */

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

/// Resource types
pub struct Resources;

impl Resources {
    pub const PURCHASE_ORDERS: &'static str = "purchase_orders";
    pub const QUALITY_CONTROL: &'static str = "quality_control";
    pub const WAREHOUSE_APPROVAL: &'static str = "warehouse_approval";
    pub const INVENTORY: &'static str = "inventory";
    pub const PRODUCTS: &'static str = "products";
    pub const WAREHOUSES: &'static str = "warehouses";
    pub const DOCTORS: &'static str = "doctors";
    pub const PORTFOLIOS: &'static str = "portfolios";
    pub const REPORTS: &'static str = "reports";
}

/// Permission string constants used by handlers, services and the workflow table
pub mod consts {
    // Purchase orders
    pub const PURCHASE_ORDERS_READ: &str = "purchase_orders:read";
    pub const PURCHASE_ORDERS_CREATE: &str = "purchase_orders:create";
    pub const PURCHASE_ORDERS_UPDATE: &str = "purchase_orders:update";
    pub const PURCHASE_ORDERS_DELETE: &str = "purchase_orders:delete";
    pub const PURCHASE_ORDERS_EXPORT: &str = "purchase_orders:export";
    pub const PURCHASE_ORDERS_SUBMIT: &str = "purchase_orders:submit";
    pub const PURCHASE_ORDERS_APPROVE_L1: &str = "purchase_orders:approve_l1";
    pub const PURCHASE_ORDERS_APPROVE_FINAL: &str = "purchase_orders:approve_final";
    pub const PURCHASE_ORDERS_REJECT: &str = "purchase_orders:reject";
    pub const PURCHASE_ORDERS_CANCEL: &str = "purchase_orders:cancel";
    pub const PURCHASE_ORDERS_ORDER: &str = "purchase_orders:order";
    pub const PURCHASE_ORDERS_RECEIVE: &str = "purchase_orders:receive";
    pub const PURCHASE_ORDERS_COMPLETE: &str = "purchase_orders:complete";

    // Quality control
    pub const QUALITY_CONTROL_READ: &str = "quality_control:read";
    pub const QUALITY_CONTROL_CREATE: &str = "quality_control:create";
    pub const QUALITY_CONTROL_UPDATE: &str = "quality_control:update";
    pub const QUALITY_CONTROL_ASSIGN: &str = "quality_control:assign";
    pub const QUALITY_CONTROL_APPROVE: &str = "quality_control:approve";

    // Warehouse approval
    pub const WAREHOUSE_APPROVAL_READ: &str = "warehouse_approval:read";
    pub const WAREHOUSE_APPROVAL_CREATE: &str = "warehouse_approval:create";
    pub const WAREHOUSE_APPROVAL_UPDATE: &str = "warehouse_approval:update";
    pub const WAREHOUSE_APPROVAL_APPROVE: &str = "warehouse_approval:approve";

    // Inventory
    pub const INVENTORY_READ: &str = "inventory:read";
    pub const INVENTORY_RESERVE: &str = "inventory:reserve";

    // Master data
    pub const PRODUCTS_READ: &str = "products:read";
    pub const PRODUCTS_WRITE: &str = "products:write";
    pub const WAREHOUSES_READ: &str = "warehouses:read";
    pub const WAREHOUSES_WRITE: &str = "warehouses:write";
    pub const DOCTORS_READ: &str = "doctors:read";
    pub const DOCTORS_WRITE: &str = "doctors:write";
    pub const PORTFOLIOS_READ: &str = "portfolios:read";
    pub const PORTFOLIOS_WRITE: &str = "portfolios:write";

    // Reports
    pub const REPORTS_READ: &str = "reports:read";

    pub const ADMIN_ALL: &str = "admin:*";
}

/// Check if `granted` implies `required`.
///
/// `resource:*` grants every action on `resource`; `*` and `admin:*` grant
/// everything.
pub fn is_permission_implied(granted: &str, required: &str) -> bool {
    if granted == required || granted == "*" || granted == consts::ADMIN_ALL {
        return true;
    }

    match (granted.split_once(':'), required.split_once(':')) {
        (Some((granted_resource, "*")), Some((required_resource, _))) => {
            granted_resource == required_resource
        }
        _ => false,
    }
}

/// Anything that carries a flat permission list.
pub trait PermissionHolder {
    fn permissions(&self) -> &[String];
}

impl PermissionHolder for [String] {
    fn permissions(&self) -> &[String] {
        self
    }
}

impl PermissionHolder for Vec<String> {
    fn permissions(&self) -> &[String] {
        self
    }
}

pub fn has_permission<H: PermissionHolder + ?Sized>(holder: &H, required: &str) -> bool {
    holder
        .permissions()
        .iter()
        .any(|granted| is_permission_implied(granted, required))
}

/// AND over `required`. An empty requirement list is satisfied.
pub fn has_all_permissions<H: PermissionHolder + ?Sized>(holder: &H, required: &[&str]) -> bool {
    required.iter().all(|r| has_permission(holder, r))
}

/// OR over `required`. An empty requirement list is never satisfied.
pub fn has_any_permission<H: PermissionHolder + ?Sized>(holder: &H, required: &[&str]) -> bool {
    required.iter().any(|r| has_permission(holder, r))
}

/// Application modules gated in navigation and routing.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Module {
    PurchaseOrders,
    QualityControl,
    WarehouseApproval,
    Inventory,
    Products,
    Warehouses,
    Doctors,
    Portfolios,
    Reports,
}

impl Module {
    pub fn resource(&self) -> &'static str {
        match self {
            Module::PurchaseOrders => Resources::PURCHASE_ORDERS,
            Module::QualityControl => Resources::QUALITY_CONTROL,
            Module::WarehouseApproval => Resources::WAREHOUSE_APPROVAL,
            Module::Inventory => Resources::INVENTORY,
            Module::Products => Resources::PRODUCTS,
            Module::Warehouses => Resources::WAREHOUSES,
            Module::Doctors => Resources::DOCTORS,
            Module::Portfolios => Resources::PORTFOLIOS,
            Module::Reports => Resources::REPORTS,
        }
    }
}

/// A module is accessible when the holder has any permission on its resource.
pub fn can_access_module<H: PermissionHolder + ?Sized>(holder: &H, module: Module) -> bool {
    let resource = module.resource();
    holder.permissions().iter().any(|granted| {
        granted == "*"
            || granted == consts::ADMIN_ALL
            || granted
                .split_once(':')
                .map_or(false, |(granted_resource, _)| granted_resource == resource)
    })
}

pub fn accessible_modules<H: PermissionHolder + ?Sized>(holder: &H) -> Vec<Module> {
    Module::iter()
        .filter(|m| can_access_module(holder, *m))
        .collect()
}

/// Holds at least one approval permission in the PO, QC or warehouse chain.
pub fn is_approver<H: PermissionHolder + ?Sized>(holder: &H) -> bool {
    has_any_permission(
        holder,
        &[
            consts::PURCHASE_ORDERS_APPROVE_L1,
            consts::PURCHASE_ORDERS_APPROVE_FINAL,
            consts::QUALITY_CONTROL_APPROVE,
            consts::WAREHOUSE_APPROVAL_APPROVE,
        ],
    )
}

/// Equivalent of the admin role expressed over permissions.
pub fn is_admin_equivalent<H: PermissionHolder + ?Sized>(holder: &H) -> bool {
    has_permission(holder, consts::ADMIN_ALL)
        || has_all_permissions(
            holder,
            &[
                "purchase_orders:*",
                "quality_control:*",
                "warehouse_approval:*",
                "inventory:*",
            ],
        )
}
