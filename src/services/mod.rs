// Purchase order workflow
pub mod purchase_orders;
pub mod quality_control;
pub mod warehouse_approval;

// Stock
pub mod inventory;

// Reference data
pub mod master_data;
