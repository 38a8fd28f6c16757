pub mod common;
pub mod health;
pub mod inventory;
pub mod master_data;
pub mod purchase_orders;
pub mod quality_control;
pub mod warehouse_approvals;
pub mod workflow;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::events::EventSender;
use crate::models::{
    Doctor, Inventory, Portfolio, Product, PurchaseOrder, QualityControl, Warehouse,
    WarehouseApproval,
};
use crate::repositories::InMemoryRepository;
use crate::services::{
    inventory::InventoryService, master_data::MasterDataService,
    purchase_orders::PurchaseOrderService, quality_control::QualityControlService,
    warehouse_approval::WarehouseApprovalService,
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub purchase_orders: PurchaseOrderService,
    pub quality_control: QualityControlService,
    pub warehouse_approval: WarehouseApprovalService,
    pub inventory: InventoryService,
    pub products: MasterDataService<Product>,
    pub warehouses: MasterDataService<Warehouse>,
    pub doctors: MasterDataService<Doctor>,
    pub portfolios: MasterDataService<Portfolio>,
}

impl AppServices {
    /// Wires every service to in-memory repositories. Services that touch the
    /// same collection share one repository.
    pub fn in_memory(config: &AppConfig, events: EventSender) -> Self {
        let orders = Arc::new(InMemoryRepository::<PurchaseOrder>::new());
        let inspections = Arc::new(InMemoryRepository::<QualityControl>::new());
        let approvals = Arc::new(InMemoryRepository::<WarehouseApproval>::new());
        let stock = Arc::new(InMemoryRepository::<Inventory>::new());
        let warehouses = Arc::new(InMemoryRepository::<Warehouse>::new());

        let purchase_orders =
            PurchaseOrderService::new(orders, events.clone(), config.default_gst_rate)
                .with_currency(config.default_currency.clone());
        let quality_control =
            QualityControlService::new(inspections, purchase_orders.clone(), events.clone());
        let warehouse_approval = WarehouseApprovalService::new(
            approvals,
            stock.clone(),
            warehouses.clone(),
            quality_control.clone(),
            events.clone(),
        );

        Self {
            purchase_orders,
            quality_control,
            warehouse_approval,
            inventory: InventoryService::new(stock, events.clone()),
            products: MasterDataService::new(
                Arc::new(InMemoryRepository::<Product>::new()),
                events.clone(),
            ),
            warehouses: MasterDataService::new(warehouses, events.clone()),
            doctors: MasterDataService::new(
                Arc::new(InMemoryRepository::<Doctor>::new()),
                events.clone(),
            ),
            portfolios: MasterDataService::new(
                Arc::new(InMemoryRepository::<Portfolio>::new()),
                events,
            ),
        }
    }
}
