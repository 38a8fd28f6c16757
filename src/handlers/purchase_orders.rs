use super::common::{
    created_response, csv_response, json_body, message_response, page_limit, query_params,
    success_response, VersionQuery,
};
use crate::{
    auth::AuthUser,
    common::ListParams,
    errors::ApiError,
    handlers::AppState,
    models::{PurchaseOrderForm, ReceiptForm, TotalsPreview, TransitionRequest},
};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Json, Path, Query, State,
    },
    response::Response,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Body of `PUT /purchase-orders/:id`
#[derive(Debug, Serialize, Deserialize)]
pub struct UpdatePurchaseOrderRequest {
    #[serde(flatten)]
    pub order: PurchaseOrderForm,
    #[serde(default)]
    pub version: Option<u64>,
}

pub fn purchase_order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_purchase_orders).post(create_purchase_order))
        .route("/export", get(export_purchase_orders))
        .route("/calculate", post(calculate_totals))
        .route(
            "/:id",
            get(get_purchase_order)
                .put(update_purchase_order)
                .delete(delete_purchase_order),
        )
        .route("/:id/transitions", post(transition_purchase_order))
        .route("/:id/actions", get(available_actions))
        .route("/:id/receipts", post(record_receipt))
}

/// Create a new purchase order
pub async fn create_purchase_order(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Result<Json<PurchaseOrderForm>, JsonRejection>,
) -> Result<Response, ApiError> {
    let form = json_body(payload)?;
    let order = state.services.purchase_orders.create(&user, form).await?;
    info!(po_id = %order.id, "Purchase order created");
    Ok(created_response(order))
}

pub async fn list_purchase_orders(
    State(state): State<AppState>,
    user: AuthUser,
    query: Result<Query<ListParams>, QueryRejection>,
) -> Result<Response, ApiError> {
    let params = query_params(query)?;
    let limit = page_limit(&state, params.limit);
    let page = state
        .services
        .purchase_orders
        .list(&user, &params, limit)
        .await?;
    Ok(success_response(page))
}

pub async fn get_purchase_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let order = state.services.purchase_orders.get(&user, id).await?;
    Ok(success_response(order))
}

/// Update a draft purchase order
pub async fn update_purchase_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    payload: Result<Json<UpdatePurchaseOrderRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let request = json_body(payload)?;
    let order = state
        .services
        .purchase_orders
        .update(&user, id, request.order, request.version)
        .await?;
    Ok(success_response(order))
}

pub async fn delete_purchase_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    query: Result<Query<VersionQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let VersionQuery { version } = query_params(query)?;
    state
        .services
        .purchase_orders
        .delete(&user, id, version)
        .await?;
    Ok(message_response("Purchase order deleted"))
}

/// Apply a workflow action (`{action, remarks, version}`)
pub async fn transition_purchase_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    payload: Result<Json<TransitionRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let request = json_body(payload)?;
    crate::validation::validate_form(&request)?;
    let order = state
        .services
        .purchase_orders
        .transition(&user, id, request)
        .await?;
    Ok(success_response(order))
}

/// Actions the caller may perform in the order's current stage
pub async fn available_actions(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let actions = state
        .services
        .purchase_orders
        .available_actions(&user, id)
        .await?;
    Ok(success_response(actions))
}

/// Record received quantities
pub async fn record_receipt(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    payload: Result<Json<ReceiptForm>, JsonRejection>,
) -> Result<Response, ApiError> {
    let form = json_body(payload)?;
    let order = state
        .services
        .purchase_orders
        .record_receipt(&user, id, form)
        .await?;
    Ok(success_response(order))
}

/// Price lines without creating an order
pub async fn calculate_totals(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Result<Json<TotalsPreview>, JsonRejection>,
) -> Result<Response, ApiError> {
    let preview = json_body(payload)?;
    let totals = state
        .services
        .purchase_orders
        .preview_totals(&user, &preview)?;
    Ok(success_response(totals))
}

pub async fn export_purchase_orders(
    State(state): State<AppState>,
    user: AuthUser,
    query: Result<Query<ListParams>, QueryRejection>,
) -> Result<Response, ApiError> {
    let params = query_params(query)?;
    let csv = state
        .services
        .purchase_orders
        .export_csv(&user, &params)
        .await?;
    Ok(csv_response("purchase-orders.csv", csv))
}
