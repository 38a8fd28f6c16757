use super::common::{
    created_response, json_body, optional_json_body, page_limit, query_params, success_response,
    DecisionRequest,
};
use crate::{
    auth::AuthUser,
    common::ListParams,
    errors::ApiError,
    handlers::AppState,
    models::{CreateWarehouseApproval, Inventory, UpdateStorageItem, WarehouseApproval},
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
use serde::Serialize;
use uuid::Uuid;

/// Approved storage together with the stock it created
#[derive(Debug, Serialize)]
pub struct ApprovalOutcome {
    pub approval: WarehouseApproval,
    pub inventory: Vec<Inventory>,
}

pub fn warehouse_approval_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(list_warehouse_approvals).post(create_warehouse_approval),
        )
        .route("/:id", get(get_warehouse_approval))
        .route("/:id/items/:item_id", post(update_storage_item))
        .route("/:id/submit", post(submit_warehouse_approval))
        .route("/:id/approve", post(approve_warehouse_approval))
        .route("/:id/reject", post(reject_warehouse_approval))
}

pub async fn create_warehouse_approval(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Result<Json<CreateWarehouseApproval>, JsonRejection>,
) -> Result<Response, ApiError> {
    let form = json_body(payload)?;
    let approval = state
        .services
        .warehouse_approval
        .create(&user, form)
        .await?;
    Ok(created_response(approval))
}

pub async fn list_warehouse_approvals(
    State(state): State<AppState>,
    user: AuthUser,
    query: Result<Query<ListParams>, QueryRejection>,
) -> Result<Response, ApiError> {
    let params = query_params(query)?;
    let limit = page_limit(&state, params.limit);
    let page = state
        .services
        .warehouse_approval
        .list(&user, &params, limit)
        .await?;
    Ok(success_response(page))
}

pub async fn get_warehouse_approval(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let approval = state.services.warehouse_approval.get(&user, id).await?;
    Ok(success_response(approval))
}

pub async fn update_storage_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path((id, item_id)): Path<(Uuid, Uuid)>,
    payload: Result<Json<UpdateStorageItem>, JsonRejection>,
) -> Result<Response, ApiError> {
    let form = json_body(payload)?;
    let approval = state
        .services
        .warehouse_approval
        .update_item(&user, id, item_id, form)
        .await?;
    Ok(success_response(approval))
}

pub async fn submit_warehouse_approval(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    payload: Result<Json<DecisionRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let DecisionRequest { remarks, version } = optional_json_body(payload)?;
    let approval = state
        .services
        .warehouse_approval
        .submit(&user, id, remarks, version)
        .await?;
    Ok(success_response(approval))
}

/// Approve storage; creates inventory for every accepted item
pub async fn approve_warehouse_approval(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    payload: Result<Json<DecisionRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let DecisionRequest { remarks, version } = optional_json_body(payload)?;
    let (approval, inventory) = state
        .services
        .warehouse_approval
        .approve(&user, id, remarks, version)
        .await?;
    Ok(success_response(ApprovalOutcome {
        approval,
        inventory,
    }))
}

pub async fn reject_warehouse_approval(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    payload: Result<Json<DecisionRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let DecisionRequest { remarks, version } = optional_json_body(payload)?;
    let approval = state
        .services
        .warehouse_approval
        .reject(&user, id, remarks, version)
        .await?;
    Ok(success_response(approval))
}
