use super::common::{csv_response, json_body, page_limit, query_params, success_response};
use crate::{
    auth::AuthUser,
    common::ListParams,
    errors::ApiError,
    handlers::AppState,
    models::StockQuantity,
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
use uuid::Uuid;

pub fn inventory_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_inventory))
        .route("/export", get(export_inventory))
        .route("/:id", get(get_inventory))
        .route("/:id/reserve", post(reserve_inventory))
        .route("/:id/release", post(release_inventory))
}

/// List stock; `?status=in_stock|out_of_stock`
pub async fn list_inventory(
    State(state): State<AppState>,
    user: AuthUser,
    query: Result<Query<ListParams>, QueryRejection>,
) -> Result<Response, ApiError> {
    let params = query_params(query)?;
    let limit = page_limit(&state, params.limit);
    let page = state.services.inventory.list(&user, &params, limit).await?;
    Ok(success_response(page))
}

pub async fn get_inventory(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let stock = state.services.inventory.get(&user, id).await?;
    Ok(success_response(stock))
}

pub async fn reserve_inventory(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    payload: Result<Json<StockQuantity>, JsonRejection>,
) -> Result<Response, ApiError> {
    let form = json_body(payload)?;
    let stock = state.services.inventory.reserve(&user, id, form).await?;
    Ok(success_response(stock))
}

pub async fn release_inventory(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    payload: Result<Json<StockQuantity>, JsonRejection>,
) -> Result<Response, ApiError> {
    let form = json_body(payload)?;
    let stock = state.services.inventory.release(&user, id, form).await?;
    Ok(success_response(stock))
}

pub async fn export_inventory(
    State(state): State<AppState>,
    user: AuthUser,
    query: Result<Query<ListParams>, QueryRejection>,
) -> Result<Response, ApiError> {
    let params = query_params(query)?;
    let csv = state.services.inventory.export_csv(&user, &params).await?;
    Ok(csv_response("inventory.csv", csv))
}
