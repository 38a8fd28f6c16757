use super::common::{
    created_response, csv_response, json_body, optional_json_body, page_limit, query_params,
    success_response, DecisionRequest,
};
use crate::{
    auth::AuthUser,
    common::ListParams,
    errors::ApiError,
    handlers::AppState,
    models::{AssignInspector, CreateQualityControl, RecordInspection},
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

pub fn quality_control_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_quality_controls).post(create_quality_control))
        .route("/export", get(export_quality_controls))
        .route("/:id", get(get_quality_control))
        .route("/:id/assign", post(assign_inspector))
        .route("/:id/items/:item_id/result", post(record_item_result))
        .route("/:id/submit", post(submit_quality_control))
        .route("/:id/approve", post(approve_quality_control))
        .route("/:id/reject", post(reject_quality_control))
}

/// Open an inspection for a received purchase order
pub async fn create_quality_control(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Result<Json<CreateQualityControl>, JsonRejection>,
) -> Result<Response, ApiError> {
    let form = json_body(payload)?;
    let qc = state.services.quality_control.create(&user, form).await?;
    Ok(created_response(qc))
}

pub async fn list_quality_controls(
    State(state): State<AppState>,
    user: AuthUser,
    query: Result<Query<ListParams>, QueryRejection>,
) -> Result<Response, ApiError> {
    let params = query_params(query)?;
    let limit = page_limit(&state, params.limit);
    let page = state
        .services
        .quality_control
        .list(&user, &params, limit)
        .await?;
    Ok(success_response(page))
}

pub async fn get_quality_control(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let qc = state.services.quality_control.get(&user, id).await?;
    Ok(success_response(qc))
}

pub async fn assign_inspector(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    payload: Result<Json<AssignInspector>, JsonRejection>,
) -> Result<Response, ApiError> {
    let form = json_body(payload)?;
    let qc = state
        .services
        .quality_control
        .assign(&user, id, form)
        .await?;
    Ok(success_response(qc))
}

pub async fn record_item_result(
    State(state): State<AppState>,
    user: AuthUser,
    Path((id, item_id)): Path<(Uuid, Uuid)>,
    payload: Result<Json<RecordInspection>, JsonRejection>,
) -> Result<Response, ApiError> {
    let form = json_body(payload)?;
    let qc = state
        .services
        .quality_control
        .record_item_result(&user, id, item_id, form)
        .await?;
    Ok(success_response(qc))
}

pub async fn submit_quality_control(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    payload: Result<Json<DecisionRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let DecisionRequest { remarks, version } = optional_json_body(payload)?;
    let qc = state
        .services
        .quality_control
        .submit(&user, id, remarks, version)
        .await?;
    Ok(success_response(qc))
}

/// Approve a submitted inspection; moves the purchase order to QC_PASSED or QC_FAILED
pub async fn approve_quality_control(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    payload: Result<Json<DecisionRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let DecisionRequest { remarks, version } = optional_json_body(payload)?;
    let qc = state
        .services
        .quality_control
        .approve(&user, id, remarks, version)
        .await?;
    Ok(success_response(qc))
}

pub async fn reject_quality_control(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    payload: Result<Json<DecisionRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let DecisionRequest { remarks, version } = optional_json_body(payload)?;
    let qc = state
        .services
        .quality_control
        .reject(&user, id, remarks, version)
        .await?;
    Ok(success_response(qc))
}

pub async fn export_quality_controls(
    State(state): State<AppState>,
    user: AuthUser,
    query: Result<Query<ListParams>, QueryRejection>,
) -> Result<Response, ApiError> {
    let params = query_params(query)?;
    let csv = state
        .services
        .quality_control
        .export_csv(&user, &params)
        .await?;
    Ok(csv_response("quality-controls.csv", csv))
}
