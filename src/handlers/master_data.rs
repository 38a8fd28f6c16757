//! Generic CRUD routes shared by the master-data collections.

use super::common::{
    created_response, json_body, message_response, page_limit, query_params, success_response,
    VersionQuery,
};
use crate::{
    auth::AuthUser,
    common::ListParams,
    errors::ApiError,
    handlers::AppState,
    models::{Doctor, MasterRecord, Portfolio, Product, Warehouse},
    services::master_data::MasterDataService,
};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Json, Path, Query, State,
    },
    response::Response,
    routing::get,
    Router,
};
use serde::Deserialize;
use uuid::Uuid;

/// Picks the service for one collection out of the shared state.
pub trait MasterDataState<T: MasterRecord> {
    fn master_data(&self) -> &MasterDataService<T>;
}

impl MasterDataState<Product> for AppState {
    fn master_data(&self) -> &MasterDataService<Product> {
        &self.services.products
    }
}

impl MasterDataState<Warehouse> for AppState {
    fn master_data(&self) -> &MasterDataService<Warehouse> {
        &self.services.warehouses
    }
}

impl MasterDataState<Doctor> for AppState {
    fn master_data(&self) -> &MasterDataService<Doctor> {
        &self.services.doctors
    }
}

impl MasterDataState<Portfolio> for AppState {
    fn master_data(&self) -> &MasterDataService<Portfolio> {
        &self.services.portfolios
    }
}

/// Replacement body: the full form plus the version the client last read
#[derive(Debug, Deserialize)]
pub struct UpdateRecordRequest<F> {
    #[serde(flatten)]
    pub record: F,
    #[serde(default)]
    pub version: Option<u64>,
}

pub fn master_data_routes<T>() -> Router<AppState>
where
    T: MasterRecord,
    AppState: MasterDataState<T>,
{
    Router::new()
        .route("/", get(list_records::<T>).post(create_record::<T>))
        .route(
            "/:id",
            get(get_record::<T>)
                .put(update_record::<T>)
                .delete(delete_record::<T>),
        )
}

pub async fn list_records<T>(
    State(state): State<AppState>,
    user: AuthUser,
    query: Result<Query<ListParams>, QueryRejection>,
) -> Result<Response, ApiError>
where
    T: MasterRecord,
    AppState: MasterDataState<T>,
{
    let params = query_params(query)?;
    let limit = page_limit(&state, params.limit);
    let page = state.master_data().list(&user, &params, limit).await?;
    Ok(success_response(page))
}

pub async fn get_record<T>(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError>
where
    T: MasterRecord,
    AppState: MasterDataState<T>,
{
    let record = state.master_data().get(&user, id).await?;
    Ok(success_response(record))
}

pub async fn create_record<T>(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Result<Json<T::Form>, JsonRejection>,
) -> Result<Response, ApiError>
where
    T: MasterRecord,
    AppState: MasterDataState<T>,
{
    let form = json_body(payload)?;
    let record = state.master_data().create(&user, form).await?;
    Ok(created_response(record))
}

pub async fn update_record<T>(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    payload: Result<Json<UpdateRecordRequest<T::Form>>, JsonRejection>,
) -> Result<Response, ApiError>
where
    T: MasterRecord,
    AppState: MasterDataState<T>,
{
    let request = json_body(payload)?;
    let record = state
        .master_data()
        .update(&user, id, request.record, request.version)
        .await?;
    Ok(success_response(record))
}

pub async fn delete_record<T>(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    query: Result<Query<VersionQuery>, QueryRejection>,
) -> Result<Response, ApiError>
where
    T: MasterRecord,
    AppState: MasterDataState<T>,
{
    let VersionQuery { version } = query_params(query)?;
    state.master_data().delete(&user, id, version).await?;
    Ok(message_response(format!("{} deleted", T::NAME)))
}
