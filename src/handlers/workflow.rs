use super::common::success_response;
use crate::{handlers::AppState, workflow::stage_table};
use axum::{response::Response, routing::get, Router};

pub fn workflow_routes() -> Router<AppState> {
    Router::new().route("/stages", get(list_stages))
}

/// Every stage with its outgoing actions and the permission each needs
pub async fn list_stages() -> Response {
    success_response(stage_table())
}
