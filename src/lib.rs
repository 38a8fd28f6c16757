//! PharmaDist API Library
//!
//! Back-office service for a pharmaceutical distributor: purchase orders
//! moving through approval, receipt, quality control and warehouse storage,
//! plus the product, warehouse, doctor and portfolio master data they use.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod common;
pub mod config;
pub mod errors;
pub mod events;
pub mod export;
pub mod handlers;
pub mod middleware_helpers;
pub mod models;
pub mod pricing;
pub mod repositories;
pub mod services;
pub mod tracing;
pub mod validation;
pub mod workflow;

use std::time::Duration;

use axum::{http::HeaderValue, Router};
use chrono::Utc;
use serde::Serialize;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::models::{Doctor, Portfolio, Product, Warehouse};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
}

impl AppState {
    /// State backed by in-memory repositories
    pub fn in_memory(config: config::AppConfig, event_sender: events::EventSender) -> Self {
        let services = handlers::AppServices::in_memory(&config, event_sender.clone());
        Self {
            config,
            event_sender,
            services,
        }
    }
}

// Common response wrappers
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    /// Successful outcome that carries no payload
    pub fn message(message: String) -> Self {
        Self {
            success: true,
            data: None,
            message: Some(message),
            meta: Some(ResponseMeta::capture()),
        }
    }
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use chrono::DateTime;

    #[tokio::test]
    async fn success_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-123"), async {
                ApiResponse::success("ok")
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-123"));
        DateTime::parse_from_rfc3339(&meta.timestamp).expect("timestamp should parse");
    }

    #[tokio::test]
    async fn message_response_has_no_data() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-msg"), async {
                ApiResponse::<()>::message("Purchase order deleted".into())
            })
            .await;

        assert!(response.success);
        assert!(response.data.is_none());
        assert_eq!(response.message.as_deref(), Some("Purchase order deleted"));
        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-msg"));
    }

    #[test]
    fn envelope_serializes_null_data() {
        let value = serde_json::to_value(ApiResponse::<()>::message("done".into())).unwrap();
        assert_eq!(value["success"], true);
        assert!(value["data"].is_null());
        assert_eq!(value["message"], "done");
    }
}

/// Every `/api/v1` route, without middleware
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .merge(handlers::health::health_routes())
        .nest(
            "/purchase-orders",
            handlers::purchase_orders::purchase_order_routes(),
        )
        .nest("/workflow", handlers::workflow::workflow_routes())
        .nest(
            "/quality-controls",
            handlers::quality_control::quality_control_routes(),
        )
        .nest(
            "/warehouse-approvals",
            handlers::warehouse_approvals::warehouse_approval_routes(),
        )
        .nest("/inventory", handlers::inventory::inventory_routes())
        // Master data
        .nest(
            "/products",
            handlers::master_data::master_data_routes::<Product>(),
        )
        .nest(
            "/warehouses",
            handlers::master_data::master_data_routes::<Warehouse>(),
        )
        .nest(
            "/doctors",
            handlers::master_data::master_data_routes::<Doctor>(),
        )
        .nest(
            "/portfolios",
            handlers::master_data::master_data_routes::<Portfolio>(),
        )
}

fn cors_layer(config: &config::AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins()
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    if origins.is_empty() {
        ::tracing::info!("No CORS origins configured; using permissive CORS");
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(tower_http::cors::Any)
            .allow_headers(tower_http::cors::Any)
    }
}

/// The complete application: routes, state and the HTTP middleware stack.
pub fn app(state: AppState) -> Router {
    let timeout = Duration::from_secs(state.config.request_timeout_secs);
    let cors = cors_layer(&state.config);

    Router::new()
        .merge(handlers::health::health_routes())
        .nest("/api/v1", api_v1_routes())
        // HTTP tracing layer for consistent request/response telemetry
        .layer(TraceLayer::new_for_http().make_span_with(crate::tracing::RequestSpanMaker))
        .layer(TimeoutLayer::new(timeout))
        .layer(cors)
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id_middleware,
        ))
        .with_state(state)
}
