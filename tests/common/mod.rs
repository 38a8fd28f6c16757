#![allow(dead_code)]

use axum::{
    body::{self, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use pharmadist_api::{
    config::AppConfig,
    events::{self, EventSender},
    AppState,
};
use serde_json::{json, Value};
use tower::ServiceExt;

/// Caller identity sent through the gateway headers.
#[derive(Debug, Clone)]
pub enum Caller<'a> {
    Anonymous,
    Roles(&'a str, &'a str),
    Permissions(&'a str, &'a str),
}

pub const ADMIN: Caller<'static> = Caller::Roles("admin-1", "admin");

/// Router over fresh in-memory state, plus the task draining its events.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub fn new() -> Self {
        let config = AppConfig::default();
        let (event_sender, event_rx) = EventSender::channel(256);
        let event_task = tokio::spawn(events::process_events(event_rx));
        let state = AppState::in_memory(config, event_sender);
        Self {
            router: pharmadist_api::app(state.clone()),
            state,
            _event_task: event_task,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        caller: Caller<'_>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let (status, bytes) = self.request_raw(method, uri, caller, body).await;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    pub async fn request_raw(
        &self,
        method: Method,
        uri: &str,
        caller: Caller<'_>,
        body: Option<Value>,
    ) -> (StatusCode, Vec<u8>) {
        let mut builder = Request::builder().method(method).uri(uri);
        match caller {
            Caller::Anonymous => {}
            Caller::Roles(user, roles) => {
                builder = builder
                    .header("x-user-id", user)
                    .header("x-user-roles", roles);
            }
            Caller::Permissions(user, permissions) => {
                builder = builder
                    .header("x-user-id", user)
                    .header("x-user-permissions", permissions);
            }
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("response body bytes");
        (status, bytes.to_vec())
    }

    /// Creates the reference order (100 × ₹50, FOC 10, 10% off, IGST 5%).
    pub async fn create_order(&self) -> Value {
        let (status, body) = self
            .request(
                Method::POST,
                "/api/v1/purchase-orders",
                ADMIN,
                Some(order_body()),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["data"].clone()
    }

    pub async fn transition(
        &self,
        id: &str,
        action: &str,
        caller: Caller<'_>,
    ) -> (StatusCode, Value) {
        self.request(
            Method::POST,
            &format!("/api/v1/purchase-orders/{id}/transitions"),
            caller,
            Some(json!({ "action": action })),
        )
        .await
    }

    /// Walks a fresh order from DRAFT to ORDERED.
    pub async fn ordered_order(&self) -> Value {
        let order = self.create_order().await;
        let id = order["id"].as_str().unwrap().to_string();
        for action in ["approve", "approve", "approve", "place_order"] {
            let (status, body) = self.transition(&id, action, ADMIN).await;
            assert_eq!(status, StatusCode::OK, "{action}: {body}");
        }
        self.get_order(&id).await
    }

    pub async fn get_order(&self, id: &str) -> Value {
        let (status, body) = self
            .request(
                Method::GET,
                &format!("/api/v1/purchase-orders/{id}"),
                ADMIN,
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["data"].clone()
    }
}

pub fn address() -> Value {
    json!({
        "line1": "14 Industrial Estate",
        "city": "Pune",
        "state": "Maharashtra",
        "postal_code": "411019"
    })
}

pub fn order_body() -> Value {
    json!({
        "principal": { "name": "Sunrise Pharma Ltd" },
        "bill_to": address(),
        "tax_type": "inter_state",
        "gst_rate": "5",
        "lines": [{
            "product_id": "7b0c7a52-4a4e-4d5c-9a0e-2f1f0d8c6b11",
            "product_name": "Amoxicillin 500mg",
            "quantity": 100,
            "foc_quantity": 10,
            "unit_price": "50",
            "discount": { "type": "percentage", "value": "10" }
        }]
    })
}

pub fn warehouse_body(code: &str) -> Value {
    json!({
        "name": "Central Warehouse",
        "code": code,
        "address": address()
    })
}
