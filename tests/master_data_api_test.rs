//! CRUD over products, doctors and portfolios through the generic routes.

mod common;

use axum::http::{Method, StatusCode};
use common::{Caller, TestApp, ADMIN};
use serde_json::json;

fn product(sku: &str) -> serde_json::Value {
    json!({
        "name": "Paracetamol 650",
        "sku": sku,
        "hsn_code": "30049099",
        "unit_price": "18.50",
        "gst_rate": "12"
    })
}

#[tokio::test]
async fn product_lifecycle_with_versions() {
    let app = TestApp::new();

    let (status, body) = app
        .request(Method::POST, "/api/v1/products", ADMIN, Some(product("pcm-650")))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let created = &body["data"];
    assert_eq!(created["sku"], "PCM-650");
    assert_eq!(created["is_active"], true);
    assert_eq!(created["version"], 1);
    let uri = format!("/api/v1/products/{}", created["id"].as_str().unwrap());

    let mut update = product("PCM-650");
    update["unit_price"] = json!("19.00");
    update["version"] = json!(1);
    let (status, body) = app
        .request(Method::PUT, &uri, ADMIN, Some(update.clone()))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["unit_price"], "19.00");
    assert_eq!(body["data"]["version"], 2);

    let (status, _) = app.request(Method::PUT, &uri, ADMIN, Some(update)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .request(Method::DELETE, &format!("{uri}?version=1"), ADMIN, None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app
        .request(Method::DELETE, &format!("{uri}?version=2"), ADMIN, None)
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["message"], "Product deleted");
}

#[tokio::test]
async fn duplicate_sku_conflicts() {
    let app = TestApp::new();
    let (status, _) = app
        .request(Method::POST, "/api/v1/products", ADMIN, Some(product("AZ-250")))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .request(Method::POST, "/api/v1/products", ADMIN, Some(product("az-250")))
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");
}

#[tokio::test]
async fn viewers_read_but_cannot_write() {
    let app = TestApp::new();
    app.request(Method::POST, "/api/v1/products", ADMIN, Some(product("CF-500")))
        .await;

    let viewer = Caller::Roles("viewer-1", "viewer");
    let (status, body) = app
        .request(Method::GET, "/api/v1/products?search=paracetamol", viewer.clone(), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);

    let (status, _) = app
        .request(Method::POST, "/api/v1/products", viewer, Some(product("CF-501")))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn doctor_email_is_validated() {
    let app = TestApp::new();
    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/doctors",
            ADMIN,
            Some(json!({ "name": "Dr. Mehta", "email": "not-an-email" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0]["field"], "email");

    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/doctors",
            ADMIN,
            Some(json!({ "name": "Dr. Mehta", "email": "mehta@clinic.in" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn inactive_portfolios_filter_by_status() {
    let app = TestApp::new();
    for (name, active) in [("Cardio", true), ("Derma", false)] {
        let (status, _) = app
            .request(
                Method::POST,
                "/api/v1/portfolios",
                ADMIN,
                Some(json!({ "name": name, "is_active": active })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = app
        .request(Method::GET, "/api/v1/portfolios?status=inactive", ADMIN, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["items"][0]["name"], "Derma");
}
