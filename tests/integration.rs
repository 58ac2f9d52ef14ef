use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use zone_dispatch::api::rest::router;
use zone_dispatch::config::Config;
use zone_dispatch::notify::LogSender;
use zone_dispatch::state::{AppState, WorkerQueues};
use zone_dispatch::store::Stores;

fn setup() -> (axum::Router, WorkerQueues) {
    let config = Config::from_lookup(|_| None).unwrap();
    let (state, queues) = AppState::new(&config, Stores::in_memory(), Arc::new(LogSender));
    (router(Arc::new(state)), queues)
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn square_zone(name: &str, fee: &str) -> Value {
    json!({
        "name": name,
        "delivery_fee": fee,
        "min_order_amount": "10.00",
        "free_delivery_threshold": "50.00",
        "estimated_minutes": 30,
        "boundary": [
            { "lat": 0.0, "lng": 0.0 },
            { "lat": 0.0, "lng": 10.0 },
            { "lat": 10.0, "lng": 10.0 },
            { "lat": 10.0, "lng": 0.0 }
        ]
    })
}

async fn create_online_rider(app: &axum::Router, store_id: Uuid, name: &str) -> String {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/stores/{store_id}/riders"),
            json!({ "name": name, "phone": "+15550001111", "vehicle_type": "motorcycle" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let rider_id = body_json(response).await["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            &format!("/riders/{rider_id}/presence"),
            json!({ "store_id": store_id, "online": true }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    rider_id
}

async fn create_order(app: &axum::Router, store_id: Uuid) -> String {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/orders",
            json!({
                "store_id": store_id,
                "order_number": "1001",
                "customer_name": "Marta",
                "customer_phone": "+15550002222",
                "address": "1 Main St",
                "location": { "lat": 5.0, "lng": 5.0 },
                "subtotal": "20.00"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_returns_ok() {
    let (app, _queues) = setup();
    let response = app.oneshot(get_request("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["orders_in_queue"], 0);
}

#[tokio::test]
async fn metrics_returns_prometheus_format() {
    let (app, _queues) = setup();
    let response = app.oneshot(get_request("/metrics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.contains("text/plain"));

    let body = body_string(response).await;
    assert!(body.contains("orders_in_queue"));
}

#[tokio::test]
async fn create_zone_returns_created_zone() {
    let (app, _queues) = setup();
    let store_id = Uuid::new_v4();

    let response = app
        .oneshot(json_request(
            "POST",
            &format!("/stores/{store_id}/zones"),
            square_zone("Centro", "15.00"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["name"], "Centro");
    assert_eq!(body["delivery_fee"], "15.00");
    assert_eq!(body["color"], "#3B82F6");
    assert_eq!(body["is_active"], true);
}

#[tokio::test]
async fn invalid_zone_lists_every_bad_field() {
    let (app, _queues) = setup();
    let store_id = Uuid::new_v4();

    let response = app
        .oneshot(json_request(
            "POST",
            &format!("/stores/{store_id}/zones"),
            json!({
                "name": "X",
                "delivery_fee": "-1",
                "estimated_minutes": 0
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["category"], "validation");
    let fields: Vec<&str> = body["fields"]
        .as_array()
        .unwrap()
        .iter()
        .map(|field| field["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"name"));
    assert!(fields.contains(&"delivery_fee"));
    assert!(fields.contains(&"estimated_minutes"));
}

#[tokio::test]
async fn resolve_returns_zone_and_quote() {
    let (app, _queues) = setup();
    let store_id = Uuid::new_v4();

    app.clone()
        .oneshot(json_request(
            "POST",
            &format!("/stores/{store_id}/zones"),
            square_zone("Centro", "15.00"),
        ))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/stores/{store_id}/zones/resolve"),
            json!({ "location": { "lat": 5.0, "lng": 5.0 }, "subtotal": "60.00" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["zone"]["name"], "Centro");
    assert_eq!(body["fee"], "15.00");
    assert_eq!(body["quote"]["free_delivery"], true);

    let response = app
        .oneshot(json_request(
            "POST",
            &format!("/stores/{store_id}/zones/resolve"),
            json!({ "location": { "lat": 50.0, "lng": 50.0 } }),
        ))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert!(body["zone"].is_null());
}

#[tokio::test]
async fn duplicate_zone_is_inactive_copy() {
    let (app, _queues) = setup();
    let store_id = Uuid::new_v4();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/stores/{store_id}/zones"),
            square_zone("Centro", "15.00"),
        ))
        .await
        .unwrap();
    let zone_id = body_json(response).await["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/zones/{zone_id}/duplicate"),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["name"], "Centro (Copy)");
    assert_eq!(body["is_active"], false);
    assert_ne!(body["id"].as_str().unwrap(), zone_id);

    let response = app
        .oneshot(get_request(&format!("/stores/{store_id}/zones")))
        .await
        .unwrap();
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn patch_zone_edits_and_deactivates() {
    let (app, _queues) = setup();
    let store_id = Uuid::new_v4();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/stores/{store_id}/zones"),
            square_zone("Centro", "15.00"),
        ))
        .await
        .unwrap();
    let zone_id = body_json(response).await["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            &format!("/zones/{zone_id}"),
            json!({ "delivery_fee": "20.00", "is_active": false, "free_delivery_threshold": null }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["id"], zone_id.as_str());
    assert_eq!(body["name"], "Centro");
    assert_eq!(body["delivery_fee"], "20.00");
    assert_eq!(body["is_active"], false);
    assert!(body["free_delivery_threshold"].is_null());

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/stores/{store_id}/zones/resolve"),
            json!({ "location": { "lat": 5.0, "lng": 5.0 } }),
        ))
        .await
        .unwrap();
    assert!(body_json(response).await["zone"].is_null());

    let response = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            &format!("/zones/{zone_id}"),
            json!({ "estimated_minutes": 0 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = app
        .oneshot(json_request(
            "PATCH",
            &format!("/zones/{}", Uuid::new_v4()),
            json!({ "name": "Norte" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn new_rider_starts_offline_until_presence() {
    let (app, _queues) = setup();
    let store_id = Uuid::new_v4();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/stores/{store_id}/riders"),
            json!({ "name": "Leo", "phone": "+15550001111", "vehicle_type": "bicycle" }),
        ))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["status"], "offline");

    let response = app
        .clone()
        .oneshot(get_request(&format!("/stores/{store_id}/riders/available")))
        .await
        .unwrap();
    assert!(body_json(response).await.as_array().unwrap().is_empty());

    create_online_rider(&app, store_id, "Ana").await;

    let response = app
        .oneshot(get_request(&format!("/stores/{store_id}/riders/available")))
        .await
        .unwrap();
    let available = body_json(response).await;
    assert_eq!(available.as_array().unwrap().len(), 1);
    assert_eq!(available[0]["name"], "Ana");
}

#[tokio::test]
async fn create_rider_empty_name_returns_400() {
    let (app, _queues) = setup();
    let store_id = Uuid::new_v4();

    let response = app
        .oneshot(json_request(
            "POST",
            &format!("/stores/{store_id}/riders"),
            json!({ "name": "  ", "phone": "+15550001111", "vehicle_type": "car" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn get_nonexistent_order_returns_404() {
    let (app, _queues) = setup();
    let fake_id = Uuid::new_v4();

    let response = app
        .oneshot(get_request(&format!("/orders/{fake_id}")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn full_assignment_flow() {
    let (app, _queues) = setup();
    let store_id = Uuid::new_v4();

    app.clone()
        .oneshot(json_request(
            "POST",
            &format!("/stores/{store_id}/zones"),
            square_zone("Centro", "15.00"),
        ))
        .await
        .unwrap();
    let rider_id = create_online_rider(&app, store_id, "Leo Costa").await;
    let order_id = create_order(&app, store_id).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/assignments",
            json!({ "store_id": store_id, "order_id": order_id, "rider_id": rider_id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let assignment = body_json(response).await;
    assert_eq!(assignment["status"], "assigned");
    assert_eq!(assignment["delivery_fee"], "15.00");
    assert_eq!(assignment["rider_earnings"], "10.50");
    let assignment_id = assignment["id"].as_str().unwrap().to_string();
    let tracking_code = assignment["tracking_code"].as_str().unwrap().to_string();
    assert_eq!(tracking_code.len(), 8);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/assignments",
            json!({ "store_id": store_id, "order_id": order_id, "rider_id": rider_id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    for status in ["accepted", "picked_up", "in_transit", "delivered"] {
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                &format!("/assignments/{assignment_id}/status"),
                json!({ "status": status }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "advancing to {status}");
        assert_eq!(body_json(response).await["status"], status);
    }

    let response = app
        .clone()
        .oneshot(get_request(&format!("/track/{}", tracking_code.to_lowercase())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let view = body_json(response).await;
    assert_eq!(view["status"], "delivered");
    assert_eq!(view["rider_first_name"], "Leo");
    assert!(view.get("customer_phone").is_none());

    let response = app
        .clone()
        .oneshot(get_request(&format!("/orders/{order_id}")))
        .await
        .unwrap();
    let order = body_json(response).await;
    assert_eq!(order["assignments"].as_array().unwrap().len(), 1);

    let response = app
        .oneshot(get_request(&format!("/stores/{store_id}/riders/available")))
        .await
        .unwrap();
    let available = body_json(response).await;
    assert_eq!(available[0]["id"], rider_id.as_str());
    assert_eq!(available[0]["total_deliveries"], 1);
}

#[tokio::test]
async fn illegal_transition_returns_409() {
    let (app, _queues) = setup();
    let store_id = Uuid::new_v4();

    app.clone()
        .oneshot(json_request(
            "POST",
            &format!("/stores/{store_id}/zones"),
            square_zone("Centro", "15.00"),
        ))
        .await
        .unwrap();
    let rider_id = create_online_rider(&app, store_id, "Leo").await;
    let order_id = create_order(&app, store_id).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/assignments",
            json!({ "store_id": store_id, "order_id": order_id, "rider_id": rider_id }),
        ))
        .await
        .unwrap();
    let assignment_id = body_json(response).await["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/assignments/{assignment_id}/status"),
            json!({ "status": "delivered" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["category"], "transition");

    let response = app
        .oneshot(json_request(
            "POST",
            &format!("/assignments/{assignment_id}/status"),
            json!({ "status": "failed" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_tracking_code_returns_404() {
    let (app, _queues) = setup();
    let response = app.oneshot(get_request("/track/ZZZZ9999")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn auto_dispatch_order_is_queued() {
    let (app, mut queues) = setup();
    let store_id = Uuid::new_v4();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/orders",
            json!({
                "store_id": store_id,
                "order_number": "2002",
                "customer_name": "Jun",
                "address": "2 Side St",
                "subtotal": "12.50",
                "auto_dispatch": true
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let order_id = body_json(response).await["id"].as_str().unwrap().to_string();

    let job = queues.order_rx.try_recv().unwrap();
    assert_eq!(job.order_id.to_string(), order_id);
    assert_eq!(job.attempts, 0);

    let response = app.oneshot(get_request("/health")).await.unwrap();
    assert_eq!(body_json(response).await["orders_in_queue"], 1);
}
