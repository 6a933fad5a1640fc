//! HTTP API tests for vgate-ad

mod helpers;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use helpers::*;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::util::ServiceExt;
use vgate_ad::policy::AccessPolicyConfig;
use vgate_ad::{build_router, AppState};
use vgate_common::EventBus;

struct TestApp {
    app: Router,
    db: TestDb,
}

async fn create_test_app() -> TestApp {
    let db = test_db_with_staff().await;
    let policy = AccessPolicyConfig::load(&db.pool).await.unwrap();
    let state = AppState::new(db.pool.clone(), EventBus::new(64), policy);
    TestApp {
        app: build_router(state),
        db,
    }
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_string(&value).unwrap())
        }
        None => Body::empty(),
    };

    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

fn perception_event(plate: &str, confidence: f64, recognized: bool) -> Value {
    json!({
        "placa_detectada": plate,
        "marca_detectada": "Mazda",
        "color_detectado": "red",
        "ia_confidence": confidence,
        "ia_placa_reconocida": recognized,
        "ia_vehiculo_reconocido": true,
        "tipo_acceso": "entrada",
        "camara_id": "gate-north",
        "tiempo_procesamiento": 0.3
    })
}

#[tokio::test]
async fn test_health_endpoint() {
    let test = create_test_app().await;
    let (status, body) = send(&test.app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "vgate-ad");
    assert!(body["uptime_seconds"].is_u64());
}

#[tokio::test]
async fn test_resident_scenario() {
    let test = create_test_app().await;
    seed_resident(&test.db.pool, "ABC123", "apt-101", "Ana Torres").await;

    let (status, body) = send(
        &test.app,
        "POST",
        "/api/access/attempts",
        Some(perception_event("ABC123", 92.0, true)),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["resolution"]["outcome"], "authorized");
    assert_eq!(body["resolution"]["matched"]["kind"], "resident");
    assert_eq!(body["resolution"]["match_confidence"], 100);
    assert_eq!(body["direction"], "entrada");
    assert!(body["mensaje"].as_str().unwrap().contains("Ana Torres"));
}

#[tokio::test]
async fn test_unregistered_scenarios() {
    let test = create_test_app().await;

    let (_, pending) = send(
        &test.app,
        "POST",
        "/api/access/attempts",
        Some(perception_event("ZZZ999", 85.0, true)),
    )
    .await;
    assert_eq!(pending["resolution"]["outcome"], "pending");

    let (_, denied) = send(
        &test.app,
        "POST",
        "/api/access/attempts",
        Some(perception_event("ZZZ999", 40.0, true)),
    )
    .await;
    assert_eq!(denied["resolution"]["outcome"], "denied");
}

#[tokio::test]
async fn test_expired_guest_scenario() {
    let test = create_test_app().await;
    seed_expired_guest(&test.db.pool, "INV001").await;

    let (status, body) = send(
        &test.app,
        "POST",
        "/api/access/attempts",
        Some(perception_event("INV001", 40.0, true)),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert!(body["resolution"]["matched"].is_null());
    assert_eq!(body["resolution"]["outcome"], "denied");
}

#[tokio::test]
async fn test_manual_authorization_scenario() {
    let test = create_test_app().await;

    let (_, denied) = send(
        &test.app,
        "POST",
        "/api/access/attempts",
        Some(perception_event("ZZZ999", 40.0, true)),
    )
    .await;
    let id = denied["id"].as_str().unwrap().to_string();

    let (status, updated) = send(
        &test.app,
        "POST",
        &format!("/api/access/attempts/{}/authorize", id),
        Some(json!({ "actor": ADMIN, "note": "plumber for apt 4" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["resolution"]["outcome"], "authorized");

    let uri = format!("/api/access/attempts/{}", id);
    let (status, fetched) = send(&test.app, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["resolution"]["outcome"], "authorized");
    assert_eq!(fetched["initial_outcome"], "denied");
    assert_eq!(fetched["overrides"][0]["previous_outcome"], "denied");
    assert_eq!(fetched["overrides"][0]["actor"], ADMIN);
    assert_eq!(fetched["overrides"][0]["note"], "plumber for apt 4");
}

#[tokio::test]
async fn test_override_error_statuses() {
    let test = create_test_app().await;
    let (_, denied) = send(
        &test.app,
        "POST",
        "/api/access/attempts",
        Some(perception_event("ZZZ999", 40.0, true)),
    )
    .await;
    let id = denied["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &test.app,
        "POST",
        &format!("/api/access/attempts/{}/deny", id),
        Some(json!({ "actor": GUARD })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "INVALID_TRANSITION");

    let (status, body) = send(
        &test.app,
        "POST",
        &format!("/api/access/attempts/{}/authorize", id),
        Some(json!({ "actor": RESIDENT })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");

    let (status, body) = send(
        &test.app,
        "POST",
        &format!("/api/access/attempts/{}/authorize", uuid::Uuid::new_v4()),
        Some(json!({ "actor": ADMIN })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (status, _) = send(
        &test.app,
        "POST",
        &format!("/api/access/attempts/{}/authorize", id),
        Some(json!({ "actor": "  " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_bad_requests() {
    let test = create_test_app().await;

    let (status, body) = send(&test.app, "GET", "/api/access/attempts/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    let (status, _) = send(&test.app, "GET", "/api/access/attempts?outcome=maybe", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &test.app,
        "POST",
        "/api/access/attempts",
        Some(json!({ "placa_detectada": "ABC123", "tipo_acceso": "sideways" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_null_plate_is_recorded_as_denied() {
    let test = create_test_app().await;

    let mut event = perception_event("", 90.0, false);
    event["placa_detectada"] = Value::Null;
    let (status, body) = send(&test.app, "POST", "/api/access/attempts", Some(event)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["resolution"]["outcome"], "denied");
    assert_eq!(body["resolution"]["reason"], "no_plate_detected");

    let mut event = perception_event("", 0.0, false);
    event["ia_confidence"] = Value::Null;
    event["ia_placa_reconocida"] = Value::Null;
    let (status, body) = send(&test.app, "POST", "/api/access/attempts", Some(event)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["perception"]["confidence"], 0.0);

    let (_, listed) = send(&test.app, "GET", "/api/access/attempts", None).await;
    assert_eq!(listed["count"], 2);
}

#[tokio::test]
async fn test_list_attempts_with_filters() {
    let test = create_test_app().await;
    for confidence in [85.0, 40.0, 30.0] {
        send(
            &test.app,
            "POST",
            "/api/access/attempts",
            Some(perception_event("ZZZ999", confidence, true)),
        )
        .await;
    }

    let (status, body) = send(&test.app, "GET", "/api/access/attempts", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 3);

    let uri = "/api/access/attempts?outcome=denied&direction=entrada";
    let (_, body) = send(&test.app, "GET", uri, None).await;
    assert_eq!(body["count"], 2);

    let (_, body) = send(&test.app, "GET", "/api/access/attempts?limit=1", None).await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["attempts"][0]["perception"]["confidence"], 30.0);
}

#[tokio::test]
async fn test_purge_endpoint() {
    let test = create_test_app().await;

    let (status, body) = send(
        &test.app,
        "POST",
        "/api/access/purge",
        Some(json!({ "actor": GUARD })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");

    let (status, body) = send(
        &test.app,
        "POST",
        "/api/access/purge",
        Some(json!({ "actor": ADMIN, "cutoff": "2000-01-01T00:00:00Z" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted_attempts"], 0);
    assert_eq!(body["actor"], ADMIN);
}

#[tokio::test]
async fn test_purge_rejects_out_of_range_cutoff() {
    let test = create_test_app().await;
    send(
        &test.app,
        "POST",
        "/api/access/attempts",
        Some(perception_event("ZZZ999", 40.0, true)),
    )
    .await;

    let (status, body) = send(
        &test.app,
        "POST",
        "/api/access/purge",
        Some(json!({ "actor": ADMIN, "cutoff": "+10000-01-01T00:00:00Z" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    let (_, listed) = send(&test.app, "GET", "/api/access/attempts", None).await;
    assert_eq!(listed["count"], 1);
}

#[tokio::test]
async fn test_diagnostics_endpoint() {
    let test = create_test_app().await;
    send(
        &test.app,
        "POST",
        "/api/access/attempts",
        Some(perception_event("ZZZ999", 40.0, true)),
    )
    .await;

    let (status, body) = send(&test.app, "GET", "/api/access/diagnostics", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["window_days"], 7);
    assert_eq!(body["total_attempts"], 1);
    assert_eq!(body["denial_rate"], 100.0);

    let (status, _) = send(&test.app, "GET", "/api/access/diagnostics?days=0", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_policy_update() {
    let test = create_test_app().await;

    let (status, body) = send(&test.app, "GET", "/api/access/policy", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["plate_confidence_threshold"], 80.0);

    let (status, _) = send(
        &test.app,
        "PUT",
        "/api/access/policy",
        Some(json!({ "actor": GUARD, "plate_confidence_threshold": 50.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &test.app,
        "PUT",
        "/api/access/policy",
        Some(json!({ "actor": ADMIN, "plate_confidence_threshold": 140.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &test.app,
        "PUT",
        "/api/access/policy",
        Some(json!({ "actor": ADMIN, "plate_confidence_threshold": 90.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["plate_confidence_threshold"], 90.0);
    assert_eq!(body["attempt_retention_days"], 90);

    // 85 is now below the threshold
    let (_, decision) = send(
        &test.app,
        "POST",
        "/api/access/attempts",
        Some(perception_event("ZZZ999", 85.0, true)),
    )
    .await;
    assert_eq!(decision["resolution"]["outcome"], "denied");

    let reloaded = AccessPolicyConfig::load(&test.db.pool).await.unwrap();
    assert_eq!(reloaded.plate_confidence_threshold, 90.0);
}

#[tokio::test]
async fn test_failed_policy_save_changes_nothing() {
    let test = create_test_app().await;
    // Threshold is written before retention, so a failing retention write
    // must roll the threshold back too
    sqlx::query(
        r#"
        CREATE TRIGGER block_retention BEFORE UPDATE ON settings
        WHEN NEW.key = 'access_attempt_retention_days'
        BEGIN SELECT RAISE(ABORT, 'retention locked'); END
        "#,
    )
    .execute(&test.db.pool)
    .await
    .unwrap();

    let (status, body) = send(
        &test.app,
        "PUT",
        "/api/access/policy",
        Some(json!({
            "actor": ADMIN,
            "plate_confidence_threshold": 90.0,
            "attempt_retention_days": 30
        })),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "PERSISTENCE_ERROR");

    let (_, current) = send(&test.app, "GET", "/api/access/policy", None).await;
    assert_eq!(current["plate_confidence_threshold"], 80.0);

    let stored = AccessPolicyConfig::load(&test.db.pool).await.unwrap();
    assert_eq!(stored, AccessPolicyConfig::default());
}
