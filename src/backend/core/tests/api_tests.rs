//! HTTP tests for the AssetDesk router.
//!
//! Tests cover:
//! - Public endpoints (health, metrics)
//! - Authentication outcomes (missing, invalid, expired, unknown role claim)
//! - Permission snapshots per role
//! - The ADMIN-only matrix listing
//! - Read and write projection endpoints, including error bodies
//! - Request ID propagation

use std::sync::Arc;

use assetdesk_core::api::{build_router, ApiResponse, AppState};
use assetdesk_core::middleware::{AuthConfig, AuthLayer, Authenticator, Claims};
use assetdesk_core::rbac::{FieldPolicy, PermissionSnapshot, Role};
use assetdesk_core::telemetry::MetricsRegistry;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

const SECRET: &str = "test-secret-with-enough-entropy";

struct TestApp {
    router: Router,
    authenticator: Arc<Authenticator>,
}

impl TestApp {
    fn new() -> Self {
        let config = AuthConfig::builder().jwt_secret(SECRET).build();
        Self::with_auth(config)
    }

    fn with_auth(config: AuthConfig) -> Self {
        let authenticator = Arc::new(Authenticator::new(config).unwrap());
        let state = AppState::new(
            FieldPolicy::builtin().unwrap(),
            MetricsRegistry::disabled(),
        );
        let router = build_router(state, AuthLayer::new(authenticator.clone()));
        Self {
            router,
            authenticator,
        }
    }

    fn token(&self, role: &str) -> String {
        let claims = Claims::builder("u-1").role(role).build();
        self.authenticator.generate_token(&claims).unwrap()
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder().uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }
}

// ============================================================================
// Public Endpoints
// ============================================================================

#[tokio::test]
async fn test_health_is_public() {
    let app = TestApp::new();
    let (status, body) = app.get("/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_metrics_is_public() {
    let app = TestApp::new();
    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_public_path_with_bad_token_still_served() {
    let app = TestApp::new();
    let (status, _) = app.get("/health", Some("not-a-jwt")).await;
    assert_eq!(status, StatusCode::OK);
}

// ============================================================================
// Authentication
// ============================================================================

#[tokio::test]
async fn test_permissions_require_token() {
    let app = TestApp::new();
    let (status, body) = app.get("/api/v1/permissions", None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_invalid_token_rejected() {
    let app = TestApp::new();
    let (status, body) = app.get("/api/v1/permissions", Some("garbage")).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "INVALID_TOKEN");
}

#[tokio::test]
async fn test_token_signed_with_other_secret_rejected() {
    let app = TestApp::new();
    let other =
        Authenticator::new(AuthConfig::builder().jwt_secret("another-secret").build()).unwrap();
    let token = other
        .generate_token(&Claims::builder("u-1").role("ADMIN").build())
        .unwrap();

    let (status, _) = app.get("/api/v1/permissions", Some(&token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_expired_token_rejected() {
    let app = TestApp::new();
    let claims = Claims::builder("u-1")
        .role("ADMIN")
        .expires_in(chrono::Duration::hours(-2))
        .build();
    let token = app.authenticator.generate_token(&claims).unwrap();

    let (status, body) = app.get("/api/v1/permissions", Some(&token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "TOKEN_EXPIRED");
}

#[tokio::test]
async fn test_auth_disabled_leaves_actor_unresolved() {
    let app = TestApp::with_auth(AuthConfig::default());
    let (status, _) = app.get("/api/v1/permissions", None).await;

    // No resolved role means the engine is never consulted.
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// ============================================================================
// Permission Snapshots
// ============================================================================

#[tokio::test]
async fn test_permissions_snapshot_for_technician() {
    let app = TestApp::new();
    let token = app.token("TECHNICIAN");
    let (status, body) = app.get("/api/v1/permissions", Some(&token)).await;

    assert_eq!(status, StatusCode::OK);
    let response: ApiResponse<PermissionSnapshot> = serde_json::from_value(body).unwrap();
    let snapshot = response.data.unwrap();
    assert_eq!(snapshot.role, Role::Technician);
    assert!(snapshot.is_technician);
    assert!(!snapshot.is_admin);
    assert_eq!(
        snapshot,
        FieldPolicy::builtin().unwrap().snapshot(Role::Technician)
    );
}

#[tokio::test]
async fn test_unknown_role_claim_acts_as_user() {
    let app = TestApp::new();
    let token = app.token("GUEST");
    let (status, body) = app.get("/api/v1/permissions", Some(&token)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["role"], "USER");
    assert_eq!(body["data"]["isUser"], true);
}

#[tokio::test]
async fn test_role_claim_is_case_insensitive() {
    let app = TestApp::new();
    let token = app.token("admin");
    let (_, body) = app.get("/api/v1/permissions", Some(&token)).await;
    assert_eq!(body["data"]["role"], "ADMIN");
}

// ============================================================================
// Matrix Listing
// ============================================================================

#[tokio::test]
async fn test_matrix_forbidden_below_admin() {
    let app = TestApp::new();
    for role in ["USER", "TECHNICIAN"] {
        let token = app.token(role);
        let (status, body) = app.get("/api/v1/permissions/matrix", Some(&token)).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{role}");
        assert_eq!(body["error"]["code"], "FORBIDDEN");
    }
}

#[tokio::test]
async fn test_matrix_requires_authentication() {
    let app = TestApp::new();
    let (status, _) = app.get("/api/v1/permissions/matrix", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_matrix_listing_for_admin() {
    let app = TestApp::new();
    let token = app.token("ADMIN");
    let (status, body) = app.get("/api/v1/permissions/matrix", Some(&token)).await;

    assert_eq!(status, StatusCode::OK);
    let roles = body["data"]["roles"].as_array().unwrap();
    assert_eq!(roles.len(), 3);

    let grants = body["data"]["grants"].as_array().unwrap();
    let policy = FieldPolicy::builtin().unwrap();
    assert_eq!(grants.len(), policy.matrix().entries().len());
    assert!(grants.iter().any(|g| {
        g["role"] == "TECHNICIAN"
            && g["entity"] == "ticket"
            && g["field"] == "status"
            && g["capability"] == "EDIT"
    }));
}

// ============================================================================
// Read Projection
// ============================================================================

#[tokio::test]
async fn test_project_read_single_record() {
    let app = TestApp::new();
    let token = app.token("USER");
    let record = json!({
        "id": "t1",
        "title": "Broken printer",
        "assignedToId": "u9",
        "internalCost": 450
    });

    let (status, body) = app
        .post("/api/v1/projection/ticket/read", &token, record)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({"id": "t1", "title": "Broken printer"}));
}

#[tokio::test]
async fn test_project_read_list() {
    let app = TestApp::new();
    let token = app.token("TECHNICIAN");
    let records = json!([
        {"id": "a1", "name": "Laptop", "purchaseCost": 1200},
        {"id": "a2", "serialNumber": "SN-2", "purchaseDate": "2024-01-05"}
    ]);

    let (status, body) = app
        .post("/api/v1/projection/asset/read", &token, records)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"],
        json!([
            {"id": "a1", "name": "Laptop"},
            {"id": "a2", "serialNumber": "SN-2"}
        ])
    );
}

#[tokio::test]
async fn test_project_read_rejects_scalar_body() {
    let app = TestApp::new();
    let token = app.token("ADMIN");
    let (status, body) = app
        .post("/api/v1/projection/ticket/read", &token, json!(42))
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_project_read_unknown_entity() {
    let app = TestApp::new();
    let token = app.token("ADMIN");
    let (status, body) = app
        .post("/api/v1/projection/invoice/read", &token, json!({"id": "x"}))
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "RECORD_NOT_FOUND");
}

// ============================================================================
// Write Projection
// ============================================================================

#[tokio::test]
async fn test_project_write_accepted() {
    let app = TestApp::new();
    let token = app.token("TECHNICIAN");
    let payload = json!({"status": "resolved", "resolution": "Replaced fuser"});

    let (status, body) = app
        .post("/api/v1/projection/ticket/write", &token, payload.clone())
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], payload);
}

#[tokio::test]
async fn test_project_write_denied_names_fields() {
    let app = TestApp::new();
    let token = app.token("TECHNICIAN");
    let payload = json!({"status": "resolved", "assignedToId": "u2"});

    let (status, body) = app
        .post("/api/v1/projection/ticket/write", &token, payload)
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "FIELD_PERMISSION_DENIED");
    assert_eq!(body["error"]["numeric_code"], 1000);
    assert_eq!(body["error"]["details"]["fields"], json!(["assignedToId"]));
    assert_eq!(body["error"]["details"]["entity_type"], "ticket");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("assignedToId"));
}

#[tokio::test]
async fn test_project_write_for_unknown_role_uses_user_grants() {
    let app = TestApp::new();
    let token = app.token("CONTRACTOR");

    let (ok, _) = app
        .post("/api/v1/projection/user/write", &token, json!({"phone": "555-0100"}))
        .await;
    assert_eq!(ok, StatusCode::OK);

    let (denied, body) = app
        .post("/api/v1/projection/user/write", &token, json!({"role": "ADMIN"}))
        .await;
    assert_eq!(denied, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["details"]["fields"], json!(["role"]));
}

// ============================================================================
// Response Headers
// ============================================================================

#[tokio::test]
async fn test_request_id_is_echoed() {
    let app = TestApp::new();
    let token = app.token("USER");
    let request = Request::builder()
        .uri("/api/v1/permissions")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header("X-Request-ID", "req-42")
        .body(Body::empty())
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-request-id"], "req-42");
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
}

#[tokio::test]
async fn test_rejected_request_still_carries_headers() {
    let app = TestApp::new();
    let request = Request::builder()
        .uri("/api/v1/permissions")
        .header("X-Request-ID", "req-401")
        .body(Body::empty())
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers()["x-request-id"], "req-401");
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"]["request_id"], "req-401");
}

#[tokio::test]
async fn test_request_id_generated_when_absent() {
    let app = TestApp::new();
    let request = Request::builder()
        .uri("/api/v1/permissions")
        .header(header::AUTHORIZATION, "Bearer not-a-jwt")
        .body(Body::empty())
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let header_id = response.headers()["x-request-id"]
        .to_str()
        .unwrap()
        .to_string();
    assert!(uuid::Uuid::parse_str(&header_id).is_ok());

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"]["code"], "INVALID_TOKEN");
    assert_eq!(body["error"]["request_id"], header_id.as_str());
}

#[tokio::test]
async fn test_field_denial_body_carries_request_id() {
    let app = TestApp::new();
    let token = app.token("TECHNICIAN");
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/projection/ticket/write")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/json")
        .header("X-Request-ID", "req-403")
        .body(Body::from(json!({"assignedToId": "u-2"}).to_string()))
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(response.headers()["x-request-id"], "req-403");

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"]["code"], "FIELD_PERMISSION_DENIED");
    assert_eq!(body["error"]["request_id"], "req-403");
}

#[tokio::test]
async fn test_admin_gate_rejection_carries_request_id() {
    let app = TestApp::new();
    let token = app.token("USER");
    let request = Request::builder()
        .uri("/api/v1/permissions/matrix")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header("X-Request-ID", "req-gate")
        .body(Body::empty())
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(response.headers()["x-request-id"], "req-gate");

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"]["request_id"], "req-gate");
}
