//! HTTP API tests.
//!
//! Drive the full router with `tower::ServiceExt::oneshot` against the
//! in-memory store.

#![allow(clippy::expect_used)] // Test code uses expect for clear failure messages
#![allow(clippy::unwrap_used)]

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode},
};
use gatepass_core::environment::Clock;
use gatepass_server::paystack::{SIGNATURE_HEADER, WebhookVerifier};
use gatepass_server::{AppState, Config, build_router};
use gatepass_testing::fixtures::{standard_tiers, verifier};
use gatepass_testing::{InMemoryStore, test_clock};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;

const PAYSTACK_SECRET: &str = "sk_test_http";
const ADMIN_PASSWORD: &str = "gate-staff-2026";

struct TestApp {
    router: Router,
    store: InMemoryStore,
}

impl TestApp {
    fn new() -> Self {
        let vars: HashMap<&str, &str> = [
            ("TICKET_CODE_SECRET", "test-ticket-code-secret"),
            ("PAYSTACK_SECRET_KEY", PAYSTACK_SECRET),
            ("ADMIN_PASSWORD", ADMIN_PASSWORD),
            ("ADMIN_SESSION_SECRET", "test-session-secret"),
        ]
        .into_iter()
        .collect();
        let config = Config::from_lookup(|key| vars.get(key).map(ToString::to_string))
            .expect("test configuration loads");

        let store = InMemoryStore::with_tiers(standard_tiers());
        let clock: Arc<dyn Clock> = Arc::new(test_clock());
        let state = AppState::build(&config, Arc::new(store.clone()), clock)
            .expect("state builds from test configuration");

        Self {
            router: build_router(state),
            store,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.call(Method::GET, uri, None, None).await
    }

    async fn login(&self) -> String {
        let (status, body) = self
            .call(
                Method::POST,
                "/api/admin/login",
                None,
                Some(json!({ "password": ADMIN_PASSWORD })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        body["token"].as_str().unwrap().to_string()
    }

    async fn create_order(&self, tier: &str, group_size: &str) -> Value {
        let (status, body) = self
            .call(
                Method::POST,
                "/api/orders",
                None,
                Some(json!({
                    "tier": tier,
                    "group_size": group_size,
                    "buyer": { "name": "Ada Obi", "email": "ada@example.com" }
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create failed: {body}");
        body
    }

    async fn webhook(&self, payload: &Value, signature: Option<String>) -> (StatusCode, Value) {
        let raw = payload.to_string();
        let signature = signature.unwrap_or_else(|| {
            WebhookVerifier::new(PAYSTACK_SECRET.as_bytes()).sign(raw.as_bytes())
        });
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/payments/webhook")
            .header("content-type", "application/json")
            .header(SIGNATURE_HEADER, signature)
            .body(Body::from(raw))
            .unwrap();
        self.send(request).await
    }

    async fn pay(&self, order: &Value) -> (StatusCode, Value) {
        self.webhook(&charge(order, order["total"].as_u64().unwrap()), None)
            .await
    }
}

fn charge(order: &Value, amount: u64) -> Value {
    json!({
        "event": "charge.success",
        "data": {
            "id": 4_099_260_516_u64,
            "reference": order["number"],
            "amount": amount,
            "status": "success",
            "currency": "NGN"
        }
    })
}

// ============================================================================
// Health and storefront
// ============================================================================

#[tokio::test]
async fn test_health_and_readiness() {
    let app = TestApp::new();
    let (status, body) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = app.get("/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ready"], true);

    app.store.set_offline(true);
    let (status, body) = app.get("/ready").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["database"], false);
}

#[tokio::test]
async fn test_correlation_id_echoed() {
    let app = TestApp::new();
    let id = "7f1b0d6e-3c1a-4b7e-9a55-0c6d2f3e8a91";
    let request = Request::builder()
        .uri("/health")
        .header("x-correlation-id", id)
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(
        response.headers().get("x-correlation-id").unwrap().to_str().unwrap(),
        id
    );
}

#[tokio::test]
async fn test_tier_listing() {
    let app = TestApp::new();
    let (status, body) = app.get("/api/tiers").await;
    assert_eq!(status, StatusCode::OK);

    let tiers = body["tiers"].as_array().unwrap();
    assert_eq!(tiers.len(), 5);
    assert_eq!(tiers[0]["tier"], "regular");
    assert_eq!(tiers[0]["window"], "presale");
    assert_eq!(tiers[0]["remaining"], 100);
    assert_eq!(tiers[0]["prices"][0]["group_size"], "single");
    assert_eq!(tiers[0]["prices"][0]["total"], 1_000_000);
    // Quad: 4 people at the group price
    assert_eq!(tiers[0]["prices"][2]["total"], 3_600_000);
}

#[tokio::test]
async fn test_tier_listing_degrades_without_sample_data() {
    let app = TestApp::new();
    app.store.set_offline(true);

    let (status, body) = app.get("/api/tiers").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "SERVICE_UNAVAILABLE");
    assert!(body.get("tiers").is_none());
}

#[tokio::test]
async fn test_create_and_get_order() {
    let app = TestApp::new();
    let order = app.create_order("gold", "pair").await;
    assert_eq!(order["number"], "IAF-2026-0001");
    assert_eq!(order["status"], "pending");
    assert_eq!(order["quantity"], 2);
    assert!(order.get("buyer").is_none());

    let (status, body) = app.get("/api/orders/IAF-2026-0001").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], order["total"]);

    let (status, body) = app.get("/api/orders/IAF-2026-9999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_create_order_validation() {
    let app = TestApp::new();
    let (status, _) = app
        .call(
            Method::POST,
            "/api/orders",
            None,
            Some(json!({ "tier": "gold", "buyer": { "name": "Ada" }, "discount": 50 })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = app
        .call(
            Method::POST,
            "/api/orders",
            None,
            Some(json!({ "tier": "gold", "units": 0, "buyer": { "name": "Ada" } })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

// ============================================================================
// Payment webhook
// ============================================================================

#[tokio::test]
async fn test_webhook_completes_order_once() {
    let app = TestApp::new();
    let order = app.create_order("bronze", "single").await;

    let (status, body) = app.pay(&order).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");
    assert_eq!(app.store.tickets().len(), 1);

    let (status, body) = app.pay(&order).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "duplicate");
    assert_eq!(app.store.tickets().len(), 1);

    let (_, body) = app.get("/api/orders/IAF-2026-0001").await;
    assert_eq!(body["status"], "completed");
    assert_eq!(body["payment_status"], "paid");
}

#[tokio::test]
async fn test_webhook_rejects_bad_signature() {
    let app = TestApp::new();
    let order = app.create_order("bronze", "single").await;

    let forged = WebhookVerifier::new(b"sk_test_someone_else")
        .sign(charge(&order, 2_500_000).to_string().as_bytes());
    let (status, body) = app.webhook(&charge(&order, 2_500_000), Some(forged)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");
    assert!(app.store.tickets().is_empty());
}

#[tokio::test]
async fn test_webhook_ignores_other_events() {
    let app = TestApp::new();
    let order = app.create_order("bronze", "single").await;
    let mut payload = charge(&order, 2_500_000);
    payload["event"] = json!("charge.dispute.create");

    let (status, body) = app.webhook(&payload, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ignored");
    assert!(app.store.tickets().is_empty());
}

#[tokio::test]
async fn test_webhook_acknowledges_non_charge_payloads() {
    let app = TestApp::new();
    let payload = json!({
        "event": "subscription.create",
        "data": { "subscription_code": "SUB_x", "amount": 5000 }
    });

    let (status, body) = app.webhook(&payload, None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "ignored");
    assert!(app.store.tickets().is_empty());
}

#[tokio::test]
async fn test_webhook_charge_without_reference_is_bad_request() {
    let app = TestApp::new();
    let payload = json!({
        "event": "charge.success",
        "data": { "id": 4401, "amount": 2_500_000 }
    });

    let (status, body) = app.webhook(&payload, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_webhook_underpayment_leaves_order_pending() {
    let app = TestApp::new();
    let order = app.create_order("silver", "single").await;
    let short = order["total"].as_u64().unwrap() - 100;

    let (status, body) = app.webhook(&charge(&order, short), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "rejected");
    assert!(body["reason"].as_str().unwrap().contains("amount mismatch"));

    let (_, body) = app.get("/api/orders/IAF-2026-0001").await;
    assert_eq!(body["status"], "pending");
}

#[tokio::test]
async fn test_webhook_retried_when_store_down() {
    let app = TestApp::new();
    let order = app.create_order("silver", "single").await;
    app.store.set_offline(true);

    let (status, body) = app.pay(&order).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "SERVICE_UNAVAILABLE");
}

// ============================================================================
// Back office
// ============================================================================

#[tokio::test]
async fn test_admin_routes_require_session() {
    let app = TestApp::new();
    let (status, _) = app
        .call(Method::GET, "/api/admin/stats/entries", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .call(Method::GET, "/api/admin/stats/entries", Some("forged.token"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .call(
            Method::POST,
            "/api/admin/login",
            None,
            Some(json!({ "password": "letmein" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "INVALID_CREDENTIALS");
}

#[tokio::test]
async fn test_gate_scan_flow() {
    let app = TestApp::new();
    let token = app.login().await;
    let order = app.create_order("gold", "single").await;
    app.pay(&order).await;

    let (status, tickets) = app
        .call(
            Method::GET,
            "/api/admin/orders/IAF-2026-0001/tickets",
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let ticket = &tickets[0];
    assert!(
        ticket["qr_data_url"]
            .as_str()
            .unwrap()
            .starts_with("data:image/svg+xml;base64,")
    );

    let scan = json!({ "input": ticket["qr_payload"], "gate": "North Gate" });
    let (status, first) = app
        .call(Method::POST, "/api/gate/scan", Some(&token), Some(scan.clone()))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["outcome"], "SUCCESS");
    assert_eq!(first["display"]["customer_name"], "Ada Obi");

    let (status, second) = app
        .call(Method::POST, "/api/gate/scan", Some(&token), Some(scan))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["outcome"], "ALREADY_USED");
    assert_eq!(second["display"]["scan_location"], "North Gate");

    let typed = json!({ "input": "IAF-NOPE-NOPE-0000", "gate": "North Gate" });
    let (status, third) = app
        .call(Method::POST, "/api/gate/scan", Some(&token), Some(typed))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(third["outcome"], "INVALID");

    let (_, stats) = app
        .call(Method::GET, "/api/admin/stats/entries", Some(&token), None)
        .await;
    assert_eq!(stats["total"], 3);
    assert_eq!(stats["admitted"], 1);

    let (_, entries) = app
        .call(Method::GET, "/api/admin/entries?limit=2", Some(&token), None)
        .await;
    assert_eq!(entries.as_array().unwrap().len(), 2);

    let code = ticket["code"].as_str().unwrap();
    let (_, audit) = app
        .call(
            Method::GET,
            &format!("/api/admin/tickets/{code}/audit"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(audit[0]["action"], "ticket.scanned");
}

#[tokio::test]
async fn test_scan_fails_when_store_down() {
    let app = TestApp::new();
    let token = app.login().await;
    app.store.set_offline(true);

    // Well formed, so the scan reaches the store
    let code = verifier().seal("MA1B2C3D", "9F04C2E1");
    let (status, body) = app
        .call(
            Method::POST,
            "/api/gate/scan",
            Some(&token),
            Some(json!({ "input": code, "gate": "North Gate" })),
        )
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "SERVICE_UNAVAILABLE");
    assert!(app.store.entries().is_empty());
}

#[tokio::test]
async fn test_cash_sale_and_refund() {
    let app = TestApp::new();
    let token = app.login().await;

    let (status, sale) = app
        .call(
            Method::POST,
            "/api/admin/cash-sales",
            Some(&token),
            Some(json!({
                "tier": "regular",
                "group_size": "pair",
                "buyer": { "name": "Walk In" },
                "payment_method": "cash",
                "amount_received": 1_800_000
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "cash sale failed: {sale}");
    assert_eq!(sale["order"]["status"], "completed");
    assert_eq!(sale["order"]["payment_method"], "cash");
    assert_eq!(sale["tickets"].as_array().unwrap().len(), 2);

    let number = sale["order"]["number"].as_str().unwrap();
    let refund = format!("/api/admin/orders/{number}/refund");
    let (status, refunded) = app
        .call(
            Method::POST,
            &refund,
            Some(&token),
            Some(json!({ "reason": "changed plans" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(refunded["status"], "refunded");

    let (status, body) = app
        .call(Method::POST, &refund, Some(&token), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "INVALID_TRANSITION");

    let (_, history) = app
        .call(
            Method::GET,
            "/api/admin/tiers/regular/history",
            Some(&token),
            None,
        )
        .await;
    let history = history.as_array().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1]["reason"], "refund");

    let (_, sales) = app
        .call(Method::GET, "/api/admin/stats/sales", Some(&token), None)
        .await;
    assert_eq!(sales["orders_by_status"]["refunded"], 1);
}

#[tokio::test]
async fn test_cash_sale_short_payment() {
    let app = TestApp::new();
    let token = app.login().await;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/admin/cash-sales",
            Some(&token),
            Some(json!({
                "tier": "diamond",
                "buyer": { "name": "Walk In" },
                "payment_method": "cash",
                "amount_received": 100
            })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "AMOUNT_MISMATCH");
}

#[tokio::test]
async fn test_cancel_pending_order() {
    let app = TestApp::new();
    let token = app.login().await;
    app.create_order("silver", "quad").await;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/admin/orders/IAF-2026-0001/cancel",
            Some(&token),
            Some(json!({ "reason": "duplicate order" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");

    let (_, audit) = app
        .call(
            Method::GET,
            "/api/admin/orders/IAF-2026-0001/audit",
            Some(&token),
            None,
        )
        .await;
    assert_eq!(audit[0]["action"], "order.cancelled");
}
