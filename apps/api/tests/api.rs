//! HTTP tests driving the router in-process with `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use dukan_api::{router, ApiConfig, AppState};
use dukan_core::UserRole;
use dukan_db::{Database, DbConfig};

const ADMIN_KEY: &str = "counter-key-1";

struct TestApp {
    app: Router,
    db: Database,
    admin_token: String,
    cashier_token: String,
}

impl TestApp {
    async fn new() -> Self {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.users()
            .create("admin", "Administrator", "admin-pass", UserRole::Admin)
            .await
            .unwrap();
        db.users()
            .create("cashier", "Till One", "till-pass", UserRole::Cashier)
            .await
            .unwrap();
        db.settings().init_admin_key(ADMIN_KEY).await.unwrap();

        let app = router(Arc::new(AppState::new(db.clone(), ApiConfig::default())));

        let mut test = TestApp {
            app,
            db,
            admin_token: String::new(),
            cashier_token: String::new(),
        };
        test.admin_token = test.login("admin", "admin-pass").await;
        test.cashier_token = test.login("cashier", "till-pass").await;
        test
    }

    async fn login(&self, username: &str, password: &str) -> String {
        let (status, body) = self
            .send(
                Method::POST,
                "/auth/login",
                None,
                Some(json!({ "username": username, "password": password })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["access_token"].as_str().unwrap().to_string()
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(value) => {
                builder = builder.header(CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        let response = self.app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, Some(&self.admin_token), None).await
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(&self.admin_token), Some(body)).await
    }

    /// $100 product, stock 10.
    async fn product(&self, sku: &str) -> String {
        let (status, body) = self
            .post(
                "/products",
                json!({
                    "sku": sku,
                    "name": format!("{sku} item"),
                    "price_usd": 100.0,
                    "cost_usd": 60.0,
                    "stock": 10,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_str().unwrap().to_string()
    }

    async fn customer(&self, name: &str) -> String {
        let (status, body) = self.post("/customers", json!({ "name": name })).await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_str().unwrap().to_string()
    }
}

fn due_date() -> String {
    (Utc::now() + Duration::days(14)).date_naive().to_string()
}

#[tokio::test]
async fn test_health_is_public() {
    let app = TestApp::new().await;
    let (status, body) = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], true);
}

#[tokio::test]
async fn test_auth_required_and_login() {
    let app = TestApp::new().await;

    let (status, body) = app.send(Method::GET, "/products", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "AUTH_FAILED");

    let (status, _) = app.send(Method::GET, "/products", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .send(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "username": "admin", "password": "wrong" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "AUTH_FAILED");

    let (status, me) = app.get("/auth/me").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], "admin");
    assert_eq!(me["role"], "admin");
    assert!(me.get("password_hash").is_none());
}

#[tokio::test]
async fn test_example_checkout_scenario() {
    let app = TestApp::new().await;
    let product = app.product("RICE-25KG").await;
    let items = json!([{ "product_id": product, "quantity": 1 }]);

    // $100 at 70 AFN/USD with 10% off: $90 = ؋6300
    let (status, quote) = app
        .post("/checkout/quote", json!({ "items": items, "discount_percent": 10 }))
        .await;
    assert_eq!(status, StatusCode::OK, "{quote}");
    assert_eq!(quote["totals"]["total_usd"], 9_000);
    assert_eq!(quote["totals"]["total_afn"], 630_000);

    let (status, receipt) = app
        .post(
            "/sales",
            json!({ "items": items, "discount_percent": 10, "amount_paid_afn": 6300 }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{receipt}");
    assert_eq!(receipt["invoice"]["status"], "PAID");
    assert_eq!(receipt["invoice"]["outstanding_afn"], 0);
    assert_eq!(receipt["invoice"]["paid_afn"], 630_000);
    assert!(receipt["debt"].is_null());

    // ؋3000 with no customer cannot become a debt
    let (status, body) = app
        .post(
            "/sales",
            json!({
                "items": items,
                "discount_percent": 10,
                "amount_paid_afn": 3000,
                "due_date": due_date(),
            }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "CHECKOUT_REJECTED");

    let (_, product) = app.get(&format!("/products/{product}")).await;
    assert_eq!(product["stock"], 9);
}

#[tokio::test]
async fn test_credit_sale_then_payment_settles_debt() {
    let app = TestApp::new().await;
    let product = app.product("OIL-5L").await;
    let customer = app.customer("Ahmad Shah").await;

    let (status, receipt) = app
        .post(
            "/sales",
            json!({
                "items": [{ "product_id": product, "quantity": 1 }],
                "discount_percent": 10,
                "amount_paid_afn": 3000,
                "customer_id": customer,
                "due_date": due_date(),
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{receipt}");
    assert_eq!(receipt["invoice"]["status"], "PARTIAL");
    assert_eq!(receipt["debt"]["remaining_balance_afn"], 330_000);

    let (_, view) = app.get(&format!("/customers/{customer}")).await;
    assert_eq!(view["balance_afn"], 330_000);
    assert_eq!(view["has_credit"], false);

    let (_, debts) = app.get("/debts").await;
    assert_eq!(debts.as_array().unwrap().len(), 1);
    assert_eq!(debts[0]["status"], "ACTIVE");

    let (status, payment) = app
        .post(
            &format!("/customers/{customer}/payments"),
            json!({ "amount_afn": 3300, "method": "cash" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{payment}");
    assert_eq!(payment["allocation"]["allocations"][0]["settles"], true);

    let (_, view) = app.get(&format!("/customers/{customer}")).await;
    assert_eq!(view["balance_afn"], 0);

    let (_, ledger) = app.get(&format!("/customers/{customer}/ledger")).await;
    assert_eq!(ledger["debts"][0]["status"], "SETTLED");
    assert_eq!(ledger["payments"].as_array().unwrap().len(), 2);

    let (_, summary) = app.get("/debts/summary").await;
    assert_eq!(summary["total_outstanding_afn"], 0);
    assert_eq!(summary["settled"]["count"], 1);

    let invoice_id = receipt["invoice"]["id"].as_str().unwrap();
    let (_, detail) = app.get(&format!("/sales/{invoice_id}")).await;
    assert_eq!(detail["invoice"]["status"], "PAID");
}

#[tokio::test]
async fn test_admin_key_gates_destructive_actions() {
    let app = TestApp::new().await;
    let product = app.product("TEA-500").await;

    let (_, receipt) = app
        .post(
            "/sales",
            json!({
                "items": [{ "product_id": product, "quantity": 2 }],
                "amount_paid_afn": 14000,
            }),
        )
        .await;
    let invoice_id = receipt["invoice"]["id"].as_str().unwrap().to_string();
    let item_id = receipt["items"][0]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .send(
            Method::DELETE,
            &format!("/sales/{invoice_id}"),
            Some(&app.admin_token),
            Some(json!({ "adminPassword": "guess" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "ADMIN_KEY_INVALID");

    // Return one of two, refunded in cash
    let (status, returned) = app
        .post(
            &format!("/sales/{invoice_id}/returns"),
            json!({ "items": [{ "item_id": item_id, "quantity": 1 }], "adminPassword": ADMIN_KEY }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{returned}");
    assert_eq!(returned["payment"]["amount_afn"], -700_000);

    let (status, body) = app
        .post(
            &format!("/sales/{invoice_id}/returns"),
            json!({
                "items": [{ "item_id": item_id, "quantity": 5 }],
                "admin_password": ADMIN_KEY,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "PAYMENT_ERROR");

    let (status, _) = app
        .send(
            Method::DELETE,
            &format!("/sales/{invoice_id}"),
            Some(&app.admin_token),
            Some(json!({ "admin_password": ADMIN_KEY })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.get(&format!("/sales/{invoice_id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, product) = app.get(&format!("/products/{product}")).await;
    assert_eq!(product["stock"], 10);

    let (_, logs) = app.get(&format!("/audit-logs?entity=invoice&entity_id={invoice_id}")).await;
    let actions: Vec<&str> = logs
        .as_array()
        .unwrap()
        .iter()
        .map(|l| l["action"].as_str().unwrap())
        .collect();
    assert_eq!(actions, ["SALE_CREATED", "RETURN_APPLIED", "SALE_DELETED"]);
}

#[tokio::test]
async fn test_bulk_delete_is_all_or_nothing() {
    let app = TestApp::new().await;
    let product = app.product("SUGAR-5KG").await;
    let (_, receipt) = app
        .post(
            "/sales",
            json!({ "items": [{ "product_id": product, "quantity": 1 }], "amount_paid_afn": 7000 }),
        )
        .await;
    let invoice_id = receipt["invoice"]["id"].as_str().unwrap();

    let (status, _) = app
        .post(
            "/sales/bulk-delete",
            json!({ "ids": [invoice_id, "missing-invoice"], "adminPassword": ADMIN_KEY }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.get(&format!("/sales/{invoice_id}")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .post("/sales/bulk-delete", json!({ "ids": [invoice_id], "adminPassword": ADMIN_KEY }))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["deleted"], 1);
}

#[tokio::test]
async fn test_validation_errors_carry_fields() {
    let app = TestApp::new().await;

    let (status, body) = app
        .post("/products", json!({ "sku": "X1", "name": "  ", "price_usd": 1.0 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert_eq!(body["fields"][0]["field"], "name");

    app.product("DUP-1").await;
    let (status, body) = app
        .post("/products", json!({ "sku": "dup-1", "name": "Again", "price_usd": 1.0 }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");

    let (status, body) = app.get("/reports/period?kind=monthly&year=2026").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["fields"][0]["field"], "month");
}

#[tokio::test]
async fn test_malformed_bodies_answer_with_json_errors() {
    let app = TestApp::new().await;

    // Missing required field names the field
    let (status, body) = app.post("/sales", json!({ "items": [] })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert_eq!(body["fields"][0]["field"], "amount_paid_afn");

    let (status, body) = app.post("/customers", json!({ "name": 5 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert_eq!(body["fields"][0]["field"], "body");

    let (status, body) = app.get("/reports/period?kind=monthly&year=abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert_eq!(body["fields"][0]["field"], "query");
}

#[tokio::test]
async fn test_oversized_amounts_are_rejected() {
    let app = TestApp::new().await;
    let customer = app.customer("Big Spender").await;

    let (status, body) = app
        .post(
            &format!("/customers/{customer}/payments"),
            json!({ "amount_afn": 5.0e16, "method": "cash" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert_eq!(body["fields"][0]["field"], "amount_afn");

    let (status, body) = app
        .post("/products", json!({ "sku": "GOLD-1", "name": "Gold", "price_usd": 1.0e11 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(body["fields"][0]["field"], "price_usd");

    let (_, view) = app.get(&format!("/customers/{customer}")).await;
    assert_eq!(view["balance_afn"], 0);
}

#[tokio::test]
async fn test_exchange_rate_requires_admin_role() {
    let app = TestApp::new().await;

    let (_, rate) = app.get("/settings/exchange-rate").await;
    assert_eq!(rate["exchange_rate"], 70.0);

    let (status, body) = app
        .send(
            Method::PUT,
            "/settings/exchange-rate",
            Some(&app.cashier_token),
            Some(json!({ "exchange_rate": 72.5 })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");

    let (status, rate) = app
        .send(
            Method::PUT,
            "/settings/exchange-rate",
            Some(&app.admin_token),
            Some(json!({ "exchange_rate": 72.5 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rate["exchange_rate"], 72.5);

    let (status, _) = app
        .send(
            Method::PUT,
            "/settings/exchange-rate",
            Some(&app.admin_token),
            Some(json!({ "exchange_rate": 0 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_rotate_admin_key() {
    let app = TestApp::new().await;

    let (status, body) = app
        .send(
            Method::PUT,
            "/settings/admin-key",
            Some(&app.admin_token),
            Some(json!({ "old_key": "wrong-key", "new_key": "brand-new-key" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "ADMIN_KEY_INVALID");

    let (status, _) = app
        .send(
            Method::PUT,
            "/settings/admin-key",
            Some(&app.admin_token),
            Some(json!({ "old_key": ADMIN_KEY, "new_key": "brand-new-key" })),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(app.db.settings().verify_admin_key("brand-new-key").await.unwrap());
}

#[tokio::test]
async fn test_expenses_and_reports() {
    let app = TestApp::new().await;
    let product = app.product("FLOUR-10KG").await;
    app.post(
        "/sales",
        json!({ "items": [{ "product_id": product, "quantity": 1 }], "amount_paid_afn": 7000 }),
    )
    .await;

    let (status, expense) = app
        .post(
            "/expenses",
            json!({ "description": "Shop rent", "category": "Rent", "amount_afn": 1400 }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{expense}");
    assert_eq!(expense["category"], "rent");
    let expense_id = expense["id"].as_str().unwrap();

    let (_, listed) = app.get("/expenses?category=rent").await;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let today = Utc::now().date_naive().to_string();
    let (status, report) = app
        .get(&format!("/reports/period?kind=range&from={today}&to={today}"))
        .await;
    assert_eq!(status, StatusCode::OK, "{report}");
    assert_eq!(report["invoice_count"], 1);
    // $100 sale, $60 cost, ؋1400 = $20 rent
    assert_eq!(report["gross_profit_usd"], 4_000);
    assert_eq!(report["net_profit_usd"], 2_000);

    let (_, dashboard) = app.get("/reports/dashboard").await;
    assert_eq!(dashboard["today_invoice_count"], 1);

    let (status, _) = app
        .send(
            Method::DELETE,
            &format!("/expenses/{expense_id}"),
            Some(&app.admin_token),
            Some(json!({ "adminPassword": ADMIN_KEY })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, listed) = app.get("/expenses").await;
    assert!(listed.as_array().unwrap().is_empty());
}
