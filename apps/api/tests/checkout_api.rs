//! End-to-end tests driving the router against an in-memory database.

use std::collections::HashMap;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use tally_api::{router, ApiConfig, AppState};
use tally_core::{
    FuelConfig, Money, Pricing, PricingMode, Product, ProductType, Quantity, Role, Store,
};
use tally_db::{Database, DbConfig};

const SECRET: &str = "integration-secret";
const COMPANY: &str = "company-1";
const CASHIER: &str = "cashier-1";

struct TestApp {
    app: Router,
    state: AppState,
    store_id: String,
}

impl TestApp {
    async fn new() -> Self {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let config = ApiConfig::from_env_map(HashMap::from([(
            "TALLY_JWT_SECRET".to_string(),
            SECRET.to_string(),
        )]))
        .unwrap();

        let store = Store {
            id: Uuid::new_v4().to_string(),
            company_id: COMPANY.to_string(),
            name: "Main Street".to_string(),
            is_active: true,
            supervisor_id: None,
            employees: vec![CASHIER.to_string()],
            created_at: Utc::now(),
        };
        db.stores().insert(&store).await.unwrap();

        let state = AppState::new(db, &config);
        TestApp {
            app: router(state.clone()),
            state,
            store_id: store.id,
        }
    }

    async fn product(&self, product_type: ProductType, mode: PricingMode, base: i64, stock: i64) -> String {
        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            company_id: COMPANY.to_string(),
            name: "Cola".to_string(),
            barcode: None,
            product_type,
            pricing: Pricing {
                mode,
                base_price: Money::from_cents(base),
            },
            variants: vec![],
            stock: Quantity::from_units(stock),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.state.db.products().insert(&product).await.unwrap();
        product.id
    }

    fn token(&self, user_id: &str) -> String {
        self.state.jwt.issue(user_id, Role::Cashier, 3600).unwrap()
    }

    async fn send(&self, method: Method, uri: &str, user: Option<&str>, body: Option<String>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", self.token(user)));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn checkout(&self, user: &str, items: Value) -> (StatusCode, Value) {
        let body = json!({ "storeId": self.store_id, "items": items });
        self.send(Method::POST, "/api/v1/orders", Some(user), Some(body.to_string()))
            .await
    }
}

#[tokio::test]
async fn test_health_reports_database() {
    let t = TestApp::new().await;

    let (status, body) = t.send(Method::GET, "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["database"], "connected");
}

#[tokio::test]
async fn test_checkout_creates_order_visible_in_ledger() {
    let t = TestApp::new().await;
    let cola = t.product(ProductType::Quantity, PricingMode::Fixed, 100, 10).await;

    let (status, order) = t
        .checkout(CASHIER, json!([{ "product": cola, "quantity": 3 }]))
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["total"], 300);
    assert_eq!(order["status"], "pending");
    assert_eq!(order["paymentStatus"], "pending");
    assert_eq!(order["cashier"], CASHIER);
    assert_eq!(order["items"][0]["name"], "Cola");
    assert_eq!(order["items"][0]["unitPrice"], 100);

    let id = order["id"].as_str().unwrap();
    let reference = order["reference"].as_str().unwrap();

    let (status, by_id) = t
        .send(Method::GET, &format!("/api/v1/orders/{}", id), Some(CASHIER), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(by_id["reference"], reference);

    let (status, by_ref) = t
        .send(Method::GET, &format!("/api/v1/orders?reference={}", reference), Some(CASHIER), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(by_ref["id"], id);

    let (status, mine) = t
        .send(Method::GET, "/api/v1/cashiers/me/orders", Some(CASHIER), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine.as_array().unwrap().len(), 1);

    let (status, store_orders) = t
        .send(Method::GET, &format!("/api/v1/stores/{}/orders", t.store_id), Some(CASHIER), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(store_orders[0]["id"], id);

    let stock = t.state.db.products().get_by_id(&cola).await.unwrap().unwrap().stock;
    assert_eq!(stock, Quantity::from_units(7));
}

#[tokio::test]
async fn test_fuel_checkout_derives_quantity() {
    let t = TestApp::new().await;
    let diesel = t
        .product(
            ProductType::Fuel,
            PricingMode::Fuel {
                config: FuelConfig {
                    price_per_unit: Money::from_cents(600),
                    display_unit: "L".to_string(),
                },
            },
            600,
            0,
        )
        .await;

    let (status, order) = t
        .checkout(CASHIER, json!([{ "product": diesel, "amount": 1000 }]))
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["items"][0]["quantity"], 1.667);
    assert_eq!(order["items"][0]["total"], 1000);
    assert_eq!(order["items"][0]["unitLabel"], "L");
}

#[tokio::test]
async fn test_insufficient_stock_is_a_conflict_with_line_index() {
    let t = TestApp::new().await;
    let plenty = t.product(ProductType::Quantity, PricingMode::Fixed, 100, 50).await;
    let scarce = t.product(ProductType::Quantity, PricingMode::Fixed, 100, 5).await;

    let (status, body) = t
        .checkout(
            CASHIER,
            json!([
                { "product": plenty, "quantity": 1 },
                { "product": scarce, "quantity": 10 }
            ]),
        )
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["kind"], "INVENTORY_ERROR");
    assert_eq!(body["error"]["code"], "INSUFFICIENT_STOCK");
    assert_eq!(body["error"]["lineIndex"], 1);
    assert_eq!(t.state.db.orders().count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_request_errors() {
    let t = TestApp::new().await;
    let cola = t.product(ProductType::Quantity, PricingMode::Fixed, 100, 10).await;

    let (status, body) = t
        .send(Method::POST, "/api/v1/orders", None, Some("{}".to_string()))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHENTICATED");

    let (status, body) = t
        .send(Method::POST, "/api/v1/orders", Some(CASHIER), Some("{not json".to_string()))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "MALFORMED_REQUEST");

    let (status, body) = t
        .checkout(
            CASHIER,
            json!([
                { "product": cola, "quantity": 1 },
                { "product": cola, "quantity": "lots" }
            ]),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_QUANTITY");
    assert_eq!(body["error"]["lineIndex"], 1);

    let (status, body) = t.checkout(CASHIER, json!([])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "EMPTY_CART");
    assert!(body["error"].get("lineIndex").is_none());

    let (status, body) = t
        .checkout(CASHIER, json!([{ "product": Uuid::new_v4().to_string(), "quantity": 1 }]))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "PRODUCT_NOT_FOUND");
    assert_eq!(body["error"]["lineIndex"], 0);
}

#[tokio::test]
async fn test_strangers_cannot_sell_or_read() {
    let t = TestApp::new().await;
    let cola = t.product(ProductType::Quantity, PricingMode::Fixed, 100, 10).await;

    let (status, body) = t
        .checkout("stranger", json!([{ "product": cola, "quantity": 1 }]))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["kind"], "AUTHORIZATION_ERROR");
    assert_eq!(body["error"]["code"], "STORE_ACCESS_DENIED");

    let (_, order) = t
        .checkout(CASHIER, json!([{ "product": cola, "quantity": 1 }]))
        .await;
    let id = order["id"].as_str().unwrap();

    let (status, _) = t
        .send(Method::GET, &format!("/api/v1/orders/{}", id), Some("stranger"), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = t
        .send(Method::GET, &format!("/api/v1/orders/{}", Uuid::new_v4()), Some(CASHIER), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "ORDER_NOT_FOUND");

    let (status, mine) = t
        .send(Method::GET, "/api/v1/cashiers/me/orders", Some("stranger"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(mine.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_store_id_is_checked_before_lines() {
    let t = TestApp::new().await;
    let cola = t.product(ProductType::Quantity, PricingMode::Fixed, 100, 10).await;

    let body = json!({ "storeId": "not-a-store", "items": [{ "product": cola, "quantity": "lots" }] });
    let (status, body) = t
        .send(Method::POST, "/api/v1/orders", Some(CASHIER), Some(body.to_string()))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_ID");
    assert!(body["error"].get("lineIndex").is_none());
}

#[tokio::test]
async fn test_padded_product_id_is_invalid_not_missing() {
    let t = TestApp::new().await;
    let cola = t.product(ProductType::Quantity, PricingMode::Fixed, 100, 10).await;

    let (status, body) = t
        .checkout(CASHIER, json!([{ "product": format!(" {} ", cola), "quantity": 1 }]))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_ID");
    assert_eq!(body["error"]["lineIndex"], 0);
    assert_eq!(t.state.db.orders().count().await.unwrap(), 0);
}
