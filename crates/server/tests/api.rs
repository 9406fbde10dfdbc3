use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use base64::Engine as _;
use http_body_util::BodyExt;
use sea_orm::{ConnectionTrait, Database, Statement};
use serde_json::{Value, json};
use tower::ServiceExt;

use engine::{
    Biller, BillerError, BillerPurchase, CheckoutRequest, CheckoutSession, Engine, Gateway,
    GatewayError, MeterInfo, PurchaseReceipt, sign,
};
use migration::MigratorTrait;

const SECRET: &str = "sk_test_webhook";

struct StubBiller;

#[async_trait]
impl Biller for StubBiller {
    async fn verify_meter(&self, _: &str, meter_id: &str) -> Result<MeterInfo, BillerError> {
        Ok(MeterInfo {
            customer_name: format!("Owner of {meter_id}"),
            meter_type: Some("PREPAID".to_string()),
            outstanding_debt: Some("0".to_string()),
        })
    }

    async fn purchase(&self, request: &BillerPurchase) -> Result<PurchaseReceipt, BillerError> {
        if request.meter_id == "99999999999" {
            return Err(BillerError::Unconfirmed {
                reason: "timed out".to_string(),
                raw: None,
            });
        }
        Ok(PurchaseReceipt {
            token: Some("1111-2222-3333-4444".to_string()),
            raw: json!({"code": "000"}),
        })
    }
}

struct StubGateway;

#[async_trait]
impl Gateway for StubGateway {
    async fn initialize(&self, checkout: &CheckoutRequest) -> Result<CheckoutSession, GatewayError> {
        Ok(CheckoutSession {
            authorization_url: format!("https://checkout.test/{}", checkout.reference),
            access_code: None,
        })
    }
}

async fn test_app() -> Router {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db.clone())
        .biller(Arc::new(StubBiller))
        .gateway(Arc::new(StubGateway))
        .webhook_secret(SECRET)
        .build()
        .await
        .unwrap();
    let account = engine.open_account("alice@example.com").await.unwrap();
    let backend = db.get_database_backend();
    db.execute(Statement::from_sql_and_values(
        backend,
        "INSERT INTO users (username, password, account_id) VALUES (?, ?, ?)",
        vec!["alice".into(), "password".into(), account.id.into()],
    ))
    .await
    .unwrap();
    server::app(engine, db)
}

fn basic_auth() -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode("alice:password");
    format!("Basic {encoded}")
}

fn authed(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, basic_auth());
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn webhook(body: &[u8], signature: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("x-paystack-signature", signature)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_vec()))
        .unwrap()
}

fn charge(amount: i64, reference: &str) -> Vec<u8> {
    json!({
        "event": "charge.success",
        "data": {
            "status": "success",
            "reference": reference,
            "amount": amount,
            "customer": {"email": "alice@example.com"}
        }
    })
    .to_string()
    .into_bytes()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let res = app.clone().oneshot(request).await.unwrap();
    let status = res.status();
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

async fn balance(app: &Router) -> i64 {
    let (status, body) = send(app, authed("GET", "/account", None)).await;
    assert_eq!(status, StatusCode::OK);
    body["balance_minor"].as_i64().unwrap()
}

#[tokio::test]
async fn requests_without_credentials_are_rejected() {
    let app = test_app().await;
    let req = Request::builder()
        .uri("/account")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let wrong = base64::engine::general_purpose::STANDARD.encode("alice:nope");
    let req = Request::builder()
        .uri("/account")
        .header(header::AUTHORIZATION, format!("Basic {wrong}"))
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn webhook_credits_once_and_acknowledges_duplicates() {
    let app = test_app().await;
    let body = charge(1000, "px_1");
    let signature = sign(&body, SECRET);

    let (status, _) = send(&app, webhook(&body, &signature)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, webhook(&body, &signature)).await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(balance(&app).await, 1000);
    let (_, list) = send(&app, authed("GET", "/transactions", None)).await;
    let txs = list["transactions"].as_array().unwrap();
    assert_eq!(txs.len(), 1);
    assert_eq!(txs[0]["kind"], "topup");
    assert_eq!(txs[0]["status"], "success");
}

#[tokio::test]
async fn webhook_with_bad_signature_is_refused() {
    let app = test_app().await;
    let body = charge(1000, "px_2");
    let signature = sign(&charge(5, "px_2"), SECRET);

    let (status, body) = send(&app, webhook(&body, &signature)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].as_str().unwrap().contains("signature"));
    assert_eq!(balance(&app).await, 0);
}

#[tokio::test]
async fn webhook_accepts_the_generic_signature_header() {
    let app = test_app().await;
    let body = charge(2500, "px_3");
    let req = Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("X-Signature", sign(&body, SECRET))
        .body(Body::from(body))
        .unwrap();

    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(balance(&app).await, 2500);
}

#[tokio::test]
async fn purchase_flow_over_http() {
    let app = test_app().await;
    let body = charge(1000, "px_4");
    send(&app, webhook(&body, &sign(&body, SECRET))).await;

    let (status, verified) = send(
        &app,
        authed(
            "POST",
            "/payment/verify",
            Some(json!({"provider_id": "ikeja-electric", "meter_id": "45012345678"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(verified["customer_name"], "Owner of 45012345678");

    let (status, bought) = send(
        &app,
        authed(
            "POST",
            "/payment",
            Some(json!({
                "provider_id": "ikeja-electric",
                "meter_id": "45012345678",
                "amount_minor": 700,
                "idempotency_key": "k-1"
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bought["status"], "success");
    assert_eq!(bought["provider_token"], "1111-2222-3333-4444");
    assert_eq!(bought["replayed"], false);
    assert_eq!(balance(&app).await, 300);

    let (status, denied) = send(
        &app,
        authed(
            "POST",
            "/payment",
            Some(json!({"provider_id": "ikeja-electric", "meter_id": "45012345678", "amount_minor": 700})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(denied["error"].as_str().unwrap().contains("Insufficient funds"));
    assert_eq!(balance(&app).await, 300);
}

#[tokio::test]
async fn unconfirmed_purchase_is_accepted_and_held() {
    let app = test_app().await;
    let body = charge(1000, "px_5");
    send(&app, webhook(&body, &sign(&body, SECRET))).await;

    let (status, pending) = send(
        &app,
        authed(
            "POST",
            "/payment",
            Some(json!({"provider_id": "ikeja-electric", "meter_id": "99999999999", "amount_minor": 400})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(pending["status"], "pending");

    let (_, account) = send(&app, authed("GET", "/account", None)).await;
    assert_eq!(account["balance_minor"], 1000);
    assert_eq!(account["held_minor"], 400);
    assert_eq!(account["available_minor"], 600);
}

#[tokio::test]
async fn topup_initiation_enforces_the_minimum() {
    let app = test_app().await;

    let (status, _) = send(
        &app,
        authed("POST", "/topup/initiate", Some(json!({"amount_minor": 5000}))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, checkout) = send(
        &app,
        authed("POST", "/topup/initiate", Some(json!({"amount_minor": 20000}))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let reference = checkout["reference"].as_str().unwrap();
    assert!(reference.starts_with("epay_"));
    assert_eq!(
        checkout["authorization_url"],
        format!("https://checkout.test/{reference}")
    );
    assert_eq!(balance(&app).await, 0);
}

#[tokio::test]
async fn listener_serves_the_router() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db.clone())
        .webhook_secret(SECRET)
        .build()
        .await
        .unwrap();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(server::run_with_listener(engine, db, listener));

    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /account HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    assert!(response.starts_with("HTTP/1.1 401"), "{response}");
}
