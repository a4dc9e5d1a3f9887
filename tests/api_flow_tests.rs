use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use serde_json::{Value, json};
use std::{
    path::PathBuf,
    time::{SystemTime, UNIX_EPOCH},
};
use tower::ServiceExt;

fn temp_file(tag: &str, ext: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before UNIX_EPOCH")
        .as_nanos();
    let mut path = std::env::temp_dir();
    path.push(format!(
        "inventrack-{tag}-{}-{}.{ext}",
        std::process::id(),
        nanos
    ));
    path
}

async fn test_app(tag: &str) -> (Router, Vec<PathBuf>) {
    let db_path = temp_file(tag, "sqlite");
    let cart_path = temp_file(tag, "json");

    let mut cfg = inventrack::config::Config::default();
    cfg.storage.database_url = format!("sqlite:{}", db_path.display());
    cfg.storage.cart_path = cart_path.clone();

    let state = inventrack::AppState::build(&cfg).await.expect("build state");
    let app = inventrack::app_router(state);

    let mut files = vec![cart_path];
    for suffix in ["", "-wal", "-shm"] {
        files.push(PathBuf::from(format!("{}{suffix}", db_path.display())));
    }
    (app, files)
}

async fn raw(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Vec<u8>) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        req = req.header("authorization", format!("Bearer {token}"));
    }
    let body = match body {
        Some(v) => {
            req = req.header("content-type", "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    let resp = app
        .clone()
        .oneshot(req.body(body).expect("request"))
        .await
        .expect("oneshot");
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), 4 * 1024 * 1024)
        .await
        .expect("read body");
    (status, bytes.to_vec())
}

async fn call(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let (status, bytes) = raw(app, method, uri, token, body).await;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, value)
}

async fn login(app: &Router, email: &str, password: &str) -> String {
    let (status, body) = call(
        app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": email, "password": password })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {body}");
    body["token"].as_str().expect("token").to_string()
}

fn staff(username: &str, email: &str, phone: &str, role: &str) -> Value {
    json!({
        "username": username,
        "email": email,
        "phone": phone,
        "role": role,
        "password": "Till!pass1",
        "confirm_password": "Till!pass1"
    })
}

#[tokio::test]
async fn sale_from_scan_to_receipt() {
    let (app, files) = test_app("flow").await;

    let (status, _) = call(
        &app,
        "POST",
        "/api/auth/register",
        None,
        Some(staff("boss", "boss@shop.my", "0123456789", "Manager")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = call(
        &app,
        "POST",
        "/api/auth/register",
        None,
        Some(staff("sneaky", "sneaky@shop.my", "0123456700", "Manager")),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");
    assert_eq!(
        body["error"]["message"],
        "registration is closed; ask a Manager to create your account"
    );

    let manager = login(&app, "boss@shop.my", "Till!pass1").await;
    let (status, _) = call(
        &app,
        "POST",
        "/api/users",
        Some(manager.as_str()),
        Some(staff("till", "till@shop.my", "0123456788", "Cashier")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let cashier = login(&app, "till@shop.my", "Till!pass1").await;

    let product = json!({
        "name": "Gel Pen",
        "category": "stationery",
        "price_cents": 250,
        "stock_quantity": 6
    });
    let (status, body) = call(&app, "POST", "/api/products", Some(cashier.as_str()), Some(product.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        body["error"]["message"],
        "Role Cashier is not permitted to perform this action"
    );
    let (status, pen) = call(&app, "POST", "/api/products", Some(manager.as_str()), Some(product)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(pen["category"], "Stationery");
    assert_eq!(pen["status"], "In Stock");
    let pen_id = pen["id"].as_i64().unwrap();
    let barcode = pen["barcode"].as_str().unwrap().to_string();

    // A blank code is accepted and ignored.
    let (status, body) = raw(&app, "GET", &format!("/scan?code=&token={cashier}"), None, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_empty());
    let (_, events) = call(&app, "GET", "/api/scan/events", Some(cashier.as_str()), None).await;
    assert_eq!(events, json!([]));

    // Phone scanner: query-string token, empty answer.
    let (status, body) = raw(
        &app,
        "GET",
        &format!("/scan?code={barcode}&token={cashier}"),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_empty());
    let (status, events) = call(&app, "GET", "/api/scan/events", Some(cashier.as_str()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(events[0]["kind"], "added");
    assert_eq!(events[0]["quantity"], 1);

    let (status, cart) = call(
        &app,
        "PUT",
        &format!("/api/cart/items/{pen_id}"),
        Some(cashier.as_str()),
        Some(json!({ "quantity": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["total_cents"], 530);

    let (status, sale) = call(
        &app,
        "POST",
        "/api/checkout",
        Some(cashier.as_str()),
        Some(json!({ "checkout_key": "till-0001" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let tx_id = sale["transaction"]["id"].as_i64().unwrap();
    assert_eq!(sale["low_stock"][0]["stock_quantity"], 4);

    let (status, again) = call(
        &app,
        "POST",
        "/api/checkout",
        Some(cashier.as_str()),
        Some(json!({ "checkout_key": "till-0001" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["transaction"]["id"].as_i64(), Some(tx_id));

    let (status, body) = call(
        &app,
        "POST",
        &format!("/api/products/{pen_id}/restock"),
        Some(manager.as_str()),
        Some(json!({ "delta": -10 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "INSUFFICIENT_STOCK");

    let pay_uri = format!("/api/transactions/{tx_id}/pay");
    let (status, body) = call(
        &app,
        "POST",
        &pay_uri,
        Some(cashier.as_str()),
        Some(json!({ "method": "cash", "tendered_cents": 400 })),
    )
    .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["error"]["code"], "INSUFFICIENT_PAYMENT");

    let (status, paid) = call(
        &app,
        "POST",
        &pay_uri,
        Some(cashier.as_str()),
        Some(json!({ "method": "cash", "tendered_cents": 1000 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(paid["change_cents"], 470);

    let (status, body) = call(
        &app,
        "POST",
        &pay_uri,
        Some(cashier.as_str()),
        Some(json!({ "method": "e_wallet" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "PAYMENT_ALREADY_MADE");

    let (status, slip) = raw(
        &app,
        "GET",
        &format!("/api/transactions/{tx_id}/receipt?format=text"),
        Some(cashier.as_str()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let slip = String::from_utf8(slip).unwrap();
    assert!(slip.contains("Gel Pen"));
    assert!(slip.contains("RM 5.30"));

    let (status, alerts) = call(&app, "GET", "/api/alerts?status=active", Some(manager.as_str()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(alerts.as_array().map(Vec::len), Some(1));

    let (status, summary) = call(
        &app,
        "GET",
        "/api/reports/summary?period=today",
        Some(manager.as_str()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["transactions"], 1);
    assert_eq!(summary["revenue_cents"], 530);

    let (status, _) = call(&app, "GET", "/api/reports/summary", Some(cashier.as_str()), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    for f in files {
        let _ = std::fs::remove_file(f);
    }
}

#[tokio::test]
async fn auth_and_body_limit_errors_use_the_api_shape() {
    let (app, files) = test_app("errors").await;

    let (status, body) = call(&app, "GET", "/api/cart", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let (status, body) = call(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": "nobody@shop.my", "password": "whatever!1" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["message"], "Invalid email or password");

    let oversized = "a".repeat(inventrack::router::BODY_LIMIT_BYTES + 1024);
    let (status, body) = call(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": oversized, "password": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"]["code"], "PAYLOAD_TOO_LARGE");

    let (status, body) = call(&app, "GET", "/healthz", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    for f in files {
        let _ = std::fs::remove_file(f);
    }
}
