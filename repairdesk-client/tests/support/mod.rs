//! In-process stand-in for the RepairDesk backend.
#![allow(dead_code)]

use std::{
    net::SocketAddr,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use client::{ApiClient, MemoryStorage, SessionEvent, SessionStorage, SessionStore};
use serde_json::{Value, json};
use shared::{
    config::client::{ApiConfig, RefreshPolicy},
    models::UserProfile,
};
use url::Url;

pub const PASSWORD: &str = "pw";
pub const REFRESH_TOKEN: &str = "R1";

/// Mutable backend state plus per-route call counters.
#[derive(Debug, Default)]
pub struct Backend {
    valid_access: Mutex<Vec<String>>,
    staff_access: Mutex<Vec<String>>,
    valid_refresh: Mutex<Option<String>>,
    orders: Mutex<Vec<Value>>,
    issued: AtomicUsize,
    pub login_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub me_calls: AtomicUsize,
    pub orders_calls: AtomicUsize,
    pub logout_calls: AtomicUsize,
    pub anomaly_calls: AtomicUsize,
    pub reject_patches: AtomicBool,
    pub slow_refresh: AtomicBool,
    pub slow_me: AtomicBool,
    pub fail_logout: AtomicBool,
}

impl Backend {
    /// Backend that accepts `R1` for refresh and has two orders on file.
    pub fn new() -> Arc<Self> {
        let backend = Self::default();
        *backend.valid_refresh.lock().unwrap() = Some(REFRESH_TOKEN.to_string());
        *backend.orders.lock().unwrap() = vec![order(1, "PENDING"), order(2, "ON_GOING")];
        Arc::new(backend)
    }

    pub fn accept_access(&self, token: &str) {
        self.valid_access.lock().unwrap().push(token.to_string());
    }

    /// Accept `token` as belonging to an admin account.
    pub fn accept_staff(&self, token: &str) {
        self.accept_access(token);
        self.staff_access.lock().unwrap().push(token.to_string());
    }

    pub fn revoke_refresh(&self) {
        *self.valid_refresh.lock().unwrap() = None;
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        bearer(headers).is_some_and(|token| {
            self.valid_access
                .lock()
                .unwrap()
                .iter()
                .any(|valid| valid == token)
        })
    }

    fn is_staff(&self, headers: &HeaderMap) -> bool {
        bearer(headers).is_some_and(|token| {
            self.staff_access
                .lock()
                .unwrap()
                .iter()
                .any(|valid| valid == token)
        })
    }

    fn issue_access(&self) -> String {
        let next = self.issued.fetch_add(1, Ordering::SeqCst) + 2;
        let token = format!("A{next}");
        self.accept_access(&token);
        token
    }
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

pub fn alice() -> UserProfile {
    serde_json::from_value(user_json()).unwrap()
}

pub fn bob() -> UserProfile {
    serde_json::from_value(json!({
        "id": 2,
        "username": "bob",
        "email": "bob@example.com",
        "is_staff": true
    }))
    .unwrap()
}

fn user_json() -> Value {
    json!({
        "id": 1,
        "username": "alice",
        "email": "alice@example.com",
        "phone": "555-0100",
        "address": "1 Main St",
        "is_staff": false
    })
}

fn order(id: i64, status: &str) -> Value {
    json!({
        "id": id,
        "customer": 1,
        "customer_name": "alice",
        "status": status,
        "total_price": "120.00",
        "created_at": "2024-03-01T10:00:00Z",
        "updated_at": "2024-03-01T10:00:00Z",
        "items": [{
            "id": id * 10,
            "order_name": "Washer",
            "order_details": "Drum does not spin",
            "quantity": 1,
            "price": "120.00",
            "images": null
        }]
    })
}

fn forbidden() -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(json!({"detail": "You do not have permission to perform this action."})),
    )
        .into_response()
}

fn token_not_valid() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "detail": "Given token not valid for any token type",
            "code": "token_not_valid"
        })),
    )
        .into_response()
}

async fn login(State(backend): State<Arc<Backend>>, Json(body): Json<Value>) -> Response {
    backend.login_calls.fetch_add(1, Ordering::SeqCst);
    if body["username"] == "alice" && body["password"] == PASSWORD {
        backend.accept_access("A1");
        Json(json!({"access": "A1", "refresh": REFRESH_TOKEN, "user": user_json()})).into_response()
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "No active account found with the given credentials"})),
        )
            .into_response()
    }
}

async fn refresh(State(backend): State<Arc<Backend>>, Json(body): Json<Value>) -> Response {
    backend.refresh_calls.fetch_add(1, Ordering::SeqCst);
    if backend.slow_refresh.load(Ordering::SeqCst) {
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    let valid = backend.valid_refresh.lock().unwrap().clone();
    match (valid, body["refresh"].as_str()) {
        (Some(valid), Some(sent)) if valid == sent => {
            Json(json!({"access": backend.issue_access()})).into_response()
        }
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "Token is invalid or expired", "code": "token_not_valid"})),
        )
            .into_response(),
    }
}

async fn me(State(backend): State<Arc<Backend>>, headers: HeaderMap) -> Response {
    backend.me_calls.fetch_add(1, Ordering::SeqCst);
    if backend.slow_me.load(Ordering::SeqCst) {
        tokio::time::sleep(Duration::from_millis(300)).await;
    }
    if !backend.authorized(&headers) {
        return token_not_valid();
    }
    let mut user = user_json();
    user["address"] = json!("2 Side St");
    Json(user).into_response()
}

async fn register(Json(body): Json<Value>) -> Response {
    if body["username"] == "alice" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"username": ["A user with that username already exists."]})),
        )
            .into_response();
    }
    (
        StatusCode::CREATED,
        Json(json!({
            "username": body["username"],
            "email": body["email"],
            "phone": body["phone"].as_str().unwrap_or_default(),
            "address": body["address"].as_str().unwrap_or_default()
        })),
    )
        .into_response()
}

async fn logout(
    State(backend): State<Arc<Backend>>,
    headers: HeaderMap,
    Json(_body): Json<Value>,
) -> Response {
    backend.logout_calls.fetch_add(1, Ordering::SeqCst);
    if !backend.authorized(&headers) {
        return token_not_valid();
    }
    if backend.fail_logout.load(Ordering::SeqCst) {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    StatusCode::RESET_CONTENT.into_response()
}

async fn forgot_password(Json(body): Json<Value>) -> Response {
    if body["email"] == "alice@example.com" {
        Json(json!({"message": "Password reset link sent."})).into_response()
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "User with this email does not exist."})),
        )
            .into_response()
    }
}

async fn list_orders(State(backend): State<Arc<Backend>>, headers: HeaderMap) -> Response {
    backend.orders_calls.fetch_add(1, Ordering::SeqCst);
    if !backend.authorized(&headers) {
        return token_not_valid();
    }
    Json(Value::Array(backend.orders.lock().unwrap().clone())).into_response()
}

async fn get_order(
    State(backend): State<Arc<Backend>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Response {
    if !backend.authorized(&headers) {
        return token_not_valid();
    }
    let orders = backend.orders.lock().unwrap();
    match orders.iter().find(|order| order["id"] == id) {
        Some(order) => Json(order.clone()).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({"detail": "Not found."}))).into_response(),
    }
}

async fn update_order(
    State(backend): State<Arc<Backend>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !backend.authorized(&headers) {
        return token_not_valid();
    }
    if backend.reject_patches.load(Ordering::SeqCst) {
        return forbidden();
    }
    if let Some(price) = body.get("total_price") {
        let mut orders = backend.orders.lock().unwrap();
        return match orders.iter_mut().find(|order| order["id"] == id) {
            Some(order) => {
                order["total_price"] = price.clone();
                Json(order.clone()).into_response()
            }
            None => (StatusCode::NOT_FOUND, Json(json!({"detail": "Not found."}))).into_response(),
        };
    }
    if body["status"] == "UNKNOWN" {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"status": ["\"UNKNOWN\" is not a valid choice."]})),
        )
            .into_response();
    }
    set_status(&backend, id, body["status"].clone())
}

async fn cancel_order(
    State(backend): State<Arc<Backend>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Response {
    if !backend.authorized(&headers) {
        return token_not_valid();
    }
    set_status(&backend, id, json!("REJECTED"))
}

fn set_status(backend: &Backend, id: i64, status: Value) -> Response {
    let mut orders = backend.orders.lock().unwrap();
    match orders.iter_mut().find(|order| order["id"] == id) {
        Some(order) => {
            order["status"] = status;
            order["updated_at"] = json!("2024-03-02T09:30:00Z");
            Json(order.clone()).into_response()
        }
        None => (StatusCode::NOT_FOUND, Json(json!({"detail": "Not found."}))).into_response(),
    }
}

async fn reports(State(backend): State<Arc<Backend>>, headers: HeaderMap) -> Response {
    if !backend.authorized(&headers) {
        return token_not_valid();
    }
    if !backend.is_staff(&headers) {
        return forbidden();
    }
    let orders = backend.orders.lock().unwrap();
    let count = |status: &str| orders.iter().filter(|order| order["status"] == status).count();
    let revenue: f64 = orders
        .iter()
        .filter(|order| order["status"] == "COMPLETED")
        .filter_map(|order| order["total_price"].as_str()?.parse::<f64>().ok())
        .sum();
    Json(json!({
        "कुल अर्डर": orders.len(),
        "पूरा भएको": count("COMPLETED"),
        "अस्वीकृत": count("REJECTED"),
        "प्रक्रियामा": count("PENDING"),
        "जम्मा आम्दानी": revenue
    }))
    .into_response()
}

async fn customers(State(backend): State<Arc<Backend>>, headers: HeaderMap) -> Response {
    if !backend.authorized(&headers) {
        return token_not_valid();
    }
    if !backend.is_staff(&headers) {
        return forbidden();
    }
    Json(json!([user_json()])).into_response()
}

async fn staff(State(backend): State<Arc<Backend>>, headers: HeaderMap) -> Response {
    if !backend.authorized(&headers) {
        return token_not_valid();
    }
    if !backend.is_staff(&headers) {
        return forbidden();
    }
    Json(json!([serde_json::to_value(bob()).unwrap()])).into_response()
}

async fn anomaly(State(backend): State<Arc<Backend>>) -> Response {
    backend.anomaly_calls.fetch_add(1, Ordering::SeqCst);
    token_not_valid()
}

pub fn router(backend: Arc<Backend>) -> Router {
    Router::new()
        .route("/api/login/", post(login))
        .route("/api/register/", post(register))
        .route("/api/logout/", post(logout))
        .route("/api/token/refresh/", post(refresh))
        .route("/api/forgot-password/", post(forgot_password))
        .route("/api/user/me/", get(me))
        .route("/api/orders/", get(list_orders))
        .route("/api/orders/reports/", get(reports))
        .route("/api/users/customers/", get(customers))
        .route("/api/users/staff/", get(staff))
        .route("/api/orders/{id}/", get(get_order).patch(update_order))
        .route("/api/orders/{id}/cancel/", post(cancel_order))
        .route("/api/anomaly/", get(anomaly))
        .with_state(backend)
}

/// Serve `backend` on an ephemeral port and return the API base URL.
pub async fn spawn(backend: Arc<Backend>) -> Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(backend)).await.unwrap();
    });
    Url::parse(&format!("http://{addr}/api/")).unwrap()
}

/// Base URL of a port nothing listens on.
pub async fn unreachable_base_url() -> Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    Url::parse(&format!("http://{addr}/api/")).unwrap()
}

pub fn client_with(
    base_url: Url,
    policy: RefreshPolicy,
    storage: Arc<dyn SessionStorage>,
) -> ApiClient {
    let api = ApiConfig {
        base_url,
        timeout_seconds: 5,
        ..ApiConfig::default()
    };
    let session = Arc::new(SessionStore::new(storage));
    ApiClient::new(&api, policy, session).unwrap()
}

pub fn client(base_url: Url) -> ApiClient {
    client_with(
        base_url,
        RefreshPolicy::Independent,
        Arc::new(MemoryStorage::new()),
    )
}

/// Client whose session holds the expired token `A1` and refresh token `R1`.
pub fn expired_session(base_url: Url, policy: RefreshPolicy) -> ApiClient {
    let client = client_with(base_url, policy, Arc::new(MemoryStorage::new()));
    client
        .session()
        .login(alice(), "A1".into(), Some(REFRESH_TOKEN.into()))
        .unwrap();
    client
}

/// Events published so far, without waiting for more.
pub fn drain(events: &mut tokio::sync::broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    std::iter::from_fn(|| events.try_recv().ok()).collect()
}

pub fn logouts(events: &[SessionEvent]) -> usize {
    events
        .iter()
        .filter(|event| **event == SessionEvent::LoggedOut)
        .count()
}
