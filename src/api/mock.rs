//! In-process stand-in for the property management API used by tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

#[derive(Clone, Default)]
pub(crate) struct MockState {
    pub logins: Arc<AtomicUsize>,
    pub requests: Arc<AtomicUsize>,
    /// Resource requests still to be answered with 401
    pub unauthorized_remaining: Arc<AtomicUsize>,
    login_response: Arc<Mutex<Option<Value>>>,
    reject_logins: Arc<AtomicBool>,
    html_logins: Arc<AtomicBool>,
}

impl MockState {
    /// Answer every login with `payload` instead of `{"token": "token-N"}`.
    pub fn set_login_response(&self, payload: Value) {
        *self.login_response.lock().unwrap() = Some(payload);
    }

    pub fn reject_logins(&self) {
        self.reject_logins.store(true, Ordering::SeqCst);
    }

    /// Answer logins with 200 and an HTML page.
    pub fn html_logins(&self) {
        self.html_logins.store(true, Ordering::SeqCst);
    }
}

async fn login(State(state): State<MockState>, Json(body): Json<Value>) -> Response {
    let n = state.logins.fetch_add(1, Ordering::SeqCst) + 1;

    if state.reject_logins.load(Ordering::SeqCst) {
        return (StatusCode::FORBIDDEN, "bad credentials").into_response();
    }
    if state.html_logins.load(Ordering::SeqCst) {
        return (StatusCode::OK, "<html>sign in</html>").into_response();
    }
    if body.get("user").is_none() || body.get("password").is_none() {
        return (StatusCode::BAD_REQUEST, "missing credentials").into_response();
    }

    let payload = state
        .login_response
        .lock()
        .unwrap()
        .clone()
        .unwrap_or_else(|| json!({"token": format!("token-{}", n)}));
    Json(payload).into_response()
}

async fn resource(
    State(state): State<MockState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    state.requests.fetch_add(1, Ordering::SeqCst);

    let remaining = state.unauthorized_remaining.load(Ordering::SeqCst);
    if remaining > 0 {
        state
            .unauthorized_remaining
            .store(remaining - 1, Ordering::SeqCst);
        return (StatusCode::UNAUTHORIZED, "token expired").into_response();
    }

    match uri.path() {
        "/api/v2/missing" => (StatusCode::NOT_FOUND, "no such resource").into_response(),
        "/api/v2/not-json" => (StatusCode::OK, "<html>maintenance</html>").into_response(),
        path => {
            let auth = headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string();
            let body = serde_json::from_str::<Value>(&body).unwrap_or(Value::Null);
            Json(json!({
                "method": method.as_str(),
                "path": path,
                "query": uri.query().unwrap_or(""),
                "auth": auth,
                "body": body,
            }))
            .into_response()
        }
    }
}

/// Serve the mock on an ephemeral port and return its base URL.
pub(crate) async fn spawn(state: MockState) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let app = Router::new()
        .route("/api/v2/login", post(login))
        .fallback(resource)
        .with_state(state);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}
