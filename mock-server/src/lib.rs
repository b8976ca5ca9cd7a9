use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{debug, info};
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "session";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
}

#[derive(Deserialize)]
pub struct Login {
    pub name: String,
}

#[derive(Clone, Default)]
pub struct AppState {
    users: Arc<RwLock<HashMap<u64, User>>>,
    sessions: Arc<RwLock<HashSet<String>>>,
    hits: Arc<AtomicU64>,
}

impl AppState {
    fn seeded() -> Self {
        let users = [(1, "Ada"), (2, "Grace")]
            .into_iter()
            .map(|(id, name)| {
                (
                    id,
                    User {
                        id,
                        name: name.to_string(),
                    },
                )
            })
            .collect();
        Self {
            users: Arc::new(RwLock::new(users)),
            ..Self::default()
        }
    }
}

pub fn app() -> Router {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/{id}", get(get_user))
        .route("/json", get(json_value))
        .route("/missing", get(missing))
        .route("/broken", get(broken))
        .route("/login", post(login))
        .route("/me", get(me))
        .route("/echo", post(echo))
        .route("/hits", get(hits))
        .with_state(AppState::seeded())
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "mock server listening");
    }
    axum::serve(listener, app()).await
}

async fn list_users(State(state): State<AppState>) -> Json<Vec<User>> {
    let users = state.users.read().await;
    let mut list: Vec<User> = users.values().cloned().collect();
    list.sort_by_key(|u| u.id);
    Json(list)
}

async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<User>, (StatusCode, &'static str)> {
    let users = state.users.read().await;
    users
        .get(&id)
        .cloned()
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, "not found"))
}

async fn json_value() -> Json<Value> {
    Json(json!({ "a": 1 }))
}

async fn missing() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "not found")
}

/// 500 with an empty body, so clients fall back to the reason phrase.
async fn broken() -> StatusCode {
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn login(State(state): State<AppState>, Json(input): Json<Login>) -> Response {
    let token = Uuid::new_v4().to_string();
    state.sessions.write().await.insert(token.clone());
    debug!(name = %input.name, "session opened");
    (
        [(
            header::SET_COOKIE,
            format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly"),
        )],
        Json(json!({ "name": input.name })),
    )
        .into_response()
}

async fn me(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let authorized = match session_token(&headers) {
        Some(token) => state.sessions.read().await.contains(&token),
        None => false,
    };
    if authorized {
        Json(json!({ "authenticated": true })).into_response()
    } else {
        (StatusCode::UNAUTHORIZED, "Unauthorized").into_response()
    }
}

/// Echo the JSON body together with the request headers the client sent.
async fn echo(headers: HeaderMap, body: String) -> Json<Value> {
    let headers: serde_json::Map<String, Value> = headers
        .iter()
        .filter_map(|(k, v)| {
            v.to_str()
                .ok()
                .map(|v| (k.as_str().to_string(), Value::String(v.to_string())))
        })
        .collect();
    let body = serde_json::from_str::<Value>(&body).unwrap_or(Value::String(body));
    Json(json!({ "body": body, "headers": headers }))
}

async fn hits(State(state): State<AppState>) -> Json<Value> {
    let n = state.hits.fetch_add(1, Ordering::SeqCst) + 1;
    Json(json!({ "hits": n }))
}

fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
}
