//! Webhook and health endpoints.
//!
//! The bridge posts events to `/webhook/*`; each one is handled on its own task
//! so the bridge never waits for a handler.

use crate::{
    data::State,
    event_handler::{BridgeEvent, event_handler},
    whatsapp::{InboundMessage, ParticipantUpdate},
};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State as AxumState},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
};
use blacksky_traits::ForwardRefToTracing;
use color_eyre::eyre::{Result, WrapErr};
use serde_json::{Value, json};
use std::{future::Future, sync::Arc};

type Rejection = (StatusCode, Json<Value>);

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

/// `None` when the request may pass. No configured secret lets everything through.
fn check_auth(headers: &HeaderMap, secret: Option<&str>) -> Option<Rejection> {
    let secret = secret?;

    let token = headers
        .get("authorization")
        .and_then(|header| header.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    match token {
        Some(token) if constant_time_eq(token, secret) => None,
        Some(_) => Some((
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "invalid token"})),
        )),
        None => Some((
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "missing Authorization header"})),
        )),
    }
}

async fn root(AxumState(state): AxumState<State>) -> Json<Value> {
    let bot_name = state.config.read().await.bot_name.clone();
    Json(json!({"name": bot_name, "status": "running"}))
}

async fn health(AxumState(state): AxumState<State>) -> Json<Value> {
    let whatsapp = if state.transport.is_connected().await {
        "connected"
    } else {
        "disconnected"
    };

    Json(json!({
        "status": "ok",
        "uptime_secs": state.started_at.elapsed().as_secs(),
        "whatsapp": whatsapp,
    }))
}

fn accept(state: &State, headers: &HeaderMap, event: BridgeEvent) -> Result<Json<Value>, Rejection> {
    if let Some(rejection) = check_auth(headers, state.secrets.bridge_secret.as_deref()) {
        tracing::warn!("rejected webhook call: {}", rejection.1.0);
        return Err(rejection);
    }

    let state = Arc::clone(state);
    tokio::spawn(async move { event_handler(state, event).await.trace_err_ok() });

    Ok(Json(json!({"status": "accepted"})))
}

async fn messages(
    AxumState(state): AxumState<State>,
    headers: HeaderMap,
    Json(message): Json<InboundMessage>,
) -> Result<Json<Value>, Rejection> {
    accept(&state, &headers, BridgeEvent::Message(message))
}

async fn participants(
    AxumState(state): AxumState<State>,
    headers: HeaderMap,
    Json(update): Json<ParticipantUpdate>,
) -> Result<Json<Value>, Rejection> {
    accept(&state, &headers, BridgeEvent::Participants(update))
}

pub fn router(state: State) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/webhook/messages", post(messages))
        .route("/webhook/group-participants", post(participants))
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .with_state(state)
}

/// Serves until `shutdown` resolves.
pub async fn serve(state: State, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
    let address = state.config.read().await.bind_address.clone();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .wrap_err_with(|| format!("Failed to bind to {address}"))?;

    tracing::info!("listening on {address}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .wrap_err("Server error")
}
