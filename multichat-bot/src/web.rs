//! HTTP control surface.
//!
//! `POST /send` lets the authority post a message into any channel,
//! authenticated by the shared secret in the body. `GET /` is a
//! placeholder that always answers 404.

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::outbound::{OutboundError, OutboundMessageService};

#[derive(Debug, Default, Deserialize)]
pub struct SendRequest {
    pub message: Option<String>,
    pub key: Option<String>,
    pub channel: Option<String>,
}

pub fn router(service: Arc<OutboundMessageService>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/send", post(send))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

/// Bind `addr` and serve until the task is dropped.
pub async fn serve(addr: &str, service: Arc<OutboundMessageService>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Server running");
    axum::serve(listener, router(service)).await?;
    Ok(())
}

async fn root() -> StatusCode {
    StatusCode::NOT_FOUND
}

async fn send(
    State(service): State<Arc<OutboundMessageService>>,
    body: Result<Json<SendRequest>, JsonRejection>,
) -> Response {
    let Ok(Json(req)) = body else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Invalid request body" })),
        )
            .into_response();
    };

    match service
        .send(req.key.as_deref(), req.channel.as_deref(), req.message.as_deref())
        .await
    {
        Ok(()) => Json(json!({ "status": "Message sent" })).into_response(),
        Err(e) => error_response(e),
    }
}

fn error_response(err: OutboundError) -> Response {
    match err {
        OutboundError::Unauthorized => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": err.to_string() })),
        )
            .into_response(),
        OutboundError::MissingMessage | OutboundError::MissingChannel => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": err.to_string() })),
        )
            .into_response(),
        OutboundError::Send(ref source) => {
            tracing::error!(error = %source, "Failed to send message");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": err.to_string(), "details": source.to_string() })),
            )
                .into_response()
        }
    }
}
