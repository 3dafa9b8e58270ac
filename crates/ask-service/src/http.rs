use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::context::AppContext;
use crate::gateway::{parse_webhook, WebhookEvent};
use crate::handler::handle_messages;

pub fn router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/handler", post(webhook))
        .route("/status", get(status))
        .with_state(ctx)
}

pub async fn serve(listener: TcpListener, ctx: Arc<AppContext>) -> anyhow::Result<()> {
    info!(addr = %listener.local_addr()?, "server is running");
    axum::serve(listener, router(ctx)).await?;
    Ok(())
}

async fn root() -> &'static str {
    "Hello World!"
}

async fn status(State(ctx): State<Arc<AppContext>>) -> impl IntoResponse {
    Json(ctx.snapshot())
}

async fn webhook(
    State(ctx): State<Arc<AppContext>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> impl IntoResponse {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            warn!(error = %rejection, "rejected webhook body");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "ok": false, "error": rejection.body_text() })),
            );
        }
    };

    match parse_webhook(&payload) {
        WebhookEvent::Lifecycle(event) => {
            if ctx.events.send(event).await.is_err() {
                warn!("lifecycle queue closed");
                return (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(json!({ "ok": false, "error": "supervisor stopped" })),
                );
            }
        }
        WebhookEvent::Messages(data) => {
            let replied = handle_messages(&ctx, &data).await;
            debug!(replied, "messages handled");
        }
        WebhookEvent::Ignored(event) => debug!(%event, "ignored webhook event"),
    }
    (StatusCode::OK, Json(json!({ "ok": true })))
}
