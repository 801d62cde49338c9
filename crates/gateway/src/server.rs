use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use {
    axum::{
        Json,
        extract::{Path, State},
        http::StatusCode,
        response::{IntoResponse, Response},
        routing::{get, post},
    },
    teloxide::{prelude::*, types::Update},
    tracing::{info, warn},
};

use ombud_routing::Router;

/// Shared state for the webhook routes.
#[derive(Clone)]
pub struct AppState {
    pub bot: Bot,
    pub router: Arc<Router>,
    pub upload_dir: PathBuf,
    pub webhook_secret: String,
}

/// Build the axum application: a health route plus the webhook route.
pub fn app(state: AppState) -> axum::Router {
    axum::Router::new()
        .route("/", get(health))
        .route("/webhook/{secret}", post(webhook))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok", "service": "ombud" }))
}

/// `POST /webhook/{secret}` — Telegram update intake.
///
/// The path secret gates the route; a mismatch is a hard 403. Once past
/// the gate, a broken update body answers `{"ok": false}` with status 200
/// so Telegram does not retry an update we can never parse.
async fn webhook(
    State(state): State<AppState>,
    Path(secret): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> Response {
    if secret != state.webhook_secret {
        warn!("webhook called with a bad secret");
        return StatusCode::FORBIDDEN.into_response();
    }

    // teloxide's custom `Update` deserializer misparses when driven by a
    // `serde_json::Value` (it yields `UpdateKind::Error`), so round-trip
    // through a string and parse from that.
    match serde_json::from_str::<Update>(&body.to_string()) {
        Ok(update) => {
            ombud_telegram::process_update(&state.bot, &state.router, &state.upload_dir, update)
                .await;
            Json(serde_json::json!({ "ok": true })).into_response()
        },
        Err(e) => {
            warn!(error = %e, "undecodable webhook update");
            Json(serde_json::json!({ "ok": false })).into_response()
        },
    }
}

/// Point Telegram at our webhook route. The registered URL embeds the
/// secret, so it is never logged.
pub async fn register_webhook(bot: &Bot, base_url: &str, secret: &str) -> anyhow::Result<()> {
    let url = format!("{}/webhook/{secret}", base_url.trim_end_matches('/'));
    bot.set_webhook(reqwest::Url::parse(&url)?).await?;
    info!(base_url, "webhook registered");
    Ok(())
}

/// Bind and serve until the process is stopped.
pub async fn serve(app: axum::Router, port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "webhook server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
