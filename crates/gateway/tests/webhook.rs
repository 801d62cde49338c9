//! Integration tests for the webhook intake route.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use {
    ombud_gateway::server::{AppState, app},
    ombud_queue::WaitingQueue,
    ombud_routing::{Outbound, Router, RouterConfig},
    ombud_sessions::SessionManager,
    ombud_telegram::TelegramOutbound,
    sqlx::SqlitePool,
    teloxide::Bot,
};

const SECRET: &str = "s3cret";

async fn start_server() -> (SocketAddr, SqlitePool) {
    let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
    ombud_directory::init_schema(&pool).await.unwrap();
    ombud_messages::init_schema(&pool).await.unwrap();
    ombud_auto_reply::AutoReplyStore::init(&pool).await.unwrap();
    WaitingQueue::init(&pool).await.unwrap();
    SessionManager::init(&pool).await.unwrap();

    let bot = Bot::new("123456:TEST");
    let sessions = Arc::new(SessionManager::new(pool.clone()));
    let outbound = Arc::new(TelegramOutbound::new(bot.clone())) as Arc<dyn Outbound>;
    let router = Arc::new(Router::new(
        pool.clone(),
        sessions,
        outbound,
        RouterConfig::new([999]),
    ));

    let state = AppState {
        bot,
        router,
        upload_dir: PathBuf::from("./uploads"),
        webhook_secret: SECRET.to_string(),
    };

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app(state)).await.unwrap();
    });

    (addr, pool)
}

fn text_update(user_id: i64, username: &str, text: &str) -> serde_json::Value {
    serde_json::json!({
        "update_id": 1,
        "message": {
            "message_id": 1,
            "date": 1700000000,
            "chat": { "id": user_id, "type": "private", "first_name": "Test" },
            "from": {
                "id": user_id,
                "is_bot": false,
                "first_name": "Test",
                "username": username
            },
            "text": text
        }
    })
}

#[tokio::test]
async fn health_route_answers() {
    let (addr, _pool) = start_server().await;

    let response = reqwest::get(format!("http://{addr}/")).await.unwrap();
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn wrong_secret_is_forbidden() {
    let (addr, _pool) = start_server().await;

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/webhook/not-the-secret"))
        .json(&text_update(5, "eve", "hello"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 403);
}

#[tokio::test]
async fn undecodable_update_answers_ok_false() {
    let (addr, _pool) = start_server().await;

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/webhook/{SECRET}"))
        .json(&serde_json::json!({ "not": "an update" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["ok"], false);
}

#[tokio::test]
async fn text_update_flows_into_the_queue() {
    let (addr, pool) = start_server().await;

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/webhook/{SECRET}"))
        .json(&text_update(5, "eve", "hello"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["ok"], true);

    assert_eq!(WaitingQueue::new(pool).len().await.unwrap(), 1);
}
