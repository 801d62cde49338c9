use std::sync::Arc;

use {
    clap::Parser,
    sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use {
    ombud_gateway::ServiceConfig,
    ombud_queue::WaitingQueue,
    ombud_routing::{Outbound, Router, RouterConfig},
    ombud_sessions::SessionManager,
    ombud_telegram::{TelegramConfig, TelegramOutbound},
};

#[derive(Parser)]
#[command(name = "ombud", about = "Ombud — Telegram support relay", version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, default_value_t = false)]
    json_logs: bool,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_ansi(true))
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "ombud starting");

    let config = ServiceConfig::from_env()?;

    let pool = connect(&config.database_url).await?;
    ombud_directory::init_schema(&pool).await?;
    ombud_messages::init_schema(&pool).await?;
    ombud_auto_reply::AutoReplyStore::init(&pool).await?;
    WaitingQueue::init(&pool).await?;
    SessionManager::init(&pool).await?;

    let telegram = TelegramConfig {
        token: config.token.clone(),
        upload_dir: config.upload_dir.clone(),
    };
    let bot = telegram.bot()?;

    let sessions = Arc::new(SessionManager::new(pool.clone()));
    let outbound = Arc::new(TelegramOutbound::new(bot.clone())) as Arc<dyn Outbound>;
    let router = Arc::new(Router::new(
        pool,
        sessions,
        outbound,
        RouterConfig::new(config.admin_ids.iter().copied()),
    ));

    match config.webhook_url.as_deref() {
        Some(base_url) => {
            info!(base_url, port = config.port, "running in webhook mode");
            ombud_gateway::register_webhook(&bot, base_url, &config.webhook_secret).await?;

            let state = ombud_gateway::AppState {
                bot,
                router,
                upload_dir: config.upload_dir.clone(),
                webhook_secret: config.webhook_secret.clone(),
            };
            ombud_gateway::serve(ombud_gateway::app(state), config.port).await?;
        },
        None => {
            info!("running in long-polling mode");
            let cancel =
                ombud_telegram::start_polling(bot, router, config.upload_dir.clone()).await?;

            tokio::signal::ctrl_c().await?;
            info!("shutting down");
            cancel.cancel();
        },
    }

    Ok(())
}

async fn connect(database_url: &str) -> anyhow::Result<sqlx::SqlitePool> {
    let options = database_url
        .parse::<SqliteConnectOptions>()?
        .create_if_missing(true);
    Ok(SqlitePoolOptions::new().connect_with(options).await?)
}
