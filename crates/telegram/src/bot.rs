use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use {
    teloxide::{
        ApiError, RequestError,
        prelude::*,
        types::{AllowedUpdate, BotCommand, UpdateKind},
    },
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info, warn},
};

use {crate::inbound, ombud_routing::Router};

/// Start the manual long-polling loop.
///
/// Spawns a background task that processes updates until the returned
/// `CancellationToken` is cancelled. Deletes any configured webhook first
/// so long polling works.
pub async fn start_polling(
    bot: Bot,
    router: Arc<Router>,
    upload_dir: PathBuf,
) -> anyhow::Result<CancellationToken> {
    let me = bot.get_me().await?;
    bot.delete_webhook().send().await?;
    register_commands(&bot).await;

    info!(username = ?me.username, "telegram bot connected (webhook cleared)");

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();

    tokio::spawn(async move {
        info!("starting telegram manual polling loop");
        let mut offset: i32 = 0;

        loop {
            if cancel_clone.is_cancelled() {
                info!("telegram polling stopped");
                break;
            }

            let result = bot
                .get_updates()
                .offset(offset)
                .timeout(30)
                .allowed_updates(vec![AllowedUpdate::Message])
                .await;

            match result {
                Ok(updates) => {
                    debug!(count = updates.len(), "got telegram updates");
                    for update in updates {
                        offset = update.id.as_offset();
                        process_update(&bot, &router, &upload_dir, update).await;
                    }
                },
                Err(e) => {
                    // Another process is polling with the same token; this
                    // loop can never win, so stop instead of fighting.
                    if matches!(&e, RequestError::Api(ApiError::TerminatedByOtherGetUpdates)) {
                        warn!("another instance is already polling with this token; stopping");
                        cancel_clone.cancel();
                        break;
                    }
                    warn!(error = %e, "telegram getUpdates failed");
                    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                },
            }
        }
    });

    Ok(cancel)
}

/// Feed one update through the router. Shared by the polling loop and the
/// webhook route. Per-update errors are logged, never propagated: one bad
/// update must not take down the intake path.
pub async fn process_update(bot: &Bot, router: &Router, upload_dir: &Path, update: Update) {
    let UpdateKind::Message(msg) = update.kind else {
        debug!("ignoring non-message update");
        return;
    };

    let Some(mut inbound) = inbound::normalize(&msg) else {
        debug!(chat_id = msg.chat.id.0, "ignoring unsupported message");
        return;
    };

    if inbound.payload.file_id().is_some() {
        inbound.media_path = inbound::download_media(bot, upload_dir, &inbound.payload).await;
    }

    if let Err(e) = router.handle_inbound(&inbound).await {
        error!(chat_id = msg.chat.id.0, error = %e, "failed to route telegram message");
    }
}

/// Register slash commands for autocomplete in Telegram clients.
async fn register_commands(bot: &Bot) {
    let commands = vec![
        BotCommand::new("help", "Show available commands"),
        BotCommand::new("live", "Start a live session with a user"),
        BotCommand::new("end", "End the live session"),
        BotCommand::new("view", "View a user's chat history"),
        BotCommand::new("users", "List users with unread counts"),
        BotCommand::new("groups", "List known groups"),
        BotCommand::new("broadcast", "Send a message to every user"),
        BotCommand::new("replies", "Manage auto-replies"),
    ];
    if let Err(e) = bot.set_my_commands(commands).await {
        warn!("failed to register bot commands: {e}");
    }
}
