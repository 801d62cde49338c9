//! Normalization of raw Telegram messages into platform-neutral events.

use std::path::Path;

use {
    teloxide::{
        prelude::*,
        types::{ChatKind as TgChatKind, MediaKind, MessageKind},
    },
    tracing::{debug, warn},
};

use {
    crate::{Error, Result},
    ombud_common::{
        now_ms,
        types::{ChatInfo, ChatKind, ContentPayload, InboundMessage, Sender},
    },
};

/// Convert a Telegram message into an [`InboundMessage`], or `None` when
/// the message carries nothing the relay handles (stickers, polls,
/// service messages, bot-originated chatter).
#[must_use]
pub fn normalize(msg: &Message) -> Option<InboundMessage> {
    let from = msg.from.as_ref()?;
    if from.is_bot {
        return None;
    }

    let payload = extract_payload(msg)?;
    let (kind, title) = match &msg.chat.kind {
        TgChatKind::Private(_) => (ChatKind::Private, None),
        TgChatKind::Public(public) => (ChatKind::Group, public.title.clone()),
    };

    let display_name = Some(from.full_name()).filter(|name| !name.is_empty());

    Some(InboundMessage {
        sender: Sender {
            platform_id: i64::try_from(from.id.0).ok()?,
            username: from.username.clone(),
            display_name,
        },
        chat: ChatInfo {
            platform_id: msg.chat.id.0,
            kind,
            title,
        },
        payload,
        media_path: None,
    })
}

fn extract_payload(msg: &Message) -> Option<ContentPayload> {
    let MessageKind::Common(common) = &msg.kind else {
        return None;
    };

    match &common.media_kind {
        MediaKind::Text(text) => Some(ContentPayload::text(&text.text)),
        // The photo array is sorted by size; the last entry is the largest.
        MediaKind::Photo(photo) => photo.photo.last().map(|size| ContentPayload::Photo {
            file_id: size.file.id.clone(),
            caption: photo.caption.clone(),
        }),
        MediaKind::Video(video) => Some(ContentPayload::Video {
            file_id: video.video.file.id.clone(),
            caption: video.caption.clone(),
        }),
        MediaKind::Voice(voice) => Some(ContentPayload::Voice {
            file_id: voice.voice.file.id.clone(),
            caption: voice.caption.clone(),
        }),
        MediaKind::Document(doc) => Some(ContentPayload::Document {
            file_id: doc.document.file.id.clone(),
            caption: doc.caption.clone(),
        }),
        _ => None,
    }
}

/// Download the payload's media into `upload_dir` and return the stored
/// path. Best effort: a failed download degrades to a record without a
/// local copy and is never fatal for the message itself.
pub async fn download_media(
    bot: &Bot,
    upload_dir: &Path,
    payload: &ContentPayload,
) -> Option<String> {
    let file_id = payload.file_id()?;
    match fetch_and_store(bot, upload_dir, file_id, payload.content_type()).await {
        Ok(path) => {
            debug!(file_id, path, "stored inbound media");
            Some(path)
        },
        Err(e) => {
            warn!(file_id, error = %e, "media download failed");
            None
        },
    }
}

async fn fetch_and_store(
    bot: &Bot,
    upload_dir: &Path,
    file_id: &str,
    content_type: &str,
) -> Result<String> {
    let file = bot.get_file(file_id.to_string()).await?;

    // Telegram file URL format: https://api.telegram.org/file/bot<token>/<path>
    let url = format!(
        "https://api.telegram.org/file/bot{}/{}",
        bot.token(),
        file.path
    );
    let response = reqwest::get(&url).await?;
    if !response.status().is_success() {
        return Err(Error::message(format!(
            "file download returned HTTP {}",
            response.status()
        )));
    }
    let bytes = response.bytes().await?;

    let extension = match content_type {
        "photo" => "jpg",
        "voice" => "ogg",
        "video" => "mp4",
        _ => "bin",
    };
    let name = format!("{}_{}.{extension}", now_ms(), sanitize(file_id));
    let path = upload_dir.join(name);

    tokio::fs::create_dir_all(upload_dir).await?;
    tokio::fs::write(&path, &bytes).await?;

    Ok(path.to_string_lossy().into_owned())
}

/// File ids are base64-ish but not guaranteed path-safe.
fn sanitize(file_id: &str) -> String {
    file_id
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(24)
        .collect()
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_path_hostile_characters() {
        assert_eq!(sanitize("AgAC../..//zz"), "AgACzz");
    }

    #[test]
    fn sanitize_truncates_long_ids() {
        let long = "a".repeat(100);
        assert_eq!(sanitize(&long).len(), 24);
    }
}
