//! Message-shape types shared between the router, the stores, and the
//! platform adapter.

use serde::{Deserialize, Serialize};

/// What kind of chat an inbound message arrived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatKind {
    Private,
    Group,
}

/// The sender of an inbound message, as reported by the platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sender {
    /// Platform-assigned numeric id (Telegram user id).
    pub platform_id: i64,
    pub username: Option<String>,
    pub display_name: Option<String>,
}

impl Sender {
    /// `@username` when known, otherwise the numeric id. Used in forward
    /// prefixes and admin-facing listings.
    #[must_use]
    pub fn handle(&self) -> String {
        match &self.username {
            Some(name) => format!("@{name}"),
            None => self.platform_id.to_string(),
        }
    }
}

/// The chat an inbound message arrived in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatInfo {
    pub platform_id: i64,
    pub kind: ChatKind,
    /// Group title; absent for private chats.
    pub title: Option<String>,
}

/// One inbound event, normalized away from the wire protocol.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub sender: Sender,
    pub chat: ChatInfo,
    pub payload: ContentPayload,
    /// Local path the media was downloaded to, if any. `None` when the
    /// message has no media or the download failed ("unavailable").
    pub media_path: Option<String>,
}

/// Content of a message as one tagged union, so every forwarding site
/// dispatches once instead of re-branching on content type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentPayload {
    Text {
        text: String,
    },
    Photo {
        file_id: String,
        caption: Option<String>,
    },
    Video {
        file_id: String,
        caption: Option<String>,
    },
    Voice {
        file_id: String,
        caption: Option<String>,
    },
    Document {
        file_id: String,
        caption: Option<String>,
    },
}

impl ContentPayload {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// The textual part: the text itself, or the media caption.
    #[must_use]
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            Self::Photo { caption, .. }
            | Self::Video { caption, .. }
            | Self::Voice { caption, .. }
            | Self::Document { caption, .. } => caption.as_deref(),
        }
    }

    /// Platform media reference, if this payload carries one.
    #[must_use]
    pub fn file_id(&self) -> Option<&str> {
        match self {
            Self::Text { .. } => None,
            Self::Photo { file_id, .. }
            | Self::Video { file_id, .. }
            | Self::Voice { file_id, .. }
            | Self::Document { file_id, .. } => Some(file_id),
        }
    }

    /// Content-type tag as stored in the message log.
    #[must_use]
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Photo { .. } => "photo",
            Self::Video { .. } => "video",
            Self::Voice { .. } => "voice",
            Self::Document { .. } => "document",
        }
    }

    /// Copy of this payload with `prefix` prepended to the text or caption.
    /// Media payloads with no caption get the prefix as their caption.
    #[must_use]
    pub fn with_prefix(&self, prefix: &str) -> Self {
        fn prepend(prefix: &str, caption: &Option<String>) -> Option<String> {
            Some(match caption {
                Some(c) => format!("{prefix}{c}"),
                None => prefix.to_string(),
            })
        }

        match self {
            Self::Text { text } => Self::Text {
                text: format!("{prefix}{text}"),
            },
            Self::Photo { file_id, caption } => Self::Photo {
                file_id: file_id.clone(),
                caption: prepend(prefix, caption),
            },
            Self::Video { file_id, caption } => Self::Video {
                file_id: file_id.clone(),
                caption: prepend(prefix, caption),
            },
            Self::Voice { file_id, caption } => Self::Voice {
                file_id: file_id.clone(),
                caption: prepend(prefix, caption),
            },
            Self::Document { file_id, caption } => Self::Document {
                file_id: file_id.clone(),
                caption: prepend(prefix, caption),
            },
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_prefers_text_then_caption() {
        let text = ContentPayload::text("hello");
        assert_eq!(text.body(), Some("hello"));

        let photo = ContentPayload::Photo {
            file_id: "f1".into(),
            caption: Some("look".into()),
        };
        assert_eq!(photo.body(), Some("look"));

        let silent = ContentPayload::Voice {
            file_id: "v1".into(),
            caption: None,
        };
        assert_eq!(silent.body(), None);
    }

    #[test]
    fn content_type_tags() {
        assert_eq!(ContentPayload::text("x").content_type(), "text");
        let doc = ContentPayload::Document {
            file_id: "d".into(),
            caption: None,
        };
        assert_eq!(doc.content_type(), "document");
        assert_eq!(doc.file_id(), Some("d"));
    }

    #[test]
    fn with_prefix_prepends_to_text_and_caption() {
        let text = ContentPayload::text("hi").with_prefix("From @a:\n\n");
        assert_eq!(text.body(), Some("From @a:\n\nhi"));

        let photo = ContentPayload::Photo {
            file_id: "f".into(),
            caption: None,
        }
        .with_prefix("From @a:\n\n");
        assert_eq!(photo.body(), Some("From @a:\n\n"));
        assert_eq!(photo.file_id(), Some("f"));
    }

    #[test]
    fn payload_serializes_with_kind_tag() {
        let photo = ContentPayload::Photo {
            file_id: "f1".into(),
            caption: Some("look".into()),
        };
        let value = serde_json::to_value(&photo).unwrap();
        assert_eq!(value["kind"], "photo");
        assert_eq!(value["file_id"], "f1");
    }

    #[test]
    fn sender_handle_falls_back_to_id() {
        let named = Sender {
            platform_id: 7,
            username: Some("alice".into()),
            display_name: None,
        };
        assert_eq!(named.handle(), "@alice");

        let anon = Sender {
            platform_id: 42,
            username: None,
            display_name: None,
        };
        assert_eq!(anon.handle(), "42");
    }
}
