use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
    time::Duration,
};

use {
    sqlx::SqlitePool,
    tokio::sync::Mutex,
    tracing::{debug, info, warn},
};

use {
    crate::{
        Result,
        commands::AdminCommand,
        interactive::Pending,
        outbound::Outbound,
        policy::{AllowAll, ModerationPolicy},
    },
    ombud_auto_reply::AutoReplyStore,
    ombud_common::types::{ChatKind, ContentPayload, InboundMessage},
    ombud_directory::{GroupDirectory, User, UserDirectory},
    ombud_messages::{GroupMessageLog, MessageStore},
    ombud_queue::WaitingQueue,
    ombud_sessions::{Counterparty, EndOutcome, SessionManager, UserRef, UserSessionStart},
};

/// The single decision the router makes for one inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchDecision {
    /// Forwarded live to the admin whose session claims the sender.
    DeliveredToAdmin { admin_id: i64 },
    /// Forwarded live to the admin whose session claims the group.
    DeliveredToGroupAdmin { admin_id: i64 },
    /// No session claims the sender: queued (idempotently), auto-reply
    /// attempted when the message carried text or a caption.
    Queued { newly_queued: bool, auto_replied: bool },
    /// Admin-originated message was consumed (interactive step, command,
    /// or relay through the active session).
    AdminHandled,
    /// Nothing to do.
    NoOp,
}

/// Outcome of a broadcast fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    pub sent: u32,
    pub failed: u32,
}

/// Router configuration, injected at construction and never mutated.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// The fixed set of admin identities.
    pub admin_ids: BTreeSet<i64>,
    /// Inter-send delay during broadcast, respecting the platform's rate
    /// limit.
    pub broadcast_delay: Duration,
}

impl RouterConfig {
    #[must_use]
    pub fn new(admin_ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            admin_ids: admin_ids.into_iter().collect(),
            broadcast_delay: Duration::from_millis(50),
        }
    }
}

const PER_PAGE: u32 = 10;

const HELP_TEXT: &str = "Commands:\n\
    /live @username - start a live session\n\
    /groups [page] - list known groups\n\
    /livegroup id - start a live session with a group\n\
    /end - end the session (next queued user takes over)\n\
    /view @username [page] - show a user's chat history\n\
    /users [page] - list users with unread counts\n\
    /delete @username - delete a user's chat history\n\
    /purgeall - delete all chat history\n\
    /broadcast - send a message to every user\n\
    /replies - list auto-replies\n\
    /addreply - add an auto-reply\n\
    /delreply keyword - delete an auto-reply";

const WELCOME_TEXT: &str =
    "Hello! Send me a message and our support team will get back to you.";

/// Dispatches every inbound event to exactly one destination.
pub struct Router {
    config: RouterConfig,
    users: UserDirectory,
    groups: GroupDirectory,
    messages: MessageStore,
    group_log: GroupMessageLog,
    replies: AutoReplyStore,
    queue: WaitingQueue,
    sessions: Arc<SessionManager>,
    outbound: Arc<dyn Outbound>,
    policy: Arc<dyn ModerationPolicy>,
    interactive: Mutex<HashMap<i64, Pending>>,
}

impl Router {
    pub fn new(
        pool: SqlitePool,
        sessions: Arc<SessionManager>,
        outbound: Arc<dyn Outbound>,
        config: RouterConfig,
    ) -> Self {
        Self {
            config,
            users: UserDirectory::new(pool.clone()),
            groups: GroupDirectory::new(pool.clone()),
            messages: MessageStore::new(pool.clone()),
            group_log: GroupMessageLog::new(pool.clone()),
            replies: AutoReplyStore::new(pool.clone()),
            queue: WaitingQueue::new(pool),
            sessions,
            outbound,
            policy: Arc::new(AllowAll),
            interactive: Mutex::new(HashMap::new()),
        }
    }

    /// Swap in a moderation policy (mute/ban enforcement).
    #[must_use]
    pub fn with_policy(mut self, policy: Arc<dyn ModerationPolicy>) -> Self {
        self.policy = policy;
        self
    }

    fn is_admin(&self, platform_id: i64) -> bool {
        self.config.admin_ids.contains(&platform_id)
    }

    /// Entry point: route one normalized inbound event.
    pub async fn handle_inbound(&self, msg: &InboundMessage) -> Result<DispatchDecision> {
        match msg.chat.kind {
            ChatKind::Group => self.handle_group_message(msg).await,
            ChatKind::Private if self.is_admin(msg.sender.platform_id) => {
                self.handle_admin_message(msg).await
            },
            ChatKind::Private => self.handle_user_message(msg).await,
        }
    }

    // ── Inbound from a plain user (private chat) ────────────────────────

    async fn handle_user_message(&self, msg: &InboundMessage) -> Result<DispatchDecision> {
        let user = self
            .users
            .resolve_contact(msg.sender.platform_id, msg.sender.username.as_deref())
            .await?;

        if msg.payload.body() == Some("/start") {
            self.reply(msg.chat.platform_id, WELCOME_TEXT).await;
            return Ok(DispatchDecision::NoOp);
        }

        let message_id = self
            .messages
            .record_inbound(user.id, &msg.payload, msg.media_path.as_deref())
            .await?;

        // A claiming session wins outright: no queue, no auto-reply.
        if let Some(admin_id) = self
            .sessions
            .claiming_admin(Counterparty::User(user.id))
            .await?
        {
            self.messages.mark_seen(message_id).await?;
            let prefix = format!("Message from {}:\n\n", msg.sender.handle());
            if let Err(e) = self
                .outbound
                .send_payload(admin_id, &msg.payload.with_prefix(&prefix))
                .await
            {
                warn!(admin_id, user_id = user.id, error = %e, "live forward to admin failed");
            }
            debug!(admin_id, user_id = user.id, "delivered live");
            return Ok(DispatchDecision::DeliveredToAdmin { admin_id });
        }

        let newly_queued = self.queue.enqueue(user.id).await?;
        let mut auto_replied = false;

        // Keyword matching runs on the text or the media caption alike.
        if let Some(text) = msg.payload.body() {
            if let Some(reply) = self.replies.find_match(text).await? {
                let result = match &reply.reply_photo_id {
                    Some(photo) => {
                        self.outbound
                            .send_photo(msg.chat.platform_id, photo, Some(&reply.reply_text))
                            .await
                    },
                    None => {
                        self.outbound
                            .send_text(msg.chat.platform_id, &reply.reply_text)
                            .await
                    },
                };
                match result {
                    Ok(()) => auto_replied = true,
                    Err(e) => {
                        warn!(user_id = user.id, keyword = %reply.keyword, error = %e,
                            "auto-reply send failed")
                    },
                }
            }
        }

        debug!(user_id = user.id, newly_queued, auto_replied, "queued");
        Ok(DispatchDecision::Queued {
            newly_queued,
            auto_replied,
        })
    }

    // ── Inbound from a group chat ───────────────────────────────────────

    async fn handle_group_message(&self, msg: &InboundMessage) -> Result<DispatchDecision> {
        // Group relay is text-only; media chatter is ignored.
        let ContentPayload::Text { text } = &msg.payload else {
            return Ok(DispatchDecision::NoOp);
        };

        let title = msg.chat.title.as_deref().unwrap_or("(untitled)");
        let group = self
            .groups
            .resolve(msg.chat.platform_id, title, None)
            .await?;

        if !self.policy.allows(group.id, msg.sender.platform_id).await {
            return Ok(DispatchDecision::NoOp);
        }

        self.group_log
            .record(
                group.id,
                msg.sender.platform_id,
                msg.sender.username.as_deref(),
                text,
            )
            .await?;

        if let Some(admin_id) = self
            .sessions
            .claiming_admin(Counterparty::Group(group.id))
            .await?
        {
            let line = format!("[{}] {}: {}", group.title, msg.sender.handle(), text);
            if let Err(e) = self.outbound.send_text(admin_id, &line).await {
                warn!(admin_id, group_id = group.id, error = %e, "group forward failed");
            }
            return Ok(DispatchDecision::DeliveredToGroupAdmin { admin_id });
        }

        if text.starts_with("/leaderboard") {
            let board = self.leaderboard_text(group.id, text).await?;
            self.reply(msg.chat.platform_id, &board).await;
        }

        Ok(DispatchDecision::NoOp)
    }

    async fn leaderboard_text(&self, group_id: i64, command: &str) -> Result<String> {
        let (label, days) = if command.contains("day") {
            ("day", 1)
        } else if command.contains("month") {
            ("month", 30)
        } else {
            ("week", 7)
        };
        let since = ombud_common::now_ms() - days * 24 * 60 * 60 * 1000;

        let rows = self.group_log.leaderboard(group_id, since, 10).await?;
        if rows.is_empty() {
            return Ok("No messages in this period.".to_string());
        }

        let mut text = format!("Leaderboard ({label}):\n");
        for (idx, row) in rows.iter().enumerate() {
            let name = row.username.as_deref().unwrap_or("unknown");
            text.push_str(&format!(
                "{}. @{name}: {} messages\n",
                idx + 1,
                row.message_count
            ));
        }
        Ok(text)
    }

    // ── Inbound from an admin (private chat) ────────────────────────────

    async fn handle_admin_message(&self, msg: &InboundMessage) -> Result<DispatchDecision> {
        let admin_id = msg.sender.platform_id;

        // A pending interactive step always takes precedence and is
        // consumed by exactly one reply.
        let pending = self.interactive.lock().await.remove(&admin_id);
        if let Some(pending) = pending {
            self.handle_pending(admin_id, pending, msg).await?;
            return Ok(DispatchDecision::AdminHandled);
        }

        if let Some(command) = msg.payload.body().and_then(AdminCommand::parse) {
            self.handle_command(admin_id, command).await?;
            return Ok(DispatchDecision::AdminHandled);
        }

        self.relay_from_admin(admin_id, msg).await?;
        Ok(DispatchDecision::AdminHandled)
    }

    /// Forward free-form admin content through the active session.
    async fn relay_from_admin(&self, admin_id: i64, msg: &InboundMessage) -> Result<()> {
        match self.sessions.active_counterparty(admin_id).await? {
            Some(Counterparty::Group(group_id)) => {
                let group = self.groups.get(group_id).await?;
                match self
                    .outbound
                    .send_payload(group.telegram_id, &msg.payload)
                    .await
                {
                    Ok(()) => {
                        self.reply(admin_id, &format!("Sent to group: {}", group.title))
                            .await;
                    },
                    Err(e) => {
                        warn!(admin_id, group_id, error = %e, "send to group failed");
                        self.reply(admin_id, &format!("Failed to send to group: {e}"))
                            .await;
                    },
                }
            },
            Some(Counterparty::User(user_id)) => {
                let user = self.users.get(user_id).await?;
                // Persist first; delivery failure never rolls this back.
                self.messages.record_outbound(user.id, &msg.payload).await?;

                match user.telegram_id {
                    None => {
                        self.reply(
                            admin_id,
                            &format!(
                                "Saved for {}, but they have not contacted the bot yet, \
                                 so it cannot be delivered until they do.",
                                user.handle()
                            ),
                        )
                        .await;
                    },
                    Some(chat_id) => match self.outbound.send_payload(chat_id, &msg.payload).await
                    {
                        Ok(()) => self.reply(admin_id, "Sent.").await,
                        Err(e) => {
                            warn!(admin_id, user_id, error = %e, "send to user failed");
                            self.reply(admin_id, &format!("Failed to send: {e}")).await;
                        },
                    },
                }
            },
            None => {
                self.reply(
                    admin_id,
                    "No active session. Use /live @username to start one.",
                )
                .await;
            },
        }
        Ok(())
    }

    async fn handle_command(&self, admin_id: i64, command: AdminCommand) -> Result<()> {
        match command {
            AdminCommand::Menu => self.reply(admin_id, HELP_TEXT).await,
            AdminCommand::Live(Some(name)) => self.start_live(admin_id, &name).await?,
            AdminCommand::Live(None) => {
                self.prompt(admin_id, Pending::UsernameForLive, "Send the username to go live with:")
                    .await;
            },
            AdminCommand::Groups(page) => self.list_groups(admin_id, page).await?,
            AdminCommand::LiveGroup(Some(group_id)) => {
                self.start_live_group(admin_id, group_id).await?;
            },
            AdminCommand::LiveGroup(None) => {
                self.reply(admin_id, "Usage: /livegroup <id> (see /groups).").await;
            },
            AdminCommand::End => self.end_live(admin_id).await?,
            AdminCommand::View {
                user: Some(name),
                page,
            } => self.view_history(admin_id, &name, page).await?,
            AdminCommand::View { user: None, .. } => {
                self.prompt(admin_id, Pending::UsernameForView, "Send the username to view:")
                    .await;
            },
            AdminCommand::Delete(Some(name)) => self.delete_history(admin_id, &name).await?,
            AdminCommand::Delete(None) => {
                self.prompt(admin_id, Pending::UsernameForDelete, "Send the username to delete:")
                    .await;
            },
            AdminCommand::PurgeAll => {
                self.prompt(
                    admin_id,
                    Pending::ConfirmPurgeAll,
                    "This deletes ALL chat history. Send \"yes\" to confirm.",
                )
                .await;
            },
            AdminCommand::Broadcast => {
                self.prompt(
                    admin_id,
                    Pending::BroadcastPayload,
                    "Send the message to broadcast (text or media with caption):",
                )
                .await;
            },
            AdminCommand::Users(page) => self.list_users(admin_id, page).await?,
            AdminCommand::Replies => self.list_replies(admin_id).await?,
            AdminCommand::AddReply => {
                self.prompt(admin_id, Pending::Keyword, "Send the keyword for the auto-reply:")
                    .await;
            },
            AdminCommand::DelReply(Some(keyword)) => {
                self.delete_reply(admin_id, &keyword).await?;
            },
            AdminCommand::DelReply(None) => {
                self.prompt(admin_id, Pending::DeleteKeyword, "Send the keyword to delete:")
                    .await;
            },
        }
        Ok(())
    }

    async fn handle_pending(
        &self,
        admin_id: i64,
        pending: Pending,
        msg: &InboundMessage,
    ) -> Result<()> {
        let text = msg.payload.body().map(str::trim);

        match pending {
            Pending::UsernameForLive => match text {
                Some(name) if !name.is_empty() => self.start_live(admin_id, name).await?,
                _ => self.reply(admin_id, "Expected a username; cancelled.").await,
            },
            Pending::UsernameForView => match text {
                Some(name) if !name.is_empty() => self.view_history(admin_id, name, 1).await?,
                _ => self.reply(admin_id, "Expected a username; cancelled.").await,
            },
            Pending::UsernameForDelete => match text {
                Some(name) if !name.is_empty() => self.delete_history(admin_id, name).await?,
                _ => self.reply(admin_id, "Expected a username; cancelled.").await,
            },
            Pending::BroadcastPayload => {
                let report = self.broadcast(&msg.payload).await?;
                self.reply(
                    admin_id,
                    &format!(
                        "Broadcast complete. Sent: {}, failed: {}.",
                        report.sent, report.failed
                    ),
                )
                .await;
            },
            Pending::Keyword => match text {
                Some(keyword) if !keyword.is_empty() => {
                    // Two-step chain: keyword first, reply text next.
                    self.prompt(
                        admin_id,
                        Pending::ReplyText {
                            keyword: keyword.to_string(),
                        },
                        "Now send the reply text (or a photo with caption):",
                    )
                    .await;
                },
                _ => self.reply(admin_id, "Expected a keyword; cancelled.").await,
            },
            Pending::ReplyText { keyword } => {
                let photo = match &msg.payload {
                    ContentPayload::Photo { file_id, .. } => Some(file_id.as_str()),
                    _ => None,
                };
                match (text, photo) {
                    (None, None) => {
                        self.reply(admin_id, "Expected text or a photo; cancelled.")
                            .await;
                    },
                    (reply_text, photo) => {
                        self.replies
                            .upsert(&keyword, reply_text.unwrap_or_default(), photo)
                            .await?;
                        self.reply(
                            admin_id,
                            &format!("Auto-reply configured for \"{keyword}\"."),
                        )
                        .await;
                    },
                }
            },
            Pending::DeleteKeyword => match text {
                Some(keyword) if !keyword.is_empty() => {
                    self.delete_reply(admin_id, keyword).await?;
                },
                _ => self.reply(admin_id, "Expected a keyword; cancelled.").await,
            },
            Pending::ConfirmPurgeAll => {
                if text.is_some_and(|t| t.eq_ignore_ascii_case("yes")) {
                    let purged = self.messages.purge_all().await?;
                    self.queue.clear().await?;
                    self.sessions.end_all().await?;
                    info!(admin_id, purged, "all chat history purged");
                    self.reply(admin_id, "All chat history deleted.").await;
                } else {
                    self.reply(admin_id, "Cancelled.").await;
                }
            },
        }
        Ok(())
    }

    // ── Admin operations ────────────────────────────────────────────────

    /// Start (or replace) a live session with a user by username.
    pub async fn start_live(&self, admin_id: i64, username: &str) -> Result<()> {
        let start: UserSessionStart = self
            .sessions
            .start_user_session(admin_id, UserRef::Username(username.to_string()))
            .await?;

        let handle = start.user.handle();
        let text = if start.reachable() {
            format!(
                "Live session started with {handle}. Messages now relay in real time. \
                 ({} unread drained.)",
                start.drained
            )
        } else {
            format!(
                "Live session started with {handle}. They have not contacted the bot yet, \
                 so your messages will be saved but cannot be delivered until they do."
            )
        };
        self.reply(admin_id, &text).await;
        Ok(())
    }

    /// Bind the admin to a group for live relay.
    pub async fn start_live_group(&self, admin_id: i64, group_id: i64) -> Result<()> {
        use {ombud_directory::Error as DirectoryError, ombud_sessions::Error as SessionError};

        let group = match self.sessions.start_group_session(admin_id, group_id).await {
            Ok(group) => group,
            Err(SessionError::Directory(DirectoryError::GroupNotFound(_))) => {
                self.reply(admin_id, "Group not found. See /groups.").await;
                return Ok(());
            },
            Err(e) => return Err(e.into()),
        };

        self.reply(
            admin_id,
            &format!(
                "Live session started with group: {}. Group messages relay to you; \
                 your messages go to the group.",
                group.title
            ),
        )
        .await;
        Ok(())
    }

    async fn list_groups(&self, admin_id: i64, page: u32) -> Result<()> {
        let (groups, total) = self.groups.list_page(page, PER_PAGE).await?;
        if groups.is_empty() {
            self.reply(admin_id, "No groups found. Add the bot to a group first.")
                .await;
            return Ok(());
        }

        let pages = (total + i64::from(PER_PAGE) - 1) / i64::from(PER_PAGE);
        let mut text = format!("Groups (page {page}/{pages}):\n");
        for group in &groups {
            text.push_str(&format!("{} - {}\n", group.id, group.title));
        }
        text.push_str("Use /livegroup <id> to go live.");
        self.reply(admin_id, &text).await;
        Ok(())
    }

    /// End the admin's session, reporting the handoff outcome.
    pub async fn end_live(&self, admin_id: i64) -> Result<()> {
        let text = match self.sessions.end_session(admin_id).await? {
            EndOutcome::NothingToEnd => "No active session to end.".to_string(),
            EndOutcome::Ended => "Group session ended.".to_string(),
            EndOutcome::QueueEmpty => "Session ended. No users in queue.".to_string(),
            EndOutcome::HandedOff { user, drained } => format!(
                "Session ended. Now live with {} (next in queue, {drained} unread drained).",
                user.handle()
            ),
        };
        self.reply(admin_id, &text).await;
        Ok(())
    }

    async fn view_history(&self, admin_id: i64, username: &str, page: u32) -> Result<()> {
        let Some(user) = self.users.find_by_username(username).await? else {
            self.reply(admin_id, &format!("User {username} not found."))
                .await;
            return Ok(());
        };

        let (records, total) = self.messages.history_page(user.id, page, PER_PAGE).await?;
        if records.is_empty() {
            self.reply(admin_id, "No messages found.").await;
            return Ok(());
        }

        let pages = (total + i64::from(PER_PAGE) - 1) / i64::from(PER_PAGE);
        let mut text = format!("History with {} (page {page}/{pages}):\n", user.handle());
        // Stored newest-first; display oldest-first within the page.
        for record in records.iter().rev() {
            let who = if record.from_admin { "Admin" } else { "User" };
            let when = chrono::DateTime::from_timestamp_millis(record.created_at)
                .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default();
            let body = match record.text.as_deref() {
                Some(t) if record.content_type == "text" => t.to_string(),
                Some(t) => format!("[{}] {t}", record.content_type),
                None => format!("[{}]", record.content_type),
            };
            text.push_str(&format!("[{when}] {who}: {body}\n"));
        }
        self.reply(admin_id, &text).await;
        Ok(())
    }

    async fn delete_history(&self, admin_id: i64, username: &str) -> Result<()> {
        let Some(user) = self.users.find_by_username(username).await? else {
            self.reply(admin_id, &format!("User {username} not found."))
                .await;
            return Ok(());
        };

        let purged = self.messages.purge_user(user.id).await?;
        self.queue.remove(user.id).await?;
        info!(admin_id, user_id = user.id, purged, "user history purged");
        self.reply(
            admin_id,
            &format!("History for {} deleted ({purged} messages).", user.handle()),
        )
        .await;
        Ok(())
    }

    async fn list_users(&self, admin_id: i64, page: u32) -> Result<()> {
        let (users, total) = self.users.list_page(page, PER_PAGE).await?;
        if users.is_empty() {
            self.reply(admin_id, "No users found.").await;
            return Ok(());
        }

        let pages = (total + i64::from(PER_PAGE) - 1) / i64::from(PER_PAGE);
        let mut text = format!("Users (page {page}/{pages}):\n");
        for user in &users {
            let unread = self.messages.unseen_count(user.id).await?;
            text.push_str(&format!("{} - {unread} unread\n", user.handle()));
        }
        self.reply(admin_id, &text).await;
        Ok(())
    }

    async fn list_replies(&self, admin_id: i64) -> Result<()> {
        let replies = self.replies.list().await?;
        if replies.is_empty() {
            self.reply(admin_id, "No auto-replies configured.").await;
            return Ok(());
        }

        let mut text = String::from("Configured auto-replies:\n");
        for reply in &replies {
            text.push_str(&format!("{}: {}\n", reply.keyword, reply.reply_text));
        }
        self.reply(admin_id, &text).await;
        Ok(())
    }

    async fn delete_reply(&self, admin_id: i64, keyword: &str) -> Result<()> {
        let text = if self.replies.delete(keyword).await? {
            format!("Auto-reply \"{keyword}\" deleted.")
        } else {
            format!("No auto-reply found for \"{keyword}\".")
        };
        self.reply(admin_id, &text).await;
        Ok(())
    }

    /// Fan the payload out to every reachable user, independently. One
    /// failure never aborts the rest; sends are paced to respect the
    /// platform rate limit.
    pub async fn broadcast(&self, payload: &ContentPayload) -> Result<BroadcastReport> {
        let recipients: Vec<User> = self.users.reachable().await?;
        let mut report = BroadcastReport { sent: 0, failed: 0 };

        for user in recipients {
            // reachable() guarantees the id is present.
            let Some(chat_id) = user.telegram_id else {
                continue;
            };
            match self.outbound.send_payload(chat_id, payload).await {
                Ok(()) => report.sent += 1,
                Err(e) => {
                    warn!(user_id = user.id, error = %e, "broadcast send failed");
                    report.failed += 1;
                },
            }
            tokio::time::sleep(self.config.broadcast_delay).await;
        }

        info!(sent = report.sent, failed = report.failed, "broadcast complete");
        Ok(report)
    }

    // ── Helpers ─────────────────────────────────────────────────────────

    async fn prompt(&self, admin_id: i64, pending: Pending, text: &str) {
        self.interactive.lock().await.insert(admin_id, pending);
        self.reply(admin_id, text).await;
    }

    /// Best-effort status message back to a chat. Failure is logged only:
    /// status text is never worth failing the event over.
    async fn reply(&self, chat_id: i64, text: &str) {
        if let Err(e) = self.outbound.send_text(chat_id, text).await {
            warn!(chat_id, error = %e, "status reply failed");
        }
    }
}
