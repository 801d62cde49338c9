use {
    sqlx::SqlitePool,
    tokio::sync::Mutex,
    tracing::{debug, info},
};

use {
    crate::{Error, Result},
    ombud_common::now_ms,
    ombud_directory::{Group, GroupDirectory, User, UserDirectory},
    ombud_messages::MessageStore,
    ombud_queue::WaitingQueue,
};

/// Whether a session binds an admin to a user or to a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionType {
    User,
    Group,
}

impl SessionType {
    fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Group => "group",
        }
    }
}

/// The counterparty an active session binds an admin to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counterparty {
    /// Directory row id of a user.
    User(i64),
    /// Directory row id of a group.
    Group(i64),
}

/// One session row, active or historical.
#[derive(Debug, Clone)]
pub struct SessionRow {
    pub id: i64,
    pub admin_id: i64,
    pub session_type: SessionType,
    pub active_user_id: Option<i64>,
    pub active_group_id: Option<i64>,
    pub is_active: bool,
    pub started_at: i64,
    pub ended_at: Option<i64>,
}

impl SessionRow {
    #[must_use]
    pub fn counterparty(&self) -> Option<Counterparty> {
        match self.session_type {
            SessionType::User => self.active_user_id.map(Counterparty::User),
            SessionType::Group => self.active_group_id.map(Counterparty::Group),
        }
    }
}

#[derive(sqlx::FromRow)]
struct RawSessionRow {
    id: i64,
    admin_id: i64,
    session_type: String,
    active_user_id: Option<i64>,
    active_group_id: Option<i64>,
    is_active: bool,
    started_at: i64,
    ended_at: Option<i64>,
}

impl From<RawSessionRow> for SessionRow {
    fn from(r: RawSessionRow) -> Self {
        let session_type = if r.session_type == "group" {
            SessionType::Group
        } else {
            SessionType::User
        };
        Self {
            id: r.id,
            admin_id: r.admin_id,
            session_type,
            active_user_id: r.active_user_id,
            active_group_id: r.active_group_id,
            is_active: r.is_active,
            started_at: r.started_at,
            ended_at: r.ended_at,
        }
    }
}

/// Target of a user-session start: an existing directory row, or a
/// username that may have to be created as a placeholder.
#[derive(Debug, Clone)]
pub enum UserRef {
    Id(i64),
    Username(String),
}

/// Result of starting a user session.
#[derive(Debug, Clone)]
pub struct UserSessionStart {
    pub user: User,
    /// A placeholder row was created because the username was unknown.
    pub created_placeholder: bool,
    /// How many unseen inbound messages were drained (marked seen).
    pub drained: u64,
}

impl UserSessionStart {
    /// Whether the admin can actually deliver to this user right now.
    #[must_use]
    pub fn reachable(&self) -> bool {
        self.user.reachable()
    }
}

/// Result of ending a session.
#[derive(Debug, Clone)]
pub enum EndOutcome {
    /// No active session; nothing to end.
    NothingToEnd,
    /// A group session ended. Group sessions never hand off.
    Ended,
    /// A user session ended and no one was waiting.
    QueueEmpty,
    /// A user session ended and the oldest queued user was promoted into a
    /// fresh session under the same admin, backlog drained.
    HandedOff { user: User, drained: u64 },
}

const SELECT_SESSION: &str = "SELECT id, admin_id, session_type, active_user_id, \
     active_group_id, is_active, started_at, ended_at FROM admin_sessions";

/// Per-admin active-session state machine.
///
/// All mutations run under one mutex so two concurrently processed admin
/// actions can never both observe "no active session" and both activate
/// one. Reads go straight to storage.
pub struct SessionManager {
    pool: SqlitePool,
    users: UserDirectory,
    groups: GroupDirectory,
    messages: MessageStore,
    queue: WaitingQueue,
    lock: Mutex<()>,
}

impl SessionManager {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            users: UserDirectory::new(pool.clone()),
            groups: GroupDirectory::new(pool.clone()),
            messages: MessageStore::new(pool.clone()),
            queue: WaitingQueue::new(pool.clone()),
            pool,
            lock: Mutex::new(()),
        }
    }

    pub async fn init(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS admin_sessions (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                admin_id        INTEGER NOT NULL,
                session_type    TEXT    NOT NULL DEFAULT 'user',
                active_user_id  INTEGER,
                active_group_id INTEGER,
                is_active       INTEGER NOT NULL DEFAULT 0,
                started_at      INTEGER NOT NULL,
                ended_at        INTEGER
            )",
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_admin_sessions_active
             ON admin_sessions (admin_id, is_active)",
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Bind `admin_id` to a user, replacing any current session.
    ///
    /// Resolves the target (creating a placeholder for an unknown
    /// username), removes them from the waiting queue, drains their unseen
    /// backlog, then deactivates-and-activates under the session lock.
    pub async fn start_user_session(
        &self,
        admin_id: i64,
        target: UserRef,
    ) -> Result<UserSessionStart> {
        let (user, created_placeholder) = match target {
            UserRef::Id(id) => (self.users.get(id).await?, false),
            UserRef::Username(name) => {
                let name = name.trim_start_matches('@');
                match self.users.find_by_username(name).await? {
                    Some(user) => (user, false),
                    None => (self.users.create_placeholder(name).await?, true),
                }
            },
        };

        let _guard = self.lock.lock().await;

        self.deactivate(admin_id).await?;
        self.queue.remove(user.id).await?;
        let drained = self.messages.mark_all_seen(user.id).await?;
        self.activate(admin_id, SessionType::User, Some(user.id), None)
            .await?;

        info!(
            admin_id,
            user_id = user.id,
            reachable = user.reachable(),
            drained,
            "user session started"
        );

        Ok(UserSessionStart {
            user,
            created_placeholder,
            drained,
        })
    }

    /// Bind `admin_id` to a group, replacing any current session.
    pub async fn start_group_session(&self, admin_id: i64, group_id: i64) -> Result<Group> {
        let group = self.groups.get(group_id).await?;

        let _guard = self.lock.lock().await;

        self.deactivate(admin_id).await?;
        self.activate(admin_id, SessionType::Group, None, Some(group.id))
            .await?;

        info!(admin_id, group_id = group.id, "group session started");
        Ok(group)
    }

    /// End the admin's active session. Idempotent. A user session hands
    /// off to the oldest queued user, if any.
    pub async fn end_session(&self, admin_id: i64) -> Result<EndOutcome> {
        let _guard = self.lock.lock().await;

        let Some(active) = self.active_session(admin_id).await? else {
            debug!(admin_id, "end_session: nothing to end");
            return Ok(EndOutcome::NothingToEnd);
        };

        self.deactivate(admin_id).await?;
        info!(admin_id, session_id = active.id, "session ended");

        if active.session_type == SessionType::Group {
            return Ok(EndOutcome::Ended);
        }

        let Some(next_user_id) = self.queue.dequeue_oldest().await? else {
            return Ok(EndOutcome::QueueEmpty);
        };

        // The queued user may have been purged since enqueueing; treat that
        // like an empty queue.
        let user = match self.users.get(next_user_id).await {
            Ok(user) => user,
            Err(ombud_directory::Error::UserNotFound(_)) => return Ok(EndOutcome::QueueEmpty),
            Err(e) => return Err(Error::Directory(e)),
        };

        let drained = self.messages.mark_all_seen(user.id).await?;
        self.activate(admin_id, SessionType::User, Some(user.id), None)
            .await?;

        info!(
            admin_id,
            user_id = user.id,
            drained,
            "handed off to next queued user"
        );

        Ok(EndOutcome::HandedOff { user, drained })
    }

    /// Deactivate every active session (used by the purge-all operation).
    pub async fn end_all(&self) -> Result<u64> {
        let _guard = self.lock.lock().await;
        let result = sqlx::query(
            "UPDATE admin_sessions SET is_active = 0, ended_at = ? WHERE is_active = 1",
        )
        .bind(now_ms())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// The admin's current binding, if any. Read-only.
    pub async fn active_counterparty(&self, admin_id: i64) -> Result<Option<Counterparty>> {
        Ok(self
            .active_session(admin_id)
            .await?
            .and_then(|s| s.counterparty()))
    }

    /// The admin (if any) whose active session claims this counterparty.
    ///
    /// Scans active rows for a match: no schema constraint ties a
    /// counterparty to one admin, so this is the invariant being consulted,
    /// not a stored back-reference.
    pub async fn claiming_admin(&self, counterparty: Counterparty) -> Result<Option<i64>> {
        let (session_type, column, id) = match counterparty {
            Counterparty::User(id) => (SessionType::User, "active_user_id", id),
            Counterparty::Group(id) => (SessionType::Group, "active_group_id", id),
        };

        Ok(sqlx::query_scalar::<_, i64>(&format!(
            "SELECT admin_id FROM admin_sessions
             WHERE is_active = 1 AND session_type = ? AND {column} = ?
             LIMIT 1"
        ))
        .bind(session_type.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    /// The admin's active session row, if any.
    pub async fn active_session(&self, admin_id: i64) -> Result<Option<SessionRow>> {
        Ok(sqlx::query_as::<_, RawSessionRow>(&format!(
            "{SELECT_SESSION} WHERE admin_id = ? AND is_active = 1"
        ))
        .bind(admin_id)
        .fetch_optional(&self.pool)
        .await?
        .map(Into::into))
    }

    /// Count of active rows for an admin. Exposed for invariant checks.
    pub async fn active_count(&self, admin_id: i64) -> Result<i64> {
        Ok(sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM admin_sessions WHERE admin_id = ? AND is_active = 1",
        )
        .bind(admin_id)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn deactivate(&self, admin_id: i64) -> Result<()> {
        sqlx::query(
            "UPDATE admin_sessions SET is_active = 0, ended_at = ?
             WHERE admin_id = ? AND is_active = 1",
        )
        .bind(now_ms())
        .bind(admin_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn activate(
        &self,
        admin_id: i64,
        session_type: SessionType,
        user_id: Option<i64>,
        group_id: Option<i64>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO admin_sessions
             (admin_id, session_type, active_user_id, active_group_id, is_active, started_at)
             VALUES (?, ?, ?, ?, 1, ?)",
        )
        .bind(admin_id)
        .bind(session_type.as_str())
        .bind(user_id)
        .bind(group_id)
        .bind(now_ms())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use ombud_common::types::ContentPayload;

    struct Fixture {
        manager: SessionManager,
        users: UserDirectory,
        groups: GroupDirectory,
        messages: MessageStore,
        queue: WaitingQueue,
    }

    async fn fixture() -> Fixture {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        ombud_directory::init_schema(&pool).await.unwrap();
        ombud_messages::init_schema(&pool).await.unwrap();
        WaitingQueue::init(&pool).await.unwrap();
        SessionManager::init(&pool).await.unwrap();
        Fixture {
            manager: SessionManager::new(pool.clone()),
            users: UserDirectory::new(pool.clone()),
            groups: GroupDirectory::new(pool.clone()),
            messages: MessageStore::new(pool.clone()),
            queue: WaitingQueue::new(pool),
        }
    }

    #[tokio::test]
    async fn at_most_one_active_session_per_admin() {
        let fx = fixture().await;
        let a = fx.users.resolve_contact(1, Some("a")).await.unwrap();
        let b = fx.users.resolve_contact(2, Some("b")).await.unwrap();

        fx.manager
            .start_user_session(100, UserRef::Id(a.id))
            .await
            .unwrap();
        fx.manager
            .start_user_session(100, UserRef::Id(b.id))
            .await
            .unwrap();

        assert_eq!(fx.manager.active_count(100).await.unwrap(), 1);

        let active = fx.manager.active_session(100).await.unwrap().unwrap();
        assert_eq!(active.active_user_id, Some(b.id));

        // The replaced session was closed with ended_at set.
        let ended: Vec<(bool, Option<i64>)> = sqlx::query_as(
            "SELECT is_active, ended_at FROM admin_sessions WHERE active_user_id = ?",
        )
        .bind(a.id)
        .fetch_all(&fx.manager.pool)
        .await
        .unwrap();
        assert_eq!(ended.len(), 1);
        assert!(!ended[0].0);
        assert!(ended[0].1.is_some());
    }

    #[tokio::test]
    async fn start_removes_target_from_queue_and_drains_backlog() {
        let fx = fixture().await;
        let u = fx.users.resolve_contact(1, Some("u")).await.unwrap();
        fx.queue.enqueue(u.id).await.unwrap();
        fx.messages
            .record_inbound(u.id, &ContentPayload::text("waiting"), None)
            .await
            .unwrap();

        let start = fx
            .manager
            .start_user_session(100, UserRef::Id(u.id))
            .await
            .unwrap();

        assert_eq!(start.drained, 1);
        assert!(start.reachable());
        assert!(fx.queue.is_empty().await.unwrap());
        assert_eq!(fx.messages.unseen_count(u.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unknown_username_becomes_unreachable_placeholder() {
        let fx = fixture().await;

        let start = fx
            .manager
            .start_user_session(100, UserRef::Username("@alice".into()))
            .await
            .unwrap();

        assert!(start.created_placeholder);
        assert!(!start.reachable());
        assert_eq!(start.user.username.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn end_without_session_is_nothing_to_end() {
        let fx = fixture().await;
        assert!(matches!(
            fx.manager.end_session(100).await.unwrap(),
            EndOutcome::NothingToEnd
        ));
    }

    #[tokio::test]
    async fn end_with_empty_queue_goes_idle() {
        let fx = fixture().await;
        let u = fx.users.resolve_contact(1, None).await.unwrap();
        fx.manager
            .start_user_session(100, UserRef::Id(u.id))
            .await
            .unwrap();

        assert!(matches!(
            fx.manager.end_session(100).await.unwrap(),
            EndOutcome::QueueEmpty
        ));
        assert_eq!(fx.manager.active_count(100).await.unwrap(), 0);
        assert!(
            fx.manager
                .active_counterparty(100)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn handoff_follows_fifo_order_and_drains() {
        let fx = fixture().await;
        let mut queued = Vec::new();
        for (tid, name) in [(1, "a"), (2, "b"), (3, "c")] {
            let u = fx.users.resolve_contact(tid, Some(name)).await.unwrap();
            fx.queue.enqueue(u.id).await.unwrap();
            fx.messages
                .record_inbound(u.id, &ContentPayload::text("hello"), None)
                .await
                .unwrap();
            queued.push(u);
        }

        let live = fx.users.resolve_contact(9, Some("live")).await.unwrap();
        fx.manager
            .start_user_session(100, UserRef::Id(live.id))
            .await
            .unwrap();

        for expected in &queued {
            match fx.manager.end_session(100).await.unwrap() {
                EndOutcome::HandedOff { user, drained } => {
                    assert_eq!(user.id, expected.id);
                    assert_eq!(drained, 1);
                },
                other => panic!("expected handoff, got {other:?}"),
            }
            assert_eq!(fx.manager.active_count(100).await.unwrap(), 1);
        }

        assert!(matches!(
            fx.manager.end_session(100).await.unwrap(),
            EndOutcome::QueueEmpty
        ));
    }

    #[tokio::test]
    async fn explicit_selection_skips_queue_then_handoff_resumes() {
        let fx = fixture().await;
        let x = fx.users.resolve_contact(1, Some("x")).await.unwrap();
        let y = fx.users.resolve_contact(2, Some("y")).await.unwrap();
        fx.queue.enqueue(x.id).await.unwrap();
        fx.queue.enqueue(y.id).await.unwrap();

        // Admin explicitly picks Y, not the head of the queue.
        fx.manager
            .start_user_session(100, UserRef::Id(y.id))
            .await
            .unwrap();
        assert_eq!(fx.queue.len().await.unwrap(), 1);

        // Ending hands off to X.
        match fx.manager.end_session(100).await.unwrap() {
            EndOutcome::HandedOff { user, .. } => assert_eq!(user.id, x.id),
            other => panic!("expected handoff to x, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn group_sessions_replace_and_never_hand_off() {
        let fx = fixture().await;
        let g = fx.groups.resolve(-500, "Support", None).await.unwrap();
        let u = fx.users.resolve_contact(1, None).await.unwrap();
        fx.queue.enqueue(u.id).await.unwrap();

        fx.manager
            .start_user_session(100, UserRef::Username("someone".into()))
            .await
            .unwrap();
        fx.manager.start_group_session(100, g.id).await.unwrap();

        assert_eq!(fx.manager.active_count(100).await.unwrap(), 1);
        assert_eq!(
            fx.manager.active_counterparty(100).await.unwrap(),
            Some(Counterparty::Group(g.id))
        );

        // Group end leaves the queue alone.
        assert!(matches!(
            fx.manager.end_session(100).await.unwrap(),
            EndOutcome::Ended
        ));
        assert_eq!(fx.queue.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn claiming_admin_scans_active_sessions() {
        let fx = fixture().await;
        let u = fx.users.resolve_contact(1, Some("u")).await.unwrap();
        let g = fx.groups.resolve(-1, "G", None).await.unwrap();

        assert!(
            fx.manager
                .claiming_admin(Counterparty::User(u.id))
                .await
                .unwrap()
                .is_none()
        );

        fx.manager
            .start_user_session(100, UserRef::Id(u.id))
            .await
            .unwrap();
        fx.manager.start_group_session(200, g.id).await.unwrap();

        assert_eq!(
            fx.manager
                .claiming_admin(Counterparty::User(u.id))
                .await
                .unwrap(),
            Some(100)
        );
        assert_eq!(
            fx.manager
                .claiming_admin(Counterparty::Group(g.id))
                .await
                .unwrap(),
            Some(200)
        );

        fx.manager.end_session(100).await.unwrap();
        assert!(
            fx.manager
                .claiming_admin(Counterparty::User(u.id))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn end_all_deactivates_every_admin() {
        let fx = fixture().await;
        let u = fx.users.resolve_contact(1, None).await.unwrap();
        let g = fx.groups.resolve(-1, "G", None).await.unwrap();

        fx.manager
            .start_user_session(100, UserRef::Id(u.id))
            .await
            .unwrap();
        fx.manager.start_group_session(200, g.id).await.unwrap();

        assert_eq!(fx.manager.end_all().await.unwrap(), 2);
        assert_eq!(fx.manager.active_count(100).await.unwrap(), 0);
        assert_eq!(fx.manager.active_count(200).await.unwrap(), 0);
    }
}
