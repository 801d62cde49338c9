use async_trait::async_trait;

/// Gate for group chatter: whether a sender's message in a group should be
/// logged and counted (mute/ban enforcement lives behind this seam).
#[async_trait]
pub trait ModerationPolicy: Send + Sync {
    async fn allows(&self, group_id: i64, sender_id: i64) -> bool;
}

/// Default policy: everything is logged.
pub struct AllowAll;

#[async_trait]
impl ModerationPolicy for AllowAll {
    async fn allows(&self, _group_id: i64, _sender_id: i64) -> bool {
        true
    }
}
