/// A pending multi-step admin operation.
///
/// The router owns one of these per admin (at most). It takes precedence
/// over every other admin-message path and is cleared the moment the
/// matching reply is consumed — never left dangling across two replies,
/// except for the deliberate keyword → reply-text chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pending {
    /// Awaiting a username whose history to show.
    UsernameForView,
    /// Awaiting a username whose history to delete.
    UsernameForDelete,
    /// Awaiting a username to go live with.
    UsernameForLive,
    /// Awaiting the payload to broadcast to every reachable user.
    BroadcastPayload,
    /// Awaiting a new auto-reply keyword.
    Keyword,
    /// Awaiting the reply text (or photo) for this keyword.
    ReplyText { keyword: String },
    /// Awaiting the keyword of the auto-reply to delete.
    DeleteKeyword,
    /// Awaiting a literal "yes" before purging all history.
    ConfirmPurgeAll,
}
