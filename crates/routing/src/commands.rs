/// Admin control commands, parsed from plain message text.
///
/// Commands with an optional argument fall back to an interactive prompt
/// when the argument is omitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    /// `/start`, `/help` — show the command overview.
    Menu,
    /// `/live [@username]` — start a live session.
    Live(Option<String>),
    /// `/groups [page]` — list known groups with their ids.
    Groups(u32),
    /// `/livegroup <id>` — start a live session with a group.
    LiveGroup(Option<i64>),
    /// `/end` — end the live session (hands off to the queue).
    End,
    /// `/view [@username] [page]` — show a page of a user's chat history.
    View { user: Option<String>, page: u32 },
    /// `/delete [@username]` — delete a user's chat history.
    Delete(Option<String>),
    /// `/purgeall` — delete all chat history (asks for confirmation).
    PurgeAll,
    /// `/broadcast` — prompt for a payload to fan out to every user.
    Broadcast,
    /// `/users [page]` — list users with unread counts.
    Users(u32),
    /// `/replies` — list configured auto-replies.
    Replies,
    /// `/addreply` — configure an auto-reply (keyword, then text).
    AddReply,
    /// `/delreply [keyword]` — remove an auto-reply.
    DelReply(Option<String>),
}

impl AdminCommand {
    /// Parse a command from message text. Returns `None` for anything that
    /// isn't a known slash command, which then flows to the live session.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let mut parts = text.split_whitespace();
        let head = parts.next()?;
        if !head.starts_with('/') {
            return None;
        }
        // Telegram clients may append "@botname" to commands in groups.
        let command = head[1..].split('@').next().unwrap_or_default();
        let arg = parts.next().map(str::to_string);
        let second = parts.next();

        Some(match command {
            "start" | "help" => Self::Menu,
            "live" => Self::Live(arg),
            "groups" => Self::Groups(arg.and_then(|a| a.parse().ok()).unwrap_or(1)),
            "livegroup" => Self::LiveGroup(arg.and_then(|a| a.parse().ok())),
            "end" => Self::End,
            "view" => Self::View {
                user: arg,
                page: second.and_then(|p| p.parse().ok()).unwrap_or(1),
            },
            "delete" => Self::Delete(arg),
            "purgeall" => Self::PurgeAll,
            "broadcast" => Self::Broadcast,
            "users" => Self::Users(arg.and_then(|a| a.parse().ok()).unwrap_or(1)),
            "replies" => Self::Replies,
            "addreply" => Self::AddReply,
            "delreply" => Self::DelReply(arg),
            _ => return None,
        })
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_commands() {
        assert_eq!(AdminCommand::parse("/help"), Some(AdminCommand::Menu));
        assert_eq!(AdminCommand::parse("/end"), Some(AdminCommand::End));
        assert_eq!(
            AdminCommand::parse("/live @bob"),
            Some(AdminCommand::Live(Some("@bob".into())))
        );
        assert_eq!(AdminCommand::parse("/live"), Some(AdminCommand::Live(None)));
        assert_eq!(AdminCommand::parse("/users 3"), Some(AdminCommand::Users(3)));
        assert_eq!(AdminCommand::parse("/users"), Some(AdminCommand::Users(1)));
        assert_eq!(
            AdminCommand::parse("/livegroup 7"),
            Some(AdminCommand::LiveGroup(Some(7)))
        );
        assert_eq!(
            AdminCommand::parse("/view @bob 2"),
            Some(AdminCommand::View {
                user: Some("@bob".into()),
                page: 2
            })
        );
    }

    #[test]
    fn strips_bot_mention_suffix() {
        assert_eq!(AdminCommand::parse("/end@ombudbot"), Some(AdminCommand::End));
    }

    #[test]
    fn rejects_non_commands() {
        assert_eq!(AdminCommand::parse("hello"), None);
        assert_eq!(AdminCommand::parse("/frobnicate"), None);
        assert_eq!(AdminCommand::parse(""), None);
    }
}
