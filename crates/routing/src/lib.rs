//! Dispatch decisions for every inbound event.
//!
//! The router composes the session manager, the waiting queue, the
//! auto-reply matcher, and the message log, and decides exactly one
//! destination per message: deliver to the claiming admin, deliver to the
//! group admin, enqueue and maybe auto-reply, or nothing. Admin-originated
//! messages travel the reverse path through the admin's active session,
//! after any pending interactive step.

pub mod commands;
pub mod error;
pub mod interactive;
pub mod outbound;
pub mod policy;
pub mod router;

pub use {
    commands::AdminCommand,
    error::{Error, Result},
    interactive::Pending,
    outbound::Outbound,
    policy::{AllowAll, ModerationPolicy},
    router::{BroadcastReport, DispatchDecision, Router, RouterConfig},
};
