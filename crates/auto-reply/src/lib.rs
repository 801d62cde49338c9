//! Keyword-triggered canned responses.
//!
//! Used by the router when no admin session claims an inbound message.
//! Matching is case-insensitive substring containment; when several
//! keywords match the same text, the first configured one wins (insertion
//! order, i.e. ascending row id — fixed and tested, not left to chance).

pub mod error;
pub mod matcher;

pub use {
    error::{Error, Result},
    matcher::{AutoReply, AutoReplyStore},
};
