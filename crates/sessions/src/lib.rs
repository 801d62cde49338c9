//! Admin session state machine.
//!
//! Each admin is either idle or live with exactly one counterparty (a user
//! or a group). The central invariant of the whole service lives here: at
//! most one active session row per admin, enforced by a mandatory
//! deactivate-before-activate sequence under one mutex, never detected
//! after the fact.

pub mod error;
pub mod manager;

pub use {
    error::{Error, Result},
    manager::{
        Counterparty, EndOutcome, SessionManager, SessionRow, SessionType, UserRef,
        UserSessionStart,
    },
};
