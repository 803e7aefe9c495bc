//! Command handlers
//!
//! Each handler takes the server state, the invoking connection and the
//! parsed arguments. Refusals are returned as `CommandError` and turned into
//! numerics by the dispatcher; handlers that act on lists of targets report
//! per-target errors themselves and keep going.

pub mod channel;
pub mod messaging;
pub mod misc;
pub mod mode;
pub mod oper;
pub mod registration;

use crate::server::ServerState;
use crate::types::ClientId;

/// `nick!user@host` of a connection (empty if it is gone)
fn prefix_of(state: &ServerState, client_id: ClientId) -> String {
    state
        .registry
        .user(client_id)
        .map(|u| u.prefix())
        .unwrap_or_default()
}

/// Current nickname of a connection (empty if it is gone)
fn nick_of(state: &ServerState, client_id: ClientId) -> String {
    state
        .registry
        .user(client_id)
        .map(|u| u.nickname.clone())
        .unwrap_or_default()
}

fn is_operator(state: &ServerState, client_id: ClientId) -> bool {
    state
        .registry
        .user(client_id)
        .is_some_and(|u| u.is_operator())
}
