//! PING, PONG and QUIT

use crate::command::HandlerResult;
use crate::error::CommandError;
use crate::reply;
use crate::server::ServerState;
use crate::types::ClientId;

pub fn ping(state: &mut ServerState, client_id: ClientId, args: &[String]) -> HandlerResult {
    let Some(token) = args.first().filter(|t| !t.is_empty()) else {
        return Err(CommandError::NoOrigin);
    };
    let server = state.server_name();
    let line = reply::command(server, "PONG", &format!("{} :{}", server, token));
    state.registry.send_to(client_id, line);
    Ok(())
}

/// No-op: `ServerState::handle_line` already refreshed liveness for
/// this line, which answers any outstanding PING
pub fn pong(_state: &mut ServerState, _client_id: ClientId, _args: &[String]) -> HandlerResult {
    Ok(())
}

pub fn quit(state: &mut ServerState, client_id: ClientId, args: &[String]) -> HandlerResult {
    let reason = match args.first() {
        Some(message) if !message.is_empty() => format!("Quit: {}", message),
        _ => "Client Quit".to_string(),
    };
    state.disconnect(client_id, &reason);
    Ok(())
}
