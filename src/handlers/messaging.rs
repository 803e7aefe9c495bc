//! PRIVMSG and NOTICE
//!
//! Targets are a comma-separated list of channels (`#name`) and
//! nicknames. Channel messages go to every member except the sender.
//! NOTICE never produces error replies.

use super::prefix_of;
use crate::command::HandlerResult;
use crate::error::CommandError;
use crate::reply;
use crate::server::ServerState;
use crate::types::{parse_channel_name, ClientId};

pub fn privmsg(state: &mut ServerState, client_id: ClientId, args: &[String]) -> HandlerResult {
    let (targets, text) = split_args(args).ok_or(CommandError::NeedMoreParams("PRIVMSG"))?;
    for target in targets.split(',').filter(|t| !t.is_empty()) {
        if let Err(err) = deliver(state, client_id, "PRIVMSG", target, text) {
            state.reply_error(client_id, &err);
        }
    }
    Ok(())
}

pub fn notice(state: &mut ServerState, client_id: ClientId, args: &[String]) -> HandlerResult {
    let Some((targets, text)) = split_args(args) else {
        return Ok(());
    };
    for target in targets.split(',').filter(|t| !t.is_empty()) {
        let _ = deliver(state, client_id, "NOTICE", target, text);
    }
    Ok(())
}

fn split_args(args: &[String]) -> Option<(&str, &str)> {
    match args {
        [targets, text, ..] if !targets.is_empty() && !text.is_empty() => {
            Some((targets.as_str(), text.as_str()))
        }
        _ => None,
    }
}

fn deliver(
    state: &mut ServerState,
    client_id: ClientId,
    command: &str,
    target: &str,
    text: &str,
) -> HandlerResult {
    let line = reply::command(
        &prefix_of(state, client_id),
        command,
        &format!("{} :{}", target, text),
    );

    if target.starts_with('#') {
        let name = parse_channel_name(target)
            .ok_or_else(|| CommandError::NoSuchChannel(target.to_string()))?;
        let channel = state
            .registry
            .channel(name)
            .ok_or_else(|| CommandError::NoSuchChannel(target.to_string()))?;
        if channel.has_mode('n') && !channel.contains(client_id) {
            return Err(CommandError::CannotSendToChan(target.to_string()));
        }
        state.registry.broadcast(name, &line, Some(client_id));
    } else {
        let recipient = state
            .registry
            .find_by_nick(target)
            .filter(|id| state.registry.user(*id).is_some_and(|u| u.is_registered()))
            .ok_or_else(|| CommandError::NoSuchNick(target.to_string()))?;
        state.registry.send_to(recipient, line);
    }
    Ok(())
}
