//! OPER, KILL, DIE and SET
//!
//! Privileged commands check the invoker's `o` user mode. Denials are
//! logged at warn level and answered with 481.

use tracing::{info, warn};

use super::{is_operator, nick_of};
use crate::command::HandlerResult;
use crate::error::CommandError;
use crate::reply::{self, Numeric, NumericReply};
use crate::server::ServerState;
use crate::types::ClientId;

pub fn oper(state: &mut ServerState, client_id: ClientId, args: &[String]) -> HandlerResult {
    if args.len() < 2 {
        return Err(CommandError::NeedMoreParams("OPER"));
    }
    let nick = nick_of(state, client_id);
    if !state.config.check_operator(&args[0], &args[1]) {
        warn!("Failed OPER attempt as {} by {}", args[0], nick);
        return Err(CommandError::PasswordMismatch);
    }

    let granted = state
        .registry
        .user_mut(client_id)
        .is_some_and(|u| u.set_mode('o', true));
    state.reply(
        client_id,
        NumericReply::new(Numeric::YoureOper, ":You are now an IRC operator"),
    );
    if granted {
        let line = reply::command(&nick, "MODE", &format!("{} :+o", nick));
        state.registry.send_to(client_id, line);
    }
    info!("{} is now an operator ({})", nick, args[0]);
    Ok(())
}

pub fn kill(state: &mut ServerState, client_id: ClientId, args: &[String]) -> HandlerResult {
    let nick = nick_of(state, client_id);
    if !is_operator(state, client_id) {
        warn!("KILL denied for {}: not an operator", nick);
        return Err(CommandError::NoPrivileges);
    }
    let Some(target_nick) = args.first() else {
        return Err(CommandError::NeedMoreParams("KILL"));
    };
    let target = state
        .registry
        .find_by_nick(target_nick)
        .ok_or_else(|| CommandError::NoSuchNick(target_nick.clone()))?;

    let reason = args.get(1).map(String::as_str).unwrap_or("No reason given");
    warn!("{} killed {} ({})", nick, target_nick, reason);
    state.disconnect(target, &format!("Killed ({} ({}))", nick, reason));
    Ok(())
}

pub fn die(state: &mut ServerState, client_id: ClientId, _args: &[String]) -> HandlerResult {
    let nick = nick_of(state, client_id);
    if !is_operator(state, client_id) {
        warn!("DIE denied for {}: not an operator", nick);
        return Err(CommandError::NoPrivileges);
    }
    warn!("DIE issued by {}", nick);
    state.shutdown();
    Ok(())
}

/// `SET REALNAME :text` for anyone; liveness tunables for operators
pub fn set(state: &mut ServerState, client_id: ClientId, args: &[String]) -> HandlerResult {
    let (Some(key), Some(value)) = (args.first(), args.get(1)) else {
        return Err(CommandError::NeedMoreParams("SET"));
    };
    let key = key.to_ascii_uppercase();

    match key.as_str() {
        "REALNAME" => {
            if let Some(user) = state.registry.user_mut(client_id) {
                user.realname = value.clone();
            }
            state.notice(client_id, &format!("REALNAME set to {}", value));
        }
        "PING_INTERVAL" | "PING_TIMEOUT" => {
            let nick = nick_of(state, client_id);
            if !is_operator(state, client_id) {
                warn!("SET {} denied for {}: not an operator", key, nick);
                return Err(CommandError::NoPrivileges);
            }
            let Some(secs) = value.parse::<u64>().ok().filter(|s| *s > 0) else {
                state.notice(client_id, &format!("{} needs a positive number of seconds", key));
                return Ok(());
            };
            if key == "PING_INTERVAL" {
                state.config.ping_interval_secs = secs;
            } else {
                state.config.ping_timeout_secs = secs;
            }
            info!("{} set {} to {}s", nick, key, secs);
            state.notice(client_id, &format!("{} set to {}", key, secs));
        }
        _ => {
            state.notice(client_id, &format!("Unknown SET key {}", key));
        }
    }
    Ok(())
}
