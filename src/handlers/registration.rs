//! PASS, NICK and USER
//!
//! These run before registration. Registration completes as soon as both a
//! nickname and user details are present, at which point the password is
//! checked (if the server has one) and the welcome burst is sent.

use tracing::{info, warn};

use super::prefix_of;
use crate::command::HandlerResult;
use crate::error::CommandError;
use crate::reply;
use crate::server::ServerState;
use crate::types::{is_valid_nickname, ClientId};
use crate::user::Registration;

pub fn pass(state: &mut ServerState, client_id: ClientId, args: &[String]) -> HandlerResult {
    let Some(user) = state.registry.user(client_id) else {
        return Ok(());
    };
    // Only legal before NICK/USER
    if user.registration != Registration::Connected {
        return Err(CommandError::AlreadyRegistered);
    }
    let Some(password) = args.first() else {
        return Err(CommandError::NeedMoreParams("PASS"));
    };

    if let Some(expected) = &state.config.password {
        if expected != password {
            warn!("Client {} sent a wrong password", client_id);
            return Err(CommandError::PasswordMismatch);
        }
    }

    if let Some(user) = state.registry.user_mut(client_id) {
        user.password = Some(password.clone());
        user.registration = Registration::PasswordAccepted;
    }
    Ok(())
}

pub fn nick(state: &mut ServerState, client_id: ClientId, args: &[String]) -> HandlerResult {
    let Some(nick) = args.first().filter(|n| !n.is_empty()) else {
        return Err(CommandError::NoNicknameGiven);
    };
    if !is_valid_nickname(nick) {
        return Err(CommandError::ErroneousNickname(nick.clone()));
    }
    let Some(user) = state.registry.user(client_id) else {
        return Ok(());
    };
    if user.nickname == *nick {
        return Ok(());
    }
    let registered = user.is_registered();
    let old_prefix = user.prefix();

    let old = state.registry.set_nickname(client_id, nick)?;

    if registered {
        let line = reply::command(&old_prefix, "NICK", &format!(":{}", nick));
        state.registry.send_to(client_id, line.clone());
        state.registry.send_to_peers(client_id, &line);
        info!("{} is now known as {}", old, nick);
    } else {
        complete_registration(state, client_id);
    }
    Ok(())
}

pub fn user(state: &mut ServerState, client_id: ClientId, args: &[String]) -> HandlerResult {
    let Some(user) = state.registry.user_mut(client_id) else {
        return Ok(());
    };
    if user.is_registered() {
        return Err(CommandError::AlreadyRegistered);
    }
    if args.len() < 4 || args[0].is_empty() {
        return Err(CommandError::NeedMoreParams("USER"));
    }

    user.username = args[0].clone();
    user.realname = args[3].clone();
    complete_registration(state, client_id);
    Ok(())
}

/// Register the user once NICK and USER are both in
fn complete_registration(state: &mut ServerState, client_id: ClientId) {
    let Some(user) = state.registry.user_mut(client_id) else {
        return;
    };
    if !user.advance_registration() {
        return;
    }

    let password_ok = match &state.config.password {
        Some(expected) => user.password.as_deref() == Some(expected.as_str()),
        None => true,
    };
    if !password_ok {
        warn!("Client {} registered without the server password", client_id);
        user.quit_reason = Some("Bad password".to_string());
        state.reply_error(client_id, &CommandError::PasswordMismatch);
        return;
    }

    user.registration = Registration::Registered;
    info!("Client {} registered as {}", client_id, user.nickname);

    let created = state.created_at.format("%Y/%m/%d %H:%M:%S").to_string();
    let burst = reply::welcome(
        &state.config.server_name,
        &prefix_of(state, client_id),
        &created,
    );
    for numeric in burst {
        state.reply(client_id, numeric);
    }
}
