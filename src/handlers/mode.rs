//! MODE for users and channels
//!
//! User modes: `i`, `w`, `o` (operator status can be dropped but never
//! self-granted). Channel modes: `n`, `t` and `o <nick>`. Applied changes
//! are echoed in a single MODE line; unknown flags produce 501 (user) or
//! 472 (channel) without undoing the known ones.

use super::{nick_of, prefix_of};
use crate::command::HandlerResult;
use crate::error::CommandError;
use crate::reply::{self, Numeric, NumericReply};
use crate::server::ServerState;
use crate::types::{parse_channel_name, ClientId};

/// Accumulates applied changes as a compact `+ab-c` string
#[derive(Debug, Default)]
struct ModeChanges {
    flags: String,
    sign: Option<bool>,
    args: Vec<String>,
}

impl ModeChanges {
    fn push(&mut self, adding: bool, flag: char) {
        if self.sign != Some(adding) {
            self.flags.push(if adding { '+' } else { '-' });
            self.sign = Some(adding);
        }
        self.flags.push(flag);
    }

    fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    fn render(&self) -> String {
        let mut out = self.flags.clone();
        for arg in &self.args {
            out.push(' ');
            out.push_str(arg);
        }
        out
    }
}

pub fn mode(state: &mut ServerState, client_id: ClientId, args: &[String]) -> HandlerResult {
    let Some(target) = args.first() else {
        return Err(CommandError::NeedMoreParams("MODE"));
    };
    if target.starts_with('#') {
        channel_mode(state, client_id, target, &args[1..])
    } else {
        user_mode(state, client_id, target, args.get(1))
    }
}

fn user_mode(
    state: &mut ServerState,
    client_id: ClientId,
    target: &str,
    modestring: Option<&String>,
) -> HandlerResult {
    let nick = nick_of(state, client_id);
    if target != nick {
        if state.registry.find_by_nick(target).is_none() {
            return Err(CommandError::NoSuchNick(target.to_string()));
        }
        return Err(CommandError::UsersDontMatch);
    }

    let Some(user) = state.registry.user_mut(client_id) else {
        return Ok(());
    };
    let Some(modestring) = modestring else {
        let current = format!(":+{}", user.modes);
        state.reply(client_id, NumericReply::new(Numeric::UModeIs, current));
        return Ok(());
    };

    let mut changes = ModeChanges::default();
    let mut unknown = false;
    let mut adding = true;
    for flag in modestring.chars() {
        match flag {
            '+' => adding = true,
            '-' => adding = false,
            // Operator status only comes from OPER
            'o' if adding => {}
            'i' | 'w' | 'o' => {
                if user.set_mode(flag, adding) {
                    changes.push(adding, flag);
                }
            }
            _ => unknown = true,
        }
    }

    if !changes.is_empty() {
        let line = reply::command(&nick, "MODE", &format!("{} :{}", nick, changes.render()));
        let _ = user.send(line);
    }
    if unknown {
        return Err(CommandError::UmodeUnknownFlag);
    }
    Ok(())
}

fn channel_mode(
    state: &mut ServerState,
    client_id: ClientId,
    wire: &str,
    rest: &[String],
) -> HandlerResult {
    let name = parse_channel_name(wire)
        .ok_or_else(|| CommandError::NoSuchChannel(wire.to_string()))?;
    let channel = state
        .registry
        .channel(name)
        .ok_or_else(|| CommandError::NoSuchChannel(wire.to_string()))?;

    let Some(modestring) = rest.first() else {
        let current = format!("{} +{}", channel.wire_name(), channel.modes);
        state.reply(client_id, NumericReply::new(Numeric::ChannelModeIs, current));
        return Ok(());
    };
    if !channel.is_operator(client_id) {
        return Err(CommandError::ChanOpPrivsNeeded(wire.to_string()));
    }

    let mut params = rest[1..].iter();
    let mut changes = ModeChanges::default();
    let mut errors = Vec::new();
    let mut adding = true;

    for flag in modestring.chars() {
        match flag {
            '+' => adding = true,
            '-' => adding = false,
            'n' | 't' => {
                let changed = state
                    .registry
                    .channel_mut(name)
                    .is_some_and(|c| c.set_mode(flag, adding));
                if changed {
                    changes.push(adding, flag);
                }
            }
            'o' => {
                let Some(nick) = params.next() else {
                    errors.push(CommandError::NeedMoreParams("MODE"));
                    continue;
                };
                let Some(target) = state.registry.find_by_nick(nick) else {
                    errors.push(CommandError::NoSuchNick(nick.clone()));
                    continue;
                };
                let Some(channel) = state.registry.channel_mut(name) else {
                    continue;
                };
                if !channel.contains(target) {
                    errors.push(CommandError::UserNotInChannel {
                        nick: nick.clone(),
                        channel: wire.to_string(),
                    });
                } else if channel.set_operator(target, adding) {
                    changes.push(adding, 'o');
                    changes.args.push(nick.clone());
                }
            }
            _ => errors.push(CommandError::UnknownMode(flag)),
        }
    }

    if !changes.is_empty() {
        let line = reply::command(
            &prefix_of(state, client_id),
            "MODE",
            &format!("{} {}", wire, changes.render()),
        );
        state.registry.broadcast(name, &line, None);
    }
    for err in errors {
        state.reply_error(client_id, &err);
    }
    Ok(())
}
