//! JOIN, PART, KICK and TOPIC
//!
//! Membership changes are made through the registry; notices go out to
//! the channel before the leaving user is removed, so the leaver sees its
//! own PART or KICK.

use tracing::info;

use super::{nick_of, prefix_of};
use crate::command::HandlerResult;
use crate::error::CommandError;
use crate::registry::JoinOutcome;
use crate::reply::{self, Numeric, NumericReply};
use crate::server::ServerState;
use crate::types::{parse_channel_name, ClientId};

pub fn join(state: &mut ServerState, client_id: ClientId, args: &[String]) -> HandlerResult {
    let Some(targets) = args.first().filter(|t| !t.is_empty()) else {
        return Err(CommandError::NeedMoreParams("JOIN"));
    };

    // JOIN 0 leaves every channel
    if targets == "0" {
        let joined: Vec<(String, String)> = state
            .registry
            .user(client_id)
            .map(|u| {
                u.channels
                    .iter()
                    .filter_map(|name| state.registry.channel(name))
                    .map(|c| (c.name.clone(), c.wire_name()))
                    .collect()
            })
            .unwrap_or_default();
        for (name, wire) in joined {
            leave(state, client_id, &name, "PART", &wire);
        }
        return Ok(());
    }

    for wire in targets.split(',').filter(|t| !t.is_empty()) {
        if let Err(err) = join_one(state, client_id, wire) {
            state.reply_error(client_id, &err);
        }
    }
    Ok(())
}

fn join_one(state: &mut ServerState, client_id: ClientId, wire: &str) -> HandlerResult {
    let name = parse_channel_name(wire)
        .ok_or_else(|| CommandError::NoSuchChannel(wire.to_string()))?;

    match state.registry.join(client_id, name) {
        Some(JoinOutcome::Created) | Some(JoinOutcome::Joined) => {}
        Some(JoinOutcome::AlreadyMember) | None => return Ok(()),
    }

    let line = reply::command(&prefix_of(state, client_id), "JOIN", wire);
    state.registry.broadcast(name, &line, None);
    info!("{} joined {}", nick_of(state, client_id), wire);

    let topic = state.registry.channel(name).and_then(|c| c.topic.clone());
    if let Some(topic) = topic {
        state.reply(
            client_id,
            NumericReply::new(Numeric::Topic, format!("{} :{}", wire, topic)),
        );
    }
    Ok(())
}

pub fn part(state: &mut ServerState, client_id: ClientId, args: &[String]) -> HandlerResult {
    let Some(targets) = args.first().filter(|t| !t.is_empty()) else {
        return Err(CommandError::NeedMoreParams("PART"));
    };
    let reason = args.get(1);

    for wire in targets.split(',').filter(|t| !t.is_empty()) {
        if let Err(err) = part_one(state, client_id, wire, reason) {
            state.reply_error(client_id, &err);
        }
    }
    Ok(())
}

fn part_one(
    state: &mut ServerState,
    client_id: ClientId,
    wire: &str,
    reason: Option<&String>,
) -> HandlerResult {
    let name = parse_channel_name(wire)
        .ok_or_else(|| CommandError::NoSuchChannel(wire.to_string()))?;
    let channel = state
        .registry
        .channel(name)
        .ok_or_else(|| CommandError::NoSuchChannel(wire.to_string()))?;
    if !channel.contains(client_id) {
        return Err(CommandError::NotOnChannel(wire.to_string()));
    }

    let args = match reason {
        Some(reason) => format!("{} :{}", wire, reason),
        None => wire.to_string(),
    };
    leave(state, client_id, name, "PART", &args);
    info!("{} left {}", nick_of(state, client_id), wire);
    Ok(())
}

pub fn kick(state: &mut ServerState, client_id: ClientId, args: &[String]) -> HandlerResult {
    if args.len() < 2 {
        return Err(CommandError::NeedMoreParams("KICK"));
    }
    let wire = &args[0];
    let target_nick = &args[1];

    let name = parse_channel_name(wire)
        .ok_or_else(|| CommandError::NoSuchChannel(wire.clone()))?;
    let channel = state
        .registry
        .channel(name)
        .ok_or_else(|| CommandError::NoSuchChannel(wire.clone()))?;
    if !channel.contains(client_id) {
        return Err(CommandError::NotOnChannel(wire.clone()));
    }
    if !channel.is_operator(client_id) {
        return Err(CommandError::ChanOpPrivsNeeded(wire.clone()));
    }
    let target = state
        .registry
        .find_by_nick(target_nick)
        .ok_or_else(|| CommandError::NoSuchNick(target_nick.clone()))?;
    if !channel.contains(target) {
        return Err(CommandError::UserNotInChannel {
            nick: target_nick.clone(),
            channel: wire.clone(),
        });
    }

    let kicker = nick_of(state, client_id);
    let reason = args.get(2).cloned().unwrap_or_else(|| kicker.clone());
    let line = reply::command(
        &prefix_of(state, client_id),
        "KICK",
        &format!("{} {} :{}", wire, target_nick, reason),
    );
    state.registry.broadcast(name, &line, None);
    state.registry.part(target, name);
    info!("{} kicked {} from {} ({})", kicker, target_nick, wire, reason);
    Ok(())
}

pub fn topic(state: &mut ServerState, client_id: ClientId, args: &[String]) -> HandlerResult {
    let Some(wire) = args.first() else {
        return Err(CommandError::NeedMoreParams("TOPIC"));
    };
    let name = parse_channel_name(wire)
        .ok_or_else(|| CommandError::NoSuchChannel(wire.clone()))?;
    let channel = state
        .registry
        .channel(name)
        .ok_or_else(|| CommandError::NoSuchChannel(wire.clone()))?;
    if !channel.contains(client_id) {
        return Err(CommandError::NotOnChannel(wire.clone()));
    }

    let Some(text) = args.get(1) else {
        let reply = match &channel.topic {
            Some(topic) => NumericReply::new(Numeric::Topic, format!("{} :{}", wire, topic)),
            None => NumericReply::new(Numeric::NoTopic, format!("{} :No topic is set", wire)),
        };
        state.reply(client_id, reply);
        return Ok(());
    };

    if channel.has_mode('t') && !channel.is_operator(client_id) {
        return Err(CommandError::ChanOpPrivsNeeded(wire.clone()));
    }
    if let Some(channel) = state.registry.channel_mut(name) {
        channel.topic = if text.is_empty() { None } else { Some(text.clone()) };
    }
    let line = reply::command(
        &prefix_of(state, client_id),
        "TOPIC",
        &format!("{} :{}", wire, text),
    );
    state.registry.broadcast(name, &line, None);
    Ok(())
}

/// Announce a departure to the whole channel, then remove the member
fn leave(state: &mut ServerState, client_id: ClientId, name: &str, command: &str, args: &str) {
    let line = reply::command(&prefix_of(state, client_id), command, args);
    state.registry.broadcast(name, &line, None);
    state.registry.part(client_id, name);
}

#[cfg(test)]
mod tests {
    use crate::command::Dispatcher;
    use crate::test_support::{test_state, TestClient};

    #[tokio::test]
    async fn test_join_creates_channel() {
        let dispatcher = Dispatcher::new();
        let mut state = test_state();
        let mut alice = TestClient::register(&mut state, &dispatcher, "alice");
        alice.drain();

        alice.send(&mut state, &dispatcher, "JOIN #test");

        let channel = state.registry.channel("test").unwrap();
        assert_eq!(channel.name, "test");
        assert_eq!(channel.members(), &[alice.id]);
        assert_eq!(state.registry.channel_count(), 1);
        assert_eq!(alice.drain(), vec![":alice!alice@127.0.0.1 JOIN #test"]);
    }

    #[tokio::test]
    async fn test_rejoin_is_noop() {
        let dispatcher = Dispatcher::new();
        let mut state = test_state();
        let mut alice = TestClient::register(&mut state, &dispatcher, "alice");
        alice.send(&mut state, &dispatcher, "JOIN #test");
        alice.drain();

        alice.send(&mut state, &dispatcher, "JOIN #test");

        assert_eq!(state.registry.channel("test").unwrap().member_count(), 1);
        assert!(alice.drain().is_empty());
    }

    #[tokio::test]
    async fn test_join_broadcasts_to_members() {
        let dispatcher = Dispatcher::new();
        let mut state = test_state();
        let mut alice = TestClient::register(&mut state, &dispatcher, "alice");
        let mut bob = TestClient::register(&mut state, &dispatcher, "bob");
        alice.send(&mut state, &dispatcher, "JOIN #test");
        alice.drain();
        bob.drain();

        bob.send(&mut state, &dispatcher, "JOIN #test");

        let expected = vec![":bob!bob@127.0.0.1 JOIN #test".to_string()];
        assert_eq!(alice.drain(), expected);
        assert_eq!(bob.drain(), expected);
    }

    #[tokio::test]
    async fn test_join_list_and_bad_names() {
        let dispatcher = Dispatcher::new();
        let mut state = test_state();
        let mut alice = TestClient::register(&mut state, &dispatcher, "alice");
        alice.drain();

        alice.send(&mut state, &dispatcher, "JOIN #one,nohash,#two");

        let lines = alice.drain();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains(" 403 alice nohash "));
        assert_eq!(state.registry.channel_count(), 2);

        alice.send(&mut state, &dispatcher, "JOIN");
        assert_eq!(alice.numerics(), vec![461]);
        state.registry.assert_consistent();
    }

    #[tokio::test]
    async fn test_join_zero_parts_all() {
        let dispatcher = Dispatcher::new();
        let mut state = test_state();
        let mut alice = TestClient::register(&mut state, &dispatcher, "alice");
        alice.send(&mut state, &dispatcher, "JOIN #one,#two");
        alice.drain();

        alice.send(&mut state, &dispatcher, "JOIN 0");

        assert_eq!(
            alice.drain(),
            vec![
                ":alice!alice@127.0.0.1 PART #one".to_string(),
                ":alice!alice@127.0.0.1 PART #two".to_string(),
            ]
        );
        assert!(state.registry.user(alice.id).unwrap().channels.is_empty());
        assert_eq!(state.registry.channel_count(), 0);
    }

    #[tokio::test]
    async fn test_part_notifies_then_removes() {
        let dispatcher = Dispatcher::new();
        let mut state = test_state();
        let mut alice = TestClient::register(&mut state, &dispatcher, "alice");
        let mut bob = TestClient::register(&mut state, &dispatcher, "bob");
        alice.send(&mut state, &dispatcher, "JOIN #test");
        bob.send(&mut state, &dispatcher, "JOIN #test");
        alice.drain();
        bob.drain();

        alice.send(&mut state, &dispatcher, "PART #test :see you");

        let expected = vec![":alice!alice@127.0.0.1 PART #test :see you".to_string()];
        assert_eq!(alice.drain(), expected);
        assert_eq!(bob.drain(), expected);
        assert!(!state.registry.channel("test").unwrap().contains(alice.id));
        assert!(state.registry.user(alice.id).unwrap().channels.is_empty());

        bob.send(&mut state, &dispatcher, "PRIVMSG #test :anyone?");
        assert!(alice.drain().is_empty());
        state.registry.assert_consistent();
    }

    #[tokio::test]
    async fn test_part_errors() {
        let dispatcher = Dispatcher::new();
        let mut state = test_state();
        let mut alice = TestClient::register(&mut state, &dispatcher, "alice");
        let mut bob = TestClient::register(&mut state, &dispatcher, "bob");
        bob.send(&mut state, &dispatcher, "JOIN #busy");
        alice.drain();

        alice.send(&mut state, &dispatcher, "PART");
        alice.send(&mut state, &dispatcher, "PART #nowhere");
        alice.send(&mut state, &dispatcher, "PART #busy");
        assert_eq!(alice.numerics(), vec![461, 403, 442]);
    }

    #[tokio::test]
    async fn test_last_part_deletes_channel() {
        let dispatcher = Dispatcher::new();
        let mut state = test_state();
        let alice = TestClient::register(&mut state, &dispatcher, "alice");
        alice.send(&mut state, &dispatcher, "JOIN #test");

        alice.send(&mut state, &dispatcher, "PART #test");
        assert!(state.registry.channel("test").is_none());
    }

    #[tokio::test]
    async fn test_kick_by_operator() {
        let dispatcher = Dispatcher::new();
        let mut state = test_state();
        let mut alice = TestClient::register(&mut state, &dispatcher, "alice");
        let mut bob = TestClient::register(&mut state, &dispatcher, "bob");
        alice.send(&mut state, &dispatcher, "JOIN #test");
        bob.send(&mut state, &dispatcher, "JOIN #test");
        alice.drain();
        bob.drain();

        alice.send(&mut state, &dispatcher, "KICK #test bob :behave");

        let expected = vec![":alice!alice@127.0.0.1 KICK #test bob :behave".to_string()];
        assert_eq!(alice.drain(), expected);
        assert_eq!(bob.drain(), expected);
        assert_eq!(state.registry.channel("test").unwrap().members(), &[alice.id]);
        assert!(state.registry.user(bob.id).unwrap().channels.is_empty());
        state.registry.assert_consistent();
    }

    #[tokio::test]
    async fn test_kick_requires_channel_operator() {
        let dispatcher = Dispatcher::new();
        let mut state = test_state();
        let mut alice = TestClient::register(&mut state, &dispatcher, "alice");
        let mut bob = TestClient::register(&mut state, &dispatcher, "bob");
        alice.send(&mut state, &dispatcher, "JOIN #test");
        bob.send(&mut state, &dispatcher, "JOIN #test");
        alice.drain();
        bob.drain();

        bob.send(&mut state, &dispatcher, "KICK #test alice");

        assert_eq!(
            bob.drain(),
            vec![":irc.test 482 bob #test :You're not channel operator"]
        );
        assert!(alice.drain().is_empty());
        assert_eq!(state.registry.channel("test").unwrap().member_count(), 2);
    }

    #[tokio::test]
    async fn test_kick_errors() {
        let dispatcher = Dispatcher::new();
        let mut state = test_state();
        let mut alice = TestClient::register(&mut state, &dispatcher, "alice");
        let _bob = TestClient::register(&mut state, &dispatcher, "bob");
        alice.send(&mut state, &dispatcher, "JOIN #test");
        alice.drain();

        alice.send(&mut state, &dispatcher, "KICK #test");
        alice.send(&mut state, &dispatcher, "KICK #nope bob");
        alice.send(&mut state, &dispatcher, "KICK #test ghost");
        alice.send(&mut state, &dispatcher, "KICK #test bob");
        assert_eq!(alice.numerics(), vec![461, 403, 401, 441]);
    }

    #[tokio::test]
    async fn test_topic_set_and_query() {
        let dispatcher = Dispatcher::new();
        let mut state = test_state();
        let mut alice = TestClient::register(&mut state, &dispatcher, "alice");
        let mut bob = TestClient::register(&mut state, &dispatcher, "bob");
        alice.send(&mut state, &dispatcher, "JOIN #test");
        bob.send(&mut state, &dispatcher, "JOIN #test");
        alice.drain();
        bob.drain();

        bob.send(&mut state, &dispatcher, "TOPIC #test");
        assert_eq!(bob.numerics(), vec![331]);

        bob.send(&mut state, &dispatcher, "TOPIC #test :mine now");
        assert_eq!(bob.numerics(), vec![482]);

        alice.send(&mut state, &dispatcher, "TOPIC #test :Rust talk");
        assert_eq!(
            bob.drain(),
            vec![":alice!alice@127.0.0.1 TOPIC #test :Rust talk"]
        );
        assert_eq!(
            state.registry.channel("test").unwrap().topic.as_deref(),
            Some("Rust talk")
        );

        bob.send(&mut state, &dispatcher, "TOPIC #test");
        assert_eq!(bob.drain(), vec![":irc.test 332 bob #test :Rust talk"]);
    }
}
