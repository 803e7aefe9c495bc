//! User and channel registry
//!
//! Owns every `User` (keyed by `ClientId`), every `Channel` (keyed by its
//! stored name) and the nickname index. All membership changes go through
//! here so that a user's channel set and the channel's member list are
//! always updated together, and so that empty channels are dropped.

use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use crate::channel::Channel;
use crate::error::CommandError;
use crate::types::ClientId;
use crate::user::User;

/// Result of adding a user to a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// Channel did not exist; the joiner is its first member
    Created,
    /// Joined an existing channel
    Joined,
    /// Already a member; nothing changed
    AlreadyMember,
}

/// Process-wide user and channel state
#[derive(Debug, Default)]
pub struct Registry {
    /// All connected users: ClientId -> User
    users: HashMap<ClientId, User>,
    /// Claimed nicknames: nickname -> ClientId
    nicknames: HashMap<String, ClientId>,
    /// All live channels: stored name -> Channel
    channels: HashMap<String, Channel>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a newly accepted connection
    pub fn add_user(&mut self, user: User) {
        self.users.insert(user.id, user);
    }

    pub fn user(&self, client_id: ClientId) -> Option<&User> {
        self.users.get(&client_id)
    }

    pub fn user_mut(&mut self, client_id: ClientId) -> Option<&mut User> {
        self.users.get_mut(&client_id)
    }

    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    pub fn users_mut(&mut self) -> impl Iterator<Item = &mut User> {
        self.users.values_mut()
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn channel(&self, name: &str) -> Option<&Channel> {
        self.channels.get(name)
    }

    /// Mutable channel access for topic and mode changes
    pub fn channel_mut(&mut self, name: &str) -> Option<&mut Channel> {
        self.channels.get_mut(name)
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Find the user holding `nick` (exact, case-sensitive match)
    pub fn find_by_nick(&self, nick: &str) -> Option<ClientId> {
        self.nicknames.get(nick).copied()
    }

    /// Claim `nick` for `client_id`, releasing its previous nickname
    ///
    /// Returns the old nickname (empty if none). Fails without touching
    /// either user when another connection holds `nick`.
    pub fn set_nickname(&mut self, client_id: ClientId, nick: &str) -> Result<String, CommandError> {
        if let Some(holder) = self.find_by_nick(nick) {
            if holder != client_id {
                return Err(CommandError::NicknameInUse(nick.to_string()));
            }
        }
        let Some(user) = self.users.get_mut(&client_id) else {
            return Ok(String::new());
        };
        let old = std::mem::replace(&mut user.nickname, nick.to_string());
        if !old.is_empty() {
            self.nicknames.remove(&old);
        }
        self.nicknames.insert(nick.to_string(), client_id);
        Ok(old)
    }

    /// Add a user to a channel, creating the channel if needed
    ///
    /// Returns `None` if the user is unknown.
    pub fn join(&mut self, client_id: ClientId, name: &str) -> Option<JoinOutcome> {
        let user = self.users.get_mut(&client_id)?;

        let mut outcome = JoinOutcome::Joined;
        let channel = self.channels.entry(name.to_string()).or_insert_with(|| {
            outcome = JoinOutcome::Created;
            Channel::new(name)
        });

        if !channel.add_member(client_id) {
            return Some(JoinOutcome::AlreadyMember);
        }
        user.channels.insert(name.to_string());

        if outcome == JoinOutcome::Created {
            channel.set_operator(client_id, true);
            debug!("Channel #{} created", name);
        }
        Some(outcome)
    }

    /// Remove a user from a channel, dropping the channel once empty
    ///
    /// Returns false if the user was not a member.
    pub fn part(&mut self, client_id: ClientId, name: &str) -> bool {
        let Some(channel) = self.channels.get_mut(name) else {
            return false;
        };
        if !channel.remove_member(client_id) {
            return false;
        }
        if let Some(user) = self.users.get_mut(&client_id) {
            user.channels.remove(name);
        }
        if channel.is_empty() {
            self.channels.remove(name);
            debug!("Channel #{} deleted (empty)", name);
        }
        true
    }

    /// Remove a user entirely: every membership, the nickname, the entry
    ///
    /// Dropping the returned `User` closes its outbound queue, which ends
    /// the connection task once pending lines are written.
    pub fn remove_user(&mut self, client_id: ClientId) -> Option<User> {
        let channels: Vec<String> = self
            .users
            .get(&client_id)?
            .channels
            .iter()
            .cloned()
            .collect();
        for name in channels {
            self.part(client_id, &name);
        }

        let user = self.users.remove(&client_id)?;
        if self.nicknames.get(&user.nickname) == Some(&client_id) {
            self.nicknames.remove(&user.nickname);
        }
        Some(user)
    }

    /// Queue a line for one user
    pub fn send_to(&mut self, client_id: ClientId, line: String) {
        if let Some(user) = self.users.get_mut(&client_id) {
            let _ = user.send(line);
        }
    }

    /// Queue a line for every member of a channel, optionally skipping one
    pub fn broadcast(&mut self, name: &str, line: &str, except: Option<ClientId>) {
        let Some(channel) = self.channels.get(name) else {
            return;
        };
        for member in channel.members() {
            if Some(*member) == except {
                continue;
            }
            if let Some(user) = self.users.get_mut(member) {
                let _ = user.send(line.to_string());
            }
        }
    }

    /// Distinct users sharing at least one channel with `client_id`
    pub fn peers(&self, client_id: ClientId) -> BTreeSet<ClientId> {
        let mut peers = BTreeSet::new();
        let Some(user) = self.users.get(&client_id) else {
            return peers;
        };
        for name in &user.channels {
            if let Some(channel) = self.channels.get(name) {
                peers.extend(channel.members().iter().copied());
            }
        }
        peers.remove(&client_id);
        peers
    }

    /// Queue a line once for every peer of `client_id`
    pub fn send_to_peers(&mut self, client_id: ClientId, line: &str) {
        for peer in self.peers(client_id) {
            self.send_to(peer, line.to_string());
        }
    }

    /// Users whose connection must be torn down, with the reason
    pub fn pending_quits(&self) -> Vec<(ClientId, String)> {
        self.users
            .values()
            .filter_map(|u| u.quit_reason.clone().map(|reason| (u.id, reason)))
            .collect()
    }

    /// Check that memberships are symmetric and operators are members
    #[cfg(test)]
    pub fn assert_consistent(&self) {
        for (name, channel) in &self.channels {
            assert!(!channel.is_empty(), "empty channel #{} retained", name);
            for member in channel.members() {
                let user = self.users.get(member).expect("member is a live user");
                assert!(user.channels.contains(name), "asymmetric membership in #{}", name);
            }
        }
        for user in self.users.values() {
            for name in &user.channels {
                let channel = self.channels.get(name).expect("joined channel exists");
                assert!(channel.contains(user.id));
            }
            if !user.nickname.is_empty() {
                assert_eq!(self.nicknames.get(&user.nickname), Some(&user.id));
            }
        }
        assert!(self.nicknames.values().all(|id| self.users.contains_key(id)));
    }
}
