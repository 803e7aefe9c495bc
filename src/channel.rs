//! Channel struct definition
//!
//! A named group of members with optional topic, mode flags and a set of
//! channel operators. Membership is only changed through `Registry`, which
//! keeps each user's channel set in step with the member list.

use std::collections::HashSet;

use crate::types::ClientId;

/// Modes given to a freshly created channel
pub const DEFAULT_CHANNEL_MODES: &str = "nt";

/// Chat channel
#[derive(Debug)]
pub struct Channel {
    /// Stored name, without the `#` prefix
    pub name: String,
    pub topic: Option<String>,
    /// Single-character channel flags (`n`, `t`)
    pub modes: String,
    /// Members in join order
    members: Vec<ClientId>,
    /// Channel operators, always a subset of `members`
    operators: HashSet<ClientId>,
}

impl Channel {
    /// Create an empty channel with default modes
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            topic: None,
            modes: DEFAULT_CHANNEL_MODES.to_string(),
            members: Vec::new(),
            operators: HashSet::new(),
        }
    }

    /// Name as it appears on the wire
    pub fn wire_name(&self) -> String {
        format!("#{}", self.name)
    }

    /// Members in join order
    pub fn members(&self) -> &[ClientId] {
        &self.members
    }

    pub fn contains(&self, client_id: ClientId) -> bool {
        self.members.contains(&client_id)
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn is_operator(&self, client_id: ClientId) -> bool {
        self.operators.contains(&client_id)
    }

    /// Grant or revoke operator status for a member
    ///
    /// Returns false if `client_id` is not a member or nothing changed.
    pub fn set_operator(&mut self, client_id: ClientId, enabled: bool) -> bool {
        if !self.contains(client_id) {
            return false;
        }
        if enabled {
            self.operators.insert(client_id)
        } else {
            self.operators.remove(&client_id)
        }
    }

    pub fn has_mode(&self, flag: char) -> bool {
        self.modes.contains(flag)
    }

    /// Add or remove a flag; returns whether anything changed
    pub fn set_mode(&mut self, flag: char, enabled: bool) -> bool {
        match (enabled, self.has_mode(flag)) {
            (true, false) => {
                self.modes.push(flag);
                true
            }
            (false, true) => {
                self.modes.retain(|c| c != flag);
                true
            }
            _ => false,
        }
    }

    /// Add a member
    ///
    /// Returns false if the client was already a member.
    pub(crate) fn add_member(&mut self, client_id: ClientId) -> bool {
        if self.contains(client_id) {
            false
        } else {
            self.members.push(client_id);
            true
        }
    }

    /// Remove a member along with any operator status
    ///
    /// Returns false if the client was not a member.
    pub(crate) fn remove_member(&mut self, client_id: ClientId) -> bool {
        self.operators.remove(&client_id);
        let before = self.members.len();
        self.members.retain(|id| *id != client_id);
        self.members.len() != before
    }
}
