//! Basic type definitions for the relay
//!
//! Provides the connection identifier newtype and the name rules shared by
//! the registry and the command handlers:
//! - `ClientId`: UUID-based identifier, one per accepted connection
//! - nickname and channel-name validation

use uuid::Uuid;

/// Maximum nickname length accepted by NICK
pub const MAX_NICK_LEN: usize = 9;

/// Maximum channel name length, prefix excluded
pub const MAX_CHANNEL_LEN: usize = 49;

/// Unique connection identifier (newtype pattern)
///
/// Wraps a UUID v4. Stable for the lifetime of a connection and used as the
/// arena key for users in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(pub Uuid);

impl ClientId {
    /// Create a new random client ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn is_nick_special(c: char) -> bool {
    matches!(c, '[' | ']' | '\\' | '`' | '_' | '^' | '{' | '|' | '}')
}

/// Check a nickname against the accepted grammar
///
/// 1 to 9 characters, starting with a letter or special, followed by
/// letters, digits, specials or `-`.
pub fn is_valid_nickname(nick: &str) -> bool {
    let mut chars = nick.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if nick.chars().count() > MAX_NICK_LEN {
        return false;
    }
    if !(first.is_ascii_alphabetic() || is_nick_special(first)) {
        return false;
    }
    chars.all(|c| c.is_ascii_alphanumeric() || is_nick_special(c) || c == '-')
}

/// Strip the `#` prefix from a wire channel name
///
/// Returns the stored form of the name, or `None` when the name lacks the
/// prefix or contains characters that would break framing.
pub fn parse_channel_name(wire: &str) -> Option<&str> {
    let name = wire.strip_prefix('#')?;
    if name.is_empty() || name.len() > MAX_CHANNEL_LEN {
        return None;
    }
    if name
        .chars()
        .any(|c| c == ' ' || c == ',' || c == ':' || c.is_control())
    {
        return None;
    }
    Some(name)
}
