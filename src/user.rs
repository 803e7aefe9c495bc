//! User struct definition
//!
//! One `User` per accepted connection: identity, registration progress,
//! liveness timestamps and the sending half of the connection's outbound
//! queue. Dropping a `User` signals its connection task to close the socket.

use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

use crate::error::SendError;
use crate::types::ClientId;

/// Registration progress of a connection
///
/// `Connected -> PasswordAccepted -> NickSet / UserSet -> Registered`.
/// NICK and USER may arrive in either order; the state records which half
/// is still missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Connected,
    PasswordAccepted,
    NickSet,
    UserSet,
    Registered,
}

/// Connected user information
#[derive(Debug)]
pub struct User {
    /// Connection identifier
    pub id: ClientId,
    /// Peer address of the connection
    pub addr: SocketAddr,
    /// Nickname (empty before NICK)
    pub nickname: String,
    /// Username from USER (empty before USER)
    pub username: String,
    /// Host shown in prefixes, taken from the peer address
    pub hostname: String,
    pub realname: String,
    /// Last password offered with PASS
    pub password: Option<String>,
    /// Single-character mode flags, e.g. `o` for operator
    pub modes: String,
    pub registration: Registration,
    /// Last time any line was received
    pub last_activity: Instant,
    /// When an unanswered liveness PING was sent
    pub ping_sent: Option<Instant>,
    /// Names of joined channels (stored form, without `#`)
    pub channels: BTreeSet<String>,
    /// Set when the connection must be torn down after the current command
    pub quit_reason: Option<String>,
    /// Server → connection line queue
    sender: mpsc::Sender<String>,
    /// Cancelled on drop; the connection task closes the socket
    close: CancellationToken,
}

impl User {
    /// Create an unregistered user for a freshly accepted connection
    pub fn new(
        id: ClientId,
        addr: SocketAddr,
        sender: mpsc::Sender<String>,
        close: CancellationToken,
    ) -> Self {
        Self {
            id,
            addr,
            nickname: String::new(),
            username: String::new(),
            hostname: addr.ip().to_string(),
            realname: String::new(),
            password: None,
            modes: String::new(),
            registration: Registration::Connected,
            last_activity: Instant::now(),
            ping_sent: None,
            channels: BTreeSet::new(),
            quit_reason: None,
            sender,
            close,
        }
    }

    /// Queue a line for this user without waiting
    ///
    /// A full queue schedules the user for disconnection; a closed queue
    /// means teardown is already under way.
    pub fn send(&mut self, line: String) -> Result<(), SendError> {
        trace!("-> {} {}", self.id, line);
        match self.sender.try_send(line) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                if self.quit_reason.is_none() {
                    warn!("Outbound queue full for {}", self.id);
                    self.quit_reason = Some("SendQ exceeded".to_string());
                }
                Err(SendError::QueueFull)
            }
            Err(TrySendError::Closed(_)) => Err(SendError::ChannelClosed),
        }
    }

    /// Nickname as shown in replies (`*` before NICK)
    pub fn display_nick(&self) -> &str {
        if self.nickname.is_empty() {
            "*"
        } else {
            &self.nickname
        }
    }

    /// `nick!user@host` prefix for command echoes
    pub fn prefix(&self) -> String {
        format!("{}!{}@{}", self.display_nick(), self.username, self.hostname)
    }

    pub fn is_registered(&self) -> bool {
        self.registration == Registration::Registered
    }

    pub fn has_nickname(&self) -> bool {
        !self.nickname.is_empty()
    }

    pub fn has_user_info(&self) -> bool {
        !self.username.is_empty()
    }

    pub fn is_operator(&self) -> bool {
        self.has_mode('o')
    }

    pub fn has_mode(&self, flag: char) -> bool {
        self.modes.contains(flag)
    }

    /// Add or remove a mode flag; returns whether anything changed
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

    /// Recompute the pre-registration state after NICK or USER
    ///
    /// Returns true when both halves are present and registration can be
    /// attempted. Never moves a registered user backwards.
    pub fn advance_registration(&mut self) -> bool {
        if self.is_registered() {
            return false;
        }
        match (self.has_nickname(), self.has_user_info()) {
            (true, true) => true,
            (true, false) => {
                self.registration = Registration::NickSet;
                false
            }
            (false, true) => {
                self.registration = Registration::UserSet;
                false
            }
            (false, false) => false,
        }
    }

    /// Record inbound traffic; any line counts as a liveness answer
    pub fn touch(&mut self, now: Instant) {
        self.last_activity = now;
        self.ping_sent = None;
    }
}

impl Drop for User {
    fn drop(&mut self) {
        self.close.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_user(capacity: usize) -> (User, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity);
        let user = User::new(
            ClientId::new(),
            "127.0.0.1:50000".parse().unwrap(),
            tx,
            CancellationToken::new(),
        );
        (user, rx)
    }

    #[tokio::test]
    async fn test_user_creation() {
        let (user, _rx) = test_user(8);

        assert_eq!(user.registration, Registration::Connected);
        assert_eq!(user.display_nick(), "*");
        assert_eq!(user.hostname, "127.0.0.1");
        assert!(user.channels.is_empty());
        assert!(!user.is_operator());
    }

    #[tokio::test]
    async fn test_user_prefix() {
        let (mut user, _rx) = test_user(8);
        user.nickname = "alice".to_string();
        user.username = "al".to_string();

        assert_eq!(user.prefix(), "alice!al@127.0.0.1");
    }

    #[tokio::test]
    async fn test_registration_progress() {
        let (mut user, _rx) = test_user(8);

        user.username = "al".to_string();
        assert!(!user.advance_registration());
        assert_eq!(user.registration, Registration::UserSet);

        user.nickname = "alice".to_string();
        assert!(user.advance_registration());

        user.registration = Registration::Registered;
        assert!(!user.advance_registration());
        assert!(user.is_registered());
    }

    #[tokio::test]
    async fn test_mode_flags() {
        let (mut user, _rx) = test_user(8);

        assert!(user.set_mode('o', true));
        assert!(!user.set_mode('o', true));
        assert!(user.is_operator());
        assert!(user.set_mode('o', false));
        assert!(!user.is_operator());
        assert!(!user.set_mode('i', false));
    }

    #[tokio::test]
    async fn test_send_queues_line() {
        let (mut user, mut rx) = test_user(8);

        user.send("PING :x".to_string()).unwrap();
        assert_eq!(rx.recv().await.as_deref(), Some("PING :x"));
    }

    #[tokio::test]
    async fn test_full_queue_marks_quit() {
        let (mut user, _rx) = test_user(1);

        user.send("one".to_string()).unwrap();
        assert!(matches!(
            user.send("two".to_string()),
            Err(SendError::QueueFull)
        ));
        assert_eq!(user.quit_reason.as_deref(), Some("SendQ exceeded"));
    }

    #[tokio::test]
    async fn test_closed_queue() {
        let (mut user, rx) = test_user(1);
        drop(rx);

        assert!(matches!(
            user.send("line".to_string()),
            Err(SendError::ChannelClosed)
        ));
        assert!(user.quit_reason.is_none());
    }

    #[tokio::test]
    async fn test_drop_cancels_close_token() {
        let (tx, _rx) = mpsc::channel(1);
        let close = CancellationToken::new();
        let user = User::new(
            ClientId::new(),
            "127.0.0.1:50000".parse().unwrap(),
            tx,
            close.clone(),
        );
        assert!(!close.is_cancelled());

        drop(user);
        assert!(close.is_cancelled());
    }
}
