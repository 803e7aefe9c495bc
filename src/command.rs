//! Command parsing and dispatch
//!
//! `Message::parse` tokenises a line into a command and its arguments.
//! `Dispatcher` owns the command table, built once in `Dispatcher::new`,
//! and enforces the registration gate before running a handler. A
//! handler's `Err` is turned into a numeric reply for the invoker; nothing
//! here can end the server loop.

use std::collections::HashMap;

use tracing::debug;

use crate::error::CommandError;
use crate::handlers;
use crate::server::ServerState;
use crate::types::ClientId;

/// Result type returned by every command handler
pub type HandlerResult = Result<(), CommandError>;

/// Command handler signature
pub type HandlerFn = fn(&mut ServerState, ClientId, &[String]) -> HandlerResult;

/// A tokenised line from a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Command token, upper-cased
    pub command: String,
    /// Arguments; a `:`-prefixed trailing argument is kept whole
    pub args: Vec<String>,
}

impl Message {
    /// Split a line into command and arguments
    ///
    /// A leading `:source` prefix sent by a client is ignored. Returns
    /// `None` for lines without a command token.
    pub fn parse(line: &str) -> Option<Self> {
        let mut rest = line.trim_start();
        if rest.starts_with(':') {
            let (_, after) = rest.split_once(' ')?;
            rest = after.trim_start();
        }

        let (command, mut rest) = match rest.split_once(' ') {
            Some((command, rest)) => (command, rest),
            None => (rest, ""),
        };
        if command.is_empty() {
            return None;
        }

        let mut args = Vec::new();
        loop {
            rest = rest.trim_start_matches(' ');
            if rest.is_empty() {
                break;
            }
            if let Some(trailing) = rest.strip_prefix(':') {
                args.push(trailing.to_string());
                break;
            }
            match rest.split_once(' ') {
                Some((arg, after)) => {
                    args.push(arg.to_string());
                    rest = after;
                }
                None => {
                    args.push(rest.to_string());
                    break;
                }
            }
        }

        Some(Self {
            command: command.to_ascii_uppercase(),
            args,
        })
    }
}

/// One entry of the command table
#[derive(Clone, Copy)]
struct CommandEntry {
    handler: HandlerFn,
    /// Refused with 451 until the user is registered
    requires_registration: bool,
}

/// Maps command names to handlers
pub struct Dispatcher {
    table: HashMap<&'static str, CommandEntry>,
}

impl Dispatcher {
    /// Build the command table
    pub fn new() -> Self {
        let mut dispatcher = Self {
            table: HashMap::new(),
        };

        // Usable before registration
        dispatcher.register("PASS", handlers::registration::pass, false);
        dispatcher.register("NICK", handlers::registration::nick, false);
        dispatcher.register("USER", handlers::registration::user, false);
        dispatcher.register("PING", handlers::misc::ping, false);
        dispatcher.register("PONG", handlers::misc::pong, false);
        dispatcher.register("QUIT", handlers::misc::quit, false);

        dispatcher.register("JOIN", handlers::channel::join, true);
        dispatcher.register("PART", handlers::channel::part, true);
        dispatcher.register("KICK", handlers::channel::kick, true);
        dispatcher.register("TOPIC", handlers::channel::topic, true);
        dispatcher.register("PRIVMSG", handlers::messaging::privmsg, true);
        dispatcher.register("NOTICE", handlers::messaging::notice, true);
        dispatcher.register("MODE", handlers::mode::mode, true);
        dispatcher.register("OPER", handlers::oper::oper, true);
        dispatcher.register("KILL", handlers::oper::kill, true);
        dispatcher.register("DIE", handlers::oper::die, true);
        dispatcher.register("SET", handlers::oper::set, true);

        dispatcher
    }

    fn register(&mut self, name: &'static str, handler: HandlerFn, requires_registration: bool) {
        self.table.insert(
            name,
            CommandEntry {
                handler,
                requires_registration,
            },
        );
    }

    /// Parse and execute one line on behalf of `client_id`
    pub fn dispatch(&self, state: &mut ServerState, client_id: ClientId, line: &str) {
        let Some(message) = Message::parse(line) else {
            return;
        };
        let Some(entry) = self.table.get(message.command.as_str()) else {
            debug!("Unknown command {} from {}", message.command, client_id);
            return;
        };

        let registered = match state.registry.user(client_id) {
            Some(user) => user.is_registered(),
            None => return,
        };

        let result = if entry.requires_registration && !registered {
            Err(CommandError::NotRegistered)
        } else {
            (entry.handler)(state, client_id, &message.args)
        };

        if let Err(err) = result {
            debug!("{} from {} refused: {}", message.command, client_id, err);
            state.reply_error(client_id, &err);
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{test_state, TestClient};

    fn args(line: &str) -> Vec<String> {
        Message::parse(line).unwrap().args
    }

    #[test]
    fn test_parse_no_args() {
        let msg = Message::parse("quit").unwrap();
        assert_eq!(msg.command, "QUIT");
        assert!(msg.args.is_empty());
    }

    #[test]
    fn test_parse_trailing() {
        let msg = Message::parse("PRIVMSG #test :hello there").unwrap();
        assert_eq!(msg.command, "PRIVMSG");
        assert_eq!(msg.args, vec!["#test", "hello there"]);
    }

    #[test]
    fn test_parse_user_line() {
        assert_eq!(args("USER a 0 * :Alice Liddell"), vec!["a", "0", "*", "Alice Liddell"]);
    }

    #[test]
    fn test_parse_collapses_spaces() {
        assert_eq!(args("KICK   #test  bob"), vec!["#test", "bob"]);
    }

    #[test]
    fn test_parse_empty_trailing() {
        assert_eq!(args("TOPIC #test :"), vec!["#test", ""]);
    }

    #[test]
    fn test_parse_ignores_source_prefix() {
        let msg = Message::parse(":alice!a@host NICK bob").unwrap();
        assert_eq!(msg.command, "NICK");
        assert_eq!(msg.args, vec!["bob"]);
    }

    #[test]
    fn test_parse_blank() {
        assert!(Message::parse("").is_none());
        assert!(Message::parse("   ").is_none());
        assert!(Message::parse(":prefixonly").is_none());
    }

    #[tokio::test]
    async fn test_dispatch_is_case_insensitive_and_ignores_unknown() {
        let dispatcher = Dispatcher::new();
        let mut state = test_state();
        let mut alice = TestClient::register(&mut state, &dispatcher, "alice");
        alice.drain();

        alice.send(&mut state, &dispatcher, "ping :lower");
        alice.send(&mut state, &dispatcher, "WHOIS alice");
        alice.send(&mut state, &dispatcher, "Ping :mixed");

        assert_eq!(
            alice.drain(),
            vec![
                ":irc.test PONG irc.test :lower",
                ":irc.test PONG irc.test :mixed",
            ]
        );
    }
}
