//! Reply formatting
//!
//! Builds the two outbound line shapes:
//! - numeric replies, `:<server> <code> <nick> <params> :<text>`
//! - command echoes, `:<nick>!<user>@<host> <COMMAND> <args>`
//!
//! Lines are produced without a terminator; `LineFramer` appends CRLF when
//! the connection task writes them.

use crate::error::CommandError;

/// User modes understood by MODE
pub const USER_MODES: &str = "iwo";

/// Channel modes understood by MODE
pub const CHANNEL_MODES: &str = "nto";

/// Numeric reply codes used by the relay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Numeric {
    Welcome = 1,
    YourHost = 2,
    Created = 3,
    MyInfo = 4,
    UModeIs = 221,
    ChannelModeIs = 324,
    NoTopic = 331,
    Topic = 332,
    YoureOper = 381,
    NoSuchNick = 401,
    NoSuchChannel = 403,
    CannotSendToChan = 404,
    NoOrigin = 409,
    NoNicknameGiven = 431,
    ErroneousNickname = 432,
    NicknameInUse = 433,
    UserNotInChannel = 441,
    NotOnChannel = 442,
    NotRegistered = 451,
    NeedMoreParams = 461,
    AlreadyRegistered = 462,
    PasswdMismatch = 464,
    UnknownMode = 472,
    NoPrivileges = 481,
    ChanOpPrivsNeeded = 482,
    UModeUnknownFlag = 501,
    UsersDontMatch = 502,
}

impl Numeric {
    pub fn code(self) -> u16 {
        self as u16
    }
}

/// A numeric reply before the recipient's nickname is known
///
/// `body` holds everything after the nickname, trailing text included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumericReply {
    pub numeric: Numeric,
    pub body: String,
}

impl NumericReply {
    pub fn new(numeric: Numeric, body: impl Into<String>) -> Self {
        Self {
            numeric,
            body: body.into(),
        }
    }

    /// Render the full line for `nick`; unregistered users appear as `*`
    pub fn render(&self, server: &str, nick: &str) -> String {
        let nick = if nick.is_empty() { "*" } else { nick };
        format!(
            ":{} {:03} {} {}",
            server,
            self.numeric.code(),
            nick,
            self.body
        )
    }
}

/// The 001-004 burst sent on registration
pub fn welcome(server: &str, prefix: &str, created: &str) -> Vec<NumericReply> {
    vec![
        NumericReply::new(
            Numeric::Welcome,
            format!(":Welcome to the Internet Relay Network {}", prefix),
        ),
        NumericReply::new(
            Numeric::YourHost,
            format!(
                ":Your host is {}, running version {}",
                server,
                env!("CARGO_PKG_VERSION")
            ),
        ),
        NumericReply::new(
            Numeric::Created,
            format!(":This server was created {}", created),
        ),
        NumericReply::new(
            Numeric::MyInfo,
            format!(
                "{} {} {} {}",
                server,
                env!("CARGO_PKG_VERSION"),
                USER_MODES,
                CHANNEL_MODES
            ),
        ),
    ]
}

/// Format a command echo with a user or server prefix
pub fn command(prefix: &str, command: &str, args: &str) -> String {
    format!(":{} {} {}", prefix, command, args)
}

/// Format the line sent right before the server closes a connection
pub fn closing_link(host: &str, reason: &str) -> String {
    format!("ERROR :Closing Link: {} ({})", host, reason)
}

/// Convert a handler refusal into the numeric sent to the invoker
impl From<&CommandError> for NumericReply {
    fn from(err: &CommandError) -> Self {
        match err {
            CommandError::NeedMoreParams(command) => NumericReply::new(
                Numeric::NeedMoreParams,
                format!("{} :Not enough parameters", command),
            ),
            CommandError::AlreadyRegistered => NumericReply::new(
                Numeric::AlreadyRegistered,
                ":Unauthorized command (already registered)",
            ),
            CommandError::NotRegistered => {
                NumericReply::new(Numeric::NotRegistered, ":You have not registered")
            }
            CommandError::NoNicknameGiven => {
                NumericReply::new(Numeric::NoNicknameGiven, ":No nickname given")
            }
            CommandError::ErroneousNickname(nick) => NumericReply::new(
                Numeric::ErroneousNickname,
                format!("{} :Erroneous nickname", nick),
            ),
            CommandError::NicknameInUse(nick) => NumericReply::new(
                Numeric::NicknameInUse,
                format!("{} :Nickname is already in use", nick),
            ),
            CommandError::NoSuchNick(nick) => NumericReply::new(
                Numeric::NoSuchNick,
                format!("{} :No such nick/channel", nick),
            ),
            CommandError::NoSuchChannel(channel) => NumericReply::new(
                Numeric::NoSuchChannel,
                format!("{} :No such channel", channel),
            ),
            CommandError::CannotSendToChan(channel) => NumericReply::new(
                Numeric::CannotSendToChan,
                format!("{} :Cannot send to channel", channel),
            ),
            CommandError::NoOrigin => NumericReply::new(Numeric::NoOrigin, ":No origin specified"),
            CommandError::UserNotInChannel { nick, channel } => NumericReply::new(
                Numeric::UserNotInChannel,
                format!("{} {} :They aren't on that channel", nick, channel),
            ),
            CommandError::NotOnChannel(channel) => NumericReply::new(
                Numeric::NotOnChannel,
                format!("{} :You're not on that channel", channel),
            ),
            CommandError::PasswordMismatch => {
                NumericReply::new(Numeric::PasswdMismatch, ":Password incorrect")
            }
            CommandError::UnknownMode(flag) => NumericReply::new(
                Numeric::UnknownMode,
                format!("{} :is unknown mode char to me", flag),
            ),
            CommandError::NoPrivileges => NumericReply::new(
                Numeric::NoPrivileges,
                ":Permission Denied- You're not an IRC operator",
            ),
            CommandError::ChanOpPrivsNeeded(channel) => NumericReply::new(
                Numeric::ChanOpPrivsNeeded,
                format!("{} :You're not channel operator", channel),
            ),
            CommandError::UmodeUnknownFlag => {
                NumericReply::new(Numeric::UModeUnknownFlag, ":Unknown MODE flag")
            }
            CommandError::UsersDontMatch => NumericReply::new(
                Numeric::UsersDontMatch,
                ":Cannot change mode for other users",
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_render_pads_code() {
        let reply = NumericReply::new(Numeric::Welcome, ":Welcome");
        assert_eq!(reply.render("irc.test", "alice"), ":irc.test 001 alice :Welcome");
    }

    #[test]
    fn test_numeric_render_unregistered() {
        let reply = NumericReply::from(&CommandError::NoNicknameGiven);
        assert_eq!(
            reply.render("irc.test", ""),
            ":irc.test 431 * :No nickname given"
        );
    }

    #[test]
    fn test_error_conversion_carries_params() {
        let reply = NumericReply::from(&CommandError::NeedMoreParams("JOIN"));
        assert_eq!(reply.numeric, Numeric::NeedMoreParams);
        assert_eq!(reply.body, "JOIN :Not enough parameters");

        let reply = NumericReply::from(&CommandError::UserNotInChannel {
            nick: "bob".to_string(),
            channel: "#test".to_string(),
        });
        assert_eq!(reply.numeric.code(), 441);
        assert!(reply.body.starts_with("bob #test :"));
    }

    #[test]
    fn test_welcome_burst() {
        let burst = welcome("irc.test", "alice!a@127.0.0.1", "today");
        let codes: Vec<u16> = burst.iter().map(|r| r.numeric.code()).collect();
        assert_eq!(codes, vec![1, 2, 3, 4]);
        assert!(burst[0].body.ends_with("alice!a@127.0.0.1"));
    }

    #[test]
    fn test_command_echo() {
        assert_eq!(
            command("alice!a@host", "JOIN", "#test"),
            ":alice!a@host JOIN #test"
        );
        assert_eq!(
            closing_link("host", "Quit: bye"),
            "ERROR :Closing Link: host (Quit: bye)"
        );
    }
}
