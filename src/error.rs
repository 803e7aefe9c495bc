//! Error types for the relay
//!
//! Errors are split by the scope they affect:
//! - `AppError`: startup and process-level failures (fatal before serving)
//! - `FrameError`: a single connection's byte stream is unusable
//! - `CommandError`: a command was refused; becomes a numeric reply
//! - `SendError`: a user's outbound queue cannot take more lines

use thiserror::Error;

/// Application-level errors
///
/// Raised while starting up or by the connection tasks. None of these are
/// ever produced by a command handler.
#[derive(Debug, Error)]
pub enum AppError {
    /// IO error (bind/listen failures are fatal)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file could not be read
    #[error("Failed to read config file {path}: {source}")]
    ConfigRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for `Config`
    #[error("Failed to parse config file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Config values out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Channel send error (internal channel broken)
    #[error("Channel send error")]
    ChannelSend,
}

/// Line framing errors
///
/// Any of these ends the connection they occurred on.
#[derive(Debug, Error)]
pub enum FrameError {
    /// Inbound line exceeded the configured maximum
    #[error("Input line too long")]
    LineTooLong { actual: usize, limit: usize },

    /// Socket read/write failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Refusals produced by command handlers
///
/// Each variant corresponds to exactly one numeric reply sent back to the
/// invoking user. The connection stays open.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("{0}: not enough parameters")]
    NeedMoreParams(&'static str),

    #[error("already registered")]
    AlreadyRegistered,

    #[error("not registered")]
    NotRegistered,

    #[error("no nickname given")]
    NoNicknameGiven,

    #[error("erroneous nickname {0}")]
    ErroneousNickname(String),

    #[error("nickname {0} in use")]
    NicknameInUse(String),

    #[error("no such nick {0}")]
    NoSuchNick(String),

    #[error("no such channel {0}")]
    NoSuchChannel(String),

    #[error("cannot send to channel {0}")]
    CannotSendToChan(String),

    #[error("no origin")]
    NoOrigin,

    #[error("{nick} not on channel {channel}")]
    UserNotInChannel { nick: String, channel: String },

    #[error("not on channel {0}")]
    NotOnChannel(String),

    #[error("password mismatch")]
    PasswordMismatch,

    #[error("unknown channel mode {0}")]
    UnknownMode(char),

    #[error("not an operator")]
    NoPrivileges,

    #[error("not channel operator on {0}")]
    ChanOpPrivsNeeded(String),

    #[error("unknown user mode flag")]
    UmodeUnknownFlag,

    #[error("cannot change mode for other users")]
    UsersDontMatch,
}

/// Outbound queue errors
///
/// Occurs when a line is queued for a user whose connection task is gone
/// or cannot keep up.
#[derive(Debug, Error)]
pub enum SendError {
    /// The connection task has dropped its receiver
    #[error("Channel closed")]
    ChannelClosed,

    /// The outbound queue is at capacity
    #[error("SendQ exceeded")]
    QueueFull,
}
