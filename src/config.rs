//! Server configuration
//!
//! Loaded from an optional TOML file, then overridden by command-line
//! arguments in `main`. Every field has a default so an empty file (or no
//! file at all) yields a runnable server.

use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::Duration;

use serde::Deserialize;

use crate::error::AppError;

/// Smallest `max_line_len` accepted by `validate`
const MIN_LINE_LEN: usize = 64;

/// A server operator credential checked by OPER
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct OperatorConfig {
    pub name: String,
    pub password: String,
}

/// Complete runtime configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// IPv4 address to listen on
    pub bind: Ipv4Addr,
    /// TCP port to listen on
    pub port: u16,
    /// Connection password required by PASS (none = open server)
    pub password: Option<String>,
    /// Name used as the prefix of server-originated lines
    pub server_name: String,
    /// Idle time before the server sends a PING
    pub ping_interval_secs: u64,
    /// Time allowed for any reply after a PING before disconnecting
    pub ping_timeout_secs: u64,
    /// Maximum inbound line length in bytes, terminator included
    pub max_line_len: usize,
    /// Outbound queue capacity per connection, in lines
    pub sendq_lines: usize,
    /// Credentials accepted by OPER
    pub operators: Vec<OperatorConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: Ipv4Addr::LOCALHOST,
            port: 6667,
            password: None,
            server_name: "ircrelay.local".to_string(),
            ping_interval_secs: 90,
            ping_timeout_secs: 120,
            max_line_len: 512,
            sendq_lines: 1024,
            operators: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub async fn load(path: &str) -> Result<Self, AppError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| AppError::ConfigRead {
                path: path.to_string(),
                source,
            })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self, AppError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the server cannot run with
    pub fn validate(&self) -> Result<(), AppError> {
        if self.server_name.is_empty() || self.server_name.contains(' ') {
            return Err(AppError::InvalidConfig(
                "server_name must be a non-empty token".to_string(),
            ));
        }
        if self.ping_interval_secs == 0 || self.ping_timeout_secs == 0 {
            return Err(AppError::InvalidConfig(
                "ping timeouts must be positive".to_string(),
            ));
        }
        if self.max_line_len < MIN_LINE_LEN {
            return Err(AppError::InvalidConfig(format!(
                "max_line_len must be at least {}",
                MIN_LINE_LEN
            )));
        }
        if self.sendq_lines == 0 {
            return Err(AppError::InvalidConfig(
                "sendq_lines must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Address the listener binds to
    pub fn listen_addr(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.bind, self.port)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_secs(self.ping_timeout_secs)
    }

    /// Look up an operator credential
    pub fn check_operator(&self, name: &str, password: &str) -> bool {
        self.operators
            .iter()
            .any(|op| op.name == name && op.password == password)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.port, 6667);
        assert_eq!(config.server_name, "ircrelay.local");
        assert!(config.password.is_none());
        assert_eq!(config.max_line_len, 512);
    }

    #[test]
    fn test_toml_overrides_and_operators() {
        let config = Config::from_toml(
            r#"
            port = 7000
            password = "hunter2"
            server_name = "irc.example.org"

            [[operators]]
            name = "root"
            password = "toor"
            "#,
        )
        .unwrap();

        assert_eq!(config.port, 7000);
        assert_eq!(config.password.as_deref(), Some("hunter2"));
        assert!(config.check_operator("root", "toor"));
        assert!(!config.check_operator("root", "wrong"));
        assert!(!config.check_operator("nobody", "toor"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(Config::from_toml("server_name = \"\"").is_err());
        assert!(Config::from_toml("ping_timeout_secs = 0").is_err());
        assert!(Config::from_toml("max_line_len = 10").is_err());
        assert!(Config::from_toml("sendq_lines = 0").is_err());
    }

    #[test]
    fn test_parse_error_is_reported() {
        let err = Config::from_toml("port = \"not a number\"").unwrap_err();
        assert!(matches!(err, AppError::ConfigParse(_)));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = 6697").unwrap();
        writeln!(file, "ping_interval_secs = 30").unwrap();

        let config = Config::load(file.path().to_str().unwrap()).await.unwrap();
        assert_eq!(config.port, 6697);
        assert_eq!(config.ping_interval(), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let err = Config::load("/nonexistent/ircrelay.toml").await.unwrap_err();
        assert!(matches!(err, AppError::ConfigRead { .. }));
    }
}
