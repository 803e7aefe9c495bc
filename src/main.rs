//! IRC relay - Entry Point
//!
//! Usage: `ircrelay [port] [password] [--config <path>] [-v]`
//!
//! Positional arguments override the config file, which overrides the
//! built-in defaults.

use std::net::Ipv4Addr;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use ircrelay::{AppError, Config, Server};

#[derive(Parser)]
#[command(name = "ircrelay")]
#[command(about = "A small single-server IRC relay")]
#[command(version)]
struct Cli {
    /// TCP port to listen on
    port: Option<u16>,

    /// Connection password clients must send with PASS
    password: Option<String>,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<String>,

    /// Address to bind
    #[arg(long)]
    bind: Option<Ipv4Addr>,

    /// Name the server announces in replies
    #[arg(long)]
    server_name: Option<String>,

    /// Verbose logging (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // RUST_LOG takes precedence over -v
    let default_level = match cli.verbose {
        0 => "ircrelay=info",
        1 => "ircrelay=debug",
        _ => "ircrelay=trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let mut config = match &cli.config {
        Some(path) => Config::load(path).await?,
        None => Config::default(),
    };
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(password) = cli.password {
        config.password = Some(password);
    }
    if let Some(bind) = cli.bind {
        config.bind = bind;
    }
    if let Some(server_name) = cli.server_name {
        config.server_name = server_name;
    }
    config.validate()?;

    let addr = config.listen_addr();
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", addr, e);
            return Err(AppError::Io(e).into());
        }
    };
    info!("IRC relay listening on {}", addr);
    if config.password.is_some() {
        info!("Connection password required");
    }

    Server::new(config).run(listener).await;
    info!("Server stopped");

    Ok(())
}
