//! Server actor implementation
//!
//! `Server` is the single control loop. It owns the listening socket, the
//! set of connection tasks and all protocol state (`ServerState`), and
//! `select!`s over three event sources:
//! - the listener, for new connections
//! - the command channel, fed with lines and disconnects by connection tasks
//! - a one-second ticker that drives the PING/PONG liveness check
//!
//! Every state mutation happens inside this task, one event at a time, so
//! users and channels need no locking.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::command::Dispatcher;
use crate::config::Config;
use crate::connection::handle_connection;
use crate::error::CommandError;
use crate::registry::Registry;
use crate::reply::{self, NumericReply};
use crate::types::ClientId;
use crate::user::User;

/// Channel buffer size for connection → server events
const COMMAND_BUFFER_SIZE: usize = 256;

/// Resolution of the liveness check
const LIVENESS_TICK: Duration = Duration::from_secs(1);

/// Time allowed for connection tasks to flush after DIE
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Events sent from connection tasks to the server
#[derive(Debug)]
pub enum ServerCommand {
    /// A complete line was received
    Line { client_id: ClientId, line: String },
    /// The connection's byte stream ended or failed
    Disconnect { client_id: ClientId, reason: String },
}

/// Whether the loop keeps serving
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    ShuttingDown,
}

/// All protocol state mutated by command handlers
pub struct ServerState {
    pub config: Config,
    pub registry: Registry,
    /// Shown in RPL_CREATED
    pub created_at: DateTime<Local>,
    pub run_state: RunState,
}

impl ServerState {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            registry: Registry::new(),
            created_at: Local::now(),
            run_state: RunState::Running,
        }
    }

    pub fn server_name(&self) -> &str {
        &self.config.server_name
    }

    pub fn is_running(&self) -> bool {
        self.run_state == RunState::Running
    }

    /// Create the user for an accepted connection
    ///
    /// The returned token is cancelled once the user is removed, telling
    /// the connection task to close its socket.
    pub fn accept(
        &mut self,
        client_id: ClientId,
        addr: SocketAddr,
        sender: mpsc::Sender<String>,
    ) -> CancellationToken {
        info!("Client {} connected from {}", client_id, addr);
        let close = CancellationToken::new();
        self.registry
            .add_user(User::new(client_id, addr, sender, close.clone()));
        debug!(
            "Total users: {}, Total channels: {}",
            self.registry.user_count(),
            self.registry.channel_count()
        );
        close
    }

    /// Run one received line through the dispatcher
    pub fn handle_line(&mut self, dispatcher: &Dispatcher, client_id: ClientId, line: &str, now: Instant) {
        let Some(user) = self.registry.user_mut(client_id) else {
            return;
        };
        user.touch(now);
        debug!("<- {} {}", client_id, line);

        dispatcher.dispatch(self, client_id, line);
        self.reap();
    }

    /// Send a numeric reply to one user
    pub fn reply(&mut self, client_id: ClientId, reply: NumericReply) {
        let Some(user) = self.registry.user_mut(client_id) else {
            return;
        };
        let line = reply.render(&self.config.server_name, &user.nickname);
        let _ = user.send(line);
    }

    /// Send the numeric for a refused command
    pub fn reply_error(&mut self, client_id: ClientId, err: &CommandError) {
        self.reply(client_id, NumericReply::from(err));
    }

    /// Send a server NOTICE to one user
    pub fn notice(&mut self, client_id: ClientId, text: &str) {
        let Some(user) = self.registry.user_mut(client_id) else {
            return;
        };
        let line = reply::command(
            &self.config.server_name,
            "NOTICE",
            &format!("{} :{}", user.display_nick(), text),
        );
        let _ = user.send(line);
    }

    /// Tear down a user: QUIT to peers, ERROR to the user, then removal
    ///
    /// The removal cascades through every channel before returning.
    pub fn disconnect(&mut self, client_id: ClientId, reason: &str) {
        let Some(user) = self.registry.user(client_id) else {
            return;
        };
        let registered = user.is_registered();
        let quit = reply::command(&user.prefix(), "QUIT", &format!(":{}", reason));
        let closing = reply::closing_link(&user.hostname, reason);

        if registered {
            self.registry.send_to_peers(client_id, &quit);
        }
        self.registry.send_to(client_id, closing);

        if let Some(user) = self.registry.remove_user(client_id) {
            info!(
                "Client {} ({} from {}) disconnected: {}",
                client_id,
                user.display_nick(),
                user.addr,
                reason
            );
        }
        debug!(
            "Total users: {}, Total channels: {}",
            self.registry.user_count(),
            self.registry.channel_count()
        );
    }

    /// Disconnect every user flagged by a handler or a full queue
    pub fn reap(&mut self) {
        loop {
            let pending = self.registry.pending_quits();
            if pending.is_empty() {
                break;
            }
            for (client_id, reason) in pending {
                self.disconnect(client_id, &reason);
            }
        }
    }

    /// PING idle connections and drop those that never answered
    pub fn check_liveness(&mut self, now: Instant) {
        let interval = self.config.ping_interval();
        let timeout = self.config.ping_timeout();
        let ping = format!("PING :{}", self.config.server_name);

        let mut expired = Vec::new();
        for user in self.registry.users_mut() {
            match user.ping_sent {
                Some(sent) if now.saturating_duration_since(sent) >= timeout => {
                    expired.push(user.id);
                }
                Some(_) => {}
                None if now.saturating_duration_since(user.last_activity) >= interval => {
                    user.ping_sent = Some(now);
                    let _ = user.send(ping.clone());
                }
                None => {}
            }
        }

        for client_id in expired {
            self.disconnect(
                client_id,
                &format!("Ping timeout: {} seconds", timeout.as_secs()),
            );
        }
        self.reap();
    }

    /// Close every connection and stop the loop
    pub fn shutdown(&mut self) {
        self.run_state = RunState::ShuttingDown;
        let ids: Vec<ClientId> = self.registry.users().map(|u| u.id).collect();
        for client_id in ids {
            self.registry
                .send_to(client_id, "ERROR :Server shutting down".to_string());
            self.registry.remove_user(client_id);
        }
    }
}

/// The connection multiplexer
pub struct Server {
    state: ServerState,
    dispatcher: Dispatcher,
    /// Running connection tasks
    connections: JoinSet<()>,
    /// Handed to each connection task
    cmd_tx: mpsc::Sender<ServerCommand>,
    /// Command receiver channel
    receiver: mpsc::Receiver<ServerCommand>,
}

impl Server {
    pub fn new(config: Config) -> Self {
        let (cmd_tx, receiver) = mpsc::channel(COMMAND_BUFFER_SIZE);
        Self {
            state: ServerState::new(config),
            dispatcher: Dispatcher::new(),
            connections: JoinSet::new(),
            cmd_tx,
            receiver,
        }
    }

    /// Run the event loop until an operator issues DIE
    pub async fn run(mut self, listener: TcpListener) {
        info!("Server {} started", self.state.server_name());

        let mut ticker = time::interval(LIVENESS_TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while self.state.is_running() {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => self.accept(stream, addr),
                    Err(e) => warn!("Failed to accept connection: {}", e),
                },
                Some(cmd) = self.receiver.recv() => self.handle_command(cmd),
                _ = ticker.tick() => self.state.check_liveness(Instant::now()),
                Some(_) = self.connections.join_next() => {}
            }
        }

        info!("Server shutting down");
        drop(listener);
        // Connection tasks must not block on a receiver nobody polls
        drop(self.receiver);

        let mut connections = self.connections;
        let drain = async { while connections.join_next().await.is_some() {} };
        if time::timeout(SHUTDOWN_GRACE, drain).await.is_err() {
            warn!("Connections still open after shutdown grace period");
        }
    }

    fn accept(&mut self, stream: TcpStream, addr: SocketAddr) {
        let client_id = ClientId::new();
        let (line_tx, line_rx) = mpsc::channel(self.state.config.sendq_lines);
        let close = self.state.accept(client_id, addr, line_tx);

        let cmd_tx = self.cmd_tx.clone();
        let max_line_len = self.state.config.max_line_len;
        self.connections.spawn(async move {
            let conn = handle_connection(stream, client_id, line_rx, close, cmd_tx, max_line_len);
            if let Err(e) = conn.await {
                error!("Connection handler error: {}", e);
            }
        });
    }

    fn handle_command(&mut self, cmd: ServerCommand) {
        match cmd {
            ServerCommand::Line { client_id, line } => {
                self.state
                    .handle_line(&self.dispatcher, client_id, &line, Instant::now());
            }
            ServerCommand::Disconnect { client_id, reason } => {
                self.state.disconnect(client_id, &reason);
            }
        }
    }
}
