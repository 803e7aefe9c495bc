//! Helpers for driving `ServerState` without sockets

use std::time::Instant;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::command::Dispatcher;
use crate::config::{Config, OperatorConfig};
use crate::server::ServerState;
use crate::types::ClientId;

/// State with one configured operator (`root` / `toor`)
pub fn test_state() -> ServerState {
    ServerState::new(Config {
        server_name: "irc.test".to_string(),
        operators: vec![OperatorConfig {
            name: "root".to_string(),
            password: "toor".to_string(),
        }],
        ..Config::default()
    })
}

/// A fake connection: its id, the receiving end of its queue and the
/// token a real connection task would wait on
pub struct TestClient {
    pub id: ClientId,
    pub close: CancellationToken,
    rx: mpsc::Receiver<String>,
}

impl TestClient {
    pub fn connect(state: &mut ServerState) -> Self {
        Self::connect_with_capacity(state, 256)
    }

    pub fn connect_with_capacity(state: &mut ServerState, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        let id = ClientId::new();
        let close = state.accept(id, "127.0.0.1:40000".parse().unwrap(), tx);
        Self { id, close, rx }
    }

    /// Connect and complete NICK/USER
    pub fn register(state: &mut ServerState, dispatcher: &Dispatcher, nick: &str) -> Self {
        let client = Self::connect(state);
        client.send(state, dispatcher, &format!("NICK {}", nick));
        client.send(state, dispatcher, &format!("USER {} 0 * :Test User", nick));
        assert!(
            state.registry.user(client.id).unwrap().is_registered(),
            "{} failed to register",
            nick
        );
        client
    }

    /// Feed one line as if it had been read from the socket
    pub fn send(&self, state: &mut ServerState, dispatcher: &Dispatcher, line: &str) {
        state.handle_line(dispatcher, self.id, line, Instant::now());
    }

    /// Everything queued for this client so far
    pub fn drain(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        while let Ok(line) = self.rx.try_recv() {
            lines.push(line);
        }
        lines
    }

    /// Numeric codes among the queued lines
    pub fn numerics(&mut self) -> Vec<u16> {
        self.drain()
            .iter()
            .filter_map(|line| line.split(' ').nth(1)?.parse().ok())
            .collect()
    }
}
