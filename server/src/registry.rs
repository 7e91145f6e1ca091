//! Connection registry for the whack-a-mole server
//!
//! This module tracks every live player connection, including:
//! - Name-based admission (a name may only be connected once)
//! - Connection identifiers so stale close notifications cannot evict a newer player
//! - Broadcast fan-out with per-connection failure reporting
//!
//! The registry is owned by the server's event loop, so every mutation is
//! serialized with the game state. Broadcasting only pushes lines into each
//! connection's outbound queue; it never waits on a socket.

use log::{debug, info};
use shared::Event;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::mpsc;

pub type ConnectionId = u64;

/// Outbound queue of encoded lines drained by a connection's writer task
pub type LineSender = mpsc::UnboundedSender<String>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("player name `{0}` is already connected")]
    NameTaken(String),
}

/// Outcome of delivering one broadcast line to one connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    Failed {
        name: String,
        id: ConnectionId,
        reason: String,
    },
}

/// A registered player connection
#[derive(Debug)]
pub struct Connection {
    /// Unique identifier assigned at registration
    pub id: ConnectionId,
    pub name: String,
    pub addr: SocketAddr,
    pub connected_at: Instant,
    sender: LineSender,
}

impl Connection {
    fn new(id: ConnectionId, name: String, addr: SocketAddr, sender: LineSender) -> Self {
        Self {
            id,
            name,
            addr,
            connected_at: Instant::now(),
            sender,
        }
    }

    /// Queues a line for this connection's writer task
    ///
    /// Fails once the writer has gone away, which means the socket is dead.
    pub fn send_line(&self, line: &str) -> Result<(), String> {
        self.sender
            .send(line.to_string())
            .map_err(|_| "outbound channel closed".to_string())
    }

    pub fn uptime(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

/// Manages all connected players keyed by their unique name
pub struct Registry {
    connections: HashMap<String, Connection>,
    next_connection_id: ConnectionId,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            connections: HashMap::new(),
            next_connection_id: 1,
        }
    }

    /// Registers a new connection under `name`
    ///
    /// Returns the connection id, or `NameTaken` if a live connection already
    /// uses that name. Names are compared case-sensitively.
    pub fn register(
        &mut self,
        name: &str,
        addr: SocketAddr,
        sender: LineSender,
    ) -> Result<ConnectionId, RegistryError> {
        if self.connections.contains_key(name) {
            return Err(RegistryError::NameTaken(name.to_string()));
        }

        let id = self.next_connection_id;
        self.next_connection_id += 1;

        info!("Player {} connected from {} (connection {})", name, addr, id);
        self.connections
            .insert(name.to_string(), Connection::new(id, name.to_string(), addr, sender));

        Ok(id)
    }

    /// Removes the connection registered as `name` if it is still connection `id`
    ///
    /// Dropping the returned connection closes its outbound queue, which lets
    /// the writer task finish and shut the socket down.
    pub fn unregister(&mut self, name: &str, id: ConnectionId) -> Option<Connection> {
        match self.connections.get(name) {
            Some(connection) if connection.id == id => {
                let connection = self.connections.remove(name)?;
                info!(
                    "Player {} disconnected after {:.1}s",
                    name,
                    connection.uptime().as_secs_f32()
                );
                Some(connection)
            }
            _ => None,
        }
    }

    /// Sends a line to one player
    pub fn send_to(&self, name: &str, line: &str) -> Delivery {
        match self.connections.get(name) {
            Some(connection) => deliver(connection, line),
            None => Delivery::Failed {
                name: name.to_string(),
                id: 0,
                reason: "not registered".to_string(),
            },
        }
    }

    /// Encodes `event` once and queues it for every registered connection
    ///
    /// Iterates over a snapshot of the current connections. A failed
    /// delivery is reported in the result and does not affect the others;
    /// the caller routes failures into the disconnect path.
    pub fn broadcast(&self, event: &Event) -> Vec<Delivery> {
        let line = event.to_string();
        debug!("Broadcasting {} to {} players", line, self.connections.len());

        self.snapshot()
            .into_iter()
            .map(|connection| deliver(connection, &line))
            .collect()
    }

    fn snapshot(&self) -> Vec<&Connection> {
        self.connections.values().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.connections.contains_key(name)
    }

    /// True if `name` is registered and still belongs to connection `id`
    pub fn is_current(&self, name: &str, id: ConnectionId) -> bool {
        self.connections
            .get(name)
            .map_or(false, |connection| connection.id == id)
    }

    pub fn count(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

fn deliver(connection: &Connection, line: &str) -> Delivery {
    match connection.send_line(line) {
        Ok(()) => Delivery::Sent,
        Err(reason) => Delivery::Failed {
            name: connection.name.clone(),
            id: connection.id,
            reason,
        },
    }
}

/// Filters a broadcast result down to the failed connections
pub fn failures(deliveries: Vec<Delivery>) -> Vec<(String, ConnectionId, String)> {
    deliveries
        .into_iter()
        .filter_map(|delivery| match delivery {
            Delivery::Sent => None,
            Delivery::Failed { name, id, reason } => Some((name, id, reason)),
        })
        .collect()
}
