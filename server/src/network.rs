//! Server network layer: TCP connections, the event loop and the operator handle

use crate::config::ServerConfig;
use crate::game::{Effect, GameState, Generation, HitOutcome, StartError, StopError};
use crate::registry::{failures, ConnectionId, LineSender, Registry, RegistryError};
use crate::scheduler::{RoundTimer, SpawnScheduler};
use crate::utils::clean_player_name;
use log::{debug, error, info, warn};
use shared::lines::{read_line, LineRead};
use shared::{current_timestamp, Command, ProtocolError, CONNECTED, NAME_TAKEN};
use std::net::SocketAddr;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Messages sent from connection, timer and operator tasks to the event loop
#[derive(Debug)]
pub enum ServerMessage {
    Join {
        name: String,
        addr: SocketAddr,
        sender: LineSender,
        reply: oneshot::Sender<Result<ConnectionId, RegistryError>>,
    },
    Command {
        name: String,
        id: ConnectionId,
        command: Command,
    },
    ConnectionClosed {
        name: String,
        id: ConnectionId,
        reason: String,
    },
    SpawnTick {
        generation: Generation,
    },
    TimerExpired {
        generation: Generation,
    },
    Operator(OperatorRequest),
    Shutdown,
}

/// Administrative requests, each answered over a oneshot channel
#[derive(Debug)]
pub enum OperatorRequest {
    Start {
        reply: oneshot::Sender<Result<(), StartError>>,
    },
    Stop {
        reply: oneshot::Sender<Result<(), StopError>>,
    },
    PlayerCount {
        reply: oneshot::Sender<usize>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControlError {
    #[error(transparent)]
    Start(#[from] StartError),
    #[error(transparent)]
    Stop(#[from] StopError),
    #[error("server event loop is not running")]
    ServerGone,
}

/// Cloneable control surface for the operator console and tests
#[derive(Debug, Clone)]
pub struct ServerHandle {
    server_tx: mpsc::UnboundedSender<ServerMessage>,
}

impl ServerHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> OperatorRequest,
    ) -> Result<T, ControlError> {
        let (reply, response) = oneshot::channel();
        self.server_tx
            .send(ServerMessage::Operator(build(reply)))
            .map_err(|_| ControlError::ServerGone)?;
        response.await.map_err(|_| ControlError::ServerGone)
    }

    pub async fn start_round(&self) -> Result<(), ControlError> {
        self.request(|reply| OperatorRequest::Start { reply })
            .await?
            .map_err(ControlError::from)
    }

    pub async fn stop_round(&self) -> Result<(), ControlError> {
        self.request(|reply| OperatorRequest::Stop { reply })
            .await?
            .map_err(ControlError::from)
    }

    pub async fn player_count(&self) -> Result<usize, ControlError> {
        self.request(|reply| OperatorRequest::PlayerCount { reply })
            .await
    }

    pub fn shutdown(&self) {
        if self.server_tx.send(ServerMessage::Shutdown).is_err() {
            debug!("Server already stopped");
        }
    }
}

/// Authoritative server owning the registry, the round and its timers
///
/// Every producer (connection readers and writers, the spawn chain, the round
/// timer, the operator) talks to the event loop in [`Server::run`] through one
/// channel, so all state changes are applied one message at a time.
pub struct Server {
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    registry: Registry,
    game: GameState,
    spawner: SpawnScheduler,
    round_timer: RoundTimer,
    acceptor: Option<JoinHandle<()>>,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    pub async fn new(config: ServerConfig) -> Result<Self, BoxError> {
        config.validate()?;

        let listener = TcpListener::bind(&config.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        info!("Server listening on {}", local_addr);

        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener: Some(listener),
            local_addr,
            registry: Registry::new(),
            game: GameState::new(&config),
            spawner: SpawnScheduler::new(),
            round_timer: RoundTimer::new(),
            acceptor: None,
            server_tx,
            server_rx,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            server_tx: self.server_tx.clone(),
        }
    }

    /// Spawns task that accepts players and starts their connection tasks
    fn spawn_acceptor(&mut self) {
        let Some(listener) = self.listener.take() else {
            return;
        };
        let server_tx = self.server_tx.clone();

        self.acceptor = Some(tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        debug!("Accepted connection from {}", addr);
                        let server_tx = server_tx.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, addr, server_tx).await {
                                error!("Connection {} failed: {}", addr, e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                    }
                }
            }
        }));
    }

    /// Applies one message to the server state. Returns false on shutdown.
    pub fn handle_message(&mut self, message: ServerMessage) -> bool {
        match message {
            ServerMessage::Join {
                name,
                addr,
                sender,
                reply,
            } => self.handle_join(name, addr, sender, reply),

            ServerMessage::Command { name, id, command } => {
                self.handle_command(&name, id, command);
            }

            ServerMessage::ConnectionClosed { name, id, reason } => {
                self.disconnect(&name, id, &reason);
            }

            ServerMessage::SpawnTick { generation } => {
                let effects =
                    self.game
                        .spawn_target(generation, &mut rand::thread_rng(), current_timestamp());
                self.apply_effects(effects);
            }

            ServerMessage::TimerExpired { generation } => {
                let effects = self.game.timer_expired(generation);
                self.apply_effects(effects);
            }

            ServerMessage::Operator(request) => self.handle_operator(request),

            ServerMessage::Shutdown => {
                info!("Server shutting down");
                self.spawner.stop();
                self.round_timer.cancel();
                if let Some(acceptor) = self.acceptor.take() {
                    acceptor.abort();
                }
                return false;
            }
        }
        true
    }

    fn handle_join(
        &mut self,
        name: String,
        addr: SocketAddr,
        sender: LineSender,
        reply: oneshot::Sender<Result<ConnectionId, RegistryError>>,
    ) {
        match self.registry.register(&name, addr, sender) {
            Ok(id) => {
                // Queued before any broadcast can reach the new connection
                self.registry.send_to(&name, CONNECTED);
                let effects = self.game.add_player(&name);
                if reply.send(Ok(id)).is_err() {
                    // Connection task died during the handshake
                    self.disconnect(&name, id, "handshake abandoned");
                    return;
                }
                self.apply_effects(effects);
            }
            Err(e) => {
                info!("Rejected player from {}: {}", addr, e);
                let _ = reply.send(Err(e));
            }
        }
    }

    fn handle_command(&mut self, name: &str, id: ConnectionId, command: Command) {
        if !self.registry.is_current(name, id) {
            debug!("Dropping command from stale connection {} ({})", name, id);
            return;
        }

        match command {
            Command::Hit { x, y, timestamp } => {
                let (outcome, effects) = self.game.handle_hit(name, x, y, timestamp);
                if outcome == HitOutcome::Ignored {
                    debug!("Ignored hit from {} in {:?}", name, self.game.phase());
                }
                self.apply_effects(effects);
            }
            Command::Disconnect => self.disconnect(name, id, "player left"),
        }
    }

    fn handle_operator(&mut self, request: OperatorRequest) {
        match request {
            OperatorRequest::Start { reply } => {
                let result = self.game.start_round().map(|effects| self.apply_effects(effects));
                if let Err(e) = &result {
                    warn!("Start request rejected: {}", e);
                }
                let _ = reply.send(result);
            }
            OperatorRequest::Stop { reply } => {
                let result = self.game.stop_round().map(|effects| self.apply_effects(effects));
                if let Err(e) = &result {
                    warn!("Stop request rejected: {}", e);
                }
                let _ = reply.send(result);
            }
            OperatorRequest::PlayerCount { reply } => {
                let _ = reply.send(self.registry.count());
            }
        }
    }

    /// Removes a player everywhere; later broadcasts never reach it
    fn disconnect(&mut self, name: &str, id: ConnectionId, reason: &str) {
        if self.registry.unregister(name, id).is_some() {
            info!("Removing player {} ({})", name, reason);
            let effects = self.game.remove_player(name);
            self.apply_effects(effects);
        }
    }

    fn apply_effects(&mut self, effects: Vec<Effect>) {
        let mut failed = Vec::new();

        for effect in effects {
            match effect {
                Effect::Broadcast(event) => {
                    failed.extend(failures(self.registry.broadcast(&event)));
                }
                Effect::StartSpawner {
                    cadence,
                    generation,
                } => {
                    let server_tx = self.server_tx.clone();
                    self.spawner.start(cadence, move || {
                        let _ = server_tx.send(ServerMessage::SpawnTick { generation });
                    });
                }
                Effect::StopSpawner => self.spawner.stop(),
                Effect::ArmTimer { after, generation } => {
                    let server_tx = self.server_tx.clone();
                    self.round_timer.arm(after, move || {
                        let _ = server_tx.send(ServerMessage::TimerExpired { generation });
                    });
                }
                Effect::CancelTimer => self.round_timer.cancel(),
            }
        }

        for (name, id, reason) in failed {
            warn!("Delivery to {} failed: {}", name, reason);
            self.disconnect(&name, id, &reason);
        }
    }

    /// Main server loop: accepts players and applies messages until shutdown
    pub async fn run(&mut self) -> Result<(), BoxError> {
        self.spawn_acceptor();
        info!("Server started successfully");

        while let Some(message) = self.server_rx.recv().await {
            if !self.handle_message(message) {
                break;
            }
        }

        Ok(())
    }
}

async fn write_line(writer: &mut OwnedWriteHalf, line: &str) -> std::io::Result<()> {
    let mut bytes = Vec::with_capacity(line.len() + 1);
    bytes.extend_from_slice(line.as_bytes());
    bytes.push(b'\n');
    writer.write_all(&bytes).await
}

/// Drains a connection's outbound queue onto its socket
///
/// A write error is reported as a disconnect. The loop also ends when the
/// registry drops the queue, after which the socket is shut down. Either way
/// `closed` fires so the reader stops too.
fn spawn_writer(
    mut writer: OwnedWriteHalf,
    mut lines: mpsc::UnboundedReceiver<String>,
    closed: watch::Sender<bool>,
    name: String,
    id: ConnectionId,
    server_tx: mpsc::UnboundedSender<ServerMessage>,
) {
    tokio::spawn(async move {
        while let Some(line) = lines.recv().await {
            if let Err(e) = write_line(&mut writer, &line).await {
                warn!("Write to {} failed: {}", name, e);
                let _ = server_tx.send(ServerMessage::ConnectionClosed {
                    name,
                    id,
                    reason: format!("write error: {}", e),
                });
                let _ = closed.send(true);
                return;
            }
        }
        let _ = writer.shutdown().await;
        let _ = closed.send(true);
    });
}

/// Runs the handshake and the read loop for one player
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    server_tx: mpsc::UnboundedSender<ServerMessage>,
) -> Result<(), BoxError> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut buf = Vec::new();

    let first_line = match read_line(&mut reader, &mut buf).await? {
        LineRead::Line(line) => line,
        LineRead::Closed => {
            debug!("{} closed before sending a name", addr);
            return Ok(());
        }
        LineRead::NotUtf8(_) | LineRead::TooLong => String::new(),
    };
    let Some(name) = clean_player_name(&first_line).map(str::to_string) else {
        write_line(&mut write_half, NAME_TAKEN).await?;
        write_half.shutdown().await?;
        return Ok(());
    };

    let (sender, outbound) = mpsc::unbounded_channel();
    let (reply, response) = oneshot::channel();
    server_tx
        .send(ServerMessage::Join {
            name: name.clone(),
            addr,
            sender,
            reply,
        })
        .map_err(|_| "server event loop stopped")?;

    let id = match response.await? {
        Ok(id) => id,
        Err(RegistryError::NameTaken(_)) => {
            write_line(&mut write_half, NAME_TAKEN).await?;
            write_half.shutdown().await?;
            return Ok(());
        }
    };

    let (closed, closed_rx) = watch::channel(false);
    spawn_writer(
        write_half,
        outbound,
        closed,
        name.clone(),
        id,
        server_tx.clone(),
    );

    let reason = read_commands(&mut reader, buf, &name, id, &server_tx, closed_rx).await;
    let _ = server_tx.send(ServerMessage::ConnectionClosed { name, id, reason });
    Ok(())
}

/// Forwards parsed commands until the peer leaves or the connection is dropped
///
/// Malformed lines, including invalid UTF-8, are logged and skipped. Returns
/// the reason the loop ended.
async fn read_commands<R>(
    reader: &mut R,
    mut buf: Vec<u8>,
    name: &str,
    id: ConnectionId,
    server_tx: &mpsc::UnboundedSender<ServerMessage>,
    mut closed: watch::Receiver<bool>,
) -> String
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let read = tokio::select! {
            _ = closed.changed() => return "connection dropped".to_string(),
            read = read_line(reader, &mut buf) => read,
        };

        let line = match read {
            Ok(LineRead::Line(line)) => line,
            Ok(LineRead::NotUtf8(bytes)) => {
                warn!("Ignoring non UTF-8 line {:?} from {}", bytes, name);
                continue;
            }
            Ok(LineRead::TooLong) => return "line too long".to_string(),
            Ok(LineRead::Closed) => return "connection closed".to_string(),
            Err(e) => return format!("read error: {}", e),
        };

        match line.parse::<Command>() {
            Ok(Command::Disconnect) => return "player left".to_string(),
            Ok(command) => {
                let message = ServerMessage::Command {
                    name: name.to_string(),
                    id,
                    command,
                };
                if server_tx.send(message).is_err() {
                    return "server stopped".to_string();
                }
            }
            Err(ProtocolError::Empty) => {}
            Err(e) => warn!("Ignoring line {:?} from {}: {}", line, name, e),
        }
    }
}
