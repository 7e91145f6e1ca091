use crate::game::ClientGameState;
use crate::input::{hit_command, parse_action, PlayerAction, USAGE};
use log::{debug, info, warn};
use shared::lines::{read_line, LineRead};
use shared::{Command, Event, ProtocolError, CONNECTED, NAME_TAKEN};
use std::io;
use thiserror::Error;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("the name {0:?} is already taken")]
    NameTaken(String),
    #[error("unexpected handshake reply {0:?}")]
    UnexpectedReply(String),
    #[error("the server closed the connection")]
    ConnectionClosed,
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub struct Client {
    reader: BufReader<OwnedReadHalf>,
    line_buf: Vec<u8>,
    writer: OwnedWriteHalf,
    game_state: ClientGameState,
}

impl Client {
    /// Connects and registers `name`, failing if the server refuses it
    pub async fn connect(server_addr: &str, name: &str) -> Result<Self, ClientError> {
        info!("Connecting to {} as {}", server_addr, name);

        let stream = TcpStream::connect(server_addr).await?;
        let (read_half, mut writer) = stream.into_split();
        let mut reader = BufReader::new(read_half);
        let mut line_buf = Vec::new();

        writer.write_all(format!("{}\n", name).as_bytes()).await?;

        let reply = match read_line(&mut reader, &mut line_buf).await? {
            LineRead::Line(line) => line,
            LineRead::Closed => return Err(ClientError::ConnectionClosed),
            LineRead::NotUtf8(bytes) => {
                return Err(ClientError::UnexpectedReply(
                    String::from_utf8_lossy(&bytes).into_owned(),
                ))
            }
            LineRead::TooLong => return Err(ClientError::UnexpectedReply("<too long>".to_string())),
        };
        match reply.trim_end() {
            CONNECTED => {}
            NAME_TAKEN => return Err(ClientError::NameTaken(name.to_string())),
            other => return Err(ClientError::UnexpectedReply(other.to_string())),
        }

        info!("Registered as {}", name);
        Ok(Client {
            reader,
            line_buf,
            writer,
            game_state: ClientGameState::new(name),
        })
    }

    pub fn game_state(&self) -> &ClientGameState {
        &self.game_state
    }

    pub async fn send(&mut self, command: &Command) -> Result<(), ClientError> {
        debug!("Sending {}", command);
        self.writer
            .write_all(format!("{}\n", command).as_bytes())
            .await?;
        Ok(())
    }

    /// Waits for the next well-formed event, or `None` once the server hangs up
    ///
    /// Malformed lines are logged and skipped. The event is also applied to the
    /// local game state.
    pub async fn next_event(&mut self) -> Result<Option<Event>, ClientError> {
        loop {
            let Some(line) = self.next_line().await? else {
                return Ok(None);
            };

            match line.parse::<Event>() {
                Ok(event) => {
                    self.game_state.apply_event(&event);
                    return Ok(Some(event));
                }
                Err(ProtocolError::Empty) => {}
                Err(e) => warn!("Ignoring server line {:?}: {}", line, e),
            }
        }
    }

    /// Next UTF-8 line from the server, skipping unreadable ones
    async fn next_line(&mut self) -> Result<Option<String>, ClientError> {
        loop {
            match read_line(&mut self.reader, &mut self.line_buf).await? {
                LineRead::Line(line) => return Ok(Some(line)),
                LineRead::Closed => return Ok(None),
                LineRead::NotUtf8(bytes) => warn!("Ignoring non UTF-8 server line {:?}", bytes),
                LineRead::TooLong => warn!("Ignoring overlong server line"),
            }
        }
    }

    /// Sends DISCONNECT and closes the write side
    pub async fn disconnect(mut self) -> Result<(), ClientError> {
        self.send(&Command::Disconnect).await?;
        self.writer.shutdown().await?;
        Ok(())
    }

    /// Plays interactively: prints server events and forwards typed hits
    pub async fn run(mut self, mut input: mpsc::UnboundedReceiver<String>) -> Result<(), ClientError> {
        println!("Connected. {}", USAGE);

        loop {
            tokio::select! {
                line = self.next_line() => {
                    let Some(line) = line? else {
                        println!("Server closed the connection");
                        return Ok(());
                    };
                    match line.parse::<Event>() {
                        Ok(event) => println!("{}", self.game_state.apply_event(&event)),
                        Err(ProtocolError::Empty) => {}
                        Err(e) => warn!("Ignoring server line {:?}: {}", line, e),
                    }
                }
                typed = input.recv() => {
                    let Some(typed) = typed else {
                        return self.disconnect().await;
                    };
                    match parse_action(&typed) {
                        Ok(PlayerAction::Hit { x, y }) => {
                            if !self.game_state.can_hit() {
                                println!("You can't hit right now");
                                continue;
                            }
                            self.send(&hit_command(x, y)).await?;
                        }
                        Ok(PlayerAction::Quit) => return self.disconnect().await,
                        Ok(PlayerAction::Help) => println!("{}", USAGE),
                        Err(e) => println!("{}", e),
                    }
                }
            }
        }
    }
}
