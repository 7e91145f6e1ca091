//! Line protocol spoken between the whack-a-mole server and its players.
//!
//! Every message is a single UTF-8 line with `:` separated fields. The types
//! here only translate between lines and structured values; they hold no state.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

pub mod lines;

/// Width and height of the mole board.
pub const GRID_SIZE: u8 = 3;
pub const DEFAULT_PORT: u16 = 12345;

pub const FIELD_SEPARATOR: char = ':';
pub const LIST_SEPARATOR: char = ',';

/// Longest line either side accepts, excluding the newline.
pub const MAX_LINE_LEN: usize = 256;

/// Sent by the server when the requested player name is already connected.
pub const NAME_TAKEN: &str = "NAME_TAKEN";
/// Sent by the server when the handshake succeeded.
pub const CONNECTED: &str = "CONNECTED";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("empty line")]
    Empty,
    #[error("unknown message type `{0}`")]
    UnknownCommand(String),
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("invalid value `{value}` for field `{field}`")]
    InvalidField { field: &'static str, value: String },
}

/// Client to server messages sent after the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Hit { x: u8, y: u8, timestamp: u64 },
    Disconnect,
}

/// One entry of a `SCORES` snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreEntry {
    pub name: String,
    pub score: u32,
}

impl ScoreEntry {
    pub fn new(name: impl Into<String>, score: u32) -> Self {
        Self {
            name: name.into(),
            score,
        }
    }
}

/// Server to client messages, broadcast to every connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    GameStart { duration_secs: u64 },
    MoleSpawn { x: u8, y: u8 },
    Scores(Vec<ScoreEntry>),
    ExtraTime {
        duration_secs: u64,
        participants: Vec<String>,
    },
    GameEnd { winner: String, score: u32 },
    GameStopped,
}

/// Returns true if `(x, y)` addresses a cell on the board.
pub fn in_grid(x: u8, y: u8) -> bool {
    x < GRID_SIZE && y < GRID_SIZE
}

/// Returns true if `name` can travel inside `SCORES`, `EXTRA_TIME` and `GAME_END`.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.contains([FIELD_SEPARATOR, LIST_SEPARATOR])
}

// Get current timestamp in milliseconds
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}

fn next_field<'a>(
    fields: &mut impl Iterator<Item = &'a str>,
    name: &'static str,
) -> Result<&'a str, ProtocolError> {
    fields.next().ok_or(ProtocolError::MissingField(name))
}

fn parse_field<'a, T: FromStr>(
    fields: &mut impl Iterator<Item = &'a str>,
    name: &'static str,
) -> Result<T, ProtocolError> {
    let raw = next_field(fields, name)?;
    raw.trim().parse().map_err(|_| ProtocolError::InvalidField {
        field: name,
        value: raw.to_string(),
    })
}

fn strip_line(line: &str) -> Result<&str, ProtocolError> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return Err(ProtocolError::Empty);
    }
    Ok(line)
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Hit { x, y, timestamp } => write!(f, "HIT:{}:{}:{}", x, y, timestamp),
            Command::Disconnect => write!(f, "DISCONNECT"),
        }
    }
}

impl FromStr for Command {
    type Err = ProtocolError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = strip_line(line)?;
        let mut fields = line.split(FIELD_SEPARATOR);
        let kind = next_field(&mut fields, "type")?;

        match kind {
            "HIT" => Ok(Command::Hit {
                x: parse_field(&mut fields, "x")?,
                y: parse_field(&mut fields, "y")?,
                timestamp: parse_field(&mut fields, "timestamp")?,
            }),
            "DISCONNECT" => Ok(Command::Disconnect),
            other => Err(ProtocolError::UnknownCommand(other.to_string())),
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::GameStart { duration_secs } => write!(f, "GAME_START:{}", duration_secs),
            Event::MoleSpawn { x, y } => write!(f, "MOLE_SPAWN:{}:{}", x, y),
            Event::Scores(entries) => {
                write!(f, "SCORES")?;
                for entry in entries {
                    write!(f, ":{},{}", entry.name, entry.score)?;
                }
                Ok(())
            }
            Event::ExtraTime {
                duration_secs,
                participants,
            } => write!(f, "EXTRA_TIME:{}:{}", duration_secs, participants.join(",")),
            Event::GameEnd { winner, score } => write!(f, "GAME_END:{}:{}", winner, score),
            Event::GameStopped => write!(f, "GAME_STOPPED"),
        }
    }
}

impl FromStr for Event {
    type Err = ProtocolError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = strip_line(line)?;
        let mut fields = line.split(FIELD_SEPARATOR);
        let kind = next_field(&mut fields, "type")?;

        match kind {
            "GAME_START" => Ok(Event::GameStart {
                duration_secs: parse_field(&mut fields, "duration")?,
            }),
            "MOLE_SPAWN" => Ok(Event::MoleSpawn {
                x: parse_field(&mut fields, "x")?,
                y: parse_field(&mut fields, "y")?,
            }),
            "SCORES" => {
                let mut entries = Vec::new();
                for pair in fields.filter(|pair| !pair.is_empty()) {
                    let (name, score) =
                        pair.rsplit_once(LIST_SEPARATOR)
                            .ok_or_else(|| ProtocolError::InvalidField {
                                field: "score entry",
                                value: pair.to_string(),
                            })?;
                    let score = score.parse().map_err(|_| ProtocolError::InvalidField {
                        field: "score",
                        value: score.to_string(),
                    })?;
                    entries.push(ScoreEntry::new(name, score));
                }
                Ok(Event::Scores(entries))
            }
            "EXTRA_TIME" => {
                let duration_secs = parse_field(&mut fields, "duration")?;
                let participants = next_field(&mut fields, "participants")?
                    .split(LIST_SEPARATOR)
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .collect();
                Ok(Event::ExtraTime {
                    duration_secs,
                    participants,
                })
            }
            "GAME_END" => {
                // Names never contain ':', so the score is after the last one
                let rest = line
                    .strip_prefix("GAME_END:")
                    .ok_or(ProtocolError::MissingField("winner"))?;
                let (winner, score) = rest
                    .rsplit_once(FIELD_SEPARATOR)
                    .ok_or(ProtocolError::MissingField("score"))?;
                let score = score.parse().map_err(|_| ProtocolError::InvalidField {
                    field: "score",
                    value: score.to_string(),
                })?;
                Ok(Event::GameEnd {
                    winner: winner.to_string(),
                    score,
                })
            }
            "GAME_STOPPED" => Ok(Event::GameStopped),
            other => Err(ProtocolError::UnknownCommand(other.to_string())),
        }
    }
}
