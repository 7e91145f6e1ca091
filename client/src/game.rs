//! Client-side view of the round, rebuilt from server events

use log::debug;
use shared::{Event, ScoreEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    Waiting,
    Playing,
    Overtime,
}

#[derive(Debug, Clone)]
pub struct ClientGameState {
    pub player_name: String,
    pub phase: RoundPhase,
    pub round_duration: Option<u64>,
    pub mole: Option<(u8, u8)>,
    pub scores: Vec<ScoreEntry>,
    pub overtime_players: Vec<String>,
    pub last_result: Option<(String, u32)>,
}

impl ClientGameState {
    pub fn new(player_name: impl Into<String>) -> Self {
        Self {
            player_name: player_name.into(),
            phase: RoundPhase::Waiting,
            round_duration: None,
            mole: None,
            scores: Vec::new(),
            overtime_players: Vec::new(),
            last_result: None,
        }
    }

    /// True while the server would accept a hit from this player
    pub fn can_hit(&self) -> bool {
        match self.phase {
            RoundPhase::Playing => true,
            RoundPhase::Overtime => self.overtime_players.contains(&self.player_name),
            RoundPhase::Waiting => false,
        }
    }

    pub fn my_score(&self) -> Option<u32> {
        self.scores
            .iter()
            .find(|entry| entry.name == self.player_name)
            .map(|entry| entry.score)
    }

    /// Applies a server event and returns a one-line status for the terminal
    pub fn apply_event(&mut self, event: &Event) -> String {
        debug!("Applying {:?}", event);

        match event {
            Event::GameStart { duration_secs } => {
                self.phase = RoundPhase::Playing;
                self.round_duration = Some(*duration_secs);
                self.mole = None;
                self.overtime_players.clear();
                self.last_result = None;
                format!("Round started: {}s. Type `hit <x> <y>`", duration_secs)
            }
            Event::MoleSpawn { x, y } => {
                self.mole = Some((*x, *y));
                format!("Mole at ({}, {})", x, y)
            }
            Event::Scores(entries) => {
                self.scores = entries.clone();
                let table: Vec<String> = entries
                    .iter()
                    .map(|entry| format!("{} {}", entry.name, entry.score))
                    .collect();
                format!("Scores: {}", table.join(" | "))
            }
            Event::ExtraTime {
                duration_secs,
                participants,
            } => {
                self.phase = RoundPhase::Overtime;
                self.mole = None;
                self.overtime_players = participants.clone();
                let role = if self.can_hit() {
                    "you are playing"
                } else {
                    "spectating"
                };
                format!(
                    "Extra time {}s between {} ({})",
                    duration_secs,
                    participants.join(", "),
                    role
                )
            }
            Event::GameEnd { winner, score } => {
                self.phase = RoundPhase::Waiting;
                self.mole = None;
                self.overtime_players.clear();
                self.last_result = Some((winner.clone(), *score));
                if *winner == self.player_name {
                    format!("You won with {} points!", score)
                } else {
                    format!("Round over. Winner: {} with {} points", winner, score)
                }
            }
            Event::GameStopped => {
                self.phase = RoundPhase::Waiting;
                self.mole = None;
                self.overtime_players.clear();
                "Round stopped by the server".to_string()
            }
        }
    }
}
