//! Round state machine: phases, the live mole, scoring and the overtime tie-break
//!
//! `GameState` is plain data driven by the server event loop. Each transition
//! returns the [`Effect`]s the loop has to carry out (broadcasts, starting or
//! stopping the spawn chain, arming the round timer), which keeps every rule in
//! here testable without sockets or a runtime.

use crate::config::{Cadence, ServerConfig};
use log::{debug, info};
use rand::Rng;
use shared::{Event, ScoreEntry, GRID_SIZE};
use std::time::Duration;
use thiserror::Error;

pub const HIT_REWARD: u32 = 10;
pub const MISS_PENALTY: u32 = 5;
/// A running round is aborted once fewer players than this remain
pub const MIN_PLAYERS: usize = 1;
/// Overtime ends early once fewer tied players than this remain
pub const MIN_OVERTIME_PARTICIPANTS: usize = 2;
pub const NO_WINNER: &str = "No one";

/// Tags every scheduled action with the phase it was scheduled for
pub type Generation = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Running,
    Overtime,
}

impl Phase {
    pub fn is_active(self) -> bool {
        matches!(self, Phase::Running | Phase::Overtime)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    pub x: u8,
    pub y: u8,
    /// Server wall clock in epoch milliseconds
    pub spawned_at: u64,
}

/// Work the event loop performs on behalf of a transition, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Broadcast(Event),
    StartSpawner {
        cadence: Cadence,
        generation: Generation,
    },
    StopSpawner,
    ArmTimer {
        after: Duration,
        generation: Generation,
    },
    CancelTimer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitOutcome {
    Scored,
    Penalized,
    /// Wrong phase or not a participant; nothing changes and nothing is sent
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StartError {
    #[error("need at least {needed} connected player(s), have {connected}")]
    NotEnoughPlayers { needed: usize, connected: usize },
    #[error("a round is already in progress ({0:?})")]
    AlreadyRunning(Phase),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StopError {
    #[error("no round is in progress")]
    NotRunning,
}

/// Timing and rule settings copied out of the server configuration
#[derive(Debug, Clone)]
struct RoundSettings {
    round_duration: Duration,
    overtime_duration: Duration,
    round_cadence: Cadence,
    overtime_cadence: Cadence,
    hit_window: Duration,
    overtime_enabled: bool,
}

impl From<&ServerConfig> for RoundSettings {
    fn from(config: &ServerConfig) -> Self {
        Self {
            round_duration: config.round_duration,
            overtime_duration: config.overtime_duration,
            round_cadence: config.round_cadence,
            overtime_cadence: config.overtime_cadence,
            hit_window: config.hit_window,
            overtime_enabled: config.overtime_enabled,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GameState {
    settings: RoundSettings,
    phase: Phase,
    generation: Generation,
    /// Score table in arrival order
    scores: Vec<ScoreEntry>,
    /// Tied leaders allowed to play during overtime
    participants: Vec<String>,
    target: Option<Target>,
}

impl GameState {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            settings: RoundSettings::from(config),
            phase: Phase::Idle,
            generation: 0,
            scores: Vec::new(),
            participants: Vec::new(),
            target: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn active_target(&self) -> Option<Target> {
        self.target
    }

    pub fn participants(&self) -> &[String] {
        &self.participants
    }

    pub fn score_of(&self, name: &str) -> Option<u32> {
        self.scores
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.score)
    }

    pub fn player_count(&self) -> usize {
        self.scores.len()
    }

    pub fn scores_event(&self) -> Event {
        Event::Scores(self.scores.clone())
    }

    /// Adds a freshly connected player with a zero score
    pub fn add_player(&mut self, name: &str) -> Vec<Effect> {
        if self.score_of(name).is_some() {
            return Vec::new();
        }
        self.scores.push(ScoreEntry::new(name, 0));

        if self.phase.is_active() {
            vec![Effect::Broadcast(self.scores_event())]
        } else {
            Vec::new()
        }
    }

    /// Drops a player from the score table and the overtime set
    ///
    /// Ends the round early when too few players (or tied leaders) remain.
    pub fn remove_player(&mut self, name: &str) -> Vec<Effect> {
        let before = self.scores.len();
        self.scores.retain(|entry| entry.name != name);
        self.participants.retain(|participant| participant != name);

        if before == self.scores.len() || !self.phase.is_active() {
            return Vec::new();
        }

        if self.scores.len() < MIN_PLAYERS {
            info!("Last player left, stopping round");
            return self.abort();
        }

        if self.phase == Phase::Overtime && self.participants.len() < MIN_OVERTIME_PARTICIPANTS {
            info!("Overtime lost a participant, ending early");
            return self.finish_overtime();
        }

        vec![Effect::Broadcast(self.scores_event())]
    }

    /// Idle -> Running
    pub fn start_round(&mut self) -> Result<Vec<Effect>, StartError> {
        if self.phase != Phase::Idle {
            return Err(StartError::AlreadyRunning(self.phase));
        }
        if self.scores.len() < MIN_PLAYERS {
            return Err(StartError::NotEnoughPlayers {
                needed: MIN_PLAYERS,
                connected: self.scores.len(),
            });
        }

        for entry in &mut self.scores {
            entry.score = 0;
        }
        self.participants.clear();
        self.target = None;
        self.phase = Phase::Running;
        self.generation += 1;

        info!(
            "Round started with {} players for {}s",
            self.scores.len(),
            self.settings.round_duration.as_secs()
        );

        Ok(vec![
            Effect::Broadcast(Event::GameStart {
                duration_secs: self.settings.round_duration.as_secs(),
            }),
            Effect::Broadcast(self.scores_event()),
            Effect::StartSpawner {
                cadence: self.settings.round_cadence,
                generation: self.generation,
            },
            Effect::ArmTimer {
                after: self.settings.round_duration,
                generation: self.generation,
            },
        ])
    }

    /// Operator stop: cancels everything without naming a winner
    pub fn stop_round(&mut self) -> Result<Vec<Effect>, StopError> {
        if !self.phase.is_active() {
            return Err(StopError::NotRunning);
        }
        info!("Round stopped by operator");
        Ok(self.abort())
    }

    /// Places a new mole, superseding the previous one
    pub fn spawn_target<R: Rng>(
        &mut self,
        generation: Generation,
        rng: &mut R,
        now_ms: u64,
    ) -> Vec<Effect> {
        if generation != self.generation || !self.phase.is_active() {
            debug!("Dropping stale spawn tick (generation {})", generation);
            return Vec::new();
        }

        let target = Target {
            x: rng.gen_range(0..GRID_SIZE),
            y: rng.gen_range(0..GRID_SIZE),
            spawned_at: now_ms,
        };
        self.target = Some(target);
        debug!("Mole spawned at ({}, {})", target.x, target.y);

        vec![Effect::Broadcast(Event::MoleSpawn {
            x: target.x,
            y: target.y,
        })]
    }

    /// Scores a hit claim from `name`
    pub fn handle_hit(
        &mut self,
        name: &str,
        x: u8,
        y: u8,
        timestamp: u64,
    ) -> (HitOutcome, Vec<Effect>) {
        if !self.phase.is_active() || !self.is_participant(name) {
            return (HitOutcome::Ignored, Vec::new());
        }

        let window = self.settings.hit_window.as_millis() as u64;
        let on_target = self.target.map_or(false, |target| {
            target.x == x && target.y == y && target.spawned_at.abs_diff(timestamp) < window
        });

        let Some(entry) = self.scores.iter_mut().find(|entry| entry.name == name) else {
            return (HitOutcome::Ignored, Vec::new());
        };

        let outcome = if on_target {
            entry.score += HIT_REWARD;
            HitOutcome::Scored
        } else {
            entry.score = entry.score.saturating_sub(MISS_PENALTY);
            HitOutcome::Penalized
        };
        debug!(
            "{} hit ({}, {}): {:?}, score now {}",
            name, x, y, outcome, entry.score
        );

        (outcome, vec![Effect::Broadcast(self.scores_event())])
    }

    /// Round or overtime timer fired
    pub fn timer_expired(&mut self, generation: Generation) -> Vec<Effect> {
        if generation != self.generation {
            debug!("Dropping stale timer (generation {})", generation);
            return Vec::new();
        }

        match self.phase {
            Phase::Running => self.finish_round(),
            Phase::Overtime => self.finish_overtime(),
            Phase::Idle => Vec::new(),
        }
    }

    fn is_participant(&self, name: &str) -> bool {
        match self.phase {
            Phase::Running => self.score_of(name).is_some(),
            Phase::Overtime => self.participants.iter().any(|participant| participant == name),
            Phase::Idle => false,
        }
    }

    fn finish_round(&mut self) -> Vec<Effect> {
        let mut effects = vec![Effect::StopSpawner, Effect::CancelTimer];
        let ranked = rank(self.scores.iter());

        let tied = tied_leaders(&ranked);
        if self.settings.overtime_enabled && tied.len() >= MIN_OVERTIME_PARTICIPANTS {
            effects.extend(self.enter_overtime(tied));
        } else {
            effects.extend(self.end_round(&ranked));
        }
        effects
    }

    fn enter_overtime(&mut self, participants: Vec<String>) -> Vec<Effect> {
        for entry in &mut self.scores {
            if participants.contains(&entry.name) {
                entry.score = 0;
            }
        }
        self.participants = participants;
        self.target = None;
        self.phase = Phase::Overtime;
        self.generation += 1;

        info!("Overtime between {}", self.participants.join(", "));

        vec![
            Effect::Broadcast(Event::ExtraTime {
                duration_secs: self.settings.overtime_duration.as_secs(),
                participants: self.participants.clone(),
            }),
            Effect::Broadcast(self.scores_event()),
            Effect::StartSpawner {
                cadence: self.settings.overtime_cadence,
                generation: self.generation,
            },
            Effect::ArmTimer {
                after: self.settings.overtime_duration,
                generation: self.generation,
            },
        ]
    }

    fn finish_overtime(&mut self) -> Vec<Effect> {
        let ranked = rank(
            self.scores
                .iter()
                .filter(|entry| self.participants.contains(&entry.name)),
        );
        let mut effects = vec![Effect::StopSpawner, Effect::CancelTimer];
        effects.extend(self.end_round(&ranked));
        effects
    }

    fn end_round(&mut self, ranked: &[ScoreEntry]) -> Vec<Effect> {
        let (winner, score) = ranked
            .first()
            .map(|entry| (entry.name.clone(), entry.score))
            .unwrap_or_else(|| (NO_WINNER.to_string(), 0));

        self.reset_to_idle();
        info!("Round ended, winner {} with {}", winner, score);

        vec![Effect::Broadcast(Event::GameEnd { winner, score })]
    }

    fn abort(&mut self) -> Vec<Effect> {
        self.reset_to_idle();
        vec![
            Effect::StopSpawner,
            Effect::CancelTimer,
            Effect::Broadcast(Event::GameStopped),
        ]
    }

    fn reset_to_idle(&mut self) {
        self.phase = Phase::Idle;
        self.generation += 1;
        self.target = None;
        self.participants.clear();
    }
}

/// Stable descending sort, so equal scores keep arrival order
pub fn rank<'a>(entries: impl Iterator<Item = &'a ScoreEntry>) -> Vec<ScoreEntry> {
    let mut ranked: Vec<ScoreEntry> = entries.cloned().collect();
    ranked.sort_by(|a, b| b.score.cmp(&a.score));
    ranked
}

/// Names sharing a strictly positive top score, when at least two do
fn tied_leaders(ranked: &[ScoreEntry]) -> Vec<String> {
    let Some(top) = ranked.first().map(|entry| entry.score) else {
        return Vec::new();
    };
    if top == 0 {
        return Vec::new();
    }

    let tied: Vec<String> = ranked
        .iter()
        .take_while(|entry| entry.score == top)
        .map(|entry| entry.name.clone())
        .collect();

    if tied.len() >= MIN_OVERTIME_PARTICIPANTS {
        tied
    } else {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const SPAWN_AT: u64 = 1_700_000_000_000;

    fn test_config() -> ServerConfig {
        ServerConfig {
            round_duration: Duration::from_secs(20),
            overtime_duration: Duration::from_secs(10),
            ..ServerConfig::default()
        }
    }

    fn game_with(players: &[&str]) -> GameState {
        let mut game = GameState::new(&test_config());
        for name in players {
            game.add_player(name);
        }
        game
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    fn spawn(game: &mut GameState) -> Target {
        let generation = game.generation();
        game.spawn_target(generation, &mut rng(), SPAWN_AT);
        game.active_target().unwrap()
    }

    fn broadcasts(effects: &[Effect]) -> Vec<String> {
        effects
            .iter()
            .filter_map(|effect| match effect {
                Effect::Broadcast(event) => Some(event.to_string()),
                _ => None,
            })
            .collect()
    }

    /// Lands `hits` correct hits for `name` on the current mole
    fn score_hits(game: &mut GameState, name: &str, hits: u32) {
        let target = game.active_target().unwrap();
        for _ in 0..hits {
            let (outcome, _) = game.handle_hit(name, target.x, target.y, target.spawned_at);
            assert_eq!(outcome, HitOutcome::Scored);
        }
    }

    #[test]
    fn test_start_requires_a_player() {
        let mut game = game_with(&[]);
        assert_eq!(
            game.start_round(),
            Err(StartError::NotEnoughPlayers {
                needed: 1,
                connected: 0
            })
        );
        assert_eq!(game.phase(), Phase::Idle);
    }

    #[test]
    fn test_start_round_effects() {
        let mut game = game_with(&["A"]);
        let effects = game.start_round().unwrap();

        assert_eq!(game.phase(), Phase::Running);
        assert_eq!(broadcasts(&effects), vec!["GAME_START:20", "SCORES:A,0"]);
        assert!(effects.contains(&Effect::StartSpawner {
            cadence: Cadence::from_millis(1000, 3000),
            generation: game.generation()
        }));
        assert!(effects.contains(&Effect::ArmTimer {
            after: Duration::from_secs(20),
            generation: game.generation()
        }));
    }

    #[test]
    fn test_start_while_running_rejected() {
        let mut game = game_with(&["A"]);
        game.start_round().unwrap();
        assert_eq!(
            game.start_round(),
            Err(StartError::AlreadyRunning(Phase::Running))
        );
    }

    #[test]
    fn test_start_resets_scores() {
        let mut game = game_with(&["A"]);
        game.start_round().unwrap();
        spawn(&mut game);
        score_hits(&mut game, "A", 2);
        game.stop_round().unwrap();

        game.start_round().unwrap();
        assert_eq!(game.score_of("A"), Some(0));
    }

    #[test]
    fn test_hit_then_miss_scenario() {
        let mut game = game_with(&["A"]);
        game.start_round().unwrap();
        let target = spawn(&mut game);

        let (outcome, effects) = game.handle_hit("A", target.x, target.y, SPAWN_AT + 100);
        assert_eq!(outcome, HitOutcome::Scored);
        assert_eq!(broadcasts(&effects), vec!["SCORES:A,10"]);

        let wrong_x = (target.x + 1) % GRID_SIZE;
        let (outcome, effects) = game.handle_hit("A", wrong_x, target.y, SPAWN_AT + 200);
        assert_eq!(outcome, HitOutcome::Penalized);
        assert_eq!(broadcasts(&effects), vec!["SCORES:A,5"]);
    }

    #[test]
    fn test_score_never_negative() {
        let mut game = game_with(&["A"]);
        game.start_round().unwrap();

        for _ in 0..5 {
            let (outcome, _) = game.handle_hit("A", 0, 0, SPAWN_AT);
            assert_eq!(outcome, HitOutcome::Penalized);
        }
        assert_eq!(game.score_of("A"), Some(0));
    }

    #[test]
    fn test_stale_hit_penalized() {
        let mut game = game_with(&["A"]);
        game.start_round().unwrap();
        let target = spawn(&mut game);
        score_hits(&mut game, "A", 1);

        let (outcome, _) = game.handle_hit("A", target.x, target.y, SPAWN_AT + 3000);
        assert_eq!(outcome, HitOutcome::Penalized);
        assert_eq!(game.score_of("A"), Some(5));

        let (outcome, _) = game.handle_hit("A", target.x, target.y, SPAWN_AT + 2999);
        assert_eq!(outcome, HitOutcome::Scored);
    }

    #[test]
    fn test_hit_claimed_before_spawn_outside_window() {
        let mut game = game_with(&["A"]);
        game.start_round().unwrap();
        let target = spawn(&mut game);

        let (outcome, _) = game.handle_hit("A", target.x, target.y, SPAWN_AT - 5000);
        assert_eq!(outcome, HitOutcome::Penalized);
    }

    #[test]
    fn test_hit_without_live_target_is_a_miss() {
        let mut game = game_with(&["A"]);
        game.start_round().unwrap();
        assert!(game.active_target().is_none());

        let (outcome, _) = game.handle_hit("A", 1, 1, SPAWN_AT);
        assert_eq!(outcome, HitOutcome::Penalized);
    }

    #[test]
    fn test_hit_while_idle_ignored() {
        let mut game = game_with(&["A"]);
        let (outcome, effects) = game.handle_hit("A", 1, 1, SPAWN_AT);
        assert_eq!(outcome, HitOutcome::Ignored);
        assert!(effects.is_empty());
        assert_eq!(game.score_of("A"), Some(0));
    }

    #[test]
    fn test_new_spawn_supersedes_previous() {
        let mut game = game_with(&["A"]);
        game.start_round().unwrap();
        let generation = game.generation();
        let mut rng = rng();

        let mut previous = None;
        for step in 0..20 {
            game.spawn_target(generation, &mut rng, SPAWN_AT + step * 1000);
            let target = game.active_target().unwrap();
            assert!(shared::in_grid(target.x, target.y));
            assert_eq!(target.spawned_at, SPAWN_AT + step * 1000);
            if let Some(previous) = previous {
                assert_ne!(previous, target);
            }
            previous = Some(target);
        }
    }

    #[test]
    fn test_stale_generation_spawn_dropped() {
        let mut game = game_with(&["A"]);
        game.start_round().unwrap();
        let old_generation = game.generation();
        game.stop_round().unwrap();
        game.start_round().unwrap();

        let effects = game.spawn_target(old_generation, &mut rng(), SPAWN_AT);
        assert!(effects.is_empty());
        assert!(game.active_target().is_none());
    }

    #[test]
    fn test_stale_timer_does_not_end_next_round() {
        let mut game = game_with(&["A"]);
        game.start_round().unwrap();
        let old_generation = game.generation();
        game.stop_round().unwrap();
        game.start_round().unwrap();

        assert!(game.timer_expired(old_generation).is_empty());
        assert_eq!(game.phase(), Phase::Running);
    }

    #[test]
    fn test_round_end_without_tie() {
        let mut game = game_with(&["A", "B"]);
        game.start_round().unwrap();
        spawn(&mut game);
        score_hits(&mut game, "B", 2);
        score_hits(&mut game, "A", 1);

        let effects = game.timer_expired(game.generation());
        assert_eq!(broadcasts(&effects), vec!["GAME_END:B:20"]);
        assert!(effects.contains(&Effect::StopSpawner));
        assert_eq!(game.phase(), Phase::Idle);
        assert!(game.active_target().is_none());
    }

    #[test]
    fn test_tie_enters_overtime() {
        let mut game = game_with(&["A", "B", "C"]);
        game.start_round().unwrap();
        spawn(&mut game);
        score_hits(&mut game, "A", 2);
        score_hits(&mut game, "B", 2);
        score_hits(&mut game, "C", 1);

        let effects = game.timer_expired(game.generation());

        assert_eq!(game.phase(), Phase::Overtime);
        assert_eq!(game.participants(), ["A".to_string(), "B".to_string()]);
        assert_eq!(
            broadcasts(&effects),
            vec!["EXTRA_TIME:10:A,B", "SCORES:A,0:B,0:C,10"]
        );
        assert!(effects.contains(&Effect::StartSpawner {
            cadence: Cadence::from_millis(500, 800),
            generation: game.generation()
        }));
        assert!(effects.contains(&Effect::ArmTimer {
            after: Duration::from_secs(10),
            generation: game.generation()
        }));
    }

    #[test]
    fn test_zero_tie_ends_directly() {
        let mut game = game_with(&["A", "B"]);
        game.start_round().unwrap();

        let effects = game.timer_expired(game.generation());
        assert_eq!(broadcasts(&effects), vec!["GAME_END:A:0"]);
        assert_eq!(game.phase(), Phase::Idle);
    }

    #[test]
    fn test_tie_ends_directly_when_overtime_disabled() {
        let config = ServerConfig {
            overtime_enabled: false,
            ..test_config()
        };
        let mut game = GameState::new(&config);
        game.add_player("A");
        game.add_player("B");
        game.start_round().unwrap();
        spawn(&mut game);
        score_hits(&mut game, "A", 1);
        score_hits(&mut game, "B", 1);

        let effects = game.timer_expired(game.generation());
        assert_eq!(broadcasts(&effects), vec!["GAME_END:A:10"]);
    }

    #[test]
    fn test_single_player_never_gets_overtime() {
        let mut game = game_with(&["A"]);
        game.start_round().unwrap();
        spawn(&mut game);
        score_hits(&mut game, "A", 3);

        let effects = game.timer_expired(game.generation());
        assert_eq!(broadcasts(&effects), vec!["GAME_END:A:30"]);
    }

    fn overtime_game() -> GameState {
        let mut game = game_with(&["A", "B", "C"]);
        game.start_round().unwrap();
        spawn(&mut game);
        score_hits(&mut game, "A", 1);
        score_hits(&mut game, "B", 1);
        game.timer_expired(game.generation());
        assert_eq!(game.phase(), Phase::Overtime);
        game
    }

    #[test]
    fn test_non_participant_ignored_in_overtime() {
        let mut game = overtime_game();
        let target = spawn(&mut game);

        let (outcome, effects) = game.handle_hit("C", target.x, target.y, SPAWN_AT);
        assert_eq!(outcome, HitOutcome::Ignored);
        assert!(effects.is_empty());
        assert_eq!(game.score_of("C"), Some(0));
    }

    #[test]
    fn test_overtime_end_ranks_participants_only() {
        let mut game = overtime_game();
        spawn(&mut game);
        score_hits(&mut game, "B", 1);

        let effects = game.timer_expired(game.generation());
        assert_eq!(broadcasts(&effects), vec!["GAME_END:B:10"]);
        assert_eq!(game.phase(), Phase::Idle);
        assert!(game.participants().is_empty());
    }

    #[test]
    fn test_overtime_tie_goes_to_first_in_ranking() {
        let mut game = overtime_game();
        let effects = game.timer_expired(game.generation());
        assert_eq!(broadcasts(&effects), vec!["GAME_END:A:0"]);
    }

    #[test]
    fn test_round_timer_generation_is_stale_in_overtime() {
        let mut game = game_with(&["A", "B"]);
        game.start_round().unwrap();
        let round_generation = game.generation();
        spawn(&mut game);
        score_hits(&mut game, "A", 1);
        score_hits(&mut game, "B", 1);
        game.timer_expired(round_generation);

        assert!(game.timer_expired(round_generation).is_empty());
        assert_eq!(game.phase(), Phase::Overtime);
    }

    #[test]
    fn test_participant_leaving_ends_overtime() {
        let mut game = overtime_game();
        spawn(&mut game);
        score_hits(&mut game, "A", 1);

        let effects = game.remove_player("B");
        assert_eq!(broadcasts(&effects), vec!["GAME_END:A:10"]);
        assert!(effects.contains(&Effect::CancelTimer));
        assert_eq!(game.phase(), Phase::Idle);
    }

    #[test]
    fn test_spectator_leaving_keeps_overtime() {
        let mut game = overtime_game();
        let effects = game.remove_player("C");

        assert_eq!(game.phase(), Phase::Overtime);
        assert_eq!(broadcasts(&effects), vec!["SCORES:A,0:B,0"]);
    }

    #[test]
    fn test_last_player_leaving_stops_round() {
        let mut game = game_with(&["A"]);
        game.start_round().unwrap();

        let effects = game.remove_player("A");
        assert_eq!(broadcasts(&effects), vec!["GAME_STOPPED"]);
        assert!(effects.contains(&Effect::StopSpawner));
        assert_eq!(game.phase(), Phase::Idle);
    }

    #[test]
    fn test_disconnect_removes_from_scores() {
        let mut game = game_with(&["A", "B"]);
        game.start_round().unwrap();

        let effects = game.remove_player("A");
        assert_eq!(broadcasts(&effects), vec!["SCORES:B,0"]);
        assert_eq!(game.score_of("A"), None);
        assert_eq!(game.player_count(), 1);
    }

    #[test]
    fn test_disconnect_while_idle_is_silent() {
        let mut game = game_with(&["A", "B"]);
        assert!(game.remove_player("A").is_empty());
        assert!(game.remove_player("ghost").is_empty());
    }

    #[test]
    fn test_late_joiner_can_play() {
        let mut game = game_with(&["A"]);
        game.start_round().unwrap();

        let effects = game.add_player("B");
        assert_eq!(broadcasts(&effects), vec!["SCORES:A,0:B,0"]);

        spawn(&mut game);
        score_hits(&mut game, "B", 1);
        assert_eq!(game.score_of("B"), Some(10));
    }

    #[test]
    fn test_stop_round() {
        let mut game = game_with(&["A"]);
        assert_eq!(game.stop_round(), Err(StopError::NotRunning));

        game.start_round().unwrap();
        spawn(&mut game);
        let effects = game.stop_round().unwrap();

        assert_eq!(
            effects,
            vec![
                Effect::StopSpawner,
                Effect::CancelTimer,
                Effect::Broadcast(Event::GameStopped)
            ]
        );
        assert_eq!(game.phase(), Phase::Idle);
        assert!(game.active_target().is_none());
    }

    #[test]
    fn test_rank_is_stable() {
        let entries = vec![
            ScoreEntry::new("A", 10),
            ScoreEntry::new("B", 20),
            ScoreEntry::new("C", 10),
        ];
        let ranked = rank(entries.iter());
        let names: Vec<&str> = ranked.iter().map(|entry| entry.name.as_str()).collect();
        assert_eq!(names, vec!["B", "A", "C"]);
    }

    #[test]
    fn test_tied_leaders() {
        let ranked = vec![
            ScoreEntry::new("A", 10),
            ScoreEntry::new("B", 10),
            ScoreEntry::new("C", 5),
        ];
        assert_eq!(tied_leaders(&ranked), vec!["A", "B"]);

        let ranked = vec![ScoreEntry::new("A", 10), ScoreEntry::new("B", 5)];
        assert!(tied_leaders(&ranked).is_empty());

        assert!(tied_leaders(&[]).is_empty());
    }
}
