//! Terminal input parsing for the player client

use shared::{current_timestamp, in_grid, Command, GRID_SIZE};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerAction {
    Hit { x: u8, y: u8 },
    Quit,
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("expected `hit <x> <y>`, `quit` or `help`")]
    Unrecognized,
    #[error("cell ({0}, {1}) is off the board (0..{2})")]
    OffBoard(u8, u8, u8),
}

pub const USAGE: &str = "hit <x> <y> | <x> <y> | quit | help";

/// Parses one line typed by the player
pub fn parse_action(line: &str) -> Result<PlayerAction, InputError> {
    let words: Vec<String> = line
        .split_whitespace()
        .map(|word| word.to_ascii_lowercase())
        .collect();
    let words: Vec<&str> = words.iter().map(String::as_str).collect();

    let (x, y) = match words.as_slice() {
        ["quit"] | ["q"] | ["exit"] => return Ok(PlayerAction::Quit),
        ["help"] | ["?"] => return Ok(PlayerAction::Help),
        ["hit", x, y] | [x, y] => (*x, *y),
        _ => return Err(InputError::Unrecognized),
    };

    let x: u8 = x.parse().map_err(|_| InputError::Unrecognized)?;
    let y: u8 = y.parse().map_err(|_| InputError::Unrecognized)?;
    if !in_grid(x, y) {
        return Err(InputError::OffBoard(x, y, GRID_SIZE));
    }

    Ok(PlayerAction::Hit { x, y })
}

/// Builds the wire command for a hit observed now
pub fn hit_command(x: u8, y: u8) -> Command {
    Command::Hit {
        x,
        y,
        timestamp: current_timestamp(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hit() {
        assert_eq!(parse_action("hit 1 2"), Ok(PlayerAction::Hit { x: 1, y: 2 }));
        assert_eq!(parse_action("  0 0 "), Ok(PlayerAction::Hit { x: 0, y: 0 }));
        assert_eq!(parse_action("HIT 2 1"), Ok(PlayerAction::Hit { x: 2, y: 1 }));
    }

    #[test]
    fn test_parse_other_actions() {
        assert_eq!(parse_action("quit"), Ok(PlayerAction::Quit));
        assert_eq!(parse_action("?"), Ok(PlayerAction::Help));
        assert_eq!(parse_action("jump"), Err(InputError::Unrecognized));
        assert_eq!(parse_action("hit a b"), Err(InputError::Unrecognized));
        assert_eq!(parse_action(""), Err(InputError::Unrecognized));
    }

    #[test]
    fn test_off_board_hit_rejected() {
        assert_eq!(parse_action("hit 3 0"), Err(InputError::OffBoard(3, 0, 3)));
    }

    #[test]
    fn test_hit_command_uses_current_time() {
        let before = current_timestamp();
        let command = hit_command(1, 1);
        let after = current_timestamp();

        match command {
            Command::Hit { x, y, timestamp } => {
                assert_eq!((x, y), (1, 1));
                assert!(timestamp >= before && timestamp <= after);
            }
            _ => panic!("Expected a hit command"),
        }
    }
}
