//! Server tuning knobs: round lengths, spawn cadences and the hit window

use shared::DEFAULT_PORT;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("{name} range is inverted ({min:?} > {max:?})")]
    InvertedRange {
        name: &'static str,
        min: Duration,
        max: Duration,
    },
}

/// Inclusive range the spawn scheduler draws its delays from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    pub min: Duration,
    pub max: Duration,
}

impl Cadence {
    pub const fn from_millis(min: u64, max: u64) -> Self {
        Self {
            min: Duration::from_millis(min),
            max: Duration::from_millis(max),
        }
    }

    fn validate(&self, name: &'static str) -> Result<(), ConfigError> {
        if self.max.is_zero() {
            return Err(ConfigError::Zero(name));
        }
        if self.min > self.max {
            return Err(ConfigError::InvertedRange {
                name,
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub round_duration: Duration,
    pub overtime_duration: Duration,
    pub round_cadence: Cadence,
    pub overtime_cadence: Cadence,
    /// Maximum distance between a hit's claimed time and the mole's spawn time
    pub hit_window: Duration,
    pub overtime_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("0.0.0.0:{}", DEFAULT_PORT),
            round_duration: Duration::from_secs(60),
            overtime_duration: Duration::from_secs(10),
            round_cadence: Cadence::from_millis(1000, 3000),
            overtime_cadence: Cadence::from_millis(500, 800),
            hit_window: Duration::from_millis(3000),
            overtime_enabled: true,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.round_duration.is_zero() {
            return Err(ConfigError::Zero("round duration"));
        }
        if self.overtime_enabled && self.overtime_duration.is_zero() {
            return Err(ConfigError::Zero("overtime duration"));
        }
        if self.hit_window.is_zero() {
            return Err(ConfigError::Zero("hit window"));
        }
        self.round_cadence.validate("round cadence")?;
        self.overtime_cadence.validate("overtime cadence")?;
        Ok(())
    }
}
