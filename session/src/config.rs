//! Floor tuning knobs.
//!
//! Defaults match the live game. Every value can be overridden from the
//! environment (`FLOOR_*`), and the server layers CLI flags on top.

use std::time::Duration;

use thiserror::Error;

/// Default delay between a spin starting and its result being revealed.
pub const DEFAULT_REVEAL_DELAY_MS: u64 = 5_000;
/// Balance every player starts with.
pub const DEFAULT_STARTING_BALANCE: i64 = 1_000;
pub const DEFAULT_SHOVE_COST: i64 = 5;
pub const DEFAULT_SHOVE_COOLDOWN_MS: u64 = 3_000;
pub const DEFAULT_SHOVE_RANGE: f64 = 80.0;
/// Multiplier applied to the client-supplied shove direction vector.
pub const DEFAULT_SHOVE_FORCE: f64 = 0.3;
/// How close a player must stand to a device to mark it in use.
pub const DEFAULT_DEVICE_PROXIMITY: f64 = 60.0;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("{0} must be a positive finite number")]
    NotPositive(&'static str),
    #[error("{0} must not be negative")]
    Negative(&'static str),
}

#[derive(Clone, Debug, PartialEq)]
pub struct FloorConfig {
    pub reveal_delay_ms: u64,
    pub starting_balance: i64,
    pub shove_cost: i64,
    pub shove_cooldown_ms: u64,
    pub shove_range: f64,
    pub shove_force: f64,
    pub device_proximity: f64,
    /// Seed for tier assignment and spin outcomes. `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for FloorConfig {
    fn default() -> Self {
        Self {
            reveal_delay_ms: DEFAULT_REVEAL_DELAY_MS,
            starting_balance: DEFAULT_STARTING_BALANCE,
            shove_cost: DEFAULT_SHOVE_COST,
            shove_cooldown_ms: DEFAULT_SHOVE_COOLDOWN_MS,
            shove_range: DEFAULT_SHOVE_RANGE,
            shove_force: DEFAULT_SHOVE_FORCE,
            device_proximity: DEFAULT_DEVICE_PROXIMITY,
            seed: None,
        }
    }
}

impl FloorConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            reveal_delay_ms: read_u64("FLOOR_REVEAL_DELAY_MS", defaults.reveal_delay_ms),
            starting_balance: read_i64("FLOOR_STARTING_BALANCE", defaults.starting_balance),
            shove_cost: read_i64("FLOOR_SHOVE_COST", defaults.shove_cost),
            shove_cooldown_ms: read_u64("FLOOR_SHOVE_COOLDOWN_MS", defaults.shove_cooldown_ms),
            shove_range: read_f64("FLOOR_SHOVE_RANGE", defaults.shove_range),
            shove_force: read_f64("FLOOR_SHOVE_FORCE", defaults.shove_force),
            device_proximity: read_f64("FLOOR_DEVICE_PROXIMITY", defaults.device_proximity),
            seed: std::env::var("FLOOR_SEED")
                .ok()
                .and_then(|raw| raw.parse::<u64>().ok()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reveal_delay_ms == 0 {
            return Err(ConfigError::Zero("reveal_delay_ms"));
        }
        if self.starting_balance < 0 {
            return Err(ConfigError::Negative("starting_balance"));
        }
        if self.shove_cost < 0 {
            return Err(ConfigError::Negative("shove_cost"));
        }
        for (name, value) in [
            ("shove_range", self.shove_range),
            ("shove_force", self.shove_force),
            ("device_proximity", self.device_proximity),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::NotPositive(name));
            }
        }
        Ok(())
    }

    pub fn reveal_delay(&self) -> Duration {
        Duration::from_millis(self.reveal_delay_ms)
    }
}

fn read_u64(key: &str, fallback: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse::<u64>().ok())
        .unwrap_or(fallback)
}

fn read_i64(key: &str, fallback: i64) -> i64 {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse::<i64>().ok())
        .unwrap_or(fallback)
}

fn read_f64(key: &str, fallback: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse::<f64>().ok())
        .unwrap_or(fallback)
}
